//! Declarative structural documents

/// Declare a struct whose fields map to named BSON fields.
///
/// Each field is written as `name: Type => "key"` with optional flags in
/// brackets: `omitempty` skips empty values, `minsize` writes 64-bit
/// integers as Int32 when they fit. Every field type must implement
/// [`Field`](crate::field::Field).
///
/// The macro generates `Default` (every field at its zero value),
/// [`Marshal`](crate::encode::Marshal), [`Unmarshal`](crate::codec::Unmarshal)
/// and [`Field`](crate::field::Field), so structural documents nest. Unknown
/// keys are skipped when decoding, whatever their element type; when a key
/// repeats, the last one wins.
///
/// # Example
///
/// ```
/// use bson_compat::{legacy, structural};
///
/// structural! {
///     #[derive(Debug, PartialEq)]
///     pub struct Person {
///         pub id: legacy::ObjectId => "_id" [omitempty],
///         pub name: String => "name",
///         pub age: i64 => "age" [omitempty, minsize],
///     }
/// }
///
/// let person = Person { name: "abc".to_string(), ..Default::default() };
/// let bytes = legacy::marshal(&person).unwrap();
///
/// let mut decoded = Person::default();
/// legacy::unmarshal(&bytes, &mut decoded).unwrap();
/// assert_eq!(decoded, person);
/// ```
#[macro_export]
macro_rules! structural {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field_vis:vis $field:ident : $ty:ty => $key:literal $([$($flag:ident),* $(,)?])?
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $(
                $(#[$field_meta])*
                $field_vis $field: $ty,
            )*
        }

        impl ::core::default::Default for $name {
            fn default() -> Self {
                Self {
                    $( $field: <$ty as $crate::field::Field>::zero(), )*
                }
            }
        }

        impl $crate::encode::Marshal for $name {
            fn write_fields(
                &self,
                w: &mut $crate::encode::DocumentWriter<'_>,
            ) -> ::core::result::Result<(), $crate::error::EncodeError> {
                $(
                    $crate::field::write_field(
                        w,
                        $key,
                        &self.$field,
                        $crate::field::FieldOptions::NONE $($(.$flag())*)?,
                    )?;
                )*
                Ok(())
            }
        }

        impl $crate::codec::Unmarshal for $name {
            fn unmarshal_document(
                reader: $crate::decode::DocumentReader<'_>,
                ctx: &$crate::decode::DecodeContext,
            ) -> ::core::result::Result<Self, $crate::error::DecodeError> {
                let mut out = <Self as ::core::default::Default>::default();
                for element in reader {
                    let element = element?;
                    match element.key {
                        $(
                            $key => {
                                out.$field =
                                    <$ty as $crate::field::Field>::from_element(&element, ctx)?;
                            }
                        )*
                        _ => {}
                    }
                }
                Ok(out)
            }
        }

        impl $crate::field::Field for $name {
            const SLOT: $crate::policy::Slot = $crate::policy::Slot::OrderedDocument;
            const FAMILY: ::core::option::Option<$crate::policy::Family> = None;

            fn zero() -> Self {
                <Self as ::core::default::Default>::default()
            }

            fn is_empty(&self) -> bool {
                false
            }

            fn write(
                &self,
                key: &str,
                w: &mut $crate::encode::DocumentWriter<'_>,
                _: $crate::field::FieldOptions,
            ) -> ::core::result::Result<(), $crate::error::EncodeError> {
                w.document(key, |inner| $crate::encode::Marshal::write_fields(self, inner))
            }

            fn from_element(
                element: &$crate::decode::Element<'_>,
                ctx: &$crate::decode::DecodeContext,
            ) -> ::core::result::Result<Self, $crate::error::DecodeError> {
                $crate::policy::check(
                    element.key,
                    element.kind,
                    <Self as $crate::field::Field>::SLOT,
                    ctx.structural(),
                )?;
                match element.kind {
                    $crate::policy::ElementType::Null => Ok(<Self as $crate::field::Field>::zero()),
                    _ => <Self as $crate::codec::Unmarshal>::unmarshal_document(
                        element.as_document()?,
                        &ctx.descend()?,
                    ),
                }
            }
        }
    };
}
