//! Command-line interface for bson-compat
//!
//! This module handles:
//! - Command-line argument parsing using clap
//! - Configuration loading and flag overrides
//! - The `inspect`, `roundtrip`, `from-json` and `oid` subcommands

use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::codec::Codec;
use crate::config::{CodecConfig, LogLevel};
use crate::current;
use crate::encode;
use crate::error::{CompatError, Result};
use crate::legacy::{self, D};
use crate::policy::Family;
use crate::value::Value;

/// BSON compatibility codec between the legacy and current type families
#[derive(Parser, Debug)]
#[command(
    name = "bson-compat",
    version,
    about = "Inspect and convert BSON through the legacy or current type family",
    long_about = "Decode BSON files through either entry point of the compatibility codec,
check that re-encoding reproduces the input, convert Extended JSON to BSON and
work with legacy ObjectIds."
)]
pub struct CliArgs {
    /// Configuration file path
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    pub config_file: Option<PathBuf>,

    /// Verbose mode; repeat for trace logging (-vv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands for bson-compat
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Decode a BSON file and print it as relaxed Extended JSON
    Inspect {
        /// BSON file containing one document
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Entry point to decode through
        #[arg(long, value_enum, default_value_t = FamilyArg::Legacy)]
        family: FamilyArg,
    },

    /// Decode a BSON file, re-encode it and compare the bytes
    Roundtrip {
        /// BSON file containing one document
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Entry point to decode through
        #[arg(long, value_enum, default_value_t = FamilyArg::Legacy)]
        family: FamilyArg,
    },

    /// Convert an Extended JSON document to BSON
    FromJson {
        /// JSON file containing one document
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output BSON file
        #[arg(short = 'o', long, value_name = "OUT")]
        output: PathBuf,
    },

    /// Generate a legacy ObjectId, or describe the given one
    Oid {
        /// 24-character hex identifier
        #[arg(value_name = "HEX")]
        hex: Option<String>,
    },
}

/// Type family selectable on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FamilyArg {
    Legacy,
    Current,
}

impl From<FamilyArg> for Family {
    fn from(arg: FamilyArg) -> Self {
        match arg {
            FamilyArg::Legacy => Family::Legacy,
            FamilyArg::Current => Family::Current,
        }
    }
}

/// Outcome of a decode/re-encode comparison
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundTrip {
    Identical { len: usize },
    Differs { offset: usize, original: usize, encoded: usize },
}

/// CLI interface handler
pub struct CliInterface {
    /// Parsed command-line arguments
    args: CliArgs,

    /// Loaded configuration
    config: CodecConfig,
}

impl CliInterface {
    /// Create a new CLI interface
    ///
    /// # Returns
    /// * `Result<Self>` - New CLI interface or error
    pub fn new() -> Result<Self> {
        let args = CliArgs::parse();
        let config = Self::load_config(&args)?;

        Ok(Self { args, config })
    }

    /// Load configuration from file and apply flag overrides
    ///
    /// # Arguments
    /// * `args` - Command-line arguments
    ///
    /// # Returns
    /// * `Result<CodecConfig>` - Loaded configuration or error
    fn load_config(args: &CliArgs) -> Result<CodecConfig> {
        let mut config = match &args.config_file {
            Some(path) => CodecConfig::from_file(path)?,
            None => CodecConfig::load()?,
        };

        Self::apply_logging_args(&mut config, args);
        Ok(config)
    }

    /// Apply logging-related CLI arguments to configuration
    fn apply_logging_args(config: &mut CodecConfig, args: &CliArgs) {
        config.logging.level = match args.verbose {
            0 => config.logging.level,
            1 => LogLevel::Debug,
            _ => LogLevel::Trace,
        };
    }

    /// Get the configuration
    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Get the CLI arguments
    pub fn args(&self) -> &CliArgs {
        &self.args
    }

    /// Run the selected subcommand
    ///
    /// # Returns
    /// * `Result<()>` - Success or error
    pub fn handle_subcommand(&self) -> Result<()> {
        let codec = Codec::new(&self.config);

        match &self.args.command {
            Commands::Inspect { file, family } => {
                let data = read_file(file)?;
                println!("{}", inspect(&codec, (*family).into(), &data)?);
            }
            Commands::Roundtrip { file, family } => {
                let data = read_file(file)?;
                match roundtrip(&codec, (*family).into(), &data)? {
                    RoundTrip::Identical { len } => {
                        println!("identical ({len} bytes)");
                    }
                    RoundTrip::Differs {
                        offset,
                        original,
                        encoded,
                    } => {
                        return Err(CompatError::Generic(format!(
                            "re-encoded bytes differ at offset {offset} \
                             (original {original} bytes, re-encoded {encoded} bytes)"
                        )));
                    }
                }
            }
            Commands::FromJson { file, output } => {
                let text = std::fs::read_to_string(file)?;
                let bytes = json_to_bson(&text)?;
                std::fs::write(output, &bytes)?;
                info!("Wrote {} bytes to {}", bytes.len(), output.display());
            }
            Commands::Oid { hex } => {
                println!("{}", describe_oid(hex.as_deref())?);
            }
        }
        Ok(())
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    let data = std::fs::read(path)?;
    debug!("Read {} bytes from {}", data.len(), path.display());
    Ok(data)
}

/// Decode `data` through `family` and render it as relaxed Extended JSON
///
/// # Arguments
/// * `codec` - Configured codec
/// * `family` - Entry point to decode through
/// * `data` - One BSON document
///
/// # Returns
/// * `Result<String>` - Pretty-printed JSON
pub fn inspect(codec: &Codec, family: Family, data: &[u8]) -> Result<String> {
    let mut value = Value::Null;
    codec.unmarshal(family, data, &mut value)?;
    let json = value.to_bson()?.into_relaxed_extjson();
    serde_json::to_string_pretty(&json).map_err(|e| CompatError::Generic(e.to_string()))
}

/// Decode `data` into the family's ordered document and re-encode it
///
/// Ordered documents keep key order and duplicates, so any difference
/// points at a lossy conversion.
pub fn roundtrip(codec: &Codec, family: Family, data: &[u8]) -> Result<RoundTrip> {
    let encoded = match family {
        Family::Legacy => {
            let mut doc = D::new();
            codec.unmarshal(family, data, &mut doc)?;
            encode::marshal(&doc)?
        }
        Family::Current => {
            let mut doc = current::Document::new();
            codec.unmarshal(family, data, &mut doc)?;
            encode::marshal(&doc)?
        }
    };

    if encoded == data {
        return Ok(RoundTrip::Identical { len: data.len() });
    }
    let offset = data
        .iter()
        .zip(&encoded)
        .position(|(a, b)| a != b)
        .unwrap_or_else(|| data.len().min(encoded.len()));
    Ok(RoundTrip::Differs {
        offset,
        original: data.len(),
        encoded: encoded.len(),
    })
}

/// Convert an Extended JSON document into BSON through current-family values
pub fn json_to_bson(text: &str) -> Result<Vec<u8>> {
    let json: serde_json::Value =
        serde_json::from_str(text).map_err(|e| CompatError::Generic(format!("invalid JSON: {e}")))?;
    let doc = match bson::Bson::try_from(json) {
        Ok(bson::Bson::Document(doc)) => doc,
        Ok(other) => {
            return Err(CompatError::Generic(format!(
                "expected a JSON object, got {:?}",
                other.element_type()
            )));
        }
        Err(e) => return Err(CompatError::Generic(format!("invalid Extended JSON: {e}"))),
    };
    let document = current::Document::try_from(doc)?;
    Ok(current::marshal(&document)?)
}

/// Describe a legacy identifier: the given hex, or a freshly generated one
pub fn describe_oid(hex: Option<&str>) -> Result<String> {
    let id = match hex {
        Some(hex) => legacy::ObjectId::from_hex(hex)?,
        None => legacy::ObjectId::new(),
    };

    let timestamp = id
        .timestamp()
        .map(|t| t.to_rfc3339())
        .unwrap_or_default();
    let machine = id.machine().map(hex::encode).unwrap_or_default();
    let pid = id.pid().unwrap_or_default();
    let counter = id.counter().unwrap_or_default();

    Ok(format!(
        "hex:       {}\ntimestamp: {}\nmachine:   {}\npid:       {}\ncounter:   {}",
        id.hex(),
        timestamp,
        machine,
        pid,
        counter
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn bytes(doc: &bson::Document) -> Vec<u8> {
        let mut buf = Vec::new();
        doc.to_writer(&mut buf).unwrap();
        buf
    }

    #[test]
    fn test_cli_args_parsing() {
        let args = CliArgs::try_parse_from(vec!["bson-compat", "inspect", "doc.bson"]).unwrap();
        assert_eq!(args.verbose, 0);
        match args.command {
            Commands::Inspect { file, family } => {
                assert_eq!(file, PathBuf::from("doc.bson"));
                assert_eq!(family, FamilyArg::Legacy);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_args_with_flags() {
        let args = CliArgs::try_parse_from(vec![
            "bson-compat",
            "-vv",
            "roundtrip",
            "doc.bson",
            "--family",
            "current",
            "--config",
            "custom.toml",
        ])
        .unwrap();
        assert_eq!(args.verbose, 2);
        assert_eq!(args.config_file, Some(PathBuf::from("custom.toml")));
        assert!(matches!(
            args.command,
            Commands::Roundtrip {
                family: FamilyArg::Current,
                ..
            }
        ));
    }

    #[test]
    fn test_from_json_requires_output() {
        assert!(CliArgs::try_parse_from(vec!["bson-compat", "from-json", "in.json"]).is_err());
    }

    #[test]
    fn test_verbosity_overrides_config() {
        let args = CliArgs::try_parse_from(vec!["bson-compat", "-v", "oid"]).unwrap();
        let mut config = CodecConfig::default();
        CliInterface::apply_logging_args(&mut config, &args);
        assert_eq!(config.logging.level, LogLevel::Debug);
    }

    #[test]
    fn test_inspect_renders_relaxed_json() {
        let data = bytes(&doc! { "name": "abc", "n": 1 });
        let json = inspect(&Codec::default(), Family::Legacy, &data).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, serde_json::json!({ "n": 1, "name": "abc" }));
    }

    #[test]
    fn test_roundtrip_identical() {
        let data = bytes(&doc! { "z": 1, "a": [true, { "b": 2_i64 }] });
        for family in [Family::Legacy, Family::Current] {
            assert_eq!(
                roundtrip(&Codec::default(), family, &data).unwrap(),
                RoundTrip::Identical { len: data.len() }
            );
        }
    }

    #[test]
    fn test_json_to_bson() {
        let bytes_out = json_to_bson(r#"{ "_id": { "$oid": "507f1f77bcf86cd799439011" }, "n": 1 }"#)
            .unwrap();
        let expected = bytes(&doc! {
            "_id": bson::oid::ObjectId::parse_str("507f1f77bcf86cd799439011").unwrap(),
            "n": 1,
        });
        assert_eq!(bytes_out, expected);
        assert!(json_to_bson("[1, 2]").is_err());
    }

    #[test]
    fn test_describe_oid() {
        let text = describe_oid(Some("507f1f77bcf86cd799439011")).unwrap();
        assert!(text.contains("hex:       507f1f77bcf86cd799439011"));
        assert!(text.contains("machine:   bcf86c"));
        assert!(text.contains("pid:       55193"));
        assert!(describe_oid(Some("xyz")).is_err());
        assert!(describe_oid(None).is_ok());
    }
}
