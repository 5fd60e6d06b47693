//! bson-compat command-line tool
//!
//! Inspects and converts BSON through the legacy or current entry point of
//! the compatibility codec.
//!
//! # Usage
//!
//! ```bash
//! # Print a document as relaxed Extended JSON
//! bson-compat inspect doc.bson --family current
//!
//! # Check that decode + encode reproduces the input
//! bson-compat roundtrip doc.bson
//!
//! # Generate a legacy ObjectId
//! bson-compat oid
//! ```

use bson_compat::cli::CliInterface;
use bson_compat::error::Result;

/// Application entry point
fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Parse arguments, set up logging and run the selected subcommand
fn run() -> Result<()> {
    let cli = CliInterface::new()?;
    initialize_logging(&cli);
    cli.handle_subcommand()
}

/// Initialize logging from the configured level
///
/// `-v`/`-vv` have already been folded into the configuration.
fn initialize_logging(cli: &CliInterface) {
    let level = cli.config().logging.level.to_tracing_level();

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr);

    if cli.config().logging.timestamps {
        subscriber.init();
    } else {
        subscriber.without_time().init();
    }
}
