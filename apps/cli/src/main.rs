//! pricedoc CLI — turn flat pricing CSV exports into document-database JSON.
//!
//! Reads a retail-pricing CSV, nests each row into a product/pricing/platform
//! document with derived price statistics, and writes the result for bulk
//! import.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli)
}
