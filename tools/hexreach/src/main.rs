use anyhow::Result;
use clap::Parser;
use hexreach::cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();
    hexreach::logging::init(cli.log_json)?;
    cli.run()
}
