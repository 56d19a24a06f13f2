use clap::Parser;

use trellis::config::{AppConfig, CliArgs};
use trellis::{logging, TrellisApp};

fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    let console = logging::init()?;
    log::trace!("Starting with args: {:?}", args);

    TrellisApp::new(AppConfig::from(args), console)?.run()
}
