use bunny_config::networks::resolve_network;
use bunny_scripts::{cli::Cli, errors::ScriptError};
use clap::Parser;

#[tokio::main]
async fn main() -> Result<(), ScriptError> {
    let Cli {
        network,
        build_dir,
        manifest_dir,
        command,
    } = Cli::parse();

    tracing_subscriber::fmt().pretty().init();

    let network = resolve_network(&network)?;

    command.run(network, &build_dir, &manifest_dir).await
}
