use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    harvest_cli::init_tracing();
    harvest_cli::run(harvest_cli::Cli::parse()).await
}
