use clap::Parser;
use pmp_content_experiments::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Simulate(args) => cli::simulate::run(args).await,
        Command::Generate(args) => cli::generate::run(args).await,
    }
}
