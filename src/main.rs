//! rostergate binary: operator CLI around the gatekeeper library.

mod cli;

use clap::Parser;
use cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = cli::execute(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
