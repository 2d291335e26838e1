//! logscope: search and chart logs from the command line

use clap::Parser;
use logscope::cli::{self, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let code = cli::run(cli).await;
    std::process::exit(code);
}
