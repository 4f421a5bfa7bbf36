use clap::Parser;

use mason_cli_common::init_logging;
use masonctl::Masonctl;

#[tokio::main]
async fn main() {
    let cli = Masonctl::parse();
    init_logging(&cli.log_args);

    match masonctl::run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            tracing::error!(error = ?err, "masonctl failed");
            eprintln!("Error: {err:#}");
            std::process::exit(masonctl::EXIT_FAILED);
        }
    }
}
