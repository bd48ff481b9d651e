//! Binary entrypoint for the milestone tool

use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Logs go to stderr so plan output on stdout stays pipeable
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = milestone::cli::run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
