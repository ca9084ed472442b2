//! trackbeat CLI - OAuth and webhook service for a personal site
//!
//! Run with: cargo run --bin trackbeat -- <command>

#[tokio::main]
async fn main() {
    // Load .env as early as possible
    let _ = dotenvy::dotenv();

    trackbeat::init_logging();

    if let Err(e) = trackbeat::cli::run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
