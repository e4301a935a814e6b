//! Studio CMS - binary entry point
//! Delegates to the library for all app logic.

#[tokio::main]
async fn main() {
    if let Err(e) = studio_cms::run().await {
        tracing::error!("Fatal: {}", e);
        eprintln!("studio_cms failed to start: {}", e);
        std::process::exit(1);
    }
}
