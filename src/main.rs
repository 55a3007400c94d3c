mod api;
mod auth;
mod config;
mod slug;
mod storage;
mod upload;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api::types::AppState;
use config::Config;
use storage::Storage;
use upload::UploadPipeline;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = 3001)]
    port: u16,

    /// Path to data directory (database and uploaded files)
    #[arg(short, long, default_value = "./data")]
    data_dir: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "komik_server=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = Config::load();
    tracing::info!("Starting komik catalog server on port {}", args.port);

    let storage = Storage::new(&args.data_dir).await?;
    if let Some((username, password)) = config.bootstrap_admin() {
        auth::ensure_admin(&storage, username, password).await?;
    }

    let uploads = UploadPipeline::new(Path::new(&args.data_dir).join("public"), &config);
    let state = AppState {
        storage,
        uploads: Arc::new(uploads),
        config: Arc::new(config),
    };

    api::server::serve(args.port, state).await
}
