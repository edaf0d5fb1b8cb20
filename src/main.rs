use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use attendance_uploader::{
    config::AppConfig,
    drive::GoogleDrive,
    save::SaveService,
    server::{self, AppState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env()?;

    let drive = GoogleDrive::new(config.credential.clone())?;
    let save = SaveService::new(Arc::new(drive), config.root_folder.clone());

    let app = server::router(AppState {
        save: Arc::new(save),
    });

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!(port = config.port, root_folder = %config.root_folder, "listening");

    axum::serve(listener, app).await?;

    Ok(())
}
