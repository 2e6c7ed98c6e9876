mod config;
mod guard;
mod routes;

use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::GuardConfig::from_env().expect("invalid guard configuration");
    if config.production {
        tracing::info!("production mode: HSTS enabled");
    }

    let app = routes::app(&config);
    let port = config.port;
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, site_dir = %config.site_dir.display(), "camply edge listening");
    axum::serve(listener, app).await.expect("server failed");
}
