use mock_server::{AppState, Credentials};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "8080".to_string());
    let addr = format!("127.0.0.1:{port}");
    let credentials = Credentials::from_env();
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, username = %credentials.username, "listening");
    mock_server::run_with_state(listener, AppState::new(credentials)).await
}
