use anyhow::Context;
use clap::Parser;
use roomchat::{
    AppState, app,
    auth::Providers,
    config::{Secrets, Settings},
    session,
};
use tokio::net::TcpListener;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer, cookie::SameSite};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::parse();
    let secrets = Secrets::load(&settings.secrets).context("Chat config")?;

    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(settings.public_url.starts_with("https://"))
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::hours(12)))
        .with_signed(session::signing_key(&secrets.security_key));

    let providers = Providers::new(&secrets, &settings).context("building oauth clients")?;
    let addr = settings.addr;
    let app = app(AppState::new(settings, providers)).layer(session_layer);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("Starting web server on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("bye");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("cannot listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
}
