use tracing_subscriber::{EnvFilter, fmt};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    // Startup banner at info level so something always prints at default verbosity
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    let settings = authgate::config::Settings::from_env();
    info!(
        target: "authgate",
        "authgate starting: RUST_LOG='{}', http_port={}, token_ttl_secs={}, session_ttl_secs={}, argon2=(m={},t={},p={}), max_concurrent_hashes={}",
        rust_log,
        settings.http_port,
        settings.token_ttl.as_secs(),
        settings.session_ttl.as_secs(),
        settings.argon2_m_cost,
        settings.argon2_t_cost,
        settings.argon2_p_cost,
        settings.max_concurrent_hashes
    );

    authgate::server::run_with_settings(settings).await
}
