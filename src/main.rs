use anyhow::{Context, anyhow};

use car_sales_assist::build_app;
use car_sales_assist::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install rustls crypto provider"))?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    eprintln!("🚗 Car Sales Assist v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Backend: {:?}", config.llm.backend);
    eprintln!("   Model: {}", config.llm.model);
    eprintln!("   Chat API: http://{}/api/chat", config.bind_addr);
    eprintln!("   Summary API: http://{}/api/summary", config.bind_addr);
    if config.knowledge.is_some() {
        eprintln!("   Knowledge base: loaded");
    }

    let app = build_app(&config)?;

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, "Intake server started");

    axum::serve(listener, app).await?;
    Ok(())
}
