use std::sync::Arc;

use clap::Parser;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};
use wikibot_core::db::Connector;
use wikibot_core::WikibotConfig;

use wikibot_server::http::{self, HttpState};
use wikibot_server::pipeline::Pipeline;
use wikibot_server::session;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "wikibot.toml")]
    config: String,

    /// Check database connectivity and pgvector, then exit
    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience — production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config
    let config = match WikibotConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Init logging
    let default_level = config
        .service
        .log_level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::INFO);
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(default_level.into()))
        .init();

    let connector = match Connector::from_config(&config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to set up database credentials: {}", e);
            std::process::exit(1);
        }
    };

    if args.health {
        let mut conn = match connector.connect().await {
            Ok(c) => c,
            Err(e) => {
                println!("❌ PostgreSQL connection failed: {}", e);
                std::process::exit(1);
            }
        };

        match wikibot_core::db::health_check(&mut conn).await {
            Ok(v) => println!("✅ PostgreSQL connected: {}", v),
            Err(e) => {
                println!("❌ PostgreSQL query failed: {}", e);
                std::process::exit(1);
            }
        }

        match wikibot_core::db::check_pgvector(&mut conn).await {
            Ok(v) => println!("✅ pgvector version: {}", v),
            Err(e) => {
                println!("❌ pgvector check failed: {}", e);
                std::process::exit(1);
            }
        }

        println!("✅ wikibot DB health check passed");
        return Ok(());
    }

    let pipeline = Pipeline::from_config(&config, connector.clone())?;
    let state = Arc::new(HttpState::new(pipeline, Some(connector)));

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    tokio::spawn(session::run_eviction_loop(
        state.sessions.clone(),
        config.http.session_idle_seconds,
        tx.subscribe(),
    ));

    let addr = format!("{}:{}", config.http.host, config.http.port);
    http::start_http_server(state, addr, tx.subscribe()).await?;

    Ok(())
}
