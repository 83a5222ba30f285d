//! Typedrill API server binary.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use typedrill_api::config::ApiConfig;
use typedrill_core::auth::jwt::{TokenCodec, TokenConfig, resolve_jwt_secret};
use typedrill_core::auth::workflow::AuthenticationWorkflow;
use typedrill_core::store::postgres::{PgRefreshTokenStore, PgUserRepository};
use typedrill_core::store::{RefreshTokenStore, UserRepository};

/// CLI arguments for the API server.
#[derive(Parser, Debug)]
#[command(name = "typedrill_server", about = "Typedrill API server")]
struct Args {
    /// Address to bind the HTTP listener.
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:3200")]
    bind_addr: String,

    /// PostgreSQL connection URL.
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "postgres://localhost:5432/typedrill"
    )]
    database_url: String,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,

    /// Seconds between sweeps of expired refresh-token rows.
    #[arg(long, default_value_t = 3600)]
    token_sweep_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "info,typedrill_api=debug,typedrill_core=debug".parse().unwrap()
            }),
        )
        .init();

    let args = Args::parse();

    info!(database_url = %args.database_url, bind_addr = %args.bind_addr, "starting typedrill_server");

    let pool = PgPoolOptions::new()
        .max_connections(args.max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&args.database_url)
        .await?;

    info!("running database migrations");
    typedrill_api::migrate(&pool).await?;

    let config = ApiConfig {
        bind_addr: args.bind_addr,
        database_url: args.database_url,
        jwt_secret: resolve_jwt_secret(),
    };

    let codec = Arc::new(TokenCodec::new(TokenConfig::new(config.jwt_secret.clone())));
    let users = Arc::new(PgUserRepository::new(pool.clone()));
    let tokens = Arc::new(PgRefreshTokenStore::new(pool.clone()));
    let auth = Arc::new(AuthenticationWorkflow::new(
        users as Arc<dyn UserRepository>,
        tokens as Arc<dyn RefreshTokenStore>,
        Arc::clone(&codec),
    ));

    // Periodic sweep of expired refresh-token rows.
    tokio::spawn({
        let auth = Arc::clone(&auth);
        let period = Duration::from_secs(args.token_sweep_secs);
        async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately; skip it.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match auth.delete_expired_tokens().await {
                    Ok(deleted) if deleted > 0 => {
                        info!(deleted, "swept expired refresh tokens");
                    }
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "expired-token sweep failed"),
                }
            }
        }
    });

    let state = typedrill_api::AppState {
        auth,
        codec,
        config: config.clone(),
    };
    let app = typedrill_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    axum::serve(listener, app).await?;

    Ok(())
}
