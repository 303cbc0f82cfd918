use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use authgate::core::auth::{
    AuthApiState, AuthService, JwtService, PasswordHasher, auth_api_router,
};
use authgate::core::config::Config;
use authgate::core::db::{PgIdentityStore, create_pool_with_migrations};
use authgate::core::deadline::within;
use authgate::core::kv::{KeyValueStore, MemoryStore, RedisStore};
use authgate::core::notify::{BrevoSender, DisabledSender, NotificationSender};
use authgate::core::rate_limiter::RateLimiter;
use authgate::core::session::SessionStore;
use tracing_subscriber::EnvFilter;

/// How often the in-process store drops expired keys
const MEMORY_PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file (if exists)
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().context("Invalid configuration")?;

    // Log config status (without revealing secrets)
    tracing::info!(
        bind_addr = %config.bind_addr,
        email = config.has_email(),
        rotate_refresh_tokens = config.rotate_refresh_tokens,
        trust_forwarded_for = config.trust_forwarded_for,
        previous_jwt_keys = config.jwt.previous_keys.len(),
        "Config loaded"
    );

    let kv: Arc<dyn KeyValueStore> = if config.uses_memory_kv() {
        tracing::warn!("Using in-process key-value store, sessions do not survive a restart");
        let memory = MemoryStore::new();
        memory.spawn_purge_task(MEMORY_PURGE_INTERVAL);
        Arc::new(memory)
    } else {
        let redis = RedisStore::connect(&config.redis_url)
            .await
            .context("Redis connection failed")?;
        within(config.backend_timeout, redis.ping())
            .await
            .context("Redis ping failed")?;
        Arc::new(redis)
    };

    let pool = create_pool_with_migrations(&config.db_config())
        .await
        .context("Database setup failed")?;

    let sender: Arc<dyn NotificationSender> = match &config.brevo {
        Some(brevo) => Arc::new(BrevoSender::new(brevo.clone()).timeout(config.backend_timeout)),
        None => {
            tracing::warn!("BREVO_API_KEY not set, password reset emails are disabled");
            Arc::new(DisabledSender)
        }
    };

    let hasher = PasswordHasher::new(config.bcrypt_cost).context("Invalid bcrypt cost")?;

    let jwt_service = JwtService::new(config.jwt.clone());
    tracing::info!(kid = jwt_service.active_key_id(), "JWT signing key loaded");

    let auth_service = AuthService::new(
        Arc::new(PgIdentityStore::new(pool).timeout(config.backend_timeout)),
        SessionStore::new(Arc::clone(&kv)).timeout(config.backend_timeout),
        jwt_service,
        hasher,
        sender,
    )
    .timeout(config.backend_timeout)
    .rotate_refresh_tokens(config.rotate_refresh_tokens)
    .public_base_url(config.public_base_url.clone());

    let app = auth_api_router(AuthApiState {
        auth_service,
        rate_limiter: RateLimiter::new(kv).timeout(config.backend_timeout),
        rate_limits: config.rate_limits,
        trust_forwarded_for: config.trust_forwarded_for,
    });

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    tracing::info!("listening on http://{}", config.bind_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
