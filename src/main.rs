use ledger::{
    app,
    auth::repo::PgUserStore,
    config::AppConfig,
    db,
    state::AppState,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;

    let default_filter = if config.env.is_prod() {
        "ledger=info,tower_http=info"
    } else {
        "ledger=debug,tower_http=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let json_logs = config.env.is_prod()
        || std::env::var("LOG_FORMAT")
            .map(|v| v == "json")
            .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let pool = db::connect(&config).await?;
    db::migrate(&pool).await?;

    if config.seed_users {
        let users = PgUserStore::new(pool.clone(), config.request_timeout);
        db::ensure_seed_users(&users).await?;
    }

    let addr = config.http_addr.clone();
    tracing::info!(env = ?config.env, %addr, "starting ledger");
    let router = app::build_app(AppState::new(pool, config));
    app::serve(router, &addr).await
}
