use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use diesel_async::{
    async_connection_wrapper::AsyncConnectionWrapper,
    pooled_connection::{deadpool::Pool, AsyncDieselConnectionManager},
    AsyncConnection, AsyncPgConnection,
};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tracing_subscriber::EnvFilter;

use crate::{
    blob::LocalBlobStore,
    catalog::palette::{Palette, RandomPalette},
    i18n::{StaticTranslator, Translator},
};

mod blob;
mod catalog;
mod error;
mod i18n;
mod models;
mod pagination;
mod routes;
mod schema;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

type State = axum::extract::State<Arc<AppState>>;

#[derive(serde::Serialize, serde::Deserialize, Debug)]
struct AuthConfig {
    header: String,
    #[serde(default)]
    admin: Vec<String>,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Default)]
struct DebugConfig {
    #[serde(default)]
    assume_user: Option<String>,
}

fn default_pool_size() -> usize {
    16
}

#[derive(serde::Serialize, serde::Deserialize, Debug)]
struct DatabaseConfig {
    url: String,
    #[serde(default = "default_pool_size")]
    pool_size: usize,
}

#[derive(serde::Serialize, serde::Deserialize, Debug)]
struct ServerConfig {
    port: u16,
}

#[derive(serde::Serialize, serde::Deserialize, Debug)]
struct StorageConfig {
    root: PathBuf,
    public_url: String,
}

#[derive(serde::Serialize, serde::Deserialize, Debug)]
struct Config {
    #[serde(default)]
    debug: DebugConfig,
    auth: AuthConfig,
    database: DatabaseConfig,
    server: ServerConfig,
    storage: StorageConfig,
}

struct AppState {
    config: Config,
    db: Pool<AsyncPgConnection>,
    blobs: LocalBlobStore,
    palette: Box<dyn Palette>,
    translator: Box<dyn Translator>,
}

/// Applies pending migrations on the database at `url`.
pub(crate) async fn run_migrations(url: &str) -> anyhow::Result<()> {
    let conn = AsyncPgConnection::establish(url)
        .await
        .with_context(|| format!("While connecting to the database at {url}"))?;
    let mut wrapper: AsyncConnectionWrapper<AsyncPgConnection> = AsyncConnectionWrapper::from(conn);

    tokio::task::spawn_blocking(move || {
        wrapper
            .run_pending_migrations(MIGRATIONS)
            .map(|applied| applied.len())
            .map_err(|e| anyhow::anyhow!("Could not run migrations: {e}"))
    })
    .await
    .with_context(|| "Migration task panicked")?
    .map(|applied| tracing::info!("Applied {applied} migrations"))
}

fn load_config() -> anyhow::Result<Config> {
    let mut args = std::env::args();
    args.next();

    let path = match args.next() {
        Some(arg) => arg,
        None => std::env::var("LECTERN_CONFIG")
            .with_context(|| "No configuration was supplied")?,
    };

    toml::from_str(
        &std::fs::read_to_string(&path)
            .with_context(|| format!("Could not load the configuration file '{path}'"))?,
    )
    .with_context(|| "Could not parse the configuration file")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = load_config()?;

    run_migrations(&cfg.database.url).await?;

    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(&cfg.database.url);
    let db = Pool::builder(manager)
        .max_size(cfg.database.pool_size)
        .build()
        .with_context(|| "Could not create the database pool")?;

    let blobs = LocalBlobStore::provision(&cfg.storage.root, &cfg.storage.public_url)
        .await
        .with_context(|| format!("Could not provision storage in {}", cfg.storage.root.display()))?;

    let port = cfg.server.port;

    let state = Arc::new(AppState {
        config: cfg,
        db,
        blobs,
        palette: Box::new(RandomPalette),
        translator: Box::new(StaticTranslator::default()),
    });

    let app = routes::router(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .with_context(|| "Could not create TCP Listener")?;

    tracing::info!("Listening on port {port}");

    axum::serve(listener, app).await?;

    Ok(())
}
