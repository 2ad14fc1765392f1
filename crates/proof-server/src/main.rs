//! HTTP API server for Block Qualified grading and proof generation.

use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod handlers;
mod routes;

use config::{LoggingConfig, ServerConfig};
use qualified_circuits::{CircuitShape, Grader, PoseidonHasher};
use qualified_prover::{setup_all_circuits, CircuitKeys, Groth16Oracle};

/// Application state shared across handlers
pub struct AppState {
    pub hasher: PoseidonHasher,
    pub grader: Grader,
    pub shape: CircuitShape,
    pub oracle: Groth16Oracle,
}

impl AppState {
    pub fn new(hasher: PoseidonHasher, keys: CircuitKeys) -> Self {
        let shape = keys.shape;
        Self {
            grader: Grader::new(hasher.clone(), shape.test_height),
            shape,
            oracle: Groth16Oracle::new(Arc::new(keys)),
            hasher,
        }
    }
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

fn init_logging(logging: &LoggingConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let subscriber = tracing_subscriber::registry().with(env_filter);

    if logging.json {
        subscriber.with(fmt::layer().json()).init();
    } else {
        subscriber.with(fmt::layer()).init();
    }
}

fn load_keys(config: &ServerConfig, hasher: &PoseidonHasher) -> Result<CircuitKeys, Box<dyn Error>> {
    let shape = CircuitShape::from(config.shape);
    let keys_dir = config.keys_dir.as_path();

    if keys_dir.join("shape.json").exists() {
        info!(?keys_dir, "Loading existing circuit keys");
        return Ok(CircuitKeys::load_for_shape(keys_dir, shape)?);
    }

    info!(?shape, "Running trusted setup (this may take a while)");
    let keys = setup_all_circuits(hasher, shape)?;
    keys.save_to_directory(keys_dir)?;
    info!(?keys_dir, "Circuit keys saved");
    Ok(keys)
}

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = ServerConfig::load()?;
    init_logging(&config.logging);

    info!("Starting Block Qualified proof server");

    let hasher = PoseidonHasher::new();
    let keys = load_keys(&config, &hasher)?;
    let state = Arc::new(AppState::new(hasher, keys));

    let addr = SocketAddr::new(config.bind_address, config.port);
    info!(%addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state)).await?;
    Ok(())
}
