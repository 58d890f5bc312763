//! # LMS Backend
//!
//! Proxy server in front of the external LMS REST backend. It exposes the
//! guardian-student routes under `/api`, forwards them upstream and reshapes
//! relation lists into the children view model the client renders.
//!
//! ## Architecture
//!
//! ```text
//! Browser client
//!     ↓
//! IO Layer (REST handlers)
//!     ↓
//! Upstream client (external REST backend)
//! ```

pub mod config;
pub mod error;
pub mod io;
pub mod upstream;

use anyhow::Result;
use axum::{
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use shared::ChildMapper;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};

pub use config::BackendConfig;
pub use error::ProxyError;
pub use upstream::UpstreamClient;

use io::rest::guardian_student_apis;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<BackendConfig>,
    pub upstream: UpstreamClient,
    pub mapper: ChildMapper,
}

/// Build the application state from configuration
pub fn initialize_backend(config: BackendConfig) -> Result<AppState> {
    let config = Arc::new(config);

    info!("Setting up upstream client for {}", config.backend_url);
    let upstream = UpstreamClient::new(config.clone())?;

    info!("Setting up child mapper");
    let mapper = ChildMapper::default().with_image_base_url(config.image_base_url.clone());

    Ok(AppState {
        config,
        upstream,
        mapper,
    })
}

fn cors_layer(config: &BackendConfig) -> CorsLayer {
    let origin = match config.allowed_origin.as_deref().map(str::parse::<HeaderValue>) {
        Some(Ok(origin)) => AllowOrigin::exact(origin),
        Some(Err(e)) => {
            warn!("Ignoring invalid allowed_origin: {}", e);
            AllowOrigin::any()
        }
        None => AllowOrigin::any(),
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
}

/// Create the Axum router with all routes configured
pub fn create_router(app_state: AppState) -> Router {
    let cors = cors_layer(&app_state.config);

    let api_routes = Router::new()
        .route(
            "/guardian-student",
            post(guardian_student_apis::create_guardian_student_relation),
        )
        .route(
            "/guardian-student/guardian/:guardian_id",
            get(guardian_student_apis::get_guardian_children),
        );

    Router::new()
        .nest("/api", api_routes)
        .layer(cors)
        .with_state(app_state)
}
