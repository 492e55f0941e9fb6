//! Router construction and server host for the API.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    Router,
    http::{HeaderName, Method, header::CONTENT_TYPE},
    middleware,
    routing::{MethodRouter, delete, get, patch, post},
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};

use crate::http::auth::{require_capability, require_capability_and_token};
use crate::http::bootstrap::get_bootstrap;
use crate::http::constants::{HEADER_NONCE, HEADER_REQUEST_ID, HEADER_USER};
use crate::http::health::{health, metrics};
use crate::http::layers::{propagate_request_id_layer, set_request_id_layer, trace_layer};
use crate::http::logs::{clear_logs, get_logs};
use crate::http::sample::{get_sample, update_sample};
use crate::http::settings::{get_settings, get_settings_schema, update_settings};
use crate::http::telemetry::RouteMetricsLayer;
use crate::state::{ApiDependencies, ApiState};

type StateRoute = MethodRouter<Arc<ApiState>>;

/// Axum router wrapper that hosts the Plinth API.
pub struct ApiServer {
    router: Router,
}

impl ApiServer {
    /// Build the server from its collaborators.
    #[must_use]
    pub fn new(dependencies: ApiDependencies) -> Self {
        Self::with_state(Arc::new(ApiState::new(dependencies)))
    }

    /// Build the server around existing shared state.
    #[must_use]
    pub fn with_state(state: Arc<ApiState>) -> Self {
        let cors_layer = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([
                CONTENT_TYPE,
                HeaderName::from_static(HEADER_USER),
                HeaderName::from_static(HEADER_NONCE),
                HeaderName::from_static(HEADER_REQUEST_ID),
            ]);
        let layered = ServiceBuilder::new()
            .layer(propagate_request_id_layer())
            .layer(set_request_id_layer())
            .layer(trace_layer())
            .layer(RouteMetricsLayer::new(state.telemetry.clone()));

        let router = Self::public_routes()
            .nest(&state.route_base(), Self::v1_routes(&state))
            .layer(cors_layer)
            .route_layer(layered)
            .with_state(state);

        Self { router }
    }

    fn public_routes() -> Router<Arc<ApiState>> {
        Router::new()
            .route("/health", get(health))
            .route("/metrics", get(metrics))
    }

    fn v1_routes(state: &Arc<ApiState>) -> Router<Arc<ApiState>> {
        let read = || middleware::from_fn_with_state(state.clone(), require_capability);
        let write = || middleware::from_fn_with_state(state.clone(), require_capability_and_token);

        let settings_write: StateRoute = patch(update_settings)
            .post(update_settings)
            .put(update_settings)
            .route_layer(write());

        Router::new()
            .route(
                "/settings",
                get(get_settings).route_layer(read()).merge(settings_write),
            )
            .route(
                "/settings/schema",
                get(get_settings_schema).route_layer(read()),
            )
            .route(
                "/logs",
                get(get_logs)
                    .route_layer(read())
                    .merge(delete(clear_logs).route_layer(write())),
            )
            .route(
                "/sample",
                get(get_sample)
                    .route_layer(read())
                    .merge(post(update_sample).route_layer(write())),
            )
            .route("/bootstrap", get(get_bootstrap).route_layer(read()))
    }

    /// Serve the API using the configured router on the supplied address.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener fails to bind or the server terminates unexpectedly.
    pub async fn serve(self, addr: SocketAddr) -> Result<()> {
        tracing::info!("Starting API on {}", addr);
        let listener = TcpListener::bind(addr).await?;
        axum::serve(listener, self.router.into_make_service()).await?;
        Ok(())
    }

    /// Underlying router, for in-process requests.
    #[must_use]
    pub fn into_router(self) -> Router {
        self.router
    }
}
