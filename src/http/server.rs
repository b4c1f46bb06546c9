//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the catch-all failover handler
//! - Wire up middleware (request ID, tracing, whole-request timeout)
//! - Swap routing state on config reload
//! - Run the optional admin listener
//! - Serve until the shutdown broadcast fires

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::{DefaultBodyLimit, State},
    http::Request,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::Instrument;

use crate::admin::setup_admin_router;
use crate::config::FailoverConfig;
use crate::failover::{FailoverDispatcher, GroupError, HyperTransport, Transport};
use crate::http::request::{
    envelope_from_parts, propagate_request_id_layer, read_body, request_id, set_request_id_layer,
};
use crate::http::response::{relay, ProxyError};
use crate::observability::metrics;
use crate::routing::GroupRouter;

/// Snapshot swapped atomically on reload.
pub struct InnerState {
    pub config: FailoverConfig,
    pub router: GroupRouter,
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub inner: Arc<ArcSwap<InnerState>>,
    pub dispatcher: Arc<FailoverDispatcher>,
}

impl AppState {
    pub fn new(config: FailoverConfig, dispatcher: FailoverDispatcher) -> Result<Self, GroupError> {
        let router = GroupRouter::from_config(&config, None)?;
        Ok(Self {
            inner: Arc::new(ArcSwap::from_pointee(InnerState { config, router })),
            dispatcher: Arc::new(dispatcher),
        })
    }

    /// Replace the running configuration. Unchanged groups keep their cursor.
    ///
    /// On error the current state stays active.
    pub fn apply_config(&self, config: FailoverConfig) -> Result<(), GroupError> {
        let current = self.inner.load();
        let router = GroupRouter::from_config(&config, Some(&current.router))?;
        self.inner.store(Arc::new(InnerState { config, router }));
        Ok(())
    }
}

/// HTTP server for the failover proxy.
pub struct HttpServer {
    router: Router,
    config: FailoverConfig,
    state: AppState,
}

impl HttpServer {
    /// Create a server forwarding over the bundled hyper client.
    pub fn new(config: FailoverConfig) -> Result<Self, GroupError> {
        let transport = Arc::new(HyperTransport::from_config(&config.timeouts));
        Self::with_transport(config, transport)
    }

    /// Create a server forwarding over `transport`.
    pub fn with_transport(config: FailoverConfig, transport: Arc<dyn Transport>) -> Result<Self, GroupError> {
        let state = AppState::new(config.clone(), FailoverDispatcher::new(transport))?;
        let router = Self::build_router(&config, state.clone());
        Ok(Self { router, config, state })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &FailoverConfig, state: AppState) -> Router {
        Router::new()
            .route("/", any(failover_handler))
            .route("/{*path}", any(failover_handler))
            .with_state(state)
            .layer(DefaultBodyLimit::disable())
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }

    /// Run the server until `shutdown` fires.
    ///
    /// Configs received on `config_updates` replace the running state.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<FailoverConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            groups = self.state.inner.load().router.len(),
            "HTTP server starting"
        );

        let reload_state = self.state.clone();
        tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                match reload_state.apply_config(config) {
                    Ok(()) => tracing::info!(
                        groups = reload_state.inner.load().router.len(),
                        "Configuration reloaded"
                    ),
                    Err(e) => tracing::error!(error = %e, "Rejected reloaded configuration"),
                }
            }
        });

        if self.config.admin.enabled {
            let admin_listener = TcpListener::bind(&self.config.admin.bind_address).await?;
            let admin_app = setup_admin_router(self.state.clone());
            let mut admin_shutdown = shutdown.resubscribe();
            tracing::info!(address = %self.config.admin.bind_address, "Admin API listening");

            tokio::spawn(async move {
                let served = axum::serve(admin_listener, admin_app)
                    .with_graceful_shutdown(async move {
                        let _ = admin_shutdown.recv().await;
                    })
                    .await;
                if let Err(e) = served {
                    tracing::error!(error = %e, "Admin API stopped with error");
                }
            });
        }

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &FailoverConfig {
        &self.config
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }
}

/// Catch-all handler: route, buffer, dispatch, relay.
async fn failover_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let inner = state.inner.load_full();
    let request_id = request_id(request.headers()).to_string();

    let Some(route) = inner.router.match_request(&request) else {
        tracing::warn!(request_id = %request_id, path = %request.uri().path(), "No failover group matched");
        metrics::record_request("none", 404, start);
        return ProxyError::NoRoute.into_response();
    };

    let group = route.group.clone();
    let remainder = route.remainder(request.uri().path());
    let span = tracing::info_span!("failover", request_id = %request_id, group = %group.name());

    let result = async {
        tracing::debug!(method = %request.method(), remainder = %remainder, "Dispatching request");

        let (parts, body) = request.into_parts();
        let bytes = read_body(body, &parts.headers, inner.config.limits.max_body_bytes).await?;
        let envelope = envelope_from_parts(&parts, &remainder, bytes)?;
        let dispatched = state.dispatcher.dispatch(&group, &envelope).await?;

        tracing::info!(
            start_index = dispatched.start_index,
            endpoint_index = dispatched.endpoint_index,
            attempts = dispatched.attempts,
            status = %dispatched.response.status(),
            "Relaying endpoint response"
        );
        Ok::<_, ProxyError>(relay(dispatched))
    }
    .instrument(span.clone())
    .await;

    let response = match result {
        Ok(response) => response,
        Err(e) => {
            span.in_scope(|| match &e {
                ProxyError::Exhausted(failure) => tracing::error!(attempts = failure.attempts, error = %e, "Failover exhausted"),
                _ => tracing::warn!(error = %e, "Rejected request"),
            });
            e.into_response()
        }
    };

    metrics::record_request(group.name(), response.status().as_u16(), start);
    response
}
