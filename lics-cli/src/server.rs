use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::trace::TraceLayer;

use lics_core::config::ServerConfig;
use lics_core::infrastructure::QuotaSource;
use lics_core::infrastructure_http::HttpQuotaSource;
use lics_core::infrastructure_in_memory::StaticQuotaSource;
use lics_core::protocol::*;
use lics_core::reconciler::Reconciler;
use lics_core::service::LicenseService;
use lics_core::transport_http::{AUTH_PATH, CREATE_PATH, HEARTBEAT_PATH, QUERY_PATH, RELEASE_PATH};
use lics_core::types::{AlgorithmId, TaskClass};

use crate::handlers::*;

pub type AppState = Arc<LicenseService>;

pub struct ServeOptions {
    pub host: String,
    pub port: u16,
    pub catalogue: Vec<(AlgorithmId, TaskClass)>,
    pub quota: Vec<(AlgorithmId, u32)>,
    pub quota_url: Option<String>,
    pub reconcile_interval: Duration,
    pub max_inflight: usize,
}

pub async fn run(opts: ServeOptions) {
    let config = ServerConfig {
        reconcile_interval: opts.reconcile_interval,
        ..ServerConfig::new(opts.catalogue)
    };
    if config.catalogue.is_empty() {
        tracing::warn!(
            "No --algorithm entries given; every request will answer ALGORITHM_NOT_EXIST"
        );
    }

    let service: AppState = match LicenseService::from_config(&config) {
        Ok(service) => Arc::new(service),
        Err(e) => {
            tracing::error!(error = %e, "Invalid algorithm catalogue");
            std::process::exit(2);
        }
    };

    let quota = create_quota_source(opts.quota_url.as_deref(), opts.quota);
    let reconciler = Reconciler::new(Arc::clone(&service), quota, config.reconcile_interval)
        .spawn()
        .expect("Failed to start reconciler thread");

    let app = router(Arc::clone(&service), opts.max_inflight);
    let addr = format!("{}:{}", opts.host, opts.port);
    tracing::info!(
        algorithms = config.catalogue.len(),
        reconcile_interval_secs = config.reconcile_interval.as_secs(),
        "License server starting on http://{}",
        addr
    );

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // Joining the reconciler blocks for up to one queue wait
    if tokio::task::spawn_blocking(move || reconciler.stop()).await.is_err() {
        tracing::warn!("Reconciler did not shut down cleanly");
    }
    tracing::info!("License server stopped");
}

pub fn router(state: AppState, max_inflight: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/pools", get(list_pools))
        .route(AUTH_PATH, post(authenticate))
        .route(CREATE_PATH, post(create_license))
        .route(RELEASE_PATH, post(delete_license))
        .route(HEARTBEAT_PATH, post(heartbeat))
        .route(QUERY_PATH, post(query_license))
        .layer(GlobalConcurrencyLimitLayer::new(max_inflight.max(1)))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

// ─── Operator Handlers ──────────────────────────────────────────────────────

async fn health(State(state): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    let snapshot = state.snapshot();
    Json(ApiResponse::ok(HealthResponse {
        status: "ok".to_string(),
        client_count: snapshot.client_count,
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

async fn list_pools(State(state): State<AppState>) -> Json<ApiResponse<PoolsResponse>> {
    let snapshot = state.snapshot();
    Json(ApiResponse::ok(PoolsResponse {
        client_count: snapshot.client_count,
        pools: snapshot.pools.iter().map(PoolInfo::from).collect(),
    }))
}

// ─── RPC Handlers ───────────────────────────────────────────────────────────

async fn authenticate(
    State(state): State<AppState>,
    Json(req): Json<AuthenticateRequest>,
) -> Json<AuthenticateResponse> {
    Json(state.authenticate(&req))
}

async fn create_license(
    State(state): State<AppState>,
    Json(req): Json<CreateLicenseRequest>,
) -> Json<CreateLicenseResponse> {
    let resp = state.create_license(&req);
    if resp.granted_count < req.expected_count && resp.status.is_ok() {
        tracing::info!(
            token = req.token,
            algorithm_id = req.algorithm_id,
            expected = req.expected_count,
            granted = resp.granted_count,
            "Partial grant"
        );
    }
    Json(resp)
}

async fn delete_license(
    State(state): State<AppState>,
    Json(req): Json<DeleteLicenseRequest>,
) -> Json<DeleteLicenseResponse> {
    Json(state.delete_license(&req))
}

async fn heartbeat(
    State(state): State<AppState>,
    Json(req): Json<HeartbeatRequest>,
) -> Json<HeartbeatResponse> {
    Json(state.heartbeat(&req))
}

async fn query_license(
    State(state): State<AppState>,
    Json(req): Json<QueryLicenseRequest>,
) -> Json<QueryLicenseResponse> {
    Json(state.query_license(&req))
}

// ─── Quota Source Selection ─────────────────────────────────────────────────

fn create_quota_source(
    quota_url: Option<&str>,
    quota: Vec<(AlgorithmId, u32)>,
) -> Box<dyn QuotaSource> {
    match quota_url {
        Some(url) => {
            if !quota.is_empty() {
                tracing::warn!("--quota entries are ignored when a quota URL is set");
            }
            tracing::info!(url, "Quota source: HTTP");
            Box::new(HttpQuotaSource::new(url, Duration::from_secs(5)))
        }
        None => {
            tracing::info!(entries = quota.len(), "Quota source: static");
            Box::new(StaticQuotaSource::with_totals(quota))
        }
    }
}
