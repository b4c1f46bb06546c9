use axum::{extract::State, Json};
use serde::Serialize;

use crate::http::server::AppState;

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub groups: usize,
}

#[derive(Debug, Serialize)]
pub struct EndpointStatus {
    pub index: usize,
    pub url: String,
    pub timeout_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct GroupStatus {
    pub name: String,
    pub path_prefix: String,
    /// Endpoint the next dispatch starts at.
    pub cursor: usize,
    pub endpoints: Vec<EndpointStatus>,
    pub failover_codes: Vec<u16>,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        groups: state.inner.load().router.len(),
    })
}

pub async fn get_groups(State(state): State<AppState>) -> Json<Vec<GroupStatus>> {
    let inner = state.inner.load_full();

    let groups = inner
        .router
        .routes()
        .iter()
        .map(|route| GroupStatus {
            name: route.group.name().to_string(),
            path_prefix: route.path_prefix.clone(),
            cursor: route.group.last_succeeded_index(),
            endpoints: route
                .group
                .endpoints()
                .iter()
                .enumerate()
                .map(|(index, e)| EndpointStatus {
                    index,
                    url: e.url().to_string(),
                    timeout_ms: e.timeout().as_millis() as u64,
                })
                .collect(),
            failover_codes: route.group.failure_codes().as_u16s(),
        })
        .collect();

    Json(groups)
}
