use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::health::state::HealthState;
use crate::http::server::AppState;
use crate::observability::stats::StatsSnapshot;
use crate::security::rate_limit::LimiterSnapshot;

const DEFAULT_RECENT: usize = 20;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub mode: String,
    pub status: &'static str,
    pub uptime_secs: u64,
    pub composed_subgraphs: Vec<String>,
    pub admission_stages: Vec<&'static str>,
}

#[derive(Serialize)]
pub struct SubgraphStatus {
    pub name: String,
    pub url: String,
    pub reachable: bool,
    pub state: &'static str,
    pub consecutive_failures: u32,
    pub composed: bool,
    pub root_fields: usize,
}

#[derive(Deserialize)]
pub struct StatsQuery {
    pub recent: Option<usize>,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let supergraph = state.registry.supergraph();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        mode: state.security.mode.to_string(),
        status: supergraph.mode.status(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        composed_subgraphs: supergraph.members.clone(),
        admission_stages: state.admission.stage_names(),
    })
}

pub async fn get_subgraphs(State(state): State<AppState>) -> Json<Vec<SubgraphStatus>> {
    let supergraph = state.registry.supergraph();
    let statuses = state
        .registry
        .subgraphs()
        .iter()
        .map(|s| SubgraphStatus {
            name: s.name.clone(),
            url: s.url.clone(),
            reachable: s.health.is_reachable(),
            state: match s.health.state() {
                HealthState::Unknown => "unknown",
                HealthState::Reachable => "reachable",
                HealthState::Unreachable => "unreachable",
            },
            consecutive_failures: s.health.consecutive_failures(),
            composed: supergraph.members.contains(&s.name),
            root_fields: supergraph.root_field_count(&s.name),
        })
        .collect();
    Json(statuses)
}

pub async fn get_stats(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> Json<StatsSnapshot> {
    Json(state.stats.snapshot(query.recent.unwrap_or(DEFAULT_RECENT)))
}

pub async fn get_limiter(State(state): State<AppState>) -> Json<LimiterSnapshot> {
    Json(state.limiter.snapshot())
}
