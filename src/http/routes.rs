//! Routes served by the API listener.
//!
//! Only liveness lives here; application handlers are mounted by the caller.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::lifecycle::startup::BuildInfo;

#[derive(Debug, Serialize)]
pub struct Liveness {
    pub status: &'static str,
    pub build: String,
    pub desc: String,
}

/// Router with the liveness probe at `/v1/liveness`.
pub fn api_routes(build: BuildInfo) -> Router {
    Router::new()
        .route("/v1/liveness", get(liveness))
        .with_state(build)
}

pub async fn liveness(State(build): State<BuildInfo>) -> Json<Liveness> {
    Json(Liveness {
        status: "up",
        build: build.build,
        desc: build.desc,
    })
}
