//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! The edge serves the built web client from `SITE_DIR` and nothing else.
//! Every request passes through the route guard first; unknown paths fall
//! back to `index.html` so client-side routes resolve after the guard has
//! made its decision.

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

use std::sync::Arc;

use axum::Router;
use axum::http::StatusCode;
use axum::middleware;
use axum::routing::get;
use credential::RouteTable;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::config::GuardConfig;
use crate::guard::{self, Guard};

pub fn app(config: &GuardConfig) -> Router {
    let guard_state = Arc::new(Guard::new(config, RouteTable::camply()));

    let site = ServeDir::new(&config.site_dir)
        .append_index_html_on_directories(true)
        .fallback(ServeFile::new(config.site_dir.join("index.html")));

    Router::new()
        .route("/healthz", get(healthz))
        .fallback_service(site)
        .layer(middleware::from_fn_with_state(guard_state, guard::guard))
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
