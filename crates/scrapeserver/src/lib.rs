//! HTTP surface of the scrape engine
//!
//! Every `/api` route except the event stream identifies the caller by the
//! `X-User-Id` header.

mod config;
mod error;
mod handlers;

pub use config::ServerConfig;
pub use error::ApiError;
pub use handlers::{CreateWorkflowRequest, RunRequest, RunResponse};

use actix_web::dev::Payload;
use actix_web::{web, FromRequest, HttpRequest};
use scraperuntime::ScrapeRuntime;
use std::future::{ready, Ready};
use std::sync::Arc;

pub const USER_HEADER: &str = "X-User-Id";

/// Application state shared across handlers
pub struct AppState {
    pub runtime: Arc<ScrapeRuntime>,
}

/// Caller identity taken from the `X-User-Id` header.
#[derive(Debug, Clone)]
pub struct UserId(pub String);

impl FromRequest for UserId {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let user = req
            .headers()
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| UserId(v.to_string()));
        ready(user.ok_or(ApiError::MissingUser))
    }
}

/// Register every route on an actix `App`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(handlers::health_check)
        .service(handlers::list_tasks)
        .service(handlers::create_workflow)
        .service(handlers::get_workflow)
        .service(handlers::list_executions)
        .service(handlers::plan_workflow)
        .service(handlers::run_workflow)
        .service(handlers::get_execution)
        .service(handlers::stop_execution)
        .service(handlers::get_phase)
        .service(handlers::websocket_events);
}
