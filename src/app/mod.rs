pub mod auth;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::apogee::ApogeeEstimator;
use crate::catalog::Catalog;

/// Process-wide handles, built once at startup and cloned into handlers.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<Catalog>,
    pub apogee: Option<Arc<dyn ApogeeEstimator>>,
    pub secret: Arc<str>,
}

impl AppState {
    pub fn new(catalog: Arc<Catalog>, secret: impl Into<Arc<str>>) -> Self {
        Self {
            catalog,
            apogee: None,
            secret: secret.into(),
        }
    }

    pub fn with_apogee(mut self, estimator: Arc<dyn ApogeeEstimator>) -> Self {
        self.apogee = Some(estimator);
        self
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok\n" }))
        .route("/login", get(auth::login_form).post(auth::login))
        .route(
            "/records",
            get(routes::list_records).post(routes::create_record),
        )
        .route("/records/refresh", post(routes::refresh_records))
        .route("/records/summary", get(routes::summary))
        .route("/records/tags/:facet", get(routes::tag_counts))
        .route(
            "/records/:id",
            get(routes::get_record)
                .put(routes::update_record)
                .delete(routes::delete_record),
        )
        .route("/ai/apogee", post(routes::estimate_apogee))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth::require_token,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
