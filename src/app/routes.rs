use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use super::AppState;
use crate::apogee::ApogeeRequest;
use crate::catalog::CatalogError;
use crate::filter::{Facet, SearchQuery};
use crate::model::RecordInput;

/// `{"success": false, "message": ...}` with a status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        match &err {
            CatalogError::SourceUnreachable { cause, .. } => {
                tracing::warn!(?cause, "source unreachable");
            }
            CatalogError::Store(inner) => {
                tracing::error!(err = ?inner, "catalog store failure");
            }
        }
        Self::internal(err.to_string())
    }
}

/// Undecodable bodies fail like any other mutation.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::warn!(status = %rejection.status(), "rejected request body");
        Self::internal(format!("invalid request body: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: format!("invalid query: {}", rejection.body_text()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({ "success": false, "message": self.message })),
        )
            .into_response()
    }
}

type ApiResult = Result<Response, ApiError>;

pub async fn list_records(
    State(state): State<AppState>,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> ApiResult {
    let Query(query) = query?;
    let records = state.catalog.search(&query).await?;
    Ok(Json(records).into_response())
}

pub async fn get_record(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    let record = state.catalog.get(&id).await?;
    Ok(Json(json!({ "success": record.is_some(), "record": record })).into_response())
}

pub async fn create_record(
    State(state): State<AppState>,
    input: Result<Json<RecordInput>, JsonRejection>,
) -> ApiResult {
    let Json(input) = input?;
    let record = state.catalog.create(input).await?;
    Ok(Json(json!({ "success": true, "record": record })).into_response())
}

pub async fn update_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
    input: Result<Json<RecordInput>, JsonRejection>,
) -> ApiResult {
    let Json(input) = input?;
    let record = state.catalog.update(&id, input).await?;
    Ok(Json(json!({ "success": true, "record": record })).into_response())
}

pub async fn delete_record(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    state.catalog.delete(&id).await?;
    Ok((StatusCode::ACCEPTED, Json(json!({ "success": true }))).into_response())
}

pub async fn refresh_records(State(state): State<AppState>) -> ApiResult {
    let report = state.catalog.refresh_all().await?;
    Ok(Json(json!({
        "success": true,
        "refreshed": report.refreshed,
        "unchanged": report.unchanged,
        "failed": report.failed,
    }))
    .into_response())
}

pub async fn summary(State(state): State<AppState>) -> ApiResult {
    let summary = state.catalog.summary().await?;
    Ok(Json(summary).into_response())
}

pub async fn tag_counts(State(state): State<AppState>, Path(facet): Path<Facet>) -> ApiResult {
    let tags = state.catalog.tags(facet).await?;
    Ok(Json(tags).into_response())
}

pub async fn estimate_apogee(
    State(state): State<AppState>,
    Json(wine): Json<ApogeeRequest>,
) -> ApiResult {
    let Some(estimator) = state.apogee.as_ref() else {
        return Err(ApiError::internal("apogee estimation is not configured"));
    };
    let answer = estimator.estimate(&wine).await.map_err(|err| {
        tracing::error!(?err, "apogee estimation failed");
        ApiError::internal(format!("{err:#}"))
    })?;
    Ok(Json(json!({ "success": true, "answer": answer })).into_response())
}
