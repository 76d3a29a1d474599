use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use server_api::{create_story, delete_story, health, list_stories, ApiContext};
use shared::{
    domain::Story,
    error::{ApiError, ErrorCode},
    protocol::{
        CreateStoryRequest, DeleteStoryRequest, DeleteStoryResponse, HEALTH_ROUTE,
        MISSING_STORY_ID, STORIES_ROUTE,
    },
};
use storage::Storage;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;
mod reaper;

use config::{load_settings, prepare_database_url};
use reaper::spawn_reaper;

#[derive(Clone)]
struct AppState {
    api: ApiContext,
}

type HttpError = (StatusCode, Json<ApiError>);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = load_settings().map_err(|error| {
        error!(%error, "configuration error; refusing to serve requests");
        error
    })?;
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open story database; verify the connection string and permissions"
        );
        error
    })?;

    let api = ApiContext::new(storage);
    let reaper = spawn_reaper(
        api.clone(),
        Duration::from_secs(settings.reap_interval_seconds),
    );
    let app = build_router(Arc::new(AppState { api }), settings.max_body_bytes);

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, reap_interval_seconds = settings.reap_interval_seconds, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
        })
        .await?;

    reaper.abort();
    Ok(())
}

fn build_router(state: Arc<AppState>, max_body_bytes: usize) -> Router {
    Router::new()
        .route(HEALTH_ROUTE, get(healthz))
        .route(
            STORIES_ROUTE,
            get(http_list_stories)
                .post(http_create_story)
                .delete(http_delete_story),
        )
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .with_state(state)
}

fn http_error(err: ApiError) -> HttpError {
    let status = match err.code {
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        ErrorCode::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!(code = ?err.code, error = %err.message, "request failed");
    }
    (status, Json(err))
}

fn rejection_error(rejection: JsonRejection) -> HttpError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return http_error(ApiError::new(
            ErrorCode::PayloadTooLarge,
            "request body too large",
        ));
    }
    http_error(ApiError::validation(rejection.body_text()))
}

async fn healthz(State(state): State<Arc<AppState>>) -> Result<&'static str, HttpError> {
    health(&state.api).await.map_err(http_error)?;
    Ok("ok")
}

async fn http_list_stories(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Story>>, HttpError> {
    let stories = list_stories(&state.api, Utc::now())
        .await
        .map_err(http_error)?;
    Ok(Json(stories))
}

async fn http_create_story(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateStoryRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Story>), HttpError> {
    let Json(req) = payload.map_err(rejection_error)?;
    let story = create_story(&state.api, req).await.map_err(http_error)?;
    Ok((StatusCode::CREATED, Json(story)))
}

async fn http_delete_story(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<DeleteStoryRequest>, JsonRejection>,
) -> Result<Json<DeleteStoryResponse>, HttpError> {
    // An absent or unreadable body carries no id.
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            return Err(rejection_error(rejection));
        }
        Err(_) => return Err(http_error(ApiError::validation(MISSING_STORY_ID))),
    };
    let response = delete_story(&state.api, req).await.map_err(http_error)?;
    Ok(Json(response))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
