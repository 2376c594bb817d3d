//! HTTP surface over the report views and session recording.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Local;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::core::context::AppContext;
use crate::core::recorder::{record_session, SessionPayload};
use crate::core::reports;

type SharedContext = Arc<AppContext>;

pub fn router(ctx: SharedContext) -> Router {
    Router::new()
        .route("/api/usage", get(usage))
        .route("/api/export/csv", get(export_csv))
        .route("/api/export/weekly", get(export_weekly))
        .route("/api/obsidian/daily", get(obsidian_daily))
        .route("/api/usage/record", post(record))
        .route("/api/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}

pub async fn serve(ctx: AppContext, port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(%addr, data_dir = %ctx.store.root().display(), "Usage API listening");

    axum::serve(listener, router(Arc::new(ctx)))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("Usage API server failed")
}

fn attachment(content_type: &'static str, filename: &str, body: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}", filename),
            ),
        ],
        body,
    )
        .into_response()
}

fn failure(status: StatusCode, error: String) -> Response {
    (status, Json(json!({ "success": false, "error": error }))).into_response()
}

/// Run store I/O on the blocking pool.
async fn blocking<T, F>(ctx: SharedContext, f: F) -> Result<T, Response>
where
    F: FnOnce(&AppContext) -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || f(&ctx))
        .await
        .map_err(|e| {
            warn!(error = %e, "Request task failed");
            failure(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })
}

async fn usage(State(ctx): State<SharedContext>) -> Response {
    let today = Local::now().date_naive();
    match blocking(ctx, move |ctx| reports::usage_overview(&ctx.store, today)).await {
        Ok(overview) => Json(overview).into_response(),
        Err(response) => response,
    }
}

async fn export_csv(State(ctx): State<SharedContext>) -> Response {
    match blocking(ctx, |ctx| reports::export_csv(&ctx.store.load_all_days())).await {
        Ok(Ok(csv)) => attachment("text/csv", "model-usage.csv", csv),
        Ok(Err(e)) => {
            warn!(error = %e, "CSV export failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
        Err(response) => response,
    }
}

async fn export_weekly(State(ctx): State<SharedContext>) -> Response {
    let today = Local::now().date_naive();
    let report = blocking(ctx, move |ctx| {
        reports::weekly_report(reports::stored_window(&ctx.store, today, reports::WEEK_DAYS))
    })
    .await;
    match report {
        Ok(report) => attachment("text/markdown", "weekly-report.md", report.to_markdown()),
        Err(response) => response,
    }
}

async fn obsidian_daily(State(ctx): State<SharedContext>) -> Response {
    let today = Local::now().date_naive();
    let brief = blocking(ctx, move |ctx| {
        reports::daily_brief(today, ctx.store.day_or_none(today).as_ref(), &ctx.budget)
    })
    .await;
    match brief {
        Ok(brief) => ([(header::CONTENT_TYPE, "text/markdown")], brief).into_response(),
        Err(response) => response,
    }
}

async fn record(State(ctx): State<SharedContext>, Json(body): Json<Value>) -> Response {
    let payload = match SessionPayload::from_value(body) {
        Ok(payload) => payload,
        Err(e) => {
            return failure(
                StatusCode::BAD_REQUEST,
                format!("Invalid session payload: {}", e),
            );
        }
    };

    let result = blocking(ctx, move |ctx| {
        record_session(&ctx.store, &ctx.cost_model, &payload, Local::now())
    })
    .await;

    match result {
        Ok(Ok(session)) => Json(json!({ "success": true, "session": session })).into_response(),
        Ok(Err(e)) => {
            warn!(error = %e, "Failed to record session");
            failure(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
        Err(response) => response,
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
