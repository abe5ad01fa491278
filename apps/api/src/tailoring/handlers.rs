//! Axum route handlers for the tailoring API.

use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::Stream;
use serde::Serialize;
use serde_json::json;
use tracing::warn;

use crate::agent::{Progress, ProgressChunk};
use crate::errors::AppError;
use crate::state::AppState;
use crate::tailoring::{tailor_experience, TailorRequest, TailoredExperience};

fn validate(request: &TailorRequest) -> Result<(), AppError> {
    if request.job_description.trim().is_empty() {
        return Err(AppError::Validation("jobDescription cannot be empty".to_string()));
    }
    if request.description.trim().is_empty() && request.achievements.is_empty() {
        return Err(AppError::Validation(
            "Provide a description or at least one achievement to tailor".to_string(),
        ));
    }
    Ok(())
}

/// POST /api/v1/experience/tailor
///
/// Runs the full pipeline and returns the tailored role with its review reports.
pub async fn handle_tailor(
    State(state): State<AppState>,
    Json(request): Json<TailorRequest>,
) -> Result<Json<TailoredExperience>, AppError> {
    validate(&request)?;

    let ctx = state.run_context(Progress::noop());
    let tailored = tailor_experience(request, state.backend.clone(), &ctx).await?;

    Ok(Json(tailored))
}

/// POST /api/v1/experience/tailor/stream
///
/// Same pipeline, streamed as Server-Sent Events:
/// - `progress`: a `ProgressChunk`, zero or more times;
/// - `result`: the `TailoredExperience`, or `error`: `{"error": {code, message}}`;
/// - `progress` with `done: true`, last.
///
/// The run is cancelled when the client disconnects.
pub async fn handle_tailor_stream(
    State(state): State<AppState>,
    Json(request): Json<TailorRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    validate(&request)?;

    let (progress, mut rx) = Progress::channel();
    let ctx = state.run_context(progress);
    let cancel_on_drop = ctx.cancel.clone().drop_guard();
    let backend = state.backend.clone();

    // The task owns the only progress sender, so `rx` closes when it finishes.
    let run = tokio::spawn(async move { tailor_experience(request, backend, &ctx).await });

    let stream = async_stream::stream! {
        let _cancel_on_drop = cancel_on_drop;

        while let Some(chunk) = rx.recv().await {
            yield sse_event("progress", &chunk);
        }

        let outcome = match run.await {
            Ok(result) => result.map_err(AppError::from),
            Err(e) => Err(AppError::Internal(anyhow::anyhow!("tailoring task failed: {e}"))),
        };
        match outcome {
            Ok(tailored) => {
                yield sse_event("result", &tailored);
            }
            Err(e) => {
                let (_, code, message) = e.code_and_message();
                yield sse_event("error", &json!({"error": {"code": code, "message": message}}));
            }
        }

        yield sse_event("progress", &ProgressChunk::done());
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn sse_event(name: &'static str, payload: &impl Serialize) -> Result<Event, Infallible> {
    Ok(Event::default().event(name).json_data(payload).unwrap_or_else(|e| {
        warn!("Failed to encode {name} event, sending an empty payload: {e}");
        Event::default().event(name).data("{}")
    }))
}
