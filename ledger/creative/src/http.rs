use lambda_http::{http::StatusCode, Body, Error as LambdaError, Response};
use serde::Deserialize;

use hyrax_atoms::store::TaskStore;
use hyrax_atoms::tasks::model::{ApprovalState, SlotKind};
use hyrax_atoms::tasks::service::TaskSyncHook;
use hyrax_atoms::users::model::Department;

use crate::progress::{done_today, tasks_for, weekly_progress};
use crate::slots::{self, LedgerError};

#[derive(Debug, Deserialize)]
pub struct SetSlotArtifactPayload {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct SetSlotApprovalPayload {
    pub value: ApprovalState,
}

#[derive(Debug, Deserialize)]
pub struct SetSlotFeedbackPayload {
    pub text: String,
}

fn json_response(status: StatusCode, body: String) -> Result<Response<Body>, LambdaError> {
    Ok(Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(body.into())
        .map_err(Box::new)?)
}

fn ledger_error_response(e: LedgerError) -> Result<Response<Body>, LambdaError> {
    let status = match e {
        LedgerError::InvalidSlotIndex(_) => StatusCode::BAD_REQUEST,
        LedgerError::TaskNotFound(_) => StatusCode::NOT_FOUND,
        LedgerError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    json_response(status, serde_json::json!({"error": e.to_string()}).to_string())
}

/// HTTP Handler: PUT /tasks/{id}/slots/{i}/artifact
///
/// Manual link entry. Typed URLs arrive keystroke-close together, so the
/// remote sync is debounced.
pub async fn set_slot_artifact_handler(
    store: &TaskStore,
    sync: &dyn TaskSyncHook,
    task_id: i64,
    kind: SlotKind,
    index: i64,
    body: &[u8],
) -> Result<Response<Body>, LambdaError> {
    let payload: SetSlotArtifactPayload = serde_json::from_slice(body)?;
    match slots::apply(store, task_id, |task| {
        slots::set_slot_artifact(task, kind, index, &payload.url)
    })
    .await
    {
        Ok(task) => {
            sync.upsert_debounced(&task);
            json_response(StatusCode::OK, serde_json::to_string(&task)?)
        }
        Err(e) => ledger_error_response(e),
    }
}

/// HTTP Handler: PUT /tasks/{id}/slots/{i}/approval
pub async fn set_slot_approval_handler(
    store: &TaskStore,
    sync: &dyn TaskSyncHook,
    task_id: i64,
    kind: SlotKind,
    index: i64,
    body: &[u8],
) -> Result<Response<Body>, LambdaError> {
    let payload: SetSlotApprovalPayload = serde_json::from_slice(body)?;
    match slots::apply(store, task_id, |task| {
        slots::set_slot_approval(task, kind, index, payload.value)
    })
    .await
    {
        Ok(task) => {
            sync.upsert(&task);
            json_response(StatusCode::OK, serde_json::to_string(&task)?)
        }
        Err(e) => ledger_error_response(e),
    }
}

/// HTTP Handler: PUT /tasks/{id}/slots/{i}/feedback
pub async fn set_slot_feedback_handler(
    store: &TaskStore,
    sync: &dyn TaskSyncHook,
    task_id: i64,
    kind: SlotKind,
    index: i64,
    body: &[u8],
) -> Result<Response<Body>, LambdaError> {
    let payload: SetSlotFeedbackPayload = serde_json::from_slice(body)?;
    match slots::apply(store, task_id, |task| {
        slots::set_slot_feedback(task, kind, index, &payload.text)
    })
    .await
    {
        Ok(task) => {
            sync.upsert_debounced(&task);
            json_response(StatusCode::OK, serde_json::to_string(&task)?)
        }
        Err(e) => ledger_error_response(e),
    }
}

/// HTTP Handler: DELETE /tasks/{id}/slots/{i}/artifact
pub async fn delete_slot_artifact_handler(
    store: &TaskStore,
    sync: &dyn TaskSyncHook,
    task_id: i64,
    kind: SlotKind,
    index: i64,
) -> Result<Response<Body>, LambdaError> {
    match slots::apply(store, task_id, |task| {
        slots::delete_slot_artifact(task, kind, index)
    })
    .await
    {
        Ok(task) => {
            sync.upsert(&task);
            json_response(StatusCode::OK, serde_json::to_string(&task)?)
        }
        Err(e) => ledger_error_response(e),
    }
}

/// HTTP Handler: GET /progress/weekly?department=..&assignee=..
pub async fn weekly_progress_handler(
    store: &TaskStore,
    department: Department,
    assignee: Option<&str>,
) -> Result<Response<Body>, LambdaError> {
    match store.load().await {
        Ok(tasks) => {
            let visible: Vec<_> = tasks_for(&tasks, department, assignee)
                .into_iter()
                .cloned()
                .collect();
            let progress = weekly_progress(&visible, department);
            json_response(StatusCode::OK, serde_json::to_string(&progress)?)
        }
        Err(e) => {
            json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({"error": e}).to_string(),
            )
        }
    }
}

/// HTTP Handler: GET /progress/today?department=..&assignee=..
pub async fn done_today_handler(
    store: &TaskStore,
    department: Department,
    assignee: Option<&str>,
) -> Result<Response<Body>, LambdaError> {
    match store.load().await {
        Ok(tasks) => {
            let visible: Vec<_> = tasks_for(&tasks, department, assignee)
                .into_iter()
                .cloned()
                .collect();
            let count = done_today(&visible, department, chrono::Utc::now());
            json_response(
                StatusCode::OK,
                serde_json::json!({"doneToday": count}).to_string(),
            )
        }
        Err(e) => {
            json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({"error": e}).to_string(),
            )
        }
    }
}
