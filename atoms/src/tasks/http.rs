use lambda_http::{http::StatusCode, Body, Error as LambdaError, Response};

use super::model::{CreateTaskPayload, SetCopyApprovalPayload, UpdateTaskPayload};
use super::service::{self, TaskSyncHook};
use crate::store::TaskStore;

fn json_response(status: StatusCode, body: String) -> Result<Response<Body>, LambdaError> {
    Ok(Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(body.into())
        .map_err(Box::new)?)
}

fn error_response(e: String) -> Result<Response<Body>, LambdaError> {
    let status = match e.as_str() {
        "Task not found" => StatusCode::NOT_FOUND,
        "Feedback text is required" => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    json_response(status, serde_json::json!({"error": e}).to_string())
}

/// HTTP Handler: GET /tasks
pub async fn list_tasks_handler(store: &TaskStore) -> Result<Response<Body>, LambdaError> {
    match service::load_tasks(store).await {
        Ok(tasks) => json_response(StatusCode::OK, serde_json::to_string(&tasks)?),
        Err(e) => error_response(e),
    }
}

/// HTTP Handler: GET /tasks/{id}
pub async fn get_task_handler(
    store: &TaskStore,
    task_id: i64,
) -> Result<Response<Body>, LambdaError> {
    match service::get_task(store, task_id).await {
        Ok(task) => json_response(StatusCode::OK, serde_json::to_string(&task)?),
        Err(e) => error_response(e),
    }
}

/// HTTP Handler: POST /tasks
pub async fn create_task_handler(
    store: &TaskStore,
    sync: &dyn TaskSyncHook,
    body: &[u8],
) -> Result<Response<Body>, LambdaError> {
    let payload: CreateTaskPayload = serde_json::from_slice(body)?;
    match service::create_task(store, payload).await {
        Ok(task) => {
            sync.upsert(&task);
            json_response(StatusCode::CREATED, serde_json::to_string(&task)?)
        }
        Err(e) => error_response(e),
    }
}

/// HTTP Handler: PATCH /tasks/{id}
pub async fn update_task_handler(
    store: &TaskStore,
    sync: &dyn TaskSyncHook,
    task_id: i64,
    body: &[u8],
) -> Result<Response<Body>, LambdaError> {
    let payload: UpdateTaskPayload = serde_json::from_slice(body)?;
    match service::update_task(store, task_id, payload).await {
        Ok(task) => {
            sync.upsert(&task);
            json_response(StatusCode::OK, serde_json::to_string(&task)?)
        }
        Err(e) => error_response(e),
    }
}

/// HTTP Handler: DELETE /tasks/{id}
pub async fn delete_task_handler(
    store: &TaskStore,
    sync: &dyn TaskSyncHook,
    task_id: i64,
) -> Result<Response<Body>, LambdaError> {
    match service::delete_task(store, task_id).await {
        Ok(()) => {
            sync.delete(task_id);
            Ok(Response::builder()
                .status(StatusCode::NO_CONTENT)
                .header("Access-Control-Allow-Origin", "*")
                .body(Body::Empty)
                .map_err(Box::new)?)
        }
        Err(e) => error_response(e),
    }
}

/// HTTP Handler: PUT /tasks/{id}/copy/approval
pub async fn set_copy_approval_handler(
    store: &TaskStore,
    sync: &dyn TaskSyncHook,
    task_id: i64,
    body: &[u8],
) -> Result<Response<Body>, LambdaError> {
    let payload: SetCopyApprovalPayload = serde_json::from_slice(body)?;
    match service::set_copy_approval(store, task_id, payload).await {
        Ok(task) => {
            sync.upsert(&task);
            json_response(StatusCode::OK, serde_json::to_string(&task)?)
        }
        Err(e) => error_response(e),
    }
}
