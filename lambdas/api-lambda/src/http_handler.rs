use std::sync::Arc;

use creative_ledger::http as ledger_http;
use hyrax_atoms::tasks;
use hyrax_atoms::tasks::model::SlotKind;
use hyrax_atoms::tasks::service as task_service;
use hyrax_atoms::users::model::Department;
use hyrax_shared::uploads::{self, SlotRef, UploadError, UploadRequest};
use hyrax_shared::{auth, AppState};
use lambda_http::http::header::HeaderValue;
use lambda_http::{
    http::{Method, StatusCode},
    Body, Error, Request, Response,
};

fn with_cors_headers(mut resp: Response<Body>) -> Response<Body> {
    let headers = resp.headers_mut();
    headers.insert("Access-Control-Allow-Origin", HeaderValue::from_static("*"));
    headers.insert(
        "Access-Control-Allow-Methods",
        HeaderValue::from_static("GET,POST,PUT,PATCH,DELETE,OPTIONS"),
    );
    headers.insert(
        "Access-Control-Allow-Headers",
        HeaderValue::from_static("Content-Type,Authorization"),
    );
    resp
}

fn finalize_response(resp: Result<Response<Body>, Error>) -> Result<Response<Body>, Error> {
    resp.map(with_cors_headers)
}

fn json_response(status: StatusCode, body: String) -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(body.into())
        .map_err(Box::new)?)
}

fn not_found() -> Result<Response<Body>, Error> {
    json_response(
        StatusCode::NOT_FOUND,
        serde_json::json!({"error": "Not found"}).to_string(),
    )
}

fn method_not_allowed() -> Result<Response<Body>, Error> {
    json_response(
        StatusCode::METHOD_NOT_ALLOWED,
        serde_json::json!({"error": "Method not allowed"}).to_string(),
    )
}

fn bad_request(message: &str) -> Result<Response<Body>, Error> {
    json_response(
        StatusCode::BAD_REQUEST,
        serde_json::json!({"error": message}).to_string(),
    )
}

fn query_param(event: &Request, name: &str) -> Option<String> {
    event.uri().query().and_then(|q| {
        q.split('&').find_map(|pair| {
            let (k, v) = pair.split_once('=')?;
            (k == name).then(|| v.to_string())
        })
    })
}

fn slot_kind(event: &Request) -> Result<SlotKind, Response<Body>> {
    match query_param(event, "kind") {
        None => Ok(SlotKind::Viewer),
        Some(raw) => SlotKind::parse(&raw).ok_or_else(|| {
            Response::builder()
                .status(StatusCode::BAD_REQUEST)
                .header("Content-Type", "application/json")
                .body(
                    serde_json::json!({"error": format!("Unknown slot kind: {}", raw)})
                        .to_string()
                        .into(),
                )
                .unwrap_or_default()
        }),
    }
}

/// Main Lambda handler - routes requests to auth, directory, task, ledger
/// and upload endpoints.
pub(crate) async fn function_handler(
    event: Request,
    state: Arc<AppState>,
) -> Result<Response<Body>, Error> {
    let method = event.method().clone();
    let path = event.uri().path().to_string();
    let body = event.body();
    tracing::info!("🚀 HYRAX API invoked - Method: {} Path: {}", method, path);

    // Handle CORS preflight
    if method == Method::OPTIONS {
        let resp = Response::builder()
            .status(StatusCode::OK)
            .body(Body::Empty)
            .map_err(Box::new)?;
        return Ok(with_cors_headers(resp));
    }

    // Auth endpoints (no token required)
    if path == "/login" {
        return match method {
            Method::POST => {
                let users = state.directory.users().await;
                finalize_response(auth::login(&state.config.auth_secret, &users, body).await)
            }
            _ => finalize_response(method_not_allowed()),
        };
    }

    if path == "/logout" {
        // Tokens are stateless; the client just drops its copy.
        return match method {
            Method::POST => finalize_response(json_response(
                StatusCode::OK,
                serde_json::json!({"message": "ok"}).to_string(),
            )),
            _ => finalize_response(method_not_allowed()),
        };
    }

    // Everything below requires a bearer token
    let directory_users = state.directory.users().await;
    let auth_user = match auth::authenticate_request(
        &state.config.auth_secret,
        &directory_users,
        event.headers(),
    ) {
        Ok(user) => user.clone(),
        Err(resp) => return Ok(with_cors_headers(resp)),
    };

    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    // Directory routes
    if path.starts_with("/users") {
        let resp = match (&method, parts.as_slice()) {
            (&Method::GET, ["users"]) => {
                let users: Vec<_> = directory_users.iter().map(|u| u.sanitized()).collect();
                json_response(StatusCode::OK, serde_json::to_string(&users)?)
            }
            (&Method::GET, ["users", "me"]) => {
                json_response(StatusCode::OK, serde_json::to_string(&auth_user.sanitized())?)
            }
            _ => not_found(),
        };
        return finalize_response(resp);
    }

    if path.starts_with("/campaigns") {
        let resp = match (&method, parts.as_slice()) {
            (&Method::GET, ["campaigns"]) => {
                let campaigns = state.directory.campaigns().await;
                json_response(StatusCode::OK, serde_json::to_string(&campaigns)?)
            }
            _ => not_found(),
        };
        return finalize_response(resp);
    }

    // Dashboard aggregates
    if path.starts_with("/progress") {
        let department = query_param(&event, "department")
            .map(|d| Department::from_str_lossy(&d))
            .unwrap_or(auth_user.department);
        let assignee = query_param(&event, "assignee");

        let resp = match (&method, parts.as_slice()) {
            (&Method::GET, ["progress", "weekly"]) => {
                ledger_http::weekly_progress_handler(&state.store, department, assignee.as_deref())
                    .await
            }
            (&Method::GET, ["progress", "today"]) => {
                ledger_http::done_today_handler(&state.store, department, assignee.as_deref())
                    .await
            }
            _ => not_found(),
        };
        return finalize_response(resp);
    }

    // Task CRUD + ledger routes
    if path.starts_with("/tasks") {
        let resp = match (&method, parts.as_slice()) {
            (&Method::GET, ["tasks"]) => tasks::http::list_tasks_handler(&state.store).await,
            (&Method::POST, ["tasks"]) => {
                tasks::http::create_task_handler(&state.store, &state.sync, body).await
            }
            (&Method::GET, ["tasks", task_id]) => match task_id.parse() {
                Ok(task_id) => tasks::http::get_task_handler(&state.store, task_id).await,
                Err(_) => bad_request("Invalid task id"),
            },
            (&Method::PATCH, ["tasks", task_id]) => match task_id.parse() {
                Ok(task_id) => {
                    tasks::http::update_task_handler(&state.store, &state.sync, task_id, body).await
                }
                Err(_) => bad_request("Invalid task id"),
            },
            (&Method::DELETE, ["tasks", task_id]) => match task_id.parse() {
                Ok(task_id) => {
                    tasks::http::delete_task_handler(&state.store, &state.sync, task_id).await
                }
                Err(_) => bad_request("Invalid task id"),
            },
            (&Method::PUT, ["tasks", task_id, "copy", "approval"]) => match task_id.parse() {
                Ok(task_id) => {
                    tasks::http::set_copy_approval_handler(&state.store, &state.sync, task_id, body)
                        .await
                }
                Err(_) => bad_request("Invalid task id"),
            },

            (&Method::PUT, ["tasks", task_id, "slots", index, "artifact"]) => {
                match (task_id.parse(), index.parse(), slot_kind(&event)) {
                    (Ok(task_id), Ok(index), Ok(kind)) => {
                        ledger_http::set_slot_artifact_handler(
                            &state.store,
                            &state.sync,
                            task_id,
                            kind,
                            index,
                            body,
                        )
                        .await
                    }
                    (_, _, Err(resp)) => Ok(resp),
                    _ => bad_request("Invalid task id or slot index"),
                }
            }
            (&Method::PUT, ["tasks", task_id, "slots", index, "approval"]) => {
                match (task_id.parse(), index.parse(), slot_kind(&event)) {
                    (Ok(task_id), Ok(index), Ok(kind)) => {
                        ledger_http::set_slot_approval_handler(
                            &state.store,
                            &state.sync,
                            task_id,
                            kind,
                            index,
                            body,
                        )
                        .await
                    }
                    (_, _, Err(resp)) => Ok(resp),
                    _ => bad_request("Invalid task id or slot index"),
                }
            }
            (&Method::PUT, ["tasks", task_id, "slots", index, "feedback"]) => {
                match (task_id.parse(), index.parse(), slot_kind(&event)) {
                    (Ok(task_id), Ok(index), Ok(kind)) => {
                        ledger_http::set_slot_feedback_handler(
                            &state.store,
                            &state.sync,
                            task_id,
                            kind,
                            index,
                            body,
                        )
                        .await
                    }
                    (_, _, Err(resp)) => Ok(resp),
                    _ => bad_request("Invalid task id or slot index"),
                }
            }
            (&Method::DELETE, ["tasks", task_id, "slots", index, "artifact"]) => {
                match (task_id.parse(), index.parse(), slot_kind(&event)) {
                    (Ok(task_id), Ok(index), Ok(kind)) => {
                        ledger_http::delete_slot_artifact_handler(
                            &state.store,
                            &state.sync,
                            task_id,
                            kind,
                            index,
                        )
                        .await
                    }
                    (_, _, Err(resp)) => Ok(resp),
                    _ => bad_request("Invalid task id or slot index"),
                }
            }

            (&Method::POST, ["tasks", task_id, "slots", index, "upload"]) => {
                match (task_id.parse::<i64>(), index.parse::<usize>(), slot_kind(&event)) {
                    (Ok(task_id), Ok(index), Ok(kind)) => {
                        upload_handler(&state, &auth_user.id, task_id, kind, index, &event).await
                    }
                    (_, _, Err(resp)) => Ok(resp),
                    _ => bad_request("Invalid task id or slot index"),
                }
            }
            (&Method::DELETE, ["tasks", task_id, "slots", index, "upload"]) => {
                match (task_id.parse::<i64>(), index.parse::<usize>(), slot_kind(&event)) {
                    (Ok(task_id), Ok(index), Ok(kind)) => {
                        let canceled = state.uploads.cancel(SlotRef { task_id, kind, index });
                        json_response(
                            StatusCode::OK,
                            serde_json::json!({"canceled": canceled}).to_string(),
                        )
                    }
                    (_, _, Err(resp)) => Ok(resp),
                    _ => bad_request("Invalid task id or slot index"),
                }
            }

            _ => not_found(),
        };
        return finalize_response(resp);
    }

    // No matching route
    tracing::warn!("⚠️ No route matched - Method: {} Path: {}", method, path);
    finalize_response(not_found())
}

/// POST /tasks/{id}/slots/{i}/upload - proxy one creative file to the
/// upload collaborator. The raw request body is the file; the name comes
/// from the `fileName` query parameter.
async fn upload_handler(
    state: &AppState,
    user_id: &str,
    task_id: i64,
    kind: SlotKind,
    index: usize,
    event: &Request,
) -> Result<Response<Body>, Error> {
    let bytes = match event.body() {
        Body::Binary(bytes) => bytes.clone(),
        Body::Text(text) => text.clone().into_bytes(),
        Body::Empty => Vec::new(),
    };
    if bytes.is_empty() {
        return bad_request("Empty upload body");
    }

    // The collaborator wants campaign context with the file.
    let campaign_id = task_service::get_task(&state.store, task_id)
        .await
        .ok()
        .and_then(|t| t.campaign_id);

    let request = UploadRequest {
        slot: SlotRef { task_id, kind, index },
        file_name: query_param(event, "fileName").unwrap_or_else(|| "upload.bin".to_string()),
        user_id: user_id.to_string(),
        campaign_id,
        bytes,
    };

    match uploads::upload_to_slot(
        &state.http,
        state.config.upload_url.as_deref(),
        &state.store,
        &state.sync,
        &state.uploads,
        request,
    )
    .await
    {
        Ok(task) => json_response(StatusCode::OK, serde_json::to_string(&task)?),
        Err(UploadError::Canceled) => json_response(
            StatusCode::OK,
            serde_json::json!({"canceled": true}).to_string(),
        ),
        Err(e @ UploadError::AlreadyInFlight) => json_response(
            StatusCode::CONFLICT,
            serde_json::json!({"error": e.to_string()}).to_string(),
        ),
        Err(e) => json_response(
            StatusCode::BAD_GATEWAY,
            serde_json::json!({"error": e.to_string()}).to_string(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyrax_atoms::users::model::User;
    use hyrax_shared::Config;
    use std::sync::atomic::{AtomicU32, Ordering};

    static COUNTER: AtomicU32 = AtomicU32::new(0);

    fn test_state() -> Arc<AppState> {
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let tasks_file = std::env::temp_dir()
            .join(format!("hyrax-api-test-{}-{}.json", std::process::id(), n));
        let _ = std::fs::remove_file(&tasks_file);
        Arc::new(AppState::new(Config {
            tasks_file: tasks_file.to_string_lossy().into_owned(),
            auth_secret: "test-secret".to_string(),
            users_seed: vec![User {
                id: "u-1".to_string(),
                email: "ana@example.com".to_string(),
                name: "Ana".to_string(),
                password: "pw".to_string(),
                ..User::default()
            }],
            user_directory_url: None,
            campaign_directory_url: None,
            task_persist_url: None,
            upload_url: None,
        }))
    }

    fn request(method: &str, uri: &str, token: Option<&str>, body: Body) -> Request {
        let mut builder = lambda_http::http::Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        builder.body(body).unwrap()
    }

    fn body_json(resp: &Response<Body>) -> serde_json::Value {
        match resp.body() {
            Body::Text(text) => serde_json::from_str(text).unwrap(),
            Body::Binary(bytes) => serde_json::from_slice(bytes).unwrap(),
            Body::Empty => serde_json::Value::Null,
        }
    }

    async fn login(state: &Arc<AppState>) -> String {
        let resp = function_handler(
            request(
                "POST",
                "/login",
                None,
                Body::from(r#"{"email": "ana@example.com", "password": "pw"}"#),
            ),
            state.clone(),
        )
        .await
        .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        body_json(&resp)["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn preflight_carries_cors_headers() {
        let state = test_state();
        let resp = function_handler(request("OPTIONS", "/tasks", None, Body::Empty), state)
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get("Access-Control-Allow-Origin").unwrap(),
            "*"
        );
    }

    #[tokio::test]
    async fn protected_routes_require_a_token() {
        let state = test_state();
        let resp = function_handler(request("GET", "/tasks", None, Body::Empty), state)
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn login_then_me_round_trip() {
        let state = test_state();
        let token = login(&state).await;
        let resp = function_handler(
            request("GET", "/users/me", Some(&token), Body::Empty),
            state,
        )
        .await
        .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let me = body_json(&resp);
        assert_eq!(me["email"], "ana@example.com");
        // The stored password never leaves the server.
        assert_eq!(me["password"], "");
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let state = test_state();
        let token = login(&state).await;
        let resp = function_handler(
            request("GET", "/nope", Some(&token), Body::Empty),
            state,
        )
        .await
        .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn slot_review_flows_into_progress() {
        let state = test_state();
        let token = login(&state).await;

        let resp = function_handler(
            request(
                "POST",
                "/tasks",
                Some(&token),
                Body::from(r#"{"name": "banner set", "quantity": 2, "mediaType": "IMAGE"}"#),
            ),
            state.clone(),
        )
        .await
        .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let task_id = body_json(&resp)["id"].as_i64().unwrap();

        let resp = function_handler(
            request(
                "PUT",
                &format!("/tasks/{}/slots/1/approval", task_id),
                Some(&token),
                Body::from(r#"{"value": "Approved"}"#),
            ),
            state.clone(),
        )
        .await
        .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = function_handler(
            request(
                "GET",
                "/progress/weekly?department=graphic_design",
                Some(&token),
                Body::Empty,
            ),
            state,
        )
        .await
        .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let progress = body_json(&resp);
        assert_eq!(progress["completed"], 1);
        assert_eq!(progress["total"], 2);
    }

    #[tokio::test]
    async fn negative_slot_index_is_a_bad_request() {
        let state = test_state();
        let token = login(&state).await;

        let resp = function_handler(
            request(
                "POST",
                "/tasks",
                Some(&token),
                Body::from(r#"{"name": "t", "quantity": 1}"#),
            ),
            state.clone(),
        )
        .await
        .unwrap();
        let task_id = body_json(&resp)["id"].as_i64().unwrap();

        let resp = function_handler(
            request(
                "PUT",
                &format!("/tasks/{}/slots/-1/artifact", task_id),
                Some(&token),
                Body::from(r#"{"url": "http://x"}"#),
            ),
            state,
        )
        .await
        .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn canceling_an_idle_upload_reports_false() {
        let state = test_state();
        let token = login(&state).await;
        let resp = function_handler(
            request(
                "DELETE",
                "/tasks/1/slots/0/upload",
                Some(&token),
                Body::Empty,
            ),
            state,
        )
        .await
        .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(&resp)["canceled"], false);
    }
}
