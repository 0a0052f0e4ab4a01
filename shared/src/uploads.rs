use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use creative_ledger::slots;
use hyrax_atoms::store::TaskStore;
use hyrax_atoms::tasks::model::{SlotKind, Task};
use hyrax_atoms::tasks::service::TaskSyncHook;

/// Budget for one large creative transfer. The collaborator gives no
/// latency guarantee on big video files.
pub const UPLOAD_TIMEOUT: Duration = Duration::from_secs(15 * 60);

const PROGRESS_CHUNK: usize = 64 * 1024;

/// Identifies one creative slot across the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotRef {
    pub task_id: i64,
    pub kind: SlotKind,
    pub index: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// Starting a second upload for a slot that already has one in flight
    /// is a caller error, not a queueing request.
    #[error("An upload for this slot is already in flight")]
    AlreadyInFlight,

    /// Normal termination requested by the caller; no alert, the slot is
    /// left exactly as it was.
    #[error("Upload canceled")]
    Canceled,

    /// Surfaced to the end user as a blocking alert, so the detail carries
    /// the file name, size and what the server said.
    #[error("Upload of {name} ({size} bytes) failed: {detail}")]
    Failed {
        name: String,
        size: usize,
        detail: String,
    },
}

/// In-flight transfer registry, keyed by slot.
///
/// Owns one cancellation handle per active upload, registered at start and
/// deregistered on finish or cancel - the handle's lifetime follows the
/// transfer itself, nothing else.
#[derive(Default)]
pub struct UploadRegistry {
    inflight: Mutex<HashMap<SlotRef, CancellationToken>>,
}

impl UploadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new transfer, handing back its cancellation token.
    pub fn begin(&self, slot: SlotRef) -> Result<CancellationToken, UploadError> {
        let mut inflight = lock_inflight(&self.inflight);
        if inflight.contains_key(&slot) {
            return Err(UploadError::AlreadyInFlight);
        }
        let token = CancellationToken::new();
        inflight.insert(slot, token.clone());
        Ok(token)
    }

    /// Cancel an in-flight transfer. Returns false when nothing was
    /// in flight for the slot.
    pub fn cancel(&self, slot: SlotRef) -> bool {
        match lock_inflight(&self.inflight).remove(&slot) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn finish(&self, slot: SlotRef) {
        lock_inflight(&self.inflight).remove(&slot);
    }
}

fn lock_inflight(
    inflight: &Mutex<HashMap<SlotRef, CancellationToken>>,
) -> MutexGuard<'_, HashMap<SlotRef, CancellationToken>> {
    match inflight.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

pub struct UploadRequest {
    pub slot: SlotRef,
    pub file_name: String,
    pub user_id: String,
    pub campaign_id: Option<i64>,
    pub bytes: Vec<u8>,
}

/// Pull the artifact URL out of a collaborator response. The webhook has
/// answered with all three shapes over time.
pub fn resolve_artifact_url(body: &serde_json::Value) -> Option<String> {
    [&body["url"], &body["data"]["url"], &body["viewerLink"]]
        .into_iter()
        .find_map(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// Stream the file to the upload collaborator.
///
/// Byte progress is reported through the watch channel as chunks leave.
/// Cancellation drops the in-flight request immediately - no partial state
/// is written anywhere, so the slot is untouched.
pub async fn transfer(
    http: &reqwest::Client,
    url: &str,
    request: UploadRequest,
    progress: watch::Sender<u64>,
    cancel: CancellationToken,
) -> Result<String, UploadError> {
    let size = request.bytes.len();
    let name = request.file_name.clone();
    let fail = |detail: String| UploadError::Failed {
        name: name.clone(),
        size,
        detail,
    };

    let chunks: Vec<Vec<u8>> = request
        .bytes
        .chunks(PROGRESS_CHUNK)
        .map(|c| c.to_vec())
        .collect();
    let mut sent: u64 = 0;
    let body_stream = futures::stream::iter(chunks).map(move |chunk| {
        sent += chunk.len() as u64;
        let _ = progress.send(sent);
        Ok::<_, std::io::Error>(chunk)
    });

    let part = reqwest::multipart::Part::stream_with_length(
        reqwest::Body::wrap_stream(body_stream),
        size as u64,
    )
    .file_name(request.file_name.clone());
    let form = reqwest::multipart::Form::new()
        .text("attempt", uuid::Uuid::new_v4().to_string())
        .text("taskId", request.slot.task_id.to_string())
        .text("slotIndex", request.slot.index.to_string())
        .text("userId", request.user_id)
        .text(
            "campaignId",
            request
                .campaign_id
                .map(|id| id.to_string())
                .unwrap_or_default(),
        )
        .part("file", part);

    let attempt = async {
        let response = http
            .post(url)
            .multipart(form)
            .timeout(UPLOAD_TIMEOUT)
            .send()
            .await
            .map_err(|e| fail(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(fail(format!("server returned {}", status)));
        }
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| fail(format!("unreadable response: {}", e)))?;
        resolve_artifact_url(&body)
            .ok_or_else(|| fail("response carried no artifact url".to_string()))
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(UploadError::Canceled),
        result = attempt => result,
    }
}

/// Full upload flow for one slot: single-flight registration, transfer,
/// then the artifact write plus remote sync on success. On failure or
/// cancellation the slot keeps its previous link, approval and feedback so
/// a retry starts clean.
pub async fn upload_to_slot(
    http: &reqwest::Client,
    upload_url: Option<&str>,
    store: &TaskStore,
    sync: &dyn TaskSyncHook,
    registry: &UploadRegistry,
    request: UploadRequest,
) -> Result<Task, UploadError> {
    let url = upload_url.ok_or_else(|| UploadError::Failed {
        name: request.file_name.clone(),
        size: request.bytes.len(),
        detail: "no upload collaborator configured".to_string(),
    })?;
    let slot = request.slot;
    let file_name = request.file_name.clone();
    let size = request.bytes.len();

    let cancel = registry.begin(slot)?;

    let (progress_tx, mut progress_rx) = watch::channel(0u64);
    tokio::spawn(async move {
        while progress_rx.changed().await.is_ok() {
            let sent = *progress_rx.borrow();
            tracing::debug!(task_id = slot.task_id, index = slot.index, sent, "Upload progress");
        }
    });

    tracing::info!(
        task_id = slot.task_id,
        index = slot.index,
        file = %file_name,
        size,
        "Upload started"
    );
    let result = transfer(http, url, request, progress_tx, cancel).await;
    registry.finish(slot);

    match result {
        Ok(link) => {
            let task = slots::apply(store, slot.task_id, |task| {
                slots::set_slot_artifact(task, slot.kind, slot.index as i64, &link)
            })
            .await
            .map_err(|e| UploadError::Failed {
                name: file_name.clone(),
                size,
                detail: format!("uploaded but not recorded: {}", e),
            })?;
            sync.upsert(&task);
            tracing::info!(task_id = slot.task_id, index = slot.index, link = %link, "Upload finished");
            Ok(task)
        }
        Err(UploadError::Canceled) => {
            tracing::info!(task_id = slot.task_id, index = slot.index, "Upload canceled");
            Err(UploadError::Canceled)
        }
        Err(e) => {
            tracing::error!(task_id = slot.task_id, index = slot.index, "{}", e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn slot() -> SlotRef {
        SlotRef {
            task_id: 1,
            kind: SlotKind::Viewer,
            index: 0,
        }
    }

    #[test]
    fn registry_enforces_single_flight() {
        let registry = UploadRegistry::new();
        let _token = registry.begin(slot()).unwrap();
        assert!(matches!(
            registry.begin(slot()),
            Err(UploadError::AlreadyInFlight)
        ));

        // A different slot of the same task is fine.
        let other = SlotRef { index: 1, ..slot() };
        assert!(registry.begin(other).is_ok());
    }

    #[test]
    fn cancel_fires_the_token_and_frees_the_slot() {
        let registry = UploadRegistry::new();
        let token = registry.begin(slot()).unwrap();
        assert!(registry.cancel(slot()));
        assert!(token.is_cancelled());
        assert!(!registry.cancel(slot()));
        assert!(registry.begin(slot()).is_ok());
    }

    #[test]
    fn finish_deregisters_without_cancelling() {
        let registry = UploadRegistry::new();
        let token = registry.begin(slot()).unwrap();
        registry.finish(slot());
        assert!(!token.is_cancelled());
        assert!(registry.begin(slot()).is_ok());
    }

    #[test]
    fn artifact_url_is_found_in_all_known_shapes() {
        assert_eq!(
            resolve_artifact_url(&json!({"url": "http://a"})).as_deref(),
            Some("http://a")
        );
        assert_eq!(
            resolve_artifact_url(&json!({"data": {"url": "http://b"}})).as_deref(),
            Some("http://b")
        );
        assert_eq!(
            resolve_artifact_url(&json!({"viewerLink": "http://c"})).as_deref(),
            Some("http://c")
        );
        assert_eq!(resolve_artifact_url(&json!({"url": ""})), None);
        assert_eq!(resolve_artifact_url(&json!({"ok": true})), None);
    }

    #[tokio::test]
    async fn cancellation_wins_over_the_request() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let (progress, _) = watch::channel(0u64);
        let request = UploadRequest {
            slot: slot(),
            file_name: "reel.mp4".to_string(),
            user_id: "u-1".to_string(),
            campaign_id: None,
            bytes: vec![0u8; 128],
        };
        let result = transfer(
            &reqwest::Client::new(),
            "http://127.0.0.1:9/upload",
            request,
            progress,
            cancel,
        )
        .await;
        assert!(matches!(result, Err(UploadError::Canceled)));
    }

    #[tokio::test]
    async fn failure_detail_names_the_file() {
        let (progress, _) = watch::channel(0u64);
        let request = UploadRequest {
            slot: slot(),
            file_name: "reel.mp4".to_string(),
            user_id: "u-1".to_string(),
            campaign_id: Some(3),
            bytes: vec![0u8; 128],
        };
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .unwrap();
        let result = transfer(
            &client,
            "http://127.0.0.1:9/upload",
            request,
            progress,
            CancellationToken::new(),
        )
        .await;
        match result {
            Err(UploadError::Failed { name, size, .. }) => {
                assert_eq!(name, "reel.mp4");
                assert_eq!(size, 128);
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }
}
