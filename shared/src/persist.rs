use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use hyrax_atoms::tasks::model::Task;
use hyrax_atoms::tasks::service::TaskSyncHook;

/// Quiescence window for free-text edits: the remote write fires once input
/// has been idle this long, each new keystroke restarting the timer.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_secs(1);

/// Per-key action coalescing. Each push cancels the key's pending action
/// and schedules the new one behind the window, so only the last write in
/// a burst reaches the backing store.
pub struct Debouncer<K> {
    window: Duration,
    timers: Mutex<HashMap<K, tokio::task::JoinHandle<()>>>,
}

impl<K: Eq + Hash + Clone + Send + 'static> Debouncer<K> {
    pub fn new(window: Duration) -> Self {
        Debouncer {
            window,
            timers: Mutex::new(HashMap::new()),
        }
    }

    pub fn push<F>(&self, key: K, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let window = self.window;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(window).await;
            action.await;
        });
        if let Some(prev) = lock_timers(&self.timers).insert(key, handle) {
            prev.abort();
        }
    }

    /// Drop the key's pending action without running it.
    pub fn cancel(&self, key: &K) {
        if let Some(handle) = lock_timers(&self.timers).remove(key) {
            handle.abort();
        }
    }
}

fn lock_timers<K>(
    timers: &Mutex<HashMap<K, tokio::task::JoinHandle<()>>>,
) -> MutexGuard<'_, HashMap<K, tokio::task::JoinHandle<()>>> {
    match timers.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

struct SyncInner {
    http: reqwest::Client,
    url: Option<String>,
    debounce: Debouncer<i64>,
}

/// Fire-and-forget webhook sync for the optimistic write path.
///
/// Local state has already been mutated by the time a task lands here; the
/// remote upsert is an observability concern only. Failures are logged and
/// never surfaced - a possible local/remote divergence is an accepted
/// limitation of the design.
#[derive(Clone)]
pub struct TaskSync {
    inner: Arc<SyncInner>,
}

impl TaskSync {
    pub fn new(http: reqwest::Client, url: Option<String>) -> Self {
        TaskSync {
            inner: Arc::new(SyncInner {
                http,
                url,
                debounce: Debouncer::new(DEBOUNCE_WINDOW),
            }),
        }
    }

    async fn send(inner: Arc<SyncInner>, task: Task) {
        let Some(url) = inner.url.as_deref() else {
            return;
        };
        let task_id = task.id;
        match inner.http.post(url).json(&task).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(task_id, "Task upsert persisted");
            }
            Ok(response) => {
                tracing::error!(task_id, status = %response.status(), "Task upsert rejected");
            }
            Err(e) => {
                tracing::error!(task_id, "Task upsert failed: {}", e);
            }
        }
    }

    async fn send_delete(inner: Arc<SyncInner>, task_id: i64) {
        let Some(url) = inner.url.as_deref() else {
            return;
        };
        let delete_url = format!("{}/{}", url.trim_end_matches('/'), task_id);
        match inner.http.delete(&delete_url).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(task_id, "Task delete persisted");
            }
            Ok(response) => {
                tracing::error!(task_id, status = %response.status(), "Task delete rejected");
            }
            Err(e) => {
                tracing::error!(task_id, "Task delete failed: {}", e);
            }
        }
    }
}

impl TaskSyncHook for TaskSync {
    fn upsert(&self, task: &Task) {
        // A flush supersedes any pending debounced write for the task.
        self.inner.debounce.cancel(&task.id);
        let inner = self.inner.clone();
        let task = task.clone();
        tokio::spawn(Self::send(inner, task));
    }

    fn upsert_debounced(&self, task: &Task) {
        let inner = self.inner.clone();
        let task = task.clone();
        let key = task.id;
        self.inner
            .debounce
            .push(key, Self::send(inner, task));
    }

    fn delete(&self, task_id: i64) {
        self.inner.debounce.cancel(&task_id);
        let inner = self.inner.clone();
        tokio::spawn(Self::send_delete(inner, task_id));
    }
}
