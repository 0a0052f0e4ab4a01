use std::io::ErrorKind;
use std::path::PathBuf;

use tokio::sync::Mutex;

use crate::tasks::model::Task;

/// Whole-file JSON task store.
///
/// Every mutation is a locked read-modify-write of the full file; concurrent
/// writers from other processes are not coordinated (last write wins, which
/// is the contract the rest of the system is built on).
pub struct TaskStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl TaskStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        TaskStore {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Load all tasks. A missing file is an empty store, not an error.
    pub async fn load(&self) -> Result<Vec<Task>, String> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(format!("Failed to read {}: {}", self.path.display(), e)),
        };
        serde_json::from_slice(&bytes)
            .map_err(|e| format!("Failed to parse {}: {}", self.path.display(), e))
    }

    pub async fn save(&self, tasks: &[Task]) -> Result<(), String> {
        let bytes = serde_json::to_vec_pretty(tasks)
            .map_err(|e| format!("Failed to serialize tasks: {}", e))?;
        tokio::fs::write(&self.path, bytes)
            .await
            .map_err(|e| format!("Failed to write {}: {}", self.path.display(), e))
    }

    /// Locked read-modify-write. The closure's error aborts the write.
    pub async fn mutate<T>(
        &self,
        f: impl FnOnce(&mut Vec<Task>) -> Result<T, String>,
    ) -> Result<T, String> {
        let _guard = self.write_lock.lock().await;
        let mut tasks = self.load().await?;
        let out = f(&mut tasks)?;
        self.save(&tasks).await?;
        Ok(out)
    }
}
