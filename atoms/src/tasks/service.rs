use serde_json::Value;

use super::model::{
    ApprovalState, CreateTaskPayload, MediaType, SetCopyApprovalPayload, Slot, Task,
    UpdateTaskPayload,
};
use crate::store::TaskStore;

/// Seam for the optimistic two-phase write: handlers mutate the local store
/// first, then hand the whole task here for fire-and-forget remote
/// persistence. Implemented by the webhook sync in the shared crate.
pub trait TaskSyncHook: Send + Sync {
    fn upsert(&self, task: &Task);
    /// Deferred variant for rapid-fire free-text edits (feedback, typed
    /// links): coalesced behind a quiescence window.
    fn upsert_debounced(&self, task: &Task);
    fn delete(&self, task_id: i64);
}

pub async fn load_tasks(store: &TaskStore) -> Result<Vec<Task>, String> {
    store.load().await
}

pub async fn get_task(store: &TaskStore, task_id: i64) -> Result<Task, String> {
    let tasks = store.load().await?;
    tasks
        .into_iter()
        .find(|t| t.id == task_id)
        .ok_or_else(|| "Task not found".to_string())
}

/// Create a new task. Ids are assigned as max existing id + 1 and are
/// immutable thereafter.
pub async fn create_task(store: &TaskStore, payload: CreateTaskPayload) -> Result<Task, String> {
    let now = chrono::Utc::now().to_rfc3339();
    store
        .mutate(move |tasks| {
            let id = tasks.iter().map(|t| t.id).max().unwrap_or(0) + 1;
            let mut task = Task {
                id,
                campaign_id: payload.campaign_id,
                name: payload.name,
                quantity: payload.quantity,
                media_type: MediaType::from_str_lossy(payload.media_type.as_deref().unwrap_or("")),
                script_assigned: payload.script_assigned,
                assigned_to: payload.assigned_to,
                created_at: now.clone(),
                updated_at: now,
                ..Task::default()
            };
            task.materialize_slots();
            tasks.push(task.clone());
            Ok(task)
        })
        .await
}

/// Apply a partial update: absent fields keep their stored value, present
/// array columns replace the stored column wholesale.
pub async fn update_task(
    store: &TaskStore,
    task_id: i64,
    patch: UpdateTaskPayload,
) -> Result<Task, String> {
    let now = chrono::Utc::now().to_rfc3339();
    store
        .mutate(move |tasks| {
            let task = tasks
                .iter_mut()
                .find(|t| t.id == task_id)
                .ok_or_else(|| "Task not found".to_string())?;
            apply_patch(task, patch, &now);
            task.touch(&now);
            task.materialize_slots();
            Ok(task.clone())
        })
        .await
}

pub async fn delete_task(store: &TaskStore, task_id: i64) -> Result<(), String> {
    store
        .mutate(move |tasks| {
            let before = tasks.len();
            tasks.retain(|t| t.id != task_id);
            if tasks.len() == before {
                Err("Task not found".to_string())
            } else {
                Ok(())
            }
        })
        .await
}

/// Record a copy review decision. `Left feedback` opens a feedback-capture
/// flow: it is only persisted together with non-empty feedback text.
pub async fn set_copy_approval(
    store: &TaskStore,
    task_id: i64,
    payload: SetCopyApprovalPayload,
) -> Result<Task, String> {
    let feedback = payload.feedback.unwrap_or_default();
    if payload.value == ApprovalState::LeftFeedback && feedback.trim().is_empty() {
        return Err("Feedback text is required".to_string());
    }
    let now = chrono::Utc::now().to_rfc3339();
    store
        .mutate(move |tasks| {
            let task = tasks
                .iter_mut()
                .find(|t| t.id == task_id)
                .ok_or_else(|| "Task not found".to_string())?;
            task.copy.approval = payload.value;
            task.copy.approval_at = Some(now.clone());
            if !feedback.is_empty() {
                task.copy.feedback = feedback;
            }
            task.touch(&now);
            Ok(task.clone())
        })
        .await
}

fn apply_patch(task: &mut Task, patch: UpdateTaskPayload, now: &str) {
    if let Some(name) = patch.name {
        task.name = name;
    }
    if let Some(campaign_id) = patch.campaign_id {
        task.campaign_id = Some(campaign_id);
    }
    if let Some(quantity) = patch.quantity {
        task.quantity = quantity;
    }
    if let Some(media_type) = patch.media_type {
        task.media_type = MediaType::from_str_lossy(&media_type);
    }
    if let Some(link) = patch.copy_link {
        task.copy.link = link;
    }
    if let Some(written) = patch.copy_written {
        // Writing copy stamps CopyWrittenAt unless the patch carries its own.
        if !written.is_empty() && patch.copy_written_at.is_none() {
            task.copy.written_at = Some(now.to_string());
        }
        task.copy.written = written;
    }
    if let Some(written_at) = patch.copy_written_at {
        task.copy.written_at = Some(written_at);
    }
    if let Some(feedback) = patch.copy_approval_feedback {
        task.copy.feedback = feedback;
    }
    if let Some(script_assigned) = patch.script_assigned {
        task.script_assigned = Some(script_assigned);
    }
    if let Some(assigned_to) = patch.assigned_to {
        task.assigned_to = Some(assigned_to);
    }

    if let Some(links) = patch.viewer_link {
        replace_column(&mut task.viewer, &links, |s, v| s.link = v);
    }
    if let Some(approvals) = patch.viewer_link_approval {
        replace_approvals(&mut task.viewer, &approvals);
    }
    if let Some(feedback) = patch.viewer_link_feedback {
        replace_column(&mut task.viewer, &feedback, |s, v| s.feedback = v);
    }
    if let Some(at) = patch.viewer_link_at {
        replace_column(&mut task.viewer, &at, |s, v| s.at = v);
    }
    if let Some(links) = patch.cali_variation {
        replace_column(&mut task.cali_variation, &links, |s, v| s.link = v);
    }
    if let Some(approvals) = patch.cali_variation_approval {
        replace_approvals(&mut task.cali_variation, &approvals);
    }
    if let Some(feedback) = patch.cali_variation_feedback {
        replace_column(&mut task.cali_variation, &feedback, |s, v| s.feedback = v);
    }
    if let Some(links) = patch.slack_permalink {
        replace_column(&mut task.slack_permalink, &links, |s, v| s.link = v);
    }
    if let Some(approvals) = patch.slack_permalink_approval {
        replace_approvals(&mut task.slack_permalink, &approvals);
    }
    if let Some(feedback) = patch.slack_permalink_feedback {
        replace_column(&mut task.slack_permalink, &feedback, |s, v| s.feedback = v);
    }
}

/// Replace one column across the slot list: entries beyond the new column's
/// length are reset to the column default, other columns are untouched.
fn replace_column<T: Default + Clone>(
    slots: &mut Vec<Slot>,
    values: &[T],
    set: impl Fn(&mut Slot, T),
) {
    if slots.len() < values.len() {
        slots.resize_with(values.len(), Slot::default);
    }
    for (i, slot) in slots.iter_mut().enumerate() {
        set(slot, values.get(i).cloned().unwrap_or_default());
    }
}

fn replace_approvals(slots: &mut Vec<Slot>, values: &[Value]) {
    replace_column(slots, values, |s, v| s.approval = ApprovalState::from_value(&v));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::model::Quantity;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    static COUNTER: AtomicU32 = AtomicU32::new(0);

    fn temp_store() -> TaskStore {
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let path = std::env::temp_dir().join(format!(
            "hyrax-tasks-test-{}-{}.json",
            std::process::id(),
            n
        ));
        let _ = std::fs::remove_file(&path);
        TaskStore::new(path)
    }

    fn create_payload(name: &str) -> CreateTaskPayload {
        serde_json::from_value(json!({"name": name})).unwrap()
    }

    #[tokio::test]
    async fn ids_are_max_plus_one() {
        let store = temp_store();
        let a = create_task(&store, create_payload("a")).await.unwrap();
        let b = create_task(&store, create_payload("b")).await.unwrap();
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);

        delete_task(&store, 1).await.unwrap();
        let c = create_task(&store, create_payload("c")).await.unwrap();
        assert_eq!(c.id, 3);
    }

    #[tokio::test]
    async fn create_materializes_slots_and_stamps_timestamps() {
        let store = temp_store();
        let payload: CreateTaskPayload =
            serde_json::from_value(json!({"name": "t", "quantity": "x3", "mediaType": "video"}))
                .unwrap();
        let task = create_task(&store, payload).await.unwrap();
        assert_eq!(task.viewer.len(), 6);
        assert!(!task.created_at.is_empty());
        assert_eq!(task.created_at, task.updated_at);
    }

    #[tokio::test]
    async fn patch_replaces_arrays_wholesale() {
        let store = temp_store();
        let payload: CreateTaskPayload =
            serde_json::from_value(json!({"name": "t", "quantity": 3})).unwrap();
        let task = create_task(&store, payload).await.unwrap();

        let patch: UpdateTaskPayload = serde_json::from_value(json!({
            "viewerLink": ["http://a", "http://b", "http://c"],
        }))
        .unwrap();
        update_task(&store, task.id, patch).await.unwrap();

        // A shorter replacement clears the dropped tail of that column only.
        let patch: UpdateTaskPayload = serde_json::from_value(json!({
            "viewerLink": ["http://a"],
            "viewerLinkFeedback": ["", "too dark"],
        }))
        .unwrap();
        let task = update_task(&store, task.id, patch).await.unwrap();
        assert_eq!(task.viewer[0].link, "http://a");
        assert_eq!(task.viewer[1].link, "");
        assert_eq!(task.viewer[2].link, "");
        assert_eq!(task.viewer[1].feedback, "too dark");
    }

    #[tokio::test]
    async fn patch_keeps_absent_fields() {
        let store = temp_store();
        let payload: CreateTaskPayload =
            serde_json::from_value(json!({"name": "keep me", "quantity": 2})).unwrap();
        let task = create_task(&store, payload).await.unwrap();

        let patch: UpdateTaskPayload =
            serde_json::from_value(json!({"assignedTo": "u-9"})).unwrap();
        let updated = update_task(&store, task.id, patch).await.unwrap();
        assert_eq!(updated.name, "keep me");
        assert_eq!(updated.quantity, Quantity(json!(2)));
        assert_eq!(updated.assigned_to.as_deref(), Some("u-9"));
        assert!(updated.updated_at >= task.updated_at);
    }

    #[tokio::test]
    async fn writing_copy_stamps_copy_written_at() {
        let store = temp_store();
        let task = create_task(&store, create_payload("t")).await.unwrap();
        let patch: UpdateTaskPayload =
            serde_json::from_value(json!({"copyWritten": "Final caption text"})).unwrap();
        let updated = update_task(&store, task.id, patch).await.unwrap();
        assert_eq!(updated.copy.written, "Final caption text");
        assert!(updated.copy.written_at.is_some());
    }

    #[tokio::test]
    async fn left_feedback_requires_text() {
        let store = temp_store();
        let task = create_task(&store, create_payload("t")).await.unwrap();

        let payload: SetCopyApprovalPayload =
            serde_json::from_value(json!({"value": "Left feedback", "feedback": "  "})).unwrap();
        assert!(set_copy_approval(&store, task.id, payload).await.is_err());

        let payload: SetCopyApprovalPayload = serde_json::from_value(
            json!({"value": "Left feedback", "feedback": "hook is buried"}),
        )
        .unwrap();
        let updated = set_copy_approval(&store, task.id, payload).await.unwrap();
        assert_eq!(updated.copy.approval, ApprovalState::LeftFeedback);
        assert_eq!(updated.copy.feedback, "hook is buried");
        assert!(updated.copy.approval_at.is_some());
    }

    #[tokio::test]
    async fn other_approvals_do_not_require_text() {
        let store = temp_store();
        let task = create_task(&store, create_payload("t")).await.unwrap();
        let payload: SetCopyApprovalPayload =
            serde_json::from_value(json!({"value": "Approved"})).unwrap();
        let updated = set_copy_approval(&store, task.id, payload).await.unwrap();
        assert_eq!(updated.copy.approval, ApprovalState::Approved);
    }

    #[tokio::test]
    async fn missing_task_is_reported() {
        let store = temp_store();
        assert!(get_task(&store, 42).await.is_err());
        assert!(update_task(&store, 42, UpdateTaskPayload::default())
            .await
            .is_err());
        assert!(delete_task(&store, 42).await.is_err());
    }
}
