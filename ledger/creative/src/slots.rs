use hyrax_atoms::store::TaskStore;
use hyrax_atoms::tasks::model::{ApprovalState, Slot, SlotKind, Task};

const TASK_NOT_FOUND: &str = "Task not found";

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Negative slot index on a write. A caller bug - reads normalize
    /// out-of-range indices, writes reject them.
    #[error("Invalid slot index: {0}")]
    InvalidSlotIndex(i64),

    #[error("Task {0} not found")]
    TaskNotFound(i64),

    #[error("Store error: {0}")]
    Store(String),
}

/// Required slot count for a task: parsed quantity x sub-formats per
/// creative (2 for VIDEO, 1 for IMAGE).
pub fn required_slot_count(task: &Task) -> usize {
    task.required_slot_count()
}

/// Derived status of one slot.
///
/// An approved-family entry (`Approved`, `Uploaded`, legacy `true`) wins
/// outright, even with no link present - reviewer state is authoritative
/// once recorded. Any other explicitly recorded state is preserved
/// verbatim. Only when nothing was recorded does link presence decide
/// between `In Progress` and `Not Done`.
pub fn slot_status(task: &Task, kind: SlotKind, index: usize) -> ApprovalState {
    let slot = task.slots(kind).get(index);
    let approval = slot.map(|s| s.approval).unwrap_or_default();
    if approval.is_approved() {
        return ApprovalState::Approved;
    }
    if approval.is_explicit() {
        return approval;
    }
    match slot {
        Some(s) if !s.link.is_empty() => ApprovalState::InProgress,
        _ => ApprovalState::NotDone,
    }
}

/// Slots whose derived status is `Approved`.
pub fn approved_slot_count(task: &Task, kind: SlotKind) -> usize {
    (0..task.slots(kind).len())
        .filter(|&i| slot_status(task, kind, i) == ApprovalState::Approved)
        .count()
}

/// Record an uploaded artifact link. Pads the slot list up to the index,
/// then writes the link and forces the approval back to `Needs Review` -
/// replacing the artifact of a previously approved slot always reverts it
/// to pending review. Stamps the slot timestamp and `updatedAt`.
pub fn set_slot_artifact(
    task: &mut Task,
    kind: SlotKind,
    index: i64,
    url: &str,
) -> Result<(), LedgerError> {
    let index = check_index(index)?;
    let now = chrono::Utc::now().to_rfc3339();
    let slot = slot_at(task, kind, index);
    slot.link = url.to_string();
    slot.approval = ApprovalState::NeedsReview;
    slot.at = Some(now.clone());
    task.touch(&now);
    Ok(())
}

/// Record a review decision for one slot. Pads and writes the approval
/// column only.
pub fn set_slot_approval(
    task: &mut Task,
    kind: SlotKind,
    index: i64,
    value: ApprovalState,
) -> Result<(), LedgerError> {
    let index = check_index(index)?;
    let now = chrono::Utc::now().to_rfc3339();
    slot_at(task, kind, index).approval = value;
    task.touch(&now);
    Ok(())
}

/// Record reviewer feedback for one slot. Pads and writes the feedback
/// column only - link and approval are untouched.
pub fn set_slot_feedback(
    task: &mut Task,
    kind: SlotKind,
    index: i64,
    text: &str,
) -> Result<(), LedgerError> {
    let index = check_index(index)?;
    let now = chrono::Utc::now().to_rfc3339();
    slot_at(task, kind, index).feedback = text.to_string();
    task.touch(&now);
    Ok(())
}

/// Clear a slot in place. Indices are never removed or shifted - clearing
/// rather than splicing is what keeps every higher index aligned with its
/// approval and feedback entries.
pub fn delete_slot_artifact(
    task: &mut Task,
    kind: SlotKind,
    index: i64,
) -> Result<(), LedgerError> {
    let index = check_index(index)?;
    let now = chrono::Utc::now().to_rfc3339();
    if let Some(slot) = task.slots_mut(kind).get_mut(index) {
        slot.link = String::new();
        slot.approval = ApprovalState::NotDone;
        slot.feedback = String::new();
    }
    task.touch(&now);
    Ok(())
}

fn check_index(index: i64) -> Result<usize, LedgerError> {
    usize::try_from(index).map_err(|_| LedgerError::InvalidSlotIndex(index))
}

/// Grow the slot list until `index` is addressable, then hand it out.
/// Existing entries are never disturbed.
fn slot_at(task: &mut Task, kind: SlotKind, index: usize) -> &mut Slot {
    let slots = task.slots_mut(kind);
    if slots.len() <= index {
        slots.resize_with(index + 1, Slot::default);
    }
    &mut slots[index]
}

/// Load-mutate-save wrapper: apply one slot write to the stored task and
/// return the updated task for the optimistic remote sync.
pub async fn apply<F>(
    store: &TaskStore,
    task_id: i64,
    write: F,
) -> Result<Task, LedgerError>
where
    F: FnOnce(&mut Task) -> Result<(), LedgerError>,
{
    // Validate nothing store-side here; the write itself carries the
    // index check so pure-fn callers get the same behavior.
    let result = store
        .mutate(move |tasks| {
            let task = tasks
                .iter_mut()
                .find(|t| t.id == task_id)
                .ok_or_else(|| TASK_NOT_FOUND.to_string())?;
            write(task).map_err(|e| e.to_string())?;
            Ok(task.clone())
        })
        .await;
    result.map_err(|e| {
        if e == TASK_NOT_FOUND {
            LedgerError::TaskNotFound(task_id)
        } else if e.starts_with("Invalid slot index") {
            let raw = e.rsplit(' ').next().and_then(|s| s.parse().ok()).unwrap_or(-1);
            LedgerError::InvalidSlotIndex(raw)
        } else {
            LedgerError::Store(e)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn task(value: serde_json::Value) -> Task {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn approval_wins_even_without_a_link() {
        let t = task(json!({
            "quantity": 1,
            "mediaType": "IMAGE",
            "viewerLink": [""],
            "viewerLinkApproval": ["Approved"],
        }));
        assert_eq!(
            slot_status(&t, SlotKind::Viewer, 0),
            ApprovalState::Approved
        );
    }

    #[test]
    fn legacy_true_and_uploaded_derive_as_approved() {
        let t = task(json!({
            "quantity": 2,
            "mediaType": "IMAGE",
            "viewerLinkApproval": [true, "Uploaded"],
        }));
        assert_eq!(slot_status(&t, SlotKind::Viewer, 0), ApprovalState::Approved);
        assert_eq!(slot_status(&t, SlotKind::Viewer, 1), ApprovalState::Approved);
    }

    #[test]
    fn link_presence_means_in_progress() {
        let t = task(json!({
            "quantity": 1,
            "mediaType": "IMAGE",
            "viewerLink": ["http://x"],
        }));
        assert_eq!(
            slot_status(&t, SlotKind::Viewer, 0),
            ApprovalState::InProgress
        );
    }

    #[test]
    fn explicit_review_states_are_preserved_verbatim() {
        let t = task(json!({
            "quantity": 2,
            "mediaType": "IMAGE",
            "viewerLink": ["http://x", "http://y"],
            "viewerLinkApproval": ["Needs Review", "Left feedback"],
        }));
        assert_eq!(
            slot_status(&t, SlotKind::Viewer, 0),
            ApprovalState::NeedsReview
        );
        assert_eq!(
            slot_status(&t, SlotKind::Viewer, 1),
            ApprovalState::LeftFeedback
        );
    }

    #[test]
    fn out_of_range_reads_are_not_done() {
        let t = task(json!({"quantity": 1, "mediaType": "IMAGE"}));
        assert_eq!(
            slot_status(&t, SlotKind::Viewer, 99),
            ApprovalState::NotDone
        );
    }

    #[test]
    fn artifact_write_pads_without_disturbing_neighbors() {
        let mut t = task(json!({
            "quantity": 5,
            "mediaType": "IMAGE",
            "viewerLink": ["http://a", "http://b"],
            "viewerLinkApproval": ["Approved", "Needs Review"],
            "viewerLinkFeedback": ["good", ""],
        }));
        // Materialization already brought the list to 5; drop back down to
        // prove the write itself pads.
        t.viewer.truncate(2);

        set_slot_artifact(&mut t, SlotKind::Viewer, 4, "http://e").unwrap();
        assert_eq!(t.viewer.len(), 5);
        assert_eq!(t.viewer[0].link, "http://a");
        assert_eq!(t.viewer[0].approval, ApprovalState::Approved);
        assert_eq!(t.viewer[0].feedback, "good");
        assert_eq!(t.viewer[2], Slot::default());
        assert_eq!(t.viewer[3], Slot::default());
        assert_eq!(t.viewer[4].link, "http://e");
        assert_eq!(t.viewer[4].approval, ApprovalState::NeedsReview);
        assert!(t.viewer[4].at.is_some());
    }

    #[test]
    fn replacing_an_approved_artifact_reverts_to_needs_review() {
        let mut t = task(json!({
            "quantity": 1,
            "mediaType": "IMAGE",
            "viewerLink": ["http://v1"],
            "viewerLinkApproval": ["Approved"],
        }));
        set_slot_artifact(&mut t, SlotKind::Viewer, 0, "http://v2").unwrap();
        assert_eq!(t.viewer[0].approval, ApprovalState::NeedsReview);
        assert_eq!(t.viewer[0].link, "http://v2");
    }

    #[test]
    fn feedback_write_leaves_link_and_approval_alone() {
        let mut t = task(json!({
            "quantity": 1,
            "mediaType": "IMAGE",
            "viewerLink": ["http://x"],
            "viewerLinkApproval": ["Needs Review"],
        }));
        set_slot_feedback(&mut t, SlotKind::Viewer, 0, "logo too small").unwrap();
        assert_eq!(t.viewer[0].feedback, "logo too small");
        assert_eq!(t.viewer[0].link, "http://x");
        assert_eq!(t.viewer[0].approval, ApprovalState::NeedsReview);
    }

    #[test]
    fn delete_clears_in_place_and_keeps_alignment() {
        let mut t = task(json!({
            "quantity": 3,
            "mediaType": "IMAGE",
            "viewerLink": ["http://a", "http://b", "http://c"],
            "viewerLinkApproval": ["Approved", "Approved", "Needs Review"],
            "viewerLinkFeedback": ["", "redo", "crop"],
        }));
        delete_slot_artifact(&mut t, SlotKind::Viewer, 1).unwrap();
        assert_eq!(t.viewer.len(), 3);
        assert_eq!(t.viewer[0].link, "http://a");
        assert_eq!(t.viewer[0].approval, ApprovalState::Approved);
        assert_eq!(t.viewer[1].link, "");
        assert_eq!(t.viewer[1].approval, ApprovalState::NotDone);
        assert_eq!(t.viewer[1].feedback, "");
        assert_eq!(t.viewer[2].link, "http://c");
        assert_eq!(t.viewer[2].feedback, "crop");
    }

    #[test]
    fn negative_index_writes_are_rejected() {
        let mut t = task(json!({"quantity": 1, "mediaType": "IMAGE"}));
        let before = t.clone();
        assert!(matches!(
            set_slot_artifact(&mut t, SlotKind::Viewer, -1, "http://x"),
            Err(LedgerError::InvalidSlotIndex(-1))
        ));
        assert!(matches!(
            set_slot_approval(&mut t, SlotKind::Viewer, -3, ApprovalState::Approved),
            Err(LedgerError::InvalidSlotIndex(-3))
        ));
        assert_eq!(t, before);
    }

    #[test]
    fn sibling_families_follow_the_same_rules() {
        let mut t = task(json!({"quantity": 2, "mediaType": "IMAGE"}));
        set_slot_artifact(&mut t, SlotKind::CaliVariation, 1, "http://cali").unwrap();
        assert_eq!(t.cali_variation[1].link, "http://cali");
        assert_eq!(t.cali_variation[1].approval, ApprovalState::NeedsReview);
        // The viewer family is untouched.
        assert_eq!(t.viewer[1], Slot::default());
    }
}
