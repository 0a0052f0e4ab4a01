use chrono::{DateTime, Utc};
use serde::Serialize;

use hyrax_atoms::tasks::model::{SlotKind, Task};
use hyrax_atoms::users::model::Department;

use crate::slots::approved_slot_count;

/// Aggregate completion counts shown on the dashboard. `total - completed`
/// is displayed as "remaining".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    pub fn remaining(self) -> usize {
        self.total.saturating_sub(self.completed)
    }
}

/// Weekly progress over a task set.
///
/// Creative departments are scored per slot; media buyers per task, on the
/// single copy artifact. The `min` guards against slot lists that were
/// over-grown by stray writes - approvals beyond the required count never
/// push `completed` past `total`.
pub fn weekly_progress(tasks: &[Task], department: Department) -> Progress {
    match department {
        Department::VideoEditing | Department::GraphicDesign => {
            let mut total = 0;
            let mut completed = 0;
            for task in tasks {
                let required = task.required_slot_count();
                total += required;
                completed += approved_slot_count(task, SlotKind::Viewer).min(required);
            }
            Progress { completed, total }
        }
        _ => Progress {
            completed: tasks.iter().filter(|t| t.copy.approval.is_approved()).count(),
            total: tasks.len(),
        },
    }
}

/// Work finished during the current UTC calendar day.
///
/// Creative departments count slot events, not tasks - one task with three
/// artifacts uploaded today contributes three. Media buyers count tasks by
/// `CopyWrittenAt`.
pub fn done_today(tasks: &[Task], department: Department, now: DateTime<Utc>) -> usize {
    match department {
        Department::VideoEditing | Department::GraphicDesign => tasks
            .iter()
            .flat_map(|t| t.viewer.iter())
            .filter(|s| s.at.as_deref().is_some_and(|ts| same_utc_day(ts, now)))
            .count(),
        _ => tasks
            .iter()
            .filter(|t| {
                t.copy
                    .written_at
                    .as_deref()
                    .is_some_and(|ts| same_utc_day(ts, now))
            })
            .count(),
    }
}

/// Tasks visible to a department/assignee pair: creative departments see
/// their media type's tasks (by producer), media buyers see tasks they
/// author copy for.
pub fn tasks_for<'a>(
    tasks: &'a [Task],
    department: Department,
    assignee: Option<&str>,
) -> Vec<&'a Task> {
    tasks
        .iter()
        .filter(|t| match department {
            Department::VideoEditing | Department::GraphicDesign => {
                t.media_type.eligible_department() == department
                    && assignee.is_none_or(|a| t.assigned_to.as_deref() == Some(a))
            }
            Department::MediaBuying => {
                assignee.is_none_or(|a| t.script_assigned.as_deref() == Some(a))
            }
            Department::Dev => true,
        })
        .collect()
}

/// Unparsable timestamps never count - degrade, don't crash.
fn same_utc_day(ts: &str, now: DateTime<Utc>) -> bool {
    DateTime::parse_from_rfc3339(ts)
        .map(|dt| dt.with_timezone(&Utc).date_naive() == now.date_naive())
        .unwrap_or(false)
}
