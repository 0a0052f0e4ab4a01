use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::users::model::Department;

/// Review state vocabulary shared by creative slots and the task-level copy
/// artifact. Legacy records stored boolean `true` instead of `"Approved"`;
/// that migration happens once, when a record is parsed; everything past
/// the serde boundary only ever sees this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApprovalState {
    #[default]
    NotDone,
    InProgress,
    NeedsReview,
    LeftFeedback,
    Approved,
    /// Legacy synonym for Approved still present in stored tasks.
    Uploaded,
}

impl ApprovalState {
    /// Parse a raw stored value. Booleans are the legacy encoding
    /// (`true` = approved); anything unrecognized degrades to `Not Done`.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Bool(true) => Self::Approved,
            Value::String(s) => Self::from_str_lossy(s),
            _ => Self::NotDone,
        }
    }

    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "Approved" => Self::Approved,
            "Uploaded" => Self::Uploaded,
            "In Progress" => Self::InProgress,
            "Needs Review" => Self::NeedsReview,
            "Left feedback" => Self::LeftFeedback,
            _ => Self::NotDone,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotDone => "Not Done",
            Self::InProgress => "In Progress",
            Self::NeedsReview => "Needs Review",
            Self::LeftFeedback => "Left feedback",
            Self::Approved => "Approved",
            Self::Uploaded => "Uploaded",
        }
    }

    /// `Uploaded` counts as approved wherever completion is scored.
    pub fn is_approved(self) -> bool {
        matches!(self, Self::Approved | Self::Uploaded)
    }

    /// Whether a reviewer has recorded anything at all for this entry.
    pub fn is_explicit(self) -> bool {
        !matches!(self, Self::NotDone)
    }
}

impl Serialize for ApprovalState {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ApprovalState {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_value(&value))
    }
}

/// Determines the eligible department roster and how many sub-formats each
/// creative slot has (video slots ship a "Facebook Format" and a "Reel").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MediaType {
    #[default]
    Image,
    Video,
}

impl MediaType {
    pub fn from_str_lossy(s: &str) -> Self {
        if s.eq_ignore_ascii_case("video") {
            Self::Video
        } else {
            Self::Image
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "IMAGE",
            Self::Video => "VIDEO",
        }
    }

    pub fn formats_per_creative(self) -> u32 {
        match self {
            Self::Video => 2,
            Self::Image => 1,
        }
    }

    /// Which department's roster may be assigned tasks of this type.
    pub fn eligible_department(self) -> Department {
        match self {
            Self::Video => Department::VideoEditing,
            Self::Image => Department::GraphicDesign,
        }
    }
}

/// Raw quantity field as received from the store: free text (`"x5"`), a bare
/// number, or absent. Parsing happens at derivation time so that whatever the
/// upstream wrote survives a round trip untouched.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(transparent)]
pub struct Quantity(pub Value);

impl Quantity {
    /// Number of creatives required. Extracts the first contiguous digit run
    /// from text (`"x5"` -> 5); absent, unparsable or zero values default to
    /// 1, matching the falsy-default the data was written against.
    pub fn required(&self) -> u32 {
        let parsed = match &self.0 {
            Value::Number(n) => u32::try_from(n.as_u64().unwrap_or(0)).unwrap_or(0),
            Value::String(s) => first_digit_run(s),
            _ => 0,
        };
        if parsed == 0 {
            1
        } else {
            parsed
        }
    }
}

fn first_digit_run(s: &str) -> u32 {
    s.chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect::<String>()
        .parse()
        .unwrap_or(0)
}

/// One required creative deliverable within a task: the artifact link, its
/// review state, reviewer feedback, and when the artifact was last set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Slot {
    pub link: String,
    pub approval: ApprovalState,
    pub feedback: String,
    pub at: Option<String>,
}

/// Selects one of the slot-indexed link families on a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SlotKind {
    #[default]
    Viewer,
    CaliVariation,
    SlackPermalink,
}

impl SlotKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "viewer" => Some(Self::Viewer),
            "caliVariation" => Some(Self::CaliVariation),
            "slackPermalink" => Some(Self::SlackPermalink),
            _ => None,
        }
    }
}

/// The single script/caption artifact attached to a task and its review
/// state. Media buyers are scored on this, not on slots.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CopyArtifact {
    pub approval: ApprovalState,
    pub link: String,
    pub written: String,
    pub feedback: String,
    pub written_at: Option<String>,
    pub approval_at: Option<String>,
}

/// Task domain model - a unit of creative work within a campaign.
///
/// Each link family holds one ordered `Vec<Slot>`; the stored wire format
/// ([`TaskRecord`]) keeps the original parallel arrays, and the conversion
/// between the two materializes the vectors to the required slot count so
/// consumers never bounds-check.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(from = "TaskRecord", into = "TaskRecord")]
pub struct Task {
    pub id: i64,
    pub campaign_id: Option<i64>,
    pub name: String,
    pub quantity: Quantity,
    pub media_type: MediaType,
    pub copy: CopyArtifact,
    pub viewer: Vec<Slot>,
    pub cali_variation: Vec<Slot>,
    pub slack_permalink: Vec<Slot>,
    /// Copy author.
    pub script_assigned: Option<String>,
    /// Creative producer.
    pub assigned_to: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Task {
    /// Required slot count: parsed quantity x sub-formats per creative
    /// (2 for VIDEO, 1 for IMAGE).
    pub fn required_slot_count(&self) -> usize {
        self.quantity.required() as usize * self.media_type.formats_per_creative() as usize
    }

    /// Grow every slot family to at least the required slot count. Never
    /// shrinks: stray entries beyond the required count are kept so nothing
    /// recorded upstream is dropped.
    pub fn materialize_slots(&mut self) {
        let need = self.required_slot_count();
        for kind in [SlotKind::Viewer, SlotKind::CaliVariation, SlotKind::SlackPermalink] {
            let slots = self.slots_mut(kind);
            if slots.len() < need {
                slots.resize_with(need, Slot::default);
            }
        }
    }

    pub fn slots(&self, kind: SlotKind) -> &[Slot] {
        match kind {
            SlotKind::Viewer => &self.viewer,
            SlotKind::CaliVariation => &self.cali_variation,
            SlotKind::SlackPermalink => &self.slack_permalink,
        }
    }

    pub fn slots_mut(&mut self, kind: SlotKind) -> &mut Vec<Slot> {
        match kind {
            SlotKind::Viewer => &mut self.viewer,
            SlotKind::CaliVariation => &mut self.cali_variation,
            SlotKind::SlackPermalink => &mut self.slack_permalink,
        }
    }

    pub fn touch(&mut self, now: &str) {
        self.updated_at = now.to_string();
    }
}

/// Stored/wire representation of a [`Task`]: the original parallel-array
/// layout, slot-index aligned (`viewerLinkApproval[i]` describes
/// `viewerLink[i]`). Kept so a store round trip is byte-compatible with
/// what the upstream webhook wrote.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct TaskRecord {
    pub id: i64,
    pub campaign_id: Option<i64>,
    pub name: String,
    pub quantity: Quantity,
    pub media_type: String,
    pub copy_approval: Value,
    pub copy_link: String,
    pub copy_written: Value,
    pub copy_approval_feedback: String,
    #[serde(rename = "CopyWrittenAt")]
    pub copy_written_at: Option<String>,
    pub copy_approval_at: Option<String>,
    pub viewer_link: Vec<String>,
    pub viewer_link_approval: Vec<Value>,
    pub viewer_link_feedback: Vec<String>,
    pub viewer_link_at: Vec<Option<String>>,
    pub cali_variation: Vec<String>,
    pub cali_variation_approval: Vec<Value>,
    pub cali_variation_feedback: Vec<String>,
    pub slack_permalink: Vec<String>,
    pub slack_permalink_approval: Vec<Value>,
    pub slack_permalink_feedback: Vec<String>,
    pub script_assigned: Option<String>,
    pub assigned_to: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

fn slots_from_columns(
    links: Vec<String>,
    approvals: Vec<Value>,
    feedback: Vec<String>,
    at: Vec<Option<String>>,
) -> Vec<Slot> {
    let len = links
        .len()
        .max(approvals.len())
        .max(feedback.len())
        .max(at.len());
    (0..len)
        .map(|i| Slot {
            link: links.get(i).cloned().unwrap_or_default(),
            approval: approvals.get(i).map(ApprovalState::from_value).unwrap_or_default(),
            feedback: feedback.get(i).cloned().unwrap_or_default(),
            at: at.get(i).cloned().flatten(),
        })
        .collect()
}

fn columns_from_slots(slots: &[Slot]) -> (Vec<String>, Vec<Value>, Vec<String>) {
    let links = slots.iter().map(|s| s.link.clone()).collect();
    let approvals = slots
        .iter()
        .map(|s| Value::String(s.approval.as_str().to_string()))
        .collect();
    let feedback = slots.iter().map(|s| s.feedback.clone()).collect();
    (links, approvals, feedback)
}

impl From<TaskRecord> for Task {
    fn from(rec: TaskRecord) -> Self {
        let mut task = Task {
            id: rec.id,
            campaign_id: rec.campaign_id,
            name: rec.name,
            quantity: rec.quantity,
            media_type: MediaType::from_str_lossy(&rec.media_type),
            copy: CopyArtifact {
                approval: ApprovalState::from_value(&rec.copy_approval),
                link: rec.copy_link,
                written: match rec.copy_written {
                    Value::String(s) => s,
                    _ => String::new(),
                },
                feedback: rec.copy_approval_feedback,
                written_at: rec.copy_written_at,
                approval_at: rec.copy_approval_at,
            },
            viewer: slots_from_columns(
                rec.viewer_link,
                rec.viewer_link_approval,
                rec.viewer_link_feedback,
                rec.viewer_link_at,
            ),
            cali_variation: slots_from_columns(
                rec.cali_variation,
                rec.cali_variation_approval,
                rec.cali_variation_feedback,
                vec![],
            ),
            slack_permalink: slots_from_columns(
                rec.slack_permalink,
                rec.slack_permalink_approval,
                rec.slack_permalink_feedback,
                vec![],
            ),
            script_assigned: rec.script_assigned,
            assigned_to: rec.assigned_to,
            created_at: rec.created_at,
            updated_at: rec.updated_at,
        };
        task.materialize_slots();
        task
    }
}

impl From<Task> for TaskRecord {
    fn from(task: Task) -> Self {
        let (viewer_link, viewer_link_approval, viewer_link_feedback) =
            columns_from_slots(&task.viewer);
        let viewer_link_at = task.viewer.iter().map(|s| s.at.clone()).collect();
        let (cali_variation, cali_variation_approval, cali_variation_feedback) =
            columns_from_slots(&task.cali_variation);
        let (slack_permalink, slack_permalink_approval, slack_permalink_feedback) =
            columns_from_slots(&task.slack_permalink);
        TaskRecord {
            id: task.id,
            campaign_id: task.campaign_id,
            name: task.name,
            quantity: task.quantity,
            media_type: task.media_type.as_str().to_string(),
            copy_approval: Value::String(task.copy.approval.as_str().to_string()),
            copy_link: task.copy.link,
            copy_written: Value::String(task.copy.written),
            copy_approval_feedback: task.copy.feedback,
            copy_written_at: task.copy.written_at,
            copy_approval_at: task.copy.approval_at,
            viewer_link,
            viewer_link_approval,
            viewer_link_feedback,
            viewer_link_at,
            cali_variation,
            cali_variation_approval,
            cali_variation_feedback,
            slack_permalink,
            slack_permalink_approval,
            slack_permalink_feedback,
            script_assigned: task.script_assigned,
            assigned_to: task.assigned_to,
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskPayload {
    pub name: String,
    pub campaign_id: Option<i64>,
    #[serde(default)]
    pub quantity: Quantity,
    #[serde(default)]
    pub media_type: Option<String>,
    pub script_assigned: Option<String>,
    pub assigned_to: Option<String>,
}

/// Partial update. `{...existing, ...patch}` semantics: absent fields keep
/// their stored value, present arrays replace the stored column wholesale.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateTaskPayload {
    pub name: Option<String>,
    pub campaign_id: Option<i64>,
    pub quantity: Option<Quantity>,
    pub media_type: Option<String>,
    pub copy_link: Option<String>,
    pub copy_written: Option<String>,
    pub copy_approval_feedback: Option<String>,
    #[serde(rename = "CopyWrittenAt")]
    pub copy_written_at: Option<String>,
    pub script_assigned: Option<String>,
    pub assigned_to: Option<String>,
    pub viewer_link: Option<Vec<String>>,
    pub viewer_link_approval: Option<Vec<Value>>,
    pub viewer_link_feedback: Option<Vec<String>>,
    pub viewer_link_at: Option<Vec<Option<String>>>,
    pub cali_variation: Option<Vec<String>>,
    pub cali_variation_approval: Option<Vec<Value>>,
    pub cali_variation_feedback: Option<Vec<String>>,
    pub slack_permalink: Option<Vec<String>>,
    pub slack_permalink_approval: Option<Vec<Value>>,
    pub slack_permalink_feedback: Option<Vec<String>>,
}

/// Task-level copy review write. Setting `Left feedback` requires non-empty
/// feedback text; the service rejects it otherwise.
#[derive(Debug, Deserialize)]
pub struct SetCopyApprovalPayload {
    pub value: ApprovalState,
    pub feedback: Option<String>,
}
