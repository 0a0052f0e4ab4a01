use serde::{Deserialize, Serialize};

/// Campaign reference data, owned by the external campaign directory.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct Campaign {
    pub id: i64,
    pub name: String,
    /// Optional external Slack channel reference.
    pub slack_id: Option<String>,
}
