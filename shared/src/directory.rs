use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use hyrax_atoms::campaigns::model::Campaign;
use hyrax_atoms::campaigns::service as campaigns;
use hyrax_atoms::users::model::User;
use hyrax_atoms::users::service as users;

/// How long a directory snapshot stays fresh before the next read triggers
/// a refetch.
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(5 * 60);

struct Snapshot {
    users: Vec<User>,
    campaigns: Vec<Campaign>,
    fetched_at: Option<Instant>,
}

/// Read-through cache over the external user and campaign directories.
///
/// The webhook response is the source of truth: a successful fetch replaces
/// the snapshot wholesale. On failure the stale snapshot is kept and the
/// error is only logged - the directories being briefly unreachable must
/// not take the app down. A seed user list (from the environment) serves
/// until the first successful fetch, or indefinitely when no directory URL
/// is configured.
pub struct DirectoryCache {
    http: reqwest::Client,
    users_url: Option<String>,
    campaigns_url: Option<String>,
    snapshot: RwLock<Snapshot>,
}

impl DirectoryCache {
    pub fn new(
        http: reqwest::Client,
        users_url: Option<String>,
        campaigns_url: Option<String>,
        seed_users: Vec<User>,
    ) -> Self {
        DirectoryCache {
            http,
            users_url,
            campaigns_url,
            snapshot: RwLock::new(Snapshot {
                users: seed_users,
                campaigns: Vec::new(),
                fetched_at: None,
            }),
        }
    }

    pub async fn users(&self) -> Vec<User> {
        self.ensure_fresh().await;
        self.snapshot.read().await.users.clone()
    }

    pub async fn campaigns(&self) -> Vec<Campaign> {
        self.ensure_fresh().await;
        self.snapshot.read().await.campaigns.clone()
    }

    async fn ensure_fresh(&self) {
        if self.users_url.is_none() && self.campaigns_url.is_none() {
            return;
        }
        let stale = {
            let snapshot = self.snapshot.read().await;
            snapshot
                .fetched_at
                .is_none_or(|at| at.elapsed() >= REFRESH_INTERVAL)
        };
        if stale {
            self.refresh().await;
        }
    }

    /// Fetch both directories and replace the snapshot wholesale.
    pub async fn refresh(&self) {
        let fetched_users = match &self.users_url {
            Some(url) => match self.fetch(url).await {
                Ok(body) => Some(users::parse_directory(&body)),
                Err(e) => {
                    tracing::warn!("User directory fetch failed: {}", e);
                    None
                }
            },
            None => None,
        };
        let fetched_campaigns = match &self.campaigns_url {
            Some(url) => match self.fetch(url).await {
                Ok(body) => Some(campaigns::parse_directory(&body)),
                Err(e) => {
                    tracing::warn!("Campaign directory fetch failed: {}", e);
                    None
                }
            },
            None => None,
        };

        let mut snapshot = self.snapshot.write().await;
        if let Some(users) = fetched_users {
            tracing::info!(count = users.len(), "User directory refreshed");
            snapshot.users = users;
        }
        if let Some(campaigns) = fetched_campaigns {
            tracing::info!(count = campaigns.len(), "Campaign directory refreshed");
            snapshot.campaigns = campaigns;
        }
        // Failed fetches still push the next attempt out a full interval;
        // hammering an unreachable webhook on every request helps nobody.
        snapshot.fetched_at = Some(Instant::now());
    }

    async fn fetch(&self, url: &str) -> Result<serde_json::Value, String> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            return Err(format!("directory returned {}", response.status()));
        }
        response.json().await.map_err(|e| e.to_string())
    }
}
