pub mod auth;
pub mod directory;
pub mod persist;
pub mod types;
pub mod uploads;

use std::env;

use hyrax_atoms::store::TaskStore;
use hyrax_atoms::users::model::User;
use hyrax_atoms::users::service as users;

use directory::DirectoryCache;
use persist::TaskSync;
use uploads::UploadRegistry;

/// Environment-driven configuration. Webhook URLs are optional: a missing
/// collaborator degrades that feature (no remote sync, no uploads) instead
/// of failing startup.
pub struct Config {
    pub tasks_file: String,
    pub auth_secret: String,
    /// Bootstrap user list, used until the user directory answers (or
    /// indefinitely when no directory is configured).
    pub users_seed: Vec<User>,
    pub user_directory_url: Option<String>,
    pub campaign_directory_url: Option<String>,
    pub task_persist_url: Option<String>,
    pub upload_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        let users_seed = env::var("HYRAX_USERS")
            .ok()
            .and_then(|raw| serde_json::from_str::<serde_json::Value>(&raw).ok())
            .map(|body| users::parse_directory(&body))
            .unwrap_or_default();
        Config {
            tasks_file: env::var("HYRAX_TASKS_FILE").unwrap_or_else(|_| "hyrax-tasks.json".to_string()),
            auth_secret: env::var("HYRAX_AUTH_SECRET").expect("HYRAX_AUTH_SECRET must be set"),
            users_seed,
            user_directory_url: env::var("USER_DIRECTORY_URL").ok(),
            campaign_directory_url: env::var("CAMPAIGN_DIRECTORY_URL").ok(),
            task_persist_url: env::var("TASK_PERSIST_URL").ok(),
            upload_url: env::var("UPLOAD_URL").ok(),
        }
    }
}

/// Shared handles threaded through every request handler.
pub struct AppState {
    pub http: reqwest::Client,
    pub store: TaskStore,
    pub directory: DirectoryCache,
    pub sync: TaskSync,
    pub uploads: UploadRegistry,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let http = reqwest::Client::new();
        let store = TaskStore::new(&config.tasks_file);
        let directory = DirectoryCache::new(
            http.clone(),
            config.user_directory_url.clone(),
            config.campaign_directory_url.clone(),
            config.users_seed.clone(),
        );
        let sync = TaskSync::new(http.clone(), config.task_persist_url.clone());
        AppState {
            http,
            store,
            directory,
            sync,
            uploads: UploadRegistry::new(),
            config,
        }
    }

    pub fn from_env() -> Self {
        Self::new(Config::from_env())
    }
}
