//! Server configuration loaded from environment variables.
//!
//! All settings have defaults so the server can start with zero
//! configuration for local development.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use walog_shared::constants::{DEFAULT_HTTP_PORT, MAX_FILE_SIZE};

/// Where uploaded file bytes are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// Files under `MEDIA_DIR`, served through `/download`.
    Disk,
    /// Files pushed to a remote repository through its contents API.
    Remote,
    /// Files under `MEDIA_DIR`, also served as static files at `/uploads`.
    Static,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disk" => Ok(Self::Disk),
            "remote" | "github" => Ok(Self::Remote),
            "static" => Ok(Self::Static),
            other => Err(format!("unknown storage backend '{other}'")),
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disk => "disk",
            Self::Remote => "remote",
            Self::Static => "static",
        })
    }
}

/// Remote repository settings, used by [`StorageBackend::Remote`].
#[derive(Clone)]
pub struct RemoteConfig {
    /// `owner/name`
    /// Env: `REMOTE_REPO`
    pub repo: String,

    /// Directory inside the repository.
    /// Env: `REMOTE_DIR`
    /// Default: `uploads`
    pub dir: String,

    /// Bearer token for the contents API.
    /// Env: `REMOTE_TOKEN`
    pub token: Option<String>,

    /// Env: `REMOTE_BRANCH`
    /// Default: `main`
    pub branch: String,

    /// Env: `REMOTE_API_URL`
    /// Default: `https://api.github.com`
    pub api_url: String,
}

// The token never ends up in logs.
impl fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("repo", &self.repo)
            .field("dir", &self.dir)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("branch", &self.branch)
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            repo: String::new(),
            dir: "uploads".to_string(),
            token: None,
            branch: "main".to_string(),
            api_url: "https://api.github.com".to_string(),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:3003`
    pub http_addr: SocketAddr,

    /// SQLite database file.
    /// Env: `DATABASE_PATH`
    /// Default: `./walog.db`
    pub database_path: PathBuf,

    /// Env: `STORAGE_BACKEND` (`disk`, `remote` or `static`)
    /// Default: `disk`
    pub storage_backend: StorageBackend,

    /// Directory for the disk and static backends.
    /// Env: `MEDIA_DIR`
    /// Default: `./uploads`
    pub media_dir: PathBuf,

    /// Maximum size of one upload request in bytes.
    /// Env: `MAX_UPLOAD_SIZE`
    /// Default: 50 MiB
    pub max_upload_size: usize,

    /// Base URL the static backend builds file URLs from.
    /// Env: `PUBLIC_URL`
    /// Default: `http://localhost:3003`
    pub public_url: String,

    pub remote: RemoteConfig,

    /// JSON array of message records inserted at startup.
    /// Env: `IMPORT_MESSAGES`
    pub import_messages: Option<PathBuf>,

    /// JSON array of contacts upserted at startup.
    /// Env: `IMPORT_CONTACTS`
    pub import_contacts: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: PathBuf::from("./walog.db"),
            storage_backend: StorageBackend::Disk,
            media_dir: PathBuf::from("./uploads"),
            max_upload_size: MAX_FILE_SIZE,
            public_url: format!("http://localhost:{DEFAULT_HTTP_PORT}"),
            remote: RemoteConfig::default(),
            import_messages: None,
            import_contacts: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(addr) = var("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Some(path) = var("DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }

        if let Some(backend) = var("STORAGE_BACKEND") {
            match backend.parse() {
                Ok(parsed) => config.storage_backend = parsed,
                Err(e) => tracing::warn!(error = %e, "Invalid STORAGE_BACKEND, using default"),
            }
        }

        if let Some(path) = var("MEDIA_DIR") {
            config.media_dir = PathBuf::from(path);
        }

        if let Some(val) = var("MAX_UPLOAD_SIZE") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.max_upload_size = n,
                _ => tracing::warn!(value = %val, "Invalid MAX_UPLOAD_SIZE, using default"),
            }
        }

        if let Some(url) = var("PUBLIC_URL") {
            config.public_url = url.trim_end_matches('/').to_string();
        }

        // -- Remote repository --

        if let Some(repo) = var("REMOTE_REPO") {
            config.remote.repo = repo;
        }
        if let Some(dir) = var("REMOTE_DIR") {
            config.remote.dir = dir.trim_matches('/').to_string();
        }
        config.remote.token = var("REMOTE_TOKEN");
        if let Some(branch) = var("REMOTE_BRANCH") {
            config.remote.branch = branch;
        }
        if let Some(url) = var("REMOTE_API_URL") {
            config.remote.api_url = url.trim_end_matches('/').to_string();
        }

        if config.storage_backend == StorageBackend::Remote && config.remote.repo.is_empty() {
            tracing::warn!("STORAGE_BACKEND=remote without REMOTE_REPO, falling back to disk");
            config.storage_backend = StorageBackend::Disk;
        }

        // -- Seeding --

        config.import_messages = var("IMPORT_MESSAGES").map(PathBuf::from);
        config.import_contacts = var("IMPORT_CONTACTS").map(PathBuf::from);

        config
    }
}
