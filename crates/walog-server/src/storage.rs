//! Media storage backends.
//!
//! Every backend takes the bytes of one uploaded file, reserves a stored name
//! that no other upload holds, and hands back the `path` recorded in the
//! media row. Downloads and thumbnails read the bytes back through
//! [`MediaStorage::fetch`].

use std::path::{Component, Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use walog_shared::constants::APP_NAME;
use walog_shared::{ids, Media};

use crate::config::{RemoteConfig, ServerConfig, StorageBackend};
use crate::error::ServerError;

/// Resolve `name` below `base`, refusing anything that is not a plain
/// relative path.
fn ensure_within(base: &Path, name: &Path) -> Result<PathBuf, ServerError> {
    let mut resolved = base.to_path_buf();
    for component in name.components() {
        match component {
            Component::Normal(c) => resolved.push(c),
            _ => {
                return Err(ServerError::BadRequest(
                    "Path traversal detected".to_string(),
                ));
            }
        }
    }
    if resolved == base || !resolved.starts_with(base) {
        return Err(ServerError::BadRequest(
            "Path traversal detected".to_string(),
        ));
    }
    Ok(resolved)
}

/// Append path segments to a base URL, percent-encoding each one.
fn join_url<'a, I>(base: &str, segments: I) -> Result<Url, ServerError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut url = Url::parse(base)
        .map_err(|e| ServerError::Storage(format!("Invalid base URL '{base}': {e}")))?;
    url.path_segments_mut()
        .map_err(|_| ServerError::Storage(format!("Base URL '{base}' cannot hold a path")))?
        .pop_if_empty()
        .extend(segments.into_iter().filter(|s| !s.is_empty()));
    Ok(url)
}

// ---------------------------------------------------------------------------
// Local directory
// ---------------------------------------------------------------------------

/// Flat directory of uploaded files, shared by the disk and static backends.
#[derive(Debug, Clone)]
pub struct LocalDir {
    base_path: PathBuf,
}

impl LocalDir {
    pub async fn new(base_path: PathBuf) -> Result<Self, ServerError> {
        fs::create_dir_all(&base_path).await.map_err(|e| {
            ServerError::Storage(format!(
                "Failed to create media directory '{}': {}",
                base_path.display(),
                e
            ))
        })?;
        let base_path = fs::canonicalize(&base_path).await.map_err(|e| {
            ServerError::Storage(format!(
                "Failed to resolve media directory '{}': {}",
                base_path.display(),
                e
            ))
        })?;

        info!(path = %base_path.display(), "Media directory initialized");
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Write a new file. Returns `None` when `stored_name` is already taken;
    /// an existing file is never overwritten.
    pub async fn write_new(
        &self,
        stored_name: &str,
        data: &[u8],
    ) -> Result<Option<PathBuf>, ServerError> {
        let path = self.safe_path(stored_name)?;
        let write_error = |e: std::io::Error| {
            ServerError::Storage(format!("Failed to write {stored_name}: {e}"))
        };

        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(None),
            Err(e) => return Err(write_error(e)),
        };
        let written = async {
            file.write_all(data).await?;
            file.flush().await
        }
        .await;
        if let Err(e) = written {
            let _ = fs::remove_file(&path).await;
            return Err(write_error(e));
        }

        debug!(name = %stored_name, size = data.len(), "Stored file");
        Ok(Some(path))
    }

    pub async fn remove(&self, stored_name: &str) -> Result<(), ServerError> {
        let path = self.safe_path(stored_name)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ServerError::Storage(format!(
                "Failed to remove {stored_name}: {e}"
            ))),
        }
    }

    pub async fn read(&self, stored_name: &str) -> Result<Bytes, ServerError> {
        let path = self.safe_path(stored_name)?;
        match fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ServerError::NotFound(format!("File {stored_name}")))
            }
            Err(e) => Err(ServerError::Storage(format!(
                "Failed to read {stored_name}: {e}"
            ))),
        }
    }

    fn safe_path(&self, stored_name: &str) -> Result<PathBuf, ServerError> {
        if stored_name.contains('/') || stored_name.contains('\\') || stored_name.contains("..") {
            return Err(ServerError::BadRequest(
                "Path traversal detected".to_string(),
            ));
        }
        ensure_within(&self.base_path, Path::new(stored_name))
    }
}

// ---------------------------------------------------------------------------
// Remote repository
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct PutContents<'a> {
    message: String,
    content: String,
    branch: &'a str,
}

#[derive(Deserialize)]
struct PutContentsResponse {
    content: ContentsEntry,
}

#[derive(Deserialize)]
struct ContentsEntry {
    download_url: Option<String>,
}

/// Files committed to a repository through the GitHub contents API.
#[derive(Debug, Clone)]
pub struct RemoteRepo {
    client: reqwest::Client,
    config: RemoteConfig,
}

impl RemoteRepo {
    pub fn new(config: RemoteConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn contents_url(&self, stored_name: &str) -> Result<Url, ServerError> {
        let segments = ["repos"]
            .into_iter()
            .chain(self.config.repo.split('/'))
            .chain(["contents"])
            .chain(self.config.dir.split('/'))
            .chain([stored_name]);
        join_url(&self.config.api_url, segments)
    }

    /// Commit one new file and return its raw download URL. Returns `None`
    /// when the repository already holds a file under `stored_name`.
    pub async fn upload(
        &self,
        stored_name: &str,
        data: &[u8],
    ) -> Result<Option<String>, ServerError> {
        let url = self.contents_url(stored_name)?;
        let body = PutContents {
            message: format!("Upload file {stored_name}"),
            content: BASE64.encode(data),
            branch: &self.config.branch,
        };

        let mut request = self
            .client
            .put(url)
            .header(USER_AGENT, APP_NAME)
            .header(ACCEPT, "application/vnd.github+json")
            .json(&body);
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| ServerError::Upstream(format!("Upload of {stored_name} failed: {e}")))?;
        // Creating over an existing path without its blob sha is refused.
        if resp.status() == StatusCode::UNPROCESSABLE_ENTITY {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(ServerError::Upstream(format!(
                "Upload of {stored_name} answered {}",
                resp.status()
            )));
        }

        let parsed: PutContentsResponse = resp
            .json()
            .await
            .map_err(|e| ServerError::Upstream(format!("Invalid upload response: {e}")))?;
        let download_url = parsed.content.download_url.ok_or_else(|| {
            ServerError::Upstream(format!("No download URL returned for {stored_name}"))
        })?;

        info!(name = %stored_name, repo = %self.config.repo, "File pushed to remote repository");
        Ok(Some(download_url))
    }

    pub async fn download(&self, url: &str) -> Result<Bytes, ServerError> {
        let resp = self
            .client
            .get(url)
            .header(USER_AGENT, APP_NAME)
            .send()
            .await
            .map_err(|e| ServerError::Upstream(format!("Download failed: {e}")))?;
        match resp.status() {
            s if s.is_success() => resp
                .bytes()
                .await
                .map_err(|e| ServerError::Upstream(format!("Download failed: {e}"))),
            StatusCode::NOT_FOUND => Err(ServerError::NotFound(
                "File not found on remote storage".to_string(),
            )),
            s => Err(ServerError::Upstream(format!("Download answered {s}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Backend selection
// ---------------------------------------------------------------------------

/// Stored names tried for one file before the upload gives up.
const MAX_NAME_ATTEMPTS: i64 = 64;

/// Where one uploaded file ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub stored_name: String,
    pub path: String,
}

#[derive(Debug, Clone)]
pub enum MediaStorage {
    Disk(LocalDir),
    Static { dir: LocalDir, public_url: String },
    Remote(RemoteRepo),
}

impl MediaStorage {
    pub async fn from_config(config: &ServerConfig) -> Result<Self, ServerError> {
        let storage = match config.storage_backend {
            StorageBackend::Disk => Self::Disk(LocalDir::new(config.media_dir.clone()).await?),
            StorageBackend::Static => Self::Static {
                dir: LocalDir::new(config.media_dir.clone()).await?,
                public_url: config.public_url.clone(),
            },
            StorageBackend::Remote => Self::Remote(RemoteRepo::new(config.remote.clone())),
        };
        info!(backend = %storage.backend(), "Media storage ready");
        Ok(storage)
    }

    pub fn backend(&self) -> StorageBackend {
        match self {
            Self::Disk(_) => StorageBackend::Disk,
            Self::Static { .. } => StorageBackend::Static,
            Self::Remote(_) => StorageBackend::Remote,
        }
    }

    /// Directory to serve at `/uploads`, for the static backend only.
    pub fn static_dir(&self) -> Option<&Path> {
        match self {
            Self::Static { dir, .. } => Some(dir.base_path()),
            _ => None,
        }
    }

    /// Store one file under the first free name `{millis + n}_{filename}`.
    pub async fn put(
        &self,
        millis: i64,
        filename: &str,
        data: &[u8],
    ) -> Result<StoredFile, ServerError> {
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let stored_name = ids::stored_name(millis + attempt, filename)?;
            if let Some(path) = self.put_new(&stored_name, data).await? {
                return Ok(StoredFile { stored_name, path });
            }
            debug!(name = %stored_name, "Stored name taken, trying the next one");
        }
        Err(ServerError::Storage(format!(
            "No free stored name for {filename} after {MAX_NAME_ATTEMPTS} attempts"
        )))
    }

    async fn put_new(&self, stored_name: &str, data: &[u8]) -> Result<Option<String>, ServerError> {
        match self {
            Self::Disk(dir) => Ok(dir
                .write_new(stored_name, data)
                .await?
                .map(|path| path.display().to_string())),
            Self::Static { dir, public_url } => match dir.write_new(stored_name, data).await? {
                Some(_) => Ok(Some(
                    join_url(public_url, ["uploads", stored_name])?.to_string(),
                )),
                None => Ok(None),
            },
            Self::Remote(repo) => repo.upload(stored_name, data).await,
        }
    }

    /// Drop a file whose metadata never made it into the database.
    pub async fn remove(&self, stored_name: &str) {
        match self {
            Self::Disk(dir) | Self::Static { dir, .. } => {
                if let Err(e) = dir.remove(stored_name).await {
                    warn!(name = %stored_name, error = %e, "Failed to remove orphaned file");
                }
            }
            Self::Remote(repo) => warn!(
                name = %stored_name,
                repo = %repo.config.repo,
                "Orphaned file left in remote repository"
            ),
        }
    }

    /// Read back the bytes of a stored file.
    pub async fn fetch(&self, media: &Media) -> Result<Bytes, ServerError> {
        match self {
            Self::Disk(dir) | Self::Static { dir, .. } => dir.read(&media.stored_name).await,
            Self::Remote(repo) => repo.download(&media.path).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    fn media(stored_name: &str, path: &str) -> Media {
        Media {
            filename: walog_shared::ids::original_name(stored_name).to_string(),
            stored_name: stored_name.to_string(),
            path: path.to_string(),
            mimetype: "text/plain".into(),
            size: 0,
            uploaded_at: 0,
            chatroom_id: "a@c.us".into(),
            media_key: "a@c.us_1".into(),
            file_index: 0,
            index_total: 0,
        }
    }

    #[tokio::test]
    async fn test_disk_put_and_fetch() {
        let dir = TempDir::new().unwrap();
        let storage = MediaStorage::Disk(LocalDir::new(dir.path().join("media")).await.unwrap());

        let stored = storage.put(17, "notes.txt", b"hello").await.unwrap();
        assert_eq!(stored.stored_name, "17_notes.txt");
        let path = stored.path;
        assert!(path.ends_with("17_notes.txt"));
        assert!(Path::new(&path).exists());

        let data = storage.fetch(&media("17_notes.txt", &path)).await.unwrap();
        assert_eq!(&data[..], b"hello");
        assert!(storage.static_dir().is_none());
    }

    #[tokio::test]
    async fn test_taken_names_are_never_overwritten() {
        let dir = TempDir::new().unwrap();
        let storage = MediaStorage::Disk(LocalDir::new(dir.path().to_path_buf()).await.unwrap());

        let first = storage.put(17, "same.txt", b"first").await.unwrap();
        let second = storage.put(17, "same.txt", b"second").await.unwrap();
        let third = storage.put(18, "same.txt", b"third").await.unwrap();
        assert_eq!(first.stored_name, "17_same.txt");
        assert_eq!(second.stored_name, "18_same.txt");
        assert_eq!(third.stored_name, "19_same.txt");

        for (stored, expected) in [(&first, "first"), (&second, "second"), (&third, "third")] {
            let data = storage
                .fetch(&media(&stored.stored_name, &stored.path))
                .await
                .unwrap();
            assert_eq!(&data[..], expected.as_bytes());
        }
    }

    #[tokio::test]
    async fn test_remove_deletes_local_file() {
        let dir = TempDir::new().unwrap();
        let storage = MediaStorage::Disk(LocalDir::new(dir.path().to_path_buf()).await.unwrap());
        let stored = storage.put(1, "a.txt", b"a").await.unwrap();

        storage.remove(&stored.stored_name).await;
        assert!(!Path::new(&stored.path).exists());
        // Removing twice is harmless.
        storage.remove(&stored.stored_name).await;
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let storage = MediaStorage::Disk(LocalDir::new(dir.path().to_path_buf()).await.unwrap());
        assert!(matches!(
            storage.fetch(&media("1_gone.txt", "")).await,
            Err(ServerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_traversal_rejected() {
        let dir = TempDir::new().unwrap();
        let local = LocalDir::new(dir.path().to_path_buf()).await.unwrap();
        for name in ["../escape", "a/b", "..", "", "a\\b"] {
            assert!(
                matches!(local.write_new(name, b"x").await, Err(ServerError::BadRequest(_))),
                "{name:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_static_path_is_public_url() {
        let dir = TempDir::new().unwrap();
        let storage = MediaStorage::Static {
            dir: LocalDir::new(dir.path().to_path_buf()).await.unwrap(),
            public_url: "https://chat.example.org".into(),
        };
        let path = storage.put(17, "my photo.png", b"png").await.unwrap().path;
        assert_eq!(path, "https://chat.example.org/uploads/17_my%20photo.png");
        assert_eq!(storage.static_dir(), Some(dir.path().canonicalize().unwrap().as_path()));
        assert_eq!(
            &storage.fetch(&media("17_my photo.png", &path)).await.unwrap()[..],
            b"png"
        );
    }

    type Uploaded = Arc<Mutex<HashMap<String, (Vec<u8>, Option<String>, String)>>>;

    /// Minimal stand-in for the contents API: PUT stores, GET /raw serves.
    async fn mock_contents_api() -> (String, Uploaded) {
        use axum::extract::{Path as UrlPath, State};
        use axum::http::HeaderMap;
        use axum::routing::{get, put};
        use axum::{Json, Router};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let uploaded: Uploaded = Arc::default();

        #[derive(Clone)]
        struct Mock {
            base: String,
            uploaded: Uploaded,
        }

        async fn put_contents(
            State(mock): State<Mock>,
            UrlPath((_owner, _repo, path)): UrlPath<(String, String, String)>,
            headers: HeaderMap,
            Json(body): Json<serde_json::Value>,
        ) -> Result<Json<serde_json::Value>, axum::http::StatusCode> {
            if mock.uploaded.lock().unwrap().contains_key(&path) {
                return Err(axum::http::StatusCode::UNPROCESSABLE_ENTITY);
            }
            let content = BASE64
                .decode(body["content"].as_str().unwrap_or_default())
                .unwrap();
            let auth = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let branch = body["branch"].as_str().unwrap_or_default().to_string();
            mock.uploaded
                .lock()
                .unwrap()
                .insert(path.clone(), (content, auth, branch));
            Ok(Json(serde_json::json!({
                "content": { "download_url": format!("{}/raw/{}", mock.base, path) }
            })))
        }

        async fn raw(
            State(mock): State<Mock>,
            UrlPath(path): UrlPath<String>,
        ) -> Result<Vec<u8>, axum::http::StatusCode> {
            mock.uploaded
                .lock()
                .unwrap()
                .get(&path)
                .map(|(data, _, _)| data.clone())
                .ok_or(axum::http::StatusCode::NOT_FOUND)
        }

        let app = Router::new()
            .route("/repos/:owner/:repo/contents/*path", put(put_contents))
            .route("/raw/*path", get(raw))
            .with_state(Mock {
                base: base.clone(),
                uploaded: uploaded.clone(),
            });
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (base, uploaded)
    }

    #[tokio::test]
    async fn test_remote_put_and_fetch() {
        let (base, uploaded) = mock_contents_api().await;
        let storage = MediaStorage::Remote(RemoteRepo::new(RemoteConfig {
            repo: "owner/logs".into(),
            dir: "uploads".into(),
            token: Some("tok".into()),
            branch: "main".into(),
            api_url: base.clone(),
        }));

        let path = storage.put(17, "a.txt", b"remote bytes").await.unwrap().path;
        assert_eq!(path, format!("{base}/raw/uploads/17_a.txt"));
        {
            let uploaded = uploaded.lock().unwrap();
            let (content, auth, branch) = &uploaded["uploads/17_a.txt"];
            assert_eq!(content, b"remote bytes");
            assert_eq!(auth.as_deref(), Some("Bearer tok"));
            assert_eq!(branch, "main");
        }

        let data = storage.fetch(&media("17_a.txt", &path)).await.unwrap();
        assert_eq!(&data[..], b"remote bytes");

        let again = storage.put(17, "a.txt", b"other bytes").await.unwrap();
        assert_eq!(again.stored_name, "18_a.txt");
        assert_eq!(
            &storage.fetch(&media("17_a.txt", &path)).await.unwrap()[..],
            b"remote bytes"
        );

        let missing = media("18_b.txt", &format!("{base}/raw/uploads/18_b.txt"));
        assert!(matches!(
            storage.fetch(&missing).await,
            Err(ServerError::NotFound(_))
        ));
    }
}
