//! Command handlers. Each one fetches what it needs, runs it through the
//! session and returns the text to print.

use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, Local};
use tracing::{debug, info};
use walog_core::format::format_contact_name;
use walog_core::search::{filter_sidebar, filter_timeline};
use walog_core::timeline::header_last_chat;
use walog_core::{ChatMessage, Session, TimelineItem};
use walog_shared::{Contact, Message};

use crate::api::{ApiClient, UploadFile};
use crate::error::{ClientError, Result};
use crate::view;

pub struct App {
    api: ApiClient,
    session: Session,
    /// Where drafts are persisted; `None` keeps them in memory only.
    drafts_path: Option<PathBuf>,
}

impl App {
    pub fn new(api: ApiClient, session: Session, drafts_path: Option<PathBuf>) -> Self {
        Self {
            api,
            session,
            drafts_path,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    fn now() -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }

    fn persist_drafts(&self) -> Result<()> {
        if let Some(path) = &self.drafts_path {
            self.session.drafts().save_to(path)?;
        }
        Ok(())
    }

    fn self_id(&self) -> Result<String> {
        let id = self.session.self_id().trim();
        if id.is_empty() {
            return Err(ClientError::MissingSelfId);
        }
        Ok(id.to_string())
    }

    /// The sidebar, drafts first, then most recent.
    pub async fn chatrooms(&self, query: Option<&str>) -> Result<String> {
        let rooms = self.api.fetch_chatrooms().await?;
        let contacts = self.api.fetch_contacts().await?;
        let entries = self.session.sidebar(&rooms, &contacts, &Self::now());

        let shown = match query {
            Some(q) => filter_sidebar(&entries, q),
            None => entries.iter().collect(),
        };
        if shown.is_empty() && query.is_some() {
            return Ok("No matches.\n".to_string());
        }
        Ok(view::sidebar(&shown))
    }

    /// Open a conversation and render its history.
    pub async fn open(&mut self, chat_id: &str, term: Option<&str>) -> Result<String> {
        let draft = self.session.open(chat_id).to_string();
        let history = self.api.fetch_history(chat_id).await?;
        let contacts = self.api.fetch_contacts().await?;

        let mut out = self.render_history(chat_id, &history, &contacts, term)?;
        if !draft.is_empty() {
            out.push_str(&format!("\nDraft: {draft}\n"));
        }
        Ok(out)
    }

    fn render_history(
        &self,
        chat_id: &str,
        history: &[ChatMessage],
        contacts: &[Contact],
        term: Option<&str>,
    ) -> Result<String> {
        let now = Self::now();
        let items = self.session.timeline(history, contacts, now)?;
        let shown: Vec<&TimelineItem> = match term {
            Some(t) => filter_timeline(&items, t),
            None => items.iter().collect(),
        };
        if shown.is_empty() && term.is_some() {
            return Ok("No matches.\n".to_string());
        }

        let title = format_contact_name(chat_id, contacts);
        let subtitle = header_last_chat(history, &now);
        Ok(view::timeline(title, subtitle.as_deref(), &shown))
    }

    /// Send a text message. Without `text` the saved draft is sent.
    ///
    /// The draft is only cleared once the server has stored the message.
    pub async fn send(&mut self, chat_id: &str, text: Option<&str>) -> Result<String> {
        let self_id = self.self_id()?;
        let draft = self.session.open(chat_id).to_string();
        let body = text.map(str::to_string).unwrap_or(draft);
        if body.trim().is_empty() {
            return Err(ClientError::EmptyMessage);
        }

        let message = Message::outgoing_text(&self_id, chat_id, &body, Self::now().timestamp());
        let stored = self.api.send_message(&message).await?;
        info!(id = %stored.local_id.serialized, chat = %chat_id, "Message sent");

        self.session.after_send();
        self.persist_drafts()?;
        self.open(chat_id, None).await
    }

    /// Upload files and send the media message that references them.
    /// The text draft of the chat is kept.
    pub async fn send_files(
        &mut self,
        chat_id: &str,
        paths: &[PathBuf],
        caption: Option<&str>,
    ) -> Result<String> {
        let self_id = self.self_id()?;
        self.session.open(chat_id);
        self.session.clear_selection();

        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            files.push(read_upload(path).await?);
        }
        let picked: Vec<(String, String, u64)> = files
            .iter()
            .map(|f| (f.name.clone(), f.mimetype.clone(), f.data.len() as u64))
            .collect();
        self.session.select_files(picked)?;
        let index_total = self.session.index_total().ok_or(ClientError::EmptyMessage)?;

        let timestamp = Self::now().timestamp();
        let media = self
            .api
            .send_files(chat_id, timestamp, index_total, files)
            .await?;
        debug!(count = media.len(), "Files uploaded");

        let message = Message::outgoing_media(&self_id, chat_id, caption, timestamp);
        self.api.send_message(&message).await?;
        info!(chat = %chat_id, files = media.len(), "Media message sent");

        self.session.clear_selection();
        self.open(chat_id, None).await
    }

    /// Show, set or clear the draft of a conversation.
    pub fn draft(&mut self, chat_id: &str, text: Option<&str>, clear: bool) -> Result<String> {
        let out = if clear {
            self.session.clear_draft(chat_id);
            format!("Draft for {chat_id} cleared.\n")
        } else if let Some(text) = text {
            if self.session.set_draft(chat_id, text) {
                format!("Draft for {chat_id} saved.\n")
            } else {
                format!("Draft for {chat_id} cleared.\n")
            }
        } else {
            let current = self.session.drafts().load(chat_id);
            if current.is_empty() {
                return Ok(format!("No draft for {chat_id}.\n"));
            }
            return Ok(format!("Draft: {current}\n"));
        };
        self.persist_drafts()?;
        Ok(out)
    }
}

async fn read_upload(path: &Path) -> Result<UploadFile> {
    let data = tokio::fs::read(path).await?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());
    let mimetype = mime_guess::from_path(path)
        .first_or_octet_stream()
        .to_string();
    Ok(UploadFile {
        name,
        mimetype,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::tests::spawn;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};
    use walog_core::DraftOverlay;

    /// A fake server that records every request path in order.
    async fn fake_server(send_status: StatusCode) -> (String, Arc<Mutex<Vec<String>>>) {
        let log: Arc<Mutex<Vec<String>>> = Arc::default();

        let l = log.clone();
        let send = move |Json(body): Json<Value>| {
            let l = l.clone();
            async move {
                l.lock().unwrap().push("send".into());
                if send_status.is_success() {
                    (send_status, Json(json!({"success": true, "message": "ok", "data": body})))
                } else {
                    (send_status, Json(json!({"error": "boom"})))
                }
            }
        };
        let l = log.clone();
        let history = move || {
            let l = l.clone();
            async move {
                l.lock().unwrap().push("history".into());
                Json(json!([{
                    "localId": {"fromMe": true, "remote": "a@c.us", "id": "1", "_serialized": "true_a@c.us_1"},
                    "body": "hello there",
                    "timestamp": 1_700_000_000,
                    "from": "me@c.us",
                    "to": "a@c.us",
                    "fromMe": true,
                    "files": []
                }]))
            }
        };
        let l = log.clone();
        let contacts = move || {
            let l = l.clone();
            async move {
                l.lock().unwrap().push("contacts".into());
                Json(json!([{"uid": "a@c.us", "name": "Budi"}]))
            }
        };

        let l = log.clone();
        let upload = move || {
            let l = l.clone();
            async move {
                l.lock().unwrap().push("upload".into());
                (
                    StatusCode::CREATED,
                    Json(json!({"success": true, "message": "ok", "data": []})),
                )
            }
        };

        let app = Router::new()
            .route("/api/send", post(send))
            .route("/api/send-file", post(upload))
            .route("/api/chats/:remote", get(history))
            .route("/api/contacts", get(contacts));
        (spawn(app).await, log)
    }

    fn app(base: &str, drafts: DraftOverlay, path: Option<PathBuf>) -> App {
        App::new(
            ApiClient::new(base).unwrap(),
            Session::new("me@c.us", drafts),
            path,
        )
    }

    #[tokio::test]
    async fn test_send_clears_draft_then_reloads() {
        let (base, log) = fake_server(StatusCode::CREATED).await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drafts.json");

        let mut drafts = DraftOverlay::new();
        drafts.save("a@c.us", "hello there");
        drafts.save("b@c.us", "later");
        let mut app = app(&base, drafts, Some(path.clone()));

        let out = app.send("a@c.us", None).await.unwrap();
        assert!(out.contains("== Budi =="));
        assert!(out.contains("hello there"));
        assert_eq!(*log.lock().unwrap(), vec!["send", "history", "contacts"]);

        let saved = DraftOverlay::load_from(&path).unwrap();
        assert!(!saved.has("a@c.us"));
        assert!(saved.has("b@c.us"));
    }

    #[tokio::test]
    async fn test_failed_send_keeps_draft() {
        let (base, log) = fake_server(StatusCode::INTERNAL_SERVER_ERROR).await;
        let mut drafts = DraftOverlay::new();
        drafts.save("a@c.us", "unsent");
        let mut app = app(&base, drafts, None);

        let err = app.send("a@c.us", None).await.unwrap_err();
        assert!(matches!(err, ClientError::Api { status: 500, .. }));
        assert_eq!(app.session().drafts().load("a@c.us"), "unsent");
        assert_eq!(*log.lock().unwrap(), vec!["send"]);
    }

    #[tokio::test]
    async fn test_send_needs_text_and_sender() {
        let (base, _log) = fake_server(StatusCode::CREATED).await;
        let mut app = app(&base, DraftOverlay::new(), None);
        assert!(matches!(
            app.send("a@c.us", Some("  ")).await,
            Err(ClientError::EmptyMessage)
        ));

        let mut anonymous = App::new(
            ApiClient::new(&base).unwrap(),
            Session::new("", DraftOverlay::new()),
            None,
        );
        assert!(matches!(
            anonymous.send("a@c.us", Some("hi")).await,
            Err(ClientError::MissingSelfId)
        ));
    }

    #[tokio::test]
    async fn test_send_files_keeps_text_draft() {
        let (base, log) = fake_server(StatusCode::CREATED).await;
        let dir = tempfile::tempdir().unwrap();
        let picture = dir.path().join("pic.png");
        std::fs::write(&picture, b"not really a png").unwrap();

        let mut drafts = DraftOverlay::new();
        drafts.save("a@c.us", "half-typed reply");
        let mut app = app(&base, drafts, None);

        app.send_files("a@c.us", &[picture], Some("caption"))
            .await
            .unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec!["upload", "send", "history", "contacts"]
        );
        assert_eq!(app.session().drafts().load("a@c.us"), "half-typed reply");
        assert!(app.session().pending_files().is_empty());
    }

    #[tokio::test]
    async fn test_search_in_conversation() {
        let (base, _log) = fake_server(StatusCode::CREATED).await;
        let mut app = app(&base, DraftOverlay::new(), None);

        let out = app.open("a@c.us", Some("THERE")).await.unwrap();
        assert!(out.contains("hello there"));
        let out = app.open("a@c.us", Some("nothing")).await.unwrap();
        assert_eq!(out, "No matches.\n");
    }

    #[test]
    fn test_draft_command() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drafts.json");
        let mut app = app("http://localhost:3003", DraftOverlay::new(), Some(path.clone()));

        assert_eq!(app.draft("a@c.us", None, false).unwrap(), "No draft for a@c.us.\n");
        assert_eq!(
            app.draft("a@c.us", Some("wip"), false).unwrap(),
            "Draft for a@c.us saved.\n"
        );
        assert_eq!(app.draft("a@c.us", None, false).unwrap(), "Draft: wip\n");
        assert_eq!(DraftOverlay::load_from(&path).unwrap().load("a@c.us"), "wip");

        app.draft("a@c.us", None, true).unwrap();
        assert!(DraftOverlay::load_from(&path).unwrap().is_empty());
    }
}
