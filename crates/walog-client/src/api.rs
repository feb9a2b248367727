//! HTTP client for the walog server.

use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;
use walog_core::{ChatMessage, Chatroom};
use walog_shared::{Contact, Media, Message};

use crate::error::{ClientError, Result};

/// One file of a multi-file send.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub mimetype: String,
    pub data: Vec<u8>,
}

#[derive(Deserialize)]
struct Created<T> {
    data: T,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(alias = "message")]
    error: String,
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: Url,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| ClientError::Api {
            status: 0,
            message: format!("invalid server URL '{base_url}': {e}"),
        })?;
        Ok(Self {
            base_url,
            http: reqwest::Client::new(),
        })
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Turn a non-success response into [`ClientError::Api`].
    async fn check(resp: Response) -> Result<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let message = match resp.json::<ErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string(),
        };
        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }

    /// GET a collection. A 404 is an empty collection.
    async fn get_list<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<Vec<T>> {
        let url = self.url(segments);
        debug!(%url, "GET");
        let resp = self.http.get(url).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        Ok(Self::check(resp).await?.json().await?)
    }

    pub async fn fetch_contacts(&self) -> Result<Vec<Contact>> {
        self.get_list(&["api", "contacts"]).await
    }

    /// Chatrooms, most recent first.
    pub async fn fetch_chatrooms(&self) -> Result<Vec<Chatroom>> {
        self.get_list(&["api", "chatrooms"]).await
    }

    /// One conversation, oldest first, with attached files.
    pub async fn fetch_history(&self, chat_id: &str) -> Result<Vec<ChatMessage>> {
        self.get_list(&["api", "chats", chat_id]).await
    }

    /// Store a message and return it as the server stored it.
    pub async fn send_message(&self, message: &Message) -> Result<Message> {
        let resp = self
            .http
            .post(self.url(&["api", "send"]))
            .json(message)
            .send()
            .await?;
        let created: Created<Message> = Self::check(resp).await?.json().await?;
        Ok(created.data)
    }

    /// Upload the files of one media message.
    pub async fn send_files(
        &self,
        chat_id: &str,
        timestamp: i64,
        index_total: u32,
        files: Vec<UploadFile>,
    ) -> Result<Vec<Media>> {
        let mut form = Form::new()
            .text("chatroomID", chat_id.to_string())
            .text("timestamp", timestamp.to_string())
            .text("total", index_total.to_string());
        for file in files {
            let part = Part::bytes(file.data)
                .file_name(file.name)
                .mime_str(&file.mimetype)?;
            form = form.part("files", part);
        }

        let resp = self
            .http
            .post(self.url(&["api", "send-file"]))
            .multipart(form)
            .send()
            .await?;
        let created: Created<Vec<Media>> = Self::check(resp).await?.json().await?;
        Ok(created.data)
    }
}
