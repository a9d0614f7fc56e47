//! HTTP client for the Telegram Bot API.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;

use super::types::{ApiResponse, File, Message, MessageId, ReplyMarkup, Update, User};
use crate::{Error, Result};

pub const API_BASE: &str = "https://api.telegram.org";

/// Slack added on top of the long-poll timeout for the HTTP request itself.
const POLL_GRACE: Duration = Duration::from_secs(10);

/// Audio to (re-)send by file id.
#[derive(Debug, Clone, Default)]
pub struct AudioUpload {
    pub file_id: String,
    pub title: Option<String>,
    pub performer: Option<String>,
}

impl AudioUpload {
    pub fn by_file_id(file_id: impl Into<String>) -> Self {
        Self {
            file_id: file_id.into(),
            ..Default::default()
        }
    }
}

/// Bot API client bound to one bot token.
#[derive(Debug, Clone)]
pub struct BotApi {
    http: Client,
    base_url: String,
    token: String,
}

impl BotApi {
    /// Create a client against the public Bot API.
    pub fn new(token: &str) -> Result<Self> {
        Self::with_base_url(API_BASE, token)
    }

    /// Create a client against a custom Bot API server (or a mock).
    pub fn with_base_url(base_url: &str, token: &str) -> Result<Self> {
        let http = Client::builder()
            .user_agent("song_relay/0.1.0")
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::InvalidArgument(format!("HTTP client error: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    /// Unpack the `ok/result/description/error_code` envelope.
    fn unwrap_envelope<T>(method: &str, envelope: ApiResponse<T>) -> Result<T> {
        if !envelope.ok {
            return Err(Error::RemoteRejection {
                method: method.to_string(),
                code: envelope.error_code.unwrap_or_default(),
                description: envelope
                    .description
                    .unwrap_or_else(|| "no description".to_string()),
            });
        }

        envelope
            .result
            .ok_or_else(|| Error::Transport(format!("{}: response has no result", method)))
    }

    async fn parse_response<T: DeserializeOwned>(
        method: &str,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        let body = response.text().await?;

        // Telegram answers rejections with a 4xx status *and* a JSON envelope,
        // so the body is parsed regardless of the status code.
        let envelope: ApiResponse<T> = serde_json::from_str(&body).map_err(|e| {
            Error::Transport(format!(
                "{}: malformed response (HTTP {}): {}",
                method, status, e
            ))
        })?;

        Self::unwrap_envelope(method, envelope)
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: &Value) -> Result<T> {
        debug!(method, "Bot API call");
        let response = self
            .http
            .post(self.method_url(method))
            .json(params)
            .send()
            .await?;
        Self::parse_response(method, response).await
    }

    /// Long-poll for pending updates.
    pub async fn get_updates(&self, offset: Option<i64>, timeout_secs: u64) -> Result<Vec<Update>> {
        let mut params = json!({
            "timeout": timeout_secs,
            "allowed_updates": ["message"],
        });
        if let Some(offset) = offset {
            params["offset"] = json!(offset);
        }

        let response = self
            .http
            .post(self.method_url("getUpdates"))
            .json(&params)
            .timeout(Duration::from_secs(timeout_secs) + POLL_GRACE)
            .send()
            .await?;
        Self::parse_response("getUpdates", response).await
    }

    /// Remove any webhook so getUpdates is allowed.
    pub async fn delete_webhook(&self, drop_pending_updates: bool) -> Result<bool> {
        self.call(
            "deleteWebhook",
            &json!({ "drop_pending_updates": drop_pending_updates }),
        )
        .await
    }

    /// The bot's own account.
    pub async fn get_me(&self) -> Result<User> {
        self.call("getMe", &json!({})).await
    }

    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        thread_id: Option<i64>,
        markup: Option<&ReplyMarkup>,
    ) -> Result<Message> {
        let mut params = json!({ "chat_id": chat_id, "text": text });
        if let Some(thread_id) = thread_id {
            params["message_thread_id"] = json!(thread_id);
        }
        if let Some(markup) = markup {
            params["reply_markup"] = serde_json::to_value(markup)?;
        }
        self.call("sendMessage", &params).await
    }

    /// Send an already-uploaded audio by file id.
    pub async fn send_audio(
        &self,
        chat_id: i64,
        audio: &AudioUpload,
        thread_id: Option<i64>,
        caption: &str,
    ) -> Result<Message> {
        let mut params = json!({
            "chat_id": chat_id,
            "audio": audio.file_id,
            "caption": caption,
        });
        if let Some(thread_id) = thread_id {
            params["message_thread_id"] = json!(thread_id);
        }
        if let Some(title) = &audio.title {
            params["title"] = json!(title);
        }
        if let Some(performer) = &audio.performer {
            params["performer"] = json!(performer);
        }
        self.call("sendAudio", &params).await
    }

    /// Copy a message and return the id of the copy.
    pub async fn copy_message(
        &self,
        chat_id: i64,
        from_chat_id: i64,
        message_id: i64,
        thread_id: Option<i64>,
    ) -> Result<i64> {
        let mut params = json!({
            "chat_id": chat_id,
            "from_chat_id": from_chat_id,
            "message_id": message_id,
        });
        if let Some(thread_id) = thread_id {
            params["message_thread_id"] = json!(thread_id);
        }
        let copied: MessageId = self.call("copyMessage", &params).await?;
        Ok(copied.message_id)
    }

    pub async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<bool> {
        self.call(
            "deleteMessage",
            &json!({ "chat_id": chat_id, "message_id": message_id }),
        )
        .await
    }

    pub async fn get_file(&self, file_id: &str) -> Result<File> {
        self.call("getFile", &json!({ "file_id": file_id })).await
    }

    /// Download the content behind a `file_path` returned by getFile.
    pub async fn download_file(&self, file_path: &str) -> Result<Vec<u8>> {
        let url = format!("{}/file/bot{}/{}", self.base_url, self.token, file_path);
        let response = self.http.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::RemoteRejection {
                method: "downloadFile".to_string(),
                code: i64::from(status.as_u16()),
                description: format!("HTTP {}", status),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }

    /// Upload raw bytes as a document.
    pub async fn send_document(
        &self,
        chat_id: i64,
        file_name: &str,
        content: Vec<u8>,
        thread_id: Option<i64>,
        caption: Option<&str>,
    ) -> Result<Message> {
        let part = Part::bytes(content)
            .file_name(file_name.to_string())
            .mime_str("application/json")?;

        let mut form = Form::new()
            .text("chat_id", chat_id.to_string())
            .part("document", part);
        if let Some(thread_id) = thread_id {
            form = form.text("message_thread_id", thread_id.to_string());
        }
        if let Some(caption) = caption {
            form = form.text("caption", caption.to_string());
        }

        debug!(method = "sendDocument", file_name, "Bot API call");
        let response = self
            .http
            .post(self.method_url("sendDocument"))
            .multipart(form)
            .send()
            .await?;
        Self::parse_response("sendDocument", response).await
    }
}
