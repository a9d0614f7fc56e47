//! Re-posting inbound audio as bot-owned messages.
//!
//! Order per message: upload a copy, record it, then delete the original.
//! The original is only deleted once the upload is confirmed.

use tracing::{error, info, warn};

use crate::catalog::{SharedCatalog, SongRecord};
use crate::metrics;
use crate::telegram::{AudioUpload, BotApi, Message};
use crate::{Error, Result};

/// Result of relaying one audio message.
#[derive(Debug)]
pub enum RelayOutcome {
    /// Uploaded and recorded; carries the stored record.
    Relayed(SongRecord),
    /// Same song already catalogued in this topic; the incoming copy was removed.
    Duplicate,
    /// The upload was rejected; the original message was left in place.
    UploadFailed(Error),
}

/// Mirrors relayed songs into a channel for inline use.
#[derive(Clone)]
pub struct InlineMirror {
    api: BotApi,
    channel_id: i64,
    catalog: SharedCatalog,
}

impl InlineMirror {
    pub fn new(api: BotApi, channel_id: i64, catalog: SharedCatalog) -> Self {
        Self {
            api,
            channel_id,
            catalog,
        }
    }

    /// Post the song to the channel and record it in the inline catalog.
    ///
    /// Returns `Ok(None)` when the song is already mirrored.
    pub async fn mirror(&self, record: &SongRecord) -> Result<Option<SongRecord>> {
        let file_id = record
            .file_id
            .clone()
            .ok_or_else(|| Error::InvalidArgument("record has no file id".to_string()))?;

        {
            let catalog = self.catalog.lock().await;
            if catalog
                .records()
                .iter()
                .any(|r| r.title == record.title && r.performer == record.performer)
            {
                return Ok(None);
            }
        }

        let upload = AudioUpload {
            file_id: file_id.clone(),
            title: Some(record.title.clone()),
            performer: Some(record.performer.clone()),
        };
        let sent = self.api.send_audio(self.channel_id, &upload, None, "").await?;

        let mirrored = SongRecord {
            message_id: Some(sent.message_id),
            thread_id: None,
            file_id: Some(file_id),
            ..record.clone()
        };

        let mut catalog = self.catalog.lock().await;
        catalog.push(mirrored.clone());
        catalog
            .save()
            .map_err(|e| Error::DataIntegrity(format!("inline catalog not saved: {}", e)))?;

        Ok(Some(mirrored))
    }
}

/// Relays audio posted in the monitored group.
#[derive(Clone)]
pub struct AudioRelay {
    api: BotApi,
    group_id: i64,
    catalog: SharedCatalog,
    inline: Option<InlineMirror>,
}

impl AudioRelay {
    pub fn new(api: BotApi, group_id: i64, catalog: SharedCatalog) -> Self {
        Self {
            api,
            group_id,
            catalog,
            inline: None,
        }
    }

    pub fn with_inline_mirror(mut self, mirror: InlineMirror) -> Self {
        self.inline = Some(mirror);
        self
    }

    /// Whether `message` is an audio post this relay is responsible for.
    pub fn accepts(&self, message: &Message) -> bool {
        message.chat.id == self.group_id && message.audio.is_some()
    }

    pub async fn relay(&self, message: &Message) -> Result<RelayOutcome> {
        let audio = message
            .audio
            .as_ref()
            .ok_or_else(|| Error::InvalidArgument("message carries no audio".to_string()))?;
        let chat_id = message.chat.id;
        let thread_id = message.message_thread_id;
        let candidate = SongRecord::from_audio(audio, message.message_id, thread_id);

        let is_duplicate = self.catalog.lock().await.find_duplicate(&candidate).is_some();
        if is_duplicate {
            info!(
                chat_id,
                message_id = message.message_id,
                label = %candidate.label(),
                "Duplicate song, removing incoming copy"
            );
            self.delete_original(chat_id, message.message_id).await;
            metrics::record_relay("duplicate");
            return Ok(RelayOutcome::Duplicate);
        }

        let upload = AudioUpload::by_file_id(audio.file_id.clone());
        let sent = match self.api.send_audio(self.group_id, &upload, thread_id, "").await {
            Ok(sent) => sent,
            Err(e) => {
                warn!(
                    chat_id,
                    message_id = message.message_id,
                    error = %e,
                    "Upload failed, original kept"
                );
                metrics::record_relay("failed");
                return Ok(RelayOutcome::UploadFailed(e));
            }
        };

        let record = SongRecord {
            message_id: Some(sent.message_id),
            ..candidate
        };

        {
            let mut catalog = self.catalog.lock().await;
            catalog.push(record.clone());
            if let Err(e) = catalog.save() {
                let e = Error::DataIntegrity(format!("catalog not saved after upload: {}", e));
                error!(message_id = sent.message_id, error = %e, "Catalog out of sync with chat");
            }
            metrics::set_catalog_size(catalog.len());
        }

        self.delete_original(chat_id, message.message_id).await;

        if let Some(mirror) = &self.inline {
            match mirror.mirror(&record).await {
                Ok(Some(_)) => info!(label = %record.label(), "Mirrored to inline channel"),
                Ok(None) => {}
                Err(e) => warn!(label = %record.label(), error = %e, "Inline mirror failed"),
            }
        }

        metrics::record_relay("relayed");
        info!(
            chat_id,
            thread_id = ?record.thread_id,
            message_id = sent.message_id,
            label = %record.label(),
            "Relayed song"
        );
        Ok(RelayOutcome::Relayed(record))
    }

    async fn delete_original(&self, chat_id: i64, message_id: i64) {
        if let Err(e) = self.api.delete_message(chat_id, message_id).await {
            warn!(chat_id, message_id, error = %e, "Could not delete original message");
        }
    }
}
