//! Sending catalog songs somewhere, pruning records whose message is gone.

use tracing::{info, warn};

use crate::catalog::{prune_and_save, SharedCatalog, SongRecord};
use crate::metrics;
use crate::telegram::{AudioUpload, BotApi};
use crate::{Error, Result};

/// What happened to one song delivery.
#[derive(Debug)]
pub enum Delivery {
    /// Copied; carries the id of the new message.
    Delivered(i64),
    /// The source message no longer exists; the record was dropped.
    Pruned,
    /// Any other failure, already logged.
    Failed(Error),
}

impl Delivery {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Delivery::Delivered(_))
    }
}

/// Copies catalog songs out of the monitored chat.
#[derive(Clone)]
pub struct SongSender {
    api: BotApi,
    source_chat: i64,
    catalog: SharedCatalog,
}

impl SongSender {
    pub fn new(api: BotApi, source_chat: i64, catalog: SharedCatalog) -> Self {
        Self {
            api,
            source_chat,
            catalog,
        }
    }

    /// Copy `record` to `chat_id` (optionally into a topic).
    ///
    /// Records without a source message are re-sent by file id.
    pub async fn send(&self, record: &SongRecord, chat_id: i64, thread_id: Option<i64>) -> Delivery {
        match self.dispatch(record, chat_id, thread_id).await {
            Ok(message_id) => Delivery::Delivered(message_id),
            Err(e) if e.is_message_gone() => {
                self.prune(record).await;
                Delivery::Pruned
            }
            Err(e) => {
                warn!(
                    chat_id,
                    message_id = ?record.message_id,
                    error = %e,
                    "Failed to send song"
                );
                Delivery::Failed(e)
            }
        }
    }

    async fn dispatch(
        &self,
        record: &SongRecord,
        chat_id: i64,
        thread_id: Option<i64>,
    ) -> Result<i64> {
        if let Some(message_id) = record.message_id {
            return self
                .api
                .copy_message(chat_id, self.source_chat, message_id, thread_id)
                .await;
        }

        let file_id = record.file_id.clone().ok_or_else(|| {
            Error::InvalidArgument(format!("{} has neither message nor file id", record.label()))
        })?;
        let upload = AudioUpload {
            file_id,
            title: Some(record.title.clone()),
            performer: Some(record.performer.clone()),
        };
        let sent = self.api.send_audio(chat_id, &upload, thread_id, "").await?;
        Ok(sent.message_id)
    }

    /// Send several songs, returning how many arrived.
    pub async fn send_all(
        &self,
        records: &[SongRecord],
        chat_id: i64,
        thread_id: Option<i64>,
    ) -> usize {
        let mut delivered = 0;
        for record in records {
            if self.send(record, chat_id, thread_id).await.is_delivered() {
                delivered += 1;
            }
        }
        delivered
    }

    async fn prune(&self, record: &SongRecord) {
        let mut catalog = self.catalog.lock().await;
        match prune_and_save(&mut catalog, record) {
            Ok(true) => {
                metrics::record_pruned();
                metrics::set_catalog_size(catalog.len());
                info!(
                    message_id = ?record.message_id,
                    label = %record.label(),
                    "Pruned vanished song from catalog"
                );
            }
            Ok(false) => {}
            Err(e) => warn!(error = %e, "Catalog prune could not be persisted"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{shared, Catalog};
    use httpmock::prelude::*;
    use serde_json::{json, Value};
    use tempfile::tempdir;

    #[tokio::test]
    async fn vanished_message_is_pruned_and_saved() {
        let server = MockServer::start_async().await;
        let temp = tempdir().unwrap();
        let path = temp.path().join("songs.json");

        let mut catalog = Catalog::new(&path);
        catalog.push(SongRecord::new("Gone", "A", 11, None));
        catalog.push(SongRecord::new("Here", "B", 12, None));
        catalog.save().unwrap();
        let catalog = shared(catalog);

        server.mock(|when, then| {
            when.method(POST).path("/botT/copyMessage").matches(|req| {
                let body: Value = serde_json::from_slice(req.body().as_ref()).unwrap();
                body["message_id"] == 11
            });
            then.status(400).json_body(json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: message to copy not found"
            }));
        });

        let api = BotApi::with_base_url(&server.base_url(), "T").unwrap();
        let sender = SongSender::new(api, -100, catalog.clone());
        let record = SongRecord::new("Gone", "A", 11, None);

        assert!(matches!(sender.send(&record, 5, None).await, Delivery::Pruned));
        assert_eq!(catalog.lock().await.len(), 1);
        assert_eq!(Catalog::load(&path).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn other_failures_leave_catalog_alone() {
        let server = MockServer::start_async().await;
        let temp = tempdir().unwrap();

        let mut catalog = Catalog::new(temp.path().join("songs.json"));
        catalog.push(SongRecord::new("Song", "A", 11, None));
        let catalog = shared(catalog);

        server.mock(|when, then| {
            when.method(POST).path("/botT/copyMessage");
            then.status(403).json_body(json!({
                "ok": false,
                "error_code": 403,
                "description": "Forbidden: bot was blocked by the user"
            }));
        });

        let api = BotApi::with_base_url(&server.base_url(), "T").unwrap();
        let sender = SongSender::new(api, -100, catalog.clone());

        let outcome = sender
            .send(&SongRecord::new("Song", "A", 11, None), 5, None)
            .await;
        assert!(matches!(outcome, Delivery::Failed(_)));
        assert_eq!(catalog.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn file_only_record_is_resent_by_file_id() {
        let server = MockServer::start_async().await;
        let temp = tempdir().unwrap();
        let catalog = shared(Catalog::new(temp.path().join("songs.json")));

        let copy_mock = server.mock(|when, then| {
            when.method(POST).path("/botT/copyMessage");
            then.status(200)
                .json_body(json!({ "ok": true, "result": { "message_id": 1 } }));
        });
        let audio_mock = server.mock(|when, then| {
            when.method(POST).path("/botT/sendAudio").matches(|req| {
                let body: Value = serde_json::from_slice(req.body().as_ref()).unwrap();
                body["chat_id"] == 5 && body["audio"] == "F1" && body["title"] == "Song"
            });
            then.status(200).json_body(json!({
                "ok": true,
                "result": { "message_id": 41, "chat": { "id": 5, "type": "private" } }
            }));
        });

        let api = BotApi::with_base_url(&server.base_url(), "T").unwrap();
        let sender = SongSender::new(api, -100, catalog);
        let record: SongRecord = serde_json::from_value(
            json!({ "title": "Song", "performer": "Band", "file_id": "F1" }),
        )
        .unwrap();

        assert!(matches!(
            sender.send(&record, 5, None).await,
            Delivery::Delivered(41)
        ));
        audio_mock.assert_calls(1);
        copy_mock.assert_calls(0);
    }

    #[tokio::test]
    async fn send_all_counts_deliveries() {
        let server = MockServer::start_async().await;
        let temp = tempdir().unwrap();
        let catalog = shared(Catalog::new(temp.path().join("songs.json")));

        let copy_mock = server.mock(|when, then| {
            when.method(POST).path("/botT/copyMessage").matches(|req| {
                let body: Value = serde_json::from_slice(req.body().as_ref()).unwrap();
                body["message_thread_id"] == 4
            });
            then.status(200)
                .json_body(json!({ "ok": true, "result": { "message_id": 1 } }));
        });

        let api = BotApi::with_base_url(&server.base_url(), "T").unwrap();
        let sender = SongSender::new(api, -100, catalog);
        let records = vec![
            SongRecord::new("A", "X", 1, None),
            SongRecord::new("B", "Y", 2, None),
        ];

        assert_eq!(sender.send_all(&records, -100, Some(4)).await, 2);
        copy_mock.assert_calls(2);
    }
}
