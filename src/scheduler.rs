//! Nightly broadcast of a few random songs into one topic.

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use chrono_tz::Tz;
use tokio::time::sleep;
use tracing::{error, info};

use crate::catalog::SharedCatalog;
use crate::config::BroadcastConfig;
use crate::delivery::SongSender;
use crate::Result;

/// Fires once per configured wall-clock minute.
pub struct BroadcastScheduler {
    sender: SongSender,
    group_id: i64,
    thread_id: i64,
    catalog: SharedCatalog,
    settings: BroadcastConfig,
    last_fired: Option<(NaiveDate, u32, u32)>,
}

impl BroadcastScheduler {
    /// `None` when no broadcast topic is configured.
    pub fn new(
        sender: SongSender,
        group_id: i64,
        catalog: SharedCatalog,
        settings: BroadcastConfig,
    ) -> Option<Self> {
        let thread_id = settings.thread_id?;
        Some(Self {
            sender,
            group_id,
            thread_id,
            catalog,
            settings,
            last_fired: None,
        })
    }

    fn is_due(&self, now: &DateTime<Tz>) -> bool {
        now.hour() == self.settings.hour
            && now.minute() == self.settings.minute
            && self.last_fired != Some((now.date_naive(), now.hour(), now.minute()))
    }

    /// Broadcast if `now` falls in the configured minute and it has not
    /// fired in that minute yet. Returns the number of songs delivered.
    pub async fn tick(&mut self, now: DateTime<Tz>) -> Result<Option<usize>> {
        if !self.is_due(&now) {
            return Ok(None);
        }
        self.last_fired = Some((now.date_naive(), now.hour(), now.minute()));

        let picks = self
            .catalog
            .lock()
            .await
            .sample_filtered(self.settings.sample_size, &self.settings.exclude_threads);

        if picks.is_empty() {
            info!("Broadcast skipped, nothing to send");
            return Ok(Some(0));
        }

        let delivered = self
            .sender
            .send_all(&picks, self.group_id, Some(self.thread_id))
            .await;
        info!(
            thread_id = self.thread_id,
            picked = picks.len(),
            delivered,
            "Nightly broadcast sent"
        );
        Ok(Some(delivered))
    }

    /// Check the clock forever.
    pub async fn run(mut self) {
        info!(
            hour = self.settings.hour,
            minute = self.settings.minute,
            timezone = %self.settings.timezone,
            thread_id = self.thread_id,
            "Broadcast scheduler started"
        );

        loop {
            let now = Utc::now().with_timezone(&self.settings.timezone);
            match self.tick(now).await {
                Ok(Some(_)) => sleep(self.settings.cooldown).await,
                Ok(None) => {}
                Err(e) => error!(error = %e, "Broadcast failed"),
            }
            sleep(self.settings.check_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{shared, Catalog, SongRecord};
    use crate::telegram::BotApi;
    use chrono::TimeZone;
    use chrono_tz::Asia::Tehran;
    use httpmock::prelude::*;
    use serde_json::{json, Value};
    use tempfile::tempdir;

    const GROUP: i64 = -1001;

    fn scheduler(server: &MockServer, records: Vec<SongRecord>, exclude: Vec<i64>) -> BroadcastScheduler {
        let temp = tempdir().unwrap();
        let mut catalog = Catalog::new(temp.path().join("songs.json"));
        for record in records {
            catalog.push(record);
        }
        let catalog = shared(catalog);

        let api = BotApi::with_base_url(&server.base_url(), "T").unwrap();
        let settings = BroadcastConfig {
            thread_id: Some(9),
            exclude_threads: exclude,
            ..BroadcastConfig::default()
        };
        BroadcastScheduler::new(
            SongSender::new(api, GROUP, catalog.clone()),
            GROUP,
            catalog,
            settings,
        )
        .unwrap()
    }

    fn songs(n: i64) -> Vec<SongRecord> {
        (1..=n)
            .map(|i| SongRecord::new(format!("Song {}", i), "Band", i, Some(2)))
            .collect()
    }

    #[test]
    fn disabled_without_topic() {
        let temp = tempdir().unwrap();
        let catalog = shared(Catalog::new(temp.path().join("songs.json")));
        let api = BotApi::with_base_url("http://127.0.0.1:9", "T").unwrap();
        let sender = SongSender::new(api, GROUP, catalog.clone());

        assert!(BroadcastScheduler::new(sender, GROUP, catalog, BroadcastConfig::default()).is_none());
    }

    #[tokio::test]
    async fn fires_once_in_the_configured_minute() {
        let server = MockServer::start_async().await;
        let copy = server.mock(|when, then| {
            when.method(POST).path("/botT/copyMessage").matches(|req| {
                let body: Value = serde_json::from_slice(req.body().as_ref()).unwrap();
                body["chat_id"] == GROUP && body["message_thread_id"] == 9
            });
            then.status(200)
                .json_body(json!({ "ok": true, "result": { "message_id": 1 } }));
        });

        let mut scheduler = scheduler(&server, songs(10), vec![]);

        let before = Tehran.with_ymd_and_hms(2024, 5, 1, 23, 10, 59).unwrap();
        assert_eq!(scheduler.tick(before).await.unwrap(), None);

        let at = Tehran.with_ymd_and_hms(2024, 5, 1, 23, 11, 0).unwrap();
        assert_eq!(scheduler.tick(at).await.unwrap(), Some(3));

        let later_same_minute = Tehran.with_ymd_and_hms(2024, 5, 1, 23, 11, 45).unwrap();
        assert_eq!(scheduler.tick(later_same_minute).await.unwrap(), None);

        copy.assert_calls(3);

        let next_day = Tehran.with_ymd_and_hms(2024, 5, 2, 23, 11, 5).unwrap();
        assert_eq!(scheduler.tick(next_day).await.unwrap(), Some(3));
        copy.assert_calls(6);
    }

    #[tokio::test]
    async fn excluded_threads_are_never_broadcast() {
        let server = MockServer::start_async().await;
        let copy = server.mock(|when, then| {
            when.method(POST).path("/botT/copyMessage").matches(|req| {
                let body: Value = serde_json::from_slice(req.body().as_ref()).unwrap();
                body["message_id"] == 100
            });
            then.status(200)
                .json_body(json!({ "ok": true, "result": { "message_id": 1 } }));
        });

        let mut records = songs(5);
        records.push(SongRecord::new("Allowed", "Band", 100, Some(4)));
        let mut scheduler = scheduler(&server, records, vec![2]);

        let at = Tehran.with_ymd_and_hms(2024, 5, 1, 23, 11, 0).unwrap();
        assert_eq!(scheduler.tick(at).await.unwrap(), Some(1));
        copy.assert_calls(1);
    }

    #[tokio::test]
    async fn empty_catalog_fires_without_sending() {
        let server = MockServer::start_async().await;
        let mut scheduler = scheduler(&server, vec![], vec![]);

        let at = Tehran.with_ymd_and_hms(2024, 5, 1, 23, 11, 0).unwrap();
        assert_eq!(scheduler.tick(at).await.unwrap(), Some(0));
    }
}
