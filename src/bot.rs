//! Runtime wiring: routes polled updates to the relay and the dispatcher.

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::catalog::{shared, Catalog, SharedCatalog};
use crate::config::Config;
use crate::delivery::SongSender;
use crate::dispatcher::Dispatcher;
use crate::metrics;
use crate::poller::UpdatePoller;
use crate::relay::{AudioRelay, InlineMirror};
use crate::scheduler::BroadcastScheduler;
use crate::telegram::{BotApi, Message, Update};
use crate::Result;

pub struct Bot {
    api: BotApi,
    poll_timeout_secs: u64,
    catalog: SharedCatalog,
    relay: AudioRelay,
    dispatcher: Dispatcher,
    scheduler: Option<BroadcastScheduler>,
}

impl Bot {
    /// Load both catalogs from disk and build the bot.
    ///
    /// A catalog that exists but cannot be parsed is an error; the bot will
    /// not start and later overwrite it.
    pub fn from_config(config: &Config) -> Result<Self> {
        let api = BotApi::with_base_url(&config.api_base, &config.bot_token)?;
        let catalog = Catalog::load(&config.catalog_path)?;
        let inline_catalog = Catalog::load(&config.inline_catalog_path)?;
        Self::new(config, api, catalog, inline_catalog)
    }

    pub fn new(
        config: &Config,
        api: BotApi,
        catalog: Catalog,
        inline_catalog: Catalog,
    ) -> Result<Self> {
        metrics::set_catalog_size(catalog.len());
        let catalog = shared(catalog);
        let inline_catalog = shared(inline_catalog);

        let mut relay = AudioRelay::new(api.clone(), config.group_id, catalog.clone());
        if let Some(channel_id) = config.inline_channel_id {
            relay = relay.with_inline_mirror(InlineMirror::new(
                api.clone(),
                channel_id,
                inline_catalog.clone(),
            ));
        }

        let dispatcher = Dispatcher::new(api.clone(), config, catalog.clone(), inline_catalog)?;

        let scheduler = BroadcastScheduler::new(
            SongSender::new(api.clone(), config.group_id, catalog.clone()),
            config.group_id,
            catalog.clone(),
            config.broadcast.clone(),
        );

        Ok(Self {
            api,
            poll_timeout_secs: config.poll_timeout_secs,
            catalog,
            relay,
            dispatcher,
            scheduler,
        })
    }

    pub fn catalog(&self) -> SharedCatalog {
        self.catalog.clone()
    }

    /// Handle one update. Failures are logged and the update is dropped.
    pub async fn handle_update(&self, update: Update) {
        let Some(message) = update.message else {
            debug!(update_id = update.update_id, "Skipping non-message update");
            return;
        };
        self.handle_message(&message).await;
    }

    async fn handle_message(&self, message: &Message) {
        if self.relay.accepts(message) {
            if let Err(e) = self.relay.relay(message).await {
                warn!(message_id = message.message_id, error = %e, "Relay failed");
            }
            return;
        }

        if message.is_from_bot() {
            return;
        }

        let Some(command) = self.dispatcher.command_for(message).await else {
            return;
        };

        let name = command.name();
        let start = Instant::now();
        let result = self.dispatcher.execute(message, command).await;
        metrics::record_command_result(name, start.elapsed(), result.is_ok());

        if let Err(e) = result {
            warn!(
                command = name,
                chat_id = message.chat.id,
                error = %e,
                "Command failed"
            );
        }
    }

    /// Ask getMe who we are so "/cmd@OtherBot" can be told apart from ours.
    async fn learn_username(&mut self) {
        match self.api.get_me().await {
            Ok(me) => {
                info!(username = ?me.username, "Bot identity resolved");
                self.dispatcher.set_username(me.username);
            }
            Err(e) => warn!(error = %e, "getMe failed, accepting any @bot suffix"),
        }
    }

    /// Poll until Ctrl-C.
    pub async fn run(mut self) -> Result<()> {
        match self.api.delete_webhook(false).await {
            Ok(_) => debug!("Webhook cleared"),
            Err(e) => warn!(error = %e, "Could not clear webhook"),
        }
        self.learn_username().await;

        if let Some(scheduler) = self.scheduler.take() {
            tokio::spawn(scheduler.run());
        } else {
            info!("No broadcast topic configured, nightly broadcast disabled");
        }

        let records = self.catalog.lock().await.len();
        info!(records, "Bot started, polling for updates");

        let mut poller = UpdatePoller::new(self.api.clone(), self.poll_timeout_secs);
        tokio::select! {
            _ = poller.run(|update| self.handle_update(update)) => {}
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!(error = %e, "Failed to listen for shutdown signal");
                }
                info!("Shutdown requested");
            }
        }

        Ok(())
    }
}
