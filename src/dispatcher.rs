//! Chat command parsing and handling.
//!
//! Text is matched against an ordered table of slash commands; anything else
//! is tried as a song label ("title - performer") from the catalog. Documents
//! named like a catalog file are treated as a catalog restore.

use std::path::Path;

use tracing::{info, warn};

use crate::catalog::{Catalog, SharedCatalog, SongRecord};
use crate::config::{Config, CATALOG_FILE, INLINE_CATALOG_FILE};
use crate::delivery::{Delivery, SongSender};
use crate::lyrics::LyricsClient;
use crate::metrics;
use crate::search::{format_hits, search, SearchOptions};
use crate::telegram::{BotApi, Document, Message, ReplyMarkup};
use crate::{Error, Result};

pub const USAGE: &str = "Send audio to the group and it will be catalogued.\n\n\
/random - a few random songs\n\
/list - the catalog as a file\n\
/search <title> - find songs by title\n\
/lyrics <song> - look up lyrics\n\
Send a song label from the search results to get that song.";

pub const EMPTY_CATALOG: &str = "The catalog is empty.";
pub const NO_RESULTS: &str = "No songs found";
pub const SEARCH_USAGE: &str = "Usage: /search <title>";
pub const LYRICS_USAGE: &str = "Usage: /lyrics <song>";
pub const LYRICS_DISABLED: &str = "Lyrics lookup is not configured.";
pub const SONG_GONE: &str = "That song is no longer available.";
pub const RESTORE_DENIED: &str = "Only operators can replace the catalog.";

/// A parsed request.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start,
    Help,
    Random,
    List,
    Search(String),
    Lyrics(String),
    /// Exact label of a catalogued song.
    Song(SongRecord),
    /// Uploaded catalog replacement.
    Restore(Document),
}

type Constructor = fn(&str) -> Command;

fn start(_: &str) -> Command {
    Command::Start
}

fn help(_: &str) -> Command {
    Command::Help
}

fn random(_: &str) -> Command {
    Command::Random
}

fn list(_: &str) -> Command {
    Command::List
}

fn search_for(args: &str) -> Command {
    Command::Search(args.to_string())
}

fn lyrics_for(args: &str) -> Command {
    Command::Lyrics(args.to_string())
}

/// Slash commands in match order.
const DISPATCH_TABLE: &[(&str, Constructor)] = &[
    ("/start", start),
    ("/help", help),
    ("/random", random),
    ("/list", list),
    ("/search", search_for),
    ("/lyrics", lyrics_for),
];

impl Command {
    /// Parse text; falls back to a label lookup in `catalog`.
    ///
    /// With `own_username` known, commands suffixed with another bot's name
    /// ("/random@OtherBot") are not ours and yield `None`.
    pub fn parse(text: &str, catalog: &Catalog, own_username: Option<&str>) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let (head, args) = match text.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (text, ""),
        };
        let name = match head.split_once('@') {
            Some((name, addressee)) if head.starts_with('/') => {
                if own_username.is_some_and(|own| !own.eq_ignore_ascii_case(addressee)) {
                    return None;
                }
                name
            }
            _ => head,
        };

        if let Some((_, build)) = DISPATCH_TABLE
            .iter()
            .find(|(command, _)| command.eq_ignore_ascii_case(name))
        {
            return Some(build(args));
        }

        catalog.find_by_label(text).cloned().map(Command::Song)
    }

    /// Metric and log label.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Help => "help",
            Command::Random => "random",
            Command::List => "list",
            Command::Search(_) => "search",
            Command::Lyrics(_) => "lyrics",
            Command::Song(_) => "song",
            Command::Restore(_) => "restore",
        }
    }
}

fn file_name_of(path: &Path, fallback: &str) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| fallback.to_string())
}

/// Executes commands against the shared catalogs.
#[derive(Clone)]
pub struct Dispatcher {
    api: BotApi,
    catalog: SharedCatalog,
    inline_catalog: SharedCatalog,
    sender: SongSender,
    lyrics: Option<LyricsClient>,
    admin_ids: Vec<i64>,
    random_sample_size: usize,
    search_options: SearchOptions,
    catalog_file: String,
    inline_catalog_file: String,
    username: Option<String>,
}

impl Dispatcher {
    pub fn new(
        api: BotApi,
        config: &Config,
        catalog: SharedCatalog,
        inline_catalog: SharedCatalog,
    ) -> Result<Self> {
        let lyrics = match &config.lyrics_api_key {
            Some(key) => Some(LyricsClient::new(&config.lyrics_api_base, key)?),
            None => None,
        };

        Ok(Self {
            sender: SongSender::new(api.clone(), config.group_id, catalog.clone()),
            api,
            catalog,
            inline_catalog,
            lyrics,
            admin_ids: config.admin_ids.clone(),
            random_sample_size: config.random_sample_size,
            search_options: SearchOptions {
                limit: config.search_limit,
                threshold: config.search_threshold,
            },
            catalog_file: file_name_of(&config.catalog_path, CATALOG_FILE),
            inline_catalog_file: file_name_of(&config.inline_catalog_path, INLINE_CATALOG_FILE),
            username: None,
        })
    }

    /// The bot's own username, used to tell our `@suffix` commands apart.
    pub fn set_username(&mut self, username: Option<String>) {
        self.username = username;
    }

    /// The command carried by `message`, if any.
    pub async fn command_for(&self, message: &Message) -> Option<Command> {
        // Catalog uploads are only taken from private chats with the bot.
        if let Some(document) = &message.document {
            let is_json = document
                .file_name
                .as_deref()
                .is_some_and(|n| n.to_ascii_lowercase().ends_with(".json"));
            let private = !message.chat.is_group();
            return (is_json && private).then(|| Command::Restore(document.clone()));
        }

        let text = message.text()?;
        let catalog = self.catalog.lock().await;
        Command::parse(text, &catalog, self.username.as_deref())
    }

    pub async fn execute(&self, message: &Message, command: Command) -> Result<()> {
        let chat_id = message.chat.id;
        let thread_id = message.message_thread_id;

        match command {
            Command::Start | Command::Help => self.reply(message, USAGE).await,
            Command::Random => self.random(chat_id, thread_id).await,
            Command::List => self.list(chat_id, thread_id).await,
            Command::Search(query) => self.search(message, &query).await,
            Command::Lyrics(query) => self.lyrics(message, &query).await,
            Command::Song(record) => match self.sender.send(&record, chat_id, thread_id).await {
                Delivery::Delivered(_) => Ok(()),
                Delivery::Pruned => self.reply(message, SONG_GONE).await,
                Delivery::Failed(e) => Err(e),
            },
            Command::Restore(document) => self.restore(message, &document).await,
        }
    }

    async fn reply(&self, message: &Message, text: &str) -> Result<()> {
        self.api
            .send_message(message.chat.id, text, message.message_thread_id, None)
            .await?;
        Ok(())
    }

    async fn random(&self, chat_id: i64, thread_id: Option<i64>) -> Result<()> {
        let picks = self.catalog.lock().await.sample(self.random_sample_size);
        if picks.is_empty() {
            self.api
                .send_message(chat_id, EMPTY_CATALOG, thread_id, None)
                .await?;
            return Ok(());
        }

        let delivered = self.sender.send_all(&picks, chat_id, thread_id).await;
        info!(chat_id, requested = picks.len(), delivered, "Random songs sent");
        Ok(())
    }

    async fn list(&self, chat_id: i64, thread_id: Option<i64>) -> Result<()> {
        let (content, count) = {
            let catalog = self.catalog.lock().await;
            if catalog.is_empty() {
                (None, 0)
            } else {
                (Some(catalog.to_json()?), catalog.len())
            }
        };

        let Some(content) = content else {
            self.api
                .send_message(chat_id, EMPTY_CATALOG, thread_id, None)
                .await?;
            return Ok(());
        };

        let caption = format!("{} songs", count);
        self.api
            .send_document(chat_id, &self.catalog_file, content, thread_id, Some(&caption))
            .await?;
        Ok(())
    }

    async fn search(&self, message: &Message, query: &str) -> Result<()> {
        if query.trim().is_empty() {
            return self.reply(message, SEARCH_USAGE).await;
        }

        let hits = {
            let catalog = self.catalog.lock().await;
            search(catalog.records(), query, self.search_options)
        };
        if hits.is_empty() {
            return self.reply(message, NO_RESULTS).await;
        }

        let keyboard = ReplyMarkup::single_column(hits.iter().map(|h| h.record.label()));
        self.api
            .send_message(
                message.chat.id,
                &format_hits(&hits),
                message.message_thread_id,
                Some(&keyboard),
            )
            .await?;
        Ok(())
    }

    async fn lyrics(&self, message: &Message, query: &str) -> Result<()> {
        if query.trim().is_empty() {
            return self.reply(message, LYRICS_USAGE).await;
        }
        let reply = match &self.lyrics {
            Some(client) => client.lookup(query).await,
            None => LYRICS_DISABLED.to_string(),
        };
        self.reply(message, &reply).await
    }

    async fn restore(&self, message: &Message, document: &Document) -> Result<()> {
        let is_admin = message
            .sender_id()
            .is_some_and(|id| self.admin_ids.contains(&id));
        if !is_admin {
            warn!(sender = ?message.sender_id(), "Catalog upload from non-operator rejected");
            return self.reply(message, RESTORE_DENIED).await;
        }

        let file_name = document.file_name.as_deref().unwrap_or_default();
        let (target, is_main) = if file_name == self.catalog_file {
            (&self.catalog, true)
        } else if file_name == self.inline_catalog_file {
            (&self.inline_catalog, false)
        } else {
            let hint = format!(
                "Send a file named {} or {}.",
                self.catalog_file, self.inline_catalog_file
            );
            return self.reply(message, &hint).await;
        };

        let file = self.api.get_file(&document.file_id).await?;
        let file_path = file
            .file_path
            .ok_or_else(|| Error::DataIntegrity("uploaded file is not downloadable".to_string()))?;
        let content = self.api.download_file(&file_path).await?;

        let records = match Catalog::parse_records(&content) {
            Ok(records) => records,
            Err(e) => {
                self.reply(message, "The uploaded file is not a valid catalog.")
                    .await?;
                return Err(Error::DataIntegrity(format!(
                    "uploaded catalog rejected: {}",
                    e
                )));
            }
        };

        let count = {
            let mut catalog = target.lock().await;
            catalog.replace_all(records)?;
            if is_main {
                metrics::set_catalog_size(catalog.len());
            }
            catalog.len()
        };

        info!(file_name, records = count, "Catalog replaced from upload");
        self.reply(message, &format!("Catalog replaced: {} songs.", count))
            .await
    }
}
