//! Lyrics lookup against a Genius-compatible search API.
//!
//! The first search hit wins. Its page is scraped for lyric containers
//! (`data-lyrics-container="true"` blocks, then the older `class="lyrics"`
//! block); when scraping fails the reply falls back to title and link.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, warn};

use crate::{Error, Result};

pub const NOT_FOUND: &str = "Lyrics not found.";

/// Telegram rejects messages above 4096 characters.
const MAX_REPLY_CHARS: usize = 4000;

static CONTAINER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<div[^>]*data-lyrics-container="true"[^>]*>(.*?)</div>"#)
        .expect("valid lyrics container regex")
});

static LEGACY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<div[^>]*class="lyrics"[^>]*>(.*?)</div>"#).expect("valid legacy lyrics regex")
});

static BREAK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").expect("valid break regex"));

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid tag regex"));

/// A search hit reduced to what the bot shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LyricsHit {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    response: Option<SearchResponse>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    hits: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    result: HitResult,
}

#[derive(Debug, Deserialize)]
struct HitResult {
    #[serde(default)]
    full_title: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    primary_artist: Option<Artist>,
    url: String,
}

#[derive(Debug, Deserialize)]
struct Artist {
    name: String,
}

impl HitResult {
    fn display_title(&self) -> String {
        if let Some(full) = self.full_title.as_deref().filter(|t| !t.is_empty()) {
            return full.to_string();
        }
        let title = self.title.as_deref().unwrap_or("Unknown");
        match &self.primary_artist {
            Some(artist) => format!("{} by {}", title, artist.name),
            None => title.to_string(),
        }
    }
}

/// Lyrics API client.
#[derive(Debug, Clone)]
pub struct LyricsClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl LyricsClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let http = Client::builder()
            .user_agent("song_relay/0.1.0")
            .timeout(Duration::from_secs(20))
            .build()
            .map_err(|e| Error::InvalidArgument(format!("HTTP client error: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// First hit for `query`, if any.
    pub async fn search(&self, query: &str) -> Result<Option<LyricsHit>> {
        let response = self
            .http
            .get(format!("{}/search", self.base_url))
            .query(&[("q", query)])
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| Error::LyricsError(format!("search request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::LyricsError(format!("search error {}: {}", status, text)));
        }

        let envelope: SearchEnvelope = response
            .json()
            .await
            .map_err(|e| Error::LyricsError(format!("invalid search response: {}", e)))?;

        Ok(envelope
            .response
            .and_then(|r| r.hits.into_iter().next())
            .map(|hit| LyricsHit {
                title: hit.result.display_title(),
                url: hit.result.url,
            }))
    }

    /// Download a lyrics page and pull the lyric text out of it.
    pub async fn fetch_lyrics(&self, url: &str) -> Result<Option<String>> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::LyricsError(format!("page request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::LyricsError(format!(
                "page error {}",
                response.status()
            )));
        }

        let html = response
            .text()
            .await
            .map_err(|e| Error::LyricsError(format!("page body unreadable: {}", e)))?;

        Ok(extract_lyrics(&html))
    }

    /// User-facing reply for `query`. Never fails.
    pub async fn lookup(&self, query: &str) -> String {
        let hit = match self.search(query).await {
            Ok(Some(hit)) => hit,
            Ok(None) => {
                info!(query, "No lyrics hit");
                return NOT_FOUND.to_string();
            }
            Err(e) => {
                warn!(query, error = %e, "Lyrics search failed");
                return NOT_FOUND.to_string();
            }
        };

        match self.fetch_lyrics(&hit.url).await {
            Ok(Some(lyrics)) => truncate_chars(&format!("{}\n\n{}", hit.title, lyrics), MAX_REPLY_CHARS),
            Ok(None) => format!("{}\n{}", hit.title, hit.url),
            Err(e) => {
                warn!(url = %hit.url, error = %e, "Lyrics page scrape failed");
                format!("{}\n{}", hit.title, hit.url)
            }
        }
    }
}

/// Lyric text from a page, trying the current layout first.
pub fn extract_lyrics(html: &str) -> Option<String> {
    let blocks: Vec<String> = CONTAINER_RE
        .captures_iter(html)
        .map(|c| html_to_text(&c[1]))
        .filter(|t| !t.is_empty())
        .collect();

    if !blocks.is_empty() {
        return Some(blocks.join("\n"));
    }

    LEGACY_RE
        .captures(html)
        .map(|c| html_to_text(&c[1]))
        .filter(|t| !t.is_empty())
}

fn html_to_text(fragment: &str) -> String {
    let with_breaks = BREAK_RE.replace_all(fragment, "\n");
    let stripped = TAG_RE.replace_all(&with_breaks, "");
    let decoded = stripped
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&");

    decoded
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((index, _)) => format!("{}…", &text[..index]),
        None => text.to_string(),
    }
}
