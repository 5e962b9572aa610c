//! Music info HTTP client
//!
//! Looks songs up with `GET {base_url}/info?group={group}&song={name}`. The
//! upstream answers with a JSON object:
//!
//! ```json
//! {
//!   "name": "Supermassive Black Hole",
//!   "group": "Muse",
//!   "releaseDate": "16.07.2006",
//!   "text": "Ooh baby, don't you know I suffer?\n\nOoh baby...",
//!   "link": "https://www.youtube.com/watch?v=Xsp3_a-PMTw"
//! }
//! ```
//!
//! A 400 response means the upstream does not know the song and is reported as
//! [`MetadataError::BadRequest`].

use crate::error::{MetadataError, Result};
use crate::provider::SongMetadataProvider;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use core_library::{Interrupted, RequestContext, Song, SongInfo};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Upstream error bodies are truncated to at most this many bytes in errors
const MAX_ERROR_BODY: usize = 512;

/// Cut `body` to `max` bytes without splitting a character
fn truncate_body(mut body: String, max: usize) -> String {
    if body.len() > max {
        let mut end = max;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
    }
    body
}

#[derive(Debug, Clone)]
pub struct MusicInfoConfig {
    /// Base URL of the music info service. A bare `host:port` is read as `http://host:port`.
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl MusicInfoConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Song details as returned by the upstream
#[derive(Debug, Deserialize)]
struct SongDetail {
    #[serde(default, alias = "song")]
    name: String,
    #[serde(default)]
    group: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    link: Option<String>,
    #[serde(default, alias = "releaseDate")]
    release_date: Option<String>,
}

/// Parse `DD.MM.YYYY`, `YYYY-MM-DD` or an RFC 3339 timestamp
fn parse_release_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%d.%m.%Y")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

impl SongDetail {
    fn into_song(self) -> Result<Song> {
        if self.name.trim().is_empty() {
            return Err(MetadataError::InvalidResponse("missing song name".to_string()));
        }
        if self.group.trim().is_empty() {
            return Err(MetadataError::InvalidResponse("missing group".to_string()));
        }
        if self.text.trim().is_empty() {
            return Err(MetadataError::InvalidResponse("missing song text".to_string()));
        }

        let release_date = match self.release_date.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(parse_release_date(raw).ok_or_else(|| {
                MetadataError::InvalidResponse(format!("unparseable release date {:?}", raw))
            })?),
        };

        let mut song = Song::new(self.name, self.group).with_text(self.text);
        song.link = self.link.filter(|link| !link.is_empty());
        song.release_date = release_date;
        Ok(song)
    }
}

/// reqwest-based [`SongMetadataProvider`]
#[derive(Debug, Clone)]
pub struct MusicInfoClient {
    client: Client,
    info_url: Url,
}

impl MusicInfoClient {
    pub fn new(config: MusicInfoConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(5))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("song-library/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Self::with_client(client, &config.base_url)
    }

    pub fn with_client(client: Client, base_url: &str) -> Result<Self> {
        let base = if base_url.contains("://") {
            base_url.to_string()
        } else {
            format!("http://{}", base_url)
        };
        let info_url = Url::parse(&format!("{}/info", base.trim_end_matches('/')))
            .map_err(|e| MetadataError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        Ok(Self { client, info_url })
    }

    async fn request(&self, info: &SongInfo) -> Result<Song> {
        let response = self
            .client
            .get(self.info_url.clone())
            .query(&[("group", info.group.as_str()), ("song", info.name.as_str())])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    warn!(error = %e, "Music info request timed out");
                } else if e.is_connect() {
                    warn!(error = %e, "Music info service unreachable");
                }
                MetadataError::Transport(e)
            })?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST {
            let body = truncate_body(response.text().await.unwrap_or_default(), MAX_ERROR_BODY);
            warn!(status = status.as_u16(), "Music info rejected the lookup");
            return Err(MetadataError::BadRequest {
                status: status.as_u16(),
                body,
            });
        }
        if !status.is_success() {
            warn!(status = status.as_u16(), "Music info returned an error status");
            return Err(MetadataError::UnexpectedStatus {
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await?;
        let detail: SongDetail = serde_json::from_slice(&bytes).map_err(MetadataError::Decode)?;
        debug!(
            song_name = %detail.name,
            group_name = %detail.group,
            "Music info response decoded"
        );
        detail.into_song()
    }
}

#[async_trait]
impl SongMetadataProvider for MusicInfoClient {
    #[instrument(skip(self, ctx, info), fields(song_name = %info.name, group_name = %info.group))]
    async fn fetch(&self, ctx: &RequestContext, info: &SongInfo) -> Result<Song> {
        info!("Fetching song info");

        let song = match ctx.guard(self.request(info)).await {
            Ok(result) => result?,
            Err(Interrupted::Cancelled) => return Err(MetadataError::Cancelled),
            Err(Interrupted::DeadlineExceeded) => return Err(MetadataError::DeadlineExceeded),
        };

        info!("Song info fetched");
        Ok(song)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detail(json: &str) -> SongDetail {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_parse_release_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2006, 7, 16).unwrap();
        assert_eq!(parse_release_date("16.07.2006"), Some(expected));
        assert_eq!(parse_release_date("2006-07-16"), Some(expected));
        assert_eq!(parse_release_date("2006-07-16T10:00:00Z"), Some(expected));
        assert_eq!(parse_release_date("July 2006"), None);
    }

    #[test]
    fn test_detail_into_song() {
        let song = detail(
            r#"{"name":"Supermassive Black Hole","group":"Muse","releaseDate":"16.07.2006",
                "text":"Ooh baby\n\nOoh","link":"https://example.com/smbh"}"#,
        )
        .into_song()
        .unwrap();

        assert!(!song.is_persisted());
        assert_eq!(song.name, "Supermassive Black Hole");
        assert_eq!(song.group, "Muse");
        assert_eq!(song.text, "Ooh baby\n\nOoh");
        assert_eq!(song.link.as_deref(), Some("https://example.com/smbh"));
        assert_eq!(song.release_date, NaiveDate::from_ymd_opt(2006, 7, 16));
    }

    #[test]
    fn test_detail_accepts_snake_case_and_song_alias() {
        let song = detail(r#"{"song":"Hysteria","group":"Muse","text":"x","release_date":"2003-12-01"}"#)
            .into_song()
            .unwrap();
        assert_eq!(song.name, "Hysteria");
        assert_eq!(song.release_date, NaiveDate::from_ymd_opt(2003, 12, 1));
        assert_eq!(song.link, None);
    }

    #[test]
    fn test_detail_requires_text() {
        let err = detail(r#"{"name":"Hysteria","group":"Muse","text":""}"#)
            .into_song()
            .unwrap_err();
        assert!(matches!(err, MetadataError::InvalidResponse(_)));
    }

    #[test]
    fn test_detail_rejects_bad_release_date() {
        let err = detail(r#"{"name":"Hysteria","group":"Muse","text":"x","releaseDate":"soon"}"#)
            .into_song()
            .unwrap_err();
        assert!(matches!(err, MetadataError::InvalidResponse(_)));
    }

    #[test]
    fn test_truncate_body_respects_char_boundaries() {
        assert_eq!(truncate_body("short".to_string(), 512), "short");
        assert_eq!(truncate_body("abcdef".to_string(), 3), "abc");

        // "Ж" is two bytes; the cut at 3 would land inside the second one
        assert_eq!(truncate_body("ЖЖЖ".to_string(), 3), "Ж");

        let body = format!("{}{}", "a".repeat(511), "Ж".repeat(10));
        let cut = truncate_body(body, MAX_ERROR_BODY);
        assert_eq!(cut.len(), 511);
        assert!(cut.chars().all(|c| c == 'a'));
    }

    #[test]
    fn test_base_url_without_scheme() {
        let client = MusicInfoClient::with_client(Client::new(), "localhost:8081").unwrap();
        assert_eq!(client.info_url.as_str(), "http://localhost:8081/info");

        let client = MusicInfoClient::with_client(Client::new(), "https://music.example.com/api/").unwrap();
        assert_eq!(client.info_url.as_str(), "https://music.example.com/api/info");
    }
}
