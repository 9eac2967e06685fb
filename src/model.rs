//! Display, playlist and content types as served by the signage API.
//!
//! A fetched [`Display`] is an immutable snapshot; the fetcher swaps the whole
//! snapshot on every successful poll instead of patching it.

use crate::error::PlayerError;
use serde::Deserialize;
use std::time::Duration;

/// The player endpoint wraps the display in an envelope.
#[derive(Debug, Deserialize)]
pub struct DisplayEnvelope {
    pub display: Display,
}

/// Error body returned by the API on non-2xx responses.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}

/// A physical screen as configured in the dashboard.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Display {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub orientation: Orientation,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub playlist: Option<Playlist>,
}

impl Display {
    /// Items of the assigned playlist, empty when nothing is assigned.
    pub fn items(&self) -> &[PlaylistItem] {
        self.playlist
            .as_ref()
            .map(|p| p.items.as_slice())
            .unwrap_or(&[])
    }

    /// Reject snapshots the scheduler cannot run.
    pub fn validate(&self) -> Result<(), PlayerError> {
        for item in self.items() {
            if item.dwell().is_none() {
                return Err(PlayerError::Malformed(format!(
                    "playlist item {} has no positive duration",
                    item.id
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "String")]
pub enum Orientation {
    #[default]
    Landscape,
    Portrait,
}

impl From<String> for Orientation {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "portrait" => Orientation::Portrait,
            _ => Orientation::Landscape,
        }
    }
}

/// Ordered list of slots. The server sorts items; the player never does.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub items: Vec<PlaylistItem>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItem {
    pub id: String,
    /// Seconds on screen. Kept raw so a bad value can be reported.
    #[serde(default, alias = "durationSeconds")]
    pub duration: Option<f64>,
    #[serde(default)]
    pub transition: Transition,
    #[serde(default)]
    pub order: i64,
    pub content: ContentItem,
}

impl PlaylistItem {
    /// Dwell time, or `None` if the duration is missing or not positive.
    pub fn dwell(&self) -> Option<Duration> {
        self.duration
            .filter(|d| d.is_finite() && *d > 0.0)
            .map(Duration::from_secs_f64)
    }

    pub fn is_video(&self) -> bool {
        self.content.kind == MediaKind::Video
    }
}

/// Transition kinds. Only the fade cross-dissolve is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "String")]
pub enum Transition {
    #[default]
    Fade,
    Cut,
}

impl From<String> for Transition {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "cut" | "none" => Transition::Cut,
            _ => Transition::Fade,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: MediaKind,
}

/// Media kind tag. Anything that is not an image or a video is embedded as a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "String")]
pub enum MediaKind {
    Image,
    Video,
    Embed,
}

impl From<String> for MediaKind {
    fn from(s: String) -> Self {
        match s.to_uppercase().as_str() {
            "IMAGE" => MediaKind::Image,
            "VIDEO" => MediaKind::Video,
            _ => MediaKind::Embed,
        }
    }
}

/// Resolve a content URL against the API base.
///
/// Absolute and `data:` URLs are used as-is; anything else is relative to the API.
pub fn resolve_url(api_base: &str, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") || url.starts_with("data:") {
        return url.to_string();
    }
    let base = api_base.trim_end_matches('/');
    if url.starts_with('/') {
        format!("{}{}", base, url)
    } else {
        format!("{}/{}", base, url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn display_json(items: serde_json::Value) -> serde_json::Value {
        json!({
            "display": {
                "id": "d1",
                "name": "Lobby",
                "orientation": "LANDSCAPE",
                "width": 1920,
                "height": 1080,
                "playlist": { "id": "p1", "name": "Morning", "items": items }
            }
        })
    }

    #[test]
    fn parses_player_envelope_in_server_order() {
        let body = display_json(json!([
            { "id": "i2", "duration": 10, "transition": "fade", "order": 2,
              "content": { "id": "c2", "name": "Menu", "url": "/uploads/menu.png", "type": "IMAGE" } },
            { "id": "i1", "duration": 5.5, "transition": "fade", "order": 1,
              "content": { "id": "c1", "name": "Promo", "url": "https://cdn/x.mp4", "type": "VIDEO" } },
        ]));
        let env: DisplayEnvelope = serde_json::from_value(body).unwrap();
        let items = env.display.items();

        assert_eq!(items[0].id, "i2");
        assert_eq!(items[1].id, "i1");
        assert_eq!(items[0].content.kind, MediaKind::Image);
        assert!(items[1].is_video());
        assert_eq!(items[1].dwell(), Some(Duration::from_millis(5500)));
        assert!(env.display.validate().is_ok());
    }

    #[test]
    fn unknown_kind_is_embedded() {
        assert_eq!(MediaKind::from("WEBPAGE".to_string()), MediaKind::Embed);
        assert_eq!(MediaKind::from("video".to_string()), MediaKind::Video);
    }

    #[test]
    fn missing_or_zero_duration_is_malformed() {
        for duration in [json!(0), json!(-3), serde_json::Value::Null] {
            let body = display_json(json!([
                { "id": "bad", "duration": duration, "order": 0,
                  "content": { "id": "c", "name": "n", "url": "u", "type": "IMAGE" } }
            ]));
            let env: DisplayEnvelope = serde_json::from_value(body).unwrap();
            let err = env.display.validate().unwrap_err();
            assert!(matches!(err, PlayerError::Malformed(ref m) if m.contains("bad")));
        }
    }

    #[test]
    fn display_without_playlist_has_no_items() {
        let env: DisplayEnvelope =
            serde_json::from_value(json!({ "display": { "id": "d", "name": "n", "playlist": null } }))
                .unwrap();
        assert!(env.display.items().is_empty());
        assert_eq!(env.display.orientation, Orientation::Landscape);
    }

    #[test]
    fn resolves_relative_urls_only() {
        let base = "http://localhost:3001/";
        assert_eq!(
            resolve_url(base, "/uploads/a.png"),
            "http://localhost:3001/uploads/a.png"
        );
        assert_eq!(
            resolve_url(base, "uploads/a.png"),
            "http://localhost:3001/uploads/a.png"
        );
        assert_eq!(resolve_url(base, "https://cdn/a.png"), "https://cdn/a.png");
        assert_eq!(
            resolve_url(base, "data:image/png;base64,AAAA"),
            "data:image/png;base64,AAAA"
        );
    }
}
