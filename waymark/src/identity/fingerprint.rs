//! Content fingerprints for anchors without durable ids.
//!
//! A fingerprint hashes the conversation key, the resolved role, a content
//! signature and the normalized timestamp. The signature combines a full-text
//! hash, the length, a head hash and a markup hash: anchors sharing a long
//! common prefix, or missing text entirely, still separate.

use std::fmt;

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use waymark_api::{Anchor, Role};

use crate::hash::hash36;

/// Characters of normalized text covered by the head hash.
const HEAD_CHARS: usize = 160;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(pub String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Fingerprint of the `occurrence`-th repeat (0-based) of the same content.
    pub fn repeated(self, occurrence: u32) -> Self {
        if occurrence == 0 {
            self
        } else {
            Fingerprint(format!("{}#{}", self.0, occurrence))
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The parts of an anchor that describe its content, for the fallback hash.
/// Position and host reference are left out: they change on relayout.
#[derive(Serialize)]
struct SerializedContent<'a> {
    text: &'a str,
    role: Option<Role>,
    timestamp: Option<&'a str>,
    durable_id: Option<&'a str>,
}

/// Collapse runs of whitespace and trim.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize a timestamp hint so equivalent spellings fingerprint equally.
///
/// RFC 3339 becomes epoch milliseconds, integers pass through, anything else
/// is kept trimmed and lowercased. Missing hints normalize to "".
pub fn normalize_timestamp(hint: Option<&str>) -> String {
    let Some(raw) = hint.map(str::trim).filter(|s| !s.is_empty()) else {
        return String::new();
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.timestamp_millis().to_string();
    }
    if let Ok(n) = raw.parse::<i64>() {
        return n.to_string();
    }
    raw.to_lowercase()
}

/// Redundant content signature: `text hash . length . head hash . markup hash`.
pub fn content_signature(anchor: &Anchor) -> String {
    let text = normalize_whitespace(&anchor.text);
    let head: String = text.chars().take(HEAD_CHARS).collect();
    let markup = match &anchor.markup {
        Some(markup) => hash36(markup),
        None => {
            let content = SerializedContent {
                text: &anchor.text,
                role: anchor.role,
                timestamp: anchor.timestamp.as_deref(),
                durable_id: anchor.durable_id.as_deref(),
            };
            // Serializing plain strings and enums cannot fail.
            hash36(&serde_json::to_string(&content).unwrap_or_default())
        }
    };
    format!(
        "{}.{}.{}.{}",
        hash36(&text),
        text.chars().count(),
        hash36(&head),
        markup
    )
}

pub fn fingerprint(conversation_key: &str, anchor: &Anchor) -> Fingerprint {
    let input = format!(
        "{}|{}|{}|{}",
        conversation_key,
        anchor.resolved_role().as_str(),
        content_signature(anchor),
        normalize_timestamp(anchor.timestamp.as_deref()),
    );
    Fingerprint(hash36(&input))
}

#[cfg(test)]
mod tests {
    use super::*;
    use waymark_api::AnchorRef;

    fn anchor(text: &str) -> Anchor {
        Anchor::new(AnchorRef(1), 0.0, text)
    }

    #[test]
    fn fingerprint_ignores_position_and_ref() {
        let a = anchor("hello world").with_role(Role::User);
        let mut b = a.clone();
        b.offset = 900.0;
        b.anchor_ref = AnchorRef(99);
        assert_eq!(fingerprint("c", &a), fingerprint("c", &b));
    }

    #[test]
    fn fingerprint_separates_conversation_role_and_time() {
        let a = anchor("same text");
        assert_ne!(fingerprint("c1", &a), fingerprint("c2", &a));
        assert_ne!(
            fingerprint("c", &a.clone().with_role(Role::User)),
            fingerprint("c", &a.clone().with_role(Role::Assistant))
        );
        assert_ne!(
            fingerprint("c", &a.clone().with_timestamp("1")),
            fingerprint("c", &a.clone().with_timestamp("2"))
        );
    }

    #[test]
    fn long_shared_prefix_still_separates() {
        let prefix = "x".repeat(400);
        let a = anchor(&format!("{prefix} tail one"));
        let b = anchor(&format!("{prefix} tail two"));
        assert_ne!(fingerprint("c", &a), fingerprint("c", &b));
    }

    #[test]
    fn whitespace_variants_share_text_hash() {
        let a = anchor("hello   world\n").with_markup("<p>hello world</p>");
        let b = anchor(" hello world").with_markup("<p>hello world</p>");
        assert_eq!(content_signature(&a), content_signature(&b));
    }

    #[test]
    fn timestamp_spellings_normalize() {
        assert_eq!(normalize_timestamp(None), "");
        assert_eq!(normalize_timestamp(Some("  ")), "");
        assert_eq!(
            normalize_timestamp(Some("2024-01-01T00:00:00Z")),
            normalize_timestamp(Some("2024-01-01T01:00:00+01:00"))
        );
        assert_eq!(normalize_timestamp(Some(" 1700000000000 ")), "1700000000000");
        assert_eq!(normalize_timestamp(Some("Yesterday")), "yesterday");
    }
}
