//! Anchors - the navigable units a host hands to the engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque host-side reference to an anchor node.
///
/// The engine never interprets the value; it only hands it back to the host
/// (e.g. for bounding-rect queries).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnchorRef(pub u64);

/// Who authored an anchor's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    #[default]
    Unknown,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
            Role::Unknown => "unknown",
        }
    }
}

/// Stable identifier assigned to a marker by the identity index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarkerId(pub String);

impl MarkerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MarkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MarkerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One externally supplied navigable unit of content.
///
/// Owned by the host; the engine clones what it needs and never writes back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    /// Host reference handed back on queries.
    pub anchor_ref: AnchorRef,
    /// Raw vertical offset within the host document.
    pub offset: f32,
    /// Text summary (already localized by the host).
    pub text: String,
    /// Raw markup, if the host can provide it. Feeds the content signature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markup: Option<String>,
    /// Durable id attribute exposed by the host, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub durable_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// Timestamp hint in whatever form the host found it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl Anchor {
    pub fn new(anchor_ref: AnchorRef, offset: f32, text: impl Into<String>) -> Self {
        Self {
            anchor_ref,
            offset,
            text: text.into(),
            markup: None,
            durable_id: None,
            role: None,
            timestamp: None,
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    pub fn with_durable_id(mut self, id: impl Into<String>) -> Self {
        self.durable_id = Some(id.into());
        self
    }

    pub fn with_markup(mut self, markup: impl Into<String>) -> Self {
        self.markup = Some(markup.into());
        self
    }

    /// Role used for fingerprinting: the hint, or `Unknown`.
    pub fn resolved_role(&self) -> Role {
        self.role.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchor_json_omits_missing_hints() {
        let anchor = Anchor::new(AnchorRef(7), 120.0, "hello");
        let json = serde_json::to_string(&anchor).unwrap();
        assert!(!json.contains("durable_id"));
        assert!(!json.contains("timestamp"));

        let back: Anchor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, anchor);
    }

    #[test]
    fn resolved_role_defaults_to_unknown() {
        let anchor = Anchor::new(AnchorRef(1), 0.0, "x");
        assert_eq!(anchor.resolved_role(), Role::Unknown);
        assert_eq!(anchor.with_role(Role::User).resolved_role(), Role::User);
    }

    #[test]
    fn marker_id_serializes_as_plain_string() {
        let id = MarkerId::new("m1abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"m1abc\"");
    }
}
