//! Minimap configuration.
//!
//! Every field has a default, so hosts can deserialize a partial JSON object
//! and only override what they care about.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::WaymarkError;
use crate::tooltip::Side;

/// Configuration for one minimap instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinimapConfig {
    /// Scopes persisted ids and stars to one conversation.
    pub conversation_key: String,

    /// Padding at both ends of the virtual track, in pixels.
    pub track_padding: f32,

    /// Minimum separation between adjacent markers, in pixels.
    pub min_gap: f32,

    /// Maximum number of fingerprint -> id entries kept by the identity index.
    pub fingerprint_map_limit: usize,

    pub persist_debounce_ms: u64,
    pub rebuild_debounce_ms: u64,
    /// Retry interval while the host reports zero anchors.
    pub empty_retry_ms: u64,
    /// Delay after the last resize before the min-gap settle pass.
    pub settle_delay_ms: u64,
    pub active_hysteresis_ms: u64,

    /// Fraction of the host viewport, from the top, used as the reference line.
    pub reference_bias: f32,

    /// Lower bound of the virtualization buffer on each side, in pixels.
    pub min_buffer: f32,

    /// Forward sync is skipped when the target differs by this much or less.
    pub sync_threshold: f32,

    /// Smallest height of the minimap's own scrollbar thumb.
    pub min_thumb_height: f32,

    /// Distance kept above an anchor when jumping to it.
    pub jump_margin: f32,

    pub tooltip: TooltipConfig,
}

impl Default for MinimapConfig {
    fn default() -> Self {
        Self {
            conversation_key: String::from("default"),
            track_padding: 12.0,
            min_gap: 12.0,
            fingerprint_map_limit: 1200,
            persist_debounce_ms: 800,
            rebuild_debounce_ms: 350,
            empty_retry_ms: 350,
            settle_delay_ms: 140,
            active_hysteresis_ms: 120,
            reference_bias: 0.45,
            min_buffer: 100.0,
            sync_threshold: 1.0,
            min_thumb_height: 24.0,
            jump_margin: 0.0,
            tooltip: TooltipConfig::default(),
        }
    }
}

impl MinimapConfig {
    /// Parse a (possibly partial) JSON configuration object.
    pub fn from_json(json: &str) -> Result<Self, WaymarkError> {
        serde_json::from_str(json).map_err(WaymarkError::Config)
    }

    /// Same config, scoped to another conversation.
    pub fn with_conversation_key(mut self, key: impl Into<String>) -> Self {
        self.conversation_key = key.into();
        self
    }

    pub fn persist_debounce(&self) -> Duration {
        Duration::from_millis(self.persist_debounce_ms)
    }

    pub fn rebuild_debounce(&self) -> Duration {
        Duration::from_millis(self.rebuild_debounce_ms)
    }

    pub fn empty_retry(&self) -> Duration {
        Duration::from_millis(self.empty_retry_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn active_hysteresis(&self) -> Duration {
        Duration::from_millis(self.active_hysteresis_ms)
    }

    /// Store key for the fingerprint -> id map.
    pub fn identity_key(&self) -> String {
        format!("waymark:ids:{}", self.conversation_key)
    }

    /// Store key for the starred set.
    pub fn stars_key(&self) -> String {
        format!("waymark:stars:{}", self.conversation_key)
    }
}

/// Tooltip placement and text-fit parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TooltipConfig {
    /// Candidate widths, largest first.
    pub width_tiers: Vec<f32>,
    pub min_width: f32,
    pub max_width: f32,
    /// Space kept between the anchor and the tooltip.
    pub gap: f32,
    /// Space kept between the tooltip and the viewport edges.
    pub viewport_padding: f32,
    pub line_height: f32,
    pub max_lines: u32,
    pub padding: f32,
    pub border: f32,
    pub ellipsis: String,
    /// How much more room the other side must offer before switching sides.
    pub switch_margin: f32,
    /// Side to try first; `None` picks the side with more room.
    pub preferred_side: Option<Side>,
}

impl Default for TooltipConfig {
    fn default() -> Self {
        Self {
            width_tiers: vec![280.0, 240.0, 200.0, 160.0],
            min_width: 120.0,
            max_width: 280.0,
            gap: 12.0,
            viewport_padding: 8.0,
            line_height: 18.0,
            max_lines: 3,
            padding: 10.0,
            border: 1.0,
            ellipsis: String::from("\u{2026}"),
            switch_margin: 40.0,
            preferred_side: None,
        }
    }
}

impl TooltipConfig {
    /// Height of the text box at `max_lines`, including padding and border.
    pub fn box_height(&self) -> f32 {
        self.max_lines as f32 * self.line_height + 2.0 * self.padding + 2.0 * self.border
    }

    /// Horizontal room a tooltip consumes beyond its own width.
    pub fn gap_budget(&self) -> f32 {
        self.gap + self.viewport_padding
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = MinimapConfig::from_json(r#"{ "min_gap": 8, "tooltip": { "max_lines": 2 } }"#)
            .unwrap();
        assert_eq!(config.min_gap, 8.0);
        assert_eq!(config.track_padding, 12.0);
        assert_eq!(config.fingerprint_map_limit, 1200);
        assert_eq!(config.tooltip.max_lines, 2);
        assert_eq!(config.tooltip.width_tiers, vec![280.0, 240.0, 200.0, 160.0]);
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let err = MinimapConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, WaymarkError::Config(_)));
    }

    #[test]
    fn box_height_matches_three_line_box() {
        // 3 * 18 + 2 * 10 + 2 * 1
        assert_eq!(TooltipConfig::default().box_height(), 76.0);
    }

    #[test]
    fn store_keys_are_scoped_by_conversation() {
        let config = MinimapConfig::default().with_conversation_key("chat-42");
        assert_eq!(config.identity_key(), "waymark:ids:chat-42");
        assert_eq!(config.stars_key(), "waymark:stars:chat-42");
    }
}
