//! Tooltip placement.
//!
//! Chooses a side of the anchor, a width tier, and fitted text for a marker
//! preview. Placement is a pure function of its inputs, so the presentation
//! layer can position the floating element in one pass without measuring it
//! first.

pub mod fit;

use serde::{Deserialize, Serialize};
use waymark_api::{Rect, Size};

use crate::config::TooltipConfig;

pub use fit::{FitResult, MonospaceMeasure, TextMeasure, fit_text, wrapped_line_count};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

/// Where and what to draw.
#[derive(Debug, Clone, PartialEq)]
pub struct TooltipLayout {
    pub side: Side,
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
    pub text: String,
    pub truncated: bool,
}

/// Horizontal room on each side of `anchor`, net of the gap budget.
fn room(anchor: Rect, viewport: Size, side: Side, config: &TooltipConfig) -> f32 {
    let raw = match side {
        Side::Left => anchor.x,
        Side::Right => viewport.width - anchor.right(),
    };
    (raw - config.gap_budget()).max(0.0)
}

/// Largest width tier that fits `room`, clamped to the configured bounds.
fn pick_tier(room: f32, config: &TooltipConfig) -> Option<f32> {
    config
        .width_tiers
        .iter()
        .copied()
        .filter(|tier| *tier <= room)
        .reduce(f32::max)
        .map(|tier| tier.min(config.max_width).max(config.min_width))
}

/// Pick side and width. Falls back to the hard minimum width when no tier
/// fits on either side.
fn choose_side_and_width(anchor: Rect, viewport: Size, config: &TooltipConfig) -> (Side, f32) {
    let left = room(anchor, viewport, Side::Left, config);
    let right = room(anchor, viewport, Side::Right, config);
    let room_on = |side: Side| match side {
        Side::Left => left,
        Side::Right => right,
    };

    let side = config
        .preferred_side
        .unwrap_or(if left > right { Side::Left } else { Side::Right });

    if let Some(width) = pick_tier(room_on(side), config) {
        return (side, width);
    }

    let other = side.opposite();
    if room_on(other) > room_on(side) + config.switch_margin {
        if let Some(width) = pick_tier(room_on(other), config) {
            return (other, width);
        }
    }

    let fallback = room_on(side).min(config.max_width).max(config.min_width);
    (side, fallback)
}

/// Place a tooltip for `anchor` inside `viewport`.
pub fn place(
    anchor: Rect,
    viewport: Size,
    text: &str,
    measure: &dyn TextMeasure,
    config: &TooltipConfig,
) -> TooltipLayout {
    let (side, width) = choose_side_and_width(anchor, viewport, config);
    let fitted = fit_text(text, width, config.box_height(), &config.ellipsis, measure);
    let pad = config.viewport_padding;

    let left = match side {
        Side::Right => anchor.right() + config.gap,
        Side::Left => anchor.x - config.gap - width,
    };
    let left = left.min(viewport.width - pad - width).max(pad);

    let height = fitted.height;
    let top = anchor.center_y() - height / 2.0;
    let top = top.min(viewport.height - pad - height).max(pad);

    TooltipLayout {
        side,
        left,
        top,
        width,
        height,
        text: fitted.text,
        truncated: fitted.truncated,
    }
}
