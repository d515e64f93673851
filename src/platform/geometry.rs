//! Geometry types shared by the intersection host and the waypoint hook.

use std::str::FromStr;

use crate::error::HookError;

// =============================================================================
// Rect
// =============================================================================

/// Axis-aligned rectangle in layout coordinates.
///
/// Element rects and the viewport share one coordinate space; scrolling moves
/// the viewport rect.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self { left, top, width, height }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Overlap of two rects.
    ///
    /// Edge-adjacent rects overlap with zero area, matching how intersection
    /// observers treat touching boxes as intersecting.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let left = self.left.max(other.left);
        let top = self.top.max(other.top);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());

        if right < left || bottom < top {
            return None;
        }
        Some(Rect::new(left, top, right - left, bottom - top))
    }

    /// Grow (or shrink, for negative lengths) by a resolved margin.
    pub fn expand(&self, margin: &RootMargin) -> Rect {
        let top = margin.top.resolve(self.height);
        let right = margin.right.resolve(self.width);
        let bottom = margin.bottom.resolve(self.height);
        let left = margin.left.resolve(self.width);

        Rect::new(
            self.left - left,
            self.top - top,
            self.width + left + right,
            self.height + top + bottom,
        )
    }

    /// Move by an offset (used when scrolling the viewport).
    pub fn translate(&self, dx: f64, dy: f64) -> Rect {
        Rect::new(self.left + dx, self.top + dy, self.width, self.height)
    }
}

// =============================================================================
// Root Margin
// =============================================================================

/// One side of a root margin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Length {
    Px(f64),
    /// Percentage of the root's width (left/right) or height (top/bottom).
    Percent(f64),
}

impl Length {
    fn resolve(&self, basis: f64) -> f64 {
        match self {
            Length::Px(px) => *px,
            Length::Percent(pct) => basis * pct / 100.0,
        }
    }
}

impl Default for Length {
    fn default() -> Self {
        Length::Px(0.0)
    }
}

/// Parsed CSS-style margin around the root bounds.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RootMargin {
    pub top: Length,
    pub right: Length,
    pub bottom: Length,
    pub left: Length,
}

impl RootMargin {
    /// Parse `"10px"`, `"10px 5%"`, `"1px 2px 3px"` or `"1px 2px 3px 4px"`.
    ///
    /// An empty string is a zero margin.
    pub fn parse(input: &str) -> Result<Self, HookError> {
        let invalid = || HookError::InvalidRootMargin(input.to_string());

        let lengths = input
            .split_whitespace()
            .map(|token| parse_length(token).ok_or_else(invalid))
            .collect::<Result<Vec<_>, _>>()?;

        let [top, right, bottom, left] = match lengths.as_slice() {
            [] => [Length::default(); 4],
            [all] => [*all; 4],
            [vertical, horizontal] => [*vertical, *horizontal, *vertical, *horizontal],
            [top, horizontal, bottom] => [*top, *horizontal, *bottom, *horizontal],
            [top, right, bottom, left] => [*top, *right, *bottom, *left],
            _ => return Err(invalid()),
        };

        Ok(Self { top, right, bottom, left })
    }
}

impl FromStr for RootMargin {
    type Err = HookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn parse_length(token: &str) -> Option<Length> {
    if let Some(number) = token.strip_suffix("px") {
        return number.parse::<f64>().ok().filter(|n| n.is_finite()).map(Length::Px);
    }
    if let Some(number) = token.strip_suffix('%') {
        return number.parse::<f64>().ok().filter(|n| n.is_finite()).map(Length::Percent);
    }
    // Bare zero is the only unitless length CSS accepts.
    match token.parse::<f64>() {
        Ok(n) if n == 0.0 => Some(Length::Px(0.0)),
        _ => None,
    }
}
