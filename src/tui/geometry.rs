//! Placement math: where a panel sits for a given terminal size.
//!
//! Placements clamp rather than fail, so a panel shrinks with the terminal.
//! A placement that clamps to nothing (zero width or height) is reported by
//! [`validate`] and the compositor keeps the panel's previous region.

use std::fmt;

pub use ratatui::layout::{Rect, Size};
use unicode_width::UnicodeWidthChar;

/// Place a `width` x `height` box at (`x`, `y`), clamped to `parent`.
pub fn place(parent: Size, x: u16, y: u16, width: u16, height: u16) -> Rect {
    Rect {
        x,
        y,
        width: width.min(parent.width.saturating_sub(x)),
        height: height.min(parent.height.saturating_sub(y)),
    }
}

/// Centre a box of at most `width` x `height` in `parent`.
pub fn centered(parent: Size, width: u16, height: u16) -> Rect {
    let width = width.min(parent.width);
    let height = height.min(parent.height);
    place(
        parent,
        (parent.width - width) / 2,
        (parent.height - height) / 2,
        width,
        height,
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionError {
    pub rect: Rect,
    pub parent: Size,
}

impl fmt::Display for RegionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "region {}x{} at ({}, {}) does not fit a {}x{} terminal",
            self.rect.width, self.rect.height, self.rect.x, self.rect.y, self.parent.width, self.parent.height
        )
    }
}

impl std::error::Error for RegionError {}

/// A region is usable if it is non-empty and lies inside the terminal.
pub fn validate(rect: Rect, parent: Size) -> Result<Rect, RegionError> {
    let fits = rect.width > 0
        && rect.height > 0
        && rect.right() <= parent.width
        && rect.bottom() <= parent.height;
    if fits {
        Ok(rect)
    } else {
        Err(RegionError { rect, parent })
    }
}

/// Cut `s` to at most `max_width` display columns, ending in `...` when cut.
pub fn truncate_str(s: &str, max_width: usize) -> String {
    let width: usize = s.chars().map(|c| c.width().unwrap_or(0)).sum();
    if width <= max_width {
        return s.to_string();
    }
    if max_width <= 3 {
        return ".".repeat(max_width);
    }
    let mut out = String::new();
    let mut used = 0;
    for c in s.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > max_width - 3 {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_place_clamps_to_parent() {
        let parent = Size::new(80, 24);
        assert_eq!(place(parent, 0, 0, 81, 2), Rect::new(0, 0, 80, 2));
        assert_eq!(place(parent, 70, 20, 20, 20), Rect::new(70, 20, 10, 4));
    }

    #[test]
    fn test_centered() {
        let parent = Size::new(80, 24);
        assert_eq!(centered(parent, 60, 4), Rect::new(10, 10, 60, 4));
        assert_eq!(centered(Size::new(40, 10), 60, 4), Rect::new(0, 3, 40, 4));
    }

    #[test]
    fn test_offscreen_region_is_invalid() {
        let parent = Size::new(10, 5);
        let rect = place(parent, 12, 0, 4, 2);
        assert_eq!(rect.width, 0);
        assert!(validate(rect, parent).is_err());
        assert!(validate(Rect::new(0, 0, 10, 5), parent).is_ok());
        assert!(validate(Rect::new(5, 0, 6, 5), parent).is_err());
    }

    #[test]
    fn test_truncate_str() {
        assert_eq!(truncate_str("hello", 10), "hello");
        assert_eq!(truncate_str("hello world", 8), "hello...");
        assert_eq!(truncate_str("hello", 2), "..");
        // Wide characters count as two columns.
        assert_eq!(truncate_str("日本語テキスト", 7), "日本...");
    }
}
