//! # Virtualized Sound List
//!
//! Flattens a `[CategoryWithSounds]` snapshot into one ordered sequence of
//! category headers and sound rows, and tracks a single selection plus the
//! scroll offset of a `page`-row viewport over it.
//!
//! ```text
//! items:   [Cat A] [s1] [s2] [Cat B] [Cat C] [s3] ...
//!                   ^offset             ^selected
//!          |<--------- page --------->|
//! ```
//!
//! The sequence is rebuilt from scratch whenever the library changes, so the
//! selection is remembered by [`ItemKey`] (kind + id) rather than by index.
//! After any selection-changing call, `offset <= selected < offset + page`.
//!
//! Methods that change what is on screen return the *absolute* indices of
//! visible rows that must be re-rendered. An index `>= len()` means "this
//! row is now empty".

use std::collections::BTreeSet;
use std::ops::Range;

use crate::core::model::{Category, CategoryWithSounds, Sound};

#[derive(Clone, Debug, PartialEq)]
pub enum ListItem {
    Category(Category),
    Sound(Sound),
}

impl ListItem {
    pub fn key(&self) -> ItemKey {
        match self {
            ListItem::Category(c) => ItemKey::Category(c.id),
            ListItem::Sound(s) => ItemKey::Sound(s.id),
        }
    }

    pub fn as_sound(&self) -> Option<&Sound> {
        match self {
            ListItem::Sound(s) => Some(s),
            ListItem::Category(_) => None,
        }
    }
}

/// Identity of a row across rebuilds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ItemKey {
    Category(i64),
    Sound(i64),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Selection {
    pub index: usize,
    pub key: ItemKey,
}

#[derive(Clone, Debug, Default)]
pub struct SoundList {
    items: Vec<ListItem>,
    /// Last explicit selection; `None` means "first row".
    explicit: Option<Selection>,
    offset: usize,
}

/// Flatten groups: header first, then its sounds when expanded. A group
/// without a category always contributes its sounds.
pub fn flatten(groups: &[CategoryWithSounds]) -> Vec<ListItem> {
    let mut items = Vec::new();
    for group in groups {
        let expanded = match &group.category {
            Some(category) => {
                items.push(ListItem::Category(category.clone()));
                category.is_expanded
            }
            None => true,
        };
        if expanded {
            items.extend(group.sounds.iter().cloned().map(ListItem::Sound));
        }
    }
    items
}

impl SoundList {
    pub fn new(groups: &[CategoryWithSounds]) -> Self {
        Self {
            items: flatten(groups),
            explicit: None,
            offset: 0,
        }
    }

    pub fn items(&self) -> &[ListItem] {
        &self.items
    }

    pub fn get(&self, index: usize) -> Option<&ListItem> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn find(&self, key: ItemKey) -> Option<usize> {
        self.items.iter().position(|item| item.key() == key)
    }

    /// The explicit selection if it still exists, otherwise the first row.
    pub fn selected(&self) -> Option<Selection> {
        let first = self.items.first()?;
        if let Some(explicit) = self.explicit {
            let cached = self
                .items
                .get(explicit.index)
                .filter(|item| item.key() == explicit.key)
                .map(|_| explicit.index);
            if let Some(index) = cached.or_else(|| self.find(explicit.key)) {
                return Some(Selection {
                    index,
                    key: explicit.key,
                });
            }
        }
        Some(Selection {
            index: 0,
            key: first.key(),
        })
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected().map(|s| s.index)
    }

    pub fn selected_item(&self) -> Option<&ListItem> {
        self.selected().and_then(|s| self.items.get(s.index))
    }

    pub fn is_selected(&self, index: usize) -> bool {
        self.selected_index() == Some(index)
    }

    /// Indices currently inside the viewport (clipped to the sequence).
    pub fn visible_range(&self, page: usize) -> Range<usize> {
        let start = self.offset.min(self.items.len());
        start..(self.offset + page).min(self.items.len())
    }

    /// Position of `index` within the viewport, if visible.
    pub fn row_of(&self, index: usize, page: usize) -> Option<usize> {
        self.visible_range(page)
            .contains(&index)
            .then(|| index - self.offset)
    }

    pub fn position_of_sound(&self, sound_id: i64) -> Option<usize> {
        self.find(ItemKey::Sound(sound_id))
    }

    /// Viewport row of a sound, or `None` when it is scrolled out or absent.
    pub fn visible_row_of_sound(&self, sound_id: i64, page: usize) -> Option<usize> {
        self.position_of_sound(sound_id)
            .and_then(|index| self.row_of(index, page))
    }

    /// Select `new_index` and scroll just enough to keep it visible.
    ///
    /// Returns the whole new window when the viewport moved, otherwise the
    /// old and new selected rows that lie inside it. Every returned index is
    /// visible. No-op when the index is unchanged.
    pub fn move_to_index(&mut self, new_index: usize, page: usize) -> Vec<usize> {
        let Some(old_index) = self.selected_index() else {
            return Vec::new();
        };
        let new_index = new_index.min(self.items.len() - 1);
        if new_index == old_index {
            return Vec::new();
        }

        let old_window = self.visible_range(page);
        self.explicit = Some(Selection {
            index: new_index,
            key: self.items[new_index].key(),
        });
        self.scroll_to(new_index, page);
        let new_window = self.visible_range(page);

        if new_window != old_window {
            new_window.collect()
        } else {
            let mut rows = vec![old_index.min(new_index), old_index.max(new_index)];
            rows.retain(|i| new_window.contains(i));
            rows
        }
    }

    /// Move by `delta` rows, wrapping past either end.
    pub fn step_single(&mut self, delta: isize, page: usize) -> Vec<usize> {
        let Some(current) = self.selected_index() else {
            return Vec::new();
        };
        let len = self.items.len() as isize;
        let target = current as isize + delta;
        let target = if target < 0 {
            len - 1
        } else if target >= len {
            0
        } else {
            target
        };
        self.move_to_index(target as usize, page)
    }

    /// Move by `pages * (page - 1)` rows, clamped to the sequence. A one-row
    /// page has no overlap row to keep, so it steps by one row instead of
    /// not moving at all.
    pub fn step_page(&mut self, pages: isize, page: usize) -> Vec<usize> {
        let Some(current) = self.selected_index() else {
            return Vec::new();
        };
        let stride = page.saturating_sub(1).max(1) as isize;
        let last = self.items.len() as isize - 1;
        let target = (current as isize + pages * stride).clamp(0, last);
        self.move_to_index(target as usize, page)
    }

    pub fn select_first(&mut self, page: usize) -> Vec<usize> {
        self.move_to_index(0, page)
    }

    pub fn select_last(&mut self, page: usize) -> Vec<usize> {
        match self.items.len() {
            0 => Vec::new(),
            len => self.move_to_index(len - 1, page),
        }
    }

    /// Re-establish the viewport invariant for the current selection, e.g.
    /// after a rebuild or a page-size change.
    pub fn update_offset(&mut self, page: usize) {
        if self.items.len() <= page {
            self.offset = 0;
            return;
        }
        self.offset = self.offset.min(self.items.len() - page);
        if let Some(index) = self.selected_index() {
            self.scroll_to(index, page);
        }
    }

    fn scroll_to(&mut self, index: usize, page: usize) {
        let page = page.max(1);
        if index < self.offset {
            self.offset = index;
        } else if index >= self.offset + page {
            self.offset = index + 1 - page;
        }
    }

    /// Replace the sequence with a new snapshot, keeping the selection by
    /// identity. Returns the visible indices whose rendering differs.
    pub fn rebuild(&mut self, groups: &[CategoryWithSounds], page: usize) -> Vec<usize> {
        let old_window = self.visible_range(page);
        let old_offset = self.offset;
        let old_selected = self.selected_index();
        let old_rows: Vec<(ListItem, bool)> = old_window
            .clone()
            .map(|i| (self.items[i].clone(), old_selected == Some(i)))
            .collect();

        self.items = flatten(groups);
        // Keep the remembered key even if it vanished; it may come back.
        self.update_offset(page);

        let new_selected = self.selected_index();
        let mut changed = BTreeSet::new();
        for row in 0..page {
            let old = (old_offset == self.offset)
                .then(|| old_rows.get(row))
                .flatten();
            let index = self.offset + row;
            let new = self
                .items
                .get(index)
                .map(|item| (item, new_selected == Some(index)));
            let same = match (old, new) {
                (Some((old_item, old_sel)), Some((new_item, new_sel))) => {
                    old_item == new_item && *old_sel == new_sel
                }
                (None, None) => old_offset == self.offset,
                _ => false,
            };
            if !same {
                changed.insert(index);
            }
        }
        changed.into_iter().collect()
    }
}

/// Scrollbar split into `pre` track, `bar` thumb and `post` track rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Scrollbar {
    pub pre: usize,
    pub bar: usize,
    pub post: usize,
}

/// Scrollbar geometry for a `page`-row viewport over `total` items.
///
/// Returns `None` for an empty list or a zero-height viewport.
pub fn scrollbar(page: usize, total: usize, offset: usize) -> Option<Scrollbar> {
    if page == 0 || total == 0 {
        return None;
    }
    let (page_f, total_f) = (page as f64, total as f64);
    let visible_fraction = page_f / total_f;
    let bar = ((page_f * visible_fraction).round() as usize).clamp(1, page);
    let pre = ((offset as f64 * page_f / total_f).round() as usize).min(page - bar);
    Some(Scrollbar {
        pre,
        bar,
        post: page - pre - bar,
    })
}
