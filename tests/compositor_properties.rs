//! Property tests for the compositor's visibility and z-order rules:
//!
//! 1. `is_visible` always reflects the last show/hide call.
//! 2. `move_to_top` leaves the panel strictly above every other panel.
//! 3. The topmost visible panel is what ends up on screen.
//! 4. Keys are offered from the top of the stack down.

use std::cell::RefCell;
use std::rc::Rc;

use proptest::prelude::*;
use ratatui::Terminal;
use ratatui::backend::TestBackend;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Style;

use soundboard::tui::event::{Key, KeyPress, TuiEvent};
use soundboard::tui::geometry::{Size, place};
use soundboard::tui::panel::{Model, Panel, PanelCx, PanelId, PanelOptions};
use soundboard::tui::screen::Screen;

const WIDTH: u16 = 8;
const HEIGHT: u16 = 2;

struct Nothing;

impl Model for Nothing {
    type Change = ();

    fn poll_changes(&mut self, _changes: &mut Vec<()>) {}
}

/// Covers the whole screen with one letter and records every key offer.
struct Sheet {
    letter: char,
    z_index: i32,
    offers: Rc<RefCell<Vec<char>>>,
}

impl Panel<Nothing> for Sheet {
    fn name(&self) -> &'static str {
        "sheet"
    }

    fn options(&self) -> PanelOptions {
        PanelOptions {
            z_index: self.z_index,
            ..PanelOptions::default()
        }
    }

    fn placement(&self, parent: Size) -> Rect {
        place(parent, 0, 0, parent.width, parent.height)
    }

    fn render(&mut self, _state: &Nothing, area: Rect, buf: &mut Buffer) {
        let line: String = std::iter::repeat_n(self.letter, area.width as usize).collect();
        for y in area.top()..area.bottom() {
            buf.set_string(area.x, y, &line, Style::default());
        }
    }

    fn take(&mut self, _key: &KeyPress, _cx: &mut PanelCx<'_, Nothing>) -> bool {
        self.offers.borrow_mut().push(self.letter);
        false
    }
}

fn screen_with(z_indices: &[i32]) -> (Screen<TestBackend, Nothing>, Vec<PanelId>, Rc<RefCell<Vec<char>>>) {
    let terminal = Terminal::new(TestBackend::new(WIDTH, HEIGHT)).unwrap();
    let mut screen = Screen::new(terminal, Nothing).unwrap();
    let offers = Rc::new(RefCell::new(Vec::new()));
    let ids = z_indices
        .iter()
        .enumerate()
        .map(|(i, z)| {
            screen.attach(Box::new(Sheet {
                letter: letter(i),
                z_index: *z,
                offers: offers.clone(),
            }))
        })
        .collect();
    screen.repaint().unwrap();
    (screen, ids, offers)
}

fn letter(i: usize) -> char {
    (b'a' + i as u8) as char
}

fn z_strategy() -> impl Strategy<Value = Vec<i32>> {
    prop::collection::vec(-5i32..5, 1..6)
}

proptest! {
    #[test]
    fn visibility_follows_last_call(
        ops in prop::collection::vec((0usize..4, any::<bool>(), any::<bool>()), 0..40)
    ) {
        let (mut screen, ids, _) = screen_with(&[0, 1, 0, -1]);
        let mut expected = [true; 4];
        for (target, show, flush) in ops {
            if show {
                screen.show_panel(ids[target]);
            } else {
                screen.hide_panel(ids[target]);
            }
            expected[target] = show;
            if flush {
                screen.flush().unwrap();
            }
        }
        for (id, visible) in ids.iter().zip(expected) {
            prop_assert_eq!(screen.stack().is_visible(*id), visible);
        }
    }
}

proptest! {
    #[test]
    fn move_to_top_is_strictly_highest(z_indices in z_strategy(), pick in any::<prop::sample::Index>()) {
        let (mut screen, ids, _) = screen_with(&z_indices);
        let target = ids[pick.index(ids.len())];
        screen.move_to_top(target);
        let top = screen.stack().z_index(target).unwrap();
        for id in ids.iter().filter(|id| **id != target) {
            prop_assert!(top > screen.stack().z_index(*id).unwrap());
        }
        prop_assert_eq!(screen.stack().order().last().copied(), Some(target));
    }

    #[test]
    fn move_to_bottom_is_strictly_lowest(z_indices in z_strategy(), pick in any::<prop::sample::Index>()) {
        let (mut screen, ids, _) = screen_with(&z_indices);
        let target = ids[pick.index(ids.len())];
        screen.move_to_bottom(target);
        let bottom = screen.stack().z_index(target).unwrap();
        for id in ids.iter().filter(|id| **id != target) {
            prop_assert!(bottom < screen.stack().z_index(*id).unwrap());
        }
        prop_assert_eq!(screen.stack().order().first().copied(), Some(target));
    }

    #[test]
    fn topmost_visible_panel_is_on_screen(
        z_indices in z_strategy(),
        hidden in prop::collection::vec(any::<bool>(), 6),
    ) {
        let (mut screen, ids, _) = screen_with(&z_indices);
        for (id, hide) in ids.iter().zip(&hidden) {
            if *hide {
                screen.hide_panel(*id);
            }
        }
        screen.flush().unwrap();

        let top = screen.stack().visible_order().last().copied();
        let expected: String = match top {
            Some(id) => {
                let i = ids.iter().position(|x| *x == id).unwrap();
                std::iter::repeat_n(letter(i), WIDTH as usize).collect()
            }
            None => " ".repeat(WIDTH as usize),
        };
        prop_assert_eq!(screen.row_text(0), expected);
    }

    #[test]
    fn keys_are_offered_top_down(z_indices in z_strategy()) {
        let (mut screen, ids, offers) = screen_with(&z_indices);
        screen.handle_event(TuiEvent::Key(KeyPress::plain(Key::Tab)));

        let expected: Vec<char> = screen
            .stack()
            .order()
            .into_iter()
            .rev()
            .map(|id| letter(ids.iter().position(|x| *x == id).unwrap()))
            .collect();
        prop_assert_eq!(offers.borrow().clone(), expected);
    }
}
