//! Property tests for the virtualized list viewport and the progress
//! aggregator.

mod common;

use std::time::{Duration, Instant};

use proptest::prelude::*;
use uuid::Uuid;

use soundboard::core::progress::{ProgressCollection, ProgressSample};
use soundboard::core::sound_list::{SoundList, scrollbar};

#[derive(Clone, Debug)]
enum Nav {
    To(usize),
    Single(isize),
    Page(isize),
    First,
    Last,
}

fn nav_strategy() -> impl Strategy<Value = Nav> {
    prop_oneof![
        (0usize..200).prop_map(Nav::To),
        (-3isize..=3).prop_map(Nav::Single),
        (-2isize..=2).prop_map(Nav::Page),
        Just(Nav::First),
        Just(Nav::Last),
    ]
}

fn assert_viewport(list: &SoundList, page: usize) -> Result<(), TestCaseError> {
    let selected = list.selected_index().unwrap();
    prop_assert!(list.offset() <= selected);
    prop_assert!(selected < list.offset() + page);
    Ok(())
}

proptest! {
    #[test]
    fn selection_stays_in_viewport(
        categories in 1usize..6,
        per_category in 0usize..12,
        page in 1usize..15,
        moves in prop::collection::vec(nav_strategy(), 1..30),
    ) {
        let mut list = SoundList::new(&common::groups(categories, per_category));
        for nav in moves {
            match nav {
                Nav::To(i) => list.move_to_index(i.min(list.len() - 1), page),
                Nav::Single(d) => list.step_single(d, page),
                Nav::Page(d) => list.step_page(d, page),
                Nav::First => list.select_first(page),
                Nav::Last => list.select_last(page),
            };
            assert_viewport(&list, page)?;
        }
    }

    #[test]
    fn changed_rows_are_visible(
        len in 1usize..60,
        page in 1usize..10,
        target in 0usize..60,
    ) {
        let mut list = SoundList::new(&common::groups(1, len - 1));
        let changed = list.move_to_index(target.min(len - 1), page);
        let window = list.visible_range(page);
        prop_assert!(changed.iter().all(|i| window.contains(i)));
    }

    #[test]
    fn rebuild_keeps_viewport(
        before in 1usize..20,
        after in 0usize..20,
        page in 1usize..8,
        target in 0usize..40,
    ) {
        let mut list = SoundList::new(&common::groups(2, before));
        list.move_to_index(target.min(list.len() - 1), page);
        list.rebuild(&common::groups(2, after), page);
        assert_viewport(&list, page)?;
    }

    #[test]
    fn scrollbar_fills_the_page(page in 1usize..50, total in 1usize..500, offset in 0usize..500) {
        let bar = scrollbar(page, total, offset.min(total)).unwrap();
        prop_assert_eq!(bar.pre + bar.bar + bar.post, page);
        prop_assert!(bar.bar >= 1);
    }
}

#[test]
fn scrollbar_reference_values() {
    let bar = scrollbar(10, 100, 40).unwrap();
    assert_eq!((bar.pre, bar.bar, bar.post), (4, 1, 5));
}

fn sample(player: Uuid, sound_id: i64, created_at: Instant, progress: f64) -> ProgressSample {
    ProgressSample {
        player_id: player,
        sound_id,
        created_at,
        sampled_at: created_at,
        progress,
        duration: Duration::from_secs(2),
    }
}

fn sorted(mut items: Vec<(i64, f64)>) -> Vec<(i64, f64)> {
    items.sort_by_key(|(id, _)| *id);
    items
}

proptest! {
    #[test]
    fn append_is_idempotent_and_time_ordered(
        samples in prop::collection::vec((0i64..3, 0u64..50, 0.0f64..=1.0), 1..40),
    ) {
        let base = Instant::now();
        let players: Vec<Uuid> = (0..50).map(|_| Uuid::new_v4()).collect();
        let mut collection = ProgressCollection::new();
        for (sound_id, created, progress) in samples {
            let s = sample(players[created as usize], sound_id, base + Duration::from_millis(created), progress);
            let stored_before = collection.get(sound_id).copied();
            let accepted = collection.append(s);

            match stored_before {
                Some(old) if old.created_at > s.created_at => {
                    prop_assert!(!accepted);
                    prop_assert_eq!(collection.get(sound_id).copied(), Some(old));
                }
                _ => {
                    prop_assert!(accepted);
                    prop_assert_eq!(collection.get(sound_id).copied(), Some(s));
                }
            }

            // Replaying the same sample changes nothing.
            let snapshot = sorted(collection.items());
            collection.append(s);
            prop_assert_eq!(sorted(collection.items()), snapshot);
        }
    }
}
