//! Display order of a hub's links
//!
//! Links carry an integer `position`. Positions only need to be comparable;
//! after every structural change they are renumbered to `0..n-1` so they
//! never drift or fragment.

use serde::Deserialize;

pub trait Positioned {
    fn position(&self) -> i64;
    fn set_position(&mut self, position: i64);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

/// Sort ascending by position. Equal positions keep their relative order.
pub fn sort_by_position<T: Positioned>(items: &mut [T]) {
    items.sort_by_key(|item| item.position());
}

/// Assign dense positions `0..n-1` in the current sequence order
pub fn renumber<T: Positioned>(items: &mut [T]) {
    for (index, item) in items.iter_mut().enumerate() {
        item.set_position(index as i64);
    }
}

/// Sort then renumber
pub fn normalize<T: Positioned>(items: &mut [T]) {
    sort_by_position(items);
    renumber(items);
}

/// Move the item at `index` one step in `direction`, then renumber.
///
/// Returns `false` when `index` is out of bounds. Moving the first item up or
/// the last item down leaves the order unchanged.
pub fn move_item<T: Positioned>(items: &mut [T], index: usize, direction: Direction) -> bool {
    if index >= items.len() {
        return false;
    }

    let target = match direction {
        Direction::Up => index.checked_sub(1),
        Direction::Down => Some(index + 1).filter(|&i| i < items.len()),
    };

    if let Some(target) = target {
        items.swap(index, target);
    }

    renumber(items);
    true
}
