//! Order-preserving list edits used by the reducer.

/// Move the element at `from` so that it ends up at index `to`. All other
/// elements keep their relative order. Returns `false` (list untouched) when
/// either index is out of range or they are equal.
pub fn move_item<T>(items: &mut Vec<T>, from: usize, to: usize) -> bool {
    if from >= items.len() || to >= items.len() || from == to {
        return false;
    }
    let item = items.remove(from);
    items.insert(to, item);
    true
}

/// Insert `item` directly after `index`.
pub fn insert_after<T>(items: &mut Vec<T>, index: usize, item: T) {
    let at = (index + 1).min(items.len());
    items.insert(at, item);
}
