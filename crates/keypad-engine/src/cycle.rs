//! Wrap-around stepping over an ordered list.

/// Direction of a cyclic step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Move to the next item, wrapping to the first.
    Forward,
    /// Move to the previous item, wrapping to the last.
    Backward,
}

/// Index one step away from `current` in a list of `len` items.
///
/// Returns `None` for an empty list. An unknown position (`None`) behaves as if
/// it sat just before the first item, so `Forward` lands on `0` and `Backward`
/// on `len - 1`.
pub fn cycle(len: usize, current: Option<usize>, step: Step) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let next = match (current, step) {
        (None, Step::Forward) => 0,
        (None, Step::Backward) => len - 1,
        (Some(i), Step::Forward) => (i % len + 1) % len,
        (Some(i), Step::Backward) => (i % len + len - 1) % len,
    };
    Some(next)
}
