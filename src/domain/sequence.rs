//! Fractional sequence-key math for the chronological game order.
//!
//! Games are totally ordered by a REAL key. Appending takes `max + 1`,
//! injecting before everything takes `min / 2`, and injecting after an anchor
//! takes the midpoint to the anchor's successor. Fractional keys never require
//! renumbering existing rows — until the midpoint gap erodes below
//! [`MIN_SEQUENCE_GAP`], at which point the whole key space is respaced to
//! evenly spaced integers (order-preserving, so no replay is needed).

/// Smallest gap a midpoint insertion may leave before keys are renormalized.
pub const MIN_SEQUENCE_GAP: f64 = 1e-9;

/// Spacing used when renormalizing keys: 1.0, 2.0, 3.0, ...
pub const RENORMALIZED_STEP: f64 = 1.0;

/// Key for a game appended after all existing history.
pub fn append_key(max_existing: Option<f64>) -> f64 {
    match max_existing {
        Some(max) => max + 1.0,
        None => 1.0,
    }
}

/// Key for a game injected before all existing history.
pub fn prepend_key(min_existing: Option<f64>) -> f64 {
    match min_existing {
        Some(min) => min / 2.0,
        None => 1.0,
    }
}

/// Key for a game injected directly after `anchor`. `successor` is the
/// next-higher existing key, if any.
pub fn midpoint_key(anchor: f64, successor: Option<f64>) -> f64 {
    match successor {
        Some(next) => (anchor + next) / 2.0,
        None => anchor + 1.0,
    }
}

/// True when `candidate` no longer sits strictly between its neighbors with a
/// usable gap, i.e. the key space around the anchor is exhausted.
pub fn needs_renormalization(anchor: f64, candidate: f64, successor: Option<f64>) -> bool {
    if (candidate - anchor).abs() < MIN_SEQUENCE_GAP {
        return true;
    }
    match successor {
        Some(next) => (next - candidate).abs() < MIN_SEQUENCE_GAP || candidate >= next,
        None => false,
    }
}

/// Evenly spaced replacement key for position `index` (0-based) in sequence order.
pub fn renormalized_key(index: usize) -> f64 {
    (index as f64 + 1.0) * RENORMALIZED_STEP
}
