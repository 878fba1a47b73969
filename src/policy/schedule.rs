//! Scheduling policy: staggered publish instants for the full and short
//! edits of each admitted item.

use chrono::{DateTime, Duration, Utc};

/// Compute the publish instants for item number `index` of this sweep.
///
/// `index` is the 0-based count of items already admitted in this sweep for
/// this profile, so items in one sweep are spaced `spacing_minutes` apart
/// while the two edits of one item keep their configured offsets.
pub fn schedule_pair(
    now: DateTime<Utc>,
    index: usize,
    full_offset_minutes: i64,
    short_offset_minutes: i64,
    spacing_minutes: i64,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let stagger = index as i64 * spacing_minutes;
    (
        now + Duration::minutes(full_offset_minutes + stagger),
        now + Duration::minutes(short_offset_minutes + stagger),
    )
}
