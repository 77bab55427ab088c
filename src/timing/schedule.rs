//! Next-tick lookup for the self-scheduling timer.

use std::time::Duration;

use super::boundary::TimingBoundary;

/// Time of the first boundary strictly after `current_time_ms`.
pub fn next_boundary_after(boundaries: &[TimingBoundary], current_time_ms: i64) -> Option<i64> {
    let idx = boundaries.partition_point(|b| b.time_ms <= current_time_ms);
    boundaries.get(idx).map(|b| b.time_ms)
}

/// Wall-clock wait from show time `current_time_ms` until `next_ms`.
pub fn delay_until(current_time_ms: i64, next_ms: i64) -> Duration {
    let ms = next_ms.saturating_sub(current_time_ms).max(0);
    Duration::from_millis(u64::try_from(ms).unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cue::CueElement;
    use crate::timing::{TimingWindows, compile_boundaries};

    fn boundaries() -> Vec<TimingBoundary> {
        compile_boundaries(
            &[CueElement::new("a", 1_000, 0), CueElement::new("b", 4_000, 1)],
            TimingWindows {
                lookahead_ms: 500,
                lookbehind_ms: 2_000,
                red_border_ms: 1_000,
            },
        )
        .boundaries()
        .to_vec()
    }

    #[test]
    fn finds_strictly_later_boundary() {
        let b = boundaries();
        assert_eq!(next_boundary_after(&b, -10_000), Some(500));
        assert_eq!(next_boundary_after(&b, 500), Some(1_000));
        assert_eq!(next_boundary_after(&b, 1_000), Some(2_000));
        assert_eq!(next_boundary_after(&b, 5_999), Some(6_000));
    }

    #[test]
    fn nothing_after_the_end() {
        let b = boundaries();
        assert_eq!(next_boundary_after(&b, 6_000), None);
        assert_eq!(next_boundary_after(&[], 0), None);
    }

    #[test]
    fn delay_never_negative() {
        assert_eq!(delay_until(1_000, 1_250), Duration::from_millis(250));
        assert_eq!(delay_until(1_000, 900), Duration::ZERO);
    }
}
