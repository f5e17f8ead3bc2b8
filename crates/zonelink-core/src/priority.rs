// ── Refresh priority model ──
//
// A closed, totally ordered set of polling urgencies. Higher levels map
// to shorter (or equal) polling intervals; `Disabled` maps to "never"
// and `Unknown` means the refresh machinery is not ready at all.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How urgently a monitor's data should be refreshed.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RefreshPriority {
    /// Refresh machinery not ready -- skip entirely.
    Unknown,
    /// Never refresh.
    Disabled,
    Batch,
    Low,
    Normal,
    High,
    Alarm,
}

impl RefreshPriority {
    /// The polling interval this level maps to. `None` means "never".
    ///
    /// Monotonic: a higher level never maps to a longer interval.
    pub fn interval(self) -> Option<Duration> {
        match self {
            Self::Unknown | Self::Disabled => None,
            Self::Batch => Some(Duration::from_secs(60 * 60)),
            Self::Low => Some(Duration::from_secs(60)),
            Self::Normal => Some(Duration::from_secs(10)),
            Self::High => Some(Duration::from_secs(5)),
            Self::Alarm => Some(Duration::from_secs(1)),
        }
    }

    /// Gate optional work on a minimum urgency.
    ///
    /// `Unknown` and `Disabled` never reach any threshold.
    pub fn is_at_least(self, threshold: Self) -> bool {
        !matches!(self, Self::Unknown | Self::Disabled) && self >= threshold
    }
}

#[cfg(test)]
mod tests {
    use super::RefreshPriority as P;

    #[test]
    fn levels_are_totally_ordered() {
        assert!(P::Disabled < P::Batch);
        assert!(P::Batch < P::Low);
        assert!(P::Low < P::Normal);
        assert!(P::Normal < P::High);
        assert!(P::High < P::Alarm);
    }

    #[test]
    fn intervals_shrink_as_urgency_grows() {
        let levels = [P::Batch, P::Low, P::Normal, P::High, P::Alarm];
        for pair in levels.windows(2) {
            let (lower, higher) = (pair[0], pair[1]);
            assert!(
                lower.interval() >= higher.interval(),
                "{lower} should not poll faster than {higher}"
            );
        }
    }

    #[test]
    fn disabled_and_unknown_never_poll() {
        assert_eq!(P::Disabled.interval(), None);
        assert_eq!(P::Unknown.interval(), None);
    }

    #[test]
    fn is_at_least_gates_inactive_levels() {
        assert!(P::Alarm.is_at_least(P::Low));
        assert!(P::Low.is_at_least(P::Low));
        assert!(!P::Batch.is_at_least(P::Low));
        assert!(!P::Disabled.is_at_least(P::Disabled));
        assert!(!P::Unknown.is_at_least(P::Batch));
    }
}
