use std::time::Duration;

/// Tracks how long a reading has stayed inside its tolerance band.
///
/// A single in-band sample is not enough to stop a motion; the reading has
/// to stay in band for `hold` of consecutive ticks. Leaving the band resets
/// the count.
#[derive(Debug, Clone, PartialEq)]
pub struct Settle {
    hold:        Duration,
    settled_for: Duration,
}

impl Settle {
    pub fn new(hold: Duration) -> Self {
        Self {
            hold,
            settled_for: Duration::ZERO,
        }
    }

    /// Records one tick of length `tick`. Returns `true` once the reading
    /// has been in band for the full hold time.
    pub fn observe(&mut self, in_band: bool, tick: Duration) -> bool {
        if in_band {
            self.settled_for += tick;
        } else {
            self.settled_for = Duration::ZERO;
        }
        self.is_settled()
    }

    pub fn is_settled(&self) -> bool { self.settled_for >= self.hold }

    pub fn settled_for(&self) -> Duration { self.settled_for }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICK: Duration = Duration::from_millis(10);

    #[test]
    fn settles_after_hold_time() {
        let mut settle = Settle::new(Duration::from_millis(30));
        assert!(!settle.observe(true, TICK));
        assert!(!settle.observe(true, TICK));
        assert!(settle.observe(true, TICK));
    }

    #[test]
    fn leaving_band_resets() {
        let mut settle = Settle::new(Duration::from_millis(30));
        settle.observe(true, TICK);
        settle.observe(true, TICK);
        assert!(!settle.observe(false, TICK));
        assert_eq!(settle.settled_for(), Duration::ZERO);
        assert!(!settle.observe(true, TICK));
    }
}
