use std::time::{Duration, Instant};

/// Frame timing snapshot.
///
/// Every task of one tick receives the same value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    /// Monotonic tick index. The one-time setup pass uses index 0 with `dt == 0.0`.
    pub index: u64,

    /// Seconds since the previous tick. Never negative.
    pub dt: f32,
}

impl Frame {
    #[inline]
    pub const fn new(index: u64, dt: f32) -> Self {
        Self { index, dt }
    }

    /// Snapshot used for the setup chain.
    #[inline]
    pub const fn setup() -> Self {
        Self { index: 0, dt: 0.0 }
    }
}

/// Wall-clock source for [`Frame`] snapshots.
#[derive(Debug)]
pub struct FrameClock {
    last: Option<Instant>,
    max_dt: f32,
    index: u64,
}

impl FrameClock {
    pub const DEFAULT_MAX_DT: Duration = Duration::from_millis(250);

    #[inline]
    pub fn new(max_dt: Duration) -> Self {
        Self {
            last: None,
            max_dt: max_dt.as_secs_f32().max(0.0),
            index: 0,
        }
    }

    #[inline]
    pub fn next(&mut self) -> Frame {
        self.next_at(Instant::now())
    }

    /// Produces the next snapshot as if the tick started at `now`.
    pub fn next_at(&mut self, now: Instant) -> Frame {
        let mut dt = match self.last {
            Some(last) => now.saturating_duration_since(last).as_secs_f32(),
            None => 0.0,
        };
        self.last = Some(now);

        if !dt.is_finite() || dt < 0.0 {
            dt = 0.0;
        }
        dt = dt.min(self.max_dt);

        self.index = self.index.wrapping_add(1);
        Frame::new(self.index, dt)
    }

    #[inline]
    pub fn ticks(&self) -> u64 {
        self.index
    }
}

impl Default for FrameClock {
    #[inline]
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_DT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_tick_has_zero_dt() {
        let mut clock = FrameClock::default();
        let f = clock.next_at(Instant::now());
        assert_eq!(f.index, 1);
        assert_eq!(f.dt, 0.0);
    }

    #[test]
    fn dt_is_clamped_and_monotonic() {
        let mut clock = FrameClock::new(Duration::from_millis(100));
        let t0 = Instant::now();
        clock.next_at(t0);

        let f = clock.next_at(t0 + Duration::from_millis(16));
        assert!((f.dt - 0.016).abs() < 1e-4);

        let f = clock.next_at(t0 + Duration::from_secs(5));
        assert!((f.dt - 0.1).abs() < 1e-6);

        // Clock going backwards never yields a negative delta.
        let f = clock.next_at(t0);
        assert_eq!(f.dt, 0.0);
        assert_eq!(f.index, 4);
    }
}
