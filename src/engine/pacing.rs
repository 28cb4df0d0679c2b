use std::time::{Duration, Instant};

/// How often image dwell and paused video check for input.
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Time source for the engine's pacing loops.
pub trait Clock {
    /// Monotonic time since an arbitrary origin.
    fn now(&self) -> Duration;
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Seconds an image stays on screen. Decrementing from 1 wraps to 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DwellSetting(u32);

impl DwellSetting {
    pub const WRAP_TO: u32 = 5;

    pub fn new(seconds: u32) -> Self {
        Self(seconds.max(1))
    }

    pub fn seconds(self) -> u32 {
        self.0
    }

    pub fn duration(self) -> Duration {
        Duration::from_secs(u64::from(self.0))
    }

    pub fn decrement(&mut self) {
        self.0 = if self.0 > 1 { self.0 - 1 } else { Self::WRAP_TO };
    }
}

impl Default for DwellSetting {
    fn default() -> Self {
        Self(3)
    }
}

/// Un-paused time an image has been on screen.
#[derive(Debug, Clone, Copy, Default)]
pub struct DwellTimer {
    shown: Duration,
}

impl DwellTimer {
    pub fn record(&mut self, elapsed: Duration, paused: bool) {
        if !paused {
            self.shown += elapsed;
        }
    }

    pub fn shown(&self) -> Duration {
        self.shown
    }

    /// Compared against the current setting so a change applies to the
    /// image already on screen.
    pub fn is_done(&self, dwell: DwellSetting) -> bool {
        self.shown >= dwell.duration()
    }
}

/// Media time of a playing video. Advances one frame per iteration.
#[derive(Debug, Clone, Copy)]
pub struct MediaClock {
    t: f64,
    step: f64,
}

impl MediaClock {
    pub fn new(fps: f64) -> Self {
        let step = if fps.is_finite() && fps > 0.0 { 1.0 / fps } else { 1.0 / 30.0 };
        Self { t: 0.0, step }
    }

    pub fn time(&self) -> f64 {
        self.t
    }

    pub fn advance(&mut self) {
        self.t += self.step;
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(self.step)
    }

    pub fn is_past(&self, duration: f64) -> bool {
        self.t > duration
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dwell_decrement_wraps_from_one_to_five() {
        let mut dwell = DwellSetting::default();
        let seen: Vec<u32> = (0..6)
            .map(|_| {
                dwell.decrement();
                dwell.seconds()
            })
            .collect();
        assert_eq!(seen, vec![2, 1, 5, 4, 3, 2]);
    }

    #[test]
    fn dwell_is_never_zero() {
        assert_eq!(DwellSetting::new(0).seconds(), 1);
        let mut long = DwellSetting::new(9);
        long.decrement();
        assert_eq!(long.seconds(), 8);
    }

    #[test]
    fn paused_time_does_not_count_toward_dwell() {
        let dwell = DwellSetting::new(1);
        let mut timer = DwellTimer::default();
        for _ in 0..50 {
            timer.record(POLL_INTERVAL, false);
        }
        for _ in 0..500 {
            timer.record(POLL_INTERVAL, true);
        }
        assert_eq!(timer.shown(), Duration::from_millis(500));
        assert!(!timer.is_done(dwell));
        for _ in 0..50 {
            timer.record(POLL_INTERVAL, false);
        }
        assert!(timer.is_done(dwell));
    }

    #[test]
    fn media_clock_steps_by_frame() {
        let mut clock = MediaClock::new(4.0);
        assert_eq!(clock.frame_interval(), Duration::from_millis(250));
        for _ in 0..4 {
            clock.advance();
        }
        assert!(!clock.is_past(1.0));
        clock.advance();
        assert!(clock.is_past(1.0));
    }
}
