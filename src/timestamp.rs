use chrono::{DateTime, Local, TimeZone};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

/// Display format: `MM/DD/YYYY, HH:MM:SS.mmm` on a 12-hour clock.
const DISPLAY_FORMAT: &str = "%m/%d/%Y, %I:%M:%S%.3f";

/// Wall-clock capture time with millisecond resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(DateTime<Local>);

impl Timestamp {
    pub fn now() -> Self {
        Timestamp(Local::now())
    }

    fn from_millis(millis: i64) -> Self {
        match Local.timestamp_millis_opt(millis).single() {
            Some(dt) => Timestamp(dt),
            None => Timestamp::now(),
        }
    }

    #[cfg(test)]
    pub fn millis(&self) -> i64 {
        self.0.timestamp_millis()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DISPLAY_FORMAT))
    }
}

/// Clock shared by every worker of a run.
///
/// Readings are truncated to whole milliseconds and never go backwards, even
/// if the system clock is stepped during the run.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last_millis: AtomicI64,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Timestamp {
        let wall = Local::now().timestamp_millis();
        let previous = self.last_millis.fetch_max(wall, Ordering::AcqRel);
        Timestamp::from_millis(previous.max(wall))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_never_goes_backwards() {
        let clock = MonotonicClock::new();
        let mut last = clock.now();
        for _ in 0..1_000 {
            let next = clock.now();
            assert!(next >= last);
            last = next;
        }
    }

    #[test]
    fn test_clock_holds_after_future_reading() {
        let clock = MonotonicClock::new();
        let future = Local::now().timestamp_millis() + 60_000;
        clock.last_millis.store(future, Ordering::SeqCst);
        assert_eq!(clock.now().millis(), future);
    }

    #[test]
    fn test_millisecond_resolution() {
        let clock = MonotonicClock::new();
        let ts = clock.now();
        assert_eq!(ts.0.timestamp_subsec_nanos() % 1_000_000, 0);
    }

    #[test]
    fn test_display_format() {
        let ts = Timestamp::from_millis(0);
        let text = ts.to_string();
        // e.g. "01/01/1970, 12:00:00.000" in UTC
        assert_eq!(text.len(), "01/01/1970, 12:00:00.000".len());
        assert!(text.ends_with(".000"));
        assert_eq!(&text[2..3], "/");
        assert_eq!(&text[10..12], ", ");
    }
}
