// Cooperative repeating timer and the clock line it refreshes

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local};
use std::time::{Duration, Instant};

/// Repeating timer driven by the caller's event loop
///
/// Nothing runs in the background: the loop asks `timeout` how long it may
/// block, then calls `poll` to learn whether the tick came due.
#[derive(Debug, Clone)]
pub struct Ticker {
    interval: Duration,
    next: Instant,
    cancelled: bool,
}

impl Ticker {
    /// Shortest interval a ticker runs at; smaller ones are raised to it
    pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

    pub fn new(interval: Duration, now: Instant) -> Self {
        let interval = interval.max(Self::MIN_INTERVAL);
        Self {
            interval,
            next: now + interval,
            cancelled: false,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns true once per due tick and re-arms the timer
    ///
    /// Ticks missed while the loop was busy collapse into one; the next
    /// deadline stays on the original cadence.
    pub fn poll(&mut self, now: Instant) -> bool {
        if self.cancelled || now < self.next {
            return false;
        }

        while self.next <= now {
            self.next += self.interval;
        }
        true
    }

    /// How long the caller may wait before the next tick, `None` once cancelled
    pub fn timeout(&self, now: Instant) -> Option<Duration> {
        if self.cancelled {
            return None;
        }
        Some(self.next.saturating_duration_since(now))
    }

    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

/// Formats wall-clock time for the status area
#[derive(Debug, Clone)]
pub struct Clock {
    format: String,
}

impl Clock {
    pub const DEFAULT_FORMAT: &'static str = "%H:%M:%S";

    /// Build a clock, rejecting strftime patterns chrono cannot render
    pub fn new(format: impl Into<String>) -> Result<Self, ClockFormatError> {
        let format = format.into();
        validate_format(&format)?;
        Ok(Self { format })
    }

    pub fn render(&self, now: DateTime<Local>) -> String {
        now.format(&self.format).to_string()
    }

    pub fn now(&self) -> String {
        self.render(Local::now())
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self {
            format: Self::DEFAULT_FORMAT.to_string(),
        }
    }
}

/// Rejected strftime pattern for the clock line
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClockFormatError {
    #[error("clock format cannot be empty")]
    Empty,

    #[error("invalid clock format: {0:?}")]
    Invalid(String),
}

/// Check a strftime pattern up front; an invalid one would panic when displayed
pub fn validate_format(format: &str) -> Result<(), ClockFormatError> {
    if format.is_empty() {
        return Err(ClockFormatError::Empty);
    }
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(ClockFormatError::Invalid(format.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_ticker_not_due_before_interval() {
        let start = Instant::now();
        let mut ticker = Ticker::new(Duration::from_secs(1), start);

        assert!(!ticker.poll(start));
        assert!(!ticker.poll(start + Duration::from_millis(999)));
        assert_eq!(ticker.timeout(start), Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_ticker_fires_once_and_rearms() {
        let start = Instant::now();
        let mut ticker = Ticker::new(Duration::from_secs(1), start);

        let due = start + Duration::from_secs(1);
        assert!(ticker.poll(due));
        assert!(!ticker.poll(due));
        assert_eq!(ticker.timeout(due), Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_ticker_coalesces_missed_ticks() {
        let start = Instant::now();
        let mut ticker = Ticker::new(Duration::from_secs(1), start);

        let late = start + Duration::from_millis(3500);
        assert!(ticker.poll(late));
        assert!(!ticker.poll(late));
        assert_eq!(ticker.timeout(late), Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_cancelled_ticker_never_fires() {
        let start = Instant::now();
        let mut ticker = Ticker::new(Duration::from_secs(1), start);
        ticker.cancel();

        assert!(ticker.is_cancelled());
        assert!(!ticker.poll(start + Duration::from_secs(10)));
        assert_eq!(ticker.timeout(start), None);
    }

    #[test]
    fn test_zero_interval_is_raised_to_minimum() {
        let start = Instant::now();
        let mut ticker = Ticker::new(Duration::ZERO, start);

        assert_eq!(ticker.interval(), Ticker::MIN_INTERVAL);
        assert!(ticker.poll(start + Duration::from_millis(5)));
        assert_eq!(
            ticker.timeout(start + Duration::from_millis(5)),
            Some(Ticker::MIN_INTERVAL)
        );
    }

    #[test]
    fn test_clock_renders_default_format() {
        let clock = Clock::default();
        let at = Local.with_ymd_and_hms(2024, 1, 1, 9, 5, 7).unwrap();
        assert_eq!(clock.render(at), "09:05:07");
    }

    #[test]
    fn test_clock_custom_format() {
        let clock = Clock::new("%Y-%m-%d %H:%M").unwrap();
        let at = Local.with_ymd_and_hms(2024, 1, 1, 9, 5, 7).unwrap();
        assert_eq!(clock.render(at), "2024-01-01 09:05");
    }

    #[test]
    fn test_clock_rejects_invalid_format() {
        assert_eq!(
            Clock::new("%Q").unwrap_err(),
            ClockFormatError::Invalid("%Q".to_string())
        );
        assert_eq!(Clock::new("").unwrap_err(), ClockFormatError::Empty);
    }
}
