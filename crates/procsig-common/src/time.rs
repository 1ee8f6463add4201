//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Shared primitives and utilities for the core runtime."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Monotonic timestamps for measuring and reporting elapsed time.
//!
//! A [`TimeStamp`] is either *absolute* (a moment on the monotonic clock) or
//! *relative* (a duration). Ticks are nanoseconds past a process-wide anchor
//! captured the first time the clock is used; see [`Calibration`].

use std::fmt;
use std::ops::{Add, Sub};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use once_cell::sync::Lazy;
use thiserror::Error;

/// Empty iterations timed when estimating per-iteration loop overhead.
const OVERHEAD_SAMPLES: u32 = 10_000;

/// Long-form local date/time used for absolute stamps.
const WALL_CLOCK_FORMAT: &str = "%A, %B %-d, %Y at %-I:%M:%S %p";

static CALIBRATION: Lazy<Calibration> = Lazy::new(Calibration::measure);

/// Process-wide clock constants, computed once on first use.
#[derive(Debug)]
pub struct Calibration {
    anchor: Instant,
    seconds_per_tick: f64,
    loop_overhead_ticks: f64,
}

impl Calibration {
    /// The calibration shared by every timestamp in the process.
    pub fn global() -> &'static Calibration {
        &CALIBRATION
    }

    fn measure() -> Self {
        let anchor = Instant::now();
        let noop = std::hint::black_box(|| ());
        let started = Instant::now();
        for _ in 0..OVERHEAD_SAMPLES {
            noop();
        }
        let spent = duration_ticks(started.elapsed());
        Self {
            anchor,
            seconds_per_tick: 1e-9,
            loop_overhead_ticks: spent as f64 / f64::from(OVERHEAD_SAMPLES),
        }
    }

    pub fn seconds_per_tick(&self) -> f64 {
        self.seconds_per_tick
    }

    /// Average cost of one empty benchmark iteration, in ticks.
    pub fn loop_overhead_ticks(&self) -> f64 {
        self.loop_overhead_ticks
    }

    pub fn loop_overhead_seconds(&self) -> f64 {
        self.loop_overhead_ticks * self.seconds_per_tick
    }

    /// Ticks elapsed since the anchor.
    pub fn now_ticks(&self) -> i64 {
        duration_ticks(self.anchor.elapsed())
    }

    pub fn ticks_to_seconds(&self, ticks: i64) -> f64 {
        ticks as f64 * self.seconds_per_tick
    }

    pub fn seconds_to_ticks(&self, seconds: f64) -> i64 {
        (seconds / self.seconds_per_tick).round() as i64
    }
}

fn duration_ticks(duration: Duration) -> i64 {
    i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX)
}

/// Invalid combinations of absolute and relative stamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TimeStampError {
    #[error("cannot add two absolute timestamps")]
    AddAbsolutes,
    #[error("cannot subtract an absolute timestamp from a relative one")]
    SubtractAbsoluteFromRelative,
}

/// A monotonic moment (absolute) or duration (relative), with an optional label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeStamp {
    time: i64,
    absolute: bool,
    label: Option<String>,
}

impl TimeStamp {
    /// Capture the current moment.
    pub fn now() -> Self {
        Self {
            time: Calibration::global().now_ticks(),
            absolute: true,
            label: None,
        }
    }

    /// A relative stamp lasting `seconds`.
    pub fn from_seconds(seconds: f64) -> Self {
        Self::from_ticks(Calibration::global().seconds_to_ticks(seconds))
    }

    /// A relative stamp lasting `ticks`.
    pub fn from_ticks(ticks: i64) -> Self {
        Self {
            time: ticks,
            absolute: false,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    /// Raw stored ticks: position for absolute stamps, length for relative ones.
    pub fn ticks(&self) -> i64 {
        self.time
    }

    /// Ticks elapsed since an absolute stamp was taken. `None` for relative stamps.
    pub fn elapsed_ticks(&self) -> Option<i64> {
        self.absolute
            .then(|| Calibration::global().now_ticks() - self.time)
    }

    /// Duration in seconds for a relative stamp; age in seconds for an absolute one.
    pub fn seconds(&self) -> f64 {
        let ticks = self.elapsed_ticks().unwrap_or(self.time);
        Calibration::global().ticks_to_seconds(ticks)
    }

    /// Convert an absolute stamp into the relative time elapsed since it was
    /// taken. Has no effect on a relative stamp. Returns the formatted value.
    pub fn freeze(&mut self) -> String {
        if let Some(elapsed) = self.elapsed_ticks() {
            self.time = elapsed;
            self.absolute = false;
        }
        self.to_string()
    }

    /// Combine two stamps. Adding two absolute stamps is rejected.
    pub fn checked_add(&self, rhs: &TimeStamp) -> Result<TimeStamp, TimeStampError> {
        if self.absolute && rhs.absolute {
            return Err(TimeStampError::AddAbsolutes);
        }
        Ok(Self {
            time: self.time.saturating_add(rhs.time),
            absolute: self.absolute ^ rhs.absolute,
            label: None,
        })
    }

    /// Difference of two stamps. A relative minus an absolute is rejected.
    pub fn checked_sub(&self, rhs: &TimeStamp) -> Result<TimeStamp, TimeStampError> {
        if !self.absolute && rhs.absolute {
            return Err(TimeStampError::SubtractAbsoluteFromRelative);
        }
        Ok(Self {
            time: self.time.saturating_sub(rhs.time),
            absolute: self.absolute ^ rhs.absolute,
            label: None,
        })
    }

    /// The local wall-clock moment an absolute stamp corresponds to.
    pub fn wall_clock(&self) -> Option<DateTime<Local>> {
        self.elapsed_ticks()
            .map(|age| Local::now() - chrono::Duration::nanoseconds(age))
    }

    /// `"<label>: <value>"` when labelled, otherwise just the value.
    pub fn describe(&self) -> String {
        match &self.label {
            Some(label) => format!("{label}: {self}"),
            None => self.to_string(),
        }
    }

    fn shifted(&self, seconds: f64) -> TimeStamp {
        Self {
            time: self
                .time
                .saturating_add(Calibration::global().seconds_to_ticks(seconds)),
            absolute: self.absolute,
            label: None,
        }
    }
}

impl fmt::Display for TimeStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.wall_clock() {
            Some(moment) => write!(f, "{}", moment.format(WALL_CLOCK_FORMAT)),
            None => f.write_str(&format_seconds(self.seconds())),
        }
    }
}

impl Add<f64> for &TimeStamp {
    type Output = TimeStamp;

    fn add(self, seconds: f64) -> TimeStamp {
        self.shifted(seconds)
    }
}

impl Add<f64> for TimeStamp {
    type Output = TimeStamp;

    fn add(self, seconds: f64) -> TimeStamp {
        self.shifted(seconds)
    }
}

impl Sub<f64> for &TimeStamp {
    type Output = TimeStamp;

    fn sub(self, seconds: f64) -> TimeStamp {
        self.shifted(-seconds)
    }
}

impl Sub<f64> for TimeStamp {
    type Output = TimeStamp;

    fn sub(self, seconds: f64) -> TimeStamp {
        self.shifted(-seconds)
    }
}

impl Add<&TimeStamp> for &TimeStamp {
    type Output = Result<TimeStamp, TimeStampError>;

    fn add(self, rhs: &TimeStamp) -> Self::Output {
        self.checked_add(rhs)
    }
}

impl Add for TimeStamp {
    type Output = Result<TimeStamp, TimeStampError>;

    fn add(self, rhs: TimeStamp) -> Self::Output {
        self.checked_add(&rhs)
    }
}

impl Sub<&TimeStamp> for &TimeStamp {
    type Output = Result<TimeStamp, TimeStampError>;

    fn sub(self, rhs: &TimeStamp) -> Self::Output {
        self.checked_sub(rhs)
    }
}

impl Sub for TimeStamp {
    type Output = Result<TimeStamp, TimeStampError>;

    fn sub(self, rhs: TimeStamp) -> Self::Output {
        self.checked_sub(&rhs)
    }
}

/// Render seconds with a unit picked by magnitude: ns, µs, ms or s.
pub fn format_seconds(seconds: f64) -> String {
    let magnitude = seconds.abs();
    let (scaled, unit) = if magnitude < 1e-6 {
        (seconds * 1e9, "ns")
    } else if magnitude < 1e-3 {
        (seconds * 1e6, "µs")
    } else if magnitude < 1.0 {
        (seconds * 1e3, "ms")
    } else {
        (seconds, "s")
    };
    format!("{scaled:.3} {unit}")
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn freeze_is_idempotent() {
        let mut stamp = TimeStamp::now();
        assert!(stamp.is_absolute());
        let first = stamp.freeze();
        assert!(!stamp.is_absolute());
        let second = stamp.freeze();
        assert_eq!(first, second);
        assert!(!stamp.is_absolute());
    }

    #[test]
    fn difference_of_two_moments_is_a_short_duration() {
        let delta = (TimeStamp::now() - TimeStamp::now()).expect("absolute - absolute");
        assert!(!delta.is_absolute());
        assert!(delta.seconds().abs() < 0.010, "{}", delta.seconds());
    }

    #[test]
    fn invalid_combinations_are_rejected() {
        let duration = TimeStamp::from_seconds(1.0);
        let moment = TimeStamp::now();
        assert_eq!(
            &duration - &moment,
            Err(TimeStampError::SubtractAbsoluteFromRelative)
        );
        assert_eq!(&moment + &TimeStamp::now(), Err(TimeStampError::AddAbsolutes));
    }

    #[test]
    fn combination_kind_is_xor_of_operands() {
        let moment = TimeStamp::now().with_label("start");
        let duration = TimeStamp::from_seconds(2.0).with_label("gap");

        let later = (&moment + &duration).expect("absolute + relative");
        assert!(later.is_absolute());
        assert_eq!(later.label(), None);

        let earlier = (&moment - &duration).expect("absolute - relative");
        assert!(earlier.is_absolute());
        assert_eq!(earlier.ticks(), moment.ticks() - duration.ticks());

        let total = (&duration + &duration).expect("relative + relative");
        assert!(!total.is_absolute());
        assert!((total.seconds() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn shifting_by_seconds_keeps_kind_and_drops_label() {
        let duration = TimeStamp::from_seconds(0.5).with_label("half");
        let shifted = &duration + 0.25_f64;
        assert!(!shifted.is_absolute());
        assert_eq!(shifted.label(), None);
        assert!((shifted.seconds() - 0.75).abs() < 1e-9);

        let moment = TimeStamp::now();
        let back = moment.clone() - 1.0_f64;
        assert!(back.is_absolute());
        assert_eq!(moment.ticks() - back.ticks(), 1_000_000_000);
    }

    #[test]
    fn absolute_seconds_reports_age() {
        let moment = TimeStamp::now();
        thread::sleep(Duration::from_millis(5));
        assert!(moment.seconds() >= 0.005);
        assert!(moment.elapsed_ticks().is_some());
        assert_eq!(TimeStamp::from_seconds(1.0).elapsed_ticks(), None);
    }

    #[test]
    fn units_follow_magnitude() {
        assert_eq!(format_seconds(5e-7), "500.000 ns");
        assert_eq!(format_seconds(2.5e-4), "250.000 µs");
        assert_eq!(format_seconds(0.05), "50.000 ms");
        assert_eq!(format_seconds(3.0), "3.000 s");
        assert_eq!(format_seconds(-0.002), "-2.000 ms");
    }

    #[test]
    fn describe_prefixes_label() {
        let stamp = TimeStamp::from_seconds(0.002).with_label("icons");
        assert_eq!(stamp.describe(), "icons: 2.000 ms");
        assert_eq!(TimeStamp::from_seconds(0.002).describe(), "2.000 ms");
    }

    #[test]
    fn absolute_display_is_a_wall_clock_date() {
        let rendered = TimeStamp::now().to_string();
        let year = Local::now().format("%Y").to_string();
        assert!(rendered.contains(&year), "{rendered}");
        assert!(rendered.contains(" at "), "{rendered}");
    }

    #[test]
    fn calibration_is_shared() {
        let first = Calibration::global() as *const Calibration;
        let second = Calibration::global() as *const Calibration;
        assert_eq!(first, second);
        assert!(Calibration::global().loop_overhead_ticks() >= 0.0);
    }
}
