//! Business-hours arithmetic: pickup slot generation and 12-hour clock
//! parsing. All times here are business-local wall-clock times.

use chrono::{Duration, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// Upper bound on slots produced for a single day, regardless of configuration.
pub const MAX_PICKUP_SLOTS: usize = 100;

/// Added to the configured reminder lead time so that a check running on a
/// coarse interval does not miss an order.
pub const REMINDER_SLACK_MINUTES: i64 = 5;

const LAST_MINUTE_OF_DAY: u32 = 24 * 60 - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessHours {
    pub open_hour: u32,
    pub close_hour: u32,
    pub order_cutoff_minutes: u32,
    pub time_slot_interval: u32,
}

impl Default for BusinessHours {
    fn default() -> Self {
        Self {
            open_hour: 10,
            close_hour: 20,
            order_cutoff_minutes: 30,
            time_slot_interval: 15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PickupTimeError {
    #[error("pickup time {0:?} is not in h:mm AM/PM form")]
    Malformed(String),
    #[error("pickup time {0:?} is out of range")]
    OutOfRange(String),
}

/// Pickup slots for one day, produced on demand. Cloning the iterator
/// restarts the sequence from the clone point.
#[derive(Debug, Clone)]
pub struct PickupSlots {
    next: u32,
    close: u32,
    step: u32,
    remaining: usize,
}

impl PickupSlots {
    pub fn empty() -> Self {
        Self {
            next: 1,
            close: 0,
            step: 0,
            remaining: 0,
        }
    }
}

impl Iterator for PickupSlots {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.remaining == 0 || self.next > self.close {
            return None;
        }
        let time = minute_of_day_to_time(self.next)?;
        self.remaining -= 1;
        self.next = self.next.saturating_add(self.step);
        Some(format_pickup_time(time))
    }
}

/// Slots from `max(now + cutoff, open)` rounded up to the slot interval, up to
/// and including closing time.
pub fn available_pickup_slots(now: NaiveDateTime, hours: &BusinessHours) -> PickupSlots {
    let earliest = now + Duration::minutes(i64::from(hours.order_cutoff_minutes));
    if earliest.date() != now.date() {
        return PickupSlots::empty();
    }

    let earliest_minute = earliest.hour() * 60 + earliest.minute();
    let open = hours.open_hour.saturating_mul(60);
    let close = hours.close_hour.saturating_mul(60).min(LAST_MINUTE_OF_DAY);
    let start = round_up(earliest_minute.max(open), hours.time_slot_interval);

    PickupSlots {
        next: start,
        close,
        step: hours.time_slot_interval,
        remaining: MAX_PICKUP_SLOTS,
    }
}

fn round_up(minute: u32, interval: u32) -> u32 {
    if interval == 0 {
        return minute;
    }
    minute.div_ceil(interval).saturating_mul(interval)
}

fn minute_of_day_to_time(minute: u32) -> Option<NaiveTime> {
    NaiveTime::from_hms_opt(minute / 60, minute % 60, 0)
}

/// Parses "h:mm AM" / "h:mm PM" (case-insensitive meridiem).
///
/// 12 AM is midnight (hour 0) and 12 PM is noon (hour 12); every other hour
/// adds 12 only in the afternoon.
pub fn parse_pickup_time(input: &str) -> Result<NaiveTime, PickupTimeError> {
    let malformed = || PickupTimeError::Malformed(input.to_string());
    let trimmed = input.trim();

    let (clock, meridiem) = trimmed.rsplit_once(' ').ok_or_else(malformed)?;
    let (hour, minute) = clock.trim().split_once(':').ok_or_else(malformed)?;
    if hour.is_empty() || hour.len() > 2 || minute.len() != 2 {
        return Err(malformed());
    }
    if !hour.bytes().chain(minute.bytes()).all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }
    let hour: u32 = hour.parse().map_err(|_| malformed())?;
    let minute: u32 = minute.parse().map_err(|_| malformed())?;

    if !(1..=12).contains(&hour) || minute > 59 {
        return Err(PickupTimeError::OutOfRange(input.to_string()));
    }

    let hour24 = match (meridiem.to_ascii_uppercase().as_str(), hour) {
        ("AM", 12) => 0,
        ("AM", h) => h,
        ("PM", 12) => 12,
        ("PM", h) => h + 12,
        _ => return Err(malformed()),
    };

    NaiveTime::from_hms_opt(hour24, minute, 0)
        .ok_or_else(|| PickupTimeError::OutOfRange(input.to_string()))
}

pub fn format_pickup_time(time: NaiveTime) -> String {
    time.format("%-I:%M %p").to_string()
}

/// The pickup time on the same calendar day as `now`.
pub fn pickup_today(now: NaiveDateTime, pickup: NaiveTime) -> NaiveDateTime {
    now.date().and_time(pickup)
}

/// True when `pickup_at` lies in `(now, now + lead + slack]`.
pub fn within_reminder_window(now: NaiveDateTime, pickup_at: NaiveDateTime, lead_minutes: u32) -> bool {
    let horizon = now + Duration::minutes(i64::from(lead_minutes) + REMINDER_SLACK_MINUTES);
    pickup_at > now && pickup_at <= horizon
}
