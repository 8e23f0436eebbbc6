// src/daily_time.rs
//! Worked-minute and night-differential arithmetic for a single day of punches.

use chrono::{NaiveTime, Timelike};
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;

pub const MINUTES_PER_DAY: i64 = 24 * 60;

/// Legal night window, 22:00 to 05:00 of the next day, in minutes from the
/// start of the interval's own day.
const NIGHT_START: i64 = 22 * 60;
const NIGHT_END: i64 = MINUTES_PER_DAY + 5 * 60;

/// Each clock-minute of night work counts as 60 / 52.5 minutes.
const NIGHT_FACTOR_NUM: Decimal = dec!(60);
const NIGHT_FACTOR_DEN: Decimal = dec!(52.5);

fn minute_of_day(t: NaiveTime) -> i64 {
    (t.hour() * 60 + t.minute()) as i64
}

/// Wall-clock minutes from `start` to `end`; an `end` at or before `start`
/// is read as the next day.
pub fn interval_minutes(start: NaiveTime, end: NaiveTime) -> i64 {
    let (s, e) = (minute_of_day(start), minute_of_day(end));
    if e <= s {
        e + MINUTES_PER_DAY - s
    } else {
        e - s
    }
}

/// Minutes of a punch pair; 0 unless both sides are present.
pub fn pair_minutes(entrance: Option<NaiveTime>, exit: Option<NaiveTime>) -> i64 {
    match (entrance, exit) {
        (Some(start), Some(end)) => interval_minutes(start, end),
        _ => 0,
    }
}

/// True when exactly one side of a punch pair was recorded.
pub fn is_half_open(entrance: Option<NaiveTime>, exit: Option<NaiveTime>) -> bool {
    entrance.is_some() != exit.is_some()
}

pub fn day_minutes(
    e1: Option<NaiveTime>,
    x1: Option<NaiveTime>,
    e2: Option<NaiveTime>,
    x2: Option<NaiveTime>,
) -> i64 {
    pair_minutes(e1, x1) + pair_minutes(e2, x2)
}

/// Clock-minutes of one punch pair that fall inside the night window. The
/// window is checked on the interval's own day and shifted by 24h both ways
/// so that early-morning starts and overnight shifts are caught.
fn pair_night_clock_minutes(entrance: Option<NaiveTime>, exit: Option<NaiveTime>) -> i64 {
    let (Some(start), Some(end)) = (entrance, exit) else {
        return 0;
    };
    let s = minute_of_day(start);
    let e = s + interval_minutes(start, end);

    [-MINUTES_PER_DAY, 0, MINUTES_PER_DAY]
        .iter()
        .map(|shift| {
            let (ws, we) = (NIGHT_START + shift, NIGHT_END + shift);
            (e.min(we) - s.max(ws)).max(0)
        })
        .sum()
}

/// Night-differential minutes of a day, already scaled by the reduced-hour
/// factor and rounded to 2 decimal places.
pub fn day_night_minutes(
    e1: Option<NaiveTime>,
    x1: Option<NaiveTime>,
    e2: Option<NaiveTime>,
    x2: Option<NaiveTime>,
) -> Decimal {
    let clock_minutes = pair_night_clock_minutes(e1, x1) + pair_night_clock_minutes(e2, x2);
    scale_night_minutes(clock_minutes)
}

pub fn scale_night_minutes(clock_minutes: i64) -> Decimal {
    (Decimal::from(clock_minutes) * NIGHT_FACTOR_NUM / NIGHT_FACTOR_DEN).round_dp(2)
}
