//! Schedule computation
//!
//! Pure next-occurrence arithmetic for DCA strategies. The result is
//! always strictly after `now`: a candidate equal to `now` counts as
//! already passed and rolls forward, so a boundary tick never fires twice.

use crate::domain::entities::dca::Schedule;
use chrono::{DateTime, Datelike, Duration, NaiveTime, Timelike, Utc, Weekday};

/// Next execution instant for `schedule`, strictly after `now`.
pub fn compute_next_execution(schedule: &Schedule, now: DateTime<Utc>) -> DateTime<Utc> {
    match schedule {
        Schedule::Hourly { anchor } => {
            let mut candidate = now
                .date_naive()
                .and_hms_opt(now.hour(), anchor.minute(), 0)
                .expect("valid hour anchor")
                .and_utc();
            while candidate <= now {
                candidate += Duration::hours(1);
            }
            candidate
        }
        Schedule::Daily { time } => {
            let mut candidate = at_time(now, *time);
            while candidate <= now {
                candidate += Duration::days(1);
            }
            candidate
        }
        Schedule::Weekly { weekday, time } => {
            let days_ahead = days_until_weekday(now.weekday(), *weekday);
            let mut candidate = at_time(now + Duration::days(days_ahead as i64), *time);
            while candidate <= now {
                candidate += Duration::days(7);
            }
            candidate
        }
    }
}

fn at_time(day: DateTime<Utc>, time: NaiveTime) -> DateTime<Utc> {
    day.date_naive().and_time(time).and_utc()
}

fn days_until_weekday(from: Weekday, to: Weekday) -> u32 {
    (to.num_days_from_monday() + 7 - from.num_days_from_monday()) % 7
}
