//! Do-not-disturb window gate (`spec.md` §4.4).

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};

pub struct DndResult {
    pub in_dnd: bool,
    pub window: String,
}

/// Default window 23:00-08:00 local. The core treats `now` as already
/// being in the caller's relevant timezone (user-profile-scoped timezone
/// resolution is the do-not-disturb-window owner's concern, out of scope
/// per §1).
#[derive(Clone, Copy)]
pub struct DndGate {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl Default for DndGate {
    fn default() -> Self {
        Self {
            start_hour: 23,
            end_hour: 8,
        }
    }
}

impl DndGate {
    pub fn check(&self, now: DateTime<Utc>) -> DndResult {
        let hour = now.hour();
        let in_dnd = if self.start_hour <= self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        };
        DndResult {
            in_dnd,
            window: format!("{:02}:00-{:02}:00", self.start_hour, self.end_hour),
        }
    }

    /// Next `end_hour:00` boundary strictly in the future: today if the
    /// current hour is before `end_hour`, otherwise tomorrow.
    pub fn next_boundary(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today_boundary = Utc
            .with_ymd_and_hms(now.year(), now.month(), now.day(), self.end_hour, 0, 0)
            .single()
            .expect("valid boundary time");

        if now.hour() < self.end_hour {
            today_boundary
        } else {
            today_boundary + Duration::days(1)
        }
    }
}
