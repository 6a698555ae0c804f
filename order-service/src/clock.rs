use chrono::{DateTime, Local, NaiveDateTime, Utc};

/// Source of "now". Pickup times are business-local wall-clock strings, so
/// both the UTC instant and the local wall-clock reading are exposed.
#[derive(Debug, Clone, Copy)]
pub enum Clock {
    System,
    #[cfg(test)]
    Fixed {
        utc: DateTime<Utc>,
        local: NaiveDateTime,
    },
}

impl Clock {
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::System => Utc::now(),
            #[cfg(test)]
            Clock::Fixed { utc, .. } => *utc,
        }
    }

    pub fn local_now(&self) -> NaiveDateTime {
        match self {
            Clock::System => Local::now().naive_local(),
            #[cfg(test)]
            Clock::Fixed { local, .. } => *local,
        }
    }
}

#[cfg(test)]
impl Clock {
    /// A clock frozen at `hour:minute` on 2024-06-03, with UTC equal to local.
    pub fn at(hour: u32, minute: u32) -> Self {
        use chrono::{NaiveDate, TimeZone};

        let local = NaiveDate::from_ymd_opt(2024, 6, 3)
            .and_then(|d| d.and_hms_opt(hour, minute, 0))
            .unwrap();
        Clock::Fixed {
            utc: Utc.from_utc_datetime(&local),
            local,
        }
    }
}
