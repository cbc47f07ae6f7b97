//! Recency buckets for the conversation list

use chrono::{DateTime, Local, TimeZone};
use std::fmt;

/// Grouping label shown above conversations in the history list
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Category {
    Today,
    Yesterday,
    Previous7Days,
    Previous30Days,
    Older,
}

impl Category {
    /// Human-readable label, as persisted
    pub fn label(&self) -> &'static str {
        match self {
            Category::Today => "Today",
            Category::Yesterday => "Yesterday",
            Category::Previous7Days => "Previous 7 days",
            Category::Previous30Days => "Previous 30 days",
            Category::Older => "Older",
        }
    }

    /// Bucket for something created at `created`, seen from `now`
    ///
    /// Buckets are calendar days in local time; timestamps in the future
    /// count as today.
    pub fn for_time<Tz: TimeZone>(created: &DateTime<Tz>, now: &DateTime<Tz>) -> Self {
        let days = (now.date_naive() - created.date_naive()).num_days();
        match days {
            i64::MIN..=0 => Category::Today,
            1 => Category::Yesterday,
            2..=7 => Category::Previous7Days,
            8..=30 => Category::Previous30Days,
            _ => Category::Older,
        }
    }

    /// Bucket for a conversation id, which encodes its creation time in milliseconds
    ///
    /// Ids that do not parse as a timestamp are treated as created today.
    pub fn for_id(id: &str, now: &DateTime<Local>) -> Self {
        match id_timestamp(id) {
            Some(created) => Self::for_time(&created, now),
            None => Category::Today,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Creation time encoded in a conversation id
pub fn id_timestamp(id: &str) -> Option<DateTime<Local>> {
    let millis: i64 = id.parse().ok()?;
    Local.timestamp_millis_opt(millis).single()
}
