//! Tiered retention: which stored backups survive a `clean`.

use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, BTreeSet};

use crate::naming::TIMESTAMP_FORMAT;

/// A stored backup considered for pruning.
///
/// `timestamp` is `None` when the name carried digits that are not a valid
/// date; such candidates never land in any tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionCandidate {
    pub name: String,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Keep everything from the last day, the first backup of each of the last
/// seven days, and the first backup of every week ever taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub daily_window: Duration,
    pub weekly_window: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            daily_window: Duration::hours(24),
            weekly_window: Duration::days(7),
        }
    }
}

impl RetentionPolicy {
    /// Returns the names to keep. Everything else in `candidates` may be deleted.
    pub fn keep_set(&self, candidates: &[RetentionCandidate], now: DateTime<Utc>) -> BTreeSet<String> {
        let dated: Vec<(&str, DateTime<Utc>)> = candidates
            .iter()
            .filter_map(|c| c.timestamp.map(|ts| (c.name.as_str(), ts)))
            .collect();

        let mut keep = BTreeSet::new();

        // A window reaching past the representable range has no cutoff.
        let daily_cutoff = now.checked_sub_signed(self.daily_window);
        keep.extend(
            dated
                .iter()
                .filter(|(_, ts)| daily_cutoff.is_none_or(|cutoff| *ts >= cutoff))
                .map(|(name, _)| name.to_string()),
        );

        let weekly_cutoff = now.checked_sub_signed(self.weekly_window);
        keep.extend(earliest_per_period(
            dated
                .iter()
                .filter(|(_, ts)| weekly_cutoff.is_none_or(|cutoff| *ts >= cutoff)),
            "%Y%m%d",
        ));

        keep.extend(earliest_per_period(dated.iter(), "%Y%W"));

        keep
    }
}

/// Groups by `period_format` and picks, per group, the entry with the smallest
/// formatted timestamp (name breaks exact ties).
fn earliest_per_period<'a, 'b, I>(entries: I, period_format: &str) -> Vec<String>
where
    'b: 'a,
    I: Iterator<Item = &'a (&'b str, DateTime<Utc>)>,
{
    let mut groups: BTreeMap<String, (String, &'b str)> = BTreeMap::new();
    for (name, ts) in entries {
        let period = ts.format(period_format).to_string();
        let sort_key = ts.format(TIMESTAMP_FORMAT).to_string();
        let earlier = match groups.get(&period) {
            Some((best_key, best_name)) => (sort_key.as_str(), *name) < (best_key.as_str(), *best_name),
            None => true,
        };
        if earlier {
            groups.insert(period, (sort_key, *name));
        }
    }
    groups.into_values().map(|(_, name)| name.to_string()).collect()
}
