//! Remote object names. These formats are shared with existing buckets and must not change.

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;

use crate::errors::Result;
use crate::retention::RetentionCandidate;

/// UTC, minute precision. Lexicographic order equals chronological order.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M";

/// `dump-<database>-<YYYYMMDDHHmm>.sql.gz`
pub fn backup_object_name(database: &str, at: DateTime<Utc>) -> String {
    format!("dump-{}-{}.sql.gz", database, at.format(TIMESTAMP_FORMAT))
}

/// `most-recent-dump-<database>.txt`
pub fn pointer_object_name(database: &str) -> String {
    format!("most-recent-dump-{}.txt", database)
}

pub fn parse_timestamp(digits: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(digits, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Recognises the backup objects of one database among everything in a bucket.
#[derive(Debug, Clone)]
pub struct BackupNameMatcher {
    pattern: Regex,
}

impl BackupNameMatcher {
    pub fn new(database: &str) -> Result<Self> {
        let pattern = Regex::new(&format!(
            r"^dump-{}-(\d{{12}})\.sql\.gz$",
            regex::escape(database)
        ))?;
        Ok(Self { pattern })
    }

    /// Returns `None` for names that are not ours. A name that is ours but whose
    /// digits are not a real date yields a candidate without a timestamp.
    pub fn candidate(&self, name: &str) -> Option<RetentionCandidate> {
        let captures = self.pattern.captures(name)?;
        Some(RetentionCandidate {
            name: name.to_string(),
            timestamp: parse_timestamp(&captures[1]),
        })
    }
}
