//! Decides which pages become records.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;

use crate::dump_parser::{Page, Revision};

/// Format of `<timestamp>` in Wikimedia XML exports.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Project namespace of English and Japanese Wikipedia.
pub const DEFAULT_SPECIAL_TITLE_PREFIX: &str = "Wikipedia:";

static REDIRECT_DIRECTIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*#(?:REDIRECT|転送)\s*:?\s*\[\[(.*?)\]\]").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    SpecialTitle,
    NoRevisions,
    InvalidTimestamp(String),
    Redirect,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Admission<'a> {
    Admitted {
        revision: &'a Revision,
        updated: DateTime<Utc>,
    },
    Rejected(RejectReason),
}

pub fn parse_timestamp(timestamp: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT).map(|dt| dt.and_utc())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionFilter {
    special_title_prefix: String,
    skip_redirects: bool,
}

impl Default for AdmissionFilter {
    fn default() -> Self {
        Self::new(DEFAULT_SPECIAL_TITLE_PREFIX, false)
    }
}

impl AdmissionFilter {
    pub fn new(special_title_prefix: impl Into<String>, skip_redirects: bool) -> Self {
        Self {
            special_title_prefix: special_title_prefix.into(),
            skip_redirects,
        }
    }

    /// Check a page against the rules, in order: special title, no revisions,
    /// unparseable timestamp of the first revision, and (if enabled) redirect.
    ///
    /// Only the first revision is ever used; article dumps carry just the latest one.
    pub fn admit<'a>(&self, page: &'a Page) -> Admission<'a> {
        if !self.special_title_prefix.is_empty()
            && page.title.starts_with(self.special_title_prefix.as_str())
        {
            return Admission::Rejected(RejectReason::SpecialTitle);
        }

        let Some(revision) = page.revisions.first() else {
            return Admission::Rejected(RejectReason::NoRevisions);
        };

        let updated = match parse_timestamp(&revision.timestamp) {
            Ok(updated) => updated,
            Err(_) => {
                return Admission::Rejected(RejectReason::InvalidTimestamp(
                    revision.timestamp.to_string(),
                ))
            }
        };

        if self.skip_redirects
            && (page.redirect.is_some() || REDIRECT_DIRECTIVE.is_match(revision.text.as_str()))
        {
            return Admission::Rejected(RejectReason::Redirect);
        }

        Admission::Admitted { revision, updated }
    }
}
