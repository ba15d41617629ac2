use std::{
    io::Write,
    sync::{Arc, Mutex, PoisonError},
};

use chrono::{DateTime, Utc};
use compact_str::CompactString;
use serde::Serialize;

use crate::{
    admission::{Admission, AdmissionFilter, RejectReason},
    dump_parser::Page,
    markup,
    url_builder::UrlBuilder,
};

/// Value of the `type` field unless configured otherwise.
pub const DEFAULT_RECORD_TYPE: &str = "wikipedia";

/// One admitted page, ready for indexing.
///
/// Serializes with the field names the index expects (`@timestamp`, `category`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedRecord {
    /// When the page was processed.
    #[serde(rename = "@timestamp")]
    pub timestamp: DateTime<Utc>,
    /// Timestamp of the revision the record was built from.
    pub updated: DateTime<Utc>,
    #[serde(rename = "type")]
    pub record_type: CompactString,
    pub title: CompactString,
    #[serde(rename = "text")]
    pub plain_text: String,
    #[serde(rename = "category")]
    pub categories: Vec<String>,
    #[serde(rename = "link")]
    pub links: Vec<String>,
    pub url: String,
    pub image: Option<String>,
}

/// Turns pages into records: admission, markup normalization and URL.
///
/// Holds no per-page state, so one assembler can be shared by any number of
/// worker threads.
#[derive(Debug, Clone)]
pub struct RecordAssembler {
    filter: AdmissionFilter,
    urls: UrlBuilder,
    record_type: CompactString,
}

impl RecordAssembler {
    pub fn new(filter: AdmissionFilter, urls: UrlBuilder, record_type: &str) -> Self {
        Self {
            filter,
            urls,
            record_type: CompactString::from(record_type),
        }
    }

    /// Build the record for `page`, or explain why the page is skipped.
    ///
    /// `scratch_buffers` are passed on to [`markup::plain_text`]; they must be empty and
    /// are empty again afterwards.
    pub fn assemble(
        &self,
        page: &Page,
        scratch_buffers: (&mut String, &mut String),
    ) -> Result<NormalizedRecord, RejectReason> {
        let (revision, updated) = match self.filter.admit(page) {
            Admission::Admitted { revision, updated } => (revision, updated),
            Admission::Rejected(reason) => return Err(reason),
        };
        let text = revision.text.as_str();

        // shared by every extraction that must not see comments or <nowiki>
        let visible = markup::strip_hidden_markup(text);
        Ok(NormalizedRecord {
            timestamp: Utc::now(),
            updated,
            record_type: self.record_type.clone(),
            title: page.title.clone(),
            plain_text: markup::plain_text(text, scratch_buffers),
            categories: markup::visible_categories(&visible),
            links: markup::article_links(text),
            url: self.urls.article_url(&page.title),
            image: markup::representative_image(&markup::visible_media_files(&visible)),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("I/O error while publishing")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize record")]
    Serialize(#[from] serde_json::Error),
    #[error("sink is closed")]
    Closed,
}

/// Destination of the records, e.g. an indexing client or a file.
///
/// Delivery guarantees are up to the implementation; the pipeline hands over
/// every record exactly once and never retries.
pub trait RecordSink: Send {
    fn publish(&mut self, record: NormalizedRecord) -> Result<(), SinkError>;

    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Writes one JSON object per line.
#[derive(Debug)]
pub struct JsonLinesSink<W: Write + Send> {
    writer: W,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> RecordSink for JsonLinesSink<W> {
    fn publish(&mut self, record: NormalizedRecord) -> Result<(), SinkError> {
        serde_json::to_writer(&mut self.writer, &record)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Collects records in memory. Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct VecSink {
    records: Arc<Mutex<Vec<NormalizedRecord>>>,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<NormalizedRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl RecordSink for VecSink {
    fn publish(&mut self, record: NormalizedRecord) -> Result<(), SinkError> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
        Ok(())
    }
}
