// SPDX-License-Identifier: MPL-2.0
//! # wikinorm
//!
//! Streaming conversion of compressed Wikipedia XML dumps into normalized, index-ready page records.
//!
//! ## Overview
//!
//! `wikinorm` reads a bzip2 compressed MediaWiki XML export (e.g. `jawiki-latest-pages-articles.xml.bz2`) page
//! by page, decides which pages are worth indexing and turns each of them into a flat record: the plain text with
//! the wiki markup stripped away, the categories, the linked articles and the canonical URL of the article.
//! The records are handed to a sink, for example a JSON lines file that a search index ingests.
//!
//! **Key Features:**
//!
//! - **Streaming**: Memory use is bounded by the largest page, not by the size of the dump.
//! - **Parallel Processing**: Normalization can be spread over worker threads while the output keeps the dump order.
//! - **Clean Shutdown**: A run can be cancelled between pages, even while the sink is stuck.
//! - **Modular Design**: Parser, admission rules, markup normalizer and sinks can be used independently.
//!
//! ## Getting Started
//!
//! ### Command Line
//!
//! ```sh
//! wikinorm jawiki-latest-pages-articles.xml.bz2 --workers 4 --output records.jsonl
//! ```
//!
//! Everything else can be set in a TOML file passed with `--config`, see [`config`].
//!
//! ### Basic Usage
//!
//! Converting an in-memory export and collecting the records:
//!
//! ```rust
//! use wikinorm::dump_parser::DumpParser;
//! use wikinorm::pipeline::Pipeline;
//! use wikinorm::record::VecSink;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let xml = "<mediawiki><siteinfo><base>https://en.wikipedia.org/wiki/Main_Page</base></siteinfo>\
//!                <page><title>Rust</title><ns>0</ns><revision>\
//!                <timestamp>2024-01-01T00:00:00Z</timestamp>\
//!                <text>A [[systems programming]] language.</text>\
//!                </revision></page></mediawiki>";
//!     let parser = DumpParser::new(xml.as_bytes())?;
//!
//!     let sink = VecSink::new();
//!     let summary = Pipeline::default().run(parser, sink.clone())?;
//!
//!     let records = sink.records();
//!     assert_eq!(summary.published, 1);
//!     assert_eq!(records[0].plain_text, "A systems programming language.");
//!     assert_eq!(records[0].links, vec!["systems programming"]);
//!     assert_eq!(records[0].url, "https://en.wikipedia.org/wiki/Rust");
//!     Ok(())
//! }
//! ```
//!
//! ### Processing an Entire Dump
//!
//! ```rust,no_run
//! use wikinorm::compression::open_dump;
//! use wikinorm::dump_parser::DumpParser;
//! use wikinorm::pipeline::{Pipeline, PipelineOptions};
//! use wikinorm::admission::AdmissionFilter;
//! use wikinorm::record::JsonLinesSink;
//! use std::fs::File;
//! use std::io::BufWriter;
//! use std::path::Path;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let reader = open_dump(Path::new("jawiki-latest-pages-articles.xml.bz2"))?;
//!     let parser = DumpParser::new(reader)?;
//!
//!     let options = PipelineOptions { workers: 4, ..PipelineOptions::default() };
//!     let pipeline = Pipeline::new(AdmissionFilter::default(), "wikipedia", options);
//!
//!     let sink = JsonLinesSink::new(BufWriter::new(File::create("records.jsonl")?));
//!     let summary = pipeline.run(parser, sink)?;
//!     println!("{} of {} pages published", summary.published, summary.pages_read);
//!     Ok(())
//! }
//! ```
//!
//! ## Modules and API
//!
//! ### `compression` Module
//!
//! **Purpose**: Opens a dump and undoes the bzip2 compression, including dumps made of concatenated streams.
//!
//! ### `dump_parser` Module
//!
//! **Purpose**: Parses MediaWiki XML exports.
//!
//! **Usage**:
//!
//! - Create a `DumpParser` instance with a reader.
//! - Use `parse_page()` or the `Iterator` implementation to retrieve pages one by one.
//! - Access site information (`base` URL, namespaces) using `site_info()`.
//!
//! ### `admission` Module
//!
//! **Purpose**: Decides per page whether it becomes a record (special titles, pages without revisions,
//! broken timestamps and optionally redirects are skipped).
//!
//! ### `markup` Module
//!
//! **Purpose**: Pattern-based markup normalization: plain text, categories, links and media files.
//! This is deliberately not a full wikitext parser.
//!
//! ### `record` Module
//!
//! **Purpose**: The `NormalizedRecord`, the assembler building it and the `RecordSink` trait with a JSON lines
//! and an in-memory implementation.
//!
//! ### `pipeline` Module
//!
//! **Purpose**: Runs a whole dump, either sequentially or with a pool of workers, and reports a `RunSummary`.
//!
//! ## Features
//!
//! - `strict`: Fail on revisions without a `<text>` element instead of skipping them.
//! - `optimized-str`: Use the buffer-reusing plain text derivation. The output is identical.
//!
//! ## License
//!
//! This project is licensed under the Mozilla Public License 2.0.

pub mod admission;
pub mod compression;
pub mod config;
pub mod dump_parser;
pub mod markup;
pub mod pipeline;
pub mod record;
#[cfg(test)]
mod test_support;
pub mod url_builder;
pub mod utils;
