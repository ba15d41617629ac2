//! Builders for synthetic dumps used across the test modules.

use std::io::Write;

use bzip2::{write::BzEncoder, Compression};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};

#[derive(Debug, Clone)]
pub struct TestRevision<'a> {
    pub timestamp: &'a str,
    pub text: &'a str,
    pub deleted: bool,
}

impl<'a> TestRevision<'a> {
    pub fn new(timestamp: &'a str, text: &'a str) -> Self {
        Self {
            timestamp,
            text,
            deleted: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TestPage<'a> {
    pub title: &'a str,
    pub id: u64,
    pub redirect: Option<&'a str>,
    pub revisions: Vec<TestRevision<'a>>,
}

impl<'a> TestPage<'a> {
    /// A page with a single revision.
    pub fn article(title: &'a str, timestamp: &'a str, text: &'a str) -> Self {
        Self {
            title,
            id: 1,
            redirect: None,
            revisions: vec![TestRevision::new(timestamp, text)],
        }
    }
}

fn write_text_element<W: Write>(writer: &mut quick_xml::Writer<W>, name: &str, text: &str) {
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .unwrap();
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .unwrap();
    writer.write_event(Event::End(BytesEnd::new(name))).unwrap();
}

/// Serialize a complete export document the way Special:Export lays it out.
pub fn dump_xml(base: &str, pages: &[TestPage]) -> String {
    let mut xml = Vec::new();
    let mut writer = quick_xml::Writer::new(&mut xml);

    writer
        .write_event(Event::Start(
            BytesStart::new("mediawiki").with_attributes([
                ("xmlns", "http://www.mediawiki.org/xml/export-0.11/"),
                ("version", "0.11"),
                ("xml:lang", "en"),
            ]),
        ))
        .unwrap();

    writer
        .write_event(Event::Start(BytesStart::new("siteinfo")))
        .unwrap();
    write_text_element(&mut writer, "sitename", "Wikipedia");
    write_text_element(&mut writer, "dbname", "enwiki");
    write_text_element(&mut writer, "base", base);
    write_text_element(&mut writer, "generator", "MediaWiki 1.43.0-wmf.20");
    writer
        .write_event(Event::Start(BytesStart::new("namespaces")))
        .unwrap();
    writer
        .write_event(Event::Empty(
            BytesStart::new("namespace").with_attributes([("key", "0"), ("case", "first-letter")]),
        ))
        .unwrap();
    for (key, name) in [("4", "Wikipedia"), ("6", "File"), ("14", "Category")] {
        writer
            .write_event(Event::Start(
                BytesStart::new("namespace").with_attributes([("key", key)]),
            ))
            .unwrap();
        writer
            .write_event(Event::Text(BytesText::new(name)))
            .unwrap();
        writer
            .write_event(Event::End(BytesEnd::new("namespace")))
            .unwrap();
    }
    writer
        .write_event(Event::End(BytesEnd::new("namespaces")))
        .unwrap();
    writer
        .write_event(Event::End(BytesEnd::new("siteinfo")))
        .unwrap();

    for page in pages {
        writer
            .write_event(Event::Start(BytesStart::new("page")))
            .unwrap();
        write_text_element(&mut writer, "title", page.title);
        write_text_element(&mut writer, "ns", "0");
        write_text_element(&mut writer, "id", &page.id.to_string());
        if let Some(target) = page.redirect {
            writer
                .write_event(Event::Empty(
                    BytesStart::new("redirect").with_attributes([("title", target)]),
                ))
                .unwrap();
        }

        for (index, revision) in page.revisions.iter().enumerate() {
            writer
                .write_event(Event::Start(BytesStart::new("revision")))
                .unwrap();
            write_text_element(&mut writer, "id", &(index + 100).to_string());
            write_text_element(&mut writer, "timestamp", revision.timestamp);
            writer
                .write_event(Event::Start(BytesStart::new("contributor")))
                .unwrap();
            write_text_element(&mut writer, "username", "Dummy");
            write_text_element(&mut writer, "id", "7");
            writer
                .write_event(Event::End(BytesEnd::new("contributor")))
                .unwrap();
            write_text_element(&mut writer, "model", "wikitext");
            write_text_element(&mut writer, "format", "text/x-wiki");

            let bytes = revision.text.len().to_string();
            if revision.deleted {
                writer
                    .write_event(Event::Empty(BytesStart::new("text").with_attributes([
                        ("bytes", bytes.as_str()),
                        ("deleted", "deleted"),
                    ])))
                    .unwrap();
            } else if revision.text.is_empty() {
                writer
                    .write_event(Event::Empty(
                        BytesStart::new("text").with_attributes([("bytes", "0")]),
                    ))
                    .unwrap();
            } else {
                writer
                    .write_event(Event::Start(BytesStart::new("text").with_attributes([
                        ("bytes", bytes.as_str()),
                        ("xml:space", "preserve"),
                    ])))
                    .unwrap();
                writer
                    .write_event(Event::Text(BytesText::new(revision.text)))
                    .unwrap();
                writer
                    .write_event(Event::End(BytesEnd::new("text")))
                    .unwrap();
            }
            writer
                .write_event(Event::End(BytesEnd::new("revision")))
                .unwrap();
        }

        writer
            .write_event(Event::End(BytesEnd::new("page")))
            .unwrap();
    }

    writer
        .write_event(Event::End(BytesEnd::new("mediawiki")))
        .unwrap();

    String::from_utf8(xml).unwrap()
}

pub fn compress(data: &[u8]) -> Vec<u8> {
    let mut encoder = BzEncoder::new(Vec::new(), Compression::fast());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}
