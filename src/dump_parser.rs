use std::{
    any::type_name_of_val,
    fmt::Debug,
    io::BufRead,
};

use compact_str::CompactString;
use quick_xml::events::{BytesEnd, BytesStart};
use rustc_hash::FxHashMap;
use tracing::instrument;

// we normally don't retrieve the value of the tags, so this is the most efficient backend
type TagStringInterner = string_interner::StringInterner<string_interner::backend::BucketBackend>;

// list of all tags that are relevant for our use case
// i.e. the tags of which we need a value and their parent tags
#[derive(PartialEq, Eq)]
enum Tag {
    MediaWiki, // <mediawiki version="0.11" ...other attributes>...</mediawiki> is the root tag
    SiteInfo,  // <siteinfo><sitename>...</sitename><base>...</base> ...other tags</siteinfo>
    SiteName,  // <sitename>Wikipedia</sitename>
    DbName,    // <dbname>jawiki</dbname>
    Base,      // <base>https://ja.wikipedia.org/wiki/メインページ</base>
    Namespaces, // <namespaces><namespace key="0" /> ...more namespace tags</namespaces>
    Namespace(String), // <namespace key="4">Wikipedia</namespace>
    Page,      // <page>...tags are (title, ns, id, redirect, revision)</page>
    Title,     // <title>blah</title>
    Ns,        // <ns>0</ns>
    Id,        // <id>500</id>
    Redirect(String), // <redirect title="Target" />
    Revision,  // <revision>...tags are (id, timestamp, contributor, text, ...)</revision>
    Timestamp, // <timestamp>2003-12-05T06:41:50Z</timestamp>
    Text(bool), // <text bytes="20" xml:space="preserve">blah</text> or <text bytes="20" deleted="deleted" />
    Unknown(string_interner::DefaultSymbol), // any other tag
}

impl Debug for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tag::MediaWiki => write!(f, "<mediawiki>"),
            Tag::SiteInfo => write!(f, "<siteinfo>"),
            Tag::SiteName => write!(f, "<sitename>"),
            Tag::DbName => write!(f, "<dbname>"),
            Tag::Base => write!(f, "<base>"),
            Tag::Namespaces => write!(f, "<namespaces>"),
            Tag::Namespace(key) => write!(f, "<namespace key={}>", key),
            Tag::Page => write!(f, "<page>"),
            Tag::Title => write!(f, "<title>"),
            Tag::Ns => write!(f, "<ns>"),
            Tag::Id => write!(f, "<id>"),
            Tag::Redirect(title) => write!(f, "<redirect title={:?}>", title),
            Tag::Revision => write!(f, "<revision>"),
            Tag::Timestamp => write!(f, "<timestamp>"),
            Tag::Text(deleted) => {
                if *deleted {
                    write!(f, "<text deleted>")
                } else {
                    write!(f, "<text>")
                }
            }
            Tag::Unknown(tag) => write!(f, "<unknown tag - interned symbol: {:?}>", tag),
        }
    }
}

fn find_attribute(e: &BytesStart, key: &[u8]) -> Result<Option<String>, quick_xml::Error> {
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.as_ref() == key {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

impl Tag {
    fn from_start_bytes(
        e: &BytesStart,
        tag_interner: &mut TagStringInterner,
    ) -> Result<Self, quick_xml::Error> {
        match e.name().as_ref() {
            b"mediawiki" => Ok(Tag::MediaWiki),
            b"siteinfo" => Ok(Tag::SiteInfo),
            b"sitename" => Ok(Tag::SiteName),
            b"dbname" => Ok(Tag::DbName),
            b"base" => Ok(Tag::Base),
            b"namespaces" => Ok(Tag::Namespaces),
            b"namespace" => {
                // a namespace without key can't be mapped, keep it on the path but ignore its value
                let key = find_attribute(e, b"key")?.unwrap_or_else(|| {
                    tracing::warn!(
                        message = "missing expected attribute, ignoring the namespace",
                        attribute = "key"
                    );
                    "ignored".to_string()
                });
                Ok(Tag::Namespace(key))
            }
            b"page" => Ok(Tag::Page),
            b"title" => Ok(Tag::Title),
            b"ns" => Ok(Tag::Ns),
            b"id" => Ok(Tag::Id),
            b"redirect" => Ok(Tag::Redirect(
                find_attribute(e, b"title")?.unwrap_or_default(),
            )),
            b"revision" => Ok(Tag::Revision),
            b"timestamp" => Ok(Tag::Timestamp),
            b"text" => Ok(Tag::Text(find_attribute(e, b"deleted")?.is_some())),
            name => {
                // a non-UTF-8 tag name would already be rejected by the XML reader
                let name = String::from_utf8_lossy(name);
                Ok(Tag::Unknown(tag_interner.get_or_intern(name.as_ref())))
            }
        }
    }

    fn matches_end_bytes(&self, e: &BytesEnd, tag_interner: &mut TagStringInterner) -> bool {
        match (self, e.name().as_ref()) {
            (Tag::MediaWiki, b"mediawiki") => true,
            (Tag::SiteInfo, b"siteinfo") => true,
            (Tag::SiteName, b"sitename") => true,
            (Tag::DbName, b"dbname") => true,
            (Tag::Base, b"base") => true,
            (Tag::Namespaces, b"namespaces") => true,
            (Tag::Namespace(_), b"namespace") => true,
            (Tag::Page, b"page") => true,
            (Tag::Title, b"title") => true,
            (Tag::Ns, b"ns") => true,
            (Tag::Id, b"id") => true,
            (Tag::Redirect(_), b"redirect") => true,
            (Tag::Revision, b"revision") => true,
            (Tag::Timestamp, b"timestamp") => true,
            (Tag::Text(_), b"text") => true,
            (Tag::Unknown(expected_tag), tag_name) => {
                let tag = tag_interner.get_or_intern(String::from_utf8_lossy(tag_name).as_ref());
                tag == *expected_tag
            }
            _ => false,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Text {
    Normal(String),
    Deleted,
}

impl Text {
    /// The wiki markup of the revision; deleted text reads as empty.
    pub fn as_str(&self) -> &str {
        match self {
            Text::Normal(text) => text,
            Text::Deleted => "",
        }
    }

    pub fn len(&self) -> usize {
        self.as_str().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_str().is_empty()
    }
}

impl Debug for Text {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // revision texts can be hundreds of KiB, don't flood the logs with them
            Text::Normal(text) => write!(f, "Text({} bytes)", text.len()),
            Text::Deleted => write!(f, "Deleted"),
        }
    }
}

/// One version of a page as stored in the dump.
///
/// The timestamp is kept as the raw string from the dump; validating it is the
/// job of [`crate::admission`], so that a bad timestamp rejects only the one page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Revision {
    pub id: Option<u64>,
    pub timestamp: CompactString,
    pub text: Text,
}

#[derive(Debug)]
struct RevisionBuilder {
    id: Option<u64>,
    timestamp: Option<CompactString>,
    text: Option<Text>,
}

#[derive(Debug, thiserror::Error)]
#[error("missing mandatory field: {0}")]
struct BuildRevisionError(&'static str, Box<RevisionBuilder>);

impl RevisionBuilder {
    fn new() -> Self {
        Self {
            id: None,
            timestamp: None,
            text: None,
        }
    }

    fn try_build(mut self) -> Result<Revision, BuildRevisionError> {
        let Some(text) = self.text.take() else {
            return Err(BuildRevisionError("text", self.into()));
        };

        Ok(Revision {
            id: self.id,
            // an absent timestamp is rejected later, together with unparseable ones
            timestamp: self.timestamp.unwrap_or_default(),
            text,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Page {
    /// Full title including the namespace prefix, e.g. `Wikipedia:Sandbox`.
    pub title: CompactString,
    pub namespace: i32,
    pub id: Option<u64>,
    /// Target of a `<redirect title=".."/>` element, if the page is a redirect.
    pub redirect: Option<CompactString>,
    /// Revisions in dump order. Article dumps contain only the latest revision.
    pub revisions: Vec<Revision>,
}

#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub enum Namespace {
    #[default]
    Default,
    Named(CompactString),
}

impl Debug for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Namespace::Default => write!(f, "Default"),
            Namespace::Named(name) => write!(f, "{:?}", name),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SiteInfo {
    pub sitename: CompactString,
    pub dbname: CompactString,
    /// URL of the main page, e.g. `https://en.wikipedia.org/wiki/Main_Page`.
    pub base: String,
    pub namespaces: FxHashMap<i32, Namespace>,
}

#[derive(Debug, thiserror::Error)]
pub enum ParsingError {
    #[error("XML error")]
    XmlError(#[from] quick_xml::Error),
    #[error("unexpected end of file")]
    Eof,
    #[error("unexpected end tag `</{actual}>`, expected {}", .expected.as_deref().unwrap_or("no end tag"))]
    UnexpectedEndTag {
        expected: Option<String>,
        actual: String,
    },
    #[error("missing mandatory field `{field}` in a revision of page {title:?}")]
    MissingField {
        field: &'static str,
        title: CompactString,
    },
}

/// Pull parser over a MediaWiki XML export.
///
/// The `<siteinfo>` header is read by [`DumpParser::new`]; afterwards every call to
/// [`DumpParser::parse_page`] (or every iteration step) reads exactly one `<page>`
/// subtree. Pages are handed out by value and never touched again by the parser.
pub struct DumpParser<R: BufRead> {
    tag_interner: TagStringInterner,
    xml_parser: quick_xml::Reader<R>,
    buf: Vec<u8>,
    current_path: Vec<Tag>,
    site_info: SiteInfo,
    finished: bool,
}

impl<R: BufRead> Debug for DumpParser<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DumpParser")
            .field("tag_interner", &type_name_of_val(&self.tag_interner))
            .field("xml_parser", &type_name_of_val(&self.xml_parser))
            // print buffer length and capacity
            .field("buf.len", &self.buf.len())
            .field("buf.capacity", &self.buf.capacity())
            .field("current_path", &self.current_path)
            .field("site_info", &self.site_info)
            .field("finished", &self.finished)
            .finish()
    }
}

impl<R: BufRead> DumpParser<R> {
    pub fn new(reader: R) -> Result<Self, ParsingError> {
        let mut xml_parser = quick_xml::Reader::from_reader(reader);
        // expand_empty_elements not set, take care to handle empty elements!
        // mismatched end tags are reported by the reader itself
        xml_parser.config_mut().check_end_names = true;

        let mut new = Self {
            tag_interner: TagStringInterner::new(),
            xml_parser,
            // preallocate 1 MiB for the buffer
            buf: Vec::with_capacity(1024 * 1024),
            current_path: Vec::new(),
            site_info: SiteInfo::default(),
            finished: false,
        };

        new.parse_site_info()?;

        Ok(new)
    }

    pub fn site_info(&self) -> &SiteInfo {
        &self.site_info
    }

    // debugging aid for format changes
    fn check_known_tags_in_unexpected_location(&self, is_empty: bool) {
        let Some(tag) = self.current_path.last() else {
            return;
        };

        if !matches!(tag, Tag::Unknown(_)) {
            tracing::trace!(
                message = "found known tag in unexpected location",
                tag = ?tag,
                path = ?self.current_path,
                is_empty
            );
        }
    }

    fn check_end_tag(
        e: &BytesEnd,
        current_path: &mut Vec<Tag>,
        tag_interner: &mut TagStringInterner,
        position: u64,
    ) -> Result<Tag, ParsingError> {
        let Some(tag) = current_path.pop() else {
            tracing::error!(
                message = "Unexpected end tag",
                tag = String::from_utf8_lossy(e.name().as_ref()).as_ref(),
                position
            );
            return Err(ParsingError::UnexpectedEndTag {
                expected: None,
                actual: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
            });
        };

        // the reader validates end names, so this only fires if our own path got out of sync
        if !tag.matches_end_bytes(e, tag_interner) {
            tracing::error!(
                message = "Mismatched tags",
                expected = ?tag,
                actual = String::from_utf8_lossy(e.name().as_ref()).as_ref(),
                current_path = ?current_path,
                position
            );
            return Err(ParsingError::UnexpectedEndTag {
                expected: Some(format!("{tag:?}")),
                actual: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
            });
        }

        Ok(tag)
    }

    #[instrument(skip(self))]
    fn parse_site_info(&mut self) -> Result<(), ParsingError> {
        let mut site_info = SiteInfo::default();

        loop {
            match self.xml_parser.read_event_into(&mut self.buf)? {
                quick_xml::events::Event::Start(ref e) => {
                    let tag = Tag::from_start_bytes(e, &mut self.tag_interner)?;
                    self.current_path.push(tag);
                }
                quick_xml::events::Event::Empty(ref e) => {
                    let tag = Tag::from_start_bytes(e, &mut self.tag_interner)?;

                    use Tag::*;

                    self.current_path.push(tag);
                    match self.current_path.as_slice() {
                        [MediaWiki, SiteInfo, Namespaces, Namespace(id)] => {
                            if let Ok(key) = id.parse() {
                                site_info.namespaces.insert(key, self::Namespace::Default);
                            } else if id != "ignored" {
                                tracing::warn!(
                                    message = "Ignoring namespace with invalid id",
                                    id,
                                    position = self.xml_parser.buffer_position()
                                );
                            }
                        }
                        _ => self.check_known_tags_in_unexpected_location(true),
                    }
                    self.current_path.pop();
                }
                quick_xml::events::Event::Text(e) => {
                    let text = e.unescape()?;

                    use Tag::*;

                    match self.current_path.as_slice() {
                        [MediaWiki, SiteInfo, SiteName] => {
                            site_info.sitename = CompactString::from(text.as_ref());
                        }
                        [MediaWiki, SiteInfo, DbName] => {
                            site_info.dbname = CompactString::from(text.as_ref());
                        }
                        [MediaWiki, SiteInfo, Base] => {
                            site_info.base = text.into_owned();
                        }
                        [MediaWiki, SiteInfo, Namespaces, Namespace(id)] => {
                            if let Ok(key) = id.parse() {
                                site_info.namespaces.insert(
                                    key,
                                    self::Namespace::Named(CompactString::from(text.as_ref())),
                                );
                            } else if id != "ignored" {
                                tracing::warn!(
                                    message = "Ignoring namespace with invalid id",
                                    id,
                                    name = text.as_ref(),
                                    position = self.xml_parser.buffer_position()
                                );
                            }
                        }
                        _ if text.trim().is_empty() => {}
                        _ => self.check_known_tags_in_unexpected_location(false),
                    }
                }
                quick_xml::events::Event::End(ref e) => {
                    let tag = Self::check_end_tag(
                        e,
                        &mut self.current_path,
                        &mut self.tag_interner,
                        self.xml_parser.buffer_position(),
                    )?;

                    if tag == Tag::SiteInfo {
                        // found the closing tag for siteinfo, we're done
                        break;
                    }
                }
                quick_xml::events::Event::Eof => {
                    // we should never reach eof in a correct file because we break when we find the closing tag
                    tracing::error!(partial_site_info = ?site_info, current_path = ?self.current_path);
                    return Err(ParsingError::Eof);
                }
                _ => {}
            }
            self.buf.clear();
        }
        self.buf.clear();

        tracing::info!(
            message = "Read site info",
            sitename = site_info.sitename.as_str(),
            dbname = site_info.dbname.as_str(),
            base = site_info.base.as_str(),
            namespaces = site_info.namespaces.len()
        );
        self.site_info = site_info;
        Ok(())
    }

    /// Read the next `<page>` element.
    ///
    /// Returns `Ok(None)` once the document ends. Any error leaves the parser in an
    /// undefined position; callers must stop pulling pages after the first error.
    pub fn parse_page(&mut self) -> Result<Option<Page>, ParsingError> {
        let span = tracing::span!(tracing::Level::DEBUG, "parse_page", title = tracing::field::Empty);
        let _entered = span.enter();

        let mut page = Page {
            title: CompactString::default(),
            namespace: 0,
            id: None,
            redirect: None,
            revisions: Vec::new(),
        };
        let mut started_page = false;

        let mut revision_builder = None;

        loop {
            match self.xml_parser.read_event_into(&mut self.buf)? {
                quick_xml::events::Event::Start(ref e) => {
                    let tag = Tag::from_start_bytes(e, &mut self.tag_interner)?;

                    if tag == Tag::Page {
                        started_page = true;
                    }

                    if tag == Tag::Revision {
                        revision_builder = Some(RevisionBuilder::new());
                    }

                    // `<text></text>` produces no text event, so start out empty
                    if let (Tag::Text(deleted), Some(revision_builder)) = (&tag, &mut revision_builder) {
                        if matches!(
                            self.current_path.as_slice(),
                            [Tag::MediaWiki, Tag::Page, Tag::Revision]
                        ) {
                            revision_builder.text = Some(if *deleted {
                                self::Text::Deleted
                            } else {
                                self::Text::Normal(String::new())
                            });
                        }
                    }

                    self.current_path.push(tag);
                }
                quick_xml::events::Event::Empty(ref e) => {
                    let tag = Tag::from_start_bytes(e, &mut self.tag_interner)?;

                    self.current_path.push(tag);

                    use Tag::*;

                    match self.current_path.as_slice() {
                        [MediaWiki, Page, Redirect(target)] => {
                            page.redirect = Some(CompactString::from(target.as_str()));
                        }
                        // Revision tags
                        [MediaWiki, Page, Revision, Text(deleted)] => {
                            // empty or deleted text tag
                            if let Some(revision_builder) = &mut revision_builder {
                                revision_builder.text = Some(if *deleted {
                                    self::Text::Deleted
                                } else {
                                    self::Text::Normal(String::new())
                                });
                            }
                        }
                        _ => self.check_known_tags_in_unexpected_location(true),
                    }
                    self.current_path.pop();
                }
                quick_xml::events::Event::Text(e) => {
                    let text = e.unescape()?;

                    use Tag::*;

                    match self.current_path.as_slice() {
                        // Page tags
                        [MediaWiki, Page, Title] => {
                            page.title = CompactString::from(text.as_ref());
                            span.record("title", page.title.as_str());
                        }
                        [MediaWiki, Page, Ns] => {
                            page.namespace = if let Ok(id) = text.parse() {
                                id
                            } else {
                                tracing::warn!(
                                    message = "Found invalid namespace id, defaulting to 0",
                                    ns = text.as_ref(),
                                    position = self.xml_parser.buffer_position()
                                );
                                0
                            };
                        }
                        [MediaWiki, Page, Id] => {
                            page.id = text.parse().ok();
                        }
                        // Revision tags
                        [MediaWiki, Page, Revision, Id] => {
                            if let Some(revision_builder) = &mut revision_builder {
                                revision_builder.id = if let Ok(id) = text.parse() {
                                    Some(id)
                                } else {
                                    tracing::info!(
                                        message = "Found invalid revision id",
                                        id = text.as_ref(),
                                        position = self.xml_parser.buffer_position()
                                    );
                                    None
                                };
                            }
                        }
                        [MediaWiki, Page, Revision, Timestamp] => {
                            if let Some(revision_builder) = &mut revision_builder {
                                revision_builder.timestamp =
                                    Some(CompactString::from(text.trim()));
                            }
                        }
                        [MediaWiki, Page, Revision, Text(deleted)] => {
                            if let Some(revision_builder) = &mut revision_builder {
                                revision_builder.text = Some(if *deleted {
                                    self::Text::Deleted
                                } else {
                                    self::Text::Normal(text.into_owned())
                                });
                            }
                        }
                        _ if text.trim().is_empty() => {}
                        _ => self.check_known_tags_in_unexpected_location(false),
                    }
                }
                quick_xml::events::Event::End(ref e) => {
                    let tag = Self::check_end_tag(
                        e,
                        &mut self.current_path,
                        &mut self.tag_interner,
                        self.xml_parser.buffer_position(),
                    )?;

                    if tag == Tag::Revision {
                        if let Some(revision_builder) = revision_builder.take() {
                            match revision_builder.try_build() {
                                Ok(revision) => page.revisions.push(revision),
                                Err(BuildRevisionError(field, revision_builder)) => {
                                    tracing::error!(
                                        message = "Missing mandatory field in revision",
                                        field,
                                        title = page.title.as_str(),
                                        partial_revision = ?revision_builder,
                                        revision_end_position = self.xml_parser.buffer_position()
                                    );
                                    if cfg!(feature = "strict") {
                                        return Err(ParsingError::MissingField {
                                            field,
                                            title: page.title,
                                        });
                                    } else {
                                        tracing::warn!(
                                            "Ignoring revision with missing mandatory field"
                                        );
                                    }
                                }
                            }
                        }
                    }

                    if tag == Tag::Page {
                        self.buf.clear();
                        break;
                    }
                }
                quick_xml::events::Event::Eof => {
                    if started_page {
                        tracing::error!(partial_page = ?page, current_path = ?self.current_path);
                        return Err(ParsingError::Eof);
                    } else {
                        return Ok(None);
                    }
                }
                _ => {}
            }
            self.buf.clear();
        }

        Ok(Some(page))
    }
}

/// Forward-only iteration over the pages of the dump.
///
/// The iterator is fused: it ends after the document ends or after the first
/// error, which is yielded exactly once.
impl<R: BufRead> Iterator for DumpParser<R> {
    type Item = Result<Page, ParsingError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.parse_page() {
            Ok(Some(page)) => Some(Ok(page)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{dump_xml, TestPage, TestRevision};

    #[test]
    fn test_site_info() {
        let xml = dump_xml("https://en.wikipedia.org/wiki/Main_Page", &[]);
        let parser = DumpParser::new(xml.as_bytes()).unwrap();

        let site_info = parser.site_info();
        assert_eq!(site_info.base, "https://en.wikipedia.org/wiki/Main_Page");
        assert_eq!(site_info.dbname, "enwiki");
        assert_eq!(site_info.sitename, "Wikipedia");
        assert_eq!(site_info.namespaces.get(&0), Some(&Namespace::Default));
        assert_eq!(
            site_info.namespaces.get(&4),
            Some(&Namespace::Named("Wikipedia".into()))
        );
    }

    #[test]
    fn test_pages_in_order() {
        let xml = dump_xml(
            "https://en.wikipedia.org/wiki/Main_Page",
            &[
                TestPage::article("First", "2020-01-01T00:00:00Z", "one & two <b>"),
                TestPage::article("Wikipedia:Second", "2021-01-01T00:00:00Z", "[[x]]"),
            ],
        );
        let parser = DumpParser::new(xml.as_bytes()).unwrap();

        let pages: Vec<Page> = parser.collect::<Result<_, _>>().unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].title, "First");
        assert_eq!(pages[0].revisions[0].timestamp, "2020-01-01T00:00:00Z");
        // escaped by the writer, unescaped again by the parser
        assert_eq!(pages[0].revisions[0].text.as_str(), "one & two <b>");
        assert_eq!(pages[1].title, "Wikipedia:Second");
        assert_eq!(pages[1].revisions[0].text.as_str(), "[[x]]");
    }

    #[test]
    fn test_page_details() {
        let page = TestPage {
            redirect: Some("Target"),
            revisions: vec![
                TestRevision {
                    deleted: true,
                    ..TestRevision::new("2020-01-01T00:00:00Z", "")
                },
                TestRevision::new("2020-01-02T00:00:00Z", ""),
            ],
            ..TestPage::article("Alias", "", "")
        };
        let xml = dump_xml("https://en.wikipedia.org/wiki/Main_Page", &[page]);
        let mut parser = DumpParser::new(xml.as_bytes()).unwrap();

        let page = parser.parse_page().unwrap().unwrap();
        assert_eq!(page.redirect.as_deref(), Some("Target"));
        assert_eq!(page.id, Some(1));
        assert_eq!(page.namespace, 0);
        assert_eq!(page.revisions.len(), 2);
        assert_eq!(page.revisions[0].text, Text::Deleted);
        assert_eq!(page.revisions[1].text, Text::Normal(String::new()));
        assert!(parser.parse_page().unwrap().is_none());
    }

    #[test]
    fn test_page_without_revisions() {
        let page = TestPage {
            revisions: Vec::new(),
            ..TestPage::article("Empty", "", "")
        };
        let xml = dump_xml("https://en.wikipedia.org/wiki/Main_Page", &[page]);
        let mut parser = DumpParser::new(xml.as_bytes()).unwrap();

        let page = parser.parse_page().unwrap().unwrap();
        assert!(page.revisions.is_empty());
    }

    #[test]
    fn test_revision_without_text_is_skipped() {
        let xml = r#"<mediawiki><siteinfo><base>https://x.org/wiki/Main</base></siteinfo>
            <page><title>A</title><revision><timestamp>2020-01-01T00:00:00Z</timestamp></revision></page>
            </mediawiki>"#;
        let mut parser = DumpParser::new(xml.as_bytes()).unwrap();

        if cfg!(feature = "strict") {
            assert!(matches!(
                parser.parse_page(),
                Err(ParsingError::MissingField { field: "text", .. })
            ));
        } else {
            let page = parser.parse_page().unwrap().unwrap();
            assert!(page.revisions.is_empty());
        }
    }

    #[test]
    fn test_empty_text_element_keeps_revision() {
        let xml = r#"<mediawiki><siteinfo><base>https://x.org/wiki/Main</base></siteinfo>
            <page><title>A</title><revision><timestamp>2020-01-01T00:00:00Z</timestamp><text bytes="0" xml:space="preserve"></text></revision></page>
            <page><title>B</title><revision><timestamp>2020-01-01T00:00:00Z</timestamp><text deleted="deleted"></text></revision></page>
            </mediawiki>"#;
        let mut parser = DumpParser::new(xml.as_bytes()).unwrap();

        let page = parser.parse_page().unwrap().unwrap();
        assert_eq!(page.revisions.len(), 1);
        assert_eq!(page.revisions[0].text, Text::Normal(String::new()));

        let page = parser.parse_page().unwrap().unwrap();
        assert_eq!(page.revisions.len(), 1);
        assert_eq!(page.revisions[0].text, Text::Deleted);
    }

    #[test]
    fn test_end_tag_out_of_sync_with_path() {
        let mut interner = TagStringInterner::new();

        let result = DumpParser::<&[u8]>::check_end_tag(
            &BytesEnd::new("page"),
            &mut Vec::new(),
            &mut interner,
            0,
        );
        match result {
            Err(ParsingError::UnexpectedEndTag { expected, actual }) => {
                assert_eq!(expected, None);
                assert_eq!(actual, "page");
            }
            _ => panic!("expected an unexpected end tag error"),
        }

        let mut path = vec![Tag::MediaWiki, Tag::Page];
        let result =
            DumpParser::<&[u8]>::check_end_tag(&BytesEnd::new("title"), &mut path, &mut interner, 0);
        match result {
            Err(err @ ParsingError::UnexpectedEndTag { .. }) => {
                assert_eq!(
                    err.to_string(),
                    "unexpected end tag `</title>`, expected <page>"
                );
            }
            _ => panic!("expected an unexpected end tag error"),
        }
    }

    #[test]
    fn test_missing_site_info_end() {
        let xml = "<mediawiki><siteinfo><base>https://x.org/wiki/Main</base>";
        assert!(matches!(
            DumpParser::new(xml.as_bytes()),
            Err(ParsingError::Eof)
        ));
    }

    #[test]
    fn test_truncated_page_is_an_error() {
        let xml = r#"<mediawiki><siteinfo><base>https://x.org/wiki/Main</base></siteinfo>
            <page><title>A</title><revision><timestamp>2020"#;
        let mut parser = DumpParser::new(xml.as_bytes()).unwrap();
        assert!(matches!(parser.parse_page(), Err(ParsingError::Eof)));
    }

    #[test]
    fn test_malformed_xml_ends_iteration() {
        let xml = r#"<mediawiki><siteinfo><base>https://x.org/wiki/Main</base></siteinfo>
            <page><title>A</title><revision><timestamp>2020-01-01T00:00:00Z</timestamp><text>a</text></revision></page>
            <page><title>B</titel></page>
            <page><title>C</title></page>
            </mediawiki>"#;
        let mut parser = DumpParser::new(xml.as_bytes()).unwrap();

        assert_eq!(parser.next().unwrap().unwrap().title, "A");
        assert!(matches!(parser.next(), Some(Err(ParsingError::XmlError(_)))));
        // no resynchronization after an error
        assert!(parser.next().is_none());
    }
}
