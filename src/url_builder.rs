use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

// everything except the RFC 3986 unreserved characters gets escaped
const TITLE_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("site base URL {0:?} has no path separator")]
pub struct InvalidBaseUrl(pub String);

/// Builds canonical article URLs for one wiki.
///
/// The prefix is derived once from the dump's `<base>` URL (the main page) by
/// cutting after its last `/`, so every article of a run shares it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlBuilder {
    prefix: String,
}

impl UrlBuilder {
    pub fn new(base: &str) -> Result<Self, InvalidBaseUrl> {
        match base.rfind('/') {
            Some(index) => Ok(Self {
                prefix: base[..=index].to_string(),
            }),
            None => Err(InvalidBaseUrl(base.to_string())),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn article_url(&self, title: &str) -> String {
        let title = title.replace(' ', "_");
        let mut url = String::with_capacity(self.prefix.len() + title.len());
        url.push_str(&self.prefix);
        url.extend(utf8_percent_encode(&title, TITLE_ESCAPE));
        url
    }
}
