//! Allocation-avoiding string rewriting.
//!
//! Plain-text derivation runs a chain of replacements over every revision. Most
//! of them don't match on a given page, so the helpers here only copy when a
//! replacement actually happens, and ping-pong between two buffers that are
//! reused across pages.

use memchr::memmem;
use regex::Regex;

macro_rules! finder {
    ($needle:expr) => {{
        static FINDER: std::sync::LazyLock<memchr::memmem::Finder> =
            std::sync::LazyLock::new(|| memchr::memmem::Finder::new($needle.as_bytes()));
        &FINDER
    }};
}
pub(crate) use finder;

/// A string being rewritten in place, plus the buffer the next rewrite copies into.
///
/// Both buffers are borrowed from the caller when the rewrite starts and handed
/// back, cleared, by [`ScratchText::finish`], so their capacity survives.
pub struct ScratchText<'a> {
    text: String,
    scratch: String,
    home: (&'a mut String, &'a mut String),
}

impl<'a> ScratchText<'a> {
    /// Start rewriting `input`.
    ///
    /// The scratch buffers must be empty and will again be empty after `finish`.
    pub fn new(input: &str, scratch_buffers: (&'a mut String, &'a mut String)) -> Self {
        let mut text = std::mem::take(scratch_buffers.0);
        let scratch = std::mem::take(scratch_buffers.1);
        debug_assert!(text.is_empty() && scratch.is_empty());
        text.push_str(input);

        Self {
            text,
            scratch,
            home: scratch_buffers,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Replace all occurrences of the `from` needle with `to`.
    ///
    /// `from` must have been created from valid UTF-8, otherwise string slicing may panic.
    pub fn replace_str(&mut self, from: &memmem::Finder, to: &str) -> bool {
        let mut last_end = 0;
        for start in from.find_iter(self.text.as_bytes()) {
            let end = start + from.needle().len();

            self.scratch.push_str(&self.text[last_end..start]);
            self.scratch.push_str(to);

            last_end = end;
        }

        if last_end == 0 {
            // no replacements were made, scratch is still empty
            return false;
        }

        // copy the remaining text
        self.scratch.push_str(&self.text[last_end..]);
        self.swap();
        true
    }

    /// Replace all matches of `regex` with `replacement`, expanding capture groups.
    pub fn replace_regex<R: regex::Replacer>(&mut self, regex: &Regex, mut replacement: R) -> bool {
        let mut captures = regex.captures_iter(&self.text).peekable();
        if captures.peek().is_none() {
            return false;
        }

        let mut last_end = 0;
        for cap in captures {
            let Some(m) = cap.get(0) else { continue };

            self.scratch.push_str(&self.text[last_end..m.start()]);
            replacement.replace_append(&cap, &mut self.scratch);

            last_end = m.end();
        }

        // copy the remaining text
        self.scratch.push_str(&self.text[last_end..]);
        self.swap();
        true
    }

    fn swap(&mut self) {
        std::mem::swap(&mut self.text, &mut self.scratch);
        self.scratch.clear();
    }

    /// Return the rewritten text and give the (cleared) buffers back to their owner.
    pub fn finish(mut self) -> String {
        let result = self.text.clone();

        self.text.clear();
        *self.home.0 = std::mem::take(&mut self.text);
        *self.home.1 = std::mem::take(&mut self.scratch);

        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::LazyLock;

    use super::*;

    #[test]
    fn test_replace_str() {
        let mut buffers = (String::new(), String::new());
        let mut text = ScratchText::new("a&gt;b&gt;c", (&mut buffers.0, &mut buffers.1));

        assert!(text.replace_str(finder!("&gt;"), ">"));
        assert!(!text.replace_str(finder!("&lt;"), "<"));
        assert_eq!(text.finish(), "a>b>c");
        assert!(buffers.0.is_empty());
        assert!(buffers.1.is_empty());
    }

    #[test]
    fn test_replace_regex_with_groups() {
        static LINK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[\[(.*?)\]\]").unwrap());

        let mut buffers = (String::new(), String::new());
        let mut text = ScratchText::new("see [[Foo]] and [[Bar]].", (&mut buffers.0, &mut buffers.1));

        assert!(text.replace_regex(&LINK, "$1"));
        assert_eq!(text.as_str(), "see Foo and Bar.");
        assert_eq!(text.finish(), "see Foo and Bar.");
    }

    #[test]
    fn test_buffers_keep_capacity() {
        let mut buffers = (String::with_capacity(1024), String::with_capacity(1024));
        let text = ScratchText::new("unchanged", (&mut buffers.0, &mut buffers.1));

        assert_eq!(text.finish(), "unchanged");
        assert!(buffers.0.capacity() >= 1024);
        assert!(buffers.1.capacity() >= 1024);
    }
}
