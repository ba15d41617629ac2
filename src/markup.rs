//! Pattern-based cleanup of wiki markup.
//!
//! Every function here is a pure function of the revision text. The patterns are
//! compiled once per process and shared read-only between worker threads.
//!
//! Nothing in this module can fail: a pattern that doesn't match leaves the text
//! as it is, so malformed or unbalanced markup simply degrades the output.
//!
//! | Output | Input text |
//! |---|---|
//! | [`categories`], [`media_files`] | raw text with `<nowiki>` blocks and comments removed (the `visible_` variants take it already stripped) |
//! | [`article_links`] | raw text |
//! | [`plain_text`] | raw text |

use std::sync::LazyLock;

use regex::Regex;

use crate::utils::{finder, ScratchText};

macro_rules! regex {
    ($pattern:expr) => {{
        static REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new($pattern).unwrap());
        &REGEX
    }};
}

/// Remove the spans a renderer would not interpret: HTML comments and `<nowiki>` blocks.
///
/// Used before structural extraction so that e.g. a commented-out category is not
/// reported.
pub fn strip_hidden_markup(text: &str) -> String {
    let without_comments = regex!(r"(?s)<!--.*?-->").replace_all(text, "");
    regex!(r"(?s)<nowiki>.*?</nowiki>")
        .replace_all(&without_comments, "")
        .into_owned()
}

/// Names of all `[[Category:Name]]` links, in order of appearance.
///
/// The keyword is matched case-insensitively and the name ends at the first `|`
/// or `]`. Names are not trimmed or deduplicated.
pub fn categories(text: &str) -> Vec<String> {
    visible_categories(&strip_hidden_markup(text))
}

/// [`categories`] of text that already went through [`strip_hidden_markup`].
pub fn visible_categories(visible: &str) -> Vec<String> {
    regex!(r"\[\[(?i:category):([^|\]]+)")
        .captures_iter(visible)
        .map(|cap| cap[1].to_string())
        .collect()
}

/// File names of all embedded media (`[[File:..]]`, `[[Image:..]]` and the
/// Japanese `ファイル`/`画像` aliases), in order of appearance.
pub fn media_files(text: &str) -> Vec<String> {
    visible_media_files(&strip_hidden_markup(text))
}

/// [`media_files`] of text that already went through [`strip_hidden_markup`].
pub fn visible_media_files(visible: &str) -> Vec<String> {
    regex!(r"\[(?i:file|image|ファイル|画像):([^|\]]+)")
        .captures_iter(visible)
        .map(|cap| cap[1].to_string())
        .collect()
}

/// Pick the image that represents an article.
///
/// Always `None` for now. Turning a file name into a URL needs the file
/// namespace of the wiki (or an API lookup), and which of the embedded files
/// should represent the page is not decided yet.
pub fn representative_image(_media_files: &[String]) -> Option<String> {
    None
}

/// Targets of all internal links (`[[Target]]`, `[[Target|label]]`), in order of
/// appearance, duplicates included.
///
/// The target ends at the first `|` or `]`; targets containing characters that
/// can't occur in a title (`[`, `{`, `}`, `<`, `>`, line breaks) are not links.
pub fn links(text: &str) -> Vec<&str> {
    regex!(r"\[\[([^\[\]|{}<>\n]+)")
        .captures_iter(text)
        .filter_map(|cap| {
            let target = cap.get(1)?.as_str().trim();
            (!target.is_empty()).then_some(target)
        })
        .collect()
}

/// Links to other articles: every link target without a colon.
///
/// A colon marks namespaced (`File:`, `Category:`) and interwiki (`de:`) links.
pub fn article_links(text: &str) -> Vec<String> {
    links(text)
        .into_iter()
        .filter(|target| !target.contains(':'))
        .map(str::to_string)
        .collect()
}

/// Derive readable text from the raw markup.
///
/// Applied in this order:
/// 1. `&gt;` and `&lt;` become `>` and `<`
/// 2. `<ref .../>` markers, then `<ref>..</ref>` blocks (possibly multi-line), become a space
/// 3. `{{..}}` templates become a space
/// 4. links with a prefix, like `[[File:x.png]]`, become a space
/// 5. remaining `[[Target]]` links become `Target`
/// 6. ` label|word ` collapses to ` word `
/// 7. single-bracket spans `[..]` become a space
/// 8. apostrophes (bold/italic markup) are removed
///
/// # Arguments
///
/// * `text` - The raw revision text.
/// * `scratch_buffers` - A tuple containing two scratch buffers to use for temporary storage.
///                       They must be empty and will again be empty after the function returns.
///                       They should be reused across multiple calls to this function.
pub fn plain_text(text: &str, scratch_buffers: (&mut String, &mut String)) -> String {
    if cfg!(feature = "optimized-str") {
        plain_text_optimized(text, scratch_buffers)
    } else {
        plain_text_naive(text)
    }
}

fn ref_block() -> &'static Regex {
    regex!(r"(?s)<ref(?:\s[^>]*)?>.*?</ref>")
}

fn ref_marker() -> &'static Regex {
    regex!(r"<ref(?:\s[^>]*)?/>")
}

fn template() -> &'static Regex {
    regex!(r"\{\{.*?\}\}")
}

fn prefixed_link() -> &'static Regex {
    regex!(r"\[\[[^\[\]|\n]*:.*?\]\]")
}

fn wiki_link() -> &'static Regex {
    regex!(r"\[\[(.*?)\]\]")
}

fn piped_label() -> &'static Regex {
    regex!(r"(\s).*?\|(\w+\s)")
}

fn bracketed() -> &'static Regex {
    regex!(r"\[.*?\]")
}

#[doc(hidden)] /* only public for benchmarking */
pub fn plain_text_naive(text: &str) -> String {
    let text = text.replace("&gt;", ">").replace("&lt;", "<");

    // markers first, a block opener would otherwise start at a self-closing marker
    let text = ref_marker().replace_all(&text, " ");
    let text = ref_block().replace_all(&text, " ");
    let text = template().replace_all(&text, " ");
    let text = prefixed_link().replace_all(&text, " ");
    let text = wiki_link().replace_all(&text, "$1");
    let text = piped_label().replace_all(&text, "${1}${2}");
    let text = bracketed().replace_all(&text, " ");

    text.replace('\'', "")
}

#[doc(hidden)] /* only public for benchmarking */
pub fn plain_text_optimized(text: &str, scratch_buffers: (&mut String, &mut String)) -> String {
    let mut text = ScratchText::new(text, scratch_buffers);

    text.replace_str(finder!("&gt;"), ">");
    text.replace_str(finder!("&lt;"), "<");

    text.replace_regex(ref_marker(), " ");
    text.replace_regex(ref_block(), " ");
    text.replace_regex(template(), " ");
    text.replace_regex(prefixed_link(), " ");
    text.replace_regex(wiki_link(), "$1");
    text.replace_regex(piped_label(), "${1}${2}");
    text.replace_regex(bracketed(), " ");

    text.replace_str(finder!("'"), "");

    text.finish()
}
