//! Plain-text cleanup for HTML-bearing description fields.
//!
//! Upstream descriptions arrive with markup and a mix of named and numeric
//! character references. [`clean_description`] reduces them to a single line of
//! readable text and never fails.

use std::sync::LazyLock;

use regex::{Captures, Regex};

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^<>]*>").expect("tag pattern is valid"));

/// HTML elements that show up entity-encoded in upstream text. Kept to known
/// names so decoded prose such as `<and>` or `a < b` survives.
static ENCODED_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</?(?:a|b|i|u|p|br|hr|em|strong|span|div|ul|ol|li|h[1-6]|img|blockquote|font|small|sub|sup)\b[^<>]*>")
        .expect("encoded tag pattern is valid")
});

static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(?:#([0-9]{1,8})|#[xX]([0-9a-fA-F]{1,8})|([A-Za-z][A-Za-z0-9]{1,31}));")
        .expect("entity pattern is valid")
});

/// Named references decoded by [`clean_description`]; anything else is left as written.
const NAMED_ENTITIES: &[(&str, &str)] = &[
    ("amp", "&"),
    ("lt", "<"),
    ("gt", ">"),
    ("quot", "\""),
    ("apos", "'"),
    ("nbsp", " "),
    ("ndash", "\u{2013}"),
    ("mdash", "\u{2014}"),
    ("hellip", "\u{2026}"),
    ("lsquo", "\u{2018}"),
    ("rsquo", "\u{2019}"),
    ("ldquo", "\u{201C}"),
    ("rdquo", "\u{201D}"),
    ("laquo", "\u{00AB}"),
    ("raquo", "\u{00BB}"),
    ("bull", "\u{2022}"),
    ("middot", "\u{00B7}"),
    ("copy", "\u{00A9}"),
    ("reg", "\u{00AE}"),
    ("trade", "\u{2122}"),
    ("deg", "\u{00B0}"),
    ("times", "\u{00D7}"),
    ("frac12", "\u{00BD}"),
    ("frac14", "\u{00BC}"),
    ("frac34", "\u{00BE}"),
    ("aacute", "\u{00E1}"),
    ("agrave", "\u{00E0}"),
    ("auml", "\u{00E4}"),
    ("ccedil", "\u{00E7}"),
    ("eacute", "\u{00E9}"),
    ("egrave", "\u{00E8}"),
    ("ecirc", "\u{00EA}"),
    ("iacute", "\u{00ED}"),
    ("ntilde", "\u{00F1}"),
    ("oacute", "\u{00F3}"),
    ("ouml", "\u{00F6}"),
    ("uacute", "\u{00FA}"),
    ("uuml", "\u{00FC}"),
    ("szlig", "\u{00DF}"),
];

/// Strip markup and decode character references into normalized plain text.
///
/// - Tags become a single space, including HTML tags that only appear once
///   references are decoded (`&lt;br/&gt;`).
/// - Named references from a fixed table are decoded; unknown ones stay literal.
/// - Numeric references (`&#10;`, `&#x27;`) for tab, line feed and carriage
///   return become a space; codes in printable ASCII (32–126) or Latin-1
///   (160–255) decode to that character; every other code is dropped.
/// - Runs of whitespace collapse to one space and the result is trimmed.
///
/// # Example
///
/// ```
/// use meeple_client::catalog::clean_description;
///
/// assert_eq!(clean_description("Good &amp; fun<br/>game &#10;here"), "Good & fun game here");
/// ```
pub fn clean_description(raw: &str) -> String {
    let without_tags = TAG_RE.replace_all(raw, " ");
    let decoded = ENTITY_RE.replace_all(&without_tags, |caps: &Captures| {
        if let Some(dec) = caps.get(1) {
            decode_numeric(dec.as_str().parse().ok())
        } else if let Some(hex) = caps.get(2) {
            decode_numeric(u32::from_str_radix(hex.as_str(), 16).ok())
        } else {
            let name = caps.get(3).map_or("", |m| m.as_str());
            match NAMED_ENTITIES.iter().find(|(entity, _)| *entity == name) {
                Some((_, text)) => (*text).to_string(),
                None => caps[0].to_string(),
            }
        }
    });

    let without_encoded_tags = ENCODED_TAG_RE.replace_all(&decoded, " ");

    without_encoded_tags.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn decode_numeric(code: Option<u32>) -> String {
    match code {
        Some(9 | 10 | 13) => " ".to_string(),
        Some(code @ (32..=126 | 160..=255)) => char::from_u32(code).map(String::from).unwrap_or_default(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_example() {
        assert_eq!(clean_description("Good &amp; fun<br/>game &#10;here"), "Good & fun game here");
    }

    #[test]
    fn test_named_entities() {
        assert_eq!(clean_description("&quot;Trade&quot; &lt;and&gt; build&hellip;"), "\"Trade\" <and> build\u{2026}");
        assert_eq!(clean_description("caf&eacute;"), "caf\u{e9}");
    }

    #[test]
    fn test_numeric_entities() {
        assert_eq!(clean_description("it&#39;s &#x41;"), "it's A");
        assert_eq!(clean_description("line&#13;&#10;break&#9;tab"), "line break tab");
        assert_eq!(clean_description("&#233;t&#xE9;"), "\u{e9}t\u{e9}");
    }

    #[test]
    fn test_out_of_range_codes_dropped() {
        assert_eq!(clean_description("a&#8212;b"), "ab");
        assert_eq!(clean_description("a&#1;b&#127;c&#x1F600;d"), "abcd");
        assert_eq!(clean_description("a&#99999999;b"), "ab");
    }

    #[test]
    fn test_unknown_and_malformed_entities_left_alone() {
        assert_eq!(clean_description("&bogus; stays"), "&bogus; stays");
        assert_eq!(clean_description("Fish & Chips &amp"), "Fish & Chips &amp");
        assert_eq!(clean_description("&#; &#x; &;"), "&#; &#x; &;");
    }

    #[test]
    fn test_tags_replaced_with_space() {
        assert_eq!(clean_description("<p>First</p><p>Second</p>"), "First Second");
        assert_eq!(clean_description("<b>bold</b>text"), "bold text");
    }

    #[test]
    fn test_encoded_tags_removed_after_decoding() {
        assert_eq!(clean_description("Intro&lt;br/&gt;more &lt;b&gt;bold&lt;/b&gt;"), "Intro more bold");
        assert_eq!(clean_description("&lt;P ALIGN=&quot;left&quot;&gt;Rules&lt;/P&gt;"), "Rules");
        assert_eq!(clean_description("if a &lt; b then b &gt; a"), "if a < b then b > a");
    }

    #[test]
    fn test_whitespace_collapsed_and_trimmed() {
        assert_eq!(clean_description("  lots \n\n of\t space  "), "lots of space");
        assert_eq!(clean_description(""), "");
        assert_eq!(clean_description("<br/>&#10;"), "");
    }

    #[test]
    fn test_raw_unicode_kept() {
        assert_eq!(clean_description("Zürich — 東京"), "Zürich — 東京");
    }
}
