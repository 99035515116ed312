//! # Watermark Policy
//!
//! Free-tier sites carry a small "Powered by" badge in their entry file.
//! Whether the badge is present is never stored anywhere: it is re-derived
//! from `(is_entry_file, tier)` every time the file is written, by stripping
//! whatever badge the content already has and inserting a fresh one when the
//! owner is on the free tier.
//!
//! ## Marker format
//!
//! The badge is a single line wrapped in sentinel comments:
//!
//! ```text
//! <!-- sitehost:watermark:begin --><div id="sitehost-watermark" …>…</div><!-- sitehost:watermark:end -->
//! ```
//!
//! Stripping is an explicit scan for the sentinels, so formatting changes in
//! the badge body never break removal. Two older forms are also removed: the
//! `<div id="shamim-cloud-watermark" …>…</div>` block and the bare text
//! `Powered by Shamim Cloud`.
//!
//! ## Invariant
//!
//! For every `content`, `is_entry` and `tier`:
//! `apply(apply(content)) == apply(content)`. Stripping removes every marker
//! and orphan sentinel and runs to a fixpoint, and insertion is undone exactly
//! by one stripping pass.

use crate::records::PlanTier;

pub const MARKER_BEGIN: &str = "<!-- sitehost:watermark:begin -->";
pub const MARKER_END: &str = "<!-- sitehost:watermark:end -->";

const LEGACY_DIV_OPEN: &str = "<div id=\"shamim-cloud-watermark\"";
const LEGACY_DIV_CLOSE: &str = "</div>";
const LEGACY_TEXT: &str = "Powered by Shamim Cloud";

const BODY_CLOSE: &str = "</body>";
const ENTRY_FILE_NAME: &str = "index.html";

/// Renders and places the badge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatermarkPolicy {
    brand_name: String,
    brand_url: String,
}

impl Default for WatermarkPolicy {
    fn default() -> Self {
        Self::new("SiteHost", "https://sitehost.app")
    }
}

impl WatermarkPolicy {
    pub fn new(brand_name: impl Into<String>, brand_url: impl Into<String>) -> Self {
        Self {
            brand_name: brand_name.into(),
            brand_url: brand_url.into(),
        }
    }

    /// The full marker fragment, sentinels included.
    pub fn marker(&self) -> String {
        format!(
            "{MARKER_BEGIN}<div id=\"sitehost-watermark\" style=\"position:fixed;bottom:10px;right:10px;z-index:9999;\
background:linear-gradient(45deg,#6b21a8,#7c3aed);padding:6px 12px;border-radius:50px;\
font-family:sans-serif;font-size:12px;box-shadow:0 4px 15px rgba(0,0,0,0.3);\">\
<a href=\"{url}\" target=\"_blank\" rel=\"noopener\" style=\"text-decoration:none;color:white;\">\
Powered by <b>{name}</b></a></div>{MARKER_END}",
            url = escape_html(&self.brand_url),
            name = escape_html(&self.brand_name),
        )
    }

    /// Derive the stored form of `content`.
    ///
    /// Existing markers are always removed. A single fresh marker is added
    /// only for a free-tier entry file: before the last `</body>` when there
    /// is one, otherwise at the end.
    pub fn apply(&self, content: &str, is_entry_file: bool, tier: &PlanTier) -> String {
        let stripped = strip_markers(content);
        if !(is_entry_file && tier.is_free()) {
            return stripped;
        }
        let marker = self.marker();
        match find_last_ascii_ci(&stripped, BODY_CLOSE) {
            Some(at) => {
                let mut out = String::with_capacity(stripped.len() + marker.len() + 1);
                out.push_str(&stripped[..at]);
                out.push_str(&marker);
                out.push('\n');
                out.push_str(&stripped[at..]);
                out
            }
            None => {
                let mut out = stripped;
                out.push('\n');
                out.push_str(&marker);
                out
            }
        }
    }
}

/// Whether `file_name` (a bare name or a path) is a project's entry file.
pub fn is_entry_file(file_name: &str) -> bool {
    file_name.rsplit('/').next() == Some(ENTRY_FILE_NAME)
}

/// Remove every marker, orphan sentinel and legacy badge from `content`.
pub fn strip_markers(content: &str) -> String {
    let mut current = content.to_string();
    loop {
        let next = strip_pass(&current);
        // Each step only deletes, so an unchanged length means a fixpoint.
        if next.len() == current.len() {
            return next;
        }
        current = next;
    }
}

/// Number of complete sentinel-delimited markers in `content`.
pub fn count_markers(content: &str) -> usize {
    let mut count = 0;
    let mut rest = content;
    while let Some(begin) = rest.find(MARKER_BEGIN) {
        let after_begin = &rest[begin + MARKER_BEGIN.len()..];
        match after_begin.find(MARKER_END) {
            Some(end) => {
                count += 1;
                rest = &after_begin[end + MARKER_END.len()..];
            }
            None => break,
        }
    }
    count
}

fn strip_pass(content: &str) -> String {
    let without_blocks = remove_marker_blocks(content);
    let without_orphans = without_blocks.replace(MARKER_BEGIN, "").replace(MARKER_END, "");
    let without_legacy_divs = remove_legacy_divs(&without_orphans);
    without_legacy_divs.replace(LEGACY_TEXT, "")
}

/// Remove `BEGIN … END` blocks together with the newline that insertion
/// placed beside them.
fn remove_marker_blocks(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut rest = content;
    loop {
        let Some(begin) = rest.find(MARKER_BEGIN) else {
            out.push_str(rest);
            return out;
        };
        let search_from = begin + MARKER_BEGIN.len();
        let Some(end_rel) = rest[search_from..].find(MARKER_END) else {
            out.push_str(rest);
            return out;
        };
        let block_end = search_from + end_rel + MARKER_END.len();

        let mut before = &rest[..begin];
        let mut after = &rest[block_end..];
        if let Some(stripped) = after.strip_prefix('\n') {
            after = stripped;
        } else if let Some(stripped) = before.strip_suffix('\n') {
            before = stripped;
        }
        out.push_str(before);
        rest = after;
    }
}

fn remove_legacy_divs(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut rest = content;
    while let Some(open) = rest.find(LEGACY_DIV_OPEN) {
        let Some(close_rel) = rest[open..].find(LEGACY_DIV_CLOSE) else {
            break;
        };
        out.push_str(&rest[..open]);
        rest = &rest[open + close_rel + LEGACY_DIV_CLOSE.len()..];
    }
    out.push_str(rest);
    out
}

/// Byte offset of the last ASCII-case-insensitive occurrence of `needle`.
fn find_last_ascii_ci(haystack: &str, needle: &str) -> Option<usize> {
    // ASCII lowercasing keeps every byte offset, and the needle is ASCII, so
    // a match always starts on a char boundary of the original.
    haystack.to_ascii_lowercase().rfind(needle)
}

/// Escape text for inclusion in HTML content or attribute values.
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> WatermarkPolicy {
        WatermarkPolicy::new("SiteHost", "https://sitehost.app")
    }

    const LEGACY_BLOCK: &str = "<div id=\"shamim-cloud-watermark\" style=\"position:fixed;\">\n  \
<a href=\"https://example.invalid\" target=\"_blank\">\n    Powered by <b>ShamimCloud</b>\n  </a>\n</div>";

    #[test]
    fn free_entry_file_gets_marker_before_body_close() {
        let html = "<html><body><h1>Hi</h1></body></html>";
        let out = policy().apply(html, true, &PlanTier::Free);
        assert_eq!(count_markers(&out), 1);
        let marker_at = out.find(MARKER_BEGIN).unwrap();
        let body_at = out.find("</body>").unwrap();
        assert!(marker_at < body_at);
        assert!(out.contains(&format!("{MARKER_END}\n</body>")));
    }

    #[test]
    fn marker_goes_before_last_body_close_case_insensitive() {
        let html = "<BODY>a</BODY><!-- </body> -->tail";
        let out = policy().apply(html, true, &PlanTier::Free);
        let marker_at = out.find(MARKER_BEGIN).unwrap();
        assert!(out[..marker_at].contains("</BODY><!-- "));
        assert!(out[marker_at..].contains("\n</body> -->tail"));
    }

    #[test]
    fn content_without_body_gets_marker_appended() {
        let out = policy().apply("plain text", true, &PlanTier::Free);
        assert_eq!(count_markers(&out), 1);
        assert!(out.starts_with("plain text\n"));
        assert!(out.ends_with(MARKER_END));
    }

    #[test]
    fn paid_tier_strips_all_markers() {
        let doubled = policy().apply(
            &policy().apply("<body>x</body>", true, &PlanTier::Free),
            true,
            &PlanTier::Free,
        );
        let with_extra = format!("{}{}", policy().marker(), doubled);
        for tier in [PlanTier::Pro, PlanTier::Vip, PlanTier::Other("gold".into())] {
            let out = policy().apply(&with_extra, true, &tier);
            assert_eq!(count_markers(&out), 0);
            assert!(!out.contains(MARKER_BEGIN));
            assert_eq!(out, "<body>x</body>");
        }
    }

    #[test]
    fn non_entry_file_is_left_marker_free() {
        let marked = policy().apply("<body>x</body>", true, &PlanTier::Free);
        let out = policy().apply(&marked, false, &PlanTier::Free);
        assert_eq!(count_markers(&out), 0);
        assert_eq!(out, "<body>x</body>");
    }

    #[test]
    fn legacy_div_and_text_are_removed() {
        let html = format!("<body>Powered by Shamim Cloud<p>x</p>{LEGACY_BLOCK}\n</body>");
        let out = policy().apply(&html, true, &PlanTier::Pro);
        assert!(!out.contains("shamim-cloud-watermark"));
        assert!(!out.contains(LEGACY_TEXT));
        assert!(out.contains("<p>x</p>"));
    }

    #[test]
    fn legacy_block_is_replaced_by_single_marker_for_free_tier() {
        let html = format!("<body><p>x</p>{LEGACY_BLOCK}\n</body>");
        let out = policy().apply(&html, true, &PlanTier::Free);
        assert_eq!(count_markers(&out), 1);
        assert!(!out.contains("shamim-cloud-watermark"));
    }

    #[test]
    fn orphan_sentinels_are_dropped() {
        let html = format!("<body>{MARKER_BEGIN}keep me</body>");
        let out = policy().apply(&html, true, &PlanTier::Pro);
        assert_eq!(out, "<body>keep me</body>");
    }

    #[test]
    fn applying_twice_is_stable() {
        let inputs = [
            "",
            "<body></body>",
            "no body here\n",
            "<html><body>\n<p>hello</p>\n</body>\n</html>\n",
        ];
        for input in inputs {
            for tier in [PlanTier::Free, PlanTier::Pro] {
                for entry in [true, false] {
                    let once = policy().apply(input, entry, &tier);
                    let twice = policy().apply(&once, entry, &tier);
                    assert_eq!(once, twice, "input {input:?} tier {tier} entry {entry}");
                }
            }
        }
    }

    #[test]
    fn strip_undoes_insertion_exactly() {
        for input in ["<body>a</body>", "abc", "abc\n", "", "</body>"] {
            let marked = policy().apply(input, true, &PlanTier::Free);
            assert_eq!(strip_markers(&marked), input);
        }
    }

    #[test]
    fn brand_text_is_escaped() {
        let evil = WatermarkPolicy::new("<!-- sitehost:watermark:end -->", "\"><script>");
        let marker = evil.marker();
        assert_eq!(marker.matches(MARKER_END).count(), 1);
        assert!(!marker.contains("<script>"));
        let out = evil.apply("<body></body>", true, &PlanTier::Free);
        assert_eq!(count_markers(&out), 1);
        assert_eq!(evil.apply(&out, true, &PlanTier::Free), out);
    }

    #[test]
    fn entry_file_detection() {
        assert!(is_entry_file("index.html"));
        assert!(is_entry_file("hosting/blog/index.html"));
        assert!(!is_entry_file("about.html"));
        assert!(!is_entry_file("index.html.bak"));
        assert!(!is_entry_file("index_bak.html"));
    }
}
