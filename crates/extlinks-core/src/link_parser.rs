
use crate::document::{DocumentRef, Link};
use regex::Regex;
use std::sync::LazyLock;

/// http(s) URL: optional `www.`, a host with at least one dot, then an optional
/// path/query/fragment tail. The boundary after the TLD is ASCII-only, so a
/// URL running straight into non-ASCII prose still ends at the TLD.
const WEB_URL: &str = r"https?://(?:www\.)?[-a-zA-Z0-9@:%._+~#=]{1,256}\.[a-zA-Z0-9()]{1,6}(?-u:\b)[-a-zA-Z0-9()@:%_+.~#?&/=]*";

static MARKDOWN_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\[([^\[]*)\]\(({WEB_URL})\)")).unwrap()
});

static ORPHANED_LINK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(WEB_URL).unwrap());

// Optional drive (`C:/`, `/C:/`) or root, then at least one non-separator path
// character. Dotted extensions are part of the segment run.
static FILE_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(\()?(file://(?:/?[A-Za-z]:[/\\]|/)?[^\s<>:"|?*/\\][^\s<>:"|?*]*)"#).unwrap()
});

/// Which pattern class produced an occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkKind {
    /// `[label](https://...)`
    Markdown,
    /// A bare http(s) URL outside markdown link syntax
    Orphaned,
    /// `file://...`, optionally wrapped in parentheses
    File,
}

/// A link occurrence with the byte span of the whole match.
///
/// For file links the span includes the wrapping parentheses even though
/// `url` does not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkOccurrence {
    pub kind: LinkKind,
    pub display_text: String,
    pub url: String,
    /// Byte offset of the match in the scanned content
    pub start: usize,
    /// Byte length of the match
    pub len: usize,
}

/// Scan `content` for external links owned by `document`.
///
/// Markdown links come first, then orphaned links, then file links, each in
/// document order. Duplicates are kept.
pub fn scan(content: &str, document: &DocumentRef) -> Vec<Link> {
    scan_occurrences(content)
        .into_iter()
        .map(|occ| Link {
            display_text: occ.display_text,
            url: occ.url,
            document: document.clone(),
        })
        .collect()
}

/// Like `scan()`, but keeps the pattern class and byte span of every match.
pub fn scan_occurrences(content: &str) -> Vec<LinkOccurrence> {
    let mut occurrences = extract_markdown_links(content);
    occurrences.extend(extract_orphaned_links(content));
    occurrences.extend(extract_file_links(content));
    occurrences
}

/// `[label](url)` with an http(s) target.
pub fn extract_markdown_links(content: &str) -> Vec<LinkOccurrence> {
    MARKDOWN_LINK_RE
        .captures_iter(content)
        .filter_map(|cap| {
            let full = cap.get(0)?;
            let url = cap.get(2)?.as_str();
            let label = cap.get(1).map(|m| m.as_str()).unwrap_or_default();
            Some(LinkOccurrence {
                kind: LinkKind::Markdown,
                display_text: label.to_string(),
                url: url.to_string(),
                start: full.start(),
                len: full.len(),
            })
        })
        .collect()
}

/// Bare http(s) URLs, skipping any that sit directly after `](` since those are
/// markdown link targets.
pub fn extract_orphaned_links(content: &str) -> Vec<LinkOccurrence> {
    ORPHANED_LINK_RE
        .find_iter(content)
        .filter(|m| !content[..m.start()].ends_with("]("))
        .map(|m| LinkOccurrence {
            kind: LinkKind::Orphaned,
            display_text: m.as_str().to_string(),
            url: m.as_str().to_string(),
            start: m.start(),
            len: m.len(),
        })
        .collect()
}

/// `file://` URLs. When the match opens with `(`, the URL ends at the first
/// unbalanced `)`; that paren closes the wrapper and is left out of the URL.
pub fn extract_file_links(content: &str) -> Vec<LinkOccurrence> {
    let mut occurrences = Vec::new();
    let mut pos = 0;
    while let Some(cap) = FILE_LINK_RE.captures_at(content, pos) {
        let (Some(full), Some(path)) = (cap.get(0), cap.get(2)) else {
            break;
        };
        let mut url = path.as_str();
        let mut end = full.end();
        if cap.get(1).is_some() {
            if let Some(close) = unbalanced_close(url) {
                url = &url[..close];
                end = path.start() + close + 1;
            }
        }
        // resume after the wrapper so text following it is scanned again
        pos = end;
        // "(file://)" leaves only the scheme after stripping
        if url.len() <= "file://".len() {
            continue;
        }
        occurrences.push(LinkOccurrence {
            kind: LinkKind::File,
            display_text: url.to_string(),
            url: url.to_string(),
            start: full.start(),
            len: end - full.start(),
        });
    }
    occurrences
}

/// Byte offset of the first `)` with no matching `(` before it.
fn unbalanced_close(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' if depth == 0 => return Some(i),
            ')' => depth -= 1,
            _ => {}
        }
    }
    None
}
