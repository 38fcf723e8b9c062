//! Issue reference extraction from free text.
//!
//! Two families are recognised, in strict priority order:
//!
//! 1. A full Linear link, `https://linear.app/<workspace>/issue/<ID>`, with or
//!    without the scheme. The host must be exactly `linear.app`.
//! 2. A bare identifier such as `ABC-123`, matched as a whole word and skipped
//!    when it only appears as a path segment of some other URL.

use std::sync::OnceLock;

use regex::Regex;

/// Window (in characters) inspected before and after a bare identifier when
/// deciding whether it is embedded in a URL.
const CONTEXT_BEFORE: usize = 100;
const CONTEXT_AFTER: usize = 50;

/// An issue reference found in text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueReference {
    pub issue_id: String,
    /// Present only when a full link was found.
    pub url: Option<String>,
}

fn https_link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"https://linear\.app/[\w-]+/issue/([\w-]+)").expect("valid regex")
    })
}

fn bare_link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"linear\.app/[\w-]+/issue/([\w-]+)").expect("valid regex"))
}

fn short_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b([A-Za-z][A-Za-z0-9]*-\d+)\b").expect("valid regex"))
}

fn issue_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Z][A-Z0-9]*-[1-9][0-9]*$").expect("valid regex"))
}

/// Extract the first issue reference from `text`.
///
/// Full links win over bare identifiers regardless of position.
pub fn extract_reference(text: &str) -> Option<IssueReference> {
    if let Some(caps) = https_link_re().captures(text) {
        return Some(IssueReference {
            issue_id: caps[1].to_string(),
            url: Some(caps[0].to_string()),
        });
    }

    for caps in bare_link_re().captures_iter(text) {
        let whole = caps.get(0).expect("group 0 always present");
        if !is_host_boundary(text, whole.start()) {
            continue;
        }
        return Some(IssueReference {
            issue_id: caps[1].to_string(),
            url: Some(format!("https://{}", whole.as_str())),
        });
    }

    for m in short_id_re().find_iter(text) {
        if is_embedded_in_url(text, m.start(), m.end(), m.as_str()) {
            continue;
        }
        return Some(IssueReference {
            issue_id: m.as_str().to_string(),
            url: None,
        });
    }

    None
}

/// True when `id` has the canonical Linear shape (`ABC-123`).
///
/// This is a standalone format check; [`extract_reference`] does not apply it.
pub fn validate_issue_id(id: &str) -> bool {
    issue_id_re().is_match(id)
}

/// The host starts a new token: `notlinear.app` or `www.linear.app` do not count.
fn is_host_boundary(text: &str, start: usize) -> bool {
    match text[..start].chars().next_back() {
        None => true,
        Some(c) => !(c.is_alphanumeric() || c == '_' || c == '.' || c == '-'),
    }
}

fn is_embedded_in_url(text: &str, start: usize, end: usize, issue_id: &str) -> bool {
    let window_start = text[..start]
        .char_indices()
        .rev()
        .nth(CONTEXT_BEFORE - 1)
        .map(|(i, _)| i)
        .unwrap_or(0);
    let window_end = text[end..]
        .char_indices()
        .nth(CONTEXT_AFTER)
        .map(|(i, _)| end + i)
        .unwrap_or(text.len());
    let context = &text[window_start..window_end];

    let pattern = format!(r"https?://\S+/\S*?{}\S*", regex::escape(issue_id));
    match Regex::new(&pattern) {
        Ok(re) => re.is_match(context),
        Err(_) => false,
    }
}
