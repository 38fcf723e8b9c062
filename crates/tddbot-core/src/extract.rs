use indexmap::IndexMap;
use regex::Regex;
use std::sync::OnceLock;

/// Files proposed by a generation response, keyed by relative path in the
/// order they first appeared.
pub type GeneratedFileSet = IndexMap<String, String>;

static FILE_BLOCK_RE: OnceLock<Regex> = OnceLock::new();

fn file_block_re() -> &'static Regex {
    FILE_BLOCK_RE.get_or_init(|| {
        Regex::new(r"(?s)### File: ([^\n]+)\n```(?:\w+)?\n(.*?)\n```").unwrap()
    })
}

/// Pull `### File: <path>` fenced blocks out of a response.
///
/// Paths and bodies are trimmed. A path that appears twice keeps its first
/// position with the last body. Blocks without a closing fence are ignored.
pub fn extract(response: &str) -> GeneratedFileSet {
    let mut files = GeneratedFileSet::new();
    for caps in file_block_re().captures_iter(response) {
        let path = caps[1].trim().to_string();
        let body = caps[2].trim().to_string();
        tracing::info!(path = %path, "extracted code block");
        files.insert(path, body);
    }
    files
}
