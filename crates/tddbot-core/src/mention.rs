use regex::Regex;
use std::sync::OnceLock;

static MENTION_RE: OnceLock<Regex> = OnceLock::new();

fn mention_re() -> &'static Regex {
    MENTION_RE.get_or_init(|| Regex::new(r"@(\w+)").unwrap())
}

/// Return every `@word` handle in `text`, in order of appearance.
///
/// Duplicates are kept: `"@dev and @dev"` yields two entries.
pub fn find_mentions(text: &str) -> Vec<String> {
    mention_re()
        .captures_iter(text)
        .map(|caps| format!("@{}", &caps[1]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_handles_in_order() {
        assert_eq!(
            find_mentions("@developer please implement, cc @tester"),
            vec!["@developer", "@tester"]
        );
    }

    #[test]
    fn keeps_duplicates() {
        assert_eq!(find_mentions("@dev @qa @dev"), vec!["@dev", "@qa", "@dev"]);
    }

    #[test]
    fn underscores_and_digits_are_part_of_handle() {
        assert_eq!(find_mentions("ping @agent_2!"), vec!["@agent_2"]);
    }

    #[test]
    fn no_mentions() {
        assert!(find_mentions("please implement feature X").is_empty());
        assert!(find_mentions("a lone @ sign").is_empty());
    }
}
