//! Keyword extraction from issue text, used to pick relevant code.

use std::sync::LazyLock;

use regex::Regex;

/// Minimum keyword length in characters.
pub const MIN_KEYWORD_CHARS: usize = 4;

static WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").expect("word regex"));

const STOP_WORDS: &[&str] = &[
    "about", "after", "also", "been", "before", "but", "could", "does", "fails", "following",
    "from", "have", "here", "into", "just", "like", "made", "make", "more", "need", "only",
    "same", "should", "some", "than", "that", "their", "them", "then", "there", "these", "they",
    "this", "trying", "when", "where", "which", "while", "will", "with", "would", "your",
];

/// Distinct lowercase identifiers from `title` then `body`, in first-seen order.
pub fn extract_keywords(title: &str, body: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for text in [title, body] {
        for word in WORD_RE.find_iter(text) {
            let word = word.as_str().to_lowercase();
            if word.chars().count() < MIN_KEYWORD_CHARS
                || STOP_WORDS.contains(&word.as_str())
                || keywords.contains(&word)
            {
                continue;
            }
            keywords.push(word);
        }
    }
    keywords
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_identifiers_from_title_and_body() {
        let keywords = extract_keywords(
            "Fix the authentication bug in login module",
            "When trying to login, I get the following error: \
             `AuthenticationError: Invalid credentials`.\n\n\
             This happens in the `authenticate_user` function.",
        );
        for expected in [
            "authentication",
            "login",
            "module",
            "authenticationerror",
            "invalid",
            "credentials",
            "authenticate_user",
        ] {
            assert!(keywords.iter().any(|k| k == expected), "missing {expected}");
        }
    }

    #[test]
    fn drops_short_and_stop_words() {
        let keywords = extract_keywords("Fix the bug", "This should work when run");
        assert_eq!(keywords, vec!["work"]);
    }

    #[test]
    fn keeps_first_seen_order_without_duplicates() {
        let keywords = extract_keywords("Parser panics", "parser PANICS on empty input");
        assert_eq!(keywords, vec!["parser", "panics", "empty", "input"]);
    }
}
