//! Text analysis for the in-memory store.
//!
//! Produces the same token streams the index-side analyzers declared in
//! [`crate::schema::analysis_settings`] produce.

use crate::schema::Analyzer;

const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is",
    "it", "no", "not", "of", "on", "or", "such", "that", "the", "their", "then", "there",
    "these", "they", "this", "to", "was", "will", "with",
];

/// Token stream of `text` under `analyzer`. Positions are the vector
/// indices.
pub fn analyze(analyzer: Analyzer, text: &str) -> Vec<String> {
    match analyzer {
        Analyzer::LowercaseKeyword => vec![text.to_lowercase()],
        Analyzer::Standard => words(text).map(str::to_lowercase).collect(),
        Analyzer::English => words(text)
            .map(|w| strip_possessive(w).to_lowercase())
            .filter(|w| !ENGLISH_STOP_WORDS.contains(&w.as_str()))
            .collect(),
        Analyzer::Trigram => text
            .split(|c: char| !c.is_alphanumeric())
            .flat_map(trigrams)
            .collect(),
    }
}

fn is_apostrophe(c: char) -> bool {
    c == '\'' || c == '’'
}

/// Word tokens; apostrophes stay inside words ("company's").
fn words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !(c.is_alphanumeric() || is_apostrophe(c)))
        .map(|w| w.trim_matches(is_apostrophe))
        .filter(|w| !w.is_empty())
}

fn strip_possessive(word: &str) -> &str {
    word.strip_suffix("'s")
        .or_else(|| word.strip_suffix("’s"))
        .unwrap_or(word)
}

/// 3-grams of a word, lowercased. Shorter words produce none.
fn trigrams(word: &str) -> Vec<String> {
    let chars: Vec<char> = word.to_lowercase().chars().collect();
    if chars.len() < 3 {
        return Vec::new();
    }
    chars.windows(3).map(|w| w.iter().collect()).collect()
}

/// Whether `needle` occurs as a contiguous run in `haystack`.
pub fn contains_sequence(haystack: &[String], needle: &[String]) -> bool {
    if needle.is_empty() {
        return false;
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// Phrase-prefix: all but the last token form a phrase that must be
/// followed by a token starting with the last one.
pub fn matches_phrase_prefix(haystack: &[String], needle: &[String]) -> bool {
    let Some((last, head)) = needle.split_last() else {
        return false;
    };
    if haystack.len() < needle.len() {
        return false;
    }
    haystack.windows(needle.len()).any(|w| {
        w[..head.len()] == *head && w[head.len()].starts_with(last.as_str())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercase_keyword_is_single_token() {
        assert_eq!(analyze(Analyzer::LowercaseKeyword, "Abc DEFG"), vec!["abc defg"]);
    }

    #[test]
    fn test_standard_splits_and_lowercases() {
        assert_eq!(analyze(Analyzer::Standard, "Acme-Trading Ltd."), vec!["acme", "trading", "ltd"]);
    }

    #[test]
    fn test_english_drops_stop_words_and_possessives() {
        assert_eq!(analyze(Analyzer::English, "The company's export of goods"), vec!["company", "export", "goods"]);
    }

    #[test]
    fn test_trigrams() {
        assert_eq!(analyze(Analyzer::Trigram, "Abcd"), vec!["abc", "bcd"]);
        assert_eq!(analyze(Analyzer::Trigram, "wh"), Vec::<String>::new());
        assert_eq!(analyze(Analyzer::Trigram, "ab cde"), vec!["cde"]);
    }

    #[test]
    fn test_sequences() {
        let hay: Vec<String> = ["abc", "def", "efg", "ltd"].iter().map(|s| s.to_string()).collect();
        let phrase: Vec<String> = ["def", "efg"].iter().map(|s| s.to_string()).collect();
        let gap: Vec<String> = ["abc", "efg"].iter().map(|s| s.to_string()).collect();
        assert!(contains_sequence(&hay, &phrase));
        assert!(!contains_sequence(&hay, &gap));
        assert!(!contains_sequence(&hay, &[]));
    }

    #[test]
    fn test_phrase_prefix() {
        let hay = vec!["abc defg ltd".to_string()];
        assert!(matches_phrase_prefix(&hay, &["abc".to_string()]));
        assert!(matches_phrase_prefix(&hay, &["abc defg ltd".to_string()]));
        assert!(!matches_phrase_prefix(&hay, &["help qrs".to_string()]));
        assert!(!matches_phrase_prefix(&hay, &[]));
    }
}
