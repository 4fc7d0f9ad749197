//! Fuzzy string scorers on the 0-100 scale
//!
//! The matching thresholds across the suite are calibrated against
//! percentage-style scorers (whole-string ratio, best-window partial ratio,
//! token-sort ratio), so these wrap strsim's normalized Levenshtein behind
//! the same scale.

use strsim::normalized_levenshtein;

/// Whole-string similarity, 0-100.
pub fn ratio(a: &str, b: &str) -> u8 {
    if a.is_empty() && b.is_empty() {
        return 100;
    }
    (normalized_levenshtein(a, b) * 100.0).round() as u8
}

/// Best alignment of the shorter string inside the longer one, 0-100.
///
/// Symmetric by construction: the shorter input always slides over the
/// longer one.
pub fn partial_ratio(a: &str, b: &str) -> u8 {
    let (short, long) = if a.chars().count() <= b.chars().count() {
        (a, b)
    } else {
        (b, a)
    };
    let short_len = short.chars().count();
    if short_len == 0 {
        return if long.is_empty() { 100 } else { 0 };
    }
    let long_chars: Vec<char> = long.chars().collect();
    if long_chars.len() == short_len {
        return ratio(short, long);
    }
    let mut best = 0u8;
    for window in long_chars.windows(short_len) {
        let candidate: String = window.iter().collect();
        let score = ratio(short, &candidate);
        if score > best {
            best = score;
        }
        if best == 100 {
            break;
        }
    }
    best
}

/// Ratio over whitespace-split tokens sorted lexicographically, 0-100.
/// Insensitive to word order ("Doe Jane" vs "Jane Doe").
pub fn token_sort_ratio(a: &str, b: &str) -> u8 {
    ratio(&sort_tokens(a), &sort_tokens(b))
}

fn sort_tokens(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Find the best-scoring choice for a query under the given scorer.
/// Returns the index and score of the winner; `None` on an empty choice
/// list.
pub fn extract_one<'a, I, F>(query: &str, choices: I, scorer: F) -> Option<(usize, u8)>
where
    I: IntoIterator<Item = &'a str>,
    F: Fn(&str, &str) -> u8,
{
    let mut best: Option<(usize, u8)> = None;
    for (i, choice) in choices.into_iter().enumerate() {
        let score = scorer(query, choice);
        if best.map(|(_, s)| score > s).unwrap_or(true) {
            best = Some((i, score));
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_bounds() {
        assert_eq!(ratio("jane doe", "jane doe"), 100);
        assert_eq!(ratio("", ""), 100);
        assert_eq!(ratio("abc", ""), 0);
        assert!(ratio("jane doe", "jane d0e") >= 85);
    }

    #[test]
    fn partial_ratio_finds_substring() {
        assert_eq!(partial_ratio("jane doe", "jane doe and others"), 100);
        assert_eq!(partial_ratio("jane doe and others", "jane doe"), 100);
        assert!(partial_ratio("garcia", "maria garcia lopez") >= 100 - 1);
    }

    #[test]
    fn partial_ratio_is_symmetric() {
        let pairs = [
            ("j doe", "jane doe"),
            ("universidad nacional", "univ nacional de colombia"),
            ("", "x"),
        ];
        for (a, b) in pairs {
            assert_eq!(partial_ratio(a, b), partial_ratio(b, a));
        }
    }

    #[test]
    fn token_sort_ignores_word_order() {
        assert_eq!(token_sort_ratio("doe jane", "jane doe"), 100);
        assert!(token_sort_ratio("jane doe", "john doe") < 100);
    }

    #[test]
    fn extract_one_returns_best_index() {
        let choices = ["jane doe", "john smith", "jana doe"];
        let (idx, score) = extract_one("jane doe", choices, ratio).unwrap();
        assert_eq!(idx, 0);
        assert_eq!(score, 100);
        assert!(extract_one("q", std::iter::empty(), ratio).is_none());
    }
}
