//! Text normalization for fuzzy comparison
//!
//! All similarity scoring runs on normalized text: accents stripped via NFKD,
//! case folded, punctuation removed, whitespace collapsed. Institution names
//! additionally get locale stopwords and generic institutional tokens
//! stripped so the distinguishing substring carries the comparison.

use lazy_static::lazy_static;
use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    /// Spanish + English function words that carry no signal in
    /// institution names.
    static ref INSTITUTION_STOPWORDS: HashSet<&'static str> = {
        let words = [
            "y", "and", "de", "la", "los", "las", "el", "o", "or", "un", "una",
            "uno", "en", "por", "para", "segun", "a", "ante", "con", "sin",
            "so", "tras", "e", "u", "del", "from", "to", "after", "about",
            "by", "in", "out", "next", "under", "our", "your", "yours",
            "them", "their", "my", "it", "we", "have", "had", "be", "do",
            "are", "him", "her", "hers", "his", "then", "where", "why", "how",
            "what", "which", "who", "whom", "all", "any", "both", "each",
            "few", "at", "this", "these", "those", "that", "if", "as", "with",
            "while", "against", "here", "there", "off", "of", "-",
        ];
        words.iter().copied().collect()
    };

    /// Generic institutional tokens stripped before fuzzy comparison
    /// ("universidad", "instituto", ...). Multi-word phrases first so their
    /// parts are not left behind.
    static ref INSTITUTION_TOKENS: [&'static str; 6] = [
        "institucion universitaria",
        "universidad",
        "corporacion",
        "fundacion",
        "instituto",
        "industrial",
    ];

    /// Short surnames that must not be glued to the following word when
    /// splitting Latin-style full names.
    static ref SHORT_SURNAME_EXCEPTIONS: HashSet<&'static str> = {
        ["gil", "lew", "liz", "paz", "rey", "rio", "roa", "rua", "sus", "zea"]
            .iter()
            .copied()
            .collect()
    };
}

/// Accent-strip, case-fold, drop punctuation, collapse whitespace.
pub fn normalize(input: &str) -> String {
    let filtered: String = input
        .nfkd()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_ascii_whitespace())
        .collect();
    collapse_whitespace(&filtered.to_lowercase())
}

/// Normalize an institution name and strip stopwords and generic
/// institutional tokens, keeping only the distinguishing substring.
pub fn strip_institution_tokens(name: &str) -> String {
    let mut result = normalize(name);
    for token in INSTITUTION_TOKENS.iter() {
        result = result.replace(token, " ");
    }
    let kept: Vec<&str> = result
        .split_whitespace()
        .filter(|w| !INSTITUTION_STOPWORDS.contains(w))
        .collect();
    kept.join(" ")
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A full name decomposed into its parts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedName {
    pub full_name: String,
    pub first_names: Vec<String>,
    pub last_names: Vec<String>,
    pub initials: String,
}

/// Split a surname-first full name into last names, first names and
/// initials.
///
/// Handles the Latin-American convention of two surnames with short
/// connector particles ("DE LA CUESTA BENJUMEA MARIA DEL CARMEN"): words of
/// up to three characters are glued to the word that follows them, unless
/// they are known short surnames. Two-word inputs are assumed foreign with a
/// single surname.
pub fn split_full_name(name: &str) -> ParsedName {
    let plain: Vec<String> = name
        .split_whitespace()
        .map(|w| title_case(w))
        .collect();
    if plain.is_empty() {
        return ParsedName::default();
    }

    // Glue connector particles to the following word.
    let mut compounds: Vec<String> = Vec::new();
    let mut pending = String::new();
    for word in &plain {
        let lowered = normalize(word);
        let is_connector =
            lowered.chars().count() <= 3 && !SHORT_SURNAME_EXCEPTIONS.contains(lowered.as_str());
        if is_connector && compounds.len() < 2 {
            if pending.is_empty() {
                pending = word.clone();
            } else {
                pending = format!("{} {}", pending, word);
            }
            continue;
        }
        if pending.is_empty() {
            compounds.push(word.clone());
        } else {
            compounds.push(format!("{} {}", pending, word));
            pending.clear();
        }
    }
    if !pending.is_empty() {
        compounds.push(pending);
    }

    let (last_names, first_names): (Vec<String>, Vec<String>) = if plain.len() == 2 {
        // Foreign name assumed: single surname, single first name.
        (vec![plain[0].clone()], vec![plain[1].clone()])
    } else if compounds.len() >= 3 {
        (
            compounds[..2].to_vec(),
            compounds[2..]
                .iter()
                .flat_map(|c| c.split_whitespace().map(String::from))
                .collect(),
        )
    } else if compounds.len() == 2 {
        (vec![compounds[0].clone()], vec![compounds[1].clone()])
    } else {
        (compounds.clone(), Vec::new())
    };

    let initials = first_names
        .iter()
        .filter_map(|n| n.chars().next())
        .map(|c| format!("{}.", c))
        .collect::<Vec<_>>()
        .join(" ");
    let full_name = first_names
        .iter()
        .chain(last_names.iter())
        .cloned()
        .collect::<Vec<_>>()
        .join(" ");

    ParsedName {
        full_name,
        first_names,
        last_names,
        initials,
    }
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => {
            first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
        }
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_accents_and_case() {
        assert_eq!(normalize("Superconducción Eléctrica"), "superconduccion electrica");
        assert_eq!(normalize("Naïve  Bayes!"), "naive bayes");
    }

    #[test]
    fn institution_stripping_keeps_distinguishing_tokens() {
        assert_eq!(
            strip_institution_tokens("Universidad Nacional de Colombia"),
            "nacional colombia"
        );
        assert_eq!(
            strip_institution_tokens("Fundación Instituto de Inmunología"),
            "inmunologia"
        );
    }

    #[test]
    fn split_colombian_two_surnames() {
        let parsed = split_full_name("RESTREPO QUINTERO DIEGO ALEJANDRO");
        assert_eq!(parsed.last_names, vec!["Restrepo", "Quintero"]);
        assert_eq!(parsed.first_names, vec!["Diego", "Alejandro"]);
        assert_eq!(parsed.initials, "D. A.");
        assert_eq!(parsed.full_name, "Diego Alejandro Restrepo Quintero");
    }

    #[test]
    fn split_with_connectors() {
        let parsed = split_full_name("DE LA CUESTA BENJUMEA MARIA DEL CARMEN");
        assert_eq!(parsed.last_names, vec!["De La Cuesta", "Benjumea"]);
        assert_eq!(parsed.first_names, vec!["Maria", "Del", "Carmen"]);
    }

    #[test]
    fn split_foreign_two_word_name() {
        let parsed = split_full_name("NARDI ENRICO");
        assert_eq!(parsed.last_names, vec!["Nardi"]);
        assert_eq!(parsed.first_names, vec!["Enrico"]);
    }

    #[test]
    fn short_surname_exceptions_stay_separate() {
        let parsed = split_full_name("RESTREPO ZEA JAIRO HUMBERTO");
        assert_eq!(parsed.last_names, vec!["Restrepo", "Zea"]);
        assert_eq!(parsed.first_names, vec!["Jairo", "Humberto"]);
    }

    #[test]
    fn empty_input() {
        assert_eq!(split_full_name(""), ParsedName::default());
    }
}
