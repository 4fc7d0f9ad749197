//! Canonical forms for identifier values

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // DOIs start with 10. followed by registrant code and suffix
    static ref DOI_REGEX: Regex = Regex::new(
        r#"(?i)(?:doi[:\s]*)?(?:https?://(?:dx\.)?doi\.org/)?(?P<doi>10\.\d{4,}/[^\s\]}>"',;]+)"#
    )
    .unwrap();

    static ref ORCID_REGEX: Regex = Regex::new(
        r"(?i)(?:ORCID\s?)?([0-9]{4})-?([0-9]{4})-?([0-9]{4})-?([0-9]{3}[0-9Xx])"
    )
    .unwrap();

    static ref ISSN_REGEX: Regex =
        Regex::new(r"(?i)(\d{4})-?(\d{3}[\dXx])").unwrap();
}

/// Extract and lower-case a DOI from free-form input (bare, `doi:`-prefixed,
/// or a resolver URL). Returns `None` when nothing DOI-shaped is present.
pub fn normalize_doi(value: &str) -> Option<String> {
    DOI_REGEX
        .captures(value.trim())
        .and_then(|cap| cap.name("doi"))
        .map(|m| m.as_str().trim_end_matches(['.', ',']).to_lowercase())
}

/// Extract an ORCID in the dashed 16-character form from a bare value or a
/// profile URL. Does not verify the checksum; see [`crate::is_valid_orcid`].
pub fn normalize_orcid(value: &str) -> Option<String> {
    ORCID_REGEX.captures(value.trim()).map(|cap| {
        format!(
            "{}-{}-{}-{}",
            &cap[1],
            &cap[2],
            &cap[3],
            cap[4].to_uppercase()
        )
    })
}

/// Canonical dashed upper-case ISSN form.
pub fn normalize_issn(value: &str) -> Option<String> {
    ISSN_REGEX
        .captures(value.trim())
        .map(|cap| format!("{}-{}", &cap[1], cap[2].to_uppercase()))
}

/// Strip separators from ISBN-like provider codes (NIT, scienti codes);
/// keeps only alphanumerics.
pub fn normalize_isbn_like(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_uppercase()
}
