//! Researcher-profile URL parsing
//!
//! Staff rosters and CV dumps report a mixed bag of profile links (ORCID,
//! Google Scholar, ResearchGate, LinkedIn, Scopus) in a single column. These
//! helpers classify each URL and pull out the stable id.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::normalize::normalize_orcid;

/// Recognized profile namespaces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileKind {
    Orcid,
    Scholar,
    ResearchGate,
    LinkedIn,
    Scopus,
}

impl ProfileKind {
    /// The namespace string used in `external_ids.source`.
    pub fn as_source(&self) -> &'static str {
        match self {
            ProfileKind::Orcid => "orcid",
            ProfileKind::Scholar => "scholar",
            ProfileKind::ResearchGate => "researchgate",
            ProfileKind::LinkedIn => "linkedin",
            ProfileKind::Scopus => "scopus",
        }
    }
}

lazy_static! {
    // Scholar ids are exactly 12 characters in the user= parameter
    static ref SCHOLAR_REGEX: Regex = Regex::new(r"user=([^&]{1,12})").unwrap();
    static ref RESEARCHGATE_REGEX: Regex =
        Regex::new(r"researchgate\.net/profile/([^\s/?&]+)").unwrap();
    static ref LINKEDIN_REGEX: Regex =
        Regex::new(r"linkedin\.com/in/([^/?&]+)").unwrap();
    static ref SCOPUS_REGEX: Regex =
        Regex::new(r"(?:authorId=|authorID=)(\d{10,11})").unwrap();
}

/// Decide which namespace a profile URL belongs to.
pub fn classify_profile_url(url: &str) -> Option<ProfileKind> {
    let url = url.to_lowercase();
    if url.contains("orcid") {
        Some(ProfileKind::Orcid)
    } else if url.contains("scholar.google") {
        Some(ProfileKind::Scholar)
    } else if url.contains("researchgate") {
        Some(ProfileKind::ResearchGate)
    } else if url.contains("linkedin") {
        Some(ProfileKind::LinkedIn)
    } else if url.contains("scopus") {
        Some(ProfileKind::Scopus)
    } else {
        None
    }
}

/// Extract the stable id from a profile URL, returning the namespace it
/// belongs to. Malformed or truncated ids yield `None`.
pub fn parse_profile_id(url: &str) -> Option<(ProfileKind, String)> {
    let cleaned = url.replace(' ', "");
    let kind = classify_profile_url(&cleaned)?;
    let id = match kind {
        ProfileKind::Orcid => normalize_orcid(&cleaned)?,
        ProfileKind::Scholar => {
            let without_authuser = cleaned.replace("authuser", "");
            let m = SCHOLAR_REGEX
                .captures_iter(&without_authuser)
                .last()?
                .get(1)?
                .as_str()
                .to_string();
            if m.len() != 12 {
                return None;
            }
            m
        }
        ProfileKind::ResearchGate => RESEARCHGATE_REGEX
            .captures(&cleaned)?
            .get(1)?
            .as_str()
            .to_string(),
        ProfileKind::LinkedIn => LINKEDIN_REGEX
            .captures(&cleaned)?
            .get(1)?
            .as_str()
            .to_string(),
        ProfileKind::Scopus => SCOPUS_REGEX
            .captures(&cleaned)?
            .get(1)?
            .as_str()
            .to_string(),
    };
    Some((kind, id))
}
