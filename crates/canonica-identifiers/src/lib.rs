//! Identifier parsing and validation for the canonica suite
//!
//! Providers report identifiers in wildly inconsistent shapes: DOIs with or
//! without resolver prefixes, ORCIDs embedded in profile URLs, Google Scholar
//! ids buried in query strings. This crate turns all of those into the
//! canonical `(namespace, value)` form used for exact-id lookup, and rejects
//! values that fail the namespace's checksum where one exists.

pub mod normalize;
pub mod profiles;
pub mod validate;

pub use normalize::{normalize_doi, normalize_isbn_like, normalize_issn, normalize_orcid};
pub use profiles::{classify_profile_url, parse_profile_id, ProfileKind};
pub use validate::{is_valid_issn, is_valid_orcid};
