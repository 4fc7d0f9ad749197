//! Canonical entity models shared across the canonica harmonization suite
//!
//! This crate provides the merged ("canonical") document shapes that every
//! provider record is normalized into:
//! - Work: a publication with titles, identifiers, authors and venue
//! - Person: a researcher with names, identifiers and affiliations
//! - Affiliation: an institution, faculty, department or group
//! - Source: a journal or venue with ranking windows
//!
//! All core fields are always present with defaults; optionality is explicit.
//! Every entity has a factory constructor so there is a single definition of
//! the "empty" document shape.

pub mod affiliation;
pub mod common;
pub mod person;
pub mod source;
pub mod work;

pub use affiliation::*;
pub use common::*;
pub use person::*;
pub use source::*;
pub use work::*;
