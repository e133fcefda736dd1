//! crates/trashtalk_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or transport format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The closed set of comedic tone presets a caller may request.
///
/// Anything outside this set is rejected at the API boundary before it
/// reaches the generation gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tone {
    GenZ,
    TechBro,
    Corporate,
    Absurdist,
    Anime,
}

impl Tone {
    /// Parses a wire-format tone string (e.g. "gen-z", "tech-bro").
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "gen-z" => Some(Self::GenZ),
            "tech-bro" => Some(Self::TechBro),
            "corporate" => Some(Self::Corporate),
            "absurdist" => Some(Self::Absurdist),
            "anime" => Some(Self::Anime),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GenZ => "gen-z",
            Self::TechBro => "tech-bro",
            Self::Corporate => "corporate",
            Self::Absurdist => "absurdist",
            Self::Anime => "anime",
        }
    }
}

/// One generated post, plus whether it came from the canned fallback set
/// instead of the upstream model.
#[derive(Debug, Clone)]
pub struct GeneratedPost {
    pub text: String,
    pub fallback_used: bool,
    /// Human-readable note for the UI when `fallback_used` is true.
    pub fallback_message: Option<String>,
}

/// A point-in-time view of the shared global counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterObservation {
    pub value: i64,
    pub updated_at: DateTime<Utc>,
}

/// The result of tracking one visit for an identity.
#[derive(Debug, Clone, Copy)]
pub struct VisitorVisit {
    /// True exactly once per user id, on its first tracked visit ever.
    pub is_new_visitor: bool,
    pub user_visit_count: i64,
    pub total_unique_visitors: i64,
}
