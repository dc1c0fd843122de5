//! Canonical sales locations (the `department` dimension).
//!
//! Upstream systems spell the same location several ways: the display name
//! ("Авиагородок"), legacy branch codes ("Филиал 1"), or either of those with
//! extra decoration. [`Location::canonicalize`] folds every known variant onto
//! one enumeration value so that rows from different sources merge onto the
//! same conflict key.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lower-cased substrings that identify each known location, checked in order.
///
/// Домодедово is checked first so that a name mentioning both (seen in some
/// historical exports) resolves the same way every time.
const ALIASES: &[(&str, Location)] = &[
    ("домодедово", Location::Domodedovo),
    ("филиал 2", Location::Domodedovo),
    ("авиагородок", Location::Aviagorodok),
    ("филиал 1", Location::Aviagorodok),
];

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Location {
    Aviagorodok,
    Domodedovo,
    /// A non-empty name that matched no known alias. Passed through verbatim
    /// (trimmed) so that the data is kept, but callers should surface it.
    Unknown(String),
}

impl Location {
    /// Maps a free-text location name onto the canonical enumeration.
    ///
    /// Returns `None` for blank input: a missing location makes a record
    /// unmergeable.
    #[must_use]
    pub fn canonicalize(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        let lower = trimmed.to_lowercase();
        let known = ALIASES
            .iter()
            .find(|(needle, _)| lower.contains(needle))
            .map(|(_, loc)| loc.clone());
        Some(known.unwrap_or_else(|| Location::Unknown(trimmed.to_string())))
    }

    /// The value stored in the `department` column.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Location::Aviagorodok => "Авиагородок",
            Location::Domodedovo => "Домодедово",
            Location::Unknown(name) => name,
        }
    }

    #[must_use]
    pub fn is_known(&self) -> bool {
        !matches!(self, Location::Unknown(_))
    }

    /// Display names of every known location, used for include-list filters.
    #[must_use]
    pub fn known_names() -> Vec<String> {
        [Location::Aviagorodok, Location::Domodedovo]
            .iter()
            .map(|l| l.as_str().to_string())
            .collect()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_map_to_themselves() {
        assert_eq!(
            Location::canonicalize("Авиагородок"),
            Some(Location::Aviagorodok)
        );
        assert_eq!(
            Location::canonicalize("Домодедово"),
            Some(Location::Domodedovo)
        );
    }

    #[test]
    fn branch_codes_are_historical_aliases() {
        assert_eq!(
            Location::canonicalize("Филиал 1"),
            Some(Location::Aviagorodok)
        );
        assert_eq!(
            Location::canonicalize("  филиал 2 "),
            Some(Location::Domodedovo)
        );
    }

    #[test]
    fn substring_match_is_case_insensitive() {
        assert_eq!(
            Location::canonicalize("ДОСТАВКА АВИАГОРОДОК (кухня)"),
            Some(Location::Aviagorodok)
        );
    }

    #[test]
    fn unmatched_name_passes_through_trimmed() {
        let loc = Location::canonicalize("  Новая точка ").unwrap();
        assert_eq!(loc, Location::Unknown("Новая точка".to_string()));
        assert_eq!(loc.as_str(), "Новая точка");
        assert!(!loc.is_known());
    }

    #[test]
    fn blank_name_is_missing() {
        assert_eq!(Location::canonicalize(""), None);
        assert_eq!(Location::canonicalize("   "), None);
    }

    #[test]
    fn known_names_are_display_names() {
        assert_eq!(Location::known_names(), vec!["Авиагородок", "Домодедово"]);
    }
}
