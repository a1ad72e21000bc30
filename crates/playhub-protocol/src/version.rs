//! Dotted-numeric game versions.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A version like `1.10.0`, compared component by component as numbers
/// (`1.2.0 < 1.10.0`). Missing trailing components count as zero, so
/// `1.0` and `1.0.0` are the same version.
#[derive(Debug, Clone)]
pub struct GameVersion {
    parts: Vec<u64>,
    raw: String,
}

/// Returned when a version string is not dot-separated digits.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed version {0:?}")]
pub struct ParseVersionError(pub String);

impl GameVersion {
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether two version strings name the same build. Text that does not
    /// parse only matches itself, ignoring surrounding whitespace.
    pub fn same(a: &str, b: &str) -> bool {
        match (a.parse::<Self>(), b.parse::<Self>()) {
            (Ok(a), Ok(b)) => a == b,
            _ => a.trim() == b.trim(),
        }
    }

    fn part(&self, i: usize) -> u64 {
        self.parts.get(i).copied().unwrap_or(0)
    }
}

impl FromStr for GameVersion {
    type Err = ParseVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let parts = raw
            .split('.')
            .map(|p| {
                if p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                p.parse::<u64>().ok()
            })
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| ParseVersionError(s.to_string()))?;
        Ok(Self {
            parts,
            raw: raw.to_string(),
        })
    }
}

impl Ord for GameVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.parts.len().max(other.parts.len());
        (0..len)
            .map(|i| self.part(i).cmp(&other.part(i)))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for GameVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for GameVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for GameVersion {}

impl fmt::Display for GameVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> GameVersion {
        s.parse().unwrap()
    }

    #[test]
    fn test_cmp_numeric_not_lexicographic() {
        assert!(v("1.2.0") < v("1.10.0"));
        assert!(v("2.0.0") > v("1.99.99"));
    }

    #[test]
    fn test_cmp_missing_components_are_zero() {
        assert_eq!(v("1.0"), v("1.0.0"));
        assert!(v("1.0.1") > v("1.0"));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["", "1..0", "1.a.0", "v1.0.0", "1.0.", "-1.0", "1.+2"] {
            assert!(bad.parse::<GameVersion>().is_err(), "{bad:?}");
        }
    }

    #[test]
    fn test_same_numeric_equality() {
        assert!(GameVersion::same("1.0", "1.0.0"));
        assert!(GameVersion::same(" 1.0.0", "1.0.0"));
        assert!(!GameVersion::same("1.1.0", "1.0.0"));
    }

    #[test]
    fn test_same_unparsable_falls_back_to_text() {
        assert!(GameVersion::same("beta", "beta"));
        assert!(!GameVersion::same("beta", "1.0.0"));
    }

    #[test]
    fn test_display_keeps_original_text() {
        assert_eq!(v(" 1.02.3 ").to_string(), "1.02.3");
    }
}
