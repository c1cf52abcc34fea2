//! Comparator extraction from market titles.

/// Canonical comparator implied by a title.
///
/// All venue-specific phrasings collapse to this enum; scoring and the rule
/// engines never see the raw alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparator {
    Ge,
    Le,
    Eq,
    Between,
    Unknown,
}

impl Comparator {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ge => "GE",
            Self::Le => "LE",
            Self::Eq => "EQ",
            Self::Between => "BETWEEN",
            Self::Unknown => "UNKNOWN",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GE" => Some(Self::Ge),
            "LE" => Some(Self::Le),
            "EQ" => Some(Self::Eq),
            "BETWEEN" => Some(Self::Between),
            "UNKNOWN" => Some(Self::Unknown),
            _ => None,
        }
    }

    /// Whether two comparators can describe the same market question.
    ///
    /// Only a direct GE-vs-LE conflict is contradictory; UNKNOWN is
    /// compatible with everything because absence of evidence is not a
    /// mismatch.
    #[must_use]
    pub fn compatible_with(&self, other: Comparator) -> bool {
        !matches!(
            (self, other),
            (Self::Ge, Comparator::Le) | (Self::Le, Comparator::Ge)
        )
    }
}

impl std::fmt::Display for Comparator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alias table, checked in order. BETWEEN wins over GE/LE because range
/// titles ("between $99k and $101k") usually also contain a bare "and".
const GE_ALIASES: &[&str] = &["above", "over", "at least", "or higher", ">=", "≥"];
const LE_ALIASES: &[&str] = &["below", "under", "at most", "or lower", "<=", "≤"];
const BETWEEN_ALIASES: &[&str] = &["between", "range", "in the range"];
const EQ_ALIASES: &[&str] = &["exactly", "equal to", "precisely"];

/// Extract the canonical comparator from a title.
#[must_use]
pub fn extract_comparator(title: &str) -> Comparator {
    let lower = title.to_lowercase();

    if BETWEEN_ALIASES.iter().any(|a| lower.contains(a)) {
        return Comparator::Between;
    }

    // Earliest alias in the title wins among GE/LE/EQ so that titles like
    // "above $5k or lower than $1k" keep their leading sense.
    let candidates = [
        (Comparator::Ge, GE_ALIASES),
        (Comparator::Le, LE_ALIASES),
        (Comparator::Eq, EQ_ALIASES),
    ];

    let mut best: Option<(usize, Comparator)> = None;
    for (comparator, aliases) in candidates {
        for alias in aliases {
            if let Some(pos) = lower.find(alias) {
                if best.map_or(true, |(best_pos, _)| pos < best_pos) {
                    best = Some((pos, comparator));
                }
            }
        }
    }

    best.map_or(Comparator::Unknown, |(_, c)| c)
}
