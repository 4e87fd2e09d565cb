//! Constraining facet tables
//!
//! A simple type carries one slot per single-valued facet kind plus the
//! multi-valued pattern and enumeration lists, with a parallel "fixed"
//! bitset. Derivation value-copies the base table so a derived type sees a
//! snapshot of inherited facets it can locally override.

use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::fmt;

/// White space handling modes, ordered from loosest to tightest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WhiteSpaceRule {
    /// Preserve all white space
    Preserve,
    /// Replace tabs and newlines with spaces
    Replace,
    /// Replace and collapse multiple spaces
    Collapse,
}

impl WhiteSpaceRule {
    /// Parse from the lexical facet value
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "preserve" => Some(WhiteSpaceRule::Preserve),
            "replace" => Some(WhiteSpaceRule::Replace),
            "collapse" => Some(WhiteSpaceRule::Collapse),
            _ => None,
        }
    }

    /// Get the rule as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            WhiteSpaceRule::Preserve => "preserve",
            WhiteSpaceRule::Replace => "replace",
            WhiteSpaceRule::Collapse => "collapse",
        }
    }
}

impl fmt::Display for WhiteSpaceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// All facet kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FacetKind {
    /// Exact length
    Length,
    /// Minimum length
    MinLength,
    /// Maximum length
    MaxLength,
    /// Maximum total number of digits
    TotalDigits,
    /// Maximum number of fractional digits
    FractionDigits,
    /// White space handling
    WhiteSpace,
    /// Upper bound, inclusive
    MaxInclusive,
    /// Upper bound, exclusive
    MaxExclusive,
    /// Lower bound, inclusive
    MinInclusive,
    /// Lower bound, exclusive
    MinExclusive,
    /// Regular expression pattern (multi-valued)
    Pattern,
    /// Enumerated value set (multi-valued)
    Enumeration,
}

/// Number of single-valued facet kinds (the slot count of a facet table)
pub const SINGLE_VALUED_FACETS: usize = 10;

impl FacetKind {
    /// All single-valued kinds, in slot order
    pub const SINGLE_VALUED: [FacetKind; SINGLE_VALUED_FACETS] = [
        FacetKind::Length,
        FacetKind::MinLength,
        FacetKind::MaxLength,
        FacetKind::TotalDigits,
        FacetKind::FractionDigits,
        FacetKind::WhiteSpace,
        FacetKind::MaxInclusive,
        FacetKind::MaxExclusive,
        FacetKind::MinInclusive,
        FacetKind::MinExclusive,
    ];

    /// Slot index for single-valued kinds
    pub fn slot(&self) -> Option<usize> {
        Self::SINGLE_VALUED.iter().position(|k| k == self)
    }

    /// Whether this kind appends rather than replaces on restriction
    pub fn is_multi_valued(&self) -> bool {
        matches!(self, FacetKind::Pattern | FacetKind::Enumeration)
    }

    /// Whether this kind is one of the four value-range bounds
    pub fn is_bound(&self) -> bool {
        matches!(
            self,
            FacetKind::MaxInclusive
                | FacetKind::MaxExclusive
                | FacetKind::MinInclusive
                | FacetKind::MinExclusive
        )
    }

    /// The facet name as it appears in schema documents
    pub fn as_str(&self) -> &'static str {
        match self {
            FacetKind::Length => "length",
            FacetKind::MinLength => "minLength",
            FacetKind::MaxLength => "maxLength",
            FacetKind::TotalDigits => "totalDigits",
            FacetKind::FractionDigits => "fractionDigits",
            FacetKind::WhiteSpace => "whiteSpace",
            FacetKind::MaxInclusive => "maxInclusive",
            FacetKind::MaxExclusive => "maxExclusive",
            FacetKind::MinInclusive => "minInclusive",
            FacetKind::MinExclusive => "minExclusive",
            FacetKind::Pattern => "pattern",
            FacetKind::Enumeration => "enumeration",
        }
    }
}

impl fmt::Display for FacetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A facet value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FacetValue {
    /// Non-negative count (length and digit facets)
    Count(u64),
    /// Decimal number (bounds on decimal-kinded types)
    Number(Decimal),
    /// Lexical value kept verbatim (bounds on dates, durations and such)
    Lexical(String),
    /// White space rule
    WhiteSpace(WhiteSpaceRule),
}

impl FacetValue {
    /// Compare two values of the same shape; None when not comparable
    pub fn compare(&self, other: &FacetValue) -> Option<Ordering> {
        match (self, other) {
            (FacetValue::Count(a), FacetValue::Count(b)) => Some(a.cmp(b)),
            (FacetValue::Number(a), FacetValue::Number(b)) => Some(a.cmp(b)),
            (FacetValue::WhiteSpace(a), FacetValue::WhiteSpace(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// The decimal value, if this is a number
    pub fn as_number(&self) -> Option<Decimal> {
        match self {
            FacetValue::Number(d) => Some(*d),
            _ => None,
        }
    }

    /// The count value, if this is a count
    pub fn as_count(&self) -> Option<u64> {
        match self {
            FacetValue::Count(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for FacetValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FacetValue::Count(n) => write!(f, "{}", n),
            FacetValue::Number(d) => write!(f, "{}", d),
            FacetValue::Lexical(s) => write!(f, "{}", s),
            FacetValue::WhiteSpace(w) => write!(f, "{}", w),
        }
    }
}

/// Facet table: one slot per single-valued facet kind, a parallel fixed
/// bitset, and the appending pattern/enumeration lists
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FacetTable {
    slots: [Option<FacetValue>; SINGLE_VALUED_FACETS],
    fixed: u16,
    /// Pattern facet values
    pub patterns: Vec<String>,
    /// Enumeration facet values
    pub enumerations: Vec<String>,
}

impl FacetTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// The value in a single-valued slot
    pub fn get(&self, kind: FacetKind) -> Option<&FacetValue> {
        kind.slot().and_then(|i| self.slots[i].as_ref())
    }

    /// Set a single-valued slot
    pub fn set(&mut self, kind: FacetKind, value: FacetValue, fixed: bool) {
        if let Some(i) = kind.slot() {
            self.slots[i] = Some(value);
            if fixed {
                self.fixed |= 1 << i;
            } else {
                self.fixed &= !(1 << i);
            }
        }
    }

    /// Clear a single-valued slot
    pub fn clear(&mut self, kind: FacetKind) {
        if let Some(i) = kind.slot() {
            self.slots[i] = None;
            self.fixed &= !(1 << i);
        }
    }

    /// Whether the slot is marked fixed
    pub fn is_fixed(&self, kind: FacetKind) -> bool {
        kind.slot().map(|i| self.fixed & (1 << i) != 0).unwrap_or(false)
    }

    /// Iterate over the populated single-valued slots
    pub fn iter_present(&self) -> impl Iterator<Item = (FacetKind, &FacetValue)> {
        FacetKind::SINGLE_VALUED
            .iter()
            .zip(self.slots.iter())
            .filter_map(|(k, v)| v.as_ref().map(|v| (*k, v)))
    }

    /// Whether a lower value-space or length bound is present
    pub fn has_lower_bound(&self) -> bool {
        self.get(FacetKind::MinInclusive).is_some()
            || self.get(FacetKind::MinExclusive).is_some()
            || self.get(FacetKind::MinLength).is_some()
            || self.get(FacetKind::Length).is_some()
    }

    /// Whether an upper value-space or length bound is present
    pub fn has_upper_bound(&self) -> bool {
        self.get(FacetKind::MaxInclusive).is_some()
            || self.get(FacetKind::MaxExclusive).is_some()
            || self.get(FacetKind::MaxLength).is_some()
            || self.get(FacetKind::Length).is_some()
    }

    /// The effective white space rule, if any
    pub fn white_space(&self) -> Option<WhiteSpaceRule> {
        match self.get(FacetKind::WhiteSpace) {
            Some(FacetValue::WhiteSpace(w)) => Some(*w),
            _ => None,
        }
    }

    /// The raw fixed bitset (persisted alongside the slots)
    pub fn fixed_bits(&self) -> u16 {
        self.fixed
    }

    /// Restore the fixed bitset (used when decoding)
    pub fn set_fixed_bits(&mut self, bits: u16) {
        self.fixed = bits;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitespace_ordering() {
        assert!(WhiteSpaceRule::Preserve < WhiteSpaceRule::Replace);
        assert!(WhiteSpaceRule::Replace < WhiteSpaceRule::Collapse);
        assert_eq!(WhiteSpaceRule::parse("collapse"), Some(WhiteSpaceRule::Collapse));
        assert_eq!(WhiteSpaceRule::parse("bogus"), None);
    }

    #[test]
    fn test_slot_roundtrip() {
        let mut table = FacetTable::new();
        table.set(FacetKind::TotalDigits, FacetValue::Count(5), true);
        table.set(FacetKind::MaxInclusive, FacetValue::Number(Decimal::from(10)), false);

        assert_eq!(table.get(FacetKind::TotalDigits), Some(&FacetValue::Count(5)));
        assert!(table.is_fixed(FacetKind::TotalDigits));
        assert!(!table.is_fixed(FacetKind::MaxInclusive));
        assert_eq!(table.iter_present().count(), 2);

        table.clear(FacetKind::TotalDigits);
        assert_eq!(table.get(FacetKind::TotalDigits), None);
        assert!(!table.is_fixed(FacetKind::TotalDigits));
    }

    #[test]
    fn test_bound_presence() {
        let mut table = FacetTable::new();
        assert!(!table.has_lower_bound());
        table.set(FacetKind::MinExclusive, FacetValue::Number(Decimal::ZERO), false);
        assert!(table.has_lower_bound());
        assert!(!table.has_upper_bound());
        table.set(FacetKind::MaxLength, FacetValue::Count(10), false);
        assert!(table.has_upper_bound());
    }

    #[test]
    fn test_value_comparison() {
        let a = FacetValue::Number(Decimal::from(3));
        let b = FacetValue::Number(Decimal::from(7));
        assert_eq!(a.compare(&b), Some(Ordering::Less));
        assert_eq!(a.compare(&FacetValue::Count(3)), None);
    }
}
