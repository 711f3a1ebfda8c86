//! Linear unit normalization to millimeters.

/// Unit tokens and their millimeter multipliers.
const UNIT_MULTIPLIERS: &[(&str, f64)] = &[
    ("mm", 1.0),
    ("厘米", 10.0),
    ("cm", 10.0),
    ("米", 1000.0),
    ("m", 1000.0),
    ("英寸", 25.4),
    ("inch", 25.4),
    ("in", 25.4),
];

/// Converts `(value, unit)` pairs to millimeters.
///
/// Unknown or empty unit tokens leave the value untouched: millimeters are
/// the implicit default unit.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnitNormalizer;

impl UnitNormalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn multiplier(&self, unit: &str) -> Option<f64> {
        let token = unit.trim().to_lowercase();
        UNIT_MULTIPLIERS
            .iter()
            .find(|(candidate, _)| *candidate == token)
            .map(|(_, factor)| *factor)
    }

    pub fn normalize(&self, value: f64, unit: &str) -> f64 {
        match self.multiplier(unit) {
            Some(factor) => value * factor,
            None => value,
        }
    }

    /// Regex alternation of every recognized token, longest first.
    pub(crate) fn token_alternation() -> String {
        let mut tokens: Vec<&str> = UNIT_MULTIPLIERS.iter().map(|(token, _)| *token).collect();
        tokens.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));
        tokens.join("|")
    }
}

/// Shorthand for [`UnitNormalizer::normalize`].
pub fn normalize(value: f64, unit: &str) -> f64 {
    UnitNormalizer.normalize(value, unit)
}
