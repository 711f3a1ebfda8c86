use std::borrow::Cow;

use lazy_static::lazy_static;
use regex::{Captures, Regex, RegexBuilder};
use tracing::debug;

use crate::{
    error::{NlqError, Result},
    models::{ConstraintFamily, ConstraintRole, Entity, GeometricEntity, RawConstraintMatch},
    units::UnitNormalizer,
};

const NUMBER: &str = r"([0-9]+(?:\.[0-9]+)?)";

/// Comparison words and the bound each one expresses.
pub(crate) const COMPARISON_WORDS: &[(&str, ConstraintRole)] = &[
    ("大于等于", ConstraintRole::Min),
    ("不小于", ConstraintRole::Min),
    ("大于", ConstraintRole::Min),
    ("超过", ConstraintRole::Min),
    ("小于等于", ConstraintRole::Max),
    ("不大于", ConstraintRole::Max),
    ("小于", ConstraintRole::Max),
    ("低于", ConstraintRole::Max),
    ("等于", ConstraintRole::Target),
    ("greater than or equal to", ConstraintRole::Min),
    ("greater than", ConstraintRole::Min),
    ("larger than", ConstraintRole::Min),
    ("bigger than", ConstraintRole::Min),
    ("more than", ConstraintRole::Min),
    ("at least", ConstraintRole::Min),
    ("above", ConstraintRole::Min),
    ("over", ConstraintRole::Min),
    ("less than or equal to", ConstraintRole::Max),
    ("smaller than", ConstraintRole::Max),
    ("less than", ConstraintRole::Max),
    ("at most", ConstraintRole::Max),
    ("below", ConstraintRole::Max),
    ("under", ConstraintRole::Max),
    ("equal to", ConstraintRole::Target),
    ("equals", ConstraintRole::Target),
];

const DEFAULT_ENTITY_KEYWORDS: &[(GeometricEntity, &[&str])] = &[
    (GeometricEntity::Vertex, &["顶点", "点", "vertex", "vertices", "point"]),
    (GeometricEntity::Edge, &["边", "边缘", "edge", "边界"]),
    (GeometricEntity::Face, &["面", "表面", "face", "surface"]),
    (GeometricEntity::Hole, &["孔", "洞", "hole", "opening"]),
    (GeometricEntity::Cylinder, &["圆柱", "柱面", "cylinder", "cylindrical"]),
    (GeometricEntity::Plane, &["平面", "plate", "plane", "flat"]),
    (GeometricEntity::Sphere, &["球体", "球面", "sphere", "spherical"]),
];

struct ConstraintPattern {
    family: ConstraintFamily,
    regex: Regex,
    /// Index of the optional or required unit group.
    unit_group: usize,
}

lazy_static! {
    static ref CONSTRAINT_PATTERNS: Vec<ConstraintPattern> = build_constraint_patterns();
}

fn build_constraint_patterns() -> Vec<ConstraintPattern> {
    let units = UnitNormalizer::token_alternation();

    let mut words: Vec<&str> = COMPARISON_WORDS.iter().map(|(word, _)| *word).collect();
    words.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));
    // Latin words must start a word: "over" is not a comparison in "discover".
    let words = words
        .iter()
        .map(|word| {
            if word.is_ascii() {
                format!(r"(?-u:\b){}", regex::escape(word))
            } else {
                regex::escape(word)
            }
        })
        .collect::<Vec<_>>()
        .join("|");

    let sources = [
        (
            ConstraintFamily::Comparison,
            format!(r"({words})\s*{NUMBER}\s*({units})?"),
            3,
        ),
        (
            ConstraintFamily::Range,
            format!(r"{NUMBER}\s*(?:到|至|~|-|to)\s*{NUMBER}\s*({units})?"),
            3,
        ),
        (
            ConstraintFamily::Range,
            format!(r"between\s+{NUMBER}\s+and\s+{NUMBER}\s*({units})?"),
            3,
        ),
        (ConstraintFamily::Bare, format!(r"{NUMBER}\s*({units})"), 2),
    ];

    sources
        .into_iter()
        .map(|(family, source, unit_group)| ConstraintPattern {
            family,
            regex: RegexBuilder::new(&source)
                .case_insensitive(true)
                .build()
                .expect("built-in constraint pattern"),
            unit_group,
        })
        .collect()
}

/// Keywords that identify one entity type.
#[derive(Debug, Clone)]
pub struct EntityKeywords {
    pub entity_type: GeometricEntity,
    pub keywords: Vec<String>,
}

impl EntityKeywords {
    pub fn new(entity_type: GeometricEntity, keywords: &[&str]) -> Self {
        Self {
            entity_type,
            keywords: keywords.iter().map(|kw| kw.to_lowercase()).collect(),
        }
    }
}

/// Finds geometric entity keywords and numeric constraint expressions.
#[derive(Debug, Clone)]
pub struct EntityExtractor {
    keywords: Vec<EntityKeywords>,
    normalizer: UnitNormalizer,
}

impl EntityExtractor {
    pub fn new() -> Self {
        Self {
            keywords: Self::default_keywords(),
            normalizer: UnitNormalizer::new(),
        }
    }

    /// Build an extractor over a custom keyword table.
    pub fn with_keywords(keywords: Vec<EntityKeywords>) -> Result<Self> {
        if let Some(empty) = keywords.iter().find(|row| row.keywords.is_empty()) {
            return Err(NlqError::EmptyKeywords(empty.entity_type.to_string()));
        }
        Ok(Self {
            keywords,
            normalizer: UnitNormalizer::new(),
        })
    }

    pub fn normalizer(&self) -> &UnitNormalizer {
        &self.normalizer
    }

    /// Entity hits sorted by character offset.
    ///
    /// Every matching keyword yields its own entity, so one type can appear
    /// several times; equal offsets keep table order.
    pub fn extract_entities(&self, text: &str) -> Vec<Entity> {
        let lowered = text.to_lowercase();
        let mut entities = Vec::new();

        for row in &self.keywords {
            for keyword in &row.keywords {
                if let Some(byte_offset) = lowered.find(keyword.as_str()) {
                    entities.push(Entity {
                        entity_type: row.entity_type,
                        matched_keyword: keyword.clone(),
                        text_offset: lowered[..byte_offset].chars().count(),
                    });
                }
            }
        }

        entities.sort_by_key(|entity| entity.text_offset);
        entities
    }

    /// Raw constraint matches, family by family and in text order within a family.
    ///
    /// Full-width digits and decimal points are read as their ASCII forms.
    pub fn extract_constraints(&self, text: &str) -> Vec<RawConstraintMatch> {
        let text = ascii_digits(text);
        let text = text.as_ref();
        let mut matches = Vec::new();

        for pattern in CONSTRAINT_PATTERNS.iter() {
            for captures in pattern.regex.captures_iter(text) {
                if let Some(raw) = Self::to_raw_match(text, pattern, &captures) {
                    matches.push(raw);
                }
            }
        }

        debug!(count = matches.len(), "extracted constraint matches");
        matches
    }

    pub fn normalize_units(&self, value: f64, unit: &str) -> f64 {
        self.normalizer.normalize(value, unit)
    }

    fn to_raw_match(
        text: &str,
        pattern: &ConstraintPattern,
        captures: &Captures<'_>,
    ) -> Option<RawConstraintMatch> {
        let whole = captures.get(0)?;
        let mut groups: Vec<Option<String>> = captures
            .iter()
            .skip(1)
            .map(|group| group.map(|m| m.as_str().to_string()))
            .collect();
        let mut matched_text = whole.as_str().to_string();

        // A latin unit glued to more letters ("5 minutes") is not a unit.
        if let Some(unit) = captures.get(pattern.unit_group) {
            if !unit_is_terminated(text, unit.end(), unit.as_str()) {
                if pattern.family == ConstraintFamily::Bare {
                    return None;
                }
                groups[pattern.unit_group - 1] = None;
                matched_text = text[whole.start()..unit.start()].trim_end().to_string();
            }
        }

        Some(RawConstraintMatch {
            family: pattern.family,
            matched_text,
            groups,
        })
    }

    fn default_keywords() -> Vec<EntityKeywords> {
        DEFAULT_ENTITY_KEYWORDS
            .iter()
            .map(|(entity_type, keywords)| EntityKeywords::new(*entity_type, keywords))
            .collect()
    }
}

impl Default for EntityExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Maps `０`-`９` and `．` to ASCII, borrowing when there is nothing to map.
fn ascii_digits(text: &str) -> Cow<'_, str> {
    let is_wide = |c: char| ('０'..='９').contains(&c) || c == '．';
    if !text.chars().any(is_wide) {
        return Cow::Borrowed(text);
    }
    text.chars()
        .map(|c| match c {
            '．' => '.',
            '０'..='９' => char::from_u32(c as u32 - '０' as u32 + '0' as u32).unwrap_or(c),
            other => other,
        })
        .collect::<String>()
        .into()
}

fn unit_is_terminated(text: &str, end: usize, unit: &str) -> bool {
    if !unit.is_ascii() {
        return true;
    }
    match text[end..].chars().next() {
        Some(next) => !next.is_ascii_alphabetic(),
        None => true,
    }
}

/// Look up the bound a comparison word expresses.
pub(crate) fn comparison_role(word: &str) -> Option<ConstraintRole> {
    let lowered = word.to_lowercase();
    COMPARISON_WORDS
        .iter()
        .find(|(candidate, _)| *candidate == lowered)
        .map(|(_, role)| *role)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entities_sorted_by_offset() {
        let extractor = EntityExtractor::new();
        // "平面" at 2 also contains "面" at 3; "孔" sits at 6.
        let entities = extractor.extract_entities("选择平面上的孔");
        let types: Vec<_> = entities.iter().map(|e| e.entity_type).collect();
        assert_eq!(
            types,
            vec![
                GeometricEntity::Plane,
                GeometricEntity::Face,
                GeometricEntity::Hole
            ]
        );
        assert_eq!(entities[0].text_offset, 2);
        assert_eq!(entities[1].text_offset, 3);
        assert_eq!(entities[2].text_offset, 6);
    }

    #[test]
    fn duplicate_keywords_are_kept() {
        let extractor = EntityExtractor::new();
        let entities = extractor.extract_entities("显示所有孔洞");
        let holes: Vec<_> = entities
            .iter()
            .filter(|e| e.entity_type == GeometricEntity::Hole)
            .collect();
        assert_eq!(holes.len(), 2);
        assert_eq!(holes[0].matched_keyword, "孔");
        assert_eq!(holes[1].matched_keyword, "洞");
    }

    #[test]
    fn keyword_match_is_case_insensitive() {
        let extractor = EntityExtractor::new();
        let entities = extractor.extract_entities("Find every HOLE");
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].entity_type, GeometricEntity::Hole);
        assert_eq!(entities[0].text_offset, 11);
    }

    #[test]
    fn comparison_constraint_groups() {
        let extractor = EntityExtractor::new();
        let matches = extractor.extract_constraints("直径大于10mm");
        assert_eq!(matches[0].family, ConstraintFamily::Comparison);
        assert_eq!(matches[0].group(0), Some("大于"));
        assert_eq!(matches[0].group(1), Some("10"));
        assert_eq!(matches[0].group(2), Some("mm"));
        assert_eq!(matches[0].matched_text, "大于10mm");
        // The bare family sees the same measurement.
        assert!(matches
            .iter()
            .any(|m| m.family == ConstraintFamily::Bare && m.group(0) == Some("10")));
    }

    #[test]
    fn range_constraint_groups() {
        let extractor = EntityExtractor::new();
        let matches = extractor.extract_constraints("孔径5到8厘米");
        let range = matches
            .iter()
            .find(|m| m.family == ConstraintFamily::Range)
            .unwrap();
        assert_eq!(range.group(0), Some("5"));
        assert_eq!(range.group(1), Some("8"));
        assert_eq!(range.group(2), Some("厘米"));

        let english = extractor.extract_constraints("holes between 2 and 3 cm");
        let range = english
            .iter()
            .find(|m| m.family == ConstraintFamily::Range)
            .unwrap();
        assert_eq!(range.group(0), Some("2"));
        assert_eq!(range.group(1), Some("3"));
        assert_eq!(range.group(2), Some("cm"));
    }

    #[test]
    fn latin_unit_inside_word_is_ignored() {
        let extractor = EntityExtractor::new();
        assert!(extractor.extract_constraints("wait 5 minutes").is_empty());

        let matches = extractor.extract_constraints("over 5 minutes");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].group(2), None);
        assert_eq!(matches[0].matched_text, "over 5");
    }

    #[test]
    fn comparison_words_must_start_a_word() {
        let extractor = EntityExtractor::new();
        let matches = extractor.extract_constraints("discover 5mm holes");
        assert!(matches.iter().all(|m| m.family != ConstraintFamily::Comparison));

        let matches = extractor.extract_constraints("thunder 3mm");
        assert!(matches.iter().all(|m| m.family != ConstraintFamily::Comparison));

        let matches = extractor.extract_constraints("直径over10mm");
        assert_eq!(matches[0].family, ConstraintFamily::Comparison);
        assert_eq!(matches[0].group(0), Some("over"));
    }

    #[test]
    fn full_width_digits_are_read() {
        let extractor = EntityExtractor::new();
        let matches = extractor.extract_constraints("直径大于１０．５mm");
        assert_eq!(matches[0].family, ConstraintFamily::Comparison);
        assert_eq!(matches[0].group(1), Some("10.5"));
        assert_eq!(ascii_digits("plain 10mm"), Cow::Borrowed("plain 10mm"));
    }

    #[test]
    fn comparison_roles() {
        assert_eq!(comparison_role("不大于"), Some(ConstraintRole::Max));
        assert_eq!(comparison_role("大于"), Some(ConstraintRole::Min));
        assert_eq!(comparison_role("At Least"), Some(ConstraintRole::Min));
        assert_eq!(comparison_role("等于"), Some(ConstraintRole::Target));
        assert_eq!(comparison_role("roughly"), None);
    }

    #[test]
    fn custom_keyword_table_rejects_empty_rows() {
        let result = EntityExtractor::with_keywords(vec![EntityKeywords::new(
            GeometricEntity::Sphere,
            &[],
        )]);
        assert!(matches!(result, Err(NlqError::EmptyKeywords(_))));
    }
}
