use std::collections::BTreeMap;

use tracing::debug;

use crate::{
    entities::{comparison_role, EntityExtractor},
    intent::IntentClassifier,
    models::{
        ConstraintFamily, ConstraintRole, Entity, Intent, ParsedQuery, RawConstraintMatch,
        PARAM_MAX_VALUE, PARAM_MIN_VALUE,
    },
};

/// Single entry point from free-form text to a [`ParsedQuery`].
#[derive(Debug, Clone, Default)]
pub struct QueryParser {
    extractor: EntityExtractor,
    classifier: IntentClassifier,
}

impl QueryParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_components(extractor: EntityExtractor, classifier: IntentClassifier) -> Self {
        Self {
            extractor,
            classifier,
        }
    }

    pub fn extractor(&self) -> &EntityExtractor {
        &self.extractor
    }

    pub fn classifier(&self) -> &IntentClassifier {
        &self.classifier
    }

    pub fn parse(&self, text: &str) -> ParsedQuery {
        let intent = self.classifier.classify_intent(text);
        let query_type = self.classifier.classify_query_type(text);
        let entities = self.extractor.extract_entities(text);
        let constraints = self.extractor.extract_constraints(text);
        let parameters = self.resolve_constraints(&constraints);
        let is_valid = Self::validate(intent, &entities, &parameters);

        debug!(
            %intent,
            %query_type,
            entities = entities.len(),
            parameters = parameters.len(),
            is_valid,
            "parsed query"
        );

        ParsedQuery {
            original_text: text.to_string(),
            intent,
            query_type,
            entities,
            parameters,
            is_valid,
        }
    }

    /// Map raw matches to normalized bounds. Later matches overwrite earlier
    /// ones under the same key.
    pub fn resolve_constraints(&self, constraints: &[RawConstraintMatch]) -> BTreeMap<String, f64> {
        let mut parameters = BTreeMap::new();

        for constraint in constraints {
            match constraint.family {
                ConstraintFamily::Comparison => {
                    let role = constraint.group(0).and_then(comparison_role);
                    let value = self.normalized(constraint.group(1), constraint.group(2));
                    if let (Some(role), Some(value)) = (role, value) {
                        parameters.insert(role.parameter_key().to_string(), value);
                    }
                }
                ConstraintFamily::Range => {
                    let unit = constraint.group(2);
                    let low = self.normalized(constraint.group(0), unit);
                    let high = self.normalized(constraint.group(1), unit);
                    if let (Some(low), Some(high)) = (low, high) {
                        parameters.insert(PARAM_MIN_VALUE.to_string(), low);
                        parameters.insert(PARAM_MAX_VALUE.to_string(), high);
                    }
                }
                ConstraintFamily::Bare => {
                    if constraint.groups.len() != 2 {
                        continue;
                    }
                    if let Some(value) = self.normalized(constraint.group(0), constraint.group(1)) {
                        parameters.insert(
                            ConstraintRole::Target.parameter_key().to_string(),
                            value,
                        );
                    }
                }
            }
        }

        parameters
    }

    /// Query is always valid, Operation needs an entity, Modification needs an
    /// entity and a parameter.
    pub fn validate(intent: Intent, entities: &[Entity], parameters: &BTreeMap<String, f64>) -> bool {
        match intent {
            Intent::Query => true,
            Intent::Operation => !entities.is_empty(),
            Intent::Modification => !entities.is_empty() && !parameters.is_empty(),
        }
    }

    fn normalized(&self, number: Option<&str>, unit: Option<&str>) -> Option<f64> {
        let value = match number?.parse::<f64>() {
            Ok(value) => value,
            Err(err) => {
                debug!(?number, %err, "skipping unparseable constraint value");
                return None;
            }
        };
        Some(self.extractor.normalize_units(value, unit.unwrap_or("mm")))
    }
}
