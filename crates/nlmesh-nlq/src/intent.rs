use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};

use crate::{
    error::{NlqError, Result},
    models::{Intent, QueryType},
};

const DEFAULT_INTENT_PATTERNS: &[(Intent, &[&str])] = &[
    (
        Intent::Query,
        &[
            r"(查询|查看|显示|展示|什么是|有多少|多大|多长|多宽|多高|体积|面积|周长)",
            r"(measure|show|display|what is|how many|how big|how long|how wide|how tall|volume|area|perimeter)",
            r"(检测|检查|分析|analyze|check|detect|inspect)",
        ],
    ),
    (
        Intent::Operation,
        &[
            r"(选择|高亮|标记|highlight|select|mark|identify)",
            r"(旋转|移动|缩放|rotate|move|scale|translate)",
            r"(比较|对比|compare|contrast)",
        ],
    ),
    (
        Intent::Modification,
        &[
            r"(修改|编辑|改变|调整|modify|edit|change|adjust|alter)",
            r"(添加|删除|创建|add|remove|delete|create)",
            r"(优化|改进|improve|optimize|enhance)",
        ],
    ),
];

const DEFAULT_QUERY_TYPE_PATTERNS: &[(QueryType, &[&str])] = &[
    (
        QueryType::Measurement,
        &[
            r"(距离|长度|宽度|高度|直径|半径|角度|measure|distance|length|width|height|diameter|radius|angle)",
            r"(体积|面积|表面积|周长|volume|area|surface area|perimeter)",
        ],
    ),
    (
        QueryType::FeatureDetection,
        &[
            r"(特征|孔洞|圆柱|平面|球体|feature|hole|cylinder|plane|sphere)",
            r"(检测|识别|detect|identify|find|locate)",
        ],
    ),
    (
        QueryType::TopologyCheck,
        &[
            r"(拓扑|流形|水密|自相交|topology|manifold|watertight|self-intersection)",
            r"(检查|验证|check|verify|validate)",
        ],
    ),
    (
        QueryType::Selection,
        &[r"(选择|高亮|标记|select|highlight|mark)", r"(所有|全部|all|every)"],
    ),
];

lazy_static! {
    static ref INTENT_RULES: Vec<PatternRule<Intent>> = DEFAULT_INTENT_PATTERNS
        .iter()
        .map(|(intent, sources)| PatternRule::new(*intent, sources).expect("built-in intent pattern"))
        .collect();
    static ref QUERY_TYPE_RULES: Vec<PatternRule<QueryType>> = DEFAULT_QUERY_TYPE_PATTERNS
        .iter()
        .map(|(query_type, sources)| {
            PatternRule::new(*query_type, sources).expect("built-in query type pattern")
        })
        .collect();
}

/// A category and the case-insensitive patterns that vote for it.
#[derive(Debug, Clone)]
pub struct PatternRule<K> {
    pub category: K,
    patterns: Vec<Regex>,
}

impl<K: Copy + PartialEq> PatternRule<K> {
    pub fn new(category: K, sources: &[&str]) -> Result<Self> {
        let patterns = sources
            .iter()
            .map(|source| {
                RegexBuilder::new(source)
                    .case_insensitive(true)
                    .build()
                    .map_err(|source_err| NlqError::InvalidPattern {
                        pattern: source.to_string(),
                        source: source_err,
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { category, patterns })
    }

    /// Number of patterns that match anywhere in `text`.
    pub fn match_count(&self, text: &str) -> usize {
        self.patterns
            .iter()
            .filter(|pattern| pattern.is_match(text))
            .count()
    }
}

/// Scores `text` per category and returns the first category with the
/// strictly highest score, walking `order`.
fn best_category<K: Copy + PartialEq>(
    rules: &[PatternRule<K>],
    order: &[K],
    text: &str,
) -> (K, usize) {
    let mut best = (order[0], 0);
    for (position, category) in order.iter().enumerate() {
        let score = score_for(rules, *category, text);
        if position == 0 || score > best.1 {
            best = (*category, score);
        }
    }
    best
}

fn score_for<K: Copy + PartialEq>(rules: &[PatternRule<K>], category: K, text: &str) -> usize {
    rules
        .iter()
        .filter(|rule| rule.category == category)
        .map(|rule| rule.match_count(text))
        .sum()
}

/// Keyword-pattern classifier for intents and query types.
#[derive(Debug, Clone)]
pub struct IntentClassifier {
    intent_rules: Vec<PatternRule<Intent>>,
    query_type_rules: Vec<PatternRule<QueryType>>,
}

impl IntentClassifier {
    pub fn new(
        intent_rules: Vec<PatternRule<Intent>>,
        query_type_rules: Vec<PatternRule<QueryType>>,
    ) -> Self {
        Self {
            intent_rules,
            query_type_rules,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(INTENT_RULES.clone(), QUERY_TYPE_RULES.clone())
    }

    /// Highest-scoring intent; ties go to the earlier of Query, Operation,
    /// Modification, so a text nothing matches is a `Query`.
    pub fn classify_intent(&self, text: &str) -> Intent {
        best_category(&self.intent_rules, &Intent::ALL, text).0
    }

    /// Highest-scoring query type, or `Measurement` when nothing matched.
    pub fn classify_query_type(&self, text: &str) -> QueryType {
        let (query_type, score) =
            best_category(&self.query_type_rules, &QueryType::CLASSIFIABLE, text);
        if score == 0 {
            return QueryType::Measurement;
        }
        query_type
    }

    pub fn intent_scores(&self, text: &str) -> Vec<(Intent, usize)> {
        Intent::ALL
            .iter()
            .map(|intent| (*intent, score_for(&self.intent_rules, *intent, text)))
            .collect()
    }

    pub fn query_type_scores(&self, text: &str) -> Vec<(QueryType, usize)> {
        QueryType::CLASSIFIABLE
            .iter()
            .map(|query_type| {
                (
                    *query_type,
                    score_for(&self.query_type_rules, *query_type, text),
                )
            })
            .collect()
    }
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_measurement_queries() {
        let classifier = IntentClassifier::with_defaults();
        assert_eq!(classifier.classify_intent("测量体积"), Intent::Query);
        assert_eq!(
            classifier.classify_query_type("测量体积"),
            QueryType::Measurement
        );
    }

    #[test]
    fn classifies_operations_and_modifications() {
        let classifier = IntentClassifier::with_defaults();
        assert_eq!(classifier.classify_intent("高亮所有的孔"), Intent::Operation);
        assert_eq!(classifier.classify_intent("删除这个多余的孔"), Intent::Modification);
        assert_eq!(
            classifier.classify_intent("Please optimize and adjust the mesh"),
            Intent::Modification
        );
    }

    #[test]
    fn unmatched_text_defaults() {
        let classifier = IntentClassifier::with_defaults();
        assert_eq!(classifier.classify_intent("pizza recipes"), Intent::Query);
        assert_eq!(
            classifier.classify_query_type("pizza recipes"),
            QueryType::Measurement
        );
    }

    #[test]
    fn ties_resolve_in_enumeration_order() {
        let classifier = IntentClassifier::with_defaults();
        // One Query pattern ("显示") against one Operation pattern ("选择").
        let scores = classifier.intent_scores("显示并选择");
        assert_eq!(scores[0], (Intent::Query, 1));
        assert_eq!(scores[1], (Intent::Operation, 1));
        assert_eq!(classifier.classify_intent("显示并选择"), Intent::Query);

        // "孔洞" for feature detection ties with "所有" for selection.
        assert_eq!(
            classifier.classify_query_type("显示所有孔洞"),
            QueryType::FeatureDetection
        );
    }

    #[test]
    fn topology_queries() {
        let classifier = IntentClassifier::with_defaults();
        assert_eq!(
            classifier.classify_query_type("检查模型是否水密"),
            QueryType::TopologyCheck
        );
        assert_eq!(
            classifier.classify_query_type("check whether the mesh is watertight"),
            QueryType::TopologyCheck
        );
    }

    #[test]
    fn custom_rules_use_enumeration_order_not_rule_order() {
        let classifier = IntentClassifier::new(
            vec![
                PatternRule::new(Intent::Modification, &["foo"]).unwrap(),
                PatternRule::new(Intent::Operation, &["foo"]).unwrap(),
            ],
            vec![],
        );
        assert_eq!(classifier.classify_intent("foo"), Intent::Operation);
        assert_eq!(classifier.classify_query_type("foo"), QueryType::Measurement);
    }

    #[test]
    fn invalid_custom_pattern_is_reported() {
        let result = PatternRule::new(Intent::Query, &["(unclosed"]);
        assert!(matches!(result, Err(NlqError::InvalidPattern { .. })));
    }
}
