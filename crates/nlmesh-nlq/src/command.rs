//! Pipe-delimited command rendering of a parsed query.

use crate::models::ParsedQuery;

/// Render `intent:<i>|type:<t>|entities:<a,b>|<key>:<value>...`.
///
/// Entities are listed in mention order (duplicates included); parameters
/// follow in key order.
pub fn render_command(query: &ParsedQuery) -> String {
    let mut parts = vec![
        format!("intent:{}", query.intent),
        format!("type:{}", query.query_type),
    ];

    if !query.entities.is_empty() {
        let entity_types: Vec<&str> = query
            .entities
            .iter()
            .map(|entity| entity.entity_type.as_str())
            .collect();
        parts.push(format!("entities:{}", entity_types.join(",")));
    }

    for (key, value) in &query.parameters {
        parts.push(format!("{key}:{value:?}"));
    }

    parts.join("|")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::QueryParser;

    #[test]
    fn renders_intent_type_entities_and_parameters() {
        let parsed = QueryParser::new().parse("选择直径大于10mm的孔");
        assert_eq!(
            render_command(&parsed),
            "intent:operation|type:measurement|entities:hole|min_value:10.0|target_value:10.0"
        );
    }

    #[test]
    fn omits_empty_sections() {
        let parsed = QueryParser::new().parse("测量体积");
        assert_eq!(render_command(&parsed), "intent:query|type:measurement");
    }
}
