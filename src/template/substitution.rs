//! Placeholder substitution for catalog templates

/// Substitute `{{variable}}` placeholders in a template string.
///
/// Values render the way they read in JSON: strings verbatim, numbers and
/// booleans via their display form, null as empty, composites as compact
/// JSON. Placeholders with no matching context key are left untouched.
pub(super) fn substitute_string(
    template: &str,
    variables: &serde_json::Map<String, serde_json::Value>,
) -> String {
    let mut result = template.to_string();

    for (key, value) in variables {
        let pattern = format!("{{{{{}}}}}", key);
        let replacement = match value {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::Bool(b) => b.to_string(),
            serde_json::Value::Null => "".to_string(),
            // For arrays and objects, use JSON representation
            _ => value.to_string(),
        };
        result = result.replace(&pattern, &replacement);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_substitute_simple() {
        let result = substitute_string("Hello, {{name}}!", &vars(json!({"name": "World"})));
        assert_eq!(result, "Hello, World!");
    }

    #[test]
    fn test_substitute_number_variable() {
        let result = substitute_string(
            "Paid {{amount}} ETB",
            &vars(json!({"amount": 15000})),
        );
        assert_eq!(result, "Paid 15000 ETB");
    }

    #[test]
    fn test_substitute_repeated_placeholder() {
        let result = substitute_string(
            "{{title}} / {{title}}",
            &vars(json!({"title": "Bole Apartment"})),
        );
        assert_eq!(result, "Bole Apartment / Bole Apartment");
    }

    #[test]
    fn test_unmatched_placeholder_left_as_is() {
        let result = substitute_string("Hello, {{name}}!", &vars(json!({"other": 1})));
        assert_eq!(result, "Hello, {{name}}!");
    }
}
