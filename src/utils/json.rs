use serde_json::Value;

/// Three-way view of a JSON field in a partial update: absent, explicitly
/// cleared, or set.
#[derive(Debug, PartialEq, Eq)]
pub enum NullableValue {
    Omitted,
    Null,
    String(String),
}

pub fn classify_nullable(optional_value: Option<&Value>) -> Result<NullableValue, String> {
    match optional_value {
        None => Ok(NullableValue::Omitted),
        Some(Value::Null) => Ok(NullableValue::Null),
        Some(Value::String(s)) => Ok(NullableValue::String(s.to_owned())),
        Some(other) => Err(format!("expected string or null, got {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn distinguishes_missing_null_and_text() {
        let body = json!({ "excerpt": null, "description": "Краткое описание" });
        assert_eq!(classify_nullable(body.get("title")), Ok(NullableValue::Omitted));
        assert_eq!(classify_nullable(body.get("excerpt")), Ok(NullableValue::Null));
        assert_eq!(
            classify_nullable(body.get("description")),
            Ok(NullableValue::String("Краткое описание".into()))
        );
    }

    #[test]
    fn rejects_non_string_values() {
        let body = json!({ "excerpt": 42 });
        assert!(classify_nullable(body.get("excerpt")).is_err());
    }
}
