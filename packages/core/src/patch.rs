// ABOUTME: Serde helper for partial updates that can clear a nullable field
// ABOUTME: Absent key -> None, explicit null -> Some(None), value -> Some(Some(v))

use serde::{Deserialize, Deserializer};

/// Use with `#[serde(default, deserialize_with = "double_option")]`
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "double_option")]
        due_date: Option<Option<String>>,
    }

    #[test]
    fn test_absent_null_and_value_are_distinct() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        let null: Patch = serde_json::from_str(r#"{"due_date":null}"#).unwrap();
        let value: Patch = serde_json::from_str(r#"{"due_date":"2025-01-01"}"#).unwrap();

        assert_eq!(absent.due_date, None);
        assert_eq!(null.due_date, Some(None));
        assert_eq!(value.due_date, Some(Some("2025-01-01".to_string())));
    }
}
