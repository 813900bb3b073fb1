//! Shared CLI utilities.

use anyhow::{bail, Context, Result};
use serde_json::Value;

/// Parse a `NAME=[v1, v2, ...]` grid parameter; the values are a JSON list.
pub fn parse_param(param: &str) -> Result<(String, Vec<Value>)> {
    let Some((name, values)) = param.split_once('=') else {
        bail!("Invalid parameter '{}': expected NAME=[values...]", param);
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("Invalid parameter '{}': missing name", param);
    }
    let values: Value = serde_json::from_str(values.trim())
        .with_context(|| format!("Values of parameter '{}' are not valid JSON", name))?;
    match values {
        Value::Array(values) => Ok((name.to_string(), values)),
        other => bail!("Values of parameter '{}' must be a JSON list, got {}", name, other),
    }
}

#[cfg(test)]
mod tests {
    use super::parse_param;
    use serde_json::json;

    #[test]
    fn parses_json_list() {
        let (name, values) = parse_param("LEARNING_RATE=[1e-5, 1e-4]").expect("param");
        assert_eq!(name, "LEARNING_RATE");
        assert_eq!(values, vec![json!(1e-5), json!(1e-4)]);
    }

    #[test]
    fn keeps_equals_in_values() {
        let (_, values) = parse_param("OP=[\"a=b\"]").expect("param");
        assert_eq!(values, vec![json!("a=b")]);
    }

    #[test]
    fn rejects_malformed() {
        assert!(parse_param("LEARNING_RATE").is_err());
        assert!(parse_param("=[1]").is_err());
        assert!(parse_param("X=1").is_err());
        assert!(parse_param("X=[1,").is_err());
    }
}
