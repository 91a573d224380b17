use serde_json::Value;
use serde_json_path::JsonPath;

pub const INVALID_PATH: &str = "(invalid jsonpath)";
pub const INVALID_JSON: &str = "(invalid json)";
pub const NOT_FOUND: &str = "(jsonpath not found)";

/// Site templates write paths relative to the root, e.g. `data.link`.
fn absolute_path(body: &str) -> String {
    if body.starts_with('$') {
        body.to_string()
    } else if body.starts_with('[') {
        format!("${body}")
    } else {
        format!("$.{body}")
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn evaluate(body: &str, response: &[u8]) -> String {
    let path = match JsonPath::parse(&absolute_path(body)) {
        Ok(path) => path,
        Err(e) => {
            debug!("Invalid jsonpath `{}`: {}", body, e);
            return INVALID_PATH.to_string();
        }
    };

    let document: Value = match serde_json::from_slice(response) {
        Ok(document) => document,
        Err(e) => {
            debug!("Response is not valid json: {}", e);
            return INVALID_JSON.to_string();
        }
    };

    match path.query(&document).first() {
        Some(value) => stringify(value),
        None => NOT_FOUND.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &[u8] = br#"{
        "success": true,
        "data": {"link": "https://i.example/a.png", "size": 12, "tags": ["x", "y"]},
        "files": [{"url": "https://f.example/1"}]
    }"#;

    #[test]
    fn test_scalars() {
        assert_eq!(evaluate("data.link", BODY), "https://i.example/a.png");
        assert_eq!(evaluate("data.size", BODY), "12");
        assert_eq!(evaluate("success", BODY), "true");
        assert_eq!(evaluate("data.tags[1]", BODY), "y");
    }

    #[test]
    fn test_path_forms() {
        assert_eq!(evaluate("files[0].url", BODY), "https://f.example/1");
        assert_eq!(evaluate("$.files[0].url", BODY), "https://f.example/1");
        assert_eq!(
            evaluate("[0]", br#"["https://first.example"]"#),
            "https://first.example"
        );
    }

    #[test]
    fn test_diagnostics() {
        assert_eq!(evaluate("data..[", BODY), INVALID_PATH);
        assert_eq!(evaluate("data.link", b"not json"), INVALID_JSON);
        assert_eq!(evaluate("data.nothing", BODY), NOT_FOUND);
    }
}
