//! The built-in newspaper archive.
//!
//! Four English-language papers from nineteenth-century Chile, two articles
//! each. Used by the static catalog, the mock backend, and the tests.

use serde_json::Value;

const ARCHIVE_JSON: &str = include_str!("../data/archive.json");

/// The archive in its upstream (un-normalized) JSON shape.
pub fn builtin_archive() -> Value {
    match serde_json::from_str(ARCHIVE_JSON) {
        Ok(value) => value,
        Err(e) => {
            tracing::error!(error = %e, "built-in archive is not valid JSON");
            Value::Array(Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archive_shape() {
        let archive = builtin_archive();
        let papers = archive.as_array().unwrap();
        assert_eq!(papers.len(), 4);
        for paper in papers {
            assert!(paper["id"].is_string());
            assert_eq!(paper["articles"].as_array().unwrap().len(), 2);
        }
    }
}
