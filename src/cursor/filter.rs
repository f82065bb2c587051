//! Lenient filter parsing
//!
//! Filter text that is blank, not JSON, or not a JSON object degrades to the
//! match-all filter `{}` instead of failing the operation. Extended JSON
//! wrappers such as `{"$oid": "..."}` are converted to their BSON types.

use bson::{Bson, Document};
use tracing::warn;

/// Parse filter text into a BSON document, falling back to match-all
pub fn parse_filter(text: Option<&str>) -> Document {
    let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) else {
        return Document::new();
    };

    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            warn!("Filter is not valid JSON ({}), matching all documents", e);
            return Document::new();
        }
    };

    match Bson::try_from(value) {
        Ok(Bson::Document(doc)) => doc,
        Ok(other) => {
            warn!(
                "Filter must be a JSON object, got {:?}; matching all documents",
                other.element_type()
            );
            Document::new()
        }
        Err(e) => {
            warn!("Filter could not be converted to BSON ({}), matching all documents", e);
            Document::new()
        }
    }
}

/// Treat zero or negative skip/limit values as unset
pub fn normalize_bound(value: Option<i64>) -> Option<u64> {
    value.filter(|v| *v > 0).map(|v| v as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{doc, oid::ObjectId};

    #[test]
    fn test_blank_and_garbage_filters_match_all() {
        let empty = Document::new();
        assert_eq!(parse_filter(None), empty);
        assert_eq!(parse_filter(Some("")), empty);
        assert_eq!(parse_filter(Some("   \n")), empty);
        assert_eq!(parse_filter(Some("not json")), empty);
        assert_eq!(parse_filter(Some("{}")), empty);
    }

    #[test]
    fn test_non_object_filter_matches_all() {
        assert_eq!(parse_filter(Some("[1, 2]")), Document::new());
        assert_eq!(parse_filter(Some("42")), Document::new());
    }

    #[test]
    fn test_object_filter_is_kept() {
        let filter = parse_filter(Some(r#"{ "status": "active", "age": { "$gt": 21 } }"#));
        assert_eq!(filter, doc! { "status": "active", "age": { "$gt": 21 } });
    }

    #[test]
    fn test_extended_json_is_honored() {
        let oid = ObjectId::new();
        let text = format!(r#"{{ "_id": {{ "$oid": "{}" }} }}"#, oid.to_hex());
        assert_eq!(parse_filter(Some(&text)), doc! { "_id": oid });
    }

    #[test]
    fn test_normalize_bound() {
        assert_eq!(normalize_bound(None), None);
        assert_eq!(normalize_bound(Some(0)), None);
        assert_eq!(normalize_bound(Some(-5)), None);
        assert_eq!(normalize_bound(Some(10)), Some(10));
    }
}
