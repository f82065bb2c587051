use super::*;
use bson::doc;

#[test]
fn test_normalize_query() {
    assert_eq!(normalize_query("  { \"A\": 1 }\n"), "{ \"a\": 1 }");
    assert_eq!(normalize_query("{}"), normalize_query(" {} "));
}

#[test]
fn test_schema_observe_collects_types() {
    let mut schema = ResultSchema::default();
    schema.observe(&[doc! { "a": 1, "b": "x" }, doc! { "a": "one" }]);

    assert_eq!(schema.documents_seen(), 2);
    assert_eq!(schema.fields()["a"].len(), 2);
    assert_eq!(schema.fields()["b"].len(), 1);
}
