//! # Property-Based Tests
//!
//! Determinism, codec round-trip and graph set invariants, checked with
//! proptest.

use proptest::collection::vec;
use proptest::prelude::*;
use sparql_entity_core::{
    BundleSchema, ColumnSchema, EntityId, EntityTypeId, EntityTypeSchema, FieldSchema, FieldValue,
    GraphConfig, GraphDefinition, GraphResolver, MappingError, MappingRegistry,
    StaticSchemaProvider, ValueFormat, XsdType, decode_term, encode_value,
};
use std::sync::Arc;

// =============================================================================
// FIXTURES
// =============================================================================

/// An entity type with `bundle_count` bundles, each mapping `field_count`
/// shared fields to shared predicates.
fn schema(bundle_count: usize, field_count: usize) -> EntityTypeSchema {
    let mut schema = EntityTypeSchema::new("content");
    for f in 0..field_count {
        schema = schema.base_field(FieldSchema::new(format!("field_{}", f), "value").column(
            ColumnSchema::mapped(
                "value",
                format!("http://ex/p/{}", f),
                ValueFormat::PlainLiteral,
            ),
        ));
    }
    for b in 0..bundle_count {
        schema = schema.bundle(BundleSchema::new(
            format!("bundle_{}", b),
            format!("http://ex/T/{}", b % 3),
        ));
    }
    schema
}

fn registry(schema: EntityTypeSchema) -> MappingRegistry {
    MappingRegistry::new(Arc::new(StaticSchemaProvider::from_schemas([schema])))
}

fn resolver(extra: &[&str]) -> GraphResolver {
    let mut config = GraphConfig::default();
    for (weight, id) in (1..).zip(extra) {
        config.upsert_graph(GraphDefinition::new(*id, *id, weight));
    }
    GraphResolver::new(config).expect("resolver")
}

const GRAPHS: [&str; 4] = ["default", "draft", "review", "archive"];

fn graph_name() -> impl Strategy<Value = &'static str> {
    prop::sample::select(GRAPHS.to_vec())
}

// =============================================================================
// MAPPING PROPERTIES
// =============================================================================

proptest! {
    /// Repeated predicate lookups return the same non-empty result.
    #[test]
    fn mapping_determinism(bundles in 1usize..8, fields in 1usize..8, pick in 0usize..64) {
        let registry = registry(schema(bundles, fields));
        let id = EntityTypeId::from("content");
        let field = format!("field_{}", pick % fields);

        let first = registry.field_predicates(&id, &field, None, None).expect("lookup");
        prop_assert!(!first.is_empty());
        for _ in 0..3 {
            prop_assert_eq!(
                &registry.field_predicates(&id, &field, None, None).expect("lookup"),
                &first
            );
        }
    }

    /// Two independently built mappings of the same schema are equal.
    #[test]
    fn rebuild_is_identical(bundles in 1usize..8, fields in 0usize..8) {
        let a = registry(schema(bundles, fields));
        let b = registry(schema(bundles, fields));
        let id = EntityTypeId::from("content");
        let first = a.mapping(&id).expect("a");
        let second = b.mapping(&id).expect("b");
        prop_assert_eq!(&*first, &*second);
    }

    /// bundle -> type URI -> bundles contains the original bundle.
    #[test]
    fn bundle_type_uri_bijection(bundles in 1usize..12, pick in 0usize..64) {
        let registry = registry(schema(bundles, 1));
        let id = EntityTypeId::from("content");
        let bundle = format!("bundle_{}", pick % bundles);

        let uri = registry.bundle_to_type_uri(&id, &bundle).expect("type uri");
        let back = registry.type_uri_to_bundles(&id, uri.as_str()).expect("bundles");
        prop_assert!(back.contains(bundle.as_str()));
    }

    /// Every inbound entry resolves back to an outbound column with the
    /// same predicate.
    #[test]
    fn inbound_agrees_with_outbound(bundles in 1usize..6, fields in 1usize..6) {
        let registry = registry(schema(bundles, fields));
        let id = EntityTypeId::from("content");
        let outbound = registry.outbound_map(&id).expect("outbound");
        let inbound = registry.inbound_map(&id).expect("inbound");

        for predicate in inbound.predicates() {
            for (bundle, field_ref) in inbound.bundles_for(predicate.as_str()).expect("bundles") {
                let column = outbound
                    .column(bundle.as_str(), field_ref.field.as_str(), field_ref.column.as_str())
                    .expect("column");
                prop_assert_eq!(&column.predicate, predicate);
            }
        }
    }
}

// =============================================================================
// CODEC PROPERTIES
// =============================================================================

fn typed_value() -> impl Strategy<Value = (FieldValue, ValueFormat)> {
    prop_oneof![
        "[a-z]{1,12}(/[a-z0-9]{1,8}){0,3}".prop_map(|path| (
            FieldValue::Reference(format!("http://ex/{}", path)),
            ValueFormat::Resource
        )),
        "[a-z0-9]{1,12}".prop_map(|label| (
            FieldValue::Reference(format!("_:{}", label)),
            ValueFormat::Resource
        )),
        ".{0,40}".prop_map(|s| (FieldValue::Text(s), ValueFormat::PlainLiteral)),
        ".{0,40}".prop_map(|s| (FieldValue::Text(s), ValueFormat::Typed(XsdType::String))),
        any::<bool>().prop_map(|b| (FieldValue::Boolean(b), ValueFormat::Typed(XsdType::Boolean))),
        any::<i64>().prop_map(|i| (FieldValue::Integer(i), ValueFormat::Typed(XsdType::Integer))),
        "-?[0-9]{1,10}\\.[0-9]{1,6}".prop_map(|d| (
            FieldValue::Decimal(d),
            ValueFormat::Typed(XsdType::Decimal)
        )),
        "[0-9]{4}-[0-9]{2}-[0-9]{2}".prop_map(|d| (
            FieldValue::Date(d),
            ValueFormat::Typed(XsdType::Date)
        )),
        "[0-9]{4}-[0-9]{2}-[0-9]{2}T[0-9]{2}:[0-9]{2}:[0-9]{2}(Z|[+-][0-9]{2}:[0-9]{2})".prop_map(|d| (
            FieldValue::DateTime(d),
            ValueFormat::Typed(XsdType::DateTime)
        )),
    ]
}

proptest! {
    /// decode(encode(v, f), f) == v for every valid value of every format.
    #[test]
    fn codec_roundtrip((value, format) in typed_value()) {
        let term = encode_value(&value, &format, false, None).expect("encode");
        prop_assert_eq!(decode_term(&term, &format, false).expect("decode"), value);
    }

    /// Translatable literals round-trip when a language is supplied.
    #[test]
    fn translatable_roundtrip(text in ".{0,40}", language in "[a-z]{2}(-[A-Z]{2})?") {
        let value = FieldValue::Text(text);
        let format = ValueFormat::TranslatableLiteral;
        let term = encode_value(&value, &format, false, Some(&language)).expect("encode");
        prop_assert_eq!(term.language(), Some(language.as_str()));
        prop_assert_eq!(decode_term(&term, &format, false).expect("decode"), value);
    }

    /// Serialized columns round-trip structured values.
    #[test]
    fn serialized_roundtrip(keys in vec("[a-z]{1,6}", 0..5), n in any::<i64>()) {
        let object: serde_json::Map<String, serde_json::Value> = keys
            .into_iter()
            .map(|k| (k, serde_json::Value::from(n)))
            .collect();
        let value = FieldValue::Serialized(serde_json::Value::Object(object));
        let format = ValueFormat::PlainLiteral;
        let term = encode_value(&value, &format, true, None).expect("encode");
        prop_assert_eq!(decode_term(&term, &format, true).expect("decode"), value);
    }

    /// A literal term never decodes as a resource, and vice versa.
    #[test]
    fn literal_resource_mismatch(text in "[a-z]{1,12}") {
        let literal = encode_value(&FieldValue::Text(text.clone()), &ValueFormat::PlainLiteral, false, None)
            .expect("encode");
        let is_mismatch = matches!(
            decode_term(&literal, &ValueFormat::Resource, false),
            Err(MappingError::ValueFormatMismatch { .. })
        );
        prop_assert!(is_mismatch);

        let resource = encode_value(
            &FieldValue::Reference(format!("http://ex/{}", text)),
            &ValueFormat::Resource,
            false,
            None,
        )
        .expect("encode");
        prop_assert!(decode_term(&resource, &ValueFormat::PlainLiteral, false).is_err());
    }
}

// =============================================================================
// GRAPH SET PROPERTIES
// =============================================================================

proptest! {
    /// A valid set is stored exactly, deduplicated in first-occurrence order.
    #[test]
    fn request_graphs_dedup(names in vec(prop::sample::select(vec!["default", "draft", "review"]), 1..10)) {
        let resolver = resolver(&["draft", "review"]);
        let content = EntityTypeId::from("content");
        let e1 = EntityId::from("e1");

        let set = resolver.set_request_graphs(&content, &e1, &names).expect("set");
        let mut expected: Vec<&str> = Vec::new();
        for name in &names {
            if !expected.contains(name) {
                expected.push(name);
            }
        }
        prop_assert_eq!(set.names(), expected.clone());
        let stored = resolver.request_graphs(&content, &e1);
        prop_assert_eq!(stored.names(), expected);
    }

    /// Any unknown name fails and leaves the previous state in place.
    #[test]
    fn unknown_graph_always_rejected(names in vec(graph_name(), 1..6)) {
        let resolver = resolver(&["draft", "review"]);
        let content = EntityTypeId::from("content");
        let e1 = EntityId::from("e1");
        let before = resolver.request_graphs(&content, &e1);

        let result = resolver.set_request_graphs(&content, &e1, &names);
        if names.contains(&"archive") {
            let is_unknown = matches!(result, Err(MappingError::UnknownGraph { .. }));
            prop_assert!(is_unknown);
            prop_assert_eq!(resolver.request_graphs(&content, &e1), before);
        } else {
            prop_assert!(result.is_ok());
        }
    }

    /// Setting graphs of one entity never changes another's.
    #[test]
    fn request_graphs_isolated(a in 0u32..100, b in 0u32..100, narrow in graph_name()) {
        prop_assume!(a != b && narrow != "archive");
        let resolver = resolver(&["draft", "review"]);
        let content = EntityTypeId::from("content");
        let ea = EntityId::new(format!("e{}", a));
        let eb = EntityId::new(format!("e{}", b));

        let before = resolver.request_graphs(&content, &eb);
        resolver.set_request_graphs(&content, &ea, &[narrow]).expect("set");
        prop_assert_eq!(resolver.request_graphs(&content, &eb), before);
    }
}

/// An empty request set is always rejected.
#[test]
fn empty_request_graphs_rejected() {
    let resolver = resolver(&["draft"]);
    let result = resolver.set_request_graphs::<&str>(
        &EntityTypeId::from("content"),
        &EntityId::from("e1"),
        &[],
    );
    assert!(matches!(result, Err(MappingError::EmptyGraphSet { .. })));
}
