//! Property tests for the binder and the shaper.

use brrtbind::binder::bind;
use brrtbind::request::RawRequest;
use brrtbind::schema::{FieldSpec, ObjectSchema, ResponseShape, SemanticType};
use brrtbind::shaper::{shape_json, ShapePolicy};
use brrtbind::{BoundValue, ErrorKind};
use http::Method;
use proptest::prelude::*;
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::sync::Arc;

const FIELD_NAMES: [&str; 5] = ["alpha", "beta", "gamma", "delta", "epsilon"];

fn query_schema(ty: SemanticType, required: bool) -> Arc<ObjectSchema> {
    let mut builder = ObjectSchema::builder("Props");
    for name in FIELD_NAMES {
        let field = FieldSpec::query(name, ty.clone());
        builder = builder.field(if required { field.required() } else { field });
    }
    builder.build().unwrap()
}

fn get() -> RawRequest {
    RawRequest::new(Method::GET, "/props")
}

fn arb_bool_word() -> impl Strategy<Value = (String, bool)> {
    prop_oneof![
        Just(("true", true)),
        Just(("1", true)),
        Just(("yes", true)),
        Just(("on", true)),
        Just(("false", false)),
        Just(("0", false)),
        Just(("no", false)),
        Just(("off", false)),
    ]
    .prop_flat_map(|(word, value)| {
        // any ASCII casing of the word
        proptest::collection::vec(any::<bool>(), word.len()).prop_map(move |upper| {
            let cased: String = word
                .chars()
                .zip(upper)
                .map(|(c, u)| if u { c.to_ascii_uppercase() } else { c })
                .collect();
            (cased, value)
        })
    })
}

proptest! {
    /// Every unsupplied required field is reported, none are skipped.
    #[test]
    fn proptest_missing_fields_do_not_short_circuit(supplied in proptest::collection::vec(any::<bool>(), 5)) {
        let schema = query_schema(SemanticType::String, true);
        let mut raw = get();
        for (name, present) in FIELD_NAMES.iter().zip(&supplied) {
            if *present {
                raw = raw.with_query(name, "x");
            }
        }
        let expected: Vec<&str> = FIELD_NAMES
            .iter()
            .zip(&supplied)
            .filter(|(_, present)| !**present)
            .map(|(name, _)| *name)
            .collect();
        match bind(&schema, &raw) {
            Ok(_) => prop_assert!(expected.is_empty()),
            Err(errs) => {
                let locs: Vec<&str> = errs.iter().map(|e| e.loc.as_str()).collect();
                prop_assert_eq!(locs, expected);
                prop_assert!(errs.iter().all(|e| e.kind == ErrorKind::Missing));
            }
        }
    }

    #[test]
    fn proptest_integer_round_trip(n in any::<i64>()) {
        let schema = query_schema(SemanticType::Integer, false);
        let bound = bind(&schema, &get().with_query("alpha", n.to_string())).unwrap();
        prop_assert_eq!(bound.get("alpha"), Some(&BoundValue::Int(n)));
    }

    #[test]
    fn proptest_float_round_trip(f in any::<f64>().prop_filter("finite", |f| f.is_finite())) {
        let schema = query_schema(SemanticType::Float, false);
        let bound = bind(&schema, &get().with_query("alpha", f.to_string())).unwrap();
        prop_assert_eq!(bound.get("alpha"), Some(&BoundValue::Float(f)));
    }

    #[test]
    fn proptest_boolean_vocabulary((word, expected) in arb_bool_word()) {
        let schema = query_schema(SemanticType::Boolean, false);
        let bound = bind(&schema, &get().with_query("alpha", word)).unwrap();
        prop_assert_eq!(bound.get("alpha"), Some(&BoundValue::Bool(expected)));
    }

    #[test]
    fn proptest_non_vocabulary_is_type_error(word in "[a-z]{2,8}") {
        prop_assume!(!["yes", "no", "on", "off", "true", "false"].contains(&word.as_str()));
        let schema = query_schema(SemanticType::Boolean, false);
        let errs = bind(&schema, &get().with_query("alpha", word)).unwrap_err();
        prop_assert_eq!(errs.errors()[0].kind, ErrorKind::TypeError);
    }

    /// Sets keep each value once, in first-appearance order.
    #[test]
    fn proptest_set_deduplication(values in proptest::collection::vec("[a-c]{1,2}", 0..12)) {
        let schema = query_schema(SemanticType::set_of(SemanticType::String), false);
        let mut raw = get();
        for v in &values {
            raw = raw.with_query("alpha", v.clone());
        }
        let bound = bind(&schema, &raw).unwrap();
        let mut seen = HashSet::new();
        let expected: Vec<BoundValue> = values
            .iter()
            .filter(|v| seen.insert(v.as_str()))
            .map(|v| BoundValue::Str(v.clone()))
            .collect();
        if values.is_empty() {
            prop_assert_eq!(bound.get("alpha"), Some(&BoundValue::Absent));
        } else {
            prop_assert_eq!(bound.get("alpha"), Some(&BoundValue::Set(expected)));
        }
    }

    /// Under exclude-unset the output keys are exactly the supplied keys.
    #[test]
    fn proptest_exclude_unset_yields_set_fields(
        supplied in proptest::collection::vec(proptest::option::of(-1000i64..1000), 5)
    ) {
        let mut builder = ObjectSchema::builder("Counters");
        for name in FIELD_NAMES {
            builder = builder.field(FieldSpec::field(name, SemanticType::Integer).default(json!(0)));
        }
        let shape_decl = ResponseShape::object(builder.build().unwrap());

        let mut input = Map::new();
        for (name, value) in FIELD_NAMES.iter().zip(&supplied) {
            if let Some(v) = value {
                input.insert((*name).to_string(), json!(v));
            }
        }
        let out = shape_json(
            &shape_decl,
            &Value::Object(input.clone()),
            &ShapePolicy::include_all().with_exclude_unset(),
        )
        .unwrap();
        prop_assert_eq!(out, Value::Object(input));
    }
}
