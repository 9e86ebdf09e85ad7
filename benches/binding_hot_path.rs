use brrtbind::binder::bind;
use brrtbind::request::RawRequest;
use brrtbind::schema::{FieldSpec, ObjectSchema, ResponseShape, SemanticType};
use brrtbind::shaper::{shape_json, ShapePolicy};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use http::Method;
use serde_json::json;
use std::hint::black_box;
use std::sync::Arc;

fn image_schema() -> Arc<ObjectSchema> {
    ObjectSchema::builder("Image")
        .field(
            FieldSpec::field("url", SemanticType::String)
                .required()
                .pattern("^https?://"),
        )
        .field(FieldSpec::field("name", SemanticType::String).required())
        .build()
        .unwrap()
}

fn item_schema() -> Arc<ObjectSchema> {
    ObjectSchema::builder("Item")
        .field(FieldSpec::field("name", SemanticType::String).required())
        .field(FieldSpec::field("description", SemanticType::String).max_length(300))
        .field(FieldSpec::field("price", SemanticType::Float).required().gt(0.0))
        .field(FieldSpec::field("tax", SemanticType::Float).default(json!(10.5)))
        .field(FieldSpec::field("tags", SemanticType::set_of(SemanticType::String)).default(json!([])))
        .field(FieldSpec::field(
            "images",
            SemanticType::list_of(SemanticType::Object(image_schema())),
        ))
        .build()
        .unwrap()
}

fn bench_parameters(c: &mut Criterion) {
    let schema = ObjectSchema::builder("ReadItems")
        .field(FieldSpec::path("item_id", SemanticType::Integer))
        .field(FieldSpec::query("q", SemanticType::list_of(SemanticType::String)))
        .field(FieldSpec::query("limit", SemanticType::Integer).le(100.0).default(json!(10)))
        .field(FieldSpec::header("x_token", SemanticType::String).required())
        .field(FieldSpec::header("user_agent", SemanticType::String))
        .field(FieldSpec::cookie("session", SemanticType::String))
        .build()
        .unwrap();
    let raw = RawRequest::from_parts(
        Method::GET,
        "/items/42?q=foo&q=bar&limit=20",
        vec![
            ("X-Token".to_string(), "secret".to_string()),
            ("User-Agent".to_string(), "bench/1.0".to_string()),
            ("Cookie".to_string(), "session=abc".to_string()),
        ],
        Vec::new(),
    )
    .with_path_param("item_id", "42");

    c.bench_function("bind_parameters", |b| {
        b.iter(|| bind(black_box(schema.as_ref()), black_box(&raw)))
    });
}

fn bench_json_body(c: &mut Criterion) {
    let schema = ObjectSchema::builder("CreateItem")
        .field(FieldSpec::body("item", SemanticType::Object(item_schema())).required())
        .build()
        .unwrap();

    let mut group = c.benchmark_group("bind_json_body");
    for images in [0usize, 8, 64] {
        let body = json!({
            "name": "Foo",
            "price": 42.0,
            "tags": ["a", "b", "a"],
            "images": (0..images)
                .map(|i| json!({"url": format!("https://example.com/{i}.png"), "name": format!("img{i}")}))
                .collect::<Vec<_>>(),
        });
        let raw = RawRequest::new(Method::POST, "/items").with_json_body(&body);
        group.bench_with_input(BenchmarkId::from_parameter(images), &raw, |b, raw| {
            b.iter(|| bind(black_box(schema.as_ref()), black_box(raw)))
        });
    }
    group.finish();
}

fn bench_shape(c: &mut Criterion) {
    let shape_decl = ResponseShape::list_of(item_schema());
    let value = json!((0..32)
        .map(|i| json!({"name": format!("item{i}"), "price": i as f64 + 1.0}))
        .collect::<Vec<_>>());
    let policy = ShapePolicy::include_all().with_exclude_unset();

    c.bench_function("shape_exclude_unset", |b| {
        b.iter(|| shape_json(black_box(&shape_decl), black_box(&value), &policy))
    });
}

criterion_group!(benches, bench_parameters, bench_json_body, bench_shape);
criterion_main!(benches);
