//! Request binding: extraction, coercion, constraints and error aggregation.

mod common;

use brrtbind::binder::{bind, bind_with, BindOptions};
use brrtbind::request::RawRequest;
use brrtbind::schema::{BodyEncoding, FieldSpec, ObjectSchema, SemanticType};
use brrtbind::{BoundValue, ErrorKind};
use common::{get, locs, put_json};
use http::Method;
use serde_json::json;

#[test]
fn test_read_item_binds_path_and_query() {
    let bound = bind(&common::read_item(), &get("/items/5").with_path_param("id", "5").with_query("q", "x"))
        .unwrap();
    assert_eq!(bound.get("id"), Some(&BoundValue::Int(5)));
    assert_eq!(bound.get("q"), Some(&BoundValue::Str("x".into())));
    assert_eq!(bound.set_fields(), vec!["id", "q"]);
}

#[test]
fn test_read_item_without_query_binds_absent() {
    let bound = bind(&common::read_item(), &get("/items/5").with_path_param("id", "5")).unwrap();
    assert_eq!(bound.get("q"), Some(&BoundValue::Absent));
    assert!(!bound.is_set("q"));
    assert_eq!(bound.to_json(), json!({"id": 5, "q": null}));
}

#[test]
fn test_read_item_rejects_non_integer_id() {
    let errs = bind(&common::read_item(), &get("/items/abc").with_path_param("id", "abc")).unwrap_err();
    assert_eq!(errs.len(), 1);
    assert_eq!(errs.errors()[0].loc, "id");
    assert_eq!(errs.errors()[0].kind, ErrorKind::TypeError);
    assert_eq!(
        errs.to_problem_json(),
        json!({"detail": [{"loc": "id", "type": "TYPE_ERROR", "msg": "value is not a valid integer"}]})
    );
}

#[test]
fn test_every_missing_field_is_reported() {
    let schema = ObjectSchema::builder("Search")
        .field(FieldSpec::query("a", SemanticType::String).required())
        .field(FieldSpec::query("b", SemanticType::Integer).required())
        .field(FieldSpec::header("x_c", SemanticType::String).required())
        .field(FieldSpec::query("d", SemanticType::String))
        .build()
        .unwrap();
    let errs = bind(&schema, &get("/search")).unwrap_err();
    assert_eq!(locs(&errs), vec!["a", "b", "x-c"]);
    assert!(errs.iter().all(|e| e.kind == ErrorKind::Missing));
}

#[test]
fn test_boolean_vocabulary() {
    let schema = ObjectSchema::builder("Flags")
        .field(FieldSpec::query("short", SemanticType::Boolean).required())
        .build()
        .unwrap();
    for (text, expected) in [
        ("true", true),
        ("True", true),
        ("1", true),
        ("yes", true),
        ("on", true),
        ("false", false),
        ("FALSE", false),
        ("0", false),
        ("no", false),
        ("off", false),
    ] {
        let bound = bind(&schema, &get("/").with_query("short", text)).unwrap();
        assert_eq!(bound.get("short"), Some(&BoundValue::Bool(expected)), "{text}");
    }
    let errs = bind(&schema, &get("/").with_query("short", "maybe")).unwrap_err();
    assert_eq!(errs.errors()[0].kind, ErrorKind::TypeError);
}

#[test]
fn test_repeated_query_values() {
    let schema = ObjectSchema::builder("Tags")
        .field(FieldSpec::query("q", SemanticType::list_of(SemanticType::String)))
        .field(FieldSpec::query("tags", SemanticType::set_of(SemanticType::String)))
        .field(FieldSpec::query("ids", SemanticType::list_of(SemanticType::Integer)))
        .build()
        .unwrap();
    let raw = get("/items").with_query_string("q=foo&q=bar&tags=a&tags=b&tags=a&ids=1&ids=2");
    let bound = bind(&schema, &raw).unwrap();
    assert_eq!(bound.to_json(), json!({"q": ["foo", "bar"], "tags": ["a", "b"], "ids": [1, 2]}));

    let errs = bind(&schema, &get("/items").with_query_string("ids=1&ids=two")).unwrap_err();
    assert_eq!(locs(&errs), vec!["ids.1"]);
}

#[test]
fn test_single_value_wraps_into_list() {
    let schema = ObjectSchema::builder("Q")
        .field(FieldSpec::query("q", SemanticType::list_of(SemanticType::String)))
        .build()
        .unwrap();
    let bound = bind(&schema, &get("/").with_query("q", "only")).unwrap();
    assert_eq!(bound.to_json(), json!({"q": ["only"]}));
}

#[test]
fn test_headers_convert_underscores() {
    let schema = ObjectSchema::builder("Headers")
        .field(FieldSpec::header("user_agent", SemanticType::String))
        .field(
            FieldSpec::header("strange_header", SemanticType::String).convert_underscores(false),
        )
        .field(FieldSpec::header("x_token", SemanticType::list_of(SemanticType::String)))
        .build()
        .unwrap();
    let raw = get("/")
        .with_header("User-Agent", "curl/8")
        .with_header("strange_header", "kept")
        .with_header("X-Token", "foo")
        .with_header("x-token", "bar");
    let bound = bind(&schema, &raw).unwrap();
    assert_eq!(
        bound.to_json(),
        json!({"user_agent": "curl/8", "strange_header": "kept", "x_token": ["foo", "bar"]})
    );
}

#[test]
fn test_cookie_and_alias() {
    let schema = ObjectSchema::builder("Cookies")
        .field(FieldSpec::cookie("ads_id", SemanticType::String))
        .field(FieldSpec::query("item_query", SemanticType::String).alias("item-query"))
        .build()
        .unwrap();
    let raw = RawRequest::from_parts(
        Method::GET,
        "/items?item-query=fixedquery",
        vec![("Cookie".into(), "ads_id=abc; other=1".into())],
        Vec::new(),
    );
    let bound = bind(&schema, &raw).unwrap();
    assert_eq!(bound.to_json(), json!({"ads_id": "abc", "item_query": "fixedquery"}));
}

#[test]
fn test_enum_names_allowed_values() {
    let schema = ObjectSchema::builder("Model")
        .field(FieldSpec::path(
            "model_name",
            SemanticType::enum_of(["alexnet", "resnet", "lenet"]),
        ))
        .build()
        .unwrap();
    assert!(bind(&schema, &get("/").with_path_param("model_name", "resnet")).is_ok());
    let errs = bind(&schema, &get("/").with_path_param("model_name", "vgg")).unwrap_err();
    assert_eq!(errs.errors()[0].kind, ErrorKind::TypeError);
    assert!(errs.errors()[0].message.contains("alexnet, resnet, lenet"));
}

#[test]
fn test_query_constraints() {
    let schema = ObjectSchema::builder("Search")
        .field(
            FieldSpec::query("q", SemanticType::String)
                .min_length(3)
                .max_length(50)
                .pattern("^fixedquery$"),
        )
        .field(FieldSpec::query("size", SemanticType::Float).gt(0.0).lt(10.5))
        .build()
        .unwrap();
    let errs = bind(&schema, &get("/").with_query("q", "ab").with_query("size", "10.5")).unwrap_err();
    assert_eq!(locs(&errs), vec!["q", "size"]);
    assert_eq!(errs.errors()[0].kind, ErrorKind::RangeError);
    assert_eq!(errs.errors()[0].message, "ensure this value has at least 3 characters or items");
    assert_eq!(errs.errors()[1].message, "ensure this value is less than 10.5");

    let errs = bind(&schema, &get("/").with_query("q", "otherquery")).unwrap_err();
    assert_eq!(errs.errors()[0].kind, ErrorKind::PatternError);
}

#[test]
fn test_defaults_are_not_explicitly_set() {
    let schema = ObjectSchema::builder("Paging")
        .field(FieldSpec::query("skip", SemanticType::Integer).default(json!(0)))
        .field(FieldSpec::query("limit", SemanticType::Integer).default(json!(10)))
        .build()
        .unwrap();
    let bound = bind(&schema, &get("/").with_query("limit", "20")).unwrap();
    assert_eq!(bound.to_json(), json!({"skip": 0, "limit": 20}));
    assert_eq!(bound.set_fields(), vec!["limit"]);
}

#[test]
fn test_single_body_field_receives_whole_body() {
    let raw = put_json("/items/1", &json!({"name": "Foo", "price": 42.0, "tags": ["a", "a"]}))
        .with_path_param("item_id", "1");
    let bound = bind(&common::update_item(), &raw).unwrap();
    let item = bound.get("item").and_then(BoundValue::as_object).unwrap();
    assert_eq!(item.set_fields(), vec!["name", "price", "tags"]);
    assert_eq!(
        item.to_json(),
        json!({"name": "Foo", "description": null, "price": 42.0, "tax": 10.5, "tags": ["a"], "images": null})
    );
}

#[test]
fn test_nested_body_errors_are_dotted() {
    let raw = put_json(
        "/items/x",
        &json!({
            "price": -1,
            "images": [
                {"url": "https://example.com/a.png", "name": "a"},
                {"url": "ftp://example.com/b.png"}
            ]
        }),
    )
    .with_path_param("item_id", "x");
    let errs = bind(&common::update_item(), &raw).unwrap_err();
    assert_eq!(
        locs(&errs),
        vec!["item_id", "body.name", "body.price", "body.images.1.url", "body.images.1.name"]
    );
    assert_eq!(errs.at("body.price").unwrap().kind, ErrorKind::RangeError);
    assert_eq!(errs.at("body.images.1.url").unwrap().kind, ErrorKind::PatternError);
}

#[test]
fn test_embedded_body_fields_are_keyed() {
    let schema = ObjectSchema::builder("UpdateItem")
        .field(FieldSpec::body("item", SemanticType::Object(common::item())).required().embed())
        .build()
        .unwrap();
    let errs = bind(&schema, &put_json("/", &json!({"name": "Foo", "price": 1.0}))).unwrap_err();
    assert_eq!(locs(&errs), vec!["body.item"]);

    let ok = bind(&schema, &put_json("/", &json!({"item": {"name": "Foo", "price": 1.0}}))).unwrap();
    assert!(ok.get("item").and_then(BoundValue::as_object).is_some());
}

#[test]
fn test_multiple_body_fields_and_map_keys() {
    let schema = ObjectSchema::builder("Update")
        .field(FieldSpec::body("importance", SemanticType::Integer).required())
        .field(FieldSpec::body(
            "weights",
            SemanticType::map_of(SemanticType::Integer, SemanticType::Float),
        ))
        .build()
        .unwrap();
    let bound = bind(&schema, &put_json("/", &json!({"importance": "5", "weights": {"1": 0.5, "2": 1}})))
        .unwrap();
    assert_eq!(bound.get("importance"), Some(&BoundValue::Int(5)));
    assert_eq!(bound.to_json()["weights"], json!({"1": 0.5, "2": 1.0}));

    let errs = bind(&schema, &put_json("/", &json!({"importance": 1, "weights": {"one": 0.5}}))).unwrap_err();
    assert_eq!(locs(&errs), vec!["body.weights.one"]);

    let errs = bind(&schema, &put_json("/", &json!([1, 2]))).unwrap_err();
    assert_eq!(locs(&errs), vec!["body"]);
}

#[test]
fn test_null_for_required_and_optional_fields() {
    let schema = ObjectSchema::builder("Patch")
        .field(FieldSpec::body("name", SemanticType::String).required())
        .field(FieldSpec::body("description", SemanticType::String))
        .build()
        .unwrap();
    let errs = bind(&schema, &put_json("/", &json!({"name": null, "description": null}))).unwrap_err();
    assert_eq!(locs(&errs), vec!["body.name"]);

    let bound = bind(&schema, &put_json("/", &json!({"name": "a", "description": null}))).unwrap();
    assert_eq!(bound.get("description"), Some(&BoundValue::Null));
    assert!(bound.is_set("description"));
}

#[test]
fn test_media_type_mismatch_skips_body_only() {
    let raw = get("/items/abc")
        .with_path_param("item_id", "abc")
        .with_body("text/plain", "name=Foo");
    let errs = bind(&common::update_item(), &raw).unwrap_err();
    assert_eq!(locs(&errs), vec!["item_id", "body"]);
    assert_eq!(errs.at("body").unwrap().kind, ErrorKind::UnsupportedMediaType);
}

#[test]
fn test_malformed_json_and_empty_body() {
    let raw = get("/items/1")
        .with_path_param("item_id", "1")
        .with_body("application/json", "{\"name\": ");
    let errs = bind(&common::update_item(), &raw).unwrap_err();
    assert_eq!(locs(&errs), vec!["body"]);
    assert_eq!(errs.errors()[0].kind, ErrorKind::TypeError);

    let errs = bind(&common::update_item(), &get("/items/1").with_path_param("item_id", "1")).unwrap_err();
    assert_eq!(locs(&errs), vec!["body"]);
    assert_eq!(errs.errors()[0].kind, ErrorKind::Missing);
}

#[test]
fn test_vendor_json_media_type_is_accepted() {
    let raw = get("/items/1")
        .with_path_param("item_id", "1")
        .with_body("application/vnd.api+json; charset=utf-8", r#"{"name":"Foo","price":1}"#);
    assert!(bind(&common::update_item(), &raw).is_ok());
}

#[test]
fn test_body_size_limit() {
    let raw = put_json("/", &json!({"name": "Foo", "price": 1.0})).with_path_param("item_id", "1");
    let errs = bind_with(&common::update_item(), &raw, &BindOptions { max_body_bytes: 8 }).unwrap_err();
    assert_eq!(locs(&errs), vec!["body"]);
    assert_eq!(errs.errors()[0].kind, ErrorKind::RangeError);
}

#[test]
fn test_form_body() {
    let raw = get("/login").with_form_body(&[("username", "johndoe"), ("password", "secret")]);
    let bound = bind(&common::login_form(), &raw).unwrap();
    assert_eq!(bound.to_json(), json!({"username": "johndoe", "password": "secret"}));

    let raw = get("/login").with_form_body(&[("username", "johndoe")]);
    let errs = bind(&common::login_form(), &raw).unwrap_err();
    assert_eq!(locs(&errs), vec!["body.password"]);

    let raw = put_json("/login", &json!({"username": "a", "password": "b"}));
    let errs = bind(&common::login_form(), &raw).unwrap_err();
    assert_eq!(errs.errors()[0].kind, ErrorKind::UnsupportedMediaType);
}

#[test]
fn test_multipart_files_and_fields() {
    let schema = ObjectSchema::builder("Upload")
        .field(FieldSpec::body("file", SemanticType::File).required())
        .field(FieldSpec::body("token", SemanticType::String).required())
        .field(FieldSpec::body("extras", SemanticType::list_of(SemanticType::File)))
        .encoding(BodyEncoding::Multipart)
        .build()
        .unwrap();
    let body = "--XyZ\r\n\
        Content-Disposition: form-data; name=\"token\"\r\n\r\n\
        abc\r\n\
        --XyZ\r\n\
        Content-Disposition: form-data; name=\"file\"; filename=\"a.txt\"\r\n\
        Content-Type: text/plain\r\n\r\n\
        hello\r\n\
        --XyZ--\r\n";
    let raw = get("/files").with_body("multipart/form-data; boundary=XyZ", body);
    let bound = bind(&schema, &raw).unwrap();
    let file = bound.get("file").and_then(BoundValue::as_file).unwrap();
    assert_eq!(file.filename.as_deref(), Some("a.txt"));
    assert_eq!(file.data, b"hello");
    assert_eq!(bound.get("token").and_then(BoundValue::as_str), Some("abc"));
    assert_eq!(bound.get("extras"), Some(&BoundValue::Absent));

    let raw = get("/files").with_body("multipart/form-data", body);
    let errs = bind(&schema, &raw).unwrap_err();
    assert_eq!(locs(&errs), vec!["body"]);

    let truncated = "--XyZ\r\n\
        Content-Disposition: form-data; name=\"token\"\r\n\r\n\
        abc";
    let raw = get("/files").with_body("multipart/form-data; boundary=XyZ", truncated);
    let errs = bind(&schema, &raw).unwrap_err();
    assert_eq!(locs(&errs), vec!["body"]);
    assert_eq!(errs.errors()[0].kind, ErrorKind::TypeError);
    assert!(errs.errors()[0].message.starts_with("invalid multipart body"));
}
