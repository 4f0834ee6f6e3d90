use json_normalize::{denormalize, normalize_json, Normalizer, NormalizeConfig, SchemaDocument};
use serde_json::json;
use std::io::Cursor;

const BLOG_SCHEMA: &str = r#"{
    "schemas": {
        "posts": {"relations": {"author": "authors", "comments": ["comments"]}},
        "comments": {"relations": {"author": "authors"}},
        "authors": {}
    },
    "root": ["posts"]
}"#;

#[test]
fn blog_posts_from_schema_document() {
    let doc = SchemaDocument::from_json(BLOG_SCHEMA).unwrap();
    let shape = doc.root.clone().unwrap();

    let posts = json!([
        {
            "id": 1,
            "title": "Normalizing state",
            "author": {"id": 10, "name": "Dan"},
            "comments": [
                {"id": 100, "body": "Helpful", "author": {"id": 11, "name": "Sam"}},
                {"id": 101, "body": "Agreed", "author": {"id": 10, "name": "Dan"}}
            ]
        },
        {
            "id": 2,
            "title": "Entity tables",
            "author": {"id": 11, "name": "Sam"},
            "comments": [
                {"id": 102, "body": "Nice", "author": {"id": 10, "name": "Dan"}}
            ]
        }
    ]);

    let output = Normalizer::new(&doc.registry, NormalizeConfig::default())
        .normalize(&posts, &shape)
        .unwrap();

    assert_eq!(
        serde_json::to_value(&output).unwrap(),
        json!({
            "entities": {
                "authors": {
                    "10": {"id": 10, "name": "Dan"},
                    "11": {"id": 11, "name": "Sam"}
                },
                "comments": {
                    "100": {"id": 100, "body": "Helpful", "author": 11},
                    "101": {"id": 101, "body": "Agreed", "author": 10},
                    "102": {"id": 102, "body": "Nice", "author": 10}
                },
                "posts": {
                    "1": {"id": 1, "title": "Normalizing state", "author": 10, "comments": [100, 101]},
                    "2": {"id": 2, "title": "Entity tables", "author": 11, "comments": [102]}
                }
            },
            "result": [1, 2]
        })
    );

    let restored = denormalize(&output.result, &shape, &doc.registry, &output.entities).unwrap();
    assert_eq!(restored, posts);
}

#[test]
fn normalized_output_survives_serialization() {
    let doc = SchemaDocument::from_json(BLOG_SCHEMA).unwrap();
    let shape = SchemaDocument::parse_shape("posts").unwrap();

    let stream = concat!(
        r#"{"id": 1, "author": {"id": "a", "name": "Ann"}, "comments": []}"#,
        "\n",
        r#"{"id": 2, "author": {"id": "a", "name": "Ann"}, "comments": [{"id": 9, "author": "a"}]}"#,
        "\n",
    );

    let output = normalize_json(Cursor::new(stream), &doc.registry, &shape, NormalizeConfig::default()).unwrap();
    assert_eq!(output.result, json!([1, 2]));

    let text = serde_json::to_string(&output).unwrap();
    let parsed: json_normalize::NormalizedOutput = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed, output);

    let list_shape = SchemaDocument::parse_shape(r#"["posts"]"#).unwrap();
    let restored = denormalize(&parsed.result, &list_shape, &doc.registry, &parsed.entities).unwrap();
    assert_eq!(
        restored,
        json!([
            {"id": 1, "author": {"id": "a", "name": "Ann"}, "comments": []},
            {"id": 2, "author": {"id": "a", "name": "Ann"}, "comments": [{"id": 9, "author": {"id": "a", "name": "Ann"}}]}
        ])
    );
}
