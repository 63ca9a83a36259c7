use auditfilter_core::definition::{Operator, ValidationError};
use auditfilter_core::{canonicalize, validate};
use proptest::prelude::*;
use serde_json::{Map, Value, json};

/// Keys that never collide with the logical operators.
fn arb_key() -> impl Strategy<Value = String> {
    "[a-z_]{1,8}".prop_filter("operator key", |key| {
        !Operator::ALL.iter().any(|op| op.key() == key)
    })
}

fn arb_scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        "[ -~]{0,12}".prop_map(Value::String),
    ]
}

/// Arbitrary JSON made of plain (operator-free) objects and arrays.
fn arb_plain() -> impl Strategy<Value = Value> {
    arb_scalar().prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map(arb_key(), inner, 0..4)
                .prop_map(|map| Value::Object(map.into_iter().collect())),
        ]
    })
}

/// Well-formed condition trees: exactly one operator per logical node.
fn arb_condition() -> impl Strategy<Value = Value> {
    let leaf = (arb_key(), arb_scalar())
        .prop_map(|(name, value)| json!({"field": {"name": name, "value": value}}));
    leaf.prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 1..4).prop_map(|items| json!({"and": items})),
            prop::collection::vec(inner.clone(), 1..4).prop_map(|items| json!({"or": items})),
            inner.prop_map(|item| json!({"not": item})),
        ]
    })
}

fn arb_definition() -> impl Strategy<Value = Value> {
    (arb_plain(), arb_condition(), arb_key()).prop_map(|(extra, condition, class)| {
        json!({
            "filter": {
                "class": {"name": class, "event": {"log": condition}},
                "extra": extra,
            }
        })
    })
}

/// Two distinct operators, in canonical order.
fn arb_operator_pair() -> impl Strategy<Value = (Operator, Operator)> {
    (0..4usize, 0..4usize)
        .prop_filter("distinct", |(a, b)| a != b)
        .prop_map(|(a, b)| (Operator::ALL[a.min(b)], Operator::ALL[a.max(b)]))
}

fn operand(op: Operator) -> Value {
    match op {
        Operator::And | Operator::Or => json!([{"field": {"name": "x"}}]),
        Operator::Not | Operator::Field => json!({"field": {"name": "x"}}),
    }
}

/// One level of nesting around a node. Every layer is itself an object, so it
/// is a legal operand for the logical operators above it.
#[derive(Debug, Clone, Copy)]
enum Layer {
    Member,
    Element,
    And,
    Or,
    Not,
}

fn arb_layers() -> impl Strategy<Value = Vec<Layer>> {
    prop::collection::vec(
        prop_oneof![
            Just(Layer::Member),
            Just(Layer::Element),
            Just(Layer::And),
            Just(Layer::Or),
            Just(Layer::Not),
        ],
        0..6,
    )
}

/// Wrap `node` in `layers` (outermost first), returning the document and the
/// node's path.
fn bury(node: Value, layers: &[Layer]) -> (Value, String) {
    let mut value = node;
    for (level, layer) in layers.iter().enumerate().rev() {
        value = match layer {
            Layer::Member => json!({ format!("k{level}"): value }),
            Layer::Element => json!({ format!("k{level}"): [value] }),
            Layer::And => json!({ "and": [value] }),
            Layer::Or => json!({ "or": [value] }),
            Layer::Not => json!({ "not": value }),
        };
    }
    let path: String = layers
        .iter()
        .enumerate()
        .map(|(level, layer)| match layer {
            Layer::Member => format!(".k{level}"),
            Layer::Element => format!(".k{level}[0]"),
            Layer::And => ".and[0]".to_string(),
            Layer::Or => ".or[0]".to_string(),
            Layer::Not => ".not".to_string(),
        })
        .collect();
    (json!({ "filter": { "wrap": value } }), format!("$.filter.wrap{path}"))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    #[test]
    fn canonicalize_is_idempotent(doc in arb_definition()) {
        let once = canonicalize(&doc.to_string()).expect("canonical");
        let twice = canonicalize(&once).expect("canonical again");
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn canonical_form_ignores_whitespace(doc in arb_definition()) {
        let pretty = serde_json::to_string_pretty(&doc).expect("pretty");
        prop_assert_eq!(
            canonicalize(&pretty).expect("pretty canonical"),
            canonicalize(&doc.to_string()).expect("compact canonical")
        );
    }

    #[test]
    fn valid_definitions_stay_valid_after_canonicalize(doc in arb_definition()) {
        let text = doc.to_string();
        prop_assert!(validate(&text).is_ok());
        let canonical = canonicalize(&text).expect("canonical");
        prop_assert!(validate(&canonical).is_ok());
    }

    #[test]
    fn ambiguity_is_rejected_at_any_depth(
        (first, second) in arb_operator_pair(),
        layers in arb_layers(),
    ) {
        let mut node = Map::new();
        node.insert(first.key().to_string(), operand(first));
        node.insert(second.key().to_string(), operand(second));
        let (doc, expected) = bury(Value::Object(node), &layers);

        let err = validate(&doc.to_string()).expect_err("ambiguous node");
        match err {
            ValidationError::MultipleLogicalOperators { path, operators } => {
                prop_assert_eq!(path, expected);
                prop_assert_eq!(operators, vec![first, second]);
            }
            other => prop_assert!(false, "unexpected error: {other}"),
        }
    }
}

#[test]
fn ambiguity_under_logical_operators_reports_full_path() {
    let node = json!({"not": {"field": {"name": "x"}}, "or": [{"field": {"name": "y"}}]});
    let (doc, path) = bury(node, &[Layer::And, Layer::Not, Layer::Element, Layer::Or]);
    assert_eq!(path, "$.filter.wrap.and[0].not.k2[0].or[0]");

    let err = validate(&doc.to_string()).expect_err("ambiguous node");
    assert_eq!(err.path(), Some(path.as_str()));
}
