//! Structural validation of filter definitions.
//!
//! A definition is accepted when:
//!
//! 1. it parses as JSON,
//! 2. the root is an object,
//! 3. the root has a `filter` key whose value is an object, and
//! 4. every object in the document uses at most one of `and`, `or`, `not`,
//!    `field`, with the operand shape that operator requires.
//!
//! The walk covers the whole document, not only the `filter` subtree, so
//! logical operators misplaced anywhere are caught. Paths in diagnostics use
//! `$` for the root, `.key` for object members and `[i]` for array elements.
//!
//! Validation is pure; it never touches a store.

use serde_json::{Map, Value};

use super::condition::{ClassifyError, ConditionNode, JsonKind, Node, OperandFault, Operator};

/// Key that must hold the filter body at the root of every definition.
pub const FILTER_ROOT_KEY: &str = "filter";

/// Why a filter definition was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// The text is not JSON.
    #[error("the filter definition must be valid JSON: {message}")]
    MalformedJson {
        message: String,
        line: usize,
        column: usize,
    },

    /// The root value is JSON but not an object.
    #[error("the filter definition must be a JSON object, found {found}")]
    NotAnObject { found: JsonKind },

    /// The root object lacks a `filter` object.
    #[error("{}", describe_missing_root(.found.as_ref()))]
    MissingFilterRoot { found: Option<JsonKind> },

    /// An object uses two or more reserved keys.
    #[error(
        "{path} contains multiple logical operators ({}); each condition object must contain exactly one of and, or, not, field",
        join_operators(.operators)
    )]
    MultipleLogicalOperators {
        path: String,
        operators: Vec<Operator>,
    },

    /// A reserved key's value has the wrong shape.
    #[error("{path} {fault}")]
    InvalidOperand {
        path: String,
        operator: Operator,
        fault: OperandFault,
    },
}

impl ValidationError {
    /// JSON path of the offending node, for errors that have one.
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::MultipleLogicalOperators { path, .. } | Self::InvalidOperand { path, .. } => {
                Some(path)
            }
            Self::MalformedJson { .. } | Self::NotAnObject { .. } | Self::MissingFilterRoot { .. } => {
                None
            }
        }
    }
}

fn describe_missing_root(found: Option<&JsonKind>) -> String {
    match found {
        None => format!("the filter definition must include a top-level \"{FILTER_ROOT_KEY}\" object"),
        Some(kind) => format!("the \"{FILTER_ROOT_KEY}\" value must be a JSON object, found {kind}"),
    }
}

fn join_operators(operators: &[Operator]) -> String {
    operators
        .iter()
        .map(|op| op.key())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Validate a filter definition.
///
/// # Errors
///
/// Returns the first [`ValidationError`] found. Object members are visited in
/// the map's iteration order, so the same input always yields the same error.
pub fn validate(text: &str) -> Result<(), ValidationError> {
    let document = parse_document(text)?;
    validate_document(&document)
}

/// Validate an already-parsed document.
///
/// # Errors
///
/// See [`validate`].
pub fn validate_document(document: &Value) -> Result<(), ValidationError> {
    let Value::Object(root) = document else {
        return Err(ValidationError::NotAnObject {
            found: JsonKind::of(document),
        });
    };

    match root.get(FILTER_ROOT_KEY) {
        Some(Value::Object(_)) => {}
        other => {
            return Err(ValidationError::MissingFilterRoot {
                found: other.map(JsonKind::of),
            });
        }
    }

    check_object(root, "$")
}

/// Parse definition text into a JSON value.
///
/// # Errors
///
/// Returns [`ValidationError::MalformedJson`] if the text is not JSON.
pub fn parse_document(text: &str) -> Result<Value, ValidationError> {
    serde_json::from_str(text).map_err(|err| ValidationError::MalformedJson {
        message: err.to_string(),
        line: err.line(),
        column: err.column(),
    })
}

fn check_tree(value: &Value, path: &str) -> Result<(), ValidationError> {
    match Node::of(value) {
        Node::Object(object) => check_object(object, path),
        Node::Array(items) => items
            .iter()
            .enumerate()
            .try_for_each(|(i, item)| check_tree(item, &format!("{path}[{i}]"))),
        Node::Scalar => Ok(()),
    }
}

fn check_object(object: &Map<String, Value>, path: &str) -> Result<(), ValidationError> {
    let node = ConditionNode::classify(object).map_err(|err| locate(err, path))?;

    match node {
        ConditionNode::And(items) | ConditionNode::Or(items) => {
            let key = node.operator().map_or("", Operator::key);
            items
                .iter()
                .enumerate()
                .try_for_each(|(i, item)| check_tree(item, &format!("{path}.{key}[{i}]")))
        }
        ConditionNode::Not(inner) => check_object(inner, &format!("{path}.not")),
        // Field operands are leaf comparisons; their contents are not conditions.
        ConditionNode::Field(_) => Ok(()),
        ConditionNode::Passthrough(members) => members
            .iter()
            .try_for_each(|(key, child)| check_tree(child, &format!("{path}.{key}"))),
    }
}

fn locate(err: ClassifyError, path: &str) -> ValidationError {
    match err {
        ClassifyError::Ambiguous(operators) => ValidationError::MultipleLogicalOperators {
            path: path.to_string(),
            operators,
        },
        ClassifyError::Operand { operator, fault } => {
            let path = match fault {
                OperandFault::ElementNotObject { index, .. } => format!("{path}.{operator}[{index}]"),
                _ => format!("{path}.{operator}"),
            };
            ValidationError::InvalidOperand {
                path,
                operator,
                fault,
            }
        }
    }
}
