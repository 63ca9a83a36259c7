//! Sum-type view over the JSON values of a filter definition.
//!
//! [`Node`] separates objects, arrays and scalars; [`ConditionNode`] further
//! splits an object by the logical operator it defines. The validator walks
//! these instead of probing `serde_json::Value` ad hoc.

use serde_json::{Map, Value};
use std::fmt;

/// One of the four reserved logical-condition keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operator {
    And,
    Or,
    Not,
    Field,
}

impl Operator {
    /// Reserved keys in the order they are reported.
    pub const ALL: [Self; 4] = [Self::And, Self::Or, Self::Not, Self::Field];

    /// JSON key for this operator.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
            Self::Not => "not",
            Self::Field => "field",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Coarse JSON type, used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonKind {
    Null,
    Bool,
    Number,
    String,
    Array,
    Object,
}

impl JsonKind {
    #[must_use]
    pub const fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Bool,
            Value::Number(_) => Self::Number,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Object,
        }
    }
}

impl fmt::Display for JsonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Null => "null",
            Self::Bool => "boolean",
            Self::Number => "number",
            Self::String => "string",
            Self::Array => "array",
            Self::Object => "object",
        };
        f.write_str(name)
    }
}

/// Borrowed view of a JSON value.
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    Object(&'a Map<String, Value>),
    Array(&'a [Value]),
    Scalar,
}

impl<'a> Node<'a> {
    #[must_use]
    pub fn of(value: &'a Value) -> Self {
        match value {
            Value::Object(map) => Self::Object(map),
            Value::Array(items) => Self::Array(items),
            _ => Self::Scalar,
        }
    }
}

/// Why an operator's operand has the wrong shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandFault {
    /// `and`/`or` operand is not an array.
    NotAnArray(JsonKind),
    /// `and`/`or` operand is an empty array.
    EmptyArray,
    /// An `and`/`or` element is not an object.
    ElementNotObject { index: usize, found: JsonKind },
    /// `not`/`field` operand is not an object.
    NotAnObject(JsonKind),
}

impl fmt::Display for OperandFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAnArray(found) => {
                write!(f, "must be an array of condition objects, found {found}")
            }
            Self::EmptyArray => f.write_str("must contain at least one condition object"),
            Self::ElementNotObject { found, .. } => {
                write!(f, "must be a condition object, found {found}")
            }
            Self::NotAnObject(found) => write!(f, "must be an object, found {found}"),
        }
    }
}

/// Classification failure for a single object, before a path is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifyError {
    /// More than one reserved key on the same object.
    Ambiguous(Vec<Operator>),
    /// Exactly one reserved key, but its value has the wrong shape.
    Operand {
        operator: Operator,
        fault: OperandFault,
    },
}

/// A JSON object classified by the logical operator it defines.
///
/// `And`/`Or` elements are guaranteed to be objects once classification
/// succeeds.
#[derive(Debug, Clone, Copy)]
pub enum ConditionNode<'a> {
    And(&'a [Value]),
    Or(&'a [Value]),
    Not(&'a Map<String, Value>),
    Field(&'a Map<String, Value>),
    /// No reserved key: arbitrary metadata such as `class`, `event`, `name`.
    Passthrough(&'a Map<String, Value>),
}

impl<'a> ConditionNode<'a> {
    /// Classify `object` by its reserved keys and check the operand shape.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifyError::Ambiguous`] when two or more reserved keys are
    /// present, or [`ClassifyError::Operand`] when the single operator's value
    /// has the wrong shape.
    pub fn classify(object: &'a Map<String, Value>) -> Result<Self, ClassifyError> {
        let present: Vec<Operator> = Operator::ALL
            .into_iter()
            .filter(|op| object.contains_key(op.key()))
            .collect();

        let operator = match present.as_slice() {
            [] => return Ok(Self::Passthrough(object)),
            [single] => *single,
            _ => return Err(ClassifyError::Ambiguous(present)),
        };

        let operand = &object[operator.key()];
        let fault = |fault| ClassifyError::Operand { operator, fault };

        match operator {
            Operator::And | Operator::Or => {
                let Value::Array(items) = operand else {
                    return Err(fault(OperandFault::NotAnArray(JsonKind::of(operand))));
                };
                if items.is_empty() {
                    return Err(fault(OperandFault::EmptyArray));
                }
                if let Some((index, item)) = items.iter().enumerate().find(|(_, v)| !v.is_object())
                {
                    return Err(fault(OperandFault::ElementNotObject {
                        index,
                        found: JsonKind::of(item),
                    }));
                }
                Ok(if operator == Operator::And {
                    Self::And(items)
                } else {
                    Self::Or(items)
                })
            }
            Operator::Not | Operator::Field => {
                let Value::Object(inner) = operand else {
                    return Err(fault(OperandFault::NotAnObject(JsonKind::of(operand))));
                };
                Ok(if operator == Operator::Not {
                    Self::Not(inner)
                } else {
                    Self::Field(inner)
                })
            }
        }
    }

    /// The operator this node uses, or `None` for a passthrough object.
    #[must_use]
    pub const fn operator(&self) -> Option<Operator> {
        match self {
            Self::And(_) => Some(Operator::And),
            Self::Or(_) => Some(Operator::Or),
            Self::Not(_) => Some(Operator::Not),
            Self::Field(_) => Some(Operator::Field),
            Self::Passthrough(_) => None,
        }
    }
}
