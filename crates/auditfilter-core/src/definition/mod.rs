//! Filter definitions: structural validation and canonical text.

pub mod canonical;
pub mod condition;
pub mod validate;

pub use canonical::{canonicalize, same_definition, to_canonical};
pub use condition::{ConditionNode, Operator};
pub use validate::{FILTER_ROOT_KEY, ValidationError, validate};

/// A named filter definition that passed validation.
///
/// `normalized_text` is always the canonical form of `raw_text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterDefinition {
    pub name: String,
    pub raw_text: String,
    pub normalized_text: String,
}

impl FilterDefinition {
    /// Validate `raw_text` and build a definition from it.
    ///
    /// # Errors
    ///
    /// Returns the [`ValidationError`] reported by [`validate()`].
    pub fn parse(name: impl Into<String>, raw_text: impl Into<String>) -> Result<Self, ValidationError> {
        let raw_text = raw_text.into();
        let document = validate::parse_document(&raw_text)?;
        validate::validate_document(&document)?;
        Ok(Self {
            name: name.into(),
            normalized_text: to_canonical(&document),
            raw_text,
        })
    }
}
