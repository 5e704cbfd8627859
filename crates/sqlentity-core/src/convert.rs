//! Attribute converters.
//!
//! A converter maps an attribute whose domain form differs from its stored
//! form, such as an enumeration stored as text.

use std::fmt;

use crate::error::{Error, Result, TypeError};

/// Two-way mapping between an attribute type `A` and its column form `C`.
pub trait AttributeConverter<A, C>: Send + Sync {
    /// Stored form of an attribute value.
    fn to_database_column(&self, attribute: &A) -> C;

    /// Domain form of a stored value.
    fn to_entity_attribute(&self, column: C) -> Result<A>;
}

/// Stores enumeration variants by name.
///
/// The stored name is the variant's `Debug` rendering, so fieldless enums
/// round-trip as their identifiers (`Genre::Fiction` <-> `"Fiction"`).
pub struct EnumConverter<A: 'static> {
    variants: &'static [A],
}

impl<A: fmt::Debug + 'static> EnumConverter<A> {
    /// Build a converter over every variant of `A`.
    pub const fn new(variants: &'static [A]) -> Self {
        Self { variants }
    }

    fn name_of(variant: &A) -> String {
        format!("{:?}", variant)
    }
}

impl<A> AttributeConverter<A, String> for EnumConverter<A>
where
    A: fmt::Debug + Clone + Send + Sync + 'static,
{
    fn to_database_column(&self, attribute: &A) -> String {
        Self::name_of(attribute)
    }

    fn to_entity_attribute(&self, column: String) -> Result<A> {
        self.variants
            .iter()
            .find(|v| Self::name_of(v) == column)
            .cloned()
            .ok_or_else(|| {
                Error::Type(TypeError {
                    expected: std::any::type_name::<A>(),
                    actual: format!("unknown variant '{}'", column),
                    column: None,
                })
            })
    }
}
