//! Converter surface consumed by descriptor units.
//!
//! `Converter` is the compiled, closed set of value-conversion strategies a
//! unit can carry; `CustomConverter` is the open trait for user-declared
//! converters supplied through the registry or at run time on an option set.
//! Factories are deferred resolvers and must yield a concrete converter
//! before use.

use std::sync::Arc;

use serde_json::Value;

use crate::engine::JsonWriter;
use crate::error::Error;
use crate::model::{DirectWrite, NamingPolicy};

pub type ConverterArc = Arc<dyn CustomConverter>;

/// Named converters the host registers ahead of generation.
pub type ConverterRegistry = indexmap::IndexMap<String, ConverterArc>;

// ------------------------------- User trait -------------------------------- //

pub trait CustomConverter: Send + Sync {
    fn name(&self) -> &str;

    /// Compatibility predicate over canonical type references.
    fn can_convert(&self, type_name: &str) -> bool;

    fn write(&self, w: &mut JsonWriter, value: &Value) -> Result<(), Error>;

    fn read(&self, value: &Value) -> Result<Value, Error>;

    /// Converters that are really factories surface themselves here.
    fn as_factory(&self) -> Option<&dyn ConverterFactory> {
        None
    }
}

pub trait ConverterFactory: Send + Sync {
    fn create(&self, type_name: &str) -> Option<ConverterArc>;
}

/// Resolve any factory indirection. A factory returning nothing, or another
/// factory, is a fatal configuration error at every resolution site.
pub fn resolve_converter(conv: ConverterArc, type_name: &str) -> Result<ConverterArc, Error> {
    let Some(factory) = conv.as_factory() else {
        return Ok(conv);
    };
    match factory.create(type_name) {
        Some(actual) if actual.as_factory().is_none() => Ok(actual),
        _ => Err(Error::InvalidFactoryResult {
            factory: conv.name().to_string(),
        }),
    }
}

// ----------------------------- Nullable adapter ---------------------------- //

/// Forwards non-null values to the underlying converter; null round-trips as
/// null. Used by the user-converter fallback path for nullable wrappers.
pub struct NullableAdapter {
    name: String,
    inner: ConverterArc,
}

impl NullableAdapter {
    pub fn new(inner: ConverterArc) -> Self {
        Self {
            name: format!("Nullable<{}>", inner.name()),
            inner,
        }
    }
}

impl CustomConverter for NullableAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn can_convert(&self, type_name: &str) -> bool {
        self.inner.can_convert(type_name)
    }

    fn write(&self, w: &mut JsonWriter, value: &Value) -> Result<(), Error> {
        if value.is_null() {
            w.null();
            return Ok(());
        }
        self.inner.write(w, value)
    }

    fn read(&self, value: &Value) -> Result<Value, Error> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        self.inner.read(value)
    }
}

// --------------------------- Compiled converters --------------------------- //

/// The conversion strategy a value-shaped unit carries. Cross-unit references
/// go through idents resolved against the compiled context, which is what
/// keeps cyclic graphs representable.
pub enum Converter {
    /// Statically known converter; `None` means the type is not in the
    /// primitive set and its value passes through as raw JSON.
    Known(Option<DirectWrite>),
    /// Generic enumerated-value converter driven by the context's naming
    /// policy at generation time.
    Enum {
        variants: Vec<String>,
        policy: NamingPolicy,
    },
    /// Nullable adapter over the underlying unit (sentinel when the
    /// underlying type was unsupported).
    Nullable { underlying: DepRef },
    Custom(ConverterArc),
}

/// Reference to a dependency unit. `ident` is `None` exactly when the
/// dependency was unsupported; using it then is a runtime error naming the
/// type, never a generation failure.
#[derive(Debug, Clone)]
pub struct DepRef {
    pub ident: Option<String>,
    pub type_name: String,
}

impl DepRef {
    pub fn require(&self) -> Result<&str, Error> {
        self.ident.as_deref().ok_or_else(|| Error::NoMetadata {
            type_name: self.type_name.clone(),
        })
    }
}

// --------------------------------- Tests ----------------------------------- //
