//! Descriptor model: the strongly-typed input the compiler walks.
//!
//! Two layers live here:
//! - the serde-deserializable front-end input (`GenerationInput` etc.), in
//!   which types reference each other by canonical name;
//! - the resolved, arena-style `TypeGraph` of immutable `TypeDescriptor`s
//!   keyed by `TypeId`. Identity equality (not structural equality) drives
//!   memoization and duplicate detection downstream.
//!
//! Descriptors are constructed exactly once during `GenerationSpec::resolve`
//! and never mutated afterwards.

use std::collections::BTreeSet;

use indexmap::{IndexMap, IndexSet};
use serde::Deserialize;

use crate::convert::ConverterRegistry;
use crate::error::Error;

// ------------------------------- Identity --------------------------------- //

/// Index into the `TypeGraph` arena. Shared links and cycles are expressed
/// through ids, never through owned recursion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

// -------------------------------- Policy ---------------------------------- //

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingPolicy {
    #[default]
    Verbatim,
    CamelCase,
}

impl NamingPolicy {
    pub fn apply(&self, member: &str) -> String {
        match self {
            NamingPolicy::Verbatim => member.to_string(),
            NamingPolicy::CamelCase => camel_case(member),
        }
    }
}

/// Lowercase the leading uppercase run, keeping the last capital of the run
/// when it starts a new word ("URLValue" → "urlValue", "URL" → "url").
pub fn camel_case(s: &str) -> String {
    let mut out: Vec<char> = s.chars().collect();
    for i in 0..out.len() {
        if !out[i].is_uppercase() {
            break;
        }
        if i > 0 && i + 1 < out.len() && !out[i + 1].is_uppercase() {
            break;
        }
        if let Some(lower) = out[i].to_lowercase().next() {
            out[i] = lower;
        }
    }
    out.into_iter().collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreCondition {
    #[default]
    Never,
    Always,
    WhenWritingNull,
    WhenWritingDefault,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberHandling {
    #[default]
    Strict,
    WriteAsString,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    Metadata,
    Serialization,
    #[default]
    MetadataAndSerialization,
}

impl GenerationMode {
    pub fn metadata(&self) -> bool {
        matches!(self, GenerationMode::Metadata | GenerationMode::MetadataAndSerialization)
    }
    pub fn serialization(&self) -> bool {
        matches!(self, GenerationMode::Serialization | GenerationMode::MetadataAndSerialization)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstructionStrategy {
    #[default]
    Parameterless,
    ExternalFactory,
}

/// Per-context generation policy; doubles as the canonical default option
/// set the composer hands to the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ContextPolicy {
    pub naming_policy: NamingPolicy,
    pub default_ignore_condition: IgnoreCondition,
    pub ignore_read_only_properties: bool,
    pub ignore_read_only_fields: bool,
    pub include_fields: bool,
    pub write_indented: bool,
    pub number_handling: NumberHandling,
    pub honor_runtime_converters: bool,
}

impl Default for ContextPolicy {
    fn default() -> Self {
        Self {
            naming_policy: NamingPolicy::Verbatim,
            default_ignore_condition: IgnoreCondition::Never,
            ignore_read_only_properties: false,
            ignore_read_only_fields: false,
            include_fields: false,
            write_indented: false,
            number_handling: NumberHandling::Strict,
            honor_runtime_converters: true,
        }
    }
}

// ---------------------------- Primitive set -------------------------------- //

/// Identities of the built-in primitive shapes. The fast-path synthesizer
/// consults this to pick direct writer calls; everything else goes through
/// descriptors.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PrimitiveSet {
    pub string_like: BTreeSet<String>,
    pub boolean: BTreeSet<String>,
    pub byte_sequence: BTreeSet<String>,
    pub character: BTreeSet<String>,
    pub numeric: BTreeSet<String>,
}

impl Default for PrimitiveSet {
    fn default() -> Self {
        let set = |names: &[&str]| names.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>();
        Self {
            string_like: set(&["String", "str"]),
            boolean: set(&["bool"]),
            byte_sequence: set(&["Bytes", "Vec<u8>"]),
            character: set(&["char"]),
            numeric: set(&[
                "i8", "i16", "i32", "i64", "u8", "u16", "u32", "u64", "usize", "isize", "f32",
                "f64",
            ]),
        }
    }
}

/// Which primitive writer call a member resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectWrite {
    String,
    Boolean,
    Base64,
    Char,
    Number,
}

impl PrimitiveSet {
    pub fn direct_write(&self, type_name: &str) -> Option<DirectWrite> {
        if self.string_like.contains(type_name) {
            Some(DirectWrite::String)
        } else if self.boolean.contains(type_name) {
            Some(DirectWrite::Boolean)
        } else if self.byte_sequence.contains(type_name) {
            Some(DirectWrite::Base64)
        } else if self.character.contains(type_name) {
            Some(DirectWrite::Char)
        } else if self.numeric.contains(type_name) {
            Some(DirectWrite::Number)
        } else {
            None
        }
    }
}

// ------------------------------ Descriptors -------------------------------- //

/// Closed shape classification; every dispatch site matches exhaustively so
/// adding a shape is a compile-time exercise.
#[derive(Debug, Clone)]
pub enum TypeShape {
    /// Built-in type with a statically known converter.
    Known,
    /// User-declared converter, referenced by registry name. `underlying` is
    /// set when the type is a nullable wrapping, enabling the fallback path.
    Custom {
        converter: String,
        underlying: Option<TypeId>,
    },
    Nullable {
        underlying: TypeId,
    },
    Enum {
        variants: Vec<String>,
    },
    Sequence {
        element: TypeId,
    },
    Map {
        key: TypeId,
        value: TypeId,
    },
    Object {
        properties: Vec<PropertyDescriptor>,
        construction: ConstructionStrategy,
    },
    Unsupported,
}

impl TypeShape {
    pub fn name(&self) -> &'static str {
        match self {
            TypeShape::Known => "known",
            TypeShape::Custom { .. } => "custom",
            TypeShape::Nullable { .. } => "nullable",
            TypeShape::Enum { .. } => "enum",
            TypeShape::Sequence { .. } => "sequence",
            TypeShape::Map { .. } => "map",
            TypeShape::Object { .. } => "object",
            TypeShape::Unsupported => "unsupported",
        }
    }
}

/// One reachable type. Immutable once resolved.
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    /// Canonical type reference, e.g. `Vec<Node>`.
    pub name: String,
    /// Generated identifier, unique per context (collisions are reported by
    /// the walker, never silently overwritten).
    pub ident: String,
    pub is_value_type: bool,
    /// Derived: reference types and nullable wrappers can observe null.
    pub can_be_null: bool,
    pub number_handling: Option<NumberHandling>,
    /// The type's whole closure consists of primitive-only shapes.
    pub primitive_only: bool,
    pub generate_metadata: bool,
    pub generate_serialization: bool,
    pub shape: TypeShape,
}

/// One serializable member of an object shape.
#[derive(Debug, Clone)]
pub struct PropertyDescriptor {
    pub member_name: String,
    pub is_property: bool,
    pub is_read_only: bool,
    pub has_getter: bool,
    pub has_setter: bool,
    /// Explicitly opted in despite default visibility rules.
    pub explicit_include: bool,
    pub wire_name: Option<String>,
    pub ignore: Option<IgnoreCondition>,
    pub converter: Option<String>,
    pub number_handling: Option<NumberHandling>,
    pub target: TypeId,
}

// --------------------------------- Graph ----------------------------------- //

#[derive(Debug, Clone, Default)]
pub struct TypeGraph {
    types: Vec<TypeDescriptor>,
    by_name: IndexMap<String, TypeId>,
}

impl TypeGraph {
    pub fn get(&self, id: TypeId) -> &TypeDescriptor {
        &self.types[id.0 as usize]
    }

    pub fn lookup(&self, name: &str) -> Option<TypeId> {
        self.by_name.get(name).copied()
    }
}

// ---------------------------- Generation spec ------------------------------ //

/// One named root generation unit: roots sharing a policy.
#[derive(Debug, Clone)]
pub struct ContextSpec {
    pub name: String,
    /// Distinct by identity, in declaration order.
    pub roots: Vec<TypeId>,
    pub policy: ContextPolicy,
}

/// The whole unit of work handed to the walker.
pub struct GenerationSpec {
    pub mode: GenerationMode,
    pub primitives: PrimitiveSet,
    pub graph: TypeGraph,
    pub contexts: Vec<ContextSpec>,
    pub converters: ConverterRegistry,
}

// ------------------------------ Front-end input ---------------------------- //

/// Serde mirror of `GenerationSpec` as produced by the front-end analyzer.
/// Types reference one another by name; `resolve` turns names into ids.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationInput {
    #[serde(default)]
    pub mode: GenerationMode,
    #[serde(default)]
    pub primitives: PrimitiveSet,
    pub types: Vec<TypeInput>,
    pub contexts: Vec<ContextInput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TypeInput {
    pub name: String,
    pub ident: String,
    #[serde(flatten)]
    pub shape: ShapeInput,
    #[serde(default)]
    pub value_type: bool,
    #[serde(default)]
    pub number_handling: Option<NumberHandling>,
    #[serde(default)]
    pub primitive_only: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum ShapeInput {
    Known,
    Custom {
        converter: String,
        #[serde(default)]
        underlying: Option<String>,
    },
    Nullable {
        underlying: String,
    },
    Enum {
        variants: Vec<String>,
    },
    Sequence {
        element: String,
    },
    Map {
        key: String,
        value: String,
    },
    Object {
        #[serde(default)]
        properties: Vec<PropertyInput>,
        #[serde(default)]
        construction: ConstructionStrategy,
    },
    Unsupported,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct PropertyInput {
    pub name: String,
    #[serde(rename = "type")]
    pub target: String,
    /// Fields opt out of property semantics; properties are the default.
    #[serde(default)]
    pub field: bool,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default = "default_true")]
    pub getter: bool,
    #[serde(default = "default_true")]
    pub setter: bool,
    #[serde(default)]
    pub include: bool,
    #[serde(default)]
    pub wire_name: Option<String>,
    #[serde(default)]
    pub ignore: Option<IgnoreCondition>,
    #[serde(default)]
    pub converter: Option<String>,
    #[serde(default)]
    pub number_handling: Option<NumberHandling>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContextInput {
    pub name: String,
    pub roots: Vec<String>,
    #[serde(default)]
    pub policy: ContextPolicy,
}

// ------------------------------- Resolution -------------------------------- //

impl GenerationSpec {
    /// Resolve the front-end input into an immutable graph. Fatal on dangling
    /// type references and on converter names absent from the registry.
    pub fn resolve(input: GenerationInput, converters: ConverterRegistry) -> Result<Self, Error> {
        let mut by_name: IndexMap<String, TypeId> = IndexMap::with_capacity(input.types.len());
        for (i, t) in input.types.iter().enumerate() {
            let prior = by_name.insert(t.name.clone(), TypeId(i as u32));
            if prior.is_some() {
                return Err(Error::DuplicateTypeRef { name: t.name.clone() });
            }
        }

        let lookup = |name: &str| -> Result<TypeId, Error> {
            by_name
                .get(name)
                .copied()
                .ok_or_else(|| Error::UnknownType { name: name.to_string() })
        };
        let check_converter = |name: Option<&str>| -> Result<(), Error> {
            match name {
                Some(n) if !converters.contains_key(n) => {
                    Err(Error::UnknownConverter { name: n.to_string() })
                }
                _ => Ok(()),
            }
        };

        let mut types = Vec::with_capacity(input.types.len());
        for t in &input.types {
            let shape = match &t.shape {
                ShapeInput::Known => TypeShape::Known,
                ShapeInput::Custom { converter, underlying } => {
                    check_converter(Some(converter))?;
                    TypeShape::Custom {
                        converter: converter.clone(),
                        underlying: underlying.as_deref().map(|n| lookup(n)).transpose()?,
                    }
                }
                ShapeInput::Nullable { underlying } => TypeShape::Nullable {
                    underlying: lookup(underlying)?,
                },
                ShapeInput::Enum { variants } => TypeShape::Enum {
                    variants: variants.clone(),
                },
                ShapeInput::Sequence { element } => TypeShape::Sequence {
                    element: lookup(element)?,
                },
                ShapeInput::Map { key, value } => TypeShape::Map {
                    key: lookup(key)?,
                    value: lookup(value)?,
                },
                ShapeInput::Object { properties, construction } => {
                    let mut props = Vec::with_capacity(properties.len());
                    for p in properties {
                        check_converter(p.converter.as_deref())?;
                        props.push(PropertyDescriptor {
                            member_name: p.name.clone(),
                            is_property: !p.field,
                            is_read_only: p.read_only,
                            has_getter: p.getter,
                            has_setter: p.setter && !p.read_only,
                            explicit_include: p.include,
                            wire_name: p.wire_name.clone(),
                            ignore: p.ignore,
                            converter: p.converter.clone(),
                            number_handling: p.number_handling,
                            target: lookup(&p.target)?,
                        });
                    }
                    TypeShape::Object {
                        properties: props,
                        construction: *construction,
                    }
                }
                ShapeInput::Unsupported => TypeShape::Unsupported,
            };

            let can_be_null = !t.value_type || matches!(shape, TypeShape::Nullable { .. });
            types.push(TypeDescriptor {
                name: t.name.clone(),
                ident: t.ident.clone(),
                is_value_type: t.value_type,
                can_be_null,
                number_handling: t.number_handling,
                primitive_only: t.primitive_only,
                generate_metadata: input.mode.metadata(),
                generate_serialization: input.mode.serialization(),
                shape,
            });
        }

        let graph = TypeGraph { types, by_name };

        let mut contexts = Vec::with_capacity(input.contexts.len());
        for cx in &input.contexts {
            // roots are distinct by identity, declaration order preserved
            let mut roots: IndexSet<TypeId> = IndexSet::with_capacity(cx.roots.len());
            for r in &cx.roots {
                roots.insert(graph.lookup(r).ok_or_else(|| Error::UnknownType { name: r.clone() })?);
            }
            contexts.push(ContextSpec {
                name: cx.name.clone(),
                roots: roots.into_iter().collect(),
                policy: cx.policy.clone(),
            });
        }

        Ok(Self {
            mode: input.mode,
            primitives: input.primitives,
            graph,
            contexts,
            converters,
        })
    }
}

// --------------------------------- Tests ----------------------------------- //
