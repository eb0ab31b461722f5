//! Metadata-unit synthesizer: one lazily-initialized descriptor holder per
//! reachable type.
//!
//! A unit's `TypeInfo` is computed on first access and cached in a
//! `OnceCell`; construction is idempotent and side-effect free, so
//! concurrent first access is benign. Cross-unit references are carried as
//! idents and resolved against the compiled context at run time, which is
//! what lets self- and mutually-referential object shapes build without a
//! dependency order.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde_json::{Map, Value};

use crate::context::CompiledContext;
use crate::convert::{resolve_converter, Converter, DepRef, NullableAdapter};
use crate::error::Error;
use crate::fastpath::FastPathFn;
use crate::model::{
    ConstructionStrategy, ContextPolicy, GenerationSpec, IgnoreCondition, NumberHandling,
    PropertyDescriptor, TypeDescriptor, TypeShape,
};

pub type CreateFn = Arc<dyn Fn() -> Value + Send + Sync>;
pub type Getter = Arc<dyn Fn(&Value) -> Value + Send + Sync>;
pub type Setter = Arc<dyn Fn(&mut Value, Value) + Send + Sync>;
type BuildFn = Box<dyn Fn(&CompiledContext) -> Result<TypeInfo, Error> + Send + Sync>;
type PropInitFn = Box<dyn Fn() -> Vec<PropertyInfo> + Send + Sync>;

// ------------------------------ Holder ------------------------------------- //

/// One descriptor-construction unit: identifier plus compute-on-first-access
/// descriptor.
pub struct MetadataUnit {
    pub ident: String,
    pub type_name: String,
    pub shape_name: &'static str,
    pub has_fast_path: bool,
    cell: OnceCell<TypeInfo>,
    build: BuildFn,
}

impl MetadataUnit {
    /// Construct-and-cache-if-absent; subsequent accesses return the cached
    /// descriptor. Failures are not cached, so a fixed configuration can be
    /// retried.
    pub fn type_info(&self, ctx: &CompiledContext) -> Result<&TypeInfo, Error> {
        self.cell.get_or_try_init(|| (self.build)(ctx))
    }
}

// ------------------------------ Descriptor --------------------------------- //

pub struct TypeInfo {
    pub type_name: String,
    pub can_be_null: bool,
    /// Effective: the type's override, else the context default.
    pub number_handling: NumberHandling,
    pub kind: TypeInfoKind,
}

pub enum TypeInfoKind {
    Value(Converter),
    Sequence {
        element: DepRef,
        make_empty: CreateFn,
    },
    Map {
        key: DepRef,
        value: DepRef,
        make_empty: CreateFn,
    },
    Object(ObjectInfo),
}

pub struct ObjectInfo {
    pub type_name: String,
    /// Zero-argument construction callback; absent under external-factory
    /// construction (decode then fails with `NoCreator`).
    pub create: Option<CreateFn>,
    pub fast_path: Option<FastPathFn>,
    props: OnceCell<Vec<PropertyInfo>>,
    prop_init: Option<PropInitFn>,
}

impl ObjectInfo {
    fn empty(type_name: String) -> Self {
        Self {
            type_name,
            create: None,
            fast_path: None,
            props: OnceCell::new(),
            prop_init: None,
        }
    }

    fn initialize(
        &mut self,
        create: Option<CreateFn>,
        prop_init: Option<PropInitFn>,
        fast_path: Option<FastPathFn>,
    ) {
        self.create = create;
        self.prop_init = prop_init;
        self.fast_path = fast_path;
    }

    /// The ordered property array, built on first use. Absent when the
    /// generation mode skipped metadata.
    pub fn properties(&self) -> Result<&[PropertyInfo], Error> {
        match &self.prop_init {
            Some(init) => Ok(self.props.get_or_init(|| init()).as_slice()),
            None => Err(Error::NoMetadata {
                type_name: self.type_name.clone(),
            }),
        }
    }
}

/// One member, with capability flags resolved into closures and per-member
/// overrides falling back to context defaults at the use site.
#[derive(Clone)]
pub struct PropertyInfo {
    pub member_name: String,
    pub is_property: bool,
    pub is_read_only: bool,
    pub explicit_include: bool,
    pub wire_override: Option<String>,
    pub ignore: Option<IgnoreCondition>,
    pub converter: Option<crate::convert::ConverterArc>,
    pub number_handling: Option<NumberHandling>,
    pub target: DepRef,
    pub target_can_be_null: bool,
    pub getter: Option<Getter>,
    pub setter: Option<Setter>,
}

// ------------------------------ Synthesis ---------------------------------- //

fn dep(spec: &GenerationSpec, id: crate::model::TypeId) -> DepRef {
    let t = spec.graph.get(id);
    DepRef {
        ident: (!matches!(t.shape, TypeShape::Unsupported)).then(|| t.ident.clone()),
        type_name: t.name.clone(),
    }
}

/// Build the unit for one classified type. The returned holder is inert; no
/// descriptor exists until first access.
pub fn synthesize(
    spec: &GenerationSpec,
    policy: &ContextPolicy,
    desc: &TypeDescriptor,
    fast_path: Option<FastPathFn>,
) -> Result<MetadataUnit, Error> {
    let type_name = desc.name.clone();
    let can_be_null = desc.can_be_null;
    let number_handling = desc.number_handling.unwrap_or(policy.number_handling);
    let has_fast_path = fast_path.is_some();

    let info = move |kind: TypeInfoKind| TypeInfo {
        type_name: type_name.clone(),
        can_be_null,
        number_handling,
        kind,
    };

    let build: BuildFn = match &desc.shape {
        TypeShape::Known => {
            let direct = spec.primitives.direct_write(&desc.name);
            Box::new(move |_ctx| Ok(info(TypeInfoKind::Value(Converter::Known(direct)))))
        }

        TypeShape::Custom { converter, underlying } => {
            let declared = spec
                .converters
                .get(converter)
                .cloned()
                .ok_or_else(|| Error::UnknownConverter { name: converter.clone() })?;
            let requested = desc.name.clone();
            let underlying_name = underlying.map(|id| spec.graph.get(id).name.clone());
            Box::new(move |_ctx| {
                // Validated at the moment of construction: the declared
                // converter must convert the exact type, or a nullable
                // wrapping of a convertible underlying type.
                let mut converter = declared.clone();
                if !converter.can_convert(&requested) {
                    match underlying_name.as_deref() {
                        Some(u) if converter.can_convert(u) => {
                            let actual = resolve_converter(converter, u)?;
                            converter = Arc::new(NullableAdapter::new(actual));
                        }
                        _ => {
                            return Err(Error::IncompatibleConverter {
                                converter: declared.name().to_string(),
                                type_name: requested.clone(),
                            });
                        }
                    }
                } else {
                    converter = resolve_converter(converter, &requested)?;
                }
                Ok(info(TypeInfoKind::Value(Converter::Custom(converter))))
            })
        }

        TypeShape::Nullable { underlying } => {
            let underlying = dep(spec, *underlying);
            Box::new(move |_ctx| {
                Ok(info(TypeInfoKind::Value(Converter::Nullable {
                    underlying: underlying.clone(),
                })))
            })
        }

        TypeShape::Enum { variants } => {
            let variants = variants.clone();
            let naming = policy.naming_policy;
            Box::new(move |_ctx| {
                Ok(info(TypeInfoKind::Value(Converter::Enum {
                    variants: variants.clone(),
                    policy: naming,
                })))
            })
        }

        TypeShape::Sequence { element } => {
            let element = dep(spec, *element);
            Box::new(move |_ctx| {
                Ok(info(TypeInfoKind::Sequence {
                    element: element.clone(),
                    make_empty: Arc::new(|| Value::Array(Vec::new())),
                }))
            })
        }

        TypeShape::Map { key, value } => {
            let key = dep(spec, *key);
            let value = dep(spec, *value);
            Box::new(move |_ctx| {
                Ok(info(TypeInfoKind::Map {
                    key: key.clone(),
                    value: value.clone(),
                    make_empty: Arc::new(|| Value::Object(Map::new())),
                }))
            })
        }

        TypeShape::Object { properties, construction } => {
            let object_name = desc.name.clone();
            let parameterless = matches!(construction, ConstructionStrategy::Parameterless);
            let seeds: Option<Vec<PropSeed>> = desc
                .generate_metadata
                .then(|| properties.iter().map(|p| PropSeed::new(spec, p)).collect::<Result<_, _>>())
                .transpose()?;
            Box::new(move |_ctx| {
                // Empty descriptor first so mutually-referential members can
                // already point at this unit while their own units build.
                let mut object = ObjectInfo::empty(object_name.clone());
                let create: Option<CreateFn> =
                    parameterless.then(|| Arc::new(|| Value::Object(Map::new())) as CreateFn);
                let prop_init: Option<PropInitFn> = seeds.clone().map(|seeds| {
                    Box::new(move || seeds.iter().map(PropSeed::to_property).collect())
                        as PropInitFn
                });
                object.initialize(create, prop_init, fast_path.clone());
                Ok(info(TypeInfoKind::Object(object)))
            })
        }

        TypeShape::Unsupported => {
            // The walker reports and skips unsupported types before synthesis.
            return Err(Error::NoMetadata {
                type_name: desc.name.clone(),
            });
        }
    };

    Ok(MetadataUnit {
        ident: desc.ident.clone(),
        type_name: desc.name.clone(),
        shape_name: desc.shape.name(),
        has_fast_path,
        cell: OnceCell::new(),
        build,
    })
}

/// Owned snapshot of one property, captured at synthesis time so the build
/// closure stays 'static.
#[derive(Clone)]
struct PropSeed {
    member_name: String,
    is_property: bool,
    is_read_only: bool,
    has_getter: bool,
    has_setter: bool,
    explicit_include: bool,
    wire_override: Option<String>,
    ignore: Option<IgnoreCondition>,
    converter: Option<crate::convert::ConverterArc>,
    number_handling: Option<NumberHandling>,
    target: DepRef,
    target_can_be_null: bool,
}

impl PropSeed {
    fn new(spec: &GenerationSpec, p: &PropertyDescriptor) -> Result<Self, Error> {
        let converter = match &p.converter {
            Some(name) => Some(
                spec.converters
                    .get(name)
                    .cloned()
                    .ok_or_else(|| Error::UnknownConverter { name: name.clone() })?,
            ),
            None => None,
        };
        Ok(Self {
            member_name: p.member_name.clone(),
            is_property: p.is_property,
            is_read_only: p.is_read_only,
            has_getter: p.has_getter,
            has_setter: p.has_setter,
            explicit_include: p.explicit_include,
            wire_override: p.wire_name.clone(),
            ignore: p.ignore,
            converter,
            number_handling: p.number_handling,
            target: dep(spec, p.target),
            target_can_be_null: spec.graph.get(p.target).can_be_null,
        })
    }

    fn to_property(&self) -> PropertyInfo {
        let getter: Option<Getter> = self.has_getter.then(|| {
            let member = self.member_name.clone();
            Arc::new(move |obj: &Value| obj.get(&member).cloned().unwrap_or(Value::Null)) as Getter
        });
        let setter: Option<Setter> = self.has_setter.then(|| {
            let member = self.member_name.clone();
            Arc::new(move |obj: &mut Value, v: Value| {
                if let Some(map) = obj.as_object_mut() {
                    map.insert(member.clone(), v);
                }
            }) as Setter
        });
        PropertyInfo {
            member_name: self.member_name.clone(),
            is_property: self.is_property,
            is_read_only: self.is_read_only,
            explicit_include: self.explicit_include,
            wire_override: self.wire_override.clone(),
            ignore: self.ignore,
            converter: self.converter.clone(),
            number_handling: self.number_handling,
            target: self.target.clone(),
            target_can_be_null: self.target_can_be_null,
            getter,
            setter,
        }
    }
}

// --------------------------------- Tests ----------------------------------- //
