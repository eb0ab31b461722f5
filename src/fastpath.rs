//! Fast-path synthesizer: direct-write encoders for object shapes.
//!
//! For each eligible member the synthesizer bakes the inclusion decision,
//! the wire name, and the elision check against the context policy at
//! generation time, so the emitted closure only reads values and writes
//! bytes. The runtime must gate invocation through the context's
//! eligibility guard; under any diverging option set the closure would
//! silently reproduce default-policy output.

use std::sync::Arc;

use indexmap::IndexSet;
use serde_json::Value;

use crate::context::{CompiledContext, JsonOptions};
use crate::convert::{ConverterArc, DepRef};
use crate::engine::{is_default_value, serialize_with, write_direct, JsonWriter};
use crate::error::Error;
use crate::metadata::TypeInfoKind;
use crate::model::{
    ContextPolicy, DirectWrite, GenerationSpec, IgnoreCondition, NumberHandling,
    PropertyDescriptor, TypeShape,
};

pub type FastPathFn = Arc<
    dyn Fn(&mut JsonWriter, &Value, &CompiledContext, &JsonOptions) -> Result<(), Error>
        + Send
        + Sync,
>;

// ----------------------------- Member policy ------------------------------- //

/// Which value-based elision check a member carries. Derived once from the
/// effective ignore condition crossed with the target's null-ness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultCheckType {
    None,
    Null,
    Default,
}

pub fn default_check(ignore: IgnoreCondition, target_can_be_null: bool) -> DefaultCheckType {
    match ignore {
        IgnoreCondition::WhenWritingNull => {
            if target_can_be_null {
                DefaultCheckType::Null
            } else {
                DefaultCheckType::None
            }
        }
        IgnoreCondition::WhenWritingDefault => {
            if target_can_be_null {
                DefaultCheckType::Null
            } else {
                DefaultCheckType::Default
            }
        }
        IgnoreCondition::Never | IgnoreCondition::Always => DefaultCheckType::None,
    }
}

/// Shared inclusion rule: read-only members obey the skip option for their
/// member kind, and fields must be opted in, either per member or context
/// wide.
pub fn member_included(
    is_property: bool,
    is_read_only: bool,
    explicit_include: bool,
    ignore_read_only_properties: bool,
    ignore_read_only_fields: bool,
    include_fields: bool,
) -> bool {
    if is_read_only {
        let skip = if is_property {
            ignore_read_only_properties
        } else {
            ignore_read_only_fields
        };
        if skip {
            return false;
        }
    }
    if !is_property && !explicit_include && !include_fields {
        return false;
    }
    true
}

// ------------------------------- Synthesis --------------------------------- //

enum WriteOp {
    Direct {
        dw: DirectWrite,
        type_name: String,
        handling: NumberHandling,
    },
    Converted(ConverterArc),
    Nested {
        target: DepRef,
        /// False when the target's closure is primitive-only; such types are
        /// never object-shaped, so the fast-path probe is skipped.
        probe_fast_path: bool,
    },
}

struct FastMember {
    member_name: String,
    wire: Arc<str>,
    check: DefaultCheckType,
    op: WriteOp,
}

fn intern(pool: &mut IndexSet<Arc<str>>, name: String) -> Arc<str> {
    if let Some(existing) = pool.get(name.as_str()) {
        return existing.clone();
    }
    let shared: Arc<str> = Arc::from(name);
    pool.insert(shared.clone());
    shared
}

/// Build the direct-write encoder for one object shape. Wire-name constants
/// are deduplicated through the context-wide `pool`.
pub fn synthesize_fast_path(
    spec: &GenerationSpec,
    policy: &ContextPolicy,
    type_name: &str,
    properties: &[PropertyDescriptor],
    pool: &mut IndexSet<Arc<str>>,
) -> Result<FastPathFn, Error> {
    let mut members = Vec::with_capacity(properties.len());
    for p in properties {
        if !member_included(
            p.is_property,
            p.is_read_only,
            p.explicit_include,
            policy.ignore_read_only_properties,
            policy.ignore_read_only_fields,
            policy.include_fields,
        ) {
            continue;
        }
        if !p.has_getter {
            continue;
        }
        let ignore = p.ignore.unwrap_or(policy.default_ignore_condition);
        let target = spec.graph.get(p.target);
        let wire = match &p.wire_name {
            Some(explicit) => intern(pool, explicit.clone()),
            None => intern(pool, policy.naming_policy.apply(&p.member_name)),
        };
        let op = if let Some(conv) = &p.converter {
            let conv = spec
                .converters
                .get(conv)
                .cloned()
                .ok_or_else(|| Error::UnknownConverter { name: conv.clone() })?;
            WriteOp::Converted(conv)
        } else if let (TypeShape::Known, Some(dw)) =
            (&target.shape, spec.primitives.direct_write(&target.name))
        {
            // a member-level numeric override only matters for number writes
            WriteOp::Direct {
                dw,
                type_name: target.name.clone(),
                handling: p
                    .number_handling
                    .or(target.number_handling)
                    .unwrap_or(policy.number_handling),
            }
        } else {
            WriteOp::Nested {
                target: DepRef {
                    ident: (!matches!(target.shape, TypeShape::Unsupported))
                        .then(|| target.ident.clone()),
                    type_name: target.name.clone(),
                },
                probe_fast_path: !target.primitive_only,
            }
        };
        members.push(FastMember {
            member_name: p.member_name.clone(),
            wire,
            check: default_check(ignore, spec.graph.get(p.target).can_be_null),
            op,
        });
    }

    let type_name = type_name.to_string();
    Ok(Arc::new(move |w, value, ctx, options| {
        if value.is_null() {
            w.null();
            return Ok(());
        }
        if !value.is_object() {
            return Err(Error::TypeMismatch {
                type_name: type_name.clone(),
                expected: "an object value",
            });
        }
        w.begin_object();
        for m in &members {
            let v = value.get(&m.member_name).cloned().unwrap_or(Value::Null);
            match m.check {
                DefaultCheckType::Null if v.is_null() => continue,
                DefaultCheckType::Default if is_default_value(&v) => continue,
                _ => {}
            }
            w.name(&m.wire);
            match &m.op {
                WriteOp::Direct { dw, type_name, handling } => {
                    write_direct(w, *dw, &v, type_name, *handling)?;
                }
                WriteOp::Converted(conv) => conv.write(w, &v)?,
                WriteOp::Nested { target, probe_fast_path } => {
                    let ident = target.require()?;
                    // a dependency's own fast path is preferred but may be
                    // absent; the generic engine is always a correct fallback
                    let nested = if *probe_fast_path {
                        match &ctx.unit(ident)?.type_info(ctx)?.kind {
                            TypeInfoKind::Object(obj) => obj.fast_path.clone(),
                            _ => None,
                        }
                    } else {
                        None
                    };
                    match nested {
                        Some(fp) => fp(w, &v, ctx, options)?,
                        None => serialize_with(ctx, ident, &v, w, options)?,
                    }
                }
            }
        }
        w.end_object();
        Ok(())
    }))
}

// --------------------------------- Tests ----------------------------------- //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::GenerationReport;
    use crate::convert::ConverterRegistry;
    use crate::engine::to_string;
    use crate::model::{GenerationInput, GenerationSpec};
    use crate::walker::compile;
    use serde_json::json;

    fn compile_input(input: Value) -> GenerationReport {
        let input: GenerationInput = serde_json::from_value(input).unwrap();
        let spec = GenerationSpec::resolve(input, ConverterRegistry::new()).unwrap();
        compile(&spec).unwrap()
    }

    #[test]
    fn inclusion_rule_covers_fields_and_read_only_members() {
        // property, writable: always in
        assert!(member_included(true, false, false, false, false, false));
        // read-only property skipped only under its own option
        assert!(member_included(true, true, false, false, true, false));
        assert!(!member_included(true, true, false, true, false, false));
        // fields need opting in
        assert!(!member_included(false, false, false, false, false, false));
        assert!(member_included(false, false, true, false, false, false));
        assert!(member_included(false, false, false, false, false, true));
        // read-only field skipped under the field option even when opted in
        assert!(!member_included(false, true, true, false, true, false));
    }

    #[test]
    fn elision_table_crosses_condition_with_nullability() {
        use DefaultCheckType::*;
        use IgnoreCondition::*;
        assert_eq!(default_check(Never, true), None);
        assert_eq!(default_check(Never, false), None);
        assert_eq!(default_check(Always, true), None);
        assert_eq!(default_check(WhenWritingNull, true), Null);
        assert_eq!(default_check(WhenWritingNull, false), None);
        assert_eq!(default_check(WhenWritingDefault, true), Null);
        assert_eq!(default_check(WhenWritingDefault, false), Default);
    }

    #[test]
    fn default_valued_member_is_elided() {
        let report = compile_input(json!({
            "types": [
                {"name": "String", "ident": "StringInfo", "shape": "known"},
                {"name": "i32", "ident": "Int32Info", "shape": "known", "value_type": true},
                {"name": "Pair", "ident": "PairInfo", "shape": "object", "properties": [
                    {"name": "Key", "type": "String"},
                    {"name": "Value", "type": "i32"},
                ]},
            ],
            "contexts": [{"name": "App", "roots": ["Pair"],
                          "policy": {"default_ignore_condition": "when_writing_default"}}],
        }));
        let ctx = &report.contexts[0];
        let options = ctx.default_options();
        let text = to_string(ctx, "Pair", &json!({"Key": "a", "Value": 0}), &options).unwrap();
        assert_eq!(text, "{\"Key\":\"a\"}");
        // a non-default value still writes
        let text = to_string(ctx, "Pair", &json!({"Key": "a", "Value": 7}), &options).unwrap();
        assert_eq!(text, "{\"Key\":\"a\",\"Value\":7}");
    }

    #[test]
    fn always_condition_suppresses_value_based_elision() {
        let report = compile_input(json!({
            "types": [
                {"name": "String", "ident": "StringInfo", "shape": "known"},
                {"name": "i32", "ident": "Int32Info", "shape": "known", "value_type": true},
                {"name": "Counter", "ident": "CounterInfo", "shape": "object", "properties": [
                    {"name": "Hits", "type": "i32"},
                    {"name": "Misses", "type": "i32", "ignore": "always"},
                ]},
            ],
            "contexts": [{"name": "App", "roots": ["Counter"],
                          "policy": {"default_ignore_condition": "when_writing_default"}}],
        }));
        let ctx = &report.contexts[0];
        let options = ctx.default_options();
        // the override disables the context's default-value check entirely
        let value = json!({"Hits": 0, "Misses": 0});
        let text = to_string(ctx, "Counter", &value, &options).unwrap();
        assert_eq!(text, "{\"Misses\":0}");
    }

    #[test]
    fn fields_are_excluded_unless_opted_in() {
        let types = json!([
            {"name": "String", "ident": "StringInfo", "shape": "known"},
            {"name": "Mixed", "ident": "MixedInfo", "shape": "object", "properties": [
                {"name": "Prop", "type": "String"},
                {"name": "Field", "type": "String", "field": true},
                {"name": "Opted", "type": "String", "field": true, "include": true},
            ]},
        ]);
        let value = json!({"Prop": "p", "Field": "f", "Opted": "o"});

        let report = compile_input(json!({
            "types": types,
            "contexts": [{"name": "App", "roots": ["Mixed"]}],
        }));
        let ctx = &report.contexts[0];
        let text = to_string(ctx, "Mixed", &value, &ctx.default_options()).unwrap();
        assert_eq!(text, "{\"Prop\":\"p\",\"Opted\":\"o\"}");

        let report = compile_input(json!({
            "types": types,
            "contexts": [{"name": "App", "roots": ["Mixed"],
                          "policy": {"include_fields": true}}],
        }));
        let ctx = &report.contexts[0];
        let text = to_string(ctx, "Mixed", &value, &ctx.default_options()).unwrap();
        assert_eq!(text, "{\"Prop\":\"p\",\"Field\":\"f\",\"Opted\":\"o\"}");
    }

    #[test]
    fn number_override_only_affects_numeric_members() {
        let report = compile_input(json!({
            "types": [
                {"name": "String", "ident": "StringInfo", "shape": "known"},
                {"name": "i64", "ident": "Int64Info", "shape": "known", "value_type": true},
                {"name": "Entry", "ident": "EntryInfo", "shape": "object", "properties": [
                    {"name": "Title", "type": "String", "number_handling": "write_as_string"},
                    {"name": "Count", "type": "i64", "number_handling": "write_as_string"},
                ]},
            ],
            "contexts": [{"name": "App", "roots": ["Entry"]}],
        }));
        let ctx = &report.contexts[0];
        let options = ctx.default_options();
        let value = json!({"Title": "hello", "Count": 42});
        let fast = to_string(ctx, "Entry", &value, &options).unwrap();
        let generic =
            crate::engine::to_string_generic(ctx, "Entry", &value, &options).unwrap();
        assert_eq!(fast, "{\"Title\":\"hello\",\"Count\":\"42\"}");
        assert_eq!(fast, generic);
    }

    #[test]
    fn wire_names_are_pooled_once_per_context() {
        let report = compile_input(json!({
            "types": [
                {"name": "String", "ident": "StringInfo", "shape": "known"},
                {"name": "A", "ident": "AInfo", "shape": "object", "properties": [
                    {"name": "Id", "type": "String"},
                    {"name": "Label", "type": "String"},
                ]},
                {"name": "B", "ident": "BInfo", "shape": "object", "properties": [
                    {"name": "Id", "type": "String"},
                ]},
            ],
            "contexts": [{"name": "App", "roots": ["A", "B"]}],
        }));
        let ctx = &report.contexts[0];
        let names: Vec<&str> = ctx.property_names.iter().map(|n| n.as_ref()).collect();
        assert_eq!(names, vec!["Id", "Label"]);
    }

    #[test]
    fn explicit_wire_name_bypasses_the_naming_policy() {
        let report = compile_input(json!({
            "types": [
                {"name": "String", "ident": "StringInfo", "shape": "known"},
                {"name": "Doc", "ident": "DocInfo", "shape": "object", "properties": [
                    {"name": "BodyText", "type": "String"},
                    {"name": "ETag", "type": "String", "wire_name": "ETag"},
                ]},
            ],
            "contexts": [{"name": "App", "roots": ["Doc"],
                          "policy": {"naming_policy": "camel_case"}}],
        }));
        let ctx = &report.contexts[0];
        let value = json!({"BodyText": "x", "ETag": "y"});
        let text = to_string(ctx, "Doc", &value, &ctx.default_options()).unwrap();
        assert_eq!(text, "{\"bodyText\":\"x\",\"ETag\":\"y\"}");
    }

    #[test]
    fn primitive_only_member_skips_the_descriptor_probe() {
        let report = compile_input(json!({
            "types": [
                {"name": "String", "ident": "StringInfo", "shape": "known",
                 "primitive_only": true},
                {"name": "Vec<String>", "ident": "VecStringInfo", "shape": "sequence",
                 "element": "String", "primitive_only": true},
                {"name": "Post", "ident": "PostInfo", "shape": "object", "properties": [
                    {"name": "Title", "type": "String"},
                    {"name": "Tags", "type": "Vec<String>"},
                ]},
            ],
            "contexts": [{"name": "App", "roots": ["Post"]}],
        }));
        let ctx = &report.contexts[0];
        let value = json!({"Title": "t", "Tags": ["a", "b"]});
        let text = to_string(ctx, "Post", &value, &ctx.default_options()).unwrap();
        assert_eq!(text, "{\"Title\":\"t\",\"Tags\":[\"a\",\"b\"]}");
    }

    #[test]
    fn self_referential_object_uses_its_own_fast_path() {
        let report = compile_input(json!({
            "types": [
                {"name": "String", "ident": "StringInfo", "shape": "known"},
                {"name": "Vec<Node>", "ident": "VecNodeInfo", "shape": "sequence",
                 "element": "Node"},
                {"name": "Node", "ident": "NodeInfo", "shape": "object", "properties": [
                    {"name": "Label", "type": "String"},
                    {"name": "Children", "type": "Vec<Node>"},
                ]},
            ],
            "contexts": [{"name": "App", "roots": ["Node"]}],
        }));
        let ctx = &report.contexts[0];
        let tree = json!({
            "Label": "root",
            "Children": [
                {"Label": "leaf", "Children": []},
            ],
        });
        let text = to_string(ctx, "Node", &tree, &ctx.default_options()).unwrap();
        assert_eq!(
            text,
            "{\"Label\":\"root\",\"Children\":[{\"Label\":\"leaf\",\"Children\":[]}]}"
        );
    }
}
