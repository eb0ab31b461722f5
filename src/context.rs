//! Context/root composer output: the compiled context a host serializes
//! through.
//!
//! A `CompiledContext` owns every descriptor unit reachable from its roots,
//! the deduplicated wire-name pool, and a roots-only dispatcher. Option sets
//! are plain values; the canonical default set comes from the context's own
//! policy and the fast-path eligibility guard compares a live set against it
//! field by field.

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use serde_json::{json, Value};

use crate::convert::{resolve_converter, ConverterArc};
use crate::error::{Diagnostic, Error};
use crate::metadata::MetadataUnit;
use crate::model::{ContextPolicy, IgnoreCondition, NamingPolicy, NumberHandling};

// -------------------------------- Options ---------------------------------- //

/// A live serialization option set. The policy-derived fields mirror
/// `ContextPolicy`; the rest only exist at run time.
#[derive(Clone)]
pub struct JsonOptions {
    pub naming_policy: NamingPolicy,
    pub default_ignore_condition: IgnoreCondition,
    pub ignore_read_only_properties: bool,
    pub ignore_read_only_fields: bool,
    pub include_fields: bool,
    pub write_indented: bool,
    pub number_handling: NumberHandling,
    pub honor_runtime_converters: bool,
    pub has_custom_text_encoder: bool,
    pub preserve_references: bool,
    /// Actively configured converters, scanned in registration order.
    pub converters: Vec<ConverterArc>,
}

impl JsonOptions {
    /// The canonical default-option factory for a policy.
    pub fn from_policy(policy: &ContextPolicy) -> Self {
        Self {
            naming_policy: policy.naming_policy,
            default_ignore_condition: policy.default_ignore_condition,
            ignore_read_only_properties: policy.ignore_read_only_properties,
            ignore_read_only_fields: policy.ignore_read_only_fields,
            include_fields: policy.include_fields,
            write_indented: policy.write_indented,
            number_handling: policy.number_handling,
            honor_runtime_converters: policy.honor_runtime_converters,
            has_custom_text_encoder: false,
            preserve_references: false,
            converters: Vec::new(),
        }
    }
}

// --------------------------- Compiled context ------------------------------ //

pub struct CompiledContext {
    pub name: String,
    pub policy: ContextPolicy,
    /// Every unit reachable from the roots, keyed by generated identifier,
    /// in discovery order.
    pub units: IndexMap<String, MetadataUnit>,
    /// Roots-only dispatch table: canonical type name to identifier.
    pub roots: IndexMap<String, String>,
    /// Wire-name constants shared across every object shape in the context.
    pub property_names: IndexSet<Arc<str>>,
}

impl CompiledContext {
    pub fn default_options(&self) -> JsonOptions {
        JsonOptions::from_policy(&self.policy)
    }

    /// Roots-only dispatcher. Reachable non-root types are deliberately not
    /// exposed here; they are reached through their owners.
    pub fn type_info_ident(&self, type_name: &str) -> Option<String> {
        self.roots.get(type_name).cloned()
    }

    pub fn unit(&self, ident: &str) -> Result<&MetadataUnit, Error> {
        self.units.get(ident).ok_or_else(|| Error::NoMetadata {
            type_name: ident.to_string(),
        })
    }

    /// Safety-critical gate: the fast path bakes this context's policy into
    /// its closures, so any divergence in the live option set must force the
    /// generic engine.
    pub fn fast_path_eligible(&self, live: &JsonOptions) -> bool {
        !live.has_custom_text_encoder
            && !live.preserve_references
            && live.converters.is_empty()
            && live.number_handling == NumberHandling::Strict
            && live.naming_policy == self.policy.naming_policy
            && live.default_ignore_condition == self.policy.default_ignore_condition
            && live.ignore_read_only_properties == self.policy.ignore_read_only_properties
            && live.ignore_read_only_fields == self.policy.ignore_read_only_fields
            && live.include_fields == self.policy.include_fields
            && live.write_indented == self.policy.write_indented
            && live.number_handling == self.policy.number_handling
    }

    /// First actively configured converter accepting the type, factory
    /// indirection resolved. `None` falls through to the generated
    /// descriptor.
    pub fn runtime_converter_for(
        &self,
        type_name: &str,
        options: &JsonOptions,
    ) -> Result<Option<ConverterArc>, Error> {
        if !options.honor_runtime_converters || options.converters.is_empty() {
            return Ok(None);
        }
        for conv in &options.converters {
            if conv.can_convert(type_name) {
                return resolve_converter(conv.clone(), type_name).map(Some);
            }
        }
        Ok(None)
    }
}

// --------------------------------- Report ---------------------------------- //

/// Everything one compilation pass produced: the compiled contexts plus the
/// non-fatal diagnostics accumulated along the way.
pub struct GenerationReport {
    pub contexts: Vec<CompiledContext>,
    pub diagnostics: Vec<Diagnostic>,
}

impl GenerationReport {
    pub fn context(&self, name: &str) -> Option<&CompiledContext> {
        self.contexts.iter().find(|c| c.name == name)
    }

    /// JSON summary of the compiled output, stable across runs.
    pub fn summary(&self) -> Value {
        json!({
            "contexts": self.contexts.iter().map(|c| json!({
                "name": c.name,
                "roots": c.roots.keys().collect::<Vec<_>>(),
                "types": c.units.values().map(|u| json!({
                    "ident": u.ident,
                    "type": u.type_name,
                    "shape": u.shape_name,
                    "fast_path": u.has_fast_path,
                })).collect::<Vec<_>>(),
                "property_names": c.property_names.iter()
                    .map(|n| n.as_ref())
                    .collect::<Vec<&str>>(),
            })).collect::<Vec<_>>(),
            "diagnostics": self.diagnostics,
        })
    }
}

// --------------------------------- Tests ----------------------------------- //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::{ConverterRegistry, CustomConverter};
    use crate::engine::{to_string, JsonWriter};
    use crate::model::{GenerationInput, GenerationSpec};
    use crate::walker::compile;

    fn compile_input(input: Value) -> GenerationReport {
        let input: GenerationInput = serde_json::from_value(input).unwrap();
        let spec = GenerationSpec::resolve(input, ConverterRegistry::new()).unwrap();
        compile(&spec).unwrap()
    }

    fn two_type_report(policy: Value) -> GenerationReport {
        compile_input(json!({
            "types": [
                {"name": "String", "ident": "StringInfo", "shape": "known"},
                {"name": "Tag", "ident": "TagInfo", "shape": "object",
                 "properties": [{"name": "Label", "type": "String"}]},
            ],
            "contexts": [{"name": "App", "roots": ["Tag"], "policy": policy}],
        }))
    }

    struct Upper;
    impl CustomConverter for Upper {
        fn name(&self) -> &str {
            "Upper"
        }
        fn can_convert(&self, type_name: &str) -> bool {
            type_name == "String"
        }
        fn write(&self, w: &mut JsonWriter, value: &Value) -> Result<(), Error> {
            match value.as_str() {
                Some(s) => {
                    w.string(&s.to_uppercase());
                    Ok(())
                }
                None => Err(Error::TypeMismatch {
                    type_name: "String".into(),
                    expected: "a string value",
                }),
            }
        }
        fn read(&self, value: &Value) -> Result<Value, Error> {
            Ok(value.clone())
        }
    }

    #[test]
    fn default_options_are_eligible_and_any_divergence_is_not() {
        let report = two_type_report(json!({}));
        let ctx = &report.contexts[0];
        assert!(ctx.fast_path_eligible(&ctx.default_options()));

        let mut diverged = ctx.default_options();
        diverged.write_indented = true;
        assert!(!ctx.fast_path_eligible(&diverged));

        let mut diverged = ctx.default_options();
        diverged.naming_policy = NamingPolicy::CamelCase;
        assert!(!ctx.fast_path_eligible(&diverged));

        let mut diverged = ctx.default_options();
        diverged.has_custom_text_encoder = true;
        assert!(!ctx.fast_path_eligible(&diverged));

        let mut diverged = ctx.default_options();
        diverged.preserve_references = true;
        assert!(!ctx.fast_path_eligible(&diverged));

        let mut diverged = ctx.default_options();
        diverged.converters.push(Arc::new(Upper) as ConverterArc);
        assert!(!ctx.fast_path_eligible(&diverged));
    }

    #[test]
    fn lenient_number_handling_is_never_eligible() {
        let report = two_type_report(json!({"number_handling": "write_as_string"}));
        let ctx = &report.contexts[0];
        // even the context's own defaults fail the strictness requirement
        assert!(!ctx.fast_path_eligible(&ctx.default_options()));
    }

    #[test]
    fn dispatcher_exposes_roots_only() {
        let report = two_type_report(json!({}));
        let ctx = &report.contexts[0];
        assert_eq!(ctx.type_info_ident("Tag").as_deref(), Some("TagInfo"));
        // reachable but not a root
        assert_eq!(ctx.type_info_ident("String"), None);
        assert_eq!(ctx.type_info_ident("Ghost"), None);
    }

    #[test]
    fn runtime_converter_overrides_the_generated_descriptor() {
        let report = two_type_report(json!({}));
        let ctx = &report.contexts[0];
        let mut options = ctx.default_options();
        options.converters.push(Arc::new(Upper) as ConverterArc);
        // ineligible options force the generic engine, which consults the list
        let text = to_string(ctx, "Tag", &json!({"Label": "hi"}), &options).unwrap();
        assert_eq!(text, "{\"Label\":\"HI\"}");
    }

    #[test]
    fn disallowing_runtime_converters_ignores_the_list() {
        let report = two_type_report(json!({"honor_runtime_converters": false}));
        let ctx = &report.contexts[0];
        let mut options = ctx.default_options();
        options.converters.push(Arc::new(Upper) as ConverterArc);
        let text = to_string(ctx, "Tag", &json!({"Label": "hi"}), &options).unwrap();
        assert_eq!(text, "{\"Label\":\"hi\"}");
    }

    #[test]
    fn summary_reports_units_and_diagnostics() {
        let report = compile_input(json!({
            "types": [
                {"name": "Opaque", "ident": "OpaqueInfo", "shape": "unsupported"},
                {"name": "Box", "ident": "BoxInfo", "shape": "object",
                 "properties": [{"name": "Inner", "type": "Opaque"}]},
            ],
            "contexts": [{"name": "App", "roots": ["Box"]}],
        }));
        let summary = report.summary();
        assert_eq!(summary["contexts"][0]["name"], json!("App"));
        assert_eq!(summary["contexts"][0]["roots"], json!(["Box"]));
        assert_eq!(summary["diagnostics"][0]["kind"], json!("type_not_supported"));
        assert_eq!(summary["diagnostics"][0]["type_name"], json!("Opaque"));
    }
}
