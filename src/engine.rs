//! Generic runtime engine and the primitive writer seam.
//!
//! The engine walks compiled descriptors to encode a `serde_json::Value`
//! tree into JSON text, or to decode an already-parsed value back into a
//! tree keyed by declared member names. It never inspects type metadata
//! dynamically; every decision was fixed at generation time or comes from
//! the live option set. Document parsing stays outside this crate.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::Value;

use crate::context::{CompiledContext, JsonOptions};
use crate::convert::Converter;
use crate::error::Error;
use crate::fastpath::{default_check, member_included, DefaultCheckType, FastPathFn};
use crate::metadata::{PropertyInfo, TypeInfo, TypeInfoKind};
use crate::model::{DirectWrite, NumberHandling};

// ------------------------------ Writer seam -------------------------------- //

/// Minimal direct-write JSON writer: string/number/boolean/base64/null plus
/// object and array framing, with optional two-space indentation. String
/// escaping is delegated to serde_json.
pub struct JsonWriter {
    out: String,
    indent: bool,
    frames: Vec<bool>,
    pending_name: bool,
}

impl JsonWriter {
    pub fn new(indent: bool) -> Self {
        Self {
            out: String::new(),
            indent,
            frames: Vec::new(),
            pending_name: false,
        }
    }

    fn break_line(&mut self, depth: usize) {
        if self.indent {
            self.out.push('\n');
            for _ in 0..depth {
                self.out.push_str("  ");
            }
        }
    }

    // Comma/indent bookkeeping shared by every value-position write.
    fn before_value(&mut self) {
        if self.pending_name {
            self.pending_name = false;
            return;
        }
        if let Some(has_elements) = self.frames.last().copied() {
            if has_elements {
                self.out.push(',');
            }
            if let Some(slot) = self.frames.last_mut() {
                *slot = true;
            }
            self.break_line(self.frames.len());
        }
    }

    fn push_quoted(&mut self, s: &str) {
        match serde_json::to_string(s) {
            Ok(quoted) => self.out.push_str(&quoted),
            Err(_) => self.out.push_str("\"\""),
        }
    }

    pub fn begin_object(&mut self) {
        self.before_value();
        self.out.push('{');
        self.frames.push(false);
    }

    pub fn end_object(&mut self) {
        let had_elements = self.frames.pop().unwrap_or(false);
        if had_elements {
            self.break_line(self.frames.len());
        }
        self.out.push('}');
    }

    pub fn begin_array(&mut self) {
        self.before_value();
        self.out.push('[');
        self.frames.push(false);
    }

    pub fn end_array(&mut self) {
        let had_elements = self.frames.pop().unwrap_or(false);
        if had_elements {
            self.break_line(self.frames.len());
        }
        self.out.push(']');
    }

    pub fn name(&mut self, key: &str) {
        self.before_value();
        self.push_quoted(key);
        self.out.push(':');
        if self.indent {
            self.out.push(' ');
        }
        self.pending_name = true;
    }

    pub fn string(&mut self, s: &str) {
        self.before_value();
        self.push_quoted(s);
    }

    pub fn number(&mut self, n: &serde_json::Number, handling: NumberHandling) {
        self.before_value();
        match handling {
            NumberHandling::Strict => self.out.push_str(&n.to_string()),
            NumberHandling::WriteAsString => {
                self.out.push('"');
                self.out.push_str(&n.to_string());
                self.out.push('"');
            }
        }
    }

    pub fn boolean(&mut self, b: bool) {
        self.before_value();
        self.out.push_str(if b { "true" } else { "false" });
    }

    pub fn null(&mut self) {
        self.before_value();
        self.out.push_str("null");
    }

    pub fn base64(&mut self, bytes: &[u8]) {
        let encoded = BASE64.encode(bytes);
        self.before_value();
        self.out.push('"');
        self.out.push_str(&encoded);
        self.out.push('"');
    }

    /// Verbatim passthrough for values with no shaped descriptor.
    pub fn raw_value(&mut self, v: &Value) {
        self.before_value();
        match serde_json::to_string(v) {
            Ok(s) => self.out.push_str(&s),
            Err(_) => self.out.push_str("null"),
        }
    }

    pub fn finish(self) -> String {
        self.out
    }
}

// -------------------------------- Encoding --------------------------------- //

/// Encode a root value. Takes the fast path when the live option set is
/// eligible and the root's unit carries one; otherwise walks descriptors.
pub fn to_string(
    ctx: &CompiledContext,
    root_type: &str,
    value: &Value,
    options: &JsonOptions,
) -> Result<String, Error> {
    let Some(ident) = ctx.type_info_ident(root_type) else {
        return Err(Error::NoMetadata {
            type_name: root_type.to_string(),
        });
    };
    let mut w = JsonWriter::new(options.write_indented);
    if ctx.fast_path_eligible(options) {
        if let Some(fp) = fast_path_of(ctx, &ident)? {
            fp(&mut w, value, ctx, options)?;
            return Ok(w.finish());
        }
    }
    serialize_with(ctx, &ident, value, &mut w, options)?;
    Ok(w.finish())
}

/// Encode through descriptors only, regardless of fast-path eligibility.
pub fn to_string_generic(
    ctx: &CompiledContext,
    root_type: &str,
    value: &Value,
    options: &JsonOptions,
) -> Result<String, Error> {
    let Some(ident) = ctx.type_info_ident(root_type) else {
        return Err(Error::NoMetadata {
            type_name: root_type.to_string(),
        });
    };
    let mut w = JsonWriter::new(options.write_indented);
    serialize_with(ctx, &ident, value, &mut w, options)?;
    Ok(w.finish())
}

fn fast_path_of(ctx: &CompiledContext, ident: &str) -> Result<Option<FastPathFn>, Error> {
    let info = ctx.unit(ident)?.type_info(ctx)?;
    match &info.kind {
        TypeInfoKind::Object(obj) => Ok(obj.fast_path.clone()),
        _ => Ok(None),
    }
}

/// Descriptor-driven encode of one value at the writer's current position.
pub fn serialize_with(
    ctx: &CompiledContext,
    ident: &str,
    value: &Value,
    w: &mut JsonWriter,
    options: &JsonOptions,
) -> Result<(), Error> {
    let unit = ctx.unit(ident)?;
    // Actively configured converters win over the generated descriptor.
    if let Some(conv) = ctx.runtime_converter_for(&unit.type_name, options)? {
        return conv.write(w, value);
    }
    let info = unit.type_info(ctx)?;
    match &info.kind {
        TypeInfoKind::Value(converter) => write_converted(ctx, info, converter, value, w, options),

        TypeInfoKind::Sequence { element, .. } => {
            if value.is_null() {
                w.null();
                return Ok(());
            }
            let items = value
                .as_array()
                .ok_or_else(|| mismatch(info, "an array value"))?;
            let elem = element.require()?;
            w.begin_array();
            for item in items {
                serialize_with(ctx, elem, item, w, options)?;
            }
            w.end_array();
            Ok(())
        }

        TypeInfoKind::Map { value: val_dep, .. } => {
            if value.is_null() {
                w.null();
                return Ok(());
            }
            let entries = value
                .as_object()
                .ok_or_else(|| mismatch(info, "an object value"))?;
            let val_ident = val_dep.require()?;
            w.begin_object();
            for (k, v) in entries {
                // map keys are written verbatim
                w.name(k);
                serialize_with(ctx, val_ident, v, w, options)?;
            }
            w.end_object();
            Ok(())
        }

        TypeInfoKind::Object(obj) => {
            if value.is_null() {
                w.null();
                return Ok(());
            }
            if !value.is_object() {
                return Err(mismatch(info, "an object value"));
            }
            let props = obj.properties()?;
            w.begin_object();
            for p in props {
                if !member_included(
                    p.is_property,
                    p.is_read_only,
                    p.explicit_include,
                    options.ignore_read_only_properties,
                    options.ignore_read_only_fields,
                    options.include_fields,
                ) {
                    continue;
                }
                let Some(getter) = &p.getter else { continue };
                let v = getter(value);
                let ignore = p.ignore.unwrap_or(options.default_ignore_condition);
                match default_check(ignore, p.target_can_be_null) {
                    DefaultCheckType::Null if v.is_null() => continue,
                    DefaultCheckType::Default if is_default_value(&v) => continue,
                    _ => {}
                }
                let wire = p
                    .wire_override
                    .clone()
                    .unwrap_or_else(|| options.naming_policy.apply(&p.member_name));
                w.name(&wire);
                write_property_value(ctx, p, &v, w, options)?;
            }
            w.end_object();
            Ok(())
        }
    }
}

fn write_property_value(
    ctx: &CompiledContext,
    p: &PropertyInfo,
    value: &Value,
    w: &mut JsonWriter,
    options: &JsonOptions,
) -> Result<(), Error> {
    if let Some(conv) = &p.converter {
        return conv.write(w, value);
    }
    // Member-level numeric override, without consulting the target's policy.
    if let Some(handling) = p.number_handling {
        if let Value::Number(n) = value {
            w.number(n, handling);
            return Ok(());
        }
    }
    serialize_with(ctx, p.target.require()?, value, w, options)
}

fn write_converted(
    ctx: &CompiledContext,
    info: &TypeInfo,
    converter: &Converter,
    value: &Value,
    w: &mut JsonWriter,
    options: &JsonOptions,
) -> Result<(), Error> {
    match converter {
        Converter::Known(direct) => match direct {
            Some(dw) => write_direct(w, *dw, value, &info.type_name, info.number_handling),
            None => {
                w.raw_value(value);
                Ok(())
            }
        },

        Converter::Enum { variants, policy } => {
            if value.is_null() && info.can_be_null {
                w.null();
                return Ok(());
            }
            let s = value
                .as_str()
                .ok_or_else(|| mismatch(info, "an enumerated string value"))?;
            if !variants.iter().any(|v| v == s) {
                return Err(mismatch(info, "a declared enum variant"));
            }
            w.string(&policy.apply(s));
            Ok(())
        }

        Converter::Nullable { underlying } => {
            if value.is_null() {
                w.null();
                return Ok(());
            }
            serialize_with(ctx, underlying.require()?, value, w, options)
        }

        Converter::Custom(conv) => conv.write(w, value),
    }
}

/// Direct primitive write, shared with the fast-path synthesizer.
pub(crate) fn write_direct(
    w: &mut JsonWriter,
    dw: DirectWrite,
    value: &Value,
    type_name: &str,
    handling: NumberHandling,
) -> Result<(), Error> {
    if value.is_null() {
        w.null();
        return Ok(());
    }
    let fail = |expected: &'static str| Error::TypeMismatch {
        type_name: type_name.to_string(),
        expected,
    };
    match dw {
        DirectWrite::String => {
            w.string(value.as_str().ok_or_else(|| fail("a string value"))?);
        }
        DirectWrite::Boolean => {
            w.boolean(value.as_bool().ok_or_else(|| fail("a boolean value"))?);
        }
        DirectWrite::Number => match value {
            Value::Number(n) => w.number(n, handling),
            _ => return Err(fail("a numeric value")),
        },
        DirectWrite::Base64 => {
            let bytes = byte_array(value).ok_or_else(|| fail("a byte-sequence value"))?;
            w.base64(&bytes);
        }
        DirectWrite::Char => {
            let s = value.as_str().ok_or_else(|| fail("a one-character string"))?;
            if s.chars().count() != 1 {
                return Err(fail("a one-character string"));
            }
            // chars are written as a one-character base64 string
            w.base64(s.as_bytes());
        }
    }
    Ok(())
}

fn byte_array(value: &Value) -> Option<Vec<u8>> {
    value
        .as_array()?
        .iter()
        .map(|v| v.as_u64().and_then(|n| u8::try_from(n).ok()))
        .collect()
}

/// Zero/default detection for `WhenWritingDefault` elision of value types.
pub(crate) fn is_default_value(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::Bool(b) => !*b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s == "\u{0}",
        _ => false,
    }
}

fn mismatch(info: &TypeInfo, expected: &'static str) -> Error {
    Error::TypeMismatch {
        type_name: info.type_name.clone(),
        expected,
    }
}

// -------------------------------- Decoding --------------------------------- //

/// Decode an already-parsed JSON value into a tree keyed by declared member
/// names. Dispatches through the roots-only dispatcher like `to_string`.
pub fn from_value(
    ctx: &CompiledContext,
    root_type: &str,
    input: &Value,
    options: &JsonOptions,
) -> Result<Value, Error> {
    let Some(ident) = ctx.type_info_ident(root_type) else {
        return Err(Error::NoMetadata {
            type_name: root_type.to_string(),
        });
    };
    decode_with(ctx, &ident, input, options)
}

pub fn decode_with(
    ctx: &CompiledContext,
    ident: &str,
    input: &Value,
    options: &JsonOptions,
) -> Result<Value, Error> {
    let unit = ctx.unit(ident)?;
    if let Some(conv) = ctx.runtime_converter_for(&unit.type_name, options)? {
        return conv.read(input);
    }
    let info = unit.type_info(ctx)?;
    match &info.kind {
        TypeInfoKind::Value(converter) => read_converted(ctx, info, converter, input, options),

        TypeInfoKind::Sequence { element, make_empty } => {
            if input.is_null() {
                return Ok(Value::Null);
            }
            let items = input
                .as_array()
                .ok_or_else(|| mismatch(info, "an array value"))?;
            let elem = element.require()?;
            let mut out = make_empty();
            if let Some(arr) = out.as_array_mut() {
                for item in items {
                    arr.push(decode_with(ctx, elem, item, options)?);
                }
            }
            Ok(out)
        }

        TypeInfoKind::Map { value: val_dep, make_empty, .. } => {
            if input.is_null() {
                return Ok(Value::Null);
            }
            let entries = input
                .as_object()
                .ok_or_else(|| mismatch(info, "an object value"))?;
            let val_ident = val_dep.require()?;
            let mut out = make_empty();
            if let Some(map) = out.as_object_mut() {
                for (k, v) in entries {
                    map.insert(k.clone(), decode_with(ctx, val_ident, v, options)?);
                }
            }
            Ok(out)
        }

        TypeInfoKind::Object(obj) => {
            if input.is_null() {
                return Ok(Value::Null);
            }
            let entries = input
                .as_object()
                .ok_or_else(|| mismatch(info, "an object value"))?;
            let create = obj.create.as_ref().ok_or_else(|| Error::NoCreator {
                type_name: info.type_name.clone(),
            })?;
            let mut out = create();
            for p in obj.properties()? {
                let Some(setter) = &p.setter else { continue };
                let wire = p
                    .wire_override
                    .clone()
                    .unwrap_or_else(|| options.naming_policy.apply(&p.member_name));
                let Some(v) = entries.get(&wire) else { continue };
                let decoded = match &p.converter {
                    Some(conv) => conv.read(v)?,
                    None => decode_with(ctx, p.target.require()?, v, options)?,
                };
                setter(&mut out, decoded);
            }
            Ok(out)
        }
    }
}

fn read_converted(
    ctx: &CompiledContext,
    info: &TypeInfo,
    converter: &Converter,
    input: &Value,
    options: &JsonOptions,
) -> Result<Value, Error> {
    match converter {
        Converter::Known(direct) => match direct {
            Some(dw) => read_direct(*dw, input, &info.type_name, info.number_handling),
            None => Ok(input.clone()),
        },

        Converter::Enum { variants, policy } => {
            if input.is_null() && info.can_be_null {
                return Ok(Value::Null);
            }
            let s = input
                .as_str()
                .ok_or_else(|| mismatch(info, "an enumerated string value"))?;
            variants
                .iter()
                .find(|v| policy.apply(v) == s)
                .map(|v| Value::String(v.clone()))
                .ok_or_else(|| mismatch(info, "a declared enum variant"))
        }

        Converter::Nullable { underlying } => {
            if input.is_null() {
                return Ok(Value::Null);
            }
            decode_with(ctx, underlying.require()?, input, options)
        }

        Converter::Custom(conv) => conv.read(input),
    }
}

fn read_direct(
    dw: DirectWrite,
    input: &Value,
    type_name: &str,
    handling: NumberHandling,
) -> Result<Value, Error> {
    if input.is_null() {
        return Ok(Value::Null);
    }
    let fail = |expected: &'static str| Error::TypeMismatch {
        type_name: type_name.to_string(),
        expected,
    };
    match dw {
        DirectWrite::String => input
            .as_str()
            .map(|s| Value::String(s.to_string()))
            .ok_or_else(|| fail("a string value")),
        DirectWrite::Boolean => {
            if input.is_boolean() {
                Ok(input.clone())
            } else {
                Err(fail("a boolean value"))
            }
        }
        DirectWrite::Number => match input {
            Value::Number(_) => Ok(input.clone()),
            Value::String(s) if handling == NumberHandling::WriteAsString => {
                serde_json::from_str::<serde_json::Number>(s)
                    .map(Value::Number)
                    .map_err(|_| fail("a numeric string"))
            }
            _ => Err(fail("a numeric value")),
        },
        DirectWrite::Base64 => {
            let s = input.as_str().ok_or_else(|| fail("a base64 string"))?;
            let bytes = BASE64.decode(s).map_err(|_| fail("a base64 string"))?;
            Ok(Value::Array(bytes.into_iter().map(|b| Value::from(b)).collect()))
        }
        DirectWrite::Char => {
            let s = input.as_str().ok_or_else(|| fail("a base64 string"))?;
            let bytes = BASE64.decode(s).map_err(|_| fail("a base64 string"))?;
            let text = String::from_utf8(bytes).map_err(|_| fail("a one-character string"))?;
            if text.chars().count() != 1 {
                return Err(fail("a one-character string"));
            }
            Ok(Value::String(text))
        }
    }
}

// --------------------------------- Tests ----------------------------------- //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::GenerationReport;
    use crate::convert::ConverterRegistry;
    use crate::model::{GenerationInput, GenerationSpec};
    use crate::walker::compile;
    use serde_json::json;

    fn compile_input(input: Value) -> GenerationReport {
        let input: GenerationInput = serde_json::from_value(input).unwrap();
        let spec = GenerationSpec::resolve(input, ConverterRegistry::new()).unwrap();
        compile(&spec).unwrap()
    }

    fn person_report(policy: Value) -> GenerationReport {
        compile_input(json!({
            "types": [
                {"name": "String", "ident": "StringInfo", "shape": "known"},
                {"name": "i32", "ident": "Int32Info", "shape": "known", "value_type": true},
                {"name": "bool", "ident": "BoolInfo", "shape": "known", "value_type": true},
                {"name": "Vec<String>", "ident": "VecStringInfo", "shape": "sequence",
                 "element": "String"},
                {"name": "Map<String,i32>", "ident": "MapStringInt32Info", "shape": "map",
                 "key": "String", "value": "i32"},
                {"name": "Color", "ident": "ColorInfo", "shape": "enum",
                 "variants": ["Red", "DarkBlue"], "value_type": true},
                {"name": "Person", "ident": "PersonInfo", "shape": "object", "properties": [
                    {"name": "Name", "type": "String"},
                    {"name": "Age", "type": "i32"},
                    {"name": "Admin", "type": "bool"},
                    {"name": "Tags", "type": "Vec<String>"},
                    {"name": "Scores", "type": "Map<String,i32>"},
                    {"name": "Shade", "type": "Color"},
                ]},
            ],
            "contexts": [{"name": "App", "roots": ["Person"], "policy": policy}],
        }))
    }

    fn ada() -> Value {
        json!({
            "Name": "ada",
            "Age": 36,
            "Admin": true,
            "Tags": ["x", "y"],
            "Scores": {"math": 100},
            "Shade": "DarkBlue",
        })
    }

    #[test]
    fn writer_frames_and_escapes() {
        let mut w = JsonWriter::new(false);
        w.begin_object();
        w.name("a\"b");
        w.string("x");
        w.name("n");
        w.begin_array();
        w.number(&serde_json::Number::from(1), NumberHandling::Strict);
        w.number(&serde_json::Number::from(2), NumberHandling::Strict);
        w.end_array();
        w.end_object();
        assert_eq!(w.finish(), "{\"a\\\"b\":\"x\",\"n\":[1,2]}");
    }

    #[test]
    fn fast_and_generic_paths_agree_under_defaults() {
        let report = person_report(json!({}));
        let ctx = &report.contexts[0];
        let options = ctx.default_options();
        let fast = to_string(ctx, "Person", &ada(), &options).unwrap();
        let generic = to_string_generic(ctx, "Person", &ada(), &options).unwrap();
        assert_eq!(fast, generic);
    }

    #[test]
    fn round_trip_through_fast_path_and_generic_decode() {
        let report = person_report(json!({}));
        let ctx = &report.contexts[0];
        let options = ctx.default_options();
        let text = to_string(ctx, "Person", &ada(), &options).unwrap();
        let parsed: Value = serde_json::from_str(&text).unwrap();
        let decoded = from_value(ctx, "Person", &parsed, &options).unwrap();
        assert_eq!(decoded, ada());
    }

    #[test]
    fn camel_case_policy_renames_members_and_enum_values() {
        let report = person_report(json!({"naming_policy": "camel_case"}));
        let ctx = &report.contexts[0];
        let options = ctx.default_options();
        let text = to_string(ctx, "Person", &ada(), &options).unwrap();
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["name"], json!("ada"));
        assert_eq!(parsed["shade"], json!("darkBlue"));
        // reverse mapping restores declared names and variants
        let decoded = from_value(ctx, "Person", &parsed, &options).unwrap();
        assert_eq!(decoded, ada());
        // the declared spelling is not accepted on the wire under this policy
        let verbatim = json!({"name": "ada", "shade": "DarkBlue"});
        let err = from_value(ctx, "Person", &verbatim, &options).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
    }

    #[test]
    fn bytes_and_chars_round_trip_as_base64() {
        let report = compile_input(json!({
            "types": [
                {"name": "Bytes", "ident": "BytesInfo", "shape": "known"},
                {"name": "char", "ident": "CharInfo", "shape": "known", "value_type": true},
                {"name": "Packet", "ident": "PacketInfo", "shape": "object", "properties": [
                    {"name": "Blob", "type": "Bytes"},
                    {"name": "Initial", "type": "char"},
                ]},
            ],
            "contexts": [{"name": "App", "roots": ["Packet"]}],
        }));
        let ctx = &report.contexts[0];
        let options = ctx.default_options();
        let value = json!({"Blob": [1, 2, 255], "Initial": "A"});
        let text = to_string(ctx, "Packet", &value, &options).unwrap();
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["Blob"], json!("AQL/"));
        assert_eq!(parsed["Initial"], json!("QQ=="));
        let decoded = from_value(ctx, "Packet", &parsed, &options).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn write_as_string_number_handling_round_trips() {
        let report = compile_input(json!({
            "types": [
                {"name": "i64", "ident": "Int64Info", "shape": "known", "value_type": true,
                 "number_handling": "write_as_string"},
                {"name": "Account", "ident": "AccountInfo", "shape": "object", "properties": [
                    {"name": "Balance", "type": "i64"},
                ]},
            ],
            "contexts": [{"name": "App", "roots": ["Account"]}],
        }));
        let ctx = &report.contexts[0];
        let options = ctx.default_options();
        let value = json!({"Balance": 42});
        let text = to_string_generic(ctx, "Account", &value, &options).unwrap();
        assert_eq!(text, "{\"Balance\":\"42\"}");
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(from_value(ctx, "Account", &parsed, &options).unwrap(), value);
    }

    #[test]
    fn external_factory_construction_cannot_decode() {
        let report = compile_input(json!({
            "types": [
                {"name": "String", "ident": "StringInfo", "shape": "known"},
                {"name": "Sealed", "ident": "SealedInfo", "shape": "object",
                 "construction": "external_factory",
                 "properties": [{"name": "Id", "type": "String"}]},
            ],
            "contexts": [{"name": "App", "roots": ["Sealed"]}],
        }));
        let ctx = &report.contexts[0];
        let options = ctx.default_options();
        let err = from_value(ctx, "Sealed", &json!({"Id": "x"}), &options).unwrap_err();
        assert!(matches!(err, Error::NoCreator { type_name } if type_name == "Sealed"));
    }

    #[test]
    fn indented_output_is_pretty_printed() {
        let report = compile_input(json!({
            "types": [
                {"name": "String", "ident": "StringInfo", "shape": "known"},
                {"name": "Tag", "ident": "TagInfo", "shape": "object",
                 "properties": [{"name": "Label", "type": "String"}]},
            ],
            "contexts": [{"name": "App", "roots": ["Tag"],
                          "policy": {"write_indented": true}}],
        }));
        let ctx = &report.contexts[0];
        let options = ctx.default_options();
        let text = to_string(ctx, "Tag", &json!({"Label": "v"}), &options).unwrap();
        assert_eq!(text, "{\n  \"Label\": \"v\"\n}");
    }
}
