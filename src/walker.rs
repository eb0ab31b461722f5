//! Classifier/graph walker: drives synthesis over every type reachable from
//! a context's roots.
//!
//! Discovery is pre-order with identity memoization: a type is marked
//! visited before its dependencies are explored, which is the one property
//! that makes self- and mutually-referential object shapes terminate.
//! Unsupported types produce a diagnostic and no unit; duplicate generated
//! identifiers keep the first definition and report the collision.

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};

use crate::context::{CompiledContext, GenerationReport};
use crate::error::{Diagnostic, Error};
use crate::fastpath::synthesize_fast_path;
use crate::metadata::{synthesize, MetadataUnit};
use crate::model::{ContextSpec, GenerationSpec, TypeId, TypeShape};

/// Compile every context in the spec. Fatal configuration errors abort the
/// whole pass; per-type findings accumulate as diagnostics instead.
pub fn compile(spec: &GenerationSpec) -> Result<GenerationReport, Error> {
    let mut contexts = Vec::with_capacity(spec.contexts.len());
    let mut diagnostics = Vec::new();
    for cx in &spec.contexts {
        let mut builder = ContextBuilder::new(spec, cx);
        for &root in &cx.roots {
            builder.visit(root)?;
        }
        let (compiled, mut found) = builder.finish();
        diagnostics.append(&mut found);
        contexts.push(compiled);
    }
    Ok(GenerationReport { contexts, diagnostics })
}

struct ContextBuilder<'a> {
    spec: &'a GenerationSpec,
    cx: &'a ContextSpec,
    visited: IndexSet<TypeId>,
    units: IndexMap<String, MetadataUnit>,
    owners: IndexMap<String, TypeId>,
    pool: IndexSet<Arc<str>>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> ContextBuilder<'a> {
    fn new(spec: &'a GenerationSpec, cx: &'a ContextSpec) -> Self {
        Self {
            spec,
            cx,
            visited: IndexSet::new(),
            units: IndexMap::new(),
            owners: IndexMap::new(),
            pool: IndexSet::new(),
            diagnostics: Vec::new(),
        }
    }

    fn visit(&mut self, id: TypeId) -> Result<(), Error> {
        // mark before recursing; this is what terminates cycles
        if !self.visited.insert(id) {
            return Ok(());
        }
        let desc = self.spec.graph.get(id);

        if matches!(desc.shape, TypeShape::Unsupported) {
            self.diagnostics.push(Diagnostic::TypeNotSupported {
                type_name: desc.name.clone(),
            });
            return Ok(());
        }

        let fast_path = match &desc.shape {
            TypeShape::Object { properties, .. } if desc.generate_serialization => {
                Some(synthesize_fast_path(
                    self.spec,
                    &self.cx.policy,
                    &desc.name,
                    properties,
                    &mut self.pool,
                )?)
            }
            _ => None,
        };
        let unit = synthesize(self.spec, &self.cx.policy, desc, fast_path)?;
        self.register(id, unit);

        match &desc.shape {
            // terminal shapes
            TypeShape::Known
            | TypeShape::Custom { .. }
            | TypeShape::Enum { .. }
            | TypeShape::Unsupported => {}
            TypeShape::Nullable { underlying } => self.visit(*underlying)?,
            TypeShape::Sequence { element } => self.visit(*element)?,
            TypeShape::Map { key, value } => {
                self.visit(*key)?;
                self.visit(*value)?;
            }
            TypeShape::Object { properties, .. } => {
                for p in properties {
                    self.visit(p.target)?;
                }
            }
        }
        Ok(())
    }

    /// Idempotent registration by identifier. A second, distinct type under
    /// an already-used identifier is reported; the first definition stands.
    fn register(&mut self, id: TypeId, unit: MetadataUnit) {
        match self.owners.get(&unit.ident) {
            Some(&owner) if owner != id => {
                self.diagnostics.push(Diagnostic::DuplicateTypeName {
                    ident: unit.ident.clone(),
                });
            }
            Some(_) => {}
            None => {
                self.owners.insert(unit.ident.clone(), id);
                self.units.insert(unit.ident.clone(), unit);
            }
        }
    }

    fn finish(self) -> (CompiledContext, Vec<Diagnostic>) {
        let mut roots = IndexMap::with_capacity(self.cx.roots.len());
        for &r in &self.cx.roots {
            let desc = self.spec.graph.get(r);
            // unsupported or displaced roots stay out of the dispatcher
            let registered = self.owners.get(&desc.ident) == Some(&r);
            if registered {
                roots.insert(desc.name.clone(), desc.ident.clone());
            }
        }
        (
            CompiledContext {
                name: self.cx.name.clone(),
                policy: self.cx.policy.clone(),
                units: self.units,
                roots,
                property_names: self.pool,
            },
            self.diagnostics,
        )
    }
}

// --------------------------------- Tests ----------------------------------- //
