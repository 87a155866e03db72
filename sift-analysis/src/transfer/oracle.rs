//! Boundary traits the transfer function consumes.
//!
//! The environment builder owns aliasing, call-graph resolution, field and
//! literal registries, class properties, and class intervals; the core only
//! sees these contracts.

use sift_core::types::collections::FxHashMap;
use sift_core::types::{FieldId, MethodId, TypeId};

use crate::domain::AbstractDomain;
use crate::environment::{MemoryLocation, MemoryLocationSet};
use crate::feature::FeatureSet;
use crate::interval::ClassIntervalContext;
use crate::kind::Kind;
use crate::model::{MethodInfo, Model};
use crate::position::Position;
use crate::taint::Taint;

use super::instruction::{InstructionIndex, Register};

/// Per-instruction aliasing results.
///
/// Result memory locations are fresh per instruction unless the oracle
/// itself aliases them; the `inline-as-getter` shortcut relies on this to
/// leave the invoke result location untouched without losing taint.
pub trait AliasingOracle {
    /// Memory locations a register may point to at this instruction.
    fn register_memory_locations(&self, register: Register) -> MemoryLocationSet;

    /// All register-to-locations bindings at this instruction.
    fn register_memory_locations_map(&self) -> FxHashMap<Register, MemoryLocationSet>;

    /// The single result memory location, when the instruction produces an
    /// unaliased result.
    fn result_memory_location(&self) -> Option<MemoryLocation>;

    /// All result memory locations.
    fn result_memory_locations(&self) -> MemoryLocationSet;

    /// The source position of this instruction.
    fn position(&self) -> Position;
}

/// A resolved field access target.
#[derive(Debug, Clone)]
pub struct FieldTarget {
    pub field: FieldId,
    pub is_static: bool,
}

/// A resolved callee with its current model.
#[derive(Debug, Clone)]
pub struct ResolvedCall {
    pub method_info: MethodInfo,
    pub model: Model,
    /// The receiver's interval context at this call site.
    pub class_interval: ClassIntervalContext,
}

/// An artificial callee attached by the call graph (anonymous-class
/// construction, field-stored runnables).
#[derive(Debug, Clone)]
pub struct ArtificialCallee {
    pub call: ResolvedCall,
    /// Callee argument position to caller register.
    pub argument_registers: FxHashMap<u8, Register>,
}

/// Call graph queries.
pub trait CallGraphOracle {
    /// The resolved callee of an invoke instruction, if any.
    fn resolved_call(&self, caller: &MethodId, instruction: InstructionIndex)
        -> Option<ResolvedCall>;

    /// Artificial callees attached to an instruction.
    fn artificial_callees(
        &self,
        caller: &MethodId,
        instruction: InstructionIndex,
    ) -> Vec<ArtificialCallee>;

    /// The resolved field target of a field access instruction, if any.
    fn resolved_field_access(
        &self,
        caller: &MethodId,
        instruction: InstructionIndex,
    ) -> Option<FieldTarget>;
}

/// Field-source, field-sink, and literal-source registry.
pub trait FieldRegistry {
    /// Taint produced by reading the field.
    fn field_sources(&self, field: &FieldTarget) -> Taint;

    /// Sink taint absorbed by writing the field.
    fn field_sinks(&self, field: &FieldTarget) -> Taint;

    /// Taint produced by loading the exact string literal.
    fn literal_sources(&self, literal: &sift_core::types::LiteralId) -> Taint;

    /// Whether `check-cast` to this type records a `via-cast` feature.
    fn allowed_via_cast(&self, cast_type: &TypeId) -> bool;

    /// Sink taint checked against array allocations.
    fn array_allocation_sinks(&self) -> Taint {
        Taint::bottom()
    }
}

/// Class properties: features attached to issues involving given kinds.
pub trait ClassPropertiesOracle {
    fn issue_features(&self, method: &MethodId, kinds: &[Kind]) -> FeatureSet;
}

/// Class interval queries.
pub trait ClassIntervalsOracle {
    /// The interval context of the method's declaring class.
    fn caller_interval(&self, method: &MethodId) -> ClassIntervalContext;
}

/// A field registry with no configured sources or sinks.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyFieldRegistry;

impl FieldRegistry for EmptyFieldRegistry {
    fn field_sources(&self, _field: &FieldTarget) -> Taint {
        Taint::bottom()
    }

    fn field_sinks(&self, _field: &FieldTarget) -> Taint {
        Taint::bottom()
    }

    fn literal_sources(&self, _literal: &sift_core::types::LiteralId) -> Taint {
        Taint::bottom()
    }

    fn allowed_via_cast(&self, _cast_type: &TypeId) -> bool {
        false
    }
}

/// Class properties oracle attaching no features.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyClassProperties;

impl ClassPropertiesOracle for EmptyClassProperties {
    fn issue_features(&self, _method: &MethodId, _kinds: &[Kind]) -> FeatureSet {
        FeatureSet::new()
    }
}

/// Interval oracle returning the uninformative context.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyClassIntervals;

impl ClassIntervalsOracle for EmptyClassIntervals {
    fn caller_interval(&self, _method: &MethodId) -> ClassIntervalContext {
        ClassIntervalContext::top()
    }
}

/// A call graph with no resolved callees or fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyCallGraph;

impl CallGraphOracle for EmptyCallGraph {
    fn resolved_call(
        &self,
        _caller: &MethodId,
        _instruction: InstructionIndex,
    ) -> Option<ResolvedCall> {
        None
    }

    fn artificial_callees(
        &self,
        _caller: &MethodId,
        _instruction: InstructionIndex,
    ) -> Vec<ArtificialCallee> {
        Vec::new()
    }

    fn resolved_field_access(
        &self,
        _caller: &MethodId,
        _instruction: InstructionIndex,
    ) -> Option<FieldTarget> {
        None
    }
}
