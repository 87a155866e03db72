//! The invoke transfer: instantiate the callee's model at the call site.
//!
//! Processing order per call: sink matching, call-effect sinks, argument
//! feature application, the inline-as-setter shortcut or propagations,
//! generations, then artificial callees (sinks and call-effect sinks only).
//! Partial-rule progress survives across all sinks of the call and is stored
//! on the instruction for the backward analysis.

use sift_core::types::collections::FxHashMap;
use sift_core::types::{LiteralId, TypeId};
use tracing::debug;

use crate::access_path::{AccessPath, Path, Root};
use crate::domain::AbstractDomain;
use crate::environment::TaintEnvironment;
use crate::factories::Factories;
use crate::feature::FeatureMayAlwaysSet;
use crate::model::SanitizerKind;
use crate::position::Position;
use crate::rules::matcher::check_flows;
use crate::rules::partial::FulfilledPartialKindState;
use crate::taint::tree::{apply_collapse_depth, collapse_tree};
use crate::taint::{PropagateContext, Taint};
use crate::transforms::{apply_propagation, TransformDirection};
use crate::tree::UpdateKind;

use super::instruction::{InstructionIndex, InvokeInstruction, Register};
use super::oracle::{AliasingOracle, ResolvedCall};
use super::{clear_result, MethodContext};

/// Argument registers of a (possibly artificial) call.
enum ArgumentRegisters<'a> {
    Positional(&'a [Register]),
    Mapped(&'a FxHashMap<u8, Register>),
}

impl ArgumentRegisters<'_> {
    fn get(&self, index: u8) -> Option<Register> {
        match self {
            ArgumentRegisters::Positional(registers) => {
                registers.get(index as usize).copied()
            }
            ArgumentRegisters::Mapped(map) => map.get(&index).copied(),
        }
    }

    fn positions(&self) -> Vec<u8> {
        match self {
            ArgumentRegisters::Positional(registers) => {
                (0..registers.len() as u8).collect()
            }
            ArgumentRegisters::Mapped(map) => map.keys().copied().collect(),
        }
    }
}

pub(crate) fn analyze_invoke(
    context: &mut MethodContext<'_>,
    index: InstructionIndex,
    invoke: &InvokeInstruction,
    aliasing: &dyn AliasingOracle,
    environment: &mut TaintEnvironment,
) {
    // Reads go against the state before the call; writes against the state
    // after.
    let previous = environment.clone();
    let mut partial_state = FulfilledPartialKindState::new();
    let mut sink_counter = 0usize;

    let resolved = context
        .call_graph
        .resolved_call(&context.method.id, index);
    match &resolved {
        Some(call) => {
            process_call(
                context,
                invoke,
                call,
                aliasing,
                &previous,
                environment,
                &mut partial_state,
                &mut sink_counter,
            );
        }
        None => {
            debug!(target: "sift::transfer", "Unresolved callee; applying the default transfer");
            clear_result(aliasing, environment);
        }
    }

    // Artificial callees contribute sink flows only.
    for artificial in context
        .call_graph
        .artificial_callees(&context.method.id, index)
    {
        let arguments = ArgumentRegisters::Mapped(&artificial.argument_registers);
        process_sinks(
            context,
            &arguments,
            &artificial.call,
            &invoke.constant_arguments,
            &invoke.register_types,
            aliasing,
            &previous,
            &mut partial_state,
            &mut sink_counter,
        );
        process_call_effect_sinks(
            context,
            &artificial.call,
            aliasing,
            &mut partial_state,
            &mut sink_counter,
        );
    }

    context.fulfilled_partial_sinks.insert(index, partial_state);
}

#[allow(clippy::too_many_arguments)]
fn process_call(
    context: &mut MethodContext<'_>,
    invoke: &InvokeInstruction,
    call: &ResolvedCall,
    aliasing: &dyn AliasingOracle,
    previous: &TaintEnvironment,
    environment: &mut TaintEnvironment,
    partial_state: &mut FulfilledPartialKindState,
    sink_counter: &mut usize,
) {
    let arguments = ArgumentRegisters::Positional(&invoke.arguments);

    clear_result(aliasing, environment);

    process_sinks(
        context,
        &arguments,
        call,
        &invoke.constant_arguments,
        &invoke.register_types,
        aliasing,
        previous,
        partial_state,
        sink_counter,
    );
    process_call_effect_sinks(context, call, aliasing, partial_state, sink_counter);
    apply_argument_features(context, &arguments, call, aliasing, previous, environment);

    if !apply_inline_as_setter(context, &arguments, call, aliasing, previous, environment) {
        apply_propagations(
            context,
            &arguments,
            call,
            invoke,
            aliasing,
            previous,
            environment,
        );
    }

    apply_generations(
        context,
        &arguments,
        call,
        invoke,
        aliasing,
        environment,
    );
}

/// Step 3: match caller taint against the callee's declared and inferred
/// sinks.
#[allow(clippy::too_many_arguments)]
fn process_sinks(
    context: &mut MethodContext<'_>,
    arguments: &ArgumentRegisters<'_>,
    call: &ResolvedCall,
    constant_arguments: &FxHashMap<u8, LiteralId>,
    register_types: &FxHashMap<u8, TypeId>,
    aliasing: &dyn AliasingOracle,
    previous: &TaintEnvironment,
    partial_state: &mut FulfilledPartialKindState,
    sink_counter: &mut usize,
) {
    let factories = context.factories;
    let model = &call.model;
    let info = &call.method_info;
    let call_position = aliasing.position();
    let callee_text = factories.resolve_method(&info.id).to_string();
    let flow_context = context.flow_context();

    for (port, sink_taint) in model.sinks().elements() {
        let sink_index = *sink_counter;
        *sink_counter += 1;

        let Some(argument_index) = port.root().argument_index() else {
            continue;
        };
        let Some(register) = arguments.get(argument_index) else {
            continue;
        };

        let resolved_path = port
            .path()
            .resolve_indices(|index| constant_arguments.get(&index).copied());
        let locations = aliasing.register_memory_locations(register);
        let source_tree = previous.read_set(&locations, &resolved_path);
        let sources = collapse_tree(&source_tree, factories.features.get_issue_broadening());
        if sources.is_bottom() {
            continue;
        }

        let mut sinks = model.sanitize_taint(sink_taint, SanitizerKind::Sinks, port.root());
        if sinks.is_bottom() {
            continue;
        }
        let origin = factories
            .origins
            .method(info.id, factories.access_paths.get(port.clone()));
        sinks.add_origins_if_declaration(&origin);
        let sinks = propagate_at(
            factories,
            context.heuristics.effective_max_source_sink_distance(),
            call,
            &port,
            &call_position,
            FeatureMayAlwaysSet::from_always(model.attach_to_sinks(port.root())),
            register_types,
            constant_arguments,
            &sinks,
        );
        if sinks.is_bottom() {
            continue;
        }

        check_flows(
            &flow_context,
            &sources,
            &sinks,
            &call_position,
            sink_index,
            &callee_text,
            Some(info.id),
            &FeatureMayAlwaysSet::new(),
            Some(&mut *partial_state),
            &mut context.new_model,
        );
    }
}

/// Step 4: match the caller's call-effect sources against the callee's
/// call-effect sinks.
fn process_call_effect_sinks(
    context: &mut MethodContext<'_>,
    call: &ResolvedCall,
    aliasing: &dyn AliasingOracle,
    partial_state: &mut FulfilledPartialKindState,
    sink_counter: &mut usize,
) {
    let factories = context.factories;
    let model = &call.model;
    let info = &call.method_info;
    let call_position = aliasing.position();
    let callee_text = factories.resolve_method(&info.id).to_string();
    let empty_types: FxHashMap<u8, TypeId> = FxHashMap::default();
    let empty_constants: FxHashMap<u8, LiteralId> = FxHashMap::default();
    let flow_context = context.flow_context();

    for (port, sink_taint) in model.call_effect_sinks().elements() {
        let sink_index = *sink_counter;
        *sink_counter += 1;

        let root = port.root();
        if !root.is_call_effect() {
            continue;
        }

        let source_tree = context
            .previous_model
            .call_effect_sources()
            .read(&AccessPath::from_root(root));
        let mut sources =
            collapse_tree(&source_tree, factories.features.get_issue_broadening());
        if sources.is_bottom() {
            continue;
        }
        let caller_origin = factories.origins.method(
            context.method.id,
            factories.access_paths.get(AccessPath::from_root(root)),
        );
        sources.add_origins_if_declaration(&caller_origin);

        let mut sinks = model.sanitize_taint(sink_taint, SanitizerKind::Sinks, root);
        if sinks.is_bottom() {
            continue;
        }
        let origin = factories
            .origins
            .method(info.id, factories.access_paths.get(port.clone()));
        sinks.add_origins_if_declaration(&origin);
        let sinks = propagate_at(
            factories,
            context.heuristics.effective_max_source_sink_distance(),
            call,
            &port,
            &call_position,
            FeatureMayAlwaysSet::from_always(model.attach_to_sinks(root)),
            &empty_types,
            &empty_constants,
            &sinks,
        );
        if sinks.is_bottom() {
            continue;
        }

        check_flows(
            &flow_context,
            &sources,
            &sinks,
            &call_position,
            sink_index,
            &callee_text,
            Some(info.id),
            &FeatureMayAlwaysSet::new(),
            Some(&mut *partial_state),
            &mut context.new_model,
        );
    }
}

/// Step 5: apply `add_features_to_arguments` and `via-obscure` as strong
/// writes, so always-features do not degrade to may-features.
fn apply_argument_features(
    context: &MethodContext<'_>,
    arguments: &ArgumentRegisters<'_>,
    call: &ResolvedCall,
    aliasing: &dyn AliasingOracle,
    previous: &TaintEnvironment,
    environment: &mut TaintEnvironment,
) {
    let factories = context.factories;
    let model = &call.model;
    if !model.has_add_features_to_arguments() && !model.add_via_obscure_feature() {
        return;
    }

    for position in arguments.positions() {
        let mut features = model.add_features_to_arguments(Root::Argument(position));
        if model.add_via_obscure_feature() {
            features.add(factories.features.get_via_obscure());
        }
        if features.is_empty() {
            continue;
        }
        let Some(register) = arguments.get(position) else {
            continue;
        };
        let locations = aliasing.register_memory_locations(register);
        let mut tree = previous.read_set(&locations, &Path::new());
        if tree.is_bottom() {
            continue;
        }
        let features = FeatureMayAlwaysSet::from_always(features);
        tree.map(|taint| taint.add_locally_inferred_features(&features));
        environment.write_tree_set(&locations, &Path::new(), &tree, UpdateKind::Strong);
    }
}

/// Step 7: the `inline-as-setter` shortcut bypasses propagations.
fn apply_inline_as_setter(
    context: &MethodContext<'_>,
    arguments: &ArgumentRegisters<'_>,
    call: &ResolvedCall,
    aliasing: &dyn AliasingOracle,
    previous: &TaintEnvironment,
    environment: &mut TaintEnvironment,
) -> bool {
    let Some(setter) = call.model.inline_as_setter() else {
        return false;
    };
    let (Some(value_index), Some(target_index)) = (
        setter.value.root().argument_index(),
        setter.target.root().argument_index(),
    ) else {
        debug_assert!(false, "inline-as-setter ports must be arguments");
        return true;
    };
    let (Some(value_register), Some(target_register)) =
        (arguments.get(value_index), arguments.get(target_index))
    else {
        return true;
    };

    let value_locations = aliasing.register_memory_locations(value_register);
    let mut tree = previous.read_set(&value_locations, setter.value.path());
    let position = aliasing.position();
    let max_positions = context.heuristics.effective_max_local_positions();
    tree.map(|taint| taint.add_local_position(&position, max_positions));

    let target_locations = aliasing.register_memory_locations(target_register);
    environment.write_tree_set(&target_locations, setter.target.path(), &tree, UpdateKind::Strong);
    true
}

/// Step 6: apply the callee's propagations.
#[allow(clippy::too_many_arguments)]
fn apply_propagations(
    context: &MethodContext<'_>,
    arguments: &ArgumentRegisters<'_>,
    call: &ResolvedCall,
    invoke: &InvokeInstruction,
    aliasing: &dyn AliasingOracle,
    previous: &TaintEnvironment,
    environment: &mut TaintEnvironment,
) {
    let factories = context.factories;
    let heuristics = context.heuristics;
    let model = &call.model;
    let call_position = aliasing.position();
    let max_positions = heuristics.effective_max_local_positions();

    for (input_path, propagation_taint) in model.propagations().elements() {
        let Some(argument_index) = input_path.root().argument_index() else {
            continue;
        };
        let Some(register) = arguments.get(argument_index) else {
            continue;
        };
        let resolved_input = input_path
            .path()
            .resolve_indices(|index| invoke.constant_arguments.get(&index).copied());
        let locations = aliasing.register_memory_locations(register);
        let input_tree = previous.read_set(&locations, &resolved_input);
        if input_tree.is_bottom() {
            continue;
        }

        for frame in propagation_taint.frames() {
            if model.is_sanitized(frame.kind(), SanitizerKind::Propagations, input_path.root()) {
                continue;
            }
            let Some(output) = frame.kind().propagation_output() else {
                continue;
            };
            let output_root = match output {
                crate::kind::PropagationOutput::Return => Root::Return,
                crate::kind::PropagationOutput::Argument(index) => Root::Argument(index),
            };

            let mut features = model.add_features_to_arguments(input_path.root());
            features.union_with(&model.add_features_to_arguments(output_root));
            features.union_with(&model.attach_to_propagations(output_root));
            let mut frame_features = frame.features_joined();
            frame_features.add_always_set(&features);

            for (output_path, collapse_depth) in frame.output_paths().elements() {
                let mut tree = input_tree.clone();

                let is_transform = frame.kind().is_transform();
                tree.map(|taint| {
                    if is_transform {
                        *taint = apply_propagation(
                            factories,
                            heuristics,
                            frame.kind(),
                            taint,
                            TransformDirection::Forward,
                        );
                    }
                    if !frame_features.is_empty() {
                        taint.add_locally_inferred_features(&frame_features);
                    }
                    taint.add_local_position(&call_position, max_positions);
                });

                if collapse_depth.should_collapse() && !model.no_collapse_on_propagation() {
                    apply_collapse_depth(
                        &mut tree,
                        *collapse_depth,
                        factories.features.get_propagation_broadening(),
                    );
                }

                let update = if model.strong_write_on_propagation() {
                    UpdateKind::Strong
                } else {
                    UpdateKind::Weak
                };
                match output {
                    crate::kind::PropagationOutput::Return => {
                        let result_locations = aliasing.result_memory_locations();
                        environment.write_tree_set(&result_locations, &output_path, &tree, update);
                    }
                    crate::kind::PropagationOutput::Argument(index) => {
                        if let Some(output_register) = arguments.get(index) {
                            let output_locations =
                                aliasing.register_memory_locations(output_register);
                            environment.write_tree_set(
                                &output_locations,
                                &output_path,
                                &tree,
                                update,
                            );
                        }
                    }
                }
            }
        }
    }
}

/// Step 8: taint targets with the callee's generations. Step 9: the
/// `inline-as-getter` shortcut leaves the invoke result untouched; the
/// aliasing oracle's fresh-result contract keeps this sound.
fn apply_generations(
    context: &MethodContext<'_>,
    arguments: &ArgumentRegisters<'_>,
    call: &ResolvedCall,
    invoke: &InvokeInstruction,
    aliasing: &dyn AliasingOracle,
    environment: &mut TaintEnvironment,
) {
    let factories = context.factories;
    let model = &call.model;
    let info = &call.method_info;
    let call_position = aliasing.position();
    let skip_return = model.inline_as_getter().is_some() && !info.returns_void;

    for (port, generation_taint) in model.generations().elements() {
        let root = port.root();
        if root == Root::Return && skip_return {
            continue;
        }
        let mut taint = model.sanitize_taint(generation_taint, SanitizerKind::Sources, root);
        if taint.is_bottom() {
            continue;
        }
        let origin = factories
            .origins
            .method(info.id, factories.access_paths.get(port.clone()));
        taint.add_origins_if_declaration(&origin);
        let propagated = propagate_at(
            factories,
            context.heuristics.effective_max_source_sink_distance(),
            call,
            &port,
            &call_position,
            FeatureMayAlwaysSet::from_always(model.attach_to_sources(root)),
            &invoke.register_types,
            &invoke.constant_arguments,
            &taint,
        );
        if propagated.is_bottom() {
            continue;
        }

        match root {
            Root::Return => {
                let result_locations = aliasing.result_memory_locations();
                environment.write_set(&result_locations, port.path(), &propagated, UpdateKind::Weak);
            }
            Root::Argument(index) => {
                if let Some(register) = arguments.get(index) {
                    let locations = aliasing.register_memory_locations(register);
                    environment.write_set(&locations, port.path(), &propagated, UpdateKind::Weak);
                }
            }
            _ => {}
        }
    }
}

/// Instantiate callee taint at this call site.
#[allow(clippy::too_many_arguments)]
fn propagate_at<'a>(
    factories: &'a Factories,
    max_source_sink_distance: u32,
    call: &ResolvedCall,
    port: &AccessPath,
    call_position: &Position,
    extra_features: FeatureMayAlwaysSet,
    register_types: &'a FxHashMap<u8, TypeId>,
    constant_arguments: &'a FxHashMap<u8, LiteralId>,
    taint: &Taint,
) -> Taint {
    let context = PropagateContext {
        factories,
        callee: call.method_info.id,
        callee_port: factories.access_paths.get(port.clone()),
        call_position: call_position.clone(),
        max_source_sink_distance,
        extra_features,
        source_register_types: register_types,
        source_constant_arguments: constant_arguments,
        caller_interval: call.class_interval,
    };
    taint.propagate(&context)
}
