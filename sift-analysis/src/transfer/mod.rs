//! The per-method forward transfer function.
//!
//! One fixed-point iteration of one method is single-threaded: the driver
//! feeds instructions in its chosen order, the transfer updates the
//! environment and accumulates inferred facts and issues into the method's
//! new model. Unresolvable callees and field targets degrade to the default
//! transfer; they are the driver's completeness concern.

pub mod instruction;
pub mod invoke;
pub mod oracle;

pub use instruction::{Instruction, InstructionIndex, InvokeInstruction, Register};

use sift_core::config::Heuristics;
use sift_core::types::collections::FxHashMap;
use tracing::debug;

use crate::access_path::{AccessPath, Path, PathElement, Root};
use crate::domain::AbstractDomain;
use crate::environment::TaintEnvironment;
use crate::factories::Factories;
use crate::feature::{FeatureMayAlwaysSet, FeatureSet};
use crate::model::{MethodInfo, Model};
use crate::rules::matcher::{check_flows, FlowCheckContext};
use crate::rules::partial::FulfilledPartialKindState;
use crate::rules::Rules;
use crate::taint::tree::collapse_tree;
use crate::taint::{Taint, TaintTree};
use crate::tree::UpdateKind;

use oracle::{
    AliasingOracle, CallGraphOracle, ClassIntervalsOracle, ClassPropertiesOracle, FieldRegistry,
};

/// The owned state of one method's analysis iteration.
pub struct MethodContext<'a> {
    pub factories: &'a Factories,
    pub heuristics: &'a Heuristics,
    pub rules: &'a Rules,
    pub method: MethodInfo,
    /// The model from the previous iteration; immutable input.
    pub previous_model: &'a Model,
    /// The accumulator for this iteration.
    pub new_model: Model,
    pub call_graph: &'a dyn CallGraphOracle,
    pub field_registry: &'a dyn FieldRegistry,
    pub class_properties: &'a dyn ClassPropertiesOracle,
    pub class_intervals: &'a dyn ClassIntervalsOracle,
    /// Per-instruction partial-rule progress, retrieved by the backward
    /// analysis.
    pub fulfilled_partial_sinks: FxHashMap<InstructionIndex, FulfilledPartialKindState>,
}

impl<'a> MethodContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        factories: &'a Factories,
        heuristics: &'a Heuristics,
        rules: &'a Rules,
        method: MethodInfo,
        previous_model: &'a Model,
        call_graph: &'a dyn CallGraphOracle,
        field_registry: &'a dyn FieldRegistry,
        class_properties: &'a dyn ClassPropertiesOracle,
        class_intervals: &'a dyn ClassIntervalsOracle,
    ) -> Self {
        let new_model = Model::new(method.id);
        Self {
            factories,
            heuristics,
            rules,
            method,
            previous_model,
            new_model,
            call_graph,
            field_registry,
            class_properties,
            class_intervals,
            fulfilled_partial_sinks: FxHashMap::default(),
        }
    }

    /// The matcher context for this method, with the exploitability sources
    /// read from the previous model. The returned context does not borrow
    /// `self`, so the new model stays writable while matching.
    pub(crate) fn flow_context(&self) -> FlowCheckContext<'a> {
        let exploitability_sources = collapse_tree(
            &self
                .previous_model
                .call_effect_sources()
                .read(&AccessPath::from_root(Root::CallEffectExploitability)),
            self.factories.features.get_issue_broadening(),
        );
        FlowCheckContext {
            factories: self.factories,
            heuristics: self.heuristics,
            rules: self.rules,
            class_properties: self.class_properties,
            method: self.method.clone(),
            exploitability_sources,
        }
    }
}

/// Apply one instruction to the environment.
pub fn analyze_instruction(
    context: &mut MethodContext<'_>,
    index: InstructionIndex,
    instruction: &Instruction,
    aliasing: &dyn AliasingOracle,
    environment: &mut TaintEnvironment,
) {
    match instruction {
        Instruction::Default => {
            clear_result(aliasing, environment);
        }
        Instruction::CheckCast { source, cast_type } => {
            analyze_check_cast(context, *source, cast_type, aliasing, environment);
        }
        Instruction::ReadInstanceField { .. } => {
            analyze_field_read(context, index, /* is_static */ false, aliasing, environment);
        }
        Instruction::ReadStaticField => {
            analyze_field_read(context, index, /* is_static */ true, aliasing, environment);
        }
        Instruction::LoadParameter { index: parameter } => {
            analyze_load_parameter(context, *parameter, aliasing, environment);
        }
        Instruction::Move { .. } | Instruction::MoveResult | Instruction::ArrayGet { .. } => {
            // Aliasing already captured the flow.
        }
        Instruction::ArrayPut { source, array } => {
            analyze_array_put(context, *source, *array, aliasing, environment);
        }
        Instruction::NewArray { sources } => {
            analyze_new_array(context, sources, aliasing, environment);
        }
        Instruction::NumericalOp { sources } => {
            analyze_numerical_op(context, sources, aliasing, environment);
        }
        Instruction::ConstString { literal } => {
            let taint = context.field_registry.literal_sources(literal);
            clear_result(aliasing, environment);
            if !taint.is_bottom() {
                write_result(aliasing, environment, taint, UpdateKind::Strong);
            }
        }
        Instruction::WriteField { source } => {
            analyze_field_write(context, index, *source, aliasing, environment);
        }
        Instruction::Return { source } => {
            analyze_return(context, *source, aliasing, environment);
        }
        Instruction::Invoke(invoke) => {
            invoke::analyze_invoke(context, index, invoke, aliasing, environment);
        }
    }
}

/// Strong-write bottom into the instruction's result memory location.
pub(crate) fn clear_result(aliasing: &dyn AliasingOracle, environment: &mut TaintEnvironment) {
    if let Some(location) = aliasing.result_memory_location() {
        environment.write_tree(
            location,
            &Path::new(),
            TaintTree::bottom(),
            UpdateKind::Strong,
        );
    }
}

fn write_result(
    aliasing: &dyn AliasingOracle,
    environment: &mut TaintEnvironment,
    taint: Taint,
    kind: UpdateKind,
) {
    let locations = aliasing.result_memory_locations();
    environment.write_set(&locations, &Path::new(), &taint, kind);
}

fn analyze_check_cast(
    context: &mut MethodContext<'_>,
    source: Register,
    cast_type: &sift_core::types::TypeId,
    aliasing: &dyn AliasingOracle,
    environment: &mut TaintEnvironment,
) {
    let locations = aliasing.register_memory_locations(source);
    let mut tree = environment.read_set(&locations, &Path::new());

    if !tree.is_bottom() && context.field_registry.allowed_via_cast(cast_type) {
        let feature = context
            .factories
            .features
            .get_via_cast(context.factories.resolve_type(cast_type));
        tree.map(move |taint| {
            taint.add_locally_inferred_always_features(&FeatureSet::singleton(feature));
        });
    }

    let result_locations = aliasing.result_memory_locations();
    environment.write_tree_set(&result_locations, &Path::new(), &tree, UpdateKind::Strong);
}

fn analyze_field_read(
    context: &mut MethodContext<'_>,
    index: InstructionIndex,
    is_static: bool,
    aliasing: &dyn AliasingOracle,
    environment: &mut TaintEnvironment,
) {
    let Some(target) = context
        .call_graph
        .resolved_field_access(&context.method.id, index)
    else {
        debug!(target: "sift::transfer", "Unresolved field read; applying the default transfer");
        clear_result(aliasing, environment);
        return;
    };

    let mut taint = context.field_registry.field_sources(&target);
    if taint.is_bottom() {
        if is_static {
            clear_result(aliasing, environment);
        }
        return;
    }
    let origin = context.factories.origins.field(target.field);
    taint.add_origins_if_declaration(&origin);
    let taint = taint.attach_position(
        &aliasing.position(),
        &context.factories.access_paths.leaf(),
    );

    if is_static {
        write_result(aliasing, environment, taint, UpdateKind::Strong);
    } else {
        write_result(aliasing, environment, taint, UpdateKind::Weak);
    }
}

fn analyze_load_parameter(
    context: &mut MethodContext<'_>,
    parameter: u8,
    aliasing: &dyn AliasingOracle,
    environment: &mut TaintEnvironment,
) {
    let port = AccessPath::from_root(Root::Argument(parameter));
    let mut tree = context.previous_model.parameter_sources().read(&port);
    if tree.is_bottom() {
        clear_result(aliasing, environment);
        return;
    }

    let origin = context
        .factories
        .origins
        .method(context.method.id, context.factories.access_paths.argument(parameter));
    let entry_position = context.method.entry_position.clone();
    tree.map(move |taint| {
        *taint = taint.as_parameter_origins(&origin, &entry_position);
    });

    if let Some(location) = aliasing.result_memory_location() {
        environment.write_tree(location, &Path::new(), tree, UpdateKind::Strong);
    }
}

fn analyze_array_put(
    context: &mut MethodContext<'_>,
    source: Register,
    array: Register,
    aliasing: &dyn AliasingOracle,
    environment: &mut TaintEnvironment,
) {
    let source_locations = aliasing.register_memory_locations(source);
    let tree = environment.read_set(&source_locations, &Path::new());
    let mut taint = collapse_tree(&tree, context.factories.features.get_issue_broadening());
    if taint.is_bottom() {
        return;
    }

    taint.add_locally_inferred_always_features(&FeatureSet::singleton(
        context.factories.features.get_via_array(),
    ));
    taint.add_local_position(
        &aliasing.position(),
        context.heuristics.effective_max_local_positions(),
    );

    let array_locations = aliasing.register_memory_locations(array);
    let path = Path::from_elements([PathElement::AnyIndex]);
    environment.write_set(&array_locations, &path, &taint, UpdateKind::Weak);
}

fn analyze_new_array(
    context: &mut MethodContext<'_>,
    sources: &[Register],
    aliasing: &dyn AliasingOracle,
    environment: &mut TaintEnvironment,
) {
    let mut elements = Taint::bottom();
    for source in sources {
        let locations = aliasing.register_memory_locations(*source);
        let tree = environment.read_set(&locations, &Path::new());
        elements.join_with(&collapse_tree(
            &tree,
            context.factories.features.get_issue_broadening(),
        ));
    }

    // Flow-into-array-allocation check.
    let sinks = context.field_registry.array_allocation_sinks();
    if !sinks.is_bottom() && !elements.is_bottom() {
        let position = aliasing.position();
        let flow_context = context.flow_context();
        let mut partial_state = FulfilledPartialKindState::new();
        check_flows(
            &flow_context,
            &elements,
            &sinks,
            &position,
            /* sink_index */ 0,
            "array-allocation",
            None,
            &FeatureMayAlwaysSet::new(),
            Some(&mut partial_state),
            &mut context.new_model,
        );
    }

    clear_result(aliasing, environment);
    if !elements.is_bottom() {
        elements.add_locally_inferred_always_features(&FeatureSet::singleton(
            context.factories.features.get_via_array(),
        ));
        write_result(aliasing, environment, elements, UpdateKind::Strong);
    }
}

fn analyze_numerical_op(
    context: &mut MethodContext<'_>,
    sources: &[Register],
    aliasing: &dyn AliasingOracle,
    environment: &mut TaintEnvironment,
) {
    let mut taint = Taint::bottom();
    for source in sources {
        let locations = aliasing.register_memory_locations(*source);
        let tree = environment.read_set(&locations, &Path::new());
        taint.join_with(&collapse_tree(
            &tree,
            context.factories.features.get_issue_broadening(),
        ));
    }
    clear_result(aliasing, environment);
    if !taint.is_bottom() {
        taint.add_locally_inferred_always_features(&FeatureSet::singleton(
            context.factories.features.get_via_numerical_operator(),
        ));
        write_result(aliasing, environment, taint, UpdateKind::Strong);
    }
}

fn analyze_field_write(
    context: &mut MethodContext<'_>,
    index: InstructionIndex,
    source: Register,
    aliasing: &dyn AliasingOracle,
    environment: &mut TaintEnvironment,
) {
    let source_locations = aliasing.register_memory_locations(source);
    let tree = environment.read_set(&source_locations, &Path::new());
    let mut taint = collapse_tree(&tree, context.factories.features.get_issue_broadening());
    if taint.is_bottom() {
        return;
    }
    taint.add_local_position(
        &aliasing.position(),
        context.heuristics.effective_max_local_positions(),
    );

    if let Some(target) = context
        .call_graph
        .resolved_field_access(&context.method.id, index)
    {
        let sinks = context.field_registry.field_sinks(&target);
        if !sinks.is_bottom() {
            let mut sinks = sinks;
            let origin = context.factories.origins.field(target.field);
            sinks.add_origins_if_declaration(&origin);
            let sinks = sinks.attach_position(
                &aliasing.position(),
                &context.factories.access_paths.leaf(),
            );
            let position = aliasing.position();
            let field_name = context
                .factories
                .fields
                .resolve(&target.field.inner())
                .to_string();
            let flow_context = context.flow_context();
            let mut partial_state = FulfilledPartialKindState::new();
            check_flows(
                &flow_context,
                &taint,
                &sinks,
                &position,
                /* sink_index */ 0,
                &field_name,
                None,
                &FeatureMayAlwaysSet::new(),
                Some(&mut partial_state),
                &mut context.new_model,
            );
        }
    } else {
        debug!(target: "sift::transfer", "Unresolved field write; no sink matching");
    }

    // The target memory locations come from the oracle; the write is strong
    // only for an unaliased singleton target.
    let target_locations = aliasing.result_memory_locations();
    environment.write_set(&target_locations, &Path::new(), &taint, UpdateKind::Strong);
}

fn analyze_return(
    context: &mut MethodContext<'_>,
    source: Option<Register>,
    aliasing: &dyn AliasingOracle,
    environment: &mut TaintEnvironment,
) {
    let position = aliasing.position();

    if let Some(register) = source {
        let locations = aliasing.register_memory_locations(register);
        let tree = environment.read_set(&locations, &Path::new());
        if !tree.is_bottom() {
            infer_generations(context, Root::Return, &tree);

            // Match against the method's declared Return sinks.
            let mut sinks = collapse_tree(
                &context
                    .previous_model
                    .sinks()
                    .read(&AccessPath::from_root(Root::Return)),
                context.factories.features.get_issue_broadening(),
            );
            if !sinks.is_bottom() {
                let origin = context.factories.origins.method(
                    context.method.id,
                    context.factories.access_paths.return_port(),
                );
                sinks.add_origins_if_declaration(&origin);
                let sources =
                    collapse_tree(&tree, context.factories.features.get_issue_broadening());
                let callee = context
                    .factories
                    .resolve_method(&context.method.id)
                    .to_string();
                let flow_context = context.flow_context();
                check_flows(
                    &flow_context,
                    &sources,
                    &sinks,
                    &position,
                    /* sink_index */ 0,
                    &callee,
                    Some(context.method.id),
                    &FeatureMayAlwaysSet::new(),
                    None,
                    &mut context.new_model,
                );
            }
        }
    }

    // Infer generations for the receiver of instance methods.
    if !context.method.is_static {
        let receiver_locations = aliasing.register_memory_locations(Register(0));
        let tree = environment.read_set(&receiver_locations, &Path::new());
        if !tree.is_bottom() {
            infer_generations(context, Root::Argument(0), &tree);
        }
    }
}

/// Write the tree's taint into the new model as generations at `root`,
/// skipping taint that came from the method's own parameter sources.
fn infer_generations(context: &mut MethodContext<'_>, root: Root, tree: &TaintTree) {
    let method = context.method.id;
    let elements: Vec<(Path, Taint)> = tree
        .elements()
        .into_iter()
        .map(|(path, taint)| (path, taint.clone()))
        .collect();
    for (path, mut taint) in elements {
        taint.retain_frames(|frame| !frame.origins().contains_method(&method));
        if taint.is_bottom() {
            continue;
        }
        let port = AccessPath::new(root, path);
        let info = context.method.clone();
        context
            .new_model
            .add_generation(&port, taint, &info, context.heuristics, context.factories);
    }
}
