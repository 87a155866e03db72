//! End-to-end tests of the forward transfer function.

use sift_analysis::access_path::{AccessPath, Path, PathElement, Root};
use sift_analysis::domain::AbstractDomain;
use sift_analysis::environment::{MemoryLocation, MemoryLocationSet, TaintEnvironment};
use sift_analysis::factories::Factories;
use sift_analysis::interval::ClassIntervalContext;
use sift_analysis::model::{MethodInfo, Model, Modes};
use sift_analysis::rules::{RuleConfig, Rules};
use sift_analysis::taint::{CallKind, CollapseDepth, Frame, Taint};
use sift_analysis::transfer::oracle::{
    AliasingOracle, ArtificialCallee, CallGraphOracle, EmptyCallGraph, EmptyClassIntervals,
    EmptyClassProperties, FieldRegistry, FieldTarget, ResolvedCall,
};
use sift_analysis::transfer::{
    analyze_instruction, Instruction, InstructionIndex, InvokeInstruction, MethodContext, Register,
};
use sift_analysis::tree::{PathTree, UpdateKind};
use sift_core::config::Heuristics;
use sift_core::types::collections::{FxHashMap, FxHashSet};
use sift_core::types::{LiteralId, TypeId};

struct TestAliasing {
    registers: FxHashMap<Register, MemoryLocationSet>,
    result: Option<MemoryLocation>,
    position: sift_analysis::position::Position,
}

impl TestAliasing {
    fn new(factories: &Factories, line: i32) -> Self {
        Self {
            registers: FxHashMap::default(),
            result: None,
            position: factories.positions.get_line(line),
        }
    }

    fn with_register(mut self, register: u32, location: u32) -> Self {
        self.registers
            .entry(Register(register))
            .or_default()
            .insert(MemoryLocation(location));
        self
    }

    fn with_result(mut self, location: u32) -> Self {
        self.result = Some(MemoryLocation(location));
        self
    }
}

impl AliasingOracle for TestAliasing {
    fn register_memory_locations(&self, register: Register) -> MemoryLocationSet {
        self.registers.get(&register).cloned().unwrap_or_default()
    }

    fn register_memory_locations_map(&self) -> FxHashMap<Register, MemoryLocationSet> {
        self.registers.clone()
    }

    fn result_memory_location(&self) -> Option<MemoryLocation> {
        self.result
    }

    fn result_memory_locations(&self) -> MemoryLocationSet {
        self.result.into_iter().collect()
    }

    fn position(&self) -> sift_analysis::position::Position {
        self.position.clone()
    }
}

#[derive(Default)]
struct TestCallGraph {
    calls: FxHashMap<u32, ResolvedCall>,
    artificial: FxHashMap<u32, Vec<ArtificialCallee>>,
}

impl CallGraphOracle for TestCallGraph {
    fn resolved_call(
        &self,
        _caller: &sift_core::types::MethodId,
        instruction: InstructionIndex,
    ) -> Option<ResolvedCall> {
        self.calls.get(&instruction.0).cloned()
    }

    fn artificial_callees(
        &self,
        _caller: &sift_core::types::MethodId,
        instruction: InstructionIndex,
    ) -> Vec<ArtificialCallee> {
        self.artificial.get(&instruction.0).cloned().unwrap_or_default()
    }

    fn resolved_field_access(
        &self,
        _caller: &sift_core::types::MethodId,
        _instruction: InstructionIndex,
    ) -> Option<FieldTarget> {
        None
    }
}

#[derive(Default)]
struct TestRegistry {
    via_cast: FxHashSet<TypeId>,
}

impl FieldRegistry for TestRegistry {
    fn field_sources(&self, _field: &FieldTarget) -> Taint {
        Taint::bottom()
    }

    fn field_sinks(&self, _field: &FieldTarget) -> Taint {
        Taint::bottom()
    }

    fn literal_sources(&self, _literal: &LiteralId) -> Taint {
        Taint::bottom()
    }

    fn allowed_via_cast(&self, cast_type: &TypeId) -> bool {
        self.via_cast.contains(cast_type)
    }
}

fn method_info(factories: &Factories, signature: &str, arity: u8, returns_void: bool) -> MethodInfo {
    MethodInfo {
        id: factories.method(signature),
        arity,
        is_static: true,
        returns_void,
        parameter_type_overrides: false,
        entry_position: factories.positions.get_line(1),
    }
}

fn simple_rule(code: i32, source: &str, sink: &str) -> RuleConfig {
    RuleConfig {
        name: format!("Rule{}", code),
        code,
        description: String::new(),
        sources: vec![source.to_string()],
        sinks: vec![sink.to_string()],
        transforms: Vec::new(),
        multi_sources: Default::default(),
        partial_sinks: Vec::new(),
    }
}

fn declared(factories: &Factories, kind: &str) -> Taint {
    Taint::singleton(Frame::declaration(
        factories.kinds.named(kind),
        factories.access_paths.leaf(),
    ))
}

/// Scenario: a parameter source flowing into a declared sink produces one
/// issue with a distance-1 sink frame.
#[test]
fn test_simple_source_to_sink() {
    let factories = Factories::new();
    let heuristics = Heuristics::new();
    let rules = Rules::from_configs(&[simple_rule(1, "S", "T")], &factories);
    let registry = TestRegistry::default();
    let class_properties = EmptyClassProperties;
    let class_intervals = EmptyClassIntervals;

    let caller = method_info(&factories, "LApp;.m:(Ljava/lang/Object;)V", 1, true);
    let sink_info = method_info(&factories, "LSink;.sink:(Ljava/lang/Object;)V", 1, true);

    // The caller's previous model marks parameter 0 as a source of S.
    let mut previous_model = Model::new(caller.id);
    previous_model.add_parameter_source(
        &AccessPath::from_root(Root::Argument(0)),
        declared(&factories, "S"),
        &caller,
        &heuristics,
        &factories,
    );

    // The callee's model declares a sink of T at Argument(0).
    let mut sink_model = Model::new(sink_info.id);
    sink_model.add_sink(
        &AccessPath::from_root(Root::Argument(0)),
        declared(&factories, "T"),
        &sink_info,
        &heuristics,
        &factories,
    );

    let mut call_graph = TestCallGraph::default();
    call_graph.calls.insert(
        1,
        ResolvedCall {
            method_info: sink_info.clone(),
            model: sink_model,
            class_interval: ClassIntervalContext::top(),
        },
    );

    let mut context = MethodContext::new(
        &factories,
        &heuristics,
        &rules,
        caller.clone(),
        &previous_model,
        &call_graph,
        &registry,
        &class_properties,
        &class_intervals,
    );
    let mut environment = TaintEnvironment::new();

    // load-parameter v1; invoke sink(v1).
    let load = TestAliasing::new(&factories, 1).with_result(0);
    analyze_instruction(
        &mut context,
        InstructionIndex(0),
        &Instruction::LoadParameter { index: 0 },
        &load,
        &mut environment,
    );

    let invoke = TestAliasing::new(&factories, 2).with_register(1, 0);
    analyze_instruction(
        &mut context,
        InstructionIndex(1),
        &Instruction::Invoke(InvokeInstruction {
            arguments: vec![Register(1)],
            ..Default::default()
        }),
        &invoke,
        &mut environment,
    );

    assert_eq!(context.new_model.issues().len(), 1);
    let issue = context.new_model.issues().iter().next().unwrap();
    assert_eq!(issue.rule.code, 1);
    assert_eq!(issue.sink_index, 0);
    assert_eq!(issue.callee, "LSink;.sink:(Ljava/lang/Object;)V");

    // The source carries the caller's parameter origin.
    let source_frame = issue.sources.frames().next().unwrap();
    assert!(source_frame.origins().contains_method(&caller.id));

    // The sink frame sits one hop from the declaration.
    let sink_frame = issue.sinks.frames().next().unwrap();
    assert_eq!(sink_frame.distance(), 1);
    assert_eq!(sink_frame.call_kind(), CallKind::CallSite);
    assert_eq!(sink_frame.callee(), Some(&sink_info.id));
    assert!(sink_frame.origins().contains_method(&sink_info.id));
}

/// Scenario: check-cast to an allow-listed type keeps the taint and adds the
/// `via-cast:<type>` feature.
#[test]
fn test_via_cast() {
    let factories = Factories::new();
    let heuristics = Heuristics::new();
    let rules = Rules::from_configs(&[], &factories);
    let cast_type = factories.type_name("LMyType;");
    let mut registry = TestRegistry::default();
    registry.via_cast.insert(cast_type);
    let call_graph = EmptyCallGraph;
    let class_properties = EmptyClassProperties;
    let class_intervals = EmptyClassIntervals;

    let caller = method_info(&factories, "LApp;.cast:()V", 0, true);
    let previous_model = Model::new(caller.id);
    let mut context = MethodContext::new(
        &factories,
        &heuristics,
        &rules,
        caller,
        &previous_model,
        &call_graph,
        &registry,
        &class_properties,
        &class_intervals,
    );

    let mut environment = TaintEnvironment::new();
    environment.write(
        MemoryLocation(0),
        &Path::new(),
        Taint::singleton(Frame::with_call_kind(
            factories.kinds.named("S"),
            factories.access_paths.leaf(),
            CallKind::Origin,
        )),
        UpdateKind::Strong,
    );

    let aliasing = TestAliasing::new(&factories, 3).with_register(1, 0).with_result(1);
    analyze_instruction(
        &mut context,
        InstructionIndex(0),
        &Instruction::CheckCast {
            source: Register(1),
            cast_type,
        },
        &aliasing,
        &mut environment,
    );

    let result = environment.read(MemoryLocation(1));
    let frame = result.value().frames().next().unwrap();
    assert_eq!(frame.kind(), &factories.kinds.named("S"));
    assert!(frame
        .locally_inferred_features()
        .always()
        .contains(&factories.features.get("via-cast:LMyType;")));
}

/// Scenario: writing `[*]` weakly reaches existing indices, and fresh
/// indices inherit the background.
#[test]
fn test_index_wildcard_on_environment() {
    let factories = Factories::new();
    let source = |kind: &str| {
        Taint::singleton(Frame::with_call_kind(
            factories.kinds.named(kind),
            factories.access_paths.leaf(),
            CallKind::Origin,
        ))
    };
    let index = |name: &str| PathElement::Index(factories.literal(name));

    let mut environment = TaintEnvironment::new();
    let array = MemoryLocation(7);
    environment.write(
        array,
        &Path::from_elements([index("0")]),
        source("S"),
        UpdateKind::Weak,
    );
    environment.write(
        array,
        &Path::from_elements([PathElement::AnyIndex]),
        source("SPrime"),
        UpdateKind::Weak,
    );

    let at_index_zero = environment.read_path(array, &Path::from_elements([index("0")]));
    let kinds: Vec<_> = at_index_zero.value().kinds().cloned().collect();
    assert!(kinds.contains(&factories.kinds.named("S")));
    assert!(kinds.contains(&factories.kinds.named("SPrime")));

    let background =
        environment.read_path(array, &Path::from_elements([PathElement::AnyIndex]));
    assert!(background
        .value()
        .kinds()
        .any(|kind| *kind == factories.kinds.named("SPrime")));

    // A fresh index sees the background only.
    let fresh = environment.read_path(array, &Path::from_elements([index("1")]));
    let fresh_kinds: Vec<_> = fresh.value().kinds().cloned().collect();
    assert!(fresh_kinds.contains(&factories.kinds.named("SPrime")));
    assert!(!fresh_kinds.contains(&factories.kinds.named("S")));
}

/// Scenario: a multi-source rule fires only when both legs reach the same
/// call.
#[test]
fn test_multi_source_partial_rule() {
    let factories = Factories::new();
    let heuristics = Heuristics::new();
    let mut multi_sources = std::collections::BTreeMap::new();
    multi_sources.insert("a".to_string(), vec!["S1".to_string()]);
    multi_sources.insert("b".to_string(), vec!["S2".to_string()]);
    let rules = Rules::from_configs(
        &[RuleConfig {
            name: "Multi".to_string(),
            code: 2,
            description: String::new(),
            sources: Vec::new(),
            sinks: Vec::new(),
            transforms: Vec::new(),
            multi_sources,
            partial_sinks: vec!["TPartial".to_string()],
        }],
        &factories,
    );
    let registry = TestRegistry::default();
    let class_properties = EmptyClassProperties;
    let class_intervals = EmptyClassIntervals;

    let caller = method_info(&factories, "LApp;.both:()V", 0, true);
    let sink_info = method_info(&factories, "LSink;.combine:(II)V", 2, true);

    let mut sink_model = Model::new(sink_info.id);
    let partial_sink = |label: &str| {
        Taint::singleton(Frame::declaration(
            factories.kinds.partial("TPartial", label),
            factories.access_paths.leaf(),
        ))
    };
    sink_model.add_sink(
        &AccessPath::from_root(Root::Argument(0)),
        partial_sink("a"),
        &sink_info,
        &heuristics,
        &factories,
    );
    sink_model.add_sink(
        &AccessPath::from_root(Root::Argument(1)),
        partial_sink("b"),
        &sink_info,
        &heuristics,
        &factories,
    );

    let mut call_graph = TestCallGraph::default();
    call_graph.calls.insert(
        0,
        ResolvedCall {
            method_info: sink_info,
            model: sink_model,
            class_interval: ClassIntervalContext::top(),
        },
    );

    let origin_source = |kind: &str| {
        Taint::singleton(Frame::with_call_kind(
            factories.kinds.named(kind),
            factories.access_paths.leaf(),
            CallKind::Origin,
        ))
    };

    let run = |seed_second_leg: bool| -> usize {
        let previous_model = Model::new(caller.id);
        let mut context = MethodContext::new(
            &factories,
            &heuristics,
            &rules,
            caller.clone(),
            &previous_model,
            &call_graph,
            &registry,
            &class_properties,
            &class_intervals,
        );
        let mut environment = TaintEnvironment::new();
        environment.write(
            MemoryLocation(0),
            &Path::new(),
            origin_source("S1"),
            UpdateKind::Strong,
        );
        if seed_second_leg {
            environment.write(
                MemoryLocation(1),
                &Path::new(),
                origin_source("S2"),
                UpdateKind::Strong,
            );
        }

        let aliasing = TestAliasing::new(&factories, 4)
            .with_register(1, 0)
            .with_register(2, 1);
        analyze_instruction(
            &mut context,
            InstructionIndex(0),
            &Instruction::Invoke(InvokeInstruction {
                arguments: vec![Register(1), Register(2)],
                ..Default::default()
            }),
            &aliasing,
            &mut environment,
        );
        context.new_model.issues().len()
    };

    // Both legs in the same call: exactly one issue.
    assert_eq!(run(true), 1);
    // Only the `a` leg: no issue.
    assert_eq!(run(false), 0);
}

/// Scenario: propagation with collapse depths, with and without the
/// no-collapse mode.
#[test]
fn test_propagation_with_collapse_depth() {
    let factories = Factories::new();
    let heuristics = Heuristics::new();
    let rules = Rules::from_configs(&[], &factories);
    let registry = TestRegistry::default();
    let class_properties = EmptyClassProperties;
    let class_intervals = EmptyClassIntervals;

    let caller = method_info(&factories, "LApp;.reshape:()V", 0, true);
    let callee_info = method_info(
        &factories,
        "LLib;.reshape:(II)Ljava/lang/Object;",
        2,
        false,
    );

    let x = PathElement::Field(factories.field("x"));
    let y = PathElement::Field(factories.field("y"));
    let z = PathElement::Field(factories.field("z"));

    let build_callee = |no_collapse: bool| -> ResolvedCall {
        // Propagation from Argument(1) to Return with output paths
        // `{ []: no-collapse, .x: collapse 0 }`.
        let mut output_paths: PathTree<CollapseDepth> = PathTree::bottom();
        output_paths.write_value(&Path::new(), CollapseDepth::NoCollapse, UpdateKind::Weak);
        output_paths.write_value(
            &Path::from_elements([x]),
            CollapseDepth::zero(),
            UpdateKind::Weak,
        );
        let propagation = Taint::singleton(
            Frame::with_call_kind(
                factories.kinds.local_return(),
                factories.access_paths.leaf(),
                CallKind::Propagation,
            )
            .with_output_paths(output_paths),
        );
        let mut model = Model::new(callee_info.id);
        model.add_propagation(
            &AccessPath::from_root(Root::Argument(1)),
            propagation,
            &callee_info,
            &heuristics,
            &factories,
        );
        if no_collapse {
            model.add_mode(Modes::NO_COLLAPSE_ON_PROPAGATION);
        }
        ResolvedCall {
            method_info: callee_info.clone(),
            model,
            class_interval: ClassIntervalContext::top(),
        }
    };

    let source = |kind: &str| {
        Taint::singleton(Frame::with_call_kind(
            factories.kinds.named(kind),
            factories.access_paths.leaf(),
            CallKind::Origin,
        ))
    };

    let run = |no_collapse: bool| -> PathTree<Taint> {
        let mut call_graph = TestCallGraph::default();
        call_graph.calls.insert(0, build_callee(no_collapse));

        let previous_model = Model::new(caller.id);
        let mut context = MethodContext::new(
            &factories,
            &heuristics,
            &rules,
            caller.clone(),
            &previous_model,
            &call_graph,
            &registry,
            &class_properties,
            &class_intervals,
        );
        let mut environment = TaintEnvironment::new();
        // The argument holds { .x.y: S, .z: SPrime }.
        environment.write(
            MemoryLocation(0),
            &Path::from_elements([x, y]),
            source("S"),
            UpdateKind::Weak,
        );
        environment.write(
            MemoryLocation(0),
            &Path::from_elements([z]),
            source("SPrime"),
            UpdateKind::Weak,
        );

        let aliasing = TestAliasing::new(&factories, 5)
            .with_register(1, 1)
            .with_register(2, 0)
            .with_result(9);
        analyze_instruction(
            &mut context,
            InstructionIndex(0),
            &Instruction::Invoke(InvokeInstruction {
                arguments: vec![Register(1), Register(2)],
                ..Default::default()
            }),
            &aliasing,
            &mut environment,
        );
        environment.read(MemoryLocation(9))
    };

    let result = run(false);
    // The identity output path preserved .z and .x.y.
    let at_z = result.read(&Path::from_elements([z]));
    assert!(at_z
        .value()
        .kinds()
        .any(|kind| *kind == factories.kinds.named("SPrime")));
    assert!(result
        .raw_read(&Path::from_elements([x, y]))
        .value()
        .kinds()
        .any(|kind| *kind == factories.kinds.named("S")));
    // The .x output deposited the whole input there, collapsed and tagged
    // with the broadening feature.
    let at_x = result.raw_read(&Path::from_elements([x]));
    let x_kinds: Vec<_> = at_x.value().kinds().cloned().collect();
    assert!(x_kinds.contains(&factories.kinds.named("S")));
    assert!(x_kinds.contains(&factories.kinds.named("SPrime")));
    assert!(at_x.value().frames().any(|frame| {
        frame
            .locally_inferred_features()
            .may()
            .contains(&factories.features.get("via-propagation-broadening"))
    }));

    // With no-collapse-on-propagation, nothing is deposited at .x itself;
    // the input structure survives below it.
    let preserved = run(true);
    let at_x = preserved.raw_read(&Path::from_elements([x]));
    assert!(!at_x
        .value()
        .kinds()
        .any(|kind| *kind == factories.kinds.named("SPrime")));
    assert!(at_x.height() > 0);
}

/// Scenario: frames past the maximum source-sink distance are dropped at the
/// call site.
#[test]
fn test_distance_cutoff() {
    let factories = Factories::new();
    let heuristics = Heuristics::from_toml("max_source_sink_distance = 1").unwrap();
    let rules = Rules::from_configs(&[simple_rule(1, "S", "T")], &factories);
    let registry = TestRegistry::default();
    let class_properties = EmptyClassProperties;
    let class_intervals = EmptyClassIntervals;

    let caller = method_info(&factories, "LApp;.far:()V", 0, true);
    let sink_info = method_info(&factories, "LSink;.deep:(I)V", 1, true);

    // The callee's sink is already one hop away; the next hop exceeds the
    // cap.
    let mut sink_model = Model::new(sink_info.id);
    sink_model.add_sink(
        &AccessPath::from_root(Root::Argument(0)),
        Taint::singleton(
            Frame::with_call_kind(
                factories.kinds.named("T"),
                factories.access_paths.argument(0),
                CallKind::CallSite,
            )
            .with_callee(factories.method("LDeeper;.sink:(I)V"))
            .with_call_position(factories.positions.get_line(9))
            .with_distance(1),
        ),
        &sink_info,
        &heuristics,
        &factories,
    );

    let mut call_graph = TestCallGraph::default();
    call_graph.calls.insert(
        0,
        ResolvedCall {
            method_info: sink_info,
            model: sink_model,
            class_interval: ClassIntervalContext::top(),
        },
    );

    let previous_model = Model::new(caller.id);
    let mut context = MethodContext::new(
        &factories,
        &heuristics,
        &rules,
        caller,
        &previous_model,
        &call_graph,
        &registry,
        &class_properties,
        &class_intervals,
    );
    let mut environment = TaintEnvironment::new();
    environment.write(
        MemoryLocation(0),
        &Path::new(),
        Taint::singleton(Frame::with_call_kind(
            factories.kinds.named("S"),
            factories.access_paths.leaf(),
            CallKind::Origin,
        )),
        UpdateKind::Strong,
    );

    let aliasing = TestAliasing::new(&factories, 6).with_register(1, 0);
    analyze_instruction(
        &mut context,
        InstructionIndex(0),
        &Instruction::Invoke(InvokeInstruction {
            arguments: vec![Register(1)],
            ..Default::default()
        }),
        &aliasing,
        &mut environment,
    );

    // The sink frame was dropped at instantiation: no taint, no issue.
    assert!(context.new_model.issues().is_empty());
}

/// Generations taint the invoke result; returned taint becomes an inferred
/// generation unless it came from the method's own parameters.
#[test]
fn test_generations_and_return_inference() {
    let factories = Factories::new();
    let heuristics = Heuristics::new();
    let rules = Rules::from_configs(&[simple_rule(1, "S", "T")], &factories);
    let registry = TestRegistry::default();
    let class_properties = EmptyClassProperties;
    let class_intervals = EmptyClassIntervals;

    let caller = method_info(
        &factories,
        "LApp;.forward:(Ljava/lang/Object;)Ljava/lang/Object;",
        1,
        false,
    );
    let getter_info = method_info(&factories, "LLib;.source:()Ljava/lang/Object;", 0, false);

    let mut getter_model = Model::new(getter_info.id);
    getter_model.add_generation(
        &AccessPath::from_root(Root::Return),
        declared(&factories, "G"),
        &getter_info,
        &heuristics,
        &factories,
    );

    let mut call_graph = TestCallGraph::default();
    call_graph.calls.insert(
        1,
        ResolvedCall {
            method_info: getter_info.clone(),
            model: getter_model,
            class_interval: ClassIntervalContext::top(),
        },
    );

    // The caller's previous model marks parameter 0 as a source of S and
    // declares a Return sink of T.
    let mut previous_model = Model::new(caller.id);
    previous_model.add_parameter_source(
        &AccessPath::from_root(Root::Argument(0)),
        declared(&factories, "S"),
        &caller,
        &heuristics,
        &factories,
    );
    previous_model.add_sink(
        &AccessPath::from_root(Root::Return),
        declared(&factories, "T"),
        &caller,
        &heuristics,
        &factories,
    );

    let mut context = MethodContext::new(
        &factories,
        &heuristics,
        &rules,
        caller.clone(),
        &previous_model,
        &call_graph,
        &registry,
        &class_properties,
        &class_intervals,
    );
    let mut environment = TaintEnvironment::new();

    // v1 = parameter 0; v2 = source(); return v2 (aliased so the returned
    // register sees both the generation and the parameter taint).
    let load = TestAliasing::new(&factories, 1).with_result(0);
    analyze_instruction(
        &mut context,
        InstructionIndex(0),
        &Instruction::LoadParameter { index: 0 },
        &load,
        &mut environment,
    );

    let invoke = TestAliasing::new(&factories, 2).with_result(1);
    analyze_instruction(
        &mut context,
        InstructionIndex(1),
        &Instruction::Invoke(InvokeInstruction::default()),
        &invoke,
        &mut environment,
    );

    // The invoke result carries G, one hop from its declaration.
    let result = environment.read(MemoryLocation(1));
    let frame = result.value().frames().next().unwrap();
    assert_eq!(frame.kind(), &factories.kinds.named("G"));
    assert_eq!(frame.distance(), 1);
    assert_eq!(frame.callee(), Some(&getter_info.id));

    let return_instruction = TestAliasing::new(&factories, 3)
        .with_register(1, 0)
        .with_register(2, 1);
    // The return register aliases both the parameter and the result.
    let mut aliased = return_instruction;
    aliased.registers.get_mut(&Register(2)).unwrap().insert(MemoryLocation(0));
    analyze_instruction(
        &mut context,
        InstructionIndex(2),
        &Instruction::Return {
            source: Some(Register(2)),
        },
        &aliased,
        &mut environment,
    );

    // Inferred generations keep G but skip the method's own parameter
    // source S.
    let generations = context
        .new_model
        .generations()
        .read(&AccessPath::from_root(Root::Return));
    let generation_kinds: Vec<_> = generations.value().kinds().cloned().collect();
    assert!(generation_kinds.contains(&factories.kinds.named("G")));
    assert!(!generation_kinds.contains(&factories.kinds.named("S")));

    // The parameter source S reaching the declared Return sink T matches
    // Rule1: one issue at the return.
    assert_eq!(context.new_model.issues().len(), 1);
}
