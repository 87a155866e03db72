//! Tests for frames, taint, and call-site instantiation.

use sift_analysis::access_path::{AccessPath, Root};
use sift_analysis::domain::AbstractDomain;
use sift_analysis::factories::Factories;
use sift_analysis::feature::{FeatureMayAlwaysSet, FeatureSet};
use sift_analysis::interval::{ClassInterval, ClassIntervalContext};
use sift_analysis::origin::OriginSet;
use sift_analysis::taint::{CallKind, Frame, PropagateContext, Taint};
use sift_core::types::collections::FxHashMap;

fn features(factories: &Factories, names: &[&str]) -> FeatureSet {
    names.iter().map(|name| factories.features.get(name)).collect()
}

fn propagate_context<'a>(
    factories: &'a Factories,
    callee: &str,
    types: &'a FxHashMap<u8, sift_core::types::TypeId>,
    constants: &'a FxHashMap<u8, sift_core::types::LiteralId>,
) -> PropagateContext<'a> {
    PropagateContext {
        factories,
        callee: factories.method(callee),
        callee_port: factories.access_paths.argument(2),
        call_position: factories.positions.get_line(1),
        max_source_sink_distance: 100,
        extra_features: FeatureMayAlwaysSet::from_always(features(factories, &["FeatureThree"])),
        source_register_types: types,
        source_constant_arguments: constants,
        caller_interval: ClassIntervalContext::top(),
    }
}

#[test]
fn test_add_joins_on_grouping_key() {
    let factories = Factories::new();
    let kind = factories.kinds.named("Source");
    let port = factories.access_paths.leaf();
    let callee = factories.method("LCallee;.run:()V");
    let position = factories.positions.get_line(3);

    let mut taint = Taint::bottom();
    taint.add(
        Frame::with_call_kind(kind.clone(), port.clone(), CallKind::CallSite)
            .with_callee(callee)
            .with_call_position(position.clone())
            .with_distance(3),
    );
    taint.add(
        Frame::with_call_kind(kind.clone(), port.clone(), CallKind::CallSite)
            .with_callee(callee)
            .with_call_position(position)
            .with_distance(1),
    );

    // Frames sharing the grouping key join with the minimum distance.
    assert_eq!(taint.frame_count(), 1);
    assert_eq!(taint.frames().next().unwrap().distance(), 1);
}

#[test]
fn test_leq_and_join_laws() {
    let factories = Factories::new();
    let kind = factories.kinds.named("Source");
    let port = factories.access_paths.leaf();

    let small = Taint::singleton(Frame::declaration(kind.clone(), port.clone()));
    let mut big = small.clone();
    big.add(Frame::declaration(factories.kinds.named("Other"), port));

    assert!(Taint::bottom().leq(&small));
    assert!(small.leq(&big));
    assert!(!big.leq(&small));

    let mut joined = small.clone();
    joined.join_with(&big);
    assert!(joined.leq(&big) && big.leq(&joined));

    // Idempotence.
    let mut twice = big.clone();
    twice.join_with(&big);
    assert!(twice.leq(&big) && big.leq(&twice));
}

#[test]
fn test_propagate_promotes_user_features() {
    // Mirrors the behavior at a call site: user features become
    // always-inferred, locally-inferred features fold into the inferred
    // set, and extra features land locally-inferred.
    let factories = Factories::new();
    let one = factories.method("LOne;.one:()V");
    let two = factories.method("LTwo;.two:()V");
    let three = factories.method("LThree;.three:()V");
    let four = "LFour;.four:()V";
    let test_position = factories.positions.get_line(7);
    let types = FxHashMap::default();
    let constants = FxHashMap::default();

    let origin_frame = Frame::with_call_kind(
        factories.kinds.named("TestSource"),
        factories.access_paths.leaf(),
        CallKind::Origin,
    )
    .with_origins(OriginSet::singleton(
        factories.origins.method(one, factories.access_paths.leaf()),
    ))
    .with_user_features(features(&factories, &["UserFeatureOne"]));

    let callsite_distance_two = Frame::with_call_kind(
        factories.kinds.named("OtherSource"),
        factories.access_paths.argument(1),
        CallKind::CallSite,
    )
    .with_callee(two)
    .with_call_position(test_position.clone())
    .with_distance(2)
    .with_origins(OriginSet::singleton(
        factories.origins.method(two, factories.access_paths.leaf()),
    ))
    .with_inferred_features(FeatureMayAlwaysSet::from_always(features(
        &factories,
        &["FeatureOne"],
    )))
    .with_user_features(features(&factories, &["UserFeatureOne"]));

    let callsite_distance_one = Frame::with_call_kind(
        factories.kinds.named("OtherSource"),
        factories.access_paths.argument(0),
        CallKind::CallSite,
    )
    .with_callee(three)
    .with_call_position(test_position)
    .with_distance(1)
    .with_origins(OriginSet::singleton(
        factories.origins.method(three, factories.access_paths.leaf()),
    ))
    .with_inferred_features(FeatureMayAlwaysSet::from_always(features(
        &factories,
        &["FeatureOne"],
    )))
    .with_locally_inferred_features(FeatureMayAlwaysSet::from_always(features(
        &factories,
        &["FeatureTwo"],
    )))
    .with_user_features(features(&factories, &["UserFeatureOne", "UserFeatureTwo"]));

    let taint = Taint::from_frames([
        origin_frame,
        callsite_distance_two,
        callsite_distance_one,
    ]);

    let propagated = taint.propagate(&propagate_context(&factories, four, &types, &constants));

    let by_kind = propagated.partition_by_kind();
    assert_eq!(by_kind.len(), 2);

    // The origin frame becomes a distance-1 call-site frame; its user
    // feature is now always-inferred.
    let test_source = &by_kind[&factories.kinds.named("TestSource")];
    let frame = test_source.frames().next().unwrap();
    assert_eq!(frame.call_kind(), CallKind::CallSite);
    assert_eq!(frame.distance(), 1);
    assert_eq!(frame.callee(), Some(&factories.method(four)));
    assert_eq!(
        frame.inferred_features(),
        &FeatureMayAlwaysSet::from_always(features(&factories, &["UserFeatureOne"]))
    );
    assert_eq!(
        frame.locally_inferred_features(),
        &FeatureMayAlwaysSet::from_always(features(&factories, &["FeatureThree"]))
    );
    assert_eq!(frame.user_features(), &FeatureSet::new());

    // The two call-site frames collapse onto one bucket: minimum distance,
    // unioned origins, and a may/always split of the joined features.
    let other_source = &by_kind[&factories.kinds.named("OtherSource")];
    assert_eq!(other_source.frame_count(), 1);
    let frame = other_source.frames().next().unwrap();
    assert_eq!(frame.distance(), 2);
    assert_eq!(frame.origins().len(), 2);
    assert_eq!(
        frame.inferred_features(),
        &FeatureMayAlwaysSet::from_sets(
            features(&factories, &["UserFeatureTwo", "FeatureTwo"]),
            features(&factories, &["UserFeatureOne", "FeatureOne"]),
        )
    );
}

#[test]
fn test_propagate_distance_cutoff() {
    let factories = Factories::new();
    let types = FxHashMap::default();
    let constants = FxHashMap::default();

    let frame = Frame::with_call_kind(
        factories.kinds.named("Source"),
        factories.access_paths.leaf(),
        CallKind::CallSite,
    )
    .with_callee(factories.method("LA;.a:()V"))
    .with_distance(2);

    let taint = Taint::singleton(frame);
    let mut context = propagate_context(&factories, "LB;.b:()V", &types, &constants);
    context.max_source_sink_distance = 2;

    // distance 2 would become 3, past the cap: the frame is dropped and the
    // call site contributes nothing.
    assert!(taint.propagate(&context).is_bottom());
}

#[test]
fn test_propagate_resolves_via_ports() {
    let factories = Factories::new();
    let mut types = FxHashMap::default();
    types.insert(1u8, factories.type_name("Ljava/lang/String;"));
    let mut constants = FxHashMap::default();
    constants.insert(2u8, factories.literal("secret_key"));

    let frame = Frame::with_call_kind(
        factories.kinds.named("Source"),
        factories.access_paths.leaf(),
        CallKind::Origin,
    )
    .with_via_type_of_ports([factories.access_paths.argument(1)])
    .with_via_value_of_ports([factories.access_paths.argument(2)]);

    let taint = Taint::singleton(frame);
    let propagated = taint.propagate(&propagate_context(
        &factories,
        "LC;.c:()V",
        &types,
        &constants,
    ));

    let frame = propagated.frames().next().unwrap();
    let always = frame.inferred_features().always();
    assert!(always.contains(&factories.features.get("via-type:Ljava/lang/String;")));
    assert!(always.contains(&factories.features.get("via-value:secret_key")));
}

#[test]
fn test_intersect_intervals_with_self_is_identity() {
    let factories = Factories::new();
    let frame = Frame::with_call_kind(
        factories.kinds.named("Source"),
        factories.access_paths.leaf(),
        CallKind::Origin,
    )
    .with_interval(ClassIntervalContext::new(ClassInterval::new(2, 6), true));

    let mut taint = Taint::singleton(frame);
    let copy = taint.clone();
    taint.intersect_intervals_with(&copy);
    assert_eq!(taint, copy);
}

#[test]
fn test_intersect_intervals_drops_disjoint_frames() {
    let factories = Factories::new();
    let kind = factories.kinds.named("Source");
    let port = factories.access_paths.leaf();

    let preserving = |lower, upper| {
        Frame::with_call_kind(kind.clone(), port.clone(), CallKind::Origin)
            .with_interval(ClassIntervalContext::new(ClassInterval::new(lower, upper), true))
    };

    let mut taint = Taint::singleton(preserving(0, 10));
    taint.intersect_intervals_with(&Taint::singleton(preserving(20, 30)));
    assert!(taint.is_bottom());

    // A frame that does not preserve type context survives unconditionally.
    let mut unconstrained = Taint::singleton(
        Frame::with_call_kind(kind.clone(), port.clone(), CallKind::Origin)
            .with_interval(ClassIntervalContext::top()),
    );
    unconstrained.intersect_intervals_with(&Taint::singleton(preserving(20, 30)));
    assert!(!unconstrained.is_bottom());
}

#[test]
fn test_transform_kind_with_features() {
    let factories = Factories::new();
    let source = factories.kinds.named("Source");
    let transformed = factories.kinds.named("Transformed");
    let port = factories.access_paths.leaf();

    let taint = Taint::singleton(
        Frame::declaration(source.clone(), port)
            .with_user_features(features(&factories, &["User"])),
    );

    // Mapping to no kinds filters everything.
    let empty = taint.transform_kind_with_features(|_| Vec::new(), |_| FeatureSet::new());
    assert!(empty.is_bottom());

    // Mapping carries user features onto the replacement kind.
    let mapped = taint.transform_kind_with_features(
        |kind| {
            if *kind == source {
                vec![transformed.clone()]
            } else {
                vec![kind.clone()]
            }
        },
        |_| features(&factories, &["ViaTransform"]),
    );
    let frame = mapped.frames().next().unwrap();
    assert_eq!(frame.kind(), &transformed);
    assert_eq!(frame.user_features(), &features(&factories, &["User"]));
    assert!(frame
        .locally_inferred_features()
        .always()
        .contains(&factories.features.get("ViaTransform")));
}

#[test]
fn test_attach_position() {
    let factories = Factories::new();
    let taint = Taint::singleton(Frame::declaration(
        factories.kinds.named("Source"),
        factories.access_paths.argument(0),
    ));

    let position = factories.positions.get_line(42);
    let attached = taint.attach_position(&position, &factories.access_paths.leaf());
    let frame = attached.frames().next().unwrap();

    assert_eq!(frame.call_position(), Some(&position));
    assert_eq!(frame.callee_port(), &factories.access_paths.leaf());
    assert_eq!(frame.call_kind(), CallKind::Origin);
}

#[test]
fn test_local_positions_cap() {
    let factories = Factories::new();
    let mut taint = Taint::singleton(Frame::declaration(
        factories.kinds.named("Source"),
        factories.access_paths.leaf(),
    ));

    for line in 0..4 {
        taint.add_local_position(&factories.positions.get_line(line), 2);
    }
    assert!(taint.local_positions().is_top());
}

#[test]
fn test_features_joined_across_frames() {
    let factories = Factories::new();
    let port = factories.access_paths.leaf();

    let mut taint = Taint::singleton(
        Frame::declaration(factories.kinds.named("A"), port.clone())
            .with_user_features(features(&factories, &["shared", "only-a"])),
    );
    taint.add(
        Frame::declaration(factories.kinds.named("B"), port)
            .with_user_features(features(&factories, &["shared", "only-b"])),
    );

    let joined = taint.features_joined();
    assert!(joined.always().contains(&factories.features.get("shared")));
    assert!(joined.may().contains(&factories.features.get("only-a")));
    assert!(!joined.always().contains(&factories.features.get("only-b")));
}
