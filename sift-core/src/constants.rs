//! Shared constants for the Sift analysis engine.

/// Sift version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ---- Abstract-domain size caps ----
//
// Every join-capable structure is bounded. Exceeding a cap collapses the
// structure and attaches the corresponding broadening feature.

/// Maximum path length of a generation port.
pub const DEFAULT_GENERATION_MAX_PORT_SIZE: usize = 4;

/// Maximum number of leaves in a generation output-path tree.
pub const DEFAULT_GENERATION_MAX_OUTPUT_PATH_LEAVES: usize = 20;

/// Maximum path length of a parameter-source port.
pub const DEFAULT_PARAMETER_SOURCE_MAX_PORT_SIZE: usize = 4;

/// Maximum number of leaves in a parameter-source output-path tree.
pub const DEFAULT_PARAMETER_SOURCE_MAX_OUTPUT_PATH_LEAVES: usize = 20;

/// Maximum path length of a sink port.
pub const DEFAULT_SINK_MAX_PORT_SIZE: usize = 4;

/// Maximum number of leaves in a sink input-path tree.
pub const DEFAULT_SINK_MAX_INPUT_PATH_LEAVES: usize = 20;

/// Maximum path length of a call-effect-source port.
pub const DEFAULT_CALL_EFFECT_SOURCE_MAX_PORT_SIZE: usize = 4;

/// Maximum path length of a call-effect-sink port.
pub const DEFAULT_CALL_EFFECT_SINK_MAX_PORT_SIZE: usize = 4;

/// Maximum path length of a propagation input path.
pub const DEFAULT_PROPAGATION_MAX_INPUT_PATH_SIZE: usize = 4;

/// Maximum number of leaves in a propagation input-path tree.
pub const DEFAULT_PROPAGATION_MAX_INPUT_PATH_LEAVES: usize = 4;

/// Maximum path length of a propagation output path.
pub const DEFAULT_PROPAGATION_MAX_OUTPUT_PATH_SIZE: usize = 4;

/// Maximum number of leaves in a propagation output-path tree.
pub const DEFAULT_PROPAGATION_MAX_OUTPUT_PATH_LEAVES: usize = 4;

/// Maximum path length retained on taint read for issue creation.
pub const DEFAULT_ISSUE_MAX_INPUT_PATH_SIZE: usize = 4;

/// Maximum number of leaves retained on taint read for issue creation.
pub const DEFAULT_ISSUE_MAX_INPUT_PATH_LEAVES: usize = 20;

/// Maximum source-to-sink distance. Frames exceeding the cap are dropped at
/// call-site instantiation.
pub const DEFAULT_MAX_SOURCE_SINK_DISTANCE: u32 = 10;

/// Maximum number of transforms in a transform sequence.
pub const DEFAULT_MAX_TRANSFORM_LENGTH: usize = 4;

/// Maximum number of local positions tracked per taint value before the set
/// widens to top.
pub const DEFAULT_MAX_LOCAL_POSITIONS: usize = 20;

/// Tree height beyond which taint trees are collapsed on widening.
pub const DEFAULT_TAINT_TREE_WIDENING_HEIGHT: usize = 4;

// ---- Broadening features ----
//
// Attached whenever the abstract domain loses precision.

/// Feature attached when a taint tree is collapsed during widening.
pub const FEATURE_WIDEN_BROADENING: &str = "via-widen-broadening";

/// Feature attached when taint is collapsed while creating an issue.
pub const FEATURE_ISSUE_BROADENING: &str = "via-issue-broadening";

/// Feature attached when taint is collapsed while applying a propagation.
pub const FEATURE_PROPAGATION_BROADENING: &str = "via-propagation-broadening";

// ---- Built-in features ----

/// Feature attached when taint flows through an unmodeled callee.
pub const FEATURE_VIA_OBSCURE: &str = "via-obscure";

/// Feature attached when taint flows into or out of an array.
pub const FEATURE_VIA_ARRAY: &str = "via-array";

/// Feature attached when taint flows through a numerical operator.
pub const FEATURE_VIA_NUMERICAL_OPERATOR: &str = "via-numerical-operator";

/// Feature prefix for allow-listed cast types (`via-cast:<type>`).
pub const FEATURE_VIA_CAST_PREFIX: &str = "via-cast:";

/// Feature prefix for resolved via-type-of ports (`via-type:<type>`).
pub const FEATURE_VIA_TYPE_PREFIX: &str = "via-type:";

/// Feature prefix for resolved via-value-of ports (`via-value:<literal>`).
pub const FEATURE_VIA_VALUE_PREFIX: &str = "via-value:";

/// Rendered when a via-type-of or via-value-of port cannot be resolved at the
/// call site.
pub const UNKNOWN_VIA_ANNOTATION: &str = "unknown";

/// Canonical-name template instantiated with the callee's leaf name.
pub const CANONICAL_TEMPLATE_LEAF_NAME: &str = "%programmatic_leaf_name%";
