//! Size caps for the abstract domain.
//!
//! Every field is optional in the TOML form; `effective_*` accessors fall
//! back to the defaults in `crate::constants`. Exceeding any cap is not an
//! error: the domain collapses and records a broadening feature.

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::errors::ConfigError;

/// Tunable caps bounding every join-capable structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Heuristics {
    /// Maximum path length of a generation port.
    pub generation_max_port_size: Option<usize>,
    /// Maximum leaves in a generation output-path tree.
    pub generation_max_output_path_leaves: Option<usize>,
    /// Maximum path length of a parameter-source port.
    pub parameter_source_max_port_size: Option<usize>,
    /// Maximum leaves in a parameter-source output-path tree.
    pub parameter_source_max_output_path_leaves: Option<usize>,
    /// Maximum path length of a sink port.
    pub sink_max_port_size: Option<usize>,
    /// Maximum leaves in a sink input-path tree.
    pub sink_max_input_path_leaves: Option<usize>,
    /// Maximum path length of a call-effect-source port.
    pub call_effect_source_max_port_size: Option<usize>,
    /// Maximum path length of a call-effect-sink port.
    pub call_effect_sink_max_port_size: Option<usize>,
    /// Maximum path length of a propagation input path.
    pub propagation_max_input_path_size: Option<usize>,
    /// Maximum leaves in a propagation input-path tree.
    pub propagation_max_input_path_leaves: Option<usize>,
    /// Maximum path length of a propagation output path.
    pub propagation_max_output_path_size: Option<usize>,
    /// Maximum leaves in a propagation output-path tree.
    pub propagation_max_output_path_leaves: Option<usize>,
    /// Maximum path length retained on taint read for issue creation.
    pub issue_max_input_path_size: Option<usize>,
    /// Maximum leaves retained on taint read for issue creation.
    pub issue_max_input_path_leaves: Option<usize>,
    /// Maximum source-to-sink distance.
    pub max_source_sink_distance: Option<u32>,
    /// Maximum transform sequence length.
    pub max_transform_length: Option<usize>,
    /// Maximum local positions per taint value before widening to top.
    pub max_local_positions: Option<usize>,
    /// Tree height beyond which taint trees collapse on widening.
    pub taint_tree_widening_height: Option<usize>,
}

impl Heuristics {
    /// Create heuristics with all defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load heuristics from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let heuristics: Heuristics = toml::from_str(toml_str)?;
        heuristics.validate()?;
        Ok(heuristics)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("generation_max_port_size", self.generation_max_port_size),
            ("sink_max_port_size", self.sink_max_port_size),
            (
                "propagation_max_input_path_size",
                self.propagation_max_input_path_size,
            ),
            ("max_transform_length", self.max_transform_length),
        ];
        for (name, value) in positive {
            if let Some(0) = value {
                return Err(ConfigError::InvalidCap { name, value: 0 });
            }
        }
        Ok(())
    }

    pub fn effective_generation_max_port_size(&self) -> usize {
        self.generation_max_port_size
            .unwrap_or(constants::DEFAULT_GENERATION_MAX_PORT_SIZE)
    }

    pub fn effective_generation_max_output_path_leaves(&self) -> usize {
        self.generation_max_output_path_leaves
            .unwrap_or(constants::DEFAULT_GENERATION_MAX_OUTPUT_PATH_LEAVES)
    }

    pub fn effective_parameter_source_max_port_size(&self) -> usize {
        self.parameter_source_max_port_size
            .unwrap_or(constants::DEFAULT_PARAMETER_SOURCE_MAX_PORT_SIZE)
    }

    pub fn effective_parameter_source_max_output_path_leaves(&self) -> usize {
        self.parameter_source_max_output_path_leaves
            .unwrap_or(constants::DEFAULT_PARAMETER_SOURCE_MAX_OUTPUT_PATH_LEAVES)
    }

    pub fn effective_sink_max_port_size(&self) -> usize {
        self.sink_max_port_size
            .unwrap_or(constants::DEFAULT_SINK_MAX_PORT_SIZE)
    }

    pub fn effective_sink_max_input_path_leaves(&self) -> usize {
        self.sink_max_input_path_leaves
            .unwrap_or(constants::DEFAULT_SINK_MAX_INPUT_PATH_LEAVES)
    }

    pub fn effective_call_effect_source_max_port_size(&self) -> usize {
        self.call_effect_source_max_port_size
            .unwrap_or(constants::DEFAULT_CALL_EFFECT_SOURCE_MAX_PORT_SIZE)
    }

    pub fn effective_call_effect_sink_max_port_size(&self) -> usize {
        self.call_effect_sink_max_port_size
            .unwrap_or(constants::DEFAULT_CALL_EFFECT_SINK_MAX_PORT_SIZE)
    }

    pub fn effective_propagation_max_input_path_size(&self) -> usize {
        self.propagation_max_input_path_size
            .unwrap_or(constants::DEFAULT_PROPAGATION_MAX_INPUT_PATH_SIZE)
    }

    pub fn effective_propagation_max_input_path_leaves(&self) -> usize {
        self.propagation_max_input_path_leaves
            .unwrap_or(constants::DEFAULT_PROPAGATION_MAX_INPUT_PATH_LEAVES)
    }

    pub fn effective_propagation_max_output_path_size(&self) -> usize {
        self.propagation_max_output_path_size
            .unwrap_or(constants::DEFAULT_PROPAGATION_MAX_OUTPUT_PATH_SIZE)
    }

    pub fn effective_propagation_max_output_path_leaves(&self) -> usize {
        self.propagation_max_output_path_leaves
            .unwrap_or(constants::DEFAULT_PROPAGATION_MAX_OUTPUT_PATH_LEAVES)
    }

    pub fn effective_issue_max_input_path_size(&self) -> usize {
        self.issue_max_input_path_size
            .unwrap_or(constants::DEFAULT_ISSUE_MAX_INPUT_PATH_SIZE)
    }

    pub fn effective_issue_max_input_path_leaves(&self) -> usize {
        self.issue_max_input_path_leaves
            .unwrap_or(constants::DEFAULT_ISSUE_MAX_INPUT_PATH_LEAVES)
    }

    pub fn effective_max_source_sink_distance(&self) -> u32 {
        self.max_source_sink_distance
            .unwrap_or(constants::DEFAULT_MAX_SOURCE_SINK_DISTANCE)
    }

    pub fn effective_max_transform_length(&self) -> usize {
        self.max_transform_length
            .unwrap_or(constants::DEFAULT_MAX_TRANSFORM_LENGTH)
    }

    pub fn effective_max_local_positions(&self) -> usize {
        self.max_local_positions
            .unwrap_or(constants::DEFAULT_MAX_LOCAL_POSITIONS)
    }

    pub fn effective_taint_tree_widening_height(&self) -> usize {
        self.taint_tree_widening_height
            .unwrap_or(constants::DEFAULT_TAINT_TREE_WIDENING_HEIGHT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let heuristics = Heuristics::new();
        assert_eq!(heuristics.effective_generation_max_port_size(), 4);
        assert_eq!(heuristics.effective_sink_max_input_path_leaves(), 20);
        assert_eq!(heuristics.effective_max_source_sink_distance(), 10);
        assert_eq!(heuristics.effective_max_local_positions(), 20);
    }

    #[test]
    fn test_from_toml_overrides() {
        let heuristics = Heuristics::from_toml(
            r#"
            sink_max_port_size = 2
            max_source_sink_distance = 5
            "#,
        )
        .unwrap();
        assert_eq!(heuristics.effective_sink_max_port_size(), 2);
        assert_eq!(heuristics.effective_max_source_sink_distance(), 5);
        // Unset fields keep defaults.
        assert_eq!(heuristics.effective_generation_max_port_size(), 4);
    }

    #[test]
    fn test_zero_cap_rejected() {
        let result = Heuristics::from_toml("max_transform_length = 0");
        assert!(result.is_err());
    }
}
