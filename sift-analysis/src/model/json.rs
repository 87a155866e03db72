//! JSON mapping for models.
//!
//! The persisted shape is a plain `serde_json::Value` mapping; interned
//! handles make derived serde impractical, and the JSON shape, not a derive,
//! is the contract. Decoding never aborts on a bad fragment: the fragment is
//! dropped through the model-consistency hook and decoding continues.

use serde_json::{json, Map, Value};
use sift_core::config::Heuristics;
use sift_core::errors::ModelError;
use tracing::warn;

use crate::access_path::{AccessPath, Root};
use crate::domain::AbstractDomain;
use crate::factories::Factories;
use crate::feature::{FeatureMayAlwaysSet, FeatureSet};
use crate::kind::Kind;
use crate::origin::{CanonicalName, OriginData, OriginSet};
use crate::position::{Position, PositionData, UNKNOWN_LINE};
use crate::taint::{CallKind, CollapseDepth, Frame, Taint};
use crate::tree::{PathTree, UpdateKind};

use super::{InlineAsSetter, MethodInfo, Model, Modes, SanitizedKinds, Sanitizer, SanitizerKind};

/// Serialize a model to its JSON mapping.
pub fn model_to_json(model: &Model, factories: &Factories) -> Value {
    let mut object = Map::new();
    if let Some(method) = model.method() {
        object.insert(
            "method".to_string(),
            json!(factories.resolve_method(method)),
        );
    }
    if !model.modes().is_empty() {
        object.insert("modes".to_string(), json!(model.modes().names()));
    }
    let freeze = model.frozen().names();
    if !freeze.is_empty() {
        object.insert("freeze".to_string(), json!(freeze));
    }

    let tree_entries = |tree: &crate::taint::tree::TaintAccessPathTree| -> Value {
        Value::Array(
            tree.elements()
                .into_iter()
                .map(|(port, taint)| {
                    json!({
                        "port": factories.render_access_path(&port),
                        "taint": taint_to_json(taint, factories),
                    })
                })
                .collect(),
        )
    };

    for (key, tree) in [
        ("generations", model.generations()),
        ("parameter_sources", model.parameter_sources()),
        ("sinks", model.sinks()),
        ("effect_sources", model.call_effect_sources()),
        ("effect_sinks", model.call_effect_sinks()),
        ("propagation", model.propagations()),
    ] {
        if !tree.is_bottom() {
            object.insert(key.to_string(), tree_entries(tree));
        }
    }

    if let Some(getter) = model.inline_as_getter() {
        object.insert(
            "inline_as_getter".to_string(),
            json!(factories.render_access_path(getter)),
        );
    }
    if let Some(setter) = model.inline_as_setter() {
        object.insert(
            "inline_as_setter".to_string(),
            json!({
                "target": factories.render_access_path(&setter.target),
                "value": factories.render_access_path(&setter.value),
            }),
        );
    }

    let generators: Vec<&str> = model
        .model_generators()
        .map(|generator| factories.model_generators.resolve(&generator.inner()))
        .collect();
    if !generators.is_empty() {
        object.insert("model_generators".to_string(), json!(generators));
    }

    if !model.issues().is_empty() {
        object.insert(
            "issues".to_string(),
            Value::Array(
                model
                    .issues()
                    .iter()
                    .map(|issue| {
                        json!({
                            "rule": issue.rule.code,
                            "callee": issue.callee,
                            "sink_index": issue.sink_index,
                            "position": position_to_json(&issue.position, factories),
                            "sources": taint_to_json(&issue.sources, factories),
                            "sinks": taint_to_json(&issue.sinks, factories),
                        })
                    })
                    .collect(),
            ),
        );
    }

    Value::Object(object)
}

/// Decode a model from its JSON mapping. Invalid fragments are dropped.
pub fn model_from_json(
    value: &Value,
    info: &MethodInfo,
    factories: &Factories,
    heuristics: &Heuristics,
) -> Result<Model, ModelError> {
    let object = value
        .as_object()
        .ok_or_else(|| ModelError::InvalidTaintConfig("model must be an object".to_string()))?;

    let mut model = Model::new(info.id);

    for name in strings_at(object, "modes") {
        match Modes::from_name(&name) {
            Some(mode) => model.add_mode(mode),
            None => warn!(target: "sift::model", mode = %name, "Unknown mode"),
        }
    }
    for name in strings_at(object, "freeze") {
        match super::Frozen::from_name(&name) {
            Some(frozen) => model.freeze(frozen),
            None => warn!(target: "sift::model", freeze = %name, "Unknown freeze kind"),
        }
    }

    let add_generation = |model: &mut Model, port: &AccessPath, taint: Taint| {
        model.add_generation(port, taint, info, heuristics, factories)
    };
    let add_parameter_source = |model: &mut Model, port: &AccessPath, taint: Taint| {
        model.add_parameter_source(port, taint, info, heuristics, factories)
    };
    let add_sink = |model: &mut Model, port: &AccessPath, taint: Taint| {
        model.add_sink(port, taint, info, heuristics, factories)
    };
    let add_effect_source = |model: &mut Model, port: &AccessPath, taint: Taint| {
        model.add_call_effect_source(port, taint, heuristics, factories)
    };
    let add_effect_sink = |model: &mut Model, port: &AccessPath, taint: Taint| {
        model.add_call_effect_sink(port, taint, heuristics, factories)
    };
    let taint_handlers: [(&str, &dyn Fn(&mut Model, &AccessPath, Taint)); 5] = [
        ("generations", &add_generation),
        ("parameter_sources", &add_parameter_source),
        ("sinks", &add_sink),
        ("effect_sources", &add_effect_source),
        ("effect_sinks", &add_effect_sink),
    ];
    for (key, add) in taint_handlers {
        for entry in array_at(object, key) {
            match port_taint_from_json(entry, factories) {
                Ok((port, taint)) => add(&mut model, &port, taint),
                Err(error) => warn!(target: "sift::model", %error, "Dropping invalid {} entry", key),
            }
        }
    }

    for entry in array_at(object, "propagation") {
        match propagation_from_json(entry, factories) {
            Ok((port, taint)) => {
                model.add_propagation(&port, taint, info, heuristics, factories)
            }
            Err(error) => {
                warn!(target: "sift::model", %error, "Dropping invalid propagation entry")
            }
        }
    }

    for entry in array_at(object, "sanitizers") {
        match sanitizer_from_json(entry, factories) {
            Ok((root, sanitizer)) => match root {
                Some(root) => model.add_port_sanitizer(root, sanitizer),
                None => model.add_global_sanitizer(sanitizer),
            },
            Err(error) => warn!(target: "sift::model", %error, "Dropping invalid sanitizer"),
        }
    }

    let attach_sources =
        |model: &mut Model, root: Root, features: FeatureSet| model.add_attach_to_sources(root, features);
    let attach_sinks =
        |model: &mut Model, root: Root, features: FeatureSet| model.add_attach_to_sinks(root, features);
    let attach_propagations = |model: &mut Model, root: Root, features: FeatureSet| {
        model.add_attach_to_propagations(root, features)
    };
    let attach_arguments = |model: &mut Model, root: Root, features: FeatureSet| {
        model.add_add_features_to_arguments(root, features)
    };
    let attach_handlers: [(&str, &dyn Fn(&mut Model, Root, FeatureSet)); 4] = [
        ("attach_to_sources", &attach_sources),
        ("attach_to_sinks", &attach_sinks),
        ("attach_to_propagations", &attach_propagations),
        ("add_features_to_arguments", &attach_arguments),
    ];
    for (key, add) in attach_handlers {
        for entry in array_at(object, key) {
            match attach_from_json(entry, factories) {
                Ok((root, features)) => add(&mut model, root, features),
                Err(error) => warn!(target: "sift::model", %error, "Dropping invalid {} entry", key),
            }
        }
    }

    if let Some(value) = object.get("inline_as_getter").and_then(Value::as_str) {
        match factories.parse_access_path(value) {
            Ok(path) => model.set_inline_as_getter(path),
            Err(error) => warn!(target: "sift::model", %error, "Dropping invalid inline_as_getter"),
        }
    }
    if let Some(value) = object.get("inline_as_setter").and_then(Value::as_object) {
        let target = value.get("target").and_then(Value::as_str);
        let setter_value = value.get("value").and_then(Value::as_str);
        match (target, setter_value) {
            (Some(target), Some(setter_value)) => {
                match (
                    factories.parse_access_path(target),
                    factories.parse_access_path(setter_value),
                ) {
                    (Ok(target), Ok(value)) => {
                        model.set_inline_as_setter(InlineAsSetter { target, value })
                    }
                    _ => warn!(target: "sift::model", "Dropping invalid inline_as_setter paths"),
                }
            }
            _ => warn!(target: "sift::model", "inline_as_setter requires target and value"),
        }
    }

    for name in strings_at(object, "model_generators") {
        model.add_model_generator(factories.model_generator(&name));
    }

    Ok(model)
}

/// Serialize taint as an array of taint configurations.
pub fn taint_to_json(taint: &Taint, factories: &Factories) -> Value {
    Value::Array(
        taint
            .frames()
            .map(|frame| frame_to_json(frame, factories))
            .collect(),
    )
}

fn frame_to_json(frame: &Frame, factories: &Factories) -> Value {
    let mut object = Map::new();
    object.insert(
        "kind".to_string(),
        json!(factories.render_kind(frame.kind())),
    );
    object.insert(
        "callee_port".to_string(),
        json!(factories.render_access_path(frame.callee_port())),
    );
    if let Some(callee) = frame.callee() {
        object.insert("callee".to_string(), json!(factories.resolve_method(callee)));
    }
    if let Some(position) = frame.call_position() {
        object.insert(
            "call_position".to_string(),
            position_to_json(position, factories),
        );
    }
    if frame.distance() > 0 {
        object.insert("distance".to_string(), json!(frame.distance()));
    }
    if !frame.origins().is_empty() {
        object.insert(
            "origins".to_string(),
            origins_to_json(frame.origins(), factories),
        );
    }
    let features = |set: &FeatureSet| -> Value {
        Value::Array(
            set.iter()
                .map(|feature| json!(factories.features.resolve(feature)))
                .collect(),
        )
    };
    if !frame.inferred_features().is_empty() {
        object.insert(
            "may_features".to_string(),
            features(frame.inferred_features().may()),
        );
        object.insert(
            "always_features".to_string(),
            features(frame.inferred_features().always()),
        );
    }
    if !frame.user_features().is_empty() {
        object.insert("features".to_string(), features(frame.user_features()));
    }
    let canonical: Vec<Value> = frame
        .canonical_names()
        .map(|name| match name {
            CanonicalName::Template(template) => {
                json!({ "template": factories.resolve_literal(template) })
            }
            CanonicalName::Instantiated(instantiated) => {
                json!({ "instantiated": factories.resolve_literal(instantiated) })
            }
        })
        .collect();
    if !canonical.is_empty() {
        object.insert("canonical_names".to_string(), Value::Array(canonical));
    }
    Value::Object(object)
}

/// Decode one `{ port, taint }` entry.
fn port_taint_from_json(
    value: &Value,
    factories: &Factories,
) -> Result<(AccessPath, Taint), ModelError> {
    let object = value
        .as_object()
        .ok_or_else(|| ModelError::InvalidTaintConfig("entry must be an object".to_string()))?;
    let port = object
        .get("port")
        .and_then(Value::as_str)
        .ok_or_else(|| ModelError::InvalidTaintConfig("entry requires a port".to_string()))?;
    let port = factories.parse_access_path(port)?;
    let mut taint = Taint::bottom();
    for config in object
        .get("taint")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
    {
        taint.add(frame_from_json(config, factories)?);
    }
    Ok((port, taint))
}

/// Decode one taint configuration into a frame. The callee port defaults to
/// `Leaf`.
fn frame_from_json(value: &Value, factories: &Factories) -> Result<Frame, ModelError> {
    let object = value
        .as_object()
        .ok_or_else(|| ModelError::InvalidTaintConfig("taint must be an object".to_string()))?;
    let kind_name = object
        .get("kind")
        .and_then(Value::as_str)
        .ok_or_else(|| ModelError::InvalidTaintConfig("taint requires a kind".to_string()))?;

    let kind: Kind = match object.get("partial_label").and_then(Value::as_str) {
        Some(label) => factories.kinds.partial(kind_name, label),
        None => factories.kinds.named(kind_name),
    };

    let callee_port = match object.get("callee_port").and_then(Value::as_str) {
        Some(port) => factories.access_paths.get(factories.parse_access_path(port)?),
        None => factories.access_paths.leaf(),
    };

    let callee = object
        .get("callee")
        .and_then(Value::as_str)
        .map(|signature| factories.method(signature));
    let distance = object
        .get("distance")
        .and_then(Value::as_u64)
        .unwrap_or(0) as u32;

    let call_kind = if callee.is_some() || distance > 0 {
        CallKind::CallSite
    } else {
        CallKind::Declaration
    };

    let mut frame = Frame::with_call_kind(kind, callee_port, call_kind).with_distance(distance);
    if let Some(callee) = callee {
        frame = frame.with_callee(callee);
    }
    if let Some(position) = object.get("call_position") {
        frame = frame.with_call_position(position_from_json(position, factories)?);
    }
    if let Some(origins) = object.get("origins") {
        frame = frame.with_origins(origins_from_json(origins, factories)?);
    }

    let feature_set = |key: &str| -> FeatureSet {
        strings_at(object, key)
            .into_iter()
            .map(|name| factories.features.get(&name))
            .collect()
    };
    let may = feature_set("may_features");
    let always = feature_set("always_features");
    if !may.is_empty() || !always.is_empty() {
        frame = frame.with_inferred_features(FeatureMayAlwaysSet::from_sets(may, always));
    }
    let user = feature_set("features");
    if !user.is_empty() {
        frame = frame.with_user_features(user);
    }

    let ports = |key: &str| -> Result<Vec<crate::access_path::PortRef>, ModelError> {
        strings_at(object, key)
            .into_iter()
            .map(|port| Ok(factories.access_paths.get(factories.parse_access_path(&port)?)))
            .collect()
    };
    let via_type_of = ports("via_type_of")?;
    if !via_type_of.is_empty() {
        frame = frame.with_via_type_of_ports(via_type_of);
    }
    let via_value_of = ports("via_value_of")?;
    if !via_value_of.is_empty() {
        frame = frame.with_via_value_of_ports(via_value_of);
    }

    if let Some(names) = object.get("canonical_names").and_then(Value::as_array) {
        let mut canonical = Vec::new();
        for name in names {
            let name = name.as_object().ok_or_else(|| {
                ModelError::InvalidTaintConfig("canonical name must be an object".to_string())
            })?;
            if let Some(template) = name.get("template").and_then(Value::as_str) {
                canonical.push(CanonicalName::Template(factories.literal(template)));
            } else if let Some(instantiated) = name.get("instantiated").and_then(Value::as_str) {
                canonical.push(CanonicalName::Instantiated(factories.literal(instantiated)));
            } else {
                return Err(ModelError::InvalidTaintConfig(
                    "canonical name requires template or instantiated".to_string(),
                ));
            }
        }
        frame = frame.with_canonical_names(canonical);
    }

    Ok(frame)
}

/// Decode one propagation entry: `{ input, output, collapse_depth?,
/// output_paths?, may_features?, always_features? }`.
fn propagation_from_json(
    value: &Value,
    factories: &Factories,
) -> Result<(AccessPath, Taint), ModelError> {
    let object = value
        .as_object()
        .ok_or_else(|| ModelError::InvalidTaintConfig("propagation must be an object".to_string()))?;
    let input = object
        .get("input")
        .and_then(Value::as_str)
        .ok_or_else(|| ModelError::InvalidTaintConfig("propagation requires an input".to_string()))?;
    let input = factories.parse_access_path(input)?;

    let output = object
        .get("output")
        .and_then(Value::as_str)
        .ok_or_else(|| ModelError::InvalidTaintConfig("propagation requires an output".to_string()))?;
    let output = factories.parse_access_path(output)?;
    let kind = match output.root() {
        Root::Return => factories.kinds.local_return(),
        Root::Argument(index) => factories.kinds.local_argument(index),
        other => {
            return Err(ModelError::Inconsistent(format!(
                "propagation output must be Return or an Argument, got {}",
                other
            )))
        }
    };

    let collapse_depth = match object.get("collapse_depth") {
        None => CollapseDepth::zero(),
        Some(Value::Number(depth)) => CollapseDepth::Collapse(
            depth
                .as_u64()
                .ok_or_else(|| {
                    ModelError::InvalidTaintConfig("collapse_depth must be unsigned".to_string())
                })? as u32,
        ),
        Some(Value::String(text)) if text == "no-collapse" => CollapseDepth::NoCollapse,
        Some(_) => {
            return Err(ModelError::InvalidTaintConfig(
                "collapse_depth must be a number or \"no-collapse\"".to_string(),
            ))
        }
    };

    let mut output_paths: PathTree<CollapseDepth> = PathTree::bottom();
    output_paths.write_value(output.path(), collapse_depth, UpdateKind::Weak);

    let feature_set = |key: &str| -> FeatureSet {
        strings_at(object, key)
            .into_iter()
            .map(|name| factories.features.get(&name))
            .collect()
    };
    let features =
        FeatureMayAlwaysSet::from_sets(feature_set("may_features"), feature_set("always_features"));

    let leaf = factories.access_paths.leaf();
    let mut frame = Frame::with_call_kind(kind, leaf, CallKind::Propagation)
        .with_output_paths(output_paths);
    if !features.is_empty() {
        frame = frame.with_inferred_features(features);
    }
    let user = feature_set("features");
    if !user.is_empty() {
        frame = frame.with_user_features(user);
    }

    Ok((input, Taint::singleton(frame)))
}

fn sanitizer_from_json(
    value: &Value,
    factories: &Factories,
) -> Result<(Option<Root>, Sanitizer), ModelError> {
    let object = value
        .as_object()
        .ok_or_else(|| ModelError::InvalidTaintConfig("sanitizer must be an object".to_string()))?;
    let sanitize = match object.get("sanitize").and_then(Value::as_str) {
        Some("sources") => SanitizerKind::Sources,
        Some("sinks") => SanitizerKind::Sinks,
        Some("propagations") => SanitizerKind::Propagations,
        _ => {
            return Err(ModelError::InvalidTaintConfig(
                "sanitize must be sources, sinks, or propagations".to_string(),
            ))
        }
    };
    let kinds = match object.get("kinds").and_then(Value::as_array) {
        None => SanitizedKinds::All,
        Some(names) => SanitizedKinds::Specific(
            names
                .iter()
                .filter_map(Value::as_str)
                .map(|name| factories.kinds.named(name))
                .collect(),
        ),
    };
    let root = match object.get("port").and_then(Value::as_str) {
        None => None,
        Some(port) => Some(Root::parse(port)?),
    };
    Ok((root, Sanitizer::new(sanitize, kinds)))
}

fn attach_from_json(
    value: &Value,
    factories: &Factories,
) -> Result<(Root, FeatureSet), ModelError> {
    let object = value
        .as_object()
        .ok_or_else(|| ModelError::InvalidTaintConfig("attach entry must be an object".to_string()))?;
    let port = object
        .get("port")
        .and_then(Value::as_str)
        .ok_or_else(|| ModelError::InvalidTaintConfig("attach entry requires a port".to_string()))?;
    let root = Root::parse(port)?;
    let features = strings_at(object, "features")
        .into_iter()
        .map(|name| factories.features.get(&name))
        .collect();
    Ok((root, features))
}

fn position_to_json(position: &Position, factories: &Factories) -> Value {
    let mut object = Map::new();
    if let Some(file) = position.file {
        object.insert(
            "path".to_string(),
            json!(factories.files.resolve(&file.inner())),
        );
    }
    object.insert("line".to_string(), json!(position.line));
    if position.start != UNKNOWN_LINE {
        object.insert("start".to_string(), json!(position.start));
        object.insert("end".to_string(), json!(position.end));
    }
    Value::Object(object)
}

fn position_from_json(value: &Value, factories: &Factories) -> Result<Position, ModelError> {
    let object = value
        .as_object()
        .ok_or_else(|| ModelError::InvalidTaintConfig("position must be an object".to_string()))?;
    let file = object
        .get("path")
        .and_then(Value::as_str)
        .map(|path| factories.file(path));
    let line = object.get("line").and_then(Value::as_i64).unwrap_or(-1) as i32;
    let start = object.get("start").and_then(Value::as_i64).unwrap_or(-1) as i32;
    let end = object.get("end").and_then(Value::as_i64).unwrap_or(-1) as i32;
    Ok(factories.positions.get(PositionData {
        file,
        line,
        start,
        end,
    }))
}

fn origins_to_json(origins: &OriginSet, factories: &Factories) -> Value {
    Value::Array(
        origins
            .iter()
            .map(|origin| match &**origin {
                OriginData::Method { method, port } => json!({
                    "method": factories.resolve_method(method),
                    "port": factories.render_access_path(port),
                }),
                OriginData::Field { field } => json!({
                    "field": factories.fields.resolve(&field.inner()),
                }),
                OriginData::Crtex { canonical_name, port } => {
                    let name = match canonical_name {
                        CanonicalName::Template(name) | CanonicalName::Instantiated(name) => {
                            factories.resolve_literal(name)
                        }
                    };
                    json!({
                        "canonical_name": name,
                        "port": factories.render_access_path(port),
                    })
                }
                OriginData::Exploitability { callee, position } => json!({
                    "exploitability_callee": factories.resolve_method(callee),
                    "position": position_to_json(position, factories),
                }),
            })
            .collect(),
    )
}

fn origins_from_json(value: &Value, factories: &Factories) -> Result<OriginSet, ModelError> {
    let array = value
        .as_array()
        .ok_or_else(|| ModelError::InvalidTaintConfig("origins must be an array".to_string()))?;
    let mut origins = OriginSet::new();
    for entry in array {
        let object = entry.as_object().ok_or_else(|| {
            ModelError::InvalidTaintConfig("origin must be an object".to_string())
        })?;
        if let Some(method) = object.get("method").and_then(Value::as_str) {
            let port = match object.get("port").and_then(Value::as_str) {
                Some(port) => factories.access_paths.get(factories.parse_access_path(port)?),
                None => factories.access_paths.leaf(),
            };
            origins.add(factories.origins.method(factories.method(method), port));
        } else if let Some(field) = object.get("field").and_then(Value::as_str) {
            origins.add(factories.origins.field(factories.field(field)));
        } else {
            return Err(ModelError::InvalidTaintConfig(
                "origin requires a method or field".to_string(),
            ));
        }
    }
    Ok(origins)
}

fn array_at<'a>(object: &'a Map<String, Value>, key: &str) -> impl Iterator<Item = &'a Value> {
    object
        .get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

fn strings_at(object: &Map<String, Value>, key: &str) -> Vec<String> {
    object
        .get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect()
}
