//! The bundle of interning factories threaded through every analysis context.
//!
//! Built once by the driver and passed by reference; all factories are safe
//! for concurrent lookups and lock internally on creation.

use sift_core::errors::ModelError;
use sift_core::types::interning::SymbolInterner;
use sift_core::types::{FieldId, FileId, LiteralId, MethodId, ModelGeneratorId, TypeId};

use crate::access_path::{AccessPath, AccessPathFactory};
use crate::feature::FeatureFactory;
use crate::kind::{Kind, KindData, KindFactory};
use crate::origin::OriginFactory;
use crate::position::PositionFactory;
use crate::transforms::{Transform, TransformFactory};

/// All interning factories.
pub struct Factories {
    /// Method signatures (`LClass;.method:(args)ret`).
    pub methods: SymbolInterner,
    /// Field names.
    pub fields: SymbolInterner,
    /// Type names.
    pub types: SymbolInterner,
    /// String literals, literal path indices, and canonical names.
    pub literals: SymbolInterner,
    /// Source file paths.
    pub files: SymbolInterner,
    /// Model generator names.
    pub model_generators: SymbolInterner,
    pub features: FeatureFactory,
    pub kinds: KindFactory,
    pub positions: PositionFactory,
    pub access_paths: AccessPathFactory,
    pub origins: OriginFactory,
    pub transforms: TransformFactory,
}

impl Factories {
    pub fn new() -> Self {
        Self {
            methods: SymbolInterner::new(),
            fields: SymbolInterner::new(),
            types: SymbolInterner::new(),
            literals: SymbolInterner::new(),
            files: SymbolInterner::new(),
            model_generators: SymbolInterner::new(),
            features: FeatureFactory::new(),
            kinds: KindFactory::new(),
            positions: PositionFactory::new(),
            access_paths: AccessPathFactory::new(),
            origins: OriginFactory::new(),
            transforms: TransformFactory::new(),
        }
    }

    pub fn method(&self, signature: &str) -> MethodId {
        MethodId::new(self.methods.intern(signature))
    }

    pub fn field(&self, name: &str) -> FieldId {
        FieldId::new(self.fields.intern(name))
    }

    pub fn type_name(&self, name: &str) -> TypeId {
        TypeId::new(self.types.intern(name))
    }

    pub fn literal(&self, value: &str) -> LiteralId {
        LiteralId::new(self.literals.intern(value))
    }

    pub fn file(&self, path: &str) -> FileId {
        FileId::new(self.files.intern(path))
    }

    pub fn model_generator(&self, name: &str) -> ModelGeneratorId {
        ModelGeneratorId::new(self.model_generators.intern(name))
    }

    pub fn resolve_method(&self, method: &MethodId) -> &str {
        self.methods.resolve(&method.inner())
    }

    pub fn resolve_type(&self, type_id: &TypeId) -> &str {
        self.types.resolve(&type_id.inner())
    }

    pub fn resolve_literal(&self, literal: &LiteralId) -> &str {
        self.literals.resolve(&literal.inner())
    }

    /// The unqualified name of a method, for canonical-name instantiation.
    /// `LClass;.method:(args)ret` resolves to `method`.
    pub fn method_leaf_name<'a>(&'a self, method: &MethodId) -> &'a str {
        let signature = self.resolve_method(method);
        let after_holder = signature
            .rsplit_once(";.")
            .map(|(_, rest)| rest)
            .unwrap_or(signature);
        after_holder
            .split_once(':')
            .map(|(name, _)| name)
            .unwrap_or(after_holder)
    }

    /// Parse an access path, interning its field names and indices.
    pub fn parse_access_path(&self, value: &str) -> Result<AccessPath, ModelError> {
        AccessPath::parse(value, &self.fields, &self.literals)
    }

    /// Render an access path with resolved names.
    pub fn render_access_path(&self, access_path: &AccessPath) -> String {
        access_path.render(&self.fields, &self.literals)
    }

    /// Render a kind as a stable human-readable name.
    pub fn render_kind(&self, kind: &Kind) -> String {
        match &**kind {
            KindData::Named { name } => self.kinds.resolve_name(name).to_string(),
            KindData::Partial { name, label } => format!(
                "Partial:{}:{}",
                self.kinds.resolve_name(name),
                self.kinds.resolve_label(label)
            ),
            KindData::TriggeredPartial { partial, rule_code } => {
                format!("Triggered:{}:{}", self.render_kind(partial), rule_code)
            }
            KindData::Transform {
                base,
                local,
                global,
            } => {
                let mut parts = Vec::new();
                for list in [local, global] {
                    for transform in list.iter() {
                        parts.push(self.render_transform(transform));
                    }
                }
                format!("{}@{}", self.render_kind(base), parts.join(":"))
            }
            KindData::Propagation(output) => match output {
                crate::kind::PropagationOutput::Return => "LocalReturn".to_string(),
                crate::kind::PropagationOutput::Argument(index) => {
                    format!("LocalArgument({})", index)
                }
            },
            KindData::ArtificialSource => "ArtificialSource".to_string(),
        }
    }

    fn render_transform(&self, transform: &Transform) -> String {
        match transform {
            Transform::Named(name) => self.transforms.resolve_name(name).to_string(),
            Transform::SourceAsTransform(kind) => {
                format!("SourceAsTransform[{}]", self.render_kind(kind))
            }
        }
    }
}

impl Default for Factories {
    fn default() -> Self {
        Self::new()
    }
}
