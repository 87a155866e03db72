//! Access paths: a root plus a sequence of field/index path elements.
//!
//! Serialized form: `<Root>(.field | [index] | [*] | [<Argument(i)>])*` with
//! roots `Return`, `Argument(i)`, `Leaf`, `Anchor`, `Producer`, `call-chain`,
//! `call-effect-intent`, `call-effect-exploitability`.

use sift_core::errors::ModelError;
use sift_core::types::collections::SmallVec4;
use sift_core::types::interning::{Interned, Interner, SymbolInterner};
use sift_core::types::{FieldId, LiteralId};

/// The root of an access path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Root {
    /// The return value of a method.
    Return,
    /// A parameter. Argument 0 is the receiver for instance methods.
    Argument(u8),
    /// A leaf port with no position information.
    Leaf,
    /// A cross-repository anchor port.
    Anchor,
    /// A cross-repository producer port.
    Producer,
    /// Call-effect: the chain of calls reaching this method.
    CallChain,
    /// Call-effect: an intent-carrying call boundary.
    CallEffectIntent,
    /// Call-effect: exploitability flows at the call boundary.
    CallEffectExploitability,
}

impl Root {
    /// Whether this root is an argument.
    pub fn is_argument(&self) -> bool {
        matches!(self, Root::Argument(_))
    }

    /// The argument index, if this root is an argument.
    pub fn argument_index(&self) -> Option<u8> {
        match self {
            Root::Argument(index) => Some(*index),
            _ => None,
        }
    }

    /// Whether this root is a call-effect port.
    pub fn is_call_effect(&self) -> bool {
        matches!(
            self,
            Root::CallChain | Root::CallEffectIntent | Root::CallEffectExploitability
        )
    }

    /// Parse a root from its serialized form.
    pub fn parse(value: &str) -> Result<Root, ModelError> {
        match value {
            "Return" => Ok(Root::Return),
            "Leaf" => Ok(Root::Leaf),
            "Anchor" => Ok(Root::Anchor),
            "Producer" => Ok(Root::Producer),
            "call-chain" => Ok(Root::CallChain),
            "call-effect-intent" => Ok(Root::CallEffectIntent),
            "call-effect-exploitability" => Ok(Root::CallEffectExploitability),
            _ => {
                if let Some(rest) = value
                    .strip_prefix("Argument(")
                    .and_then(|rest| rest.strip_suffix(')'))
                {
                    let index: u8 = rest.parse().map_err(|_| ModelError::InvalidAccessPath {
                        value: value.to_string(),
                        reason: "argument index is not an integer".to_string(),
                    })?;
                    Ok(Root::Argument(index))
                } else {
                    Err(ModelError::InvalidAccessPath {
                        value: value.to_string(),
                        reason: "unknown root".to_string(),
                    })
                }
            }
        }
    }
}

impl std::fmt::Display for Root {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Root::Return => write!(f, "Return"),
            Root::Argument(index) => write!(f, "Argument({})", index),
            Root::Leaf => write!(f, "Leaf"),
            Root::Anchor => write!(f, "Anchor"),
            Root::Producer => write!(f, "Producer"),
            Root::CallChain => write!(f, "call-chain"),
            Root::CallEffectIntent => write!(f, "call-effect-intent"),
            Root::CallEffectExploitability => write!(f, "call-effect-exploitability"),
        }
    }
}

/// One step of an access path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PathElement {
    /// A named field access.
    Field(FieldId),
    /// A literal index access.
    Index(LiteralId),
    /// The any-index wildcard `[*]`, background for all literal indices.
    AnyIndex,
    /// An indirect index `[<Argument(i)>]`, resolved against a constant
    /// argument at the call site.
    IndexFromValueOf(u8),
}

impl PathElement {
    /// Whether this element addresses an index (`[...]` or `[*]`).
    pub fn is_index(&self) -> bool {
        matches!(
            self,
            PathElement::Index(_) | PathElement::AnyIndex | PathElement::IndexFromValueOf(_)
        )
    }

    /// Render with resolved names.
    pub fn render(&self, fields: &SymbolInterner, literals: &SymbolInterner) -> String {
        match self {
            PathElement::Field(field) => format!(".{}", fields.resolve(&field.inner())),
            PathElement::Index(literal) => format!("[{}]", literals.resolve(&literal.inner())),
            PathElement::AnyIndex => "[*]".to_string(),
            PathElement::IndexFromValueOf(index) => format!("[<Argument({})>]", index),
        }
    }
}

/// A sequence of path elements.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Path {
    elements: SmallVec4<PathElement>,
}

impl Path {
    /// The empty path.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a path from elements.
    pub fn from_elements(elements: impl IntoIterator<Item = PathElement>) -> Self {
        Self {
            elements: elements.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathElement> {
        self.elements.iter()
    }

    pub fn push(&mut self, element: PathElement) {
        self.elements.push(element);
    }

    /// Append all of `other`.
    pub fn extend(&mut self, other: &Path) {
        self.elements.extend(other.elements.iter().copied());
    }

    /// Whether `self` is a (non-strict) prefix of `other`.
    pub fn is_prefix_of(&self, other: &Path) -> bool {
        self.len() <= other.len()
            && self
                .elements
                .iter()
                .zip(other.elements.iter())
                .all(|(left, right)| left == right)
    }

    /// The longest common prefix of `self` and `other`.
    pub fn common_prefix(&self, other: &Path) -> Path {
        Path {
            elements: self
                .elements
                .iter()
                .zip(other.elements.iter())
                .take_while(|(left, right)| left == right)
                .map(|(left, _)| *left)
                .collect(),
        }
    }

    /// The path truncated to at most `max` elements.
    pub fn truncated(&self, max: usize) -> Path {
        Path {
            elements: self.elements.iter().take(max).copied().collect(),
        }
    }

    /// Resolve `[<Argument(i)>]` elements against constant arguments at a
    /// call site. Unresolvable indirections widen to `[*]`.
    pub fn resolve_indices(&self, constant_argument: impl Fn(u8) -> Option<LiteralId>) -> Path {
        Path {
            elements: self
                .elements
                .iter()
                .map(|element| match element {
                    PathElement::IndexFromValueOf(index) => match constant_argument(*index) {
                        Some(literal) => PathElement::Index(literal),
                        None => PathElement::AnyIndex,
                    },
                    other => *other,
                })
                .collect(),
        }
    }

    /// Render with resolved names.
    pub fn render(&self, fields: &SymbolInterner, literals: &SymbolInterner) -> String {
        self.elements
            .iter()
            .map(|element| element.render(fields, literals))
            .collect()
    }
}

impl FromIterator<PathElement> for Path {
    fn from_iter<I: IntoIterator<Item = PathElement>>(iter: I) -> Self {
        Self::from_elements(iter)
    }
}

/// A root plus a path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AccessPath {
    root: Root,
    path: Path,
}

impl AccessPath {
    pub fn new(root: Root, path: Path) -> Self {
        Self { root, path }
    }

    /// An access path with an empty path.
    pub fn from_root(root: Root) -> Self {
        Self {
            root,
            path: Path::new(),
        }
    }

    pub fn root(&self) -> Root {
        self.root
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether `self` is a (non-strict) prefix of `other`.
    pub fn is_prefix_of(&self, other: &AccessPath) -> bool {
        self.root == other.root && self.path.is_prefix_of(&other.path)
    }

    /// The access path with the path truncated to `max` elements.
    pub fn truncated(&self, max: usize) -> AccessPath {
        AccessPath {
            root: self.root,
            path: self.path.truncated(max),
        }
    }

    /// Parse from the serialized form, interning field names and indices.
    pub fn parse(
        value: &str,
        fields: &SymbolInterner,
        literals: &SymbolInterner,
    ) -> Result<AccessPath, ModelError> {
        let invalid = |reason: &str| ModelError::InvalidAccessPath {
            value: value.to_string(),
            reason: reason.to_string(),
        };

        let root_end = value
            .find(['.', '['])
            .unwrap_or(value.len());
        let root = Root::parse(&value[..root_end])?;

        let mut path = Path::new();
        let mut rest = &value[root_end..];
        while !rest.is_empty() {
            if let Some(after) = rest.strip_prefix('.') {
                let end = after.find(['.', '[']).unwrap_or(after.len());
                if end == 0 {
                    return Err(invalid("empty field name"));
                }
                path.push(PathElement::Field(FieldId::new(fields.intern(&after[..end]))));
                rest = &after[end..];
            } else if let Some(after) = rest.strip_prefix('[') {
                let end = after.find(']').ok_or_else(|| invalid("unterminated index"))?;
                let index = &after[..end];
                if index == "*" {
                    path.push(PathElement::AnyIndex);
                } else if let Some(argument) = index
                    .strip_prefix("<Argument(")
                    .and_then(|inner| inner.strip_suffix(")>"))
                {
                    let position: u8 = argument
                        .parse()
                        .map_err(|_| invalid("indirect index is not an integer"))?;
                    path.push(PathElement::IndexFromValueOf(position));
                } else {
                    path.push(PathElement::Index(LiteralId::new(literals.intern(index))));
                }
                rest = &after[end + 1..];
            } else {
                return Err(invalid("expected `.` or `[`"));
            }
        }

        Ok(AccessPath { root, path })
    }

    /// Render with resolved names.
    pub fn render(&self, fields: &SymbolInterner, literals: &SymbolInterner) -> String {
        format!("{}{}", self.root, self.path.render(fields, literals))
    }
}

/// A hash-consed access path, used as a callee port token inside frames.
pub type PortRef = Interned<AccessPath>;

/// Hash-consing factory for access paths.
pub struct AccessPathFactory {
    inner: Interner<AccessPath>,
    leaf: PortRef,
    return_port: PortRef,
}

impl AccessPathFactory {
    pub fn new() -> Self {
        let inner = Interner::new();
        let leaf = inner.intern(AccessPath::from_root(Root::Leaf));
        let return_port = inner.intern(AccessPath::from_root(Root::Return));
        Self {
            inner,
            leaf,
            return_port,
        }
    }

    /// Canonicalize an access path.
    pub fn get(&self, access_path: AccessPath) -> PortRef {
        self.inner.intern(access_path)
    }

    /// The canonical `Leaf` port.
    pub fn leaf(&self) -> PortRef {
        self.leaf.clone()
    }

    /// The canonical `Return` port.
    pub fn return_port(&self) -> PortRef {
        self.return_port.clone()
    }

    /// The canonical `Argument(i)` port.
    pub fn argument(&self, index: u8) -> PortRef {
        self.inner.intern(AccessPath::from_root(Root::Argument(index)))
    }
}

impl Default for AccessPathFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roundtrip() {
        let fields = SymbolInterner::new();
        let literals = SymbolInterner::new();
        for text in [
            "Return",
            "Argument(2)",
            "Argument(0).field",
            "Argument(1).data[0][*].x",
            "Argument(1)[<Argument(2)>]",
            "call-effect-exploitability",
        ] {
            let parsed = AccessPath::parse(text, &fields, &literals).unwrap();
            assert_eq!(parsed.render(&fields, &literals), text);
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let fields = SymbolInterner::new();
        let literals = SymbolInterner::new();
        assert!(AccessPath::parse("Result", &fields, &literals).is_err());
        assert!(AccessPath::parse("Argument(x)", &fields, &literals).is_err());
        assert!(AccessPath::parse("Return[0", &fields, &literals).is_err());
        assert!(AccessPath::parse("Return..x", &fields, &literals).is_err());
    }

    #[test]
    fn test_prefix_and_truncate() {
        let fields = SymbolInterner::new();
        let literals = SymbolInterner::new();
        let short = AccessPath::parse("Argument(0).x", &fields, &literals).unwrap();
        let long = AccessPath::parse("Argument(0).x.y", &fields, &literals).unwrap();
        assert!(short.is_prefix_of(&long));
        assert!(!long.is_prefix_of(&short));
        assert_eq!(long.truncated(1), short);
    }

    #[test]
    fn test_resolve_indices() {
        let fields = SymbolInterner::new();
        let literals = SymbolInterner::new();
        let path = AccessPath::parse("Argument(1)[<Argument(2)>]", &fields, &literals).unwrap();
        let key = LiteralId::new(literals.intern("key"));

        let resolved = path.path().resolve_indices(|index| (index == 2).then_some(key));
        assert_eq!(resolved, Path::from_elements([PathElement::Index(key)]));

        let widened = path.path().resolve_indices(|_| None);
        assert_eq!(widened, Path::from_elements([PathElement::AnyIndex]));
    }
}
