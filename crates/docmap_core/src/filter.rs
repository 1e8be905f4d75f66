//! Filter trees.
//!
//! A [`Filter`] is either a leaf comparing one field path with a value or
//! a combinator over child filters. Values are normalized when the filter
//! is built: entities become their flattened key, enums their variant
//! name, containers a list of normalized elements.
//!
//! ```rust
//! use docmap_core::Filter;
//!
//! let filter = Filter::or(vec![
//!     Filter::eq("name", "ada").unwrap(),
//!     Filter::gt("age", 30).unwrap(),
//! ]);
//! assert_eq!(
//!     filter.to_string(),
//!     r#"{"$or":[{"name":{"$eq":"ada"}},{"age":{"$gt":30}}]}"#
//! );
//! ```

use std::fmt;
use std::sync::{Arc, OnceLock};

use docmap_codec::{Document, PresentedDocument, Value};

use crate::error::{CoreError, CoreResult};
use crate::field::FieldType;
use crate::key::Key;
use crate::schema::TypeDescriptor;

/// Comparison applied by a leaf filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOperator {
    /// Equal.
    Eq,
    /// Not equal.
    Ne,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal.
    Lte,
    /// Member of a set of values.
    In,
    /// Not a member of a set of values.
    Nin,
    /// Matches a regular expression.
    Regex,
}

impl FilterOperator {
    /// Wire operator.
    pub const fn code(self) -> &'static str {
        match self {
            Self::Eq => "$eq",
            Self::Ne => "$ne",
            Self::Gt => "$gt",
            Self::Gte => "$gte",
            Self::Lt => "$lt",
            Self::Lte => "$lte",
            Self::In => "$in",
            Self::Nin => "$nin",
            Self::Regex => "$regex",
        }
    }

    const fn takes_list(self) -> bool {
        matches!(self, Self::In | Self::Nin)
    }
}

/// Boolean combinator over child filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Combinator {
    /// Every child matches.
    And,
    /// At least one child matches.
    Or,
    /// No child matches.
    Nor,
}

impl Combinator {
    /// Wire operator.
    pub const fn code(self) -> &'static str {
        match self {
            Self::And => "$and",
            Self::Or => "$or",
            Self::Nor => "$nor",
        }
    }
}

/// A value usable on the right-hand side of a filter.
pub trait Operand {
    /// Normalized filter value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be encoded.
    fn operand_value(&self) -> CoreResult<Value>;
}

impl<T: FieldType> Operand for T {
    fn operand_value(&self) -> CoreResult<Value> {
        self.to_operand()
    }
}

impl Operand for &str {
    fn operand_value(&self) -> CoreResult<Value> {
        Ok(Value::Text((*self).to_string()))
    }
}

impl Operand for Key {
    fn operand_value(&self) -> CoreResult<Value> {
        Ok(Value::Document(self.filter_document().clone()))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Leaf {
        path: String,
        op: FilterOperator,
        value: Value,
        options: Option<String>,
    },
    Group {
        combinator: Combinator,
        children: Vec<Filter>,
    },
}

/// An immutable filter tree with a cached wire document.
#[derive(Debug, Clone)]
pub struct Filter {
    node: Node,
    cached: OnceLock<Document>,
}

impl Filter {
    fn from_node(node: Node) -> Self {
        Self {
            node,
            cached: OnceLock::new(),
        }
    }

    /// Leaf filter comparing `path` with a normalized operand.
    ///
    /// A single operand given to `In` or `Nin` is treated as a one-element
    /// list.
    ///
    /// # Errors
    ///
    /// Returns an error if the operand cannot be encoded.
    pub fn new(path: impl Into<String>, op: FilterOperator, operand: impl Operand) -> CoreResult<Self> {
        let mut value = operand.operand_value()?;
        if op.takes_list() && !matches!(value, Value::Array(_)) {
            value = Value::Array(vec![value]);
        }
        Ok(Self::leaf(path.into(), op, value))
    }

    fn leaf(path: String, op: FilterOperator, value: Value) -> Self {
        Self::from_node(Node::Leaf {
            path,
            op,
            value,
            options: None,
        })
    }

    /// Equality on an already normalized value.
    pub fn equal_value(path: impl Into<String>, value: Value) -> Self {
        Self::leaf(path.into(), FilterOperator::Eq, value)
    }

    /// `path == operand`.
    ///
    /// # Errors
    ///
    /// Returns an error if the operand cannot be encoded.
    pub fn eq(path: impl Into<String>, operand: impl Operand) -> CoreResult<Self> {
        Self::new(path, FilterOperator::Eq, operand)
    }

    /// `path != operand`.
    ///
    /// # Errors
    ///
    /// Returns an error if the operand cannot be encoded.
    pub fn ne(path: impl Into<String>, operand: impl Operand) -> CoreResult<Self> {
        Self::new(path, FilterOperator::Ne, operand)
    }

    /// `path > operand`.
    ///
    /// # Errors
    ///
    /// Returns an error if the operand cannot be encoded.
    pub fn gt(path: impl Into<String>, operand: impl Operand) -> CoreResult<Self> {
        Self::new(path, FilterOperator::Gt, operand)
    }

    /// `path >= operand`.
    ///
    /// # Errors
    ///
    /// Returns an error if the operand cannot be encoded.
    pub fn gte(path: impl Into<String>, operand: impl Operand) -> CoreResult<Self> {
        Self::new(path, FilterOperator::Gte, operand)
    }

    /// `path < operand`.
    ///
    /// # Errors
    ///
    /// Returns an error if the operand cannot be encoded.
    pub fn lt(path: impl Into<String>, operand: impl Operand) -> CoreResult<Self> {
        Self::new(path, FilterOperator::Lt, operand)
    }

    /// `path <= operand`.
    ///
    /// # Errors
    ///
    /// Returns an error if the operand cannot be encoded.
    pub fn lte(path: impl Into<String>, operand: impl Operand) -> CoreResult<Self> {
        Self::new(path, FilterOperator::Lte, operand)
    }

    /// `path` is one of `operands`.
    ///
    /// # Errors
    ///
    /// Returns an error if the operands cannot be encoded.
    pub fn is_in(path: impl Into<String>, operands: impl Operand) -> CoreResult<Self> {
        Self::new(path, FilterOperator::In, operands)
    }

    /// `path` is none of `operands`.
    ///
    /// # Errors
    ///
    /// Returns an error if the operands cannot be encoded.
    pub fn not_in(path: impl Into<String>, operands: impl Operand) -> CoreResult<Self> {
        Self::new(path, FilterOperator::Nin, operands)
    }

    /// `path` matches the regular expression `pattern`.
    pub fn regex(path: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::leaf(path.into(), FilterOperator::Regex, Value::Text(pattern.into()))
    }

    /// Combines `children` under `combinator`.
    pub fn group(combinator: Combinator, children: impl IntoIterator<Item = Filter>) -> Self {
        Self::from_node(Node::Group {
            combinator,
            children: children.into_iter().collect(),
        })
    }

    /// Every child matches.
    pub fn and(children: impl IntoIterator<Item = Filter>) -> Self {
        Self::group(Combinator::And, children)
    }

    /// At least one child matches.
    pub fn or(children: impl IntoIterator<Item = Filter>) -> Self {
        Self::group(Combinator::Or, children)
    }

    /// No child matches.
    pub fn nor(children: impl IntoIterator<Item = Filter>) -> Self {
        Self::group(Combinator::Nor, children)
    }

    /// Sets `$options` of a leaf, e.g. `"i"` for a case-insensitive regex.
    /// Combinators are returned unchanged.
    #[must_use]
    pub fn with_options(mut self, value: impl Into<String>) -> Self {
        if let Node::Leaf { options, .. } = &mut self.node {
            *options = Some(value.into());
            self.cached = OnceLock::new();
        }
        self
    }

    /// Field paths of every leaf, depth first.
    pub fn paths(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_paths(&mut out);
        out
    }

    fn collect_paths<'a>(&'a self, out: &mut Vec<&'a str>) {
        match &self.node {
            Node::Leaf { path, .. } => out.push(path),
            Node::Group { children, .. } => {
                for child in children {
                    child.collect_paths(out);
                }
            }
        }
    }

    /// Checks every leaf path against `root`, see [`validate_path`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidFieldPath`] for the first invalid path.
    pub fn validate(&self, root: &TypeDescriptor) -> CoreResult<()> {
        self.paths()
            .into_iter()
            .try_for_each(|path| validate_path(path, root))
    }

    /// Wire document, built once.
    pub fn to_document(&self) -> &Document {
        self.cached.get_or_init(|| self.build_document())
    }

    fn build_document(&self) -> Document {
        let mut doc = Document::new();
        match &self.node {
            Node::Leaf {
                path,
                op,
                value,
                options,
            } => {
                let mut comparison = Document::new();
                comparison.insert(op.code(), value.clone());
                if let Some(options) = options {
                    comparison.insert("$options", options.as_str());
                }
                doc.insert(path.as_str(), comparison);
            }
            Node::Group {
                combinator,
                children,
            } => {
                let clauses = children
                    .iter()
                    .map(|child| Value::Document(child.to_document().clone()))
                    .collect::<Vec<_>>();
                doc.insert(combinator.code(), Value::Array(clauses));
            }
        }
        doc
    }
}

impl PartialEq for Filter {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json =
            serde_json::to_string(&PresentedDocument(self.to_document())).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

/// Checks that a dotted field path addresses data stored in documents of
/// `root`.
///
/// Each segment must name a declared field of the current type. A
/// segment reached through a field that is not full-save only sees the
/// nested entity's key, so it must be an identity field. Containers are
/// entered through their element or value type.
///
/// # Errors
///
/// Returns [`CoreError::InvalidFieldPath`] naming the rejected segment.
pub fn validate_path(path: &str, root: &TypeDescriptor) -> CoreResult<()> {
    let invalid = |reason: String| CoreError::InvalidFieldPath {
        path: path.to_string(),
        kind: root.kind().to_string(),
        reason,
    };

    let mut nested: Option<Arc<TypeDescriptor>> = None;
    let mut full_saved = true;
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
        let current = nested.as_deref().unwrap_or(root);
        let field = current
            .field(segment)
            .ok_or_else(|| invalid(format!("'{}' has no field '{segment}'", current.kind())))?;
        if !full_saved && !field.is_identity() {
            return Err(invalid(format!(
                "'{segment}' is not stored because '{}' is not fully saved",
                current.kind()
            )));
        }
        if segments.peek().is_none() {
            break;
        }
        let entity = field
            .shape()
            .entity()
            .ok_or_else(|| invalid(format!("'{segment}' holds no entity")))?;
        let next = entity.descriptor()?;
        full_saved = field.is_full_save();
        nested = Some(next);
    }
    Ok(())
}
