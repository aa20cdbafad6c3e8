//! Abstract syntax tree for the supported XPath subset.

/// The top-level expression that can be evaluated.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(String),
    Number(f64),
    LocationPath(LocationPath),
    Variable(String),
    FunctionCall {
        name: String,
        args: Vec<Expression>,
    },
    BinaryOp {
        left: Box<Expression>,
        op: BinaryOperator,
        right: Box<Expression>,
    },
    Negate(Box<Expression>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Or,
    And,
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Plus,
    Minus,
    Div,
    Mod,
}

/// A location path such as `/doc/item`, `@id`, or `para[2]/text()`.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationPath {
    /// True if the path starts from the document root (`/foo`).
    pub is_absolute: bool,
    /// Optional leading expression for paths like `$var/foo`.
    pub start_point: Option<Box<Expression>>,
    pub steps: Vec<Step>,
}

/// A single step: axis, node test and zero or more predicates.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub axis: Axis,
    pub node_test: NodeTest,
    pub predicates: Vec<Expression>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Child,
    Attribute,
    Parent,
    SelfAxis,
    Descendant,
    DescendantOrSelf,
}

/// A test applied to nodes on an axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeTest {
    /// A (possibly prefixed) name test: `foo` or `svg:rect`.
    Name {
        prefix: Option<String>,
        local: String,
    },
    /// `*`
    Wildcard,
    /// `prefix:*`
    PrefixWildcard(String),
    /// `text()`, `comment()`, `processing-instruction()`, `node()`
    Kind(KindTest),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindTest {
    Text,
    Comment,
    ProcessingInstruction,
    Node,
}

impl NodeTest {
    pub fn name(local: &str) -> Self {
        NodeTest::Name {
            prefix: None,
            local: local.to_string(),
        }
    }
}
