//! A compact XPath 1.0 subset: expression parsing and evaluation against a
//! generic, read-only data source tree.
//!
//! The XSLT core consumes this crate as an opaque "compile string, evaluate
//! against context" service and is written exclusively against its public
//! surface.

pub mod ast;
pub mod datasource;
pub mod engine;
pub mod error;
pub mod parser;

pub use ast::{Axis, BinaryOperator, Expression, LocationPath, NodeTest, Step};
pub use datasource::{DataSourceNode, NodeType, QName};
pub use engine::{EvaluationContext, XPathValue, evaluate};
pub use error::XPathError;
pub use parser::parse_expression;

// Re-export the mock tree so downstream crates can test against it.
pub use datasource::tests;
