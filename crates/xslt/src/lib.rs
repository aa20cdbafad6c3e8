//! XSLT 1.0 stylesheet compilation and template dispatch.
//!
//! Stylesheets are compiled once into an immutable [`CompiledStylesheet`]
//! (schema-checked parse, include/import resolution, rule-table
//! composition, optional template specialization) and then applied to any
//! number of source trees through the [`DataSourceNode`] contract.

pub mod ast;
pub mod compiler;
pub mod datasources;
pub mod error;
pub mod executor;
pub mod output;
pub mod parser;
pub mod pattern;
pub mod processor;
pub mod resolver;
pub mod rules;
pub mod schema;
pub mod specialize;
pub mod util;

mod compiler_handlers;
mod executor_handlers;

pub use datasources::{XmlDocument, XmlNode};
pub use error::{CollectingErrorListener, ErrorListener, FatalErrorListener, Location, XsltError};
pub use output::{EventSink, OutputEvent, RecordingSink, XmlWriter};
pub use pattern::Pattern;
pub use processor::{CompiledStylesheet, TransformOptions, XsltCompiler};
pub use resolver::{FileLoader, InMemoryLoader, ResourceLoader};
pub use salix_xpath::{DataSourceNode, NodeType, QName};
