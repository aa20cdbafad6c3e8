//! Facade over the workspace: XPath expression service plus the XSLT
//! compilation and dispatch core.

pub use salix_xpath as xpath;
pub use salix_xslt as xslt;

pub use salix_xslt::{
    CompiledStylesheet, FileLoader, InMemoryLoader, ResourceLoader, TransformOptions, XmlDocument,
    XsltCompiler, XsltError,
};
