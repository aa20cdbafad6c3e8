//! Error taxonomy for stylesheet compilation and transformation.

use salix_xpath::XPathError;
use std::fmt;
use thiserror::Error;

/// A line/column position in a stylesheet source, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

impl From<(usize, usize)> for Location {
    fn from((line, column): (usize, usize)) -> Self {
        Location { line, column }
    }
}

#[derive(Error, Debug)]
pub enum XsltError {
    /// Illegal element nesting, a missing required attribute, or an element
    /// the grammar does not allow. Fatal to the parse.
    #[error("Structural error at {location}: {message}")]
    Structural { message: String, location: Location },

    /// An attribute is present but its text cannot be converted to the
    /// declared type.
    #[error("Invalid value for attribute '{attribute}' on <{element}> at {location}: {message}")]
    AttributeValue {
        attribute: String,
        element: String,
        message: String,
        location: Location,
    },

    /// An include/import target could not be fetched.
    #[error("Cannot load resource '{uri}': {message}")]
    Resource { uri: String, message: String },

    /// A stylesheet imports itself, directly or transitively.
    #[error("Import cycle detected at '{0}'")]
    ImportCycle(String),

    /// Template call depth exceeded the configured guard. Fatal to the
    /// transformation in progress; the compiled stylesheet stays usable.
    #[error("Template recursion exceeded the limit of {0} calls")]
    RecursionLimit(usize),

    #[error("No template named '{0}'")]
    UnknownTemplate(String),

    #[error("Compilation error: {0}")]
    Compilation(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("XPath error: {0}")]
    XPath(#[from] XPathError),

    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("XML attribute error: {0}")]
    XmlAttr(#[from] quick_xml::events::attributes::AttrError),

    #[error("Invalid UTF-8 in stylesheet: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("Source document error: {0}")]
    SourceDocument(#[from] roxmltree::Error),
}

impl XsltError {
    pub fn structural(message: impl Into<String>, location: Location) -> Self {
        XsltError::Structural {
            message: message.into(),
            location,
        }
    }

    pub fn attribute_value(
        attribute: impl Into<String>,
        element: impl Into<String>,
        message: impl Into<String>,
        location: Location,
    ) -> Self {
        XsltError::AttributeValue {
            attribute: attribute.into(),
            element: element.into(),
            message: message.into(),
            location,
        }
    }
}

/// Receives diagnostics during compilation and transformation.
///
/// Errors are offered to the listener before they propagate; the listener
/// may swallow recoverable ones by returning `Ok(())`. Warnings never
/// interrupt processing.
pub trait ErrorListener {
    fn warning(&mut self, message: &str);

    /// Called with a recoverable error. Returning `Err` escalates it.
    fn recoverable(&mut self, error: XsltError) -> Result<(), XsltError> {
        Err(error)
    }
}

/// The default listener: logs warnings, escalates every error.
#[derive(Debug, Default)]
pub struct FatalErrorListener;

impl ErrorListener for FatalErrorListener {
    fn warning(&mut self, message: &str) {
        log::warn!("{}", message);
    }
}

/// A listener that records everything and swallows recoverable errors,
/// useful for lint-style runs over untrusted stylesheets.
#[derive(Debug, Default)]
pub struct CollectingErrorListener {
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl ErrorListener for CollectingErrorListener {
    fn warning(&mut self, message: &str) {
        log::warn!("{}", message);
        self.warnings.push(message.to_string());
    }

    fn recoverable(&mut self, error: XsltError) -> Result<(), XsltError> {
        self.errors.push(error.to_string());
        Ok(())
    }
}
