//! Source tree adapters implementing the data source contract.

pub mod xml;

pub use xml::{XmlDocument, XmlNode};
