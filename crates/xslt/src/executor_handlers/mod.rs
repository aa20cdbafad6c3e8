//! Per-instruction execution handlers, grouped by concern.

pub(crate) mod apply_templates;
pub(crate) mod call_template;
pub(crate) mod control_flow;
pub(crate) mod copy;
pub(crate) mod literals;
pub(crate) mod variables;

use salix_xpath::QName;

/// Serialized form of a qualified name for the output stream.
pub(crate) fn qualified_name(qname: QName<'_>) -> String {
    match qname.prefix {
        Some(prefix) => format!("{}:{}", prefix, qname.local_part),
        None => qname.local_part.to_string(),
    }
}
