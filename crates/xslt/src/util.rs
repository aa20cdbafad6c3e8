//! Shared helpers for attribute access, source locations, and attribute
//! value templates.

use crate::ast::{AttributeValueTemplate, AvtPart};
use crate::error::{Location, XsltError};
use quick_xml::events::BytesStart;
use salix_xpath::parse_expression;
use std::str::from_utf8;

/// Raw attributes of one element, as (name, value) byte pairs in document
/// order.
pub type OwnedAttributes = Vec<(Vec<u8>, Vec<u8>)>;

pub fn get_owned_attributes(e: &BytesStart) -> Result<OwnedAttributes, XsltError> {
    let mut out = Vec::new();
    for attr in e.attributes() {
        let attr = attr?;
        let value = attr.unescape_value()?;
        out.push((attr.key.as_ref().to_vec(), value.as_bytes().to_vec()));
    }
    Ok(out)
}

pub fn get_attr_optional(attrs: &OwnedAttributes, name: &[u8]) -> Result<Option<String>, XsltError> {
    for (key, value) in attrs {
        if key == name {
            return Ok(Some(from_utf8(value)?.to_string()));
        }
    }
    Ok(None)
}

pub fn get_attr_required(
    attrs: &OwnedAttributes,
    name: &[u8],
    element: &str,
    location: Location,
) -> Result<String, XsltError> {
    get_attr_optional(attrs, name)?.ok_or_else(|| {
        XsltError::structural(
            format!(
                "<{}> is missing the required attribute '{}'",
                element,
                String::from_utf8_lossy(name)
            ),
            location,
        )
    })
}

/// Maps a byte offset into 1-based line and column.
pub fn get_line_col_from_pos(source: &str, pos: usize) -> (usize, usize) {
    let clamped = pos.min(source.len());
    let mut line = 1;
    let mut col = 1;
    for c in source[..clamped].chars() {
        if c == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}

pub fn location_of(source: &str, pos: usize) -> Location {
    get_line_col_from_pos(source, pos).into()
}

/// Parses an attribute value template: literal text with `{expr}` segments,
/// where `{{` and `}}` escape literal braces.
pub fn parse_avt(text: &str) -> Result<AttributeValueTemplate, XsltError> {
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                literal.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                literal.push('}');
            }
            '{' => {
                if !literal.is_empty() {
                    parts.push(AvtPart::Literal(std::mem::take(&mut literal)));
                }
                let mut expr_text = String::new();
                let mut closed = false;
                for inner in chars.by_ref() {
                    if inner == '}' {
                        closed = true;
                        break;
                    }
                    expr_text.push(inner);
                }
                if !closed {
                    return Err(XsltError::Compilation(format!(
                        "unterminated '{{' in attribute value template '{}'",
                        text
                    )));
                }
                parts.push(AvtPart::Expr(parse_expression(&expr_text)?));
            }
            '}' => {
                return Err(XsltError::Compilation(format!(
                    "unmatched '}}' in attribute value template '{}'",
                    text
                )));
            }
            other => literal.push(other),
        }
    }
    if !literal.is_empty() {
        parts.push(AvtPart::Literal(literal));
    }
    Ok(AttributeValueTemplate { parts })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn avt_plain_literal() {
        let avt = parse_avt("plain text").unwrap();
        assert_eq!(avt.as_static(), Some("plain text"));
    }

    #[test]
    fn avt_mixed() {
        let avt = parse_avt("id-{@code}-x").unwrap();
        assert_eq!(avt.parts.len(), 3);
        assert!(avt.as_static().is_none());
    }

    #[test]
    fn avt_escaped_braces() {
        let avt = parse_avt("a{{b}}c").unwrap();
        assert_eq!(avt.as_static(), Some("a{b}c"));
    }

    #[test]
    fn avt_unterminated_is_an_error() {
        assert!(parse_avt("oops {@code").is_err());
        assert!(parse_avt("oops }").is_err());
    }

    #[test]
    fn line_col_mapping() {
        let source = "ab\ncde\nf";
        assert_eq!(get_line_col_from_pos(source, 0), (1, 1));
        assert_eq!(get_line_col_from_pos(source, 4), (2, 2));
        assert_eq!(get_line_col_from_pos(source, 7), (3, 1));
    }
}
