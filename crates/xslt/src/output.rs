//! The output boundary: transformation results are pushed as a stream of
//! element/attribute/text events into an [`EventSink`].
//!
//! The sink is append-only; a failed transformation leaves whatever was
//! already pushed, and callers must discard it.

use crate::ast::{OutputMethod, OutputOptions};
use crate::error::XsltError;
use quick_xml::escape::escape;

pub trait EventSink {
    fn start_element(&mut self, qname: &str) -> Result<(), XsltError>;
    fn attribute(&mut self, name: &str, value: &str) -> Result<(), XsltError>;
    fn text(&mut self, text: &str) -> Result<(), XsltError>;
    fn comment(&mut self, text: &str) -> Result<(), XsltError>;
    fn processing_instruction(&mut self, target: &str, data: &str) -> Result<(), XsltError>;
    fn end_element(&mut self, qname: &str) -> Result<(), XsltError>;
}

/// One recorded output event, used by tests and by deep-copy buffering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    StartElement(String),
    Attribute(String, String),
    Text(String),
    Comment(String),
    ProcessingInstruction(String, String),
    EndElement(String),
}

/// Records the event stream verbatim.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<OutputEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replays the recorded events into another sink.
    pub fn replay(&self, sink: &mut dyn EventSink) -> Result<(), XsltError> {
        for event in &self.events {
            match event {
                OutputEvent::StartElement(name) => sink.start_element(name)?,
                OutputEvent::Attribute(name, value) => sink.attribute(name, value)?,
                OutputEvent::Text(text) => sink.text(text)?,
                OutputEvent::Comment(text) => sink.comment(text)?,
                OutputEvent::ProcessingInstruction(target, data) => {
                    sink.processing_instruction(target, data)?
                }
                OutputEvent::EndElement(name) => sink.end_element(name)?,
            }
        }
        Ok(())
    }
}

impl EventSink for RecordingSink {
    fn start_element(&mut self, qname: &str) -> Result<(), XsltError> {
        self.events.push(OutputEvent::StartElement(qname.to_string()));
        Ok(())
    }

    fn attribute(&mut self, name: &str, value: &str) -> Result<(), XsltError> {
        self.events
            .push(OutputEvent::Attribute(name.to_string(), value.to_string()));
        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<(), XsltError> {
        self.events.push(OutputEvent::Text(text.to_string()));
        Ok(())
    }

    fn comment(&mut self, text: &str) -> Result<(), XsltError> {
        self.events.push(OutputEvent::Comment(text.to_string()));
        Ok(())
    }

    fn processing_instruction(&mut self, target: &str, data: &str) -> Result<(), XsltError> {
        self.events.push(OutputEvent::ProcessingInstruction(
            target.to_string(),
            data.to_string(),
        ));
        Ok(())
    }

    fn end_element(&mut self, qname: &str) -> Result<(), XsltError> {
        self.events.push(OutputEvent::EndElement(qname.to_string()));
        Ok(())
    }
}

/// Serializes the event stream to a string, honoring the stylesheet's
/// output options.
#[derive(Debug)]
pub struct XmlWriter {
    out: String,
    options: OutputOptions,
    /// An open start tag whose attributes may still arrive.
    pending: Option<String>,
    depth: usize,
    wrote_declaration: bool,
}

impl XmlWriter {
    pub fn new(options: OutputOptions) -> Self {
        XmlWriter {
            out: String::new(),
            options,
            pending: None,
            depth: 0,
            wrote_declaration: false,
        }
    }

    pub fn finish(mut self) -> String {
        self.close_pending(false);
        self.out
    }

    fn maybe_declaration(&mut self) {
        if self.wrote_declaration {
            return;
        }
        self.wrote_declaration = true;
        if self.options.method == OutputMethod::Xml && !self.options.omit_xml_declaration {
            self.out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>");
            if self.options.indent {
                self.out.push('\n');
            }
        }
    }

    fn close_pending(&mut self, self_close: bool) {
        if self.pending.take().is_some() {
            if self_close {
                self.out.push_str("/>");
                self.depth -= 1;
            } else {
                self.out.push('>');
            }
        }
    }

    fn newline_indent(&mut self) {
        if self.options.indent && !self.out.is_empty() {
            self.out.push('\n');
            for _ in 0..self.depth {
                self.out.push_str("  ");
            }
        }
    }
}

impl EventSink for XmlWriter {
    fn start_element(&mut self, qname: &str) -> Result<(), XsltError> {
        if self.options.method == OutputMethod::Text {
            return Ok(());
        }
        self.maybe_declaration();
        self.close_pending(false);
        self.newline_indent();
        self.out.push('<');
        self.out.push_str(qname);
        self.pending = Some(qname.to_string());
        self.depth += 1;
        Ok(())
    }

    fn attribute(&mut self, name: &str, value: &str) -> Result<(), XsltError> {
        if self.options.method == OutputMethod::Text {
            return Ok(());
        }
        if self.pending.is_none() {
            log::warn!(
                "dropping attribute '{}': no open start tag to attach it to",
                name
            );
            return Ok(());
        }
        self.out.push(' ');
        self.out.push_str(name);
        self.out.push_str("=\"");
        self.out.push_str(&escape(value));
        self.out.push('"');
        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<(), XsltError> {
        if self.options.method == OutputMethod::Text {
            self.out.push_str(text);
            return Ok(());
        }
        self.maybe_declaration();
        self.close_pending(false);
        self.out.push_str(&escape(text));
        Ok(())
    }

    fn comment(&mut self, text: &str) -> Result<(), XsltError> {
        if self.options.method == OutputMethod::Text {
            return Ok(());
        }
        self.maybe_declaration();
        self.close_pending(false);
        self.out.push_str("<!--");
        self.out.push_str(text);
        self.out.push_str("-->");
        Ok(())
    }

    fn processing_instruction(&mut self, target: &str, data: &str) -> Result<(), XsltError> {
        if self.options.method == OutputMethod::Text {
            return Ok(());
        }
        self.maybe_declaration();
        self.close_pending(false);
        self.out.push_str("<?");
        self.out.push_str(target);
        if !data.is_empty() {
            self.out.push(' ');
            self.out.push_str(data);
        }
        self.out.push_str("?>");
        Ok(())
    }

    fn end_element(&mut self, qname: &str) -> Result<(), XsltError> {
        if self.options.method == OutputMethod::Text {
            return Ok(());
        }
        if self.pending.is_some() {
            self.close_pending(true);
            return Ok(());
        }
        // An unbalanced end event must not underflow the indent depth.
        self.depth = self.depth.saturating_sub(1);
        self.out.push_str("</");
        self.out.push_str(qname);
        self.out.push('>');
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn writer() -> XmlWriter {
        XmlWriter::new(OutputOptions {
            omit_xml_declaration: true,
            ..OutputOptions::default()
        })
    }

    #[test]
    fn serializes_elements_and_attributes() {
        let mut w = writer();
        w.start_element("doc").unwrap();
        w.attribute("lang", "en").unwrap();
        w.start_element("p").unwrap();
        w.text("hi & bye").unwrap();
        w.end_element("p").unwrap();
        w.end_element("doc").unwrap();
        assert_eq!(w.finish(), "<doc lang=\"en\"><p>hi &amp; bye</p></doc>");
    }

    #[test]
    fn empty_elements_self_close() {
        let mut w = writer();
        w.start_element("br").unwrap();
        w.end_element("br").unwrap();
        assert_eq!(w.finish(), "<br/>");
    }

    #[test]
    fn attribute_values_are_escaped() {
        let mut w = writer();
        w.start_element("a").unwrap();
        w.attribute("title", "\"5 < 6\"").unwrap();
        w.end_element("a").unwrap();
        assert_eq!(w.finish(), "<a title=\"&quot;5 &lt; 6&quot;\"/>");
    }

    #[test]
    fn late_attributes_are_dropped() {
        let mut w = writer();
        w.start_element("a").unwrap();
        w.text("x").unwrap();
        w.attribute("late", "1").unwrap();
        w.end_element("a").unwrap();
        assert_eq!(w.finish(), "<a>x</a>");
    }

    #[test]
    fn processing_instructions_serialize_with_target_and_data() {
        let mut w = writer();
        w.start_element("doc").unwrap();
        w.processing_instruction("target", "a=\"1\"").unwrap();
        w.processing_instruction("bare", "").unwrap();
        w.end_element("doc").unwrap();
        assert_eq!(w.finish(), "<doc><?target a=\"1\"?><?bare?></doc>");
    }

    #[test]
    fn unbalanced_end_element_does_not_panic() {
        let mut w = writer();
        w.start_element("a").unwrap();
        w.text("x").unwrap();
        w.end_element("a").unwrap();
        w.end_element("a").unwrap();
        assert_eq!(w.finish(), "<a>x</a></a>");
    }

    #[test]
    fn text_method_strips_markup() {
        let mut w = XmlWriter::new(OutputOptions {
            method: OutputMethod::Text,
            ..OutputOptions::default()
        });
        w.start_element("a").unwrap();
        w.text("plain").unwrap();
        w.end_element("a").unwrap();
        assert_eq!(w.finish(), "plain");
    }

    #[test]
    fn recording_sink_replays_in_order() {
        let mut rec = RecordingSink::new();
        rec.start_element("x").unwrap();
        rec.text("t").unwrap();
        rec.end_element("x").unwrap();

        let mut w = writer();
        rec.replay(&mut w).unwrap();
        assert_eq!(w.finish(), "<x>t</x>");
    }
}
