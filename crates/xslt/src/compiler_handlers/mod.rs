pub(super) mod control_flow;
pub(super) mod stylesheet;
pub(super) mod template;
pub(super) mod variables;

use crate::ast::{AttributeValueTemplate, Instruction};
use crate::compiler::{BuilderState, CompilerBuilder};
use crate::error::{Location, XsltError};
use crate::util::{OwnedAttributes, get_attr_required, parse_avt};
use salix_xpath::parse_expression;
use std::str::from_utf8;

// Handlers for literal result elements and the simple output-producing
// instructions. Implemented as methods on CompilerBuilder, like the rest of
// the compiler_handlers modules.

impl CompilerBuilder<'_> {
    pub(crate) fn handle_literal_result_start(
        &mut self,
        qname: &str,
        attrs: &OwnedAttributes,
    ) -> Result<(), XsltError> {
        let mut attributes = Vec::new();
        for (key, value) in attrs {
            let name = from_utf8(key)?;
            if name == "xmlns" || name.starts_with("xmlns:") {
                continue;
            }
            // Every literal attribute is an attribute value template,
            // foreign-namespace ones included (kept, never interpreted).
            attributes.push((name.to_string(), parse_avt(from_utf8(value)?)?));
        }
        self.state_stack.push(BuilderState::LiteralResult {
            qname: qname.to_string(),
            attributes,
        });
        self.instruction_stack.push(Vec::new());
        Ok(())
    }

    pub(crate) fn handle_literal_result_end(
        &mut self,
        qname: String,
        attributes: Vec<(String, AttributeValueTemplate)>,
    ) {
        let body = self.pop_body();
        self.push_instruction(Instruction::LiteralElement {
            qname,
            attributes,
            body,
        });
    }

    pub(crate) fn handle_value_of(
        &mut self,
        attrs: &OwnedAttributes,
        location: Location,
    ) -> Result<(), XsltError> {
        let select = get_attr_required(attrs, b"select", "value-of", location)?;
        match parse_expression(&select) {
            Ok(select) => self.push_instruction(Instruction::ValueOf { select }),
            Err(err) => {
                // Swallowed: the instruction contributes no output.
                self.recover_bad_attribute("select", "value-of", err.to_string(), location)?;
            }
        }
        self.state_stack.push(BuilderState::Hollow);
        Ok(())
    }

    pub(crate) fn handle_copy_of(
        &mut self,
        attrs: &OwnedAttributes,
        location: Location,
    ) -> Result<(), XsltError> {
        let select = get_attr_required(attrs, b"select", "copy-of", location)?;
        match parse_expression(&select) {
            Ok(select) => self.push_instruction(Instruction::CopyOf { select }),
            Err(err) => {
                self.recover_bad_attribute("select", "copy-of", err.to_string(), location)?;
            }
        }
        self.state_stack.push(BuilderState::Hollow);
        Ok(())
    }

    pub(crate) fn handle_copy_start(&mut self) {
        self.state_stack.push(BuilderState::Copy);
        self.instruction_stack.push(Vec::new());
    }

    pub(crate) fn handle_text_start(&mut self) {
        self.state_stack.push(BuilderState::XslText);
        self.instruction_stack.push(Vec::new());
    }

    pub(crate) fn handle_text_end(&mut self) {
        let body = self.pop_body();
        // Whitespace inside the text instruction is significant; the body
        // holds plain text instructions only.
        if let Some(frame) = self.instruction_stack.last_mut() {
            frame.extend(body.0);
        }
    }

    pub(crate) fn handle_element_start(
        &mut self,
        attrs: &OwnedAttributes,
        location: Location,
    ) -> Result<(), XsltError> {
        let name = get_attr_required(attrs, b"name", "element", location)?;
        self.state_stack.push(BuilderState::ElementInstr {
            name: parse_avt(&name)?,
        });
        self.instruction_stack.push(Vec::new());
        Ok(())
    }

    pub(crate) fn handle_attribute_start(
        &mut self,
        attrs: &OwnedAttributes,
        location: Location,
    ) -> Result<(), XsltError> {
        let name = get_attr_required(attrs, b"name", "attribute", location)?;
        self.state_stack.push(BuilderState::AttributeInstr {
            name: parse_avt(&name)?,
        });
        self.instruction_stack.push(Vec::new());
        Ok(())
    }

    pub(crate) fn handle_comment_start(&mut self) {
        self.state_stack.push(BuilderState::Comment);
        self.instruction_stack.push(Vec::new());
    }

    pub(crate) fn handle_processing_instruction_start(
        &mut self,
        attrs: &OwnedAttributes,
        location: Location,
    ) -> Result<(), XsltError> {
        let name = get_attr_required(attrs, b"name", "processing-instruction", location)?;
        self.state_stack.push(BuilderState::ProcessingInstr {
            name: parse_avt(&name)?,
        });
        self.instruction_stack.push(Vec::new());
        Ok(())
    }

    pub(crate) fn handle_message_start(
        &mut self,
        attrs: &OwnedAttributes,
    ) -> Result<(), XsltError> {
        let terminate = crate::util::get_attr_optional(attrs, b"terminate")?
            .is_some_and(|v| v == "yes");
        self.state_stack.push(BuilderState::Message { terminate });
        self.instruction_stack.push(Vec::new());
        Ok(())
    }
}
