//! Handlers for the conditional and iteration constructs.

use crate::ast::{Instruction, SortDataType, SortKey, TemplateBody, When};
use crate::compiler::{BuilderState, CompilerBuilder};
use crate::error::{Location, XsltError};
use crate::util::{OwnedAttributes, get_attr_optional, get_attr_required};
use salix_xpath::Expression;
use salix_xpath::parse_expression;

impl CompilerBuilder<'_> {
    pub(crate) fn handle_if_start(
        &mut self,
        attrs: &OwnedAttributes,
        location: Location,
    ) -> Result<(), XsltError> {
        let test = get_attr_required(attrs, b"test", "if", location)?;
        match parse_expression(&test) {
            Ok(test) => {
                self.state_stack.push(BuilderState::If { test });
                self.instruction_stack.push(Vec::new());
            }
            Err(err) => {
                self.recover_bad_attribute("test", "if", err.to_string(), location)?;
                self.push_discard();
            }
        }
        Ok(())
    }

    pub(crate) fn handle_if_end(&mut self, test: Expression) {
        let body = self.pop_body();
        self.push_instruction(Instruction::If { test, body });
    }

    pub(crate) fn handle_choose_start(&mut self) {
        self.state_stack.push(BuilderState::Choose {
            whens: Vec::new(),
            otherwise: None,
        });
    }

    pub(crate) fn handle_choose_end(
        &mut self,
        whens: Vec<When>,
        otherwise: Option<TemplateBody>,
        location: Location,
    ) -> Result<(), XsltError> {
        if whens.is_empty() {
            return Err(XsltError::structural(
                "choose needs at least one 'when' branch",
                location,
            ));
        }
        self.push_instruction(Instruction::Choose { whens, otherwise });
        Ok(())
    }

    pub(crate) fn handle_when_start(
        &mut self,
        attrs: &OwnedAttributes,
        location: Location,
    ) -> Result<(), XsltError> {
        let test = get_attr_required(attrs, b"test", "when", location)?;
        match parse_expression(&test) {
            Ok(test) => {
                self.state_stack.push(BuilderState::When { test });
                self.instruction_stack.push(Vec::new());
            }
            Err(err) => {
                self.recover_bad_attribute("test", "when", err.to_string(), location)?;
                self.push_discard();
            }
        }
        Ok(())
    }

    pub(crate) fn handle_when_end(
        &mut self,
        test: Expression,
        location: Location,
    ) -> Result<(), XsltError> {
        let body = self.pop_body();
        match self.state_stack.last_mut() {
            Some(BuilderState::Choose { whens, otherwise }) => {
                if otherwise.is_some() {
                    return Err(XsltError::structural(
                        "'when' cannot follow 'otherwise'",
                        location,
                    ));
                }
                whens.push(When { test, body });
                Ok(())
            }
            _ => Err(XsltError::structural(
                "'when' is only allowed inside 'choose'",
                location,
            )),
        }
    }

    pub(crate) fn handle_otherwise_start(&mut self) {
        self.state_stack.push(BuilderState::Otherwise);
        self.instruction_stack.push(Vec::new());
    }

    pub(crate) fn handle_otherwise_end(&mut self, location: Location) -> Result<(), XsltError> {
        let body = self.pop_body();
        match self.state_stack.last_mut() {
            Some(BuilderState::Choose { otherwise, .. }) => {
                if otherwise.is_some() {
                    return Err(XsltError::structural(
                        "'choose' allows only one 'otherwise'",
                        location,
                    ));
                }
                *otherwise = Some(body);
                Ok(())
            }
            _ => Err(XsltError::structural(
                "'otherwise' is only allowed inside 'choose'",
                location,
            )),
        }
    }

    pub(crate) fn handle_for_each_start(
        &mut self,
        attrs: &OwnedAttributes,
        location: Location,
    ) -> Result<(), XsltError> {
        let select = get_attr_required(attrs, b"select", "for-each", location)?;
        match parse_expression(&select) {
            Ok(select) => {
                self.state_stack.push(BuilderState::ForEach {
                    select,
                    sorts: Vec::new(),
                });
                self.instruction_stack.push(Vec::new());
            }
            Err(err) => {
                self.recover_bad_attribute("select", "for-each", err.to_string(), location)?;
                self.push_discard();
            }
        }
        Ok(())
    }

    pub(crate) fn handle_for_each_end(&mut self, select: Expression, sorts: Vec<SortKey>) {
        let body = self.pop_body();
        self.push_instruction(Instruction::ForEach { select, sorts, body });
    }

    /// A `sort` key attaches to the enclosing iteration state; the element
    /// itself contributes nothing to the body.
    pub(crate) fn handle_sort(
        &mut self,
        attrs: &OwnedAttributes,
        location: Location,
    ) -> Result<(), XsltError> {
        let select = match get_attr_optional(attrs, b"select")? {
            Some(text) => match parse_expression(&text) {
                Ok(expr) => expr,
                Err(err) => {
                    self.recover_bad_attribute("select", "sort", err.to_string(), location)?;
                    // Swallowed: the key is dropped, the iteration keeps
                    // document order.
                    self.state_stack.push(BuilderState::Hollow);
                    return Ok(());
                }
            },
            None => parse_expression(".")?,
        };
        let data_type = match get_attr_optional(attrs, b"data-type")?.as_deref() {
            Some("number") => SortDataType::Number,
            _ => SortDataType::Text,
        };
        let descending = get_attr_optional(attrs, b"order")?.as_deref() == Some("descending");
        let key = SortKey {
            select,
            data_type,
            descending,
        };
        match self.state_stack.last_mut() {
            Some(BuilderState::ForEach { sorts, .. })
            | Some(BuilderState::ApplyTemplates { sorts, .. }) => sorts.push(key),
            Some(BuilderState::Discarded) => {}
            _ => {
                return Err(XsltError::structural(
                    "'sort' is only allowed inside 'for-each' or 'apply-templates'",
                    location,
                ));
            }
        }
        self.state_stack.push(BuilderState::Hollow);
        Ok(())
    }

    pub(crate) fn handle_fallback_start(&mut self) {
        self.state_stack.push(BuilderState::Fallback);
        self.instruction_stack.push(Vec::new());
    }
}
