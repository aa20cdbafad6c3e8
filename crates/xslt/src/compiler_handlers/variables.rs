//! Handlers for variable, param, and with-param bindings.

use crate::ast::{Instruction, ParamDef, VariableValue, WithParam};
use crate::compiler::{BuilderState, CompilerBuilder};
use crate::error::{Location, XsltError};
use crate::util::{OwnedAttributes, get_attr_optional, get_attr_required};
use salix_xpath::Expression;
use salix_xpath::parse_expression;

fn binding_value(select: Option<Expression>, body: crate::ast::TemplateBody) -> VariableValue {
    match select {
        Some(expr) => VariableValue::Select(expr),
        None => VariableValue::Content(body),
    }
}

impl CompilerBuilder<'_> {
    /// Parses an optional `select` on a binding element. A bad expression is
    /// offered to the error listener; when it is swallowed the binding is
    /// discarded and the inner `Err(())` tells the caller to stop.
    fn parse_binding_select(
        &mut self,
        attrs: &OwnedAttributes,
        element: &str,
        location: Location,
    ) -> Result<Result<Option<Expression>, ()>, XsltError> {
        match get_attr_optional(attrs, b"select")? {
            Some(text) => match parse_expression(&text) {
                Ok(expr) => Ok(Ok(Some(expr))),
                Err(err) => {
                    self.recover_bad_attribute("select", element, err.to_string(), location)?;
                    self.push_discard();
                    Ok(Err(()))
                }
            },
            None => Ok(Ok(None)),
        }
    }

    pub(crate) fn handle_variable_start(
        &mut self,
        attrs: &OwnedAttributes,
        location: Location,
    ) -> Result<(), XsltError> {
        let name = get_attr_required(attrs, b"name", "variable", location)?;
        let select = match self.parse_binding_select(attrs, "variable", location)? {
            Ok(select) => select,
            Err(()) => return Ok(()),
        };
        self.state_stack.push(BuilderState::Variable { name, select });
        self.instruction_stack.push(Vec::new());
        Ok(())
    }

    pub(crate) fn handle_variable_end(
        &mut self,
        name: String,
        select: Option<Expression>,
    ) -> Result<(), XsltError> {
        let body = self.pop_body();
        let value = binding_value(select, body);
        if self.at_top_level() {
            self.module.global_variables.push((name, value));
        } else {
            self.push_instruction(Instruction::Variable { name, value });
        }
        Ok(())
    }

    pub(crate) fn handle_param_start(
        &mut self,
        attrs: &OwnedAttributes,
        location: Location,
    ) -> Result<(), XsltError> {
        let name = get_attr_required(attrs, b"name", "param", location)?;
        let select = match self.parse_binding_select(attrs, "param", location)? {
            Ok(select) => select,
            Err(()) => return Ok(()),
        };
        self.state_stack.push(BuilderState::Param { name, select });
        self.instruction_stack.push(Vec::new());
        Ok(())
    }

    pub(crate) fn handle_param_end(
        &mut self,
        name: String,
        select: Option<Expression>,
        location: Location,
    ) -> Result<(), XsltError> {
        let body = self.pop_body();
        let has_default = select.is_some() || !body.0.is_empty();
        let default = has_default.then(|| binding_value(select, body));

        if self.at_top_level() {
            self.module.global_params.push(ParamDef { name, default });
            return Ok(());
        }
        match self.state_stack.last_mut() {
            Some(BuilderState::Template { params, .. }) => {
                params.push(ParamDef { name, default });
                Ok(())
            }
            Some(BuilderState::Discarded) => Ok(()),
            _ => Err(XsltError::structural(
                "'param' is only allowed at the top of a template or stylesheet",
                location,
            )),
        }
    }

    pub(crate) fn handle_with_param_start(
        &mut self,
        attrs: &OwnedAttributes,
        location: Location,
    ) -> Result<(), XsltError> {
        let name = get_attr_required(attrs, b"name", "with-param", location)?;
        let select = match self.parse_binding_select(attrs, "with-param", location)? {
            Ok(select) => select,
            Err(()) => return Ok(()),
        };
        self.state_stack.push(BuilderState::WithParam { name, select });
        self.instruction_stack.push(Vec::new());
        Ok(())
    }

    pub(crate) fn handle_with_param_end(
        &mut self,
        name: String,
        select: Option<Expression>,
        location: Location,
    ) -> Result<(), XsltError> {
        let body = self.pop_body();
        let value = binding_value(select, body);
        match self.state_stack.last_mut() {
            Some(BuilderState::ApplyTemplates { params, .. })
            | Some(BuilderState::CallTemplate { params, .. }) => {
                params.push(WithParam { name, value });
                Ok(())
            }
            Some(BuilderState::Discarded) => Ok(()),
            _ => Err(XsltError::structural(
                "'with-param' is only allowed inside 'apply-templates' or 'call-template'",
                location,
            )),
        }
    }
}
