//! Handlers for template declarations and the two dispatch instructions,
//! apply-templates and call-template.

use crate::ast::{ParamDef, TemplateDef};
use crate::compiler::{BuilderState, CompilerBuilder};
use crate::error::{Location, XsltError};
use crate::pattern::Pattern;
use crate::util::{OwnedAttributes, get_attr_optional, get_attr_required};
use salix_xpath::parse_expression;

impl CompilerBuilder<'_> {
    pub(crate) fn handle_template_start(
        &mut self,
        attrs: &OwnedAttributes,
        location: Location,
    ) -> Result<(), XsltError> {
        let name = get_attr_optional(attrs, b"name")?;
        let match_text = get_attr_optional(attrs, b"match")?;
        if name.is_none() && match_text.is_none() {
            return Err(XsltError::structural(
                "template needs a 'match' pattern or a 'name'",
                location,
            ));
        }
        let match_pattern = match match_text {
            Some(text) => match Pattern::parse(&text) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    self.recover_bad_attribute("match", "template", e.to_string(), location)?;
                    // Swallowed: the whole template is dropped.
                    self.push_discard();
                    return Ok(());
                }
            },
            None => None,
        };
        let mode = get_attr_optional(attrs, b"mode")?;
        if mode.is_some() && match_pattern.is_none() {
            return Err(XsltError::structural(
                "a template with a 'mode' must also have a 'match' pattern",
                location,
            ));
        }
        let priority = match get_attr_optional(attrs, b"priority")? {
            Some(raw) => match raw.trim().parse::<f64>() {
                Ok(value) => Some(value),
                Err(_) => {
                    let err = XsltError::attribute_value(
                        "priority",
                        "template",
                        format!("'{}' is not a number", raw),
                        location,
                    );
                    // A swallowing listener leaves the template on its
                    // default priority.
                    self.listener.recoverable(err)?;
                    None
                }
            },
            None => None,
        };

        self.state_stack.push(BuilderState::Template {
            name,
            match_pattern,
            mode,
            priority,
            params: Vec::new(),
        });
        self.instruction_stack.push(Vec::new());
        Ok(())
    }

    pub(crate) fn handle_template_end(
        &mut self,
        name: Option<String>,
        match_pattern: Option<Pattern>,
        mode: Option<String>,
        priority: Option<f64>,
        params: Vec<ParamDef>,
    ) -> Result<(), XsltError> {
        let body = self.pop_body();
        self.module.templates.push(TemplateDef {
            name,
            match_pattern,
            mode,
            priority,
            params,
            body,
        });
        Ok(())
    }

    pub(crate) fn handle_apply_templates_start(
        &mut self,
        attrs: &OwnedAttributes,
        location: Location,
    ) -> Result<(), XsltError> {
        let select = match get_attr_optional(attrs, b"select")? {
            Some(text) => match parse_expression(&text) {
                Ok(expr) => Some(expr),
                Err(err) => {
                    self.recover_bad_attribute(
                        "select",
                        "apply-templates",
                        err.to_string(),
                        location,
                    )?;
                    self.push_discard();
                    return Ok(());
                }
            },
            None => None,
        };
        let mode = get_attr_optional(attrs, b"mode")?;
        self.state_stack.push(BuilderState::ApplyTemplates {
            select,
            mode,
            sorts: Vec::new(),
            params: Vec::new(),
        });
        Ok(())
    }

    pub(crate) fn handle_call_template_start(
        &mut self,
        attrs: &OwnedAttributes,
        location: Location,
    ) -> Result<(), XsltError> {
        let name = get_attr_required(attrs, b"name", "call-template", location)?;
        self.state_stack.push(BuilderState::CallTemplate {
            name,
            params: Vec::new(),
        });
        Ok(())
    }
}
