//! The dispatcher: walks the source tree, picks the best rule per node, and
//! interprets template bodies against the output sink.

use crate::ast::{Instruction, ParamDef, TemplateBody, VariableValue};
use crate::error::XsltError;
use crate::executor_handlers;
use crate::output::{EventSink, OutputEvent, RecordingSink};
use crate::processor::CompiledStylesheet;
use crate::specialize;
use salix_xpath::datasource::{DataSourceNode, NodeType};
use salix_xpath::engine::{EvaluationContext, XPathValue, evaluate};
use std::collections::HashMap;
use std::marker::PhantomData;

/// Per-transformation execution state. One executor serves one
/// transformation invocation; the compiled stylesheet it borrows stays
/// shareable across concurrent transformations.
pub struct TemplateExecutor<'s, 'a, N: DataSourceNode<'a>> {
    pub(crate) stylesheet: &'s CompiledStylesheet,
    pub(crate) root: N,
    global_variables: HashMap<String, XPathValue<N>>,
    variable_stack: Vec<HashMap<String, XPathValue<N>>>,
    recursion_depth: usize,
    max_recursion_depth: usize,
    /// Ties the executor to the data source lifetime the node type serves.
    _marker: PhantomData<&'a ()>,
}

impl<'s, 'a, N: DataSourceNode<'a> + 'a> TemplateExecutor<'s, 'a, N> {
    pub fn new(stylesheet: &'s CompiledStylesheet, root: N, max_recursion_depth: usize) -> Self {
        TemplateExecutor {
            stylesheet,
            root,
            global_variables: HashMap::new(),
            variable_stack: Vec::new(),
            recursion_depth: 0,
            max_recursion_depth,
            _marker: PhantomData,
        }
    }

    /// Evaluates global params and variables. Caller-supplied string
    /// parameters override param defaults. Lower-precedence definitions are
    /// evaluated first, so closer-to-principal bindings win name clashes.
    pub fn bind_globals(
        &mut self,
        parameters: &HashMap<String, String>,
    ) -> Result<(), XsltError> {
        let stylesheet = self.stylesheet;
        for param in &stylesheet.global_params {
            let value = match parameters.get(&param.name) {
                Some(text) => XPathValue::String(text.clone()),
                None => match &param.default {
                    Some(value) => self.evaluate_binding(value, self.root, 1, 1)?,
                    None => XPathValue::String(String::new()),
                },
            };
            self.global_variables.insert(param.name.clone(), value);
        }
        for (name, value) in &stylesheet.global_variables {
            let value = self.evaluate_binding(value, self.root, 1, 1)?;
            self.global_variables.insert(name.clone(), value);
        }
        Ok(())
    }

    /// Runs the transformation: dispatches the document root in the default
    /// mode.
    pub fn run(&mut self, sink: &mut dyn EventSink) -> Result<(), XsltError> {
        let root = self.root;
        self.apply_templates(&[root], None, Vec::new(), sink)
    }

    /// Dispatches each node in `nodes` to its best-matching rule, falling
    /// back to the built-in rules when nothing matches.
    pub(crate) fn apply_templates(
        &mut self,
        nodes: &[N],
        mode: Option<&str>,
        params: Vec<(String, XPathValue<N>)>,
        sink: &mut dyn EventSink,
    ) -> Result<(), XsltError> {
        let stylesheet = self.stylesheet;
        let size = nodes.len();
        for (idx, node) in nodes.iter().enumerate() {
            self.enter_template()?;
            let rule = stylesheet.rules.best_rule(mode, *node, self.root);
            match rule {
                Some(rule) => {
                    self.instantiate(rule.template, *node, idx + 1, size, params.clone(), sink)?;
                }
                None => self.built_in_rule(*node, mode, sink)?,
            }
            self.leave_template();
        }
        Ok(())
    }

    /// Instantiates one template: binds its params, then runs its body,
    /// preferring the specialized program when one exists.
    pub(crate) fn instantiate(
        &mut self,
        template_index: usize,
        node: N,
        position: usize,
        size: usize,
        passed: Vec<(String, XPathValue<N>)>,
        sink: &mut dyn EventSink,
    ) -> Result<(), XsltError> {
        let stylesheet = self.stylesheet;
        let template = &stylesheet.templates[template_index];

        let mut scope = HashMap::new();
        for def in &template.params {
            let value = self.resolve_param(def, &passed, node, position, size)?;
            scope.insert(def.name.clone(), value);
        }
        self.variable_stack.push(scope);
        let result = match &stylesheet.programs[template_index] {
            Some(program) => specialize::run_program(self, program, node, position, size, sink),
            None => self.execute_body(&template.body, node, position, size, sink),
        };
        self.variable_stack.pop();
        result
    }

    fn resolve_param(
        &mut self,
        def: &ParamDef,
        passed: &[(String, XPathValue<N>)],
        node: N,
        position: usize,
        size: usize,
    ) -> Result<XPathValue<N>, XsltError> {
        if let Some((_, value)) = passed.iter().find(|(name, _)| *name == def.name) {
            return Ok(value.clone());
        }
        match &def.default {
            Some(value) => self.evaluate_binding(value, node, position, size),
            None => Ok(XPathValue::String(String::new())),
        }
    }

    /// The implicit rules used when no explicit rule matches: containers
    /// recurse into their children in the same mode, text and attribute
    /// nodes copy their string value, everything else produces nothing.
    fn built_in_rule(
        &mut self,
        node: N,
        mode: Option<&str>,
        sink: &mut dyn EventSink,
    ) -> Result<(), XsltError> {
        match node.node_type() {
            NodeType::Root | NodeType::Element => {
                let children = self.selectable_children(node);
                self.apply_templates(&children, mode, Vec::new(), sink)
            }
            NodeType::Text | NodeType::Attribute => sink.text(&node.string_value()),
            NodeType::Comment | NodeType::ProcessingInstruction => Ok(()),
        }
    }

    /// Children eligible for default selection, with whitespace-only text
    /// under strip-space elements removed.
    pub(crate) fn selectable_children(&self, node: N) -> Vec<N> {
        node.children()
            .filter(|child| !self.is_strippable(*child))
            .collect()
    }

    fn is_strippable(&self, node: N) -> bool {
        if node.node_type() != NodeType::Text {
            return false;
        }
        let value = node.string_value();
        if !value.trim().is_empty() {
            return false;
        }
        let Some(parent_name) = node.parent().and_then(|p| p.name()) else {
            return false;
        };
        let listed = |list: &[String]| {
            list.iter()
                .any(|n| n == "*" || n == parent_name.local_part)
        };
        listed(&self.stylesheet.strip_space) && !listed(&self.stylesheet.preserve_space)
    }

    pub(crate) fn execute_body(
        &mut self,
        body: &TemplateBody,
        node: N,
        position: usize,
        size: usize,
        sink: &mut dyn EventSink,
    ) -> Result<(), XsltError> {
        self.variable_stack.push(HashMap::new());
        let result = (|| {
            for instruction in &body.0 {
                self.execute_instruction(instruction, node, position, size, sink)?;
            }
            Ok(())
        })();
        self.variable_stack.pop();
        result
    }

    pub(crate) fn execute_instruction(
        &mut self,
        instruction: &Instruction,
        node: N,
        position: usize,
        size: usize,
        sink: &mut dyn EventSink,
    ) -> Result<(), XsltError> {
        match instruction {
            Instruction::Text(text) => sink.text(text),
            Instruction::ValueOf { select } => {
                executor_handlers::literals::handle_value_of(self, select, node, position, size, sink)
            }
            Instruction::CopyOf { select } => {
                executor_handlers::copy::handle_copy_of(self, select, node, position, size, sink)
            }
            Instruction::Copy { body } => {
                executor_handlers::copy::handle_copy(self, body, node, position, size, sink)
            }
            Instruction::LiteralElement {
                qname,
                attributes,
                body,
            } => executor_handlers::literals::handle_literal_element(
                self, qname, attributes, body, node, position, size, sink,
            ),
            Instruction::Element { name, body } => executor_handlers::literals::handle_element(
                self, name, body, node, position, size, sink,
            ),
            Instruction::Attribute { name, body } => executor_handlers::literals::handle_attribute(
                self, name, body, node, position, size, sink,
            ),
            Instruction::Comment { body } => {
                executor_handlers::literals::handle_comment(self, body, node, position, size, sink)
            }
            Instruction::ProcessingInstruction { name, body } => {
                executor_handlers::literals::handle_processing_instruction(
                    self, name, body, node, position, size, sink,
                )
            }
            Instruction::Message { body, terminate } => executor_handlers::literals::handle_message(
                self, body, *terminate, node, position, size,
            ),
            Instruction::If { test, body } => executor_handlers::control_flow::handle_if(
                self, test, body, node, position, size, sink,
            ),
            Instruction::Choose { whens, otherwise } => {
                executor_handlers::control_flow::handle_choose(
                    self, whens, otherwise, node, position, size, sink,
                )
            }
            Instruction::ForEach { select, sorts, body } => {
                executor_handlers::control_flow::handle_for_each(
                    self, select, sorts, body, node, position, size, sink,
                )
            }
            Instruction::ApplyTemplates {
                select,
                mode,
                sorts,
                params,
            } => executor_handlers::apply_templates::handle_apply_templates(
                self,
                select.as_ref(),
                mode.as_deref(),
                sorts,
                params,
                node,
                position,
                size,
                sink,
            ),
            Instruction::CallTemplate { name, params } => {
                executor_handlers::call_template::handle_call_template(
                    self, name, params, node, position, size, sink,
                )
            }
            Instruction::Variable { name, value } => {
                executor_handlers::variables::handle_variable(
                    self, name, value, node, position, size,
                )
            }
            // Inert where the enclosing instruction is understood; the
            // unknown-instruction arm below runs these bodies.
            Instruction::Fallback { .. } => Ok(()),
            Instruction::Unknown { qname, body } => {
                let fallbacks: Vec<_> = body
                    .0
                    .iter()
                    .filter_map(|instr| match instr {
                        Instruction::Fallback { body } => Some(body),
                        _ => None,
                    })
                    .collect();
                if fallbacks.is_empty() {
                    log::debug!("skipping unknown instruction <{}>", qname);
                }
                for fallback in fallbacks {
                    self.execute_body(fallback, node, position, size, sink)?;
                }
                Ok(())
            }
        }
    }

    // --- Evaluation plumbing ---

    /// Snapshot of every visible binding: globals shadowed by the stack,
    /// inner scopes shadowing outer ones.
    pub(crate) fn merged_variables(&self) -> HashMap<String, XPathValue<N>> {
        let mut merged = self.global_variables.clone();
        for scope in &self.variable_stack {
            for (name, value) in scope {
                merged.insert(name.clone(), value.clone());
            }
        }
        merged
    }

    pub(crate) fn bind_local(&mut self, name: &str, value: XPathValue<N>) {
        if let Some(scope) = self.variable_stack.last_mut() {
            scope.insert(name.to_string(), value);
        }
    }

    pub(crate) fn evaluate_expression(
        &self,
        expression: &salix_xpath::Expression,
        node: N,
        position: usize,
        size: usize,
    ) -> Result<XPathValue<N>, XsltError> {
        let variables = self.merged_variables();
        let ctx = EvaluationContext {
            context_node: node,
            root_node: self.root,
            position,
            size,
            variables: &variables,
        };
        Ok(evaluate(expression, &ctx)?)
    }

    /// Evaluates a variable/param value: a select expression directly, or a
    /// content body collapsed to its text.
    pub(crate) fn evaluate_binding(
        &mut self,
        value: &VariableValue,
        node: N,
        position: usize,
        size: usize,
    ) -> Result<XPathValue<N>, XsltError> {
        match value {
            VariableValue::Select(expression) => {
                self.evaluate_expression(expression, node, position, size)
            }
            VariableValue::Content(body) => {
                let text = self.body_to_string(body, node, position, size)?;
                Ok(XPathValue::String(text))
            }
        }
    }

    /// Runs `body` into a recording sink and concatenates its text events.
    pub(crate) fn body_to_string(
        &mut self,
        body: &TemplateBody,
        node: N,
        position: usize,
        size: usize,
    ) -> Result<String, XsltError> {
        let mut recorder = RecordingSink::new();
        self.execute_body(body, node, position, size, &mut recorder)?;
        let mut out = String::new();
        for event in recorder.events {
            if let OutputEvent::Text(text) = event {
                out.push_str(&text);
            }
        }
        Ok(out)
    }

    // --- Recursion guard ---

    pub(crate) fn enter_template(&mut self) -> Result<(), XsltError> {
        if self.recursion_depth >= self.max_recursion_depth {
            return Err(XsltError::RecursionLimit(self.max_recursion_depth));
        }
        self.recursion_depth += 1;
        Ok(())
    }

    pub(crate) fn leave_template(&mut self) {
        self.recursion_depth -= 1;
    }
}
