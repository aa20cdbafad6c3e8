//! The streaming stylesheet compiler.
//!
//! A [`CompilerBuilder`] consumes parse events from [`crate::parser`] and
//! builds a [`StylesheetModule`] bottom-up, guided by the element schema.
//! Includes are parsed inline into the same module; imports become child
//! modules with lower precedence.

use crate::ast::{
    AttributeValueTemplate, Instruction, ParamDef, SortKey, StylesheetModule, TemplateBody, When,
    WithParam,
};
use crate::error::{ErrorListener, Location, XsltError};
use crate::resolver::ResourceLoader;
use crate::schema::{self, ElementDef, ElementKind, SUPPORTED_VERSION, XSLT_NS};
use crate::util::{OwnedAttributes, location_of};
use quick_xml::events::{BytesEnd, BytesStart};
use salix_xpath::Expression;
use std::collections::HashMap;
use std::str::from_utf8;

/// Receives parse events from the XML driver.
pub trait StylesheetBuilder {
    fn start_element(
        &mut self,
        e: &BytesStart,
        attrs: OwnedAttributes,
        pos: usize,
        source: &str,
    ) -> Result<(), XsltError>;

    fn empty_element(
        &mut self,
        e: &BytesStart,
        attrs: OwnedAttributes,
        pos: usize,
        source: &str,
    ) -> Result<(), XsltError>;

    fn text(&mut self, text: String) -> Result<(), XsltError>;

    fn end_element(&mut self, e: &BytesEnd, pos: usize, source: &str) -> Result<(), XsltError>;
}

/// What the builder is currently inside of. One entry per open element that
/// the compiler processes.
#[derive(Debug)]
pub(crate) enum BuilderState {
    Stylesheet,
    Template {
        name: Option<String>,
        match_pattern: Option<crate::pattern::Pattern>,
        mode: Option<String>,
        priority: Option<f64>,
        params: Vec<ParamDef>,
    },
    LiteralResult {
        qname: String,
        attributes: Vec<(String, AttributeValueTemplate)>,
    },
    XslText,
    If {
        test: Expression,
    },
    Choose {
        whens: Vec<When>,
        otherwise: Option<TemplateBody>,
    },
    When {
        test: Expression,
    },
    Otherwise,
    ForEach {
        select: Expression,
        sorts: Vec<SortKey>,
    },
    Variable {
        name: String,
        select: Option<Expression>,
    },
    Param {
        name: String,
        select: Option<Expression>,
    },
    WithParam {
        name: String,
        select: Option<Expression>,
    },
    ApplyTemplates {
        select: Option<Expression>,
        mode: Option<String>,
        sorts: Vec<SortKey>,
        params: Vec<WithParam>,
    },
    CallTemplate {
        name: String,
        params: Vec<WithParam>,
    },
    Copy,
    AttributeInstr {
        name: AttributeValueTemplate,
    },
    ElementInstr {
        name: AttributeValueTemplate,
    },
    Comment,
    ProcessingInstr {
        name: AttributeValueTemplate,
    },
    Message {
        terminate: bool,
    },
    Fallback,
    /// Forward-compatible placeholder for an unknown stylesheet element.
    Unknown {
        qname: String,
    },
    /// An element fully handled at its start tag (include, output, ...).
    Hollow,
    /// A construct whose defining attribute failed to compile and whose
    /// error the listener swallowed. The body is still parsed for
    /// well-formedness but contributes nothing.
    Discarded,
}

/// Progress of `#fragment`-scoped parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FragmentGate {
    /// Skipping content, waiting for an element whose ID matches.
    Pending { id: String },
    /// Inside the fragment; tracks open-element depth below it.
    Active { depth: usize },
    /// The fragment's close tag has fired; everything after is skipped.
    Done,
}

pub struct CompilerBuilder<'c> {
    pub(crate) module: StylesheetModule,
    pub(crate) state_stack: Vec<BuilderState>,
    pub(crate) instruction_stack: Vec<Vec<Instruction>>,
    processor_stack: Vec<&'static ElementDef>,
    /// Prefix-to-URI bindings, one scope per open element. The empty prefix
    /// key carries the default namespace.
    ns_stack: Vec<HashMap<String, String>>,
    pub(crate) base_uri: String,
    fragment: Option<FragmentGate>,
    /// Open-element count of subtrees being skipped without processing
    /// (foreign top-level elements).
    skip_depth: usize,
    pub(crate) forward_compatible: bool,
    pub(crate) seen_non_import: bool,
    /// URIs of documents on the current include/import chain, for cycle
    /// rejection.
    pub(crate) import_stack: Vec<String>,
    pub(crate) loader: &'c dyn ResourceLoader,
    pub(crate) listener: &'c mut dyn ErrorListener,
}

impl<'c> CompilerBuilder<'c> {
    pub fn new(
        base_uri: impl Into<String>,
        fragment: Option<String>,
        loader: &'c dyn ResourceLoader,
        listener: &'c mut dyn ErrorListener,
    ) -> Self {
        let base_uri = base_uri.into();
        let mut import_stack = Vec::new();
        import_stack.push(base_uri.clone());
        CompilerBuilder {
            module: StylesheetModule {
                base_uri: base_uri.clone(),
                ..StylesheetModule::default()
            },
            state_stack: Vec::new(),
            instruction_stack: Vec::new(),
            processor_stack: Vec::new(),
            ns_stack: vec![HashMap::new()],
            base_uri,
            fragment: fragment.map(|id| FragmentGate::Pending { id }),
            skip_depth: 0,
            forward_compatible: false,
            seen_non_import: false,
            import_stack,
            loader,
            listener,
        }
    }

    /// A builder that parses an included document into `module`, inheriting
    /// the include/import chain.
    pub(crate) fn for_include(
        module: StylesheetModule,
        base_uri: String,
        fragment: Option<String>,
        import_stack: Vec<String>,
        loader: &'c dyn ResourceLoader,
        listener: &'c mut dyn ErrorListener,
    ) -> Self {
        let mut builder = CompilerBuilder::new(base_uri, fragment, loader, listener);
        builder.module = module;
        builder.import_stack = import_stack;
        builder
    }

    pub fn into_module(self) -> StylesheetModule {
        self.module
    }

    // --- Shared helpers used by the handler modules ---

    pub(crate) fn push_instruction(&mut self, instr: Instruction) {
        if let Some(frame) = self.instruction_stack.last_mut() {
            frame.push(instr);
        }
    }

    pub(crate) fn pop_body(&mut self) -> TemplateBody {
        TemplateBody(self.instruction_stack.pop().unwrap_or_default())
    }

    /// True while directly inside the stylesheet element, i.e. at top level.
    pub(crate) fn at_top_level(&self) -> bool {
        matches!(self.state_stack.last(), Some(BuilderState::Stylesheet))
    }

    /// Offers an unparseable pattern- or expression-typed attribute to the
    /// listener. Returns Ok only when the listener swallowed the error; the
    /// caller then drops the construct it was building.
    pub(crate) fn recover_bad_attribute(
        &mut self,
        attribute: &str,
        element: &str,
        message: String,
        location: Location,
    ) -> Result<(), XsltError> {
        let err = XsltError::attribute_value(attribute, element, message, location);
        self.listener.recoverable(err)
    }

    /// Replaces the construct being opened with a discard frame.
    pub(crate) fn push_discard(&mut self) {
        self.state_stack.push(BuilderState::Discarded);
        self.instruction_stack.push(Vec::new());
    }

    fn should_process(&self) -> bool {
        if self.skip_depth > 0 {
            return false;
        }
        !matches!(
            self.fragment,
            Some(FragmentGate::Pending { .. }) | Some(FragmentGate::Done)
        )
    }

    fn push_namespace_scope(&mut self, attrs: &OwnedAttributes) -> Result<(), XsltError> {
        let mut scope = self.ns_stack.last().cloned().unwrap_or_default();
        for (key, value) in attrs {
            if key.as_slice() == b"xmlns" {
                scope.insert(String::new(), from_utf8(value)?.to_string());
            } else if let Some(prefix) = key.strip_prefix(b"xmlns:") {
                scope.insert(from_utf8(prefix)?.to_string(), from_utf8(value)?.to_string());
            }
        }
        self.ns_stack.push(scope);
        Ok(())
    }

    /// Splits a raw element name and resolves its namespace against the
    /// current scope. Unprefixed element names take the default namespace.
    fn resolve_element_name<'n>(&self, raw: &'n str) -> (Option<String>, &'n str) {
        let scope = self.ns_stack.last();
        match raw.split_once(':') {
            Some((prefix, local)) => {
                let uri = scope.and_then(|s| s.get(prefix)).cloned();
                (uri, local)
            }
            None => {
                let uri = scope
                    .and_then(|s| s.get(""))
                    .filter(|u| !u.is_empty())
                    .cloned();
                (uri, raw)
            }
        }
    }

    /// Validates the attributes of a stylesheet-namespace element against
    /// its definition: no unknown same-namespace attributes, all required
    /// ones present, typed values well formed.
    fn check_attributes(
        &mut self,
        def: &'static ElementDef,
        attrs: &OwnedAttributes,
        location: Location,
    ) -> Result<(), XsltError> {
        for (key, value) in attrs {
            let name = from_utf8(key)?;
            if name == "xmlns" || name.starts_with("xmlns:") {
                continue;
            }
            match schema::attribute_def(def, name) {
                Some(attr_def) => {
                    let value = from_utf8(value)?;
                    if let Err(message) = attr_def.attr_type.validate(value) {
                        let err =
                            XsltError::attribute_value(name, def.local, message, location);
                        self.listener.recoverable(err)?;
                    }
                }
                None if self.forward_compatible => {
                    self.listener.warning(&format!(
                        "ignoring unknown attribute '{}' on <{}> (forward-compatible mode)",
                        name, def.local
                    ));
                }
                None => {
                    return Err(XsltError::structural(
                        format!("unknown attribute '{}' on <{}>", name, def.local),
                        location,
                    ));
                }
            }
        }
        for attr_def in def.attributes.iter().filter(|a| a.required) {
            let present = attrs
                .iter()
                .any(|(key, _)| from_utf8(key).is_ok_and(|k| k == attr_def.name));
            if !present {
                return Err(XsltError::structural(
                    format!(
                        "<{}> is missing the required attribute '{}'",
                        def.local, attr_def.name
                    ),
                    location,
                ));
            }
        }
        Ok(())
    }
}

impl StylesheetBuilder for CompilerBuilder<'_> {
    fn start_element(
        &mut self,
        e: &BytesStart,
        attrs: OwnedAttributes,
        pos: usize,
        source: &str,
    ) -> Result<(), XsltError> {
        self.push_namespace_scope(&attrs)?;

        if self.skip_depth > 0 {
            self.skip_depth += 1;
            return Ok(());
        }
        match &mut self.fragment {
            Some(FragmentGate::Pending { id }) => {
                let matches = attrs
                    .iter()
                    .any(|(key, value)| key.as_slice() == b"id" && value.as_slice() == id.as_bytes());
                if matches {
                    self.fragment = Some(FragmentGate::Active { depth: 1 });
                } else {
                    return Ok(());
                }
            }
            Some(FragmentGate::Active { depth }) => *depth += 1,
            Some(FragmentGate::Done) => return Ok(()),
            None => {}
        }

        let location = location_of(source, pos);
        let raw_name = from_utf8(e.name().as_ref())?.to_string();
        let (namespace, local) = self.resolve_element_name(&raw_name);
        let local = local.to_string();

        let def = match schema::element_def(namespace.as_deref(), &local) {
            Some(def) => def,
            None if self.forward_compatible => {
                // Forward-compatible processing: an unknown element in the
                // stylesheet namespace becomes a run-time no-op.
                self.listener.warning(&format!(
                    "unknown element <{}> kept as a no-op (declared version exceeds {})",
                    raw_name, SUPPORTED_VERSION
                ));
                self.state_stack.push(BuilderState::Unknown { qname: raw_name });
                self.instruction_stack.push(Vec::new());
                self.processor_stack.push(&schema::LITERAL_RESULT);
                return Ok(());
            }
            None => {
                return Err(XsltError::structural(
                    format!("unknown stylesheet element <{}>", raw_name),
                    location,
                ));
            }
        };

        match self.processor_stack.last() {
            None => {
                if def.kind != ElementKind::Stylesheet {
                    return Err(XsltError::structural(
                        format!(
                            "document element must be 'stylesheet' or 'transform' in the {} namespace, found <{}>",
                            XSLT_NS, raw_name
                        ),
                        location,
                    ));
                }
            }
            Some(parent) => {
                // Foreign elements at top level are data carriers for
                // extensions; skip them without error.
                if def.kind == ElementKind::LiteralResult && self.at_top_level() {
                    if namespace.is_none() {
                        return Err(XsltError::structural(
                            format!("top-level element <{}> must have a non-null namespace", raw_name),
                            location,
                        ));
                    }
                    self.skip_depth = 1;
                    return Ok(());
                }
                if !schema::allows_child(parent, def) {
                    return Err(XsltError::structural(
                        format!("<{}> is not allowed inside <{}>", raw_name, parent.local),
                        location,
                    ));
                }
            }
        }

        if namespace.as_deref() == Some(XSLT_NS) {
            self.check_attributes(def, &attrs, location)?;
        }

        match def.kind {
            ElementKind::Stylesheet => self.handle_stylesheet_start(&attrs, location)?,
            ElementKind::Include => self.handle_include(&attrs, location)?,
            ElementKind::Import => self.handle_import(&attrs, location)?,
            ElementKind::Output => self.handle_output(&attrs, location)?,
            ElementKind::StripSpace => self.handle_strip_space(&attrs, location, true)?,
            ElementKind::PreserveSpace => self.handle_strip_space(&attrs, location, false)?,
            ElementKind::Template => self.handle_template_start(&attrs, location)?,
            ElementKind::ApplyTemplates => self.handle_apply_templates_start(&attrs, location)?,
            ElementKind::CallTemplate => self.handle_call_template_start(&attrs, location)?,
            ElementKind::WithParam => self.handle_with_param_start(&attrs, location)?,
            ElementKind::If => self.handle_if_start(&attrs, location)?,
            ElementKind::Choose => self.handle_choose_start(),
            ElementKind::When => self.handle_when_start(&attrs, location)?,
            ElementKind::Otherwise => self.handle_otherwise_start(),
            ElementKind::ForEach => self.handle_for_each_start(&attrs, location)?,
            ElementKind::ValueOf => self.handle_value_of(&attrs, location)?,
            ElementKind::CopyOf => self.handle_copy_of(&attrs, location)?,
            ElementKind::Copy => self.handle_copy_start(),
            ElementKind::Text => self.handle_text_start(),
            ElementKind::Variable => self.handle_variable_start(&attrs, location)?,
            ElementKind::Param => self.handle_param_start(&attrs, location)?,
            ElementKind::Element => self.handle_element_start(&attrs, location)?,
            ElementKind::Attribute => self.handle_attribute_start(&attrs, location)?,
            ElementKind::Comment => self.handle_comment_start(),
            ElementKind::ProcessingInstruction => {
                self.handle_processing_instruction_start(&attrs, location)?
            }
            ElementKind::Message => self.handle_message_start(&attrs)?,
            ElementKind::Sort => self.handle_sort(&attrs, location)?,
            ElementKind::Fallback => self.handle_fallback_start(),
            ElementKind::LiteralResult => {
                self.handle_literal_result_start(&raw_name, &attrs)?
            }
        }

        if def.kind != ElementKind::Import && self.parent_is_stylesheet() {
            self.seen_non_import = true;
        }

        self.processor_stack.push(def);
        Ok(())
    }

    fn empty_element(
        &mut self,
        e: &BytesStart,
        attrs: OwnedAttributes,
        pos: usize,
        source: &str,
    ) -> Result<(), XsltError> {
        self.start_element(e, attrs, pos, source)?;
        let name = from_utf8(e.name().as_ref())?.to_string();
        self.end_element(&BytesEnd::new(name), pos, source)
    }

    fn text(&mut self, text: String) -> Result<(), XsltError> {
        if !self.should_process() {
            return Ok(());
        }
        let inside_text_element = matches!(self.state_stack.last(), Some(BuilderState::XslText));
        if !inside_text_element && text.trim().is_empty() {
            return Ok(());
        }
        if self.instruction_stack.is_empty() {
            // Stray character data between declarations; harmless.
            return Ok(());
        }
        self.push_instruction(Instruction::Text(text));
        Ok(())
    }

    fn end_element(&mut self, e: &BytesEnd, pos: usize, source: &str) -> Result<(), XsltError> {
        self.ns_stack.pop();

        if self.skip_depth > 0 {
            self.skip_depth -= 1;
            return Ok(());
        }
        match &mut self.fragment {
            Some(FragmentGate::Pending { .. }) | Some(FragmentGate::Done) => return Ok(()),
            Some(FragmentGate::Active { depth }) => {
                *depth -= 1;
                if *depth == 0 {
                    self.fragment = Some(FragmentGate::Done);
                }
            }
            None => {}
        }

        let location = location_of(source, pos);
        self.processor_stack.pop();
        let Some(state) = self.state_stack.pop() else {
            return Err(XsltError::structural(
                format!(
                    "unbalanced closing tag </{}>",
                    String::from_utf8_lossy(e.name().as_ref())
                ),
                location,
            ));
        };

        match state {
            BuilderState::Stylesheet | BuilderState::Hollow => Ok(()),
            BuilderState::Template {
                name,
                match_pattern,
                mode,
                priority,
                params,
            } => self.handle_template_end(name, match_pattern, mode, priority, params),
            BuilderState::LiteralResult { qname, attributes } => {
                self.handle_literal_result_end(qname, attributes);
                Ok(())
            }
            BuilderState::XslText => {
                self.handle_text_end();
                Ok(())
            }
            BuilderState::If { test } => {
                self.handle_if_end(test);
                Ok(())
            }
            BuilderState::Choose { whens, otherwise } => {
                self.handle_choose_end(whens, otherwise, location)
            }
            BuilderState::When { test } => self.handle_when_end(test, location),
            BuilderState::Otherwise => self.handle_otherwise_end(location),
            BuilderState::ForEach { select, sorts } => {
                self.handle_for_each_end(select, sorts);
                Ok(())
            }
            BuilderState::Variable { name, select } => self.handle_variable_end(name, select),
            BuilderState::Param { name, select } => self.handle_param_end(name, select, location),
            BuilderState::WithParam { name, select } => {
                self.handle_with_param_end(name, select, location)
            }
            BuilderState::ApplyTemplates {
                select,
                mode,
                sorts,
                params,
            } => {
                self.push_instruction(Instruction::ApplyTemplates {
                    select,
                    mode,
                    sorts,
                    params,
                });
                Ok(())
            }
            BuilderState::CallTemplate { name, params } => {
                self.push_instruction(Instruction::CallTemplate { name, params });
                Ok(())
            }
            BuilderState::Copy => {
                let body = self.pop_body();
                self.push_instruction(Instruction::Copy { body });
                Ok(())
            }
            BuilderState::AttributeInstr { name } => {
                let body = self.pop_body();
                self.push_instruction(Instruction::Attribute { name, body });
                Ok(())
            }
            BuilderState::ElementInstr { name } => {
                let body = self.pop_body();
                self.push_instruction(Instruction::Element { name, body });
                Ok(())
            }
            BuilderState::Comment => {
                let body = self.pop_body();
                self.push_instruction(Instruction::Comment { body });
                Ok(())
            }
            BuilderState::ProcessingInstr { name } => {
                let body = self.pop_body();
                self.push_instruction(Instruction::ProcessingInstruction { name, body });
                Ok(())
            }
            BuilderState::Message { terminate } => {
                let body = self.pop_body();
                self.push_instruction(Instruction::Message { body, terminate });
                Ok(())
            }
            BuilderState::Fallback => {
                let body = self.pop_body();
                self.push_instruction(Instruction::Fallback { body });
                Ok(())
            }
            BuilderState::Unknown { qname } => {
                let body = self.pop_body();
                self.push_instruction(Instruction::Unknown { qname, body });
                Ok(())
            }
            BuilderState::Discarded => {
                self.pop_body();
                Ok(())
            }
        }
    }
}

impl CompilerBuilder<'_> {
    /// Whether the element just dispatched sits directly inside the
    /// stylesheet element. Every handler has already pushed exactly one
    /// state, so the parent is one level down.
    fn parent_is_stylesheet(&self) -> bool {
        self.state_stack.len() >= 2
            && matches!(
                self.state_stack[self.state_stack.len() - 2],
                BuilderState::Stylesheet
            )
    }
}
