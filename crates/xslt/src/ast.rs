//! The compiled, in-memory form of a stylesheet: templates and the
//! instruction trees inside them.

use crate::pattern::Pattern;
use salix_xpath::Expression;

/// An ordered sequence of instructions, the body of one template or of one
/// nested construct. Sibling order is document order and determines output
/// event order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TemplateBody(pub Vec<Instruction>);

/// One compiled construct of a template body.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// Literal text from the stylesheet.
    Text(String),
    /// `value-of`: emit the string value of an expression.
    ValueOf { select: Expression },
    /// `copy-of`: deep-copy the selected nodes into the output.
    CopyOf { select: Expression },
    /// `copy`: shallow-copy the context node, then run the body inside it.
    Copy { body: TemplateBody },
    /// A literal result element with attribute value templates.
    LiteralElement {
        qname: String,
        attributes: Vec<(String, AttributeValueTemplate)>,
        body: TemplateBody,
    },
    /// `element`: an element whose name is computed per invocation.
    Element {
        name: AttributeValueTemplate,
        body: TemplateBody,
    },
    /// `attribute`: attach an attribute to the nearest open output element.
    Attribute {
        name: AttributeValueTemplate,
        body: TemplateBody,
    },
    Comment { body: TemplateBody },
    /// `processing-instruction`: target from an AVT, data from the body.
    ProcessingInstruction {
        name: AttributeValueTemplate,
        body: TemplateBody,
    },
    Message { body: TemplateBody, terminate: bool },
    If {
        test: Expression,
        body: TemplateBody,
    },
    Choose {
        whens: Vec<When>,
        otherwise: Option<TemplateBody>,
    },
    ForEach {
        select: Expression,
        sorts: Vec<SortKey>,
        body: TemplateBody,
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
    Variable {
        name: String,
        value: VariableValue,
    },
    /// `fallback`: inert where the enclosing instruction is understood; run
    /// when the enclosing instruction is an unknown kept under
    /// forward-compatible processing.
    Fallback { body: TemplateBody },
    /// An element in the stylesheet namespace this implementation does not
    /// know, kept under forward-compatible processing. At run time only its
    /// `fallback` children execute.
    Unknown { qname: String, body: TemplateBody },
}

/// One `sort` key on `for-each` or `apply-templates`. Keys apply in
/// declaration order, the first being most significant.
#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub select: Expression,
    pub data_type: SortDataType,
    pub descending: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDataType {
    #[default]
    Text,
    Number,
}

#[derive(Debug, Clone, PartialEq)]
pub struct When {
    pub test: Expression,
    pub body: TemplateBody,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WithParam {
    pub name: String,
    pub value: VariableValue,
}

/// A variable or parameter value: either a select expression or a content
/// body evaluated to a string.
#[derive(Debug, Clone, PartialEq)]
pub enum VariableValue {
    Select(Expression),
    Content(TemplateBody),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamDef {
    pub name: String,
    pub default: Option<VariableValue>,
}

/// One `template` declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateDef {
    pub name: Option<String>,
    pub match_pattern: Option<Pattern>,
    pub mode: Option<String>,
    pub priority: Option<f64>,
    pub params: Vec<ParamDef>,
    pub body: TemplateBody,
}

/// An attribute value mixing literal text with embedded expressions,
/// re-evaluated per invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeValueTemplate {
    pub parts: Vec<AvtPart>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AvtPart {
    Literal(String),
    Expr(Expression),
}

impl AttributeValueTemplate {
    /// The fixed text, if no part needs run-time evaluation.
    pub fn as_static(&self) -> Option<&str> {
        match self.parts.as_slice() {
            [] => Some(""),
            [AvtPart::Literal(s)] => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMethod {
    #[default]
    Xml,
    Text,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct OutputOptions {
    pub method: OutputMethod,
    pub indent: bool,
    pub omit_xml_declaration: bool,
}

/// One parsed stylesheet document. Included documents merge into the
/// including module; imported documents become child modules with strictly
/// lower precedence.
#[derive(Debug, Clone, Default)]
pub struct StylesheetModule {
    pub version: String,
    pub base_uri: String,
    /// Templates in document order; includes splice into this sequence at
    /// their inclusion point.
    pub templates: Vec<TemplateDef>,
    /// Imported modules in declaration order.
    pub imports: Vec<StylesheetModule>,
    pub global_variables: Vec<(String, VariableValue)>,
    /// Top-level params: bound from caller-supplied string parameters, with
    /// these defaults as fallback.
    pub global_params: Vec<ParamDef>,
    pub output: OutputOptions,
    pub strip_space: Vec<String>,
    pub preserve_space: Vec<String>,
}
