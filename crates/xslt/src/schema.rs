//! The static element schema: which stylesheet elements exist, what may
//! nest inside them, and how their attributes are typed. The streaming
//! compiler consults this table for every element it opens.

pub const XSLT_NS: &str = "http://www.w3.org/1999/XSL/Transform";

/// The grammar version this implementation handles natively. Stylesheets
/// declaring a higher version get forward-compatible processing: unknown
/// elements become no-op placeholders instead of structural errors.
pub const SUPPORTED_VERSION: f64 = 1.0;

/// How an attribute's raw text is converted before being bound onto the
/// instruction under construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrType {
    /// Plain character data, kept verbatim.
    Cdata,
    /// A (possibly relative) URI reference.
    UriRef,
    /// An ID usable as a fragment target.
    Id,
    /// An attribute value template: text with `{expr}` segments.
    Avt,
    /// A match pattern.
    Pattern,
    /// An expression.
    Expression,
    /// Exactly one character.
    Char,
    /// A numeric rule priority.
    Priority,
    /// `yes` or `no`.
    YesNo,
    /// A qualified name.
    QName,
    /// A whitespace-separated list of qualified names.
    QNames,
    /// One of a fixed set of tokens.
    Enum(&'static [&'static str]),
    /// A whitespace-separated list of simple name-test patterns.
    SimplePatterns,
    /// A whitespace-separated list of strings.
    StringList,
}

impl AttrType {
    /// Checks constraints that are decidable from the text alone. Pattern,
    /// expression and AVT text is compiled (and so fully checked) by the
    /// caller.
    pub fn validate(&self, raw: &str) -> Result<(), String> {
        match self {
            AttrType::Priority => raw
                .trim()
                .parse::<f64>()
                .map(|_| ())
                .map_err(|_| format!("'{}' is not a number", raw)),
            AttrType::YesNo => match raw {
                "yes" | "no" => Ok(()),
                _ => Err(format!("expected 'yes' or 'no', got '{}'", raw)),
            },
            AttrType::Char => {
                if raw.chars().count() == 1 {
                    Ok(())
                } else {
                    Err(format!("expected a single character, got '{}'", raw))
                }
            }
            AttrType::Enum(allowed) => {
                if allowed.contains(&raw) {
                    Ok(())
                } else {
                    Err(format!("expected one of {:?}, got '{}'", allowed, raw))
                }
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttrDef {
    pub name: &'static str,
    pub attr_type: AttrType,
    pub required: bool,
}

const fn attr(name: &'static str, attr_type: AttrType) -> AttrDef {
    AttrDef {
        name,
        attr_type,
        required: false,
    }
}

const fn required(name: &'static str, attr_type: AttrType) -> AttrDef {
    AttrDef {
        name,
        attr_type,
        required: true,
    }
}

/// Which compiler handler an element routes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Stylesheet,
    Include,
    Import,
    Output,
    StripSpace,
    PreserveSpace,
    Template,
    ApplyTemplates,
    CallTemplate,
    WithParam,
    If,
    Choose,
    When,
    Otherwise,
    ForEach,
    ValueOf,
    CopyOf,
    Copy,
    Text,
    Variable,
    Param,
    Element,
    Attribute,
    Comment,
    ProcessingInstruction,
    Message,
    Sort,
    Fallback,
    /// The wildcard entry: any element outside the stylesheet namespace.
    LiteralResult,
}

#[derive(Debug)]
pub struct ElementDef {
    pub local: &'static str,
    /// A second accepted name for the same element, e.g. `transform` for
    /// `stylesheet`.
    pub alias: Option<&'static str>,
    pub kind: ElementKind,
    pub attributes: &'static [AttrDef],
    /// Local names of permitted child elements; `"*"` admits literal result
    /// elements.
    pub children: &'static [&'static str],
}

const INSTRUCTIONS: &[&str] = &[
    "apply-templates",
    "call-template",
    "if",
    "choose",
    "for-each",
    "value-of",
    "copy",
    "copy-of",
    "text",
    "variable",
    "element",
    "attribute",
    "comment",
    "processing-instruction",
    "message",
    "fallback",
    "*",
];

const TOP_LEVEL: &[&str] = &[
    "import",
    "include",
    "output",
    "strip-space",
    "preserve-space",
    "template",
    "variable",
    "param",
];

pub static ELEMENTS: &[ElementDef] = &[
    ElementDef {
        local: "stylesheet",
        alias: Some("transform"),
        kind: ElementKind::Stylesheet,
        attributes: &[
            required("version", AttrType::Cdata),
            attr("id", AttrType::Id),
            attr("exclude-result-prefixes", AttrType::StringList),
            attr("extension-element-prefixes", AttrType::StringList),
        ],
        children: TOP_LEVEL,
    },
    ElementDef {
        local: "include",
        alias: None,
        kind: ElementKind::Include,
        attributes: &[required("href", AttrType::UriRef)],
        children: &[],
    },
    ElementDef {
        local: "import",
        alias: None,
        kind: ElementKind::Import,
        attributes: &[required("href", AttrType::UriRef)],
        children: &[],
    },
    ElementDef {
        local: "output",
        alias: None,
        kind: ElementKind::Output,
        attributes: &[
            attr("method", AttrType::Enum(&["xml", "text"])),
            attr("indent", AttrType::YesNo),
            attr("omit-xml-declaration", AttrType::YesNo),
        ],
        children: &[],
    },
    ElementDef {
        local: "strip-space",
        alias: None,
        kind: ElementKind::StripSpace,
        attributes: &[required("elements", AttrType::SimplePatterns)],
        children: &[],
    },
    ElementDef {
        local: "preserve-space",
        alias: None,
        kind: ElementKind::PreserveSpace,
        attributes: &[required("elements", AttrType::SimplePatterns)],
        children: &[],
    },
    ElementDef {
        local: "template",
        alias: None,
        kind: ElementKind::Template,
        attributes: &[
            attr("match", AttrType::Pattern),
            attr("name", AttrType::QName),
            attr("mode", AttrType::QName),
            attr("priority", AttrType::Priority),
        ],
        children: &[
            "param",
            "apply-templates",
            "call-template",
            "if",
            "choose",
            "for-each",
            "value-of",
            "copy",
            "copy-of",
            "text",
            "variable",
            "element",
            "attribute",
            "comment",
            "processing-instruction",
            "message",
            "fallback",
            "*",
        ],
    },
    ElementDef {
        local: "apply-templates",
        alias: None,
        kind: ElementKind::ApplyTemplates,
        attributes: &[attr("select", AttrType::Expression), attr("mode", AttrType::QName)],
        children: &["sort", "with-param"],
    },
    ElementDef {
        local: "call-template",
        alias: None,
        kind: ElementKind::CallTemplate,
        attributes: &[required("name", AttrType::QName)],
        children: &["with-param"],
    },
    ElementDef {
        local: "with-param",
        alias: None,
        kind: ElementKind::WithParam,
        attributes: &[
            required("name", AttrType::QName),
            attr("select", AttrType::Expression),
        ],
        children: INSTRUCTIONS,
    },
    ElementDef {
        local: "if",
        alias: None,
        kind: ElementKind::If,
        attributes: &[required("test", AttrType::Expression)],
        children: INSTRUCTIONS,
    },
    ElementDef {
        local: "choose",
        alias: None,
        kind: ElementKind::Choose,
        attributes: &[],
        children: &["when", "otherwise"],
    },
    ElementDef {
        local: "when",
        alias: None,
        kind: ElementKind::When,
        attributes: &[required("test", AttrType::Expression)],
        children: INSTRUCTIONS,
    },
    ElementDef {
        local: "otherwise",
        alias: None,
        kind: ElementKind::Otherwise,
        attributes: &[],
        children: INSTRUCTIONS,
    },
    ElementDef {
        local: "for-each",
        alias: None,
        kind: ElementKind::ForEach,
        attributes: &[required("select", AttrType::Expression)],
        children: &[
            "sort",
            "apply-templates",
            "call-template",
            "if",
            "choose",
            "for-each",
            "value-of",
            "copy",
            "copy-of",
            "text",
            "variable",
            "element",
            "attribute",
            "comment",
            "processing-instruction",
            "message",
            "fallback",
            "*",
        ],
    },
    ElementDef {
        local: "sort",
        alias: None,
        kind: ElementKind::Sort,
        attributes: &[
            attr("select", AttrType::Expression),
            attr("data-type", AttrType::Enum(&["text", "number"])),
            attr("order", AttrType::Enum(&["ascending", "descending"])),
        ],
        children: &[],
    },
    ElementDef {
        local: "value-of",
        alias: None,
        kind: ElementKind::ValueOf,
        attributes: &[required("select", AttrType::Expression)],
        children: &[],
    },
    ElementDef {
        local: "copy-of",
        alias: None,
        kind: ElementKind::CopyOf,
        attributes: &[required("select", AttrType::Expression)],
        children: &[],
    },
    ElementDef {
        local: "copy",
        alias: None,
        kind: ElementKind::Copy,
        attributes: &[],
        children: INSTRUCTIONS,
    },
    ElementDef {
        local: "text",
        alias: None,
        kind: ElementKind::Text,
        attributes: &[attr("disable-output-escaping", AttrType::YesNo)],
        children: &[],
    },
    ElementDef {
        local: "variable",
        alias: None,
        kind: ElementKind::Variable,
        attributes: &[
            required("name", AttrType::QName),
            attr("select", AttrType::Expression),
        ],
        children: INSTRUCTIONS,
    },
    ElementDef {
        local: "param",
        alias: None,
        kind: ElementKind::Param,
        attributes: &[
            required("name", AttrType::QName),
            attr("select", AttrType::Expression),
        ],
        children: INSTRUCTIONS,
    },
    ElementDef {
        local: "element",
        alias: None,
        kind: ElementKind::Element,
        attributes: &[
            required("name", AttrType::Avt),
            attr("namespace", AttrType::Avt),
        ],
        children: INSTRUCTIONS,
    },
    ElementDef {
        local: "attribute",
        alias: None,
        kind: ElementKind::Attribute,
        attributes: &[
            required("name", AttrType::Avt),
            attr("namespace", AttrType::Avt),
        ],
        children: INSTRUCTIONS,
    },
    ElementDef {
        local: "comment",
        alias: None,
        kind: ElementKind::Comment,
        attributes: &[],
        children: INSTRUCTIONS,
    },
    ElementDef {
        local: "processing-instruction",
        alias: None,
        kind: ElementKind::ProcessingInstruction,
        attributes: &[required("name", AttrType::Avt)],
        children: INSTRUCTIONS,
    },
    ElementDef {
        local: "message",
        alias: None,
        kind: ElementKind::Message,
        attributes: &[attr("terminate", AttrType::YesNo)],
        children: INSTRUCTIONS,
    },
    ElementDef {
        local: "fallback",
        alias: None,
        kind: ElementKind::Fallback,
        attributes: &[],
        children: INSTRUCTIONS,
    },
];

/// The wildcard entry returned for any element outside the stylesheet
/// namespace; every attribute on it is an attribute value template.
pub static LITERAL_RESULT: ElementDef = ElementDef {
    local: "*",
    alias: None,
    kind: ElementKind::LiteralResult,
    attributes: &[],
    children: INSTRUCTIONS,
};

/// The synthesized catch-all definition for attributes in a foreign
/// namespace: character data, never required, never consulted.
pub static FOREIGN_ATTR: AttrDef = AttrDef {
    name: "*",
    attr_type: AttrType::Cdata,
    required: false,
};

/// Resolves `(namespace, local)` to its element definition. An exact match
/// in the stylesheet namespace wins; anything outside that namespace falls
/// through to the wildcard literal-result entry.
pub fn element_def(namespace: Option<&str>, local: &str) -> Option<&'static ElementDef> {
    if namespace == Some(XSLT_NS) {
        ELEMENTS
            .iter()
            .find(|d| d.local == local || d.alias == Some(local))
    } else {
        Some(&LITERAL_RESULT)
    }
}

/// Resolves an attribute on `def`. Prefixed attributes are in a foreign
/// namespace and get the synthesized pass-through definition.
pub fn attribute_def(def: &'static ElementDef, name: &str) -> Option<&'static AttrDef> {
    if name.contains(':') {
        return Some(&FOREIGN_ATTR);
    }
    def.attributes.iter().find(|a| a.name == name)
}

/// Whether `child_local` (or a literal result element, when outside the
/// stylesheet namespace) may nest directly inside `parent`.
pub fn allows_child(parent: &ElementDef, child: &ElementDef) -> bool {
    if child.kind == ElementKind::LiteralResult {
        return parent.children.contains(&"*");
    }
    parent.children.contains(&child.local)
}
