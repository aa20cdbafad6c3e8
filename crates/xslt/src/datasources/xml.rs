//! XML source documents backed by roxmltree.

use roxmltree::Node;
use salix_xpath::{DataSourceNode, NodeType, QName};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// A parsed source document. Borrows the input text for its whole life.
pub struct XmlDocument<'input> {
    doc: roxmltree::Document<'input>,
}

impl<'input> XmlDocument<'input> {
    pub fn parse(text: &'input str) -> Result<Self, roxmltree::Error> {
        Ok(XmlDocument {
            doc: roxmltree::Document::parse(text)?,
        })
    }

    pub fn root_node(&self) -> XmlNode<'_, 'input> {
        XmlNode::Tree(self.doc.root())
    }
}

/// A handle to one node of the source document.
///
/// roxmltree keeps attributes as element data rather than tree nodes, so the
/// attribute variant carries its owning element plus an index.
#[derive(Debug, Clone, Copy)]
pub enum XmlNode<'a, 'input> {
    Tree(Node<'a, 'input>),
    Attribute {
        parent: Node<'a, 'input>,
        index: usize,
    },
}

impl<'a, 'input> XmlNode<'a, 'input> {
    fn attr(&self) -> Option<roxmltree::Attribute<'a, 'input>> {
        match self {
            XmlNode::Attribute { parent, index } => parent.attributes().nth(*index),
            XmlNode::Tree(_) => None,
        }
    }
}

impl PartialEq for XmlNode<'_, '_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (XmlNode::Tree(a), XmlNode::Tree(b)) => a.id() == b.id(),
            (
                XmlNode::Attribute { parent: a, index: i },
                XmlNode::Attribute { parent: b, index: j },
            ) => a.id() == b.id() && i == j,
            _ => false,
        }
    }
}

impl Eq for XmlNode<'_, '_> {}

impl PartialOrd for XmlNode<'_, '_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for XmlNode<'_, '_> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Attributes sort right after their owning element.
        fn key(node: &XmlNode<'_, '_>) -> (usize, usize) {
            match node {
                XmlNode::Tree(n) => (n.id().get() as usize, 0),
                XmlNode::Attribute { parent, index } => (parent.id().get() as usize, index + 1),
            }
        }
        key(self).cmp(&key(other))
    }
}

impl Hash for XmlNode<'_, '_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            XmlNode::Tree(node) => {
                0u8.hash(state);
                node.id().hash(state);
            }
            XmlNode::Attribute { parent, index } => {
                1u8.hash(state);
                parent.id().hash(state);
                index.hash(state);
            }
        }
    }
}

impl<'a> DataSourceNode<'a> for XmlNode<'a, 'a> {
    fn node_type(&self) -> NodeType {
        match self {
            XmlNode::Tree(node) => {
                if node.is_root() {
                    NodeType::Root
                } else if node.is_text() {
                    NodeType::Text
                } else if node.is_comment() {
                    NodeType::Comment
                } else if node.is_pi() {
                    NodeType::ProcessingInstruction
                } else {
                    NodeType::Element
                }
            }
            XmlNode::Attribute { .. } => NodeType::Attribute,
        }
    }

    fn name(&self) -> Option<QName<'a>> {
        match self {
            XmlNode::Tree(node) => {
                if node.is_element() {
                    Some(QName {
                        // roxmltree resolves prefixes to URIs; the raw prefix
                        // is not part of the data model here.
                        prefix: None,
                        local_part: node.tag_name().name(),
                    })
                } else if node.is_pi() {
                    node.pi().map(|pi| QName {
                        prefix: None,
                        local_part: pi.target,
                    })
                } else {
                    None
                }
            }
            XmlNode::Attribute { .. } => self.attr().map(|attr| QName {
                prefix: None,
                local_part: attr.name(),
            }),
        }
    }

    fn namespace_uri(&self) -> Option<&'a str> {
        match self {
            XmlNode::Tree(node) if node.is_element() => node.tag_name().namespace(),
            XmlNode::Tree(_) => None,
            XmlNode::Attribute { .. } => self.attr().and_then(|attr| attr.namespace()),
        }
    }

    fn string_value(&self) -> String {
        match self {
            XmlNode::Tree(node) => {
                if node.is_element() || node.is_root() {
                    node.descendants()
                        .filter(|n| n.is_text())
                        .filter_map(|n| n.text())
                        .collect()
                } else {
                    node.text().unwrap_or("").to_string()
                }
            }
            XmlNode::Attribute { .. } => self
                .attr()
                .map(|attr| attr.value().to_string())
                .unwrap_or_default(),
        }
    }

    fn attributes(&self) -> Box<dyn Iterator<Item = Self> + 'a> {
        match self {
            XmlNode::Tree(node) => {
                let parent = *node;
                let count = node.attributes().len();
                Box::new((0..count).map(move |index| XmlNode::Attribute { parent, index }))
            }
            XmlNode::Attribute { .. } => Box::new(std::iter::empty()),
        }
    }

    fn children(&self) -> Box<dyn Iterator<Item = Self> + 'a> {
        match self {
            XmlNode::Tree(node) => Box::new(node.children().map(XmlNode::Tree)),
            XmlNode::Attribute { .. } => Box::new(std::iter::empty()),
        }
    }

    fn parent(&self) -> Option<Self> {
        match self {
            XmlNode::Tree(node) => node.parent().map(XmlNode::Tree),
            XmlNode::Attribute { parent, .. } => Some(XmlNode::Tree(*parent)),
        }
    }
}
