//! The navigation contract for a read-only source tree.
//!
//! Both the expression engine and the XSLT dispatcher are written against
//! this trait, so any handle-based tree (XML, virtual documents) can serve
//! as transformation input.

use std::hash::Hash;

/// A qualified name: optional prefix plus local part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QName<'a> {
    pub prefix: Option<&'a str>,
    pub local_part: &'a str,
}

/// Node kinds of the XPath 1.0 data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Root,
    Element,
    Attribute,
    Text,
    Comment,
    ProcessingInstruction,
}

/// A cheaply copyable handle to one node of a read-only tree.
///
/// `'a` is the lifetime of the underlying document.
pub trait DataSourceNode<'a>:
    std::fmt::Debug + Clone + Copy + PartialEq + Eq + Hash + PartialOrd + Ord
{
    fn node_type(&self) -> NodeType;

    /// The qualified name, or `None` for unnamed kinds (root, text, comment).
    fn name(&self) -> Option<QName<'a>>;

    /// Namespace URI of an element or attribute, if any.
    fn namespace_uri(&self) -> Option<&'a str>;

    /// The XPath `string()` value of the node.
    fn string_value(&self) -> String;

    fn attributes(&self) -> Box<dyn Iterator<Item = Self> + 'a>;

    fn children(&self) -> Box<dyn Iterator<Item = Self> + 'a>;

    fn parent(&self) -> Option<Self>;

    /// Convenience: the value of the named attribute, if present.
    fn attribute_value(&self, local: &str) -> Option<String> {
        self.attributes()
            .find(|a| a.name().is_some_and(|q| q.local_part == local))
            .map(|a| a.string_value())
    }
}

// Mock tree fixture, public so downstream crates can reuse it in their tests.
pub mod tests {
    use super::*;
    use std::cmp::Ordering;
    use std::hash::Hasher;

    #[derive(Debug, Clone)]
    pub struct MockNodeData {
        pub node_type: NodeType,
        pub name: Option<(&'static str, Option<&'static str>)>,
        pub value: &'static str,
        pub children: Vec<usize>,
        pub attributes: Vec<usize>,
        pub parent: Option<usize>,
    }

    /// An arena-backed tree; nodes are indices into `nodes`.
    #[derive(Debug, Default)]
    pub struct MockTree {
        pub nodes: Vec<MockNodeData>,
    }

    #[derive(Debug, Clone, Copy)]
    pub struct MockNode<'a> {
        pub id: usize,
        pub tree: &'a MockTree,
    }

    impl PartialEq for MockNode<'_> {
        fn eq(&self, other: &Self) -> bool {
            self.id == other.id
        }
    }
    impl Eq for MockNode<'_> {}
    impl PartialOrd for MockNode<'_> {
        fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
            Some(self.cmp(other))
        }
    }
    impl Ord for MockNode<'_> {
        fn cmp(&self, other: &Self) -> Ordering {
            self.id.cmp(&other.id)
        }
    }
    impl Hash for MockNode<'_> {
        fn hash<H: Hasher>(&self, state: &mut H) {
            self.id.hash(state);
        }
    }

    impl<'a> DataSourceNode<'a> for MockNode<'a> {
        fn node_type(&self) -> NodeType {
            self.tree.nodes[self.id].node_type
        }

        fn name(&self) -> Option<QName<'a>> {
            self.tree.nodes[self.id].name.map(|(local, prefix)| QName {
                prefix,
                local_part: local,
            })
        }

        fn namespace_uri(&self) -> Option<&'a str> {
            None
        }

        fn string_value(&self) -> String {
            let data = &self.tree.nodes[self.id];
            match data.node_type {
                NodeType::Element | NodeType::Root => {
                    let mut s = String::new();
                    collect_text(self.tree, self.id, &mut s);
                    s
                }
                _ => data.value.to_string(),
            }
        }

        fn attributes(&self) -> Box<dyn Iterator<Item = Self> + 'a> {
            let tree = self.tree;
            let ids = tree.nodes[self.id].attributes.clone();
            Box::new(ids.into_iter().map(move |id| MockNode { id, tree }))
        }

        fn children(&self) -> Box<dyn Iterator<Item = Self> + 'a> {
            let tree = self.tree;
            let ids = tree.nodes[self.id].children.clone();
            Box::new(ids.into_iter().map(move |id| MockNode { id, tree }))
        }

        fn parent(&self) -> Option<Self> {
            self.tree.nodes[self.id].parent.map(|id| MockNode {
                id,
                tree: self.tree,
            })
        }
    }

    fn collect_text(tree: &MockTree, id: usize, out: &mut String) {
        let data = &tree.nodes[id];
        if data.node_type == NodeType::Text {
            out.push_str(data.value);
        }
        for &child in &data.children {
            collect_text(tree, child, out);
        }
    }

    impl MockTree {
        pub fn node(&self, id: usize) -> MockNode<'_> {
            MockNode { id, tree: self }
        }
    }

    /// Builds the shared fixture tree:
    ///
    /// ```text
    /// (root)                       id 0
    ///   <order status="open">      id 1, attr id 2
    ///     <item>pen</item>         id 3, text id 4
    ///     <item>ink</item>         id 5, text id 6
    ///     <note/>                  id 7
    ///     <!-- audit -->           id 8
    ///   </order>
    /// ```
    pub fn sample_tree() -> MockTree {
        let mut tree = MockTree::default();
        let mut push = |data: MockNodeData| {
            tree.nodes.push(data);
            tree.nodes.len() - 1
        };

        push(MockNodeData {
            node_type: NodeType::Root,
            name: None,
            value: "",
            children: vec![1],
            attributes: vec![],
            parent: None,
        });
        push(MockNodeData {
            node_type: NodeType::Element,
            name: Some(("order", None)),
            value: "",
            children: vec![3, 5, 7, 8],
            attributes: vec![2],
            parent: Some(0),
        });
        push(MockNodeData {
            node_type: NodeType::Attribute,
            name: Some(("status", None)),
            value: "open",
            children: vec![],
            attributes: vec![],
            parent: Some(1),
        });
        push(MockNodeData {
            node_type: NodeType::Element,
            name: Some(("item", None)),
            value: "",
            children: vec![4],
            attributes: vec![],
            parent: Some(1),
        });
        push(MockNodeData {
            node_type: NodeType::Text,
            name: None,
            value: "pen",
            children: vec![],
            attributes: vec![],
            parent: Some(3),
        });
        push(MockNodeData {
            node_type: NodeType::Element,
            name: Some(("item", None)),
            value: "",
            children: vec![6],
            attributes: vec![],
            parent: Some(1),
        });
        push(MockNodeData {
            node_type: NodeType::Text,
            name: None,
            value: "ink",
            children: vec![],
            attributes: vec![],
            parent: Some(5),
        });
        push(MockNodeData {
            node_type: NodeType::Element,
            name: Some(("note", None)),
            value: "",
            children: vec![],
            attributes: vec![],
            parent: Some(1),
        });
        push(MockNodeData {
            node_type: NodeType::Comment,
            name: None,
            value: " audit ",
            children: vec![],
            attributes: vec![],
            parent: Some(1),
        });

        tree
    }
}
