//! Parsing and evaluation of `match` patterns.
//!
//! Patterns reuse the expression crate's node-test grammar but are
//! evaluated in match mode: instead of selecting nodes, a pattern is tested
//! against one node position by walking its ancestry right-to-left.

use crate::error::XsltError;
use nom::IResult;
use nom::Parser;
use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete::{char, multispace0};
use nom::combinator::opt;
use nom::multi::{many0, separated_list1};
use nom::sequence::delimited;
use salix_xpath::ast::{Expression, KindTest, NodeTest};
use salix_xpath::datasource::{DataSourceNode, NodeType};
use salix_xpath::engine::{EvaluationContext, XPathValue, evaluate};
use salix_xpath::parser as xpath_parser;
use std::collections::HashMap;
use std::fmt;

/// A compiled match pattern: a union of one or more path alternatives.
///
/// Each alternative participates in rule dispatch as a separate rule with
/// its own default priority.
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    pub alternatives: Vec<PathPattern>,
    text: String,
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

/// One path alternative, e.g. `/doc/item` or `chapter//para[1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct PathPattern {
    pub is_absolute: bool,
    pub steps: Vec<PatternStep>,
}

/// How a step relates to the one on its left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Separator {
    /// `/`: the left step must match the parent.
    Direct,
    /// `//`: the left step must match some ancestor.
    Ancestor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternAxis {
    Child,
    Attribute,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatternStep {
    /// Relation to the preceding step; for the first step of an absolute
    /// path, the relation to the root.
    pub separator: Separator,
    pub axis: PatternAxis,
    pub node_test: NodeTest,
    pub predicates: Vec<Expression>,
}

impl Pattern {
    pub fn parse(text: &str) -> Result<Pattern, XsltError> {
        match pattern_parser(text.trim()) {
            Ok(("", alternatives)) => Ok(Pattern {
                alternatives,
                text: text.to_string(),
            }),
            Ok((rem, _)) => Err(XsltError::Compilation(format!(
                "unconsumed input '{}' in pattern '{}'",
                rem, text
            ))),
            Err(e) => Err(XsltError::Compilation(format!(
                "cannot parse pattern '{}': {}",
                text, e
            ))),
        }
    }

    pub fn matches<'a, N: DataSourceNode<'a>>(&self, node: N, root: N) -> bool {
        self.alternatives.iter().any(|p| p.matches(node, root))
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

impl PathPattern {
    /// The computed priority used when the template carries no explicit one.
    ///
    /// A single name test is 0, a wildcard name -0.25, a bare kind test
    /// -0.5; anything more specific (multiple steps, predicates, an
    /// attribute axis with a name) counts as 0.5.
    pub fn default_priority(&self) -> f64 {
        if self.is_absolute && self.steps.is_empty() {
            return -0.5;
        }
        if self.steps.len() != 1 || self.is_absolute {
            return 0.5;
        }
        let step = &self.steps[0];
        if !step.predicates.is_empty() {
            return 0.5;
        }
        match &step.node_test {
            NodeTest::Name { .. } => 0.0,
            NodeTest::Wildcard | NodeTest::PrefixWildcard(_) => -0.25,
            NodeTest::Kind(_) => -0.5,
        }
    }

    pub fn matches<'a, N: DataSourceNode<'a>>(&self, node: N, root: N) -> bool {
        if self.steps.is_empty() {
            // The pattern "/" matches only the root.
            return self.is_absolute && node == root;
        }
        self.matches_from(self.steps.len() - 1, node, root)
    }

    fn matches_from<'a, N: DataSourceNode<'a>>(&self, idx: usize, node: N, root: N) -> bool {
        let step = &self.steps[idx];
        if !step.matches_node(node, root) {
            return false;
        }
        if idx == 0 {
            if !self.is_absolute {
                return true;
            }
            // Anchored: the first step must sit directly under the root
            // (or anywhere below it, for a leading `//`).
            return match step.separator {
                Separator::Direct => node.parent() == Some(root),
                Separator::Ancestor => true,
            };
        }
        match step.separator {
            Separator::Direct => node
                .parent()
                .is_some_and(|p| self.matches_from(idx - 1, p, root)),
            Separator::Ancestor => {
                let mut current = node.parent();
                while let Some(p) = current {
                    if self.matches_from(idx - 1, p, root) {
                        return true;
                    }
                    current = p.parent();
                }
                false
            }
        }
    }
}

impl PatternStep {
    fn matches_node<'a, N: DataSourceNode<'a>>(&self, node: N, root: N) -> bool {
        let node_type = node.node_type();
        match self.axis {
            PatternAxis::Attribute => {
                if node_type != NodeType::Attribute {
                    return false;
                }
            }
            PatternAxis::Child => {
                if node_type == NodeType::Attribute {
                    return false;
                }
            }
        }

        let axis = match self.axis {
            PatternAxis::Attribute => salix_xpath::ast::Axis::Attribute,
            PatternAxis::Child => salix_xpath::ast::Axis::Child,
        };
        if !salix_xpath::engine::matches_node_test(&node, axis, &self.node_test) {
            return false;
        }

        if self.predicates.is_empty() {
            return true;
        }
        self.predicates_hold(node, root)
    }

    /// Predicates in match mode: position is the node's 1-based index among
    /// like-named siblings, size the count of those siblings.
    fn predicates_hold<'a, N: DataSourceNode<'a>>(&self, node: N, root: N) -> bool {
        let axis = match self.axis {
            PatternAxis::Attribute => salix_xpath::ast::Axis::Attribute,
            PatternAxis::Child => salix_xpath::ast::Axis::Child,
        };
        let siblings: Vec<N> = match node.parent() {
            Some(parent) => {
                let pool: Box<dyn Iterator<Item = N>> = match self.axis {
                    PatternAxis::Attribute => parent.attributes(),
                    PatternAxis::Child => parent.children(),
                };
                pool.filter(|n| salix_xpath::engine::matches_node_test(n, axis, &self.node_test))
                    .collect()
            }
            None => vec![node],
        };
        let position = siblings.iter().position(|n| *n == node).map(|i| i + 1);
        let Some(position) = position else {
            return false;
        };

        let variables = HashMap::new();
        let ctx = EvaluationContext {
            context_node: node,
            root_node: root,
            position,
            size: siblings.len(),
            variables: &variables,
        };
        self.predicates.iter().all(|predicate| {
            match evaluate(predicate, &ctx) {
                Ok(XPathValue::Number(n)) => n == position as f64,
                Ok(other) => other.boolean(),
                Err(_) => false,
            }
        })
    }
}

// --- Parser ---

fn pattern_parser(input: &str) -> IResult<&str, Vec<PathPattern>> {
    separated_list1(
        delimited(multispace0, tag("|"), multispace0),
        path_parser,
    )
    .parse(input)
}

fn path_parser(input: &str) -> IResult<&str, PathPattern> {
    let (remaining, leading) = opt(alt((tag("//"), tag("/")))).parse(input)?;
    let is_absolute = leading.is_some();
    let first_separator = match leading {
        Some("//") => Separator::Ancestor,
        _ => Separator::Direct,
    };

    let mut steps = Vec::new();
    let mut rest = remaining;
    if let Ok((after, mut step)) = step_parser(rest) {
        step.separator = first_separator;
        steps.push(step);
        rest = after;
        loop {
            let sep: IResult<&str, &str> = alt((tag("//"), tag("/"))).parse(rest);
            match sep {
                Ok((after_sep, sep_text)) => {
                    let (after_step, mut step) = step_parser(after_sep)?;
                    step.separator = if sep_text == "//" {
                        Separator::Ancestor
                    } else {
                        Separator::Direct
                    };
                    steps.push(step);
                    rest = after_step;
                }
                Err(_) => break,
            }
        }
    } else if !is_absolute {
        // A relative pattern must have at least one step.
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Many1,
        )));
    }

    Ok((rest, PathPattern { is_absolute, steps }))
}

fn step_parser(input: &str) -> IResult<&str, PatternStep> {
    let (rest, at) = opt(char('@')).parse(input)?;
    let (rest, node_test) = xpath_parser::node_test(rest)?;
    let (rest, predicates) = many0(delimited(
        delimited(multispace0, char('['), multispace0),
        xpath_parser::expr,
        delimited(multispace0, char(']'), multispace0),
    ))
    .parse(rest)?;
    Ok((
        rest,
        PatternStep {
            separator: Separator::Direct,
            axis: if at.is_some() {
                PatternAxis::Attribute
            } else {
                PatternAxis::Child
            },
            node_test,
            predicates,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use salix_xpath::tests::{MockTree, sample_tree};

    fn node(tree: &MockTree, id: usize) -> salix_xpath::tests::MockNode<'_> {
        tree.node(id)
    }

    #[test]
    fn parses_common_patterns() {
        assert!(Pattern::parse("item").is_ok());
        assert!(Pattern::parse("order/item").is_ok());
        assert!(Pattern::parse("/").is_ok());
        assert!(Pattern::parse("/*").is_ok());
        assert!(Pattern::parse("//item").is_ok());
        assert!(Pattern::parse("item|note").is_ok());
        assert!(Pattern::parse("text()").is_ok());
        assert!(Pattern::parse("@status").is_ok());
        assert!(Pattern::parse("item[2]").is_ok());
        assert!(Pattern::parse("order//text()").is_ok());
        assert!(Pattern::parse("item[@status = 'open']").is_ok());
    }

    #[test]
    fn rejects_garbage() {
        assert!(Pattern::parse("").is_err());
        assert!(Pattern::parse("item|").is_err());
    }

    #[test]
    fn name_test_matches() {
        let tree = sample_tree();
        let p = Pattern::parse("item").unwrap();
        assert!(p.matches(node(&tree, 3), node(&tree, 0)));
        assert!(!p.matches(node(&tree, 7), node(&tree, 0)));
        assert!(!p.matches(node(&tree, 0), node(&tree, 0)));
    }

    #[test]
    fn path_context_matters() {
        let tree = sample_tree();
        let p = Pattern::parse("order/item").unwrap();
        assert!(p.matches(node(&tree, 3), node(&tree, 0)));

        let p = Pattern::parse("note/item").unwrap();
        assert!(!p.matches(node(&tree, 3), node(&tree, 0)));
    }

    #[test]
    fn absolute_patterns_anchor_to_root() {
        let tree = sample_tree();
        let root = node(&tree, 0);

        let p = Pattern::parse("/").unwrap();
        assert!(p.matches(root, root));
        assert!(!p.matches(node(&tree, 1), root));

        let p = Pattern::parse("/order").unwrap();
        assert!(p.matches(node(&tree, 1), root));

        let p = Pattern::parse("/item").unwrap();
        assert!(!p.matches(node(&tree, 3), root));
    }

    #[test]
    fn ancestor_separator_skips_levels() {
        let tree = sample_tree();
        let root = node(&tree, 0);

        let p = Pattern::parse("//text()").unwrap();
        assert!(p.matches(node(&tree, 4), root));

        let p = Pattern::parse("order//text()").unwrap();
        assert!(p.matches(node(&tree, 4), root));

        let p = Pattern::parse("note//text()").unwrap();
        assert!(!p.matches(node(&tree, 4), root));
    }

    #[test]
    fn attribute_axis() {
        let tree = sample_tree();
        let root = node(&tree, 0);
        let p = Pattern::parse("@status").unwrap();
        assert!(p.matches(node(&tree, 2), root));
        assert!(!p.matches(node(&tree, 1), root));

        let p = Pattern::parse("order/@status").unwrap();
        assert!(p.matches(node(&tree, 2), root));
    }

    #[test]
    fn union_matches_any_alternative() {
        let tree = sample_tree();
        let root = node(&tree, 0);
        let p = Pattern::parse("missing|item").unwrap();
        assert!(p.matches(node(&tree, 3), root));
        assert_eq!(p.alternatives.len(), 2);
    }

    #[test]
    fn positional_predicate_in_match_mode() {
        let tree = sample_tree();
        let root = node(&tree, 0);
        let p = Pattern::parse("item[2]").unwrap();
        assert!(!p.matches(node(&tree, 3), root));
        assert!(p.matches(node(&tree, 5), root));

        let p = Pattern::parse("item[position() = 1]").unwrap();
        assert!(p.matches(node(&tree, 3), root));
        assert!(!p.matches(node(&tree, 5), root));
    }

    #[test]
    fn default_priorities() {
        let prio = |text: &str| {
            Pattern::parse(text).unwrap().alternatives[0].default_priority()
        };
        assert_eq!(prio("item"), 0.0);
        assert_eq!(prio("svg:rect"), 0.0);
        assert_eq!(prio("*"), -0.25);
        assert_eq!(prio("svg:*"), -0.25);
        assert_eq!(prio("text()"), -0.5);
        assert_eq!(prio("node()"), -0.5);
        assert_eq!(prio("/"), -0.5);
        assert_eq!(prio("order/item"), 0.5);
        assert_eq!(prio("item[1]"), 0.5);
    }
}
