//! Expression evaluation against a [`DataSourceNode`] tree.

use crate::ast::{Axis, BinaryOperator, Expression, KindTest, LocationPath, NodeTest, Step};
use crate::datasource::{DataSourceNode, NodeType};
use crate::error::XPathError;
use std::collections::HashMap;

/// The result of evaluating an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum XPathValue<N> {
    /// Nodes in document order, without duplicates.
    NodeSet(Vec<N>),
    Boolean(bool),
    Number(f64),
    String(String),
}

impl<'a, N: DataSourceNode<'a>> XPathValue<N> {
    pub fn boolean(&self) -> bool {
        match self {
            XPathValue::NodeSet(nodes) => !nodes.is_empty(),
            XPathValue::Boolean(b) => *b,
            XPathValue::Number(n) => *n != 0.0 && !n.is_nan(),
            XPathValue::String(s) => !s.is_empty(),
        }
    }

    pub fn number(&self) -> f64 {
        match self {
            XPathValue::NodeSet(_) => string_to_number(&self.string()),
            XPathValue::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            XPathValue::Number(n) => *n,
            XPathValue::String(s) => string_to_number(s),
        }
    }

    /// `string()` conversion; for node-sets, the string value of the first
    /// node in document order.
    pub fn string(&self) -> String {
        match self {
            XPathValue::NodeSet(nodes) => nodes
                .first()
                .map(|n| n.string_value())
                .unwrap_or_default(),
            XPathValue::Boolean(b) => b.to_string(),
            XPathValue::Number(n) => number_to_string(*n),
            XPathValue::String(s) => s.clone(),
        }
    }
}

fn string_to_number(s: &str) -> f64 {
    s.trim().parse::<f64>().unwrap_or(f64::NAN)
}

fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n == n.trunc() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// The dynamic context an expression is evaluated in.
#[derive(Debug)]
pub struct EvaluationContext<'v, N> {
    pub context_node: N,
    pub root_node: N,
    /// 1-based position of the context node in the current node list.
    pub position: usize,
    pub size: usize,
    pub variables: &'v HashMap<String, XPathValue<N>>,
}

impl<N: Copy> Clone for EvaluationContext<'_, N> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<N: Copy> Copy for EvaluationContext<'_, N> {}

pub fn evaluate<'a, N: DataSourceNode<'a>>(
    expr: &Expression,
    ctx: &EvaluationContext<'_, N>,
) -> Result<XPathValue<N>, XPathError> {
    match expr {
        Expression::Literal(s) => Ok(XPathValue::String(s.clone())),
        Expression::Number(n) => Ok(XPathValue::Number(*n)),
        Expression::Variable(name) => ctx
            .variables
            .get(name)
            .cloned()
            .ok_or_else(|| XPathError::Type(format!("unbound variable '${}'", name))),
        Expression::LocationPath(path) => {
            Ok(XPathValue::NodeSet(evaluate_path(path, ctx)?))
        }
        Expression::FunctionCall { name, args } => call_function(name, args, ctx),
        Expression::BinaryOp { left, op, right } => {
            let l = evaluate(left, ctx)?;
            match op {
                BinaryOperator::Or => {
                    if l.boolean() {
                        return Ok(XPathValue::Boolean(true));
                    }
                    Ok(XPathValue::Boolean(evaluate(right, ctx)?.boolean()))
                }
                BinaryOperator::And => {
                    if !l.boolean() {
                        return Ok(XPathValue::Boolean(false));
                    }
                    Ok(XPathValue::Boolean(evaluate(right, ctx)?.boolean()))
                }
                _ => {
                    let r = evaluate(right, ctx)?;
                    apply_binary(*op, &l, &r)
                }
            }
        }
        Expression::Negate(inner) => {
            Ok(XPathValue::Number(-evaluate(inner, ctx)?.number()))
        }
    }
}

// --- Location paths ---

pub fn evaluate_path<'a, N: DataSourceNode<'a>>(
    path: &LocationPath,
    ctx: &EvaluationContext<'_, N>,
) -> Result<Vec<N>, XPathError> {
    let mut current: Vec<N> = match &path.start_point {
        Some(start) => match evaluate(start, ctx)? {
            XPathValue::NodeSet(nodes) => nodes,
            other => {
                return Err(XPathError::Type(format!(
                    "path start must be a node-set, got {}",
                    value_kind(&other)
                )));
            }
        },
        None if path.is_absolute => vec![ctx.root_node],
        None => vec![ctx.context_node],
    };

    for step in &path.steps {
        current = apply_step(step, &current, ctx)?;
    }
    Ok(current)
}

fn apply_step<'a, N: DataSourceNode<'a>>(
    step: &Step,
    input: &[N],
    ctx: &EvaluationContext<'_, N>,
) -> Result<Vec<N>, XPathError> {
    let mut out: Vec<N> = Vec::new();
    for origin in input {
        let candidates: Vec<N> = axis_nodes(*origin, step.axis)
            .into_iter()
            .filter(|n| matches_node_test(n, step.axis, &step.node_test))
            .collect();
        let filtered = apply_predicates(&candidates, &step.predicates, ctx)?;
        for node in filtered {
            if !out.contains(&node) {
                out.push(node);
            }
        }
    }
    Ok(out)
}

fn axis_nodes<'a, N: DataSourceNode<'a>>(origin: N, axis: Axis) -> Vec<N> {
    match axis {
        Axis::Child => origin.children().collect(),
        Axis::Attribute => origin.attributes().collect(),
        Axis::Parent => origin.parent().into_iter().collect(),
        Axis::SelfAxis => vec![origin],
        Axis::Descendant => {
            let mut out = Vec::new();
            collect_descendants(origin, &mut out);
            out
        }
        Axis::DescendantOrSelf => {
            let mut out = vec![origin];
            collect_descendants(origin, &mut out);
            out
        }
    }
}

fn collect_descendants<'a, N: DataSourceNode<'a>>(node: N, out: &mut Vec<N>) {
    for child in node.children() {
        out.push(child);
        collect_descendants(child, out);
    }
}

pub fn matches_node_test<'a, N: DataSourceNode<'a>>(
    node: &N,
    axis: Axis,
    test: &NodeTest,
) -> bool {
    let principal = if axis == Axis::Attribute {
        NodeType::Attribute
    } else {
        NodeType::Element
    };
    match test {
        NodeTest::Kind(KindTest::Node) => true,
        NodeTest::Kind(KindTest::Text) => node.node_type() == NodeType::Text,
        NodeTest::Kind(KindTest::Comment) => node.node_type() == NodeType::Comment,
        NodeTest::Kind(KindTest::ProcessingInstruction) => {
            node.node_type() == NodeType::ProcessingInstruction
        }
        NodeTest::Wildcard => node.node_type() == principal,
        NodeTest::PrefixWildcard(prefix) => {
            node.node_type() == principal
                && node.name().is_some_and(|q| q.prefix == Some(prefix.as_str()))
        }
        NodeTest::Name { prefix, local } => {
            node.node_type() == principal
                && node.name().is_some_and(|q| {
                    q.local_part == local && q.prefix == prefix.as_deref()
                })
        }
    }
}

/// Applies each predicate in turn; a numeric predicate is a position test,
/// anything else is a boolean filter. Positions are 1-based within the
/// candidate list produced by the previous predicate.
pub fn apply_predicates<'a, N: DataSourceNode<'a>>(
    candidates: &[N],
    predicates: &[Expression],
    ctx: &EvaluationContext<'_, N>,
) -> Result<Vec<N>, XPathError> {
    let mut current: Vec<N> = candidates.to_vec();
    for predicate in predicates {
        let size = current.len();
        let mut kept = Vec::new();
        for (idx, node) in current.iter().enumerate() {
            let inner = EvaluationContext {
                context_node: *node,
                root_node: ctx.root_node,
                position: idx + 1,
                size,
                variables: ctx.variables,
            };
            let value = evaluate(predicate, &inner)?;
            let keep = match value {
                XPathValue::Number(n) => n == (idx + 1) as f64,
                other => other.boolean(),
            };
            if keep {
                kept.push(*node);
            }
        }
        current = kept;
    }
    Ok(current)
}

// --- Operators ---

fn value_kind<'a, N: DataSourceNode<'a>>(v: &XPathValue<N>) -> &'static str {
    match v {
        XPathValue::NodeSet(_) => "node-set",
        XPathValue::Boolean(_) => "boolean",
        XPathValue::Number(_) => "number",
        XPathValue::String(_) => "string",
    }
}

fn apply_binary<'a, N: DataSourceNode<'a>>(
    op: BinaryOperator,
    left: &XPathValue<N>,
    right: &XPathValue<N>,
) -> Result<XPathValue<N>, XPathError> {
    match op {
        BinaryOperator::Equals => Ok(XPathValue::Boolean(compare_eq(left, right))),
        BinaryOperator::NotEquals => Ok(XPathValue::Boolean(!compare_eq(left, right))),
        BinaryOperator::LessThan => Ok(XPathValue::Boolean(compare_rel(left, right, |a, b| a < b))),
        BinaryOperator::LessThanOrEqual => {
            Ok(XPathValue::Boolean(compare_rel(left, right, |a, b| a <= b)))
        }
        BinaryOperator::GreaterThan => {
            Ok(XPathValue::Boolean(compare_rel(left, right, |a, b| a > b)))
        }
        BinaryOperator::GreaterThanOrEqual => {
            Ok(XPathValue::Boolean(compare_rel(left, right, |a, b| a >= b)))
        }
        BinaryOperator::Plus => Ok(XPathValue::Number(left.number() + right.number())),
        BinaryOperator::Minus => Ok(XPathValue::Number(left.number() - right.number())),
        BinaryOperator::Div => Ok(XPathValue::Number(left.number() / right.number())),
        BinaryOperator::Mod => Ok(XPathValue::Number(left.number() % right.number())),
        BinaryOperator::Or | BinaryOperator::And => {
            unreachable!("short-circuit operators are handled in evaluate()")
        }
    }
}

/// Equality with node-set existential semantics: a node-set compares equal
/// if any of its nodes' string values does.
fn compare_eq<'a, N: DataSourceNode<'a>>(
    left: &XPathValue<N>,
    right: &XPathValue<N>,
) -> bool {
    match (left, right) {
        (XPathValue::Boolean(_), _) | (_, XPathValue::Boolean(_)) => {
            left.boolean() == right.boolean()
        }
        (XPathValue::NodeSet(a), XPathValue::NodeSet(b)) => {
            let values: Vec<String> = b.iter().map(|n| n.string_value()).collect();
            a.iter().any(|n| values.contains(&n.string_value()))
        }
        (XPathValue::NodeSet(nodes), other) | (other, XPathValue::NodeSet(nodes)) => {
            nodes.iter().any(|n| match other {
                XPathValue::Number(v) => string_to_number(&n.string_value()) == *v,
                _ => n.string_value() == other.string(),
            })
        }
        (XPathValue::Number(_), _) | (_, XPathValue::Number(_)) => left.number() == right.number(),
        _ => left.string() == right.string(),
    }
}

fn compare_rel<'a, N: DataSourceNode<'a>>(
    left: &XPathValue<N>,
    right: &XPathValue<N>,
    cmp: fn(f64, f64) -> bool,
) -> bool {
    match (left, right) {
        (XPathValue::NodeSet(nodes), other) => nodes
            .iter()
            .any(|n| cmp(string_to_number(&n.string_value()), other.number())),
        (other, XPathValue::NodeSet(nodes)) => nodes
            .iter()
            .any(|n| cmp(other.number(), string_to_number(&n.string_value()))),
        _ => cmp(left.number(), right.number()),
    }
}

// --- Core function library ---

fn call_function<'a, N: DataSourceNode<'a>>(
    name: &str,
    args: &[Expression],
    ctx: &EvaluationContext<'_, N>,
) -> Result<XPathValue<N>, XPathError> {
    let mut values = Vec::with_capacity(args.len());
    for arg in args {
        values.push(evaluate(arg, ctx)?);
    }

    let arity = |expected: usize| -> Result<(), XPathError> {
        if values.len() == expected {
            Ok(())
        } else {
            Err(XPathError::Function {
                function: name.to_string(),
                message: format!("expected {} argument(s), got {}", expected, values.len()),
            })
        }
    };

    match name {
        "position" => {
            arity(0)?;
            Ok(XPathValue::Number(ctx.position as f64))
        }
        "last" => {
            arity(0)?;
            Ok(XPathValue::Number(ctx.size as f64))
        }
        "count" => {
            arity(1)?;
            match &values[0] {
                XPathValue::NodeSet(nodes) => Ok(XPathValue::Number(nodes.len() as f64)),
                other => Err(XPathError::Function {
                    function: name.to_string(),
                    message: format!("expected a node-set, got {}", value_kind(other)),
                }),
            }
        }
        "not" => {
            arity(1)?;
            Ok(XPathValue::Boolean(!values[0].boolean()))
        }
        "true" => {
            arity(0)?;
            Ok(XPathValue::Boolean(true))
        }
        "false" => {
            arity(0)?;
            Ok(XPathValue::Boolean(false))
        }
        "boolean" => {
            arity(1)?;
            Ok(XPathValue::Boolean(values[0].boolean()))
        }
        "number" => {
            if values.is_empty() {
                return Ok(XPathValue::Number(string_to_number(
                    &ctx.context_node.string_value(),
                )));
            }
            arity(1)?;
            Ok(XPathValue::Number(values[0].number()))
        }
        "string" => {
            if values.is_empty() {
                return Ok(XPathValue::String(ctx.context_node.string_value()));
            }
            arity(1)?;
            Ok(XPathValue::String(values[0].string()))
        }
        "concat" => {
            if values.len() < 2 {
                return Err(XPathError::Function {
                    function: name.to_string(),
                    message: "expected at least 2 arguments".to_string(),
                });
            }
            Ok(XPathValue::String(
                values.iter().map(|v| v.string()).collect(),
            ))
        }
        "starts-with" => {
            arity(2)?;
            Ok(XPathValue::Boolean(
                values[0].string().starts_with(&values[1].string()),
            ))
        }
        "contains" => {
            arity(2)?;
            Ok(XPathValue::Boolean(
                values[0].string().contains(&values[1].string()),
            ))
        }
        "normalize-space" => {
            let s = if values.is_empty() {
                ctx.context_node.string_value()
            } else {
                arity(1)?;
                values[0].string()
            };
            Ok(XPathValue::String(
                s.split_whitespace().collect::<Vec<_>>().join(" "),
            ))
        }
        "string-length" => {
            let s = if values.is_empty() {
                ctx.context_node.string_value()
            } else {
                arity(1)?;
                values[0].string()
            };
            Ok(XPathValue::Number(s.chars().count() as f64))
        }
        "name" | "local-name" => {
            let node = if values.is_empty() {
                Some(ctx.context_node)
            } else {
                arity(1)?;
                match &values[0] {
                    XPathValue::NodeSet(nodes) => nodes.first().copied(),
                    other => {
                        return Err(XPathError::Function {
                            function: name.to_string(),
                            message: format!("expected a node-set, got {}", value_kind(other)),
                        });
                    }
                }
            };
            let text = node
                .and_then(|n| n.name())
                .map(|q| {
                    if name == "name" {
                        match q.prefix {
                            Some(p) => format!("{}:{}", p, q.local_part),
                            None => q.local_part.to_string(),
                        }
                    } else {
                        q.local_part.to_string()
                    }
                })
                .unwrap_or_default();
            Ok(XPathValue::String(text))
        }
        _ => Err(XPathError::UnknownFunction(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::tests::{MockTree, sample_tree};
    use crate::parser::parse_expression;

    fn eval<'a>(
        tree: &'a MockTree,
        text: &str,
    ) -> XPathValue<crate::datasource::tests::MockNode<'a>> {
        let vars = HashMap::new();
        let ctx = EvaluationContext {
            context_node: tree.node(1),
            root_node: tree.node(0),
            position: 1,
            size: 1,
            variables: &vars,
        };
        let expr = parse_expression(text).unwrap();
        evaluate(&expr, &ctx).unwrap()
    }

    #[test]
    fn selects_children_by_name() {
        let tree = sample_tree();
        let XPathValue::NodeSet(nodes) = eval(&tree, "item") else {
            panic!("expected node-set");
        };
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].string_value(), "pen");
        assert_eq!(nodes[1].string_value(), "ink");
    }

    #[test]
    fn selects_absolute_and_descendant_paths() {
        let tree = sample_tree();
        let XPathValue::NodeSet(nodes) = eval(&tree, "/order/item") else {
            panic!("expected node-set");
        };
        assert_eq!(nodes.len(), 2);

        let XPathValue::NodeSet(nodes) = eval(&tree, "//item") else {
            panic!("expected node-set");
        };
        assert_eq!(nodes.len(), 2);
    }

    #[test]
    fn selects_attributes() {
        let tree = sample_tree();
        assert_eq!(eval(&tree, "@status").string(), "open");
        assert!(eval(&tree, "@status = 'open'").boolean());
        assert!(!eval(&tree, "@missing = 'open'").boolean());
    }

    #[test]
    fn positional_predicates() {
        let tree = sample_tree();
        assert_eq!(eval(&tree, "item[1]").string(), "pen");
        assert_eq!(eval(&tree, "item[2]").string(), "ink");
        assert_eq!(eval(&tree, "item[last()]").string(), "ink");
        assert_eq!(eval(&tree, "item[position() > 1]").string(), "ink");
    }

    #[test]
    fn boolean_predicates() {
        let tree = sample_tree();
        let XPathValue::NodeSet(nodes) = eval(&tree, "item[. = 'ink']") else {
            panic!("expected node-set");
        };
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].string_value(), "ink");
    }

    #[test]
    fn kind_tests() {
        let tree = sample_tree();
        let XPathValue::NodeSet(nodes) = eval(&tree, "comment()") else {
            panic!("expected node-set");
        };
        assert_eq!(nodes.len(), 1);

        let XPathValue::NodeSet(nodes) = eval(&tree, "item/text()") else {
            panic!("expected node-set");
        };
        assert_eq!(nodes.len(), 2);
    }

    #[test]
    fn core_functions() {
        let tree = sample_tree();
        assert_eq!(eval(&tree, "count(item)").number(), 2.0);
        assert!(eval(&tree, "not(note/text())").boolean());
        assert_eq!(eval(&tree, "concat('a', 'b', 'c')").string(), "abc");
        assert_eq!(eval(&tree, "normalize-space('  a   b ')").string(), "a b");
        assert_eq!(eval(&tree, "string-length('four')").number(), 4.0);
        assert!(eval(&tree, "starts-with(item, 'pe')").boolean());
        assert!(eval(&tree, "contains(item[2], 'nk')").boolean());
        assert_eq!(eval(&tree, "name(item)").string(), "item");
    }

    #[test]
    fn arithmetic_and_comparison() {
        let tree = sample_tree();
        assert_eq!(eval(&tree, "1 + 2").number(), 3.0);
        assert_eq!(eval(&tree, "7 mod 3").number(), 1.0);
        assert_eq!(eval(&tree, "10 div 4").number(), 2.5);
        assert_eq!(eval(&tree, "-(1 + 2)").number(), -3.0);
        assert!(eval(&tree, "count(item) = 2").boolean());
        assert!(eval(&tree, "count(item) >= 2 and count(note) = 1").boolean());
    }

    #[test]
    fn variables_bind_values_and_paths() {
        let tree = sample_tree();
        let mut vars: HashMap<String, XPathValue<_>> = HashMap::new();
        vars.insert("min".to_string(), XPathValue::Number(1.0));
        vars.insert(
            "scope".to_string(),
            XPathValue::NodeSet(vec![tree.node(1)]),
        );
        let ctx = EvaluationContext {
            context_node: tree.node(1),
            root_node: tree.node(0),
            position: 1,
            size: 1,
            variables: &vars,
        };
        let expr = parse_expression("count(item) > $min").unwrap();
        assert!(evaluate(&expr, &ctx).unwrap().boolean());

        let expr = parse_expression("$scope/item[1]").unwrap();
        assert_eq!(evaluate(&expr, &ctx).unwrap().string(), "pen");
    }

    #[test]
    fn unbound_variable_is_an_error() {
        let tree = sample_tree();
        let vars = HashMap::new();
        let ctx = EvaluationContext {
            context_node: tree.node(1),
            root_node: tree.node(0),
            position: 1,
            size: 1,
            variables: &vars,
        };
        let expr = parse_expression("$nope").unwrap();
        assert!(evaluate(&expr, &ctx).is_err());
    }

    #[test]
    fn parent_and_self_steps() {
        let tree = sample_tree();
        let vars = HashMap::new();
        let ctx = EvaluationContext {
            context_node: tree.node(3),
            root_node: tree.node(0),
            position: 1,
            size: 1,
            variables: &vars,
        };
        let expr = parse_expression("../note").unwrap();
        let XPathValue::NodeSet(nodes) = evaluate(&expr, &ctx).unwrap() else {
            panic!("expected node-set");
        };
        assert_eq!(nodes.len(), 1);

        let expr = parse_expression(". = 'pen'").unwrap();
        assert!(evaluate(&expr, &ctx).unwrap().boolean());
    }
}
