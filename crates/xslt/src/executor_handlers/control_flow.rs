//! Conditional and iteration instructions, plus sort-key evaluation shared
//! with `apply-templates`.

use crate::ast::{SortDataType, SortKey, TemplateBody, When};
use crate::error::XsltError;
use crate::executor::TemplateExecutor;
use crate::output::EventSink;
use salix_xpath::engine::XPathValue;
use salix_xpath::{DataSourceNode, Expression};
use std::cmp::Ordering;

pub(crate) fn handle_if<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    test: &Expression,
    body: &TemplateBody,
    node: N,
    position: usize,
    size: usize,
    sink: &mut dyn EventSink,
) -> Result<(), XsltError> {
    if executor
        .evaluate_expression(test, node, position, size)?
        .boolean()
    {
        executor.execute_body(body, node, position, size, sink)?;
    }
    Ok(())
}

/// Runs the first `when` whose test holds, or the `otherwise` branch.
pub(crate) fn handle_choose<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    whens: &[When],
    otherwise: &Option<TemplateBody>,
    node: N,
    position: usize,
    size: usize,
    sink: &mut dyn EventSink,
) -> Result<(), XsltError> {
    for when in whens {
        if executor
            .evaluate_expression(&when.test, node, position, size)?
            .boolean()
        {
            return executor.execute_body(&when.body, node, position, size, sink);
        }
    }
    if let Some(body) = otherwise {
        return executor.execute_body(body, node, position, size, sink);
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn handle_for_each<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    select: &Expression,
    sorts: &[SortKey],
    body: &TemplateBody,
    node: N,
    position: usize,
    size: usize,
    sink: &mut dyn EventSink,
) -> Result<(), XsltError> {
    let selected = executor.evaluate_expression(select, node, position, size)?;
    let XPathValue::NodeSet(nodes) = selected else {
        return Err(XsltError::Execution(
            "'for-each' select must evaluate to a node-set".to_string(),
        ));
    };
    let nodes = sorted_nodes(executor, nodes, sorts)?;
    let size = nodes.len();
    for (idx, item) in nodes.into_iter().enumerate() {
        executor.execute_body(body, item, idx + 1, size, sink)?;
    }
    Ok(())
}

enum SortValue {
    Text(String),
    Number(f64),
}

/// Reorders a selected node list by its sort keys, the first key being most
/// significant. The sort is stable, so equal keys keep document order.
pub(crate) fn sorted_nodes<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &TemplateExecutor<'s, 'a, N>,
    nodes: Vec<N>,
    sorts: &[SortKey],
) -> Result<Vec<N>, XsltError> {
    if sorts.is_empty() {
        return Ok(nodes);
    }
    let size = nodes.len();
    let mut keyed = Vec::with_capacity(size);
    for (idx, node) in nodes.into_iter().enumerate() {
        let mut keys = Vec::with_capacity(sorts.len());
        for sort in sorts {
            let value = executor.evaluate_expression(&sort.select, node, idx + 1, size)?;
            keys.push(match sort.data_type {
                SortDataType::Text => SortValue::Text(value.string()),
                SortDataType::Number => SortValue::Number(value.number()),
            });
        }
        keyed.push((keys, node));
    }
    keyed.sort_by(|(a, _), (b, _)| compare_keys(a, b, sorts));
    Ok(keyed.into_iter().map(|(_, node)| node).collect())
}

fn compare_keys(a: &[SortValue], b: &[SortValue], sorts: &[SortKey]) -> Ordering {
    for ((x, y), sort) in a.iter().zip(b).zip(sorts) {
        let ord = match (x, y) {
            (SortValue::Text(x), SortValue::Text(y)) => x.cmp(y),
            (SortValue::Number(x), SortValue::Number(y)) => {
                x.partial_cmp(y).unwrap_or(Ordering::Equal)
            }
            _ => Ordering::Equal,
        };
        let ord = if sort.descending { ord.reverse() } else { ord };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}
