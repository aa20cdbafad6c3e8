//! The `apply-templates` instruction: select the node list, apply any sort
//! keys, evaluate the actual parameters, then hand off to rule dispatch.

use crate::ast::{SortKey, WithParam};
use crate::error::XsltError;
use crate::executor::TemplateExecutor;
use crate::executor_handlers::control_flow::sorted_nodes;
use crate::executor_handlers::variables::evaluate_with_params;
use crate::output::EventSink;
use salix_xpath::engine::XPathValue;
use salix_xpath::{DataSourceNode, Expression};

#[allow(clippy::too_many_arguments)]
pub(crate) fn handle_apply_templates<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    select: Option<&Expression>,
    mode: Option<&str>,
    sorts: &[SortKey],
    params: &[WithParam],
    node: N,
    position: usize,
    size: usize,
    sink: &mut dyn EventSink,
) -> Result<(), XsltError> {
    let nodes = match select {
        Some(expression) => {
            match executor.evaluate_expression(expression, node, position, size)? {
                XPathValue::NodeSet(nodes) => nodes,
                _ => {
                    return Err(XsltError::Execution(
                        "'apply-templates' select must evaluate to a node-set".to_string(),
                    ));
                }
            }
        }
        None => executor.selectable_children(node),
    };
    let nodes = sorted_nodes(executor, nodes, sorts)?;
    let passed = evaluate_with_params(executor, params, node, position, size)?;
    executor.apply_templates(&nodes, mode, passed, sink)
}
