//! Local variable binding and actual-parameter evaluation.

use crate::ast::{VariableValue, WithParam};
use crate::error::XsltError;
use crate::executor::TemplateExecutor;
use salix_xpath::DataSourceNode;
use salix_xpath::engine::XPathValue;

pub(crate) fn handle_variable<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    name: &str,
    value: &VariableValue,
    node: N,
    position: usize,
    size: usize,
) -> Result<(), XsltError> {
    let value = executor.evaluate_binding(value, node, position, size)?;
    executor.bind_local(name, value);
    Ok(())
}

/// Evaluates `with-param` values in the caller's context, before control
/// passes to the invoked template.
pub(crate) fn evaluate_with_params<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    params: &[WithParam],
    node: N,
    position: usize,
    size: usize,
) -> Result<Vec<(String, XPathValue<N>)>, XsltError> {
    let mut passed = Vec::with_capacity(params.len());
    for param in params {
        let value = executor.evaluate_binding(&param.value, node, position, size)?;
        passed.push((param.name.clone(), value));
    }
    Ok(passed)
}
