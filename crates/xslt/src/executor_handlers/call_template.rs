//! The `call-template` instruction: invoke a named template with the
//! caller's context node.

use crate::ast::WithParam;
use crate::error::XsltError;
use crate::executor::TemplateExecutor;
use crate::executor_handlers::variables::evaluate_with_params;
use crate::output::EventSink;
use salix_xpath::DataSourceNode;

pub(crate) fn handle_call_template<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    name: &str,
    params: &[WithParam],
    node: N,
    position: usize,
    size: usize,
    sink: &mut dyn EventSink,
) -> Result<(), XsltError> {
    let Some(&index) = executor.stylesheet.named_templates.get(name) else {
        return Err(XsltError::UnknownTemplate(name.to_string()));
    };
    let passed = evaluate_with_params(executor, params, node, position, size)?;
    executor.enter_template()?;
    let result = executor.instantiate(index, node, position, size, passed, sink);
    executor.leave_template();
    result
}
