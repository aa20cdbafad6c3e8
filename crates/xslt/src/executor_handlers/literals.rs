//! Result-constructing instructions: literal elements, computed elements
//! and attributes, comments, and messages.

use crate::ast::{AttributeValueTemplate, AvtPart, TemplateBody};
use crate::error::XsltError;
use crate::executor::TemplateExecutor;
use crate::output::EventSink;
use salix_xpath::{DataSourceNode, Expression};

/// Evaluates an attribute value template in the current context.
pub(crate) fn evaluate_avt<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &TemplateExecutor<'s, 'a, N>,
    avt: &AttributeValueTemplate,
    node: N,
    position: usize,
    size: usize,
) -> Result<String, XsltError> {
    if let Some(text) = avt.as_static() {
        return Ok(text.to_string());
    }
    let mut out = String::new();
    for part in &avt.parts {
        match part {
            AvtPart::Literal(text) => out.push_str(text),
            AvtPart::Expr(expression) => {
                let value = executor.evaluate_expression(expression, node, position, size)?;
                out.push_str(&value.string());
            }
        }
    }
    Ok(out)
}

pub(crate) fn handle_value_of<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    select: &Expression,
    node: N,
    position: usize,
    size: usize,
    sink: &mut dyn EventSink,
) -> Result<(), XsltError> {
    let value = executor.evaluate_expression(select, node, position, size)?;
    sink.text(&value.string())
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn handle_literal_element<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    qname: &str,
    attributes: &[(String, AttributeValueTemplate)],
    body: &TemplateBody,
    node: N,
    position: usize,
    size: usize,
    sink: &mut dyn EventSink,
) -> Result<(), XsltError> {
    sink.start_element(qname)?;
    for (name, avt) in attributes {
        let value = evaluate_avt(executor, avt, node, position, size)?;
        sink.attribute(name, &value)?;
    }
    executor.execute_body(body, node, position, size, sink)?;
    sink.end_element(qname)
}

pub(crate) fn handle_element<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    name: &AttributeValueTemplate,
    body: &TemplateBody,
    node: N,
    position: usize,
    size: usize,
    sink: &mut dyn EventSink,
) -> Result<(), XsltError> {
    let qname = evaluate_avt(executor, name, node, position, size)?;
    sink.start_element(&qname)?;
    executor.execute_body(body, node, position, size, sink)?;
    sink.end_element(&qname)
}

pub(crate) fn handle_attribute<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    name: &AttributeValueTemplate,
    body: &TemplateBody,
    node: N,
    position: usize,
    size: usize,
    sink: &mut dyn EventSink,
) -> Result<(), XsltError> {
    let qname = evaluate_avt(executor, name, node, position, size)?;
    let value = executor.body_to_string(body, node, position, size)?;
    sink.attribute(&qname, &value)
}

pub(crate) fn handle_processing_instruction<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    name: &AttributeValueTemplate,
    body: &TemplateBody,
    node: N,
    position: usize,
    size: usize,
    sink: &mut dyn EventSink,
) -> Result<(), XsltError> {
    let target = evaluate_avt(executor, name, node, position, size)?;
    let data = executor.body_to_string(body, node, position, size)?;
    sink.processing_instruction(&target, &data)
}

pub(crate) fn handle_comment<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    body: &TemplateBody,
    node: N,
    position: usize,
    size: usize,
    sink: &mut dyn EventSink,
) -> Result<(), XsltError> {
    let text = executor.body_to_string(body, node, position, size)?;
    sink.comment(&text)
}

/// `message` writes to the log, never to the result. With `terminate`, the
/// whole transformation fails; the compiled stylesheet stays usable.
pub(crate) fn handle_message<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    body: &TemplateBody,
    terminate: bool,
    node: N,
    position: usize,
    size: usize,
) -> Result<(), XsltError> {
    let text = executor.body_to_string(body, node, position, size)?;
    if terminate {
        return Err(XsltError::Execution(format!(
            "transformation terminated by message: {text}"
        )));
    }
    log::info!("stylesheet message: {text}");
    Ok(())
}
