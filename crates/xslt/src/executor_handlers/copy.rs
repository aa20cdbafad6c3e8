//! Shallow (`copy`) and deep (`copy-of`) node copying.

use crate::ast::TemplateBody;
use crate::error::XsltError;
use crate::executor::TemplateExecutor;
use crate::executor_handlers::qualified_name;
use crate::output::EventSink;
use salix_xpath::datasource::NodeType;
use salix_xpath::engine::XPathValue;
use salix_xpath::{DataSourceNode, Expression};

pub(crate) fn handle_copy<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    body: &TemplateBody,
    node: N,
    position: usize,
    size: usize,
    sink: &mut dyn EventSink,
) -> Result<(), XsltError> {
    match node.node_type() {
        NodeType::Element => {
            let qname = node
                .name()
                .map(qualified_name)
                .unwrap_or_default();
            sink.start_element(&qname)?;
            executor.execute_body(body, node, position, size, sink)?;
            sink.end_element(&qname)
        }
        // Copying the root copies nothing; only the body runs.
        NodeType::Root => executor.execute_body(body, node, position, size, sink),
        NodeType::Text => sink.text(&node.string_value()),
        NodeType::Attribute => {
            let qname = node
                .name()
                .map(qualified_name)
                .unwrap_or_default();
            sink.attribute(&qname, &node.string_value())
        }
        NodeType::Comment => sink.comment(&node.string_value()),
        NodeType::ProcessingInstruction => Ok(()),
    }
}

pub(crate) fn handle_copy_of<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    select: &Expression,
    node: N,
    position: usize,
    size: usize,
    sink: &mut dyn EventSink,
) -> Result<(), XsltError> {
    match executor.evaluate_expression(select, node, position, size)? {
        XPathValue::NodeSet(nodes) => {
            for item in nodes {
                deep_copy(item, sink)?;
            }
            Ok(())
        }
        other => sink.text(&other.string()),
    }
}

fn deep_copy<'a, N: DataSourceNode<'a>>(node: N, sink: &mut dyn EventSink) -> Result<(), XsltError> {
    match node.node_type() {
        NodeType::Element => {
            let qname = node
                .name()
                .map(qualified_name)
                .unwrap_or_default();
            sink.start_element(&qname)?;
            for attribute in node.attributes() {
                let name = attribute
                    .name()
                    .map(qualified_name)
                    .unwrap_or_default();
                sink.attribute(&name, &attribute.string_value())?;
            }
            for child in node.children() {
                deep_copy(child, sink)?;
            }
            sink.end_element(&qname)
        }
        NodeType::Root => {
            for child in node.children() {
                deep_copy(child, sink)?;
            }
            Ok(())
        }
        NodeType::Text => sink.text(&node.string_value()),
        NodeType::Attribute => {
            let qname = node
                .name()
                .map(qualified_name)
                .unwrap_or_default();
            sink.attribute(&qname, &node.string_value())
        }
        NodeType::Comment => sink.comment(&node.string_value()),
        NodeType::ProcessingInstruction => Ok(()),
    }
}
