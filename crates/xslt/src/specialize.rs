//! Template specialization: lowers the static shape of a template body into
//! a flat program of output operations, leaving dynamic constructs to the
//! interpreter.
//!
//! Specialization is a pure speed layer. A specialized template and its
//! interpreted form produce identical event streams; anything the lowering
//! does not understand is wrapped in [`Op::Interpret`] and dispatched back
//! to the interpreter one instruction at a time.

use crate::ast::{AttributeValueTemplate, Instruction, TemplateBody};
use crate::error::XsltError;
use crate::executor::TemplateExecutor;
use crate::executor_handlers::literals::evaluate_avt;
use crate::output::EventSink;
use salix_xpath::{DataSourceNode, Expression};

/// One flat operation of a specialized template.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    StartElement(String),
    /// An attribute whose value is fixed at compile time.
    AttributeStatic { name: String, value: String },
    /// An attribute whose value template needs per-invocation evaluation.
    AttributeAvt {
        name: String,
        value: AttributeValueTemplate,
    },
    Text(String),
    ValueOf(Expression),
    EndElement(String),
    /// Skip to `target` when the test is false.
    JumpIfNot { test: Expression, target: usize },
    Jump(usize),
    /// Fallback: hand one instruction to the interpreter.
    Interpret(Instruction),
}

#[derive(Debug, Clone, Default)]
pub struct Program {
    pub ops: Vec<Op>,
}

/// Lowers a template body. Always succeeds; unsupported instructions are
/// carried as interpretation fallbacks.
pub fn compile_template(body: &TemplateBody) -> Program {
    let mut ops = Vec::new();
    compile_body(body, &mut ops);
    Program { ops }
}

fn compile_body(body: &TemplateBody, ops: &mut Vec<Op>) {
    for instruction in &body.0 {
        compile_instruction(instruction, ops);
    }
}

fn compile_instruction(instruction: &Instruction, ops: &mut Vec<Op>) {
    match instruction {
        Instruction::Text(text) => ops.push(Op::Text(text.clone())),
        Instruction::ValueOf { select } => ops.push(Op::ValueOf(select.clone())),
        Instruction::LiteralElement {
            qname,
            attributes,
            body,
        } => {
            ops.push(Op::StartElement(qname.clone()));
            for (name, avt) in attributes {
                match avt.as_static() {
                    Some(value) => ops.push(Op::AttributeStatic {
                        name: name.clone(),
                        value: value.to_string(),
                    }),
                    None => ops.push(Op::AttributeAvt {
                        name: name.clone(),
                        value: avt.clone(),
                    }),
                }
            }
            compile_body(body, ops);
            ops.push(Op::EndElement(qname.clone()));
        }
        Instruction::If { test, body } => {
            let jump = ops.len();
            ops.push(Op::JumpIfNot {
                test: test.clone(),
                target: 0,
            });
            compile_body(body, ops);
            let after = ops.len();
            patch_target(&mut ops[jump], after);
        }
        Instruction::Choose { whens, otherwise } => {
            let mut exits = Vec::new();
            for when in whens {
                let jump = ops.len();
                ops.push(Op::JumpIfNot {
                    test: when.test.clone(),
                    target: 0,
                });
                compile_body(&when.body, ops);
                exits.push(ops.len());
                ops.push(Op::Jump(0));
                let next_branch = ops.len();
                patch_target(&mut ops[jump], next_branch);
            }
            if let Some(body) = otherwise {
                compile_body(body, ops);
            }
            let end = ops.len();
            for exit in exits {
                patch_target(&mut ops[exit], end);
            }
        }
        // Everything else keeps its tree form and is interpreted in place.
        other => ops.push(Op::Interpret(other.clone())),
    }
}

fn patch_target(op: &mut Op, new_target: usize) {
    match op {
        Op::JumpIfNot { target, .. } | Op::Jump(target) => *target = new_target,
        _ => unreachable!("patched op is always a jump"),
    }
}

/// Executes a specialized program against the current context.
pub(crate) fn run_program<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    program: &Program,
    node: N,
    position: usize,
    size: usize,
    sink: &mut dyn EventSink,
) -> Result<(), XsltError> {
    let mut pc = 0;
    while pc < program.ops.len() {
        match &program.ops[pc] {
            Op::StartElement(qname) => sink.start_element(qname)?,
            Op::AttributeStatic { name, value } => sink.attribute(name, value)?,
            Op::AttributeAvt { name, value } => {
                let value = evaluate_avt(executor, value, node, position, size)?;
                sink.attribute(name, &value)?;
            }
            Op::Text(text) => sink.text(text)?,
            Op::ValueOf(expression) => {
                let value = executor.evaluate_expression(expression, node, position, size)?;
                sink.text(&value.string())?;
            }
            Op::EndElement(qname) => sink.end_element(qname)?,
            Op::JumpIfNot { test, target } => {
                if !executor
                    .evaluate_expression(test, node, position, size)?
                    .boolean()
                {
                    pc = *target;
                    continue;
                }
            }
            Op::Jump(target) => {
                pc = *target;
                continue;
            }
            Op::Interpret(instruction) => {
                executor.execute_instruction(instruction, node, position, size, sink)?;
            }
        }
        pc += 1;
    }
    Ok(())
}
