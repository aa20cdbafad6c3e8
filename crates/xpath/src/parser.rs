//! Recursive-descent parser for the supported XPath subset, built on nom.

use crate::ast::{Axis, BinaryOperator, Expression, KindTest, LocationPath, NodeTest, Step};
use crate::error::XPathError;
use nom::branch::alt;
use nom::bytes::complete::{is_not, tag};
use nom::character::complete::{char, digit1, multispace0, satisfy};
use nom::combinator::{map, map_res, not, opt, recognize, verify};
use nom::multi::{many0, separated_list0};
use nom::sequence::{delimited, pair, preceded, terminated};
use nom::{IResult, Parser};

/// Parses a complete expression, requiring all input to be consumed.
pub fn parse_expression(text: &str) -> Result<Expression, XPathError> {
    match expr(text.trim()) {
        Ok(("", e)) => Ok(e),
        Ok((rem, _)) => Err(XPathError::Parse(
            text.to_string(),
            format!("unconsumed input '{}'", rem),
        )),
        Err(e) => Err(XPathError::Parse(text.to_string(), e.to_string())),
    }
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}

fn ncname(i: &str) -> IResult<&str, &str> {
    verify(
        recognize(pair(
            satisfy(|c: char| c.is_alphabetic() || c == '_'),
            many0(satisfy(is_name_char)),
        )),
        |s: &str| !s.is_empty(),
    )
    .parse(i)
}

/// A word operator like `or`, `and`, `div`, `mod` — must not be a name prefix.
fn word_op<'a>(
    w: &'static str,
) -> impl Parser<&'a str, Output = &'a str, Error = nom::error::Error<&'a str>> {
    delimited(
        multispace0,
        terminated(tag(w), not(satisfy(is_name_char))),
        multispace0,
    )
}

fn sym<'a>(
    s: &'static str,
) -> impl Parser<&'a str, Output = &'a str, Error = nom::error::Error<&'a str>> {
    delimited(multispace0, tag(s), multispace0)
}

// --- Expression grammar, precedence from loosest to tightest ---

pub fn expr(i: &str) -> IResult<&str, Expression> {
    or_expr(i)
}

fn fold_binary(first: Expression, rest: Vec<(BinaryOperator, Expression)>) -> Expression {
    rest.into_iter().fold(first, |acc, (op, right)| {
        Expression::BinaryOp {
            left: Box::new(acc),
            op,
            right: Box::new(right),
        }
    })
}

fn or_expr(i: &str) -> IResult<&str, Expression> {
    let (i, first) = and_expr(i)?;
    let (i, rest) = many0(map(preceded(word_op("or"), and_expr), |e| {
        (BinaryOperator::Or, e)
    }))
    .parse(i)?;
    Ok((i, fold_binary(first, rest)))
}

fn and_expr(i: &str) -> IResult<&str, Expression> {
    let (i, first) = equality_expr(i)?;
    let (i, rest) = many0(map(preceded(word_op("and"), equality_expr), |e| {
        (BinaryOperator::And, e)
    }))
    .parse(i)?;
    Ok((i, fold_binary(first, rest)))
}

fn equality_expr(i: &str) -> IResult<&str, Expression> {
    let (i, first) = relational_expr(i)?;
    let (i, rest) = many0(pair(
        map(alt((sym("!="), sym("="))), |s| {
            if s == "=" {
                BinaryOperator::Equals
            } else {
                BinaryOperator::NotEquals
            }
        }),
        relational_expr,
    ))
    .parse(i)?;
    Ok((i, fold_binary(first, rest)))
}

fn relational_expr(i: &str) -> IResult<&str, Expression> {
    let (i, first) = additive_expr(i)?;
    let (i, rest) = many0(pair(
        map(alt((sym("<="), sym(">="), sym("<"), sym(">"))), |s| match s {
            "<=" => BinaryOperator::LessThanOrEqual,
            ">=" => BinaryOperator::GreaterThanOrEqual,
            "<" => BinaryOperator::LessThan,
            _ => BinaryOperator::GreaterThan,
        }),
        additive_expr,
    ))
    .parse(i)?;
    Ok((i, fold_binary(first, rest)))
}

fn additive_expr(i: &str) -> IResult<&str, Expression> {
    let (i, first) = multiplicative_expr(i)?;
    let (i, rest) = many0(pair(
        map(alt((sym("+"), sym("-"))), |s| {
            if s == "+" {
                BinaryOperator::Plus
            } else {
                BinaryOperator::Minus
            }
        }),
        multiplicative_expr,
    ))
    .parse(i)?;
    Ok((i, fold_binary(first, rest)))
}

fn multiplicative_expr(i: &str) -> IResult<&str, Expression> {
    let (i, first) = unary_expr(i)?;
    let (i, rest) = many0(pair(
        map(alt((word_op("div"), word_op("mod"))), |s| {
            if s == "div" {
                BinaryOperator::Div
            } else {
                BinaryOperator::Mod
            }
        }),
        unary_expr,
    ))
    .parse(i)?;
    Ok((i, fold_binary(first, rest)))
}

fn unary_expr(i: &str) -> IResult<&str, Expression> {
    alt((
        map(preceded(sym("-"), unary_expr), |e| {
            Expression::Negate(Box::new(e))
        }),
        path_expr,
    ))
    .parse(i)
}

// --- Path expressions and primaries ---

/// A filter-style start (`$var`, `f(..)`, `(..)`) optionally followed by
/// `/steps`, or a plain location path.
fn path_expr(i: &str) -> IResult<&str, Expression> {
    if let Ok((rest, base)) = alt((variable, function_call, parenthesized)).parse(i) {
        if rest.starts_with('/') {
            let (rest, steps) = preceded(char('/'), step_list).parse(rest)?;
            return Ok((
                rest,
                Expression::LocationPath(LocationPath {
                    is_absolute: false,
                    start_point: Some(Box::new(base)),
                    steps,
                }),
            ));
        }
        return Ok((rest, base));
    }
    alt((literal, number, location_path)).parse(i)
}

fn parenthesized(i: &str) -> IResult<&str, Expression> {
    delimited(sym("("), expr, sym(")")).parse(i)
}

fn literal(i: &str) -> IResult<&str, Expression> {
    map(
        alt((
            delimited(char('"'), opt(is_not("\"")), char('"')),
            delimited(char('\''), opt(is_not("'")), char('\'')),
        )),
        |s: Option<&str>| Expression::Literal(s.unwrap_or("").to_string()),
    )
    .parse(i)
}

fn number(i: &str) -> IResult<&str, Expression> {
    map_res(
        recognize(pair(digit1, opt(pair(char('.'), digit1)))),
        |s: &str| s.parse::<f64>().map(Expression::Number),
    )
    .parse(i)
}

fn variable(i: &str) -> IResult<&str, Expression> {
    map(preceded(char('$'), ncname), |name| {
        Expression::Variable(name.to_string())
    })
    .parse(i)
}

const KIND_TEST_NAMES: [&str; 4] = ["text", "comment", "node", "processing-instruction"];

fn function_call(i: &str) -> IResult<&str, Expression> {
    let (rest, name) = verify(ncname, |n: &str| !KIND_TEST_NAMES.contains(&n)).parse(i)?;
    let (rest, args) =
        delimited(sym("("), separated_list0(sym(","), expr), sym(")")).parse(rest)?;
    Ok((
        rest,
        Expression::FunctionCall {
            name: name.to_string(),
            args,
        },
    ))
}

fn location_path(i: &str) -> IResult<&str, Expression> {
    map(location_path_inner, Expression::LocationPath).parse(i)
}

pub fn location_path_inner(i: &str) -> IResult<&str, LocationPath> {
    // `//foo` means /descendant-or-self::node()/foo
    if let Ok((rest, _)) = tag::<_, _, nom::error::Error<&str>>("//")(i) {
        let (rest, mut steps) = step_list(rest)?;
        steps.insert(0, descendant_or_self_step());
        return Ok((
            rest,
            LocationPath {
                is_absolute: true,
                start_point: None,
                steps,
            },
        ));
    }
    let (i, abs) = opt(char('/')).parse(i)?;
    if abs.is_some() {
        // `/` alone is the root
        if let Ok((rest, steps)) = step_list(i) {
            return Ok((
                rest,
                LocationPath {
                    is_absolute: true,
                    start_point: None,
                    steps,
                },
            ));
        }
        return Ok((
            i,
            LocationPath {
                is_absolute: true,
                start_point: None,
                steps: vec![],
            },
        ));
    }
    let (i, steps) = step_list(i)?;
    Ok((
        i,
        LocationPath {
            is_absolute: false,
            start_point: None,
            steps,
        },
    ))
}

fn descendant_or_self_step() -> Step {
    Step {
        axis: Axis::DescendantOrSelf,
        node_test: NodeTest::Kind(KindTest::Node),
        predicates: vec![],
    }
}

/// One or more steps separated by `/` or `//`.
fn step_list(mut i: &str) -> IResult<&str, Vec<Step>> {
    let (rest, first) = step(i)?;
    let mut steps = vec![first];
    i = rest;
    loop {
        let sep: IResult<&str, &str> = alt((tag("//"), tag("/"))).parse(i);
        match sep {
            Ok((rest, sep_text)) => {
                let (rest, s) = step(rest)?;
                if sep_text == "//" {
                    steps.push(descendant_or_self_step());
                }
                steps.push(s);
                i = rest;
            }
            Err(_) => break,
        }
    }
    Ok((i, steps))
}

fn step(i: &str) -> IResult<&str, Step> {
    // Abbreviations first: `..` then `.`
    if let Ok((rest, _)) = tag::<_, _, nom::error::Error<&str>>("..")(i) {
        return Ok((
            rest,
            Step {
                axis: Axis::Parent,
                node_test: NodeTest::Kind(KindTest::Node),
                predicates: vec![],
            },
        ));
    }
    if let Ok((rest, _)) =
        terminated(char::<_, nom::error::Error<&str>>('.'), not(satisfy(is_name_char))).parse(i)
    {
        return Ok((
            rest,
            Step {
                axis: Axis::SelfAxis,
                node_test: NodeTest::Kind(KindTest::Node),
                predicates: vec![],
            },
        ));
    }

    let (i, axis) = axis_specifier(i)?;
    let (i, test) = node_test(i)?;
    let (i, predicates) = many0(delimited(sym("["), expr, sym("]"))).parse(i)?;
    Ok((
        i,
        Step {
            axis,
            node_test: test,
            predicates,
        },
    ))
}

fn axis_specifier(i: &str) -> IResult<&str, Axis> {
    if let Ok((rest, _)) = char::<_, nom::error::Error<&str>>('@')(i) {
        return Ok((rest, Axis::Attribute));
    }
    let explicit: IResult<&str, &str> = terminated(
        alt((
            tag("descendant-or-self"),
            tag("descendant"),
            tag("attribute"),
            tag("parent"),
            tag("child"),
            tag("self"),
        )),
        tag("::"),
    )
    .parse(i);
    match explicit {
        Ok((rest, name)) => {
            let axis = match name {
                "descendant-or-self" => Axis::DescendantOrSelf,
                "descendant" => Axis::Descendant,
                "attribute" => Axis::Attribute,
                "parent" => Axis::Parent,
                "self" => Axis::SelfAxis,
                _ => Axis::Child,
            };
            Ok((rest, axis))
        }
        Err(_) => Ok((i, Axis::Child)),
    }
}

/// A node test: kind test, wildcard, prefixed wildcard, or (qualified) name.
/// Public because the XSLT pattern grammar reuses it.
pub fn node_test(i: &str) -> IResult<&str, NodeTest> {
    // Kind tests: name '(' ')'
    for kind_name in KIND_TEST_NAMES {
        let parsed: IResult<&str, &str> =
            terminated(tag(kind_name), pair(sym("("), sym(")"))).parse(i);
        if let Ok((rest, _)) = parsed {
            let kind = match kind_name {
                "text" => KindTest::Text,
                "comment" => KindTest::Comment,
                "processing-instruction" => KindTest::ProcessingInstruction,
                _ => KindTest::Node,
            };
            return Ok((rest, NodeTest::Kind(kind)));
        }
    }

    if let Ok((rest, _)) = char::<_, nom::error::Error<&str>>('*')(i) {
        return Ok((rest, NodeTest::Wildcard));
    }

    let (rest, first) = ncname(i)?;
    if let Ok((rest2, _)) = tag::<_, _, nom::error::Error<&str>>(":*")(rest) {
        return Ok((rest2, NodeTest::PrefixWildcard(first.to_string())));
    }
    if let Ok((rest2, second)) = preceded(char(':'), ncname).parse(rest) {
        return Ok((
            rest2,
            NodeTest::Name {
                prefix: Some(first.to_string()),
                local: second.to_string(),
            },
        ));
    }
    Ok((
        rest,
        NodeTest::Name {
            prefix: None,
            local: first.to_string(),
        },
    ))
}
