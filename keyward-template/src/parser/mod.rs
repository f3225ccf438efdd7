//! Username template parser.

mod grammar;

use pest::Parser;
use pest::iterators::Pair;

use crate::ast::{Arg, Call, Command, Field, FormatPiece, Function, Operand, Pipeline, Segment};
use crate::error::{TemplateError, TemplateResult};

/// Largest length accepted by `random` and `truncate`.
pub const MAX_LENGTH_ARGUMENT: usize = 1024;

pub use grammar::{Rule, UsernameParser};

/// Parse a template into segments.
pub fn parse_segments(input: &str) -> TemplateResult<Vec<Segment>> {
    let mut pairs =
        UsernameParser::parse(Rule::template, input).map_err(|e| TemplateError::from_pest(input, e))?;

    let Some(template) = pairs.next() else {
        return Ok(Vec::new());
    };

    let mut segments = Vec::new();
    for pair in template.into_inner() {
        match pair.as_rule() {
            Rule::text => segments.push(Segment::Text(pair.as_str().to_string())),
            Rule::action => {
                if let Some(pipeline) = pair.into_inner().next() {
                    segments.push(Segment::Action(parse_pipeline(pipeline)?));
                }
            }
            _ => {}
        }
    }

    Ok(segments)
}

/// Parse a `pipeline` pair.
fn parse_pipeline(pair: Pair<'_, Rule>) -> TemplateResult<Pipeline> {
    let mut commands = Vec::new();
    for (index, command) in pair.into_inner().enumerate() {
        commands.push(parse_command(command, index > 0)?);
    }
    Ok(Pipeline { commands })
}

/// Parse a `command` pair. `piped` is set for every command after the first.
fn parse_command(pair: Pair<'_, Rule>, piped: bool) -> TemplateResult<Command> {
    let text = pair.as_str().trim().to_string();
    let mut inner = pair.into_inner();

    let Some(head) = inner.next() else {
        return Err(TemplateError::syntax(text, 0, 0, "empty command"));
    };

    if head.as_rule() == Rule::identifier {
        let function = lookup_function(head.as_str())?;
        let mut args = inner
            .map(parse_operand)
            .map(|op| op.map(Arg::Operand))
            .collect::<TemplateResult<Vec<_>>>()?;
        if piped {
            args.push(Arg::Piped);
        }
        return Ok(Command::Call(build_call(function, args)?));
    }

    if piped || inner.next().is_some() {
        return Err(TemplateError::NotAFunction { operand: text });
    }
    Ok(Command::Value(parse_operand(head)?))
}

/// Parse an operand pair.
fn parse_operand(pair: Pair<'_, Rule>) -> TemplateResult<Operand> {
    match pair.as_rule() {
        Rule::field => {
            let name = pair.as_str().trim_start_matches('.');
            Field::from_name(name)
                .map(Operand::Field)
                .ok_or_else(|| TemplateError::UnknownField {
                    name: name.to_string(),
                })
        }
        Rule::string => {
            let raw = pair
                .into_inner()
                .next()
                .map(|p| p.as_str())
                .unwrap_or_default();
            Ok(Operand::Str(unescape(raw)))
        }
        Rule::integer => pair
            .as_str()
            .parse::<i64>()
            .map(Operand::Int)
            .map_err(|e| TemplateError::syntax(pair.as_str(), 0, 0, e.to_string())),
        Rule::group => match pair.into_inner().next() {
            Some(pipeline) => Ok(Operand::Group(Box::new(parse_pipeline(pipeline)?))),
            None => Err(TemplateError::syntax("()", 0, 2, "empty group")),
        },
        Rule::identifier => {
            let function = lookup_function(pair.as_str())?;
            Ok(Operand::Call(Box::new(build_call(function, Vec::new())?)))
        }
        other => Err(TemplateError::syntax(
            pair.as_str(),
            0,
            0,
            format!("unexpected {:?}", other),
        )),
    }
}

fn lookup_function(name: &str) -> TemplateResult<Function> {
    Function::from_name(name).ok_or_else(|| TemplateError::UnknownFunction {
        name: name.to_string(),
    })
}

/// Bind arguments to a function's slots, checking arity and integer arguments.
fn build_call(function: Function, args: Vec<Arg>) -> TemplateResult<Call> {
    if function == Function::Printf {
        return build_printf(args);
    }

    if let Some(expected) = function.arity() {
        if args.len() != expected {
            return Err(TemplateError::Arity {
                function: function.name().to_string(),
                expected,
                actual: args.len(),
            });
        }
    }

    let mut args = args.into_iter();
    let mut next = || args.next().unwrap_or(Arg::Piped);

    let call = match function {
        Function::Truncate => {
            let len = positive_int(function, next())?;
            Call::Truncate { len, input: next() }
        }
        Function::Random => Call::Random {
            len: positive_int(function, next())?,
        },
        Function::Uppercase => Call::Uppercase(next()),
        Function::Lowercase => Call::Lowercase(next()),
        Function::Replace => Call::Replace {
            from: next(),
            to: next(),
            input: next(),
        },
        Function::UnixTime => Call::UnixTime,
        Function::UnixTimeMillis => Call::UnixTimeMillis,
        Function::Uuid => Call::Uuid,
        Function::Printf => return build_printf(Vec::new()),
    };

    Ok(call)
}

fn build_printf(args: Vec<Arg>) -> TemplateResult<Call> {
    let mut args = args.into_iter();
    let format = match args.next() {
        Some(Arg::Operand(Operand::Str(format))) => parse_format(&format)?,
        Some(_) => {
            return Err(TemplateError::invalid_argument(
                Function::Printf,
                "format must be a string literal",
            ));
        }
        None => {
            return Err(TemplateError::Arity {
                function: Function::Printf.name().to_string(),
                expected: 1,
                actual: 0,
            });
        }
    };

    let args: Vec<Arg> = args.collect();
    let verbs = format
        .iter()
        .filter(|p| matches!(p, FormatPiece::Verb))
        .count();
    if verbs != args.len() {
        return Err(TemplateError::Arity {
            function: Function::Printf.name().to_string(),
            expected: verbs + 1,
            actual: args.len() + 1,
        });
    }

    Ok(Call::Printf { format, args })
}

/// Split a printf format string around its verbs.
fn parse_format(format: &str) -> TemplateResult<Vec<FormatPiece>> {
    let mut pieces = Vec::new();
    let mut literal = String::new();
    let mut chars = format.chars();

    while let Some(ch) = chars.next() {
        if ch != '%' {
            literal.push(ch);
            continue;
        }
        match chars.next() {
            Some('%') => literal.push('%'),
            Some('s' | 'd' | 'v') => {
                if !literal.is_empty() {
                    pieces.push(FormatPiece::Literal(std::mem::take(&mut literal)));
                }
                pieces.push(FormatPiece::Verb);
            }
            Some(other) => {
                return Err(TemplateError::invalid_argument(
                    Function::Printf,
                    format!("unsupported verb `%{}`", other),
                ));
            }
            None => {
                return Err(TemplateError::invalid_argument(
                    Function::Printf,
                    "format ends with a lone `%`",
                ));
            }
        }
    }
    if !literal.is_empty() {
        pieces.push(FormatPiece::Literal(literal));
    }

    Ok(pieces)
}

fn positive_int(function: Function, arg: Arg) -> TemplateResult<usize> {
    match arg {
        Arg::Operand(Operand::Int(n)) if n > MAX_LENGTH_ARGUMENT as i64 => {
            Err(TemplateError::invalid_argument(
                function,
                format!("length must be at most {}, got {}", MAX_LENGTH_ARGUMENT, n),
            ))
        }
        Arg::Operand(Operand::Int(n)) if n > 0 => Ok(n as usize),
        Arg::Operand(Operand::Int(n)) => Err(TemplateError::invalid_argument(
            function,
            format!("length must be greater than zero, got {}", n),
        )),
        _ => Err(TemplateError::invalid_argument(
            function,
            "length must be an integer literal",
        )),
    }
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
