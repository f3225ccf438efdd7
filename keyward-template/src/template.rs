//! Template rendering.

use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use rand::Rng;
use rand::distributions::Alphanumeric;

use crate::ast::{Arg, Call, Command, Field, FormatPiece, Operand, Pipeline, Segment, TemplateInput};
use crate::error::{TemplateError, TemplateResult};
use crate::parser::parse_segments;

/// A parsed username template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Parse a template.
    pub fn parse(source: impl Into<String>) -> TemplateResult<Self> {
        let source = source.into();
        let segments = parse_segments(&source)?;
        Ok(Self { source, segments })
    }

    /// The template text this was parsed from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The parsed segments.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Render the template against `input`.
    pub fn render(&self, input: &TemplateInput<'_>) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Action(pipeline) => out.push_str(&eval_pipeline(pipeline, input)),
            }
        }
        out
    }
}

impl FromStr for Template {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Keep at most `max` characters of `s`.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

fn eval_pipeline(pipeline: &Pipeline, input: &TemplateInput<'_>) -> String {
    let mut piped: Option<String> = None;
    for command in &pipeline.commands {
        let value = match command {
            Command::Call(call) => eval_call(call, input, piped.as_deref()),
            Command::Value(operand) => eval_operand(operand, input),
        };
        piped = Some(value);
    }
    piped.unwrap_or_default()
}

fn eval_operand(operand: &Operand, input: &TemplateInput<'_>) -> String {
    match operand {
        Operand::Field(Field::DisplayName) => input.display_name.to_string(),
        Operand::Field(Field::RoleName) => input.role_name.to_string(),
        Operand::Str(s) => s.clone(),
        Operand::Int(n) => n.to_string(),
        Operand::Group(pipeline) => eval_pipeline(pipeline, input),
        Operand::Call(call) => eval_call(call, input, None),
    }
}

fn eval_arg(arg: &Arg, input: &TemplateInput<'_>, piped: Option<&str>) -> String {
    match arg {
        Arg::Operand(operand) => eval_operand(operand, input),
        Arg::Piped => piped.unwrap_or_default().to_string(),
    }
}

fn eval_call(call: &Call, input: &TemplateInput<'_>, piped: Option<&str>) -> String {
    let arg = |a: &Arg| eval_arg(a, input, piped);

    match call {
        Call::Truncate { len, input: value } => truncate_chars(&arg(value), *len),
        Call::Random { len } => random_alphanumeric(*len),
        Call::Uppercase(value) => arg(value).to_uppercase(),
        Call::Lowercase(value) => arg(value).to_lowercase(),
        Call::Replace {
            from,
            to,
            input: value,
        } => {
            let from = arg(from);
            let value = arg(value);
            if from.is_empty() {
                value
            } else {
                value.replace(&from, &arg(to))
            }
        }
        Call::UnixTime => Utc::now().timestamp().to_string(),
        Call::UnixTimeMillis => Utc::now().timestamp_millis().to_string(),
        Call::Uuid => uuid::Uuid::new_v4().to_string(),
        Call::Printf { format, args } => {
            let mut out = String::new();
            let mut args = args.iter();
            for piece in format {
                match piece {
                    FormatPiece::Literal(text) => out.push_str(text),
                    FormatPiece::Verb => {
                        if let Some(a) = args.next() {
                            out.push_str(&arg(a));
                        }
                    }
                }
            }
            out
        }
    }
}

fn random_alphanumeric(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
