//! Error types for username template parsing.

// These warnings are false positives - the fields are used by derive macros
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

use crate::parser::Rule;

/// Result type for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Errors that can occur while parsing a username template.
#[derive(Error, Debug, Diagnostic)]
pub enum TemplateError {
    /// The template is not well formed.
    #[error("syntax error in template: {message}")]
    #[diagnostic(code(keyward::template::syntax_error))]
    Syntax {
        #[source_code]
        src: String,
        #[label("error here")]
        span: miette::SourceSpan,
        message: String,
    },

    /// A function name is not in the function table.
    #[error("function `{name}` not defined")]
    #[diagnostic(
        code(keyward::template::unknown_function),
        help("available functions: truncate, random, uppercase, lowercase, replace, unix_time, unix_time_millis, uuid, printf")
    )]
    UnknownFunction { name: String },

    /// A field is not one of `.DisplayName` or `.RoleName`.
    #[error("field `.{name}` not defined")]
    #[diagnostic(
        code(keyward::template::unknown_field),
        help("available fields: .DisplayName, .RoleName")
    )]
    UnknownField { name: String },

    /// A function was called with the wrong number of arguments.
    #[error("wrong number of arguments for `{function}`: expected {expected}, got {actual}")]
    #[diagnostic(code(keyward::template::arity))]
    Arity {
        function: String,
        expected: usize,
        actual: usize,
    },

    /// A function argument has the wrong shape.
    #[error("invalid argument for `{function}`: {message}")]
    #[diagnostic(code(keyward::template::invalid_argument))]
    InvalidArgument { function: String, message: String },

    /// Arguments were given to, or piped into, something that is not a function.
    #[error("`{operand}` is not a function and cannot take arguments")]
    #[diagnostic(code(keyward::template::not_a_function))]
    NotAFunction { operand: String },
}

impl TemplateError {
    /// Create a syntax error with source location.
    pub fn syntax(
        src: impl Into<String>,
        offset: usize,
        len: usize,
        message: impl Into<String>,
    ) -> Self {
        Self::Syntax {
            src: src.into(),
            span: (offset, len).into(),
            message: message.into(),
        }
    }

    /// Convert a pest error, keeping its location.
    pub(crate) fn from_pest(src: &str, err: pest::error::Error<Rule>) -> Self {
        let (offset, len) = match err.location {
            pest::error::InputLocation::Pos(pos) => (pos, 0),
            pest::error::InputLocation::Span((start, end)) => (start, end.saturating_sub(start)),
        };
        Self::syntax(src, offset, len, err.variant.message())
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(function: impl ToString, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            function: function.to_string(),
            message: message.into(),
        }
    }
}
