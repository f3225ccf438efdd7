//! Parsed username template.
//!
//! The parser resolves every function name, checks every argument count and
//! every integer argument up front, so rendering a parsed template cannot
//! fail.

use std::fmt;

/// Inputs a template can read through fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TemplateInput<'a> {
    /// Value of `.DisplayName`.
    pub display_name: &'a str,
    /// Value of `.RoleName`.
    pub role_name: &'a str,
}

impl<'a> TemplateInput<'a> {
    /// Create template input.
    pub fn new(display_name: &'a str, role_name: &'a str) -> Self {
        Self {
            display_name,
            role_name,
        }
    }
}

/// A top-level piece of a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Literal text copied to the output.
    Text(String),
    /// A `{{ ... }}` action.
    Action(Pipeline),
}

/// Commands chained with `|`. The output of each command is passed as the
/// last argument of the next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    /// The commands, in order. Never empty.
    pub commands: Vec<Command>,
}

/// One stage of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// A function call.
    Call(Call),
    /// A bare value. Only valid as the first command of a pipeline.
    Value(Operand),
}

/// A value appearing in a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// `.DisplayName` or `.RoleName`.
    Field(Field),
    /// A quoted string literal.
    Str(String),
    /// An integer literal.
    Int(i64),
    /// A parenthesized sub-pipeline.
    Group(Box<Pipeline>),
    /// A function taking no arguments, used as a value.
    Call(Box<Call>),
}

/// An argument slot of a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    /// An explicit operand.
    Operand(Operand),
    /// The output of the previous pipeline command.
    Piped,
}

/// Fields readable from [`TemplateInput`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// `.DisplayName`
    DisplayName,
    /// `.RoleName`
    RoleName,
}

impl Field {
    /// Resolve a field by name (without the leading dot).
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "DisplayName" => Some(Self::DisplayName),
            "RoleName" => Some(Self::RoleName),
            _ => None,
        }
    }
}

/// The closed set of template functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    /// `truncate N input` - keep the first N characters.
    Truncate,
    /// `random N` - N random alphanumeric characters.
    Random,
    /// `uppercase input`
    Uppercase,
    /// `lowercase input`
    Lowercase,
    /// `replace old new input`
    Replace,
    /// `unix_time` - seconds since the epoch.
    UnixTime,
    /// `unix_time_millis` - milliseconds since the epoch.
    UnixTimeMillis,
    /// `uuid` - a random v4 UUID.
    Uuid,
    /// `printf format args...`
    Printf,
}

impl Function {
    /// All functions.
    pub const ALL: [Function; 9] = [
        Self::Truncate,
        Self::Random,
        Self::Uppercase,
        Self::Lowercase,
        Self::Replace,
        Self::UnixTime,
        Self::UnixTimeMillis,
        Self::Uuid,
        Self::Printf,
    ];

    /// Resolve a function by name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    /// The function's template name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Truncate => "truncate",
            Self::Random => "random",
            Self::Uppercase => "uppercase",
            Self::Lowercase => "lowercase",
            Self::Replace => "replace",
            Self::UnixTime => "unix_time",
            Self::UnixTimeMillis => "unix_time_millis",
            Self::Uuid => "uuid",
            Self::Printf => "printf",
        }
    }

    /// Number of arguments, or `None` for variadic functions.
    pub fn arity(&self) -> Option<usize> {
        match self {
            Self::UnixTime | Self::UnixTimeMillis | Self::Uuid => Some(0),
            Self::Random | Self::Uppercase | Self::Lowercase => Some(1),
            Self::Truncate => Some(2),
            Self::Replace => Some(3),
            Self::Printf => None,
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A resolved function call with its arguments bound to slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// `truncate`
    Truncate {
        /// Maximum length in characters.
        len: usize,
        /// Input string.
        input: Arg,
    },
    /// `random`
    Random {
        /// Number of characters.
        len: usize,
    },
    /// `uppercase`
    Uppercase(Arg),
    /// `lowercase`
    Lowercase(Arg),
    /// `replace`
    Replace {
        /// Substring to replace.
        from: Arg,
        /// Replacement.
        to: Arg,
        /// Input string.
        input: Arg,
    },
    /// `unix_time`
    UnixTime,
    /// `unix_time_millis`
    UnixTimeMillis,
    /// `uuid`
    Uuid,
    /// `printf`
    Printf {
        /// The format string, split around its verbs.
        format: Vec<FormatPiece>,
        /// One argument per verb.
        args: Vec<Arg>,
    },
}

/// A piece of a `printf` format string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatPiece {
    /// Literal text.
    Literal(String),
    /// A `%s`, `%d` or `%v` verb.
    Verb,
}
