//! Username generation.

use tracing::debug;

use crate::ast::TemplateInput;
use crate::error::TemplateResult;
use crate::template::{Template, truncate_chars};

/// The default username template.
///
/// Produces `v-<display:8>-<role:8>-<random:15>-<unix time>`, truncated to
/// 32 characters.
pub const DEFAULT_USERNAME_TEMPLATE: &str = r#"{{ printf "v-%s-%s-%s-%s" (.DisplayName | truncate 8) (.RoleName | truncate 8) (random 15) (unix_time) | truncate 32 }}"#;

/// Generates usernames from a parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsernameGenerator {
    template: Template,
    max_length: Option<usize>,
}

impl UsernameGenerator {
    /// Parse `source` into a generator.
    pub fn new(source: &str) -> TemplateResult<Self> {
        Ok(Self {
            template: Template::parse(source)?,
            max_length: None,
        })
    }

    /// Parse `source`, falling back to [`DEFAULT_USERNAME_TEMPLATE`] when empty.
    pub fn from_optional(source: Option<&str>) -> TemplateResult<Self> {
        match source {
            Some(s) if !s.trim().is_empty() => Self::new(s),
            _ => Self::new(DEFAULT_USERNAME_TEMPLATE),
        }
    }

    /// Truncate every generated username to at most `max` characters.
    pub fn with_max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }

    /// The overall length limit, if any.
    pub fn max_length(&self) -> Option<usize> {
        self.max_length
    }

    /// The underlying template.
    pub fn template(&self) -> &Template {
        &self.template
    }

    /// Generate a username.
    pub fn generate(&self, input: &TemplateInput<'_>) -> String {
        let rendered = self.template.render(input);
        let username = match self.max_length {
            Some(max) => truncate_chars(&rendered, max),
            None => rendered,
        };
        debug!(length = username.len(), "Generated username");
        username
    }
}

/// Check whether `username` matches the regular expression `pattern`.
///
/// An invalid pattern never matches.
pub fn validate_username(username: &str, pattern: &str) -> bool {
    regex_lite::Regex::new(pattern)
        .map(|re| re.is_match(username))
        .unwrap_or(false)
}
