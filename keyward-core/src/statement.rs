//! Templated SQL statement handling.
//!
//! A statement template is expanded in two steps: [`Placeholders::apply`]
//! replaces `{{token}}` markers, then [`split_statements`] breaks the result
//! into fragments that are executed one at a time.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

/// Format used for the `{{expiration}}` placeholder.
pub const EXPIRATION_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format an expiration timestamp for substitution into a statement.
pub fn format_expiration(expiration: &DateTime<Utc>) -> String {
    expiration.format(EXPIRATION_FORMAT).to_string()
}

/// Values substituted into statement templates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Placeholders {
    values: BTreeMap<&'static str, String>,
}

impl Placeholders {
    /// Create an empty placeholder map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Placeholders for a user: `{{name}}` and its alias `{{username}}`.
    pub fn for_user(username: &str) -> Self {
        Self::new()
            .with("name", username)
            .with("username", username)
    }

    /// Add `{{password}}`.
    pub fn password(self, password: &str) -> Self {
        self.with("password", password)
    }

    /// Add `{{expiration}}`.
    pub fn expiration(self, expiration: &DateTime<Utc>) -> Self {
        self.with("expiration", format_expiration(expiration))
    }

    /// Add an arbitrary placeholder.
    pub fn with(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.values.insert(key, value.into());
        self
    }

    /// Get a placeholder value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Replace every `{{key}}` marker in `statement`.
    ///
    /// The template is scanned once, left to right. Substituted values are
    /// never rescanned, so a value that itself contains a marker is emitted
    /// verbatim. Unknown markers are left untouched.
    pub fn apply(&self, statement: &str) -> String {
        let mut out = String::with_capacity(statement.len());
        let mut rest = statement;

        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let tail = &rest[start..];
            let value = tail[2..]
                .find("}}")
                .and_then(|end| self.get(&tail[2..2 + end]).map(|value| (value, end + 4)));
            match value {
                Some((value, consumed)) => {
                    out.push_str(value);
                    rest = &tail[consumed..];
                }
                None => {
                    out.push('{');
                    rest = &tail[1..];
                }
            }
        }
        out.push_str(rest);
        out
    }
}

/// Split `input` on semicolons that are not inside a quoted region.
///
/// A quoted region opens on the first `'` or `"` and closes on the next quote
/// of the same kind; there is no escape handling. Fragments are trimmed and
/// empty fragments are dropped, so blank input yields an empty list.
pub fn split_statements(input: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for ch in input.chars() {
        match ch {
            '\'' | '"' => {
                match quote {
                    None => quote = Some(ch),
                    Some(open) if open == ch => quote = None,
                    Some(_) => {}
                }
                current.push(ch);
            }
            ';' if quote.is_none() => {
                push_trimmed(&mut statements, &current);
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    push_trimmed(&mut statements, &current);

    statements
}

fn push_trimmed(statements: &mut Vec<String>, fragment: &str) {
    let fragment = fragment.trim();
    if !fragment.is_empty() {
        statements.push(fragment.to_string());
    }
}
