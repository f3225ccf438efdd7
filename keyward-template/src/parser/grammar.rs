//! Pest grammar parser for username templates.

use pest_derive::Parser;

/// The username template parser.
#[derive(Parser)]
#[grammar = "parser/username.pest"]
pub struct UsernameParser;
