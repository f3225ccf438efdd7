//! Username template language for Keyward.
//!
//! Templates are literal text interleaved with `{{ ... }}` actions. An action
//! is a pipeline of commands joined by `|`; the output of each command is
//! passed as the last argument of the next.
//!
//! ```text
//! {{ printf "v-%s-%s" (.DisplayName | truncate 8) (random 15) | truncate 32 }}
//! ```
//!
//! # Fields
//!
//! - `.DisplayName` - display name of the requester
//! - `.RoleName` - name of the role
//!
//! # Functions
//!
//! | Function | Arguments | Result |
//! |---|---|---|
//! | `truncate` | `N input` | first N characters of input |
//! | `random` | `N` | N random alphanumeric characters |
//! | `uppercase` / `lowercase` | `input` | case-converted input |
//! | `replace` | `old new input` | input with every `old` replaced |
//! | `unix_time` / `unix_time_millis` | | current time since the epoch |
//! | `uuid` | | random v4 UUID |
//! | `printf` | `format args...` | `%s`, `%d`, `%v` and `%%` formatting |
//!
//! Unknown functions, wrong argument counts and non-literal lengths are all
//! rejected when the template is parsed.
//!
//! # Example
//!
//! ```rust
//! use keyward_template::{TemplateInput, UsernameGenerator};
//!
//! let generator = UsernameGenerator::new("{{ .RoleName | uppercase }}-{{ random 4 }}").unwrap();
//! let username = generator.generate(&TemplateInput::new("token", "reader"));
//! assert!(username.starts_with("READER-"));
//! assert_eq!(username.len(), 11);
//! ```

pub mod ast;
pub mod error;
pub mod generator;
pub mod parser;
pub mod template;

pub use ast::{Function, TemplateInput};
pub use error::{TemplateError, TemplateResult};
pub use generator::{DEFAULT_USERNAME_TEMPLATE, UsernameGenerator, validate_username};
pub use template::Template;
