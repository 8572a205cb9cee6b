//! A tiny, embeddable command processor with a shell-like grammar.
//!
//! Lines are split into simple commands, pipes (`|`) and sequences (`;`),
//! each word is resolved (quotes, back-quoted command substitution, `*`
//! globbing), `<`/`>` redirections are opened, and the resulting argument
//! lists are dispatched to a closed table of built-in commands.
//!
//! The main entry point is [`Interpreter`]. The public modules [`command`] and
//! [`env`] expose the traits and types commands are written against; the
//! pipeline stages ([`lexer`], [`parser`], [`resolver`], [`glob`],
//! [`redirect`]) are public for callers that want to drive them directly.

mod builtin;
pub mod command;
pub mod env;
pub mod error;
pub mod glob;
mod interpreter;
pub mod lexer;
pub mod parser;
pub mod redirect;
pub mod resolver;
#[cfg(test)]
mod testutil;

/// Just a convenient re-export of the command runner.
///
/// See [`Interpreter`] for the high-level API and examples.
pub use interpreter::Interpreter;

pub use command::{ExitCode, Status};
pub use error::{ShellError, ShellResult};
