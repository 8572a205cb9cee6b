//! Turns raw words into final argument strings.
//!
//! Quotes are unwrapped, back-quoted spans are evaluated as commands and
//! unquoted `*` is expanded against the filesystem. One word may resolve to
//! zero, one or many arguments.

use crate::error::{ShellError, ShellResult};
use crate::glob::GlobArgument;
use crate::interpreter::Interpreter;
use log::trace;
use std::io::Read;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quote {
    Single,
    Double,
    Back,
}

/// Scanning state for one word.
#[derive(Default)]
struct WordState {
    /// Open quoting spans, innermost last.
    stack: Vec<Quote>,
    /// Text of each open back-quoted span, innermost last. Every `Back` on
    /// the stack owns exactly one buffer here.
    subs: Vec<String>,
    current: GlobArgument,
    done: Vec<GlobArgument>,
}

impl WordState {
    fn feed(&mut self, ch: char, shell: &mut Interpreter, stdin: &mut dyn Read) -> ShellResult<()> {
        match (self.stack.last().copied(), ch) {
            (Some(Quote::Single), '\'') => {
                self.stack.pop();
                self.close_quote('\'');
            }
            (Some(Quote::Single), c) => self.emit(c),

            (Some(Quote::Back), '`') => {
                self.stack.pop();
                self.finish_substitution(shell, stdin)?;
            }
            (Some(Quote::Double) | None, '`') => {
                self.stack.push(Quote::Back);
                self.subs.push(String::new());
            }

            (Some(Quote::Double), '"') => {
                self.stack.pop();
                self.close_quote('"');
            }
            (Some(Quote::Double), c) => self.emit(c),

            // Inside a sub-command quotes are kept for its own parser.
            (Some(Quote::Back), '\'') => {
                self.stack.push(Quote::Single);
                self.emit('\'');
            }
            (Some(Quote::Back), '"') => {
                self.stack.push(Quote::Double);
                self.emit('"');
            }
            (Some(Quote::Back), c) => self.emit(c),

            (None, '\'') => self.stack.push(Quote::Single),
            (None, '"') => self.stack.push(Quote::Double),
            (None, '*') => self.current.push_wildcard(),
            (None, c) => self.current.push_literal(c),
        }
        Ok(())
    }

    /// Quoted character: raw into the innermost sub-command, else literal.
    fn emit(&mut self, ch: char) {
        match self.subs.last_mut() {
            Some(buf) => buf.push(ch),
            None => self.current.push_literal(ch),
        }
    }

    fn close_quote(&mut self, quote: char) {
        match self.subs.last_mut() {
            Some(buf) => buf.push(quote),
            None => self.current.mark_quoted(),
        }
    }

    fn finish_substitution(
        &mut self,
        shell: &mut Interpreter,
        stdin: &mut dyn Read,
    ) -> ShellResult<()> {
        let text = self.subs.pop().unwrap_or_default();
        let output = shell.capture(&text, stdin)?;
        trace!("`{text}` produced {output:?}");

        if let Some(outer) = self.subs.last_mut() {
            // The enclosing span re-parses this text itself.
            outer.push_str(&output);
        } else if self.stack.last() == Some(&Quote::Double) {
            self.current.push_str(&output);
        } else {
            let mut words = output.split_whitespace();
            if let Some(first) = words.next() {
                self.current.push_str(first);
            }
            for word in words {
                self.done.push(std::mem::take(&mut self.current));
                self.current.push_str(word);
            }
        }
        Ok(())
    }

    fn finish(mut self, word: &str, shell: &Interpreter) -> ShellResult<Vec<String>> {
        if !self.stack.is_empty() {
            return Err(ShellError::syntax(format!("unmatched quote in {word}")));
        }
        if self.current.is_present() {
            self.done.push(self.current);
        }
        Ok(self
            .done
            .iter()
            .flat_map(|arg| arg.expand(shell.env()))
            .collect())
    }
}

/// Resolve a single raw word.
pub fn resolve_word(
    word: &str,
    shell: &mut Interpreter,
    stdin: &mut dyn Read,
) -> ShellResult<Vec<String>> {
    let mut state = WordState::default();
    for ch in word.chars() {
        state.feed(ch, shell, stdin)?;
    }
    state.finish(word, shell)
}

/// Resolve raw words in order, concatenating their results.
pub fn resolve_args(
    words: &[String],
    shell: &mut Interpreter,
    stdin: &mut dyn Read,
) -> ShellResult<Vec<String>> {
    let mut args = Vec::with_capacity(words.len());
    for word in words {
        args.extend(resolve_word(word, shell, stdin)?);
    }
    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Environment;
    use crate::testutil::{make_unique_temp_dir, write_file};
    use std::fs;
    use std::io::Cursor;

    fn shell_in(env: Environment) -> Interpreter {
        Interpreter::default().with_environment(env)
    }

    fn resolve(shell: &mut Interpreter, word: &str) -> Vec<String> {
        resolve_word(word, shell, &mut Cursor::new(Vec::new())).unwrap()
    }

    #[test]
    fn test_plain_word_is_identity() {
        let mut sh = shell_in(Environment::with_dir("/"));
        for word in ["hello", "-n", "a.b/c", "x=y", "üñí"] {
            assert_eq!(resolve(&mut sh, word), vec![word]);
        }
    }

    #[test]
    fn test_single_quotes_keep_everything_literal() {
        let mut sh = shell_in(Environment::with_dir("/"));
        assert_eq!(resolve(&mut sh, "'a*`echo x`\"b'"), vec!["a*`echo x`\"b"]);
        assert_eq!(resolve(&mut sh, "'a b'"), vec!["a b"]);
    }

    #[test]
    fn test_double_quotes_keep_text_but_run_substitution() {
        let mut sh = shell_in(Environment::with_dir("/"));
        assert_eq!(resolve(&mut sh, "\"a * 'b'\""), vec!["a * 'b'"]);
        assert_eq!(
            resolve(&mut sh, "\"x `echo a  b` y\""),
            vec!["x a b y"]
        );
    }

    #[test]
    fn test_empty_quotes_yield_empty_argument() {
        let mut sh = shell_in(Environment::with_dir("/"));
        assert_eq!(resolve(&mut sh, "''"), vec![""]);
        assert_eq!(resolve(&mut sh, "\"\""), vec![""]);
        assert_eq!(resolve(&mut sh, "a''b"), vec!["ab"]);
    }

    #[test]
    fn test_adjacent_spans_concatenate() {
        let mut sh = shell_in(Environment::with_dir("/"));
        assert_eq!(resolve(&mut sh, "'ab'cd\"ef\""), vec!["abcdef"]);
    }

    #[test]
    fn test_separate_substitutions_give_separate_arguments() {
        let mut sh = shell_in(Environment::with_dir("/"));
        let words = vec!["`echo 1`".to_string(), "`echo 2`".to_string()];
        let args = resolve_args(&words, &mut sh, &mut Cursor::new(Vec::new())).unwrap();
        assert_eq!(args, vec!["1", "2"]);
    }

    #[test]
    fn test_unquoted_substitution_is_split_and_spliced() {
        let mut sh = shell_in(Environment::with_dir("/"));
        assert_eq!(
            resolve(&mut sh, "pre`echo a b c`post"),
            vec!["prea", "b", "cpost"]
        );
    }

    #[test]
    fn test_substitution_newlines_become_spaces() {
        let mut sh = shell_in(Environment::with_dir("/"));
        assert_eq!(
            resolve(&mut sh, "\"`echo a; echo b`\""),
            vec!["a b"]
        );
    }

    #[test]
    fn test_empty_substitution_vanishes() {
        let mut sh = shell_in(Environment::with_dir("/"));
        assert!(resolve(&mut sh, "`echo -n`").is_empty());
        assert!(resolve(&mut sh, "``").is_empty());
    }

    #[test]
    fn test_nested_substitution() {
        let mut sh = shell_in(Environment::with_dir("/"));
        assert_eq!(resolve(&mut sh, "`echo \"`echo hi`\"`"), vec!["hi"]);
    }

    #[test]
    fn test_substitution_with_pipe() {
        let mut sh = shell_in(Environment::with_dir("/"));
        assert_eq!(
            resolve(&mut sh, "`echo abc | grep b`"),
            vec!["abc"]
        );
    }

    #[test]
    fn test_substitution_reads_inherited_stdin() {
        let mut sh = shell_in(Environment::with_dir("/"));
        let mut stdin = Cursor::new(b"piped text\n".to_vec());
        let args = resolve_word("`cat`", &mut sh, &mut stdin).unwrap();
        assert_eq!(args, vec!["piped", "text"]);
    }

    #[test]
    fn test_unknown_command_in_substitution_fails() {
        let mut sh = shell_in(Environment::with_dir("/"));
        let err = resolve_word("`nosuchcmd`", &mut sh, &mut Cursor::new(Vec::new())).unwrap_err();
        assert!(matches!(err, ShellError::Dispatch(_)));
    }

    #[test]
    fn test_unmatched_quote_in_word_fails() {
        let mut sh = shell_in(Environment::with_dir("/"));
        for word in ["'abc", "\"abc", "`abc"] {
            let err = resolve_word(word, &mut sh, &mut Cursor::new(Vec::new())).unwrap_err();
            assert!(matches!(err, ShellError::Syntax(_)));
        }
    }

    #[test]
    fn test_globbing_respects_quotes() {
        let dir = make_unique_temp_dir("resolver_glob");
        write_file(&dir, "file1.txt", "");
        write_file(&dir, "file2.txt", "");
        write_file(&dir, "my dir/a.txt", "");
        let mut sh = shell_in(Environment::with_dir(&dir));

        assert_eq!(resolve(&mut sh, "*.txt"), vec!["file1.txt", "file2.txt"]);
        assert_eq!(resolve(&mut sh, "'*'.txt"), vec!["*.txt"]);
        assert_eq!(resolve(&mut sh, "\"*.txt\""), vec!["*.txt"]);
        assert_eq!(resolve(&mut sh, "'my dir'/*"), vec!["my dir/a.txt"]);
        assert_eq!(resolve(&mut sh, "*.none"), vec!["*.none"]);

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_substituted_star_is_not_globbed() {
        let dir = make_unique_temp_dir("resolver_subst_star");
        write_file(&dir, "file1.txt", "");
        let mut sh = shell_in(Environment::with_dir(&dir));

        assert_eq!(resolve(&mut sh, "`echo '*'`"), vec!["*"]);

        fs::remove_dir_all(dir).unwrap();
    }
}
