//! Extraction of `<file` / `>file` from a simple command.

use crate::env::Environment;
use crate::error::{ShellError, ShellResult};
use crate::interpreter::Interpreter;
use crate::lexer::Token;
use crate::resolver;
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

/// Streams a simple command runs with, plus the words left for the resolver.
///
/// Opened files are closed when the value is dropped, which happens when the
/// owning evaluation returns on any path.
#[derive(Debug, Default)]
pub struct Redirection {
    /// Raw words that were not part of a redirection, in source order.
    pub words: Vec<String>,
    /// File named by `<`, replacing the inherited stdin.
    pub input: Option<File>,
    /// File named by `>`, replacing the inherited stdout.
    pub output: Option<File>,
}

/// Pull redirections out of `tokens` and open their files.
///
/// Targets are resolved like any other word (quotes, globs, substitution)
/// and must come out as exactly one argument.
pub fn extract(
    tokens: &[Token],
    shell: &mut Interpreter,
    stdin: &mut dyn Read,
) -> ShellResult<Redirection> {
    let mut plan = Redirection::default();
    let mut pos = 0;

    while let Some(token) = tokens.get(pos) {
        let op = match token {
            Token::Word(word) => {
                plan.words.push(word.clone());
                pos += 1;
                continue;
            }
            Token::RedirectLeft => '<',
            Token::RedirectRight => '>',
            other => {
                return Err(ShellError::syntax(format!(
                    "unexpected {other:?} inside a command"
                )));
            }
        };

        if pos == 0 {
            return Err(ShellError::syntax(format!(
                "command cannot start with '{op}'"
            )));
        }
        let Some(Token::Word(target)) = tokens.get(pos + 1) else {
            return Err(ShellError::syntax(format!("missing file name after '{op}'")));
        };

        let slot = if op == '<' {
            &mut plan.input
        } else {
            &mut plan.output
        };
        if slot.is_some() {
            let which = if op == '<' { "input" } else { "output" };
            return Err(ShellError::syntax(format!("multiple {which} redirections")));
        }

        let path = single_target(target, shell, stdin)?;
        *slot = Some(open(shell.env(), op, path)?);
        pos += 2;
    }

    Ok(plan)
}

fn single_target(
    target: &str,
    shell: &mut Interpreter,
    stdin: &mut dyn Read,
) -> ShellResult<String> {
    let mut resolved = resolver::resolve_word(target, shell, stdin)?;
    if resolved.len() != 1 {
        return Err(ShellError::syntax(format!("ambiguous redirect: {target}")));
    }
    Ok(resolved.remove(0))
}

fn open(env: &Environment, op: char, name: String) -> ShellResult<File> {
    let full = env.resolve(&name);
    let opened = if op == '<' {
        File::open(&full)
    } else {
        File::create(&full)
    };
    log::debug!("redirect {op} {}", full.display());
    opened.map_err(|source| ShellError::Stream {
        path: PathBuf::from(name),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{self, Command};
    use crate::testutil::{make_unique_temp_dir, write_file};
    use std::fs;
    use std::io::Cursor;

    fn tokens_of(line: &str) -> Vec<Token> {
        match parser::parse(line).unwrap() {
            Command::Simple(tokens) => tokens,
            other => panic!("expected simple command, got {other:?}"),
        }
    }

    fn extract_in(dir: &std::path::Path, tokens: &[Token]) -> ShellResult<Redirection> {
        let mut sh = Interpreter::default().with_environment(Environment::with_dir(dir));
        extract(tokens, &mut sh, &mut Cursor::new(Vec::new()))
    }

    #[test]
    fn test_output_redirection_is_stripped() {
        let dir = make_unique_temp_dir("redirect_out");
        write_file(&dir, "out.txt", "old content");

        let plan = extract_in(&dir, &tokens_of("cat file1.txt file2.txt > out.txt")).unwrap();
        assert_eq!(plan.words, vec!["cat", "file1.txt", "file2.txt"]);
        assert!(plan.input.is_none());
        assert!(plan.output.is_some());
        drop(plan);
        assert_eq!(fs::read_to_string(dir.join("out.txt")).unwrap(), "");

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_input_redirection_opens_file() {
        let dir = make_unique_temp_dir("redirect_in");
        write_file(&dir, "in.txt", "hello\n");

        let mut plan = extract_in(&dir, &tokens_of("cat <in.txt -n")).unwrap();
        assert_eq!(plan.words, vec!["cat", "-n"]);
        let mut text = String::new();
        plan.input.as_mut().unwrap().read_to_string(&mut text).unwrap();
        assert_eq!(text, "hello\n");

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_quoted_target_is_resolved() {
        let dir = make_unique_temp_dir("redirect_quoted");
        let plan = extract_in(&dir, &tokens_of("echo > 'my file.txt'")).unwrap();
        assert!(plan.output.is_some());
        assert!(dir.join("my file.txt").exists());
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_leading_redirection_fails() {
        let dir = make_unique_temp_dir("redirect_leading");
        let tokens = vec![Token::RedirectLeft, Token::word("in.txt"), Token::word("cat")];
        assert!(matches!(extract_in(&dir, &tokens), Err(ShellError::Syntax(_))));
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_missing_target_fails() {
        let dir = make_unique_temp_dir("redirect_missing");
        for line in ["cat >", "cat < > x", "cat > < x"] {
            assert!(
                matches!(extract_in(&dir, &tokens_of(line)), Err(ShellError::Syntax(_))),
                "{line}"
            );
        }
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_ambiguous_target_fails() {
        let dir = make_unique_temp_dir("redirect_ambiguous");
        write_file(&dir, "a.txt", "");
        write_file(&dir, "b.txt", "");
        let err = extract_in(&dir, &tokens_of("cat < *.txt")).unwrap_err();
        assert!(matches!(err, ShellError::Syntax(_)));
        let err = extract_in(&dir, &tokens_of("cat > `echo x y`")).unwrap_err();
        assert!(matches!(err, ShellError::Syntax(_)));
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_multiple_streams_fail() {
        let dir = make_unique_temp_dir("redirect_multiple");
        write_file(&dir, "a.txt", "");
        write_file(&dir, "b.txt", "");
        for line in ["cat < a.txt < b.txt", "cat > x.txt > y.txt"] {
            assert!(
                matches!(extract_in(&dir, &tokens_of(line)), Err(ShellError::Syntax(_))),
                "{line}"
            );
        }
        assert!(!dir.join("y.txt").exists());
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_missing_input_file_is_stream_error() {
        let dir = make_unique_temp_dir("redirect_nofile");
        let err = extract_in(&dir, &tokens_of("cat < nope.txt")).unwrap_err();
        assert!(matches!(err, ShellError::Stream { .. }));
        assert!(err.to_string().starts_with("nope.txt: "));
        fs::remove_dir_all(dir).unwrap();
    }
}
