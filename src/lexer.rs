//! Lexical analysis (tokenization) of one command line.
//!
//! A word is the longest run of adjacent spans, where a span is one of:
//! an unquoted run of ordinary characters, `'...'`, `"..."` (which may hold
//! back-quoted spans) or `` `...` ``. Words keep their quote characters;
//! unwrapping them is the resolver's job.

use crate::error::{ShellError, ShellResult};

/// Represents a token resulting from lexical analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Raw text of one shell word, quotes included.
    Word(String),
    /// The pipe operator, `|`.
    PipeOp,
    /// The sequence operator, `;`.
    Semicolon,
    /// Input redirection symbol, `<`.
    RedirectLeft,
    /// Output redirection symbol, `>`.
    RedirectRight,
}

impl Token {
    /// Shorthand for building a `Word` token.
    pub fn word(text: impl Into<String>) -> Self {
        Token::Word(text.into())
    }
}

/// Characters that end an unquoted run.
fn is_special(ch: char) -> bool {
    ch.is_whitespace() || matches!(ch, '\'' | '"' | '`' | '|' | ';' | '<' | '>')
}

struct Lexer {
    input: Vec<char>,
    pos: usize,
}

impl Lexer {
    /// Creates a new lexer positioned at the start of `line`.
    fn new(line: &str) -> Self {
        Lexer {
            input: line.chars().collect(),
            pos: 0,
        }
    }

    /// Performs lexical analysis on the input and returns the token stream.
    ///
    /// # Returns
    /// A `ShellResult<Vec<Token>>`: the tokens on success, or a syntax error
    /// when some character can start neither a word nor an operator, which is
    /// how an unterminated quote shows up.
    fn make_tokens(&mut self) -> ShellResult<Vec<Token>> {
        let mut out = Vec::new();

        loop {
            self.skip_whitespace();
            let Some(ch) = self.peek_char() else {
                break;
            };

            if let Some(word) = self.read_word() {
                out.push(Token::Word(word));
                continue;
            }

            let at = self.pos;
            self.read_char();
            let token = match ch {
                '|' => Token::PipeOp,
                ';' => Token::Semicolon,
                '<' => Token::RedirectLeft,
                '>' => Token::RedirectRight,
                '\'' | '"' | '`' => {
                    return Err(ShellError::syntax(format!(
                        "unmatched {ch} at position {at}"
                    )));
                }
                c => {
                    return Err(ShellError::syntax(format!(
                        "unexpected character {c:?} at position {at}"
                    )));
                }
            };
            out.push(token);
        }

        Ok(out)
    }

    fn read_char(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    /// Consume the longest run of adjacent spans starting at the cursor.
    fn read_word(&mut self) -> Option<String> {
        let start = self.pos;
        while let Some(end) = self.match_span(self.pos) {
            self.pos = end;
        }
        if self.pos > start {
            Some(self.input[start..self.pos].iter().collect())
        } else {
            None
        }
    }

    /// Index just past the span starting at `at`, if one starts there.
    fn match_span(&self, at: usize) -> Option<usize> {
        match *self.input.get(at)? {
            '\'' => self.find_closing(at + 1, '\''),
            '`' => self.match_back_quoted(at + 1),
            '"' => self.match_double_quoted(at + 1),
            c if is_special(c) => None,
            _ => {
                let len = self
                    .input[at..]
                    .iter()
                    .take_while(|c| !is_special(**c))
                    .count();
                Some(at + len)
            }
        }
    }

    /// Index just past the next `quote` at or after `from`.
    fn find_closing(&self, from: usize, quote: char) -> Option<usize> {
        self.input[from.min(self.input.len())..]
            .iter()
            .position(|c| *c == quote)
            .map(|i| from + i + 1)
    }

    /// Body of a double-quoted span; back-quoted spans inside it may hold `"`.
    fn match_double_quoted(&self, mut at: usize) -> Option<usize> {
        loop {
            match *self.input.get(at)? {
                '"' => return Some(at + 1),
                '`' => at = self.match_back_quoted(at + 1)?,
                _ => at += 1,
            }
        }
    }

    /// Body of a back-quoted span. A `` ` `` inside `"..."` opens a nested
    /// span; one inside `'...'` is plain text.
    fn match_back_quoted(&self, mut at: usize) -> Option<usize> {
        loop {
            match *self.input.get(at)? {
                '`' => return Some(at + 1),
                '"' => at = self.match_double_quoted(at + 1)?,
                '\'' => at = self.find_closing(at + 1, '\'')?,
                _ => at += 1,
            }
        }
    }
}

/// The main entry point function to perform lexical analysis.
///
/// # Arguments
/// * `line` - The string to be tokenized. It must not contain a newline.
///
/// # Returns
/// `ShellResult<Vec<Token>>`: the tokens on success, or `ShellError::Syntax`
/// for embedded newlines and unmatched quotes.
pub fn split_into_tokens(line: &str) -> ShellResult<Vec<Token>> {
    if line.contains('\n') {
        return Err(ShellError::syntax("newline inside command"));
    }
    Lexer::new(line).make_tokens()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(items: &[&str]) -> Vec<Token> {
        items.iter().map(|s| Token::word(*s)).collect()
    }

    #[test]
    fn test_plain_words_split_on_whitespace() {
        let tokens = split_into_tokens("  echo hello\tworld ").unwrap();
        assert_eq!(tokens, words(&["echo", "hello", "world"]));
    }

    #[test]
    fn test_operators_are_standalone() {
        let tokens = split_into_tokens("cat<in.txt|wc;echo a>out").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::word("cat"),
                Token::RedirectLeft,
                Token::word("in.txt"),
                Token::PipeOp,
                Token::word("wc"),
                Token::Semicolon,
                Token::word("echo"),
                Token::word("a"),
                Token::RedirectRight,
                Token::word("out"),
            ]
        );
    }

    #[test]
    fn test_adjacent_spans_form_one_word() {
        let tokens = split_into_tokens("echo 'ab'cd\"e f\"`echo g`").unwrap();
        assert_eq!(tokens, words(&["echo", "'ab'cd\"e f\"`echo g`"]));
    }

    #[test]
    fn test_quotes_hide_operators() {
        let tokens = split_into_tokens("echo 'a|b;c' \"<x>\"").unwrap();
        assert_eq!(tokens, words(&["echo", "'a|b;c'", "\"<x>\""]));
    }

    #[test]
    fn test_back_quote_inside_double_quote_may_hold_double_quote() {
        let tokens = split_into_tokens("echo \"a `echo \"b\"` c\"").unwrap();
        assert_eq!(tokens, words(&["echo", "\"a `echo \"b\"` c\""]));
    }

    #[test]
    fn test_nested_back_quotes_inside_double_quotes() {
        let tokens = split_into_tokens("echo `echo \"`echo hi`\"` done").unwrap();
        assert_eq!(tokens, words(&["echo", "`echo \"`echo hi`\"`", "done"]));
    }

    #[test]
    fn test_single_quoted_back_quote_does_not_close_span() {
        let tokens = split_into_tokens("echo `echo '`'` x").unwrap();
        assert_eq!(tokens, words(&["echo", "`echo '`'`", "x"]));
    }

    #[test]
    fn test_unmatched_quotes_fail() {
        for line in ["echo 'abc", "echo \"abc", "echo `abc", "echo a'b", "echo \"a `b\""] {
            let err = split_into_tokens(line).unwrap_err();
            assert!(matches!(err, ShellError::Syntax(_)), "{line}");
        }
    }

    #[test]
    fn test_newline_always_fails() {
        for line in ["echo a\necho b", "\n", "'a\nb'"] {
            assert!(matches!(
                split_into_tokens(line),
                Err(ShellError::Syntax(_))
            ));
        }
    }

    #[test]
    fn test_blank_line_has_no_tokens() {
        assert!(split_into_tokens("   ").unwrap().is_empty());
    }
}
