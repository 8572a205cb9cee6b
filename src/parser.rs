use crate::error::{ShellError, ShellResult};
use crate::lexer::{self, Token};

/// AST node for the shell
///
/// Built once per parsed line and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// A **simple command**: raw words plus any `<`/`>` operators, in source
    /// order. Never empty; holds no `PipeOp` or `Semicolon`.
    Simple(Vec<Token>),

    /// A **pipeline** of at least two simple commands connected by `|`.
    Pipe(Vec<Command>),

    /// A **sequence** of at least one simple command or pipeline separated by `;`.
    Sequence(Vec<Command>),
}

struct AstBuilder {
    tokens: Vec<Token>,
    pos: usize,
    /// Tokens of the simple command being collected.
    current: Vec<Token>,
    /// Finished stages of the pipeline being collected.
    stages: Vec<Command>,
    /// Finished steps of the enclosing sequence.
    steps: Vec<Command>,
}

impl AstBuilder {
    fn from(tokens: Vec<Token>) -> Self {
        AstBuilder {
            tokens,
            pos: 0,
            current: Vec::new(),
            stages: Vec::new(),
            steps: Vec::new(),
        }
    }

    fn consume(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn build_ast(mut self) -> ShellResult<Command> {
        if self.tokens.is_empty() {
            return Err(ShellError::syntax("empty command"));
        }
        if let Some(first) = self.tokens.first().filter(|t| !matches!(t, Token::Word(_))) {
            return Err(ShellError::syntax(format!(
                "command cannot start with {}",
                describe(first)
            )));
        }

        while let Some(token) = self.consume() {
            match token {
                Token::PipeOp => {
                    let stage = self.close_simple(&token)?;
                    self.stages.push(stage);
                }
                Token::Semicolon => {
                    let step = self.close_step(&token)?;
                    self.steps.push(step);
                }
                other => self.current.push(other),
            }
        }

        self.finish()
    }

    /// Turn the collected tokens into a `Simple`; `op` is the operator that ended it.
    fn close_simple(&mut self, op: &Token) -> ShellResult<Command> {
        if self.current.is_empty() {
            return Err(ShellError::syntax(format!(
                "unexpected {} with no command before it",
                describe(op)
            )));
        }
        Ok(Command::Simple(std::mem::take(&mut self.current)))
    }

    /// Close the simple command and, if stages are pending, the pipeline around it.
    fn close_step(&mut self, op: &Token) -> ShellResult<Command> {
        let last = self.close_simple(op)?;
        if self.stages.is_empty() {
            Ok(last)
        } else {
            let mut stages = std::mem::take(&mut self.stages);
            stages.push(last);
            Ok(Command::Pipe(stages))
        }
    }

    fn finish(mut self) -> ShellResult<Command> {
        if !self.current.is_empty() {
            let step = self.close_step(&Token::Semicolon)?;
            self.steps.push(step);
        } else if !self.stages.is_empty() {
            return Err(ShellError::syntax("missing command after |"));
        }

        if self.steps.len() == 1 && !self.saw_semicolon() {
            Ok(self.steps.remove(0))
        } else {
            Ok(Command::Sequence(self.steps))
        }
    }

    /// True when `;` occurred anywhere, i.e. the line is a sequence even with one step.
    fn saw_semicolon(&self) -> bool {
        self.tokens.iter().any(|t| *t == Token::Semicolon)
    }
}

fn describe(token: &Token) -> &'static str {
    match token {
        Token::Word(_) => "word",
        Token::PipeOp => "'|'",
        Token::Semicolon => "';'",
        Token::RedirectLeft => "'<'",
        Token::RedirectRight => "'>'",
    }
}

/// Constructs the command tree from a vector of tokens.
///
/// # Arguments
///
/// * `tokens` - The sequence of tokens produced by [`lexer::split_into_tokens`].
///
/// # Returns
///
/// * `ShellResult<Command>` - The root of the tree, or `ShellError::Syntax`
///   when an operator is misplaced.
pub fn construct_ast(tokens: Vec<Token>) -> ShellResult<Command> {
    AstBuilder::from(tokens).build_ast()
}

/// Tokenize and parse one command line.
pub fn parse(line: &str) -> ShellResult<Command> {
    let tokens = lexer::split_into_tokens(line)?;
    let ast = construct_ast(tokens)?;
    log::debug!("parsed {line:?} into {ast:?}");
    Ok(ast)
}
