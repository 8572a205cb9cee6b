use crate::command::{CommandFactory, ExitCode, Status};
use crate::env::Environment;
use crate::error::{ShellError, ShellResult};
use crate::lexer::Token;
use crate::parser::{self, Command};
use crate::redirect::{self, Redirection};
use crate::resolver;
use log::{debug, warn};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::{Cursor, Read, Write};

/// Factory allows creating instances of ExecutableCommand.
///
/// Only supports commands defined in this crate, see `BuiltinCommand`.
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

/// A minimal shell-like interpreter over a closed table of built-in commands.
///
/// The interpreter maintains an [`Environment`] and a list of [`CommandFactory`] objects
/// that are queried to create commands by name. See [`Default`] for the built-in
/// factories included out of the box.
///
/// Example
/// ```
/// use minish::{Interpreter, Status};
/// let mut sh = Interpreter::default();
/// let mut out = Vec::new();
/// let status = sh.eval("echo hello | grep hell", &mut std::io::empty(), &mut out).unwrap();
/// assert_eq!(status, Status::Success);
/// assert_eq!(out, b"hello\n");
/// ```
pub struct Interpreter {
    env: Environment,
    commands: Vec<Box<dyn CommandFactory>>,
}

impl Interpreter {
    /// Create a new interpreter with a custom set of command factories.
    pub fn new(commands: Vec<Box<dyn CommandFactory>>) -> Self {
        Self {
            env: Environment::new(),
            commands,
        }
    }

    /// Replace the environment, e.g. to start in another directory.
    pub fn with_environment(mut self, env: Environment) -> Self {
        self.env = env;
        self
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// Run a single command invocation by name with already resolved arguments.
    pub fn run(
        &mut self,
        name: &str,
        args: &[&str],
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
    ) -> ShellResult<Status> {
        debug!("dispatch {name} {args:?}");
        for factory in &self.commands {
            if let Some(cmd) = factory.try_create(&self.env, name, args) {
                return cmd.execute(stdin, stdout, &mut self.env);
            }
        }
        Err(ShellError::Dispatch(name.to_string()))
    }

    /// Parse and evaluate one command line.
    pub fn eval(
        &mut self,
        line: &str,
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
    ) -> ShellResult<Status> {
        let ast = parser::parse(line)?;
        self.execute(&ast, stdin, stdout)
    }

    pub fn execute(
        &mut self,
        command: &Command,
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
    ) -> ShellResult<Status> {
        match command {
            Command::Simple(tokens) => self.execute_simple(tokens, stdin, stdout),
            Command::Pipe(stages) => self.execute_pipe(stages, stdin, stdout),
            Command::Sequence(steps) => self.execute_sequence(steps, stdin, stdout),
        }
    }

    fn execute_simple(
        &mut self,
        tokens: &[Token],
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
    ) -> ShellResult<Status> {
        let Redirection {
            words,
            mut input,
            mut output,
        } = redirect::extract(tokens, self, stdin)?;
        let args = resolver::resolve_args(&words, self, stdin)?;

        let Some((name, rest)) = args.split_first() else {
            return Ok(Status::Success);
        };
        let rest: Vec<&str> = rest.iter().map(String::as_str).collect();

        let stdin: &mut dyn Read = match input.as_mut() {
            Some(file) => file,
            None => stdin,
        };
        let stdout: &mut dyn Write = match output.as_mut() {
            Some(file) => file,
            None => stdout,
        };
        let status = self.run(name, &rest, stdin, stdout)?;
        stdout.flush()?;
        Ok(status)
    }

    fn execute_pipe(
        &mut self,
        stages: &[Command],
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
    ) -> ShellResult<Status> {
        let Some((last, init)) = stages.split_last() else {
            return Ok(Status::Success);
        };

        let mut carried: Option<Vec<u8>> = None;
        for stage in init {
            let mut out = Vec::new();
            let status = match carried.take() {
                Some(buf) => self.execute(stage, &mut Cursor::new(buf), &mut out)?,
                None => self.execute(stage, stdin, &mut out)?,
            };
            if status.is_exit() {
                return Ok(status);
            }
            carried = Some(out);
        }

        match carried {
            Some(buf) => self.execute(last, &mut Cursor::new(buf), stdout),
            None => self.execute(last, stdin, stdout),
        }
    }

    fn execute_sequence(
        &mut self,
        steps: &[Command],
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
    ) -> ShellResult<Status> {
        let mut buffers: Vec<Vec<u8>> = Vec::with_capacity(steps.len());
        let mut exit: Option<ExitCode> = None;

        for step in steps {
            let mut out = Vec::new();
            match self.execute(step, stdin, &mut out) {
                Ok(Status::Success) => {}
                Ok(Status::Exit(code)) => {
                    exit.get_or_insert(code);
                }
                // With termination pending, every later failure is reported inline.
                Err(e) if e.is_recoverable() || exit.is_some() => {
                    warn!("sequence step failed: {e}");
                    out = format!("{e}\n").into_bytes();
                }
                Err(e) => {
                    for buf in &buffers {
                        stdout.write_all(buf)?;
                    }
                    return Err(e);
                }
            }
            buffers.push(out);
        }

        for buf in &buffers {
            stdout.write_all(buf)?;
        }
        stdout.flush()?;
        Ok(exit.map_or(Status::Success, Status::Exit))
    }

    /// Evaluate the text of a back-quoted span and return what it printed.
    ///
    /// Trailing newlines are dropped and inner ones become spaces. An `exit`
    /// inside the span ends only the span.
    pub(crate) fn capture(&mut self, text: &str, stdin: &mut dyn Read) -> ShellResult<String> {
        if text.trim().is_empty() {
            return Ok(String::new());
        }
        let mut out = Vec::new();
        if let Status::Exit(code) = self.eval(text, stdin, &mut out)? {
            debug!("exit {code} inside `{text}` ignored");
        }
        let printed = String::from_utf8_lossy(&out);
        Ok(printed.trim_end_matches('\n').replace('\n', " "))
    }

    /// Interactive loop over the terminal.
    ///
    /// Returns the code passed to `exit`, or 0 on end of input.
    pub fn repl(&mut self, prompt: &str) -> anyhow::Result<ExitCode> {
        let mut rl = DefaultEditor::new()?;

        loop {
            match rl.readline(prompt) {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    rl.add_history_entry(line.as_str())?;
                    let stdin = std::io::stdin();
                    let stdout = std::io::stdout();
                    match self.eval(&line, &mut stdin.lock(), &mut stdout.lock()) {
                        Ok(Status::Success) => {}
                        Ok(Status::Exit(code)) => return Ok(code),
                        Err(e) => eprintln!("{e}"),
                    }
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => return Ok(0),
                Err(err) => return Err(err.into()),
            }
        }
    }
}

impl Default for Interpreter {
    /// Create an interpreter with every built-in registered.
    fn default() -> Self {
        use crate::builtin::*;
        Self::new(vec![
            Box::new(Factory::<Pwd>::default()),
            Box::new(Factory::<Cd>::default()),
            Box::new(Factory::<Echo>::default()),
            Box::new(Factory::<Exit>::default()),
            Box::new(Factory::<Cat>::default()),
            Box::new(Factory::<WC>::default()),
            Box::new(Factory::<Grep>::default()),
            Box::new(Factory::<Head>::default()),
            Box::new(Factory::<Tail>::default()),
            Box::new(Factory::<Uniq>::default()),
            Box::new(Factory::<Ls>::default()),
            Box::new(Factory::<Tee>::default()),
            Box::new(Factory::<Rm>::default()),
            Box::new(Factory::<Mkdir>::default()),
            Box::new(Factory::<Paste>::default()),
            Box::new(Factory::<Cp>::default()),
            Box::new(Factory::<Mv>::default()),
            Box::new(Factory::<Split>::default()),
        ])
    }
}
