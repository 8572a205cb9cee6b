use crate::command::{CommandFactory, ExecutableCommand, ExitCode, Status};
use crate::env::Environment;
use crate::error::{ShellError, ShellResult};
use crate::interpreter::Factory;
use anyhow::{Context, Result, bail};
use argh::{EarlyExit, FromArgs};
use regex::RegexBuilder;
use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Write};
use std::path::PathBuf;

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in-process. Failures are reported with `anyhow`; the dispatch boundary labels
/// them with the command's name.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "echo" or "cd".
    fn name() -> &'static str;

    /// Executes the command using provided IO streams and environment.
    fn execute(
        self,
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<Status>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(
        self: Box<Self>,
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> ShellResult<Status> {
        T::execute(*self, stdin, stdout, env).map_err(|e| ShellError::Application {
            name: T::name().to_string(),
            message: format!("{}: {:#}", T::name(), e),
        })
    }
}

/// Stand-in for a builtin whose arguments argh refused, or that was asked for `--help`.
struct InvalidArgs {
    name: &'static str,
    output: String,
    is_error: bool,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(
        self: Box<Self>,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        _env: &mut Environment,
    ) -> ShellResult<Status> {
        if self.is_error {
            return Err(ShellError::Application {
                name: self.name.to_string(),
                message: format!("{}: {}", self.name, self.output.trim_end()),
            });
        }
        stdout.write_all(self.output.as_bytes())?;
        Ok(Status::Success)
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn try_create(
        &self,
        _env: &Environment,
        name: &str,
        args: &[&str],
    ) -> Option<Box<dyn ExecutableCommand>> {
        if name == T::name() {
            Some(match T::from_args(&[name], args) {
                Ok(cmd) => Box::new(cmd),
                Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
                    name: T::name(),
                    output,
                    is_error: status.is_err(),
                }),
            })
        } else {
            None
        }
    }
}

fn open_file(env: &Environment, name: &str) -> Result<File> {
    File::open(env.resolve(name)).with_context(|| name.to_string())
}

/// Whole text of `file`, or of stdin when no file is given.
fn read_source(env: &Environment, file: Option<&str>, stdin: &mut dyn Read) -> Result<String> {
    let mut buf = String::new();
    match file {
        Some(name) => {
            open_file(env, name)?
                .read_to_string(&mut buf)
                .with_context(|| name.to_string())?;
        }
        None => {
            stdin.read_to_string(&mut buf).context("stdin")?;
        }
    }
    Ok(buf)
}

#[derive(FromArgs)]
/// Print the current working directory to standard output.
pub struct Pwd {}

impl BuiltinCommand for Pwd {
    fn name() -> &'static str {
        "pwd"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<Status> {
        writeln!(stdout, "{}", env.current_dir.to_string_lossy())?;
        Ok(Status::Success)
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
/// If no target is provided, changes to the directory specified by the HOME environment variable.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute or relative to the current directory. Defaults to $HOME when omitted.
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        _stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<Status> {
        let target = match self.target {
            Some(t) if !t.is_empty() => t,
            _ => env
                .get_var("HOME")
                .context("no target and HOME not set")?,
        };

        let new_dir = env.resolve(&target);
        let canonical = fs::canonicalize(&new_dir).with_context(|| target.clone())?;
        if !canonical.is_dir() {
            bail!("{}: not a directory", target);
        }
        env.current_dir = canonical;
        Ok(Status::Success)
    }
}

#[derive(FromArgs)]
/// Exit the shell once the current line has finished.
pub struct Exit {
    #[argh(positional)]
    /// exit code reported to the caller, 0 when omitted.
    pub code: Option<ExitCode>,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        _stdout: &mut dyn Write,
        _env: &mut Environment,
    ) -> Result<Status> {
        Ok(Status::Exit(self.code.unwrap_or(0)))
    }
}

#[derive(FromArgs)]
/// write the arguments to standard output, separated by spaces.
/// by default, a trailing newline is printed.
pub struct Echo {
    #[argh(switch, short = 'n')]
    /// do not output the trailing newline.
    pub no_newline: bool,

    #[argh(positional, greedy)]
    /// values to print as-is, separated by spaces.
    pub args: Vec<String>,
}

impl BuiltinCommand for Echo {
    fn name() -> &'static str {
        "echo"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        _env: &mut Environment,
    ) -> Result<Status> {
        let s = self.args.join(" ");
        if self.no_newline {
            write!(stdout, "{}", s)?;
        } else {
            writeln!(stdout, "{}", s)?;
        }
        Ok(Status::Success)
    }
}

#[derive(FromArgs)]
/// count lines, words and bytes
pub struct WC {
    #[argh(switch, short = 'l')]
    /// print only the line count.
    pub lines: bool,

    #[argh(switch, short = 'w')]
    /// print only the word count.
    pub words: bool,

    #[argh(switch, short = 'c')]
    /// print only the byte count.
    pub bytes: bool,

    #[argh(positional, greedy)]
    /// files to count. If none provided, reads from stdin.
    pub files: Vec<String>,
}

impl WC {
    fn counts(&self, text: &str) -> String {
        let all = !(self.lines || self.words || self.bytes);
        let mut fields = Vec::new();
        if all || self.lines {
            fields.push(text.lines().count());
        }
        if all || self.words {
            fields.push(text.split_whitespace().count());
        }
        if all || self.bytes {
            fields.push(text.len());
        }
        fields
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl BuiltinCommand for WC {
    fn name() -> &'static str {
        "wc"
    }

    fn execute(
        self,
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<Status> {
        if self.files.is_empty() {
            let buf = read_source(env, None, stdin)?;
            writeln!(stdout, "{}", self.counts(&buf))?;
            return Ok(Status::Success);
        }
        for fname in &self.files {
            let s = read_source(env, Some(fname), stdin)?;
            writeln!(stdout, "{} {}", self.counts(&s), fname)?;
        }
        Ok(Status::Success)
    }
}

#[derive(FromArgs)]
/// print file(s) to stdout
pub struct Cat {
    #[argh(positional, greedy)]
    /// files to concatenate. If none provided, copies stdin.
    pub files: Vec<String>,
}

impl BuiltinCommand for Cat {
    fn name() -> &'static str {
        "cat"
    }

    fn execute(
        self,
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<Status> {
        if self.files.is_empty() {
            std::io::copy(stdin, stdout)?;
            return Ok(Status::Success);
        }
        for fname in &self.files {
            let mut f = open_file(env, fname)?;
            std::io::copy(&mut f, stdout)?;
        }
        Ok(Status::Success)
    }
}

#[derive(FromArgs)]
/// print lines matching a pattern
pub struct Grep {
    #[argh(positional)]
    /// the pattern to search for (a regular expression)
    pub pattern: String,

    #[argh(positional, greedy)]
    /// files to search. If none provided, reads from stdin.
    pub files: Vec<String>,

    #[argh(switch, short = 'w')]
    /// match only whole words (using non-word characters as boundaries)
    pub word_regexp: bool,

    #[argh(switch, short = 'i')]
    /// ignore case distinctions
    pub ignore_case: bool,

    #[argh(option, short = 'A', default = "0")]
    /// print NUM lines of trailing context after matching lines
    pub after_context: usize,
}

impl Grep {
    fn process_source(
        &self,
        reader: &mut dyn Read,
        stdout: &mut dyn Write,
        file_name: Option<&str>,
        re: &regex::Regex,
    ) -> Result<()> {
        let mut lines = Vec::new();
        let mut to_print = Vec::new();
        let mut context_left = 0;

        for line in BufReader::new(reader).lines() {
            let line = line.context("read error")?;
            if re.is_match(&line) {
                to_print.push(true);
                context_left = self.after_context;
            } else if context_left > 0 {
                to_print.push(true);
                context_left -= 1;
            } else {
                to_print.push(false);
            }
            lines.push(line);
        }

        let prefix = file_name
            .map(|name| format!("{}:", name))
            .unwrap_or_default();
        let mut last_printed_index: Option<usize> = None;

        for (i, line) in lines.iter().enumerate() {
            if !to_print[i] {
                continue;
            }
            if self.after_context > 0 && matches!(last_printed_index, Some(last) if i > last + 1) {
                stdout.write_all(b"--\n")?;
            }
            writeln!(stdout, "{}{}", prefix, line)?;
            last_printed_index = Some(i);
        }

        Ok(())
    }
}

impl BuiltinCommand for Grep {
    fn name() -> &'static str {
        "grep"
    }

    fn execute(
        self,
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<Status> {
        let pattern = if self.word_regexp {
            format!(r"\b({})\b", self.pattern)
        } else {
            self.pattern.clone()
        };

        let re = RegexBuilder::new(&pattern)
            .case_insensitive(self.ignore_case)
            .build()
            .with_context(|| format!("invalid regex pattern: {}", pattern))?;

        if self.files.is_empty() {
            self.process_source(stdin, stdout, None, &re)?;
        } else {
            let show_names = self.files.len() > 1;
            for file_name in &self.files {
                let mut f = open_file(env, file_name)?;
                self.process_source(&mut f, stdout, show_names.then_some(file_name.as_str()), &re)?;
            }
        }
        Ok(Status::Success)
    }
}

#[derive(FromArgs)]
/// print the first lines of a file or of stdin
pub struct Head {
    #[argh(option, short = 'n', default = "10")]
    /// number of lines to print
    pub lines: usize,

    #[argh(positional)]
    /// file to read. If omitted, reads from stdin.
    pub file: Option<String>,
}

impl BuiltinCommand for Head {
    fn name() -> &'static str {
        "head"
    }

    fn execute(
        self,
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<Status> {
        let text = read_source(env, self.file.as_deref(), stdin)?;
        for line in text.lines().take(self.lines) {
            writeln!(stdout, "{}", line)?;
        }
        Ok(Status::Success)
    }
}

#[derive(FromArgs)]
/// print the last lines of a file or of stdin
pub struct Tail {
    #[argh(option, short = 'n', default = "10")]
    /// number of lines to print
    pub lines: usize,

    #[argh(positional)]
    /// file to read. If omitted, reads from stdin.
    pub file: Option<String>,
}

impl BuiltinCommand for Tail {
    fn name() -> &'static str {
        "tail"
    }

    fn execute(
        self,
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<Status> {
        let text = read_source(env, self.file.as_deref(), stdin)?;
        let mut last = VecDeque::with_capacity(self.lines);
        for line in text.lines() {
            if self.lines == 0 {
                break;
            }
            if last.len() == self.lines {
                last.pop_front();
            }
            last.push_back(line);
        }
        for line in last {
            writeln!(stdout, "{}", line)?;
        }
        Ok(Status::Success)
    }
}

#[derive(FromArgs)]
/// drop adjacent duplicate lines
pub struct Uniq {
    #[argh(switch, short = 'i')]
    /// compare lines ignoring case
    pub ignore_case: bool,

    #[argh(positional)]
    /// file to read. If omitted, reads from stdin.
    pub file: Option<String>,
}

impl BuiltinCommand for Uniq {
    fn name() -> &'static str {
        "uniq"
    }

    fn execute(
        self,
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<Status> {
        let text = read_source(env, self.file.as_deref(), stdin)?;
        let mut previous: Option<&str> = None;
        for line in text.lines() {
            let repeated = previous.is_some_and(|p| {
                if self.ignore_case {
                    p.to_lowercase() == line.to_lowercase()
                } else {
                    p == line
                }
            });
            if !repeated {
                writeln!(stdout, "{}", line)?;
            }
            previous = Some(line);
        }
        Ok(Status::Success)
    }
}

#[derive(FromArgs)]
/// list directory contents, hidden entries excluded
pub struct Ls {
    #[argh(positional)]
    /// directory to list. Defaults to the current directory.
    pub dir: Option<String>,
}

impl BuiltinCommand for Ls {
    fn name() -> &'static str {
        "ls"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<Status> {
        let shown = self.dir.as_deref().unwrap_or(".");
        let mut names = Vec::new();
        for entry in fs::read_dir(env.resolve(shown)).with_context(|| shown.to_string())? {
            let name = entry?.file_name().to_string_lossy().into_owned();
            if !name.starts_with('.') {
                names.push(name);
            }
        }
        names.sort();
        for name in names {
            writeln!(stdout, "{}", name)?;
        }
        Ok(Status::Success)
    }
}

#[derive(FromArgs)]
/// copy stdin to stdout and to each file
pub struct Tee {
    #[argh(switch, short = 'a')]
    /// append to the files instead of truncating them
    pub append: bool,

    #[argh(positional, greedy)]
    /// files to write
    pub files: Vec<String>,
}

impl BuiltinCommand for Tee {
    fn name() -> &'static str {
        "tee"
    }

    fn execute(
        self,
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<Status> {
        let mut buf = Vec::new();
        stdin.read_to_end(&mut buf).context("stdin")?;
        stdout.write_all(&buf)?;
        for name in &self.files {
            let mut f = OpenOptions::new()
                .write(true)
                .create(true)
                .append(self.append)
                .truncate(!self.append)
                .open(env.resolve(name))
                .with_context(|| name.clone())?;
            f.write_all(&buf).with_context(|| name.clone())?;
        }
        Ok(Status::Success)
    }
}

#[derive(FromArgs)]
/// remove files or directories
pub struct Rm {
    #[argh(switch, short = 'r')]
    /// remove directories and their contents recursively
    pub recursive: bool,

    #[argh(positional, greedy)]
    /// paths to remove
    pub paths: Vec<String>,
}

impl BuiltinCommand for Rm {
    fn name() -> &'static str {
        "rm"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        _stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<Status> {
        if self.paths.is_empty() {
            bail!("missing operand");
        }
        for name in &self.paths {
            let p = env.resolve(name);
            if p.is_dir() {
                if !self.recursive {
                    bail!("{}: is a directory", name);
                }
                fs::remove_dir_all(&p).with_context(|| name.clone())?;
            } else {
                fs::remove_file(&p).with_context(|| name.clone())?;
            }
        }
        Ok(Status::Success)
    }
}

#[derive(FromArgs)]
/// create directories
pub struct Mkdir {
    #[argh(switch, short = 'p')]
    /// create missing parents, no error if the directory exists
    pub parents: bool,

    #[argh(positional, greedy)]
    /// directories to create
    pub paths: Vec<String>,
}

impl BuiltinCommand for Mkdir {
    fn name() -> &'static str {
        "mkdir"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        _stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<Status> {
        if self.paths.is_empty() {
            bail!("missing operand");
        }
        for name in &self.paths {
            let p = env.resolve(name);
            let created = if self.parents {
                fs::create_dir_all(&p)
            } else {
                fs::create_dir(&p)
            };
            created.with_context(|| name.clone())?;
        }
        Ok(Status::Success)
    }
}

#[derive(FromArgs)]
/// merge corresponding lines of files
pub struct Paste {
    #[argh(option, short = 'd', default = "String::from(\"\\t\")")]
    /// text placed between merged lines (default: tab)
    pub delimiter: String,

    #[argh(switch, short = 's')]
    /// join all lines of each file into one line instead of merging files side by side
    pub serial: bool,

    #[argh(positional, greedy)]
    /// files to merge. "-" or no files reads stdin.
    pub files: Vec<String>,
}

impl BuiltinCommand for Paste {
    fn name() -> &'static str {
        "paste"
    }

    fn execute(
        self,
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<Status> {
        let mut texts = Vec::new();
        if self.files.is_empty() {
            texts.push(read_source(env, None, stdin)?);
        }
        for name in &self.files {
            let file = Some(name.as_str()).filter(|n| *n != "-");
            texts.push(read_source(env, file, stdin)?);
        }
        let columns: Vec<Vec<&str>> = texts.iter().map(|t| t.lines().collect()).collect();

        if self.serial {
            for column in &columns {
                writeln!(stdout, "{}", column.join(self.delimiter.as_str()))?;
            }
            return Ok(Status::Success);
        }

        let rows = columns.iter().map(Vec::len).max().unwrap_or(0);
        for row in 0..rows {
            let merged: Vec<&str> = columns
                .iter()
                .map(|c| c.get(row).copied().unwrap_or(""))
                .collect();
            writeln!(stdout, "{}", merged.join(self.delimiter.as_str()))?;
        }
        Ok(Status::Success)
    }
}

/// Pair every source with its target for `cp` and `mv`.
///
/// The last path is the destination; with several sources it must be a directory.
fn plan_transfer<'a>(
    env: &Environment,
    paths: &'a [String],
) -> Result<Vec<(&'a str, PathBuf, PathBuf)>> {
    let Some((dest, sources)) = paths.split_last() else {
        bail!("missing file operand");
    };
    if sources.is_empty() {
        bail!("missing destination file operand after {}", dest);
    }
    let dest_path = env.resolve(dest);
    let into_dir = dest_path.is_dir();
    if sources.len() > 1 && !into_dir {
        bail!("{}: not a directory", dest);
    }

    let mut plan = Vec::with_capacity(sources.len());
    for src in sources {
        let src_path = env.resolve(src);
        let target = if into_dir {
            let file_name = src_path
                .file_name()
                .with_context(|| format!("{}: no file name", src))?;
            dest_path.join(file_name)
        } else {
            dest_path.clone()
        };
        plan.push((src.as_str(), src_path, target));
    }
    Ok(plan)
}

#[derive(FromArgs)]
/// copy files
pub struct Cp {
    #[argh(positional, greedy)]
    /// source files followed by the destination file or directory
    pub paths: Vec<String>,
}

impl BuiltinCommand for Cp {
    fn name() -> &'static str {
        "cp"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        _stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<Status> {
        for (name, src, target) in plan_transfer(env, &self.paths)? {
            if src.is_dir() {
                bail!("{}: is a directory", name);
            }
            fs::copy(&src, &target).with_context(|| name.to_string())?;
        }
        Ok(Status::Success)
    }
}

#[derive(FromArgs)]
/// move or rename files and directories
pub struct Mv {
    #[argh(positional, greedy)]
    /// sources followed by the destination
    pub paths: Vec<String>,
}

impl BuiltinCommand for Mv {
    fn name() -> &'static str {
        "mv"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        _stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<Status> {
        for (name, src, target) in plan_transfer(env, &self.paths)? {
            fs::rename(&src, &target).with_context(|| name.to_string())?;
        }
        Ok(Status::Success)
    }
}

/// Two-letter suffix of the `index`-th piece: aa, ab, ..., zz.
fn split_suffix(index: usize) -> Result<String> {
    if index >= 26 * 26 {
        bail!("output file suffixes exhausted");
    }
    let hi = (b'a' + (index / 26) as u8) as char;
    let lo = (b'a' + (index % 26) as u8) as char;
    Ok(format!("{hi}{lo}"))
}

#[derive(FromArgs)]
/// split a file into pieces of a fixed number of lines
pub struct Split {
    #[argh(option, short = 'l', default = "1000")]
    /// number of lines per output file
    pub lines: usize,

    #[argh(positional)]
    /// file to split. "-" or omitted reads stdin.
    pub file: Option<String>,

    #[argh(positional)]
    /// prefix of the output file names (default: x)
    pub prefix: Option<String>,
}

impl BuiltinCommand for Split {
    fn name() -> &'static str {
        "split"
    }

    fn execute(
        self,
        stdin: &mut dyn Read,
        _stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<Status> {
        if self.lines == 0 {
            bail!("invalid number of lines: 0");
        }
        let file = self.file.as_deref().filter(|f| *f != "-");
        let text = read_source(env, file, stdin)?;
        let prefix = self.prefix.as_deref().unwrap_or("x");

        let lines: Vec<&str> = text.lines().collect();
        for (index, chunk) in lines.chunks(self.lines).enumerate() {
            let name = format!("{}{}", prefix, split_suffix(index)?);
            let mut out = File::create(env.resolve(&name)).with_context(|| name.clone())?;
            for line in chunk {
                writeln!(out, "{}", line).with_context(|| name.clone())?;
            }
        }
        Ok(Status::Success)
    }
}
