use anyhow::{Context, Result};
use argh::FromArgs;
use minish::env::Environment;
use minish::{Interpreter, Status};

#[derive(FromArgs)]
/// A small interactive command processor.
struct Args {
    #[argh(option, short = 'c')]
    /// evaluate one command line and exit
    command: Option<String>,

    #[argh(option, short = 'p', default = "String::from(\"$ \")")]
    /// prompt shown before each line
    prompt: String,

    #[argh(option, short = 'C')]
    /// start in this directory instead of the current one
    directory: Option<String>,
}

fn run(args: Args) -> Result<i32> {
    let mut env = Environment::new();
    if let Some(dir) = &args.directory {
        env.current_dir = std::fs::canonicalize(env.resolve(dir))
            .with_context(|| format!("cannot use {dir} as working directory"))?;
    }
    let mut sh = Interpreter::default().with_environment(env);

    let Some(line) = args.command else {
        return sh.repl(&args.prompt);
    };

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    match sh.eval(&line, &mut stdin.lock(), &mut stdout.lock()) {
        Ok(Status::Success) => Ok(0),
        Ok(Status::Exit(code)) => Ok(code),
        Err(e) => {
            eprintln!("{e}");
            Ok(1)
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let code = run(argh::from_env())?;
    std::process::exit(code);
}
