use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use lox_interpreter as lox;

use lox::ast_printer::AstPrinter;
use lox::error::LoxError;
use lox::interpreter::Interpreter;
use lox::parser::Parser;
use lox::runner::{self, RunError, EXIT_IO_ERROR, EXIT_STATIC_ERROR};
use lox::scanner::{tokenize, Scanner};

/// Programs run on a dedicated thread with this much stack, so deep
/// recursion hits the interpreter's call‑depth limit before the host stack.
const INTERPRETER_STACK_SIZE: usize = 256 * 1024 * 1024;

/// Call frames shown under a runtime error before the trace is elided.
const MAX_TRACE_FRAMES: usize = 16;

#[derive(ClapParser, Debug)]
#[command(
    version,
    about = "Interpreter for a small class-based scripting language",
    long_about = None,
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    #[command(subcommand)]
    commands: Option<Commands>,

    /// Script to run; starts the interactive prompt when omitted
    script: Option<PathBuf>,

    /// Enable logging to app.log
    #[arg(long, global = true)]
    log: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes input from a file, printing each token
    Tokenize {
        filename: PathBuf,

        /// Print tokens as JSON objects, one per line
        #[arg(long)]
        json: bool,
    },

    /// Parses a program and prints its syntax tree
    Parse { filename: PathBuf },

    /// Runs a program
    Run { filename: PathBuf },
}

/// Reads the contents of a file as UTF‑8 text
fn read_file(filename: &Path) -> Result<String> {
    info!("Reading file: {:?}", filename);
    let file = File::open(filename).context(format!("Failed to open file {:?}", filename))?;
    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();

    let bytes = reader
        .read_to_end(&mut buf)
        .context(format!("Failed to read file {:?}", filename))?;

    info!("Read {} bytes from {:?}", bytes, filename);

    runner::decode_source(buf).context(format!("File {:?} is not valid UTF-8", filename))
}

fn init_logger() -> Result<()> {
    let log_file = File::create("app.log").context("Failed to create app.log")?;

    Builder::new()
        .format(|buf, record| {
            // Strip 'lox_interpreter::' from module path
            let module = record
                .module_path()
                .unwrap_or("<unnamed>")
                .strip_prefix("lox_interpreter::")
                .unwrap_or(record.module_path().unwrap_or("<unnamed>"));
            writeln!(
                buf,
                "{} [{}:{}] - {}",
                chrono::Local::now().format("%H:%M:%S%.3f"),
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug)
        .parse_default_env() // RUST_LOG overrides the default level
        .init();

    info!("Logger initialized, writing to app.log");
    Ok(())
}

/// Print every diagnostic of a failed run to stderr.
fn report(error: &RunError) {
    match error {
        RunError::Static(errors) => {
            for e in errors {
                eprintln!("{}", e);
            }
        }

        RunError::Runtime(e) => {
            eprintln!("{}", e);

            if let LoxError::Runtime { trace, .. } = e {
                for frame in trace.iter().take(MAX_TRACE_FRAMES) {
                    eprintln!("    {}", frame);
                }

                if trace.len() > MAX_TRACE_FRAMES {
                    eprintln!("    ... {} more frame(s)", trace.len() - MAX_TRACE_FRAMES);
                }
            }
        }
    }
}

/// Run `f` on a thread with [`INTERPRETER_STACK_SIZE`] bytes of stack.
fn on_large_stack<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    std::thread::Builder::new()
        .name("interpreter".into())
        .stack_size(INTERPRETER_STACK_SIZE)
        .spawn(f)
        .context("Failed to spawn interpreter thread")?
        .join()
        .map_err(|_| anyhow!("Interpreter thread panicked"))
}

fn tokenize_file(source: &str, json: bool) -> Result<i32> {
    let mut tokenized = true;

    for token in Scanner::new(source) {
        match token {
            Ok(token) => {
                if json {
                    println!("{}", serde_json::to_string(&token)?);
                } else {
                    println!("{}", token);
                }
            }

            Err(e) => {
                tokenized = false;
                eprintln!("{}", e);
            }
        }
    }

    Ok(if tokenized { 0 } else { EXIT_STATIC_ERROR })
}

fn parse_file(source: &str) -> i32 {
    let (tokens, lex_errors) = tokenize(source);

    for e in &lex_errors {
        eprintln!("{}", e);
    }

    match Parser::new(&tokens).parse() {
        Ok(statements) if lex_errors.is_empty() => {
            println!("{}", AstPrinter::print_program(&statements));
            0
        }

        Ok(_) => EXIT_STATIC_ERROR,

        Err(errors) => {
            for e in &errors {
                eprintln!("{}", e);
            }
            EXIT_STATIC_ERROR
        }
    }
}

fn run_file(source: String) -> Result<i32> {
    on_large_stack(move || {
        let mut interpreter = Interpreter::new();

        match runner::run(&source, &mut interpreter) {
            Ok(()) => 0,
            Err(e) => {
                debug!("Run failed: {}", e);
                report(&e);
                e.exit_code()
            }
        }
    })
}

/// Net count of unclosed `{` outside string literals.
fn open_braces(input: &str) -> i64 {
    let mut depth: i64 = 0;
    let mut in_string = false;

    for c in input.chars() {
        match c {
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => depth -= 1,
            _ => {}
        }
    }

    depth
}

fn repl() -> Result<()> {
    let mut editor = DefaultEditor::new().context("Failed to start line editor")?;
    let mut interpreter = Interpreter::new();
    let mut buffer = String::new();

    loop {
        let prompt = if buffer.is_empty() { "lox> " } else { "...  " };

        match editor.readline(prompt) {
            Ok(line) => {
                buffer.push_str(&line);
                buffer.push('\n');

                if open_braces(&buffer) > 0 {
                    continue;
                }

                let _ = editor.add_history_entry(buffer.trim_end());

                match runner::run_line(&buffer, &mut interpreter) {
                    Ok(Some(value)) => println!("{}", value),
                    Ok(None) => {}
                    Err(e) => report(&e),
                }

                buffer.clear();
            }

            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                info!("REPL session ended");
                return Ok(());
            }

            Err(e) => return Err(e).context("Failed to read line"),
        }
    }
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    // Initialize logger only if --log flag is provided
    if args.log {
        init_logger()?;
    } else {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    info!("CLI arguments: {:?}", args);

    let Some(command) = args.commands.or(args.script.map(|filename| Commands::Run { filename }))
    else {
        info!("No script provided, starting REPL");
        return on_large_stack(repl)?;
    };

    let filename: &Path = match &command {
        Commands::Tokenize { filename, .. }
        | Commands::Parse { filename }
        | Commands::Run { filename } => filename,
    };

    let source = match read_file(filename) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("{:#}", e);
            std::process::exit(EXIT_IO_ERROR);
        }
    };

    let code = match command {
        Commands::Tokenize { json, .. } => tokenize_file(&source, json)?,
        Commands::Parse { .. } => parse_file(&source),
        Commands::Run { .. } => run_file(source)?,
    };

    if code != 0 {
        debug!("Exiting with code {}", code);
        std::process::exit(code);
    }

    Ok(())
}
