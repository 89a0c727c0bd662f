use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::thread;

use anyhow::{anyhow, Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};

use rox::ast_printer::AstPrinter;
use rox::error::Diagnostics;
use rox::interpreter::DEFAULT_MAX_CALL_DEPTH;
use rox::parser::Parser;
use rox::scanner::Scanner;
use rox::token::Token;
use rox::{Lox, RunOutcome, EXIT_STATIC_ERROR};

/// Stack for the thread that runs Lox code; deep enough for
/// `DEFAULT_MAX_CALL_DEPTH` nested calls in an unoptimised build.
const INTERPRETER_STACK_SIZE: usize = 64 * 1024 * 1024;

#[derive(ClapParser, Debug)]
#[command(version, about = "Lox language interpreter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Commands,

    /// Enable logging to app.log
    #[arg(long, global = true)]
    log: bool,

    /// Deepest nesting of function calls before a run fails
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_CALL_DEPTH)]
    max_call_depth: usize,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes input from a file, printing each token
    Tokenize {
        filename: PathBuf,

        /// Print tokens and scan errors as one JSON object
        #[arg(long)]
        json: bool,
    },

    /// Parses a file and prints every statement in prefix form
    Parse { filename: PathBuf },

    /// Runs a Lox program; starts an interactive prompt without a file
    Run { filename: Option<PathBuf> },
}

/// Reads a script file and decodes it as UTF‑8.
fn read_file(filename: &Path) -> Result<String> {
    info!("Reading file: {:?}", filename);

    let file = File::open(filename).context(format!("Failed to open file {:?}", filename))?;
    let mut reader = BufReader::new(file);
    let mut buf: Vec<u8> = Vec::new();

    let bytes = reader
        .read_to_end(&mut buf)
        .context(format!("Failed to read file {:?}", filename))?;

    info!("Read {} bytes from {:?}", bytes, filename);

    String::from_utf8(buf).context(format!("File {:?} is not valid UTF-8", filename))
}

fn init_logger() -> Result<()> {
    let log_file = File::create("app.log").context("Failed to create app.log")?;

    Builder::new()
        .format(|buf, record| {
            let module = record
                .module_path()
                .unwrap_or("<unnamed>")
                .strip_prefix("rox::")
                .unwrap_or(record.module_path().unwrap_or("<unnamed>"));
            writeln!(
                buf,
                "[{}:{}] - {}",
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug) // Default to Debug, override with RUST_LOG
        .parse_default_env()
        .init();

    info!("Logger initialized, writing to app.log");
    Ok(())
}

fn report(outcome: &RunOutcome) {
    for diagnostic in &outcome.diagnostics {
        eprintln!("{}", diagnostic);
    }
}

fn tokenize(filename: &Path, json: bool) -> Result<i32> {
    let source = read_file(filename)?;
    let mut diagnostics = Diagnostics::new();
    let tokens: Vec<Token> = Scanner::new(&source).scan_tokens(&mut diagnostics);

    if json {
        let report = serde_json::json!({
            "tokens": tokens,
            "errors": diagnostics.iter().collect::<Vec<_>>(),
        });

        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize tokens")?
        );
    } else {
        for e in diagnostics.iter() {
            eprintln!("{}", e);
        }

        for token in &tokens {
            println!("{}", token);
        }
    }

    Ok(if diagnostics.has_errors() {
        EXIT_STATIC_ERROR
    } else {
        0
    })
}

fn parse(filename: &Path) -> Result<i32> {
    let source = read_file(filename)?;
    let mut diagnostics = Diagnostics::new();
    let tokens: Vec<Token> = Scanner::new(&source).scan_tokens(&mut diagnostics);
    let statements = Parser::new(tokens, 0).parse(&mut diagnostics);

    if diagnostics.has_errors() {
        for e in diagnostics.iter() {
            eprintln!("{}", e);
        }

        return Ok(EXIT_STATIC_ERROR);
    }

    println!("{}", AstPrinter::print_program(&statements));

    Ok(0)
}

fn run_file(filename: &Path, max_call_depth: usize) -> Result<i32> {
    let source = read_file(filename)?;
    let mut lox = Lox::new().with_max_call_depth(max_call_depth);

    let outcome = lox.run(&source);
    report(&outcome);

    debug!("Run finished with exit code {}", outcome.exit_code());

    Ok(outcome.exit_code())
}

/// Each line runs on its own; errors are reported and the session goes on.
fn run_prompt(max_call_depth: usize) -> Result<i32> {
    info!("Starting interactive prompt");

    let mut lox = Lox::new().with_max_call_depth(max_call_depth);
    let stdin = io::stdin();
    let mut line = String::new();

    loop {
        print!("> ");
        io::stdout().flush().context("Failed to flush stdout")?;

        line.clear();
        let read = stdin
            .lock()
            .read_line(&mut line)
            .context("Failed to read from stdin")?;

        if read == 0 {
            println!();
            break;
        }

        let outcome = lox.run(&line);
        report(&outcome);
    }

    Ok(0)
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    if args.log {
        init_logger()?;
    } else {
        // Honour RUST_LOG on stderr, silent otherwise.
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .parse_default_env()
            .init();
    }

    info!("CLI arguments: {:?}", args);

    let max_call_depth: usize = args.max_call_depth;

    let worker = thread::Builder::new()
        .name("rox".into())
        .stack_size(INTERPRETER_STACK_SIZE)
        .spawn(move || match args.commands {
            Commands::Tokenize { filename, json } => tokenize(&filename, json),
            Commands::Parse { filename } => parse(&filename),
            Commands::Run {
                filename: Some(filename),
            } => run_file(&filename, max_call_depth),
            Commands::Run { filename: None } => run_prompt(max_call_depth),
        })
        .context("Failed to start interpreter thread")?;

    let code: i32 = worker
        .join()
        .map_err(|_| anyhow!("Interpreter thread panicked"))??;

    if code != 0 {
        std::process::exit(code);
    }

    Ok(())
}
