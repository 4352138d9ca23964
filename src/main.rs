use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::debug;
use pagedb::{Error, Statement, Table};

/// A single-table row store kept in a paged file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the database file, created if missing
    db_path: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

struct InputBuffer {
    buffer: String,
}

impl InputBuffer {
    fn new() -> Self {
        Self {
            buffer: String::new(),
        }
    }

    /// Reads one line, returning `false` at end of input.
    ///
    /// Bytes that are not valid UTF-8 are replaced rather than rejected, so
    /// such a line is reported as an unrecognized command.
    fn read_input(&mut self, input: &mut impl BufRead) -> io::Result<bool> {
        let mut line = Vec::new();
        let read = input.read_until(b'\n', &mut line)?;
        self.buffer = String::from_utf8_lossy(&line).trim().to_string();
        Ok(read > 0)
    }
}

// Non-SQL statements like .exit are called “meta-commands”.
enum MetaCommand {
    Exit,
    Unrecognized,
}

impl MetaCommand {
    fn parse(input: &str) -> Option<MetaCommand> {
        match input {
            ".exit" => Some(MetaCommand::Exit),
            _ if input.starts_with('.') => Some(MetaCommand::Unrecognized),
            _ => None,
        }
    }
}

fn print_prompt(out: &mut impl Write) -> io::Result<()> {
    write!(out, "db > ")?;
    out.flush()
}

#[derive(Debug, thiserror::Error)]
enum ReplError {
    #[error(transparent)]
    Storage(#[from] Error),

    #[error("console I/O failed: {0}")]
    Console(#[from] io::Error),
}

fn execute(
    statement: Statement,
    table: &mut Table,
    out: &mut impl Write,
) -> Result<(), ReplError> {
    match statement {
        Statement::Insert(row) => match table.insert(&row) {
            Ok(()) => writeln!(out, "Executed.")?,
            Err(Error::CapacityExceeded { .. }) => writeln!(out, "Error: Table full.")?,
            Err(e) => return Err(e.into()),
        },
        Statement::Select => {
            for row in table.scan() {
                writeln!(out, "{}", row?)?;
            }
            writeln!(out, "Executed.")?;
        }
    }
    Ok(())
}

fn run(table: &mut Table) -> Result<(), ReplError> {
    let mut input = io::stdin().lock();
    let mut out = io::stdout().lock();
    let mut input_buffer = InputBuffer::new();

    loop {
        print_prompt(&mut out)?;
        if !input_buffer.read_input(&mut input)? {
            debug!("end of input");
            return Ok(());
        }

        let line = input_buffer.buffer.as_str();
        match MetaCommand::parse(line) {
            Some(MetaCommand::Exit) => return Ok(()),
            Some(MetaCommand::Unrecognized) => {
                writeln!(out, "Unrecognized meta-command: {line}")?;
                continue;
            }
            None => {}
        }

        match Statement::prepare(line) {
            Ok(statement) => execute(statement, table, &mut out)?,
            Err(e) => writeln!(out, "{e}")?,
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let mut table = match Table::open(&args.db_path) {
        Ok(table) => table,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = run(&mut table);
    let closed = table.close();

    match result.and(closed.map_err(ReplError::from)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
