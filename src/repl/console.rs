//! The interactive prompt: reads one statement per line, dispatches
//! meta-commands, and prints statement results.

use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
};
use std::io::{self, BufRead, Write};
use std::path::Path;
use tracing::info;

use crate::command::{self, MetaCommand, QueryResult};
use crate::errors::Error;
use crate::repl::history;
use crate::storage::{self, Table};

/// Runs the REPL against the database at `path` until `.exit` or end of
/// input. The table is closed (flushing every resident page) on the way
/// out.
pub fn start(path: &Path) -> Result<(), Error> {
    let mut table = Table::open(path)?;
    let history_file = history::history_path();
    info!(path = %path.display(), "Starting REPL session...");

    let stdin = io::stdin();
    let mut input = String::new();

    loop {
        echo("db >");
        input.clear();
        if stdin.lock().read_line(&mut input)? == 0 {
            // End of input behaves like .exit.
            break;
        }
        let line = input.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(p) = &history_file {
            let _ = history::append_history(line, p);
        }

        if line.starts_with('.') {
            match command::prepare_meta(line) {
                Ok(MetaCommand::Exit) => break,
                Ok(MetaCommand::Btree) => {
                    echo("Tree:\n");
                    echo(&storage::dump_tree(&mut table)?);
                }
                Ok(MetaCommand::Constants) => {
                    echo("Constants:\n");
                    echo(&storage::constants_report());
                }
                Err(_) => {
                    echo_error(&format!("Unrecognized command '{}'\n", line));
                }
            }
            continue;
        }

        let statement = match command::prepare(line) {
            Ok(s) => s,
            Err(Error::Unrecognized(_)) => {
                echo_error(&format!("Unrecognized keyword at start of '{}'.\n", line));
                continue;
            }
            Err(Error::StringTooLong(_)) => {
                echo_error("String is too long.\n");
                continue;
            }
            Err(Error::Syntax(msg)) => {
                echo_error(&format!("{}\n", msg));
                continue;
            }
            Err(e) => return Err(e),
        };

        match command::execute(statement, &mut table) {
            Ok(QueryResult::Inserted) => echo("Executed.\n"),
            Ok(QueryResult::Rows(rows)) => {
                for row in rows {
                    echo(&format!("{}\n", row));
                }
                echo("Executed.\n");
            }
            Err(Error::DuplicateKey(_)) => echo_error("Error: Duplicate Key.\n"),
            Err(e) => {
                // Fatal: flush what we can and surface the error.
                let _ = table.close();
                return Err(e);
            }
        }
    }

    table.close()?;
    info!("Closed session.");
    Ok(())
}

fn echo(s: &str) {
    let _ = execute!(io::stdout(), Print(s));
    let _ = io::stdout().flush();
}

fn echo_error(s: &str) {
    let _ = execute!(
        io::stdout(),
        SetForegroundColor(Color::Red),
        Print(s),
        ResetColor,
    );
    let _ = io::stdout().flush();
}
