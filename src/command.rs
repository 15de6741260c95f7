//! The command processor: turns an input line into a [`Statement`] or
//! [`MetaCommand`] and runs statements against a table.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::info;

use crate::errors::Error;
use crate::storage::{self, Row, Table};

#[derive(Debug)]
pub enum Statement {
    Insert(Row),
    Select,
}

/// Commands starting with `.`, handled outside the statement pipeline.
#[derive(Debug, PartialEq)]
pub enum MetaCommand {
    Exit,
    Btree,
    Constants,
}

pub enum QueryResult {
    Inserted,
    Rows(Vec<Row>),
}

lazy_static! {
    static ref INSERT_REGEX: Regex = Regex::new(r"^insert\s+(-?\d+)\s+(\S+)\s+(\S+)$").unwrap();
}

/// Parses a statement. Overlong usernames and emails are rejected here,
/// before anything reaches the tree.
pub fn prepare(input: &str) -> Result<Statement, Error> {
    let input = input.trim();

    if input.starts_with("insert") {
        let caps = INSERT_REGEX
            .captures(input)
            .ok_or_else(|| err!(Syntax, "Syntax error. Could not parse statement."))?;
        if caps[1].starts_with('-') {
            return Err(err!(Syntax, "ID must be positive."));
        }
        let id: u32 = caps[1]
            .parse()
            .map_err(|_| err!(Syntax, "Syntax error. Could not parse statement."))?;
        let row = Row::new(id, &caps[2], &caps[3])?;
        return Ok(Statement::Insert(row));
    }

    if input == "select" {
        return Ok(Statement::Select);
    }

    Err(err!(Unrecognized, "{}", input))
}

/// Parses a meta-command (an input line starting with `.`).
pub fn prepare_meta(input: &str) -> Result<MetaCommand, Error> {
    match input.trim() {
        ".exit" => Ok(MetaCommand::Exit),
        ".btree" => Ok(MetaCommand::Btree),
        ".constants" => Ok(MetaCommand::Constants),
        other => Err(err!(Unrecognized, "{}", other)),
    }
}

/// Executes a statement against the table.
pub fn execute(statement: Statement, table: &mut Table) -> Result<QueryResult, Error> {
    match statement {
        Statement::Insert(row) => {
            storage::insert_row(table, &row)?;
            info!(id = row.id, "Inserted row.");
            Ok(QueryResult::Inserted)
        }
        Statement::Select => Ok(QueryResult::Rows(storage::select_rows(table)?)),
    }
}
