//! Interactive command loop.
//!
//! The loop is a small state machine. [`parse_command`] turns a line into a
//! [`Command`], [`MenuState::next`] decides where to go, and [`run_menu`]
//! performs the I/O and the store actions in between.

use crate::purge::{delete_all_with_progress, PurgeError};
use crate::query::{print_query, QueryError, VehicleQuery};
use std::io::{self, BufRead, Write};
use table_store::{RetryPolicy, TableStore};
use thiserror::Error;
use tracing::{debug, error, info};
use vehicle_generator::populator::DEFAULT_MAX_CONSECUTIVE_FAILURES;
use vehicle_generator::{Populator, VehicleGenerator};

/// Failures that end the session. Store errors from individual actions are
/// reported to the user and do not end it.
#[derive(Error, Debug)]
pub enum MenuError {
    #[error("Console I/O failed: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `C`
    Create,
    /// `Z1`, `Z2`, `Z3`
    Query(VehicleQuery),
    /// `D`
    Delete,
    /// `X`
    Exit,
}

/// Parse one line of input. Case and surrounding whitespace are ignored.
pub fn parse_command(input: &str) -> Option<Command> {
    match input.trim().to_ascii_uppercase().as_str() {
        "C" => Some(Command::Create),
        "Z1" => Some(Command::Query(VehicleQuery::FiveSeatHatchbacksInAfrica)),
        "Z2" => Some(Command::Query(VehicleQuery::ElectricInAsia)),
        "Z3" => Some(Command::Query(VehicleQuery::Sedans)),
        "D" => Some(Command::Delete),
        "X" => Some(Command::Exit),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuState {
    Idle,
    Dispatching(Command),
    Exited,
}

/// What happened since the last transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuEvent {
    /// A line was read; `None` if it was not a command.
    Line(Option<Command>),
    EndOfInput,
    ActionFinished,
}

impl MenuState {
    pub fn next(self, event: MenuEvent) -> MenuState {
        match (self, event) {
            (MenuState::Exited, _) => MenuState::Exited,
            (MenuState::Idle, MenuEvent::Line(Some(Command::Exit))) => MenuState::Exited,
            (MenuState::Idle, MenuEvent::Line(Some(command))) => MenuState::Dispatching(command),
            (MenuState::Idle, MenuEvent::Line(None)) => MenuState::Idle,
            (_, MenuEvent::EndOfInput) => MenuState::Exited,
            (MenuState::Dispatching(_), MenuEvent::ActionFinished) => MenuState::Idle,
            (state, _) => state,
        }
    }
}

/// Settings shared by every action of one session.
#[derive(Debug, Clone)]
pub struct Session {
    /// Records written by `C`.
    pub record_count: u64,
    /// Seed for the generator. Every `C` starts over from index 0 with it.
    pub seed: u64,
    pub retry: RetryPolicy,
    pub max_consecutive_failures: u32,
}

impl Session {
    pub fn new(record_count: u64, seed: u64) -> Self {
        Self {
            record_count,
            seed,
            retry: RetryPolicy::default(),
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

const RULE: &str = "-----------------------------------------------------";

fn print_menu<W: Write>(out: &mut W, session: &Session) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "C  - create {} vehicle records", session.record_count)?;
    for (i, query) in VehicleQuery::ALL.iter().enumerate() {
        writeln!(out, "Z{} - query {}", i + 1, query)?;
    }
    writeln!(out, "D  - delete all records")?;
    writeln!(out, "X  - exit")?;
    write!(out, "> ")?;
    out.flush()
}

/// Read one line, or `None` at end of input.
fn read_line<R: BufRead>(input: &mut R) -> io::Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

async fn dispatch<S, W>(
    store: &S,
    session: &Session,
    command: Command,
    out: &mut W,
) -> Result<(), MenuError>
where
    S: TableStore + ?Sized,
    W: Write,
{
    match command {
        Command::Create => {
            writeln!(
                out,
                "Generating {} records, please wait...",
                session.record_count
            )?;
            out.flush()?;
            let mut populator = Populator::new(store, VehicleGenerator::new(session.seed))
                .with_retry(session.retry)
                .with_max_consecutive_failures(session.max_consecutive_failures);
            match populator.populate(session.record_count).await {
                Ok(metrics) => {
                    writeln!(
                        out,
                        "Upserted {} records ({} failed) in {:.2?}",
                        metrics.rows_upserted, metrics.rows_failed, metrics.total_duration
                    )?;
                    for failure in &metrics.failures {
                        writeln!(
                            out,
                            "  failed {}/{}: {}",
                            failure.partition_key, failure.row_key, failure.error
                        )?;
                    }
                }
                Err(e) => {
                    error!("Create failed: {e}");
                    writeln!(out, "Error: {e}")?;
                }
            }
        }
        Command::Query(query) => {
            writeln!(out, "Query: {query}")?;
            writeln!(out, "{RULE}")?;
            match print_query(store, query, session.retry, out).await {
                Ok(report) => {
                    writeln!(out, "{RULE}")?;
                    writeln!(out, "{} records listed", report.matched)?;
                }
                Err(QueryError::Output(e)) => return Err(MenuError::Io(e)),
                Err(e) => {
                    error!("Query '{query}' failed: {e}");
                    writeln!(out, "Error: {e}")?;
                }
            }
        }
        Command::Delete => {
            writeln!(out, "Deleting all records...")?;
            out.flush()?;
            let result = delete_all_with_progress(store, session.retry, |page, _| {
                writeln!(out, " - segment {page}")?;
                out.flush()
            })
            .await;
            match result {
                Ok(report) => {
                    writeln!(
                        out,
                        "Deleted {} records in {} batches",
                        report.rows_deleted, report.batches
                    )?;
                }
                Err(PurgeError::Output { source, .. }) => return Err(MenuError::Io(source)),
                Err(e) => {
                    error!("Delete failed: {e}");
                    writeln!(out, "Error: {e}")?;
                    writeln!(
                        out,
                        "{} records were deleted before the failure",
                        e.progress().rows_deleted
                    )?;
                }
            }
        }
        Command::Exit => {}
    }
    out.flush()?;
    Ok(())
}

/// Run the menu until `X` or end of input.
pub async fn run_menu<S, R, W>(
    store: &S,
    session: &Session,
    mut input: R,
    out: &mut W,
) -> Result<(), MenuError>
where
    S: TableStore + ?Sized,
    R: BufRead,
    W: Write,
{
    let mut state = MenuState::Idle;
    loop {
        state = match state {
            MenuState::Exited => break,
            MenuState::Idle => {
                print_menu(out, session)?;
                let event = match read_line(&mut input)? {
                    Some(line) => {
                        let command = parse_command(&line);
                        if command.is_none() {
                            debug!("Ignoring unrecognised input '{line}'");
                        }
                        MenuEvent::Line(command)
                    }
                    None => MenuEvent::EndOfInput,
                };
                state.next(event)
            }
            MenuState::Dispatching(command) => {
                debug!("Dispatching {command:?}");
                dispatch(store, session, command, out).await?;
                state.next(MenuEvent::ActionFinished)
            }
        };
    }

    info!("Session ended");
    Ok(())
}
