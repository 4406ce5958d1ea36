//! Interactive session over stdin
//!
//! Each line is one command:
//!
//! ```text
//! set <field> <value>   edit a field (debounced background attempt)
//! generate              explicit attempt (rejections are shown)
//! show                  print the record's non-empty fields
//! quit                  wait for pending attempts, then exit
//! ```
//!
//! Outcomes are printed from the event bus, so background attempts report
//! only what the user should see.

use anyhow::{anyhow, Result};
use rpn_common::events::RpnEvent;
use rpn_common::timer::Timer;
use rpn_common::{Field, FieldStore, TriggerScheduler};
use std::io::Write;
use std::str::FromStr;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::{debug, warn};

/// Upper bound on how long `quit` waits for pending timers
const SETTLE_LIMIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Set { field: Field, value: String },
    Generate,
    Show,
    Quit,
}

impl FromStr for SessionCommand {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let mut parts = line.trim().splitn(3, char::is_whitespace);
        let command = parts.next().unwrap_or_default();
        match command {
            "set" => {
                let field = parts
                    .next()
                    .ok_or_else(|| anyhow!("usage: set <field> <value>"))?
                    .parse::<Field>()?;
                let value = parts.next().unwrap_or_default().trim().to_string();
                Ok(SessionCommand::Set { field, value })
            }
            "generate" | "gen" => Ok(SessionCommand::Generate),
            "show" => Ok(SessionCommand::Show),
            "quit" | "exit" => Ok(SessionCommand::Quit),
            other => Err(anyhow!("unknown command '{}'", other)),
        }
    }
}

/// Drive a scheduler from line-based input until `quit` or end of input
pub async fn run_session<S, T, R, W>(
    scheduler: &TriggerScheduler<S, T>,
    input: R,
    out: &mut W,
) -> Result<()>
where
    S: FieldStore + Send + 'static,
    T: Timer,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    let mut events = scheduler.events().subscribe();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse::<SessionCommand>() {
                    Ok(SessionCommand::Quit) => break,
                    Ok(command) => execute(scheduler, command, out)?,
                    Err(e) => writeln!(out, "error: {}", e)?,
                }
            }
            event = events.recv() => match event {
                Ok(event) => write_event(out, &event)?,
                Err(RecvError::Lagged(skipped)) => warn!("Session missed {} events", skipped),
                Err(RecvError::Closed) => break,
            },
        }
    }

    settle(scheduler).await;
    loop {
        match events.try_recv() {
            Ok(event) => write_event(out, &event)?,
            Err(TryRecvError::Lagged(skipped)) => warn!("Session missed {} events", skipped),
            Err(_) => break,
        }
    }
    Ok(())
}

fn execute<S, T, W>(scheduler: &TriggerScheduler<S, T>, command: SessionCommand, out: &mut W) -> Result<()>
where
    S: FieldStore + Send + 'static,
    T: Timer,
    W: Write,
{
    match command {
        SessionCommand::Set { field, value } => {
            if !scheduler.set_field(field, &value) {
                writeln!(out, "error: field '{}' is read-only", field)?;
            }
        }
        SessionCommand::Generate => {
            let outcome = scheduler.generate(true);
            debug!(?outcome, "Explicit attempt finished");
        }
        SessionCommand::Show => {
            let lines: Vec<String> = scheduler.with_store(|store| {
                Field::ALL
                    .iter()
                    .filter_map(|field| {
                        let value = store.read(*field);
                        (!value.is_empty()).then(|| format!("{} = {}", field, value))
                    })
                    .collect()
            });
            for line in lines {
                writeln!(out, "{}", line)?;
            }
        }
        SessionCommand::Quit => {}
    }
    Ok(())
}

/// Wait for pending timers and any attempt they started to finish
async fn settle<S, T>(scheduler: &TriggerScheduler<S, T>)
where
    S: FieldStore + Send + 'static,
    T: Timer,
{
    let started = tokio::time::Instant::now();
    while !scheduler.is_settled() {
        if started.elapsed() > SETTLE_LIMIT {
            warn!("Pending attempts did not settle before exit");
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Print the user-visible part of an event
fn write_event<W: Write>(out: &mut W, event: &RpnEvent) -> std::io::Result<()> {
    match event {
        RpnEvent::ReportNumberAssigned { identifier, .. } => {
            writeln!(out, "assigned {}", identifier)
        }
        RpnEvent::AssignmentRejected {
            reason,
            user_facing: true,
            ..
        } => writeln!(out, "alert: {}", reason),
        RpnEvent::AssignmentFailed { error, .. } => writeln!(out, "error: {}", error),
        RpnEvent::PersistenceWarning { error, .. } => {
            writeln!(out, "warning: record not saved: {}", error)
        }
        RpnEvent::AssignmentRejected { .. } | RpnEvent::AssignmentDeferred { .. } => Ok(()),
    }
}
