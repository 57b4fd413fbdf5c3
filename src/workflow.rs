//! Alert composition workflow.
//!
//! A linear state machine over one routed failure event. Every state is a
//! pure reshaping of [`Scratch`], except `Publish` which hands one alert to
//! the [`Notifier`]. [`transition`] runs a single step so each state can be
//! driven on its own; [`Workflow::execute`] runs a whole execution under a
//! wall-clock budget.
use crate::{
    alert::{compose_alert, ComposedAlert, ParsedLogMessage},
    destination::FailureEvent,
    error::RuntimeError,
    event::LogEntry,
    notify::Notifier,
};
use serde::Serialize;
use std::{collections::VecDeque, str::FromStr, time::Duration};

/// Default budget for one execution.
pub const DEFAULT_EXECUTION_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// States of the alert composition chain, in chain order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    /// Reset the accumulator
    Init,
    /// Load the batch into scratch
    GetLogEvents,
    /// Branch on remaining entries
    CheckEntriesRemain,
    /// Take the head entry
    GetEntryDetail,
    /// Decode the head entry's message
    ParseEntryMessage,
    /// Load the stack trace and reset the accumulator
    GetStackTraceLines,
    /// Branch on remaining stack trace lines
    CheckLinesRemain,
    /// Take the head line
    GetLine,
    /// Append the head line to the accumulator
    ConcatenateLine,
    /// Pop the head line
    DropProcessedLine,
    /// Format subject and body
    PrepareMessage,
    /// Send the alert to the topic
    Publish,
    /// Pop the head entry
    DropProcessedEntry,
    /// No entries left
    Succeeded,
}

impl State {
    /// Whether the execution is over.
    pub fn is_terminal(self) -> bool {
        self == State::Succeeded
    }
}

/// Per-execution scratch state.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Scratch {
    /// Entries not processed yet, head first
    pub entries: VecDeque<LogEntry>,
    /// Entry being processed
    pub entry: Option<LogEntry>,
    /// Its decoded message
    pub parsed: Option<ParsedLogMessage>,
    /// Stack trace lines not appended yet, head first
    pub lines: VecDeque<String>,
    /// Line being appended
    pub line: Option<String>,
    /// Stack trace built so far
    pub stack_trace: String,
    /// Alert waiting to be published
    pub alert: Option<ComposedAlert>,
    /// Alerts published in this execution
    pub published: usize,
    /// Entries skipped in this execution
    pub skipped: usize,
}

impl Scratch {
    fn skip_entry(&mut self) {
        self.entries.pop_front();
        self.entry = None;
        self.parsed = None;
        self.lines.clear();
        self.line = None;
        self.alert = None;
        self.skipped += 1;
    }
}

/// Advance one step.
///
/// Presence is checked before every read of a list head; reaching a state
/// without the data it needs is an [`RuntimeError::InvalidTransition`].
pub async fn transition<N>(
    state: State,
    scratch: &mut Scratch,
    input: &FailureEvent,
    notifier: &N,
) -> Result<State, RuntimeError>
where
    N: Notifier + ?Sized,
{
    let missing = |what: &str| RuntimeError::InvalidTransition(format!("{state:?}: no {what}"));

    let next = match state {
        State::Init => {
            scratch.stack_trace.clear();
            State::GetLogEvents
        }
        State::GetLogEvents => {
            scratch.entries = input
                .detail
                .response_payload
                .log_events
                .iter()
                .cloned()
                .collect();
            State::CheckEntriesRemain
        }
        State::CheckEntriesRemain => match scratch.entries.front() {
            Some(_) => State::GetEntryDetail,
            None => State::Succeeded,
        },
        State::GetEntryDetail => {
            let entry = scratch.entries.front().ok_or_else(|| missing("entry"))?;
            scratch.entry = Some(entry.clone());
            State::ParseEntryMessage
        }
        State::ParseEntryMessage => {
            let entry = scratch.entry.as_ref().ok_or_else(|| missing("entry"))?;
            let parsed = serde_json::from_str::<ParsedLogMessage>(&entry.message).map_err(|e| {
                RuntimeError::EntryParse {
                    id: entry.id.clone(),
                    reason: e.to_string(),
                }
            })?;
            scratch.parsed = Some(parsed);
            State::GetStackTraceLines
        }
        State::GetStackTraceLines => {
            let parsed = scratch.parsed.as_ref().ok_or_else(|| missing("parsed message"))?;
            let lines = parsed
                .stack_trace
                .as_ref()
                .ok_or_else(|| RuntimeError::EntryParse {
                    id: scratch.entry.as_ref().map(|e| e.id.clone()).unwrap_or_default(),
                    reason: "missing stackTrace".into(),
                })?;
            scratch.lines = lines.iter().cloned().collect();
            scratch.stack_trace.clear();
            State::CheckLinesRemain
        }
        State::CheckLinesRemain => match scratch.lines.front() {
            Some(_) => State::GetLine,
            None => State::PrepareMessage,
        },
        State::GetLine => {
            let line = scratch.lines.front().ok_or_else(|| missing("line"))?;
            scratch.line = Some(line.clone());
            State::ConcatenateLine
        }
        State::ConcatenateLine => {
            let line = scratch.line.take().ok_or_else(|| missing("line"))?;
            scratch.stack_trace.push_str(&line);
            scratch.stack_trace.push('\n');
            State::DropProcessedLine
        }
        State::DropProcessedLine => {
            scratch.lines.pop_front();
            State::CheckLinesRemain
        }
        State::PrepareMessage => {
            let parsed = scratch.parsed.as_ref().ok_or_else(|| missing("parsed message"))?;
            scratch.alert = Some(compose_alert(input, parsed, &scratch.stack_trace));
            State::Publish
        }
        State::Publish => {
            let alert = scratch.alert.take().ok_or_else(|| missing("alert"))?;
            notifier.publish(&alert).await?;
            scratch.published += 1;
            State::DropProcessedEntry
        }
        State::DropProcessedEntry => {
            scratch.entries.pop_front();
            scratch.entry = None;
            scratch.parsed = None;
            State::CheckEntriesRemain
        }
        State::Succeeded => State::Succeeded,
    };

    Ok(next)
}

/// What to do with an entry that can't be turned into an alert
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EntryFailurePolicy {
    /// Fail the whole execution, remaining entries are dropped
    #[default]
    Abort,
    /// Count the entry as skipped and carry on with the next one
    Skip,
}

impl FromStr for EntryFailurePolicy {
    type Err = RuntimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "abort" => Ok(EntryFailurePolicy::Abort),
            "skip" => Ok(EntryFailurePolicy::Skip),
            other => Err(RuntimeError::Configuration(format!(
                "unknown entry failure policy {other}"
            ))),
        }
    }
}

/// Result of a successful execution
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSummary {
    /// Execution id, also attached to the execution's logs
    pub execution_id: String,
    /// Alerts published
    pub published: usize,
    /// Entries skipped
    pub skipped: usize,
}

/// Runs alert composition executions
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Workflow {
    timeout: Duration,
    policy: EntryFailurePolicy,
}

impl Default for Workflow {
    fn default() -> Self {
        Workflow::new(DEFAULT_EXECUTION_TIMEOUT, EntryFailurePolicy::default())
    }
}

impl Workflow {
    /// Workflow with an execution budget and an entry failure policy
    pub fn new(timeout: Duration, policy: EntryFailurePolicy) -> Workflow {
        Workflow { timeout, policy }
    }

    /// Run one execution to completion.
    /// Expiring the time budget aborts it with [`RuntimeError::WorkflowTimeout`].
    pub async fn execute<N>(
        &self,
        input: &FailureEvent,
        notifier: &N,
    ) -> Result<ExecutionSummary, RuntimeError>
    where
        N: Notifier + ?Sized,
    {
        let execution_id = uuid::Uuid::new_v4().to_string();

        match tokio::time::timeout(self.timeout, self.run(&execution_id, input, notifier)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(%execution_id, timeout = ?self.timeout, "execution timed out");
                Err(RuntimeError::WorkflowTimeout(execution_id, self.timeout))
            }
        }
    }

    #[tracing::instrument(skip(self, input, notifier), fields(account = %input.account, region = %input.region))]
    async fn run<N>(
        &self,
        execution_id: &str,
        input: &FailureEvent,
        notifier: &N,
    ) -> Result<ExecutionSummary, RuntimeError>
    where
        N: Notifier + ?Sized,
    {
        let mut scratch = Scratch::default();
        let mut state = State::Init;

        while !state.is_terminal() {
            state = match transition(state, &mut scratch, input, notifier).await {
                Ok(next) => next,
                Err(RuntimeError::EntryParse { id, reason })
                    if self.policy == EntryFailurePolicy::Skip =>
                {
                    tracing::warn!(%id, %reason, "skipping log entry");
                    scratch.skip_entry();
                    State::CheckEntriesRemain
                }
                Err(err) => {
                    tracing::error!(error = %err, ?state, "execution failed");
                    return Err(err);
                }
            };
        }

        tracing::info!(
            published = scratch.published,
            skipped = scratch.skipped,
            "execution succeeded"
        );

        Ok(ExecutionSummary {
            execution_id: execution_id.to_owned(),
            published: scratch.published,
            skipped: scratch.skipped,
        })
    }
}
