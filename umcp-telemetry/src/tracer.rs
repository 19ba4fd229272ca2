//! Disabled, recording, and replaying tracer variants.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value, json};
use tokio::fs::{self, File};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{TraceError, TraceResult};
use crate::event::{Direction, EventKind, TraceEvent};

/// Event counts reported when a run ends.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct TraceSummary {
    /// Every recorded event.
    pub total: usize,
    /// Events received from the client.
    pub incoming: usize,
    /// Events sent to the client.
    pub outgoing: usize,
    /// Process invocations.
    pub commands: usize,
}

impl TraceSummary {
    fn from_events(events: &[TraceEvent]) -> Self {
        events.iter().fold(
            Self {
                total: events.len(),
                ..Self::default()
            },
            |mut summary, event| {
                match (event.direction(), event.kind()) {
                    (Direction::In, _) => summary.incoming += 1,
                    (Direction::Out, _) => summary.outgoing += 1,
                    (Direction::Internal, EventKind::Command) => summary.commands += 1,
                    (Direction::Internal, _) => {}
                }
                summary
            },
        )
    }
}

/// Observer for protocol and process events.
///
/// Every tracing method is a no-op unless the tracer is [`Tracer::Recording`].
#[derive(Debug, Default)]
pub enum Tracer {
    /// Tracing is off.
    #[default]
    Disabled,
    /// Events are kept in memory and optionally persisted.
    Recording(Recorder),
    /// A previously persisted trace is exposed read-only.
    Replaying(Replayer),
}

/// State of a recording tracer.
#[derive(Debug)]
pub struct Recorder {
    path: Option<PathBuf>,
    state: Mutex<RecordState>,
}

#[derive(Debug, Default)]
struct RecordState {
    events: Vec<TraceEvent>,
    sink: Option<File>,
}

/// State of a replaying tracer.
#[derive(Debug)]
pub struct Replayer {
    path: PathBuf,
    events: Vec<TraceEvent>,
    cursor: Mutex<usize>,
}

impl Tracer {
    /// Creates a disabled tracer.
    #[must_use]
    pub const fn disabled() -> Self {
        Self::Disabled
    }

    /// Creates a recording tracer, truncating `path` when one is supplied.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError::Io`] if the trace file cannot be created.
    pub async fn recording(path: Option<PathBuf>) -> TraceResult<Self> {
        let sink = match &path {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent)
                        .await
                        .map_err(|err| TraceError::io(parent, err))?;
                }
                let file = File::create(path)
                    .await
                    .map_err(|err| TraceError::io(path, err))?;
                info!(file = %path.display(), "debug tracing enabled");
                Some(file)
            }
            None => None,
        };

        Ok(Self::Recording(Recorder {
            path,
            state: Mutex::new(RecordState {
                events: Vec::new(),
                sink,
            }),
        }))
    }

    /// Loads a persisted trace for replay.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError::Io`] if the file cannot be read or
    /// [`TraceError::Serialization`] if it is not a JSON array of events.
    pub async fn replay(path: impl AsRef<Path>) -> TraceResult<Self> {
        let path = path.as_ref();
        let data = fs::read(path)
            .await
            .map_err(|err| TraceError::io(path, err))?;
        let events: Vec<TraceEvent> = serde_json::from_slice(&data)?;
        info!(file = %path.display(), events = events.len(), "replay mode enabled");

        Ok(Self::Replaying(Replayer {
            path: path.to_path_buf(),
            events,
            cursor: Mutex::new(0),
        }))
    }

    /// Returns `true` unless the tracer is disabled.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        !matches!(self, Self::Disabled)
    }

    /// Returns `true` when replaying a persisted trace.
    #[must_use]
    pub const fn is_replay(&self) -> bool {
        matches!(self, Self::Replaying(_))
    }

    /// Returns the trace file backing this tracer, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Disabled => None,
            Self::Recording(recorder) => recorder.path.as_deref(),
            Self::Replaying(replayer) => Some(&replayer.path),
        }
    }

    /// Records a message received from the client.
    pub async fn trace_incoming(&self, kind: EventKind, data: Value) {
        debug!(direction = "in", kind = ?kind, "trace");
        self.record(TraceEvent::now(Direction::In, kind, data)).await;
    }

    /// Records a message sent to the client.
    pub async fn trace_outgoing(&self, kind: EventKind, data: Value) {
        debug!(direction = "out", kind = ?kind, "trace");
        self.record(TraceEvent::now(Direction::Out, kind, data)).await;
    }

    /// Records a process invocation.
    pub async fn trace_command(&self, tokens: &[String], working_dir: &Path, env: &[String]) {
        if !matches!(self, Self::Recording(_)) {
            return;
        }
        let (command, args) = tokens.split_first().map_or(("", &[][..]), |(c, a)| (c.as_str(), a));
        let mut metadata = Map::new();
        metadata.insert("command".into(), json!(command));
        metadata.insert("args".into(), json!(args));
        metadata.insert("working_dir".into(), json!(working_dir.display().to_string()));
        metadata.insert("env".into(), json!(env));

        let event = TraceEvent::now(Direction::Internal, EventKind::Command, json!(tokens.join(" ")))
            .with_metadata(metadata);
        self.record(event).await;
    }

    /// Records the result of a process invocation.
    pub async fn trace_output(&self, output: &str, exit_code: Option<i32>, error: Option<&str>) {
        if !matches!(self, Self::Recording(_)) {
            return;
        }
        let mut metadata = Map::new();
        metadata.insert("exit_code".into(), json!(exit_code));
        metadata.insert("success".into(), json!(error.is_none()));
        if let Some(error) = error {
            metadata.insert("error".into(), json!(error));
        }

        let event = TraceEvent::now(Direction::Internal, EventKind::Output, json!(output))
            .with_metadata(metadata);
        self.record(event).await;
    }

    async fn record(&self, event: TraceEvent) {
        let Self::Recording(recorder) = self else {
            return;
        };
        let mut state = recorder.state.lock().await;
        if let Some(sink) = state.sink.as_mut() {
            if let Err(err) = write_line(sink, &event).await {
                warn!(error = %err, "failed to persist trace event");
            }
        }
        state.events.push(event);
    }

    /// Returns the next replayed event, advancing the cursor.
    ///
    /// Always `None` unless replaying.
    pub async fn next_event(&self) -> Option<TraceEvent> {
        let Self::Replaying(replayer) = self else {
            return None;
        };
        let mut cursor = replayer.cursor.lock().await;
        let event = replayer.events.get(*cursor).cloned()?;
        *cursor += 1;
        Some(event)
    }

    /// Returns every recorded or replayed event in order.
    pub async fn events(&self) -> Vec<TraceEvent> {
        match self {
            Self::Disabled => Vec::new(),
            Self::Recording(recorder) => recorder.state.lock().await.events.clone(),
            Self::Replaying(replayer) => replayer.events.clone(),
        }
    }

    /// Counts the recorded or replayed events.
    pub async fn summary(&self) -> TraceSummary {
        match self {
            Self::Disabled => TraceSummary::default(),
            Self::Recording(recorder) => TraceSummary::from_events(&recorder.state.lock().await.events),
            Self::Replaying(replayer) => TraceSummary::from_events(&replayer.events),
        }
    }

    /// Logs the event summary at info level when tracing is enabled.
    pub async fn log_summary(&self) {
        if !self.is_enabled() {
            return;
        }
        let summary = self.summary().await;
        info!(
            total_events = summary.total,
            incoming = summary.incoming,
            outgoing = summary.outgoing,
            commands = summary.commands,
            "debug trace summary"
        );
    }

    /// Rewrites the trace file as a pretty-printed JSON array and closes it.
    ///
    /// Later events are kept in memory only.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError`] if the final array cannot be written.
    pub async fn close(&self) -> TraceResult<()> {
        let Self::Recording(recorder) = self else {
            return Ok(());
        };
        let mut state = recorder.state.lock().await;
        let Some(mut sink) = state.sink.take() else {
            return Ok(());
        };
        let path = recorder.path.as_deref().unwrap_or_else(|| Path::new(""));
        let data = serde_json::to_vec_pretty(&state.events)?;

        let io = |err| TraceError::io(path, err);
        sink.rewind().await.map_err(io)?;
        sink.set_len(0).await.map_err(io)?;
        sink.write_all(&data).await.map_err(io)?;
        sink.flush().await.map_err(io)?;
        sink.sync_all().await.map_err(io)?;
        Ok(())
    }
}

async fn write_line(sink: &mut File, event: &TraceEvent) -> std::io::Result<()> {
    let mut line = serde_json::to_vec(event)?;
    line.push(b'\n');
    sink.write_all(&line).await?;
    sink.flush().await
}
