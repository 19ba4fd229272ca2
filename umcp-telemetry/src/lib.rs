//! Debug tracing for umcp servers.
//!
//! A [`Tracer`] observes every protocol message and process invocation. It is
//! either disabled, recording (optionally persisted to a trace file), or
//! replaying a previously recorded file for sequential inspection.

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod event;
mod tracer;

pub use error::{TraceError, TraceResult};
pub use event::{Direction, EventKind, TraceEvent};
pub use tracer::{TraceSummary, Tracer};
