//! # sqlgate-runtime
//!
//! Turns a [`QueryRequest`](sqlgate_core::QueryRequest) into a
//! [`ResponseEnvelope`](sqlgate_core::ResponseEnvelope):
//!
//! 1. [`Gatekeeper`] validates, parses, extracts relations, classifies and
//!    authorizes the statement
//! 2. [`Coordinator`] runs it in single, bulk or streaming mode, consulting
//!    the result cache for reads
//! 3. [`EnvelopeBuilder`] shapes the response
//!
//! The database sits behind [`SqlExecutor`], [`Transaction`] and
//! [`RowStreamer`].

pub mod coordinator;
pub mod envelope;
pub mod error;
pub mod executor;
pub mod gatekeeper;
pub mod memory;

pub use coordinator::{Coordinator, StreamOutcome};
pub use envelope::EnvelopeBuilder;
pub use error::GateError;
pub use executor::{
    ExecError, ExecKind, ExecOptions, ExecOutcome, RowStream, RowStreamer, SqlExecutor,
    Transaction,
};
pub use gatekeeper::{AccountContext, Gatekeeper, Inspection, Prepared};
