//! Filtering session management module
//!
//! This module contains:
//! - Message types reported by interactions
//! - Layer sinks the filter is applied to
//! - The coordinator folding events into the filter tree
//! - Asynchronous dispatch of remote queries

pub mod coordinator;
pub mod dispatch;
pub mod messages;
pub mod sink;

pub use coordinator::{ApplicationCoordinator, SinkFailure, SinkId};
pub use dispatch::{Dispatcher, QueryTransport};
pub use messages::{OperatorSpec, SessionEvent};
pub use sink::{LayerSink, LocalEvaluationSink, QueryMode, QueryPayload, RemoteQuerySink};
