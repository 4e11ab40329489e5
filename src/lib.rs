//! Composite spatial filters drawn on a map
//!
//! Shapes drawn by the user become predicates in an OR-of-ANDs filter tree.
//! The same tree filters client-side features by local evaluation and is
//! serialized to CQL text or structured query documents for a remote map
//! server.

pub mod config;
pub mod domain;
pub mod error;
pub mod evaluate;
pub mod filter;
pub mod interaction;
pub mod serialize;
pub mod session;

pub use config::{FilterConfig, LayerDef};
pub use domain::{Crs, DerivedGeometry, Feature, GeometryKind, Reproject, Shape, WebMercator};
pub use error::{FilterError, Result};
pub use evaluate::Evaluator;
pub use filter::{FilterGroup, FilterTree, Operand, Predicate, TreeId};
pub use interaction::{InteractionController, InteractionHandle, InteractionId, InteractionState};
pub use serialize::{QueryDocument, QueryOptions, serialize_structured, serialize_text};
pub use session::{
    ApplicationCoordinator, Dispatcher, LayerSink, LocalEvaluationSink, OperatorSpec,
    QueryPayload, QueryTransport, RemoteQuerySink, SessionEvent, SinkFailure, SinkId,
};
