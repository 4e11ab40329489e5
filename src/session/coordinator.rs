//! The session's single source of truth
//!
//! [`ApplicationCoordinator`] owns the filter tree and every layer sink. All
//! tree mutations and sink applications happen while folding the session
//! event queue, one event at a time.

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, unbounded};

use super::messages::{OperatorSpec, SessionEvent};
use super::sink::LayerSink;
use crate::config::FilterConfig;
use crate::domain::{Crs, DerivedGeometry, Reproject, Shape};
use crate::error::{FilterError, Result};
use crate::filter::{FilterTree, TreeId};
use crate::interaction::{InteractionController, InteractionHandle, InteractionId};

/// Index of a sink registered with the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SinkId(usize);

/// A sink that could not apply the current tree
///
/// The sink keeps its previous state; other sinks are unaffected.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkFailure {
    pub sink: SinkId,
    pub name: String,
    pub error: FilterError,
}

/// What the session knows about one operator's interaction
struct Binding {
    interaction: InteractionId,
    spec: OperatorSpec,
    /// Set once the shape is drawn
    tree_id: Option<TreeId>,
    handle: Option<InteractionHandle>,
    derived: DerivedGeometry,
}

pub struct ApplicationCoordinator {
    tree: FilterTree,
    sinks: Vec<Box<dyn LayerSink>>,
    /// In the order operators were added
    bindings: Vec<Binding>,
    reprojector: Arc<dyn Reproject>,
    circle_segments: usize,
    next_interaction: u64,
    events_tx: Sender<SessionEvent>,
    events_rx: Receiver<SessionEvent>,
}

impl ApplicationCoordinator {
    pub fn new(working_crs: Crs, reprojector: Arc<dyn Reproject>) -> Self {
        let (events_tx, events_rx) = unbounded();
        Self {
            tree: FilterTree::new(working_crs),
            sinks: Vec::new(),
            bindings: Vec::new(),
            reprojector,
            circle_segments: FilterConfig::default().circle_segments,
            next_interaction: 0,
            events_tx,
            events_rx,
        }
    }

    /// Coordinator working in the configured view projection
    pub fn from_config(config: &FilterConfig, reprojector: Arc<dyn Reproject>) -> Self {
        Self::new(config.layer.view_projection.clone(), reprojector)
            .with_circle_segments(config.circle_segments)
    }

    /// Vertex count of the buffer circles in [`overlays`](Self::overlays)
    pub fn with_circle_segments(mut self, segments: usize) -> Self {
        self.circle_segments = segments;
        self
    }

    pub fn add_sink<S: LayerSink + 'static>(&mut self, sink: S) -> SinkId {
        log::debug!("Sink {} registered", sink.name());
        self.sinks.push(Box::new(sink));
        SinkId(self.sinks.len() - 1)
    }

    /// Registered sink of concrete type `S`
    pub fn sink<S: LayerSink + 'static>(&self, id: SinkId) -> Option<&S> {
        self.sinks.get(id.0)?.as_any().downcast_ref()
    }

    pub fn sink_mut<S: LayerSink + 'static>(&mut self, id: SinkId) -> Option<&mut S> {
        self.sinks.get_mut(id.0)?.as_any_mut().downcast_mut()
    }

    /// Sender interactions report to; events are folded by [`drain`](Self::drain)
    pub fn sender(&self) -> Sender<SessionEvent> {
        self.events_tx.clone()
    }

    /// Start drawing a shape for `spec`
    pub fn add_operator(&mut self, spec: OperatorSpec) -> Result<InteractionController> {
        let id = InteractionId(self.next_interaction);
        self.next_interaction += 1;

        let controller = InteractionController::new(id, spec.kind, self.events_tx.clone());
        // the receiver lives in `self`, so the queue is always open
        if self.events_tx.send(SessionEvent::OperatorAdded { id, spec }).is_err() {
            log::error!("Session queue closed, operator {id} not tracked");
        }
        controller.start_draw()?;
        Ok(controller)
    }

    /// Fold every queued event, returning the sink failures they caused
    pub fn drain(&mut self) -> Vec<SinkFailure> {
        let mut failures = Vec::new();
        while let Ok(event) = self.events_rx.try_recv() {
            failures.extend(self.handle_event(event));
        }
        failures
    }

    /// Fold one event into the tree and apply the result to the sinks
    ///
    /// Events for interactions the session no longer tracks are ignored.
    pub fn handle_event(&mut self, event: SessionEvent) -> Vec<SinkFailure> {
        let is_terminal = event.is_terminal();
        match event {
            SessionEvent::OperatorAdded { id, spec } => {
                log::debug!("Operator {} added for {id}", spec.operand);
                self.bindings.push(Binding {
                    interaction: id,
                    spec,
                    tree_id: None,
                    handle: None,
                    derived: DerivedGeometry::default(),
                });
                Vec::new()
            }
            SessionEvent::DrawCompleted { id, shape, handle } => {
                if self.bind(id, shape, Some(handle)) {
                    self.apply(is_terminal)
                } else {
                    Vec::new()
                }
            }
            SessionEvent::Translating { id, shape } | SessionEvent::TranslateEnded { id, shape } => {
                if self.bind(id, shape, None) {
                    self.apply(is_terminal)
                } else {
                    Vec::new()
                }
            }
            SessionEvent::Removed { id } => self.unbind(id),
            SessionEvent::Cleared => self.clear_all(),
        }
    }

    /// Remove every drawn shape and return all sinks to pass-through
    ///
    /// Events queued before the call are folded first, so a shape whose draw
    /// completed earlier is cleared too.
    pub fn clear(&mut self) -> Vec<SinkFailure> {
        let mut failures = self.drain();
        failures.extend(self.handle_event(SessionEvent::Cleared));
        failures.extend(self.drain());
        failures
    }

    pub fn tree(&self) -> &FilterTree {
        &self.tree
    }

    /// Helper geometry of each drawn shape, in the order operators were added
    pub fn overlays(&self) -> Vec<(InteractionId, &DerivedGeometry)> {
        self.bindings
            .iter()
            .filter(|b| b.tree_id.is_some())
            .map(|b| (b.interaction, &b.derived))
            .collect()
    }

    /// Put `shape` into the tree under `id`'s group, returning whether the
    /// tree changed
    fn bind(&mut self, id: InteractionId, shape: Arc<Shape>, handle: Option<InteractionHandle>) -> bool {
        let reprojector = self.reprojector.clone();
        let segments = self.circle_segments;
        let Some(binding) = self.bindings.iter_mut().find(|b| b.interaction == id) else {
            log::debug!("Ignoring event for untracked interaction {id}");
            return false;
        };

        let group = match binding.spec.group(shape.clone()) {
            Ok(group) => group,
            Err(err) => {
                log::warn!("Interaction {id} cannot join the filter: {err}");
                return false;
            }
        };

        binding.derived =
            DerivedGeometry::compute(&shape, binding.spec.distance, segments, reprojector.as_ref())
                .unwrap_or_else(|err| {
                    log::warn!("No overlay for interaction {id}: {err}");
                    DerivedGeometry {
                        distance: binding.spec.distance,
                        ..DerivedGeometry::default()
                    }
                });
        if handle.is_some() {
            binding.handle = handle;
        }

        match binding.tree_id {
            Some(tree_id) => {
                self.tree.replace_group(tree_id, group);
            }
            None => {
                let tree_id = self.tree.add_group(group);
                binding.tree_id = Some(tree_id);
                log::info!("Filter group {tree_id} added for interaction {id}");
            }
        }
        true
    }

    fn unbind(&mut self, id: InteractionId) -> Vec<SinkFailure> {
        let Some(index) = self.bindings.iter().position(|b| b.interaction == id) else {
            log::debug!("Ignoring removal of untracked interaction {id}");
            return Vec::new();
        };

        let binding = self.bindings.remove(index);
        match binding.tree_id {
            Some(tree_id) => {
                self.tree.remove_group(tree_id);
                log::info!("Filter group {tree_id} removed with interaction {id}");
                self.apply(true)
            }
            None => Vec::new(),
        }
    }

    fn clear_all(&mut self) -> Vec<SinkFailure> {
        for binding in self.bindings.drain(..) {
            if let Some(handle) = binding.handle {
                if let Err(err) = handle.remove() {
                    log::debug!("Interaction {} already closed: {err}", binding.interaction);
                }
            }
        }
        self.tree.clear();
        log::info!("Filter cleared");
        self.apply(true)
    }

    fn apply(&mut self, is_terminal: bool) -> Vec<SinkFailure> {
        let mut failures = Vec::new();
        for (index, sink) in self.sinks.iter_mut().enumerate() {
            if let Err(error) = sink.apply_filter(&self.tree, is_terminal) {
                log::error!("Sink {} failed to apply filter: {error}", sink.name());
                failures.push(SinkFailure {
                    sink: SinkId(index),
                    name: sink.name().to_string(),
                    error,
                });
            }
        }
        failures
    }
}
