//! Draw/translate interaction lifecycle
//!
//! Each drawn shape is owned by one [`InteractionController`]. The
//! controller walks the state machine below and reports every transition
//! that matters to filtering as a [`SessionEvent`] on the session channel.
//!
//! ```text
//! Idle --start_draw--> Drawing --finish_draw--> Drawn
//! Drawn --start_translate--> Translating --translate*--> Translating
//! Translating --finish_translate--> Drawn
//! any --remove--> Removed (terminal)
//! ```

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crossbeam_channel::Sender;

use crate::domain::{GeometryKind, Shape};
use crate::error::{FilterError, Result};
use crate::session::messages::SessionEvent;

/// Identifier of one interaction, unique within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InteractionId(pub u64);

impl fmt::Display for InteractionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state of an interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionState {
    Idle,
    Drawing,
    Drawn,
    Translating,
    Removed,
}

impl fmt::Display for InteractionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InteractionState::Idle => "idle",
            InteractionState::Drawing => "drawing",
            InteractionState::Drawn => "drawn",
            InteractionState::Translating => "translating",
            InteractionState::Removed => "removed",
        };
        f.write_str(name)
    }
}

type Remover = Box<dyn FnOnce() + Send>;

struct Inner {
    state: InteractionState,
    shape: Option<Arc<Shape>>,
    remover: Option<Remover>,
}

/// State shared by a controller and the handles it hands out
#[derive(Clone)]
struct Shared {
    id: InteractionId,
    inner: Arc<Mutex<Inner>>,
    events: Sender<SessionEvent>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            log::debug!("Interaction {}: session closed, event dropped", self.id);
        }
    }

    /// Tear down the drawn shape; only the first call has an effect
    fn remove(&self) -> Result<()> {
        let remover = {
            let mut inner = self.lock();
            if inner.state == InteractionState::Removed {
                return Err(FilterError::InteractionClosed(self.id));
            }
            inner.state = InteractionState::Removed;
            inner.remover.take()
        };

        if let Some(remover) = remover {
            remover();
        }
        log::debug!("Interaction {} removed", self.id);
        self.emit(SessionEvent::Removed { id: self.id });
        Ok(())
    }
}

/// Drives one shape through draw, translate and removal
pub struct InteractionController {
    kind: GeometryKind,
    shared: Shared,
}

impl InteractionController {
    pub fn new(id: InteractionId, kind: GeometryKind, events: Sender<SessionEvent>) -> Self {
        Self {
            kind,
            shared: Shared {
                id,
                inner: Arc::new(Mutex::new(Inner {
                    state: InteractionState::Idle,
                    shape: None,
                    remover: None,
                })),
                events,
            },
        }
    }

    pub fn id(&self) -> InteractionId {
        self.shared.id
    }

    pub fn kind(&self) -> GeometryKind {
        self.kind
    }

    pub fn state(&self) -> InteractionState {
        self.shared.lock().state
    }

    pub fn start_draw(&self) -> Result<()> {
        self.transition("start drawing", InteractionState::Idle, InteractionState::Drawing)
    }

    /// Complete the drawing with `shape`
    ///
    /// `remover` is the platform callback that deletes the rendered shape;
    /// it runs exactly once, when the returned handle (or the controller)
    /// removes the interaction.
    pub fn finish_draw<F>(&self, shape: Shape, remover: F) -> Result<InteractionHandle>
    where
        F: FnOnce() + Send + 'static,
    {
        if shape.kind() != self.kind {
            return Err(FilterError::InvalidGeometry(format!(
                "expected a {} but a {} was drawn",
                self.kind,
                shape.kind()
            )));
        }

        let shape = Arc::new(shape);
        {
            let mut inner = self.shared.lock();
            self.check(&inner, "finish drawing", InteractionState::Drawing)?;
            inner.state = InteractionState::Drawn;
            inner.shape = Some(shape.clone());
            inner.remover = Some(Box::new(remover));
        }

        let handle = InteractionHandle {
            shared: self.shared.clone(),
        };
        self.shared.emit(SessionEvent::DrawCompleted {
            id: self.id(),
            shape,
            handle: handle.clone(),
        });
        Ok(handle)
    }

    pub fn start_translate(&self) -> Result<()> {
        self.transition(
            "start translating",
            InteractionState::Drawn,
            InteractionState::Translating,
        )
    }

    /// Intermediate position while the user drags the shape
    pub fn translate(&self, shape: Shape) -> Result<()> {
        let shape = self.moved("translate", shape, InteractionState::Translating)?;
        self.shared.emit(SessionEvent::Translating {
            id: self.id(),
            shape,
        });
        Ok(())
    }

    /// Final position once the drag is released
    pub fn finish_translate(&self, shape: Shape) -> Result<()> {
        let shape = self.moved("finish translating", shape, InteractionState::Drawn)?;
        self.shared.emit(SessionEvent::TranslateEnded {
            id: self.id(),
            shape,
        });
        Ok(())
    }

    /// Remove the interaction from any live state
    ///
    /// Removing before the draw completed cancels it; nothing was bound to
    /// the filter yet, so the emitted event is a no-op downstream.
    pub fn remove(&self) -> Result<()> {
        self.shared.remove()
    }

    /// Record a moved shape while translating, then enter `next`
    fn moved(&self, action: &'static str, shape: Shape, next: InteractionState) -> Result<Arc<Shape>> {
        if shape.kind() != self.kind {
            return Err(FilterError::InvalidGeometry(format!(
                "cannot {action} a {} into a {}",
                self.kind,
                shape.kind()
            )));
        }

        let shape = Arc::new(shape);
        let mut inner = self.shared.lock();
        self.check(&inner, action, InteractionState::Translating)?;
        inner.state = next;
        inner.shape = Some(shape.clone());
        Ok(shape)
    }

    fn transition(
        &self,
        action: &'static str,
        from: InteractionState,
        to: InteractionState,
    ) -> Result<()> {
        let mut inner = self.shared.lock();
        self.check(&inner, action, from)?;
        inner.state = to;
        Ok(())
    }

    fn check(&self, inner: &Inner, action: &'static str, expected: InteractionState) -> Result<()> {
        match inner.state {
            InteractionState::Removed => Err(FilterError::InteractionClosed(self.id())),
            state if state == expected => Ok(()),
            state => Err(FilterError::InvalidTransition {
                action,
                state: state.to_string(),
            }),
        }
    }
}

/// Removal capability over a drawn interaction
///
/// Cloned into the session when the draw completes, so the coordinator can
/// remove shapes on clear.
#[derive(Clone)]
pub struct InteractionHandle {
    shared: Shared,
}

impl InteractionHandle {
    pub fn id(&self) -> InteractionId {
        self.shared.id
    }

    /// Latest shape of the interaction
    pub fn shape(&self) -> Option<Arc<Shape>> {
        self.shared.lock().shape.clone()
    }

    /// Remove the drawn shape; a second call reports `InteractionClosed`
    pub fn remove(&self) -> Result<()> {
        self.shared.remove()
    }

    pub fn is_removed(&self) -> bool {
        self.shared.lock().state == InteractionState::Removed
    }
}

impl fmt::Debug for InteractionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InteractionHandle")
            .field("id", &self.shared.id)
            .field("removed", &self.is_removed())
            .finish()
    }
}
