//! Drag-to-scroll for the horizontal story strip.
//!
//! A drag is a scoped session: beginning one registers move and release
//! listeners on the host (plus cancel for touch), and the session releases
//! exactly those listeners once, on release, cancel, a new begin, or when the
//! controller is dropped. Nothing carries over from one drag to the next.

use shared::domain::DRAG_SENSITIVITY;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerPosition {
    pub x: f64,
    pub y: f64,
}

impl PointerPosition {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    Mouse,
    Touch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerKind {
    Move,
    Release,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    Grab,
    Grabbing,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Move(PointerPosition),
    Release,
    Cancel,
}

/// The scrollable surface and the event source listeners are attached to.
pub trait PointerHost {
    fn scroll_offset(&self) -> f64;
    fn set_scroll_offset(&mut self, offset: f64);
    fn set_cursor(&mut self, cursor: Cursor);
    fn add_listener(&mut self, kind: ListenerKind) -> ListenerId;
    fn remove_listener(&mut self, id: ListenerId);
}

#[derive(Debug)]
struct DragSession {
    id: SessionId,
    kind: PointerKind,
    origin: PointerPosition,
    initial_offset: f64,
    listeners: Vec<ListenerId>,
}

pub struct GestureController<H: PointerHost> {
    host: H,
    sensitivity: f64,
    session: Option<DragSession>,
    next_session: u64,
}

impl<H: PointerHost> GestureController<H> {
    pub fn new(host: H) -> Self {
        Self::with_sensitivity(host, DRAG_SENSITIVITY)
    }

    pub fn with_sensitivity(mut host: H, sensitivity: f64) -> Self {
        host.set_cursor(Cursor::Grab);
        Self {
            host,
            sensitivity,
            session: None,
            next_session: 0,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn is_dragging(&self) -> bool {
        self.session.is_some()
    }

    pub fn active_session(&self) -> Option<SessionId> {
        self.session.as_ref().map(|session| session.id)
    }

    /// Starts a drag from the host's current scroll offset.
    pub fn begin_drag(&mut self, kind: PointerKind, origin: PointerPosition) -> SessionId {
        let initial_offset = self.host.scroll_offset();
        self.begin_drag_at(kind, origin, initial_offset)
    }

    pub fn begin_drag_at(
        &mut self,
        kind: PointerKind,
        origin: PointerPosition,
        initial_offset: f64,
    ) -> SessionId {
        self.teardown();

        let mut listeners = vec![
            self.host.add_listener(ListenerKind::Move),
            self.host.add_listener(ListenerKind::Release),
        ];
        if kind == PointerKind::Touch {
            listeners.push(self.host.add_listener(ListenerKind::Cancel));
        }
        self.host.set_cursor(Cursor::Grabbing);

        self.next_session += 1;
        let id = SessionId(self.next_session);
        self.session = Some(DragSession {
            id,
            kind,
            origin,
            initial_offset,
            listeners,
        });
        trace!(session = id.0, ?kind, "drag started");
        id
    }

    /// Applies the offset for `position` and returns it; `None` outside a drag.
    pub fn on_move(&mut self, position: PointerPosition) -> Option<f64> {
        let session = self.session.as_ref()?;
        let offset = session.initial_offset - (position.x - session.origin.x) * self.sensitivity;
        self.host.set_scroll_offset(offset);
        Some(offset)
    }

    /// Ends the live session, if any. Returns whether one was torn down.
    pub fn end_drag(&mut self) -> bool {
        self.teardown()
    }

    pub fn handle(&mut self, event: PointerEvent) -> Option<f64> {
        match event {
            PointerEvent::Move(position) => self.on_move(position),
            PointerEvent::Release | PointerEvent::Cancel => {
                self.end_drag();
                None
            }
        }
    }

    fn teardown(&mut self) -> bool {
        let Some(session) = self.session.take() else {
            return false;
        };
        for listener in session.listeners {
            self.host.remove_listener(listener);
        }
        self.host.set_cursor(Cursor::Grab);
        trace!(session = session.id.0, kind = ?session.kind, "drag ended");
        true
    }
}

impl<H: PointerHost> Drop for GestureController<H> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
#[path = "tests/gesture_tests.rs"]
mod tests;
