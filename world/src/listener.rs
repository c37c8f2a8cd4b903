//! World-external message listeners.
//!
//! Some collaborators live outside the world (a game-state object is the
//! typical case) yet still want to hear about things happening to objects
//! inside it. A [`WorldListener`] installed on the world receives messages
//! forwarded by the built-in
//! [`EventForwarderComponent`](crate::components::EventForwarderComponent):
//! any message that no component on the forwarder's object handles is routed
//! to the listener. Multiple forwarders can exist in a scene, gathering
//! messages from many different objects for the one listener.

use crate::message::Message;
use crate::object::GameObjectHandle;

/// A message sink outside the world (e.g. the active game state).
pub trait WorldListener: Send {
    /// Receives a forwarded message. `source` is the object the message was
    /// originally dispatched to. Returns whether the listener handled it.
    fn on_message(&mut self, source: GameObjectHandle, message: &mut Message) -> bool;
}
