//! Forwarding of unhandled messages to the world's listener.

use serde::{Deserialize, Serialize};

use crate::component::{Component, ComponentCtx};
use crate::message::Message;

/// Forwards any message its object leaves unhandled to the installed
/// [`WorldListener`](crate::WorldListener).
///
/// Listeners (the active game state, typically) live outside the world, so
/// messages are not delivered to them directly. Attaching this component to
/// an object routes every event message arriving at that object — and
/// claimed by no other component there — to the listener. Multiple
/// forwarders can exist in a scene, gathering messages from many different
/// objects.
///
/// Forwarding is strictly per-object: a forwarder on a parent does not see
/// messages sent to a child.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct EventForwarderComponent;

impl Component for EventForwarderComponent {
    const TYPE_NAME: &'static str = "EventForwarder";

    fn on_unhandled_message(&mut self, ctx: &ComponentCtx<'_>, message: &mut Message) -> bool {
        ctx.forward_to_listener(message)
    }
}
