//! Deletion-delay component: exercises the cancelable deletion protocol.

use serde::{Deserialize, Serialize};

use crate::component::{Component, ComponentCtx};
use crate::message::{Message, MessageKind};

/// Cancels deletion of its object until a countdown elapses.
///
/// While the countdown runs, any `DeleteObject` dispatch is vetoed and
/// remembered; once it reaches zero the deletion is re-requested with the
/// original `delete_empty_parents` flag. The canonical use is letting an
/// in-progress effect or animation finish before the object disappears.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletionDelayComponent {
    ticks_remaining: u32,
    delete_empty_parents: bool,
    pending: bool,
}

impl DeletionDelayComponent {
    /// Creates a delay of the given number of ticks.
    pub fn new(delay_ticks: u32) -> Self {
        Self {
            ticks_remaining: delay_ticks,
            delete_empty_parents: false,
            pending: false,
        }
    }

    /// Ticks left before a vetoed deletion is re-requested.
    pub fn ticks_remaining(&self) -> u32 {
        self.ticks_remaining
    }
}

impl Component for DeletionDelayComponent {
    const TYPE_NAME: &'static str = "DeletionDelay";

    fn handles_message(message: &Message) -> bool {
        matches!(message.kind, MessageKind::DeleteObject { .. })
    }

    fn on_message(&mut self, _ctx: &ComponentCtx<'_>, message: &mut Message) {
        if let MessageKind::DeleteObject {
            delete_empty_parents,
            cancel,
        } = &mut message.kind
        {
            if self.ticks_remaining > 0 {
                *cancel = true;
                self.pending = true;
                self.delete_empty_parents = *delete_empty_parents;
            }
        }
    }

    fn update(&mut self, ctx: &ComponentCtx<'_>) {
        if self.ticks_remaining > 0 {
            self.ticks_remaining -= 1;
        }
        if self.pending && self.ticks_remaining == 0 {
            self.pending = false;
            ctx.request_deletion(ctx.owner(), self.delete_empty_parents);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectDesc;
    use crate::world::{World, WorldDesc};

    #[test]
    fn deletion_vetoed_until_countdown_elapses() {
        let mut world = World::new(WorldDesc::new("test"));
        world.register_component::<DeletionDelayComponent>();

        let obj = world.create_object(&ObjectDesc::new("fx")).unwrap();
        world
            .add_component(obj, DeletionDelayComponent::new(2))
            .unwrap();

        world.request_deletion(obj, false);
        world.update(0.016);
        // Vetoed: countdown still running.
        assert!(world.is_alive(obj));

        // Countdown drains over the next updates, then the component
        // re-requests and the deletion commits.
        world.update(0.016);
        world.update(0.016);
        assert!(!world.is_alive(obj));
    }

    #[test]
    fn zero_delay_deletes_immediately() {
        let mut world = World::new(WorldDesc::new("test"));
        world.register_component::<DeletionDelayComponent>();

        let obj = world.create_object(&ObjectDesc::new("fx")).unwrap();
        world
            .add_component(obj, DeletionDelayComponent::new(0))
            .unwrap();

        world.request_deletion(obj, false);
        world.update(0.016);
        assert!(!world.is_alive(obj));
    }
}
