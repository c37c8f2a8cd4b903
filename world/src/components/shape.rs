//! Primitive shape component: bounds contributor and render-data source.

use glam::Vec3;
use marigold_core::BoundingVolume;
use serde::{Deserialize, Serialize};

use crate::component::{Component, ComponentCtx};
use crate::message::{Message, MessageKind};
use crate::spatial::SpatialCategory;

/// A primitive shape, in the owning object's local space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Box { half_extents: Vec3 },
    Sphere { radius: f32 },
}

/// Contributes a primitive shape to its object's bounds and render data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeComponent {
    /// The contributed shape.
    pub shape: Shape,
    /// Spatial category the shape belongs to.
    pub category: SpatialCategory,
    /// When set, the object is latched always-visible during bounds
    /// aggregation (skybox-style content that must never be culled).
    pub always_visible: bool,
}

impl ShapeComponent {
    /// Creates a shape contributor for the given category.
    pub fn new(shape: Shape, category: SpatialCategory) -> Self {
        Self {
            shape,
            category,
            always_visible: false,
        }
    }

    /// Returns this component latched always-visible.
    #[must_use]
    pub fn always_visible(mut self) -> Self {
        self.always_visible = true;
        self
    }

    /// Returns the shape's local-space bounding volume.
    pub fn local_bounds(&self) -> BoundingVolume {
        match self.shape {
            Shape::Box { half_extents } => BoundingVolume::from_box(Vec3::ZERO, half_extents),
            Shape::Sphere { radius } => BoundingVolume::from_sphere(Vec3::ZERO, radius),
        }
    }
}

impl Component for ShapeComponent {
    const TYPE_NAME: &'static str = "Shape";

    fn handles_message(message: &Message) -> bool {
        matches!(
            message.kind,
            MessageKind::UpdateLocalBounds(_) | MessageKind::ExtractRenderData(_)
        )
    }

    fn on_message(&mut self, _ctx: &ComponentCtx<'_>, message: &mut Message) {
        match &mut message.kind {
            MessageKind::UpdateLocalBounds(acc) => {
                acc.add_bounds(&self.local_bounds(), self.category);
                if self.always_visible {
                    acc.set_always_visible(self.category);
                }
            }
            MessageKind::ExtractRenderData(collector) => {
                collector.push(self.local_bounds(), self.category.bitmask());
            }
            _ => {}
        }
    }
}
