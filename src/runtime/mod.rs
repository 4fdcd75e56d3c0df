//! Runtime components: the interface-level pieces that sit between the
//! compiled bytecode and the screen. These cover the shapes and invariants
//! that matter for a faithful re-implementation (instance identity, alarm
//! timing, collision geometry, draw ordering); full game-object semantics
//! (the complete instance variable set, every built-in function) are out of
//! scope.

pub mod alarm;
pub mod collision;
pub mod instance_table;
pub mod renderer;

pub use alarm::AlarmRegistry;
pub use collision::{collision_check, collision_point_check, collision_rectangle_check, refresh_bbox, SpriteGeometry, SpriteLookup};
pub use instance_table::{Instance, InstanceRef, InstanceTable};
pub use renderer::Renderer;
