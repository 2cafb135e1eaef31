/*!
# Galaxy 3D Spatial

Dynamic spatial index for the Galaxy 3D engine.

This crate provides a general-purpose bounding-volume octree over arbitrary
payloads, used for visibility culling and picking. It has no dependency on any
rendering backend.

## Architecture

- **Octree**: handle owning the tree, exposing insertion, removal, immediate
  and batched moves, frustum queries and ray casts
- **Geometry**: `AABB`, `Frustum` and `Ray` value types consumed by the tree
- **Logging**: engine-style logger with a global severity filter

Items are addressed by generational `ItemKey`s, so a key outliving its item is
detected rather than aliased.
*/

// Internal modules
mod error;
pub mod log;
pub mod geometry;
pub mod octree;

// Main galaxy3d namespace module
pub mod galaxy3d {
    // Error types
    pub use crate::error::{Error, Result};

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{
            Logger, LogEntry, LogSeverity, DefaultLogger,
            set_logger, reset_logger, set_min_severity, min_severity,
            log, log_detailed,
        };
        // Note: engine_* macros are NOT re-exported here - they are internal only
    }

    // Geometry sub-module
    pub mod geometry {
        pub use crate::geometry::*;
    }

    // Octree sub-module
    pub mod octree {
        pub use crate::octree::*;
    }
}

// Re-export math library at crate root
pub use glam;
