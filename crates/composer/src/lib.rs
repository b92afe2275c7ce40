//! Page composer: places one generated image on a fixed-ratio physical page.
//!
//! The host UI owns real input devices and reports pointer positions in
//! workspace pixels through the gesture calls on [`Composer`]. The engine only
//! computes geometry and converts the final placement into millimeters.
//!
//! ```text
//! viewport ──fit──> Workspace (px, page ratio)
//!                        │
//!   gesture_start/move/end ──> PlacedImage (px)
//!                        │
//!               compute_print_job ──> PrintJob (mm)
//! ```

pub mod geometry;
pub mod session;

pub use geometry::{Point, Size, Viewport, ViewportPadding, Workspace};
pub use session::{
    normalize_degrees, Composer, ComposerError, GestureKind, PlacedImage, DEFAULT_IMAGE_FRACTION,
    MIN_IMAGE_SIZE_PX, RESIZE_HANDLE_PX,
};
