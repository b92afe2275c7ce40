use shared::domain::{PageSize, PrintJob};
use thiserror::Error;
use tracing::debug;

use crate::geometry::{Point, Size, Viewport, ViewportPadding, Workspace};

/// Initial image width as a fraction of the workspace width.
pub const DEFAULT_IMAGE_FRACTION: f64 = 0.5;
/// Floor applied to both sides of the placed image.
pub const MIN_IMAGE_SIZE_PX: f64 = 50.0;
/// Edge length of the square resize handle centered on the bottom-right corner.
pub const RESIZE_HANDLE_PX: f64 = 16.0;

#[derive(Debug, Error, PartialEq)]
pub enum ComposerError {
    #[error("page dimensions must be positive, got {width_mm}x{height_mm} mm")]
    InvalidPage { width_mm: f64, height_mm: f64 },
    #[error("no image loaded in composer")]
    NoImage,
    #[error("rotation must be a finite number of degrees, got {0}")]
    InvalidRotation(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureKind {
    Move,
    Resize,
}

#[derive(Debug, Clone, Copy)]
enum ActiveGesture {
    Move {
        start_pointer: Point,
        initial_position: Point,
    },
    Resize {
        start_pointer: Point,
        initial_size: Size,
    },
}

impl ActiveGesture {
    fn kind(&self) -> GestureKind {
        match self {
            ActiveGesture::Move { .. } => GestureKind::Move,
            ActiveGesture::Resize { .. } => GestureKind::Resize,
        }
    }
}

/// The single image being positioned.
///
/// Placement on the page is kept in millimeters; `position` and `size` are the
/// on-screen pixels derived from it for the current workspace.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedImage {
    image_url: String,
    position_mm: Point,
    size_mm: Size,
    position: Point,
    size: Size,
    rotation: f64,
}

impl PlacedImage {
    pub fn image_url(&self) -> &str {
        &self.image_url
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    fn set_position(&mut self, workspace: &Workspace, position: Point) {
        self.position = position;
        self.position_mm = Point::new(workspace.to_mm(position.x), workspace.to_mm(position.y));
    }

    fn set_size(&mut self, workspace: &Workspace, size: Size) {
        self.size = size;
        self.size_mm = Size::new(workspace.to_mm(size.width), workspace.to_mm(size.height));
    }

    /// Rederives pixels from the millimeter placement. The 50 px floor only affects what is shown.
    fn fit_to(&mut self, workspace: &Workspace) {
        self.position = Point::new(
            workspace.to_px(self.position_mm.x),
            workspace.to_px(self.position_mm.y),
        );
        let size = Size::new(
            workspace.to_px(self.size_mm.width),
            workspace.to_px(self.size_mm.height),
        );
        self.size = size.scaled(floor_scale(size));
    }

    fn corner(&self) -> Point {
        Point::new(
            self.position.x + self.size.width,
            self.position.y + self.size.height,
        )
    }

    fn contains(&self, pointer: Point) -> bool {
        pointer.x >= self.position.x
            && pointer.x <= self.position.x + self.size.width
            && pointer.y >= self.position.y
            && pointer.y <= self.position.y + self.size.height
    }

    fn handle_contains(&self, pointer: Point) -> bool {
        let corner = self.corner();
        let half = RESIZE_HANDLE_PX / 2.0;
        (pointer.x - corner.x).abs() <= half && (pointer.y - corner.y).abs() <= half
    }
}

/// Folds any finite angle into `[0, 360)`.
pub fn normalize_degrees(degrees: f64) -> f64 {
    let normalized = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs.
    if normalized >= 360.0 {
        0.0
    } else {
        normalized
    }
}

/// Uniform factor that lifts the smaller side of `size` to the floor, or 1 if it already clears it.
fn floor_scale(size: Size) -> f64 {
    let smaller = size.width.min(size.height);
    if smaller >= MIN_IMAGE_SIZE_PX {
        1.0
    } else {
        MIN_IMAGE_SIZE_PX / smaller
    }
}

/// One composer session: a workspace plus at most one placed image.
#[derive(Debug, Clone)]
pub struct Composer {
    padding: ViewportPadding,
    workspace: Workspace,
    image: Option<PlacedImage>,
    gesture: Option<ActiveGesture>,
}

impl Composer {
    pub fn open(
        page: PageSize,
        viewport: Viewport,
        padding: ViewportPadding,
    ) -> Result<Self, ComposerError> {
        let valid = |v: f64| v.is_finite() && v > 0.0;
        if !valid(page.width_mm) || !valid(page.height_mm) {
            return Err(ComposerError::InvalidPage {
                width_mm: page.width_mm,
                height_mm: page.height_mm,
            });
        }

        Ok(Self {
            padding,
            workspace: Workspace::fit(page, viewport, padding),
            image: None,
            gesture: None,
        })
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn image(&self) -> Option<&PlacedImage> {
        self.image.as_ref()
    }

    pub fn active_gesture(&self) -> Option<GestureKind> {
        self.gesture.map(|gesture| gesture.kind())
    }

    /// Places `image_url` as a centered square half the workspace wide, replacing any previous image.
    pub fn load_image(&mut self, image_url: impl Into<String>) -> &PlacedImage {
        let workspace = self.workspace.size();
        let side = (workspace.width * DEFAULT_IMAGE_FRACTION).max(MIN_IMAGE_SIZE_PX);
        let size = Size::new(side, side);
        let position = Point::new(
            (workspace.width - size.width) / 2.0,
            (workspace.height - size.height) / 2.0,
        );

        self.gesture = None;
        let mut image = PlacedImage {
            image_url: image_url.into(),
            position_mm: Point::default(),
            size_mm: Size::default(),
            position,
            size,
            rotation: 0.0,
        };
        image.set_position(&self.workspace, position);
        image.set_size(&self.workspace, size);
        self.image.insert(image)
    }

    /// Refits the workspace and redraws the image from its millimeter placement, which is unchanged.
    ///
    /// In a workspace small enough that the image would show under 50 px, it is drawn at the floor
    /// while the print job keeps the physical size.
    pub fn resize_viewport(&mut self, viewport: Viewport) {
        self.workspace = Workspace::fit(self.workspace.page(), viewport, self.padding);
        self.gesture = None;

        if let Some(image) = self.image.as_mut() {
            image.fit_to(&self.workspace);
        }
    }

    /// Which gesture a pointer-down at `pointer` would start. The handle wins over the body.
    pub fn hit_test(&self, pointer: Point) -> Option<GestureKind> {
        let image = self.image.as_ref()?;
        if image.handle_contains(pointer) {
            Some(GestureKind::Resize)
        } else if image.contains(pointer) {
            Some(GestureKind::Move)
        } else {
            None
        }
    }

    /// Pointer-down. Ignored while another gesture is active.
    pub fn gesture_start(&mut self, pointer: Point) -> Option<GestureKind> {
        if self.gesture.is_some() {
            return None;
        }
        let kind = self.hit_test(pointer)?;
        let image = self.image.as_ref()?;

        self.gesture = Some(match kind {
            GestureKind::Move => ActiveGesture::Move {
                start_pointer: pointer,
                initial_position: image.position,
            },
            GestureKind::Resize => ActiveGesture::Resize {
                start_pointer: pointer,
                initial_size: image.size,
            },
        });
        debug!(?kind, x = pointer.x, y = pointer.y, "composer: gesture started");
        Some(kind)
    }

    /// Pointer-move. Returns whether the image changed.
    pub fn gesture_move(&mut self, pointer: Point) -> bool {
        let workspace = self.workspace;
        let (Some(gesture), Some(image)) = (self.gesture, self.image.as_mut()) else {
            return false;
        };

        match gesture {
            ActiveGesture::Move {
                start_pointer,
                initial_position,
            } => {
                image.set_position(
                    &workspace,
                    Point::new(
                        initial_position.x + (pointer.x - start_pointer.x),
                        initial_position.y + (pointer.y - start_pointer.y),
                    ),
                );
            }
            ActiveGesture::Resize {
                start_pointer,
                initial_size,
            } => {
                let scale = (initial_size.width + (pointer.x - start_pointer.x)) / initial_size.width;
                let scaled = initial_size.scaled(scale);
                let scale = if scaled.width.min(scaled.height) < MIN_IMAGE_SIZE_PX {
                    MIN_IMAGE_SIZE_PX / initial_size.width.min(initial_size.height)
                } else {
                    scale
                };
                image.set_size(&workspace, initial_size.scaled(scale));
            }
        }
        true
    }

    /// Pointer-up.
    pub fn gesture_end(&mut self) {
        if let Some(gesture) = self.gesture.take() {
            debug!(kind = ?gesture.kind(), "composer: gesture ended");
        }
    }

    /// Pointer left the workspace; ends the gesture like a pointer-up.
    pub fn pointer_left(&mut self) {
        self.gesture_end();
    }

    pub fn set_rotation(&mut self, degrees: f64) -> Result<f64, ComposerError> {
        if !degrees.is_finite() {
            return Err(ComposerError::InvalidRotation(degrees));
        }
        let image = self.image.as_mut().ok_or(ComposerError::NoImage)?;
        image.rotation = normalize_degrees(degrees);
        Ok(image.rotation)
    }

    /// Millimeter snapshot of the current placement. Pure; may be called any number of times.
    pub fn compute_print_job(&self) -> Result<PrintJob, ComposerError> {
        let image = self.image.as_ref().ok_or(ComposerError::NoImage)?;

        Ok(PrintJob {
            image_url: image.image_url.clone(),
            x_mm: image.position_mm.x,
            y_mm: image.position_mm.y,
            width_mm: image.size_mm.width,
            height_mm: image.size_mm.height,
            rotation: image.rotation,
        })
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
