use serde::{Deserialize, Serialize};
use shared::domain::PageSize;
use tracing::debug;

/// Smallest usable extent on either axis after padding is removed.
const MIN_AVAILABLE_PX: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            width: self.width * factor,
            height: self.height * factor,
        }
    }
}

/// Screen area the host can give to the composer, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 800.0,
        }
    }
}

/// Space reserved around the workspace for toolbars and hints.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportPadding {
    pub horizontal: f64,
    pub vertical: f64,
}

impl Default for ViewportPadding {
    fn default() -> Self {
        Self {
            horizontal: 40.0,
            vertical: 120.0,
        }
    }
}

/// On-screen rectangle standing in for the physical page.
///
/// Pixel width / height always equals the page's width / height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Workspace {
    page: PageSize,
    width_px: f64,
    height_px: f64,
}

impl Workspace {
    /// Fits the page into the viewport minus padding, maxing out whichever axis binds.
    pub fn fit(page: PageSize, viewport: Viewport, padding: ViewportPadding) -> Self {
        let available_width = (viewport.width - padding.horizontal).max(MIN_AVAILABLE_PX);
        let available_height = (viewport.height - padding.vertical).max(MIN_AVAILABLE_PX);
        let ratio = page.aspect_ratio();

        let (width_px, height_px) = if available_height * ratio <= available_width {
            (available_height * ratio, available_height)
        } else {
            (available_width, available_width / ratio)
        };

        debug!(
            width_px,
            height_px,
            viewport_width = viewport.width,
            viewport_height = viewport.height,
            "composer: workspace fitted"
        );

        Self {
            page,
            width_px,
            height_px,
        }
    }

    pub fn page(&self) -> PageSize {
        self.page
    }

    pub fn width_px(&self) -> f64 {
        self.width_px
    }

    pub fn height_px(&self) -> f64 {
        self.height_px
    }

    pub fn size(&self) -> Size {
        Size::new(self.width_px, self.height_px)
    }

    pub fn mm_per_pixel(&self) -> f64 {
        self.page.width_mm / self.width_px
    }

    pub fn to_mm(&self, px: f64) -> f64 {
        px * self.mm_per_pixel()
    }

    pub fn to_px(&self, mm: f64) -> f64 {
        mm / self.mm_per_pixel()
    }
}
