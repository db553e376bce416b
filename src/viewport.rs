// ============================================================================
// VIEWPORT — zoom/pan state and the single screen <-> image mapping
// ============================================================================
//
// The canvas stack is drawn centred in its container and transformed by
// `translate(pan) scale(zoom)` around its own centre. Every interactive
// surface goes through `CoordinateMapper` to invert exactly that transform.

use serde::{Deserialize, Serialize};

/// 2D point or vector in either screen or image space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

impl std::ops::Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Container bounding box in client (screen) coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContainerRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl ContainerRect {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn center(&self) -> Point {
        Point::new(self.left + self.width / 2.0, self.top + self.height / 2.0)
    }
}

// ============================================================================
// VIEWPORT STATE
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    zoom: f32,
    pub pan: Point,
    zoom_min: f32,
    zoom_max: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(0.1, 8.0)
    }
}

impl Viewport {
    /// Bounds given in either order are sorted. Unusable bounds fall back
    /// to the default range.
    pub fn new(zoom_min: f32, zoom_max: f32) -> Self {
        let (mut zoom_min, mut zoom_max) = (zoom_min.min(zoom_max), zoom_min.max(zoom_max));
        if !(zoom_min > 0.0 && zoom_max.is_finite()) {
            (zoom_min, zoom_max) = (0.1, 8.0);
        }
        Self {
            zoom: 1.0_f32.clamp(zoom_min, zoom_max),
            pan: Point::ZERO,
            zoom_min,
            zoom_max,
        }
    }

    pub fn from_settings(settings: &crate::settings::Settings) -> Self {
        Self::new(settings.zoom_min, settings.zoom_max)
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn set_zoom(&mut self, zoom: f32) {
        self.zoom = zoom.clamp(self.zoom_min, self.zoom_max);
    }

    pub fn zoom_by(&mut self, factor: f32) {
        self.set_zoom(self.zoom * factor);
    }

    /// Zoom while keeping a client-space point fixed (e.g. under the cursor).
    pub fn zoom_around(&mut self, factor: f32, anchor: Point, container: ContainerRect) {
        let old_zoom = self.zoom;
        self.set_zoom(self.zoom * factor);
        let actual_factor = self.zoom / old_zoom;
        // new_center = anchor + (old_center - anchor) * factor
        let old_center = container.center() + self.pan;
        let new_center = Point::new(
            anchor.x + (old_center.x - anchor.x) * actual_factor,
            anchor.y + (old_center.y - anchor.y) * actual_factor,
        );
        self.pan = new_center - container.center();
    }

    pub fn pan_by(&mut self, delta: Point) {
        self.pan = self.pan + delta;
    }

    /// Back to 1:1 and centred. Called whenever a new image loads.
    pub fn reset(&mut self) {
        self.set_zoom(1.0);
        self.pan = Point::ZERO;
    }

    /// Largest zoom (never above 1:1) at which the whole image fits the
    /// container, centred.
    pub fn fit_to(&mut self, container: ContainerRect, image_width: u32, image_height: u32) {
        self.pan = Point::ZERO;
        if image_width == 0 || image_height == 0 || container.width <= 0.0 || container.height <= 0.0 {
            self.set_zoom(1.0);
            return;
        }
        let fit = (container.width / image_width as f32)
            .min(container.height / image_height as f32)
            .min(1.0);
        self.set_zoom(fit);
    }

    pub fn mapper(&self, container: ContainerRect, image_width: u32, image_height: u32) -> CoordinateMapper {
        CoordinateMapper {
            center: container.center(),
            pan: self.pan,
            zoom: self.zoom,
            half_image: Point::new(image_width as f32 / 2.0, image_height as f32 / 2.0),
        }
    }
}

// ============================================================================
// COORDINATE MAPPER
// ============================================================================

/// Snapshot of everything needed to map between client and image space.
/// Rebuild it whenever the container resizes or the viewport changes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoordinateMapper {
    center: Point,
    pan: Point,
    zoom: f32,
    half_image: Point,
}

impl CoordinateMapper {
    /// `image = (client - container_center - pan) / zoom + image_size / 2`.
    /// Out-of-bounds results are returned as-is; callers clamp.
    pub fn to_image(&self, client: Point) -> Point {
        Point::new(
            (client.x - self.center.x - self.pan.x) / self.zoom + self.half_image.x,
            (client.y - self.center.y - self.pan.y) / self.zoom + self.half_image.y,
        )
    }

    /// Exact inverse of [`to_image`](Self::to_image).
    pub fn to_client(&self, image: Point) -> Point {
        Point::new(
            (image.x - self.half_image.x) * self.zoom + self.center.x + self.pan.x,
            (image.y - self.half_image.y) * self.zoom + self.center.y + self.pan.y,
        )
    }

    /// Convert a screen-space length (e.g. a handle radius) to image pixels.
    pub fn screen_len_to_image(&self, len: f32) -> f32 {
        len / self.zoom
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }
}
