// ============================================================================
// CROP & GUIDES — export rectangle, split guides and grid cells
// ============================================================================
//
// All positions are image-space pixels. The rectangle is always inside the
// image and never smaller than the minimum size; guides always lie inside
// the rectangle on their axis. Guides and rectangle edges together define
// the split grid.

use serde::{Deserialize, Serialize};

use crate::canvas::PixelRect;
use crate::viewport::Point;

/// `v` clamped to `[lo, hi]`; when the range is inverted `lo` wins.
#[inline]
fn clamp_range(v: f32, lo: f32, hi: f32) -> f32 {
    v.min(hi).max(lo)
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl CropRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn full(image_width: u32, image_height: u32) -> Self {
        Self::new(0.0, 0.0, image_width as f32, image_height as f32)
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn corner_point(&self, corner: Corner) -> Point {
        match corner {
            Corner::TopLeft => Point::new(self.x, self.y),
            Corner::TopRight => Point::new(self.right(), self.y),
            Corner::BottomLeft => Point::new(self.x, self.bottom()),
            Corner::BottomRight => Point::new(self.right(), self.bottom()),
        }
    }

    /// Move/shrink the rectangle inside the image and enforce the minimum
    /// size (capped at the image size on each axis).
    pub fn clamped(self, image_width: u32, image_height: u32, min_size: f32) -> Self {
        let (iw, ih) = (image_width as f32, image_height as f32);
        let min_w = min_size.min(iw);
        let min_h = min_size.min(ih);
        let x = clamp_range(self.x, 0.0, iw - min_w);
        let y = clamp_range(self.y, 0.0, ih - min_h);
        Self {
            x,
            y,
            width: clamp_range(self.width, min_w, iw - x),
            height: clamp_range(self.height, min_h, ih - y),
        }
    }

    /// Integer pixel rectangle with rounded edges, clipped to the image.
    pub fn to_pixel_rect(&self, image_width: u32, image_height: u32) -> PixelRect {
        let x0 = clamp_range(self.x.round(), 0.0, image_width as f32) as u32;
        let y0 = clamp_range(self.y.round(), 0.0, image_height as f32) as u32;
        let x1 = clamp_range(self.right().round(), x0 as f32, image_width as f32) as u32;
        let y1 = clamp_range(self.bottom().round(), y0 as f32, image_height as f32) as u32;
        PixelRect::new(x0, y0, x1 - x0, y1 - y0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Corner {
    pub const ALL: [Corner; 4] = [
        Corner::TopLeft,
        Corner::TopRight,
        Corner::BottomLeft,
        Corner::BottomRight,
    ];
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GuideAxis {
    /// A horizontal line; `position` is a y coordinate.
    Horizontal,
    /// A vertical line; `position` is an x coordinate.
    Vertical,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Guide {
    pub axis: GuideAxis,
    pub position: f32,
}

impl Guide {
    pub fn horizontal(y: f32) -> Self {
        Self {
            axis: GuideAxis::Horizontal,
            position: y,
        }
    }

    pub fn vertical(x: f32) -> Self {
        Self {
            axis: GuideAxis::Vertical,
            position: x,
        }
    }
}

/// What a pointer-down on the crop overlay grabbed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CropHit {
    Corner(Corner),
    Guide(usize),
}

/// One cell of the split grid, in row-major order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridCell {
    pub row: usize,
    pub col: usize,
    pub rect: PixelRect,
}

// ============================================================================
// CROP LAYOUT
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CropLayout {
    pub rect: CropRect,
    pub guides: Vec<Guide>,
    image_width: u32,
    image_height: u32,
}

impl CropLayout {
    /// Full-image rectangle, no guides.
    pub fn new(image_width: u32, image_height: u32) -> Self {
        Self {
            rect: CropRect::full(image_width, image_height),
            guides: Vec::new(),
            image_width,
            image_height,
        }
    }

    pub fn image_dimensions(&self) -> (u32, u32) {
        (self.image_width, self.image_height)
    }

    pub fn set_rect(&mut self, rect: CropRect, min_size: f32) {
        self.rect = rect.clamped(self.image_width, self.image_height, min_size);
        self.clamp_guides();
    }

    fn axis_range(&self, axis: GuideAxis) -> (f32, f32) {
        match axis {
            GuideAxis::Horizontal => (self.rect.y, self.rect.bottom()),
            GuideAxis::Vertical => (self.rect.x, self.rect.right()),
        }
    }

    fn clamp_guides(&mut self) {
        let h = self.axis_range(GuideAxis::Horizontal);
        let v = self.axis_range(GuideAxis::Vertical);
        for g in &mut self.guides {
            let (lo, hi) = match g.axis {
                GuideAxis::Horizontal => h,
                GuideAxis::Vertical => v,
            };
            g.position = clamp_range(g.position, lo, hi);
        }
    }

    /// Corners win over guides. `corner_radius` and `guide_margin` are in
    /// image pixels (convert screen radii with the mapper first).
    pub fn hit_test(&self, p: Point, corner_radius: f32, guide_margin: f32) -> Option<CropHit> {
        let corner = Corner::ALL
            .iter()
            .map(|&c| (c, self.rect.corner_point(c).distance(p)))
            .filter(|&(_, d)| d <= corner_radius)
            .min_by(|a, b| a.1.total_cmp(&b.1));
        if let Some((c, _)) = corner {
            return Some(CropHit::Corner(c));
        }

        let r = &self.rect;
        self.guides
            .iter()
            .enumerate()
            .filter_map(|(i, g)| {
                let (along, across, lo, hi) = match g.axis {
                    GuideAxis::Horizontal => (p.y, p.x, r.x, r.right()),
                    GuideAxis::Vertical => (p.x, p.y, r.y, r.bottom()),
                };
                let d = (along - g.position).abs();
                let inside = across >= lo - guide_margin && across <= hi + guide_margin;
                (d <= guide_margin && inside).then_some((i, d))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| CropHit::Guide(i))
    }

    /// Move one corner; the opposite edges stay put and the size never goes
    /// below `min_size`.
    pub fn drag_corner(&mut self, corner: Corner, to: Point, min_size: f32) {
        let (iw, ih) = (self.image_width as f32, self.image_height as f32);
        let min_w = min_size.min(iw);
        let min_h = min_size.min(ih);
        let r = self.rect;
        let (mut left, mut top, mut right, mut bottom) = (r.x, r.y, r.right(), r.bottom());

        match corner {
            Corner::TopLeft | Corner::BottomLeft => left = clamp_range(to.x, 0.0, right - min_w),
            Corner::TopRight | Corner::BottomRight => right = clamp_range(to.x, left + min_w, iw),
        }
        match corner {
            Corner::TopLeft | Corner::TopRight => top = clamp_range(to.y, 0.0, bottom - min_h),
            Corner::BottomLeft | Corner::BottomRight => bottom = clamp_range(to.y, top + min_h, ih),
        }

        self.rect = CropRect::new(left, top, right - left, bottom - top).clamped(
            self.image_width,
            self.image_height,
            min_size,
        );
        self.clamp_guides();
    }

    /// Drag a guide along its axis, clamped to the rectangle.
    pub fn drag_guide(&mut self, index: usize, to: Point) {
        let Some(axis) = self.guides.get(index).map(|g| g.axis) else {
            return;
        };
        let along = match axis {
            GuideAxis::Horizontal => to.y,
            GuideAxis::Vertical => to.x,
        };
        let (lo, hi) = self.axis_range(axis);
        self.guides[index].position = clamp_range(along, lo, hi);
    }

    pub fn add_guide(&mut self, axis: GuideAxis, position: f32) -> usize {
        let (lo, hi) = self.axis_range(axis);
        self.guides.push(Guide {
            axis,
            position: clamp_range(position, lo, hi),
        });
        self.guides.len() - 1
    }

    pub fn clear_guides(&mut self) {
        self.guides.clear();
    }

    /// Replace all guides with an even `rows x cols` grid.
    pub fn regular_grid(&mut self, rows: usize, cols: usize) {
        let rows = rows.max(1);
        let cols = cols.max(1);
        let r = self.rect;
        self.guides.clear();
        for i in 1..rows {
            self.guides
                .push(Guide::horizontal(r.y + r.height * i as f32 / rows as f32));
        }
        for j in 1..cols {
            self.guides
                .push(Guide::vertical(r.x + r.width * j as f32 / cols as f32));
        }
    }

    /// Reposition every guide at the midpoints of empty row/column runs of
    /// `alpha` (a `width * height` plane) inside the crop rectangle. Runs
    /// touching the rectangle edges are margins, not gaps. Returns the number
    /// of guides placed.
    pub fn auto_detect(&mut self, alpha: &[u8], width: u32, height: u32) -> usize {
        if alpha.len() != width as usize * height as usize {
            return 0;
        }
        let pr = self.rect.to_pixel_rect(width.min(self.image_width), height.min(self.image_height));
        if pr.is_empty() {
            return 0;
        }
        let wu = width as usize;

        let mut col_sums = vec![0u32; pr.width as usize];
        let mut row_sums = vec![0u32; pr.height as usize];
        for y in pr.y..pr.bottom() {
            let row = &alpha[y as usize * wu..(y as usize + 1) * wu];
            for x in pr.x..pr.right() {
                if row[x as usize] > 0 {
                    col_sums[(x - pr.x) as usize] += 1;
                    row_sums[(y - pr.y) as usize] += 1;
                }
            }
        }

        self.guides.clear();
        for mid in gap_midpoints(&row_sums) {
            self.guides.push(Guide::horizontal(pr.y as f32 + mid));
        }
        for mid in gap_midpoints(&col_sums) {
            self.guides.push(Guide::vertical(pr.x as f32 + mid));
        }
        self.clamp_guides();
        self.guides.len()
    }

    /// Sorted, deduplicated interior cut positions on one axis.
    fn cuts(&self, axis: GuideAxis, lo: u32, hi: u32) -> Vec<u32> {
        let mut cuts: Vec<u32> = self
            .guides
            .iter()
            .filter(|g| g.axis == axis)
            .map(|g| g.position.round().max(0.0) as u32)
            .filter(|&p| p > lo && p < hi)
            .collect();
        cuts.sort_unstable();
        cuts.dedup();
        let mut edges = Vec::with_capacity(cuts.len() + 2);
        edges.push(lo);
        edges.extend(cuts);
        edges.push(hi);
        edges
    }

    /// Split the rectangle into grid cells. Cells tile the pixel rectangle
    /// exactly; guides that coincide after rounding produce one cut.
    pub fn cells(&self) -> Vec<GridCell> {
        let pr = self.rect.to_pixel_rect(self.image_width, self.image_height);
        if pr.is_empty() {
            return Vec::new();
        }
        let ys = self.cuts(GuideAxis::Horizontal, pr.y, pr.bottom());
        let xs = self.cuts(GuideAxis::Vertical, pr.x, pr.right());

        let mut cells = Vec::with_capacity((ys.len() - 1) * (xs.len() - 1));
        for (row, yw) in ys.windows(2).enumerate() {
            for (col, xw) in xs.windows(2).enumerate() {
                cells.push(GridCell {
                    row,
                    col,
                    rect: PixelRect::new(xw[0], yw[0], xw[1] - xw[0], yw[1] - yw[0]),
                });
            }
        }
        cells
    }

    pub fn grid_shape(&self) -> (usize, usize) {
        let cells = self.cells();
        let rows = cells.iter().map(|c| c.row + 1).max().unwrap_or(0);
        let cols = cells.iter().map(|c| c.col + 1).max().unwrap_or(0);
        (rows, cols)
    }
}

/// Midpoints (relative to the profile start) of maximal zero runs that do
/// not touch either end of the profile.
fn gap_midpoints(profile: &[u32]) -> Vec<f32> {
    let mut mids = Vec::new();
    let mut run_start: Option<usize> = None;
    for (i, &v) in profile.iter().enumerate() {
        match (v == 0, run_start) {
            (true, None) => run_start = Some(i),
            (false, Some(start)) => {
                if start > 0 {
                    mids.push((start + i) as f32 / 2.0);
                }
                run_start = None;
            }
            _ => {}
        }
    }
    mids
}
