use image::{Rgba, RgbaImage};

use stickercut::components::history::{HistoryEntry, HistoryManager};
use stickercut::ops::brush::{BrushMode, BrushStamp, paint_segment};
use stickercut::ops::compositor::{ComposeOptions, Composition, ShadowConfig, StrokeConfig, compose};
use stickercut::ops::crop::{Corner, CropLayout, CropRect, GuideAxis};
use stickercut::ops::flood_fill::flood_fill;
use stickercut::ops::mask_post::protect_holes;
use stickercut::pool::BufferPool;
use stickercut::{ContainerRect, MaskStore, Point, SourceImage, Viewport};

const MAX_BLUR: f32 = 20.0;

fn hard(mode: BrushMode, size: f32) -> BrushStamp {
    BrushStamp {
        size,
        hardness: 1.0,
        mode,
    }
}

#[test]
fn client_image_round_trip_across_zoom_and_pan() {
    let container = ContainerRect::new(37.0, 12.0, 800.0, 600.0);
    for &zoom in &[0.1, 0.25, 1.0, 3.3, 8.0] {
        for &pan in &[Point::ZERO, Point::new(-250.5, 90.0), Point::new(1e4, -3e3)] {
            let mut viewport = Viewport::new(0.1, 8.0);
            viewport.set_zoom(zoom);
            viewport.pan = pan;
            let mapper = viewport.mapper(container, 1920, 1080);
            for &client in &[Point::new(0.0, 0.0), Point::new(437.0, 312.0), Point::new(-80.0, 900.5)] {
                let back = mapper.to_client(mapper.to_image(client));
                let tol = 1e-3 * (1.0 + client.x.abs().max(client.y.abs()) + pan.x.abs().max(pan.y.abs()));
                assert!((back.x - client.x).abs() < tol, "zoom {} pan {:?}: {:?} -> {:?}", zoom, pan, client, back);
                assert!((back.y - client.y).abs() < tol, "zoom {} pan {:?}: {:?} -> {:?}", zoom, pan, client, back);
            }
        }
    }
}

#[test]
fn restore_over_kept_pixels_changes_nothing() {
    let mut mask = MaskStore::opaque(40, 30);
    let before = mask.clone();
    for hardness in [0.0, 0.5, 1.0] {
        let stamp = BrushStamp {
            size: 12.0,
            hardness,
            mode: BrushMode::Restore,
        };
        paint_segment(&mut mask, Point::new(5.0, 5.0), Point::new(35.0, 25.0), &stamp, MAX_BLUR);
    }
    assert_eq!(mask, before);
}

#[test]
fn hard_erase_then_restore_same_path_is_fully_kept() {
    let mut mask = MaskStore::opaque(50, 50);
    let (from, to) = (Point::new(10.0, 12.0), Point::new(40.0, 30.0));
    let erased = paint_segment(&mut mask, from, to, &hard(BrushMode::Erase, 10.0), MAX_BLUR).unwrap();
    assert!(mask.removed_count() > 0);
    paint_segment(&mut mask, from, to, &hard(BrushMode::Restore, 10.0), MAX_BLUR).unwrap();
    for y in erased.y..erased.bottom() {
        for x in erased.x..erased.right() {
            assert_eq!(mask.alpha(x, y), 255, "pixel ({}, {})", x, y);
        }
    }
}

/// Left half red, right half blue, split at `split_x`.
fn two_regions(w: u32, h: u32, split_x: u32) -> SourceImage {
    SourceImage::from_rgba(RgbaImage::from_fn(w, h, |x, _| {
        if x < split_x {
            Rgba([220, 30, 30, 255])
        } else {
            Rgba([30, 30, 220, 255])
        }
    }))
}

#[test]
fn flood_fill_stays_inside_its_region() {
    let (w, h, split) = (24, 16, 10);
    let source = two_regions(w, h, split);
    let mut pool = BufferPool::new();
    for seed in [(0, 0), (4, 7), (9, 15), (1, 14)] {
        let mut mask = MaskStore::opaque(w, h);
        let report = flood_fill(&source, &mut mask, seed.0, seed.1, 0.0, &mut pool).unwrap();
        assert_eq!(report.erased, (split * h) as usize);
        for y in 0..h {
            for x in 0..w {
                let expected = if x < split { 0 } else { 255 };
                assert_eq!(mask.alpha(x, y), expected, "seed {:?} pixel ({}, {})", seed, x, y);
            }
        }
    }
}

#[test]
fn flood_fill_grows_with_tolerance() {
    // Horizontal grey ramp: a larger tolerance reaches further along it.
    let source = SourceImage::from_rgba(RgbaImage::from_fn(64, 8, |x, _| {
        let v = (x * 4) as u8;
        Rgba([v, v, v, 255])
    }));
    let mut pool = BufferPool::new();
    let mut previous: Option<Vec<bool>> = None;
    for tolerance in [0.0, 1.0, 5.0, 10.0, 25.0, 50.0, 100.0] {
        let mut mask = MaskStore::opaque(64, 8);
        flood_fill(&source, &mut mask, 0, 3, tolerance, &mut pool).unwrap();
        let erased: Vec<bool> = mask.alpha_plane().iter().map(|&a| a == 0).collect();
        if let Some(prev) = &previous {
            for (i, (&was, &now)) in prev.iter().zip(&erased).enumerate() {
                assert!(!was || now, "tolerance {} lost pixel {}", tolerance, i);
            }
        }
        previous = Some(erased);
    }
    assert!(previous.unwrap().iter().all(|&e| e));
}

#[test]
fn hole_protection_fills_enclosed_hole_only() {
    let (size, c) = (41u32, 20.0f32);
    let alpha: Vec<u8> = (0..size * size)
        .map(|i| {
            let (x, y) = ((i % size) as f32, (i / size) as f32);
            let d = ((x - c).powi(2) + (y - c).powi(2)).sqrt();
            if d <= 15.0 && d > 5.0 { 255 } else { 0 }
        })
        .collect();
    let mut mask = MaskStore::from_alpha(size, size, &alpha).unwrap();
    protect_holes(&mut mask, 50, &mut BufferPool::new());

    for y in 0..size {
        for x in 0..size {
            let d = ((x as f32 - c).powi(2) + (y as f32 - c).powi(2)).sqrt();
            if d <= 5.0 {
                assert_eq!(mask.alpha(x, y), 255, "hole pixel ({}, {})", x, y);
            } else if d > 15.0 {
                assert_eq!(mask.alpha(x, y), 0, "exterior pixel ({}, {})", x, y);
            }
        }
    }
}

fn entry_with(value: u8, layout: &CropLayout) -> HistoryEntry {
    let mut mask = MaskStore::opaque(4, 4);
    mask.fill(value);
    HistoryEntry::capture(format!("fill {}", value), &mask, layout)
}

#[test]
fn history_never_exceeds_capacity_and_evicts_oldest() {
    let layout = CropLayout::new(4, 4);
    let capacity = 5;
    let mut history = HistoryManager::new(capacity);
    for v in 0..12u8 {
        history.commit(entry_with(v, &layout));
        assert!(history.len() <= capacity);
    }
    assert_eq!(history.len(), capacity);

    let mut mask = MaskStore::opaque(4, 4);
    let mut layout_out = layout.clone();
    for _ in 0..capacity - 1 {
        let entry = history.undo().expect("retained entry");
        entry.restore_into(&mut mask, &mut layout_out).unwrap();
    }
    // Oldest retained entry is the 8th commit (value 7).
    assert_eq!(mask.alpha(0, 0), 7);
    assert!(history.undo().is_none());
    assert_eq!(history.cursor(), 0);
}

#[test]
fn corner_and_guide_drags_respect_clamps() {
    let mut layout = CropLayout::new(100, 80);
    layout.drag_corner(Corner::TopLeft, Point::new(500.0, 500.0), 10.0);
    assert!(layout.rect.width >= 10.0 && layout.rect.height >= 10.0);
    assert_eq!(layout.rect.right(), 100.0);
    assert_eq!(layout.rect.bottom(), 80.0);

    layout.drag_corner(Corner::TopLeft, Point::new(-50.0, -50.0), 10.0);
    assert_eq!(layout.rect, CropRect::new(0.0, 0.0, 100.0, 80.0));

    layout.drag_corner(Corner::BottomRight, Point::new(-30.0, 2.0), 10.0);
    assert_eq!(layout.rect, CropRect::new(0.0, 0.0, 10.0, 10.0));

    layout.set_rect(CropRect::new(20.0, 10.0, 50.0, 40.0), 10.0);
    let v = layout.add_guide(GuideAxis::Vertical, 30.0);
    let h = layout.add_guide(GuideAxis::Horizontal, 30.0);
    layout.drag_guide(v, Point::new(-100.0, 0.0));
    layout.drag_guide(h, Point::new(0.0, 1000.0));
    assert_eq!(layout.guides[v].position, 20.0);
    assert_eq!(layout.guides[h].position, 50.0);
}

#[test]
fn split_cells_tile_the_crop_exactly() {
    let mut layout = CropLayout::new(100, 80);
    layout.set_rect(CropRect::new(10.0, 5.0, 60.0, 40.0), 10.0);
    layout.add_guide(GuideAxis::Horizontal, 15.0);
    layout.add_guide(GuideAxis::Horizontal, 30.0);
    layout.add_guide(GuideAxis::Vertical, 25.0);
    layout.add_guide(GuideAxis::Vertical, 40.0);
    layout.add_guide(GuideAxis::Vertical, 55.0);

    let cells = layout.cells();
    assert_eq!(cells.len(), (2 + 1) * (3 + 1));

    let mut coverage = vec![0u8; 100 * 80];
    for cell in &cells {
        assert!(!cell.rect.is_empty());
        for y in cell.rect.y..cell.rect.bottom() {
            for x in cell.rect.x..cell.rect.right() {
                coverage[(y * 100 + x) as usize] += 1;
            }
        }
    }
    for y in 0..80u32 {
        for x in 0..100u32 {
            let inside = (10..70).contains(&x) && (5..45).contains(&y);
            assert_eq!(coverage[(y * 100 + x) as usize], inside as u8, "pixel ({}, {})", x, y);
        }
    }

    layout.clear_guides();
    assert_eq!(layout.cells().len(), 1);
}

fn stroked(thickness: f32) -> ComposeOptions {
    ComposeOptions {
        stroke: Some(StrokeConfig {
            thickness,
            samples: 36,
            color: [255, 255, 255, 255],
            ..StrokeConfig::default()
        }),
        ..ComposeOptions::default()
    }
}

fn centred_square(size: u32, lo: u32, hi: u32) -> MaskStore {
    let alpha: Vec<u8> = (0..size * size)
        .map(|i| {
            let (x, y) = (i % size, i / size);
            if (lo..hi).contains(&x) && (lo..hi).contains(&y) { 255 } else { 0 }
        })
        .collect();
    MaskStore::from_alpha(size, size, &alpha).unwrap()
}

/// Pixel at source coordinates `(x, y)` of a composition.
fn pixel_at(c: &Composition, x: i64, y: i64) -> [u8; 4] {
    c.image.get_pixel((x - c.origin.0) as u32, (y - c.origin.1) as u32).0
}

fn strictly_contains(outer: (i64, i64, i64, i64), inner: (i64, i64, i64, i64)) -> bool {
    outer.0 < inner.0 && outer.1 < inner.1 && outer.2 > inner.2 && outer.3 > inner.3
}

#[test]
fn stroke_strictly_grows_content_bounds() {
    let source = SourceImage::from_rgba(RgbaImage::from_pixel(60, 60, Rgba([200, 120, 40, 255])));
    let inner = centred_square(60, 20, 40);
    // Edge-touching cutouts: a left-border strip and the full image.
    let left_strip = MaskStore::from_alpha(
        60,
        60,
        &(0..60 * 60u32)
            .map(|i| if i % 60 < 20 && (10..30).contains(&(i / 60)) { 255 } else { 0 })
            .collect::<Vec<u8>>(),
    )
    .unwrap();
    let full = MaskStore::opaque(60, 60);

    for mask in [&inner, &left_strip, &full] {
        let plain = compose(&source, mask, &ComposeOptions::default(), u64::MAX).unwrap();
        let outlined = compose(&source, mask, &stroked(4.0), u64::MAX).unwrap();
        let a = plain.source_bounds().unwrap();
        let b = outlined.source_bounds().unwrap();
        assert!(strictly_contains(b, a), "{:?} does not strictly contain {:?}", b, a);
    }
}

#[test]
fn shadow_is_cast_by_the_finished_outline() {
    let source = SourceImage::from_rgba(RgbaImage::from_pixel(60, 60, Rgba([200, 120, 40, 255])));
    let mask = centred_square(60, 20, 40);
    let outline_only = compose(&source, &mask, &stroked(6.0), u64::MAX).unwrap();
    let with_shadow = compose(
        &source,
        &mask,
        &ComposeOptions {
            shadow: Some(ShadowConfig {
                blur: 0.0,
                offset_x: 3.0,
                offset_y: 3.0,
                color: [0, 0, 0, 255],
            }),
            ..stroked(6.0)
        },
        u64::MAX,
    )
    .unwrap();

    let outline = outline_only.source_bounds().unwrap();
    let shadowed = with_shadow.source_bounds().unwrap();
    assert_eq!(outline, (14, 14, 46, 46));
    assert!(shadowed.2 > outline.2 && shadowed.3 > outline.3);

    // Just outside the cutout the outline sits on top of the shadow.
    assert_eq!(pixel_at(&with_shadow, 41, 30), [255, 255, 255, 255]);
    // Past the outline, inside the offset: only a shadow of the outline lands here.
    assert_eq!(pixel_at(&with_shadow, 48, 30), [0, 0, 0, 255]);
    assert_eq!(pixel_at(&with_shadow, 30, 30), [200, 120, 40, 255]);
}
