// ============================================================================
// stickercut CLI — headless sticker export via command-line arguments
// ============================================================================
//
// Usage examples:
//   stickercut -i photo.png --stroke 8 --output-dir out/
//   stickercut -i shot.jpg --mask shot_mask.png --edge 3 --protect-holes
//   stickercut -i "sheets/*.png" --auto-grid --output-dir cells/
//   stickercut -i sheet.png --grid 2x3 --shadow 8,4,4 --stroke-color 000000
//
// Without --mask the input's own alpha channel is used as the foreground
// estimate, so already-cut PNGs go straight to outline/shadow/split.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use log::{error, info};

use crate::background::{AlphaChannelRemover, RemovalOptions};
use crate::error::Result;
use crate::io;
use crate::ops::compositor::{ShadowConfig, StrokeConfig};
use crate::ops::crop::CropRect;
use crate::ops::mask_post::PostProcessSettings;
use crate::project::{CropAdjustCommand, EditCommand, EditSession, PostProcessCommand};
use crate::settings::Settings;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// Cut stickers out of images: clean up the mask, add an outline and a drop
/// shadow, crop, and split sticker sheets into cells.
#[derive(Parser, Debug)]
#[command(name = "stickercut", version, about = "Headless sticker cut-out and export")]
pub struct CliArgs {
    /// Input image(s). Glob patterns accepted (e.g. "*.png", "sheets/*.jpg").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Mask image for a single input. Alpha is used when present, otherwise
    /// luminance. Without it the input's own alpha is the mask.
    #[arg(short, long, value_name = "FILE")]
    pub mask: Option<PathBuf>,

    /// Foreground threshold (0.0-1.0) applied to the mask before clean-up.
    #[arg(long, value_name = "0-1")]
    pub threshold: Option<f32>,

    /// Directory for output files. Defaults to each input's directory.
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Outline thickness in pixels (0 disables the outline).
    #[arg(long, default_value_t = 0.0, value_name = "PX")]
    pub stroke: f32,

    /// Outline colour as RRGGBB or RRGGBBAA.
    #[arg(long, default_value = "ffffff", value_parser = parse_color, value_name = "HEX")]
    pub stroke_color: [u8; 4],

    /// Drop shadow as BLUR,DX,DY.
    #[arg(long, value_parser = parse_shadow, value_name = "BLUR,DX,DY")]
    pub shadow: Option<ShadowConfig>,

    /// Edge tolerance, -10 (shrink) to 10 (grow).
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true, value_name = "T")]
    pub edge: f32,

    /// Restore enclosed transparent regions (holes) inside the subject.
    #[arg(long)]
    pub protect_holes: bool,

    /// Crop rectangle as X,Y,W,H in image pixels.
    #[arg(long, value_parser = parse_crop, value_name = "X,Y,W,H")]
    pub crop: Option<CropRect>,

    /// Split into an even ROWSxCOLS grid.
    #[arg(long, value_parser = parse_grid, value_name = "RxC", conflicts_with = "auto_grid")]
    pub grid: Option<(usize, usize)>,

    /// Place split guides in the transparent gaps between stickers.
    #[arg(long)]
    pub auto_grid: bool,

    /// Settings JSON file. Defaults to the platform settings path.
    #[arg(long, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// Print per-file timing and debug logging.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    fn splits(&self) -> bool {
        self.grid.is_some() || self.auto_grid
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = all files succeeded, `1` = one or more files failed.
pub fn run(args: CliArgs) -> ExitCode {
    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }
    if inputs.len() > 1 && args.mask.is_some() {
        eprintln!("error: --mask only applies to a single input file.");
        return ExitCode::FAILURE;
    }

    let settings = match &args.settings {
        Some(path) => match Settings::load_from(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("error: could not read settings '{}': {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => Settings::load(),
    }
    .sanitized();

    let total = inputs.len();
    let mut any_failure = false;
    for (idx, input) in inputs.iter().enumerate() {
        if total > 1 || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input.display());
        }
        let started = Instant::now();
        match run_one(input, &args, settings.clone()) {
            Ok(written) => {
                for path in &written {
                    println!("  -> {}", path.display());
                }
                if args.verbose {
                    println!("  ({:.0}ms)", started.elapsed().as_secs_f64() * 1000.0);
                }
            }
            Err(e) => {
                error!("{}: {}", input.display(), e);
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

// ============================================================================
// Per-file pipeline
// ============================================================================

fn run_one(input: &Path, args: &CliArgs, settings: Settings) -> Result<Vec<PathBuf>> {
    let mut session = EditSession::open_file(input, settings)?;

    match &args.mask {
        Some(path) => {
            let mut mask = io::load_mask(path, session.source().dimensions())?;
            if let Some(t) = args.threshold {
                crate::ops::mask_post::threshold_ai_mask(&mut mask, t);
            }
            session.load_mask(mask)?;
        }
        None => {
            let options = RemovalOptions {
                threshold: args.threshold,
                model: None,
            };
            pollster::block_on(session.run_background_removal(&AlphaChannelRemover, &options))?;
        }
    }

    let post = PostProcessSettings {
        edge_tolerance: args.edge,
        protect_holes: args.protect_holes,
    };
    if post != PostProcessSettings::default() {
        session.apply(EditCommand::PostProcess(PostProcessCommand { settings: post }))?;
    }

    if args.stroke > 0.0 {
        session.stroke = Some(StrokeConfig {
            thickness: args.stroke,
            color: args.stroke_color,
            ..StrokeConfig::default()
        });
    }
    session.shadow = args.shadow;

    if let Some(rect) = args.crop {
        session.apply(EditCommand::CropAdjust(CropAdjustCommand::SetRect(rect)))?;
    }
    if let Some((rows, cols)) = args.grid {
        session.apply(EditCommand::CropAdjust(CropAdjustCommand::RegularGrid { rows, cols }))?;
    } else if args.auto_grid {
        session.apply(EditCommand::CropAdjust(CropAdjustCommand::AutoDetect))?;
    }

    let composition = session.export(args.splits())?;

    let dir = match &args.output_dir {
        Some(dir) => dir.clone(),
        None => input.parent().map(Path::to_path_buf).unwrap_or_default(),
    };
    let stem = format!("{}_sticker", session.name);

    let mut written = Vec::new();
    if composition.cells.is_empty() {
        let path = dir.join(format!("{}.png", stem));
        io::write_png(&composition.image, &path)?;
        written.push(path);
    } else {
        written.extend(io::write_cells(&dir, &stem, &composition.cells)?);
    }
    info!("{}: wrote {} file(s)", input.display(), written.len());
    Ok(written)
}

// ============================================================================
// Helpers
// ============================================================================

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);
        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    let is_image = entry
                        .extension()
                        .and_then(|e| e.to_str())
                        .is_some_and(io::is_image_extension);
                    if is_image && !result.contains(&entry) {
                        result.push(entry);
                        matched = true;
                    }
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no image files.", pattern);
                }
            }
            Err(e) => eprintln!("warning: invalid glob '{}': {}", pattern, e),
        }
    }

    result
}

fn parse_numbers(s: &str, count: usize) -> std::result::Result<Vec<f32>, String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() != count {
        return Err(format!("expected {} comma-separated numbers, got '{}'", count, s));
    }
    parts
        .iter()
        .map(|p| p.parse::<f32>().map_err(|e| format!("'{}': {}", p, e)))
        .collect()
}

fn parse_color(s: &str) -> std::result::Result<[u8; 4], String> {
    let hex = s.trim_start_matches('#');
    if hex.len() != 6 && hex.len() != 8 {
        return Err(format!("expected RRGGBB or RRGGBBAA, got '{}'", s));
    }
    let mut rgba = [255u8; 4];
    for (i, slot) in rgba.iter_mut().enumerate().take(hex.len() / 2) {
        let pair = hex.get(i * 2..i * 2 + 2).ok_or_else(|| format!("invalid colour '{}'", s))?;
        *slot = u8::from_str_radix(pair, 16).map_err(|e| format!("'{}': {}", s, e))?;
    }
    Ok(rgba)
}

fn parse_shadow(s: &str) -> std::result::Result<ShadowConfig, String> {
    let v = parse_numbers(s, 3)?;
    Ok(ShadowConfig {
        blur: v[0].max(0.0),
        offset_x: v[1],
        offset_y: v[2],
        ..ShadowConfig::default()
    })
}

fn parse_crop(s: &str) -> std::result::Result<CropRect, String> {
    let v = parse_numbers(s, 4)?;
    Ok(CropRect::new(v[0], v[1], v[2], v[3]))
}

fn parse_grid(s: &str) -> std::result::Result<(usize, usize), String> {
    let (rows, cols) = s
        .to_lowercase()
        .split_once('x')
        .map(|(r, c)| (r.trim().to_string(), c.trim().to_string()))
        .ok_or_else(|| format!("expected ROWSxCOLS, got '{}'", s))?;
    let rows: usize = rows.parse().map_err(|_| format!("bad row count in '{}'", s))?;
    let cols: usize = cols.parse().map_err(|_| format!("bad column count in '{}'", s))?;
    if rows == 0 || cols == 0 {
        return Err("grid needs at least one row and one column".to_string());
    }
    Ok((rows, cols))
}
