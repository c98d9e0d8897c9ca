// ============================================================================
// pixels-editor CLI — headless batch editing via command-line arguments
// ============================================================================
//
// Usage examples:
//   pixels-editor -i photo.png --preset sepia -o result.png
//   pixels-editor -i photo.jpg --brightness 120 --contrast 110 --sharpen 30
//   pixels-editor -i *.jpg --recipe look.json --output-dir processed/ --format jpeg
//   pixels-editor -i shot.png --crop 50,20,600,400 --resize 300x
//
// Each file runs through its own EditorContext, so the result is exactly
// what the interactive editor would produce for the same commands.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Instant, SystemTime};

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::components::crop::CropRect;
use crate::editor::EditorContext;
use crate::error::Result;
use crate::io::{self, SaveFormat};
use crate::logger::{self, LogOptions};
use crate::ops::filters::FilterParam;
use crate::settings::EditorSettings;
use crate::{log_err, log_info};

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// pixels-editor headless image processor.
///
/// Apply presets, filters, flips, crops and resizes to image files.
#[derive(Parser, Debug)]
#[command(
    name = "pixels-editor",
    about = "pixels-editor headless batch image editor",
    long_about = "Apply the editor's filters and transforms to image files without\n\
                  a GUI. Reads PNG, JPEG, WEBP, BMP, TGA and TIFF; writes PNG,\n\
                  JPEG, BMP, TGA and TIFF.\n\n\
                  Example:\n  \
                  pixels-editor -i photo.png --preset warm --sharpen 20 -o out.png\n  \
                  pixels-editor -i *.jpg --recipe look.json --output-dir out/"
)]
pub struct CliArgs {
    /// Input file(s). Glob patterns accepted (e.g. "*.png", "shots/*.jpg").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Output file path. Only valid for single-file input.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing. Files keep their stem.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Output format: png, jpeg, bmp, tga, tiff. Inferred from --output
    /// when omitted, defaulting to png.
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// JPEG quality (1–100, default 90).
    #[arg(short, long, default_value_t = 90, value_name = "1-100")]
    pub quality: u8,

    /// JSON edit recipe. Flags below override its fields.
    #[arg(long, value_name = "RECIPE.json")]
    pub recipe: Option<PathBuf>,

    /// Named look: none, grayscale, sepia, vintage, cold, warm.
    #[arg(long, value_name = "NAME")]
    pub preset: Option<String>,

    #[arg(long, value_name = "0-200")]
    pub brightness: Option<f32>,
    #[arg(long, value_name = "0-200")]
    pub contrast: Option<f32>,
    #[arg(long, value_name = "0-200")]
    pub saturation: Option<f32>,
    #[arg(long, value_name = "0-20")]
    pub blur: Option<f32>,
    #[arg(long, value_name = "DEGREES", allow_negative_numbers = true)]
    pub hue: Option<f32>,
    #[arg(long, value_name = "DEGREES", allow_negative_numbers = true)]
    pub rotate: Option<f32>,
    #[arg(long, value_name = "0-100")]
    pub opacity: Option<f32>,
    #[arg(long, value_name = "0-100")]
    pub sharpen: Option<f32>,

    /// Mirror left-right.
    #[arg(long)]
    pub flip_h: bool,

    /// Mirror top-bottom.
    #[arg(long)]
    pub flip_v: bool,

    /// Crop rectangle in pixels of the edited image (after flips and
    /// rotation), applied after the filters.
    #[arg(long, value_name = "X,Y,W,H", value_parser = parse_crop)]
    pub crop: Option<CropRect>,

    /// Resize after cropping: WxH, Wx (keep aspect) or xH (keep aspect).
    #[arg(long, value_name = "WxH", value_parser = parse_resize)]
    pub resize: Option<ResizeSpec>,

    /// Settings file (defaults to the per-user settings.cfg).
    #[arg(long, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// Print per-file timing and mirror the log to stderr.
    #[arg(short, long)]
    pub verbose: bool,
}

// ============================================================================
// Recipe
// ============================================================================

/// Target size; a missing side keeps the aspect ratio.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResizeSpec {
    pub width: Option<i64>,
    pub height: Option<i64>,
}

/// A batch of edits. Every field is optional; unset fields leave the
/// editor's current value alone.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Recipe {
    pub preset: Option<String>,
    pub brightness: Option<f32>,
    pub contrast: Option<f32>,
    pub saturation: Option<f32>,
    pub blur: Option<f32>,
    pub hue: Option<f32>,
    pub rotate: Option<f32>,
    pub opacity: Option<f32>,
    pub sharpen: Option<f32>,
    pub flip_horizontal: Option<bool>,
    pub flip_vertical: Option<bool>,
    pub crop: Option<CropRect>,
    pub resize: Option<ResizeSpec>,
}

impl Recipe {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// Fields set in `over` win.
    pub fn merged_with(self, over: Recipe) -> Recipe {
        Recipe {
            preset: over.preset.or(self.preset),
            brightness: over.brightness.or(self.brightness),
            contrast: over.contrast.or(self.contrast),
            saturation: over.saturation.or(self.saturation),
            blur: over.blur.or(self.blur),
            hue: over.hue.or(self.hue),
            rotate: over.rotate.or(self.rotate),
            opacity: over.opacity.or(self.opacity),
            sharpen: over.sharpen.or(self.sharpen),
            flip_horizontal: over.flip_horizontal.or(self.flip_horizontal),
            flip_vertical: over.flip_vertical.or(self.flip_vertical),
            crop: over.crop.or(self.crop),
            resize: over.resize.or(self.resize),
        }
    }

    fn filter_values(&self) -> [(FilterParam, Option<f32>); 8] {
        [
            (FilterParam::Brightness, self.brightness),
            (FilterParam::Contrast, self.contrast),
            (FilterParam::Saturation, self.saturation),
            (FilterParam::Blur, self.blur),
            (FilterParam::Hue, self.hue),
            (FilterParam::Rotate, self.rotate),
            (FilterParam::Opacity, self.opacity),
            (FilterParam::Sharpen, self.sharpen),
        ]
    }

    /// Replay onto a loaded editor: preset, then individual sliders and
    /// flips, then crop (in the oriented image's coordinates), then resize.
    pub fn apply(&self, editor: &mut EditorContext) -> Result<()> {
        if let Some(name) = &self.preset {
            editor.apply_preset_name(name)?;
        }

        let mut state = *editor.state();
        for (param, value) in self.filter_values() {
            if let Some(v) = value {
                state.set(param, v);
            }
        }
        if let Some(h) = self.flip_horizontal {
            state.flip_horizontal = h;
        }
        if let Some(v) = self.flip_vertical {
            state.flip_vertical = v;
        }
        if state != *editor.state() {
            editor.apply_state(state)?;
        }

        if let Some(rect) = self.crop {
            editor.apply_crop_rect(rect)?;
        }
        if let Some(size) = self.resize {
            editor.apply_resize(size.width, size.height)?;
        }
        Ok(())
    }
}

impl CliArgs {
    /// The edits given directly on the command line.
    pub fn overrides(&self) -> Recipe {
        Recipe {
            preset: self.preset.clone(),
            brightness: self.brightness,
            contrast: self.contrast,
            saturation: self.saturation,
            blur: self.blur,
            hue: self.hue,
            rotate: self.rotate,
            opacity: self.opacity,
            sharpen: self.sharpen,
            flip_horizontal: self.flip_h.then_some(true),
            flip_vertical: self.flip_v.then_some(true),
            crop: self.crop,
            resize: self.resize,
        }
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = all files succeeded, `1` = one or more files failed.
pub fn run(args: CliArgs) -> ExitCode {
    let settings = match &args.settings {
        Some(path) => EditorSettings::load_from(path),
        None => EditorSettings::load(),
    };

    logger::init(LogOptions {
        file: Some(settings.log_file.clone().unwrap_or_else(logger::default_log_path)),
        echo_stderr: args.verbose,
    });

    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    if inputs.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!(
            "error: {} input files given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory for batch processing.",
            inputs.len()
        );
        return ExitCode::FAILURE;
    }

    let save_format = match parse_format(args.format.as_deref(), args.output.as_deref()) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let base_recipe = match &args.recipe {
        Some(path) => match Recipe::load(path) {
            Ok(r) => r,
            Err(e) => {
                eprintln!("error: could not read recipe '{}': {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => Recipe::default(),
    };
    let recipe = base_recipe.merged_with(args.overrides());

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!("error: could not create output directory '{}': {}", dir.display(), e);
        return ExitCode::FAILURE;
    }

    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;
    let now = SystemTime::now();

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }

        let file_start = Instant::now();
        let output_path = match build_output_path(
            input_path,
            args.output.as_deref(),
            args.output_dir.as_deref(),
            save_format,
            &io::file_timestamp(now),
            &settings.export_prefix,
            multi,
        ) {
            Some(p) => p,
            None => {
                eprintln!("  error: cannot determine output path for '{}'.", input_path.display());
                any_failure = true;
                continue;
            }
        };

        match run_one(input_path, &output_path, &recipe, &settings, save_format, args.quality) {
            Ok(()) => {
                if args.verbose || multi {
                    println!(
                        "  → {} ({:.0}ms)",
                        output_path.display(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                log_err!("{}: {}", input_path.display(), e);
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

// ============================================================================
// Per-file processing pipeline
// ============================================================================

fn run_one(
    input:    &Path,
    output:   &Path,
    recipe:   &Recipe,
    settings: &EditorSettings,
    format:   SaveFormat,
    quality:  u8,
) -> Result<()> {
    let mut editor = EditorContext::new(settings.clone());
    editor.load_file(input)?;
    recipe.apply(&mut editor)?;
    editor.export(output, format, quality)?;
    log_info!("{} -> {}", input.display(), output.display());
    Ok(())
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
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

/// Choose the [`SaveFormat`] from `--format` or the output extension.
/// Defaults to PNG when neither is given.
fn parse_format(format_arg: Option<&str>, output: Option<&Path>) -> std::result::Result<SaveFormat, String> {
    if let Some(f) = format_arg {
        return SaveFormat::from_extension(f).ok_or_else(|| format!("unsupported output format '{}'", f));
    }
    match output.and_then(|o| o.extension()).and_then(|e| e.to_str()) {
        Some(ext) => SaveFormat::from_extension(ext)
            .ok_or_else(|| format!("unsupported output extension '.{}'", ext)),
        None => Ok(SaveFormat::Png),
    }
}

/// Compute the output path for a single input file.
///
/// Priority:
/// 1. `--output` (explicit path, used for single-file input)
/// 2. `--output-dir` (batch directory, derives filename from input stem)
/// 3. Fallback: next to the input, named `<prefix>-<timestamp>`; batches
///    prepend the input stem so names stay unique
fn build_output_path(
    input:      &Path,
    output:     Option<&Path>,
    output_dir: Option<&Path>,
    format:     SaveFormat,
    timestamp:  &str,
    prefix:     &str,
    batch:      bool,
) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }

    let ext  = format.extension();
    let stem = input.file_stem()?.to_string_lossy().into_owned();

    if let Some(dir) = output_dir {
        return Some(dir.join(format!("{}.{}", stem, ext)));
    }

    let parent = input.parent().unwrap_or(Path::new("."));
    let name = if batch {
        format!("{}-{}-{}.{}", stem, prefix, timestamp, ext)
    } else {
        format!("{}-{}.{}", prefix, timestamp, ext)
    };
    Some(parent.join(name))
}

/// `X,Y,W,H` in pixels.
fn parse_crop(s: &str) -> std::result::Result<CropRect, String> {
    let parts: Vec<f32> = s
        .split(',')
        .map(|p| p.trim().parse::<f32>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| format!("invalid crop '{}': {}", s, e))?;
    match parts.as_slice() {
        [x, y, w, h] => Ok(CropRect::new(*x, *y, *w, *h)),
        _ => Err(format!("invalid crop '{}': expected X,Y,W,H", s)),
    }
}

/// `WxH`, `Wx` or `xH`.
fn parse_resize(s: &str) -> std::result::Result<ResizeSpec, String> {
    let lower = s.trim().to_lowercase();
    let Some((w, h)) = lower.split_once('x') else {
        return Err(format!("invalid size '{}': expected WxH, Wx or xH", s));
    };
    let side = |v: &str| -> std::result::Result<Option<i64>, String> {
        let v = v.trim();
        if v.is_empty() {
            Ok(None)
        } else {
            v.parse::<i64>().map(Some).map_err(|e| format!("invalid size '{}': {}", s, e))
        }
    };
    let spec = ResizeSpec { width: side(w)?, height: side(h)? };
    if spec.width.is_none() && spec.height.is_none() {
        return Err(format!("invalid size '{}': give at least one side", s));
    }
    Ok(spec)
}
