// ============================================================================
// PixelFE CLI — headless batch pixelation via command-line arguments
// ============================================================================
//
// Usage examples:
//   pixelfe --input photo.png --output art.png
//   pixelfe -i photo.jpg -g 64 -o art.png            (fixed 64-wide grid)
//   pixelfe -i "shots/*.jpg" --output-dir out/ --max-colors 16
//   pixelfe -i sprite.png --scale 8 -o big.png       (crisp re-enlargement)
//   pixelfe -i photo.png --project -o photo.pxfe     (editable project out)
//
// No editor session is opened in CLI mode. Each input runs through the same
// downscale pipeline the editor's import dialog uses: estimate (or take) a
// grid width, reduce each cell to its median color, optionally snap the
// result to a k-means palette.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use crate::canvas::{CanvasState, PixelBuffer};
use crate::io::{decode_image, save_pxfe, write_png};
use crate::ops::downscale::{
    DownscaleOptions, downscale_with_options, estimate_grid_size, upscale_nearest,
};
use crate::{log_err, log_info};

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// PixelFE headless pixelator.
///
/// Convert images to pixel art without opening the editor.
#[derive(Parser, Debug)]
#[command(
    name = "pixelfe",
    about = "PixelFE headless batch pixelator",
    long_about = "Reduce images to pixel art from the command line: median-cell\n\
                  downscaling to a target grid width, optional k-means palette\n\
                  reduction, and nearest-neighbour re-enlargement.\n\n\
                  Example:\n  \
                  pixelfe --input photo.png --grid-size 64 --output art.png\n  \
                  pixelfe -i \"shots/*.jpg\" --output-dir out/ --max-colors 16"
)]
pub struct CliArgs {
    /// Input file(s). Glob patterns accepted (e.g. "*.png", "shots/*.jpg").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Output pixel-grid width. When omitted, a grid is estimated from each
    /// image's edge density.
    #[arg(short, long, value_name = "CELLS")]
    pub grid_size: Option<u32>,

    /// Reduce the result to at most this many colors (k-means).
    #[arg(long, value_name = "N")]
    pub max_colors: Option<u32>,

    /// Nearest-neighbour re-enlargement factor applied to the result.
    #[arg(long, default_value_t = 1, value_name = "FACTOR")]
    pub scale: u32,

    /// Output file path. Only valid for single-file input.
    /// For batch input use --output-dir instead.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing. Files are written here with
    /// the original stem and a `.png` (or `.pxfe`) extension.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Write an editable .pxfe project instead of a PNG.
    #[arg(long, default_value_t = false)]
    pub project: bool,
}

/// Entry point for CLI mode. Returns the process exit code.
pub fn run(args: CliArgs) -> ExitCode {
    let inputs = expand_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched");
        return ExitCode::FAILURE;
    }
    if args.output.is_some() && inputs.len() > 1 {
        eprintln!("error: --output is for single-file input; use --output-dir for batches");
        return ExitCode::FAILURE;
    }
    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!("error: cannot create {}: {}", dir.display(), e);
        return ExitCode::FAILURE;
    }

    let mut failures = 0usize;
    for input in &inputs {
        let started = Instant::now();
        match process_file(input, &args) {
            Ok(output) => {
                println!(
                    "{} -> {} ({} ms)",
                    input.display(),
                    output.display(),
                    started.elapsed().as_millis()
                );
            }
            Err(message) => {
                failures += 1;
                log_err!("{}: {}", input.display(), message);
                eprintln!("error: {}: {}", input.display(), message);
            }
        }
    }

    if failures > 0 {
        eprintln!("{}/{} file(s) failed", failures, inputs.len());
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Expand literal paths and glob patterns, keeping input order and dropping
/// duplicates.
fn expand_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut seen = std::collections::HashSet::new();
    let mut inputs = Vec::new();
    for pattern in patterns {
        let path = Path::new(pattern);
        if path.is_file() {
            if seen.insert(path.to_path_buf()) {
                inputs.push(path.to_path_buf());
            }
            continue;
        }
        match glob::glob(pattern) {
            Ok(entries) => {
                for entry in entries.flatten() {
                    if entry.is_file() && seen.insert(entry.clone()) {
                        inputs.push(entry);
                    }
                }
            }
            Err(e) => eprintln!("warning: bad pattern {:?}: {}", pattern, e),
        }
    }
    inputs
}

fn process_file(input: &Path, args: &CliArgs) -> Result<PathBuf, String> {
    let source = decode_image(input)?;

    let grid_size = match args.grid_size {
        Some(size) if size >= 1 => size,
        Some(_) => return Err("grid size must be at least 1".to_string()),
        None => {
            let estimated = estimate_grid_size(&source);
            log_info!("{}: estimated grid {}", input.display(), estimated);
            estimated
        }
    };

    let reduced = downscale_with_options(
        &source,
        DownscaleOptions {
            grid_size,
            max_colors: args.max_colors,
        },
    );
    let result = upscale_nearest(&reduced, args.scale);

    let output = output_path_for(input, args);
    if args.project {
        let mut state = CanvasState::new(result.width(), result.height());
        state.layers[0].pixels = PixelBuffer::from_image(result);
        save_pxfe(&state, &output).map_err(|e| e.to_string())?;
    } else {
        write_png(&result, &output)?;
    }
    Ok(output)
}

/// Where a processed file goes: --output verbatim, or the input stem inside
/// --output-dir (falling back to the input's directory) with a suffixed
/// name.
fn output_path_for(input: &Path, args: &CliArgs) -> PathBuf {
    if let Some(output) = &args.output {
        return output.clone();
    }
    let extension = if args.project { "pxfe" } else { "png" };
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    let file_name = format!("{}-pixel.{}", stem, extension);
    match &args.output_dir {
        Some(dir) => dir.join(file_name),
        None => input.with_file_name(file_name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(input: Vec<String>) -> CliArgs {
        CliArgs {
            input,
            grid_size: None,
            max_colors: None,
            scale: 1,
            output: None,
            output_dir: None,
            project: false,
        }
    }

    #[test]
    fn output_path_uses_stem_and_mode_extension() {
        let mut a = args(vec!["x.png".to_string()]);
        assert_eq!(
            output_path_for(Path::new("shots/photo.jpg"), &a),
            Path::new("shots/photo-pixel.png")
        );
        a.project = true;
        a.output_dir = Some(PathBuf::from("out"));
        assert_eq!(
            output_path_for(Path::new("shots/photo.jpg"), &a),
            Path::new("out/photo-pixel.pxfe")
        );
        a.output = Some(PathBuf::from("exact.png"));
        assert_eq!(
            output_path_for(Path::new("shots/photo.jpg"), &a),
            Path::new("exact.png")
        );
    }

    #[test]
    fn expand_inputs_dedups_and_skips_missing() {
        let dir = std::env::temp_dir().join(format!("pixelfe-cli-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("a.png");
        std::fs::write(&file, b"stub").unwrap();

        let patterns = vec![
            file.to_string_lossy().to_string(),
            file.to_string_lossy().to_string(),
            dir.join("*.png").to_string_lossy().to_string(),
        ];
        let inputs = expand_inputs(&patterns);
        assert_eq!(inputs, vec![file.clone()]);

        let _ = std::fs::remove_file(&file);
        let _ = std::fs::remove_dir(&dir);
    }

    #[test]
    fn process_file_writes_pixelated_png() {
        let dir = std::env::temp_dir().join(format!("pixelfe-cli-run-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let input = dir.join("input.png");
        let source = image::RgbaImage::from_pixel(64, 64, image::Rgba([120, 30, 200, 255]));
        source.save_with_format(&input, image::ImageFormat::Png).unwrap();

        let mut a = args(vec![input.to_string_lossy().to_string()]);
        a.grid_size = Some(8);
        a.scale = 2;

        let output = process_file(&input, &a).expect("processing works");
        let written = image::open(&output).expect("output is a readable image");
        assert_eq!((written.width(), written.height()), (16, 16));

        let _ = std::fs::remove_file(&input);
        let _ = std::fs::remove_file(&output);
        let _ = std::fs::remove_dir(&dir);
    }

    #[test]
    fn no_matches_expand_to_nothing() {
        let inputs = expand_inputs(&["/definitely/not/here/*.png".to_string()]);
        assert!(inputs.is_empty());
    }
}
