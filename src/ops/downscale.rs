//! Image → pixel-art reduction pipeline.
//!
//! `downscale_to_grid` reduces a source photo to an N-wide pixel grid by
//! taking the per-channel median of every cell (medians keep hard edges
//! where averaging would smear them). `estimate_grid_size` guesses a good
//! grid width from the image's edge density. `KMeansQuantizer` optionally
//! snaps the result to a reduced palette.

use image::{Rgba, RgbaImage};
use rayon::prelude::*;

/// Gradient magnitude above which a pixel counts as an edge.
const EDGE_THRESHOLD: u8 = 24;

/// Grid width returned for degenerate input.
const DEFAULT_GRID_SIZE: u32 = 32;

/// K-means sample cap; larger images are strided down to roughly this many
/// pixels before clustering.
const MAX_KMEANS_PIXELS: usize = 65536;

/// Options for [`downscale_with_options`].
#[derive(Clone, Copy, Debug)]
pub struct DownscaleOptions {
    /// Output grid width in cells; height follows the aspect ratio.
    pub grid_size: u32,
    /// Reduce the result to at most this many colors via k-means.
    pub max_colors: Option<u32>,
}

fn rgb_to_gray(r: u8, g: u8, b: u8) -> u8 {
    (0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64) as u8
}

/// Estimate a pixel-grid width for an image from its edge density: busier
/// images get finer grids. Returns a value in `[8, 512]`, or
/// [`DEFAULT_GRID_SIZE`] for degenerate input.
#[must_use]
pub fn estimate_grid_size(img: &RgbaImage) -> u32 {
    let width = img.width() as usize;
    let height = img.height() as usize;
    if width < 3 || height < 3 {
        return DEFAULT_GRID_SIZE;
    }

    let gray: Vec<u8> = img
        .pixels()
        .map(|p| rgb_to_gray(p[0], p[1], p[2]))
        .collect();

    // Central-difference edge detection, borders excluded.
    let mut edge_count = 0usize;
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let up = gray[(y - 1) * width + x];
            let down = gray[(y + 1) * width + x];
            let left = gray[y * width + (x - 1)];
            let right = gray[y * width + (x + 1)];
            if up.abs_diff(down) > EDGE_THRESHOLD || left.abs_diff(right) > EDGE_THRESHOLD {
                edge_count += 1;
            }
        }
    }

    let edge_density = edge_count as f64 / (width * height) as f64;
    let base_grid_size = 12.0;
    let density_factor = (edge_density * 100.0).powf(0.6);
    let max_dimension = width.max(height) as f64;
    let suggested = (base_grid_size * (1.0 + density_factor) * (max_dimension / 200.0).log10())
        .round();

    (suggested * 2.0).clamp(8.0, 512.0) as u32
}

/// Downscale to a `grid_size`-wide pixel grid, output height following the
/// source aspect ratio. Each output pixel is the per-channel median of its
/// source cell. Cell rows are processed in parallel.
#[must_use]
pub fn downscale_to_grid(img: &RgbaImage, grid_size: u32) -> RgbaImage {
    let width = img.width();
    let height = img.height();
    if width == 0 || height == 0 {
        return RgbaImage::new(0, 0);
    }

    let grid_w = grid_size.clamp(1, width);
    let grid_h = ((height as f64 * grid_w as f64 / width as f64).round() as u32).clamp(1, height);
    let cell_w = width as f64 / grid_w as f64;
    let cell_h = height as f64 / grid_h as f64;

    let out_stride = grid_w as usize * 4;
    let mut out = vec![0u8; out_stride * grid_h as usize];

    out.par_chunks_mut(out_stride)
        .enumerate()
        .for_each(|(gy, row)| {
            let start_y = (gy as f64 * cell_h).floor() as u32;
            let end_y = (((gy + 1) as f64 * cell_h).floor() as u32).clamp(start_y + 1, height);

            let mut rs = Vec::new();
            let mut gs = Vec::new();
            let mut bs = Vec::new();
            let mut alphas = Vec::new();
            for gx in 0..grid_w {
                let start_x = (gx as f64 * cell_w).floor() as u32;
                let end_x = (((gx + 1) as f64 * cell_w).floor() as u32).clamp(start_x + 1, width);

                rs.clear();
                gs.clear();
                bs.clear();
                alphas.clear();
                for cy in start_y..end_y {
                    for cx in start_x..end_x {
                        let px = img.get_pixel(cx, cy);
                        rs.push(px[0]);
                        gs.push(px[1]);
                        bs.push(px[2]);
                        alphas.push(px[3]);
                    }
                }

                let median = |values: &mut Vec<u8>| -> u8 {
                    let mid = values.len() / 2;
                    *values.select_nth_unstable(mid).1
                };
                let o = gx as usize * 4;
                row[o] = median(&mut rs);
                row[o + 1] = median(&mut gs);
                row[o + 2] = median(&mut bs);
                row[o + 3] = median(&mut alphas);
            }
        });

    RgbaImage::from_raw(grid_w, grid_h, out).unwrap()
}

/// [`downscale_to_grid`] plus optional k-means palette reduction.
#[must_use]
pub fn downscale_with_options(img: &RgbaImage, options: DownscaleOptions) -> RgbaImage {
    let mut result = downscale_to_grid(img, options.grid_size);
    if let Some(max_colors) = options.max_colors
        && max_colors > 0
    {
        let mut quantizer = KMeansQuantizer::new(max_colors as usize, 20);
        let palette = quantizer.find_dominant_colors(img);
        if !palette.is_empty() {
            for px in result.pixels_mut() {
                let snapped = KMeansQuantizer::find_closest_color(*px, &palette);
                px[0] = snapped[0];
                px[1] = snapped[1];
                px[2] = snapped[2];
            }
        }
    }
    result
}

/// Nearest-neighbor re-enlargement, for writing crisp pixel-art output at a
/// viewable size.
#[must_use]
pub fn upscale_nearest(img: &RgbaImage, factor: u32) -> RgbaImage {
    let factor = factor.max(1);
    if factor == 1 || img.width() == 0 || img.height() == 0 {
        return img.clone();
    }
    image::imageops::resize(
        img,
        img.width() * factor,
        img.height() * factor,
        image::imageops::FilterType::Nearest,
    )
}

// ============================================================================
// K-MEANS COLOR QUANTIZATION
// ============================================================================

/// K-means clustering over RGB space with a deterministic seeded LCG, so
/// the same input always produces the same palette.
pub struct KMeansQuantizer {
    max_colors: usize,
    max_iterations: usize,
    rng_seed: u64,
}

impl KMeansQuantizer {
    #[must_use]
    pub fn new(max_colors: usize, max_iterations: usize) -> Self {
        Self {
            max_colors,
            max_iterations,
            rng_seed: 1234,
        }
    }

    fn random(&mut self) -> f64 {
        self.rng_seed = (self.rng_seed * 9301 + 49297) % 233280;
        self.rng_seed as f64 / 233280.0
    }

    fn distance_sq(a: [i32; 3], b: [i32; 3]) -> i64 {
        a.iter()
            .zip(b.iter())
            .map(|(&x, &y)| {
                let d = (x - y) as i64;
                d * d
            })
            .sum()
    }

    fn nearest_index(point: [i32; 3], centroids: &[[i32; 3]]) -> usize {
        let mut best = 0;
        let mut best_dist = i64::MAX;
        for (i, c) in centroids.iter().enumerate() {
            let dist = Self::distance_sq(point, *c);
            if dist < best_dist {
                best_dist = dist;
                best = i;
            }
        }
        best
    }

    /// Cluster the image's colors and return up to `max_colors` dominant
    /// colors (opaque). Empty for an empty image.
    pub fn find_dominant_colors(&mut self, img: &RgbaImage) -> Vec<Rgba<u8>> {
        let mut dataset: Vec<[i32; 3]> = img
            .pixels()
            .map(|p| [p[0] as i32, p[1] as i32, p[2] as i32])
            .collect();
        if dataset.is_empty() {
            return Vec::new();
        }

        // Stride-subsample huge images before iterating.
        if dataset.len() > MAX_KMEANS_PIXELS {
            let stride = dataset.len().div_ceil(MAX_KMEANS_PIXELS);
            dataset = dataset.into_iter().step_by(stride).collect();
        }

        let k = self.max_colors.min(dataset.len()).max(1);
        let mut centroids: Vec<[i32; 3]> = (0..k)
            .map(|_| {
                let idx = (self.random() * dataset.len() as f64) as usize;
                dataset[idx.min(dataset.len() - 1)]
            })
            .collect();

        for _ in 0..self.max_iterations {
            let mut sums = vec![[0i64; 3]; k];
            let mut counts = vec![0usize; k];
            for point in &dataset {
                let ci = Self::nearest_index(*point, &centroids);
                for c in 0..3 {
                    sums[ci][c] += point[c] as i64;
                }
                counts[ci] += 1;
            }

            let mut converged = true;
            for i in 0..k {
                let next = if counts[i] > 0 {
                    let mut c = [0i32; 3];
                    for ch in 0..3 {
                        c[ch] = ((sums[i][ch] as f64 / counts[i] as f64).round()) as i32;
                    }
                    c
                } else {
                    // Re-seed empty clusters from the dataset.
                    let idx = (self.random() * dataset.len() as f64) as usize;
                    dataset[idx.min(dataset.len() - 1)]
                };
                if next != centroids[i] {
                    converged = false;
                }
                centroids[i] = next;
            }
            if converged {
                break;
            }
        }

        centroids
            .into_iter()
            .map(|c| Rgba([c[0] as u8, c[1] as u8, c[2] as u8, 255]))
            .collect()
    }

    /// The palette color nearest to `color` in RGB distance. Alpha is
    /// preserved from the input.
    #[must_use]
    pub fn find_closest_color(color: Rgba<u8>, palette: &[Rgba<u8>]) -> Rgba<u8> {
        let point = [color[0] as i32, color[1] as i32, color[2] as i32];
        let mut best = palette[0];
        let mut best_dist = i64::MAX;
        for candidate in palette {
            let dist = Self::distance_sq(
                point,
                [
                    candidate[0] as i32,
                    candidate[1] as i32,
                    candidate[2] as i32,
                ],
            );
            if dist < best_dist {
                best_dist = dist;
                best = *candidate;
            }
        }
        Rgba([best[0], best[1], best[2], color[3]])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(w: u32, h: u32, px: Rgba<u8>) -> RgbaImage {
        RgbaImage::from_pixel(w, h, px)
    }

    #[test]
    fn downscale_solid_image_stays_solid() {
        let img = solid(64, 32, Rgba([40, 80, 120, 255]));
        let out = downscale_to_grid(&img, 8);
        assert_eq!((out.width(), out.height()), (8, 4));
        for px in out.pixels() {
            assert_eq!(*px, Rgba([40, 80, 120, 255]));
        }
    }

    #[test]
    fn downscale_height_follows_aspect_ratio() {
        let img = solid(100, 50, Rgba([0, 0, 0, 255]));
        let out = downscale_to_grid(&img, 10);
        assert_eq!((out.width(), out.height()), (10, 5));

        let tall = solid(50, 100, Rgba([0, 0, 0, 255]));
        let out = downscale_to_grid(&tall, 10);
        assert_eq!((out.width(), out.height()), (10, 20));
    }

    #[test]
    fn downscale_median_ignores_minority_noise() {
        // 8×8 cell mostly red with a single blue pixel: median is red.
        let mut img = solid(8, 8, Rgba([255, 0, 0, 255]));
        img.put_pixel(3, 3, Rgba([0, 0, 255, 255]));
        let out = downscale_to_grid(&img, 1);
        assert_eq!((out.width(), out.height()), (1, 1));
        assert_eq!(*out.get_pixel(0, 0), Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn downscale_grid_is_clamped_to_source_size() {
        let img = solid(4, 4, Rgba([1, 2, 3, 255]));
        let out = downscale_to_grid(&img, 99);
        assert_eq!((out.width(), out.height()), (4, 4));
    }

    #[test]
    fn estimate_returns_default_for_degenerate_input() {
        assert_eq!(estimate_grid_size(&RgbaImage::new(0, 0)), DEFAULT_GRID_SIZE);
        assert_eq!(
            estimate_grid_size(&solid(2, 2, Rgba([0, 0, 0, 255]))),
            DEFAULT_GRID_SIZE
        );
    }

    #[test]
    fn estimate_stays_in_range_and_grows_with_detail() {
        let flat = solid(400, 400, Rgba([128, 128, 128, 255]));
        let flat_grid = estimate_grid_size(&flat);
        assert!((8..=512).contains(&flat_grid));

        // Two-pixel stripes: the central difference straddles a stripe
        // boundary at every interior pixel.
        let mut busy = RgbaImage::new(400, 400);
        for (x, _, px) in busy.enumerate_pixels_mut() {
            let v = if (x / 2) % 2 == 0 { 255 } else { 0 };
            *px = Rgba([v, v, v, 255]);
        }
        let busy_grid = estimate_grid_size(&busy);
        assert!((8..=512).contains(&busy_grid));
        assert!(
            busy_grid > flat_grid,
            "busier image should get a finer grid ({} vs {})",
            busy_grid,
            flat_grid
        );
    }

    #[test]
    fn kmeans_recovers_two_well_separated_colors() {
        let mut img = RgbaImage::new(16, 16);
        for (x, _, px) in img.enumerate_pixels_mut() {
            *px = if x < 8 {
                Rgba([250, 10, 10, 255])
            } else {
                Rgba([10, 10, 250, 255])
            };
        }
        let mut quantizer = KMeansQuantizer::new(2, 20);
        let palette = quantizer.find_dominant_colors(&img);
        assert_eq!(palette.len(), 2);
        let reds = palette.iter().filter(|c| c[0] > c[2]).count();
        assert_eq!(reds, 1, "one red and one blue centroid: {:?}", palette);
    }

    #[test]
    fn kmeans_is_deterministic() {
        let img = solid(32, 32, Rgba([7, 77, 177, 255]));
        let a = KMeansQuantizer::new(4, 20).find_dominant_colors(&img);
        let b = KMeansQuantizer::new(4, 20).find_dominant_colors(&img);
        assert_eq!(a, b);
    }

    #[test]
    fn quantized_downscale_uses_only_palette_colors() {
        let mut img = RgbaImage::new(32, 32);
        for (x, y, px) in img.enumerate_pixels_mut() {
            *px = Rgba([(x * 8) as u8, (y * 8) as u8, 128, 255]);
        }
        let out = downscale_with_options(
            &img,
            DownscaleOptions {
                grid_size: 8,
                max_colors: Some(4),
            },
        );
        let unique: std::collections::HashSet<[u8; 4]> = out.pixels().map(|p| p.0).collect();
        assert!(unique.len() <= 4, "got {} colors", unique.len());
    }

    #[test]
    fn upscale_nearest_repeats_pixels() {
        let mut img = RgbaImage::new(2, 1);
        img.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        img.put_pixel(1, 0, Rgba([0, 255, 0, 255]));
        let out = upscale_nearest(&img, 3);
        assert_eq!((out.width(), out.height()), (6, 3));
        assert_eq!(*out.get_pixel(0, 0), Rgba([255, 0, 0, 255]));
        assert_eq!(*out.get_pixel(2, 2), Rgba([255, 0, 0, 255]));
        assert_eq!(*out.get_pixel(3, 0), Rgba([0, 255, 0, 255]));
    }
}
