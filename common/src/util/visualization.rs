use crate::db::delay::Delay;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect as ImageRect;
use std::path::Path;

fn heat(t: f64) -> Rgb<u8> {
    // blue (cheap) -> red (expensive)
    let t = t.clamp(0.0, 1.0);
    let r = (255.0 * t) as u8;
    let g = (255.0 * (1.0 - (2.0 * t - 1.0).abs())) as u8;
    let b = (255.0 * (1.0 - t)) as u8;
    Rgb([r, g, b])
}

/// Renders an `x_dim` by `y_dim` delay matrix (x-major) as a heat map.
/// Unknown cells are drawn dark grey, `origin` is outlined in white.
pub fn draw_delay_matrix(
    cells: &[Option<Delay>],
    x_dim: usize,
    y_dim: usize,
    origin: (i32, i32),
    filename: &str,
    cell_px: u32,
) {
    if x_dim == 0 || y_dim == 0 || cells.len() != x_dim * y_dim {
        log::warn!(
            "Skipping heat map {}: {} cells for {}x{} matrix",
            filename,
            cells.len(),
            x_dim,
            y_dim
        );
        return;
    }

    let cell_px = cell_px.max(1);
    let width = x_dim as u32 * cell_px;
    let height = y_dim as u32 * cell_px;
    let mut img = RgbImage::from_pixel(width, height, Rgb([20, 20, 20]));

    let known = cells.iter().flatten();
    let min = known.clone().min().copied().unwrap_or(Delay::ZERO);
    let max = known.max().copied().unwrap_or(Delay::ZERO);
    let span = (max.ps() - min.ps()).max(1) as f64;

    for ix in 0..x_dim {
        for iy in 0..y_dim {
            let color = match cells[ix * y_dim + iy] {
                Some(d) => heat((d.ps() - min.ps()) as f64 / span),
                None => Rgb([60, 60, 60]),
            };
            // flip y so +dy points up
            let px = ix as u32 * cell_px;
            let py = (y_dim - 1 - iy) as u32 * cell_px;
            let rect = ImageRect::at(px as i32, py as i32).of_size(cell_px, cell_px);
            draw_filled_rect_mut(&mut img, rect, color);
        }
    }

    let (ox, oy) = origin;
    if ox >= 0 && oy >= 0 && (ox as usize) < x_dim && (oy as usize) < y_dim {
        let px = ox as u32 * cell_px;
        let py = (y_dim - 1 - oy as usize) as u32 * cell_px;
        let rect = ImageRect::at(px as i32, py as i32).of_size(cell_px, cell_px);
        draw_hollow_rect_mut(&mut img, rect, Rgb([255, 255, 255]));
    }

    if let Err(e) = img.save(Path::new(filename)) {
        log::warn!("Failed to write heat map {}: {}", filename, e);
    }
}
