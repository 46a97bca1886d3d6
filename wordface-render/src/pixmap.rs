//! Building and compositing premultiplied RGBA pixmaps.

use ab_glyph::{point, Font, Glyph, PxScale, ScaleFont};
use anyhow::{anyhow, Context, Result};
use image::imageops::FilterType;
use image::RgbaImage;
use std::path::Path;
use tiny_skia::{Color, FillRule, Paint, PathBuilder, Pixmap, PixmapPaint, Rect, Transform};

pub const WHITE: Color = Color::WHITE;

pub fn new_pixmap(width: u32, height: u32) -> Result<Pixmap> {
    Pixmap::new(width.max(1), height.max(1))
        .ok_or_else(|| anyhow!("cannot allocate {width}x{height} pixmap"))
}

/// Rasterizes one line of text into a tightly cropped pixmap.
pub fn render_text_pixmap<F: Font>(text: &str, font_size: f32, font: &F, color: Color) -> Result<Pixmap> {
    let scale = PxScale::from(font_size);
    let sf = font.as_scaled(scale);

    // layout with the baseline at the ascent
    let mut pen_x = 0.0f32;
    let mut glyphs = Vec::<Glyph>::new();
    for ch in text.chars() {
        let id = font.glyph_id(ch);
        if let Some(prev) = glyphs.last() {
            pen_x += sf.kern(prev.id, id);
        }
        glyphs.push(Glyph {
            id,
            scale,
            position: point(pen_x, sf.ascent()),
        });
        pen_x += sf.h_advance(id);
    }

    let outlines: Vec<_> = glyphs
        .into_iter()
        .filter_map(|g| font.outline_glyph(g))
        .collect();
    let Some(first) = outlines.first() else {
        return new_pixmap(1, 1);
    };

    let mut bounds = first.px_bounds();
    for out in &outlines[1..] {
        let b = out.px_bounds();
        bounds.min.x = bounds.min.x.min(b.min.x);
        bounds.min.y = bounds.min.y.min(b.min.y);
        bounds.max.x = bounds.max.x.max(b.max.x);
        bounds.max.y = bounds.max.y.max(b.max.y);
    }
    let (min_x, min_y) = (bounds.min.x.floor(), bounds.min.y.floor());
    let w = (bounds.max.x.ceil() - min_x).max(1.0) as u32;
    let h = (bounds.max.y.ceil() - min_y).max(1.0) as u32;

    let mut pm = new_pixmap(w, h)?;
    let stride = w as usize;
    let dst = pm.data_mut();
    let rgba = [color.red(), color.green(), color.blue(), color.alpha()];

    for out in &outlines {
        let b = out.px_bounds();
        out.draw(|x, y, cov| {
            if cov <= f32::EPSILON {
                return;
            }
            let ix = (x as f32 + b.min.x - min_x).floor() as i32;
            let iy = (y as f32 + b.min.y - min_y).floor() as i32;
            if ix < 0 || iy < 0 || ix >= w as i32 || iy >= h as i32 {
                return;
            }
            let i = (iy as usize * stride + ix as usize) * 4;

            // source premultiplied by coverage, then source-over
            let a = (cov * rgba[3]).clamp(0.0, 1.0);
            let inv = 1.0 - a;
            for c in 0..3 {
                let s = rgba[c] * a * 255.0;
                dst[i + c] = (s + dst[i + c] as f32 * inv).round().min(255.0) as u8;
            }
            dst[i + 3] = (a * 255.0 + dst[i + 3] as f32 * inv).round().min(255.0) as u8;
        });
    }

    Ok(pm)
}

/// Stacks centered lines of text. Empty lines keep their vertical space.
pub fn render_lines_pixmap<F: Font>(
    lines: &[String],
    font_size: f32,
    font: &F,
    color: Color,
) -> Result<Pixmap> {
    let line_height = (font_size * 1.5).ceil() as u32;
    let rendered = lines
        .iter()
        .map(|l| {
            if l.trim().is_empty() {
                Ok(None)
            } else {
                render_text_pixmap(l, font_size, font, color).map(Some)
            }
        })
        .collect::<Result<Vec<_>>>()?;

    let width = rendered
        .iter()
        .flatten()
        .map(|p| p.width())
        .max()
        .unwrap_or(1);
    let height = line_height * lines.len().max(1) as u32;
    let mut pm = new_pixmap(width, height)?;

    for (row, line) in rendered.iter().enumerate() {
        let Some(line) = line else { continue };
        let x = (width - line.width()) / 2;
        let y = row as u32 * line_height + line_height.saturating_sub(line.height()) / 2;
        pm.draw_pixmap(
            x as i32,
            y as i32,
            line.as_ref(),
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );
    }
    Ok(pm)
}

/// A `size` x `size` cross with bars `thickness` pixels wide.
pub fn fixation_pixmap(size: u32, thickness: f32) -> Result<Pixmap> {
    let mut pm = new_pixmap(size, size)?;
    let mut paint = Paint::default();
    paint.anti_alias = false;
    paint.set_color(WHITE);

    let s = size as f32;
    let bars = [
        Rect::from_xywh(0.0, (s - thickness) * 0.5, s, thickness),
        Rect::from_xywh((s - thickness) * 0.5, 0.0, thickness, s),
    ];
    for bar in bars.into_iter().flatten() {
        pm.fill_rect(bar, &paint, Transform::identity(), None);
    }
    Ok(pm)
}

/// Filled white disc for the photodiode.
pub fn marker_pixmap(radius: f32) -> Result<Pixmap> {
    let size = (radius * 2.0).ceil() as u32;
    let mut pm = new_pixmap(size, size)?;
    let mut paint = Paint::default();
    paint.anti_alias = true;
    paint.set_color(WHITE);

    let path = PathBuilder::from_circle(radius, radius, radius)
        .ok_or_else(|| anyhow!("invalid marker radius {radius}"))?;
    pm.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
    Ok(pm)
}

/// Scales a straight-alpha image to `size` and premultiplies it.
pub fn face_pixmap(img: &RgbaImage, size: [f32; 2]) -> Result<Pixmap> {
    let (w, h) = (size[0].round().max(1.0) as u32, size[1].round().max(1.0) as u32);
    let scaled = if img.dimensions() == (w, h) {
        img.clone()
    } else {
        image::imageops::resize(img, w, h, FilterType::Triangle)
    };

    let mut pm = new_pixmap(w, h)?;
    for (dst, src) in pm.data_mut().chunks_exact_mut(4).zip(scaled.pixels()) {
        let [r, g, b, a] = src.0;
        let premul = |c: u8| ((c as u32 * a as u32 + 127) / 255) as u8;
        dst.copy_from_slice(&[premul(r), premul(g), premul(b), a]);
    }
    Ok(pm)
}

pub fn load_face(path: &Path, size: [f32; 2]) -> Result<Pixmap> {
    let img = image::open(path)
        .with_context(|| format!("loading face image {}", path.display()))?
        .to_rgba8();
    log::debug!(
        "{}: {}x{} scaled to {}x{}",
        path.display(),
        img.width(),
        img.height(),
        size[0],
        size[1]
    );
    face_pixmap(&img, size)
}

/// Composites `src` centered on `pos` into `dst` (both premultiplied) and
/// returns the touched rectangle, or `None` if nothing was on screen.
pub fn blit_centered(dst: &mut Pixmap, src: &Pixmap, pos: (f32, f32)) -> Option<Rect> {
    let (w, h) = (src.width() as i32, src.height() as i32);
    let (cw, ch) = (dst.width() as i32, dst.height() as i32);
    let x0 = (pos.0 - w as f32 * 0.5).floor() as i32;
    let y0 = (pos.1 - h as f32 * 0.5).floor() as i32;

    let dst_x = x0.max(0);
    let dst_y = y0.max(0);
    let copy_w = (x0 + w).min(cw) - dst_x;
    let copy_h = (y0 + h).min(ch) - dst_y;
    if copy_w <= 0 || copy_h <= 0 {
        return None;
    }
    let (src_x, src_y) = ((dst_x - x0) as usize, (dst_y - y0) as usize);
    let (dst_x, dst_y) = (dst_x as usize, dst_y as usize);
    let (copy_w, copy_h) = (copy_w as usize, copy_h as usize);
    let src_stride = w as usize * 4;
    let dst_stride = cw as usize * 4;

    let src_data = src.data();
    let dst_data = dst.data_mut();
    let row_bytes = copy_w * 4;

    let opaque = (0..copy_h).all(|row| {
        let start = (src_y + row) * src_stride + src_x * 4;
        src_data[start..start + row_bytes]
            .iter()
            .skip(3)
            .step_by(4)
            .all(|&a| a == 255)
    });

    for row in 0..copy_h {
        let s = (src_y + row) * src_stride + src_x * 4;
        let d = (dst_y + row) * dst_stride + dst_x * 4;
        let src_row = &src_data[s..s + row_bytes];
        let dst_row = &mut dst_data[d..d + row_bytes];
        if opaque {
            dst_row.copy_from_slice(src_row);
            continue;
        }
        for (dp, sp) in dst_row.chunks_exact_mut(4).zip(src_row.chunks_exact(4)) {
            let inv = 255 - sp[3] as u32;
            for c in 0..4 {
                dp[c] = (sp[c] as u32 + (dp[c] as u32 * inv + 127) / 255).min(255) as u8;
            }
        }
    }

    Rect::from_xywh(dst_x as f32, dst_y as f32, copy_w as f32, copy_h as f32)
}
