use crate::pixmap::{
    blit_centered, fixation_pixmap, load_face, marker_pixmap, render_lines_pixmap,
    render_text_pixmap, WHITE,
};
use ab_glyph::FontArc;
use anyhow::{bail, Context, Result};
use bytemuck::cast_slice;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tiny_skia::{Color, Pixmap, Rect};
use wordface_cache::{word, Atom};
use wordface_core::{Face, FaceImages, Stimulus};
use wordface_experiment::{DisplayConfig, FramePlan};
use wordface_timing::{FrameStats, HighPrecisionTimer, Timer};

/// Opaque black, as one RGBA pixel.
const BACKGROUND: [u8; 4] = [0, 0, 0, 255];

pub fn load_font(path: &Path) -> Result<FontArc> {
    let bytes = std::fs::read(path).with_context(|| format!("reading font {}", path.display()))?;
    FontArc::try_from_vec(bytes).with_context(|| format!("parsing font {}", path.display()))
}

struct TextCache {
    font: FontArc,
    size_px: f32,
    map: HashMap<Atom, Arc<Pixmap>>,
}

impl TextCache {
    fn new(font: FontArc, size_px: f32) -> Self {
        Self {
            font,
            size_px,
            map: HashMap::new(),
        }
    }

    fn get_or_render(&mut self, atom: Atom) -> Result<Arc<Pixmap>> {
        if let Some(p) = self.map.get(&atom) {
            return Ok(Arc::clone(p));
        }
        let pm = Arc::new(render_text_pixmap(&atom, self.size_px, &self.font, WHITE)?);
        self.map.insert(atom, Arc::clone(&pm));
        Ok(pm)
    }
}

/// The fixed, pre-rendered pictures of the experiment.
pub struct StimulusPixmaps {
    pub instructions: Pixmap,
    pub fixation: Pixmap,
    pub marker: Pixmap,
    pub happy: Pixmap,
    pub fearful: Pixmap,
}

impl StimulusPixmaps {
    pub fn load(
        display: &DisplayConfig,
        intro: &[String],
        images: &FaceImages,
        font: &FontArc,
    ) -> Result<Self> {
        Ok(Self {
            instructions: render_lines_pixmap(intro, display.intro_size_px, font, WHITE)?,
            fixation: fixation_pixmap(display.fixation_size_px.round() as u32, 2.0)?,
            marker: marker_pixmap(display.marker_radius_px)?,
            happy: load_face(Path::new(images.file(Face::Happy)), display.face_size_px)?,
            fearful: load_face(Path::new(images.file(Face::Fearful)), display.face_size_px)?,
        })
    }
}

pub struct RenderStats {
    pub clear: Duration,
    pub draw: Duration,
    pub copy: Duration,
    pub total: Duration,
    pub dirty_count: usize,
}

/// Software renderer: composites into an offscreen canvas and copies only
/// the regions that changed since the previous frame into the frame buffer.
pub struct SkiaRenderer {
    width: u32,
    height: u32,
    center: (f32, f32),
    marker_offset: (f32, f32),

    /// Indexed by [`Stimulus::cache_id`].
    static_cache: Vec<Pixmap>,
    marker: Pixmap,
    text_cache: Option<TextCache>,

    canvas: Pixmap,
    dirty_regions: Vec<Rect>,
    first_frame: bool,
    clear_buffer: Vec<[u8; 4]>,

    draw_timer: HighPrecisionTimer,
}

impl SkiaRenderer {
    /// `font` may only be left out when no word will ever be drawn.
    pub fn new(
        width: u32,
        height: u32,
        display: &DisplayConfig,
        pixmaps: StimulusPixmaps,
        font: Option<FontArc>,
    ) -> Result<Self> {
        let StimulusPixmaps {
            instructions,
            fixation,
            marker,
            happy,
            fearful,
        } = pixmaps;
        let mut static_cache = vec![crate::pixmap::new_pixmap(1, 1)?; 5];
        for (stim, pm) in [
            (Stimulus::Instructions, instructions),
            (Stimulus::Fixation, fixation),
            (Stimulus::Face(Face::Happy), happy),
            (Stimulus::Face(Face::Fearful), fearful),
        ] {
            static_cache[stim.cache_id()] = pm;
        }

        let mut renderer = Self {
            width: 0,
            height: 0,
            center: (0.0, 0.0),
            marker_offset: (display.marker_offset_px[0], display.marker_offset_px[1]),
            static_cache,
            marker,
            text_cache: font.map(|f| TextCache::new(f, display.word_size_px)),
            canvas: crate::pixmap::new_pixmap(1, 1)?,
            dirty_regions: Vec::with_capacity(16),
            first_frame: true,
            clear_buffer: Vec::new(),
            draw_timer: HighPrecisionTimer::new(),
        };
        renderer.resize(width, height)?;
        Ok(renderer)
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.width = width;
        self.height = height;
        self.center = (width as f32 / 2.0, height as f32 / 2.0);
        self.canvas = crate::pixmap::new_pixmap(width, height)?;
        self.canvas.fill(Color::BLACK);
        self.clear_buffer = vec![BACKGROUND; (width * height) as usize];
        self.first_frame = true;
        log::debug!("canvas resized to {width}x{height}");
        Ok(())
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Draw-time statistics over the recent frames.
    pub fn draw_stats(&self) -> FrameStats {
        self.draw_timer.frame_stats()
    }

    /// Renders one frame plan into `frame_buffer` (RGBA, canvas sized).
    pub fn render_frame<T: Timer>(
        &mut self,
        plan: &FramePlan,
        frame_buffer: &mut [u8],
        timer: &mut T,
    ) -> Result<RenderStats> {
        if frame_buffer.len() != self.canvas.data().len() {
            bail!(
                "frame buffer holds {} bytes, canvas needs {}",
                frame_buffer.len(),
                self.canvas.data().len()
            );
        }
        if self.first_frame {
            self.first_frame = false;
            self.canvas.fill(Color::BLACK);
            frame_buffer.copy_from_slice(cast_slice(&self.clear_buffer));
            self.dirty_regions.clear();
        }

        let old_dirty = std::mem::take(&mut self.dirty_regions);
        let t = timer.now();
        self.clear_dirty(&old_dirty);
        let t_clear = timer.elapsed(t);

        let t = timer.now();
        self.draw(plan)?;
        let t_draw = timer.elapsed(t);

        let mut present = old_dirty;
        present.extend_from_slice(&self.dirty_regions);
        coalesce_dirty(&mut present);

        let t = timer.now();
        for rect in &present {
            self.copy_dirty_region(*rect, frame_buffer);
        }
        let t_copy = timer.elapsed(t);

        let total = t_clear + t_draw + t_copy;
        self.draw_timer.record_frame(t_draw);
        timer.record_frame(total);

        Ok(RenderStats {
            clear: t_clear,
            draw: t_draw,
            copy: t_copy,
            total,
            dirty_count: self.dirty_regions.len(),
        })
    }

    fn draw(&mut self, plan: &FramePlan) -> Result<()> {
        let center = self.center;
        match plan.stimulus {
            Stimulus::Blank => {}
            Stimulus::Word(id) => {
                let atom = word(id).with_context(|| format!("word id {id} was never interned"))?;
                let Some(cache) = self.text_cache.as_mut() else {
                    bail!("cannot draw {:?} without a font", atom.as_ref());
                };
                let pm = cache.get_or_render(atom)?;
                let rect = blit_centered(&mut self.canvas, &pm, center);
                self.push_dirty(rect);
            }
            other => {
                let rect = blit_centered(&mut self.canvas, &self.static_cache[other.cache_id()], center);
                self.push_dirty(rect);
            }
        }
        if plan.marker {
            let pos = (center.0 + self.marker_offset.0, center.1 + self.marker_offset.1);
            let rect = blit_centered(&mut self.canvas, &self.marker, pos);
            self.push_dirty(rect);
        }
        Ok(())
    }

    fn push_dirty(&mut self, rect: Option<Rect>) {
        if let Some(r) = rect {
            self.dirty_regions.push(r);
        }
    }

    fn clear_dirty(&mut self, dirty: &[Rect]) {
        let stride = self.width as usize * 4;
        let clear: &[u8] = cast_slice(&self.clear_buffer);
        let canvas = self.canvas.data_mut();

        for rect in dirty {
            let (x0, y0, x1, y1) = pixel_bounds(*rect, self.width, self.height);
            if x1 <= x0 || y1 <= y0 {
                continue;
            }
            let row_len = (x1 - x0) * 4;
            for y in y0..y1 {
                let off = y * stride + x0 * 4;
                canvas[off..off + row_len].copy_from_slice(&clear[off..off + row_len]);
            }
        }
    }

    fn copy_dirty_region(&self, dirty: Rect, frame_buffer: &mut [u8]) {
        let (x0, y0, x1, y1) = pixel_bounds(dirty, self.width, self.height);
        if x1 <= x0 || y1 <= y0 {
            return;
        }
        let bytes = (x1 - x0) * 4;
        let stride = self.width as usize * 4;
        let canvas = self.canvas.data();

        for row in y0..y1 {
            let off = row * stride + x0 * 4;
            frame_buffer[off..off + bytes].copy_from_slice(&canvas[off..off + bytes]);
        }
    }
}

fn pixel_bounds(r: Rect, width: u32, height: u32) -> (usize, usize, usize, usize) {
    let (w, h) = (width as f32, height as f32);
    (
        r.x().floor().clamp(0.0, w) as usize,
        r.y().floor().clamp(0.0, h) as usize,
        (r.x() + r.width()).ceil().clamp(0.0, w) as usize,
        (r.y() + r.height()).ceil().clamp(0.0, h) as usize,
    )
}

/// Merges rectangles that sit on the same rows and touch horizontally.
fn coalesce_dirty(rects: &mut Vec<Rect>) {
    rects.sort_by(|a, b| a.y().total_cmp(&b.y()).then(a.x().total_cmp(&b.x())));
    let mut out: Vec<Rect> = Vec::with_capacity(rects.len());
    for r in rects.drain(..) {
        if let Some(last) = out.last_mut() {
            let same_row =
                (r.y() - last.y()).abs() < 1.0 && (r.height() - last.height()).abs() < 1.0;
            let touching = r.x() <= last.x() + last.width() + 1.0;
            if same_row && touching {
                let nx = last.x().min(r.x());
                let nx2 = (last.x() + last.width()).max(r.x() + r.width());
                if let Some(merged) = Rect::from_xywh(nx, last.y(), nx2 - nx, last.height()) {
                    *last = merged;
                    continue;
                }
            }
        }
        out.push(r);
    }
    *rects = out;
}
