pub mod pixmap;
pub mod render;

pub use pixmap::{blit_centered, face_pixmap, fixation_pixmap, load_face, marker_pixmap};
pub use render::{load_font, RenderStats, SkiaRenderer, StimulusPixmaps};
