use crate::valence::Face;

/// What the display shows on a given frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stimulus {
    Blank,
    Instructions,
    Fixation,
    /// Word by interned id.
    Word(usize),
    Face(Face),
}

impl Stimulus {
    /// Stable key for the renderer's pixmap caches.
    pub fn cache_id(&self) -> usize {
        match self {
            Stimulus::Blank => 0,
            Stimulus::Instructions => 1,
            Stimulus::Fixation => 2,
            Stimulus::Face(Face::Happy) => 3,
            Stimulus::Face(Face::Fearful) => 4,
            Stimulus::Word(id) => 5 + id,
        }
    }
}
