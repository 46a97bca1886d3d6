use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Affective category of a word, as labelled in the word list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Valence {
    #[serde(rename = "pos")]
    Positive,
    #[serde(rename = "neg")]
    Negative,
    #[serde(rename = "neu")]
    Neutral,
}

impl Valence {
    pub fn label(&self) -> &'static str {
        match self {
            Valence::Positive => "pos",
            Valence::Negative => "neg",
            Valence::Neutral => "neu",
        }
    }
}

impl fmt::Display for Valence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The two face stimuli.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Face {
    #[default]
    Happy,
    Fearful,
}

impl Face {
    /// Positive words predict the happy face, negative words the fearful one.
    /// Neutral words get either face with equal probability.
    pub fn for_valence<R: Rng + ?Sized>(valence: Valence, rng: &mut R) -> Face {
        match valence {
            Valence::Positive => Face::Happy,
            Valence::Negative => Face::Fearful,
            Valence::Neutral => {
                if rng.random_bool(0.5) {
                    Face::Happy
                } else {
                    Face::Fearful
                }
            }
        }
    }
}

/// Image files for the two faces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceImages {
    pub happy: String,
    pub fearful: String,
}

impl FaceImages {
    pub fn file(&self, face: Face) -> &str {
        match face {
            Face::Happy => &self.happy,
            Face::Fearful => &self.fearful,
        }
    }
}

impl Default for FaceImages {
    fn default() -> Self {
        Self {
            happy: "image_stim_p.png".into(),
            fearful: "image_stim_n.png".into(),
        }
    }
}
