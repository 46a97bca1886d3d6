use crate::subject::{Gender, ScanDay};
use crate::trigger::TriggerCodes;
use crate::valence::{Face, Valence};
use serde::{Serialize, Serializer};

/// Step of the per-trial presentation schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialState {
    Word,
    PreDelay,
    Face,
    PostDelay,
    Complete,
}

impl TrialState {
    pub fn next(&self) -> TrialState {
        match self {
            TrialState::Word => TrialState::PreDelay,
            TrialState::PreDelay => TrialState::Face,
            TrialState::Face => TrialState::PostDelay,
            TrialState::PostDelay | TrialState::Complete => TrialState::Complete,
        }
    }
}

/// One logged trial. Field order is the CSV column order; times are seconds
/// relative to the session start.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialRecord {
    #[serde(rename = "ID")]
    pub id: String,
    pub age: String,
    pub gender: Gender,
    #[serde(rename = "scan day")]
    pub scan_day: ScanDay,
    pub condition: String,
    pub session: u32,
    pub word: String,
    pub word_label: Valence,
    pub word_score_pc: Option<f64>,
    pub word_score_warriner: Option<f64>,
    pub word_trigger: u8,
    pub pause_trigger: u8,
    pub pause_trigger_t: Option<f64>,
    pub img: String,
    pub img_trigger: u8,
    pub onset_word: Option<f64>,
    pub offset_word: Option<f64>,
    pub duration_measured_word: Option<f64>,
    pub onset_img: Option<f64>,
    pub offset_img: Option<f64>,
    pub duration_measured_img: Option<f64>,
    pub duration_frames: u32,
    pub delay_frames_before: u32,
    pub delay_frames_after: u32,
    pub response: Option<String>,
    pub key_t: Option<f64>,
    pub rt: Option<f64>,
    #[serde(serialize_with = "bool_as_int")]
    pub correct_resp: Option<bool>,
    pub no: usize,

    #[serde(skip)]
    pub face: Face,
    #[serde(skip)]
    pub word_id: usize,
}

impl TrialRecord {
    pub fn triggers(&self) -> TriggerCodes {
        TriggerCodes {
            word: self.word_trigger,
            pause: self.pause_trigger,
            image: self.img_trigger,
        }
    }

    pub fn has_response(&self) -> bool {
        self.response.is_some()
    }
}

fn bool_as_int<S: Serializer>(v: &Option<bool>, s: S) -> Result<S::Ok, S::Error> {
    match v {
        Some(b) => s.serialize_u8(u8::from(*b)),
        None => s.serialize_none(),
    }
}
