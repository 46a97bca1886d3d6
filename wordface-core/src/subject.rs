use serde::{Deserialize, Serialize};
use std::fmt;

/// Participant metadata collected before the session starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
    pub exp_type: ExperimentType,
    pub session: u32,
    pub scan_day: ScanDay,
    pub gender: Gender,
    pub age: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExperimentType {
    #[serde(rename = "fMRI")]
    Fmri,
    #[serde(rename = "EEG")]
    Eeg,
    #[serde(rename = "behavioral")]
    Behavioral,
}

impl fmt::Display for ExperimentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExperimentType::Fmri => "fMRI",
            ExperimentType::Eeg => "EEG",
            ExperimentType::Behavioral => "behavioral",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Female,
    Male,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanDay {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}
