pub mod error;
pub mod generate;
pub mod phase;
pub mod response;
pub mod stimulus;
pub mod subject;
pub mod trial;
pub mod trigger;
pub mod valence;
pub mod wordlist;

pub use error::CoreError;
pub use generate::{make_trial_list, TrialParams, CONDITION};
pub use phase::SessionPhase;
pub use response::{score, Scored, Target};
pub use stimulus::Stimulus;
pub use subject::{ExperimentType, Gender, ScanDay, Subject};
pub use trial::{TrialRecord, TrialState};
pub use trigger::{response_code, TriggerCodes, LINE_LOW};
pub use valence::{Face, FaceImages, Valence};
pub use wordlist::{WordEntry, WordList};
