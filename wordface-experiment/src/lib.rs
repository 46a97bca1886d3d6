pub mod config;
pub mod error;
pub mod input;
pub mod port;
pub mod state;
pub mod trial;
pub mod trial_log;

pub use config::{DisplayConfig, ExperimentConfig, KeyAction, KeyMap, TriggerFrames, Variant};
pub use error::ExperimentError;
pub use input::{KeyBuffer, KeyPress};
pub use port::{open_port, NullPort, RecordingPort, TriggerPort};
pub use state::{Control, FramePlan, SessionStateMachine};
pub use trial::{Landmark, TrialRun, TrialTimestamps};
pub use trial_log::TrialLog;
