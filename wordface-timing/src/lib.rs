pub mod timer;

pub use timer::{ns_to_secs, FrameStats, HighPrecisionTimer, ManualTimer, Timer};
