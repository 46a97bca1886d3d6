use crate::error::ExperimentError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use wordface_core::{FaceImages, Subject, Target};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Variant {
    /// One session per program run, no hardware triggers.
    #[default]
    Behavioral,
    /// Loops over all runs, drives the parallel-port trigger line.
    ScannerEeg,
}

/// Frame index inside each phase on whose flip the phase's trigger is raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerFrames {
    pub word: u32,
    pub pause: u32,
    pub image: u32,
}

impl Default for TriggerFrames {
    fn default() -> Self {
        Self {
            word: 1,
            pause: 30,
            image: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Trigger,
    Respond(Target),
    Quit,
}

/// Key names as reported by the keyboard layer: lowercase characters, plus
/// `escape`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyMap {
    pub trigger: Vec<String>,
    pub positive: Vec<String>,
    pub negative: Vec<String>,
    pub quit: Vec<String>,
}

impl KeyMap {
    pub fn behavioral() -> Self {
        Self {
            trigger: vec!["t".into()],
            positive: vec!["b".into()],
            negative: vec!["y".into()],
            quit: vec!["escape".into(), "q".into()],
        }
    }

    pub fn scanner_eeg() -> Self {
        Self {
            positive: vec!["1".into(), "b".into()],
            negative: vec!["2".into(), "y".into()],
            ..Self::behavioral()
        }
    }

    /// Quit wins over every other binding.
    pub fn classify(&self, key: &str) -> Option<KeyAction> {
        let has = |set: &[String]| set.iter().any(|k| k == key);
        if has(&self.quit) {
            Some(KeyAction::Quit)
        } else if has(&self.positive) {
            Some(KeyAction::Respond(Target::Positive))
        } else if has(&self.negative) {
            Some(KeyAction::Respond(Target::Negative))
        } else if has(&self.trigger) {
            Some(KeyAction::Trigger)
        } else {
            None
        }
    }
}

impl Default for KeyMap {
    fn default() -> Self {
        Self::behavioral()
    }
}

/// Pixel layout of the stimuli, relative to the screen center.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub word_size_px: f32,
    pub intro_size_px: f32,
    pub fixation_size_px: f32,
    pub face_size_px: [f32; 2],
    /// Photodiode marker center, right and down from the screen center.
    pub marker_offset_px: [f32; 2],
    pub marker_radius_px: f32,
    pub font: PathBuf,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            word_size_px: 42.0,
            intro_size_px: 36.0,
            fixation_size_px: 40.0,
            face_size_px: [840.0, 630.0],
            marker_offset_px: [420.0, 360.0],
            marker_radius_px: 15.0,
            font: PathBuf::from("assets/DejaVuSans.ttf"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub variant: Variant,
    /// Refresh rate the frame counts are computed for.
    pub frame_rate: u32,
    pub stimulus_duration_s: f64,
    /// Candidate delay lengths in frames; each trial draws two without
    /// replacement.
    pub delays: Vec<u32>,
    pub lead_in_s: f64,
    /// Number of sessions run back to back by the scanner variant.
    pub runs: u32,
    pub hardware_triggers: bool,
    pub trigger_frames: TriggerFrames,
    /// First face frame on which responses are collected.
    pub first_poll_frame: u32,
    pub keys: KeyMap,
    pub images: FaceImages,
    pub wordlist: PathBuf,
    pub save_folder: PathBuf,
    pub intro: Vec<String>,
    pub display: DisplayConfig,
}

impl ExperimentConfig {
    pub fn preset(variant: Variant) -> Self {
        match variant {
            Variant::Behavioral => Self::behavioral(),
            Variant::ScannerEeg => Self::scanner_eeg(),
        }
    }

    pub fn behavioral() -> Self {
        Self {
            variant: Variant::Behavioral,
            frame_rate: 60,
            stimulus_duration_s: 0.7,
            delays: vec![120, 180],
            lead_in_s: 1.0,
            runs: 1,
            hardware_triggers: false,
            trigger_frames: TriggerFrames::default(),
            first_poll_frame: 0,
            keys: KeyMap::behavioral(),
            images: FaceImages::default(),
            wordlist: PathBuf::from("wordlist.txt"),
            save_folder: PathBuf::from("faceWord_exp_data"),
            intro: vec![
                "In this experiment you read words and look at faces".into(),
                "Words can be used to predict facial expression".into(),
                "Press \"B\" with INDEX finger if face is POSITIVE".into(),
                "Press \"Y\" with MIDDLE finger if face is NEGATIVE".into(),
                "The experiment starts when you press \"T\"".into(),
            ],
            display: DisplayConfig::default(),
        }
    }

    pub fn scanner_eeg() -> Self {
        Self {
            variant: Variant::ScannerEeg,
            runs: 6,
            hardware_triggers: true,
            first_poll_frame: 2,
            keys: KeyMap::scanner_eeg(),
            intro: vec![
                "In this experiment you will read words and look at faces".into(),
                "Words can be used to predict facial expressions".into(),
                "Press \"b\" key with INDEX finger if face is POSITIVE".into(),
                "Press \"y\" key with MIDDLE finger if face is NEGATIVE".into(),
                String::new(),
                "Press \"t\" to start the experiment".into(),
            ],
            ..Self::behavioral()
        }
    }

    /// Reads a TOML file. Keys missing from the file fall back to the preset
    /// of the variant named in the file (behavioral when absent).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ExperimentError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ExperimentError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ExperimentError> {
        #[derive(Deserialize)]
        struct VariantOnly {
            #[serde(default)]
            variant: Variant,
        }
        let VariantOnly { variant } = toml::from_str(text)?;
        let mut merged = toml::Value::try_from(Self::preset(variant))
            .map_err(|e| ExperimentError::Config(e.to_string()))?;
        let overrides: toml::Value = toml::from_str(text)?;
        merge(&mut merged, overrides);
        let config: Self = merged.try_into()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ExperimentError> {
        if self.frame_rate == 0 {
            return Err(ExperimentError::Config("frame_rate must be positive".into()));
        }
        if self.delays.len() < 2 {
            return Err(ExperimentError::Config(format!(
                "need at least two delays, got {}",
                self.delays.len()
            )));
        }
        if self.duration_frames() == 0 {
            return Err(ExperimentError::Config(
                "stimulus_duration_s is shorter than one frame".into(),
            ));
        }
        if self.keys.positive.is_empty() || self.keys.negative.is_empty() {
            return Err(ExperimentError::Config("response key sets must not be empty".into()));
        }
        if self.keys.trigger.is_empty() || self.keys.quit.is_empty() {
            return Err(ExperimentError::Config("trigger and quit keys are required".into()));
        }
        if self.variant == Variant::ScannerEeg && self.runs == 0 {
            return Err(ExperimentError::Config("runs must be at least 1".into()));
        }
        Ok(())
    }

    /// Word and face duration in frames.
    pub fn duration_frames(&self) -> u32 {
        self.seconds_to_frames(self.stimulus_duration_s)
    }

    pub fn lead_in_frames(&self) -> u32 {
        self.seconds_to_frames(self.lead_in_s)
    }

    /// Nominal duration of one refresh.
    pub fn frame_period(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / u64::from(self.frame_rate.max(1)))
    }

    /// Truncates to whole frames, as the lab's presentation scripts do. The
    /// epsilon absorbs products like `0.7 * 60` landing just below an integer.
    fn seconds_to_frames(&self, s: f64) -> u32 {
        (s * self.frame_rate as f64 + 1e-6).floor().max(0.0) as u32
    }

    /// Sessions to run, in order.
    pub fn sessions(&self, subject: &Subject) -> Vec<u32> {
        match self.variant {
            Variant::Behavioral => vec![subject.session],
            Variant::ScannerEeg => (1..=self.runs).collect(),
        }
    }
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self::behavioral()
    }
}

fn merge(base: &mut toml::Value, overrides: toml::Value) {
    match (base, overrides) {
        (toml::Value::Table(base), toml::Value::Table(over)) => {
            for (k, v) in over {
                match base.get_mut(&k) {
                    Some(slot) => merge(slot, v),
                    None => {
                        base.insert(k, v);
                    }
                }
            }
        }
        (slot, v) => *slot = v,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_match_the_lab_setup() {
        let b = ExperimentConfig::behavioral();
        assert_eq!(b.duration_frames(), 42);
        assert_eq!(b.lead_in_frames(), 60);
        assert!(!b.hardware_triggers);
        b.validate().unwrap();

        let s = ExperimentConfig::scanner_eeg();
        assert_eq!(s.runs, 6);
        assert_eq!(s.first_poll_frame, 2);
        assert_eq!(s.trigger_frames, TriggerFrames { word: 1, pause: 30, image: 1 });
        assert_eq!(s.delays, b.delays);
        s.validate().unwrap();
    }

    #[test]
    fn classifies_keys() {
        let keys = KeyMap::scanner_eeg();
        assert_eq!(keys.classify("1"), Some(KeyAction::Respond(Target::Positive)));
        assert_eq!(keys.classify("y"), Some(KeyAction::Respond(Target::Negative)));
        assert_eq!(keys.classify("t"), Some(KeyAction::Trigger));
        assert_eq!(keys.classify("escape"), Some(KeyAction::Quit));
        assert_eq!(keys.classify("x"), None);
        assert_eq!(KeyMap::behavioral().classify("2"), None);
    }

    #[test]
    fn toml_overrides_variant_preset() {
        let config = ExperimentConfig::from_toml(
            r#"
            variant = "scanner-eeg"
            frame_rate = 120
            delays = [180, 336]

            [display]
            marker_radius_px = 20.0
            "#,
        )
        .unwrap();
        assert_eq!(config.variant, Variant::ScannerEeg);
        assert_eq!(config.runs, 6);
        assert_eq!(config.duration_frames(), 84);
        assert_eq!(config.delays, [180, 336]);
        assert_eq!(config.display.marker_radius_px, 20.0);
        assert_eq!(config.display.word_size_px, 42.0);
        assert_eq!(config.keys, KeyMap::scanner_eeg());
    }

    #[test]
    fn frame_counts_truncate() {
        let mut config = ExperimentConfig::behavioral();
        config.frame_rate = 144;
        assert_eq!(config.duration_frames(), 100);
        config.frame_rate = 60;
        assert_eq!(config.duration_frames(), 42);
        assert_eq!(config.frame_period(), Duration::from_nanos(16_666_666));
    }

    #[test]
    fn rejects_single_delay() {
        let err = ExperimentConfig::from_toml("delays = [120]").unwrap_err();
        assert!(matches!(err, ExperimentError::Config(_)));
    }

    #[test]
    fn sessions_per_variant() {
        let subject = Subject {
            id: "x".into(),
            exp_type: wordface_core::ExperimentType::Eeg,
            session: 3,
            scan_day: wordface_core::ScanDay::Wed,
            gender: wordface_core::Gender::Other,
            age: String::new(),
        };
        assert_eq!(ExperimentConfig::behavioral().sessions(&subject), [3]);
        assert_eq!(
            ExperimentConfig::scanner_eeg().sessions(&subject),
            [1, 2, 3, 4, 5, 6]
        );
    }
}
