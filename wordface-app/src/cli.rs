use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use wordface_core::{ExperimentType, Gender, ScanDay, Subject};
use wordface_experiment::{ExperimentConfig, Variant};

/// Word-cued face valence experiment.
#[derive(Parser, Debug)]
#[command(name = "wordface", version, long_about = None)]
pub struct Args {
    /// Participant ID, used in the output file names
    #[arg(long)]
    pub id: String,

    #[arg(long, value_enum, default_value_t = ExpTypeArg::Behavioral)]
    pub exp_type: ExpTypeArg,

    /// Session whose words are shown (behavioral variant)
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..=6))]
    pub session: u32,

    #[arg(long, value_enum, default_value_t = ScanDayArg::Mon)]
    pub scan_day: ScanDayArg,

    #[arg(long, value_enum, default_value_t = GenderArg::Female)]
    pub gender: GenderArg,

    #[arg(long, default_value = "")]
    pub age: String,

    /// Preset to start from (the TOML file may also name one)
    #[arg(long, value_enum)]
    pub variant: Option<VariantArg>,

    /// TOML file overriding the preset
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Tab-separated word list
    #[arg(long)]
    pub wordlist: Option<PathBuf>,

    #[arg(long)]
    pub save_folder: Option<PathBuf>,

    /// ppdev device for hardware triggers, e.g. /dev/parport0
    #[arg(long)]
    pub parallel_port: Option<PathBuf>,

    /// Refresh rate the frame counts are computed for
    #[arg(long)]
    pub frame_rate: Option<u32>,

    /// Run in a window instead of fullscreen
    #[arg(long, default_value_t = false)]
    pub windowed: bool,

    /// Enable debug logging
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ExpTypeArg {
    Fmri,
    Eeg,
    Behavioral,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum GenderArg {
    Female,
    Male,
    Other,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ScanDayArg {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum VariantArg {
    Behavioral,
    ScannerEeg,
}

impl From<VariantArg> for Variant {
    fn from(v: VariantArg) -> Self {
        match v {
            VariantArg::Behavioral => Variant::Behavioral,
            VariantArg::ScannerEeg => Variant::ScannerEeg,
        }
    }
}

impl Args {
    pub fn subject(&self) -> Subject {
        Subject {
            id: self.id.clone(),
            exp_type: match self.exp_type {
                ExpTypeArg::Fmri => ExperimentType::Fmri,
                ExpTypeArg::Eeg => ExperimentType::Eeg,
                ExpTypeArg::Behavioral => ExperimentType::Behavioral,
            },
            session: self.session,
            scan_day: match self.scan_day {
                ScanDayArg::Mon => ScanDay::Mon,
                ScanDayArg::Tue => ScanDay::Tue,
                ScanDayArg::Wed => ScanDay::Wed,
                ScanDayArg::Thu => ScanDay::Thu,
                ScanDayArg::Fri => ScanDay::Fri,
                ScanDayArg::Sat => ScanDay::Sat,
                ScanDayArg::Sun => ScanDay::Sun,
            },
            gender: match self.gender {
                GenderArg::Female => Gender::Female,
                GenderArg::Male => Gender::Male,
                GenderArg::Other => Gender::Other,
            },
            age: self.age.clone(),
        }
    }

    /// Preset or TOML file, then command-line overrides.
    pub fn experiment_config(&self) -> Result<ExperimentConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let config = ExperimentConfig::load(path)?;
                if let Some(v) = self.variant {
                    if Variant::from(v) != config.variant {
                        bail!(
                            "--variant {v:?} contradicts variant {:?} in {}",
                            config.variant,
                            path.display()
                        );
                    }
                }
                config
            }
            None => ExperimentConfig::preset(self.variant.map(Variant::from).unwrap_or_default()),
        };

        if let Some(path) = &self.wordlist {
            config.wordlist = path.clone();
        }
        if let Some(path) = &self.save_folder {
            config.save_folder = path.clone();
        }
        if let Some(rate) = self.frame_rate {
            config.frame_rate = rate;
        }
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("wordface").chain(args.iter().copied()))
    }

    #[test]
    fn id_is_required() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["--id", "s01"]).is_ok());
    }

    #[test]
    fn session_is_limited_to_six() {
        assert!(parse(&["--id", "s01", "--session", "7"]).is_err());
        assert_eq!(parse(&["--id", "s01", "--session", "6"]).unwrap().session, 6);
    }

    #[test]
    fn builds_subject_and_overrides() {
        let args = parse(&[
            "--id", "s02", "--exp-type", "eeg", "--gender", "male", "--scan-day", "fri",
            "--age", "29", "--variant", "scanner-eeg", "--frame-rate", "120", "--wordlist",
            "words.tsv",
        ])
        .unwrap();

        let subject = args.subject();
        assert_eq!(subject.exp_type, ExperimentType::Eeg);
        assert_eq!(subject.scan_day, ScanDay::Fri);
        assert_eq!(subject.gender, Gender::Male);
        assert_eq!(subject.age, "29");

        let config = args.experiment_config().unwrap();
        assert_eq!(config.variant, Variant::ScannerEeg);
        assert_eq!(config.duration_frames(), 84);
        assert_eq!(config.wordlist, PathBuf::from("words.tsv"));
    }

    #[test]
    fn conflicting_variant_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exp.toml");
        std::fs::write(&path, "variant = \"behavioral\"\n").unwrap();
        let args = parse(&[
            "--id", "s03", "--variant", "scanner-eeg", "--config", path.to_str().unwrap(),
        ])
        .unwrap();
        assert!(args.experiment_config().is_err());
    }
}
