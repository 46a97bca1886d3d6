/// Stages of one session (one run of the trial list).
#[derive(Copy, Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// Intro text on screen, waiting for the scanner trigger.
    #[default]
    Instructions,
    /// Fixation cross before the first trial.
    LeadIn,
    Trials,
    Finished,
}

impl SessionPhase {
    pub fn next(&self) -> Option<Self> {
        use SessionPhase::*;
        Some(match self {
            Instructions => LeadIn,
            LeadIn => Trials,
            Trials => Finished,
            Finished => return None,
        })
    }

    pub fn awaits_trigger(&self) -> bool {
        matches!(self, SessionPhase::Instructions)
    }

    pub fn is_trials(&self) -> bool {
        matches!(self, SessionPhase::Trials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_run_in_order() {
        let mut p = SessionPhase::default();
        let mut seen = vec![p];
        while let Some(n) = p.next() {
            seen.push(n);
            p = n;
        }
        assert_eq!(
            seen,
            [
                SessionPhase::Instructions,
                SessionPhase::LeadIn,
                SessionPhase::Trials,
                SessionPhase::Finished
            ]
        );
        assert!(SessionPhase::Instructions.awaits_trigger());
        assert!(!SessionPhase::LeadIn.awaits_trigger());
    }
}
