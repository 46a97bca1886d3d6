use crate::trigger::response_code;
use crate::valence::{Face, Valence};
use serde::{Deserialize, Serialize};

/// Which face a response key claims was shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Positive,
    Negative,
}

impl Target {
    pub fn face(&self) -> Face {
        match self {
            Target::Positive => Face::Happy,
            Target::Negative => Face::Fearful,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scored {
    pub correct: bool,
    pub trigger: u8,
}

/// Scores a response against the face that was shown.
pub fn score(target: Target, shown: Face, valence: Valence) -> Scored {
    let correct = target.face() == shown;
    Scored {
        correct,
        trigger: response_code(correct, valence, target),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_key_is_correct_only_for_fearful_face() {
        assert!(score(Target::Negative, Face::Fearful, Valence::Negative).correct);
        assert!(!score(Target::Negative, Face::Happy, Valence::Neutral).correct);
    }

    #[test]
    fn positive_key_is_correct_only_for_happy_face() {
        assert!(score(Target::Positive, Face::Happy, Valence::Positive).correct);
        assert!(!score(Target::Positive, Face::Fearful, Valence::Neutral).correct);
    }

    #[test]
    fn scored_trigger_follows_outcome() {
        let s = score(Target::Positive, Face::Fearful, Valence::Neutral);
        assert_eq!(s, Scored { correct: false, trigger: 211 });
    }
}
