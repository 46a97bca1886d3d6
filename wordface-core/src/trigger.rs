//! Event codes written to the recording hardware's trigger line.

use crate::response::Target;
use crate::valence::{Face, Valence};

/// Value that pulls the trigger line back down after a pulse.
pub const LINE_LOW: u8 = 0;

/// Codes for the three scheduled pulses of a trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerCodes {
    pub word: u8,
    pub pause: u8,
    pub image: u8,
}

impl TriggerCodes {
    /// Valenced words always precede their matching face, so only neutral
    /// words split pause and image codes by face.
    pub fn for_trial(valence: Valence, face: Face) -> Self {
        match (valence, face) {
            (Valence::Positive, _) => Self { word: 11, pause: 31, image: 21 },
            (Valence::Negative, _) => Self { word: 12, pause: 32, image: 22 },
            (Valence::Neutral, Face::Happy) => Self { word: 13, pause: 51, image: 41 },
            (Valence::Neutral, Face::Fearful) => Self { word: 13, pause: 52, image: 42 },
        }
    }
}

/// Response pulse: hundreds digit 1 = correct / 2 = incorrect, tens digit 1
/// after a neutral word, units digit 1 = positive key / 2 = negative key.
pub fn response_code(correct: bool, valence: Valence, target: Target) -> u8 {
    let base = if correct { 100 } else { 200 };
    let neutral = if valence == Valence::Neutral { 10 } else { 0 };
    let key = match target {
        Target::Positive => 1,
        Target::Negative => 2,
    };
    (base + neutral + key) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheduled_codes() {
        assert_eq!(
            TriggerCodes::for_trial(Valence::Positive, Face::Happy),
            TriggerCodes { word: 11, pause: 31, image: 21 }
        );
        assert_eq!(
            TriggerCodes::for_trial(Valence::Negative, Face::Fearful),
            TriggerCodes { word: 12, pause: 32, image: 22 }
        );
        assert_eq!(
            TriggerCodes::for_trial(Valence::Neutral, Face::Happy),
            TriggerCodes { word: 13, pause: 51, image: 41 }
        );
        assert_eq!(
            TriggerCodes::for_trial(Valence::Neutral, Face::Fearful),
            TriggerCodes { word: 13, pause: 52, image: 42 }
        );
    }

    #[test]
    fn response_codes() {
        assert_eq!(response_code(true, Valence::Negative, Target::Negative), 102);
        assert_eq!(response_code(false, Valence::Positive, Target::Negative), 202);
        assert_eq!(response_code(true, Valence::Positive, Target::Positive), 101);
        assert_eq!(response_code(false, Valence::Negative, Target::Positive), 201);
        assert_eq!(response_code(true, Valence::Neutral, Target::Negative), 112);
        assert_eq!(response_code(false, Valence::Neutral, Target::Negative), 212);
        assert_eq!(response_code(true, Valence::Neutral, Target::Positive), 111);
        assert_eq!(response_code(false, Valence::Neutral, Target::Positive), 211);
    }
}
