use crate::config::TriggerFrames;
use wordface_core::{Stimulus, TrialRecord, TrialState};
use wordface_timing::ns_to_secs;

/// Flip times of the schedule's landmarks, in timer nanoseconds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrialTimestamps {
    pub word_onset: Option<u64>,
    pub word_offset: Option<u64>,
    pub image_onset: Option<u64>,
    pub image_offset: Option<u64>,
    pub pause_trigger: Option<u64>,
}

/// Events the schedule asks to be stamped on the next flip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Landmark {
    WordOnset,
    WordOffset,
    ImageOnset,
    ImageOffset,
    PauseTrigger,
}

/// A trial being presented: its record plus the frame counter.
#[derive(Debug, Clone)]
pub struct TrialRun {
    pub record: TrialRecord,
    pub state: TrialState,
    /// Frame index within `state`.
    pub frame: u32,
    pub timestamps: TrialTimestamps,
}

impl TrialRun {
    pub fn new(record: TrialRecord) -> Self {
        let mut run = Self {
            record,
            state: TrialState::Word,
            frame: 0,
            timestamps: TrialTimestamps::default(),
        };
        run.skip_empty_states();
        run
    }

    pub fn frames_in(&self, state: TrialState) -> u32 {
        match state {
            TrialState::Word | TrialState::Face => self.record.duration_frames,
            TrialState::PreDelay => self.record.delay_frames_before,
            TrialState::PostDelay => self.record.delay_frames_after,
            TrialState::Complete => 0,
        }
    }

    pub fn stimulus(&self) -> Stimulus {
        match self.state {
            TrialState::Word => Stimulus::Word(self.record.word_id),
            TrialState::PreDelay | TrialState::PostDelay => Stimulus::Fixation,
            TrialState::Face => Stimulus::Face(self.record.face),
            TrialState::Complete => Stimulus::Blank,
        }
    }

    /// The photodiode marker accompanies the word and the face.
    pub fn shows_marker(&self) -> bool {
        matches!(self.state, TrialState::Word | TrialState::Face)
    }

    /// Whether response keys are collected on the current frame.
    pub fn polls(&self, first_poll_frame: u32) -> bool {
        if self.record.has_response() {
            return false;
        }
        match self.state {
            TrialState::Face => self.frame >= first_poll_frame,
            TrialState::PostDelay => true,
            _ => false,
        }
    }

    /// Landmarks that fall on the flip of the current frame.
    pub fn landmarks(&self, frames: &TriggerFrames) -> Vec<Landmark> {
        let mut marks = Vec::new();
        if self.frame == 0 {
            match self.state {
                TrialState::Word => marks.push(Landmark::WordOnset),
                TrialState::PreDelay => marks.push(Landmark::WordOffset),
                TrialState::Face => {
                    if self.timestamps.word_offset.is_none() {
                        marks.push(Landmark::WordOffset);
                    }
                    marks.push(Landmark::ImageOnset);
                }
                TrialState::PostDelay => marks.push(Landmark::ImageOffset),
                TrialState::Complete => {}
            }
        }
        if self.state == TrialState::PreDelay && self.frame == frames.pause {
            marks.push(Landmark::PauseTrigger);
        }
        marks
    }

    /// Code to raise on the flip of the current frame, if any.
    pub fn scheduled_trigger(&self, frames: &TriggerFrames) -> Option<u8> {
        let codes = self.record.triggers();
        match self.state {
            TrialState::Word if self.frame == frames.word => Some(codes.word),
            TrialState::PreDelay if self.frame == frames.pause => Some(codes.pause),
            TrialState::Face if self.frame == frames.image => Some(codes.image),
            _ => None,
        }
    }

    pub fn stamp(&mut self, mark: Landmark, ts: u64) {
        let slot = match mark {
            Landmark::WordOnset => &mut self.timestamps.word_onset,
            Landmark::WordOffset => &mut self.timestamps.word_offset,
            Landmark::ImageOnset => &mut self.timestamps.image_onset,
            Landmark::ImageOffset => &mut self.timestamps.image_offset,
            Landmark::PauseTrigger => &mut self.timestamps.pause_trigger,
        };
        slot.get_or_insert(ts);
    }

    /// Moves to the next frame, crossing into the next state when the current
    /// one has run its course.
    pub fn advance(&mut self) {
        if self.state == TrialState::Complete {
            return;
        }
        self.frame += 1;
        if self.frame >= self.frames_in(self.state) {
            self.state = self.state.next();
            self.frame = 0;
            self.skip_empty_states();
        }
    }

    pub fn is_complete(&self) -> bool {
        self.state == TrialState::Complete
    }

    fn skip_empty_states(&mut self) {
        while self.state != TrialState::Complete && self.frames_in(self.state) == 0 {
            self.state = self.state.next();
        }
    }

    /// Copies the stamped flip times into the record, relative to the
    /// session start.
    pub fn finish(&mut self, session_start: u64, end: u64) {
        let rel = |ts: u64| ns_to_secs(ts.saturating_sub(session_start));
        let t = &self.timestamps;
        let word_offset = t.word_offset.or(t.image_onset).unwrap_or(end);
        let image_offset = t.image_offset.unwrap_or(end);
        let r = &mut self.record;

        if let Some(on) = t.word_onset {
            r.onset_word = Some(rel(on));
            r.offset_word = Some(rel(word_offset));
            r.duration_measured_word = Some(ns_to_secs(word_offset.saturating_sub(on)));
        }
        if let Some(on) = t.image_onset {
            r.onset_img = Some(rel(on));
            r.offset_img = Some(rel(image_offset));
            r.duration_measured_img = Some(ns_to_secs(image_offset.saturating_sub(on)));
        }
        r.pause_trigger_t = t.pause_trigger.map(rel);
    }
}
