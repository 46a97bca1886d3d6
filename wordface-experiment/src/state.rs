use crate::config::{ExperimentConfig, KeyAction};
use crate::error::ExperimentError;
use crate::input::{KeyBuffer, KeyPress};
use crate::port::TriggerPort;
use crate::trial::{Landmark, TrialRun};
use crate::trial_log::TrialLog;
use rand::Rng;
use std::collections::VecDeque;
use std::time::Duration;
use wordface_core::{
    make_trial_list, score, SessionPhase, Stimulus, Subject, TrialParams, TrialRecord, WordList,
    LINE_LOW,
};
use wordface_timing::{ns_to_secs, Timer};

/// Flips after which the measured refresh rate is compared to the configured one.
const RATE_CHECK_FRAMES: usize = 120;

/// What the event loop should do after a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Quit,
}

/// What to draw on the upcoming frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FramePlan {
    pub stimulus: Stimulus,
    pub marker: bool,
}

/// Drives the experiment one display frame at a time.
///
/// The event loop calls [`next_frame`](Self::next_frame), draws the returned
/// plan, presents it and then calls [`flipped`](Self::flipped). Key presses
/// go through [`handle_key`](Self::handle_key) whenever they arrive.
pub struct SessionStateMachine<T, R>
where
    T: Timer,
    R: Rng,
{
    pub phase: SessionPhase,
    pub timer: T,
    rng: R,
    config: ExperimentConfig,
    subject: Subject,
    words: WordList,
    sessions: Vec<u32>,
    session_index: usize,
    port: Box<dyn TriggerPort>,
    log: TrialLog,
    keys: KeyBuffer,
    queue: VecDeque<TrialRecord>,
    current: Option<TrialRun>,
    lead_in_left: u32,
    session_start: u64,
    on_flip: Option<u8>,
    pull_down: bool,
    landmarks: Vec<Landmark>,
    last_flip: Option<u64>,
    completed: Vec<TrialRecord>,
    rate_checked: bool,
    done: bool,
}

impl<T, R> SessionStateMachine<T, R>
where
    T: Timer,
    R: Rng,
{
    pub fn new(
        config: ExperimentConfig,
        subject: Subject,
        words: WordList,
        port: Box<dyn TriggerPort>,
        log: TrialLog,
        timer: T,
        rng: R,
    ) -> Result<Self, ExperimentError> {
        config.validate()?;
        let sessions = config.sessions(&subject);
        // fail before the first screen rather than in the middle of a scan
        for s in &sessions {
            words.session(*s)?;
        }
        log::info!(
            "{:?} variant, subject {}, sessions {:?}, triggers via {}",
            config.variant,
            subject.id,
            sessions,
            if config.hardware_triggers {
                port.describe()
            } else {
                "nothing".into()
            }
        );

        Ok(Self {
            phase: SessionPhase::Instructions,
            timer,
            rng,
            config,
            subject,
            words,
            sessions,
            session_index: 0,
            port,
            log,
            keys: KeyBuffer::default(),
            queue: VecDeque::new(),
            current: None,
            lead_in_left: 0,
            session_start: 0,
            on_flip: None,
            pull_down: false,
            landmarks: Vec::new(),
            last_flip: None,
            completed: Vec::new(),
            rate_checked: false,
            done: false,
        })
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn current_session(&self) -> Option<u32> {
        self.sessions.get(self.session_index).copied()
    }

    pub fn current_trial(&self) -> Option<&TrialRun> {
        self.current.as_ref()
    }

    /// Trials finished so far, across sessions, in presentation order.
    pub fn completed(&self) -> &[TrialRecord] {
        &self.completed
    }

    pub fn intro_lines(&self) -> &[String] {
        &self.config.intro
    }

    /// Classifies a key press. Quit keys are honored in every phase; the
    /// scanner trigger only while the intro is shown; responses only during
    /// trials.
    pub fn handle_key(&mut self, name: &str) -> Result<Control, ExperimentError> {
        let now = self.timer.now();
        match self.config.keys.classify(name) {
            Some(KeyAction::Quit) => {
                log::warn!("quit key {name:?} pressed, stopping");
                self.log.flush()?;
                self.done = true;
                return Ok(Control::Quit);
            }
            Some(KeyAction::Trigger) if self.phase.awaits_trigger() && !self.done => {
                self.start_session(now)?;
            }
            Some(KeyAction::Respond(target)) if self.phase.is_trials() => {
                self.keys.push(KeyPress {
                    name: name.to_string(),
                    target,
                    timestamp_ns: now,
                });
            }
            _ => log::trace!("ignoring key {name:?} in {:?}", self.phase),
        }
        Ok(Control::Continue)
    }

    /// Decides the content of the upcoming frame. Responses polled on this
    /// frame are scored here and their pulse is raised immediately.
    pub fn next_frame(&mut self) -> Result<FramePlan, ExperimentError> {
        self.on_flip = None;
        if self.pull_down {
            self.on_flip = Some(LINE_LOW);
            self.pull_down = false;
        }

        if self.done {
            return Ok(FramePlan {
                stimulus: Stimulus::Blank,
                marker: false,
            });
        }

        let plan = match self.phase {
            SessionPhase::Instructions => FramePlan {
                stimulus: Stimulus::Instructions,
                marker: false,
            },
            SessionPhase::LeadIn => FramePlan {
                stimulus: Stimulus::Fixation,
                marker: false,
            },
            SessionPhase::Trials => self.plan_trial_frame()?,
            SessionPhase::Finished => FramePlan {
                stimulus: Stimulus::Blank,
                marker: false,
            },
        };
        Ok(plan)
    }

    fn plan_trial_frame(&mut self) -> Result<FramePlan, ExperimentError> {
        let frames = self.config.trigger_frames;
        let first_poll = self.config.first_poll_frame;
        let Some(run) = self.current.as_mut() else {
            return Ok(FramePlan {
                stimulus: Stimulus::Blank,
                marker: false,
            });
        };

        self.landmarks = run.landmarks(&frames);
        if let Some(code) = run.scheduled_trigger(&frames) {
            self.on_flip = Some(code);
            self.pull_down = true;
        }

        // presses only count once the face onset flip has been stamped
        let onset = run.timestamps.image_onset.filter(|_| run.polls(first_poll));
        if let Some(onset) = onset {
            if let Some(key) = self.keys.take_first() {
                let r = &mut run.record;
                let scored = score(key.target, r.face, r.word_label);
                r.rt = Some(ns_to_secs(key.timestamp_ns.saturating_sub(onset)));
                r.key_t = Some(ns_to_secs(key.timestamp_ns.saturating_sub(self.session_start)));
                r.correct_resp = Some(scored.correct);
                r.response = Some(key.name);
                log::debug!(
                    "trial {}: {:?} rt {:.3} s, correct {}",
                    r.no,
                    r.response,
                    r.rt.unwrap_or_default(),
                    scored.correct
                );

                if self.config.hardware_triggers {
                    self.port
                        .write(scored.trigger)
                        .map_err(|source| ExperimentError::Port {
                            path: self.port.describe().into(),
                            source,
                        })?;
                    // keep the response pulse up through this flip
                    if self.on_flip == Some(LINE_LOW) {
                        self.on_flip = None;
                    }
                    self.pull_down = true;
                }
            }
        }

        Ok(FramePlan {
            stimulus: run.stimulus(),
            marker: run.shows_marker(),
        })
    }

    /// Sleeps out the rest of the frame period when a present returned early,
    /// as it does on surfaces without vertical sync. Call it between the
    /// present and [`flipped`](Self::flipped). Returns the time slept.
    pub fn pace(&self) -> Option<Duration> {
        let last = self.last_flip?;
        let period = self.config.frame_period();
        let since = self.timer.elapsed(last);
        // a present blocked on vsync lands close to a full period after the last flip
        if since * 10 >= period * 9 {
            return None;
        }
        let rest = period - since;
        self.timer.sleep(rest);
        Some(rest)
    }

    /// Called right after the frame planned by `next_frame` was presented.
    pub fn flipped(&mut self) -> Result<(), ExperimentError> {
        let now = self.timer.now();
        if let Some(last) = self.last_flip.replace(now) {
            self.timer
                .record_frame(Duration::from_nanos(now.saturating_sub(last)));
            self.check_refresh_rate();
        }

        if let Some(code) = self.on_flip.take() {
            if self.config.hardware_triggers {
                self.port
                    .write(code)
                    .map_err(|source| ExperimentError::Port {
                        path: self.port.describe().into(),
                        source,
                    })?;
            }
        }
        if self.done {
            return Ok(());
        }

        match self.phase {
            SessionPhase::LeadIn => {
                self.lead_in_left = self.lead_in_left.saturating_sub(1);
                if self.lead_in_left == 0 {
                    self.begin_trials()?;
                }
            }
            SessionPhase::Trials => self.advance_trial(now)?,
            _ => {}
        }
        Ok(())
    }

    fn advance_trial(&mut self, now: u64) -> Result<(), ExperimentError> {
        let Some(run) = self.current.as_mut() else {
            return self.end_session();
        };
        for mark in self.landmarks.drain(..) {
            run.stamp(mark, now);
            if mark == Landmark::ImageOnset {
                // only presses made while the face is up can count
                self.keys.discard_before(now);
            }
        }

        run.advance();
        if run.is_complete() {
            self.finish_trial(now)?;
            self.current = self.queue.pop_front().map(TrialRun::new);
            if self.current.is_none() {
                self.end_session()?;
            }
        }
        Ok(())
    }

    fn finish_trial(&mut self, now: u64) -> Result<(), ExperimentError> {
        let Some(run) = self.current.as_mut() else {
            return Ok(());
        };
        // polling stops here, so a trial with no polled key keeps empty response fields
        run.finish(self.session_start, now);
        self.log.write(&run.record)?;
        log::info!(
            "trial {} ({} / {}) done: response {:?}",
            run.record.no,
            run.record.word,
            run.record.word_label,
            run.record.response
        );
        self.completed.push(run.record.clone());
        Ok(())
    }

    fn start_session(&mut self, now: u64) -> Result<(), ExperimentError> {
        let Some(session) = self.current_session() else {
            return Ok(());
        };
        self.session_start = now;
        log::info!("scanner trigger received, session {session} started");

        let rows = self.words.session(session)?;
        let params = TrialParams {
            subject: &self.subject,
            session,
            duration_frames: self.config.duration_frames(),
            delays: &self.config.delays,
            images: &self.config.images,
        };
        let trials = make_trial_list(rows.iter().copied(), &params, &mut self.rng)?;
        self.queue = trials.into();
        self.log.open_session(&self.subject.id, session)?;

        self.phase = SessionPhase::LeadIn;
        self.lead_in_left = self.config.lead_in_frames();
        if self.lead_in_left == 0 {
            self.begin_trials()?;
        }
        Ok(())
    }

    fn begin_trials(&mut self) -> Result<(), ExperimentError> {
        self.phase = SessionPhase::Trials;
        self.keys.clear();
        self.current = self.queue.pop_front().map(TrialRun::new);
        if self.current.is_none() {
            self.end_session()?;
        }
        Ok(())
    }

    fn end_session(&mut self) -> Result<(), ExperimentError> {
        self.log.flush()?;
        log::info!(
            "session {:?} finished with {} trials",
            self.current_session(),
            self.log.rows()
        );
        self.current = None;
        self.keys.clear();
        self.session_index += 1;
        if self.session_index < self.sessions.len() {
            self.phase = SessionPhase::Instructions;
        } else {
            self.phase = SessionPhase::Finished;
            self.done = true;
        }
        Ok(())
    }

    fn check_refresh_rate(&mut self) {
        if self.rate_checked || self.timer.frame_count() < RATE_CHECK_FRAMES {
            return;
        }
        self.rate_checked = true;
        let stats = self.timer.frame_stats();
        let expected = self.config.frame_rate as f64;
        if stats.matches_rate(expected, 0.05) {
            log::info!(
                "refresh rate {:.1} Hz (jitter {:.3} ms)",
                stats.effective_fps,
                stats.jitter_ns / 1e6
            );
        } else {
            log::warn!(
                "measured refresh rate {:.1} Hz differs from configured {expected} Hz; \
                 stimulus durations are counted in frames",
                stats.effective_fps
            );
        }
    }
}
