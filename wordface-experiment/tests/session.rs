use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use std::path::Path;
use std::time::Duration;
use wordface_core::{
    ExperimentType, Face, Gender, ScanDay, SessionPhase, Stimulus, Subject, TrialState, WordList,
};
use wordface_experiment::{
    Control, ExperimentConfig, ExperimentError, RecordingPort, SessionStateMachine, TrialLog,
    TriggerFrames,
};
use wordface_timing::{ManualTimer, Timer};

const FRAME: Duration = Duration::from_nanos(16_666_667);

const WORDS: &str = "\
session\tword\tlabel\tscore_pc\tscore_warriner
1\tsmile\tpos\t1.5\t7.2
1\tpain\tneg\t-1.8\t2.1
1\ttable\tneu\t0.1\t
2\tgift\tpos\t1.1\t6.9
2\tgrief\tneg\t-2.0\t1.8
";

fn subject() -> Subject {
    Subject {
        id: "s07".into(),
        exp_type: ExperimentType::Behavioral,
        session: 1,
        scan_day: ScanDay::Tue,
        gender: Gender::Female,
        age: "24".into(),
    }
}

/// Short frames so a whole session runs in a few hundred steps.
fn small_config(mut config: ExperimentConfig) -> ExperimentConfig {
    config.stimulus_duration_s = 0.05; // 3 frames
    config.delays = vec![2, 4];
    config.lead_in_s = 0.0;
    config.trigger_frames = TriggerFrames { word: 1, pause: 1, image: 1 };
    config
}

struct Harness {
    machine: SessionStateMachine<ManualTimer, StdRng>,
    clock: ManualTimer,
    port: RecordingPort,
}

impl Harness {
    fn new(config: ExperimentConfig, words: &str, folder: &Path) -> Self {
        let clock = ManualTimer::new();
        let port = RecordingPort::new();
        let machine = SessionStateMachine::new(
            config,
            subject(),
            WordList::from_reader(words.as_bytes()).unwrap(),
            Box::new(port.clone()),
            TrialLog::new(folder),
            clock.clone(),
            StdRng::seed_from_u64(7),
        )
        .unwrap();
        Self { machine, clock, port }
    }

    fn press(&mut self, key: &str) -> Control {
        self.machine.handle_key(key).unwrap()
    }

    fn step(&mut self) -> Stimulus {
        let plan = self.machine.next_frame().unwrap();
        self.clock.advance(FRAME);
        self.machine.flipped().unwrap();
        plan.stimulus
    }

    fn run_until(&mut self, mut done: impl FnMut(&SessionStateMachine<ManualTimer, StdRng>) -> bool) {
        for _ in 0..10_000 {
            if done(&self.machine) {
                return;
            }
            self.step();
        }
        panic!("condition never reached");
    }

    fn finish(&mut self) {
        self.run_until(|m| m.is_done() || m.phase == SessionPhase::Instructions);
    }
}

fn single_word(label: &str) -> String {
    format!("session\tword\tlabel\tscore_pc\tscore_warriner\n1\tword\t{label}\t\t\n")
}

#[test]
fn waits_for_trigger_then_runs_every_trial() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = Harness::new(small_config(ExperimentConfig::behavioral()), WORDS, dir.path());

    for _ in 0..5 {
        assert_eq!(h.step(), Stimulus::Instructions);
    }
    // response keys mean nothing before the session starts
    assert_eq!(h.press("b"), Control::Continue);
    assert_eq!(h.machine.phase, SessionPhase::Instructions);

    h.press("t");
    assert_eq!(h.machine.phase, SessionPhase::Trials);
    h.finish();
    assert!(h.machine.is_done());

    let done = h.machine.completed();
    assert_eq!(done.len(), 3);
    assert_eq!(done.iter().map(|r| r.no).collect::<Vec<_>>(), [1, 2, 3]);
    for r in done {
        assert_eq!(r.session, 1);
        assert_eq!(r.duration_frames, 3);
        let mut delays = [r.delay_frames_before, r.delay_frames_after];
        delays.sort();
        assert_eq!(delays, [2, 4]);
        assert!(r.response.is_none() && r.rt.is_none() && r.correct_resp.is_none());
        let word = r.duration_measured_word.unwrap();
        assert!((word - 0.05).abs() < 1e-6, "word shown for {word}");
        assert!(r.onset_img.unwrap() > r.offset_word.unwrap());
    }

    let text = fs::read_to_string(dir.path().join("s07_sess_1.csv")).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("ID,age,gender,scan day,condition,session,word"));
    assert!(lines[1].starts_with("s07,24,female,Tue,faceWord_exp,1,"));
}

#[test]
fn scores_a_response_made_while_the_face_is_up() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = Harness::new(small_config(ExperimentConfig::behavioral()), WORDS, dir.path());
    h.press("t");
    h.run_until(|m| {
        m.current_trial()
            .is_some_and(|t| t.state == TrialState::Face && t.timestamps.image_onset.is_some())
    });

    let face = h.machine.current_trial().unwrap().record.face;
    let key = if face == Face::Happy { "b" } else { "y" };
    h.clock.advance(Duration::from_millis(5));
    h.press(key);
    h.finish();

    let first = &h.machine.completed()[0];
    assert_eq!(first.response.as_deref(), Some(key));
    assert_eq!(first.correct_resp, Some(true));
    let rt = first.rt.unwrap();
    assert!((rt - 0.005).abs() < 1e-6, "rt {rt}");
    assert!(first.key_t.unwrap() > first.onset_img.unwrap());
    assert!(h.machine.completed()[1..].iter().all(|r| r.response.is_none()));
}

#[test]
fn presses_before_face_onset_do_not_count() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = Harness::new(small_config(ExperimentConfig::behavioral()), WORDS, dir.path());
    h.press("t");
    h.step();
    assert!(matches!(h.step(), Stimulus::Word(_)));
    h.press("b");
    h.run_until(|m| m.current_trial().is_some_and(|t| t.state == TrialState::PreDelay));
    h.press("y");
    h.finish();

    assert!(h.machine.completed().iter().all(|r| r.response.is_none()));
}

#[test]
fn writes_scheduled_and_response_pulses() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = small_config(ExperimentConfig::scanner_eeg());
    config.runs = 1;
    let mut h = Harness::new(config, &single_word("pos"), dir.path());
    h.press("t");
    // let the image pulse go out, then answer on the following frame
    h.run_until(|m| {
        m.current_trial()
            .is_some_and(|t| t.state == TrialState::Face && t.frame == 2)
    });
    h.press("1");
    h.finish();

    assert_eq!(h.port.codes(), [11, 0, 31, 0, 21, 101, 0]);
    assert_eq!(h.machine.completed()[0].correct_resp, Some(true));
}

#[test]
fn scanner_scores_a_key_buffered_before_polling_starts() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = small_config(ExperimentConfig::scanner_eeg());
    config.runs = 1;
    let mut h = Harness::new(config, &single_word("pos"), dir.path());
    h.press("t");
    // face frame 1: onset is stamped but polling only starts on frame 2
    h.run_until(|m| {
        m.current_trial().is_some_and(|t| {
            t.state == TrialState::Face && t.frame == 1 && t.timestamps.image_onset.is_some()
        })
    });
    h.clock.advance(Duration::from_millis(3));
    h.press("1");
    h.finish();

    let trial = &h.machine.completed()[0];
    assert_eq!(trial.response.as_deref(), Some("1"));
    assert_eq!(trial.correct_resp, Some(true));
    let rt = trial.rt.unwrap();
    assert!((rt - 0.003).abs() < 1e-6, "rt {rt}");
    assert_eq!(h.port.codes(), [11, 0, 31, 0, 21, 101, 0]);
}

#[test]
fn wrong_key_after_neutral_word_is_coded_incorrect() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = small_config(ExperimentConfig::scanner_eeg());
    config.runs = 1;
    let mut h = Harness::new(config, &single_word("neu"), dir.path());
    h.press("t");
    h.run_until(|m| {
        m.current_trial()
            .is_some_and(|t| t.state == TrialState::Face && t.frame == 2)
    });
    let face = h.machine.current_trial().unwrap().record.face;
    let (key, code) = if face == Face::Happy { ("2", 212) } else { ("1", 211) };
    h.press(key);
    h.finish();

    let codes = h.port.codes();
    assert_eq!(codes[0], 13);
    assert_eq!(&codes[codes.len() - 2..], [code, 0]);
    assert_eq!(h.machine.completed()[0].correct_resp, Some(false));
}

#[test]
fn behavioral_variant_leaves_the_port_alone() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = Harness::new(small_config(ExperimentConfig::behavioral()), WORDS, dir.path());
    h.press("t");
    h.finish();
    assert!(h.port.codes().is_empty());
    // trigger columns are filled in either way
    assert!(h.machine.completed().iter().all(|r| r.word_trigger != 0));
}

#[test]
fn scanner_variant_runs_every_session() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = small_config(ExperimentConfig::scanner_eeg());
    config.runs = 2;
    let mut h = Harness::new(config, WORDS, dir.path());

    assert_eq!(h.machine.current_session(), Some(1));
    h.press("t");
    h.finish();
    assert!(!h.machine.is_done());
    assert_eq!(h.machine.phase, SessionPhase::Instructions);
    assert_eq!(h.machine.current_session(), Some(2));

    h.press("t");
    h.finish();
    assert!(h.machine.is_done());

    let sessions: Vec<u32> = h.machine.completed().iter().map(|r| r.session).collect();
    assert_eq!(sessions, [1, 1, 1, 2, 2]);
    assert!(dir.path().join("s07_sess_1.csv").exists());
    let second = fs::read_to_string(dir.path().join("s07_sess_2.csv")).unwrap();
    assert_eq!(second.lines().count(), 3);
}

#[test]
fn quit_key_stops_mid_session() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = Harness::new(small_config(ExperimentConfig::behavioral()), WORDS, dir.path());
    h.press("t");
    h.run_until(|m| m.completed().len() == 1);

    assert_eq!(h.press("escape"), Control::Quit);
    assert!(h.machine.is_done());
    assert_eq!(h.step(), Stimulus::Blank);

    let text = fs::read_to_string(dir.path().join("s07_sess_1.csv")).unwrap();
    assert_eq!(text.lines().count(), 2);
}

#[test]
fn quit_works_before_the_trigger() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = Harness::new(small_config(ExperimentConfig::behavioral()), WORDS, dir.path());
    assert_eq!(h.press("q"), Control::Quit);
    assert!(h.machine.is_done());
    assert!(!dir.path().join("s07_sess_1.csv").exists());
}

#[test]
fn lead_in_shows_fixation_for_its_frames() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = small_config(ExperimentConfig::behavioral());
    config.lead_in_s = 0.1; // 6 frames
    let mut h = Harness::new(config, WORDS, dir.path());
    h.press("t");
    for _ in 0..6 {
        assert_eq!(h.machine.phase, SessionPhase::LeadIn);
        assert_eq!(h.step(), Stimulus::Fixation);
    }
    assert_eq!(h.machine.phase, SessionPhase::Trials);
    assert!(matches!(h.step(), Stimulus::Word(_)));
}

#[test]
fn early_present_waits_out_the_frame_period() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = Harness::new(small_config(ExperimentConfig::behavioral()), WORDS, dir.path());
    assert_eq!(h.machine.pace(), None);

    h.step();
    let flip = h.clock.now();
    h.clock.advance(Duration::from_millis(2));
    assert_eq!(h.machine.pace(), Some(Duration::from_nanos(14_666_666)));
    assert_eq!(h.clock.now() - flip, 16_666_666);

    // a present that took a full refresh is not delayed further
    h.step();
    h.clock.advance(FRAME);
    let before = h.clock.now();
    assert_eq!(h.machine.pace(), None);
    assert_eq!(h.clock.now(), before);
}

#[test]
fn session_without_words_is_rejected_up_front() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = small_config(ExperimentConfig::scanner_eeg());
    config.runs = 3;
    let result = SessionStateMachine::new(
        config,
        subject(),
        WordList::from_reader(WORDS.as_bytes()).unwrap(),
        Box::new(RecordingPort::new()),
        TrialLog::new(dir.path()),
        ManualTimer::new(),
        StdRng::seed_from_u64(1),
    );
    assert!(matches!(result, Err(ExperimentError::Core(_))));
}
