use crate::error::CoreError;
use crate::subject::Subject;
use crate::trial::TrialRecord;
use crate::trigger::TriggerCodes;
use crate::valence::{Face, FaceImages};
use crate::wordlist::WordEntry;
use rand::Rng;
use rand::seq::{SliceRandom, index};
use wordface_cache::intern_word;

pub const CONDITION: &str = "faceWord_exp";

/// Everything besides the word rows that goes into a session's trial list.
#[derive(Debug, Clone, Copy)]
pub struct TrialParams<'a> {
    pub subject: &'a Subject,
    pub session: u32,
    pub duration_frames: u32,
    pub delays: &'a [u32],
    pub images: &'a FaceImages,
}

/// Builds one record per word row, shuffles them and numbers them from 1.
pub fn make_trial_list<'w, R, I>(
    words: I,
    params: &TrialParams<'_>,
    rng: &mut R,
) -> Result<Vec<TrialRecord>, CoreError>
where
    R: Rng + ?Sized,
    I: IntoIterator<Item = &'w WordEntry>,
{
    if params.delays.len() < 2 {
        return Err(CoreError::NotEnoughDelays(params.delays.len()));
    }

    let mut trials: Vec<TrialRecord> = words
        .into_iter()
        .map(|entry| {
            let face = Face::for_valence(entry.label, rng);
            let codes = TriggerCodes::for_trial(entry.label, face);
            let picked = index::sample(rng, params.delays.len(), 2);
            let subject = params.subject;

            TrialRecord {
                id: subject.id.clone(),
                age: subject.age.clone(),
                gender: subject.gender,
                scan_day: subject.scan_day,
                condition: CONDITION.to_string(),
                session: params.session,
                word: entry.word.clone(),
                word_label: entry.label,
                word_score_pc: entry.score_pc,
                word_score_warriner: entry.score_warriner,
                word_trigger: codes.word,
                pause_trigger: codes.pause,
                pause_trigger_t: None,
                img: params.images.file(face).to_string(),
                img_trigger: codes.image,
                onset_word: None,
                offset_word: None,
                duration_measured_word: None,
                onset_img: None,
                offset_img: None,
                duration_measured_img: None,
                duration_frames: params.duration_frames,
                delay_frames_before: params.delays[picked.index(0)],
                delay_frames_after: params.delays[picked.index(1)],
                response: None,
                key_t: None,
                rt: None,
                correct_resp: None,
                no: 0,
                face,
                word_id: intern_word(&entry.word),
            }
        })
        .collect();

    trials.shuffle(rng);
    for (i, trial) in trials.iter_mut().enumerate() {
        trial.no = i + 1;
    }

    log::debug!(
        "generated {} trials for subject {} session {}",
        trials.len(),
        params.subject.id,
        params.session
    );
    Ok(trials)
}
