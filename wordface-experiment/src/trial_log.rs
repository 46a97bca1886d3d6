use crate::error::ExperimentError;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use wordface_core::TrialRecord;

/// Append-only CSV log, one file per subject and session.
///
/// Rows are flushed as soon as they are written so a crash or a quit key
/// loses at most the trial in progress.
#[derive(Debug)]
pub struct TrialLog {
    folder: PathBuf,
    current: Option<(PathBuf, csv::Writer<File>)>,
    rows: usize,
}

impl TrialLog {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
            current: None,
            rows: 0,
        }
    }

    pub fn file_name(subject_id: &str, session: u32) -> String {
        format!("{subject_id}_sess_{session}.csv")
    }

    /// Opens (or reopens for appending) the session's file. The header row
    /// is only written into an empty file.
    pub fn open_session(&mut self, subject_id: &str, session: u32) -> Result<PathBuf, ExperimentError> {
        self.flush()?;
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| ExperimentError::LogIo { path, source }
        };

        fs::create_dir_all(&self.folder).map_err(io_err(&self.folder))?;
        let path = self.folder.join(Self::file_name(subject_id, session));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_err(&path))?;
        let is_new = file.metadata().map_err(io_err(&path))?.len() == 0;
        let writer = csv::WriterBuilder::new()
            .has_headers(is_new)
            .from_writer(file);

        log::info!("logging session {session} to {}", path.display());
        self.current = Some((path.clone(), writer));
        self.rows = 0;
        Ok(path)
    }

    pub fn write(&mut self, record: &TrialRecord) -> Result<(), ExperimentError> {
        let Some((path, writer)) = self.current.as_mut() else {
            return Err(ExperimentError::NoSession);
        };
        writer.serialize(record)?;
        writer.flush().map_err(|source| ExperimentError::LogIo {
            path: path.clone(),
            source,
        })?;
        self.rows += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), ExperimentError> {
        if let Some((path, writer)) = self.current.as_mut() {
            writer.flush().map_err(|source| ExperimentError::LogIo {
                path: path.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Rows written since the current session was opened.
    pub fn rows(&self) -> usize {
        self.rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wordface_core::{Face, Gender, ScanDay, Valence};

    fn record(no: usize) -> TrialRecord {
        TrialRecord {
            id: "s01".into(),
            age: "31".into(),
            gender: Gender::Male,
            scan_day: ScanDay::Thu,
            condition: "faceWord_exp".into(),
            session: 2,
            word: "smile".into(),
            word_label: Valence::Positive,
            word_score_pc: Some(1.2),
            word_score_warriner: None,
            word_trigger: 11,
            pause_trigger: 31,
            pause_trigger_t: Some(1.5),
            img: "image_stim_p.png".into(),
            img_trigger: 21,
            onset_word: Some(1.0),
            offset_word: Some(1.7),
            duration_measured_word: Some(0.7),
            onset_img: Some(3.7),
            offset_img: Some(4.4),
            duration_measured_img: Some(0.7),
            duration_frames: 42,
            delay_frames_before: 120,
            delay_frames_after: 180,
            response: Some("b".into()),
            key_t: Some(4.0),
            rt: Some(0.3),
            correct_resp: Some(true),
            no,
            face: Face::Happy,
            word_id: 0,
        }
    }

    #[test]
    fn writes_header_once_and_appends() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = TrialLog::new(dir.path().join("data"));
        let path = log.open_session("s01", 2).unwrap();
        assert!(path.ends_with("s01_sess_2.csv"));
        log.write(&record(1)).unwrap();

        // reopening the same session appends without a second header
        let mut again = TrialLog::new(dir.path().join("data"));
        again.open_session("s01", 2).unwrap();
        let mut unanswered = record(2);
        unanswered.response = None;
        unanswered.key_t = None;
        unanswered.rt = None;
        unanswered.correct_resp = None;
        again.write(&unanswered).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("ID,age,gender,scan day,condition,session,word,word_label"));
        assert!(lines[0].ends_with("response,key_t,rt,correct_resp,no"));
        assert!(lines[1].starts_with("s01,31,male,Thu,faceWord_exp,2,smile,pos,1.2,,11,31,1.5,"));
        assert!(lines[1].ends_with(",b,4.0,0.3,1,1"));
        assert!(lines[2].ends_with(",,,,,2"));
    }

    #[test]
    fn write_without_session_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = TrialLog::new(dir.path());
        assert!(matches!(log.write(&record(1)), Err(ExperimentError::NoSession)));
    }
}
