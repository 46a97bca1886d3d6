use crate::error::CoreError;
use crate::valence::Valence;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// One row of the tab-separated word list.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WordEntry {
    pub session: u32,
    pub word: String,
    pub label: Valence,
    pub score_pc: Option<f64>,
    pub score_warriner: Option<f64>,
}

/// All word rows, in file order.
#[derive(Debug, Clone, Default)]
pub struct WordList {
    entries: Vec<WordEntry>,
}

impl WordList {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| CoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let list = Self::from_reader(file)?;
        log::info!(
            "loaded {} words in {} sessions from {}",
            list.entries.len(),
            list.sessions().len(),
            path.display()
        );
        Ok(list)
    }

    /// Parses a header row followed by tab-separated records. Columns not
    /// named in [`WordEntry`] are ignored.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, CoreError> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .trim(csv::Trim::All)
            .from_reader(reader);
        let entries = rdr
            .deserialize()
            .collect::<Result<Vec<WordEntry>, csv::Error>>()?;
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[WordEntry] {
        &self.entries
    }

    /// Rows belonging to `session`, in file order.
    pub fn session(&self, session: u32) -> Result<Vec<&WordEntry>, CoreError> {
        let rows: Vec<&WordEntry> = self
            .entries
            .iter()
            .filter(|e| e.session == session)
            .collect();
        if rows.is_empty() {
            return Err(CoreError::EmptySession(session));
        }
        Ok(rows)
    }

    pub fn sessions(&self) -> BTreeSet<u32> {
        self.entries.iter().map(|e| e.session).collect()
    }
}
