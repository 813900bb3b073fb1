//! Restartable grid search
//!
//! Each call hands out the next untried combination of a cartesian parameter
//! space and records progress in a small text file, so a shell loop such as
//!
//! ```text
//! while yapecs-train --config search.toml; do :; done
//! ```
//!
//! runs every combination exactly once and stops when the search reports
//! exhaustion. Combinations are enumerated in row-major order: the last
//! parameter varies fastest.
//!
//! There is no file locking. Two processes advancing the same progress file
//! at the same time can be handed the same combination; run one search per
//! progress file at a time.

use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Select the combination at the persisted progress index and advance it.
///
/// `value_lists` holds the candidate values of each parameter, in order. The
/// progress file is created on first use; once every combination has been
/// handed out the call fails with [`Error::ExhaustedSearch`] and leaves the
/// file untouched.
pub fn grid_search<T, L>(progress_file: impl AsRef<Path>, value_lists: &[L]) -> Result<Vec<T>>
where
    T: Clone,
    L: AsRef<[T]>,
{
    let progress_file = progress_file.as_ref();
    let radices: Vec<usize> = value_lists.iter().map(|values| values.as_ref().len()).collect();
    let total = total_combinations(progress_file, &radices)?;

    let index = read_progress(progress_file)?;
    if index >= total {
        return Err(Error::ExhaustedSearch { progress_file: progress_file.to_path_buf(), index, total });
    }

    // Persist first: a crash after this point skips the combination instead of replaying it.
    write_progress(progress_file, index + 1)?;
    tracing::debug!(
        "Grid search {}: combination {} of {}",
        progress_file.display(),
        index + 1,
        total
    );

    Ok(decode_index(index, &radices)
        .into_iter()
        .zip(value_lists)
        .map(|(digit, values)| values.as_ref()[digit].clone())
        .collect())
}

/// Current progress index; 0 when the file does not exist yet.
pub fn read_progress(progress_file: &Path) -> Result<usize> {
    if !progress_file.exists() {
        return Ok(0);
    }
    let content = fs::read_to_string(progress_file)?;
    content.trim().parse::<usize>().map_err(|_| Error::Progress {
        path: progress_file.to_path_buf(),
        reason: format!("expected a non-negative integer, found `{}`", content.trim()),
    })
}

pub fn write_progress(progress_file: &Path, index: usize) -> Result<()> {
    fs::write(progress_file, index.to_string())?;
    Ok(())
}

fn total_combinations(progress_file: &Path, radices: &[usize]) -> Result<usize> {
    if let Some(position) = radices.iter().position(|&len| len == 0) {
        return Err(Error::EmptySearchSpace { position });
    }
    radices.iter().try_fold(1usize, |acc, &len| {
        acc.checked_mul(len).ok_or_else(|| Error::Progress {
            path: progress_file.to_path_buf(),
            reason: "search space has more combinations than fit in an index".to_string(),
        })
    })
}

/// Mixed-radix decoding of `index`; the last radix is the least significant digit.
fn decode_index(mut index: usize, radices: &[usize]) -> Vec<usize> {
    let mut digits = vec![0; radices.len()];
    for (slot, &radix) in digits.iter_mut().zip(radices).rev() {
        *slot = index % radix;
        index /= radix;
    }
    digits
}

/// Named-parameter grid search, as declared in a config source.
#[derive(Debug, Clone, PartialEq)]
pub struct GridSearch {
    progress_file: PathBuf,
    parameters: Vec<(String, Vec<Value>)>,
}

impl GridSearch {
    pub fn new(progress_file: impl Into<PathBuf>) -> Self {
        Self { progress_file: progress_file.into(), parameters: Vec::new() }
    }

    pub fn parameter(mut self, name: impl Into<String>, values: Vec<Value>) -> Self {
        self.parameters.push((name.into(), values));
        self
    }

    pub fn progress_file(&self) -> &Path {
        &self.progress_file
    }

    pub fn parameters(&self) -> &[(String, Vec<Value>)] {
        &self.parameters
    }

    pub fn total(&self) -> Result<usize> {
        let radices: Vec<usize> = self.parameters.iter().map(|(_, values)| values.len()).collect();
        total_combinations(&self.progress_file, &radices)
    }

    pub fn progress(&self) -> Result<usize> {
        read_progress(&self.progress_file)
    }

    /// Forget all progress so the next call starts from the first combination.
    pub fn reset(&self) -> Result<()> {
        if self.progress_file.exists() {
            fs::remove_file(&self.progress_file)?;
        }
        Ok(())
    }

    /// Hand out the next combination as `(name, value)` pairs.
    pub fn advance(&self) -> Result<Vec<(String, Value)>> {
        let lists: Vec<&[Value]> = self.parameters.iter().map(|(_, values)| values.as_slice()).collect();
        let selected = grid_search(&self.progress_file, lists.as_slice())?;
        let assignment: Vec<(String, Value)> = self
            .parameters
            .iter()
            .map(|(name, _)| name.clone())
            .zip(selected)
            .collect();
        tracing::info!(
            "Grid search selected {}",
            assignment.iter().map(|(n, v)| format!("{}={}", n, v)).collect::<Vec<_>>().join(", ")
        );
        Ok(assignment)
    }
}
