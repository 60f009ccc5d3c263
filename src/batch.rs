//! Adaptive batched file processing
//!
//! Drives a consumer over an ordered list of glob-matched files in rounds.
//! Before each round the consumer reports how many more files it needs at
//! minimum; the round runs that many files (capped by the concurrency limit
//! and by how many remain), one scoped thread per file. The estimate shrinks
//! as the consumer's datasets complete, so a large input set does not have to
//! be fully scanned.

use std::path::{Path, PathBuf};
use std::thread;

use glob::glob;
use thiserror::Error;

/// A consumer of batched file processing.
///
/// `process_file` is called once per file, concurrently with the other files
/// of the same round. The remaining hooks are called from the driving thread
/// only, between rounds.
pub trait BatchConsumer: Sync {
    /// Process one input file. Failures to load or decode are the consumer's
    /// to log and swallow; they must not abort the round.
    fn process_file(&self, path: &Path);

    /// Minimum number of further files needed; 0 means done.
    fn minimum_files_needed(&self) -> usize;

    /// Called just before each round starts.
    fn start_batch(&self) {}

    /// Called just after each round's tasks have all finished.
    fn finish_batch(&self) {}

    /// Called exactly once, after the last round (or immediately when no
    /// files matched).
    fn finish(&self);
}

/// Error during batch setup.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("invalid glob pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        source: glob::PatternError,
    },
}

/// Expand `pattern` and process the matching files in adaptive rounds.
///
/// Unreadable directory entries are logged and skipped. Files are processed
/// in sorted order. Once a round starts, all of its tasks run to completion;
/// there is no mid-round cancellation.
pub fn process_matching(
    pattern: &str,
    consumer: &impl BatchConsumer,
    max_concurrency: usize,
) -> Result<(), BatchError> {
    let paths = glob(pattern).map_err(|source| BatchError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })?;

    let mut files: Vec<PathBuf> = Vec::new();
    for entry in paths {
        match entry {
            Ok(path) => files.push(path),
            Err(e) => eprintln!("Warning: error reading path: {}", e),
        }
    }
    files.sort();

    if files.is_empty() {
        println!("No files matched pattern '{}'", pattern);
        consumer.finish();
        return Ok(());
    }

    let max_concurrency = max_concurrency.max(1);
    let mut index = 0;
    while index < files.len() {
        let needed = consumer.minimum_files_needed();
        println!("Needs to process at least {} more files", needed);
        if needed == 0 {
            break;
        }
        let remaining = files.len() - index;
        let round = needed.min(max_concurrency).min(remaining);
        println!("{} files remaining, starting {} tasks", remaining, round);

        consumer.start_batch();
        let batch = &files[index..index + round];
        thread::scope(|s| {
            for path in batch {
                s.spawn(move || consumer.process_file(path));
            }
        });
        index += round;
        consumer.finish_batch();
        println!(
            "Finished batch of {}, {} files remaining",
            round,
            files.len() - index
        );
    }

    consumer.finish();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Consumer that records every callback and reports a shrinking estimate.
    struct RecordingConsumer {
        /// Files still needed; decremented per processed file.
        needed: Mutex<usize>,
        processed: Mutex<Vec<PathBuf>>,
        batches: Mutex<Vec<usize>>,
        in_batch: Mutex<usize>,
        finish_calls: Mutex<usize>,
    }

    impl RecordingConsumer {
        fn new(needed: usize) -> Self {
            Self {
                needed: Mutex::new(needed),
                processed: Mutex::new(Vec::new()),
                batches: Mutex::new(Vec::new()),
                in_batch: Mutex::new(0),
                finish_calls: Mutex::new(0),
            }
        }
    }

    impl BatchConsumer for RecordingConsumer {
        fn process_file(&self, path: &Path) {
            self.processed.lock().unwrap().push(path.to_path_buf());
            *self.in_batch.lock().unwrap() += 1;
            let mut needed = self.needed.lock().unwrap();
            *needed = needed.saturating_sub(1);
        }

        fn minimum_files_needed(&self) -> usize {
            *self.needed.lock().unwrap()
        }

        fn start_batch(&self) {
            *self.in_batch.lock().unwrap() = 0;
        }

        fn finish_batch(&self) {
            let n = *self.in_batch.lock().unwrap();
            self.batches.lock().unwrap().push(n);
        }

        fn finish(&self) {
            *self.finish_calls.lock().unwrap() += 1;
        }
    }

    fn make_files(dir: &Path, count: usize) {
        for i in 0..count {
            fs::write(dir.join(format!("{:02}.png", i)), b"x").unwrap();
        }
    }

    #[test]
    fn test_round_size_bounded_by_needed_and_cap() {
        let temp = TempDir::new().unwrap();
        make_files(temp.path(), 10);
        let pattern = temp.path().join("*.png");

        // Needs 5 files, cap 3: rounds of 3 then 2
        let consumer = RecordingConsumer::new(5);
        process_matching(pattern.to_str().unwrap(), &consumer, 3).unwrap();

        assert_eq!(*consumer.batches.lock().unwrap(), vec![3, 2]);
        assert_eq!(consumer.processed.lock().unwrap().len(), 5);
        assert_eq!(*consumer.finish_calls.lock().unwrap(), 1);
    }

    #[test]
    fn test_stops_when_satisfied_without_scanning_all() {
        let temp = TempDir::new().unwrap();
        make_files(temp.path(), 20);
        let pattern = temp.path().join("*.png");

        let consumer = RecordingConsumer::new(4);
        process_matching(pattern.to_str().unwrap(), &consumer, 6).unwrap();

        // 4 of 20 files were enough
        assert_eq!(consumer.processed.lock().unwrap().len(), 4);
        assert_eq!(*consumer.finish_calls.lock().unwrap(), 1);
    }

    #[test]
    fn test_exhausts_files_when_never_satisfied() {
        let temp = TempDir::new().unwrap();
        make_files(temp.path(), 4);
        let pattern = temp.path().join("*.png");

        let consumer = RecordingConsumer::new(100);
        process_matching(pattern.to_str().unwrap(), &consumer, 2).unwrap();

        assert_eq!(consumer.processed.lock().unwrap().len(), 4);
        assert_eq!(consumer.batches.lock().unwrap().len(), 2);
        assert_eq!(*consumer.finish_calls.lock().unwrap(), 1);
    }

    #[test]
    fn test_files_processed_in_sorted_order_across_rounds() {
        let temp = TempDir::new().unwrap();
        make_files(temp.path(), 6);
        let pattern = temp.path().join("*.png");

        let consumer = RecordingConsumer::new(6);
        process_matching(pattern.to_str().unwrap(), &consumer, 2).unwrap();

        let processed = consumer.processed.lock().unwrap();
        let mut rounds: Vec<Vec<&PathBuf>> = processed.chunks(2).map(|c| c.iter().collect()).collect();
        // Order within a round is nondeterministic; across rounds it is not
        for round in rounds.iter_mut() {
            round.sort();
        }
        let flattened: Vec<&PathBuf> = rounds.into_iter().flatten().collect();
        let mut expected = flattened.clone();
        expected.sort();
        assert_eq!(flattened, expected);
    }

    #[test]
    fn test_no_matches_still_finishes_once() {
        let temp = TempDir::new().unwrap();
        let pattern = temp.path().join("*.png");

        let consumer = RecordingConsumer::new(6);
        process_matching(pattern.to_str().unwrap(), &consumer, 6).unwrap();

        assert!(consumer.processed.lock().unwrap().is_empty());
        assert!(consumer.batches.lock().unwrap().is_empty());
        assert_eq!(*consumer.finish_calls.lock().unwrap(), 1);
    }

    #[test]
    fn test_invalid_pattern() {
        let consumer = RecordingConsumer::new(1);
        let err = process_matching("***invalid[", &consumer, 1).unwrap_err();
        assert!(matches!(err, BatchError::InvalidPattern { .. }));
    }
}
