//! Partitioning colour-complete sprite sets into common and themed subsets
//!
//! The first two colour-complete stores are compared pairwise: sprites found
//! in both go into the process-wide common set, everything else into the
//! respective themed sets. Every later colour is compared against the
//! accumulated common set only (one-vs-many), trading completeness for linear
//! cost. Known limitation, kept deliberately: a sprite shared between two
//! colours neither of which was in the first-processed pair is classified as
//! themed for both.
//!
//! Separation runs as a background job so it can overlap scheduler rounds;
//! the caller awaits the pending job at the next batch boundary.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::thread::JoinHandle;

use rayon::prelude::*;

use crate::color::ThemeColor;
use crate::sprite::DistinctSprite;
use crate::store::Registry;

/// Result of one background separation job.
enum JobResult {
    Pair {
        first: ThemeColor,
        second: ThemeColor,
        common: Vec<Arc<DistinctSprite>>,
        themed_first: Vec<Arc<DistinctSprite>>,
        themed_second: Vec<Arc<DistinctSprite>>,
    },
    Solo {
        color: ThemeColor,
        themed: Vec<Arc<DistinctSprite>>,
    },
}

/// Incremental common/themed separation across scheduler rounds.
#[derive(Default)]
pub struct Separator {
    common: Vec<Arc<DistinctSprite>>,
    themed: HashMap<ThemeColor, Vec<Arc<DistinctSprite>>>,
    separated: HashSet<ThemeColor>,
    pending: Option<JoinHandle<JobResult>>,
}

impl Separator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sprites shared by at least two complete colour sets, so far.
    pub fn common(&self) -> &[Arc<DistinctSprite>] {
        &self.common
    }

    /// Sprites unique to one colour theme, if that colour has been separated.
    pub fn themed(&self, color: ThemeColor) -> Option<&[Arc<DistinctSprite>]> {
        self.themed.get(&color).map(|v| v.as_slice())
    }

    /// True if any colour pair has been compared yet.
    pub fn started(&self) -> bool {
        !self.separated.is_empty()
    }

    /// Batch-boundary hook: collect the previous job's results, then start
    /// the next one if any colour-complete store is waiting.
    pub fn advance(&mut self, registry: &Registry) {
        self.await_pending();
        if let Some(job) = self.next_job(registry) {
            self.pending = Some(std::thread::spawn(move || job.run()));
        }
    }

    /// Run every remaining separation synchronously. Called once at the end
    /// of the run.
    pub fn finish(&mut self, registry: &Registry) {
        self.await_pending();
        while let Some(job) = self.next_job(registry) {
            let result = job.run();
            self.merge(result);
        }
    }

    /// Wait for the pending background job, if any, and merge its results.
    pub fn await_pending(&mut self) {
        if let Some(handle) = self.pending.take() {
            println!("Waiting for previous common-sprite job");
            match handle.join() {
                Ok(result) => {
                    self.merge(result);
                    println!("Identified {} common sprites", self.common.len());
                }
                Err(_) => eprintln!("Common-sprite job panicked"),
            }
        }
    }

    /// Pick the next separation job, marking its colours as handled.
    fn next_job(&mut self, registry: &Registry) -> Option<SeparationJob> {
        let complete: Vec<_> = registry
            .canonical_stores()
            .into_iter()
            .filter(|(color, store)| store.is_complete() && !self.separated.contains(color))
            .collect();

        if !self.started() {
            // Need two complete stores of different colours to seed the
            // common set
            if complete.len() < 2 {
                return None;
            }
            let (first, store_a) = &complete[0];
            let (second, store_b) = &complete[1];
            println!(
                "{} and {} complete, finding common sprites",
                store_a.describe(),
                store_b.describe()
            );
            self.separated.insert(*first);
            self.separated.insert(*second);
            return Some(SeparationJob::Pair {
                first: *first,
                second: *second,
                sprites_first: store_a.sprites_snapshot(),
                sprites_second: store_b.sprites_snapshot(),
            });
        }

        let (color, store) = complete.first()?;
        println!("{} complete, comparing against common set", store.describe());
        self.separated.insert(*color);
        Some(SeparationJob::Solo {
            color: *color,
            sprites: store.sprites_snapshot(),
            common: self.common.clone(),
        })
    }

    fn merge(&mut self, result: JobResult) {
        match result {
            JobResult::Pair {
                first,
                second,
                common,
                themed_first,
                themed_second,
            } => {
                self.common.extend(common);
                self.themed.insert(first, themed_first);
                self.themed.insert(second, themed_second);
            }
            JobResult::Solo { color, themed } => {
                self.themed.insert(color, themed);
            }
        }
    }
}

/// A unit of separation work, detached from the separator so it can run on a
/// background thread.
enum SeparationJob {
    Pair {
        first: ThemeColor,
        second: ThemeColor,
        sprites_first: Vec<Arc<DistinctSprite>>,
        sprites_second: Vec<Arc<DistinctSprite>>,
    },
    Solo {
        color: ThemeColor,
        sprites: Vec<Arc<DistinctSprite>>,
        common: Vec<Arc<DistinctSprite>>,
    },
}

impl SeparationJob {
    fn run(self) -> JobResult {
        match self {
            SeparationJob::Pair {
                first,
                second,
                sprites_first,
                sprites_second,
            } => {
                let (common, themed_first, themed_second) =
                    split_pair(&sprites_first, &sprites_second);
                JobResult::Pair {
                    first,
                    second,
                    common,
                    themed_first,
                    themed_second,
                }
            }
            SeparationJob::Solo {
                color,
                sprites,
                common,
            } => JobResult::Solo {
                color,
                themed: split_against_common(&sprites, &common),
            },
        }
    }
}

/// Pairwise separation: sprites present in both sets become common; the rest
/// are themed for their own set.
fn split_pair(
    a: &[Arc<DistinctSprite>],
    b: &[Arc<DistinctSprite>],
) -> (
    Vec<Arc<DistinctSprite>>,
    Vec<Arc<DistinctSprite>>,
    Vec<Arc<DistinctSprite>>,
) {
    // For each sprite of A, the index of its match in B, if any
    let matches: Vec<Option<usize>> = a
        .par_iter()
        .map(|s| b.iter().position(|t| s.same_pixels(t)))
        .collect();

    let mut common = Vec::new();
    let mut themed_a = Vec::new();
    let mut matched_in_b: HashSet<usize> = HashSet::new();
    for (sprite, matched) in a.iter().zip(&matches) {
        match matched {
            Some(j) => {
                matched_in_b.insert(*j);
                common.push(Arc::clone(sprite));
            }
            None => themed_a.push(Arc::clone(sprite)),
        }
    }
    let themed_b = b
        .iter()
        .enumerate()
        .filter(|(j, _)| !matched_in_b.contains(j))
        .map(|(_, sprite)| Arc::clone(sprite))
        .collect();

    (common, themed_a, themed_b)
}

/// One-vs-many separation against the accumulated common set.
fn split_against_common(
    sprites: &[Arc<DistinctSprite>],
    common: &[Arc<DistinctSprite>],
) -> Vec<Arc<DistinctSprite>> {
    sprites
        .par_iter()
        .filter(|s| !common.iter().any(|c| s.same_pixels(c)))
        .cloned()
        .collect()
}
