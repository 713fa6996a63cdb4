//! Pairwise unit merging
//!
//! Finds unit pairs whose templates describe the same source discovered twice
//! under different time alignment, confirms each candidate with a joint
//! clustering test, and applies the resulting merges transitively.
//!
//! - tester.rs: joint-cloud merge test (reduce, cluster, single-cluster check)
//! - engine.rs: candidate scan, merge application, resort, dedup

pub mod engine;
pub mod tester;

pub use engine::{MergeOutcome, MergeRecord, PairwiseMerger};
pub use tester::test_merge;
