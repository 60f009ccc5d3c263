//! mapatlas - Library for extracting sprite atlases from map-editor
//! screenshots
//!
//! This library provides functionality to:
//! - Scan batches of screenshots in adaptively-sized concurrent rounds
//! - Deduplicate 64x64 sprite tiles into per-colour-theme sets
//! - Separate sprites shared across themes from theme-unique ones
//! - Pack sprite sets into near-square composite atlas images

pub mod atlas;
pub mod batch;
pub mod cli;
pub mod color;
pub mod detect;
pub mod diag;
pub mod extract;
pub mod output;
pub mod separate;
pub mod sprite;
pub mod store;
