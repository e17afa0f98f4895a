// PlateauLab - core/mod.rs
//
// Core logic layer.
// Must NOT depend on: app, platform, or read/write files (discovery reads
// metadata only).

pub mod discovery;
pub mod experiment;
pub mod export;
pub mod extract;
pub mod model;
pub mod pattern;
pub mod report;
