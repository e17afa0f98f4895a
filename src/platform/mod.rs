// PlateauLab - platform/mod.rs
//
// Platform abstraction layer.
// Dependencies: standard library, directories, memmap2.
// Must NOT depend on: core, app.

pub mod config;
pub mod env;
pub mod fs;
