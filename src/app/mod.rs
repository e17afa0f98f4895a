// PlateauLab - app/mod.rs
//
// Application layer: the build, parse and fetch steps plus parser loading.
// Dependencies: core, platform, util.

pub mod build_step;
pub mod fetch_step;
pub mod parse_step;
pub mod parser_mgr;
