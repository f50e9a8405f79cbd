pub mod bench;
pub mod benches;
pub mod cache;
pub mod chart;
pub mod config;
pub mod extract;
pub mod manifest;
pub mod range;
pub mod runner;
pub mod series;
pub mod stats;
pub mod util;
