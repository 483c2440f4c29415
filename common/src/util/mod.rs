pub mod check;
pub mod config;
pub mod generator;
pub mod hash;
pub mod logger;
pub mod profiler;
pub mod visualization;
