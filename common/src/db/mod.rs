pub mod core;
pub mod delay;
pub mod indices;
