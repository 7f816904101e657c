//! Study artifact output.

pub mod export;
