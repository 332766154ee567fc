//! Repodata archive input

pub mod extract;
