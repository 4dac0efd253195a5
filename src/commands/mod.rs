//! Command implementations for the bundlegate CLI

pub mod check_plan;
pub mod completions;
pub mod fetch;
pub mod helpers;
pub mod image;
pub mod inspect;
pub mod tags;
pub mod version;
