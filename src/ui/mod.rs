//! Terminal presentation layer
//!
//! Human-readable rendering of inspection results, image references, tag
//! lists and install plans, styled with `console`.

pub mod display;
