use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::plan::InstallAction;

/// Action given to DIFF and EQUAL components that have none
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConflictStrategy {
    Skip,
    Override,
}

impl From<ConflictStrategy> for InstallAction {
    fn from(strategy: ConflictStrategy) -> Self {
        match strategy {
            ConflictStrategy::Skip => InstallAction::Skip,
            ConflictStrategy::Override => InstallAction::Override,
        }
    }
}

/// Arguments for the check-plan command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Check a plan:\n    bundlegate check-plan plan.json\n\n\
                  Fill in missing actions first:\n    bundlegate check-plan plan.yaml --fill-missing skip")]
pub struct CheckPlanArgs {
    /// Install plan file (.json, or YAML otherwise)
    pub file: PathBuf,

    /// Default missing actions before checking (NEW components get CREATE)
    #[arg(long, value_enum)]
    pub fill_missing: Option<ConflictStrategy>,
}
