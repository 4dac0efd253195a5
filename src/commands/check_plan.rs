//! Check-plan command implementation

use crate::cli::CheckPlanArgs;
use crate::error::Result;
use crate::plan::{InstallPlan, validate_install_plan};
use crate::ui::display;

pub fn run(args: CheckPlanArgs) -> Result<()> {
    let mut plan = InstallPlan::from_file(&args.file)?;
    if let Some(strategy) = args.fill_missing {
        plan.fill_missing_actions(strategy.into())?;
    }
    validate_install_plan(Some(&plan))?;
    display::display_plan(&plan);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::plan::ConflictStrategy;
    use tempfile::TempDir;

    fn write_plan(content: &str, name: &str) -> (TempDir, std::path::PathBuf) {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(name);
        std::fs::write(&path, content).unwrap();
        (temp, path)
    }

    #[test]
    fn test_valid_json_plan() {
        let (_temp, file) = write_plan(
            r#"{"widgets": {"banner": {"status": "NEW", "action": "CREATE"}}}"#,
            "plan.json",
        );
        assert!(run(CheckPlanArgs { file, fill_missing: None }).is_ok());
    }

    #[test]
    fn test_missing_actions_need_fill() {
        let (_temp, file) = write_plan("pages:\n  home:\n    status: DIFF\n", "plan.yaml");
        assert!(
            run(CheckPlanArgs {
                file: file.clone(),
                fill_missing: None
            })
            .is_err()
        );
        assert!(
            run(CheckPlanArgs {
                file,
                fill_missing: Some(ConflictStrategy::Override)
            })
            .is_ok()
        );
    }
}
