use anyhow::Result;
use daft_core::AppConfig;
use serde_json::json;
use std::process::ExitCode;

use crate::context::CliContext;
use crate::output::{print_json, redact_config_for_display};

pub(crate) fn run_config(ctx: &CliContext) -> Result<ExitCode> {
    let display_cfg = redact_config_for_display(&ctx.cfg)?;
    if ctx.json {
        print_json(&json!({
            "settings_path": AppConfig::user_settings_path(),
            "log_file": ctx.observer.log_path(),
            "config": display_cfg,
        }))?;
    } else {
        if let Some(path) = AppConfig::user_settings_path() {
            println!("# settings: {}", path.display());
        }
        println!("{}", serde_json::to_string_pretty(&display_cfg)?);
    }
    Ok(ExitCode::SUCCESS)
}
