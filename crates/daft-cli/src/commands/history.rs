use anyhow::Result;
use daft_memory::{HistoryReader, select_recent, select_recent_blocks};
use serde_json::json;
use std::process::ExitCode;

use crate::HistoryArgs;
use crate::context::CliContext;
use crate::output::print_json;

pub(crate) fn run_history(ctx: &CliContext, args: HistoryArgs) -> Result<ExitCode> {
    let reader = HistoryReader::from_config(&ctx.cfg.history);
    let blocks = reader.blocks()?;
    ctx.observer.verbose_log(&format!(
        "history: {} blocks in {}",
        blocks.len(),
        reader
            .path()
            .map(|path| path.display().to_string())
            .unwrap_or_default()
    ));
    let context = select_recent(&blocks, args.count);
    if ctx.json {
        print_json(&json!({
            "file": reader.path(),
            "requested": args.count,
            "blocks": select_recent_blocks(&blocks, args.count),
            "context": context,
        }))?;
    } else {
        println!("{context}");
    }
    Ok(ExitCode::SUCCESS)
}
