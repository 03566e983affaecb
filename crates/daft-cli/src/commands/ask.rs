use anyhow::Result;
use daft_agent::{
    AgentLoop, AgentLoopConfig, CommandExecutor, CommandStatus, EventCallback, MemoryChoice,
    assemble_prompt, large_memory_question, needs_memory_choice, validate_question,
};
use daft_core::{AppConfig, EventKind};
use daft_llm::OpenAiCompatClient;
use daft_memory::HistoryReader;
use daft_observe::Observer;
use daft_policy::PolicyEngine;
use daft_tools::{LocalToolHost, PlatformShellRunner, directory_listing};
use daft_ui::{StdioTerminal, Terminal, ask_line};
use std::process::ExitCode;
use std::sync::Arc;
use uuid::Uuid;

use crate::AskArgs;
use crate::context::CliContext;

pub(crate) fn run_ask(ctx: &CliContext, args: AskArgs) -> Result<ExitCode> {
    let cfg = &ctx.cfg;
    let mut term = StdioTerminal::new();
    let question = args.prompt.join(" ");
    if let Err(err) = validate_question(&question, cfg.agent.max_question_chars) {
        term.write_line(&format!("DAFT: {err}"))?;
        return Ok(ExitCode::FAILURE);
    }

    let memory = match args.memory {
        Some(count) => load_memory(cfg, &ctx.observer, &mut term, count)?,
        None => None,
    };

    let listing = if args.list {
        let cwd = std::env::current_dir()?;
        match directory_listing(&cwd) {
            Ok(listing) => Some(listing.to_prompt()),
            Err(err) => {
                term.write_line(&format!("DAFT: Error getting file list: {err:#}"))?;
                None
            }
        }
    } else {
        None
    };

    let prompt = assemble_prompt(&question, memory.as_deref(), listing.as_deref());
    ctx.observer
        .verbose_log(&format!("prompt: {} characters", prompt.chars().count()));

    let session_id = Uuid::now_v7();
    let events = event_recorder(ctx.observer.clone(), session_id);
    events(EventKind::SessionStartedV1 {
        model: cfg.llm.model.clone(),
    });

    let llm = OpenAiCompatClient::new(cfg.llm.clone())?;
    let mut agent = AgentLoop::new(
        &llm,
        Arc::new(LocalToolHost::new()),
        PolicyEngine::new(&cfg.policy),
        AgentLoopConfig::from_config(cfg),
    );
    agent.set_event_callback(events.clone());
    let outcome = agent.run(&mut term, &prompt)?;

    let runner = PlatformShellRunner;
    let mut executor = CommandExecutor::new(&runner);
    executor.set_event_callback(events);
    let reports = executor.run(&mut term, outcome.proposed())?;
    let failed = reports
        .iter()
        .filter(|report| matches!(report.status, CommandStatus::Failed { .. }))
        .count();
    ctx.observer.verbose_log(&format!(
        "session {session_id}: {} proposed, {failed} failed to start",
        reports.len()
    ));
    Ok(ExitCode::SUCCESS)
}

/// Recent history, after the large-memory question if it applies. Problems
/// reading the log are reported and the question goes out without memory.
fn load_memory(
    cfg: &AppConfig,
    observer: &Observer,
    term: &mut dyn Terminal,
    count: usize,
) -> Result<Option<String>> {
    let reader = HistoryReader::from_config(&cfg.history);
    let memory = match reader.recent_blocks(count) {
        Ok(memory) => memory,
        Err(err) => {
            term.write_line(&format!("DAFT Error: {err}"))?;
            observer.warn_log(&format!("history unavailable: {err}"));
            return Ok(None);
        }
    };

    let threshold = cfg.history.large_memory_chars;
    if !needs_memory_choice(&memory, threshold) {
        return Ok(Some(memory));
    }
    term.write_line(&format!(
        "Warning: The memory context is large ({} characters).",
        memory.chars().count()
    ))?;
    let choice = MemoryChoice::from_answer(&ask_line(term, &large_memory_question(threshold))?);
    if choice == MemoryChoice::Invalid {
        term.write_line("Invalid input. Skipping memory.")?;
    }
    Ok(choice.apply(&memory, threshold))
}

fn event_recorder(observer: Arc<Observer>, session_id: Uuid) -> EventCallback {
    Arc::new(move |kind| {
        if let Err(err) = observer.record(session_id, kind) {
            observer.verbose_log(&format!("failed to record event: {err:#}"));
        }
    })
}
