use anyhow::Result;
use daft_core::AppConfig;
use daft_observe::Observer;
use std::path::Path;
use std::sync::Arc;

pub(crate) struct CliContext {
    pub cfg: AppConfig,
    pub observer: Arc<Observer>,
    pub json: bool,
}

impl CliContext {
    pub(crate) fn load(settings: Option<&Path>, json: bool, verbose: bool) -> Result<Self> {
        let cfg = AppConfig::load(settings)?;
        // An unwritable log location must not stop the command.
        let mut observer = match Observer::new(&cfg.observe) {
            Ok(observer) => observer,
            Err(_) => Observer::with_log_path(std::env::temp_dir().join("daft-observe.log"))?,
        };
        observer.set_verbose(verbose);
        observer.verbose_log(&format!(
            "model={} endpoint={} log={}",
            cfg.llm.model,
            cfg.llm.endpoint,
            observer.log_path().display()
        ));
        Ok(Self {
            cfg,
            observer: Arc::new(observer),
            json,
        })
    }
}
