//! User-facing error messages and recovery suggestions for the `daft` CLI.
//!
//! Errors raised anywhere in the workspace reach the binary as
//! `anyhow::Error`. [`ErrorHandler`] turns them into a titled message with
//! numbered suggestions, either from an attached [`EnhancedError`] or by
//! classifying the message text.

use anyhow::Error;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Enhanced error with user-friendly message and recovery suggestions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhancedError {
    pub title: String,
    pub message: String,
    pub suggestions: Vec<String>,
    pub error_type: ErrorType,
    pub context: Option<String>,
}

/// Types of errors for better categorization
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorType {
    /// Missing API key, unreadable settings, logger not started
    Configuration,
    /// Timeouts, connection failures, rate limits, provider outages
    Network,
    /// File access
    Permission,
    /// Malformed model responses, tool protocol errors
    Runtime,
    /// Invalid input
    Validation,
    Unknown,
}

impl EnhancedError {
    pub fn new(
        title: impl Into<String>,
        message: impl Into<String>,
        error_type: ErrorType,
    ) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            suggestions: Vec::new(),
            error_type,
            context: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions.extend(suggestions);
        self
    }

    /// Shown only in verbose mode.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn into_error(self) -> Error {
        Error::new(self)
    }

    /// Format error for display
    pub fn format(&self, verbose: bool, show_suggestions: bool) -> String {
        let mut output = String::new();
        output.push_str(&format!("{}: {}\n", self.error_type.label(), self.title));
        output.push_str(&format!("  {}\n", self.message));

        if verbose && let Some(context) = &self.context {
            output.push_str(&format!("\n  Context: {context}\n"));
        }

        if show_suggestions && !self.suggestions.is_empty() {
            output.push_str("\n  Suggestions:\n");
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                output.push_str(&format!("    {}. {}\n", i + 1, suggestion));
            }
        }

        output
    }
}

impl ErrorType {
    pub fn label(&self) -> &'static str {
        match self {
            ErrorType::Configuration => "config",
            ErrorType::Network => "network",
            ErrorType::Permission => "permission",
            ErrorType::Runtime => "runtime",
            ErrorType::Validation => "input",
            ErrorType::Unknown => "error",
        }
    }
}

impl fmt::Display for EnhancedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format(false, true))
    }
}

impl std::error::Error for EnhancedError {}

/// Error handler for providing user-friendly error messages
pub struct ErrorHandler {
    verbose: bool,
    show_suggestions: bool,
}

impl Default for ErrorHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorHandler {
    pub fn new() -> Self {
        Self {
            verbose: false,
            show_suggestions: true,
        }
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn show_suggestions(mut self, show: bool) -> Self {
        self.show_suggestions = show;
        self
    }

    pub fn handle(&self, error: &Error) -> String {
        if let Some(enhanced) = error.downcast_ref::<EnhancedError>() {
            return enhanced.format(self.verbose, self.show_suggestions);
        }

        // `{:#}` keeps the context chain, e.g. which settings file failed.
        let message = format!("{error:#}");
        let mut enhanced = classify_error(&message);
        if self.verbose {
            let chain: Vec<String> = error.chain().skip(1).map(ToString::to_string).collect();
            if !chain.is_empty() {
                enhanced = enhanced.with_context(chain.join(" <- "));
            }
        }
        enhanced.format(self.verbose, self.show_suggestions)
    }
}

/// Classify error based on message patterns
pub fn classify_error(error_message: &str) -> EnhancedError {
    let lower_error = error_message.to_lowercase();

    if lower_error.contains("logger not active") {
        return EnhancedError::new("History Unavailable", error_message, ErrorType::Configuration)
            .with_suggestions(vec![
                "Start the session logger with daft_start_log".to_string(),
                "Or point DAFT_HISTORY_FILE at an existing transcript".to_string(),
            ]);
    }

    if lower_error.contains("api key") || lower_error.contains("api_key") {
        return EnhancedError::new("Configuration Error", error_message, ErrorType::Configuration)
            .with_suggestions(vec![
                "Set the GOOGLE_API_KEY environment variable".to_string(),
                "Or add llm.api_key to ~/.daft/settings.json".to_string(),
            ]);
    }

    if lower_error.contains("settings") || lower_error.contains("configuration") {
        return EnhancedError::new("Configuration Error", error_message, ErrorType::Configuration)
            .with_suggestions(vec![
                "Check ~/.daft/settings.json is valid JSON".to_string(),
                "Run `daft config` to see the effective configuration".to_string(),
            ]);
    }

    if lower_error.contains("rate limited") {
        return EnhancedError::new("Rate Limited", error_message, ErrorType::Network)
            .with_suggestion("Wait a minute and ask again");
    }

    if lower_error.contains("network")
        || lower_error.contains("timeout")
        || lower_error.contains("timed out")
        || lower_error.contains("connection")
        || lower_error.contains("dns")
        || lower_error.contains("server error")
    {
        return EnhancedError::new("Network Error", error_message, ErrorType::Network)
            .with_suggestions(vec![
                "Check your internet connection".to_string(),
                "Verify llm.endpoint (or DAFT_ENDPOINT) is reachable".to_string(),
                "Try again in a few moments".to_string(),
            ]);
    }

    if lower_error.contains("permission denied") || lower_error.contains("access is denied") {
        return EnhancedError::new("Permission Error", error_message, ErrorType::Permission)
            .with_suggestion("Check file permissions");
    }

    if lower_error.contains("unknown tool")
        || lower_error.contains("invalid arguments")
        || lower_error.contains("unexpected response")
        || lower_error.contains("turn limit")
    {
        return EnhancedError::new("AI Protocol Error", error_message, ErrorType::Runtime)
            .with_suggestion("Ask again; the model may answer differently");
    }

    EnhancedError::new("Error", error_message, ErrorType::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, anyhow};

    #[test]
    fn formats_title_message_and_numbered_suggestions() {
        let error = EnhancedError::new("Test Error", "Something went wrong", ErrorType::Runtime)
            .with_suggestion("Try again")
            .with_suggestion("Check the log");

        let formatted = error.format(false, true);
        assert!(formatted.starts_with("runtime: Test Error\n"));
        assert!(formatted.contains("  Something went wrong\n"));
        assert!(formatted.contains("    2. Check the log"));
        assert!(!error.format(false, false).contains("Suggestions:"));
    }

    #[test]
    fn classifies_missing_key_as_configuration() {
        let handler = ErrorHandler::new();
        let error = anyhow!("GOOGLE_API_KEY not set and llm.api_key is empty");
        let output = handler.handle(&error);
        assert!(output.contains("Configuration Error"));
        assert!(output.contains("GOOGLE_API_KEY environment variable"));
    }

    #[test]
    fn classifies_logger_not_active() {
        let output = ErrorHandler::new().handle(&anyhow!(
            "Logger not active (DAFT_HISTORY_FILE not set). Start it with daft_start_log."
        ));
        assert!(output.contains("History Unavailable"));
    }

    #[test]
    fn classifies_network_failures() {
        let enhanced = classify_error("Request timed out after 120s");
        assert_eq!(enhanced.error_type, ErrorType::Network);
        let enhanced = classify_error("Rate limited (HTTP 429) after 3 attempts");
        assert_eq!(enhanced.title, "Rate Limited");
    }

    #[test]
    fn keeps_context_chain_in_message() {
        let error = Err::<(), _>(anyhow!("expected value at line 1"))
            .context("failed to parse settings file /tmp/s.json")
            .expect_err("error");
        let output = ErrorHandler::new().verbose(true).handle(&error);
        assert!(output.contains("failed to parse settings file /tmp/s.json: expected value"));
        assert!(output.contains("Context: expected value at line 1"));
    }

    #[test]
    fn into_error_preserves_enhanced_type() {
        let error = EnhancedError::new(
            "Question Too Long",
            "Your question is too long. Please limit it to 150 characters.",
            ErrorType::Validation,
        )
        .into_error();
        let output = ErrorHandler::new().handle(&error);
        assert!(output.contains("Question Too Long"));
        assert!(output.contains("limit it to 150 characters"));
    }
}
