use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
}

/// Reportable conditions that never abort a conversion on their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticCode {
    /// A font tier was unavailable and resolution moved to the next one.
    FontTierFallback,
    /// A decoration fell back from the named CJK font to the default font.
    DecorationFontFallback,
    /// A decoration could not obtain any font and skipped the page.
    DecorationSkipped,
    /// The intermediate artifact could not be deleted.
    ResourceCleanupWarning,
    /// Pipeline state transition.
    StateTransition,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticCode::FontTierFallback => "font.tier_fallback",
            DiagnosticCode::DecorationFontFallback => "decoration.font_fallback",
            DiagnosticCode::DecorationSkipped => "decoration.skipped",
            DiagnosticCode::ResourceCleanupWarning => "resource.cleanup_warning",
            DiagnosticCode::StateTransition => "pipeline.state",
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: DiagnosticCode,
    pub message: String,
}

impl Diagnostic {
    pub fn new(severity: Severity, code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
        }
    }

    pub fn warning(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, code, message)
    }

    pub fn error(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, message)
    }

    pub fn debug(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Debug, code, message)
    }
}

/// Sink for conversion diagnostics. Shared across the pipeline, the font
/// resolver and every decoration handler of one converter.
pub trait Diagnostics: Send + Sync {
    fn report(&self, diagnostic: Diagnostic);
}

/// Forwards diagnostics to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDiagnostics;

pub(crate) const LOG_TARGET: &str = "markpress";

impl Diagnostics for LogDiagnostics {
    fn report(&self, diagnostic: Diagnostic) {
        let Diagnostic {
            severity,
            code,
            message,
        } = diagnostic;
        match severity {
            Severity::Debug => log::debug!(target: LOG_TARGET, "[{code}] {message}"),
            Severity::Info => log::info!(target: LOG_TARGET, "[{code}] {message}"),
            Severity::Warning => log::warn!(target: LOG_TARGET, "[{code}] {message}"),
            Severity::Error => log::error!(target: LOG_TARGET, "[{code}] {message}"),
        }
    }
}

/// Keeps every diagnostic in memory along with per-code counters.
#[derive(Clone, Default)]
pub struct RecordingDiagnostics {
    inner: Arc<Mutex<RecordingState>>,
}

#[derive(Default)]
struct RecordingState {
    events: Vec<Diagnostic>,
    counters: HashMap<DiagnosticCode, u64>,
}

impl RecordingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Diagnostic> {
        match self.inner.lock() {
            Ok(state) => state.events.clone(),
            Err(_) => Vec::new(),
        }
    }

    pub fn count(&self, code: DiagnosticCode) -> u64 {
        match self.inner.lock() {
            Ok(state) => state.counters.get(&code).copied().unwrap_or(0),
            Err(_) => 0,
        }
    }

    pub fn messages(&self, code: DiagnosticCode) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|d| d.code == code)
            .map(|d| d.message)
            .collect()
    }

    /// Sorted `code=count` pairs, handy for a one-line summary.
    pub fn summary(&self) -> String {
        let Ok(state) = self.inner.lock() else {
            return String::new();
        };
        let mut counters: Vec<(&'static str, u64)> = state
            .counters
            .iter()
            .map(|(code, count)| (code.as_str(), *count))
            .collect();
        counters.sort_by(|a, b| a.0.cmp(b.0));
        counters
            .iter()
            .map(|(code, count)| format!("{code}={count}"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Diagnostics for RecordingDiagnostics {
    fn report(&self, diagnostic: Diagnostic) {
        if let Ok(mut state) = self.inner.lock() {
            let entry = state.counters.entry(diagnostic.code).or_insert(0);
            *entry = entry.saturating_add(1);
            state.events.push(diagnostic);
        }
    }
}
