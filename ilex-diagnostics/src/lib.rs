//! Diagnostic data model and sink for the semantic analysis engine.
//!
//! Spans, severities, and the formatted-for-a-terminal `Diagnostic` type
//! are the sole observability surface of this layer — there is no
//! separate logging facility, matching how the rest of this workspace
//! is structured.

use colored::Colorize;
use std::fmt;

/// Source code location (line, column, file).
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub length: usize,
}

impl Span {
    pub fn new(file: String, line: usize, column: usize, length: usize) -> Self {
        Self {
            file,
            line,
            column,
            length,
        }
    }

    pub fn from_file_and_span(file: &str, source: &str, span: std::ops::Range<usize>) -> Self {
        let before = &source[..span.start];
        let line = before.chars().filter(|&c| c == '\n').count() + 1;
        let column = before
            .rfind('\n')
            .map_or(before.len() + 1, |pos| before.len() - pos);
        let length = span.end.saturating_sub(span.start).max(1);

        Self {
            file: file.to_string(),
            line,
            column,
            length,
        }
    }

    pub fn unknown() -> Self {
        Self {
            file: "<unknown>".to_string(),
            line: 0,
            column: 0,
            length: 0,
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorLevel {
    Error,
    Warning,
    Info,
    Note,
    Help,
}

impl fmt::Display for ErrorLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorLevel::Error => write!(f, "{}", "error".red().bold()),
            ErrorLevel::Warning => write!(f, "{}", "warning".yellow().bold()),
            ErrorLevel::Info => write!(f, "{}", "info".blue().bold()),
            ErrorLevel::Note => write!(f, "{}", "note".cyan().bold()),
            ErrorLevel::Help => write!(f, "{}", "help".green().bold()),
        }
    }
}

/// Every diagnostic kind the semantic checker can raise (§7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    Redeclaration,
    UnknownIdentifier,
    UninitializedReference,
    TypeMismatch,
    UnsupportedOperand,
    IllegalMutableStatic,
    DuplicateOneofVariant,
    ImmutabilityViolation,
    BlockingMismatch,
    MissingContractImpl,
    ArityMismatch,
    GenericInferenceFailure,
    UnusedSymbol,
    InternalError,
}

impl DiagnosticKind {
    pub fn code(self) -> &'static str {
        use error_codes::*;
        match self {
            DiagnosticKind::Redeclaration => REDECLARATION,
            DiagnosticKind::UnknownIdentifier => UNDEFINED_VARIABLE,
            DiagnosticKind::UninitializedReference => UNINITIALIZED_REFERENCE,
            DiagnosticKind::TypeMismatch => TYPE_MISMATCH,
            DiagnosticKind::UnsupportedOperand => UNSUPPORTED_OPERAND,
            DiagnosticKind::IllegalMutableStatic => ILLEGAL_MUTABLE_STATIC,
            DiagnosticKind::DuplicateOneofVariant => DUPLICATE_ONEOF_VARIANT,
            DiagnosticKind::ImmutabilityViolation => IMMUTABILITY_VIOLATION,
            DiagnosticKind::BlockingMismatch => BLOCKING_MISMATCH,
            DiagnosticKind::MissingContractImpl => MISSING_CONTRACT_IMPL,
            DiagnosticKind::ArityMismatch => ARGUMENT_COUNT,
            DiagnosticKind::GenericInferenceFailure => GENERIC_INFERENCE_FAILURE,
            DiagnosticKind::UnusedSymbol => UNUSED_VARIABLE,
            DiagnosticKind::InternalError => INTERNAL_ERROR,
        }
    }

    /// Unused-symbol diagnostics are the only kind §3.2 downgrades to a
    /// warning (struct/immutable-struct bindings); everything else is
    /// a hard error.
    pub fn default_level(self) -> ErrorLevel {
        match self {
            DiagnosticKind::UnusedSymbol => ErrorLevel::Warning,
            _ => ErrorLevel::Error,
        }
    }
}

/// Structured diagnostic message.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub level: ErrorLevel,
    pub code: String,
    pub message: String,
    pub span: Span,
    pub notes: Vec<String>,
    pub help: Option<String>,
    pub suggestion: Option<Suggestion>,
}

/// Code suggestion with replacement.
#[derive(Debug, Clone)]
pub struct Suggestion {
    pub message: String,
    pub replacement: String,
    pub span: Span,
}

impl Diagnostic {
    pub fn new(level: ErrorLevel, code: &str, message: String, span: Span) -> Self {
        Self {
            level,
            code: code.to_string(),
            message,
            span,
            notes: Vec::new(),
            help: None,
            suggestion: None,
        }
    }

    pub fn error(code: &str, message: String, span: Span) -> Self {
        Self::new(ErrorLevel::Error, code, message, span)
    }

    pub fn warning(code: &str, message: String, span: Span) -> Self {
        Self::new(ErrorLevel::Warning, code, message, span)
    }

    pub fn info(code: &str, message: String, span: Span) -> Self {
        Self::new(ErrorLevel::Info, code, message, span)
    }

    /// Build a diagnostic straight from its `DiagnosticKind`, picking the
    /// kind's code and default severity.
    pub fn of_kind(kind: DiagnosticKind, message: String, span: Span) -> Self {
        Self::new(kind.default_level(), kind.code(), message, span)
    }

    pub fn with_note(mut self, note: String) -> Self {
        self.notes.push(note);
        self
    }

    pub fn with_help(mut self, help: String) -> Self {
        self.help = Some(help);
        self
    }

    pub fn with_suggestion(mut self, message: String, replacement: String, span: Span) -> Self {
        self.suggestion = Some(Suggestion {
            message,
            replacement,
            span,
        });
        self
    }

    /// Format diagnostic in Rust-style, with a source snippet.
    pub fn format(&self, source_code: &str) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "{}[{}]: {}\n",
            self.level,
            self.code,
            self.message.bold()
        ));

        output.push_str(&format!(
            " {} {}:{}:{}\n",
            "-->".cyan().bold(),
            self.span.file,
            self.span.line,
            self.span.column
        ));

        if let Some(snippet) = self.get_source_snippet(source_code) {
            output.push_str(&snippet);
        }

        for note in &self.notes {
            output.push_str(&format!(" {} {}\n", "=".cyan().bold(), note.cyan()));
        }

        if let Some(help) = &self.help {
            output.push_str(&format!(" {} {}\n", "help:".green().bold(), help));
        }

        if let Some(suggestion) = &self.suggestion {
            output.push_str(&format!(
                " {} {}\n",
                "help:".green().bold(),
                suggestion.message
            ));
            if let Some(suggested_snippet) = self.get_suggestion_snippet(source_code) {
                output.push_str(&suggested_snippet);
            }
        }

        output
    }

    fn format_simple(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "{}[{}]: {}\n",
            self.level,
            self.code,
            self.message.bold()
        ));

        output.push_str(&format!(
            " {} {}:{}:{}\n",
            "-->".cyan().bold(),
            self.span.file,
            self.span.line,
            self.span.column
        ));

        for note in &self.notes {
            output.push_str(&format!(" {} {}\n", "=".cyan().bold(), note.cyan()));
        }

        if let Some(help) = &self.help {
            output.push_str(&format!(" {} {}\n", "help:".green().bold(), help));
        }

        output
    }

    fn get_source_snippet(&self, source_code: &str) -> Option<String> {
        let lines: Vec<&str> = source_code.lines().collect();

        if self.span.line == 0 || self.span.line > lines.len() {
            return None;
        }

        let line_idx = self.span.line - 1;
        let line = lines[line_idx];

        let mut snippet = String::new();
        let line_num_width = self.span.line.to_string().len().max(2);

        snippet.push_str(&format!(" {}\n", " ".repeat(line_num_width + 1).cyan()));
        snippet.push_str(&format!(
            " {} {} {}\n",
            format!("{:>width$}", self.span.line, width = line_num_width)
                .cyan()
                .bold(),
            "|".cyan().bold(),
            line
        ));

        let padding = " ".repeat(line_num_width + 3 + self.span.column.saturating_sub(1));
        let underline = "^".repeat(self.span.length.max(1));
        snippet.push_str(&format!(
            " {} {}{}\n",
            " ".repeat(line_num_width + 1).cyan(),
            padding,
            underline.red().bold()
        ));

        Some(snippet)
    }

    fn get_suggestion_snippet(&self, source_code: &str) -> Option<String> {
        let suggestion = self.suggestion.as_ref()?;
        let lines: Vec<&str> = source_code.lines().collect();

        if suggestion.span.line == 0 || suggestion.span.line > lines.len() {
            return None;
        }

        let line_idx = suggestion.span.line - 1;
        let line = lines[line_idx];

        let mut snippet = String::new();
        let line_num_width = suggestion.span.line.to_string().len().max(2);
        let col = suggestion.span.column.saturating_sub(1);
        let before = line.get(..col).unwrap_or(line);
        let after = line.get(col + suggestion.span.length..).unwrap_or("");
        let modified_line = format!("{}{}{}", before, &suggestion.replacement, after);

        snippet.push_str(&format!(
            " {} {}\n",
            format!("{:>width$}", suggestion.span.line, width = line_num_width)
                .cyan()
                .bold(),
            "| ".cyan().bold()
        ));
        snippet.push_str(&format!(
            " {} {}\n",
            " ".repeat(line_num_width + 1).cyan(),
            modified_line
        ));

        let padding = " ".repeat(line_num_width + 3 + col);
        let indicator = "+".repeat(suggestion.replacement.len());
        snippet.push_str(&format!(
            " {} {}{}\n",
            " ".repeat(line_num_width + 1).cyan(),
            padding,
            indicator.green().bold()
        ));

        Some(snippet)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

/// A type error awaiting an emitter class name, per §4.5 ("parameterized
/// by the emitter class name supplied at flush time").
pub type TypeErrorThunk = Box<dyn FnOnce(&str) -> Diagnostic + Send>;

/// The three-queue diagnostic accumulator (C5).
///
/// Parser errors and misc errors are plain, already-formed diagnostics;
/// type errors are deferred closures so the checker can record an error
/// before the final "emitter" identity (e.g. the enclosing module name)
/// is known. `flush_all` drains all three queues in order and is the
/// only way to observe their contents, matching §4.5's "collected, not
/// thrown" policy.
#[derive(Default)]
pub struct DiagnosticSink {
    parser_errors: Vec<Diagnostic>,
    type_errors: Vec<TypeErrorThunk>,
    misc_errors: Vec<Diagnostic>,
}

impl fmt::Debug for DiagnosticSink {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("DiagnosticSink")
            .field("parser_errors", &self.parser_errors)
            .field("type_errors", &self.type_errors.len())
            .field("misc_errors", &self.misc_errors)
            .finish()
    }
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_parser_error(&mut self, diagnostic: Diagnostic) {
        self.parser_errors.push(diagnostic);
    }

    pub fn record_type_error<F>(&mut self, emit: F)
    where
        F: FnOnce(&str) -> Diagnostic + Send + 'static,
    {
        self.type_errors.push(Box::new(emit));
    }

    /// Convenience for the common case: a type error that doesn't need
    /// the emitter name in its message.
    pub fn record_type_diagnostic(&mut self, diagnostic: Diagnostic) {
        self.record_type_error(move |_emitter| diagnostic);
    }

    pub fn record_misc_error(&mut self, diagnostic: Diagnostic) {
        self.misc_errors.push(diagnostic);
    }

    /// True iff every queue is empty.
    pub fn is_clean(&self) -> bool {
        self.parser_errors.is_empty() && self.type_errors.is_empty() && self.misc_errors.is_empty()
    }

    /// Process exit status per §6/§7: non-zero iff any queue is non-empty.
    pub fn exit_code(&self) -> i32 {
        i32::from(!self.is_clean())
    }

    /// Drain all three queues, in order, resolving type-error thunks
    /// against `emitter`.
    pub fn flush_all(&mut self, emitter: &str) -> Vec<Diagnostic> {
        let mut out = Vec::with_capacity(
            self.parser_errors.len() + self.type_errors.len() + self.misc_errors.len(),
        );
        out.append(&mut self.parser_errors);
        for thunk in self.type_errors.drain(..) {
            out.push(thunk(emitter));
        }
        out.append(&mut self.misc_errors);
        out
    }

    /// Reset all queues so the sink can be reused for a new compilation
    /// run within the same process (§5).
    pub fn clear(&mut self) {
        self.parser_errors.clear();
        self.type_errors.clear();
        self.misc_errors.clear();
    }
}

/// Diagnostic codes, grouped by the scheme the pack's Rust-style
/// compilers use.
pub mod error_codes {
    pub const SYNTAX_ERROR: &str = "E0001";
    pub const TYPE_MISMATCH: &str = "E0308";
    pub const ARGUMENT_COUNT: &str = "E0061";
    pub const UNDEFINED_VARIABLE: &str = "E0425";
    pub const DUPLICATE_DEFINITION: &str = "E0428";

    // Semantic-analysis-specific codes (E1000 range).
    pub const REDECLARATION: &str = "E1001";
    pub const UNINITIALIZED_REFERENCE: &str = "E1002";
    pub const UNSUPPORTED_OPERAND: &str = "E1003";
    pub const ILLEGAL_MUTABLE_STATIC: &str = "E1004";
    pub const DUPLICATE_ONEOF_VARIANT: &str = "E1005";
    pub const IMMUTABILITY_VIOLATION: &str = "E1006";
    pub const BLOCKING_MISMATCH: &str = "E1007";
    pub const MISSING_CONTRACT_IMPL: &str = "E1008";
    pub const GENERIC_INFERENCE_FAILURE: &str = "E1009";
    pub const INTERNAL_ERROR: &str = "E1099";

    pub const UNUSED_VARIABLE: &str = "W0001";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_format() {
        let source = "x := 1;\ny := x + \"oops\";\n";
        let span = Span::new("main.ilex".to_string(), 2, 6, 8);
        let diag = Diagnostic::of_kind(
            DiagnosticKind::TypeMismatch,
            "mismatched types".to_string(),
            span,
        )
        .with_note("expected `int`, found `string`".to_string());

        let formatted = diag.format(source);
        assert!(formatted.contains("error[E0308]"));
        assert!(formatted.contains("main.ilex:2:6"));
    }

    #[test]
    fn test_unused_symbol_is_a_warning() {
        let diag = Diagnostic::of_kind(
            DiagnosticKind::UnusedSymbol,
            "unused symbol `x`".to_string(),
            Span::unknown(),
        );
        assert_eq!(diag.level, ErrorLevel::Warning);
        assert_eq!(diag.code, error_codes::UNUSED_VARIABLE);
    }

    #[test]
    fn test_sink_exit_code_and_flush_order() {
        let mut sink = DiagnosticSink::new();
        assert_eq!(sink.exit_code(), 0);

        sink.record_parser_error(Diagnostic::error(
            "E0001",
            "bad token".to_string(),
            Span::unknown(),
        ));
        sink.record_type_error(|emitter| {
            Diagnostic::error(
                "E1001",
                format!("redeclaration reported by {emitter}"),
                Span::unknown(),
            )
        });
        sink.record_misc_error(Diagnostic::error(
            "E1099",
            "internal note".to_string(),
            Span::unknown(),
        ));

        assert_eq!(sink.exit_code(), 1);

        let flushed = sink.flush_all("checker");
        assert_eq!(flushed.len(), 3);
        assert!(flushed[0].message.contains("bad token"));
        assert!(flushed[1].message.contains("redeclaration reported by checker"));
        assert!(flushed[2].message.contains("internal note"));

        // Queues are drained, not merely observed.
        assert!(sink.is_clean());
    }

    #[test]
    fn test_clear_resets_for_reuse() {
        let mut sink = DiagnosticSink::new();
        sink.record_misc_error(Diagnostic::error("E1099", "x".to_string(), Span::unknown()));
        sink.clear();
        assert!(sink.is_clean());
    }
}

/// Fuzzy matching utilities for "did you mean?" suggestions.
pub mod fuzzy {
    use strsim::jaro_winkler;

    /// Find similar names using Jaro-Winkler distance. Returns up to
    /// `max_suggestions` names scoring above `threshold`.
    pub fn find_similar_names(
        target: &str,
        candidates: &[String],
        threshold: f64,
        max_suggestions: usize,
    ) -> Vec<String> {
        let mut scored: Vec<(String, f64)> = candidates
            .iter()
            .map(|candidate| (candidate.clone(), jaro_winkler(target, candidate)))
            .filter(|(_, score)| *score > threshold)
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        scored
            .into_iter()
            .take(max_suggestions)
            .map(|(name, _)| name)
            .collect()
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_find_similar_names() {
            let candidates = vec!["foo_bar".to_string(), "baz".to_string()];
            let suggestions = find_similar_names("foo_baz", &candidates, 0.7, 3);
            assert_eq!(suggestions, vec!["foo_bar".to_string()]);
        }
    }
}
