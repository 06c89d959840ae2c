//! Diagnostic values and their collection

use tower_lsp::lsp_types::{self, DiagnosticSeverity, Position, Range};

use crate::document::TextIndex;
use crate::parser::Span;

/// Severity class of a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    Error,
    Warning,
    Info,
}

/// A problem found in a document, positioned by UTF-16 offsets
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub pos: Span,
}

impl Diagnostic {
    /// Convert to an LSP diagnostic against the text the offsets refer to
    pub fn to_lsp(&self, index: &TextIndex<'_>) -> lsp_types::Diagnostic {
        let (start_line, start_character) = index.position(self.pos.start);
        let (end_line, end_character) = index.position(self.pos.end);

        lsp_types::Diagnostic {
            range: Range {
                start: Position {
                    line: start_line,
                    character: start_character,
                },
                end: Position {
                    line: end_line,
                    character: end_character,
                },
            },
            severity: Some(match self.kind {
                DiagnosticKind::Error => DiagnosticSeverity::ERROR,
                DiagnosticKind::Warning => DiagnosticSeverity::WARNING,
                DiagnosticKind::Info => DiagnosticSeverity::INFORMATION,
            }),
            code: None,
            code_description: None,
            source: Some("actions-yaml-lsp".to_string()),
            message: self.message.clone(),
            related_information: None,
            tags: None,
            data: None,
        }
    }
}

/// Collects diagnostics during parsing and validation
#[derive(Debug, Default)]
pub struct DiagnosticCollector {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticCollector {
    /// Create a new empty collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a YAML syntax error diagnostic
    pub fn add_yaml_error(&mut self, message: String, pos: Span) {
        self.push(DiagnosticKind::Error, message, pos);
    }

    /// Add a schema mismatch diagnostic
    pub fn add_error(&mut self, message: String, pos: Span) {
        self.push(DiagnosticKind::Error, message, pos);
    }

    fn push(&mut self, kind: DiagnosticKind, message: String, pos: Span) {
        self.diagnostics.push(Diagnostic { kind, message, pos });
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Convert into the final list of diagnostics
    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lsp_conversion_uses_line_positions() {
        let text = "on: push\njobs: 3";
        let index = TextIndex::new(text);
        let diagnostic = Diagnostic {
            kind: DiagnosticKind::Error,
            message: "Expected a mapping".to_string(),
            pos: Span::new(15, 16),
        };

        let lsp = diagnostic.to_lsp(&index);
        assert_eq!(lsp.range.start, Position { line: 1, character: 6 });
        assert_eq!(lsp.range.end, Position { line: 1, character: 7 });
        assert_eq!(lsp.severity, Some(DiagnosticSeverity::ERROR));
        assert_eq!(lsp.source.as_deref(), Some("actions-yaml-lsp"));
    }

    #[test]
    fn test_collector_keeps_insertion_order() {
        let mut collector = DiagnosticCollector::new();
        collector.add_yaml_error("first".to_string(), Span::new(0, 1));
        collector.add_error("second".to_string(), Span::new(2, 3));
        assert_eq!(collector.len(), 2);

        let diagnostics = collector.into_diagnostics();
        assert_eq!(diagnostics[0].message, "first");
        assert_eq!(diagnostics[1].kind, DiagnosticKind::Error);
    }
}
