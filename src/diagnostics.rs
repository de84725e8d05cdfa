//! Diagnostic collection: stable error codes, severities, and rendering.
//!
//! Model-level problems never abort a phase — they accumulate
//! here and the driver decides whether to advance past analysis.

use std::fmt;

use crate::token::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// Stable diagnostic codes, grouped by phase (lexical, syntax, semantic...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Code {
    // Lexical E10x
    InvalidCharacter,
    UnterminatedComment,
    InvalidNumber,
    // Syntactic E20x
    UnexpectedToken,
    MissingCloser,
    // Naming E30x
    UndefinedName,
    UndefinedSignature,
    UndefinedField,
    UndefinedPredicate,
    UndefinedFunction,
    DuplicateDefinition,
    CyclicInheritance,
    AmbiguousReference,
    PrivateAccessViolation,
    // Typing E40x
    TypeMismatch,
    ArityMismatch,
    InvalidJoin,
    InvalidUnion,
    InvalidIntersection,
    InvalidProduct,
    InvalidComparison,
    ExpectedRelation,
    ExpectedSet,
    ExpectedFormula,
    ExpectedInteger,
    ArgumentCountMismatch,
    // Multiplicity E50x
    InvalidMultiplicity,
    MultiplicityViolation,
    // Temporal E60x
    PrimedNonVariable,
    TemporalInNonTemporalContext,
    MissingSteps,
    // Scope E70x
    InvalidScope,
    ScopeTooSmall,
    // Warnings Wxxx
    UnusedSymbol,
    ShadowedName,
    RedundantConstraint,
    EmptySignature,
}

impl Code {
    pub fn as_str(self) -> &'static str {
        use Code::*;
        match self {
            InvalidCharacter => "E101",
            UnterminatedComment => "E102",
            InvalidNumber => "E103",
            UnexpectedToken => "E201",
            MissingCloser => "E202",
            UndefinedName => "E301",
            UndefinedSignature => "E302",
            UndefinedField => "E303",
            UndefinedPredicate => "E304",
            UndefinedFunction => "E305",
            DuplicateDefinition => "E306",
            CyclicInheritance => "E307",
            AmbiguousReference => "E308",
            PrivateAccessViolation => "E309",
            TypeMismatch => "E401",
            ArityMismatch => "E402",
            InvalidJoin => "E403",
            InvalidUnion => "E404",
            InvalidIntersection => "E405",
            InvalidProduct => "E406",
            InvalidComparison => "E407",
            ExpectedRelation => "E408",
            ExpectedSet => "E409",
            ExpectedFormula => "E410",
            ExpectedInteger => "E411",
            ArgumentCountMismatch => "E412",
            InvalidMultiplicity => "E501",
            MultiplicityViolation => "E502",
            PrimedNonVariable => "E601",
            TemporalInNonTemporalContext => "E602",
            MissingSteps => "E603",
            InvalidScope => "E701",
            ScopeTooSmall => "E702",
            UnusedSymbol => "W201",
            ShadowedName => "W202",
            RedundantConstraint => "W203",
            EmptySignature => "W204",
        }
    }

    pub fn severity(self) -> Severity {
        if self.as_str().starts_with('W') {
            Severity::Warning
        } else {
            Severity::Error
        }
    }
}

#[derive(Debug, Clone)]
pub struct RelatedSpan {
    pub span: Span,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: Code,
    pub span: Span,
    pub message: String,
    pub related: Vec<RelatedSpan>,
    pub fix_suggestion: Option<String>,
}

impl Diagnostic {
    pub fn new(code: Code, span: Span, message: impl Into<String>) -> Self {
        Self {
            code,
            span,
            message: message.into(),
            related: Vec::new(),
            fix_suggestion: None,
        }
    }

    pub fn with_related(mut self, span: Span, message: impl Into<String>) -> Self {
        self.related.push(RelatedSpan { span, message: message.into() });
        self
    }

    pub fn with_fix(mut self, suggestion: impl Into<String>) -> Self {
        self.fix_suggestion = Some(suggestion.into());
        self
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// `LINE:COL: severity: [CODE] message`.
    pub fn format_line(&self) -> String {
        format!(
            "{}:{}: {}: [{}] {}",
            self.span.start_pos.line,
            self.span.start_pos.col,
            self.severity(),
            self.code.as_str(),
            self.message
        )
    }

    /// Caret-underline rendering against the original source, in the
    /// teacher's `display_with_source` style. This is an ergonomic nicety,
    /// not the out-of-scope GUI diagnostic renderer.
    pub fn display_with_source(&self, source: &str) -> String {
        let (line_start, line_content) = find_line(source, self.span.start);
        let col = self.span.start.saturating_sub(line_start);
        let len = (self.span.end - self.span.start).max(1);
        let underline = format!("{}{}", " ".repeat(col), "^".repeat(len));
        let mut out = format!("{}\n  | {}\n  | {}", self.format_line(), line_content, underline);
        for r in &self.related {
            out.push_str(&format!("\n  = note: {}", r.message));
        }
        if let Some(fix) = &self.fix_suggestion {
            out.push_str(&format!("\n  = help: {}", fix));
        }
        out
    }
}

fn find_line(source: &str, offset: usize) -> (usize, &str) {
    let mut line_start = 0;
    for (i, c) in source.char_indices() {
        if i >= offset {
            break;
        }
        if c == '\n' {
            line_start = i + 1;
        }
    }
    let line_end = source[line_start..]
        .find('\n')
        .map(|off| line_start + off)
        .unwrap_or(source.len());
    (line_start, &source[line_start..line_end])
}

/// Accumulates diagnostics across all phases without aborting early.
#[derive(Debug, Default)]
pub struct DiagnosticCollector {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diag: Diagnostic) {
        tracing::warn!(code = diag.code.as_str(), message = %diag.message, "diagnostic");
        self.diagnostics.push(diag);
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity() == Severity::Error)
    }

    pub fn sorted(&self) -> Vec<&Diagnostic> {
        let mut v: Vec<&Diagnostic> = self.diagnostics.iter().collect();
        v.sort_by_key(|d| (d.span.start_pos.line, d.span.start_pos.col));
        v
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    /// Drops diagnostics recorded after `mark`, for speculative parses that
    /// backtrack (e.g. disambiguating a parenthesized formula vs. expression).
    pub fn truncate(&mut self, mark: usize) {
        self.diagnostics.truncate(mark);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Pos;

    fn span_at(line: u32, col: u32) -> Span {
        Span::new(0, 1, Pos { line, col }, Pos { line, col: col + 1 })
    }

    #[test]
    fn diagnostics_sort_by_position() {
        let mut c = DiagnosticCollector::new();
        c.push(Diagnostic::new(Code::UndefinedName, span_at(5, 1), "b"));
        c.push(Diagnostic::new(Code::UndefinedName, span_at(1, 1), "a"));
        let sorted = c.sorted();
        assert_eq!(sorted[0].message, "a");
        assert_eq!(sorted[1].message, "b");
    }

    #[test]
    fn warning_codes_do_not_count_as_errors() {
        let mut c = DiagnosticCollector::new();
        c.push(Diagnostic::new(Code::UnusedSymbol, span_at(1, 1), "unused"));
        assert!(!c.has_errors());
        c.push(Diagnostic::new(Code::UndefinedName, span_at(1, 1), "undefined"));
        assert!(c.has_errors());
    }
}
