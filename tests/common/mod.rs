//! Shared end-to-end harness: source text in, a solved `ExecuteResult` out.

use ligature::ast::{CommandDecl, CommandKind, Module, Paragraph};
use ligature::diagnostics::DiagnosticCollector;
use ligature::driver::{self, ExecuteResult, ScopeOverrides};
use ligature::intern::Interner;
use ligature::lexer::Lexer;
use ligature::parser::Parser;
use ligature::solver::DpllOracle;

pub fn parse(source: &str, interner: &mut Interner) -> (Module, DiagnosticCollector) {
    let (tokens, mut diags) = Lexer::new(source, interner).tokenize();
    let mut parser = Parser::new(&tokens, &mut diags);
    let module = parser.parse_module();
    (module, diags)
}

/// Finds the sole `run` (or `check`, if `want_check`) command in the module.
pub fn find_command(module: &Module, want_check: bool) -> &CommandDecl {
    module
        .paragraphs
        .iter()
        .find_map(|p| match p {
            Paragraph::Command(c) if matches!(c.kind, CommandKind::Check { .. }) == want_check => Some(c),
            _ => None,
        })
        .expect("module declares a matching run/check command")
}

/// Parses, finds the command, and runs the full pipeline through the
/// built-in DPLL oracle.
pub fn run(source: &str, want_check: bool) -> ExecuteResult {
    let mut interner = Interner::new();
    let (module, diags) = parse(source, &mut interner);
    assert!(!diags.has_errors(), "unexpected parse errors: {:?}", diags.sorted());
    let command = find_command(&module, want_check).clone();
    let mut oracle = DpllOracle::default();
    driver::execute(&module, &command, &mut interner, &mut oracle, ScopeOverrides::default(), false)
}
