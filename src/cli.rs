//! Command-line interface: `analyze`/`run`/`check` over a
//! single module file, with scope/steps/bitwidth overrides and a DIMACS
//! dump mode for plugging in an external solver.

use std::fs;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::ast::{CommandDecl, CommandKind, Module, Paragraph};
use crate::diagnostics::DiagnosticCollector;
use crate::driver::{self, CommandOutcome, ScopeOverrides};
use crate::intern::Interner;
use crate::lexer::Lexer;
use crate::parser::Parser as LigatureParser;
use crate::semantics::analyze;
use crate::solver::DpllOracle;

#[derive(Parser)]
#[command(name = "ligature")]
#[command(about = "Relational modeling language compiled to CNF", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Emit tracing output at debug level instead of the default warn level.
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Lex, parse, and run semantic analysis; report diagnostics only.
    Analyze {
        file: PathBuf,
    },
    /// Find a satisfying instance for a `run` command.
    Run(CommandArgs),
    /// Search for a counterexample to a `check` command's assertion.
    Check(CommandArgs),
}

#[derive(Args)]
pub struct CommandArgs {
    pub file: PathBuf,

    /// Name of the `run`/`check` command to execute, when the module
    /// declares more than one (matched against the command's target
    /// predicate/assertion name).
    #[arg(long)]
    pub cmd: Option<String>,

    /// Overrides every signature's default scope.
    #[arg(long)]
    pub scope: Option<u32>,

    /// Overrides the trace length for temporal models.
    #[arg(long)]
    pub steps: Option<u32>,

    /// Overrides the integer bitwidth.
    #[arg(long = "int-bw")]
    pub int_bw: Option<u32>,

    /// Print the generated CNF in DIMACS form instead of solving it.
    #[arg(long)]
    pub dimacs: bool,
}

/// Parses arguments, dispatches, and returns the process exit code
///.
pub fn run() -> i32 {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Analyze { file } => run_analyze(&file),
        Command::Run(args) => run_command(&args, false),
        Command::Check(args) => run_command(&args, true),
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose { "debug" } else { "warn" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .try_init();
}

fn read_source(file: &PathBuf) -> Result<String, i32> {
    fs::read_to_string(file).map_err(|e| {
        eprintln!("error: could not read {}: {e}", file.display());
        2
    })
}

fn parse_module(source: &str, interner: &mut Interner) -> (Module, DiagnosticCollector) {
    let (tokens, mut diags) = Lexer::new(source, interner).tokenize();
    let mut parser = LigatureParser::new(&tokens, &mut diags);
    let module = parser.parse_module();
    (module, diags)
}

fn report(diags: &DiagnosticCollector, source: &str) {
    for d in diags.sorted() {
        eprintln!("{}", d.display_with_source(source));
    }
}

fn run_analyze(file: &PathBuf) -> i32 {
    let source = match read_source(file) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let mut interner = Interner::new();
    let (module, mut diags) = parse_module(&source, &mut interner);
    if diags.has_errors() {
        report(&diags, &source);
        return 2;
    }
    let analysis = analyze(&module, &mut interner);
    diags = analysis.diags;
    report(&diags, &source);
    if diags.has_errors() {
        2
    } else {
        0
    }
}

fn find_command<'m>(module: &'m Module, cmd_name: Option<&str>, interner: &mut Interner, want_check: bool) -> Result<&'m CommandDecl, i32> {
    let matches_name = |c: &CommandDecl| -> bool {
        let target_name = match &c.kind {
            CommandKind::Run { target, .. } => *target,
            CommandKind::Check { target } => Some(*target),
        };
        match (cmd_name, target_name) {
            (None, _) => true,
            (Some(want), Some(sym)) => interner.resolve(sym) == want,
            (Some(_), None) => false,
        }
    };
    module
        .paragraphs
        .iter()
        .filter_map(|p| match p {
            Paragraph::Command(c) if matches!(c.kind, CommandKind::Check { .. }) == want_check => Some(c),
            _ => None,
        })
        .find(|c| matches_name(c))
        .ok_or_else(|| {
            eprintln!("error: no matching {} command found in module", if want_check { "check" } else { "run" });
            2
        })
}

fn run_command(args: &CommandArgs, want_check: bool) -> i32 {
    let source = match read_source(&args.file) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let mut interner = Interner::new();
    let (module, mut diags) = parse_module(&source, &mut interner);
    if diags.has_errors() {
        report(&diags, &source);
        return 2;
    }

    let command = match find_command(&module, args.cmd.as_deref(), &mut interner, want_check) {
        Ok(c) => c.clone(),
        Err(code) => return code,
    };

    let overrides = ScopeOverrides { default_scope: args.scope, steps: args.steps, int_bitwidth: args.int_bw };
    let mut oracle = DpllOracle::default();
    let result = driver::execute(&module, &command, &mut interner, &mut oracle, overrides, args.dimacs);
    diags = result.diags;
    report(&diags, &source);
    if diags.has_errors() {
        return 2;
    }

    if let Some(dimacs) = result.dimacs {
        print!("{dimacs}");
        return 0;
    }

    let universe = result.universe.expect("a successful non-dimacs run always returns its universe");
    match result.outcome {
        Some(CommandOutcome::Model(instance)) => {
            println!("{}", instance.render(&universe));
            0
        }
        Some(CommandOutcome::CounterExample(instance)) => {
            println!("counterexample found:");
            println!("{}", instance.render(&universe));
            10
        }
        Some(CommandOutcome::NoInstance) => {
            println!("no instance found");
            10
        }
        Some(CommandOutcome::AssertionHolds) => {
            println!("assertion holds");
            0
        }
        Some(CommandOutcome::Unknown) | None => {
            println!("unknown");
            20
        }
    }
}
