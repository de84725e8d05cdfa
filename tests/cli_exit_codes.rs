//! Exit codes over the compiled binary, against real files on disk (hence
//! the `tempfile` dev-dependency).

use std::io::Write;
use std::process::Command;

use tempfile::NamedTempFile;

fn write_module(source: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp module file");
    file.write_all(source.as_bytes()).expect("write module source");
    file
}

fn ligature() -> Command {
    Command::new(env!("CARGO_BIN_EXE_ligature"))
}

#[test]
fn analyze_reports_zero_on_a_well_formed_module() {
    let file = write_module("sig Person {}\nrun {} for 3\n");
    let status = ligature().arg("analyze").arg(file.path()).status().expect("run ligature analyze");
    assert_eq!(status.code(), Some(0));
}

#[test]
fn analyze_reports_two_on_a_semantic_error() {
    let file = write_module("sig Person { name: univ }\npred change { Person.name' != Person.name }\n");
    let status = ligature().arg("analyze").arg(file.path()).status().expect("run ligature analyze");
    assert_eq!(status.code(), Some(2));
}

#[test]
fn run_reports_ten_on_an_unsatisfiable_model() {
    let file = write_module("sig A {}\nfact { some A }\nfact { no A }\nrun {} for 3\n");
    let status = ligature().arg("run").arg(file.path()).status().expect("run ligature run");
    assert_eq!(status.code(), Some(10));
}

#[test]
fn run_reports_zero_on_a_satisfiable_model() {
    let file = write_module("sig Person {}\nrun {} for 3\n");
    let status = ligature().arg("run").arg(file.path()).status().expect("run ligature run");
    assert_eq!(status.code(), Some(0));
}

#[test]
fn check_reports_zero_when_the_assertion_holds() {
    let file = write_module("sig Person {}\nfact { no Person }\nassert NoPerson { no Person }\ncheck NoPerson for 3\n");
    let status = ligature().arg("check").arg(file.path()).status().expect("run ligature check");
    assert_eq!(status.code(), Some(0));
}
