//! File-based inputs: YAML configuration, range files, program documents

mod common;

use cegar_engine::config::{EngineConfig, Preset, RefinementStrategy};
use cegar_engine::features::range::{load_range, save_range, RangeInterval};
use cegar_engine::{verify, Automaton, VerificationTask};
use common::*;
use pretty_assertions::assert_eq;
use std::io::Write;

#[test]
fn test_yaml_file_overrides_preset() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        "version: 1\npreset: fast\noverrides:\n  refinement:\n    strategy: unsat_core\n  budget:\n    max_refinements: 7\n"
    )
    .unwrap();

    let config = EngineConfig::from_yaml(file.path()).unwrap();
    assert_eq!(config.preset(), Preset::Fast);
    assert_eq!(config.refinement().strategy, RefinementStrategy::UnsatCore);
    assert_eq!(config.budget().max_refinements, 7);
    let fast = EngineConfig::preset(Preset::Fast).build().unwrap();
    assert_eq!(config.budget().max_arg_nodes, fast.budget().max_arg_nodes);
}

#[test]
fn test_exported_yaml_loads_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("thorough.yaml");
    let config = EngineConfig::preset(Preset::Thorough)
        .budget(|c| c.max_predicates(123))
        .build()
        .unwrap();
    std::fs::write(&path, config.to_yaml().unwrap()).unwrap();
    assert_eq!(EngineConfig::from_yaml(&path).unwrap(), config);
}

#[test]
fn test_range_file_roundtrip_and_comments() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("range.txt");
    let range = RangeInterval::parse("[(main::a=0 main::b=1), (main::a=1 main::b=2)]").unwrap();
    save_range(&path, &range).unwrap();
    assert_eq!(load_range(&path).unwrap(), range);

    std::fs::write(&path, "# generated by a previous run\n[(main::a=3), null]\n").unwrap();
    let loaded = load_range(&path).unwrap();
    assert!(loaded.end.is_unbounded());
    assert_eq!(loaded.to_string(), "[(main::a=3), null]");
}

#[test]
fn test_program_document_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("program.json");
    let task = VerificationTask::new(counter(10), vec![Automaton::reach_error()]);
    std::fs::write(&path, task.to_json().unwrap()).unwrap();

    let loaded = VerificationTask::from_json_file(&path).unwrap();
    assert_eq!(loaded.automata, task.automata);
    let outcome = verify(loaded, balanced()).unwrap();
    assert!(outcome.verdict.is_safe());
}
