//! Wiring configuration into tools, the engine and a session.

use crate::config::SolmutConfig;
use crate::session::{OutputOptions, Session};
use crate::tools::{CommandLine, CommandParser, CommandPrinter, JsonAst, SolcCompiler};
use anyhow::Context;
use solmut_ast::{Ast, Parser, Printer};
use solmut_core::{
    generate_fault_space, parse_specifier, CancellationToken, MutationSequence, MutationSequenceGenerator,
    Toolchain,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

fn tool_timeout(config: &SolmutConfig) -> Duration {
    Duration::from_secs(config.tools.compile_timeout_secs)
}

/// The configured parser, or plain JSON trees when none is set.
pub fn parser(config: &SolmutConfig) -> Box<dyn Parser + Send> {
    match config.tools.parser_cmd.as_deref().and_then(CommandLine::parse) {
        Some(command) => Box::new(CommandParser::new(command, tool_timeout(config))),
        None => Box::new(JsonAst),
    }
}

/// The configured printer, or plain JSON trees when none is set.
pub fn printer(config: &SolmutConfig) -> Box<dyn Printer + Send> {
    match config.tools.printer_cmd.as_deref().and_then(CommandLine::parse) {
        Some(command) => Box::new(CommandPrinter::new(command, tool_timeout(config))),
        None => Box::new(JsonAst),
    }
}

fn toolchain(config: &SolmutConfig) -> Option<Toolchain> {
    let command = CommandLine::parse(&config.tools.compiler_cmd)?;
    Some(Toolchain {
        printer: printer(config),
        compiler: Box::new(SolcCompiler::new(command, tool_timeout(config), config.tools.optimize)),
    })
}

fn output_dir(config: &SolmutConfig) -> PathBuf {
    config
        .output
        .patched_src_dir
        .clone()
        .unwrap_or_else(|| std::env::temp_dir().join(format!("solmut-{}", std::process::id())))
}

/// Parse `source` and set up a session generating its mutants.
pub fn open_session(config: &SolmutConfig, source: &str, token: CancellationToken) -> anyhow::Result<Session> {
    let ast = parser(config).parse(source).context("failed to parse source")?;

    let regions = config
        .engine
        .mutation_space
        .as_deref()
        .map(parse_specifier)
        .transpose()
        .context("invalid mutation space")?;
    let paths = generate_fault_space(&ast, regions.as_deref());

    let engine_config = config.engine_config()?;
    let fault_space = engine_config.fault_space(&ast, paths);
    info!(paths = fault_space.len(), "initial fault space");

    let pid = std::process::id();
    let process_marker = config.process_marker(pid);
    let engine = MutationSequenceGenerator::new(ast, fault_space, engine_config, toolchain(config))?
        .with_cancellation(token)
        .with_marker(config.global_marker())
        .with_marker(process_marker.clone());

    let output = OutputOptions {
        dir: output_dir(config),
        output_mutation: config.output.output_mutation,
        simplify: config.engine.simplify,
    };
    info!(dir = %output.dir.display(), pid, "session ready");
    Ok(Session::new(engine, printer(config), output).with_process_marker(process_marker))
}

/// Replay a serialized sequence on `source` and print the result.
pub fn apply_sequence(config: &SolmutConfig, source: &str, sequence_json: &str) -> anyhow::Result<String> {
    let ast: Ast = parser(config).parse(source).context("failed to parse source")?;
    let sequence: MutationSequence =
        serde_json::from_str(sequence_json).context("failed to read mutation sequence")?;
    let mutant = sequence.apply(&ast.without_extras())?;
    Ok(printer(config).print(&mutant)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Request, Response};
    use serde_json::json;

    fn source() -> String {
        json!({
            "type": "SourceUnit",
            "children": [{
                "type": "ContractDefinition",
                "name": "C",
                "subNodes": [{
                    "type": "FunctionDefinition",
                    "name": "f",
                    "body": {
                        "type": "Block",
                        "statements": [
                            {"type": "ExpressionStatement", "expression": {"type": "Identifier", "name": "a"}},
                            {"type": "ExpressionStatement", "expression": {"type": "Identifier", "name": "b"}}
                        ]
                    }
                }]
            }]
        })
        .to_string()
    }

    fn config(dir: &std::path::Path) -> SolmutConfig {
        let mut config = SolmutConfig::default();
        config.engine.kinds = vec!["deletion".into()];
        config.engine.only_compilable = false;
        config.output.patched_src_dir = Some(dir.join("out"));
        config.output.output_mutation = true;
        config.runtime.marker_dir = dir.to_path_buf();
        config
    }

    #[test]
    fn json_sessions_need_no_external_tools() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let mut session = open_session(&config, &source(), CancellationToken::new()).unwrap();

        let response = session.handle(Request::Random { num_mutations: 10 }).unwrap();
        let Response::Success { sequences, paths, .. } = response else {
            panic!("expected success");
        };
        // two statements: three non-empty deletion subsets
        assert_eq!(sequences.len(), 3);
        assert!(paths.iter().all(|p| p.starts_with(dir.path().join("out"))));

        let mutation = std::fs::read_to_string(dir.path().join("out/0.sol.mutation")).unwrap();
        let replayed = apply_sequence(&config, &source(), &mutation).unwrap();
        assert_eq!(replayed, std::fs::read_to_string(&paths[0]).unwrap());
    }

    #[test]
    fn mutation_space_limits_the_search() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.engine.mutation_space = Some("D".into());
        let mut session = open_session(&config, &source(), CancellationToken::new()).unwrap();
        assert_eq!(
            session.handle(Request::Random { num_mutations: 1 }).unwrap(),
            Response::AllSpaceExhasuted
        );

        config.engine.mutation_space = Some("LOC:1".into());
        assert!(open_session(&config, &source(), CancellationToken::new()).is_err());
    }

    #[test]
    fn unparsable_sources_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        assert!(open_session(&config, "contract C {", CancellationToken::new()).is_err());
        assert!(apply_sequence(&config, &source(), "not json").is_err());
    }
}
