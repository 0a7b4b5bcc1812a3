//! One interactive generation session over a single source tree.

use crate::protocol::{cross_point, Request, Response};
use anyhow::Context;
use solmut_ast::Printer;
use solmut_core::{
    crossover_one_point, generate_fault_space, parse_specifier, AddOutcome, EngineError,
    ModifiedLocations, MutationSequence, MutationSequenceGenerator, NextOutcome, NextRequest,
};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Where and how produced mutants are written.
#[derive(Debug, Clone)]
pub struct OutputOptions {
    pub dir: PathBuf,
    /// Also write the sequence next to each source file.
    pub output_mutation: bool,
    /// Print the simplified tree instead of the mutant itself.
    pub simplify: bool,
}

pub struct Session {
    engine: MutationSequenceGenerator,
    printer: Box<dyn Printer + Send>,
    output: OutputOptions,
    /// Removed before every request so a stale marker does not stop it.
    process_marker: Option<PathBuf>,
    written: usize,
}

impl Session {
    pub fn new(engine: MutationSequenceGenerator, printer: Box<dyn Printer + Send>, output: OutputOptions) -> Self {
        Self {
            engine,
            printer,
            output,
            process_marker: None,
            written: 0,
        }
    }

    pub fn with_process_marker(mut self, path: PathBuf) -> Self {
        self.process_marker = Some(path);
        self
    }

    pub fn engine(&self) -> &MutationSequenceGenerator {
        &self.engine
    }

    /// Number of mutant files written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Parse and answer one protocol line.
    pub fn handle_line(&mut self, line: &str) -> anyhow::Result<Response> {
        match Request::parse(line) {
            Ok(request) => self.handle(request),
            Err(e) => {
                warn!(error = %e, "malformed request");
                Ok(Response::invalid(e.to_string()))
            }
        }
    }

    pub fn handle(&mut self, request: Request) -> anyhow::Result<Response> {
        self.prepare()?;
        match request {
            Request::Random { num_mutations } => self.random(num_mutations),
            Request::Mutate { base, specifier } => self.mutate(&base, specifier.as_deref()),
            Request::CrossoverOnePoint {
                first,
                first_point,
                second,
                second_point,
            } => self.crossover(&first, first_point, &second, second_point),
        }
    }

    fn prepare(&mut self) -> anyhow::Result<()> {
        self.engine.cancellation().reset();
        if let Some(marker) = &self.process_marker {
            match fs::remove_file(marker) {
                Ok(()) => debug!(marker = %marker.display(), "removed stale marker"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(e).with_context(|| format!("failed to remove {}", marker.display()));
                }
            }
        }
        Ok(())
    }

    /// A search stopped early answers `Success` with whatever it collected, even nothing;
    /// `AllSpaceExhasuted` is kept for an exhausted search that found nothing.
    fn random(&mut self, wanted: usize) -> anyhow::Result<Response> {
        let mut sequences = Vec::new();
        let mut all_done = false;
        while sequences.len() < wanted {
            match self.engine.next(&NextRequest::random())? {
                NextOutcome::Generated(sequence) => sequences.push(sequence),
                NextOutcome::AllExhausted => {
                    all_done = true;
                    break;
                }
                NextOutcome::ExhaustedForRequested | NextOutcome::Terminated => break,
            }
        }
        if all_done && sequences.is_empty() {
            return Ok(Response::AllSpaceExhasuted);
        }
        self.emit(sequences)
    }

    fn mutate(&mut self, base: &MutationSequence, specifier: Option<&str>) -> anyhow::Result<Response> {
        let base_tree = match self.engine.register_base(base) {
            Ok(tree) => tree,
            Err(EngineError::Mutation(e)) => return Ok(Response::invalid(format!("base sequence: {}", e))),
            Err(e) => return Err(e.into()),
        };

        let override_fault_space = match specifier {
            Some(specifier) => {
                let regions = match parse_specifier(specifier) {
                    Ok(regions) => regions,
                    Err(e) => return Ok(Response::invalid(e.to_string())),
                };
                let paths = generate_fault_space(&base_tree, Some(&regions));
                debug!(specifier, paths = paths.len(), "overriding fault space");
                Some(paths)
            }
            None => None,
        };
        let request = NextRequest {
            override_fault_space,
            ..NextRequest::on(base_tree)
        };

        match self.engine.next(&request)? {
            NextOutcome::Generated(sequence) => self.emit(vec![sequence]),
            NextOutcome::AllExhausted => Ok(Response::AllSpaceExhasuted),
            NextOutcome::ExhaustedForRequested | NextOutcome::Terminated => Ok(Response::SpaceExhasutedForAST),
        }
    }

    fn crossover(
        &mut self,
        first: &MutationSequence,
        first_point: i64,
        second: &MutationSequence,
        second_point: i64,
    ) -> anyhow::Result<Response> {
        let points = cross_point(first_point).and_then(|a| cross_point(second_point).map(|b| (a, b)));
        let (c1, c2) = match points {
            Ok(points) => points,
            Err(reason) => return Ok(Response::invalid(reason)),
        };
        let children = match crossover_one_point(self.engine.origin(), first, c1, second, c2) {
            Ok(children) => children,
            Err(e) => return Ok(Response::invalid(e.to_string())),
        };

        let mut accepted = Vec::new();
        for child in children {
            let tree = child.apply(self.engine.origin())?;
            match self.engine.add_known_ast(tree, child.clone(), None)? {
                AddOutcome::Success => accepted.push(child),
                outcome => debug!(?outcome, distance = child.len(), "crossover child skipped"),
            }
        }
        self.emit(accepted)
    }

    /// Write every sequence's tree to disk and build the success response.
    fn emit(&mut self, sequences: Vec<MutationSequence>) -> anyhow::Result<Response> {
        fs::create_dir_all(&self.output.dir)
            .with_context(|| format!("failed to create {}", self.output.dir.display()))?;

        let mut paths = Vec::with_capacity(sequences.len());
        let mut locations = Vec::with_capacity(sequences.len());
        for sequence in &sequences {
            let origin = self.engine.origin().clone();
            let mut tree = sequence.apply(&origin)?;
            if self.output.simplify {
                if let Some(simplified) = self.engine.simplify_ast(&tree) {
                    tree = simplified;
                }
            }
            let source = self.printer.print(&tree)?;
            let path = self.write_mutant(&source, sequence)?;
            info!(path = %path.display(), distance = sequence.len(), "wrote mutant");

            locations.push(
                sequence
                    .modified_locations(&origin)
                    .unwrap_or(ModifiedLocations::Unknown),
            );
            paths.push(path);
        }

        Ok(Response::Success {
            sequences,
            paths,
            locations,
        })
    }

    fn write_mutant(&mut self, source: &str, sequence: &MutationSequence) -> anyhow::Result<PathBuf> {
        let path = self.output.dir.join(format!("{}.sol", self.written));
        write_file(&path, source)?;
        if self.output.output_mutation {
            let mutation_path = self.output.dir.join(format!("{}.sol.mutation", self.written));
            write_file(&mutation_path, &serde_json::to_string(sequence)?)?;
        }
        self.written += 1;
        Ok(path)
    }
}

fn write_file(path: &Path, contents: &str) -> anyhow::Result<()> {
    fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::JsonAst;
    use solmut_ast::{Ast, Node, Value};
    use solmut_core::{Deletion, EngineConfig, Mutation, MutationKind};
    use std::collections::BTreeSet;

    fn stmt(name: &str) -> Node {
        Node::new("ExpressionStatement").with("expression", Node::new("Identifier").with("name", name))
    }

    fn function(name: &str, statements: &[&str]) -> Node {
        let statements: Vec<Value> = statements.iter().map(|s| Value::from(stmt(s))).collect();
        Node::new("FunctionDefinition")
            .with("name", name)
            .with("body", Node::new("Block").with("statements", statements))
    }

    fn tree() -> Ast {
        let contract = Node::new("ContractDefinition").with("name", "C").with(
            "subNodes",
            vec![
                Value::from(function("f", &["a", "b"])),
                Value::from(function("g", &["x"])),
            ],
        );
        Ast::new(Node::new("SourceUnit").with("children", vec![Value::from(contract)]))
    }

    fn session(dir: &Path, output_mutation: bool) -> Session {
        let ast = tree();
        let config = EngineConfig {
            kinds: BTreeSet::from([MutationKind::Deletion]),
            only_compilable: false,
            ..EngineConfig::default()
        };
        let fault_space = config.fault_space(&ast, generate_fault_space(&ast, None));
        let engine = MutationSequenceGenerator::new(ast, fault_space, config, None).unwrap();
        Session::new(
            engine,
            Box::new(JsonAst),
            OutputOptions {
                dir: dir.to_path_buf(),
                output_mutation,
                simplify: false,
            },
        )
    }

    fn success(response: Response) -> (Vec<MutationSequence>, Vec<PathBuf>) {
        match response {
            Response::Success { sequences, paths, .. } => (sequences, paths),
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[test]
    fn random_requests_write_numbered_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path(), true);

        let (sequences, paths) = success(session.handle(Request::Random { num_mutations: 2 }).unwrap());
        assert_eq!(sequences.len(), 2);
        assert_eq!(paths, vec![dir.path().join("0.sol"), dir.path().join("1.sol")]);

        let written: MutationSequence =
            serde_json::from_str(&fs::read_to_string(dir.path().join("1.sol.mutation")).unwrap()).unwrap();
        assert_eq!(written, sequences[1]);
        let mutant = Ast::from_json_str(&fs::read_to_string(&paths[0]).unwrap()).unwrap();
        assert_eq!(mutant, sequences[0].apply(session.engine().origin()).unwrap());

        let (_, paths) = success(session.handle(Request::Random { num_mutations: 1 }).unwrap());
        assert_eq!(paths, vec![dir.path().join("2.sol")]);
        assert_eq!(session.written(), 3);
    }

    #[test]
    fn random_requests_drain_to_all_exhausted() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path(), false);

        // three statements: seven non-empty deletion subsets
        let (sequences, _) = success(session.handle(Request::Random { num_mutations: 100 }).unwrap());
        assert_eq!(sequences.len(), 7);
        assert!(!dir.path().join("0.sol.mutation").exists());

        let response = session.handle(Request::Random { num_mutations: 1 }).unwrap();
        assert_eq!(response, Response::AllSpaceExhasuted);
    }

    #[test]
    fn mutate_respects_the_specifier() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path(), false);

        let line = r#"{"type":"mutate","baseMutationSequence":[],"overridenFaultSpaceSpecifier":"C.g"}"#;
        let (sequences, _) = success(session.handle_line(line).unwrap());
        assert_eq!(sequences.len(), 1);
        let Some(Mutation::Deletion(deletion)) = sequences[0].get(0) else {
            panic!("expected a deletion");
        };
        assert_eq!(deletion.target().to_string(), "children.0.subNodes.1.body.statements.0");

        let response = session.handle_line(line).unwrap();
        assert_eq!(response, Response::SpaceExhasutedForAST);
    }

    #[test]
    fn invalid_requests_keep_the_session_alive() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path(), false);

        assert!(matches!(session.handle_line("{").unwrap(), Response::InvalidRequest { .. }));
        let bad_specifier = r#"{"type":"mutate","baseMutationSequence":[],"overridenFaultSpaceSpecifier":"LOC:3"}"#;
        assert!(matches!(
            session.handle_line(bad_specifier).unwrap(),
            Response::InvalidRequest { .. }
        ));
        let bad_point = r#"{"type":"crossover-onepoint","MutationSequence1":[],"CrossPoint1":0,"MutationSequence2":[],"CrossPoint2":-1}"#;
        assert!(matches!(
            session.handle_line(bad_point).unwrap(),
            Response::InvalidRequest { .. }
        ));

        let (sequences, _) = success(session.handle(Request::Random { num_mutations: 1 }).unwrap());
        assert_eq!(sequences.len(), 1);
    }

    fn delete(path: &str) -> Mutation {
        Deletion::new(path.parse().unwrap()).unwrap().into()
    }

    #[test]
    fn crossover_registers_children() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path(), false);

        // delete a then b from f; delete x from g
        let in_f = MutationSequence::from(vec![
            delete("children.0.subNodes.0.body.statements.0"),
            delete("children.0.subNodes.0.body.statements.0"),
        ]);
        let in_g = MutationSequence::from(vec![delete("children.0.subNodes.1.body.statements.0")]);

        let request = Request::CrossoverOnePoint {
            first: in_f,
            first_point: 0,
            second: in_g,
            second_point: -1,
        };
        let (children, paths) = success(session.handle(request.clone()).unwrap());
        assert_eq!(paths.len(), children.len());
        assert!(children.iter().any(|c| c.len() == 2));
        for child in &children {
            assert!(session.engine().distance_of(&child.apply(session.engine().origin()).unwrap()).is_some());
        }

        // the same children are now known
        let (again, _) = success(session.handle(request).unwrap());
        assert!(again.is_empty());
    }

    #[test]
    fn stale_process_marker_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("solmut-terminate-1");
        fs::write(&marker, "").unwrap();

        let ast = tree();
        let config = EngineConfig {
            kinds: BTreeSet::from([MutationKind::Deletion]),
            ..EngineConfig::default()
        };
        let fault_space = config.fault_space(&ast, generate_fault_space(&ast, None));
        let engine = MutationSequenceGenerator::new(ast, fault_space, config, None)
            .unwrap()
            .with_marker(marker.clone());
        let mut session = Session::new(
            engine,
            Box::new(JsonAst),
            OutputOptions {
                dir: dir.path().join("out"),
                output_mutation: false,
                simplify: false,
            },
        )
        .with_process_marker(marker.clone());

        let (sequences, _) = success(session.handle(Request::Random { num_mutations: 1 }).unwrap());
        assert_eq!(sequences.len(), 1);
        assert!(!marker.exists());
    }

    #[test]
    fn stale_cancellation_is_cleared() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path(), false);
        session.engine.cancellation().cancel();
        // the flag is cleared when the request starts
        let (sequences, _) = success(session.handle(Request::Random { num_mutations: 1 }).unwrap());
        assert_eq!(sequences.len(), 1);
    }

    #[test]
    fn terminated_random_request_answers_empty_success() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("solmut-terminate");
        fs::write(&marker, "").unwrap();

        let ast = tree();
        let config = EngineConfig {
            kinds: BTreeSet::from([MutationKind::Deletion]),
            only_compilable: false,
            ..EngineConfig::default()
        };
        let fault_space = config.fault_space(&ast, generate_fault_space(&ast, None));
        let engine = MutationSequenceGenerator::new(ast, fault_space, config, None)
            .unwrap()
            .with_marker(marker.clone());
        let mut session = Session::new(
            engine,
            Box::new(JsonAst),
            OutputOptions {
                dir: dir.path().join("out"),
                output_mutation: false,
                simplify: false,
            },
        );

        // a global marker outlives the request
        let (sequences, paths) = success(session.handle(Request::Random { num_mutations: 3 }).unwrap());
        assert!(sequences.is_empty());
        assert!(paths.is_empty());
        assert!(marker.exists());

        fs::remove_file(&marker).unwrap();
        let (sequences, _) = success(session.handle(Request::Random { num_mutations: 1 }).unwrap());
        assert_eq!(sequences.len(), 1);
    }
}
