//! The mutant search engine.
//!
//! Every tree the engine has produced is indexed by its canonical JSON. Trees
//! that can still be mutated sit in a frontier bucketed by the length of the
//! sequence that produced them. `next` pulls one edit at a time from the
//! generator of a chosen base and keeps going until it produces a tree that
//! is new and, when asked, compiles to new bytecode.

use crate::cancel::CancellationToken;
use crate::compile::{strip_swarm_metadata, CompileMode, CompileOutcome, Compiler};
use crate::error::{CompileError, EngineError};
use crate::fault_space::{EligibilityPolicy, FaultSpace};
use crate::generator::{GeneratorSettings, Proposal, RandomMutationGenerator};
use crate::mutation::{MutationKind, Replacement};
use crate::node_space::SUPPORTED_NODE_TYPES;
use crate::sequence::MutationSequence;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use solmut_ast::{walk, Ast, Node, NodePath, Printer, Value, VisitFlow, Visitor};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, info, trace, warn};

/// Hash a textual seed into the integer seed of the engine RNG.
pub fn seed_from_text(text: &str) -> u64 {
    let hash = blake3::hash(text.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(bytes)
}

/// Engine configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    /// Longest sequence the engine will produce. `None` is unbounded.
    pub max_distance: Option<usize>,
    pub kinds: BTreeSet<MutationKind>,
    /// Every returned sequence must use all of these kinds.
    pub must_include: BTreeSet<MutationKind>,
    pub new_node_types: Vec<String>,
    pub replaceable_node_types: Vec<String>,
    /// Only accept trees the compiler accepts.
    pub only_compilable: bool,
    /// Reject trees whose bytecode matches an earlier one.
    pub skip_same_bin: bool,
    pub seed: u64,
    pub only_same_function: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let supported: Vec<String> = SUPPORTED_NODE_TYPES.iter().map(|s| s.to_string()).collect();
        Self {
            max_distance: None,
            kinds: MutationKind::ALL.into_iter().collect(),
            must_include: BTreeSet::new(),
            new_node_types: supported.clone(),
            replaceable_node_types: supported,
            only_compilable: false,
            skip_same_bin: true,
            seed: 0,
            only_same_function: true,
        }
    }
}

impl EngineConfig {
    pub fn policy(&self) -> EligibilityPolicy {
        EligibilityPolicy {
            replaceable_node_types: self.replaceable_node_types.clone(),
            ..EligibilityPolicy::default()
        }
    }

    pub fn generator_settings(&self) -> GeneratorSettings {
        GeneratorSettings {
            policy: self.policy(),
            new_node_types: self.new_node_types.clone(),
            only_same_function: self.only_same_function,
            kinds: self.kinds.clone(),
        }
    }

    /// The fault space of `ast` restricted to `paths`, with the enabled
    /// kinds the policy allows at each of them.
    pub fn fault_space(&self, ast: &Ast, paths: impl IntoIterator<Item = NodePath>) -> FaultSpace {
        FaultSpace::build(ast, paths, &self.kinds, &self.policy())
    }

    fn below_max(&self, distance: usize) -> bool {
        self.max_distance.map_or(true, |max| distance < max)
    }
}

/// Printer and compiler used to validate candidate trees.
pub struct Toolchain {
    pub printer: Box<dyn Printer + Send>,
    pub compiler: Box<dyn Compiler + Send>,
}

impl fmt::Debug for Toolchain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Toolchain").finish_non_exhaustive()
    }
}

/// How far a known tree is from the origin.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Distance {
    Finite(usize),
    /// Trees recorded only to be skipped, such as simplified outputs.
    Infinite,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddOutcome {
    Success,
    AlreadySeenAst,
    AlreadySeenBin,
    NotCompilable,
}

#[derive(Clone, Debug, Default)]
pub struct NextRequest {
    /// Mutate this tree instead of a random frontier tree.
    pub base: Option<Ast>,
    /// Paths of `base` that edits are restricted to, permanently.
    pub override_fault_space: Option<Vec<NodePath>>,
    pub allowed_kinds: Option<BTreeSet<MutationKind>>,
}

impl NextRequest {
    pub fn random() -> Self {
        Self::default()
    }

    pub fn on(base: Ast) -> Self {
        Self {
            base: Some(base),
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum NextOutcome {
    Generated(MutationSequence),
    /// The requested base has nothing left to offer.
    ExhaustedForRequested,
    AllExhausted,
    Terminated,
}

struct FrontierEntry {
    sequence: MutationSequence,
    fault_space: FaultSpace,
    ast: Ast,
    generator: RandomMutationGenerator,
}

/// Produces mutation sequences of the origin tree, each yielding a tree
/// that has not been produced before.
pub struct MutationSequenceGenerator {
    config: EngineConfig,
    settings: GeneratorSettings,
    origin: Ast,
    origin_fault_space: FaultSpace,
    toolchain: Option<Toolchain>,
    cancellation: CancellationToken,
    markers: Vec<PathBuf>,
    frontier: BTreeMap<usize, BTreeMap<String, FrontierEntry>>,
    seen: HashMap<String, Distance>,
    bins: HashSet<String>,
    rng: StdRng,
}

impl MutationSequenceGenerator {
    pub fn new(
        origin: Ast,
        fault_space: FaultSpace,
        config: EngineConfig,
        toolchain: Option<Toolchain>,
    ) -> Result<Self, EngineError> {
        let missing: Vec<MutationKind> = config.must_include.difference(&config.kinds).copied().collect();
        if !missing.is_empty() {
            return Err(EngineError::MustIncludeNotAllowed(missing));
        }
        if config.only_compilable && toolchain.is_none() {
            return Err(EngineError::MissingToolchain);
        }
        if fault_space.is_empty() {
            warn!("initial fault space is empty, nothing can be mutated");
        }

        let origin = origin.without_extras();
        let mut engine = Self {
            settings: config.generator_settings(),
            rng: StdRng::seed_from_u64(config.seed),
            config,
            origin: origin.clone(),
            origin_fault_space: fault_space.clone(),
            toolchain,
            cancellation: CancellationToken::new(),
            markers: Vec::new(),
            frontier: BTreeMap::new(),
            seen: HashMap::new(),
            bins: HashSet::new(),
        };
        match engine.add_known_ast(origin, MutationSequence::new(), Some(fault_space))? {
            AddOutcome::Success => Ok(engine),
            other => Err(EngineError::OriginRejected(other)),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Stop whenever a file exists at `path`. May be called more than once.
    pub fn with_marker(mut self, path: PathBuf) -> Self {
        self.markers.push(path);
        self
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn origin(&self) -> &Ast {
        &self.origin
    }

    pub fn origin_fault_space(&self) -> &FaultSpace {
        &self.origin_fault_space
    }

    /// Distance recorded for `ast`, if it was ever seen.
    pub fn distance_of(&self, ast: &Ast) -> Option<Distance> {
        self.seen.get(&ast.without_extras().canonical_key()).copied()
    }

    fn terminate_requested(&self) -> bool {
        self.cancellation.is_cancelled() || self.markers.iter().any(|m| m.exists())
    }

    pub fn next(&mut self, request: &NextRequest) -> Result<NextOutcome, EngineError> {
        let requested = match &request.base {
            Some(base) => Some(base.without_extras().canonical_key()),
            None => None,
        };
        let mut restrict = request.override_fault_space.as_deref().filter(|_| requested.is_some());

        loop {
            if self.terminate_requested() {
                info!("termination requested");
                return Ok(NextOutcome::Terminated);
            }

            let (distance, key) = match &requested {
                Some(key) => match self.seen.get(key) {
                    None => return Err(EngineError::UnknownBase),
                    Some(Distance::Finite(d)) if self.config.below_max(*d) => {
                        let in_frontier = self.frontier.get(d).is_some_and(|bucket| bucket.contains_key(key));
                        if !in_frontier {
                            return Ok(NextOutcome::ExhaustedForRequested);
                        }
                        (*d, key.clone())
                    }
                    Some(_) => return Ok(NextOutcome::ExhaustedForRequested),
                },
                None => match self.pick_random_base() {
                    Some(picked) => picked,
                    None => {
                        info!("search space exhausted");
                        return Ok(NextOutcome::AllExhausted);
                    }
                },
            };

            let Some(entry) = self.frontier.get_mut(&distance).and_then(|bucket| bucket.get_mut(&key)) else {
                return Ok(NextOutcome::ExhaustedForRequested);
            };
            let proposal = entry
                .generator
                .next(request.allowed_kinds.as_ref(), restrict.take());

            let mutation = match proposal {
                Proposal::Mutation(mutation) => mutation,
                Proposal::RequestNotFulfilled => return Ok(NextOutcome::ExhaustedForRequested),
                Proposal::Exhausted => {
                    info!(distance, "base exhausted");
                    self.retire(distance, &key);
                    if requested.is_none() {
                        continue;
                    }
                    return Ok(if self.is_all_done() {
                        NextOutcome::AllExhausted
                    } else {
                        NextOutcome::ExhaustedForRequested
                    });
                }
            };

            let tree = mutation.apply(&entry.ast)?;
            let fault_space = entry.fault_space.translate(&mutation);
            let sequence = entry.sequence.extended(mutation);

            match self.add_known_ast(tree, sequence.clone(), Some(fault_space))? {
                AddOutcome::Success => {
                    if !self.config.must_include.is_subset(&sequence.kinds()) {
                        trace!(distance = sequence.len(), "missing required kinds");
                        continue;
                    }
                    debug!(
                        distance = sequence.len(),
                        kind = ?sequence.last().map(|m| m.kind()),
                        "new mutant"
                    );
                    return Ok(NextOutcome::Generated(sequence));
                }
                _ => continue,
            }
        }
    }

    fn pick_random_base(&mut self) -> Option<(usize, String)> {
        let buckets: Vec<usize> = self
            .frontier
            .iter()
            .filter(|(d, bucket)| self.config.below_max(**d) && !bucket.is_empty())
            .map(|(d, _)| *d)
            .collect();
        if buckets.is_empty() {
            return None;
        }
        let distance = buckets[self.rng.gen_range(0..buckets.len())];
        let bucket = self.frontier.get(&distance)?;
        let index = self.rng.gen_range(0..bucket.len());
        let key = bucket.keys().nth(index)?.clone();
        Some((distance, key))
    }

    fn retire(&mut self, distance: usize, key: &str) {
        if let Some(bucket) = self.frontier.get_mut(&distance) {
            bucket.remove(key);
            if bucket.is_empty() {
                self.frontier.remove(&distance);
            }
        }
    }

    /// Record `ast` as produced by `sequence`. Without a fault space, the
    /// origin's is carried over by mapping each path through the sequence.
    pub fn add_known_ast(
        &mut self,
        ast: Ast,
        sequence: MutationSequence,
        fault_space: Option<FaultSpace>,
    ) -> Result<AddOutcome, EngineError> {
        let ast = ast.without_extras();
        let key = ast.canonical_key();
        if self.seen.contains_key(&key) {
            trace!(distance = sequence.len(), "tree already seen");
            return Ok(AddOutcome::AlreadySeenAst);
        }

        let distance = sequence.len();
        self.seen.insert(key.clone(), Distance::Finite(distance));

        if self.config.below_max(distance) {
            let fault_space = fault_space
                .unwrap_or_else(|| self.origin_fault_space.map_paths(|p| sequence.update_path(p)));
            if !fault_space.is_empty() {
                let generator = RandomMutationGenerator::new(&ast, &fault_space, &self.settings, self.rng.gen());
                self.frontier.entry(distance).or_default().insert(
                    key,
                    FrontierEntry {
                        sequence,
                        fault_space,
                        ast: ast.clone(),
                        generator,
                    },
                );
            }
        }

        if self.config.only_compilable {
            return self.check_compiles(&ast, distance);
        }
        Ok(AddOutcome::Success)
    }

    fn check_compiles(&mut self, ast: &Ast, distance: usize) -> Result<AddOutcome, EngineError> {
        let Some(toolchain) = &self.toolchain else {
            return Err(EngineError::MissingToolchain);
        };
        let source = toolchain.printer.print(ast)?;
        let mode = if self.config.skip_same_bin {
            CompileMode::ReturnBytecode
        } else {
            CompileMode::ValidateOnly
        };
        let bytecode = match toolchain.compiler.compile(&source, mode)? {
            CompileOutcome::Accepted(bytecode) => bytecode,
            CompileOutcome::Rejected => {
                trace!(distance, "not compilable");
                return Ok(AddOutcome::NotCompilable);
            }
        };
        if self.config.skip_same_bin {
            let stripped: BTreeMap<String, String> = bytecode
                .iter()
                .map(|(name, code)| (name.clone(), strip_swarm_metadata(code)))
                .collect();
            let serialized = serde_json::to_string(&stripped)
                .map_err(|e| CompileError::Malformed(e.to_string()))?;
            if !self.bins.insert(serialized) {
                trace!(distance, "bytecode already seen");
                return Ok(AddOutcome::AlreadySeenBin);
            }
        }
        Ok(AddOutcome::Success)
    }

    /// True once no tree below the maximum distance has edits left.
    pub fn is_all_done(&self) -> bool {
        !self
            .frontier
            .iter()
            .any(|(d, bucket)| self.config.below_max(*d) && !bucket.is_empty())
    }

    pub fn find_by_sequence(&self, sequence: &MutationSequence) -> Option<Ast> {
        self.frontier
            .get(&sequence.len())?
            .values()
            .find(|entry| &entry.sequence == sequence)
            .map(|entry| entry.ast.clone())
    }

    /// Make the tree produced by `sequence` available as a base, and return it.
    pub fn register_base(&mut self, sequence: &MutationSequence) -> Result<Ast, EngineError> {
        if let Some(ast) = self.find_by_sequence(sequence) {
            return Ok(ast);
        }
        let mut tree = self.origin.clone();
        let mut fault_space = self.origin_fault_space.clone();
        for mutation in sequence {
            fault_space = fault_space.translate(mutation);
            tree = mutation.apply(&tree)?;
        }
        let tree = tree.without_extras();
        let outcome = self.add_known_ast(tree.clone(), sequence.clone(), Some(fault_space))?;
        trace!(?outcome, distance = sequence.len(), "registered base");
        Ok(tree)
    }

    /// Turn every `if` with empty branches into a statement evaluating its
    /// condition. Each simplified tree is marked as seen so the search never
    /// returns it. Returns `None` when nothing can be simplified.
    pub fn simplify_ast(&mut self, ast: &Ast) -> Option<Ast> {
        let mut finder = EmptyIfFinder::default();
        walk(ast, &mut finder);

        let mut best: Option<(usize, Ast)> = None;
        for sequence in finder.sequences {
            let Ok(simplified) = sequence.apply(ast) else {
                continue;
            };
            self.seen
                .insert(simplified.without_extras().canonical_key(), Distance::Infinite);
            if best.as_ref().map_or(true, |(len, _)| sequence.len() > *len) {
                best = Some((sequence.len(), simplified));
            }
        }
        best.map(|(_, tree)| tree)
    }
}

#[derive(Default)]
struct EmptyIfFinder {
    sequences: Vec<MutationSequence>,
}

fn is_empty_body(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::Node(node)) => node.is("Block") && node.list_field("statements").map_or(true, |s| s.is_empty()),
        Some(_) => false,
    }
}

impl Visitor for EmptyIfFinder {
    fn enter(&mut self, node: &Node, path: &NodePath) -> VisitFlow {
        if node.is("IfStatement") && is_empty_body(node.field("trueBody")) && is_empty_body(node.field("falseBody")) {
            if let Some(condition) = node.node_field("condition") {
                let statement = Node::new("ExpressionStatement").with("expression", condition.clone());
                self.sequences
                    .push(MutationSequence::from(vec![Replacement::new(path.clone(), statement).into()]));
            }
        }
        VisitFlow::Continue
    }
}
