//! Candidate node spaces for insertion and replacement.
//!
//! A [`Space`] describes a set of nodes symbolically: fixed values, unions
//! and cartesian products over fields or list elements. Spaces are
//! enumerated lazily in a seeded order, and membership is decided
//! structurally without enumerating.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use solmut_ast::{scope_of, walk, walk_from, Ast, CodeRange, Node, NodePath, ScopeInfo, Value};
use solmut_ast::{VisitFlow, Visitor, EXTRA_FIELDS};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Node types the random space can synthesize.
pub const SUPPORTED_NODE_TYPES: &[&str] = &[
    "ExpressionStatement",
    "FunctionCall",
    "BooleanLiteral",
    "NumberLiteral",
    "BinaryOperation",
];

pub const BINARY_OPERATORS: &[&str] = &[
    "+", "-", "*", "/", "&&", "||", "&", "|", "<", ">", "<=", ">=", "==", "!=", "=", "+=", "-=",
    "*=", "/=",
];

const ASSERTION_CALLEES: &[&str] = &["require", "assert"];

type ValueIter = Box<dyn Iterator<Item = Value> + Send>;

/// A symbolic set of values.
#[derive(Clone, Debug, PartialEq)]
pub enum Space {
    Fixed(Value),
    /// Union of the alternatives.
    OneOf(Vec<Space>),
    /// Every node of type `ty` whose fields range over the given spaces.
    Node { ty: String, fields: Vec<(String, Space)> },
    /// Every list whose elements range over the given spaces.
    List(Vec<Space>),
}

impl Space {
    pub fn fixed(value: impl Into<Value>) -> Self {
        Space::Fixed(value.into())
    }

    pub fn one_of_values<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Space::OneOf(values.into_iter().map(|v| Space::Fixed(v.into())).collect())
    }

    pub fn node(ty: &str, fields: Vec<(&str, Space)>) -> Self {
        Space::Node {
            ty: ty.to_string(),
            fields: fields
                .into_iter()
                .map(|(name, space)| (name.to_string(), space))
                .collect(),
        }
    }

    /// Lazily enumerate the values of this space. Alternatives are visited
    /// in an order shuffled by `seed`.
    pub fn iter(&self, seed: u64) -> impl Iterator<Item = Value> + Send {
        enumerate(self.clone(), seed)
    }

    pub fn contains(&self, value: &Value) -> bool {
        match self {
            Space::Fixed(fixed) => fixed.canonical_eq(value),
            Space::OneOf(alternatives) => alternatives.iter().any(|a| a.contains(value)),
            Space::Node { .. } => value.as_node().is_some_and(|n| self.contains_node(n)),
            Space::List(items) => value.as_list().is_some_and(|values| {
                values.len() == items.len()
                    && items.iter().zip(values).all(|(space, v)| space.contains(v))
            }),
        }
    }

    pub fn contains_node(&self, node: &Node) -> bool {
        match self {
            Space::Fixed(fixed) => fixed.as_node().is_some_and(|f| f.canonical_eq(node)),
            Space::OneOf(alternatives) => alternatives.iter().any(|a| a.contains_node(node)),
            Space::Node { ty, fields } => {
                node.is(ty)
                    && fields.iter().all(|(name, space)| {
                        space.contains(node.field(name).unwrap_or(&Value::Null))
                    })
                    && node
                        .fields()
                        .keys()
                        .filter(|k| !EXTRA_FIELDS.contains(&k.as_str()))
                        .all(|k| fields.iter().any(|(name, _)| name == k))
            }
            Space::List(_) => false,
        }
    }
}

fn enumerate(space: Space, seed: u64) -> ValueIter {
    match space {
        Space::Fixed(value) => Box::new(std::iter::once(value)),
        Space::OneOf(mut alternatives) => {
            let mut rng = StdRng::seed_from_u64(seed);
            alternatives.shuffle(&mut rng);
            let inner_seed: u64 = rng.gen();
            Box::new(
                alternatives
                    .into_iter()
                    .flat_map(move |alternative| enumerate(alternative, inner_seed)),
            )
        }
        Space::Node { ty, fields } => {
            let (names, parts): (Vec<String>, Vec<Space>) = fields.into_iter().unzip();
            Box::new(product(Arc::new(parts), 0, seed).map(move |values| {
                let mut node = Node::new(ty.clone());
                for (name, value) in names.iter().zip(values) {
                    node.set_field(name, value);
                }
                Value::node(node)
            }))
        }
        Space::List(items) => Box::new(product(Arc::new(items), 0, seed).map(Value::List)),
    }
}

/// Cartesian product of `parts[from..]`, restarting inner enumerators for
/// each value of the outer one.
fn product(parts: Arc<Vec<Space>>, from: usize, seed: u64) -> Box<dyn Iterator<Item = Vec<Value>> + Send> {
    if from == parts.len() {
        return Box::new(std::iter::once(Vec::new()));
    }
    let head = enumerate(parts[from].clone(), seed.wrapping_add(from as u64));
    Box::new(head.flat_map(move |value| {
        product(Arc::clone(&parts), from + 1, seed).map(move |mut rest| {
            rest.insert(0, value.clone());
            rest
        })
    }))
}

/// Where a node is being generated for.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GenerationContext {
    pub scope: Option<ScopeInfo>,
    pub location: Option<CodeRange>,
}

impl GenerationContext {
    /// Context for a position of `ast`.
    pub fn at(ast: &Ast, path: &NodePath) -> Self {
        Self {
            scope: Some(scope_of(ast, path)),
            location: ast.node_at(path).and_then(|n| n.loc().copied()),
        }
    }
}

/// Enumerates the distinct nodes of a space, never repeating one.
pub struct NodeGenerator {
    values: ValueIter,
    emitted: HashSet<String>,
}

impl NodeGenerator {
    pub fn new(space: &Space, seed: u64) -> Self {
        Self {
            values: enumerate(space.clone(), seed),
            emitted: HashSet::new(),
        }
    }
}

impl Iterator for NodeGenerator {
    type Item = Node;

    fn next(&mut self) -> Option<Node> {
        for value in self.values.by_ref() {
            if let Value::Node(node) = value {
                if self.emitted.insert(node.canonical_key()) {
                    return Some(Arc::try_unwrap(node).unwrap_or_else(|n| (*n).clone()));
                }
            }
        }
        None
    }
}

/// A source of candidate nodes per node type.
pub trait NodeSpace: Send + Sync {
    fn space_for(&self, ty: &str, ctx: &GenerationContext) -> Option<Space>;

    fn supported_node_types(&self) -> Vec<String>;

    fn node_generator(&self, ty: &str, ctx: &GenerationContext, seed: u64) -> Option<NodeGenerator> {
        self.space_for(ty, ctx).map(|space| NodeGenerator::new(&space, seed))
    }

    fn is_node_in_space(&self, node: &Node, ctx: &GenerationContext) -> bool {
        self.space_for(node.ty(), ctx)
            .is_some_and(|space| space.contains_node(node))
    }
}

#[derive(Clone, Debug)]
struct Reusable {
    node: Node,
    scope: ScopeInfo,
}

/// Candidates built from the fragments of an existing tree.
#[derive(Clone, Debug, Default)]
pub struct RandomNodeSpace {
    by_type: HashMap<String, Vec<Reusable>>,
}

struct ReusableIndexer<'a> {
    ast: &'a Ast,
    seen: HashSet<(String, ScopeInfo)>,
    by_type: HashMap<String, Vec<Reusable>>,
}

impl Visitor for ReusableIndexer<'_> {
    fn enter(&mut self, node: &Node, path: &NodePath) -> VisitFlow {
        let scope = scope_of(self.ast, path);
        if self.seen.insert((node.canonical_key(), scope.clone())) {
            self.by_type
                .entry(node.ty().to_string())
                .or_default()
                .push(Reusable {
                    node: node.without_location(),
                    scope,
                });
        }
        VisitFlow::Continue
    }
}

impl RandomNodeSpace {
    /// Index every node of `ast` with its scope.
    pub fn new(ast: &Ast) -> Self {
        let mut indexer = ReusableIndexer {
            ast,
            seen: HashSet::new(),
            by_type: HashMap::new(),
        };
        walk(ast, &mut indexer);
        Self {
            by_type: indexer.by_type,
        }
    }

    fn reusable<'a>(&'a self, ty: &str, scope: Option<&'a ScopeInfo>) -> impl Iterator<Item = &'a Node> + 'a {
        self.by_type
            .get(ty)
            .into_iter()
            .flatten()
            .filter(move |r| scope.map_or(true, |s| s.admits(&r.scope)))
            .map(|r| &r.node)
    }

    fn event_names(&self, scope: Option<&ScopeInfo>) -> HashSet<&str> {
        let contract_scope = scope.map(|s| ScopeInfo {
            contract: s.contract.clone(),
            function: None,
        });
        self.by_type
            .get("EventDefinition")
            .into_iter()
            .flatten()
            .filter(|r| contract_scope.as_ref().map_or(true, |s| s.contract == r.scope.contract))
            .filter_map(|r| r.node.str_field("name"))
            .collect()
    }

    /// Expressions of existing statements, minus assignments and event emissions.
    fn statement_expressions(&self, scope: Option<&ScopeInfo>) -> Vec<Space> {
        let events = self.event_names(scope);
        self.reusable("ExpressionStatement", scope)
            .filter_map(|s| s.node_field("expression"))
            .filter(|e| !(e.is("BinaryOperation") && e.str_field("operator") == Some("=")))
            .filter(|e| {
                let emits = e.is("FunctionCall")
                    && e.node_field("expression")
                        .filter(|callee| callee.is("Identifier"))
                        .and_then(|callee| callee.str_field("name"))
                        .is_some_and(|name| events.contains(name));
                !emits
            })
            .map(|e| Space::fixed(e.clone()))
            .collect()
    }

    fn identifiers(&self, scope: Option<&ScopeInfo>) -> Vec<Space> {
        self.reusable("Identifier", scope)
            .map(|n| Space::fixed(n.clone()))
            .collect()
    }

    fn binary_sides(&self, scope: Option<&ScopeInfo>, side: &str) -> Vec<Space> {
        self.reusable("BinaryOperation", scope)
            .filter_map(|n| n.field(side))
            .map(|v| Space::Fixed(v.clone()))
            .collect()
    }

    fn assignment(&self, ctx: &GenerationContext) -> Option<Space> {
        let scope = ctx.scope.as_ref();
        let identifiers = self.identifiers(scope);
        if identifiers.is_empty() {
            return None;
        }
        Some(Space::node(
            "BinaryOperation",
            vec![
                ("left", Space::OneOf(identifiers)),
                ("right", Space::OneOf(self.binary_sides(scope, "right"))),
                ("operator", Space::fixed("=")),
            ],
        ))
    }

    fn function_call(&self, ctx: &GenerationContext) -> Space {
        Space::node(
            "FunctionCall",
            vec![
                (
                    "expression",
                    Space::node("Identifier", vec![("name", Space::one_of_values(ASSERTION_CALLEES.iter().copied()))]),
                ),
                (
                    "arguments",
                    Space::List(vec![Space::OneOf(self.statement_expressions(ctx.scope.as_ref()))]),
                ),
                ("names", Space::Fixed(Value::List(Vec::new()))),
            ],
        )
    }
}

impl NodeSpace for RandomNodeSpace {
    fn space_for(&self, ty: &str, ctx: &GenerationContext) -> Option<Space> {
        let scope = ctx.scope.as_ref();
        match ty {
            "ExpressionStatement" => {
                let mut expressions: Vec<Space> = self.assignment(ctx).into_iter().collect();
                expressions.push(self.function_call(ctx));
                expressions.extend(self.statement_expressions(scope));
                Some(Space::node("ExpressionStatement", vec![("expression", Space::OneOf(expressions))]))
            }
            "FunctionCall" => Some(self.function_call(ctx)),
            "BooleanLiteral" => Some(Space::node(
                "BooleanLiteral",
                vec![("value", Space::one_of_values([true, false]))],
            )),
            "NumberLiteral" => {
                let mut numbers = vec![Space::fixed("0"), Space::fixed("1")];
                numbers.extend(
                    self.reusable("NumberLiteral", scope)
                        .filter_map(|n| n.field("number"))
                        .map(|v| Space::Fixed(v.clone())),
                );
                Some(Space::node(
                    "NumberLiteral",
                    vec![("number", Space::OneOf(numbers)), ("subdenomination", Space::Fixed(Value::Null))],
                ))
            }
            "Identifier" => scope.map(|s| Space::OneOf(self.identifiers(Some(s)))),
            "BinaryOperation" => Some(Space::node(
                "BinaryOperation",
                vec![
                    ("left", Space::OneOf(self.binary_sides(scope, "left"))),
                    ("right", Space::OneOf(self.binary_sides(scope, "right"))),
                    ("operator", Space::one_of_values(BINARY_OPERATORS.iter().copied())),
                ],
            )),
            _ => None,
        }
    }

    fn supported_node_types(&self) -> Vec<String> {
        SUPPORTED_NODE_TYPES.iter().map(|s| s.to_string()).collect()
    }
}

/// Exactly the given nodes and their descendants, grouped by type.
#[derive(Clone, Debug, Default)]
pub struct SeededNodeSpace {
    nodes: Vec<Node>,
}

struct Collect(Vec<Node>);

impl Visitor for Collect {
    fn enter(&mut self, node: &Node, _path: &NodePath) -> VisitFlow {
        self.0.push(node.without_location());
        VisitFlow::Continue
    }
}

impl SeededNodeSpace {
    pub fn new(seeds: impl IntoIterator<Item = Node>) -> Self {
        let mut collect = Collect(Vec::new());
        for seed in seeds {
            walk_from(&Value::node(seed), &NodePath::root(), &mut collect);
        }
        Self { nodes: collect.0 }
    }
}

impl NodeSpace for SeededNodeSpace {
    fn space_for(&self, ty: &str, _ctx: &GenerationContext) -> Option<Space> {
        let matching: Vec<Space> = self
            .nodes
            .iter()
            .filter(|n| n.is(ty))
            .map(|n| Space::fixed(n.clone()))
            .collect();
        (!matching.is_empty()).then_some(Space::OneOf(matching))
    }

    fn supported_node_types(&self) -> Vec<String> {
        let mut types: Vec<String> = Vec::new();
        for node in &self.nodes {
            if !types.iter().any(|t| node.is(t)) {
                types.push(node.ty().to_string());
            }
        }
        types
    }
}
