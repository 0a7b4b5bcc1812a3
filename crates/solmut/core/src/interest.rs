//! Interest regions: which parts of a tree edits are allowed to touch.

use crate::error::SpecifierError;
use solmut_ast::{walk, Ast, CodeRange, LineColumn, Node, NodePath, VisitFlow, Visitor};
use tracing::debug;

/// Member names of calls that move ether. Their operands are never edited.
pub const EXTERNAL_CALL_MEMBERS: &[&str] = &["send", "transfer", "call", "delegatecall", "callcode"];

/// A selection of tree positions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InterestRegion {
    /// A contract, optionally narrowed to some of its functions. The unnamed
    /// function is written as `""`.
    Contract {
        name: String,
        functions: Option<Vec<String>>,
    },
    NodeType(String),
    Location(CodeRange),
    /// Conjunction of regions.
    All(Vec<InterestRegion>),
}

impl InterestRegion {
    /// True if the walk should look inside `node`.
    pub fn is_interested(&self, ast: &Ast, node: &Node, path: &NodePath) -> bool {
        match self {
            InterestRegion::Contract { name, functions } => {
                contract_verdict(ast, path, name, functions.as_deref(), false)
            }
            InterestRegion::NodeType(_) => true,
            InterestRegion::Location(range) => node.loc().is_some_and(|loc| loc.intersects(range)),
            InterestRegion::All(regions) => regions.iter().all(|r| r.is_interested(ast, node, path)),
        }
    }

    /// True if `node` itself is selected.
    pub fn in_exact_scope(&self, ast: &Ast, node: &Node, path: &NodePath) -> bool {
        match self {
            InterestRegion::Contract { name, functions } => {
                contract_verdict(ast, path, name, functions.as_deref(), true)
            }
            InterestRegion::NodeType(ty) => node.is(ty),
            InterestRegion::Location(range) => node.loc().is_some_and(|loc| loc.is_within(range)),
            InterestRegion::All(regions) => regions.iter().all(|r| r.in_exact_scope(ast, node, path)),
        }
    }
}

/// Walk from the root to `path` and decide on the first contract or function met.
fn contract_verdict(ast: &Ast, path: &NodePath, name: &str, functions: Option<&[String]>, exact: bool) -> bool {
    let mut verdict = true;
    for (_, node) in ast.nodes_along(path) {
        match node.ty() {
            "ContractDefinition" => {
                if node.str_field("name") != Some(name) {
                    return false;
                }
                if functions.is_none() {
                    return true;
                }
                // The contract itself is only a way into the selected functions.
                verdict = !exact;
            }
            "FunctionDefinition" => {
                let function = node.str_field("name").unwrap_or_default();
                return functions.is_some_and(|fs| fs.iter().any(|f| f == function));
            }
            _ => {}
        }
    }
    verdict
}

/// Read a `;`-separated list of clauses:
///
/// - `Name`, `Name.*`, `Name.member` or `Name.(fallback)`;
/// - `TYPE:NodeType` or `TYPE:Name[.member]-NodeType`;
/// - `LOC:line[,col]-line[,col]`.
pub fn parse_specifier(text: &str) -> Result<Vec<InterestRegion>, SpecifierError> {
    text.split(';')
        .map(str::trim)
        .filter(|clause| !clause.is_empty())
        .map(|clause| {
            if let Some(rest) = clause.strip_prefix("TYPE:") {
                parse_node_type(clause, rest)
            } else if let Some(rest) = clause.strip_prefix("LOC:") {
                parse_location(clause, rest)
            } else {
                parse_contract(clause, clause)
            }
        })
        .collect()
}

fn parse_contract(clause: &str, text: &str) -> Result<InterestRegion, SpecifierError> {
    let text = text.trim();
    let (name, member) = match text.split_once('.') {
        Some((name, member)) => (name.trim(), Some(member.trim())),
        None => (text, None),
    };
    if name.is_empty() || member.is_some_and(str::is_empty) {
        return Err(SpecifierError::EmptyName(clause.to_string()));
    }
    let functions = match member {
        None | Some("*") => None,
        Some("(fallback)") => Some(vec![String::new()]),
        Some(member) => Some(vec![member.to_string()]),
    };
    Ok(InterestRegion::Contract {
        name: name.to_string(),
        functions,
    })
}

fn parse_node_type(clause: &str, text: &str) -> Result<InterestRegion, SpecifierError> {
    let parts: Vec<&str> = text.split('-').map(str::trim).collect();
    let (container, ty) = match parts.as_slice() {
        [ty] => (None, *ty),
        [container, ty] => (Some(*container), *ty),
        _ => return Err(SpecifierError::TooManyParts(clause.to_string())),
    };
    if ty.is_empty() {
        return Err(SpecifierError::EmptyNodeType(clause.to_string()));
    }
    let node_type = InterestRegion::NodeType(ty.to_string());
    match container {
        Some(container) => Ok(InterestRegion::All(vec![parse_contract(clause, container)?, node_type])),
        None => Ok(node_type),
    }
}

fn parse_location(clause: &str, text: &str) -> Result<InterestRegion, SpecifierError> {
    let (start, end) = text
        .split_once('-')
        .ok_or_else(|| SpecifierError::MissingRangeSeparator(clause.to_string()))?;
    Ok(InterestRegion::Location(CodeRange::new(
        parse_position(start, 0)?,
        parse_position(end, u32::MAX)?,
    )))
}

fn parse_position(text: &str, default_column: u32) -> Result<LineColumn, SpecifierError> {
    let number = |s: &str| {
        let s = s.trim();
        s.parse::<u32>()
            .map_err(|_| SpecifierError::InvalidNumber(s.to_string()))
    };
    match text.split_once(',') {
        Some((line, column)) => Ok(LineColumn::new(number(line)?, number(column)?)),
        None => Ok(LineColumn::new(number(text)?, default_column)),
    }
}

struct FaultSpaceCollector<'a> {
    ast: &'a Ast,
    regions: Option<&'a [InterestRegion]>,
    function_depth: usize,
    paths: Vec<NodePath>,
}

impl FaultSpaceCollector<'_> {
    fn interested(&self, node: &Node, path: &NodePath) -> bool {
        self.regions
            .map_or(true, |rs| rs.iter().any(|r| r.is_interested(self.ast, node, path)))
    }

    fn exact(&self, node: &Node, path: &NodePath) -> bool {
        self.regions
            .map_or(true, |rs| rs.iter().any(|r| r.in_exact_scope(self.ast, node, path)))
    }

    fn descend_if(interested: bool) -> VisitFlow {
        if interested {
            VisitFlow::Continue
        } else {
            VisitFlow::SkipChildren
        }
    }
}

fn is_external_call(node: &Node) -> bool {
    node.is("FunctionCall")
        && node.node_field("expression").is_some_and(|callee| {
            callee.is("MemberAccess")
                && callee
                    .str_field("memberName")
                    .is_some_and(|m| EXTERNAL_CALL_MEMBERS.contains(&m))
        })
}

impl Visitor for FaultSpaceCollector<'_> {
    fn enter(&mut self, node: &Node, path: &NodePath) -> VisitFlow {
        match node.ty() {
            "ContractDefinition" => Self::descend_if(self.interested(node, path)),
            "FunctionDefinition" => {
                if self.interested(node, path) {
                    debug!(function = node.str_field("name").unwrap_or_default(), "entering function");
                    self.function_depth += 1;
                    VisitFlow::Continue
                } else {
                    VisitFlow::SkipChildren
                }
            }
            "EmitStatement" => VisitFlow::SkipChildren,
            _ => {
                let in_function = self.function_depth > 0;
                let flow = if in_function && self.exact(node, path) {
                    self.paths.push(path.clone());
                    VisitFlow::Continue
                } else {
                    Self::descend_if(self.interested(node, path))
                };
                if in_function && is_external_call(node) {
                    VisitFlow::SkipChildren
                } else {
                    flow
                }
            }
        }
    }

    fn exit(&mut self, node: &Node, _path: &NodePath) {
        if node.is("FunctionDefinition") {
            self.function_depth = self.function_depth.saturating_sub(1);
        }
    }
}

/// Paths inside interesting functions that edits may target. `None` selects
/// everything.
pub fn generate_fault_space(ast: &Ast, regions: Option<&[InterestRegion]>) -> Vec<NodePath> {
    let mut collector = FaultSpaceCollector {
        ast,
        regions,
        function_depth: 0,
        paths: Vec::new(),
    };
    walk(ast, &mut collector);
    collector.paths
}
