//! Compiler seam and classification of its diagnostics.

use crate::error::CompileError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use tracing::warn;

/// Name under which the source is handed to the compiler.
pub const SOURCE_UNIT_NAME: &str = "main.sol";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompileMode {
    ValidateOnly,
    ReturnBytecode,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CompileOutcome {
    /// Bytecode per contract name; empty in `ValidateOnly` mode.
    Accepted(BTreeMap<String, String>),
    Rejected,
}

pub trait Compiler {
    fn compile(&self, source: &str, mode: CompileMode) -> Result<CompileOutcome, CompileError>;
}

impl<T: Compiler + ?Sized> Compiler for Box<T> {
    fn compile(&self, source: &str, mode: CompileMode) -> Result<CompileOutcome, CompileError> {
        (**self).compile(source, mode)
    }
}

/// One entry of the compiler's `errors` array.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub severity: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject,
}

/// Warnings and docstring errors are ignored; anything else rejects.
pub fn classify_diagnostics(diagnostics: &[Diagnostic]) -> Verdict {
    for diagnostic in diagnostics {
        match diagnostic.kind.as_str() {
            "Warning" | "DocstringParsingError" => continue,
            "ParserError" | "SyntaxError" | "DeclarationError" | "TypeError" => return Verdict::Reject,
            other => {
                warn!(kind = other, message = %diagnostic.message, "unknown compiler diagnostic");
                return Verdict::Reject;
            }
        }
    }
    Verdict::Accept
}

fn swarm_suffix() -> Option<&'static Regex> {
    static SWARM: OnceLock<Option<Regex>> = OnceLock::new();
    SWARM
        .get_or_init(|| Regex::new(r"(a165627a7a72305820)([0-9a-f]{64})(0029)$").ok())
        .as_ref()
}

/// Remove the trailing swarm hash, which differs between otherwise identical builds.
pub fn strip_swarm_metadata(bytecode: &str) -> String {
    match swarm_suffix() {
        Some(re) => re.replace(bytecode, "").into_owned(),
        None => bytecode.to_string(),
    }
}

/// Standard-JSON compiler input for a single source unit.
pub fn standard_input(source: &str, optimize: bool) -> serde_json::Value {
    json!({
        "language": "Solidity",
        "sources": { SOURCE_UNIT_NAME: { "content": source } },
        "settings": {
            "optimizer": { "enabled": optimize, "runs": 200 },
            "outputSelection": { "*": { "*": ["evm.bytecode.object"] } },
        },
    })
}

#[derive(Deserialize)]
struct StandardOutput {
    #[serde(default)]
    errors: Vec<Diagnostic>,
    #[serde(default)]
    contracts: BTreeMap<String, BTreeMap<String, ContractOutput>>,
}

#[derive(Deserialize)]
struct ContractOutput {
    evm: EvmOutput,
}

#[derive(Deserialize)]
struct EvmOutput {
    bytecode: BytecodeOutput,
}

#[derive(Deserialize)]
struct BytecodeOutput {
    object: String,
}

/// Interpret standard-JSON compiler output.
pub fn parse_standard_output(output: &str, mode: CompileMode) -> Result<CompileOutcome, CompileError> {
    let parsed: StandardOutput =
        serde_json::from_str(output).map_err(|e| CompileError::Malformed(e.to_string()))?;
    if classify_diagnostics(&parsed.errors) == Verdict::Reject {
        return Ok(CompileOutcome::Rejected);
    }
    if mode == CompileMode::ValidateOnly {
        return Ok(CompileOutcome::Accepted(BTreeMap::new()));
    }
    let bytecode = parsed
        .contracts
        .get(SOURCE_UNIT_NAME)
        .map(|contracts| {
            contracts
                .iter()
                .map(|(name, out)| (name.clone(), out.evm.bytecode.object.clone()))
                .collect()
        })
        .unwrap_or_default();
    Ok(CompileOutcome::Accepted(bytecode))
}
