//! Line protocol spoken on stdin and stdout.
//!
//! Every request is one JSON object per line and gets exactly one JSON
//! response line. The field and result names are part of the wire format
//! shared with existing drivers, misspellings included.

use serde::{Deserialize, Serialize};
use solmut_core::{ModifiedLocations, MutationSequence};
use std::path::PathBuf;

/// Line that ends the session.
pub const QUIT: &str = "q";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    /// Produce up to `num_mutations` new sequences from random bases.
    #[serde(rename = "random")]
    Random { num_mutations: usize },

    /// Produce one new sequence on top of a given one.
    #[serde(rename = "mutate")]
    Mutate {
        #[serde(rename = "baseMutationSequence")]
        base: MutationSequence,
        #[serde(rename = "overridenFaultSpaceSpecifier", default)]
        specifier: Option<String>,
    },

    /// Combine prefixes of two sequences. A cross point of `-1` takes no prefix.
    #[serde(rename = "crossover-onepoint")]
    CrossoverOnePoint {
        #[serde(rename = "MutationSequence1")]
        first: MutationSequence,
        #[serde(rename = "CrossPoint1")]
        first_point: i64,
        #[serde(rename = "MutationSequence2")]
        second: MutationSequence,
        #[serde(rename = "CrossPoint2")]
        second_point: i64,
    },
}

impl Request {
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

/// Map the wire cross point onto a prefix length selector.
pub fn cross_point(point: i64) -> Result<Option<usize>, String> {
    match point {
        -1 => Ok(None),
        p if p >= 0 => usize::try_from(p).map(Some).map_err(|e| e.to_string()),
        p => Err(format!("invalid cross point {}", p)),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "Result")]
pub enum Response {
    Success {
        #[serde(rename = "NewMutationSequences")]
        sequences: Vec<MutationSequence>,
        #[serde(rename = "PatchedFilePaths")]
        paths: Vec<PathBuf>,
        #[serde(rename = "ModifiedLocations")]
        locations: Vec<ModifiedLocations>,
    },
    SpaceExhasutedForAST,
    AllSpaceExhasuted,
    InvalidRequest {
        #[serde(rename = "Reason")]
        reason: String,
    },
}

impl Response {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Response::InvalidRequest { reason: reason.into() }
    }

    pub fn to_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(
                "{{\"Result\":\"InvalidRequest\",\"Reason\":{}}}",
                serde_json::Value::String(e.to_string())
            )
        })
    }
}
