//! Configuration for the solmut driver

use serde::{Deserialize, Serialize};
use solmut_core::{seed_from_text, EngineConfig, MutationKind};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SolmutConfig {
    /// Search engine configuration
    #[serde(default)]
    pub engine: EngineSection,

    /// External tool configuration
    #[serde(default)]
    pub tools: ToolsSection,

    /// Output configuration
    #[serde(default)]
    pub output: OutputSection,

    /// Process configuration
    #[serde(default)]
    pub runtime: RuntimeSection,
}

/// Search engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSection {
    /// Longest mutation sequence to generate
    #[serde(default)]
    pub max_distance: Option<usize>,

    /// Enabled mutation kinds
    #[serde(default = "default_kinds")]
    pub kinds: Vec<String>,

    /// Kinds every returned sequence must use
    #[serde(default)]
    pub must_include: Vec<String>,

    /// Node types offered for insertion and replacement; empty means all supported
    #[serde(default)]
    pub new_node_types: Vec<String>,

    /// Node types that may be replaced; empty means all supported
    #[serde(default)]
    pub replaceable_node_types: Vec<String>,

    /// Only keep mutants the compiler accepts
    #[serde(default = "default_true")]
    pub only_compilable: bool,

    /// Skip mutants whose bytecode was produced before
    #[serde(default = "default_true")]
    pub skip_same_bin: bool,

    /// Textual RNG seed
    #[serde(default = "default_seed")]
    pub seed: String,

    /// Turn empty `if` statements into their condition before printing
    #[serde(default)]
    pub simplify: bool,

    /// Keep moved statements inside their function
    #[serde(default = "default_true")]
    pub only_same_function: bool,

    /// Region specifier limiting the initial fault space
    #[serde(default)]
    pub mutation_space: Option<String>,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            max_distance: None,
            kinds: default_kinds(),
            must_include: Vec::new(),
            new_node_types: Vec::new(),
            replaceable_node_types: Vec::new(),
            only_compilable: true,
            skip_same_bin: true,
            seed: default_seed(),
            simplify: false,
            only_same_function: true,
            mutation_space: None,
        }
    }
}

/// External tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsSection {
    /// Command turning source on stdin into a JSON tree on stdout
    #[serde(default)]
    pub parser_cmd: Option<String>,

    /// Command turning a JSON tree on stdin into source on stdout
    #[serde(default)]
    pub printer_cmd: Option<String>,

    /// Standard-JSON compiler command
    #[serde(default = "default_compiler")]
    pub compiler_cmd: String,

    /// Compile timeout in seconds
    #[serde(default = "default_compile_timeout")]
    pub compile_timeout_secs: u64,

    /// Enable the compiler optimizer
    #[serde(default)]
    pub optimize: bool,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            parser_cmd: None,
            printer_cmd: None,
            compiler_cmd: default_compiler(),
            compile_timeout_secs: default_compile_timeout(),
            optimize: false,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputSection {
    /// Directory receiving `<n>.sol` files
    #[serde(default)]
    pub patched_src_dir: Option<PathBuf>,

    /// Also write `<n>.sol.mutation` files
    #[serde(default)]
    pub output_mutation: bool,
}

/// Process configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeSection {
    /// Directory polled for termination marker files
    #[serde(default = "default_marker_dir")]
    pub marker_dir: PathBuf,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format, `text` or `json`
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            marker_dir: default_marker_dir(),
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

// Default value helpers
fn default_true() -> bool {
    true
}

fn default_kinds() -> Vec<String> {
    MutationKind::ALL.iter().map(|k| k.to_string()).collect()
}

fn default_seed() -> String {
    "lucky-seed".to_string()
}

fn default_compiler() -> String {
    "solc --standard-json".to_string()
}

fn default_compile_timeout() -> u64 {
    60
}

fn default_marker_dir() -> PathBuf {
    std::env::temp_dir()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn parse_kinds(names: &[String]) -> anyhow::Result<BTreeSet<MutationKind>> {
    names
        .iter()
        .map(|name| name.parse::<MutationKind>().map_err(anyhow::Error::msg))
        .collect()
}

impl SolmutConfig {
    /// Load configuration from defaults, an optional file and `SOLMUT__*` variables
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&SolmutConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("SOLMUT")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("engine.kinds")
                .with_list_parse_key("engine.must_include")
                .with_list_parse_key("engine.new_node_types")
                .with_list_parse_key("engine.replaceable_node_types")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Engine settings derived from the `engine` section
    pub fn engine_config(&self) -> anyhow::Result<EngineConfig> {
        let defaults = EngineConfig::default();
        let engine = &self.engine;
        Ok(EngineConfig {
            max_distance: engine.max_distance,
            kinds: parse_kinds(&engine.kinds)?,
            must_include: parse_kinds(&engine.must_include)?,
            new_node_types: if engine.new_node_types.is_empty() {
                defaults.new_node_types
            } else {
                engine.new_node_types.clone()
            },
            replaceable_node_types: if engine.replaceable_node_types.is_empty() {
                defaults.replaceable_node_types
            } else {
                engine.replaceable_node_types.clone()
            },
            only_compilable: engine.only_compilable,
            skip_same_bin: engine.skip_same_bin,
            seed: seed_from_text(&engine.seed),
            only_same_function: engine.only_same_function,
        })
    }

    /// Marker that stops every running generator
    pub fn global_marker(&self) -> PathBuf {
        self.runtime.marker_dir.join("solmut-terminate-all")
    }

    /// Marker that stops the generator of process `pid`
    pub fn process_marker(&self, pid: u32) -> PathBuf {
        self.runtime.marker_dir.join(format!("solmut-terminate-{}", pid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = SolmutConfig::default();
        assert!(config.engine.only_compilable);
        assert!(config.engine.skip_same_bin);
        assert_eq!(config.engine.seed, "lucky-seed");
        assert_eq!(config.tools.compile_timeout_secs, 60);
        assert!(!config.tools.optimize);
        assert!(config.output.patched_src_dir.is_none());
    }

    #[test]
    fn test_engine_config_defaults() {
        let engine = SolmutConfig::default().engine_config().unwrap();
        assert_eq!(engine.kinds.len(), 4);
        assert!(engine.must_include.is_empty());
        assert_eq!(engine.seed, seed_from_text("lucky-seed"));
        assert!(!engine.new_node_types.is_empty());
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let mut config = SolmutConfig::default();
        config.engine.kinds = vec!["DeletionM".into(), "teleport".into()];
        let err = config.engine_config().unwrap_err();
        assert!(err.to_string().contains("teleport"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[engine]\nmax_distance = 3\nkinds = [\"deletion\"]\nseed = \"other\"\n\n[output]\noutput_mutation = true"
        )
        .unwrap();

        let config = SolmutConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.engine.max_distance, Some(3));
        assert!(config.output.output_mutation);
        assert!(config.engine.only_compilable);

        let engine = config.engine_config().unwrap();
        assert_eq!(engine.kinds, BTreeSet::from([MutationKind::Deletion]));
        assert_eq!(engine.seed, seed_from_text("other"));
    }

    #[test]
    fn test_markers() {
        let mut config = SolmutConfig::default();
        config.runtime.marker_dir = PathBuf::from("/run/solmut");
        assert_eq!(config.global_marker(), PathBuf::from("/run/solmut/solmut-terminate-all"));
        assert_eq!(config.process_marker(42), PathBuf::from("/run/solmut/solmut-terminate-42"));
    }
}
