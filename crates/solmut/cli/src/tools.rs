//! External parser, printer and compiler processes.
//!
//! Each tool is a command line that reads its input on stdin and writes its
//! result on stdout. The engine drives tools through synchronous traits, so
//! every call runs the process on the ambient tokio runtime and blocks the
//! current worker until it finishes.

use solmut_ast::{Ast, AstError, Parser, Printer};
use solmut_core::compile::{parse_standard_output, standard_input};
use solmut_core::{CompileError, CompileMode, CompileOutcome, Compiler};
use std::future::Future;
use std::io;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::runtime::Handle;
use tokio::time::timeout;
use tracing::{debug, warn};

/// A program and its arguments, read from a whitespace separated line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace().map(str::to_string);
        let program = words.next()?;
        Some(Self {
            program,
            args: words.collect(),
        })
    }
}

/// How a tool invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Finished {
        /// `None` when the process was killed by a signal.
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },
    TimedOut,
}

/// Run `command` with `input` on stdin and collect its output.
pub async fn run_command(command: &CommandLine, input: &str, limit: Duration) -> io::Result<RunOutcome> {
    let mut child = Command::new(&command.program)
        .args(&command.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    // Feed stdin concurrently so a chatty child cannot fill its stdout pipe
    // while we are still writing.
    let writer = child.stdin.take().map(|mut stdin| {
        let input = input.as_bytes().to_vec();
        tokio::spawn(async move {
            let result = stdin.write_all(&input).await;
            drop(stdin);
            result
        })
    });

    let output = match timeout(limit, child.wait_with_output()).await {
        Ok(output) => output?,
        Err(_) => {
            warn!(program = %command.program, ?limit, "tool timed out");
            return Ok(RunOutcome::TimedOut);
        }
    };

    if let Some(writer) = writer {
        match writer.await {
            Ok(Ok(())) => {}
            // Tools may exit before reading all of their input.
            Ok(Err(e)) if e.kind() == io::ErrorKind::BrokenPipe => {}
            Ok(Err(e)) => return Err(e),
            Err(e) => return Err(io::Error::new(io::ErrorKind::Other, e)),
        }
    }

    debug!(program = %command.program, code = ?output.status.code(), "tool finished");
    Ok(RunOutcome::Finished {
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Drive `future` to completion from synchronous code.
fn block_on<F: Future>(future: F) -> io::Result<F::Output> {
    match Handle::try_current() {
        Ok(handle) => Ok(tokio::task::block_in_place(|| handle.block_on(future))),
        Err(_) => {
            let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
            Ok(runtime.block_on(future))
        }
    }
}

fn run_blocking(command: &CommandLine, input: &str, limit: Duration) -> io::Result<RunOutcome> {
    block_on(run_command(command, input, limit))?
}

/// Parser backed by an external program emitting the JSON tree.
#[derive(Debug, Clone)]
pub struct CommandParser {
    command: CommandLine,
    timeout: Duration,
}

impl CommandParser {
    pub fn new(command: CommandLine, timeout: Duration) -> Self {
        Self { command, timeout }
    }
}

impl Parser for CommandParser {
    fn parse(&self, source: &str) -> Result<Ast, AstError> {
        match run_blocking(&self.command, source, self.timeout) {
            Ok(RunOutcome::Finished {
                code: Some(0), stdout, ..
            }) => Ast::from_json_str(&stdout),
            Ok(RunOutcome::Finished { code, stderr, .. }) => Err(AstError::Parse(format!(
                "{} exited with {:?}: {}",
                self.command.program,
                code,
                stderr.trim()
            ))),
            Ok(RunOutcome::TimedOut) => Err(AstError::Parse(format!("{} timed out", self.command.program))),
            Err(e) => Err(AstError::Parse(format!("failed to run {}: {}", self.command.program, e))),
        }
    }
}

/// Printer backed by an external program reading the JSON tree.
#[derive(Debug, Clone)]
pub struct CommandPrinter {
    command: CommandLine,
    timeout: Duration,
}

impl CommandPrinter {
    pub fn new(command: CommandLine, timeout: Duration) -> Self {
        Self { command, timeout }
    }
}

impl Printer for CommandPrinter {
    fn print(&self, ast: &Ast) -> Result<String, AstError> {
        match run_blocking(&self.command, &ast.to_json_string(), self.timeout) {
            Ok(RunOutcome::Finished {
                code: Some(0), stdout, ..
            }) => Ok(stdout),
            Ok(RunOutcome::Finished { code, stderr, .. }) => Err(AstError::Print(format!(
                "{} exited with {:?}: {}",
                self.command.program,
                code,
                stderr.trim()
            ))),
            Ok(RunOutcome::TimedOut) => Err(AstError::Print(format!("{} timed out", self.command.program))),
            Err(e) => Err(AstError::Print(format!("failed to run {}: {}", self.command.program, e))),
        }
    }
}

/// Standard-JSON compiler such as `solc --standard-json`.
#[derive(Debug, Clone)]
pub struct SolcCompiler {
    command: CommandLine,
    timeout: Duration,
    optimize: bool,
}

impl SolcCompiler {
    pub fn new(command: CommandLine, timeout: Duration, optimize: bool) -> Self {
        Self {
            command,
            timeout,
            optimize,
        }
    }
}

impl Compiler for SolcCompiler {
    fn compile(&self, source: &str, mode: CompileMode) -> Result<CompileOutcome, CompileError> {
        let input = standard_input(source, self.optimize).to_string();
        let outcome = run_blocking(&self.command, &input, self.timeout).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => {
                CompileError::Spawn(format!("{}: {}", self.command.program, e))
            }
            _ => CompileError::Io(e.to_string()),
        })?;

        match outcome {
            RunOutcome::TimedOut => Ok(CompileOutcome::Rejected),
            RunOutcome::Finished {
                code: Some(0 | 1),
                stdout,
                ..
            } => parse_standard_output(&stdout, mode),
            RunOutcome::Finished { code, stderr, .. } => Err(CompileError::Crashed(format!(
                "exit status {:?}: {}",
                code,
                stderr.trim()
            ))),
        }
    }
}

/// Reads and writes trees as their JSON text. Used when no external parser
/// or printer is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonAst;

impl Parser for JsonAst {
    fn parse(&self, source: &str) -> Result<Ast, AstError> {
        Ast::from_json_str(source)
    }
}

impl Printer for JsonAst {
    fn print(&self, ast: &Ast) -> Result<String, AstError> {
        Ok(ast.to_json_string())
    }
}
