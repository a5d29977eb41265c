//! The `hql` command-line driver.
//!
//! `run` compiles and executes with node, rewriting runtime stack traces
//! through the source map so error lines point at HQL source. `compile`
//! writes the JavaScript and its `.map` next to the output. `repl` is a
//! minimal line loop that prints the compiled JavaScript for each form.
//! `lsp --stdio` hands the process over to the language server.

use std::{
    io::{self, BufRead, Write},
    path::{Path, PathBuf},
    process::{Command as ProcessCommand, ExitCode},
};

use clap::{Parser, Subcommand};
use hql::{CompilerSession, Emitted};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hql", version, about = "An S-expression language that compiles to JavaScript.")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a file and execute it with node.
    Run {
        /// The HQL source file.
        file: PathBuf,
    },
    /// Compile a file to JavaScript plus a source map.
    Compile {
        /// The HQL source file.
        file: PathBuf,
        /// Output path; defaults to the input with a `.js` extension.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Read forms from stdin and print the compiled JavaScript.
    Repl,
    /// Run the language server.
    Lsp {
        /// Speak LSP over stdin/stdout (the only supported transport).
        #[arg(long)]
        stdio: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env("HQL_LOG").unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run { file } => run_file(&file),
        Command::Compile { file, output } => compile_file(&file, output.as_deref()),
        Command::Repl => repl(),
        Command::Lsp { stdio: _ } => match hql_lsp::serve_stdio() {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                eprintln!("error: {err}");
                ExitCode::FAILURE
            }
        },
    }
}

fn compile_source(file: &Path) -> Result<Emitted, ExitCode> {
    let source = match std::fs::read_to_string(file) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("error reading {}: {err}", file.display());
            return Err(ExitCode::FAILURE);
        }
    };
    let mut session = CompilerSession::new();
    match session.compile(&source, &file.to_string_lossy()) {
        Ok(emitted) => Ok(emitted),
        Err(failure) => {
            eprintln!("{failure}");
            Err(ExitCode::FAILURE)
        }
    }
}

fn output_paths(file: &Path, output: Option<&Path>) -> (PathBuf, PathBuf) {
    let js = output.map_or_else(|| file.with_extension("js"), Path::to_path_buf);
    let map = js.with_extension("js.map");
    (js, map)
}

fn compile_file(file: &Path, output: Option<&Path>) -> ExitCode {
    let emitted = match compile_source(file) {
        Ok(emitted) => emitted,
        Err(code) => return code,
    };
    let (js_path, map_path) = output_paths(file, output);
    let map_name = map_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let code = format!("{}//# sourceMappingURL={map_name}\n", emitted.code);

    if let Err(err) = std::fs::write(&js_path, code) {
        eprintln!("error writing {}: {err}", js_path.display());
        return ExitCode::FAILURE;
    }
    if let Err(err) = std::fs::write(&map_path, emitted.source_map.to_json()) {
        eprintln!("error writing {}: {err}", map_path.display());
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn run_file(file: &Path) -> ExitCode {
    let emitted = match compile_source(file) {
        Ok(emitted) => emitted,
        Err(code) => return code,
    };
    let (js_path, map_path) = output_paths(file, None);
    if std::fs::write(&js_path, &emitted.code).is_err() || std::fs::write(&map_path, emitted.source_map.to_json()).is_err()
    {
        eprintln!("error writing compiled output next to {}", file.display());
        return ExitCode::FAILURE;
    }

    let output = match ProcessCommand::new("node").arg(&js_path).output() {
        Ok(output) => output,
        Err(err) => {
            eprintln!("error launching node: {err}");
            return ExitCode::FAILURE;
        }
    };

    let mut stdout = io::stdout();
    let _ = stdout.write_all(&output.stdout);
    let stderr_text = String::from_utf8_lossy(&output.stderr);
    let js_name = js_path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    if !stderr_text.is_empty() {
        for line in stderr_text.lines() {
            eprintln!("{}", rewrite_trace_line(line, &js_name, &emitted));
        }
    }

    if output.status.success() {
        ExitCode::SUCCESS
    } else {
        if let Some(error) = summarize_runtime_failure(&stderr_text, &js_name, &emitted) {
            eprintln!("{error}");
        }
        ExitCode::FAILURE
    }
}

/// Condenses a node stack trace into one mapped [`hql::RuntimeError`]:
/// the first line carrying a position inside the emitted file wins.
fn summarize_runtime_failure(stderr_text: &str, js_name: &str, emitted: &Emitted) -> Option<hql::RuntimeError> {
    let message = stderr_text
        .lines()
        .find(|line| line.contains("Error") && !line.trim_start().starts_with("at "))
        .unwrap_or("the program exited with a failure")
        .trim()
        .to_owned();
    let position = stderr_text.lines().find_map(|line| {
        let at = line.find(js_name)?;
        let (line_number, column, _) = parse_line_col(&line[at + js_name.len()..])?;
        Some((line_number, column))
    });
    let (line, column) = position?;
    Some(hql::map_runtime_error(&message, line, column, emitted))
}

/// Rewrites `file.js:LINE:COL` references in a stack-trace line back to
/// the original source position via the source map.
fn rewrite_trace_line(line: &str, js_name: &str, emitted: &Emitted) -> String {
    let Some(at) = line.find(js_name) else {
        return line.to_owned();
    };
    let suffix = &line[at + js_name.len()..];
    let Some((gen_line, gen_col, span_len)) = parse_line_col(suffix) else {
        return line.to_owned();
    };
    let Some((source, orig_line, orig_col)) = emitted.source_map.lookup(gen_line.saturating_sub(1), gen_col.saturating_sub(1))
    else {
        return line.to_owned();
    };
    format!(
        "{}{}:{}:{}{}",
        &line[..at],
        source,
        orig_line + 1,
        orig_col + 1,
        &suffix[span_len..]
    )
}

/// Parses a leading `:<line>:<col>` suffix, returning the consumed length.
fn parse_line_col(suffix: &str) -> Option<(u32, u32, usize)> {
    let rest = suffix.strip_prefix(':')?;
    let line_digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    if line_digits.is_empty() {
        return None;
    }
    let after_line = &rest[line_digits.len()..];
    let rest_col = after_line.strip_prefix(':')?;
    let col_digits: String = rest_col.chars().take_while(char::is_ascii_digit).collect();
    if col_digits.is_empty() {
        return None;
    }
    let consumed = 1 + line_digits.len() + 1 + col_digits.len();
    Some((line_digits.parse().ok()?, col_digits.parse().ok()?, consumed))
}

/// A deliberately minimal line REPL: reads forms (multi-line until the
/// parens balance), compiles them in a persistent session, and prints
/// the emitted JavaScript.
fn repl() -> ExitCode {
    let mut session = CompilerSession::new();
    let stdin = io::stdin();
    let mut buffer = String::new();
    let mut line_number = 0u32;

    print!("hql> ");
    let _ = io::stdout().flush();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        buffer.push_str(&line);
        buffer.push('\n');
        if !parens_balanced(&buffer) {
            print!("...> ");
            let _ = io::stdout().flush();
            continue;
        }

        if !buffer.trim().is_empty() {
            line_number += 1;
            match session.compile(&buffer, &format!("<repl-{line_number}>")) {
                Ok(emitted) => print!("{}", emitted.code),
                Err(failure) => eprintln!("{failure}"),
            }
        }
        buffer.clear();
        print!("hql> ");
        let _ = io::stdout().flush();
    }
    ExitCode::SUCCESS
}

/// True when every bracket opened in `text` has closed (strings ignored).
fn parens_balanced(text: &str) -> bool {
    let mut depth = 0i64;
    let mut in_string = false;
    let mut escaped = false;
    for c in text.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '(' | '[' | '{' if !in_string => depth += 1,
            ')' | ']' | '}' if !in_string => depth -= 1,
            _ => {}
        }
    }
    depth <= 0
}
