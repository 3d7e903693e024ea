//! `sieve` binary entry point (spec.md §6 "CLI surface"): wires
//! [`cli::Command`] onto `sieve-syntax`/`sieve-compile`/`sieve-runtime`/
//! `sieve-storage`, mapping the outcome onto the exit codes `error`
//! defines.

mod cli;
mod error;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use clap::Parser;

use cli::{Cli, Command, StorageArgs};
use error::CliError;
use sieve_bytecode::{dump_binary, Binary};
use sieve_core::diag::{Diagnostics, StderrSink};
use sieve_core::instance::Instance;
use sieve_runtime::{ExecutionContext, Interpreter, MemoryMessage, PrintTracer};
use sieve_storage::Storage;

fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    match run(cli.command) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("sieve: {e}");
            std::process::exit(e.exit_code());
        }
    }
}

fn run(command: Command) -> Result<i32, CliError> {
    match command {
        Command::Test {
            script,
            message,
            envelope_from,
            envelope_to,
            trace,
        } => run_test(&script, &message, envelope_from, envelope_to, trace),
        Command::Dump { script } => run_dump(&script),
        Command::Compile { script, output } => run_compile(&script, &output),
        Command::Save { storage, name, script } => run_save(&storage, &name, &script),
        Command::Activate { storage, name } => run_activate(&storage, &name),
        Command::Deactivate { storage } => run_deactivate(&storage),
        Command::List { storage } => run_list(&storage),
        Command::Delete { storage, name } => run_delete(&storage, &name),
        Command::Rename { storage, old_name, new_name } => run_rename(&storage, &old_name, &new_name),
    }
}

/// Compile `path`'s source against a fresh [`Instance`], reporting
/// diagnostics to stderr. `Ok(None)` means validation failed (errors
/// were already printed); the caller maps that to exit code 65.
fn compile_file(path: &Path) -> Result<(Instance, Option<Binary>), CliError> {
    let source = fs::read_to_string(path).map_err(CliError::Io)?;
    let filename = path.display().to_string();
    let mut diag = Diagnostics::new(Rc::new(StderrSink), 25);
    let ast = sieve_syntax::parse_script(&source, &filename, &mut diag);
    let mut instance = Instance::new(whoami(), home_dir());
    let binary = sieve_compile::compile(&ast, &mut instance, &filename, &mut diag);
    Ok((instance, binary))
}

fn whoami() -> String {
    std::env::var("USER").unwrap_or_else(|_| "sieve".to_owned())
}

fn home_dir() -> String {
    std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_owned())
}

fn run_dump(script: &Path) -> Result<i32, CliError> {
    let (_instance, binary) = compile_file(script)?;
    let Some(binary) = binary else {
        return Ok(65);
    };
    print!("{}", dump_binary(&binary));
    Ok(0)
}

fn run_compile(script: &Path, output: &Path) -> Result<i32, CliError> {
    let (_instance, binary) = compile_file(script)?;
    let Some(binary) = binary else {
        return Ok(65);
    };
    binary.save(output).map_err(|e| CliError::Io(std::io::Error::other(e.to_string())))?;
    Ok(0)
}

fn run_test(
    script: &Path,
    message_path: &Path,
    envelope_from: Option<String>,
    envelope_to: Option<String>,
    trace: bool,
) -> Result<i32, CliError> {
    let (instance, binary) = compile_file(script)?;
    let Some(binary) = binary else {
        return Ok(65);
    };

    let raw = fs::read_to_string(message_path).map_err(CliError::Io)?;
    let mut msg = parse_test_message(&raw);
    if let Some(from) = envelope_from {
        msg = msg.with_envelope("from", from);
    }
    if let Some(to) = envelope_to {
        msg = msg.with_envelope("to", to);
    }

    let limits = instance.limits();
    let interp = Interpreter::new(limits);
    let mut ctx = ExecutionContext::new(&mut msg, limits);
    if trace {
        ctx = ctx.with_tracer(Box::new(PrintTracer));
    }
    let filename = script.display().to_string();
    let actions = interp
        .run(Rc::new(binary), &filename, &mut ctx)
        .map_err(CliError::Runtime)?;

    for pending in &actions {
        println!("{}", pending.action.print());
        for effect in &pending.effects {
            println!("  {}", effect.print());
        }
    }
    Ok(0)
}

/// Parse an RFC-5322-ish test message: headers, a blank line, then the
/// body (spec.md §6 CLI surface: "a test message (headers, blank line,
/// body)"). Folded header lines (leading whitespace continuing the
/// previous header) are unfolded per RFC 5322 §2.2.3.
fn parse_test_message(raw: &str) -> MemoryMessage {
    let mut msg = MemoryMessage::new();
    let mut lines = raw.split('\n').peekable();
    let mut current: Option<(String, String)> = None;
    while let Some(line) = lines.peek() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            lines.next();
            break;
        }
        if (line.starts_with(' ') || line.starts_with('\t')) && current.is_some() {
            let (_, value) = current.as_mut().unwrap();
            value.push(' ');
            value.push_str(line.trim());
        } else {
            if let Some((name, value)) = current.take() {
                msg = msg.with_header(name, value);
            }
            if let Some((name, value)) = line.split_once(':') {
                current = Some((name.trim().to_owned(), value.trim().to_owned()));
            }
        }
        lines.next();
    }
    if let Some((name, value)) = current.take() {
        msg = msg.with_header(name, value);
    }
    let body: Vec<&str> = lines.collect();
    msg.with_body(body.join("\n"))
}

fn parse_storage_options(args: &[String]) -> Result<BTreeMap<String, String>, CliError> {
    let mut options = BTreeMap::new();
    for arg in args {
        let (key, value) = arg
            .split_once('=')
            .ok_or_else(|| CliError::Usage(format!("--option {arg:?} must be KEY=VALUE")))?;
        options.insert(key.to_owned(), value.to_owned());
    }
    Ok(options)
}

fn open_storage(args: &StorageArgs) -> Result<Box<dyn Storage>, CliError> {
    let options = parse_storage_options(&args.options)?;
    let mut storage = sieve_storage::open_storage(&args.driver, &args.storage_name, &options)?;
    storage.init()?;
    Ok(storage)
}

fn run_save(args: &StorageArgs, name: &str, script: &Path) -> Result<i32, CliError> {
    let source = fs::read_to_string(script).map_err(CliError::Io)?;
    let mut storage = open_storage(args)?;
    storage.save_script(name, &source)?;
    Ok(0)
}

fn run_activate(args: &StorageArgs, name: &str) -> Result<i32, CliError> {
    let storage = open_storage(args)?;
    let script = storage.get_script(name)?;
    script.activate()?;
    Ok(0)
}

fn run_deactivate(args: &StorageArgs) -> Result<i32, CliError> {
    let mut storage = open_storage(args)?;
    storage.deactivate()?;
    Ok(0)
}

fn run_list(args: &StorageArgs) -> Result<i32, CliError> {
    let storage = open_storage(args)?;
    let active = storage.active_script_get_name()?;
    for name in storage.list()? {
        let marker = if Some(&name) == active.as_ref() { "*" } else { " " };
        println!("{marker} {name}");
    }
    Ok(0)
}

fn run_delete(args: &StorageArgs, name: &str) -> Result<i32, CliError> {
    let mut storage = open_storage(args)?;
    storage.delete_script(name)?;
    Ok(0)
}

fn run_rename(args: &StorageArgs, old_name: &str, new_name: &str) -> Result<i32, CliError> {
    let storage = open_storage(args)?;
    let mut script = storage.get_script(old_name)?;
    script.rename(new_name)?;
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_headers_and_body_with_folding() {
        let msg = parse_test_message("Subject: Summer\n sale!\nFrom: a@b.com\n\nHello there.\n");
        assert_eq!(msg.header("Subject"), vec!["Summer sale!".to_owned()]);
        assert_eq!(msg.header("From"), vec!["a@b.com".to_owned()]);
        assert_eq!(msg.body(""), vec!["Hello there.\n".to_owned()]);
    }

    #[test]
    fn storage_options_parse_key_value_pairs() {
        let opts = parse_storage_options(&["script_path=/tmp/s".to_owned()]).unwrap();
        assert_eq!(opts.get("script_path").map(String::as_str), Some("/tmp/s"));
    }

    #[test]
    fn storage_options_reject_missing_equals() {
        assert!(parse_storage_options(&["bogus".to_owned()]).is_err());
    }
}
