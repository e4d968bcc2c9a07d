// ABOUTME: Standalone CLI driver that runs a .flow script through the full pipeline

mod ast;
mod builtins;
mod config;
mod error;
mod host;
mod interpreter;
mod lexer;
mod module;
mod parser;
mod sandbox;
mod symbol_table;
mod token;
mod value;

use clap::Parser as ClapParser;
use config::{FsConfig, NetConfig};
use error::FlowbyError;
use host::DefaultHost;
use interpreter::{ExecError, Interpreter};
use module::ModuleLoader;
use sandbox::Sandbox;
use std::path::PathBuf;
use std::rc::Rc;

/// Runs a Flowby `.flow` script to completion.
#[derive(ClapParser, Debug)]
#[command(name = "flowby")]
#[command(version = config::VERSION)]
#[command(about = "Lexer, parser and evaluator for the Flowby scripting language")]
struct CliArgs {
    /// Script file to execute
    #[arg(value_name = "FILE")]
    script: PathBuf,

    /// Add an allowed filesystem path for file-reading builtins (can be repeated)
    #[arg(long = "fs-sandbox", value_name = "PATH", action = clap::ArgAction::Append)]
    fs_paths: Vec<PathBuf>,

    /// Maximum file size readable through the sandbox, in bytes
    #[arg(long = "max-file-size", value_name = "BYTES", default_value = "10485760")]
    max_file_size: usize,

    /// Enable the `http` namespace and network-backed actions
    #[arg(long = "allow-network")]
    allow_network: bool,

    /// Add an allowed network address for `http`/actions (host:port, can be repeated)
    #[arg(long = "net-allow", value_name = "ADDR", action = clap::ArgAction::Append)]
    net_addresses: Vec<String>,

    /// Treat `input()` as interactive (reads from stdin instead of erroring
    /// when no queued answer is available)
    #[arg(long = "interactive")]
    interactive: bool,

    /// Queue an answer for a future `input()` call, consumed in order given
    /// (can be repeated)
    #[arg(long = "input", value_name = "ANSWER", action = clap::ArgAction::Append)]
    queued_inputs: Vec<String>,
}

fn main() {
    let args = CliArgs::parse();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let exit_code = run(&args);
    std::process::exit(exit_code);
}

fn run(args: &CliArgs) -> i32 {
    config::load_environment(Some(&args.script));

    let source = match std::fs::read_to_string(&args.script) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("cannot read script {}: {}", args.script.display(), e);
            return 1;
        }
    };

    let file_name = args.script.display().to_string();

    let tokens = match lexer::tokenize(&source) {
        Ok(tokens) => tokens,
        Err(e) => {
            let err = FlowbyError::from(e);
            eprintln!("{}", err.render(&file_name, &source));
            return 1;
        }
    };

    let (program, warnings) = match parser::parse(tokens) {
        Ok(parsed) => parsed,
        Err(e) => {
            let err = FlowbyError::from(e);
            eprintln!("{}", err.render(&file_name, &source));
            return 1;
        }
    };

    for warning in &warnings {
        eprint!("warning");
        if let Some(code) = &warning.code {
            eprint!("[{}]", code);
        }
        eprintln!(": {} (line {})", warning.message, warning.line);
    }

    let fs_config = build_fs_config(args);
    let net_config = build_net_config(args);
    let sandbox = match Sandbox::new(fs_config, net_config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("failed to initialize sandbox: {}", e);
            return 1;
        }
    };

    let host = DefaultHost::new(sandbox, args.interactive);
    if !args.queued_inputs.is_empty() {
        host.queue_input(args.queued_inputs.iter().rev().cloned().collect());
    }

    let base_dir = args
        .script
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let loader = Rc::new(ModuleLoader::new(base_dir));

    let mut interpreter = Interpreter::new(&host, loader);
    match interpreter.run_program(&program) {
        Ok(()) => 0,
        Err(ExecError::Exit(code, message)) => {
            if let Some(msg) = message {
                println!("{}", msg);
            }
            code
        }
        Err(ExecError::Runtime(e)) => {
            let err = FlowbyError::from(e);
            eprintln!("{}", err.render(&file_name, &source));
            1
        }
    }
}

/// Build filesystem configuration from CLI arguments
fn build_fs_config(args: &CliArgs) -> FsConfig {
    let allowed_paths = if args.fs_paths.is_empty() {
        args.script
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| vec![p.to_path_buf()])
            .unwrap_or_else(|| vec![PathBuf::from(".")])
    } else {
        args.fs_paths.clone()
    };

    FsConfig {
        allowed_paths,
        max_file_size: args.max_file_size,
    }
}

/// Build network configuration from CLI arguments
fn build_net_config(args: &CliArgs) -> NetConfig {
    NetConfig {
        enabled: args.allow_network,
        allowed_addresses: args.net_addresses.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> CliArgs {
        CliArgs {
            script: PathBuf::from("script.flow"),
            fs_paths: vec![],
            max_file_size: 10485760,
            allow_network: false,
            net_addresses: vec![],
            interactive: false,
            queued_inputs: vec![],
        }
    }

    #[test]
    fn build_fs_config_defaults_to_script_directory() {
        let mut args = base_args();
        args.script = PathBuf::from("/scripts/hello.flow");
        let config = build_fs_config(&args);
        assert_eq!(config.allowed_paths, vec![PathBuf::from("/scripts")]);
        assert_eq!(config.max_file_size, 10485760);
    }

    #[test]
    fn build_fs_config_honors_explicit_paths() {
        let mut args = base_args();
        args.fs_paths = vec![PathBuf::from("/tmp/safe")];
        let config = build_fs_config(&args);
        assert_eq!(config.allowed_paths, vec![PathBuf::from("/tmp/safe")]);
    }

    #[test]
    fn build_net_config_disabled_by_default() {
        let config = build_net_config(&base_args());
        assert!(!config.enabled);
        assert!(config.allowed_addresses.is_empty());
    }

    #[test]
    fn build_net_config_enabled_with_allowlist() {
        let mut args = base_args();
        args.allow_network = true;
        args.net_addresses = vec!["api.example.com:443".to_string()];
        let config = build_net_config(&args);
        assert!(config.enabled);
        assert_eq!(config.allowed_addresses, vec!["api.example.com:443".to_string()]);
    }
}
