//! Walletsync CLI - replay wallet sessions against the in-memory provider
//!
//!   walletsync replay <script.json>   → one JSON line per snapshot / step
//!   walletsync demo                   → built-in connect / switch / revoke scenario
//!
//! Output format:
//!   --pretty   Pretty-print JSON (default for tty)
//!   --json     One compact JSON object per line
//!   -v         Debug logging on stderr

use serde_json::{json, Value};
use std::env;
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing::{debug, info};
use walletsync::logging::{init_logging, init_logging_with};
use walletsync::replay::Script;

fn main() {
    let args: Vec<String> = env::args().collect();
    let opts = ParsedArgs::parse(&args[1..]);

    if opts.verbose {
        init_logging_with("walletsync=debug");
    } else {
        init_logging();
    }

    if opts.help {
        print_usage();
        return;
    }

    if opts.version {
        println!("walletsync {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    let result = match opts.command.as_deref() {
        Some("replay") => cmd_replay(&opts),
        Some("demo") => cmd_demo(),
        Some(cmd) => Err(anyhow::anyhow!("Unknown command: {}", cmd)),
        None => {
            print_usage();
            return;
        }
    };

    match result.and_then(|script| run(&script)) {
        Ok(lines) => {
            let pretty = opts.pretty || (!opts.json && std::io::stdout().is_terminal());
            for line in lines {
                let formatted = if pretty {
                    serde_json::to_string_pretty(&line)
                } else {
                    serde_json::to_string(&line)
                };
                match formatted {
                    Ok(text) => println!("{}", text),
                    Err(e) => eprintln!("{}", json!({"error": e.to_string()})),
                }
            }
        }
        Err(e) => {
            eprintln!("{}", json!({"error": format!("{:#}", e)}));
            std::process::exit(1);
        }
    }
}

fn run(script: &Script) -> anyhow::Result<Vec<Value>> {
    // Rc-based session: stay on one thread
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    info!(steps = script.steps.len(), "replaying script");
    Ok(runtime.block_on(script.run()))
}

fn cmd_replay(opts: &ParsedArgs) -> anyhow::Result<Script> {
    let path = opts
        .path
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("Usage: walletsync replay <script.json>"))?;
    debug!(path = %path.display(), "loading script");
    Script::load(path)
}

fn cmd_demo() -> anyhow::Result<Script> {
    let script = serde_json::from_value(json!({
        "provider": {"walletAccounts": ["0xAbC0000000000000000000000000000000000001"], "chainId": "0x1"},
        "config": {"reloadOnChainChange": true},
        "steps": [
            {"op": "reject", "method": "eth_requestAccounts", "code": 4001, "message": "User rejected the request."},
            {"op": "connect"},
            {"op": "snapshot"},
            {"op": "connect"},
            {"op": "sign", "message": "hello"},
            {"op": "accountsChanged", "accounts": ["0xdef0000000000000000000000000000000000002"]},
            {"op": "chainChanged", "chainId": "0x89"},
            {"op": "accountsChanged", "accounts": []},
            {"op": "snapshot"}
        ]
    }))?;
    Ok(script)
}

#[derive(Default)]
struct ParsedArgs {
    command: Option<String>,
    path: Option<PathBuf>,
    json: bool,
    pretty: bool,
    verbose: bool,
    help: bool,
    version: bool,
}

impl ParsedArgs {
    fn parse(args: &[String]) -> Self {
        let mut opts = ParsedArgs::default();
        for arg in args {
            match arg.as_str() {
                "--json" => opts.json = true,
                "--pretty" => opts.pretty = true,
                "-v" | "--verbose" => opts.verbose = true,
                "-h" | "--help" => opts.help = true,
                "-V" | "--version" => opts.version = true,
                other if opts.command.is_none() => opts.command = Some(other.to_string()),
                other if opts.path.is_none() => opts.path = Some(PathBuf::from(other)),
                _ => {}
            }
        }
        opts
    }
}

fn print_usage() {
    println!(
        "walletsync - wallet session replay

USAGE:
    walletsync replay <script.json> [--json|--pretty] [-v]
    walletsync demo [--json|--pretty] [-v]

ENV:
    RUST_LOG              log filter (default: info)
    WALLETSYNC_LOG_JSON   1 for JSON logs on stderr"
    );
}
