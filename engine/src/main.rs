use log::{error, info};
use queue_engine::logger::init_logger;
use queue_engine::{QueueFile, QueueFileConfig};
use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

const CONFIG_FILE: &str = "queue-agent.toml";

/// Small command-line front end for exercising a queue file from the shell:
///
/// ```text
/// queue-agent <path> add <payload>
/// queue-agent <path> peek
/// queue-agent <path> remove
/// queue-agent <path> size
/// queue-agent <path> clear
/// ```
fn main() -> ExitCode {
    let _logger = match init_logger() {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("failed to initialize logger: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut args = env::args().skip(1);
    let (path, command, rest) = match (args.next(), args.next()) {
        (Some(path), Some(command)) => (PathBuf::from(path), command, args.collect::<Vec<_>>()),
        _ => {
            eprintln!("usage: queue-agent <path> <add <payload>|peek|remove|size|clear>");
            return ExitCode::FAILURE;
        }
    };

    let config = load_config();
    let mut queue = match QueueFile::open_with_config(&path, config) {
        Ok(q) => q,
        Err(e) => {
            error!("failed to open queue file {}: {e}", path.display());
            return ExitCode::FAILURE;
        }
    };

    let result = match command.as_str() {
        "add" => {
            let payload = rest.join(" ");
            queue.add(payload.as_bytes()).map(|_| {
                info!("added {} bytes", payload.len());
                println!("ok");
            })
        }
        "peek" => queue.peek().map(|record| match record {
            Some(bytes) => println!("{}", String::from_utf8_lossy(&bytes)),
            None => println!("<empty>"),
        }),
        "remove" => queue.remove().map(|_| println!("ok")),
        "size" => {
            println!("{}", queue.size());
            Ok(())
        }
        "clear" => queue.clear().map(|_| println!("ok")),
        other => {
            eprintln!("unknown command: {other}");
            return ExitCode::FAILURE;
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{command} failed: {e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn load_config() -> QueueFileConfig {
    let path = Path::new(CONFIG_FILE);
    if !path.exists() {
        return QueueFileConfig::default();
    }
    QueueFileConfig::load(path).unwrap_or_else(|e| {
        error!("ignoring invalid {CONFIG_FILE}: {e}");
        QueueFileConfig::default()
    })
}
