use chrono::Utc;
use remora::classify;
use remora::headless::{DriveOptions, NetworkPolicy, fix_document_sync};
use remora::{
    DocumentDom, FixerConfig, HeadlessDom, LibraryRegistry, SnippetStore, instrument,
};
use serde::Serialize;
use std::io::Read;

#[derive(Debug)]
enum CliError {
    Usage(&'static str),
    Io(std::io::Error),
    Engine(remora::Error),
    Json(serde_json::Error),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Usage(msg) => write!(f, "{msg}"),
            CliError::Io(err) => write!(f, "I/O error: {err}"),
            CliError::Engine(err) => write!(f, "{err}"),
            CliError::Json(err) => write!(f, "JSON error: {err}"),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<remora::Error> for CliError {
    fn from(value: remora::Error) -> Self {
        Self::Engine(value)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Command {
    #[default]
    Scan,
    Fix,
    Instrument,
    Publish,
    Sweep,
}

#[derive(Debug, Default)]
struct Args {
    command: Command,
    input: Option<String>,
    pretty: bool,
    offline: bool,
    raw: bool,
    out: Option<String>,
    config: Option<String>,
    store_dir: String,
    lifetime_days: i64,
}

fn usage() -> &'static str {
    "remora-cli\n\
\n\
USAGE:\n\
  remora-cli scan [--pretty] [--config <json>] [<path>|-]\n\
  remora-cli fix [--pretty] [--offline] [--config <json>] [--out <path>] [<path>|-]\n\
  remora-cli instrument [--config <json>] [--out <path>] [<path>|-]\n\
  remora-cli publish [--store-dir <dir>] [--lifetime-days <n>] [--config <json>] [--raw] [<path>|-]\n\
  remora-cli sweep [--store-dir <dir>] [--lifetime-days <n>]\n\
\n\
NOTES:\n\
  - If <path> is omitted or '-', input is read from stdin.\n\
  - scan prints the classification (accepted containers, exclusions, referenced libraries) as JSON.\n\
  - fix runs the repair pipeline headlessly and prints diagnostics; --out writes the repaired HTML.\n\
  - --offline makes every mirror fail, exercising fallback and failure panels.\n\
  - instrument injects the bootstrap config script into the document head.\n\
  - publish instruments (unless --raw) and stores the document under an expiring key.\n\
  - Set RUST_LOG (e.g. RUST_LOG=remora_core=debug) for pipeline traces on stderr.\n\
"
}

fn parse_args(argv: &[String]) -> Result<Args, CliError> {
    let mut args = Args {
        store_dir: "uploads".to_string(),
        lifetime_days: 1,
        ..Args::default()
    };

    let mut rest = argv.iter().peekable();
    let mut command_seen = false;
    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "scan" | "fix" | "instrument" | "publish" | "sweep" if !command_seen => {
                command_seen = true;
                args.command = match arg.as_str() {
                    "scan" => Command::Scan,
                    "fix" => Command::Fix,
                    "instrument" => Command::Instrument,
                    "publish" => Command::Publish,
                    _ => Command::Sweep,
                };
            }
            "--pretty" => args.pretty = true,
            "--offline" => args.offline = true,
            "--raw" => args.raw = true,
            "--out" => {
                args.out = Some(
                    rest.next()
                        .ok_or(CliError::Usage("--out requires a path"))?
                        .clone(),
                );
            }
            "--config" => {
                args.config = Some(
                    rest.next()
                        .ok_or(CliError::Usage("--config requires a path"))?
                        .clone(),
                );
            }
            "--store-dir" => {
                args.store_dir = rest
                    .next()
                    .ok_or(CliError::Usage("--store-dir requires a path"))?
                    .clone();
            }
            "--lifetime-days" => {
                let value = rest
                    .next()
                    .ok_or(CliError::Usage("--lifetime-days requires a number"))?;
                args.lifetime_days = value
                    .parse()
                    .map_err(|_| CliError::Usage("--lifetime-days requires a number"))?;
            }
            "--help" | "-h" => return Err(CliError::Usage("")),
            other => {
                if args.input.is_some() {
                    return Err(CliError::Usage("unexpected extra argument"));
                }
                if other.starts_with("--") {
                    return Err(CliError::Usage("unknown flag"));
                }
                args.input = Some(other.to_string());
            }
        }
    }

    if !command_seen {
        return Err(CliError::Usage("missing command"));
    }
    Ok(args)
}

fn read_input(input: Option<&str>) -> Result<String, CliError> {
    match input {
        None | Some("-") => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
        Some(path) => Ok(std::fs::read_to_string(path)?),
    }
}

fn load_config(path: Option<&str>) -> Result<FixerConfig, CliError> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&raw)?)
        }
        None => Ok(FixerConfig::default()),
    }
}

fn emit<T: Serialize>(value: &T, pretty: bool) -> Result<(), CliError> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{json}");
    Ok(())
}

#[derive(Serialize)]
struct ScanOut {
    accepted: Vec<remora::classify::Candidate>,
    excluded: Vec<remora::classify::Exclusion>,
    libraries: Vec<String>,
}

fn cmd_scan(args: &Args) -> Result<(), CliError> {
    let html = read_input(args.input.as_deref())?;
    let config = load_config(args.config.as_deref())?;
    let dom = HeadlessDom::parse_document(&html);
    let classification = classify::classify(&dom, dom.root(), &config, &|_| false);

    let registry = LibraryRegistry::default_set();
    let libraries = registry
        .detect_references(&dom.script_sources())
        .into_iter()
        .map(|k| k.to_string())
        .collect();

    emit(
        &ScanOut {
            accepted: classification.accepted,
            excluded: classification.excluded,
            libraries,
        },
        args.pretty,
    )
}

fn cmd_fix(args: &Args) -> Result<(), CliError> {
    let html = read_input(args.input.as_deref())?;
    let config = load_config(args.config.as_deref())?;
    let options = DriveOptions {
        network: if args.offline {
            NetworkPolicy::Offline
        } else {
            NetworkPolicy::Online
        },
        ..DriveOptions::default()
    };

    let outcome = fix_document_sync(&html, config, options)?;
    if let Some(out) = &args.out {
        std::fs::write(out, &outcome.html)?;
    }
    emit(&outcome.diagnostics, args.pretty)
}

fn cmd_instrument(args: &Args) -> Result<(), CliError> {
    let html = read_input(args.input.as_deref())?;
    let config = load_config(args.config.as_deref())?;
    let instrumented = instrument::instrument_document(&html, &config)?;
    match &args.out {
        Some(out) => std::fs::write(out, instrumented)?,
        None => print!("{instrumented}"),
    }
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PublishOut {
    key: String,
    path: String,
    preview_path: String,
    expires_at: String,
}

fn cmd_publish(args: &Args) -> Result<(), CliError> {
    let html = read_input(args.input.as_deref())?;
    let config = load_config(args.config.as_deref())?;
    let document = if args.raw {
        html
    } else {
        instrument::instrument_document(&html, &config)?
    };

    let store = SnippetStore::new(&args.store_dir, args.lifetime_days)?;
    let stored = store.publish(&document, Utc::now())?;
    let metadata = store.metadata(&stored.key)?;

    emit(
        &PublishOut {
            key: stored.key.clone(),
            path: stored.path.display().to_string(),
            preview_path: stored.preview_path,
            expires_at: metadata.expires_at.to_rfc3339(),
        },
        args.pretty,
    )
}

#[derive(Serialize)]
struct SweepOut {
    removed: usize,
}

fn cmd_sweep(args: &Args) -> Result<(), CliError> {
    let store = SnippetStore::new(&args.store_dir, args.lifetime_days)?;
    let removed = store.sweep(Utc::now())?;
    emit(&SweepOut { removed }, args.pretty)
}

fn run(argv: &[String]) -> Result<(), CliError> {
    let args = parse_args(argv)?;
    match args.command {
        Command::Scan => cmd_scan(&args),
        Command::Fix => cmd_fix(&args),
        Command::Instrument => cmd_instrument(&args),
        Command::Publish => cmd_publish(&args),
        Command::Sweep => cmd_sweep(&args),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let argv: Vec<String> = std::env::args().skip(1).collect();
    if let Err(err) = run(&argv) {
        match err {
            CliError::Usage(msg) if msg.is_empty() => eprintln!("{}", usage()),
            CliError::Usage(msg) => eprintln!("{msg}\n\n{}", usage()),
            other => eprintln!("error: {other}"),
        }
        std::process::exit(1);
    }
}
