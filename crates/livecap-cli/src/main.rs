//! `livecap` replays a scripted video session and prints the caption box
//! every time it changes.

mod script;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use livecap_core::{LiveSession, SessionEvent, SessionEventListener, SettingsStore, TextSurface};

use crate::script::{CliError, ScriptLine, parse_script, replay};

const USAGE: &str = "livecap <script.jsonl> [--data-dir <dir>]";

/// Extra wait past the caption timeout so the last expiry renders before teardown.
const EXPIRY_GRACE: Duration = Duration::from_millis(50);

#[derive(Debug, PartialEq)]
struct Args {
    script: PathBuf,
    data_dir: Option<PathBuf>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args, CliError> {
    let mut script = None;
    let mut data_dir = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--data-dir" => {
                let dir = args
                    .next()
                    .ok_or_else(|| CliError::Usage(format!("--data-dir needs a value\n{USAGE}")))?;
                data_dir = Some(PathBuf::from(dir));
            }
            "-h" | "--help" => return Err(CliError::Usage(USAGE.to_string())),
            _ if script.is_none() => script = Some(PathBuf::from(&arg)),
            _ => return Err(CliError::Usage(format!("unexpected argument {arg}\n{USAGE}"))),
        }
    }
    let script = script.ok_or_else(|| CliError::Usage(USAGE.to_string()))?;
    Ok(Args { script, data_dir })
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("livecap")
}

/// Prints each render of the caption box to stdout.
struct CaptionPrinter;

impl SessionEventListener for CaptionPrinter {
    fn on_event(&self, event: SessionEvent) {
        match event {
            SessionEvent::CaptionsRendered(text) => {
                println!("---");
                if !text.is_empty() {
                    println!("{text}");
                }
            }
            other => tracing::debug!("session event: {other:?}"),
        }
    }
}

/// Replay `lines`, then wait for the remaining captions to expire on their own timers.
async fn play(
    lines: Vec<ScriptLine>,
    session: &LiveSession,
    caption_timeout: Duration,
) -> Result<(), CliError> {
    replay(lines, &session.sender()).await?;
    tokio::time::sleep(caption_timeout + EXPIRY_GRACE).await;
    Ok(())
}

async fn run(args: Args) -> Result<(), CliError> {
    let text = std::fs::read_to_string(&args.script).map_err(|source| CliError::Io {
        path: args.script.clone(),
        source,
    })?;
    let lines = parse_script(&text)?;

    let data_dir = args.data_dir.unwrap_or_else(default_data_dir);
    let settings = SettingsStore::new(&data_dir).get();
    tracing::info!(
        "replaying {} events from {} (settings from {})",
        lines.len(),
        args.script.display(),
        data_dir.display()
    );

    let session = LiveSession::init(&settings, TextSurface::new());
    session.add_listener(Arc::new(CaptionPrinter));

    let result = play(lines, &session, settings.caption_timeout()).await;
    session.dispose().await;
    result
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("livecap_core=info,livecap=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(2);
        }
    };

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
