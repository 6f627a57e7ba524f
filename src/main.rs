use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use otoshi_patcher::errors::{PatcherError, Result};
use otoshi_patcher::logging;
use otoshi_patcher::models::{Platform, VersionDescriptor};
use otoshi_patcher::services::{
    ChannelSink, FixedPatchTool, InstallOrchestrator, NoopPresence, PresenceChannel,
    PreinstalledRuntime,
};
use otoshi_patcher::PatcherConfig;

const USAGE: &str = "usage: otoshi-patcher <version.json> [--tool <path>] [--check]";

struct Args {
    version_path: PathBuf,
    tool: Option<PathBuf>,
    check_only: bool,
}

fn parse_args() -> Result<Args> {
    let mut version_path = None;
    let mut tool = None;
    let mut check_only = false;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--tool" => {
                let value = args
                    .next()
                    .ok_or_else(|| PatcherError::Config("--tool needs a path".to_string()))?;
                tool = Some(PathBuf::from(value));
            }
            "--check" => check_only = true,
            other if other.starts_with("--") => {
                return Err(PatcherError::Config(format!("unknown flag {other}")));
            }
            other => version_path = Some(PathBuf::from(other)),
        }
    }
    Ok(Args {
        version_path: version_path.ok_or_else(|| PatcherError::Config(USAGE.to_string()))?,
        tool,
        check_only,
    })
}

fn default_tool_path(config: &PatcherConfig) -> PathBuf {
    if let Ok(value) = std::env::var("OTOSHI_PATCH_TOOL") {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }
    let name = if cfg!(target_os = "windows") {
        "patch-tool.exe"
    } else {
        "patch-tool"
    };
    config.game_root.join("tools").join(name)
}

fn load_version(path: &Path) -> Result<VersionDescriptor> {
    let data = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}

async fn run() -> Result<bool> {
    let args = parse_args()?;
    let config = PatcherConfig::from_env();
    if let Err(err) = logging::init(&config.log_dir) {
        eprintln!("logging disabled: {err}");
    }
    tracing::info!("patcher starting, game root {}", config.game_root.display());

    let version = load_version(&args.version_path)?;
    let tool = args.tool.unwrap_or_else(|| default_tool_path(&config));

    let (sink, mut events) = ChannelSink::channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(err) => tracing::warn!("could not encode event: {}", err),
            }
        }
    });

    let presence: Arc<dyn PresenceChannel> = Arc::new(NoopPresence);
    presence.connect();
    let orchestrator = InstallOrchestrator::from_config(
        &config,
        Arc::new(PreinstalledRuntime::new(Platform::current())),
        Arc::new(FixedPatchTool::new(tool)),
        Arc::new(sink),
    )?
    .with_presence(Arc::clone(&presence));

    let outcome = if args.check_only {
        orchestrator.is_installed(&version)
    } else {
        orchestrator.install(&version).await.map(|_| true)
    };

    drop(orchestrator);
    presence.disconnect();
    let _ = printer.await;
    outcome
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            eprintln!("{err}");
            ExitCode::from(2)
        }
    }
}
