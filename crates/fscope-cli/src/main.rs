//! fscope — an interactive editor/browser for on-disk filesystem metadata.
//!
//! Startup sequencing: resolve configuration (flags over config file over
//! defaults), parse the descriptor catalogue, build the engine's command
//! scopes, open the device and work out geometry, hook the resize signal,
//! then hand control to the session loop (or script runner). Startup
//! failures abort with a non-zero exit status; a normal `quit` exits 0.

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{Context, Result};
use clap::Parser;
use fscope_engine::{Engine, Session, TypeRegistry};
use fscope_ext2::Geometry;

mod commands;
mod config;
mod output;
mod repl;

use commands::FsContext;
use config::{ConfigFile, Settings};
use fscope_engine::command::DEFAULT_COMMAND_CAPACITY;
use fscope_engine::history::DEFAULT_HISTORY_CAPACITY;
use fscope_engine::types::DEFAULT_TYPE_CAPACITY;

#[derive(Parser)]
#[command(name = "fscope")]
#[command(
    author,
    version,
    about = "Structure-aware editor for on-disk filesystem metadata"
)]
struct Cli {
    /// Block device or image file to open.
    device: Option<PathBuf>,

    /// Descriptor catalogue (structure layouts).
    #[arg(long)]
    descriptors: Option<PathBuf>,

    /// Additional descriptor file, appended after the primary catalogue.
    #[arg(long)]
    alternate: Option<PathBuf>,

    /// JSON configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Change-log destination.
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Disable change logging.
    #[arg(long)]
    no_log: bool,

    /// Permit `enablewrite` (the session still starts read-only).
    #[arg(long)]
    write: bool,

    /// Allow opening a mounted device for reading.
    #[arg(long)]
    allow_mounted_read: bool,

    /// Proceed with default geometry when ext2 autodetection fails.
    #[arg(long)]
    force_ext2: bool,

    /// Skip ext2 autodetection and use the default geometry.
    #[arg(long)]
    force_default: bool,

    /// Fallback block size.
    #[arg(long)]
    block_size: Option<u64>,

    /// Fallback total block count.
    #[arg(long)]
    total_blocks: Option<u64>,

    /// Fallback blocks per group.
    #[arg(long)]
    blocks_per_group: Option<u64>,

    /// Execute a command and continue (repeatable); implies script mode.
    #[arg(short = 'c', long = "command")]
    commands: Vec<String>,

    /// Execute commands from a file (`-` for stdin) instead of the REPL.
    #[arg(long)]
    script: Option<PathBuf>,

    /// In script mode, report errors and keep going.
    #[arg(long)]
    continue_on_error: bool,

    /// In script mode, do not echo commands.
    #[arg(long)]
    quiet: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("FSCOPE_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = resolve_settings(&cli)?;

    // Descriptor catalogue: primary source plus optional alternate,
    // appended in order. Malformed input is fatal here, before any device
    // is touched.
    let mut structs = load_descriptors(&settings.descriptors)?;
    if let Some(alternate) = &settings.alternate {
        structs.extend(load_descriptors(alternate)?);
    }

    let ctx: commands::SharedFsContext = Rc::new(RefCell::new(FsContext {
        geometry: Geometry::fallback(
            settings.block_size,
            settings.total_blocks,
            settings.blocks_per_group,
        ),
        allow_writes: settings.allow_changes,
        force_ext2: settings.force_ext2,
        force_default: settings.force_default,
        default_block_size: settings.block_size,
        default_total_blocks: settings.total_blocks,
        default_blocks_per_group: settings.blocks_per_group,
    }));

    let mut registry = TypeRegistry::new(DEFAULT_TYPE_CAPACITY);
    for layout in structs {
        let table = commands::typed::table_for(&layout.name, &ctx, DEFAULT_COMMAND_CAPACITY)?;
        registry.register(fscope_engine::TypeDescriptor {
            name: layout.name.clone(),
            layout,
            commands: table,
        })?;
    }

    let engine = Engine::new(
        commands::general::build(&ctx, DEFAULT_COMMAND_CAPACITY)?,
        commands::ext2::build(&ctx, DEFAULT_COMMAND_CAPACITY)?,
        registry,
    );

    let mut session = Session::new(Box::new(output::ConsoleSink), DEFAULT_HISTORY_CAPACITY);
    session.gate = fscope_engine::SafetyGate::new()
        .with_allow_mounted_read(settings.allow_mounted_read)
        .with_log_path(settings.log_file.clone());

    signal_hook::flag::register(
        signal_hook::consts::SIGWINCH,
        std::sync::Arc::clone(&session.redraw_pending),
    )
    .context("cannot install resize handler")?;

    if let Some(device) = &cli.device {
        commands::open_device(&mut session, &ctx, device)
            .with_context(|| format!("cannot start on `{}`", device.display()))?;
    }

    if cli.script.is_some() || !cli.commands.is_empty() {
        repl::run_script(
            &engine,
            &mut session,
            cli.script.as_ref(),
            &cli.commands,
            cli.continue_on_error,
            cli.quiet,
        )?;
    } else {
        repl::run(&engine, &mut session)?;
    }

    session.report("quitting");
    Ok(())
}

fn resolve_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = Settings::default();
    if let Some(path) = &cli.config {
        ConfigFile::load(path)?.apply(&mut settings);
    }

    if let Some(v) = &cli.descriptors {
        settings.descriptors = v.clone();
    }
    if let Some(v) = &cli.alternate {
        settings.alternate = Some(v.clone());
    }
    if let Some(v) = &cli.log_file {
        settings.log_file = Some(v.clone());
    }
    if cli.no_log {
        settings.log_file = None;
    }
    if cli.write {
        settings.allow_changes = true;
    }
    if cli.allow_mounted_read {
        settings.allow_mounted_read = true;
    }
    if cli.force_ext2 {
        settings.force_ext2 = true;
    }
    if cli.force_default {
        settings.force_default = true;
    }
    if let Some(v) = cli.block_size {
        settings.block_size = v;
    }
    if let Some(v) = cli.total_blocks {
        settings.total_blocks = v;
    }
    if let Some(v) = cli.blocks_per_group {
        settings.blocks_per_group = v;
    }
    Ok(settings)
}

fn load_descriptors(path: &PathBuf) -> Result<Vec<fscope_descriptors::StructDescriptor>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read descriptor file `{}`", path.display()))?;
    let structs = fscope_descriptors::parse_descriptors(&text)
        .with_context(|| format!("in descriptor file `{}`", path.display()))?;
    tracing::debug!(path = %path.display(), count = structs.len(), "loaded descriptors");
    Ok(structs)
}
