use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use external_memory::config::{validate_config, Config, ConfigLoader, DEFAULT_CONFIG_FILE};
use external_memory::{Address, ExternalProcess, Offset, ProcessMemory};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "memory-probe")]
#[command(about = "Resolve and read a value in another process", version)]
struct Args {
    /// Executable name of the target, e.g. game.exe
    process: Option<String>,

    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Module whose base starts the chain
    #[arg(short, long)]
    module: Option<String>,

    /// Signature scanned inside the module, e.g. "48 8B ? ? 89"
    #[arg(short, long)]
    signature: Option<String>,

    /// Chain offsets, decimal or 0x-prefixed hex; repeatable
    #[arg(short, long = "offset", value_parser = parse_offset, allow_hyphen_values = true)]
    offsets: Vec<Offset>,

    /// Interpret the resolved address as this type
    #[arg(short, long, value_enum, default_value_t = ValueKind::U32)]
    read: ValueKind,

    /// Query page protection before reading
    #[arg(long, env = "MEMORY_CHECK")]
    memory_check: bool,

    /// Report every swallowed failure
    #[arg(short, long)]
    debug: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ValueKind {
    U8,
    U16,
    U32,
    U64,
    I32,
    I64,
    F32,
    F64,
    Pointer,
    Text,
}

#[derive(Serialize)]
struct Report {
    process: String,
    pid: u32,
    architecture: String,
    module_base: Option<String>,
    signature_match: Option<String>,
    address: String,
    value: Value,
}

fn parse_offset(text: &str) -> Result<Offset, String> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let magnitude = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => Offset::from_str_radix(hex, 16),
        None => digits.parse::<Offset>(),
    }
    .map_err(|e| format!("invalid offset '{}': {}", text, e))?;
    Ok(if negative { -magnitude } else { magnitude })
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ConfigLoader::new(&args.config)
        .load_or_default()
        .with_context(|| format!("loading {}", args.config.display()))?;
    apply_overrides(&mut config, &args);
    validate_config(&config)?;

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .context("invalid log filter")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("memory-probe v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = rayon::ThreadPoolBuilder::new()
        .num_threads(config.scanner.max_threads)
        .build_global()
    {
        warn!("Failed to size scanner thread pool: {}", e);
    }

    if config.target.process.is_empty() {
        bail!("no target process given on the command line or in the config");
    }

    let report = run(&config, args.read)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn apply_overrides(config: &mut Config, args: &Args) {
    if let Some(process) = &args.process {
        config.target.process = process.clone();
    }
    if args.module.is_some() {
        config.target.module = args.module.clone();
    }
    if args.signature.is_some() {
        config.target.signature = args.signature.clone();
    }
    if !args.offsets.is_empty() {
        config.target.offsets = args.offsets.clone();
    }
    config.memory.memory_check |= args.memory_check;
    config.logging.debug |= args.debug;
}

#[cfg(windows)]
fn run(config: &Config, kind: ValueKind) -> Result<Report> {
    use external_memory::{Diagnostics, TracingSink};
    use std::sync::Arc;

    let diagnostics = Diagnostics::new(config.logging.debug, Arc::new(TracingSink));
    let process = ExternalProcess::attach_with(
        &config.target.process,
        config.target.access.into(),
        diagnostics,
    )
    .with_config(config);

    if !process.is_valid() {
        bail!("could not attach to {}", config.target.process);
    }
    info!(pid = process.pid(), "attached to {}", config.target.process);

    probe(&process, config, kind)
}

#[cfg(not(windows))]
fn run(_config: &Config, _kind: ValueKind) -> Result<Report> {
    bail!("attaching to a process is only supported on Windows")
}

/// Walk module -> signature -> offsets and read the final value
#[cfg_attr(not(windows), allow(dead_code))]
fn probe<P: ProcessMemory>(
    process: &ExternalProcess<P>,
    config: &Config,
    kind: ValueKind,
) -> Result<Report> {
    let target = &config.target;
    let memory_check = config.memory.memory_check;

    let module = match &target.module {
        Some(name) => Some(
            process
                .resolver()
                .find_module(name)
                .with_context(|| format!("module {} not loaded", name))?,
        ),
        None => None,
    };

    let signature_match = match (&module, &target.signature) {
        (Some(module), Some(signature)) => {
            let found = process
                .scanner()
                .try_find_signature(module.base_address, signature, module.size)
                .with_context(|| format!("signature not found in {}", module.name))?;
            Some(found)
        }
        _ => None,
    };

    let base = signature_match
        .or_else(|| module.as_ref().map(|m| m.base_address))
        .unwrap_or_else(|| Address::new(0));
    let address = process
        .resolver()
        .try_get_address(base, &target.offsets)
        .context("pointer chain did not resolve")?;

    let value = match kind {
        ValueKind::U8 => json!(process.read::<u8>(address, memory_check)),
        ValueKind::U16 => json!(process.read::<u16>(address, memory_check)),
        ValueKind::U32 => json!(process.read::<u32>(address, memory_check)),
        ValueKind::U64 => json!(process.read::<u64>(address, memory_check)),
        ValueKind::I32 => json!(process.read::<i32>(address, memory_check)),
        ValueKind::I64 => json!(process.read::<i64>(address, memory_check)),
        ValueKind::F32 => json!(process.read::<f32>(address, memory_check)),
        ValueKind::F64 => json!(process.read::<f64>(address, memory_check)),
        ValueKind::Pointer => json!(process
            .accessor()
            .try_read_pointer(address)
            .map(|p| p.to_string())
            .unwrap_or_default()),
        ValueKind::Text => json!(process.read_text(address, memory_check)),
    };

    Ok(Report {
        process: target.process.clone(),
        pid: process.pid(),
        architecture: format!("{:?}", process.process().architecture()),
        module_base: module.map(|m| m.base_address.to_string()),
        signature_match: signature_match.map(|a| a.to_string()),
        address: address.to_string(),
        value,
    })
}
