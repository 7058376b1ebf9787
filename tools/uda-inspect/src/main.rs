// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! uda-inspect - Inspect cached Data Blocks, schema layouts and action documents
//!
//! Usage:
//!   uda-inspect block cached.blk
//!   uda-inspect schema types.yaml --pointer-width 4
//!   uda-inspect actions ip.xml --signal ip --exp 14000
//!   uda-inspect apply --actions ip.xml --signal ip --exp 14000 in.blk out.blk

#![allow(clippy::uninlined_format_args)]
#![allow(clippy::too_many_lines)]

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use uda::action::{ActionKind, NoSignalSource};
use uda::block::{read_block_file, write_block_file, DimValues};
use uda::types::{PointerWidth, SchemaLoader};
use uda::{ActionEngine, DataBlock, Pipeline, RequestContext, SessionContext, TypeRegistry, UdaConfig};

#[derive(Parser, Debug)]
#[command(name = "uda-inspect")]
#[command(version, about = "Inspect cached Data Blocks, schema layouts and action documents")]
struct Cli {
    /// Runtime configuration (YAML); environment overrides still apply
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Schema registered before reading blocks with structure payloads
    #[arg(short, long, global = true, value_name = "FILE")]
    schema: Option<PathBuf>,

    /// Verbose output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Summarize a cached Data Block
    Block {
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Print data and coordinate values
        #[arg(long)]
        values: bool,
    },

    /// Register a schema and print the layout of every type
    Schema {
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Pointer width used for the layout (4 or 8)
        #[arg(long, default_value_t = 8)]
        pointer_width: u8,
    },

    /// List the rules of an action document, optionally only those selected
    /// for a signal and shot
    Actions {
        #[arg(value_name = "FILE")]
        input: PathBuf,

        #[arg(long)]
        signal: Option<String>,

        #[arg(long, default_value_t = 0)]
        exp: i32,

        #[arg(long, default_value_t = -1)]
        pass: i32,
    },

    /// Apply an action document to a cached block and write the result
    Apply {
        #[arg(short, long, value_name = "FILE")]
        actions: PathBuf,

        #[arg(long)]
        signal: String,

        #[arg(long, default_value_t = 0)]
        exp: i32,

        #[arg(long, default_value_t = -1)]
        pass: i32,

        #[arg(value_name = "IN")]
        input: PathBuf,

        #[arg(value_name = "OUT")]
        output: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Err(e) = run(&cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;

    match &cli.command {
        Commands::Block { input, values } => {
            let registry = registry_for(&config, cli.schema.as_deref())?;
            let block = read_block_file(input, &registry, &config.limits)
                .with_context(|| format!("reading {}", input.display()))?;
            print_block(&block, *values);
        }
        Commands::Schema {
            input,
            pointer_width,
        } => {
            let width = PointerWidth::try_from(*pointer_width).map_err(anyhow::Error::msg)?;
            cmd_schema(input, width)?;
        }
        Commands::Actions {
            input,
            signal,
            exp,
            pass,
        } => cmd_actions(input, signal.as_deref(), *exp, *pass)?,
        Commands::Apply {
            actions,
            signal,
            exp,
            pass,
            input,
            output,
        } => {
            let registry = registry_for(&config, cli.schema.as_deref())?;
            let request = RequestContext::new(signal.clone(), *exp, *pass);
            cmd_apply(&registry, config, actions, &request, input, output)?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<UdaConfig> {
    let config = match path {
        Some(p) => UdaConfig::from_file(p).with_context(|| format!("loading {}", p.display()))?,
        None => UdaConfig::default(),
    };
    Ok(config.with_overrides(|var| std::env::var(var).ok())?)
}

fn registry_for(config: &UdaConfig, schema: Option<&Path>) -> Result<TypeRegistry> {
    let registry = TypeRegistry::new(config.pointer_width);
    if let Some(path) = schema {
        let doc = SchemaLoader::load_file(path).with_context(|| format!("loading {}", path.display()))?;
        let ids = SchemaLoader::register(&registry, &doc)?;
        log::debug!("[inspect] {} types registered from {}", ids.len(), path.display());
    }
    Ok(registry)
}

fn print_block(block: &DataBlock, values: bool) {
    println!("Data Block");
    println!("  rank:        {}", block.rank());
    println!("  order:       {}", block.order());
    println!("  type:        {}", block.data_type());
    println!("  elements:    {}", block.element_count());
    println!("  shape:       {:?}", block.shape());
    if !block.label().is_empty() {
        println!("  label:       {}", block.label());
    }
    if !block.units().is_empty() {
        println!("  units:       {}", block.units());
    }
    if !block.description().is_empty() {
        println!("  description: {}", block.description());
    }
    let errors = match (block.error_high(), block.error_low()) {
        (Some(_), Some(_)) => "asymmetric",
        (Some(_), None) => "symmetric",
        _ => "none",
    };
    println!("  errors:      {}", errors);
    if let Some(model) = block.error_model() {
        println!("  error model: {} {:?}", model.kind, model.params);
    }
    println!("  opaque:      {}", block.opaque().kind_name());

    for (i, dim) in block.dims().iter().enumerate() {
        let repr = match dim.values() {
            DimValues::Uninitialized => "uninitialized".to_string(),
            DimValues::Explicit(_) => "explicit".to_string(),
            DimValues::Analytic(domains) => format!("analytic, {} domains", domains.len()),
        };
        println!(
            "  dim[{}]: {} x {} ({}) label='{}' units='{}'",
            i,
            dim.length(),
            dim.data_type(),
            repr,
            dim.label(),
            dim.units()
        );
        if values {
            if let Some(v) = dim.values_f64() {
                println!("    {}", preview(&v));
            }
        }
    }

    if values {
        if let Some(v) = block.data_f64() {
            println!("  data: {}", preview(&v));
        }
    }
}

fn preview(values: &[f64]) -> String {
    const SHOWN: usize = 8;
    let head: Vec<String> = values.iter().take(SHOWN).map(|v| format!("{}", v)).collect();
    if values.len() > SHOWN {
        format!("[{}, ... ({} more)]", head.join(", "), values.len() - SHOWN)
    } else {
        format!("[{}]", head.join(", "))
    }
}

fn cmd_schema(input: &Path, width: PointerWidth) -> Result<()> {
    let registry = TypeRegistry::new(width);
    let doc = SchemaLoader::load_file(input).with_context(|| format!("loading {}", input.display()))?;
    let ids = SchemaLoader::register(&registry, &doc)?;

    println!("{} types, pointer width {}", ids.len(), width);
    for id in ids {
        let Some(desc) = registry.resolve(id) else {
            continue;
        };
        println!();
        println!("{} {} (size {}, align {})", id, desc.name, desc.byte_size, desc.alignment);
        println!("  {:<20} {:<16} {:>6} {:>6} {:>5} {:>5}", "field", "type", "offset", "size", "pad", "count");
        for f in &desc.fields {
            let ty = if f.is_pointer {
                format!("{}*", f.type_name)
            } else {
                f.type_name.clone()
            };
            println!(
                "  {:<20} {:<16} {:>6} {:>6} {:>5} {:>5}",
                f.name,
                ty,
                f.byte_offset,
                f.byte_len(),
                f.padding_before,
                f.element_count
            );
        }
    }
    Ok(())
}

fn cmd_actions(input: &Path, signal: Option<&str>, exp: i32, pass: i32) -> Result<()> {
    let text = std::fs::read_to_string(input).with_context(|| format!("reading {}", input.display()))?;
    let actions = uda::action::parse_actions(&text)?;
    for dropped in actions.rejected() {
        eprintln!(
            "[WARN] dropped <{}> of signal '{}': {}",
            dropped.element, dropped.signal, dropped.error
        );
    }

    let rules: Vec<_> = match signal {
        Some(sig) => actions.select(sig, exp, pass).into_iter().collect(),
        None => actions.rules().iter().collect(),
    };
    if rules.is_empty() {
        println!("No rules selected");
        return Ok(());
    }

    println!("{:>5}  {:<14} {:<16} {:<16} {:<12}", "id", "category", "signal", "shots", "passes");
    for rule in rules {
        let detail = match &rule.kind {
            ActionKind::Calibration(c) => format!("factor {} offset {}", c.factor, c.offset),
            ActionKind::Subset(s) => format!("{} ops", s.operations.len()),
            ActionKind::TimeOffset(t) => format!("offset {}", t.offset),
            ActionKind::ErrorModel(m) => m.model.to_string(),
            ActionKind::Composite(c) => c.data.clone().unwrap_or_default(),
            ActionKind::Documentation(d) => d.label.clone().unwrap_or_default(),
        };
        println!(
            "{:>5}  {:<14} {:<16} {:<16} {:<12} {}",
            rule.id,
            rule.kind.category(),
            rule.signal,
            format!("{}", rule.exp_range),
            format!("{}", rule.pass_range),
            detail
        );
    }
    Ok(())
}

fn cmd_apply(
    registry: &TypeRegistry,
    config: UdaConfig,
    actions: &Path,
    request: &RequestContext,
    input: &Path,
    output: &Path,
) -> Result<()> {
    let text = std::fs::read_to_string(actions).with_context(|| format!("reading {}", actions.display()))?;
    let mut engine = ActionEngine::from_config(&config);
    let loaded = engine.load_xml(&text)?;
    log::debug!("[inspect] {} rules loaded from {}", loaded, actions.display());

    let block = read_block_file(input, registry, &config.limits)
        .with_context(|| format!("reading {}", input.display()))?;

    let pipeline = Pipeline::new(registry, config).with_engine(engine);
    let mut session = SessionContext::new();
    let out = pipeline.process(&mut session, request, block, &NoSignalSource)?;

    for rule in &out.report.applied {
        println!("[OK] {} rule {}", rule.category, rule.id);
    }
    for failure in &out.report.failures {
        println!("[FAILED] {} rule {}: {}", failure.category, failure.id, failure.error);
    }
    if out.report.is_noop() {
        println!("No rules applied to {}", request);
    }

    write_block_file(output, &out.block, registry)
        .with_context(|| format!("writing {}", output.display()))?;
    println!("Wrote {}", output.display());

    if out.report.failures.is_empty() {
        Ok(())
    } else {
        bail!("{} rules failed", out.report.failures.len())
    }
}
