mod errors;
mod manifest;
mod model;
mod module;
mod parse;
mod printer;
mod units;

use std::{
    io::{self, Write},
    path::{Path, PathBuf},
};

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{
    manifest::ManifestError,
    model::{GeometryFamily, Renderer},
    module::{build_module, LayerOutcome},
    parse::SymbolMatching,
};

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
enum Args {
    /// Builds a complete module directory from a manifest.
    Build {
        /// Path to a manifest (YAML) listing the module's layers.
        manifest: PathBuf,
        #[clap(short, long)]
        /// Parent directory of the module. Overrides the manifest's `output`.
        output_dir: Option<PathBuf>,
        #[clap(long, default_value_t = false)]
        /// Fail a layer if one of its classes refers to a missing symbol.
        strict_symbols: bool,
        #[clap(short, long, default_value_t = false)]
        /// Log parse details.
        verbose: bool,
    },
    /// Renders the theme of a single style document to stdout.
    Theme {
        /// Path to a layer style (.qml).
        style: PathBuf,
        #[clap(short, long)]
        module: String,
        #[clap(short, long)]
        layer: String,
        #[clap(short, long)]
        /// Geometry type, for example MultiPolygon or LineString.
        geometry: String,
        #[clap(short, long)]
        /// singleSymbol, categorizedSymbol or graduatedSymbol. Read from the style if omitted.
        renderer: Option<String>,
        #[clap(long, default_value_t = false)]
        strict_symbols: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let verbose = matches!(args, Args::Build { verbose: true, .. });
    init_tracing(verbose);

    match args {
        Args::Build {
            manifest,
            output_dir,
            strict_symbols,
            ..
        } => build(&manifest, output_dir.as_deref(), matching(strict_symbols)),
        Args::Theme {
            style,
            module,
            layer,
            geometry,
            renderer,
            strict_symbols,
        } => theme(
            &style,
            &module,
            &layer,
            &geometry,
            renderer.as_deref(),
            matching(strict_symbols),
        ),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn matching(strict: bool) -> SymbolMatching {
    if strict {
        SymbolMatching::Strict
    } else {
        SymbolMatching::SkipUnmatched
    }
}

fn build(
    manifest_path: &Path,
    output_dir: Option<&Path>,
    matching: SymbolMatching,
) -> anyhow::Result<()> {
    let ctx = match manifest::load(manifest_path, output_dir) {
        Ok(ctx) => ctx,
        Err(ManifestError::Yaml(e)) => {
            let message = e.to_string();
            match (e.location(), manifest::read(manifest_path)) {
                (Some(location), Ok(source)) => errors::print_error_with_source(
                    manifest_path,
                    &source,
                    &message,
                    location.into(),
                ),
                _ => eprintln!("{}: {message}", manifest_path.display()),
            }
            std::process::exit(1)
        }
        Err(e) => return Err(e.into()),
    };
    info!(
        module = %ctx.name,
        layers = ctx.layers.len(),
        path = %ctx.path.display(),
        "Building module"
    );

    let report = build_module(&ctx, matching)
        .with_context(|| format!("Failed to build module {}", ctx.name))?;

    let written = report
        .layers
        .iter()
        .filter(|l| matches!(l.outcome, LayerOutcome::Written { .. }))
        .count();
    info!(
        written,
        failed = report.error_count(),
        unmatched = report.unmatched_count(),
        files = report.files.len(),
        "Module done"
    );
    if !report.is_clean() {
        for l in report.incomplete() {
            match &l.outcome {
                LayerOutcome::Written { unmatched, .. } => {
                    warn!(layer = %l.layer, unmatched = unmatched.len(), "Theme is missing classes")
                }
                LayerOutcome::Skipped { reason } => {
                    warn!(layer = %l.layer, %reason, "No theme written")
                }
                LayerOutcome::Failed(e) => warn!(layer = %l.layer, error = %e, "No theme written"),
            }
        }
    }
    if report.error_count() > 0 {
        warn!("Some themes failed, see the errors above");
        std::process::exit(2)
    }
    Ok(())
}

fn theme(
    style: &Path,
    module: &str,
    layer: &str,
    geometry: &str,
    renderer: Option<&str>,
    matching: SymbolMatching,
) -> anyhow::Result<()> {
    let source = parse::read_source(style)?;
    let renderer: Renderer = match renderer {
        Some(r) => r.parse()?,
        None => parse::detect_renderer(&source)?
            .context("The style's renderer isn't supported, pass one with -r")?,
    };
    let geometry: GeometryFamily = geometry.parse()?;
    let layer = manifest::sanitize_layer_name(layer);

    let parsed = parse::parse(renderer, &source, matching)?;
    for u in &parsed.unmatched {
        warn!(reference = %u.reference, symbol = %u.symbol, "Skipped class without a matching symbol");
    }
    let rendered = printer::theme::render(module, &layer, geometry, &parsed.records)?;
    io::stdout().lock().write_all(rendered.document.as_bytes())?;
    Ok(())
}
