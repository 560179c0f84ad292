//! Builds a module directory from a [`ModuleContext`].

use std::{fs, io, path::PathBuf};

use tracing::{error, info, warn};

use crate::{
    model::{ExportLayer, ModuleContext},
    parse::{self, StyleError, SymbolMatching, UnmatchedSymbol},
    printer::{self, readme, theme::ThemeError, Printer, TokenizeError},
};

const DIRECTORIES: [&str; 6] = [
    "datasources",
    "themes",
    "presentations",
    "profiles/includes",
    "queries",
    "qml",
];

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Module directory {} already exists", .0.display())]
    ModuleExists(PathBuf),
    #[error("Couldn't write {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("Couldn't read the fields of layer '{layer}': {source}")]
    Presentation { layer: String, source: StyleError },
    #[error("Generated markup is malformed: {0}")]
    Indent(#[from] TokenizeError),
}

#[derive(Debug)]
pub enum LayerOutcome {
    Written {
        classes: usize,
        unmatched: Vec<UnmatchedSymbol>,
    },
    Skipped {
        reason: String,
    },
    Failed(ThemeError),
}

#[derive(Debug)]
pub struct LayerReport {
    pub layer: String,
    pub outcome: LayerOutcome,
}

/// What a build did to each layer, plus every file it wrote.
#[derive(Debug, Default)]
pub struct BuildReport {
    pub layers: Vec<LayerReport>,
    pub files: Vec<PathBuf>,
}

impl BuildReport {
    pub fn error_count(&self) -> usize {
        self.layers
            .iter()
            .filter(|l| matches!(l.outcome, LayerOutcome::Failed(_)))
            .count()
    }

    pub fn unmatched_count(&self) -> usize {
        self.layers
            .iter()
            .map(|l| match &l.outcome {
                LayerOutcome::Written { unmatched, .. } => unmatched.len(),
                _ => 0,
            })
            .sum()
    }

    pub fn is_clean(&self) -> bool {
        self.incomplete().next().is_none()
    }

    /// Layers without a theme, or whose theme dropped classes.
    pub fn incomplete(&self) -> impl Iterator<Item = &LayerReport> {
        self.layers.iter().filter(|l| match &l.outcome {
            LayerOutcome::Written { unmatched, .. } => !unmatched.is_empty(),
            _ => true,
        })
    }

    fn is_written(&self, layer: &str) -> bool {
        self.layers
            .iter()
            .any(|l| l.layer == layer && matches!(l.outcome, LayerOutcome::Written { .. }))
    }

    fn write(&mut self, path: PathBuf, contents: &str) -> Result<(), BuildError> {
        fs::write(&path, contents).map_err(|source| BuildError::Io {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), "Wrote");
        self.files.push(path);
        Ok(())
    }
}

/// Writes the whole module. Fails before touching the disk if the module
/// directory already exists; a failing layer is recorded in the report and
/// the remaining layers are still written. Presentations, targets and the
/// themes include only list layers that got a theme.
pub fn build_module(
    ctx: &ModuleContext,
    matching: SymbolMatching,
) -> Result<BuildReport, BuildError> {
    if ctx.path.exists() {
        return Err(BuildError::ModuleExists(ctx.path.clone()));
    }
    for dir in DIRECTORIES {
        let path = ctx.path.join(dir);
        fs::create_dir_all(&path).map_err(|source| BuildError::Io { path, source })?;
    }

    for layer in &ctx.layers {
        let target = qml_path(ctx, layer);
        fs::copy(&layer.style_source, &target).map_err(|source| BuildError::Io {
            path: layer.style_source.clone(),
            source,
        })?;
    }

    let mut report = BuildReport::default();
    report.write(
        ctx.path.join("datasources/datasources.xml"),
        &printer::datasources::generate(ctx)?,
    )?;

    for layer in &ctx.layers {
        let outcome = match render_layer(ctx, layer, matching) {
            Ok(rendered) if rendered.classes == 0 => LayerOutcome::Skipped {
                reason: "style has no drawable classes".to_owned(),
            },
            Ok(rendered) => {
                report.write(
                    ctx.path
                        .join("themes")
                        .join(format!("{}.xml", ctx.theme_name(layer.name()))),
                    &rendered.document,
                )?;
                LayerOutcome::Written {
                    classes: rendered.classes,
                    unmatched: rendered.unmatched,
                }
            }
            Err(e) => LayerOutcome::Failed(e),
        };
        log_outcome(layer.name(), &outcome);
        report.layers.push(LayerReport {
            layer: layer.name().to_owned(),
            outcome,
        });
    }

    let published = published(ctx, &report);

    if ctx.options.presentations {
        for layer in &published.layers {
            let fields = parse::read_source(&qml_path(ctx, layer))
                .and_then(|source| parse::parse_fields(&source))
                .map_err(|source| BuildError::Presentation {
                    layer: layer.name().to_owned(),
                    source,
                })?;
            report.write(
                ctx.path
                    .join("presentations")
                    .join(format!("pres-{}.xml", ctx.qualified(layer.name()))),
                &printer::presentation::generate(layer.name(), &fields)?,
            )?;
        }
    }

    if ctx.options.targets {
        report.write(
            ctx.path
                .join("queries")
                .join(format!("targetset-{}.xml", ctx.name)),
            &printer::targets::generate(&published)?,
        )?;
    }

    if ctx.options.includes {
        let includes = ctx.path.join("profiles/includes");
        report.write(
            includes.join("themegroups.xml"),
            &printer::includes::generate_themegroups(ctx)?,
        )?;
        report.write(
            includes.join("themes.xml"),
            &printer::includes::generate_themes(&published)?,
        )?;
    }

    let mut text = Vec::new();
    let today = chrono::Local::now().date_naive();
    let path = ctx.path.join("read.me");
    let mut p = Printer::with_indentation(&mut text, readme::INDENTATION);
    readme::generate(&mut p, &ctx.name, today).map_err(|source| BuildError::Io {
        path: path.clone(),
        source,
    })?;
    report.write(path, &String::from_utf8_lossy(&text))?;

    Ok(report)
}

/// `ctx` narrowed to the layers whose theme was written.
fn published(ctx: &ModuleContext, report: &BuildReport) -> ModuleContext {
    for layer in ctx.layers.iter().filter(|l| !report.is_written(l.name())) {
        warn!(layer = layer.name(), "Left out of presentations, targets and includes");
    }
    ModuleContext {
        layers: ctx
            .layers
            .iter()
            .filter(|l| report.is_written(l.name()))
            .cloned()
            .collect(),
        connections: ctx
            .connections
            .iter()
            .filter(|c| report.is_written(&c.layer_name))
            .cloned()
            .collect(),
        ..ctx.clone()
    }
}

struct LayerTheme {
    document: String,
    classes: usize,
    unmatched: Vec<UnmatchedSymbol>,
}

/// Parses the layer's copied style and renders its theme document.
fn render_layer(
    ctx: &ModuleContext,
    layer: &ExportLayer,
    matching: SymbolMatching,
) -> Result<LayerTheme, ThemeError> {
    let selection = &layer.selection;
    let parsed = parse::parse_file(selection.renderer, &qml_path(ctx, layer), matching)?;
    let rendered = printer::theme::render(
        &ctx.name,
        &selection.name,
        selection.geometry,
        &parsed.records,
    )?;
    Ok(LayerTheme {
        document: rendered.document,
        classes: rendered.classes,
        unmatched: parsed.unmatched,
    })
}

fn qml_path(ctx: &ModuleContext, layer: &ExportLayer) -> PathBuf {
    ctx.path.join("qml").join(format!("{}.qml", layer.name()))
}

fn log_outcome(layer: &str, outcome: &LayerOutcome) {
    match outcome {
        LayerOutcome::Written { classes, unmatched } => {
            for u in unmatched {
                warn!(
                    layer,
                    reference = %u.reference,
                    symbol = %u.symbol,
                    "Skipped class without a matching symbol"
                );
            }
            info!(layer, classes, "Theme done");
        }
        LayerOutcome::Skipped { reason } => warn!(layer, %reason, "Theme skipped"),
        LayerOutcome::Failed(e) => error!(layer, error = %e, "Theme failed"),
    }
}
