//! The YAML manifest describing one module build.
//!
//! ```yaml
//! module: natur
//! output: build
//! options:
//!   presentations: false
//! layers:
//!   - name: Skov og sø
//!     style: styles/skov.qml
//!     source: dbname='gis' host=db port=5432 user='u' password='p' key='gid' srid=25832 type=MultiPolygon table="natur"."skov" (geom)
//!     renderer: categorizedSymbol
//! ```

use std::{
    fs,
    path::{Path, PathBuf},
};

use ahash::AHashMap;
use serde::Deserialize;
use tracing::debug;

use crate::{
    model::{
        ConnectionInfo, ExportLayer, LayerSelection, ModuleContext, ModuleOptions, Renderer,
        SelectionError,
    },
    parse::{self, StyleError},
};

#[derive(Debug, Deserialize)]
struct YamlManifest {
    module: String,
    #[serde(default)]
    output: Option<PathBuf>,
    #[serde(default)]
    options: YamlOptions,
    layers: Vec<YamlLayer>,
}

#[derive(Debug, Default, Deserialize)]
struct YamlOptions {
    includes: Option<bool>,
    presentations: Option<bool>,
    targets: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct YamlLayer {
    name: String,
    style: PathBuf,
    source: String,
    #[serde(default)]
    renderer: Option<String>,
    #[serde(default)]
    geometry: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("Invalid manifest: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Couldn't read manifest {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("Layer '{layer}' has no '{missing}' in its datasource")]
    IncompatibleLayer {
        layer: String,
        missing: &'static str,
    },
    #[error("Layer '{layer}': {source}")]
    Selection {
        layer: String,
        source: SelectionError,
    },
    #[error("Layer '{0}' has no renderer and its style doesn't name a supported one")]
    UnknownRenderer(String),
    #[error("Layer '{layer}': {source}")]
    Style {
        layer: String,
        source: StyleError,
    },
}

/// Keys a datasource has to carry for the layer to be exported.
const REQUIRED_KEYS: [&str; 10] = [
    "dbname", "host", "port", "user", "password", "key", "srid", "type", "table", "geom",
];

/// Lowercases and replaces spaces and Danish letters so the name can be used
/// in file and element names.
pub fn sanitize_layer_name(name: &str) -> String {
    name.to_lowercase()
        .replace(' ', "_")
        .replace('å', "aa")
        .replace('ø', "oe")
        .replace('æ', "ae")
}

/// Splits a datasource URI into its `key=value` fields. Quotes are dropped
/// and a token without `=` is the geometry column, stored as `geom`.
pub fn parse_source_uri(uri: &str) -> AHashMap<String, String> {
    let uri = uri.replace(['\'', '"'], "");
    let mut fields = AHashMap::new();
    for token in uri.split_whitespace() {
        match token.split_once('=') {
            Some((key, value)) => fields.insert(key.to_owned(), value.to_owned()),
            None => fields.insert("geom".to_owned(), token.replace(['(', ')'], "")),
        };
    }
    fields
}

/// Builds the connection of one layer from its datasource URI.
pub fn connection_info(display_name: &str, uri: &str) -> Result<ConnectionInfo, ManifestError> {
    let mut fields = parse_source_uri(uri);
    if let Some(missing) = REQUIRED_KEYS.into_iter().find(|k| !fields.contains_key(*k)) {
        return Err(ManifestError::IncompatibleLayer {
            layer: display_name.to_owned(),
            missing,
        });
    }
    let mut take = |key: &str| fields.remove(key).unwrap_or_default();
    Ok(ConnectionInfo {
        host: take("host"),
        port: take("port"),
        dbname: take("dbname"),
        user: take("user"),
        password: take("password"),
        table: take("table"),
        key: take("key"),
        geometry_column: take("geom"),
        srid: take("srid"),
        geometry_type: take("type"),
        display_name: display_name.to_owned(),
        layer_name: sanitize_layer_name(display_name),
    })
}

pub fn load(path: &Path, output: Option<&Path>) -> Result<ModuleContext, ManifestError> {
    let source = read(path)?;
    let base = path.parent().unwrap_or_else(|| Path::new(""));
    parse(&source, base, output)
}

pub fn read(path: &Path) -> Result<String, ManifestError> {
    fs::read_to_string(path).map_err(|source| ManifestError::Read {
        path: path.display().to_string(),
        source,
    })
}

/// Parses a manifest. Style paths are resolved against `base`; `output`
/// overrides the manifest's own output directory.
pub fn parse(
    source: &str,
    base: &Path,
    output: Option<&Path>,
) -> Result<ModuleContext, ManifestError> {
    let yaml: YamlManifest = serde_yaml::from_str(source)?;

    let module = yaml.module.trim().to_owned();
    let output = output
        .map(Path::to_path_buf)
        .or(yaml.output)
        .unwrap_or_else(|| PathBuf::from("."));
    let defaults = ModuleOptions::default();
    let options = ModuleOptions {
        includes: yaml.options.includes.unwrap_or(defaults.includes),
        presentations: yaml.options.presentations.unwrap_or(defaults.presentations),
        targets: yaml.options.targets.unwrap_or(defaults.targets),
    };

    let mut layers = Vec::with_capacity(yaml.layers.len());
    let mut connections = Vec::with_capacity(yaml.layers.len());
    for layer in yaml.layers {
        let connection = connection_info(&layer.name, &layer.source)?;
        debug!(
            layer = %connection.display_name,
            table = %connection.table,
            srid = %connection.srid,
            endpoint = %connection.endpoint_address(),
            "Datasource"
        );
        let style_source = base.join(&layer.style);
        let renderer = match layer.renderer {
            Some(renderer) => renderer
                .parse::<Renderer>()
                .map_err(|source| ManifestError::Selection {
                    layer: layer.name.clone(),
                    source,
                })?,
            None => detect_renderer(&layer.name, &style_source)?,
        };
        let geometry = layer
            .geometry
            .unwrap_or_else(|| connection.geometry_type.clone());

        let selection = format!("{} - {} - {}", connection.layer_name, renderer, geometry);
        let selection: LayerSelection =
            selection
                .parse()
                .map_err(|source| ManifestError::Selection {
                    layer: layer.name.clone(),
                    source,
                })?;
        debug!(selection = %selection.to_selection_string(), "layer selected");

        layers.push(ExportLayer {
            selection,
            display_name: layer.name,
            style_source,
        });
        connections.push(connection);
    }

    Ok(ModuleContext {
        path: output.join(&module),
        name: module,
        layers,
        options,
        connections,
    })
}

fn detect_renderer(layer: &str, style: &Path) -> Result<Renderer, ManifestError> {
    let style_error = |source| ManifestError::Style {
        layer: layer.to_owned(),
        source,
    };
    let source = parse::read_source(style).map_err(style_error)?;
    parse::detect_renderer(&source)
        .map_err(style_error)?
        .ok_or_else(|| ManifestError::UnknownRenderer(layer.to_owned()))
}
