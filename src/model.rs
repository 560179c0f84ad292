use std::{fmt, path::PathBuf, str::FromStr};

use ahash::AHashMap;

/// Classification strategy of a layer's renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Renderer {
    SingleSymbol,
    Categorized,
    Graduated,
}

impl Renderer {
    pub fn label(self) -> &'static str {
        match self {
            Renderer::SingleSymbol => "Singlesymbol",
            Renderer::Categorized => "Categorizedsymbol",
            Renderer::Graduated => "Graduatedsymbol",
        }
    }
}

impl fmt::Display for Renderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("Unsupported renderer '{0}'")]
    Renderer(String),
    #[error("Unsupported geometry type '{0}'")]
    Geometry(String),
    #[error("Expected '<name> - <renderer> - <geometry>', got '{0}'")]
    Format(String),
}

impl FromStr for Renderer {
    type Err = SelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "singlesymbol" => Ok(Renderer::SingleSymbol),
            "categorizedsymbol" => Ok(Renderer::Categorized),
            "graduatedsymbol" => Ok(Renderer::Graduated),
            _ => Err(SelectionError::Renderer(s.to_owned())),
        }
    }
}

/// Geometry family a theme is rendered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryFamily {
    Polygon,
    Line,
    Point,
}

impl GeometryFamily {
    /// The `type` attribute of the theme's `<layer>` element.
    pub fn layer_type(self) -> &'static str {
        match self {
            GeometryFamily::Polygon => "POLYGON",
            GeometryFamily::Line => "LINE",
            GeometryFamily::Point => "POINT",
        }
    }
}

impl FromStr for GeometryFamily {
    type Err = SelectionError;

    /// Accepts the host's geometry type names, e.g. `MultiPolygonZ` or `LineString`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        let base = lower.strip_prefix("multi").unwrap_or(&lower);
        let base = ["zm", "z", "m"]
            .iter()
            .find_map(|suffix| base.strip_suffix(suffix))
            .unwrap_or(base);
        match base {
            "polygon" => Ok(GeometryFamily::Polygon),
            "linestring" => Ok(GeometryFamily::Line),
            "point" => Ok(GeometryFamily::Point),
            _ => Err(SelectionError::Geometry(s.to_owned())),
        }
    }
}

/// One entry of the layer list, `"<name> - <renderer> - <geometry>"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerSelection {
    pub name: String,
    pub renderer: Renderer,
    pub geometry: GeometryFamily,
    /// Geometry type as the host application reported it.
    pub geometry_type: String,
}

impl LayerSelection {
    pub fn to_selection_string(&self) -> String {
        format!("{} - {} - {}", self.name, self.renderer, self.geometry_type)
    }
}

impl FromStr for LayerSelection {
    type Err = SelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(" - ");
        let (Some(name), Some(renderer), Some(geometry), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(SelectionError::Format(s.to_owned()));
        };
        Ok(LayerSelection {
            name: name.to_owned(),
            renderer: renderer.parse()?,
            geometry: geometry.parse()?,
            geometry_type: geometry.to_owned(),
        })
    }
}

/// The part of a style record that depends on the classification mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StyleClass {
    Single,
    Category {
        value: String,
        label: String,
        attribute: String,
    },
    /// Half-open interval `[lower, upper)`, bounds kept verbatim.
    Range {
        lower: String,
        upper: String,
        label: String,
        attribute: String,
    },
}

/// One visual class of a layer's renderer.
#[derive(Debug, Clone)]
pub struct StyleRecord {
    /// Symbol opacity as a fraction of 1, verbatim from the source.
    pub alpha: String,
    pub properties: AHashMap<String, String>,
    pub class: StyleClass,
}

impl StyleRecord {
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}

/// A layer's datasource binding, as read from the host's datasource URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub host: String,
    pub port: String,
    pub dbname: String,
    pub user: String,
    pub password: String,
    pub table: String,
    pub key: String,
    pub geometry_column: String,
    pub srid: String,
    pub geometry_type: String,
    pub display_name: String,
    pub layer_name: String,
}

impl ConnectionInfo {
    /// `host:port/dbname`, the key endpoints are deduplicated by.
    pub fn endpoint_address(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.dbname)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleOptions {
    pub includes: bool,
    pub presentations: bool,
    pub targets: bool,
}

impl Default for ModuleOptions {
    fn default() -> Self {
        Self {
            includes: true,
            presentations: true,
            targets: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportLayer {
    pub selection: LayerSelection,
    pub display_name: String,
    pub style_source: PathBuf,
}

impl ExportLayer {
    pub fn name(&self) -> &str {
        &self.selection.name
    }
}

/// Everything one module build reads. Constructed once, read-only afterwards.
#[derive(Debug, Clone)]
pub struct ModuleContext {
    pub name: String,
    pub path: PathBuf,
    pub layers: Vec<ExportLayer>,
    pub options: ModuleOptions,
    pub connections: Vec<ConnectionInfo>,
}

impl ModuleContext {
    pub fn qualified(&self, layer: &str) -> String {
        format!("{}_{}", self.name, layer)
    }

    pub fn datasource_name(&self, layer: &str) -> String {
        format!("ds_{}_{}", self.name, layer)
    }

    pub fn theme_name(&self, layer: &str) -> String {
        format!("theme-{}_{}", self.name, layer)
    }
}
