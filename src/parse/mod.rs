//! Style parser: turns a layer style document into [`StyleRecord`]s.

mod qml;

use std::{fs, path::Path};

use ahash::AHashMap;
use tracing::debug;

use crate::model::{Renderer, StyleClass, StyleRecord};

use qml::{QgisDocument, RendererNode, Symbol, SymbolLayer};

#[derive(Debug, thiserror::Error)]
pub enum StyleError {
    #[error("Malformed style source: {0}")]
    MalformedSource(&'static str),
    #[error("{kind} '{reference}' refers to unknown symbol '{symbol}'")]
    UnknownSymbol {
        kind: &'static str,
        reference: String,
        symbol: String,
    },
    #[error("Couldn't read style source {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("Invalid style document: {0}")]
    Xml(#[from] quick_xml::DeError),
}

/// What to do with a category or range whose symbol doesn't exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SymbolMatching {
    /// Drop the class and report it in [`ParsedStyle::unmatched`].
    #[default]
    SkipUnmatched,
    /// Fail the whole layer with [`StyleError::UnknownSymbol`].
    Strict,
}

/// A category or range that was dropped because its symbol is missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnmatchedSymbol {
    /// The category value or range label.
    pub reference: String,
    pub symbol: String,
}

#[derive(Debug, Default)]
pub struct ParsedStyle {
    pub records: Vec<StyleRecord>,
    pub unmatched: Vec<UnmatchedSymbol>,
}

pub fn parse_file(
    renderer: Renderer,
    path: &Path,
    matching: SymbolMatching,
) -> Result<ParsedStyle, StyleError> {
    parse(renderer, &read_source(path)?, matching)
}

pub fn parse(
    renderer: Renderer,
    source: &str,
    matching: SymbolMatching,
) -> Result<ParsedStyle, StyleError> {
    let document: QgisDocument = quick_xml::de::from_str(source)?;
    let node = document
        .renderer
        .ok_or(StyleError::MalformedSource("missing renderer-v2 node"))?;
    match renderer {
        Renderer::SingleSymbol => parse_single(&node),
        Renderer::Categorized => parse_categorized(&node, matching),
        Renderer::Graduated => parse_graduated(&node, matching),
    }
}

/// The renderer a style document was saved with, if it is one we translate.
pub fn detect_renderer(source: &str) -> Result<Option<Renderer>, StyleError> {
    let document: QgisDocument = quick_xml::de::from_str(source)?;
    let node = document
        .renderer
        .ok_or(StyleError::MalformedSource("missing renderer-v2 node"))?;
    Ok(node.kind.and_then(|kind| kind.parse().ok()))
}

/// Attribute names listed in a style document, used for presentations.
pub fn parse_fields(source: &str) -> Result<Vec<String>, StyleError> {
    let document: QgisDocument = quick_xml::de::from_str(source)?;
    if let Some(edittypes) = document.edittypes {
        return Ok(edittypes.edittypes.into_iter().map(|e| e.name).collect());
    }
    if let Some(configuration) = document.field_configuration {
        return Ok(configuration.fields.into_iter().map(|f| f.name).collect());
    }
    Err(StyleError::MalformedSource("missing edittypes node"))
}

pub fn read_source(path: &Path) -> Result<String, StyleError> {
    fs::read_to_string(path).map_err(|source| StyleError::Read {
        path: path.display().to_string(),
        source,
    })
}

fn symbols(node: &RendererNode) -> Result<&[Symbol], StyleError> {
    node.symbols
        .as_ref()
        .map(|s| s.symbols.as_slice())
        .ok_or(StyleError::MalformedSource("missing symbols node"))
}

/// The rendering layer whose properties describe a symbol.
fn rendering_layer(symbol: &Symbol) -> Result<&SymbolLayer, StyleError> {
    if symbol.layers.len() > 1 {
        debug!(
            symbol = %symbol.name,
            layers = symbol.layers.len(),
            "Symbol has several layers, only the first is translated"
        );
    }
    symbol
        .layers
        .first()
        .ok_or(StyleError::MalformedSource("symbol without a layer"))
}

fn record(symbol: &Symbol, class: StyleClass) -> Result<StyleRecord, StyleError> {
    let properties: AHashMap<String, String> = rendering_layer(symbol)?
        .properties()
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect();
    Ok(StyleRecord {
        alpha: symbol.alpha.clone(),
        properties,
        class,
    })
}

fn parse_single(node: &RendererNode) -> Result<ParsedStyle, StyleError> {
    let symbol = symbols(node)?
        .first()
        .ok_or(StyleError::MalformedSource("renderer without a symbol"))?;
    Ok(ParsedStyle {
        records: vec![record(symbol, StyleClass::Single)?],
        unmatched: Vec::new(),
    })
}

/// Joins classes to their symbols by name and builds one record per class.
fn join_symbols<'n, C>(
    node: &'n RendererNode,
    classes: &'n [C],
    kind: &'static str,
    matching: SymbolMatching,
    key: impl Fn(&'n C) -> (&'n str, &'n str),
    class: impl Fn(&'n C, &str) -> StyleClass,
) -> Result<ParsedStyle, StyleError> {
    let by_name: AHashMap<&str, &Symbol> =
        symbols(node)?.iter().map(|s| (s.name.as_str(), s)).collect();
    let attribute = node.attr.as_deref().unwrap_or_default();

    let mut parsed = ParsedStyle::default();
    for item in classes {
        let (reference, symbol_name) = key(item);
        match by_name.get(symbol_name) {
            Some(symbol) => parsed.records.push(record(symbol, class(item, attribute))?),
            None if matching == SymbolMatching::Strict => {
                return Err(StyleError::UnknownSymbol {
                    kind,
                    reference: reference.to_owned(),
                    symbol: symbol_name.to_owned(),
                });
            }
            None => parsed.unmatched.push(UnmatchedSymbol {
                reference: reference.to_owned(),
                symbol: symbol_name.to_owned(),
            }),
        }
    }
    Ok(parsed)
}

fn parse_categorized(
    node: &RendererNode,
    matching: SymbolMatching,
) -> Result<ParsedStyle, StyleError> {
    let categories = node
        .categories
        .as_ref()
        .ok_or(StyleError::MalformedSource("missing categories node"))?;
    join_symbols(
        node,
        categories.categories.as_slice(),
        "Category",
        matching,
        |c| (c.value.as_str(), c.symbol.as_str()),
        |c, attribute| StyleClass::Category {
            value: c.value.clone(),
            label: c.label.clone(),
            attribute: attribute.to_owned(),
        },
    )
}

fn parse_graduated(
    node: &RendererNode,
    matching: SymbolMatching,
) -> Result<ParsedStyle, StyleError> {
    let ranges = node
        .ranges
        .as_ref()
        .ok_or(StyleError::MalformedSource("missing ranges node"))?;
    join_symbols(
        node,
        ranges.ranges.as_slice(),
        "Range",
        matching,
        |r| (r.label.as_str(), r.symbol.as_str()),
        |r, attribute| StyleClass::Range {
            lower: r.lower.clone(),
            upper: r.upper.clone(),
            label: r.label.clone(),
            attribute: attribute.to_owned(),
        },
    )
}

#[cfg(test)]
pub(crate) mod fixtures {
    pub const SINGLE_POLYGON: &str = r#"<!DOCTYPE qgis PUBLIC 'http://mrcc.com/qgis.dtd' 'SYSTEM'>
<qgis version="2.18.4" minimumScale="0" maximumScale="1e+08">
  <edittypes>
    <edittype widgetv2type="TextEdit" name="gid"/>
    <edittype widgetv2type="TextEdit" name="navn"/>
  </edittypes>
  <renderer-v2 forceraster="0" symbollevels="0" type="singleSymbol" enableorderby="0">
    <symbols>
      <symbol alpha="1" clip_to_extent="1" type="fill" name="0">
        <layer pass="0" class="SimpleFill" locked="0">
          <prop k="border_width_map_unit_scale" v="0,0,0,0,0,0"/>
          <prop k="color" v="200,0,0,255"/>
          <prop k="joinstyle" v="bevel"/>
          <prop k="outline_color" v="0,0,0,0"/>
          <prop k="outline_style" v="solid"/>
          <prop k="outline_width" v="0.26"/>
          <prop k="outline_width_unit" v="MM"/>
          <prop k="style" v="solid"/>
        </layer>
      </symbol>
    </symbols>
    <rotation/>
    <sizescale scalemethod="diameter"/>
  </renderer-v2>
</qgis>
"#;

    pub const CATEGORIZED_POLYGON: &str = r#"<!DOCTYPE qgis PUBLIC 'http://mrcc.com/qgis.dtd' 'SYSTEM'>
<qgis version="2.18.4">
  <edittypes>
    <edittype widgetv2type="TextEdit" name="gid"/>
    <edittype widgetv2type="TextEdit" name="anvendelse"/>
  </edittypes>
  <renderer-v2 attr="anvendelse" forceraster="0" symbollevels="0" type="categorizedSymbol" enableorderby="0">
    <categories>
      <category render="true" symbol="0" value="Grøn å" label="Grøn å"/>
      <category render="true" symbol="1" value="Bolig" label="Bolig"/>
      <category render="true" symbol="7" value="Erhverv" label="Erhverv"/>
    </categories>
    <symbols>
      <symbol alpha="1" clip_to_extent="1" type="fill" name="0">
        <layer pass="0" class="SimpleFill" locked="0">
          <prop k="color" v="0,128,0,255"/>
          <prop k="outline_color" v="0,0,0,255"/>
          <prop k="outline_width" v="0.5"/>
          <prop k="outline_width_unit" v="MM"/>
        </layer>
      </symbol>
      <symbol alpha="0.5" clip_to_extent="1" type="fill" name="1">
        <layer pass="0" class="SimpleFill" locked="0">
          <prop k="color" v="255,0,0,255"/>
          <prop k="outline_color" v="0,0,0,0"/>
          <prop k="outline_width" v="0.26"/>
          <prop k="outline_width_unit" v="MM"/>
        </layer>
      </symbol>
    </symbols>
    <source-symbol>
      <symbol alpha="1" clip_to_extent="1" type="fill" name="0">
        <layer pass="0" class="SimpleFill" locked="0">
          <prop k="color" v="1,2,3,255"/>
        </layer>
      </symbol>
    </source-symbol>
  </renderer-v2>
</qgis>
"#;

    pub const GRADUATED_LINE: &str = r#"<qgis version="2.18.4">
  <renderer-v2 attr="hastighed" type="graduatedSymbol" graduatedMethod="GraduatedColor">
    <ranges>
      <range render="true" symbol="0" lower="0.000000000000000" upper="50.000000000000000" label="0 - 50"/>
      <range render="true" symbol="1" lower="50.000000000000000" upper="80.000000000000000" label="50 - 80"/>
    </ranges>
    <symbols>
      <symbol alpha="1" clip_to_extent="1" type="line" name="0">
        <layer pass="0" class="SimpleLine" locked="0">
          <prop k="line_color" v="10,20,30,128"/>
          <prop k="line_style" v="dash"/>
          <prop k="line_width" v="2"/>
          <prop k="line_width_unit" v="MM"/>
        </layer>
      </symbol>
      <symbol alpha="1" clip_to_extent="1" type="line" name="1">
        <layer pass="0" class="SimpleLine" locked="0">
          <prop k="line_color" v="10,20,30,255"/>
          <prop k="line_style" v="solid"/>
          <prop k="line_width" v="3"/>
          <prop k="line_width_unit" v="Pixel"/>
        </layer>
      </symbol>
    </symbols>
  </renderer-v2>
</qgis>
"#;

    /// Newer documents: `<Option type="Map">` instead of `<prop>`.
    pub const SINGLE_POINT_OPTIONS: &str = r#"<!DOCTYPE qgis PUBLIC 'http://mrcc.com/qgis.dtd' 'SYSTEM'>
<qgis version="3.22.0-Białowieża" styleCategories="AllStyleCategories">
  <renderer-v2 type="singleSymbol" forceraster="0" symbollevels="0" enableorderby="0">
    <symbols>
      <symbol alpha="0.8" clip_to_extent="1" type="marker" name="0" force_rhr="0">
        <data_defined_properties>
          <Option type="Map">
            <Option value="" type="QString" name="name"/>
          </Option>
        </data_defined_properties>
        <layer pass="0" class="SimpleMarker" locked="0" enabled="1">
          <Option type="Map">
            <Option value="255,255,0,255" type="QString" name="color"/>
            <Option value="cross2" type="QString" name="name"/>
            <Option value="35,35,35,255" type="QString" name="outline_color"/>
            <Option value="0.4" type="QString" name="outline_width"/>
            <Option value="MM" type="QString" name="outline_width_unit"/>
            <Option value="2" type="QString" name="size"/>
            <Option value="MM" type="QString" name="size_unit"/>
          </Option>
        </layer>
      </symbol>
    </symbols>
  </renderer-v2>
  <fieldConfiguration>
    <field name="fid" configurationFlags="None"/>
    <field name="art" configurationFlags="None"/>
  </fieldConfiguration>
</qgis>
"#;
}
