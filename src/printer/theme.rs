use crate::{
    model::{GeometryFamily, StyleClass, StyleRecord},
    parse::StyleError,
    units::{self, Color, ConversionError, LengthClass},
};

use super::{Doc, IndentOptions, TokenizeError};

#[derive(Debug, thiserror::Error)]
pub enum ThemeError {
    #[error(transparent)]
    Style(#[from] StyleError),
    #[error(transparent)]
    Conversion(#[from] ConversionError),
    #[error("Style has no '{0}' property")]
    MissingProperty(&'static str),
    #[error("Couldn't indent the theme document: {0}")]
    Indent(#[from] TokenizeError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outline {
    pub color: String,
    pub width: f64,
}

/// The `<style>` of one class, with every value already in server units.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassStyle {
    Polygon {
        opacity: u32,
        color: String,
        outline: Option<Outline>,
    },
    Line {
        opacity: u32,
        color: String,
        width: f64,
        pattern: Option<&'static str>,
    },
    Point {
        opacity: u32,
        color: String,
        size: f64,
        outline: Option<Outline>,
        symbol: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThemeClass {
    pub name: String,
    pub expression: Option<String>,
    pub style: ClassStyle,
}

fn property<'r>(record: &'r StyleRecord, key: &'static str) -> Result<&'r str, ThemeError> {
    record.property(key).ok_or(ThemeError::MissingProperty(key))
}

fn length(
    record: &StyleRecord,
    key: &'static str,
    unit_key: &'static str,
    class: LengthClass,
) -> Result<f64, ThemeError> {
    let value = units::parse_number(key, property(record, key)?)?;
    // a missing unit means the value is already in server units
    let unit = record.property(unit_key).unwrap_or_default();
    Ok(units::length_in_target_units(value, unit, class))
}

/// Opacity and `"r g b"` of the color stored under `key`.
fn fill(record: &StyleRecord, key: &'static str) -> Result<(u32, String), ThemeError> {
    let value = property(record, key)?;
    let symbol_alpha = units::parse_number("alpha", &record.alpha)?;
    let opacity = units::transparency(key, value, symbol_alpha)?;
    Ok((opacity, Color::parse(key, value)?.rgb_text()))
}

/// `None` when the outline color is fully transparent.
fn outline(record: &StyleRecord) -> Result<Option<Outline>, ThemeError> {
    let color = Color::parse("outline_color", property(record, "outline_color")?)?;
    if color.is_invisible() {
        return Ok(None);
    }
    Ok(Some(Outline {
        color: color.rgb_text(),
        width: length(record, "outline_width", "outline_width_unit", LengthClass::Stroke)?,
    }))
}

pub fn resolve_style(
    record: &StyleRecord,
    geometry: GeometryFamily,
) -> Result<ClassStyle, ThemeError> {
    Ok(match geometry {
        GeometryFamily::Polygon => {
            let (opacity, color) = fill(record, "color")?;
            ClassStyle::Polygon {
                opacity,
                color,
                outline: outline(record)?,
            }
        }
        GeometryFamily::Line => {
            let (opacity, color) = fill(record, "line_color")?;
            ClassStyle::Line {
                opacity,
                color,
                width: length(record, "line_width", "line_width_unit", LengthClass::Stroke)?,
                pattern: units::dash_pattern(record.property("line_style").unwrap_or("solid")),
            }
        }
        GeometryFamily::Point => {
            let (opacity, color) = fill(record, "color")?;
            ClassStyle::Point {
                opacity,
                color,
                size: length(record, "size", "size_unit", LengthClass::Marker)?,
                outline: outline(record)?,
                symbol: units::marker_symbol(record.property("name").unwrap_or_default()),
            }
        }
    })
}

/// Name and filter expression of a class. Single symbols are named after the layer.
pub fn resolve_class(
    record: &StyleRecord,
    layer: &str,
    geometry: GeometryFamily,
) -> Result<ThemeClass, ThemeError> {
    let (name, expression) = match &record.class {
        StyleClass::Single => (layer.to_owned(), None),
        StyleClass::Category {
            value, attribute, ..
        } => (value.clone(), Some(format!("('[{attribute}]' eq '{value}')"))),
        StyleClass::Range {
            lower,
            upper,
            label,
            attribute,
        } => (
            label.clone(),
            Some(format!(
                "([{attribute}] ge {lower} and [{attribute}] lt {upper})"
            )),
        ),
    };
    Ok(ThemeClass {
        name,
        expression,
        style: resolve_style(record, geometry)?,
    })
}

/// A theme document under construction. The header is written on creation,
/// classes are streamed in with [`ThemeDocument::push_class`].
pub struct ThemeDocument {
    doc: Doc,
    datasource_reference: String,
    classes: usize,
}

impl ThemeDocument {
    pub fn begin(module: &str, layer: &str, geometry: GeometryFamily) -> Self {
        let datasource = format!("ds_{module}_{layer}");
        let name = format!("{module}_{layer}");

        let mut doc = Doc::with_prolog();
        doc.open("theme", &[]);
        doc.tag("cbinfo-metadata", &[], |doc| {
            doc.tag("param", &[("name", "copyright-text")], |_| ())
        });
        doc.tag("clientlayers", &[], |doc| {
            doc.tag("clientlayer", &[], |doc| doc.line("singletile", "true"))
        });
        doc.open(
            "layer",
            &[
                ("datasource", datasource.as_str()),
                ("name", name.as_str()),
                ("type", geometry.layer_type()),
            ],
        );

        Self {
            doc,
            datasource_reference: format!("[datasource:{datasource}.mapfile-datasource]"),
            classes: 0,
        }
    }

    pub fn push_class(&mut self, class: &ThemeClass) {
        self.doc.tag("class", &[], |doc| {
            doc.line("name", &class.name);
            if let Some(expression) = &class.expression {
                doc.line("expression", expression);
            }
            doc.tag("style", &[], |doc| write_style(doc, &class.style));
        });
        self.classes += 1;
    }

    pub fn class_count(&self) -> usize {
        self.classes
    }

    /// Closes the document, indents it and places the datasource reference
    /// as the first line inside `<layer>`.
    pub fn finish(self) -> Result<String, TokenizeError> {
        let indented = self.doc.finish()?;
        let unit = IndentOptions::default().indentation;
        let mut out = String::with_capacity(indented.len() + self.datasource_reference.len() + 8);
        for line in indented.lines() {
            let content = line.trim_start();
            if !content.starts_with("<layer ") {
                out.push_str(line);
                out.push('\n');
                continue;
            }
            let margin = &line[..line.len() - content.len()];
            // a layer without classes is indented as `<layer ...></layer>`
            let (open, close) = match content.strip_suffix("</layer>") {
                Some(open) => (open, Some("</layer>")),
                None => (content, None),
            };
            out.push_str(margin);
            out.push_str(open);
            out.push('\n');
            out.push_str(margin);
            out.push_str(&unit);
            out.push_str(&self.datasource_reference);
            out.push('\n');
            if let Some(close) = close {
                out.push_str(margin);
                out.push_str(close);
                out.push('\n');
            }
        }
        Ok(out)
    }
}

fn write_outline(doc: &mut Doc, outline: &Option<Outline>) {
    if let Some(outline) = outline {
        doc.line("outlinecolor", &outline.color);
        doc.line("outlinewidth", &outline.width.to_string());
    }
}

fn write_style(doc: &mut Doc, style: &ClassStyle) {
    match style {
        ClassStyle::Polygon {
            opacity,
            color,
            outline,
        } => {
            doc.line("opacity", &opacity.to_string());
            doc.line("color", color);
            write_outline(doc, outline);
        }
        ClassStyle::Line {
            opacity,
            color,
            width,
            pattern,
        } => {
            doc.line("opacity", &opacity.to_string());
            doc.line("color", color);
            doc.line("width", &width.to_string());
            if let Some(pattern) = pattern {
                doc.line("pattern", pattern);
            }
        }
        ClassStyle::Point {
            opacity,
            color,
            size,
            outline,
            symbol,
        } => {
            doc.line("opacity", &opacity.to_string());
            doc.line("color", color);
            doc.line("size", &size.to_string());
            write_outline(doc, outline);
            doc.line("symbol", symbol);
        }
    }
}

pub struct RenderedTheme {
    pub document: String,
    pub classes: usize,
}

/// Renders the theme document of one layer from its style records.
pub fn render(
    module: &str,
    layer: &str,
    geometry: GeometryFamily,
    records: &[StyleRecord],
) -> Result<RenderedTheme, ThemeError> {
    let mut theme = ThemeDocument::begin(module, layer, geometry);
    for record in records {
        theme.push_class(&resolve_class(record, layer, geometry)?);
    }
    let classes = theme.class_count();
    Ok(RenderedTheme {
        document: theme.finish()?,
        classes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Renderer;
    use crate::parse::{fixtures::*, parse, SymbolMatching};

    fn records(renderer: Renderer, source: &str) -> Vec<StyleRecord> {
        parse(renderer, source, SymbolMatching::SkipUnmatched)
            .unwrap()
            .records
    }

    #[test]
    fn single_symbol_polygon_document() {
        let rendered = render(
            "parker",
            "skov",
            GeometryFamily::Polygon,
            &records(Renderer::SingleSymbol, SINGLE_POLYGON),
        )
        .unwrap();
        assert_eq!(rendered.classes, 1);
        assert_eq!(
            rendered.document,
            r#"<?xml version="1.0" encoding="UTF-8"?>
<theme>
  <cbinfo-metadata>
    <param name="copyright-text"></param>
  </cbinfo-metadata>
  <clientlayers>
    <clientlayer>
      <singletile>true</singletile>
    </clientlayer>
  </clientlayers>
  <layer datasource="ds_parker_skov" name="parker_skov" type="POLYGON">
    [datasource:ds_parker_skov.mapfile-datasource]
    <class>
      <name>skov</name>
      <style>
        <opacity>100</opacity>
        <color>200 0 0</color>
      </style>
    </class>
  </layer>
</theme>
"#
        );
    }

    #[test]
    fn categorized_polygon_keeps_danish_letters() {
        let rendered = render(
            "plan",
            "anvendelse",
            GeometryFamily::Polygon,
            &records(Renderer::Categorized, CATEGORIZED_POLYGON),
        )
        .unwrap();
        assert_eq!(rendered.classes, 2);
        let doc = &rendered.document;
        assert!(doc.contains("<name>Grøn å</name>"));
        assert!(doc.contains("<expression>('[anvendelse]' eq 'Grøn å')</expression>"));
        assert!(!doc.contains("*oe*") && !doc.contains("*aa*") && !doc.contains("*ae*"));
        // outline kept for the first class, dropped for the transparent one
        assert_eq!(doc.matches("<outlinecolor>").count(), 1);
        assert!(doc.contains("<outlinecolor>0 0 0</outlinecolor>"));
        assert!(doc.contains("<outlinewidth>5</outlinewidth>"));
        // symbol alpha 0.5
        assert!(doc.contains("<opacity>50</opacity>"));
    }

    #[test]
    fn graduated_line_classes() {
        let records = records(Renderer::Graduated, GRADUATED_LINE);
        let first = resolve_class(&records[0], "veje", GeometryFamily::Line).unwrap();
        assert_eq!(first.name, "0 - 50");
        assert_eq!(
            first.expression.as_deref(),
            Some("([hastighed] ge 0.000000000000000 and [hastighed] lt 50.000000000000000)")
        );
        assert_eq!(
            first.style,
            ClassStyle::Line {
                opacity: 50,
                color: "10 20 30".to_owned(),
                width: 20.0,
                pattern: Some("10 4"),
            }
        );
        let second = resolve_class(&records[1], "veje", GeometryFamily::Line).unwrap();
        assert_eq!(
            second.style,
            ClassStyle::Line {
                opacity: 100,
                color: "10 20 30".to_owned(),
                width: 3.0,
                pattern: None,
            }
        );

        let rendered = render("trafik", "veje", GeometryFamily::Line, &records).unwrap();
        assert_eq!(rendered.document.matches("<pattern>").count(), 1);
        assert!(rendered.document.contains("<width>3</width>"));
    }

    #[test]
    fn point_style() {
        let records = records(Renderer::SingleSymbol, SINGLE_POINT_OPTIONS);
        let class = resolve_class(&records[0], "fund", GeometryFamily::Point).unwrap();
        assert_eq!(class.expression, None);
        assert_eq!(
            class.style,
            ClassStyle::Point {
                opacity: 80,
                color: "255 255 0".to_owned(),
                size: 8.0,
                outline: Some(Outline {
                    color: "35 35 35".to_owned(),
                    width: 4.0,
                }),
                symbol: "cross",
            }
        );
    }

    #[test]
    fn missing_or_invalid_properties() {
        let mut record = records(Renderer::SingleSymbol, SINGLE_POLYGON).remove(0);
        assert!(matches!(
            resolve_style(&record, GeometryFamily::Line),
            Err(ThemeError::MissingProperty("line_color"))
        ));
        record
            .properties
            .insert("outline_color".to_owned(), "0,0,0,255".to_owned());
        record
            .properties
            .insert("outline_width".to_owned(), "thin".to_owned());
        assert!(matches!(
            resolve_style(&record, GeometryFamily::Polygon),
            Err(ThemeError::Conversion(ConversionError::NotANumber { .. }))
        ));
    }

    #[test]
    fn empty_layer_still_gets_reference() {
        let theme = ThemeDocument::begin("m", "l", GeometryFamily::Point);
        let document = theme.finish().unwrap();
        assert!(document.contains(
            "  <layer datasource=\"ds_m_l\" name=\"m_l\" type=\"POINT\">\n    [datasource:ds_m_l.mapfile-datasource]\n  </layer>\n"
        ));
    }
}
