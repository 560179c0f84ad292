//! Deserialization model of the host's layer style documents (`.qml`).
//!
//! Only the nodes the converter reads are modelled; everything else in the
//! document is skipped by the deserializer.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct QgisDocument {
    #[serde(rename = "renderer-v2", default)]
    pub renderer: Option<RendererNode>,
    #[serde(default)]
    pub edittypes: Option<EditTypes>,
    #[serde(rename = "fieldConfiguration", default)]
    pub field_configuration: Option<FieldConfiguration>,
}

#[derive(Debug, Deserialize)]
pub struct RendererNode {
    #[serde(rename = "@type", default)]
    pub kind: Option<String>,
    /// Classification field of categorized and graduated renderers.
    #[serde(rename = "@attr", default)]
    pub attr: Option<String>,
    #[serde(default)]
    pub symbols: Option<Symbols>,
    #[serde(default)]
    pub categories: Option<Categories>,
    #[serde(default)]
    pub ranges: Option<Ranges>,
}

#[derive(Debug, Deserialize, Default)]
pub struct Symbols {
    #[serde(rename = "symbol", default)]
    pub symbols: Vec<Symbol>,
}

#[derive(Debug, Deserialize)]
pub struct Symbol {
    #[serde(rename = "@name", default)]
    pub name: String,
    #[serde(rename = "@alpha", default = "opaque")]
    pub alpha: String,
    #[serde(rename = "layer", default)]
    pub layers: Vec<SymbolLayer>,
}

fn opaque() -> String {
    "1".to_owned()
}

#[derive(Debug, Deserialize)]
pub struct SymbolLayer {
    #[serde(rename = "prop", default)]
    pub props: Vec<Prop>,
    /// Newer documents store properties as `<Option type="Map">`.
    #[serde(rename = "Option", default)]
    pub options: Option<OptionNode>,
}

#[derive(Debug, Deserialize)]
pub struct Prop {
    #[serde(rename = "@k")]
    pub key: String,
    #[serde(rename = "@v", default)]
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct OptionNode {
    #[serde(rename = "@name", default)]
    pub name: Option<String>,
    #[serde(rename = "@value", default)]
    pub value: Option<String>,
    #[serde(rename = "Option", default)]
    pub children: Vec<OptionNode>,
}

#[derive(Debug, Deserialize, Default)]
pub struct Categories {
    #[serde(rename = "category", default)]
    pub categories: Vec<Category>,
}

#[derive(Debug, Deserialize)]
pub struct Category {
    #[serde(rename = "@symbol", default)]
    pub symbol: String,
    #[serde(rename = "@value", default)]
    pub value: String,
    #[serde(rename = "@label", default)]
    pub label: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct Ranges {
    #[serde(rename = "range", default)]
    pub ranges: Vec<Range>,
}

#[derive(Debug, Deserialize)]
pub struct Range {
    #[serde(rename = "@symbol", default)]
    pub symbol: String,
    #[serde(rename = "@lower", default)]
    pub lower: String,
    #[serde(rename = "@upper", default)]
    pub upper: String,
    #[serde(rename = "@label", default)]
    pub label: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct EditTypes {
    #[serde(rename = "edittype", default)]
    pub edittypes: Vec<EditType>,
}

#[derive(Debug, Deserialize)]
pub struct EditType {
    #[serde(rename = "@name")]
    pub name: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct FieldConfiguration {
    #[serde(rename = "field", default)]
    pub fields: Vec<Field>,
}

#[derive(Debug, Deserialize)]
pub struct Field {
    #[serde(rename = "@name")]
    pub name: String,
}

impl SymbolLayer {
    /// Key/value pairs of this layer, from `<prop>` or, failing that, the
    /// `<Option type="Map">` children.
    pub fn properties(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        let from_props = self
            .props
            .iter()
            .map(|p| (p.key.as_str(), p.value.as_str()));
        let from_options = self
            .options
            .iter()
            .filter(move |_| self.props.is_empty())
            .flat_map(|map| map.children.iter())
            .filter_map(|o| Some((o.name.as_deref()?, o.value.as_deref().unwrap_or(""))));
        from_props.chain(from_options)
    }
}
