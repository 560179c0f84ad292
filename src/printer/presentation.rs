use super::{Doc, TokenizeError};

/// A presentation with a heading column for the layer and one column per field.
pub fn generate(layer: &str, fields: &[String]) -> Result<String, TokenizeError> {
    let quoted = format!("'{layer}'");
    let mut doc = Doc::with_prolog();
    doc.tag("presentation", &[], |doc| {
        doc.stag("text", &[("name", layer), ("plural", layer), ("value", layer)]);
        doc.tag("columns", &[], |doc| {
            doc.tag("column", &[("format", "heading")], |doc| {
                doc.line("label", &quoted);
                doc.line("value", &quoted);
            });
            for field in fields {
                doc.tag("column", &[], |doc| {
                    doc.line("label", &format!("'{field}'"));
                    doc.line("value", field);
                });
            }
        });
    });
    doc.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heading_and_field_columns() {
        let xml = generate("skov", &["gid".to_owned(), "navn".to_owned()]).unwrap();
        assert_eq!(
            xml,
            r#"<?xml version="1.0" encoding="UTF-8"?>
<presentation>
  <text name="skov" plural="skov" value="skov" />
  <columns>
    <column format="heading">
      <label>'skov'</label>
      <value>'skov'</value>
    </column>
    <column>
      <label>'gid'</label>
      <value>gid</value>
    </column>
    <column>
      <label>'navn'</label>
      <value>navn</value>
    </column>
  </columns>
</presentation>
"#
        );
    }
}
