//! Profile include files: the module's theme group and its themes.

use crate::model::ModuleContext;

use super::{Doc, TokenizeError};

pub fn generate_themegroups(ctx: &ModuleContext) -> Result<String, TokenizeError> {
    let mut doc = Doc::with_prolog();
    doc.tag("themegroups", &[], |doc| {
        doc.stag(
            "themegroup",
            &[
                ("displayname", ctx.name.as_str()),
                ("expanded", "false"),
                ("name", ctx.name.as_str()),
                ("type", "checkbutton"),
            ],
        )
    });
    doc.finish()
}

pub fn generate_themes(ctx: &ModuleContext) -> Result<String, TokenizeError> {
    let mut doc = Doc::with_prolog();
    doc.tag("themes", &[], |doc| {
        for layer in &ctx.layers {
            let name = ctx.theme_name(layer.name());
            doc.tag(
                "theme",
                &[("module", ctx.name.as_str()), ("name", name.as_str())],
                |doc| {
                    doc.tag("themeselector", &[], |doc| {
                        doc.line("initialstate", "available");
                        doc.line("group", &ctx.name);
                        doc.line("displayname", &layer.display_name);
                        doc.line("selectable", "true");
                    });
                    doc.line("downloadable", "false");
                },
            );
        }
    });
    doc.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::context;

    #[test]
    fn themegroup() {
        let xml = generate_themegroups(&context(&[])).unwrap();
        assert!(xml.contains(
            r#"<themegroup displayname="plan" expanded="false" name="plan" type="checkbutton" />"#
        ));
    }

    #[test]
    fn theme_per_layer() {
        let xml = generate_themes(&context(&[("skov", "Skov"), ("soer", "Søer")])).unwrap();
        assert_eq!(xml.matches("<theme ").count(), 2);
        assert!(xml.contains(
            r#"  <theme module="plan" name="theme-plan_soer">
    <themeselector>
      <initialstate>available</initialstate>
      <group>plan</group>
      <displayname>Søer</displayname>
      <selectable>true</selectable>
    </themeselector>
    <downloadable>false</downloadable>
  </theme>"#
        ));
    }
}
