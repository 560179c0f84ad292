use crate::model::ModuleContext;

use super::{Doc, TokenizeError};

pub fn generate(ctx: &ModuleContext) -> Result<String, TokenizeError> {
    let mut doc = Doc::with_prolog();
    doc.tag("targetset", &[("name", ctx.name.as_str())], |doc| {
        for layer in &ctx.layers {
            let presentation = format!(
                "[module:{}.dir]/presentations/pres-{}",
                ctx.name,
                ctx.qualified(layer.name())
            );
            let theme = ctx.theme_name(layer.name());
            doc.tag(
                "target",
                &[
                    ("displayname", layer.display_name.as_str()),
                    ("presentation", presentation.as_str()),
                    ("themecondition", theme.as_str()),
                ],
                |doc| {
                    let datasource = ctx.datasource_name(layer.name());
                    doc.stag("datasource", &[("name", datasource.as_str())]);
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
    fn one_target_per_layer() {
        let xml = generate(&context(&[("skov", "Skov"), ("soer", "Søer og å")])).unwrap();
        assert_eq!(
            xml,
            r#"<?xml version="1.0" encoding="UTF-8"?>
<targetset name="plan">
  <target displayname="Skov" presentation="[module:plan.dir]/presentations/pres-plan_skov" themecondition="theme-plan_skov">
    <datasource name="ds_plan_skov" />
  </target>
  <target displayname="Søer og å" presentation="[module:plan.dir]/presentations/pres-plan_soer" themecondition="theme-plan_soer">
    <datasource name="ds_plan_soer" />
  </target>
</targetset>
"#
        );
    }
}
