use std::io;

use chrono::NaiveDate;

use super::Printer;

const RULE: &str = "===============================================================";
const SECTION: &str = "--------------------";

/// Indentation of the snippets to paste into server configuration.
pub const INDENTATION: &str = "        ";

/// Installation guide for a generated module.
pub fn generate(
    p: &mut Printer<impl io::Write>,
    module: &str,
    date: NaiveDate,
) -> io::Result<()> {
    p.write_line(RULE)?;
    p.write_line("SPSGEN")?;
    p.write_line(RULE)?;
    writeln!(p, "$Date: {} $", date.format("%d/%m/%Y"))?;
    p.write_line("$Revision: 1 $")?;
    p.write_line("$Author: spsgen $")?;
    p.write_line(RULE)?;
    p.write_line("")?;

    p.write_line(SECTION)?;
    p.write_line(module)?;
    p.write_line(SECTION)?;
    p.write_line("")?;
    p.write_line("**Type description here**")?;
    p.write_line("")?;

    p.write_line(SECTION)?;
    p.write_line("Installation")?;
    p.write_line(SECTION)?;
    p.write_line("")?;
    p.write_line("1: Installation")?;
    p.write_line("")?;
    p.write_line("1.a:  Copy the module to modules/custom")?;
    p.write_line("")?;
    p.write_line("1.b:  Add the following line to the modules file:")?;
    p.write_line("")?;
    p.indent();
    writeln!(
        p,
        r#"<module name="{module}" dir="custom/{module}" permissionlevel="public" />"#
    )?;
    p.dedent();
    p.write_line("")?;

    p.write_line("2:    Include the following resources in your profile:")?;
    p.write_line("")?;
    p.indent();
    for include in ["themegroups.xml", "themes.xml"] {
        writeln!(
            p,
            r#"<include onlychildnodes="true" src="[module:{module}.dir]/profiles/includes/{include}" />"#
        )?;
    }
    p.dedent();
    p.write_line("")?;

    p.write_line("3:    Include the following target in relevant targetset files:")?;
    p.write_line("")?;
    p.indent();
    writeln!(
        p,
        r#"<include onlychildnodes="true" src="[module:{module}.dir]/queries/targetset-{module}.xml" />"#
    )?;
    p.dedent();
    p.write_line("")?;

    p.write_line(
        "4:    Modify your themes and presentations where needed - not all QGIS configuration can be translated to Spatial Suite.",
    )?;
    Ok(())
}
