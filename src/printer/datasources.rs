use ahash::{AHashMap, AHashSet};

use crate::model::{ConnectionInfo, ModuleContext};

use super::{Doc, TokenizeError};

struct Endpoint<'c> {
    name: String,
    address: String,
    connection: &'c ConnectionInfo,
}

/// Distinct endpoints in first-seen order and, per connection, the index of
/// its endpoint. Names are `ep_<module>_<dbname>`; another server with the
/// same database name gets a numeric suffix.
fn endpoints(ctx: &ModuleContext) -> (Vec<Endpoint<'_>>, Vec<usize>) {
    let mut endpoints: Vec<Endpoint> = Vec::new();
    let mut by_address = AHashMap::new();
    let mut names = AHashSet::new();
    let mut indices = Vec::with_capacity(ctx.connections.len());
    for connection in &ctx.connections {
        let address = connection.endpoint_address();
        let index = *by_address.entry(address.clone()).or_insert_with(|| {
            let base = format!("ep_{}_{}", ctx.name, connection.dbname);
            let mut name = base.clone();
            let mut n = 1;
            while !names.insert(name.clone()) {
                n += 1;
                name = format!("{base}_{n}");
            }
            endpoints.push(Endpoint {
                name,
                address,
                connection,
            });
            endpoints.len() - 1
        });
        indices.push(index);
    }
    (endpoints, indices)
}

/// One `<endpoint>` per distinct `host:port/dbname`, then one `<datasource>`
/// per connection.
pub fn generate(ctx: &ModuleContext) -> Result<String, TokenizeError> {
    let (endpoints, indices) = endpoints(ctx);
    let mut doc = Doc::with_prolog();
    doc.tag("datasources", &[], |doc| {
        for endpoint in &endpoints {
            doc.tag(
                "endpoint",
                &[("endpointtype", "postgis"), ("name", endpoint.name.as_str())],
                |doc| {
                    doc.line("connect", &endpoint.address);
                    doc.line("user", &endpoint.connection.user);
                    doc.line("pwd", &endpoint.connection.password);
                },
            );
        }

        for (connection, index) in ctx.connections.iter().zip(&indices) {
            let name = ctx.datasource_name(&connection.layer_name);
            doc.tag(
                "datasource",
                &[
                    ("endpoint", endpoints[*index].name.as_str()),
                    ("name", name.as_str()),
                ],
                |doc| {
                    doc.stag(
                        "table",
                        &[
                            ("geometrycolumn", connection.geometry_column.as_str()),
                            ("name", connection.table.as_str()),
                            ("pkcolumn", connection.key.as_str()),
                        ],
                    )
                },
            );
        }
    });
    doc.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::{connection, context};

    #[test]
    fn shared_endpoint_is_written_once() {
        let xml = generate(&context(&[("skov", "Skov"), ("soer", "Søer")])).unwrap();
        assert_eq!(xml.matches("<endpoint ").count(), 1);
        assert_eq!(xml.matches("<datasource ").count(), 2);
        assert!(xml.contains(r#"<endpoint endpointtype="postgis" name="ep_plan_gis">"#));
        assert!(xml.contains("<connect>db.local:5432/gis</connect>"));
        assert!(xml.contains("<pwd>s&amp;cret</pwd>"));
        assert!(xml.contains(r#"<datasource endpoint="ep_plan_gis" name="ds_plan_soer">"#));
        assert!(xml.contains(r#"<table geometrycolumn="geom" name="public.soer" pkcolumn="gid" />"#));
    }

    #[test]
    fn distinct_hosts_get_their_own_endpoint() {
        let mut ctx = context(&[]);
        ctx.connections = vec![
            connection("skov", "db1.local", "gis"),
            connection("soer", "db2.local", "gis"),
            connection("veje", "db1.local", "trafik"),
            connection("stier", "db2.local", "gis"),
        ];
        let xml = generate(&ctx).unwrap();
        assert_eq!(xml.matches("<endpoint ").count(), 3);
        assert_eq!(xml.matches(r#"name="ep_plan_gis""#).count(), 1);
        assert_eq!(xml.matches(r#"name="ep_plan_gis_2""#).count(), 1);
        let first = xml.find("db1.local:5432/gis").unwrap();
        let second = xml.find("db2.local:5432/gis").unwrap();
        assert!(first < second);

        assert!(xml.contains(r#"<datasource endpoint="ep_plan_gis" name="ds_plan_skov">"#));
        assert!(xml.contains(r#"<datasource endpoint="ep_plan_gis_2" name="ds_plan_soer">"#));
        assert!(xml.contains(r#"<datasource endpoint="ep_plan_trafik" name="ds_plan_veje">"#));
        assert!(xml.contains(r#"<datasource endpoint="ep_plan_gis_2" name="ds_plan_stier">"#));
    }

    #[test]
    fn endpoint_names_are_unique() {
        let mut ctx = context(&[]);
        ctx.connections = vec![
            connection("a", "db1.local", "gis"),
            connection("b", "db2.local", "gis"),
            connection("c", "db3.local", "gis_2"),
            connection("d", "db4.local", "gis"),
        ];
        let (endpoints, indices) = endpoints(&ctx);
        let names: Vec<&str> = endpoints.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(
            names,
            ["ep_plan_gis", "ep_plan_gis_2", "ep_plan_gis_2_2", "ep_plan_gis_3"]
        );
        assert_eq!(indices, [0, 1, 2, 3]);
    }
}
