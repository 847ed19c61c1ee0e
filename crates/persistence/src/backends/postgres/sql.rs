//! SQL rendering for structural steps.
//!
//! DDL cannot take bind parameters, so partition names are double-quoted and
//! partition bounds single-quote-escaped. Every name has already passed the
//! tenant name grammar before it gets here. Row values in `UPDATE` and
//! `INSERT ... SELECT` are bound as parameters.

use crate::core::{ConflictPolicy, IdentityValues, PartitionRef, StructuralStep};
use crate::error::{StorageError, StorageResult};
use crate::tenant::PartitionLayout;

/// A rendered statement with its text parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlStatement {
    /// Statement text, using `$n::text` placeholders.
    pub sql: String,
    /// Parameter values in placeholder order.
    pub params: Vec<String>,
}

impl SqlStatement {
    fn ddl(sql: String) -> Self {
        Self {
            sql,
            params: Vec::new(),
        }
    }
}

/// Quotes an identifier.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quotes a string literal.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Renders `"schema"."relname"`.
pub fn qualified(layout: &PartitionLayout, relname: &str) -> String {
    format!("{}.{}", quote_ident(&layout.schema), quote_ident(relname))
}

fn parent_table(layout: &PartitionLayout, parent: &PartitionRef) -> String {
    match parent {
        PartitionRef::Root => qualified(layout, &layout.root_table),
        PartitionRef::Named(name) => qualified(layout, name.as_str()),
    }
}

fn column_list<'a>(columns: impl IntoIterator<Item = &'a str>) -> String {
    columns
        .into_iter()
        .map(quote_ident)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Renders one structural step as a single statement.
pub fn render(step: &StructuralStep, layout: &PartitionLayout) -> StorageResult<SqlStatement> {
    let statement = match step {
        StructuralStep::CreateOrganization { name, bound } => SqlStatement::ddl(format!(
            "CREATE TABLE {} PARTITION OF {} FOR VALUES IN ({}) PARTITION BY LIST ({})",
            qualified(layout, name.as_str()),
            qualified(layout, &layout.root_table),
            quote_literal(bound.as_str()),
            quote_ident(&layout.subunit_column),
        )),
        StructuralStep::CreateSubunit {
            parent,
            name,
            bound,
        } => SqlStatement::ddl(format!(
            "CREATE TABLE {} PARTITION OF {} FOR VALUES IN ({})",
            qualified(layout, name.as_str()),
            qualified(layout, parent.as_str()),
            quote_literal(bound.as_str()),
        )),
        StructuralStep::Rename { from, to } => SqlStatement::ddl(format!(
            "ALTER TABLE {} RENAME TO {}",
            qualified(layout, from.as_str()),
            quote_ident(to.as_str()),
        )),
        StructuralStep::Detach { parent, child } => SqlStatement::ddl(format!(
            "ALTER TABLE {} DETACH PARTITION {}",
            parent_table(layout, parent),
            qualified(layout, child.as_str()),
        )),
        StructuralStep::Attach {
            parent,
            child,
            bound,
        } => SqlStatement::ddl(format!(
            "ALTER TABLE {} ATTACH PARTITION {} FOR VALUES IN ({})",
            parent_table(layout, parent),
            qualified(layout, child.as_str()),
            quote_literal(bound.as_str()),
        )),
        StructuralStep::RewriteIdentity {
            target,
            set,
            matching,
        } => render_rewrite(layout, &parent_table(layout, target), set, matching)?,
        StructuralStep::CopyMembers {
            source,
            target,
            organization,
            subunit,
            conflict,
        } => {
            let columns = layout.member_columns();
            let mut sql = format!(
                "INSERT INTO {} ({}) SELECT $1::text, $2::text, {} FROM {}",
                qualified(layout, target.as_str()),
                column_list(columns.iter().copied()),
                column_list(columns.iter().skip(2).copied()),
                qualified(layout, source.as_str()),
            );
            if *conflict == ConflictPolicy::Upsert {
                let updates = layout
                    .upsert_columns()
                    .into_iter()
                    .map(|column| {
                        let column = quote_ident(column);
                        format!("{} = EXCLUDED.{}", column, column)
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                sql.push_str(&format!(
                    " ON CONFLICT ({}) DO UPDATE SET {}",
                    column_list(layout.conflict_key()),
                    updates
                ));
            }
            SqlStatement {
                sql,
                params: vec![organization.to_string(), subunit.to_string()],
            }
        }
        StructuralStep::Drop { name } => {
            SqlStatement::ddl(format!("DROP TABLE {}", qualified(layout, name.as_str())))
        }
    };
    Ok(statement)
}

fn identity_pairs<'a>(
    layout: &'a PartitionLayout,
    values: &'a IdentityValues,
) -> impl Iterator<Item = (&'a str, String)> + 'a {
    let organization = values
        .organization
        .as_ref()
        .map(|value| (layout.organization_column.as_str(), value.to_string()));
    let subunit = values
        .subunit
        .as_ref()
        .map(|value| (layout.subunit_column.as_str(), value.to_string()));
    organization.into_iter().chain(subunit)
}

fn render_rewrite(
    layout: &PartitionLayout,
    table: &str,
    set: &IdentityValues,
    matching: &IdentityValues,
) -> StorageResult<SqlStatement> {
    if set.is_empty() {
        return Err(StorageError::invalid_request(
            "identity rewrite must set at least one column",
        ));
    }

    let mut params = Vec::new();
    let mut placeholder = |value: String| {
        params.push(value);
        format!("${}::text", params.len())
    };

    let assignments = identity_pairs(layout, set)
        .map(|(column, value)| format!("{} = {}", quote_ident(column), placeholder(value)))
        .collect::<Vec<_>>()
        .join(", ");
    let conditions = identity_pairs(layout, matching)
        .map(|(column, value)| format!("{} = {}", quote_ident(column), placeholder(value)))
        .collect::<Vec<_>>();

    let mut sql = format!("UPDATE {} SET {}", table, assignments);
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }

    Ok(SqlStatement { sql, params })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tenant::TenantName;

    fn name(s: &str) -> TenantName {
        TenantName::parse(s).unwrap()
    }

    fn render_default(step: StructuralStep) -> SqlStatement {
        render(&step, &PartitionLayout::default()).unwrap()
    }

    #[test]
    fn test_quoting() {
        assert_eq!(quote_ident("acme"), "\"acme\"");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
        assert_eq!(quote_literal("o'brien"), "'o''brien'");
    }

    #[test]
    fn test_create_organization_sql() {
        let stmt = render_default(StructuralStep::CreateOrganization {
            name: name("acme"),
            bound: name("acme"),
        });
        assert_eq!(
            stmt.sql,
            "CREATE TABLE \"company\".\"acme\" PARTITION OF \"company\".\"onesystem\" \
             FOR VALUES IN ('acme') PARTITION BY LIST (\"branch\")"
        );
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn test_create_subunit_sql() {
        let stmt = render_default(StructuralStep::CreateSubunit {
            parent: name("acme"),
            name: name("acme_north"),
            bound: name("north"),
        });
        assert_eq!(
            stmt.sql,
            "CREATE TABLE \"company\".\"acme_north\" PARTITION OF \"company\".\"acme\" \
             FOR VALUES IN ('north')"
        );
    }

    #[test]
    fn test_rename_detach_attach_sql() {
        let rename = render_default(StructuralStep::Rename {
            from: name("acme"),
            to: name("acme2"),
        });
        assert_eq!(
            rename.sql,
            "ALTER TABLE \"company\".\"acme\" RENAME TO \"acme2\""
        );

        let detach = render_default(StructuralStep::Detach {
            parent: PartitionRef::Root,
            child: name("acme2"),
        });
        assert_eq!(
            detach.sql,
            "ALTER TABLE \"company\".\"onesystem\" DETACH PARTITION \"company\".\"acme2\""
        );

        let attach = render_default(StructuralStep::Attach {
            parent: PartitionRef::Named(name("acme")),
            child: name("south"),
            bound: name("south"),
        });
        assert_eq!(
            attach.sql,
            "ALTER TABLE \"company\".\"acme\" ATTACH PARTITION \"company\".\"south\" \
             FOR VALUES IN ('south')"
        );
    }

    #[test]
    fn test_rewrite_identity_binds_values() {
        let stmt = render_default(StructuralStep::RewriteIdentity {
            target: PartitionRef::Root,
            set: IdentityValues::both(name("globex"), name("main")),
            matching: IdentityValues::both(name("acme"), name("north")),
        });
        assert_eq!(
            stmt.sql,
            "UPDATE \"company\".\"onesystem\" SET \"company\" = $1::text, \"branch\" = $2::text \
             WHERE \"company\" = $3::text AND \"branch\" = $4::text"
        );
        assert_eq!(stmt.params, vec!["globex", "main", "acme", "north"]);
    }

    #[test]
    fn test_rewrite_identity_requires_assignment() {
        let step = StructuralStep::RewriteIdentity {
            target: PartitionRef::Root,
            set: IdentityValues::default(),
            matching: IdentityValues::organization(name("acme")),
        };
        assert!(render(&step, &PartitionLayout::default()).is_err());
    }

    #[test]
    fn test_copy_members_reject() {
        let stmt = render_default(StructuralStep::CopyMembers {
            source: name("north"),
            target: name("main"),
            organization: name("globex"),
            subunit: name("hq"),
            conflict: ConflictPolicy::Reject,
        });
        assert!(stmt.sql.starts_with(
            "INSERT INTO \"company\".\"main\" (\"company\", \"branch\", \"id\", \"first_name\""
        ));
        assert!(stmt.sql.contains("SELECT $1::text, $2::text, \"id\", \"first_name\""));
        assert!(stmt.sql.ends_with("FROM \"company\".\"north\""));
        assert!(!stmt.sql.contains("ON CONFLICT"));
        assert_eq!(stmt.params, vec!["globex", "hq"]);
    }

    #[test]
    fn test_copy_members_upsert() {
        let stmt = render_default(StructuralStep::CopyMembers {
            source: name("north"),
            target: name("hq"),
            organization: name("globex"),
            subunit: name("hq"),
            conflict: ConflictPolicy::Upsert,
        });
        assert!(stmt.sql.contains(
            "ON CONFLICT (\"company\", \"branch\", \"username\") DO UPDATE SET \
             \"first_name\" = EXCLUDED.\"first_name\""
        ));
        assert!(stmt.sql.contains("\"role\" = EXCLUDED.\"role\""));
        assert!(!stmt.sql.contains("\"id\" = EXCLUDED"));
        assert!(!stmt.sql.contains("\"username\" = EXCLUDED"));
    }

    #[test]
    fn test_drop_sql() {
        let stmt = render_default(StructuralStep::Drop { name: name("acme") });
        assert_eq!(stmt.sql, "DROP TABLE \"company\".\"acme\"");
    }

    #[test]
    fn test_custom_layout() {
        let layout = PartitionLayout {
            schema: "tenants".to_string(),
            root_table: "members".to_string(),
            organization_column: "org".to_string(),
            subunit_column: "unit".to_string(),
        };
        let stmt = render(
            &StructuralStep::CreateOrganization {
                name: name("acme"),
                bound: name("acme"),
            },
            &layout,
        )
        .unwrap();
        assert!(stmt.sql.contains("PARTITION OF \"tenants\".\"members\""));
        assert!(stmt.sql.ends_with("PARTITION BY LIST (\"unit\")"));
    }
}
