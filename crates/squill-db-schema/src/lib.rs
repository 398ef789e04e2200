//! Schema model and canonical DDL assembly for squill.
//!
//! This crate contains the pure half of the exporter: the structures the
//! catalog reader in `squill` decodes rows into, and the renderer that turns
//! one table's worth of catalog facts into a single deterministic DDL string.
//! Nothing here performs I/O, so everything can be exercised from fixed
//! fixtures.
//!
//! Determinism is the contract: two semantically identical schemas must
//! render to byte-identical text, because the diff engine downstream compares
//! rendered output structurally. Catalog-ordered inputs (columns, indexes,
//! foreign keys, policies) render in their given order; name-keyed constraint
//! maps render in lexicographic name order.

use indexmap::IndexMap;
use std::fmt;

/// Indentation used for column and constraint lines inside `CREATE TABLE`.
const INDENT: &str = "    ";

/// A PostgreSQL identifier wrapper.
///
/// Display writes the value quoted with double quotes, doubling any embedded
/// quote characters.
///
/// # Example
/// ```
/// use squill_db_schema::Ident;
/// assert_eq!(format!("{}", Ident("user")), "\"user\"");
/// assert_eq!(format!("{}", Ident("bla\"h")), "\"bla\"\"h\"");
/// ```
pub struct Ident<T: AsRef<str>>(pub T);

impl<T: AsRef<str>> fmt::Display for Ident<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"")?;
        for c in self.0.as_ref().chars() {
            if c == '"' {
                write!(f, "\"\"")?;
            } else {
                write!(f, "{}", c)?;
            }
        }
        write!(f, "\"")
    }
}

/// A schema-qualified table reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub schema: String,
    pub name: String,
}

impl TableRef {
    /// Parse `"schema.name"` or a bare `"name"`.
    ///
    /// A bare name lands in `public`. Qualified names split on the first `.`
    /// only, so `a.b.c` yields schema `a` and name `b.c`.
    pub fn parse(table: &str) -> Self {
        match table.split_once('.') {
            Some((schema, name)) => Self {
                schema: schema.to_string(),
                name: name.to_string(),
            },
            None => Self {
                schema: "public".to_string(),
                name: table.to_string(),
            },
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// A CHECK constraint covering exactly one column, rendered inline on that
/// column's line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnCheck {
    pub name: String,
    /// Full definition as produced by `pg_get_constraintdef`, e.g.
    /// `CHECK ((age >= 0))`.
    pub definition: String,
}

/// A table column as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    /// Raw catalog type. Render with [`Column::data_type`], which applies the
    /// canonical aliases.
    pub raw_type: String,
    /// Character length for bounded types (e.g. `character varying(255)`),
    /// absent otherwise.
    pub length: Option<i32>,
    pub nullable: bool,
    /// Default expression verbatim from the catalog.
    pub default: Option<String>,
    /// True iff the default is a sequence advance (`nextval(...)`). Postgres
    /// has no catalog flag for serial columns, so this is derived from the
    /// default expression.
    pub is_auto_increment: bool,
    /// `ALWAYS` or `BY DEFAULT` for identity columns.
    pub identity_generation: Option<String>,
    /// Inline single-column check, if any.
    pub check: Option<ColumnCheck>,
}

impl Column {
    /// Canonical type token for DDL output.
    ///
    /// Sequence-backed integer columns collapse to the serial family, and the
    /// zone-naive timestamp/time spellings use their standard abbreviations.
    /// Everything else renders as the catalog reported it.
    pub fn data_type(&self) -> &str {
        match self.raw_type.as_str() {
            "smallint" if self.is_auto_increment => "smallserial",
            "integer" if self.is_auto_increment => "serial",
            "bigint" if self.is_auto_increment => "bigserial",
            // The SQL standard makes bare `timestamp` equivalent to
            // `timestamp without time zone`; same for `time`.
            "timestamp without time zone" => "timestamp",
            "time without time zone" => "time",
            _ => &self.raw_type,
        }
    }
}

/// A single-column foreign key constraint.
///
/// Composite foreign keys are not modeled; the catalog query behind this
/// returns one row per key column, and multi-column keys are out of scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub schema: String,
    pub table: String,
    pub constraint_name: String,
    pub column: String,
    pub ref_schema: String,
    pub ref_table: String,
    pub ref_column: String,
    pub on_update: String,
    pub on_delete: String,
}

impl ForeignKey {
    /// Render as a standalone `ALTER TABLE ONLY ... ADD CONSTRAINT`
    /// statement, without the trailing semicolon.
    pub fn to_ddl(&self) -> String {
        format!(
            "ALTER TABLE ONLY {}.{} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {}.{}({}) ON UPDATE {} ON DELETE {}",
            self.schema,
            self.table,
            self.constraint_name,
            self.column,
            self.ref_schema,
            self.ref_table,
            self.ref_column,
            self.on_update,
            self.on_delete,
        )
    }
}

/// A row-level-security policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    pub name: String,
    /// `PERMISSIVE` or `RESTRICTIVE`; empty string on servers whose
    /// `pg_policies` view predates the permissive column.
    pub permissive: String,
    /// Comma-separated role list with the array braces already stripped.
    pub roles: String,
    /// The command the policy applies to (`ALL`, `SELECT`, ...).
    pub command: String,
    pub using_expr: Option<String>,
    pub with_check_expr: Option<String>,
}

impl Policy {
    /// Render as a `CREATE POLICY` statement on the given (unqualified)
    /// table name, without the trailing semicolon.
    ///
    /// The `USING` and `WITH CHECK` clauses appear only when the catalog
    /// reported the corresponding expression. An empty permissive token
    /// renders as `AS  FOR`, collapsing the slot.
    pub fn to_ddl(&self, table: &str) -> String {
        let mut ddl = format!(
            "CREATE POLICY {} ON {} AS {} FOR {} TO {}",
            self.name, table, self.permissive, self.command, self.roles
        );
        if let Some(using) = &self.using_expr {
            ddl.push_str(&format!(" USING {}", using));
        }
        if let Some(check) = &self.with_check_expr {
            ddl.push_str(&format!(" WITH CHECK {}", check));
        }
        ddl
    }
}

/// Strip exactly one leading `{` and one trailing `}` from a role-list
/// array literal.
///
/// No further parsing happens; role names containing literal braces are not
/// handled.
pub fn strip_role_braces(roles: &str) -> &str {
    let roles = roles.strip_prefix('{').unwrap_or(roles);
    roles.strip_suffix('}').unwrap_or(roles)
}

/// Normalize a view body for stable output.
///
/// Trims surrounding whitespace, removes newlines, collapses runs of spaces
/// to one space, and strips one trailing semicolon.
pub fn normalize_view_body(definition: &str) -> String {
    let trimmed = definition.trim();
    let mut out = String::with_capacity(trimmed.len());
    let mut last_was_space = false;
    for c in trimmed.chars() {
        if c == '\n' {
            continue;
        }
        if c == ' ' {
            if last_was_space {
                continue;
            }
            last_was_space = true;
        } else {
            last_was_space = false;
        }
        out.push(c);
    }
    if out.ends_with(';') {
        out.pop();
    }
    out
}

/// Render a complete `CREATE VIEW` statement with a normalized body.
pub fn view_ddl(schema: &str, name: &str, definition: &str) -> String {
    format!(
        "CREATE VIEW {}.{} AS {};",
        schema,
        name,
        normalize_view_body(definition)
    )
}

/// Render a complete `CREATE TYPE ... AS ENUM` statement.
///
/// Labels are rendered in the order given; the catalog query orders them by
/// `enumsortorder`.
pub fn enum_type_ddl(name: &str, labels: &[String]) -> String {
    let quoted: Vec<String> = labels
        .iter()
        .map(|label| format!("'{}'", label.replace('\'', "''")))
        .collect();
    format!("CREATE TYPE {} AS ENUM ({});", name, quoted.join(", "))
}

/// Assemble one table's catalog facts into a single DDL string.
///
/// Section order is fixed: column lines (catalog ordinal order), the
/// `PRIMARY KEY` clause, multi-column `CONSTRAINT` clauses (lexicographic by
/// name), the closing `);`, then one statement each for indexes, foreign
/// keys, policies, and unique constraints. The trailing newline is trimmed.
///
/// Auto-increment columns render their serial type and suppress the explicit
/// `DEFAULT`; the two are mutually exclusive in output.
#[allow(clippy::too_many_arguments)]
pub fn build_table_ddl(
    table: &TableRef,
    columns: &[Column],
    pkey_columns: &[String],
    index_defs: &[String],
    foreign_keys: &[ForeignKey],
    policies: &[Policy],
    check_constraints: &IndexMap<String, String>,
    unique_constraints: &IndexMap<String, String>,
) -> String {
    let mut ddl = format!("CREATE TABLE {} (", table);
    for (i, col) in columns.iter().enumerate() {
        if i > 0 {
            ddl.push(',');
        }
        ddl.push('\n');
        ddl.push_str(INDENT);
        ddl.push_str(&format!("{} {}", Ident(&col.name), col.data_type()));
        if let Some(length) = col.length {
            ddl.push_str(&format!("({})", length));
        }
        if !col.nullable {
            ddl.push_str(" NOT NULL");
        }
        if let Some(default) = &col.default
            && !col.is_auto_increment
        {
            ddl.push_str(&format!(" DEFAULT {}", default));
        }
        if let Some(generation) = &col.identity_generation {
            ddl.push_str(&format!(" GENERATED {} AS IDENTITY", generation));
        }
        if let Some(check) = &col.check {
            ddl.push_str(&format!(" CONSTRAINT {} {}", check.name, check.definition));
        }
    }
    if !pkey_columns.is_empty() {
        let quoted: Vec<String> = pkey_columns.iter().map(|c| Ident(c).to_string()).collect();
        ddl.push_str(",\n");
        ddl.push_str(INDENT);
        ddl.push_str(&format!("PRIMARY KEY ({})", quoted.join(", ")));
    }
    // Sorted so the statement order is byte-stable across runs.
    let mut check_names: Vec<&String> = check_constraints.keys().collect();
    check_names.sort_unstable();
    for name in check_names {
        ddl.push_str(",\n");
        ddl.push_str(INDENT);
        ddl.push_str(&format!("CONSTRAINT {} {}", name, check_constraints[name]));
    }
    ddl.push_str("\n);\n");
    for def in index_defs {
        ddl.push_str(&format!("{};\n", def));
    }
    for fk in foreign_keys {
        ddl.push_str(&format!("{};\n", fk.to_ddl()));
    }
    for policy in policies {
        ddl.push_str(&format!("{};\n", policy.to_ddl(&table.name)));
    }
    let mut unique_names: Vec<&String> = unique_constraints.keys().collect();
    unique_names.sort_unstable();
    for name in unique_names {
        ddl.push_str(&format!(
            "ALTER TABLE {} ADD CONSTRAINT {} {};\n",
            table, name, unique_constraints[name]
        ));
    }
    ddl.trim_end_matches('\n').to_string()
}

#[cfg(test)]
mod tests;
