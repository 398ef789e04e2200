//! Catalog introspection: read-only queries that reconstruct DDL.
//!
//! A [`CatalogReader`] borrows one [`Session`] and exposes one accessor per
//! catalog fact. Each accessor runs a single parameterized query and fully
//! drains the result set before returning; tokio-postgres buffers the rows,
//! so no server cursor outlives its call. Accessors are awaited sequentially
//! on the shared session and never retried; any failure propagates as-is.
//!
//! The output contract is determinism: every query that feeds rendered text
//! carries an explicit ORDER BY, and the assembler in `squill-db-schema`
//! sorts name-keyed constraint maps, so one catalog state always renders to
//! one byte sequence.

use indexmap::IndexMap;

use crate::conn::{Session, SessionExt};
use crate::{Error, Result};
use squill_db_schema::{
    Column, ColumnCheck, ForeignKey, Policy, TableRef, build_table_ddl, enum_type_ddl,
    strip_role_braces, view_ddl,
};

/// Base tables, excluding system schemas and known virtual relations.
const TABLES_SQL: &str = "\
    SELECT table_schema, table_name FROM information_schema.tables
    WHERE table_schema NOT IN ('information_schema', 'pg_catalog')
    AND (table_schema != 'public' OR table_name != 'pg_buffercache')
    AND table_type = 'BASE TABLE'
    ORDER BY table_schema, table_name";

/// Views with their bodies, additionally excluding the pg_repack schema.
const VIEWS_SQL: &str = "\
    SELECT table_schema, table_name, definition FROM information_schema.tables
    INNER JOIN pg_views ON table_name = viewname
    WHERE table_schema NOT IN ('information_schema', 'pg_catalog', 'repack')
    AND (table_schema != 'public' OR table_name != 'pg_buffercache')
    AND table_type = 'VIEW'
    ORDER BY table_schema, table_name";

/// Enum types with labels in declaration order.
const ENUM_TYPES_SQL: &str = "\
    SELECT t.typname, array_agg(e.enumlabel ORDER BY e.enumsortorder)
    FROM pg_enum e
    JOIN pg_type t ON e.enumtypid = t.oid
    GROUP BY t.typname
    ORDER BY t.typname";

/// Columns in ordinal order, each joined to its single-column check
/// constraint when one exists. The `array_length(conkey, 1) = 1` filter is
/// what restricts the join to checks covering exactly one column;
/// multi-column checks come back through [`CatalogReader::check_constraints`]
/// instead.
const COLUMNS_SQL: &str = "\
    WITH
      columns AS (
        SELECT
          s.column_name,
          s.column_default,
          s.is_nullable,
          s.character_maximum_length::text,
          CASE
          WHEN s.data_type IN ('ARRAY', 'USER-DEFINED') THEN format_type(f.atttypid, f.atttypmod)
          ELSE s.data_type
          END AS data_type,
          s.identity_generation
        FROM pg_attribute f
        JOIN pg_class c ON c.oid = f.attrelid
        JOIN pg_type t ON t.oid = f.atttypid
        LEFT JOIN pg_attrdef d ON d.adrelid = c.oid AND d.adnum = f.attnum
        LEFT JOIN pg_namespace n ON n.oid = c.relnamespace
        LEFT JOIN information_schema.columns s
          ON s.column_name = f.attname AND s.table_name = c.relname AND s.table_schema = n.nspname
        WHERE c.relkind = 'r'::char
        AND n.nspname = $1
        AND c.relname = $2
        AND f.attnum > 0
        ORDER BY f.attnum
      ),
      column_constraints AS (
        SELECT att.attname AS column_name, tmp.name, tmp.type, tmp.definition
        FROM (
          SELECT unnest(con.conkey) AS conkey,
                 pg_get_constraintdef(con.oid, true) AS definition,
                 cls.oid AS relid,
                 con.conname AS name,
                 con.contype AS type
          FROM   pg_constraint con
          JOIN   pg_namespace nsp ON nsp.oid = con.connamespace
          JOIN   pg_class cls ON cls.oid = con.conrelid
          WHERE  nsp.nspname = $1
          AND    cls.relname = $2
          AND    array_length(con.conkey, 1) = 1
        ) tmp
        JOIN pg_attribute att ON tmp.conkey = att.attnum AND tmp.relid = att.attrelid
      ),
      check_constraints AS (
        SELECT column_name, name, definition
        FROM   column_constraints
        WHERE  type = 'c'
      )
    SELECT    columns.*, checks.name, checks.definition
    FROM      columns
    LEFT JOIN check_constraints checks USING (column_name)";

/// Primary key columns in ordinal order.
const PRIMARY_KEY_SQL: &str = "\
    SELECT kcu.column_name
    FROM information_schema.table_constraints AS tc
    JOIN information_schema.key_column_usage AS kcu
      USING (table_schema, table_name, constraint_name)
    WHERE constraint_type = 'PRIMARY KEY'
    AND tc.table_schema = $1 AND tc.table_name = $2
    ORDER BY kcu.ordinal_position";

/// Index definitions, minus the indexes that exist only to back a primary
/// key or unique constraint. The exclusion set is matched by exact name, so
/// those indexes render through the constraint path and never twice.
const INDEXES_SQL: &str = "\
    WITH
      unique_and_pk_constraints AS (
        SELECT con.conname AS name
        FROM   pg_constraint con
        JOIN   pg_namespace nsp ON nsp.oid = con.connamespace
        JOIN   pg_class cls ON cls.oid = con.conrelid
        WHERE  con.contype IN ('p', 'u')
        AND    nsp.nspname = $1
        AND    cls.relname = $2
      )
    SELECT indexname, indexdef
    FROM   pg_indexes
    WHERE  schemaname = $1
    AND    tablename = $2
    AND    indexname NOT IN (SELECT name FROM unique_and_pk_constraints)
    ORDER BY indexname";

/// Single-column foreign keys with their referential actions.
const FOREIGN_KEYS_SQL: &str = "\
    SELECT
      tc.table_schema, tc.constraint_name, tc.table_name, kcu.column_name,
      ccu.table_schema AS foreign_table_schema,
      ccu.table_name AS foreign_table_name,
      ccu.column_name AS foreign_column_name,
      rc.update_rule AS foreign_update_rule,
      rc.delete_rule AS foreign_delete_rule
    FROM information_schema.table_constraints AS tc
    JOIN information_schema.key_column_usage AS kcu
      ON tc.constraint_name = kcu.constraint_name
    JOIN information_schema.constraint_column_usage AS ccu
      ON tc.constraint_name = ccu.constraint_name
    JOIN information_schema.referential_constraints AS rc
      ON tc.constraint_name = rc.constraint_name
    WHERE constraint_type = 'FOREIGN KEY'
    AND tc.table_schema = $1 AND tc.table_name = $2
    ORDER BY tc.constraint_name";

/// Check constraints spanning more than one column.
const CHECK_CONSTRAINTS_SQL: &str = "\
    SELECT con.conname, pg_get_constraintdef(con.oid, true)
    FROM   pg_constraint con
    JOIN   pg_namespace nsp ON nsp.oid = con.connamespace
    JOIN   pg_class cls ON cls.oid = con.conrelid
    WHERE  con.contype = 'c'
    AND    nsp.nspname = $1
    AND    cls.relname = $2
    AND    array_length(con.conkey, 1) > 1
    ORDER BY con.conname";

/// Unique constraints of any width.
const UNIQUE_CONSTRAINTS_SQL: &str = "\
    SELECT con.conname, pg_get_constraintdef(con.oid)
    FROM   pg_constraint con
    JOIN   pg_namespace nsp ON nsp.oid = con.connamespace
    JOIN   pg_class cls ON cls.oid = con.conrelid
    WHERE  con.contype = 'u'
    AND    nsp.nspname = $1
    AND    cls.relname = $2
    ORDER BY con.conname";

const SERVER_VERSION_SQL: &str =
    "SELECT setting FROM pg_settings WHERE name = 'server_version_num'";

/// Policy query for servers that expose `pg_policies.permissive`.
const POLICIES_SQL: &str = "\
    SELECT policyname, permissive, roles::text, cmd, qual, with_check
    FROM pg_policies WHERE schemaname = $1 AND tablename = $2
    ORDER BY policyname";

/// Policy query for 9.x servers, where the view has no permissive column;
/// the slot is filled with an empty string so both variants share one row
/// shape downstream.
const POLICIES_LEGACY_SQL: &str = "\
    SELECT policyname, ''::text, roles::text, cmd, qual, with_check
    FROM pg_policies WHERE schemaname = $1 AND tablename = $2
    ORDER BY policyname";

/// `pg_policies` gained its permissive column in PostgreSQL 10
/// (`server_version_num` 100000).
const FIRST_PERMISSIVE_VERSION: i64 = 100_000;

/// Pick the policy query variant for a numeric server version.
fn policy_query(version_num: i64) -> &'static str {
    if version_num < FIRST_PERMISSIVE_VERSION {
        POLICIES_LEGACY_SQL
    } else {
        POLICIES_SQL
    }
}

/// Read-only view of one database's schema, borrowed over a session.
///
/// # Example
///
/// ```ignore
/// let client = config.connect().await?;
/// let reader = CatalogReader::new(&client);
/// for table in reader.table_names().await? {
///     println!("{}", reader.table_ddl(&table).await?);
/// }
/// ```
pub struct CatalogReader<'a, S: Session> {
    session: &'a S,
}

impl<'a, S: Session> CatalogReader<'a, S> {
    /// Create a reader over a session handle.
    pub fn new(session: &'a S) -> Self {
        Self { session }
    }

    /// Qualified `schema.name` strings for every base table.
    pub async fn table_names(&self) -> Result<Vec<String>> {
        let rows = self
            .session
            .traced()
            .query(TABLES_SQL, &[])
            .await
            .map_err(Error::Query)?;
        let mut tables = Vec::with_capacity(rows.len());
        for row in rows {
            let schema: String = row.try_get(0).map_err(Error::Scan)?;
            let name: String = row.try_get(1).map_err(Error::Scan)?;
            tables.push(format!("{}.{}", schema, name));
        }
        Ok(tables)
    }

    /// Complete `CREATE VIEW ...;` statements with normalized bodies.
    pub async fn view_ddls(&self) -> Result<Vec<String>> {
        let rows = self
            .session
            .traced()
            .query(VIEWS_SQL, &[])
            .await
            .map_err(Error::Query)?;
        let mut ddls = Vec::with_capacity(rows.len());
        for row in rows {
            let schema: String = row.try_get(0).map_err(Error::Scan)?;
            let name: String = row.try_get(1).map_err(Error::Scan)?;
            let definition: String = row.try_get(2).map_err(Error::Scan)?;
            ddls.push(view_ddl(&schema, &name, &definition));
        }
        Ok(ddls)
    }

    /// Complete `CREATE TYPE ... AS ENUM (...);` statements.
    pub async fn enum_type_ddls(&self) -> Result<Vec<String>> {
        let rows = self
            .session
            .traced()
            .query(ENUM_TYPES_SQL, &[])
            .await
            .map_err(Error::Query)?;
        let mut ddls = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row.try_get(0).map_err(Error::Scan)?;
            let labels: Vec<String> = row.try_get(1).map_err(Error::Scan)?;
            ddls.push(enum_type_ddl(&name, &labels));
        }
        Ok(ddls)
    }

    /// The server's numeric version, e.g. 130005 for 13.5.
    pub async fn server_version(&self) -> Result<i64> {
        let row = self
            .session
            .traced()
            .query_one(SERVER_VERSION_SQL, &[])
            .await
            .map_err(Error::Query)?;
        let setting: String = row.try_get(0).map_err(Error::Scan)?;
        setting
            .parse()
            .map_err(|source| Error::Conversion {
                field: "server_version_num",
                value: setting.clone(),
                source,
            })
    }

    /// One table's columns in ordinal order, with inline checks attached.
    pub async fn columns(&self, table: &TableRef) -> Result<Vec<Column>> {
        let rows = self
            .session
            .traced()
            .query(COLUMNS_SQL, &[&table.schema, &table.name])
            .await
            .map_err(Error::Query)?;
        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row.try_get(0).map_err(Error::Scan)?;
            let default: Option<String> = row.try_get(1).map_err(Error::Scan)?;
            let is_nullable: String = row.try_get(2).map_err(Error::Scan)?;
            let max_length: Option<String> = row.try_get(3).map_err(Error::Scan)?;
            let raw_type: String = row.try_get(4).map_err(Error::Scan)?;
            let identity_generation: Option<String> = row.try_get(5).map_err(Error::Scan)?;
            let check_name: Option<String> = row.try_get(6).map_err(Error::Scan)?;
            let check_definition: Option<String> = row.try_get(7).map_err(Error::Scan)?;

            let length = match max_length {
                Some(raw) => Some(raw.parse::<i32>().map_err(|source| Error::Conversion {
                    field: "character_maximum_length",
                    value: raw.clone(),
                    source,
                })?),
                None => None,
            };
            let is_auto_increment = default
                .as_deref()
                .is_some_and(|d| d.starts_with("nextval("));
            let check = match (check_name, check_definition) {
                (Some(name), Some(definition)) => Some(ColumnCheck { name, definition }),
                _ => None,
            };
            columns.push(Column {
                name: name.trim_matches(['"', ' ']).to_string(),
                raw_type,
                length,
                nullable: is_nullable == "YES",
                default,
                is_auto_increment,
                identity_generation,
                check,
            });
        }
        Ok(columns)
    }

    /// Primary key column names in ordinal order; empty when the table has
    /// no primary key.
    pub async fn primary_key_columns(&self, table: &TableRef) -> Result<Vec<String>> {
        let rows = self
            .session
            .traced()
            .query(PRIMARY_KEY_SQL, &[&table.schema, &table.name])
            .await
            .map_err(Error::Query)?;
        let mut names = Vec::with_capacity(rows.len());
        for row in rows {
            names.push(row.try_get(0).map_err(Error::Scan)?);
        }
        Ok(names)
    }

    /// Native index-creation statements, excluding constraint-backed
    /// indexes.
    pub async fn index_defs(&self, table: &TableRef) -> Result<Vec<String>> {
        let rows = self
            .session
            .traced()
            .query(INDEXES_SQL, &[&table.schema, &table.name])
            .await
            .map_err(Error::Query)?;
        let mut defs = Vec::with_capacity(rows.len());
        for row in rows {
            let def: String = row.try_get(1).map_err(Error::Scan)?;
            defs.push(def);
        }
        Ok(defs)
    }

    /// Single-column foreign keys, one per catalog row.
    pub async fn foreign_keys(&self, table: &TableRef) -> Result<Vec<ForeignKey>> {
        let rows = self
            .session
            .traced()
            .query(FOREIGN_KEYS_SQL, &[&table.schema, &table.name])
            .await
            .map_err(Error::Query)?;
        let mut keys = Vec::with_capacity(rows.len());
        for row in rows {
            keys.push(ForeignKey {
                schema: row.try_get(0).map_err(Error::Scan)?,
                constraint_name: row.try_get(1).map_err(Error::Scan)?,
                table: row.try_get(2).map_err(Error::Scan)?,
                column: row.try_get(3).map_err(Error::Scan)?,
                ref_schema: row.try_get(4).map_err(Error::Scan)?,
                ref_table: row.try_get(5).map_err(Error::Scan)?,
                ref_column: row.try_get(6).map_err(Error::Scan)?,
                on_update: row.try_get(7).map_err(Error::Scan)?,
                on_delete: row.try_get(8).map_err(Error::Scan)?,
            });
        }
        Ok(keys)
    }

    /// Check constraints spanning more than one column, keyed by name.
    pub async fn check_constraints(&self, table: &TableRef) -> Result<IndexMap<String, String>> {
        self.constraint_map(CHECK_CONSTRAINTS_SQL, table).await
    }

    /// All unique constraints, keyed by name.
    pub async fn unique_constraints(&self, table: &TableRef) -> Result<IndexMap<String, String>> {
        self.constraint_map(UNIQUE_CONSTRAINTS_SQL, table).await
    }

    async fn constraint_map(
        &self,
        sql: &str,
        table: &TableRef,
    ) -> Result<IndexMap<String, String>> {
        let rows = self
            .session
            .traced()
            .query(sql, &[&table.schema, &table.name])
            .await
            .map_err(Error::Query)?;
        let mut map = IndexMap::with_capacity(rows.len());
        for row in rows {
            let name: String = row.try_get(0).map_err(Error::Scan)?;
            let definition: String = row.try_get(1).map_err(Error::Scan)?;
            map.insert(name, definition);
        }
        Ok(map)
    }

    /// Row-level-security policies, using the query variant matching the
    /// server version.
    pub async fn policies(&self, table: &TableRef) -> Result<Vec<Policy>> {
        let version = self.server_version().await?;
        let rows = self
            .session
            .traced()
            .query(policy_query(version), &[&table.schema, &table.name])
            .await
            .map_err(Error::Query)?;
        let mut policies = Vec::with_capacity(rows.len());
        for row in rows {
            let roles: String = row.try_get(2).map_err(Error::Scan)?;
            policies.push(Policy {
                name: row.try_get(0).map_err(Error::Scan)?,
                permissive: row.try_get(1).map_err(Error::Scan)?,
                roles: strip_role_braces(&roles).to_string(),
                command: row.try_get(3).map_err(Error::Scan)?,
                using_expr: row.try_get(4).map_err(Error::Scan)?,
                with_check_expr: row.try_get(5).map_err(Error::Scan)?,
            });
        }
        Ok(policies)
    }

    /// Render one table's full DDL: the `CREATE TABLE` body plus index,
    /// foreign key, policy, and unique constraint statements.
    ///
    /// Accepts `schema.name` or a bare name (defaults to `public`).
    pub async fn table_ddl(&self, table: &str) -> Result<String> {
        let table = TableRef::parse(table);
        let columns = self.columns(&table).await?;
        let pkey_columns = self.primary_key_columns(&table).await?;
        let index_defs = self.index_defs(&table).await?;
        let foreign_keys = self.foreign_keys(&table).await?;
        let policies = self.policies(&table).await?;
        let check_constraints = self.check_constraints(&table).await?;
        let unique_constraints = self.unique_constraints(&table).await?;
        Ok(build_table_ddl(
            &table,
            &columns,
            &pkey_columns,
            &index_defs,
            &foreign_keys,
            &policies,
            &check_constraints,
            &unique_constraints,
        ))
    }
}
