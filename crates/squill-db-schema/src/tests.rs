use super::*;

fn column(name: &str, raw_type: &str) -> Column {
    Column {
        name: name.to_string(),
        raw_type: raw_type.to_string(),
        length: None,
        nullable: true,
        default: None,
        is_auto_increment: false,
        identity_generation: None,
        check: None,
    }
}

fn no_constraints() -> IndexMap<String, String> {
    IndexMap::new()
}

#[test]
fn test_table_ref_bare_name_defaults_to_public() {
    let t = TableRef::parse("users");
    assert_eq!(t.schema, "public");
    assert_eq!(t.name, "users");
    assert_eq!(t.to_string(), "public.users");
}

#[test]
fn test_table_ref_qualified() {
    let t = TableRef::parse("app.users");
    assert_eq!(t.schema, "app");
    assert_eq!(t.name, "users");
}

#[test]
fn test_table_ref_splits_on_first_dot_only() {
    let t = TableRef::parse("a.b.c");
    assert_eq!(t.schema, "a");
    assert_eq!(t.name, "b.c");
}

#[test]
fn test_data_type_serial_family() {
    for (raw, serial) in [
        ("smallint", "smallserial"),
        ("integer", "serial"),
        ("bigint", "bigserial"),
    ] {
        let mut col = column("id", raw);
        assert_eq!(col.data_type(), raw);
        col.is_auto_increment = true;
        assert_eq!(col.data_type(), serial);
    }
}

#[test]
fn test_data_type_zone_naive_aliases() {
    assert_eq!(
        column("at", "timestamp without time zone").data_type(),
        "timestamp"
    );
    assert_eq!(column("at", "time without time zone").data_type(), "time");
    // With time zone spellings pass through untouched.
    assert_eq!(
        column("at", "timestamp with time zone").data_type(),
        "timestamp with time zone"
    );
}

#[test]
fn test_data_type_auto_increment_on_non_integer_is_ignored() {
    let mut col = column("name", "text");
    col.is_auto_increment = true;
    assert_eq!(col.data_type(), "text");
}

#[test]
fn test_strip_role_braces() {
    assert_eq!(strip_role_braces("{app_user}"), "app_user");
    assert_eq!(strip_role_braces("{a,b}"), "a,b");
    // Exactly one brace at each end, nothing more.
    assert_eq!(strip_role_braces("{{odd}}"), "{odd}");
    assert_eq!(strip_role_braces("plain"), "plain");
}

#[test]
fn test_normalize_view_body() {
    let body = " SELECT a,\n        b\n   FROM t;";
    assert_eq!(normalize_view_body(body), "SELECT a, b FROM t");
}

#[test]
fn test_view_ddl_has_one_trailing_semicolon() {
    let ddl = view_ddl("public", "v", "SELECT 1;\n");
    assert_eq!(ddl, "CREATE VIEW public.v AS SELECT 1;");
}

#[test]
fn test_enum_type_ddl() {
    let labels = vec!["draft".to_string(), "published".to_string()];
    assert_eq!(
        enum_type_ddl("post_status", &labels),
        "CREATE TYPE post_status AS ENUM ('draft', 'published');"
    );
}

#[test]
fn test_enum_type_ddl_escapes_quotes() {
    let labels = vec!["it's".to_string()];
    assert_eq!(
        enum_type_ddl("weird", &labels),
        "CREATE TYPE weird AS ENUM ('it''s');"
    );
}

#[test]
fn test_foreign_key_ddl() {
    let fk = ForeignKey {
        schema: "public".to_string(),
        table: "posts".to_string(),
        constraint_name: "posts_author_id_fkey".to_string(),
        column: "author_id".to_string(),
        ref_schema: "public".to_string(),
        ref_table: "users".to_string(),
        ref_column: "id".to_string(),
        on_update: "NO ACTION".to_string(),
        on_delete: "CASCADE".to_string(),
    };
    assert_eq!(
        fk.to_ddl(),
        "ALTER TABLE ONLY public.posts ADD CONSTRAINT posts_author_id_fkey \
         FOREIGN KEY (author_id) REFERENCES public.users(id) \
         ON UPDATE NO ACTION ON DELETE CASCADE"
    );
}

#[test]
fn test_policy_ddl_full() {
    let policy = Policy {
        name: "tenant_isolation".to_string(),
        permissive: "PERMISSIVE".to_string(),
        roles: "app_user".to_string(),
        command: "ALL".to_string(),
        using_expr: Some("(tenant_id = current_tenant())".to_string()),
        with_check_expr: Some("(tenant_id = current_tenant())".to_string()),
    };
    assert_eq!(
        policy.to_ddl("accounts"),
        "CREATE POLICY tenant_isolation ON accounts AS PERMISSIVE FOR ALL TO app_user \
         USING (tenant_id = current_tenant()) WITH CHECK (tenant_id = current_tenant())"
    );
}

#[test]
fn test_policy_ddl_empty_permissive_collapses_slot() {
    let policy = Policy {
        name: "p".to_string(),
        permissive: String::new(),
        roles: "r".to_string(),
        command: "SELECT".to_string(),
        using_expr: Some("(true)".to_string()),
        with_check_expr: None,
    };
    // Servers without a permissive column render a doubled space.
    assert_eq!(
        policy.to_ddl("t"),
        "CREATE POLICY p ON t AS  FOR SELECT TO r USING (true)"
    );
}

#[test]
fn test_column_line_rendering() {
    let mut price = column("price", "numeric");
    price.nullable = false;
    price.default = Some("0".to_string());
    price.check = Some(ColumnCheck {
        name: "products_price_check".to_string(),
        definition: "CHECK ((price >= (0)::numeric))".to_string(),
    });
    let mut code = column("code", "character varying");
    code.length = Some(12);
    let mut seq = column("seq", "bigint");
    seq.identity_generation = Some("ALWAYS".to_string());

    let ddl = build_table_ddl(
        &TableRef::parse("public.products"),
        &[price, code, seq],
        &[],
        &[],
        &[],
        &[],
        &no_constraints(),
        &no_constraints(),
    );
    insta::assert_snapshot!(ddl, @r#"
CREATE TABLE public.products (
    "price" numeric NOT NULL DEFAULT 0 CONSTRAINT products_price_check CHECK ((price >= (0)::numeric)),
    "code" character varying(12),
    "seq" bigint GENERATED ALWAYS AS IDENTITY
);
"#);
}

#[test]
fn test_composite_primary_key_clause() {
    let mut id = column("id", "integer");
    id.nullable = false;
    let mut tenant = column("tenant_id", "integer");
    tenant.nullable = false;

    let ddl = build_table_ddl(
        &TableRef::parse("public.events"),
        &[id, tenant],
        &["id".to_string(), "tenant_id".to_string()],
        &[],
        &[],
        &[],
        &no_constraints(),
        &no_constraints(),
    );
    assert!(
        ddl.contains("PRIMARY KEY (\"id\", \"tenant_id\")"),
        "unexpected ddl: {ddl}"
    );
}

#[test]
fn test_auto_increment_suppresses_default() {
    let mut id = column("id", "integer");
    id.nullable = false;
    id.default = Some("nextval('users_id_seq'::regclass)".to_string());
    id.is_auto_increment = true;

    let ddl = build_table_ddl(
        &TableRef::parse("users"),
        &[id],
        &[],
        &[],
        &[],
        &[],
        &no_constraints(),
        &no_constraints(),
    );
    assert!(ddl.contains("\"id\" serial"), "unexpected ddl: {ddl}");
    assert!(!ddl.contains("DEFAULT"), "unexpected ddl: {ddl}");
}

#[test]
fn test_non_auto_increment_default_is_verbatim() {
    let mut at = column("created_at", "timestamp with time zone");
    at.default = Some("now()".to_string());

    let ddl = build_table_ddl(
        &TableRef::parse("users"),
        &[at],
        &[],
        &[],
        &[],
        &[],
        &no_constraints(),
        &no_constraints(),
    );
    assert!(ddl.contains("DEFAULT now()"), "unexpected ddl: {ddl}");
}

#[test]
fn test_multi_column_constraints_render_in_lexicographic_order() {
    let mut checks = IndexMap::new();
    checks.insert(
        "zz_range_check".to_string(),
        "CHECK ((lo < hi))".to_string(),
    );
    checks.insert(
        "aa_span_check".to_string(),
        "CHECK (((hi - lo) < 100))".to_string(),
    );
    let mut uniques = IndexMap::new();
    uniques.insert("uq_b".to_string(), "UNIQUE (b)".to_string());
    uniques.insert("uq_a".to_string(), "UNIQUE (a)".to_string());

    let ddl = build_table_ddl(
        &TableRef::parse("public.spans"),
        &[column("lo", "integer"), column("hi", "integer")],
        &[],
        &[],
        &[],
        &[],
        &checks,
        &uniques,
    );
    let aa = ddl.find("CONSTRAINT aa_span_check").unwrap();
    let zz = ddl.find("CONSTRAINT zz_range_check").unwrap();
    assert!(aa < zz, "checks not sorted by name:\n{ddl}");
    let uq_a = ddl.find("ADD CONSTRAINT uq_a").unwrap();
    let uq_b = ddl.find("ADD CONSTRAINT uq_b").unwrap();
    assert!(uq_a < uq_b, "uniques not sorted by name:\n{ddl}");
}

#[test]
fn test_rendering_is_idempotent() {
    let mut uniques = IndexMap::new();
    uniques.insert("users_email_key".to_string(), "UNIQUE (email)".to_string());
    let args = (
        TableRef::parse("public.users"),
        vec![column("email", "text")],
        vec![],
        vec!["CREATE INDEX users_created_at_idx ON public.users USING btree (created_at)".to_string()],
        vec![],
        vec![],
        no_constraints(),
        uniques,
    );
    let first = build_table_ddl(
        &args.0, &args.1, &args.2, &args.3, &args.4, &args.5, &args.6, &args.7,
    );
    let second = build_table_ddl(
        &args.0, &args.1, &args.2, &args.3, &args.4, &args.5, &args.6, &args.7,
    );
    assert_eq!(first, second);
}

#[test]
fn test_users_round_trip_scenario() {
    // public.users with a serial id, a unique email whose backing index has
    // the same name as the constraint (so the index list is already empty),
    // and a single-column primary key.
    let mut id = column("id", "integer");
    id.nullable = false;
    id.default = Some("nextval('users_id_seq'::regclass)".to_string());
    id.is_auto_increment = true;
    let mut email = column("email", "character varying");
    email.length = Some(255);
    email.nullable = false;
    let mut uniques = IndexMap::new();
    uniques.insert("users_email_key".to_string(), "UNIQUE (email)".to_string());

    let ddl = build_table_ddl(
        &TableRef::parse("public.users"),
        &[id, email],
        &["id".to_string()],
        &[],
        &[],
        &[],
        &no_constraints(),
        &uniques,
    );
    insta::assert_snapshot!(ddl, @r#"
CREATE TABLE public.users (
    "id" serial NOT NULL,
    "email" character varying(255) NOT NULL,
    PRIMARY KEY ("id")
);
ALTER TABLE public.users ADD CONSTRAINT users_email_key UNIQUE (email);
"#);
}
