//! Quoting helpers and builders for the statements that cannot take bind
//! parameters (DDL, `ALTER SYSTEM`, grants).

/// Quotes a single SQL identifier.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quotes a possibly schema-qualified table name the way PostgreSQL would
/// resolve it in a statement: bare parts fold to lower case, parts already
/// wrapped in double quotes keep their case.
pub fn quote_table_name(name: &str) -> String {
    match split_qualified(name) {
        Some((schema, table)) => format!("{}.{}", quote_name_part(schema), quote_name_part(table)),
        None => quote_name_part(name),
    }
}

/// Splits on the first `.` that is not inside double quotes.
fn split_qualified(name: &str) -> Option<(&str, &str)> {
    let mut quoted = false;
    for (i, c) in name.char_indices() {
        match c {
            '"' => quoted = !quoted,
            '.' if !quoted => return Some((&name[..i], &name[i + 1..])),
            _ => {}
        }
    }
    None
}

fn quote_name_part(part: &str) -> String {
    let part = part.trim();
    match part.strip_prefix('"').and_then(|p| p.strip_suffix('"')) {
        Some(inner) if !inner.is_empty() => quote_ident(&inner.replace("\"\"", "\"")),
        _ => quote_ident(&part.to_lowercase()),
    }
}

/// Quotes a string literal.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

pub fn create_role(user: &str, password: &str) -> String {
    format!(
        "CREATE ROLE {} WITH LOGIN PASSWORD {} REPLICATION",
        quote_ident(user),
        quote_literal(password)
    )
}

/// The grants given to the replication role on every run, in order.
pub fn role_grants(schema: &str, user: &str) -> [String; 3] {
    let schema = quote_ident(schema);
    let user = quote_ident(user);
    [
        format!("GRANT USAGE ON SCHEMA {} TO {}", schema, user),
        format!("GRANT SELECT ON ALL TABLES IN SCHEMA {} TO {}", schema, user),
        format!(
            "ALTER DEFAULT PRIVILEGES IN SCHEMA {} GRANT SELECT ON TABLES TO {}",
            schema, user
        ),
    ]
}

pub fn drop_publication(name: &str) -> String {
    format!("DROP PUBLICATION {}", quote_ident(name))
}

/// Builds the `CREATE PUBLICATION` statement. An empty table list publishes
/// all tables; otherwise the quoted table names are de-duplicated and sorted
/// so the statement does not depend on input order or spelling.
pub fn create_publication(name: &str, tables: &[String]) -> String {
    if tables.is_empty() {
        return format!("CREATE PUBLICATION {} FOR ALL TABLES", quote_ident(name));
    }

    let mut tables: Vec<String> = tables.iter().map(|t| quote_table_name(t)).collect();
    tables.sort_unstable();
    tables.dedup();

    let list = tables.join(", ");

    format!("CREATE PUBLICATION {} FOR TABLE {}", quote_ident(name), list)
}

pub fn alter_system(parameter: &str, value: &str) -> String {
    format!("ALTER SYSTEM SET {} = {}", parameter, quote_literal(value))
}

pub fn replica_identity_full(schema: &str, table: &str) -> String {
    format!(
        "ALTER TABLE {}.{} REPLICA IDENTITY FULL",
        quote_ident(schema),
        quote_ident(table)
    )
}

pub fn create_schema(schema: &str) -> String {
    format!("CREATE SCHEMA {}", quote_ident(schema))
}

pub fn create_status_view(schema: &str) -> String {
    format!(
        "CREATE OR REPLACE VIEW {}.status AS
        SELECT
            current_database() AS database_name,
            (SELECT count(*) FROM pg_publication) AS publication_count,
            (SELECT count(*) FROM pg_replication_slots) AS replication_slot_count,
            (SELECT count(*) FROM pg_stat_replication) AS active_replication_count",
        quote_ident(schema)
    )
}
