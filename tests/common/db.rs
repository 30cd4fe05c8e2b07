//! Managing test databases.

use diesel::{
    Connection as _,
    RunQueryDsl,
    backend::Backend,
    connection::SimpleConnection,
    pg::PgConnection,
    query_builder::*,
    result::QueryResult,
};
use diesel_migrations::{find_migrations_directory, run_pending_migrations_in_directory};
use failure::Error;
use std::sync::Mutex;

pub struct Database {
    conn: Mutex<PgConnection>,
}

impl Database {
    /// Obtain exclusive access to an empty test database.
    pub fn lock<F, R>(&self, f: F) -> Result<R, Error>
    where
        F: FnOnce(&PgConnection) -> Result<R, Error>,
    {
        let conn = match self.conn.lock() {
            Ok(guard) => guard,
            Err(poison) => poison.into_inner(),
        };

        conn.batch_execute(CLEAR_DATABASE)?;

        f(&conn)
    }
}

/// Set up a new database for testing.
///
/// Unless `TEST_DONT_CREATE_DATABASE` is set the database is re-created and
/// all migrations are applied to it. Create a single database per test suite:
///
/// ```ignore
/// lazy_static! {
///     static ref DATABASE: Database = setup_db()
///         .expect("Cannot create test database");
/// }
/// ```
pub fn setup_db() -> Result<Database, Error> {
    let url = database_url();
    let create = std::env::var_os("TEST_DONT_CREATE_DATABASE").is_none();

    if create {
        eprintln!("Re-creating database. Set TEST_DONT_CREATE_DATABASE to skip");
        let (database, default_url) = change_database_of_url(&url)?;
        let conn = PgConnection::establish(&default_url)?;
        drop_database(&database).execute(&conn)?;
        create_database(&database).execute(&conn)?;
    }

    let conn = PgConnection::establish(&url)?;

    if create {
        let migrations_dir = find_migrations_directory()?;
        run_pending_migrations_in_directory(
            &conn, &migrations_dir, &mut std::io::stderr())?;
    }

    Ok(Database {
        conn: Mutex::new(conn),
    })
}

/// Find database URL for testing.
fn database_url() -> String {
    if let Ok(url) = std::env::var("TEST_DATABASE_URL") {
        return url;
    }

    let mut url = "postgres://".to_string();

    if let Ok(user) = std::env::var("DATABASE_USER") {
        url.push_str(&user);
    }

    url.push('/');
    match std::env::var("DATABASE_NAME") {
        Ok(name) => url.push_str(&name),
        Err(_) => url.push_str("folio-test"),
    }

    url
}

/// Change connection URL to point to the default database. Return name of the
/// original database and the new URL.
fn change_database_of_url(url: &str) -> Result<(String, String), Error> {
    let base = url::Url::parse(url)?;
    let database = base.path_segments()
        .and_then(|mut segments| segments.next_back())
        .map(str::to_owned)
        .ok_or_else(|| failure::err_msg("database URL has no database name"))?;
    let mut new_url = base.join("postgres")?;
    new_url.set_query(base.query());
    Ok((database, new_url.into_string()))
}

const CLEAR_DATABASE: &str = r#"
do $$
declare
    stmt text;
begin
    select 'TRUNCATE '
        || string_agg(format('%I.%I', schemaname, tablename), ', ')
        || ' RESTART IDENTITY CASCADE'
    into stmt
    from pg_tables
    where schemaname = 'public'
      and tablename not like '__diesel_%';

    execute stmt;
end; $$
"#;

// -----------------------------------------------------------------------------
// Based on Diesel's `diesel_cli/src/query_helper.rs`.

#[derive(Debug, Clone)]
pub struct DropDatabaseStatement<'a> {
    name: &'a str,
}

impl<'a, DB: Backend> QueryFragment<DB> for DropDatabaseStatement<'a> {
    fn walk_ast(&self, mut out: AstPass<DB>) -> QueryResult<()> {
        out.push_sql("DROP DATABASE IF EXISTS ");
        out.push_identifier(self.name)?;
        Ok(())
    }
}

impl<'a, Conn> RunQueryDsl<Conn> for DropDatabaseStatement<'a> {}

impl<'a> QueryId for DropDatabaseStatement<'a> {
    type QueryId = ();

    const HAS_STATIC_QUERY_ID: bool = false;
}

#[derive(Debug, Clone)]
pub struct CreateDatabaseStatement<'a> {
    name: &'a str,
}

impl<'a, DB: Backend> QueryFragment<DB> for CreateDatabaseStatement<'a> {
    fn walk_ast(&self, mut out: AstPass<DB>) -> QueryResult<()> {
        out.push_sql("CREATE DATABASE ");
        out.push_identifier(self.name)?;
        Ok(())
    }
}

impl<'a, Conn> RunQueryDsl<Conn> for CreateDatabaseStatement<'a> {}

impl<'a> QueryId for CreateDatabaseStatement<'a> {
    type QueryId = ();

    const HAS_STATIC_QUERY_ID: bool = false;
}

pub fn drop_database(name: &str) -> DropDatabaseStatement {
    DropDatabaseStatement { name }
}

pub fn create_database(name: &str) -> CreateDatabaseStatement {
    CreateDatabaseStatement { name }
}
