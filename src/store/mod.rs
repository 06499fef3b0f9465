use diesel::{
    upsert::excluded, Connection, ConnectionError, ExpressionMethods, QueryDsl, RunQueryDsl,
    SelectableHelper, SqliteConnection,
};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use thiserror::Error;
use tracing::{debug, trace};

use self::model::{BroadcasterRecord, ChangedAt};

pub mod model;
mod schema;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Could not connect to database: {0}")]
    ConnectionError(ConnectionError),
    #[error("SQL execute error: {0} at {1}")]
    SqlError(diesel::result::Error, String),
    #[error("Could not initialize database: {0}")]
    DbInit(Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    fn from_diesel_error(err: diesel::result::Error, context: String) -> StoreError {
        StoreError::SqlError(err, context)
    }
}

/// Last known game per broadcaster, persisted in SQLite.
///
/// Every operation opens its own connection and drops it before returning,
/// so nothing is held between broadcasters. Two processes polling the same
/// database race with last-writer-wins; callers are expected to run one
/// instance at a time.
#[derive(Debug, Clone)]
pub struct GameStore {
    url: String,
}

impl GameStore {
    pub fn new(url: impl Into<String>) -> GameStore {
        GameStore { url: url.into() }
    }

    fn connect(&self) -> Result<SqliteConnection, StoreError> {
        Ok(SqliteConnection::establish(&self.url)?)
    }

    /// Creates the `games` table when missing. Safe to call on every run.
    pub fn ensure_initialized(&self) -> Result<(), StoreError> {
        let mut conn = self.connect()?;
        debug!("Initializing database {}", self.url);
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(StoreError::DbInit)?;
        trace!("Applied {} migrations", applied.len());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Option<BroadcasterRecord>, StoreError> {
        use schema::games::dsl::*;
        trace!("Get record for {name}");
        let res = games
            .find(name)
            .select(BroadcasterRecord::as_select())
            .first(&mut self.connect()?);
        match res {
            Ok(record) => Ok(Some(record)),
            Err(err) => match err {
                diesel::result::Error::NotFound => Ok(None),
                err => Err(StoreError::from_diesel_error(
                    err,
                    format!("Get record for {name}"),
                )),
            },
        }
    }

    /// Inserts a record, or replaces `game` and `last_changed` of the existing one.
    pub fn upsert(
        &self,
        name: &str,
        new_game: Option<&str>,
        changed_at: ChangedAt,
    ) -> Result<(), StoreError> {
        use schema::games::dsl::*;
        let record = BroadcasterRecord {
            streamer: name.to_owned(),
            game: new_game.map(ToOwned::to_owned),
            last_changed: Some(changed_at),
        };
        diesel::insert_into(games)
            .values(&record)
            .on_conflict(streamer)
            .do_update()
            .set((
                game.eq(excluded(game)),
                last_changed.eq(excluded(last_changed)),
            ))
            .execute(&mut self.connect()?)
            .map_err(|err| {
                StoreError::from_diesel_error(err, format!("Upsert {name} {new_game:?}"))
            })?;
        Ok(())
    }

    pub fn records(&self) -> Result<Vec<BroadcasterRecord>, StoreError> {
        use schema::games::dsl::*;
        games
            .order(streamer.asc())
            .select(BroadcasterRecord::as_select())
            .load(&mut self.connect()?)
            .map_err(|err| StoreError::from_diesel_error(err, "List records".to_owned()))
    }
}

impl From<ConnectionError> for StoreError {
    fn from(value: ConnectionError) -> Self {
        StoreError::ConnectionError(value)
    }
}
