pub mod channel;
pub mod message;
pub mod recommendation;

pub use channel::{Channel, ChannelSighting, ExclusionFlag, SeedChannel};
pub use message::{MediaType, MessageSighting, PendingMessage, ScoredMessage};

use sqlx::{Connection, PgConnection};

/// Embedded schema migrations, applied by every binary at startup.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Open a single connection to the shared store.
///
/// Workers open a fresh connection per iteration instead of holding a pool,
/// so a wedged iteration never poisons the next one.
pub async fn connect(database_url: &str) -> Result<PgConnection, sqlx::Error> {
    PgConnection::connect(database_url).await
}

/// Apply pending migrations. Idempotent; the migrator serializes concurrent
/// runs from different binaries with an advisory lock.
pub async fn migrate(conn: &mut PgConnection) -> Result<(), sqlx::migrate::MigrateError> {
    MIGRATOR.run(conn).await
}
