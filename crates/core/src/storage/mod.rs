pub mod memory;
pub mod postgres;
pub mod realtime;
pub mod repo;

pub use memory::MemoryStore;
pub use postgres::PgRecordStore;
pub use realtime::{ChangeFeed, SubscriptionHandle};
pub use repo::{ChangeEvent, ChangeOp, RecordStore, Table};

use anyhow::Context;

pub async fn migrate(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("sqlx migrations failed")?;
    Ok(())
}
