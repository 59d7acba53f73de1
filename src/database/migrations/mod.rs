pub use sea_orm_migration::prelude::*;

use clap::Subcommand;
use tracing::info;

use super::connection::{establish_connection, get_database_url};

mod m001_create_graph_tables;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m001_create_graph_tables::Migration)]
    }
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrateDirection {
    Up,
    Down,
}

pub async fn migrate_database(database_path: &str, direction: MigrateDirection) -> anyhow::Result<()> {
    let database_url = get_database_url(Some(database_path));
    let db = establish_connection(&database_url).await?;

    match direction {
        MigrateDirection::Up => {
            info!("Running migrations up");
            Migrator::up(&db, None).await?;
        }
        MigrateDirection::Down => {
            info!("Running migrations down");
            Migrator::down(&db, None).await?;
        }
    }

    info!("Database migration completed");
    Ok(())
}
