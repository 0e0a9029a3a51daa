pub use sea_orm_migration::prelude::*;

mod m20250301_000001_catalog;
mod m20250301_000002_sales;
mod m20250301_000003_purchasing;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_catalog::Migration),
            Box::new(m20250301_000002_sales::Migration),
            Box::new(m20250301_000003_purchasing::Migration),
        ]
    }
}
