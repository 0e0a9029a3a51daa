//! CSV dumps of whole tables.
use clap::ValueEnum;
use csv::Writer;
use engine::{Db, FindMany};
use sea_orm::DatabaseConnection;
use serde::Serialize;

use crate::BoxError;

#[derive(Clone, Copy, Debug, ValueEnum)]
#[value(rename_all = "snake_case")]
pub enum Table {
    Users,
    Materials,
    Products,
    Customers,
    Invoices,
    InvoiceItems,
    CashFlows,
    Purchases,
    PurchaseItems,
}

/// Write every row of `table` as CSV to `out`. Returns the number of rows.
pub async fn table<W: std::io::Write>(
    db: Db<'_, DatabaseConnection>,
    table: Table,
    out: W,
) -> Result<usize, BoxError> {
    let mut writer = Writer::from_writer(out);
    let rows = match table {
        Table::Users => write_rows(&mut writer, db.users().find_many(FindMany::new()).await?)?,
        Table::Materials => {
            write_rows(&mut writer, db.materials().find_many(FindMany::new()).await?)?
        }
        Table::Products => write_rows(&mut writer, db.products().find_many(FindMany::new()).await?)?,
        Table::Customers => {
            write_rows(&mut writer, db.customers().find_many(FindMany::new()).await?)?
        }
        Table::Invoices => write_rows(&mut writer, db.invoices().find_many(FindMany::new()).await?)?,
        Table::InvoiceItems => write_rows(
            &mut writer,
            db.invoice_items().find_many(FindMany::new()).await?,
        )?,
        Table::CashFlows => {
            write_rows(&mut writer, db.cash_flows().find_many(FindMany::new()).await?)?
        }
        Table::Purchases => {
            write_rows(&mut writer, db.purchases().find_many(FindMany::new()).await?)?
        }
        Table::PurchaseItems => write_rows(
            &mut writer,
            db.purchase_items().find_many(FindMany::new()).await?,
        )?,
    };
    writer.flush()?;
    Ok(rows)
}

fn write_rows<W, T>(writer: &mut Writer<W>, rows: Vec<T>) -> Result<usize, BoxError>
where
    W: std::io::Write,
    T: Serialize,
{
    let count = rows.len();
    for row in rows {
        writer.serialize(row)?;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::{DatabaseOptions, Engine, customers::CustomerCreate};

    #[tokio::test]
    async fn exports_header_and_rows() {
        let engine = Engine::connect(&DatabaseOptions {
            url: "sqlite::memory:".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
        engine
            .db()
            .customers()
            .create(CustomerCreate {
                name: "Acme, Inc.".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        let mut out = Vec::new();
        let rows = table(engine.db(), Table::Customers, &mut out).await.unwrap();
        assert_eq!(rows, 1);

        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("id,name,"));
        assert!(lines.next().unwrap().contains("\"Acme, Inc.\""));
    }
}
