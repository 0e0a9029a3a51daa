use std::time::Duration;

use sea_orm::{Database, DatabaseConnection};
use uuid::Uuid;

use engine::{
    DatabaseOptions, Engine, EngineError, FindMany, IntUpdate, IsolationLevel, StringFilter,
    TransactionOptions,
    customers::{CustomerCreate, CustomerWhere},
    invoice_items::InvoiceItemCreate,
    invoices::{InvoiceCreate, InvoiceKey, InvoiceUpdate},
    products::{ProductCreate, ProductKey, ProductUpdate},
};
use migration::MigratorTrait;

async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    (engine, db)
}

fn test_db_path() -> std::path::PathBuf {
    let root = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../target/test_dbs");
    std::fs::create_dir_all(&root).unwrap();
    root.join(format!("engine_{}.db", Uuid::new_v4()))
}

async fn customer_count(engine: &Engine) -> u64 {
    engine
        .db()
        .customers()
        .count(&CustomerWhere::default())
        .await
        .unwrap()
}

#[tokio::test]
async fn transaction_commits_all_writes() {
    let (engine, _db) = engine_with_db().await;

    let invoice_id = engine
        .transaction(TransactionOptions::default(), |db| {
            Box::pin(async move {
                let customer = db.customers().create(CustomerCreate::named("Acme")).await?;
                let product = db
                    .products()
                    .create(ProductCreate {
                        name: "Widget".to_string(),
                        sku: Some("W-1".to_string()),
                        price_cents: 250,
                        quantity: 10,
                        unit: "pcs".to_string(),
                        ..Default::default()
                    })
                    .await?;
                let invoice = db
                    .invoices()
                    .create(InvoiceCreate {
                        code: Some("INV-1".to_string()),
                        ..InvoiceCreate::for_customer(customer.id)
                    })
                    .await?;
                let item = db
                    .invoice_items()
                    .create(InvoiceItemCreate::priced(invoice.id.clone(), &product, 4)?)
                    .await?;
                db.products()
                    .update(
                        &ProductKey::Id(product.id),
                        &ProductUpdate {
                            quantity: Some(IntUpdate::Decrement(item.quantity)),
                            ..Default::default()
                        },
                    )
                    .await?;
                db.invoices()
                    .update(
                        &InvoiceKey::Id(invoice.id.clone()),
                        &InvoiceUpdate {
                            subtotal_cents: Some(IntUpdate::Set(item.line_total_cents)),
                            total_cents: Some(IntUpdate::Set(item.line_total_cents)),
                            ..Default::default()
                        },
                    )
                    .await?;
                Ok::<_, EngineError>(invoice.id)
            })
        })
        .await
        .unwrap();

    let invoice = engine
        .db()
        .invoices()
        .find_unique_or_throw(&InvoiceKey::Code("INV-1".to_string()))
        .await
        .unwrap();
    assert_eq!(invoice.id, invoice_id);
    assert_eq!(invoice.total_cents, 1000);

    let widget = engine
        .db()
        .products()
        .find_unique_or_throw(&ProductKey::Sku("W-1".to_string()))
        .await
        .unwrap();
    assert_eq!(widget.quantity, 6);
}

#[tokio::test]
async fn failing_unit_of_work_rolls_back() {
    let (engine, _db) = engine_with_db().await;

    let err = engine
        .transaction(TransactionOptions::default(), |db| {
            Box::pin(async move {
                let customer = db.customers().create(CustomerCreate::named("Acme")).await?;
                db.invoices()
                    .create(InvoiceCreate::for_customer(customer.id))
                    .await?;
                // unknown customer, fails on the foreign key
                db.invoices()
                    .create(InvoiceCreate::for_customer("missing"))
                    .await?;
                Ok::<_, EngineError>(())
            })
        })
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::ForeignKeyViolation(_)), "{err:?}");
    assert_eq!(customer_count(&engine).await, 0);
}

#[tokio::test]
async fn caller_error_rolls_back() {
    let (engine, _db) = engine_with_db().await;

    let err = engine
        .transaction(TransactionOptions::default(), |db| {
            Box::pin(async move {
                db.customers().create(CustomerCreate::named("Acme")).await?;
                Err::<(), _>(EngineError::Validation("changed my mind".to_string()))
            })
        })
        .await
        .unwrap_err();

    assert_eq!(
        err,
        EngineError::Validation("changed my mind".to_string())
    );
    assert_eq!(customer_count(&engine).await, 0);
}

#[tokio::test]
async fn slow_unit_of_work_times_out_and_rolls_back() {
    let (engine, _db) = engine_with_db().await;
    let limit = Duration::from_millis(50);

    let err = engine
        .transaction(TransactionOptions::default().timeout(limit), |db| {
            Box::pin(async move {
                db.customers().create(CustomerCreate::named("Slow")).await?;
                tokio::time::sleep(Duration::from_millis(500)).await;
                Ok::<_, EngineError>(())
            })
        })
        .await
        .unwrap_err();

    assert_eq!(err, EngineError::TransactionTimeout(limit));
    assert_eq!(customer_count(&engine).await, 0);
}

#[tokio::test]
async fn isolation_level_is_accepted() {
    let (engine, _db) = engine_with_db().await;

    let name = engine
        .transaction(
            TransactionOptions::default()
                .isolation(IsolationLevel::Serializable)
                .timeout(Duration::from_secs(5)),
            |db| {
                Box::pin(async move {
                    let customer = db.customers().create(CustomerCreate::named("Acme")).await?;
                    Ok::<_, EngineError>(customer.name)
                })
            },
        )
        .await
        .unwrap();

    assert_eq!(name, "Acme");
    assert_eq!(customer_count(&engine).await, 1);
}

#[tokio::test]
async fn failed_nested_write_keeps_outer_work() {
    let (engine, _db) = engine_with_db().await;

    engine
        .transaction(TransactionOptions::default(), |db| {
            Box::pin(async move {
                db.customers().create(CustomerCreate::named("Kept")).await?;
                // update runs in a savepoint; its failure does not poison the outer transaction
                let missing = db
                    .products()
                    .update(
                        &ProductKey::Sku("nope".to_string()),
                        &ProductUpdate {
                            quantity: Some(IntUpdate::Increment(1)),
                            ..Default::default()
                        },
                    )
                    .await;
                assert!(matches!(missing, Err(EngineError::NotFound(_))));
                Ok::<_, EngineError>(())
            })
        })
        .await
        .unwrap();

    assert_eq!(customer_count(&engine).await, 1);
}

#[tokio::test]
async fn connect_migrates_and_persists_to_file() {
    let path = test_db_path();
    let options = DatabaseOptions {
        url: format!("sqlite:{}?mode=rwc", path.display()),
        ..Default::default()
    };

    let engine = Engine::connect(&options).await.unwrap();
    engine
        .db()
        .customers()
        .create(CustomerCreate::named("Persisted"))
        .await
        .unwrap();
    engine.close().await.unwrap();

    let engine = Engine::connect(&options).await.unwrap();
    let found = engine
        .db()
        .customers()
        .find_first_or_throw(FindMany::new().filter(CustomerWhere {
            name: Some(StringFilter::equals("Persisted")),
            ..Default::default()
        }))
        .await
        .unwrap();
    assert_eq!(found.name, "Persisted");
    engine.close().await.unwrap();

    let _ = std::fs::remove_file(path);
}
