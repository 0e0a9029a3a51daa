use sea_orm::{Database, DatabaseConnection};
use serde_json::json;

use engine::{
    AggregateFn, AggregateSpec, Engine, EngineError, FindMany, GroupBy, Having, IntFilter,
    ManyFilter, Projection, RelationFilter, ScalarFilter, SortOrder, StringFilter,
    customers::{self, CustomerCreate, CustomerInclude, CustomerWhere},
    invoice_items::{InvoiceItemCreate, InvoiceItemWhere},
    invoices::{self, InvoiceCreate, InvoiceWhere},
    products::{self, ProductCreate, ProductKey, ProductWhere},
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

async fn seed_products(engine: &Engine, rows: &[(&str, &str, i64)]) {
    let data = rows
        .iter()
        .map(|(id, name, price)| ProductCreate {
            id: Some(id.to_string()),
            name: name.to_string(),
            sku: Some(format!("SKU-{id}")),
            price_cents: *price,
            unit: "pcs".to_string(),
            ..Default::default()
        })
        .collect();
    engine.db().products().create_many(data).await.unwrap();
}

fn ids(rows: &[products::Model]) -> Vec<&str> {
    rows.iter().map(|p| p.id.as_str()).collect()
}

/// Acme with a paid 1000 and a paid 2000 invoice, Bistro with a draft 3000
/// invoice, and Corner without invoices.
async fn seed_sales(engine: &Engine) -> Vec<customers::Model> {
    let db = engine.db();
    let mut customers = Vec::new();
    for name in ["Acme Corp", "Bistro", "Corner Shop"] {
        customers.push(db.customers().create(CustomerCreate::named(name)).await.unwrap());
    }
    let widget = db
        .products()
        .create(ProductCreate {
            name: "Widget".to_string(),
            price_cents: 500,
            unit: "pcs".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    for (customer, status, total) in [
        (&customers[0], "paid", 1000),
        (&customers[0], "paid", 2000),
        (&customers[1], "draft", 3000),
    ] {
        let invoice = db
            .invoices()
            .create(InvoiceCreate {
                status: Some(status.to_string()),
                subtotal_cents: total,
                total_cents: total,
                ..InvoiceCreate::for_customer(customer.id.clone())
            })
            .await
            .unwrap();
        db.invoice_items()
            .create(InvoiceItemCreate::priced(invoice.id, &widget, total / 500).unwrap())
            .await
            .unwrap();
    }
    customers
}

#[tokio::test]
async fn string_filters_match_case_and_escape_wildcards() {
    let (engine, _db) = engine_with_db().await;
    seed_products(
        &engine,
        &[
            ("a", "50% Off Mug", 100),
            ("b", "500 Off Mug", 100),
            ("c", "Tea_Pot", 100),
            ("d", "TeaXPot", 100),
        ],
    )
    .await;
    let products = engine.db().products();

    let percent = products
        .find_many(FindMany::new().filter(ProductWhere {
            name: Some(StringFilter::contains("50%")),
            ..Default::default()
        }))
        .await
        .unwrap();
    assert_eq!(ids(&percent), ["a"]);

    let underscore = products
        .find_many(FindMany::new().filter(ProductWhere {
            name: Some(StringFilter::starts_with("tea_").insensitive()),
            ..Default::default()
        }))
        .await
        .unwrap();
    assert_eq!(ids(&underscore), ["c"]);

    let exact_case = products
        .count(&ProductWhere {
            name: Some(StringFilter::equals("teaxpot")),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(exact_case, 0);
    let any_case = products
        .count(&ProductWhere {
            name: Some(StringFilter::equals("teaxpot").insensitive()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(any_case, 1);
}

#[tokio::test]
async fn insensitive_filters_fold_non_ascii_letters() {
    let (engine, _db) = engine_with_db().await;
    let customers = engine.db().customers();
    for name in ["Đức", "Émile", "Zoë"] {
        customers.create(CustomerCreate::named(name)).await.unwrap();
    }
    let count = |name: StringFilter| {
        let customers = engine.db().customers();
        async move {
            customers
                .count(&CustomerWhere {
                    name: Some(name),
                    ..Default::default()
                })
                .await
                .unwrap()
        }
    };

    assert_eq!(count(StringFilter::equals("đức")).await, 0);
    assert_eq!(count(StringFilter::equals("đức").insensitive()).await, 1);
    assert_eq!(count(StringFilter::contains("ÉMI").insensitive()).await, 1);
    assert_eq!(count(StringFilter::ends_with("OË").insensitive()).await, 1);
    assert_eq!(
        count(StringFilter::in_list(["ĐỨC", "ÉMILE"]).insensitive()).await,
        2
    );
}

#[tokio::test]
async fn scalar_and_logical_filters_combine() {
    let (engine, _db) = engine_with_db().await;
    seed_products(
        &engine,
        &[("a", "A", 100), ("b", "B", 200), ("c", "C", 300), ("d", "D", 400)],
    )
    .await;

    let rows = engine
        .db()
        .products()
        .find_many(
            FindMany::new()
                .filter(ProductWhere {
                    or: vec![
                        ProductWhere {
                            price_cents: Some(IntFilter::lte(100)),
                            ..Default::default()
                        },
                        ProductWhere {
                            price_cents: Some(IntFilter::gte(300)),
                            ..Default::default()
                        },
                    ],
                    not: vec![ProductWhere {
                        id: Some(StringFilter::in_list(["d"])),
                        ..Default::default()
                    }],
                    ..Default::default()
                })
                .order_by(products::Column::PriceCents, SortOrder::Asc),
        )
        .await
        .unwrap();
    assert_eq!(ids(&rows), ["a", "c"]);

    let nothing_described = engine
        .db()
        .products()
        .count(&ProductWhere {
            description: Some(StringFilter::null()),
            price_cents: Some(ScalarFilter::not_in([100, 200])),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(nothing_described, 2);
}

#[tokio::test]
async fn offset_pagination_is_stable() {
    let (engine, _db) = engine_with_db().await;
    seed_products(
        &engine,
        &[("a", "A", 100), ("b", "B", 100), ("c", "C", 200), ("d", "D", 300)],
    )
    .await;
    let page = |skip: u64| {
        FindMany::<products::Entity>::new()
            .order_by(products::Column::PriceCents, SortOrder::Asc)
            .skip(skip)
            .take(2)
    };

    let first = engine.db().products().find_many(page(0)).await.unwrap();
    let second = engine.db().products().find_many(page(2)).await.unwrap();
    assert_eq!(ids(&first), ["a", "b"]);
    assert_eq!(ids(&second), ["c", "d"]);

    let skip_only = engine
        .db()
        .products()
        .find_many(
            FindMany::new()
                .order_by(products::Column::PriceCents, SortOrder::Desc)
                .skip(3),
        )
        .await
        .unwrap();
    assert_eq!(ids(&skip_only), ["b"]);
}

#[tokio::test]
async fn cursor_pages_forwards_and_backwards() {
    let (engine, _db) = engine_with_db().await;
    seed_products(
        &engine,
        &[
            ("p1", "One", 100),
            ("p2", "Two", 200),
            ("p3", "Three", 300),
            ("p4", "Four", 400),
            ("p5", "Five", 500),
        ],
    )
    .await;
    let by_price = || FindMany::<products::Entity>::new().order_by(products::Column::PriceCents, SortOrder::Asc);
    let products = engine.db().products();

    let first = products.find_many(by_price().take(2)).await.unwrap();
    assert_eq!(ids(&first), ["p1", "p2"]);

    let next = products
        .find_many(
            by_price()
                .cursor(ProductKey::Id("p2".to_string()))
                .skip(1)
                .take(2),
        )
        .await
        .unwrap();
    assert_eq!(ids(&next), ["p3", "p4"]);

    let inclusive = products
        .find_many(by_price().cursor(ProductKey::Sku("SKU-p4".to_string())).take(5))
        .await
        .unwrap();
    assert_eq!(ids(&inclusive), ["p4", "p5"]);

    let previous = products
        .find_many(
            by_price()
                .cursor(ProductKey::Id("p4".to_string()))
                .skip(1)
                .take(-2),
        )
        .await
        .unwrap();
    assert_eq!(ids(&previous), ["p2", "p3"]);

    let last_two = products.find_many(by_price().take(-2)).await.unwrap();
    assert_eq!(ids(&last_two), ["p4", "p5"]);

    let gone = products
        .find_many(by_price().cursor(ProductKey::Id("p9".to_string())).take(2))
        .await
        .unwrap();
    assert!(gone.is_empty());
}

#[tokio::test]
async fn cursor_walks_ties_by_id() {
    let (engine, _db) = engine_with_db().await;
    seed_products(
        &engine,
        &[("a", "A", 100), ("b", "B", 100), ("c", "C", 100), ("d", "D", 50)],
    )
    .await;

    let mut seen = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let mut args = FindMany::<products::Entity>::new()
            .order_by(products::Column::PriceCents, SortOrder::Desc)
            .take(1);
        if let Some(id) = cursor.take() {
            args = args.cursor(ProductKey::Id(id)).skip(1);
        }
        let page = engine.db().products().find_many(args).await.unwrap();
        let Some(row) = page.into_iter().next() else {
            break;
        };
        seen.push(row.id.clone());
        cursor = Some(row.id);
    }
    assert_eq!(seen, ["a", "b", "c", "d"]);
}

#[tokio::test]
async fn find_first_honours_order() {
    let (engine, _db) = engine_with_db().await;
    seed_products(&engine, &[("a", "A", 300), ("b", "B", 100), ("c", "C", 200)]).await;

    let cheapest = engine
        .db()
        .products()
        .find_first(FindMany::new().order_by(products::Column::PriceCents, SortOrder::Asc))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cheapest.id, "b");

    let err = engine
        .db()
        .products()
        .find_first_or_throw(FindMany::new().filter(ProductWhere {
            price_cents: Some(IntFilter::gt(1000)),
            ..Default::default()
        }))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn relation_filters_follow_foreign_keys() {
    let (engine, _db) = engine_with_db().await;
    seed_sales(&engine).await;
    let db = engine.db();

    let acme_invoices = db
        .invoices()
        .count(&InvoiceWhere {
            customer: Some(RelationFilter::is(CustomerWhere {
                name: Some(StringFilter::contains("acme").insensitive()),
                ..Default::default()
            })),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(acme_invoices, 2);

    let names = |rows: Vec<customers::Model>| rows.into_iter().map(|c| c.name).collect::<Vec<_>>();
    let by_name = |filter: CustomerWhere| {
        FindMany::<customers::Entity>::new()
            .filter(filter)
            .order_by(customers::Column::Name, SortOrder::Asc)
    };

    let big_spenders = db
        .customers()
        .find_many(by_name(CustomerWhere {
            invoices: Some(ManyFilter::some(InvoiceWhere {
                total_cents: Some(IntFilter::gte(2000)),
                ..Default::default()
            })),
            ..Default::default()
        }))
        .await
        .unwrap();
    assert_eq!(names(big_spenders), ["Acme Corp", "Bistro"]);

    let all_paid = db
        .customers()
        .find_many(by_name(CustomerWhere {
            invoices: Some(ManyFilter::every(InvoiceWhere {
                status: Some(StringFilter::equals("paid")),
                ..Default::default()
            })),
            ..Default::default()
        }))
        .await
        .unwrap();
    assert_eq!(names(all_paid), ["Acme Corp", "Corner Shop"]);

    let no_drafts = db
        .customers()
        .find_many(by_name(CustomerWhere {
            invoices: Some(ManyFilter::none(InvoiceWhere {
                status: Some(StringFilter::equals("draft")),
                ..Default::default()
            })),
            ..Default::default()
        }))
        .await
        .unwrap();
    assert_eq!(names(no_drafts), ["Acme Corp", "Corner Shop"]);

    let bulk_lines = db
        .invoices()
        .count(&InvoiceWhere {
            items: Some(ManyFilter::some(InvoiceItemWhere {
                quantity: Some(IntFilter::gte(4)),
                ..Default::default()
            })),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(bulk_lines, 2);
}

#[tokio::test]
async fn include_loads_children_per_parent() {
    let (engine, _db) = engine_with_db().await;
    seed_sales(&engine).await;

    let rows = engine
        .db()
        .customers()
        .find_many_with(
            FindMany::new().order_by(customers::Column::Name, SortOrder::Asc),
            &CustomerInclude { invoices: true },
        )
        .await
        .unwrap();
    let counts: Vec<usize> = rows
        .iter()
        .map(|row| row.invoices.as_ref().map_or(0, Vec::len))
        .collect();
    assert_eq!(counts, [2, 1, 0]);
    assert!(rows[2].invoices.as_ref().is_some_and(Vec::is_empty));

    let without = engine
        .db()
        .customers()
        .find_many_with(FindMany::new(), &CustomerInclude::default())
        .await
        .unwrap();
    assert!(without.iter().all(|row| row.invoices.is_none()));
}

#[tokio::test]
async fn projection_returns_only_requested_columns() {
    let (engine, _db) = engine_with_db().await;
    seed_products(&engine, &[("a", "Mug", 800)]).await;

    let rows = engine
        .db()
        .products()
        .find_many_projected(
            FindMany::new(),
            &Projection::select([products::Column::Id, products::Column::PriceCents]),
        )
        .await
        .unwrap();
    assert_eq!(rows, [json!({ "id": "a", "price_cents": 800 })]);

    let omitted = engine
        .db()
        .products()
        .find_many_projected(
            FindMany::new(),
            &Projection::omit([products::Column::Description]),
        )
        .await
        .unwrap();
    let row = omitted[0].as_object().unwrap();
    assert!(row.contains_key("name"));
    assert!(!row.contains_key("description"));

    let err = engine
        .db()
        .products()
        .find_many_projected(
            FindMany::new(),
            &Projection {
                select: Some(vec![products::Column::Id]),
                omit: Some(vec![products::Column::Name]),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[tokio::test]
async fn aggregate_computes_in_sql() {
    let (engine, _db) = engine_with_db().await;
    seed_sales(&engine).await;
    let spec = AggregateSpec::new()
        .count()
        .sum(invoices::Column::TotalCents)
        .avg(invoices::Column::TotalCents)
        .min(invoices::Column::TotalCents)
        .max(invoices::Column::TotalCents);

    let all = engine
        .db()
        .invoices()
        .aggregate(&InvoiceWhere::default(), &spec)
        .await
        .unwrap();
    assert_eq!(all.count, Some(3));
    assert_eq!(all.sum_of(invoices::Column::TotalCents), Some(6000));
    assert_eq!(all.avg_of(invoices::Column::TotalCents), Some(2000.0));
    assert_eq!(all.min_of(invoices::Column::TotalCents), Some(1000));
    assert_eq!(all.max_of(invoices::Column::TotalCents), Some(3000));

    let none = engine
        .db()
        .invoices()
        .aggregate(
            &InvoiceWhere {
                status: Some(StringFilter::equals("void")),
                ..Default::default()
            },
            &spec,
        )
        .await
        .unwrap();
    assert_eq!(none.count, Some(0));
    assert_eq!(none.sum_of(invoices::Column::TotalCents), None);
    assert_eq!(none.avg_of(invoices::Column::TotalCents), None);

    let err = engine
        .db()
        .invoices()
        .aggregate(&InvoiceWhere::default(), &AggregateSpec::new())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let err = engine
        .db()
        .invoices()
        .aggregate(
            &InvoiceWhere::default(),
            &AggregateSpec::new().avg(invoices::Column::Status),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[tokio::test]
async fn group_by_with_having_and_order() {
    let (engine, _db) = engine_with_db().await;
    seed_sales(&engine).await;
    let totals = AggregateSpec::new()
        .count()
        .sum(invoices::Column::TotalCents);

    let groups = engine
        .db()
        .invoices()
        .group_by(
            &GroupBy::new([invoices::Column::Status])
                .aggregates(totals.clone())
                .order_by(invoices::Column::Status, SortOrder::Asc),
        )
        .await
        .unwrap();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].key(invoices::Column::Status), &json!("draft"));
    assert_eq!(groups[0].aggregates.count, Some(1));
    assert_eq!(groups[1].key(invoices::Column::Status), &json!("paid"));
    assert_eq!(groups[1].aggregates.count, Some(2));
    assert_eq!(
        groups[1].aggregates.sum_of(invoices::Column::TotalCents),
        Some(3000)
    );

    let busy = engine
        .db()
        .invoices()
        .group_by(
            &GroupBy::new([invoices::Column::Status])
                .aggregates(totals.clone())
                .having(Having::Count(ScalarFilter::gte(2))),
        )
        .await
        .unwrap();
    assert_eq!(busy.len(), 1);
    assert_eq!(busy[0].key(invoices::Column::Status), &json!("paid"));

    let large = engine
        .db()
        .invoices()
        .group_by(
            &GroupBy::new([invoices::Column::Status])
                .aggregates(totals)
                .having(Having::Aggregate(
                    AggregateFn::Max,
                    invoices::Column::TotalCents,
                    ScalarFilter::gt(2500),
                )),
        )
        .await
        .unwrap();
    assert_eq!(large.len(), 1);
    assert_eq!(large[0].key(invoices::Column::Status), &json!("draft"));

    let err = engine
        .db()
        .invoices()
        .group_by(
            &GroupBy::new([invoices::Column::Status])
                .order_by(invoices::Column::TotalCents, SortOrder::Asc),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}
