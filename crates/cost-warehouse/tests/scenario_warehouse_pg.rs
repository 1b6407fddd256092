use chrono::NaiveDate;
use cost_warehouse::{CostRecord, CurrencyRate, DeletePredicate, PgWarehouse, TableSchema, Warehouse};
use uuid::Uuid;

fn record(invoice_id: &str, status: &str) -> CostRecord {
    CostRecord {
        invoice_id: invoice_id.to_string(),
        billing_group_id: "bg-1".to_string(),
        project_name: "team-a".to_string(),
        environment: "prod".to_string(),
        team: "team-a-owners".to_string(),
        service: "pg".to_string(),
        service_name: "pg-main".to_string(),
        tenant: "nav".to_string(),
        status: status.to_string(),
        cost: "12.50".to_string(),
        currency: "EUR".to_string(),
        billing_month: "2024-03".to_string(),
        day_count: 31,
    }
}

async fn drop_table(wh: &PgWarehouse, table: &str) -> anyhow::Result<()> {
    sqlx::query(&format!("drop table if exists {table}"))
        .execute(wh.pool())
        .await?;
    Ok(())
}

/// Ledger read, bulk insert and status pruning against a real Postgres.
///
/// DB-backed test. Skips if COST_DATABASE_URL is not set.
#[tokio::test]
async fn cost_items_ledger_roundtrip_and_prune() -> anyhow::Result<()> {
    let url = match std::env::var(cost_warehouse::ENV_DB_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: COST_DATABASE_URL not set");
            return Ok(());
        }
    };
    let wh = PgWarehouse::connect(&url).await?;

    // Unique table per run so leftovers in a developer DB never collide.
    let table = format!("cost_t_{}", Uuid::new_v4().simple());
    wh.create_table_if_not_exists(TableSchema::CostItems, &table).await?;
    // Second create is a no-op.
    wh.create_table_if_not_exists(TableSchema::CostItems, &table).await?;

    assert!(wh.query_distinct_invoice_statuses(&table).await?.is_empty());

    wh.bulk_insert_cost_records(
        &table,
        &[record("INV-1", "mailed"), record("INV-1", "paid"), record("INV-2", "estimate")],
    )
    .await?;
    wh.bulk_insert_cost_records(&table, &[]).await?;

    let ledger = wh.query_distinct_invoice_statuses(&table).await?;
    assert_eq!(ledger.len(), 2);
    assert_eq!(ledger.get("INV-1").map(String::as_str), Some("paid"));
    assert_eq!(ledger.get("INV-2").map(String::as_str), Some("estimate"));

    let deleted = wh
        .delete_where(
            &table,
            &DeletePredicate::StatusIn(vec!["estimate".into(), "mailed".into()]),
        )
        .await?;
    assert_eq!(deleted, 2);

    let ledger = wh.query_distinct_invoice_statuses(&table).await?;
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger.get("INV-1").map(String::as_str), Some("paid"));

    drop_table(&wh, &table).await
}

/// DB-backed test. Skips if COST_DATABASE_URL is not set.
#[tokio::test]
async fn currency_rates_newest_date_and_refetch_delete() -> anyhow::Result<()> {
    let url = match std::env::var(cost_warehouse::ENV_DB_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: COST_DATABASE_URL not set");
            return Ok(());
        }
    };
    let wh = PgWarehouse::connect(&url).await?;

    let table = format!("rates_t_{}", Uuid::new_v4().simple());
    wh.create_table_if_not_exists(TableSchema::CurrencyRates, &table).await?;
    assert_eq!(wh.newest_currency_date(&table).await?, None);

    let d = |day| NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
    let rates: Vec<CurrencyRate> = (1..=3)
        .map(|day| CurrencyRate {
            date: d(day),
            usdeur: "0.912345".into(),
            usdnok: "10.512345".into(),
        })
        .collect();
    wh.insert_currency_rates(&table, &rates).await?;
    assert_eq!(wh.newest_currency_date(&table).await?, Some(d(3)));

    let deleted = wh
        .delete_where(&table, &DeletePredicate::DateOnOrAfter(d(2)))
        .await?;
    assert_eq!(deleted, 2);
    assert_eq!(wh.newest_currency_date(&table).await?, Some(d(1)));

    drop_table(&wh, &table).await
}

#[tokio::test]
async fn invalid_table_name_is_rejected_before_sql() -> anyhow::Result<()> {
    let url = match std::env::var(cost_warehouse::ENV_DB_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: COST_DATABASE_URL not set");
            return Ok(());
        }
    };
    let wh = PgWarehouse::connect(&url).await?;

    let err = wh
        .query_distinct_invoice_statuses("cost_items; drop table cost_items")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("invalid table name"), "{err:#}");
    Ok(())
}
