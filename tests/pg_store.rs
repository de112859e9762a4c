//! Store tests against a live Postgres. Run with
//! `DATABASE_URL=... cargo test -- --ignored`.

use std::time::Duration;

use ledger::auth::repo::{PgUserStore, UserStore};
use ledger::auth::repo_types::ResetCode;
use ledger::db::StoreError;
use ledger::transactions::filter::{Filter, PageRequest, SortDir, SortKey};
use ledger::transactions::repo::{PgTransactionStore, TransactionStore};
use ledger::transactions::repo_types::{Currency, NewTransaction, Party, PartyType, PaymentMethod};
use sqlx::PgPool;
use time::macros::datetime;
use time::OffsetDateTime;
use uuid::Uuid;

const TIMEOUT: Duration = Duration::from_secs(5);

fn new_tx(owner: Uuid, amount: f64, currency: Currency, at: OffsetDateTime) -> NewTransaction {
    NewTransaction {
        created_by_user_id: owner,
        receiver: Party {
            kind: PartyType::Individual,
            name: "Sara Ahmadi".into(),
            id: None,
        },
        payer: Party {
            kind: PartyType::Legal,
            name: "Pars Logistics".into(),
            id: Some("10101010".into()),
        },
        payment_method: PaymentMethod::Account,
        currency,
        amount,
        description: None,
        datetime_utc: at,
        timezone: "UTC".into(),
    }
}

#[sqlx::test]
#[ignore = "needs DATABASE_URL"]
async fn duplicate_username_is_conflict(pool: PgPool) {
    let users = PgUserStore::new(pool, TIMEOUT);
    users.create("dana", "user", "hash").await.unwrap();
    let err = users.create("dana", "user", "hash").await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
    assert!(users.exists_by_username("dana").await.unwrap());
}

#[sqlx::test]
#[ignore = "needs DATABASE_URL"]
async fn password_update_clears_reset_code(pool: PgPool) {
    let users = PgUserStore::new(pool, TIMEOUT);
    let user = users.create("erin", "user", "old").await.unwrap();

    let reset = ResetCode {
        hash: "code-hash".into(),
        expires_at: OffsetDateTime::now_utc() + Duration::from_secs(600),
    };
    users.update_reset_code(user.id, Some(reset)).await.unwrap();
    assert!(users.get_by_id(user.id).await.unwrap().unwrap().reset.is_some());

    users.update_password(user.id, "new").await.unwrap();
    let stored = users.get_by_username("erin").await.unwrap().unwrap();
    assert_eq!(stored.password_hash, "new");
    assert!(stored.reset.is_none());
}

#[sqlx::test]
#[ignore = "needs DATABASE_URL"]
async fn owner_scoping_and_paging(pool: PgPool) {
    let users = PgUserStore::new(pool.clone(), TIMEOUT);
    let owner = users.create("owner", "user", "h").await.unwrap().id;
    let other = users.create("other", "user", "h").await.unwrap().id;
    let store = PgTransactionStore::new(pool, TIMEOUT);

    let mut ids = Vec::new();
    for day in 1..=5u8 {
        let at = datetime!(2024-02-01 12:00 UTC).replace_day(day).unwrap();
        ids.push(store.create(new_tx(owner, 10.0, Currency::Usd, at)).await.unwrap().id);
    }
    let foreign = store
        .create(new_tx(other, 10.0, Currency::Usd, datetime!(2024-02-01 12:00 UTC)))
        .await
        .unwrap();

    assert!(store.get_by_id(foreign.id, Some(owner)).await.unwrap().is_none());
    assert!(!store.delete(foreign.id, Some(owner)).await.unwrap());

    let filter = Filter {
        creator: Some(owner),
        ..Filter::default()
    };
    let mut seen = Vec::new();
    for page in 1..=3 {
        let request = PageRequest::new(page, 2, SortKey::Amount, SortDir::Desc);
        let (items, total) = store.list(&filter, &request).await.unwrap();
        assert_eq!(total, 5);
        seen.extend(items.into_iter().map(|t| t.id));
    }
    seen.sort();
    ids.sort();
    assert_eq!(seen, ids);
}

#[sqlx::test]
#[ignore = "needs DATABASE_URL"]
async fn summary_buckets_by_month_and_currency(pool: PgPool) {
    let users = PgUserStore::new(pool.clone(), TIMEOUT);
    let owner = users.create("kpi", "user", "h").await.unwrap().id;
    let store = PgTransactionStore::new(pool, TIMEOUT);

    store
        .create(new_tx(owner, 100.0, Currency::Usd, datetime!(2023-01-15 00:00 UTC)))
        .await
        .unwrap();
    store
        .create(new_tx(owner, 20.0, Currency::Eur, datetime!(2024-01-15 00:00 UTC)))
        .await
        .unwrap();
    store
        .create(new_tx(owner, 30.0, Currency::Usd, datetime!(2024-07-01 00:00 UTC)))
        .await
        .unwrap();

    let filter = Filter {
        creator: Some(owner),
        ..Filter::default()
    };
    let summary = store.summary(&filter).await.unwrap();
    assert_eq!(summary.count, 3);
    assert!((summary.total_amount - 150.0).abs() < 1e-9);
    assert!((summary.avg_amount - 50.0).abs() < 1e-9);
    assert_eq!(
        summary.monthly,
        vec![("01".to_owned(), 120.0), ("07".to_owned(), 30.0)]
    );
    assert_eq!(
        summary.by_currency,
        vec![("EUR".to_owned(), 20.0), ("USD".to_owned(), 130.0)]
    );

    let july = Filter {
        month: Some(7),
        ..filter
    };
    assert_eq!(store.summary(&july).await.unwrap().count, 1);
}
