use std::time::Duration;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use crate::db::{with_timeout, StoreError};
use crate::transactions::filter::{Filter, FilterArg, PageRequest};
use crate::transactions::repo_types::{NewTransaction, Summary, Transaction, TransactionRow};

const TRANSACTION_COLUMNS: &str = "id, created_by_user_id, receiver_type, receiver_name, \
     receiver_id, payer_type, payer_name, payer_id, payment_method, currency, amount, \
     description, datetime_utc, timezone, created_at, updated_at";

/// Binds compiled filter arguments in placeholder order.
macro_rules! bind_filter {
    ($query:expr, $args:expr) => {{
        let mut query = $query;
        for arg in $args {
            query = match arg {
                FilterArg::Uuid(v) => query.bind(*v),
                FilterArg::Text(v) => query.bind(v.clone()),
                FilterArg::Timestamp(v) => query.bind(*v),
                FilterArg::Float(v) => query.bind(*v),
                FilterArg::Int(v) => query.bind(*v),
            };
        }
        query
    }};
}

/// Persistence of transactions. `creator`, when given, scopes reads and deletes to that owner.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn create(&self, new: NewTransaction) -> Result<Transaction, StoreError>;

    async fn get_by_id(
        &self,
        id: Uuid,
        creator: Option<Uuid>,
    ) -> Result<Option<Transaction>, StoreError>;

    /// `false` when nothing matched, whether missing or owned by someone else.
    async fn delete(&self, id: Uuid, creator: Option<Uuid>) -> Result<bool, StoreError>;

    /// One page of rows plus the total number of matches.
    async fn list(
        &self,
        filter: &Filter,
        page: &PageRequest,
    ) -> Result<(Vec<Transaction>, i64), StoreError>;

    async fn summary(&self, filter: &Filter) -> Result<Summary, StoreError>;
}

#[derive(Clone)]
pub struct PgTransactionStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgTransactionStore {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    async fn begin_snapshot(&self) -> Result<sqlx::Transaction<'static, Postgres>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }
}

fn scoped(base: &str, creator: Option<Uuid>) -> String {
    match creator {
        Some(_) => format!("{base} AND created_by_user_id = $2"),
        None => base.to_owned(),
    }
}

#[async_trait]
impl TransactionStore for PgTransactionStore {
    async fn create(&self, new: NewTransaction) -> Result<Transaction, StoreError> {
        let sql = format!(
            "INSERT INTO transactions ( \
                created_by_user_id, receiver_type, receiver_name, receiver_id, \
                payer_type, payer_name, payer_id, payment_method, currency, \
                amount, description, datetime_utc, timezone \
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             RETURNING {TRANSACTION_COLUMNS}"
        );
        let row = with_timeout(
            self.timeout,
            sqlx::query_as::<_, TransactionRow>(&sql)
                .bind(new.created_by_user_id)
                .bind(new.receiver.kind.as_str())
                .bind(&new.receiver.name)
                .bind(&new.receiver.id)
                .bind(new.payer.kind.as_str())
                .bind(&new.payer.name)
                .bind(&new.payer.id)
                .bind(new.payment_method.as_str())
                .bind(new.currency.as_str())
                .bind(new.amount)
                .bind(&new.description)
                .bind(new.datetime_utc)
                .bind(&new.timezone)
                .fetch_one(&self.pool),
        )
        .await?;
        row.try_into()
    }

    async fn get_by_id(
        &self,
        id: Uuid,
        creator: Option<Uuid>,
    ) -> Result<Option<Transaction>, StoreError> {
        let sql = scoped(
            &format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = $1"),
            creator,
        );
        let mut query = sqlx::query_as::<_, TransactionRow>(&sql).bind(id);
        if let Some(owner) = creator {
            query = query.bind(owner);
        }
        let row = with_timeout(self.timeout, query.fetch_optional(&self.pool)).await?;
        row.map(Transaction::try_from).transpose()
    }

    async fn delete(&self, id: Uuid, creator: Option<Uuid>) -> Result<bool, StoreError> {
        let sql = scoped("DELETE FROM transactions WHERE id = $1", creator);
        let mut query = sqlx::query(&sql).bind(id);
        if let Some(owner) = creator {
            query = query.bind(owner);
        }
        let done = with_timeout(self.timeout, query.execute(&self.pool)).await?;
        Ok(done.rows_affected() > 0)
    }

    async fn list(
        &self,
        filter: &Filter,
        page: &PageRequest,
    ) -> Result<(Vec<Transaction>, i64), StoreError> {
        let compiled = filter.compile();
        let limit_at = compiled.next_placeholder();
        let list_sql = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions {where_sql} \
             ORDER BY {column} {dir}, id ASC \
             LIMIT ${limit_at} OFFSET ${offset_at}",
            where_sql = compiled.where_sql,
            column = page.sort.column(),
            dir = page.dir.sql(),
            offset_at = limit_at + 1,
        );
        let count_sql = format!(
            "SELECT COUNT(*) FROM transactions {}",
            compiled.where_sql
        );

        let (rows, total) = with_timeout(self.timeout, async {
            let mut tx = self.begin_snapshot().await?;

            let rows = bind_filter!(sqlx::query_as::<_, TransactionRow>(&list_sql), &compiled.args)
                .bind(page.limit())
                .bind(page.offset())
                .fetch_all(&mut *tx)
                .await?;
            let total = bind_filter!(sqlx::query_scalar::<_, i64>(&count_sql), &compiled.args)
                .fetch_one(&mut *tx)
                .await?;

            tx.commit().await?;
            Ok::<_, sqlx::Error>((rows, total))
        })
        .await?;

        let items = rows
            .into_iter()
            .map(Transaction::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((items, total))
    }

    async fn summary(&self, filter: &Filter) -> Result<Summary, StoreError> {
        let compiled = filter.compile();
        let where_sql = &compiled.where_sql;
        let kpi_sql = format!(
            "SELECT COALESCE(SUM(amount), 0)::float8, COALESCE(AVG(amount), 0)::float8, COUNT(*) \
             FROM transactions {where_sql}"
        );
        // label by month-of-year so the same month in different years shares a bucket
        let monthly_sql = format!(
            "SELECT TO_CHAR(DATE_TRUNC('month', datetime_utc AT TIME ZONE 'UTC'), 'MM') AS month, \
                    SUM(amount)::float8 AS amount \
             FROM transactions {where_sql} \
             GROUP BY 1 ORDER BY 1"
        );
        let currency_sql = format!(
            "SELECT currency, SUM(amount)::float8 AS amount \
             FROM transactions {where_sql} \
             GROUP BY currency ORDER BY currency"
        );

        with_timeout(self.timeout, async {
            let mut tx = self.begin_snapshot().await?;

            let (total_amount, avg_amount, count) = bind_filter!(
                sqlx::query_as::<_, (f64, f64, i64)>(&kpi_sql),
                &compiled.args
            )
            .fetch_one(&mut *tx)
            .await?;
            let monthly = bind_filter!(
                sqlx::query_as::<_, (String, f64)>(&monthly_sql),
                &compiled.args
            )
            .fetch_all(&mut *tx)
            .await?;
            let by_currency = bind_filter!(
                sqlx::query_as::<_, (String, f64)>(&currency_sql),
                &compiled.args
            )
            .fetch_all(&mut *tx)
            .await?;

            tx.commit().await?;
            Ok::<_, sqlx::Error>(Summary {
                total_amount,
                avg_amount,
                count,
                monthly,
                by_currency,
            })
        })
        .await
    }
}
