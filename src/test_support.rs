//! In-memory stores mirroring the Postgres semantics, for unit and HTTP tests.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo::UserStore;
use crate::auth::repo_types::{ResetCode, User};
use crate::db::StoreError;
use crate::transactions::filter::{Filter, PageRequest, SortDir, SortKey};
use crate::transactions::repo::TransactionStore;
use crate::transactions::repo_types::{NewTransaction, Summary, Transaction};

#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<Vec<User>>,
}

impl MemoryUserStore {
    pub fn len(&self) -> usize {
        self.users.lock().unwrap().len()
    }

    fn update(&self, user_id: Uuid, f: impl FnOnce(&mut User)) {
        let mut users = self.users.lock().unwrap();
        if let Some(user) = users.iter_mut().find(|u| u.id == user_id) {
            f(user);
            user.updated_at = OffsetDateTime::now_utc();
        }
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn get_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.username == username).cloned())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn exists_by_username(&self, username: &str) -> Result<bool, StoreError> {
        Ok(self.get_by_username(username).await?.is_some())
    }

    async fn create(
        &self,
        username: &str,
        role: &str,
        password_hash: &str,
    ) -> Result<User, StoreError> {
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.username == username) {
            return Err(StoreError::Conflict("users_username_key".into()));
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_owned(),
            password_hash: password_hash.to_owned(),
            reset: None,
            role: role.to_owned(),
            created_at: now,
            updated_at: now,
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn update_reset_code(
        &self,
        user_id: Uuid,
        reset: Option<ResetCode>,
    ) -> Result<(), StoreError> {
        self.update(user_id, |u| u.reset = reset);
        Ok(())
    }

    async fn update_password(&self, user_id: Uuid, password_hash: &str) -> Result<(), StoreError> {
        self.update(user_id, |u| {
            u.password_hash = password_hash.to_owned();
            u.reset = None;
        });
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryTransactionStore {
    rows: Mutex<Vec<Transaction>>,
}

fn matches(filter: &Filter, tx: &Transaction) -> bool {
    let owner_ok = filter.creator.map_or(true, |c| tx.created_by_user_id == c);
    let search_ok = filter.search.as_ref().map_or(true, |s| {
        let needle = s.to_lowercase();
        tx.receiver.name.to_lowercase().contains(&needle)
            || tx.payer.name.to_lowercase().contains(&needle)
    });
    let from_ok = filter.date_from.map_or(true, |from| tx.datetime_utc >= from);
    let to_ok = filter.date_to.map_or(true, |to| tx.datetime_utc < to);
    let currency_ok = filter
        .currency
        .as_ref()
        .map_or(true, |c| tx.currency.as_str() == c);
    let amount_ok = filter.min_amount.map_or(true, |min| tx.amount >= min);
    let month_ok = filter
        .month
        .map_or(true, |m| u8::from(tx.datetime_utc.month()) == m);
    owner_ok && search_ok && from_ok && to_ok && currency_ok && amount_ok && month_ok
}

fn compare(key: SortKey, a: &Transaction, b: &Transaction) -> Ordering {
    match key {
        SortKey::Receiver => a.receiver.name.cmp(&b.receiver.name),
        SortKey::Payer => a.payer.name.cmp(&b.payer.name),
        SortKey::Amount => a.amount.partial_cmp(&b.amount).unwrap_or(Ordering::Equal),
        SortKey::Currency => a.currency.as_str().cmp(b.currency.as_str()),
        SortKey::Date => a.datetime_utc.cmp(&b.datetime_utc),
    }
}

#[async_trait]
impl TransactionStore for MemoryTransactionStore {
    async fn create(&self, new: NewTransaction) -> Result<Transaction, StoreError> {
        let now = OffsetDateTime::now_utc();
        let tx = Transaction {
            id: Uuid::new_v4(),
            created_by_user_id: new.created_by_user_id,
            receiver: new.receiver,
            payer: new.payer,
            payment_method: new.payment_method,
            currency: new.currency,
            amount: new.amount,
            description: new.description,
            datetime_utc: new.datetime_utc,
            timezone: new.timezone,
            created_at: now,
            updated_at: now,
        };
        self.rows.lock().unwrap().push(tx.clone());
        Ok(tx)
    }

    async fn get_by_id(
        &self,
        id: Uuid,
        creator: Option<Uuid>,
    ) -> Result<Option<Transaction>, StoreError> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .find(|t| t.id == id && creator.map_or(true, |c| t.created_by_user_id == c))
            .cloned())
    }

    async fn delete(&self, id: Uuid, creator: Option<Uuid>) -> Result<bool, StoreError> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|t| !(t.id == id && creator.map_or(true, |c| t.created_by_user_id == c)));
        Ok(rows.len() < before)
    }

    async fn list(
        &self,
        filter: &Filter,
        page: &PageRequest,
    ) -> Result<(Vec<Transaction>, i64), StoreError> {
        let rows = self.rows.lock().unwrap();
        let mut hits: Vec<Transaction> = rows.iter().filter(|t| matches(filter, t)).cloned().collect();
        hits.sort_by(|a, b| {
            let primary = match page.dir {
                SortDir::Asc => compare(page.sort, a, b),
                SortDir::Desc => compare(page.sort, b, a),
            };
            primary.then_with(|| a.id.cmp(&b.id))
        });
        let total = hits.len() as i64;
        let items = hits
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect();
        Ok((items, total))
    }

    async fn summary(&self, filter: &Filter) -> Result<Summary, StoreError> {
        let rows = self.rows.lock().unwrap();
        let hits: Vec<&Transaction> = rows.iter().filter(|t| matches(filter, t)).collect();

        let mut monthly: BTreeMap<String, f64> = BTreeMap::new();
        let mut by_currency: BTreeMap<String, f64> = BTreeMap::new();
        for tx in &hits {
            let label = format!("{:02}", u8::from(tx.datetime_utc.month()));
            *monthly.entry(label).or_default() += tx.amount;
            *by_currency.entry(tx.currency.as_str().to_owned()).or_default() += tx.amount;
        }

        let total_amount: f64 = hits.iter().map(|t| t.amount).sum();
        let count = hits.len() as i64;
        Ok(Summary {
            total_amount,
            avg_amount: if count > 0 { total_amount / count as f64 } else { 0.0 },
            count,
            monthly: monthly.into_iter().collect(),
            by_currency: by_currency.into_iter().collect(),
        })
    }
}
