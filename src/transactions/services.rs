use std::sync::Arc;

use uuid::Uuid;

use crate::db::StoreError;
use crate::transactions::filter::{Filter, PageRequest};
use crate::transactions::repo::TransactionStore;
use crate::transactions::repo_types::{NewTransaction, Summary, Transaction};

/// Seam between handlers and the store; delegates every call unchanged.
pub struct TransactionService {
    store: Arc<dyn TransactionStore>,
}

impl TransactionService {
    pub fn new(store: Arc<dyn TransactionStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, new: NewTransaction) -> Result<Transaction, StoreError> {
        self.store.create(new).await
    }

    pub async fn get_by_id(
        &self,
        id: Uuid,
        creator: Option<Uuid>,
    ) -> Result<Option<Transaction>, StoreError> {
        self.store.get_by_id(id, creator).await
    }

    pub async fn delete(&self, id: Uuid, creator: Option<Uuid>) -> Result<bool, StoreError> {
        self.store.delete(id, creator).await
    }

    pub async fn list(
        &self,
        filter: &Filter,
        page: &PageRequest,
    ) -> Result<(Vec<Transaction>, i64), StoreError> {
        self.store.list(filter, page).await
    }

    pub async fn summary(&self, filter: &Filter) -> Result<Summary, StoreError> {
        self.store.summary(filter).await
    }
}
