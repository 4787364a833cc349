//! Identity -> account link records.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::db::AccountLinkStore;
use crate::error::LinkErrorCode;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountLink {
    pub identity: String,
    pub linked_account_id: String,
    pub linked_at_ms: i64,
}

/// Overwrite-on-relink persistence. An identity never holds two links.
pub struct LinkPersistenceService {
    store: Arc<dyn AccountLinkStore>,
}

impl LinkPersistenceService {
    pub fn new(store: Arc<dyn AccountLinkStore>) -> Self {
        Self { store }
    }

    pub async fn persist_link(
        &self,
        identity: &str,
        account_id: &str,
        now_ms: i64,
    ) -> Result<(), LinkErrorCode> {
        self.store.link(identity, account_id, now_ms).await?;
        tracing::info!(identity, account = account_id, "Account link persisted");
        Ok(())
    }

    pub async fn get_linked_account(&self, identity: &str) -> Result<Option<String>, LinkErrorCode> {
        Ok(self
            .store
            .get_link(identity)
            .await?
            .map(|link| link.linked_account_id))
    }

    pub async fn get_link(&self, identity: &str) -> Result<Option<AccountLink>, LinkErrorCode> {
        Ok(self.store.get_link(identity).await?)
    }

    pub async fn unlink(&self, identity: &str) -> Result<(), LinkErrorCode> {
        if !self.store.unlink(identity).await? {
            return Err(LinkErrorCode::LinkNotFound);
        }
        tracing::info!(identity, "Account link removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::InMemoryBackend;

    fn service() -> LinkPersistenceService {
        LinkPersistenceService::new(Arc::new(InMemoryBackend::new()))
    }

    #[tokio::test]
    async fn persist_then_read_back() {
        let service = service();
        assert_eq!(service.get_linked_account("u1").await.unwrap(), None);

        service.persist_link("u1", "0xaaa", 10).await.unwrap();
        assert_eq!(
            service.get_linked_account("u1").await.unwrap().as_deref(),
            Some("0xaaa")
        );
    }

    #[tokio::test]
    async fn relink_overwrites() {
        let service = service();
        service.persist_link("u1", "0xaaa", 10).await.unwrap();
        service.persist_link("u1", "0xbbb", 20).await.unwrap();

        let link = service.get_link("u1").await.unwrap().unwrap();
        assert_eq!(
            link,
            AccountLink {
                identity: "u1".to_string(),
                linked_account_id: "0xbbb".to_string(),
                linked_at_ms: 20,
            }
        );
    }

    #[tokio::test]
    async fn unlink_requires_existing_link() {
        let service = service();
        assert_eq!(service.unlink("u1").await, Err(LinkErrorCode::LinkNotFound));

        service.persist_link("u1", "0xaaa", 10).await.unwrap();
        service.unlink("u1").await.unwrap();
        assert_eq!(service.get_linked_account("u1").await.unwrap(), None);
        assert_eq!(service.unlink("u1").await, Err(LinkErrorCode::LinkNotFound));
    }
}
