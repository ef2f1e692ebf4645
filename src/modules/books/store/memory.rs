use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use tokio::sync::RwLock;

use super::{BookDocument, BookStore, StorageError, UpdateOutcome};
use crate::modules::books::models::{Book, BookId, BookUpdate, NewBook};

/// Process-local store with the same merge and upsert rules as MongoDB.
/// Documents keep insertion order.
#[derive(Debug, Default)]
pub struct InMemoryBookStore {
    documents: RwLock<Vec<BookDocument>>,
}

impl InMemoryBookStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

#[async_trait]
impl BookStore for InMemoryBookStore {
    async fn insert(&self, book: NewBook) -> Result<BookId, StorageError> {
        let id = ObjectId::new();
        self.documents
            .write()
            .await
            .push(BookDocument::from_new(id, book));
        Ok(BookId::from(id))
    }

    async fn find_by_id(&self, id: &BookId) -> Result<Option<Book>, StorageError> {
        let documents = self.documents.read().await;
        documents
            .iter()
            .find(|d| d.id == id.as_object_id())
            .cloned()
            .map(Book::try_from)
            .transpose()
    }

    async fn merge_update(
        &self,
        id: &BookId,
        update: &BookUpdate,
        upsert: bool,
    ) -> Result<UpdateOutcome, StorageError> {
        let mut documents = self.documents.write().await;

        if let Some(document) = documents.iter_mut().find(|d| d.id == id.as_object_id()) {
            document.apply(update);
            return Ok(UpdateOutcome {
                matched: true,
                upserted: false,
            });
        }

        if upsert {
            documents.push(BookDocument::sparse(id.as_object_id(), update));
        }

        Ok(UpdateOutcome {
            matched: false,
            upserted: upsert,
        })
    }

    async fn delete_by_id(&self, id: &BookId) -> Result<u64, StorageError> {
        let mut documents = self.documents.write().await;
        match documents.iter().position(|d| d.id == id.as_object_id()) {
            Some(index) => {
                documents.remove(index);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn find_all(&self) -> Result<Vec<Book>, StorageError> {
        let documents = self.documents.read().await;
        documents.iter().cloned().map(Book::try_from).collect()
    }
}
