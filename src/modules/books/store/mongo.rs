use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, Document};
use mongodb::error::ErrorKind;
use mongodb::{Collection, Database};

use super::{to_bson_datetime, BookDocument, BookStore, StorageError, UpdateOutcome};
use crate::modules::books::models::{Book, BookId, BookUpdate, NewBook};

/// `BookStore` over a MongoDB collection. Every call is bounded by `timeout`.
#[derive(Debug, Clone)]
pub struct MongoBookStore {
    collection: Collection<BookDocument>,
    timeout: Duration,
}

impl MongoBookStore {
    pub fn new(database: &Database, collection: &str, timeout: Duration) -> Self {
        Self {
            collection: database.collection(collection),
            timeout,
        }
    }

    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> Result<T, StorageError>
    where
        F: Future<Output = mongodb::error::Result<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(classify),
            Err(_) => Err(StorageError::Timeout {
                operation,
                timeout: self.timeout,
            }),
        }
    }
}

fn classify(err: mongodb::error::Error) -> StorageError {
    match err.kind.as_ref() {
        ErrorKind::BsonDeserialization(_) => StorageError::Decode(err.to_string()),
        _ => StorageError::Backend(err.to_string()),
    }
}

fn id_filter(id: &BookId) -> Document {
    doc! { "_id": id.as_object_id() }
}

/// `$set` document for a merge-update: the supplied fields plus `updated_at`.
pub(crate) fn update_document(update: &BookUpdate) -> Document {
    let mut set = Document::new();
    for (field, value) in &update.fields {
        set.insert(field.as_str(), value.clone());
    }
    set.insert("updated_at", to_bson_datetime(update.updated_at));
    doc! { "$set": set }
}

#[async_trait]
impl BookStore for MongoBookStore {
    async fn insert(&self, book: NewBook) -> Result<BookId, StorageError> {
        let id = ObjectId::new();
        let document = BookDocument::from_new(id, book);
        self.bounded("insert", async { self.collection.insert_one(&document).await })
            .await?;
        Ok(BookId::from(id))
    }

    async fn find_by_id(&self, id: &BookId) -> Result<Option<Book>, StorageError> {
        let filter = id_filter(id);
        self.bounded("find_by_id", async { self.collection.find_one(filter).await })
            .await?
            .map(Book::try_from)
            .transpose()
    }

    async fn merge_update(
        &self,
        id: &BookId,
        update: &BookUpdate,
        upsert: bool,
    ) -> Result<UpdateOutcome, StorageError> {
        let filter = id_filter(id);
        let changes = update_document(update);
        let result = self
            .bounded("merge_update", async {
                self.collection
                    .update_one(filter, changes)
                    .upsert(upsert)
                    .await
            })
            .await?;

        Ok(UpdateOutcome {
            matched: result.matched_count > 0,
            upserted: result.upserted_id.is_some(),
        })
    }

    async fn delete_by_id(&self, id: &BookId) -> Result<u64, StorageError> {
        let filter = id_filter(id);
        let result = self
            .bounded("delete_by_id", async { self.collection.delete_one(filter).await })
            .await?;
        Ok(result.deleted_count)
    }

    async fn find_all(&self) -> Result<Vec<Book>, StorageError> {
        let documents = self
            .bounded("find_all", async {
                let cursor = self.collection.find(doc! {}).await?;
                cursor.try_collect::<Vec<BookDocument>>().await
            })
            .await?;

        documents.into_iter().map(Book::try_from).collect()
    }
}
