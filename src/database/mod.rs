use futures::TryStreamExt;
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{doc, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, Database, IndexModel};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::{
    configuration::Configuration,
    error::{CorsiError, CorsiResult, UserError},
};

pub mod model;

use self::model::moduli::Modulo;

/// Connect to the document store and make sure the indexes it is
/// responsible for exist.
#[instrument(err, skip(configuration))]
pub async fn setup_database(configuration: &Configuration) -> CorsiResult<Database> {
    debug!("Creating mongodb client");
    let client = Client::with_uri_str(&configuration.mongodb_url)
        .await
        .map_err(|error| CorsiError::SetupDatabase {
            source: Box::new(error),
        })?;
    let database = client.database(&configuration.mongodb_database);

    ensure_indexes(&database).await?;

    Ok(database)
}

/// The uniqueness of a module's `codice` is enforced by the store itself,
/// so concurrent creates cannot both succeed.
#[instrument(err, skip(database))]
async fn ensure_indexes(database: &Database) -> CorsiResult<()> {
    let moduli: Collection<Modulo> = database.collection(Modulo::COLLECTION);
    moduli
        .create_index(
            IndexModel::builder()
                .keys(doc! { "codice": 1 })
                .options(IndexOptions::builder().unique(true).build())
                .build(),
            None,
        )
        .await
        .map_err(|error| CorsiError::SetupDatabase {
            source: Box::new(error),
        })?;

    info!("Ensured unique index on {}.codice", Modulo::COLLECTION);
    Ok(())
}

/// Parse an id path parameter into the store's id type.
/// A malformed id is a user error and never reaches the store.
pub fn parse_object_id(raw: &str) -> Result<ObjectId, UserError> {
    ObjectId::parse_str(raw).map_err(|_| UserError::InvalidId {
        id: raw.to_string(),
    })
}

/// A typed handle to one document collection, exposing the handful of
/// operations the services need: insert, find by id, find all, partial
/// update by id and delete by id.
pub struct DocumentCollection<T> {
    collection: Collection<T>,
}

impl<T> Clone for DocumentCollection<T> {
    fn clone(&self) -> Self {
        Self {
            collection: self.collection.clone(),
        }
    }
}

impl<T> DocumentCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync,
{
    pub fn new(database: &Database, name: &str) -> Self {
        Self {
            collection: database.collection(name),
        }
    }

    /// Insert a document and return its newly assigned id.
    pub async fn insert_one(&self, document: &T) -> CorsiResult<ObjectId> {
        let result = self
            .collection
            .insert_one(document, None)
            .await
            .map_err(into_database_error)?;
        result
            .inserted_id
            .as_object_id()
            .ok_or(CorsiError::UnexpectedDocumentId {
                id: result.inserted_id,
            })
    }

    pub async fn find_one(&self, id: ObjectId) -> CorsiResult<Option<T>> {
        self.collection
            .find_one(doc! { "_id": id }, None)
            .await
            .map_err(into_database_error)
    }

    /// All documents in store iteration order.
    pub async fn find_all(&self) -> CorsiResult<Vec<T>> {
        let cursor = self
            .collection
            .find(None, None)
            .await
            .map_err(into_database_error)?;
        cursor.try_collect().await.map_err(into_database_error)
    }

    /// `$set`-merge the given fields into the document with the given id.
    /// Returns the number of matched documents (0 or 1).
    pub async fn update_one(&self, id: ObjectId, fields: Document) -> CorsiResult<u64> {
        let result = self
            .collection
            .update_one(doc! { "_id": id }, doc! { "$set": fields }, None)
            .await
            .map_err(into_database_error)?;
        Ok(result.matched_count)
    }

    /// Returns the number of deleted documents (0 or 1).
    pub async fn delete_one(&self, id: ObjectId) -> CorsiResult<u64> {
        let result = self
            .collection
            .delete_one(doc! { "_id": id }, None)
            .await
            .map_err(into_database_error)?;
        Ok(result.deleted_count)
    }

    /// Remove every document. Only used when loading seed data.
    pub async fn clear(&self) -> CorsiResult<()> {
        self.collection
            .delete_many(doc! {}, None)
            .await
            .map_err(into_database_error)?;
        Ok(())
    }
}

/// Keep duplicate-key violations distinguishable from other store errors,
/// so the handlers can report them as a conflict instead of a server error.
fn into_database_error(error: mongodb::error::Error) -> CorsiError {
    if is_duplicate_key_error(&error) {
        CorsiError::DuplicateKey { source: error }
    } else {
        CorsiError::Database { source: error }
    }
}

fn is_duplicate_key_error(error: &mongodb::error::Error) -> bool {
    const DUPLICATE_KEY: i32 = 11000;

    match error.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => {
            write_error.code == DUPLICATE_KEY
        }
        ErrorKind::Command(command_error) => command_error.code == DUPLICATE_KEY,
        _ => false,
    }
}
