//! Translation between the domain-level [`BlobId`] and the wire descriptor handed to a backend.

use serde::{Deserialize, Serialize};

use crate::blob_id::BlobId;

/// Object descriptor as carried in storage requests.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageObject {
    pub bucket: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation: Option<i64>,
}

pub fn encode_blob_id(from: &BlobId) -> StorageObject {
    StorageObject {
        bucket: from.bucket().to_owned(),
        name: from.name().to_owned(),
        generation: from.generation(),
    }
}

pub fn decode_blob_id(from: &StorageObject) -> BlobId {
    let id = BlobId::new(&from.bucket, &from.name);
    match from.generation {
        Some(generation) => id.with_generation(generation),
        None => id,
    }
}
