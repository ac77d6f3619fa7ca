use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tempfile::TempDir;
use tracing::{debug, info};

use crate::blob_id::BlobId;
use crate::codec::StorageObject;
use crate::error::{BlobClientError, Result, TransportError};
use crate::interface::{FetchResult, StorageBackend};
use crate::options::ReadOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ObjectVersion {
    generation: i64,
    metageneration: i64,
}

impl ObjectVersion {
    fn etag(&self) -> String {
        format!("g{}m{}", self.generation, self.metageneration)
    }
}

/// A [`StorageBackend`] over a local directory, laid out as `<root>/<bucket>/<name>`.
///
/// Generations are tracked per instance.  Objects found on disk that were not written through
/// [`LocalClient::put_blob`] start at generation 1.
pub struct LocalClient {
    root: PathBuf,
    versions: Mutex<HashMap<(String, String), ObjectVersion>>,
    _tmp_dir: Option<TempDir>, // Must be last
}

impl LocalClient {
    /// Create a local client hosted in a temporary directory for testing.
    pub fn temporary() -> Result<Arc<Self>> {
        let tmp_dir = TempDir::new()?;
        let path = tmp_dir.path().to_owned();
        Ok(Arc::new(Self::new_internal(path, Some(tmp_dir))?))
    }

    /// Create a local client hosted in a directory.  The directory persists across instances.
    pub fn new(path: impl AsRef<Path>) -> Result<Arc<Self>> {
        Ok(Arc::new(Self::new_internal(path, None)?))
    }

    fn new_internal(path: impl AsRef<Path>, tmp_dir: Option<TempDir>) -> Result<Self> {
        let root = std::path::absolute(path)?;
        if !root.exists() {
            std::fs::create_dir_all(&root)?;
        }

        Ok(Self {
            root,
            versions: Mutex::new(HashMap::new()),
            _tmp_dir: tmp_dir,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, bucket: &str, name: &str) -> std::result::Result<PathBuf, TransportError> {
        let relative = Path::new(bucket).join(name);
        let escapes = bucket.is_empty()
            || name.is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_)));
        if escapes {
            return Err(TransportError::Fatal(format!("invalid object path {bucket}/{name}")));
        }
        Ok(self.root.join(relative))
    }

    fn lock_versions(&self) -> std::sync::MutexGuard<'_, HashMap<(String, String), ObjectVersion>> {
        // A poisoned map only ever holds fully written entries.
        self.versions.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Writes `data` as the new content of `bucket/name`, returning the id pinned to the new
    /// generation.
    pub fn put_blob(&self, bucket: &str, name: &str, data: &[u8]) -> Result<BlobId> {
        let path = self.path_for(bucket, name)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut versions = self.lock_versions();
        let key = (bucket.to_owned(), name.to_owned());

        let generation = match versions.get(&key) {
            Some(v) => v.generation + 1,
            None if path.exists() => 2,
            None => 1,
        };

        let mut file = File::create(&path)?;
        file.write_all(data)?;
        file.sync_all()?;

        versions.insert(
            key,
            ObjectVersion {
                generation,
                metageneration: 1,
            },
        );

        info!(bucket, name, generation, len = data.len(), "Stored blob");
        Ok(BlobId::new(bucket, name).with_generation(generation))
    }

    /// Bumps the metageneration of an existing object, as a metadata-only update would.
    pub fn update_metadata(&self, bucket: &str, name: &str) -> Result<i64> {
        let path = self.path_for(bucket, name)?;
        let mut versions = self.lock_versions();
        let version = Self::current_version(&mut versions, bucket, name, &path)?;
        version.metageneration += 1;
        Ok(version.metageneration)
    }

    pub fn delete_blob(&self, bucket: &str, name: &str) -> Result<()> {
        let path = self.path_for(bucket, name)?;
        self.lock_versions().remove(&(bucket.to_owned(), name.to_owned()));
        std::fs::remove_file(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => BlobClientError::from(TransportError::NotFound(format!("{bucket}/{name}"))),
            _ => e.into(),
        })
    }

    /// Current version of `bucket/name`, or `NotFound` if no such file exists.
    fn current_version<'a>(
        versions: &'a mut HashMap<(String, String), ObjectVersion>,
        bucket: &str,
        name: &str,
        path: &Path,
    ) -> std::result::Result<&'a mut ObjectVersion, TransportError> {
        if !path.is_file() {
            return Err(TransportError::NotFound(format!("{bucket}/{name}")));
        }
        Ok(versions
            .entry((bucket.to_owned(), name.to_owned()))
            .or_insert(ObjectVersion {
                generation: 1,
                metageneration: 1,
            }))
    }

    fn check_preconditions(
        object: &StorageObject,
        options: &ReadOptions,
        version: ObjectVersion,
    ) -> std::result::Result<(), TransportError> {
        let id = format!("{}/{}", object.bucket, object.name);

        if let Some(pinned) = object.generation
            && pinned != version.generation
        {
            return Err(TransportError::NotFound(format!("{id}#{pinned}")));
        }

        let failed = |what: &str, expected: i64, actual: i64| {
            TransportError::PreconditionFailed(format!("{id}: {what} {expected} does not hold (current is {actual})"))
        };

        if let Some(g) = options.if_generation_match()
            && g != version.generation
        {
            return Err(failed("ifGenerationMatch", g, version.generation));
        }
        if let Some(g) = options.if_generation_not_match()
            && g == version.generation
        {
            return Err(failed("ifGenerationNotMatch", g, version.generation));
        }
        if let Some(m) = options.if_metageneration_match()
            && m != version.metageneration
        {
            return Err(failed("ifMetagenerationMatch", m, version.metageneration));
        }
        if let Some(m) = options.if_metageneration_not_match()
            && m == version.metageneration
        {
            return Err(failed("ifMetagenerationNotMatch", m, version.metageneration));
        }
        Ok(())
    }
}

impl StorageBackend for LocalClient {
    fn fetch_range(
        &self,
        object: &StorageObject,
        options: &ReadOptions,
        offset: u64,
        length: u64,
    ) -> std::result::Result<FetchResult, TransportError> {
        let path = self.path_for(&object.bucket, &object.name)?;

        // Held across the read so a concurrent put cannot interleave with it.
        let mut versions = self.lock_versions();
        let version = *Self::current_version(&mut versions, &object.bucket, &object.name, &path)?;
        Self::check_preconditions(object, options, version)?;

        let mut file = File::open(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => TransportError::NotFound(format!("{}/{}", object.bucket, object.name)),
            _ => e.into(),
        })?;

        let file_len = file.metadata()?.len();
        let start = offset.min(file_len);
        let len = length.min(file_len - start);

        let mut data = Vec::with_capacity(len as usize);
        file.seek(SeekFrom::Start(start))?;
        file.take(len).read_to_end(&mut data)?;
        drop(versions);

        debug!(
            bucket = %object.bucket,
            name = %object.name,
            offset,
            length,
            returned = data.len(),
            "Local range read"
        );

        Ok(FetchResult::new(version.etag(), Bytes::from(data)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_blob_id;
    use crate::options::BlobSourceOption;

    fn object(bucket: &str, name: &str) -> StorageObject {
        encode_blob_id(&BlobId::new(bucket, name))
    }

    #[test]
    fn test_put_and_fetch() {
        let client = LocalClient::temporary().unwrap();
        let id = client.put_blob("bucket", "dir/file.bin", b"0123456789").unwrap();
        assert_eq!(id.generation(), Some(1));

        let r = client
            .fetch_range(&object("bucket", "dir/file.bin"), &ReadOptions::new(), 2, 5)
            .unwrap();
        assert_eq!(&r.data[..], b"23456");

        // Short and past-the-end reads.
        let r = client
            .fetch_range(&object("bucket", "dir/file.bin"), &ReadOptions::new(), 8, 5)
            .unwrap();
        assert_eq!(&r.data[..], b"89");
        let r = client
            .fetch_range(&object("bucket", "dir/file.bin"), &ReadOptions::new(), 100, 5)
            .unwrap();
        assert!(r.data.is_empty());
    }

    #[test]
    fn test_generation_and_etag() {
        let client = LocalClient::temporary().unwrap();
        let v1 = client.put_blob("b", "o", b"one").unwrap();
        let etag1 = client.fetch_range(&object("b", "o"), &ReadOptions::new(), 0, 3).unwrap().etag;

        let v2 = client.put_blob("b", "o", b"two").unwrap();
        assert_eq!(v2.generation(), Some(2));
        let etag2 = client.fetch_range(&object("b", "o"), &ReadOptions::new(), 0, 3).unwrap().etag;
        assert_ne!(etag1, etag2);

        // The old generation is gone.
        let err = client
            .fetch_range(&encode_blob_id(&v1), &ReadOptions::new(), 0, 3)
            .unwrap_err();
        assert!(matches!(err, TransportError::NotFound(_)));
        let r = client.fetch_range(&encode_blob_id(&v2), &ReadOptions::new(), 0, 3).unwrap();
        assert_eq!(&r.data[..], b"two");

        client.update_metadata("b", "o").unwrap();
        let etag3 = client.fetch_range(&object("b", "o"), &ReadOptions::new(), 0, 3).unwrap().etag;
        assert_ne!(etag2, etag3);
    }

    #[test]
    fn test_preconditions() {
        let client = LocalClient::temporary().unwrap();
        client.put_blob("b", "o", b"abc").unwrap();
        let o = object("b", "o");

        let ok = ReadOptions::new()
            .with(BlobSourceOption::IfGenerationMatch(1))
            .with(BlobSourceOption::IfMetagenerationNotMatch(7));
        assert!(client.fetch_range(&o, &ok, 0, 3).is_ok());

        for failing in [
            BlobSourceOption::IfGenerationMatch(2),
            BlobSourceOption::IfGenerationNotMatch(1),
            BlobSourceOption::IfMetagenerationMatch(3),
            BlobSourceOption::IfMetagenerationNotMatch(1),
        ] {
            let options = ReadOptions::new().with(failing);
            let err = client.fetch_range(&o, &options, 0, 3).unwrap_err();
            assert!(matches!(err, TransportError::PreconditionFailed(_)));
            assert!(!err.is_transient());
        }
    }

    #[test]
    fn test_existing_files_start_at_generation_one() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("b")).unwrap();
        std::fs::write(dir.path().join("b").join("o"), b"on disk").unwrap();

        let client = LocalClient::new(dir.path()).unwrap();
        let pinned = encode_blob_id(&BlobId::new("b", "o").with_generation(1));
        let r = client.fetch_range(&pinned, &ReadOptions::new(), 0, 100).unwrap();
        assert_eq!(&r.data[..], b"on disk");

        let id = client.put_blob("b", "o", b"replaced").unwrap();
        assert_eq!(id.generation(), Some(2));
    }

    #[test]
    fn test_missing_and_invalid_objects() {
        let client = LocalClient::temporary().unwrap();
        let err = client.fetch_range(&object("b", "missing"), &ReadOptions::new(), 0, 1).unwrap_err();
        assert!(matches!(err, TransportError::NotFound(_)));

        let err = client.fetch_range(&object("b", "../escape"), &ReadOptions::new(), 0, 1).unwrap_err();
        assert!(matches!(err, TransportError::Fatal(_)));

        client.put_blob("b", "o", b"x").unwrap();
        client.delete_blob("b", "o").unwrap();
        assert!(matches!(
            client.delete_blob("b", "o"),
            Err(BlobClientError::TransportError(TransportError::NotFound(_)))
        ));
    }
}
