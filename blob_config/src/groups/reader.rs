use utils::ByteSize;

crate::config_group!({

    /// The minimum number of bytes requested by a single fetch of a read channel.  Reads asking for
    /// less than this still fetch a full chunk and serve later reads from the buffered remainder.
    ///
    /// The default value is 2MiB.
    ///
    /// Use the environment variable `BLOBRS_READER_DEFAULT_CHUNK_SIZE` to set this value.
    ref default_chunk_size: ByteSize = ByteSize::mib(2);
});
