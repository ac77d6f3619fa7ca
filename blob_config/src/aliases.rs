/// Secondary environment variable names, as `(primary, alias)` pairs.
///
/// The alias is consulted only when the primary variable is not set.
pub const ENVIRONMENT_NAME_ALIASES: &[(&str, &str)] = &[
    ("BLOBRS_READER_DEFAULT_CHUNK_SIZE", "BLOBRS_CHUNK_SIZE"),
    ("BLOBRS_CLIENT_RETRY_MAX_ATTEMPTS", "BLOBRS_MAX_ATTEMPTS"),
    ("BLOBRS_LOG_LEVEL", "BLOBRS_LOG"),
];
