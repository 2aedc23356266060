//! Error kinds for the cluster format, name-group scan, and update protocol.

/// Errors surfaced by `blobvault`.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Underlying IO failure.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    /// Stream ended mid-cluster or mid-field while decoding.
    #[error("insufficient data: stream ended before a complete field could be read")]
    InsufficientData,
    /// Caller asked for a header of a cluster whose imprint does not match the key.
    #[error("cluster imprint does not match the requested codename key")]
    GroupImprintMismatch,
    /// The encrypted header's BLAKE2s-128 MAC did not match after a successful imprint match.
    #[error("header checksum mismatch (tampering or corruption)")]
    HeaderChecksumMismatch,
    /// The decrypted body's CRC-32 did not match the header's recorded checksum.
    #[error("body checksum mismatch (tampering or corruption)")]
    BodyChecksumMismatch,
    /// Two distinct codename keys produced an identical imprint.
    #[error("hash collision: two distinct codenames produced the same imprint")]
    HashCollision,
    /// The monotonic data-version counter would reach the FAKE sentinel.
    #[error("data version exhausted; rotate the container")]
    VersionExhausted,
    /// Codename exceeds CODENAME_LENGTH - 1 printable bytes.
    #[error("codename too long (max {max} bytes)", max = crate::codec::CODENAME_LENGTH - 1)]
    CodenameTooLong,
    /// Codename contains a NUL byte.
    #[error("codename must not contain a NUL byte")]
    CodenameHasNul,
    /// Codename contains non-ASCII bytes.
    #[error("codename must be ASCII")]
    CodenameNotAscii,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
