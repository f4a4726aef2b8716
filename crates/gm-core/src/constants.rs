/// HMAC-SHA-512 key used to separate child-seed derivation from any other
/// use of the master seed. Changing it changes every derived key.
pub const DOMAIN_LABEL: &[u8] = b"ed25519 seed";

/// Largest row or column index addressable by the single-byte encoding.
pub const MAX_COORDINATE: u32 = 255;

/// Grid rows per second of video.
pub const DEFAULT_ROWS: u32 = 16;

/// Grid columns per second of video.
pub const DEFAULT_COLUMNS: u32 = 9;

/// Graph node attribute holding the tagged public key.
pub const PUBKEY_ATTR: &str = "pubkey";

/// Graph node attribute holding the tag text.
pub const MEMO_ATTR: &str = "memo";
