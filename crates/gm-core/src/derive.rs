//! Key derivation: (namespace, coordinate) → Ed25519 public key.
//!
//! Pipeline per cell:
//! 1. namespace (or `"{namespace}/T+{second}s"`) → 24-word phrase → master seed
//! 2. HMAC-SHA-512(key = DOMAIN_LABEL, master || row || column)[..32] → child seed
//! 3. Ed25519 keypair from the child seed; the public key is base64-encoded.
//!
//! Nothing here reads clocks, randomness or global state. Two clients that
//! agree on the namespace string agree on every key in every grid.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use ed25519_dalek::SigningKey;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha512;

use crate::constants::{DOMAIN_LABEL, MAX_COORDINATE};
use crate::error::{Axis, CoreError, Result};
use crate::mnemonic::{MasterSeed, mnemonic_to_seed, passphrase_to_mnemonic};

type HmacSha512 = Hmac<Sha512>;

/// One addressable cell of the annotation space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Coordinate {
    pub row: u8,
    pub column: u8,
    pub second: u64,
}

impl Coordinate {
    pub fn new(row: u32, column: u32, second: u64) -> Result<Self> {
        Ok(Self {
            row: coordinate_byte(Axis::Row, row)?,
            column: coordinate_byte(Axis::Column, column)?,
            second,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DerivedKeypair {
    /// Human-readable derivation path, `m/{row}/{column}`.
    pub path: String,
    /// Base64 of the 32-byte Ed25519 public key.
    pub public_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GridCell {
    pub row: u32,
    pub column: u32,
    pub public_key: String,
}

/// Reject empty or whitespace-only namespaces.
pub fn validate_namespace(namespace: &str) -> Result<&str> {
    if namespace.trim().is_empty() {
        return Err(CoreError::InvalidNamespace);
    }
    Ok(namespace)
}

fn coordinate_byte(axis: Axis, value: u32) -> Result<u8> {
    if value > MAX_COORDINATE {
        return Err(CoreError::CoordinateOutOfRange { axis, value });
    }
    Ok(value as u8)
}

/// A grid needs at least one cell and its last index must still fit a byte.
pub fn validate_grid_shape(rows: u32, columns: u32) -> Result<()> {
    if rows == 0 || columns == 0 {
        return Err(CoreError::InvalidGridShape { rows, columns });
    }
    coordinate_byte(Axis::Row, rows - 1)?;
    coordinate_byte(Axis::Column, columns - 1)?;
    Ok(())
}

/// The passphrase used for the grid of one specific second.
pub fn time_scoped_namespace(namespace: &str, second: u64) -> String {
    format!("{namespace}/T+{second}s")
}

/// First 32 bytes of HMAC-SHA-512(DOMAIN_LABEL, master || row || column).
pub fn derive_child_seed(master: &MasterSeed, row: u8, column: u8) -> [u8; 32] {
    let mut mac =
        HmacSha512::new_from_slice(DOMAIN_LABEL).expect("HMAC accepts keys of any length");
    mac.update(master.as_bytes());
    mac.update(&[row, column]);
    let digest = mac.finalize().into_bytes();

    let mut child = [0u8; 32];
    child.copy_from_slice(&digest[..32]);
    child
}

/// Base64 Ed25519 public key for a 32-byte seed. No randomness involved.
pub fn public_key_from_seed(seed: &[u8; 32]) -> String {
    let signing = SigningKey::from_bytes(seed);
    BASE64.encode(signing.verifying_key().to_bytes())
}

fn keypair_from_master(master: &MasterSeed, row: u8, column: u8) -> DerivedKeypair {
    let child = derive_child_seed(master, row, column);
    DerivedKeypair {
        path: format!("m/{row}/{column}"),
        public_key: public_key_from_seed(&child),
    }
}

/// Derive the keypair at (row, column) under a recovery phrase.
pub fn derive_keypair(phrase: &str, row: u32, column: u32) -> Result<DerivedKeypair> {
    let row = coordinate_byte(Axis::Row, row)?;
    let column = coordinate_byte(Axis::Column, column)?;
    let master = mnemonic_to_seed(phrase)?;
    Ok(keypair_from_master(&master, row, column))
}

/// The namespace's base identity: cell (0, 0) of the un-timed grid. This is
/// the key under which the namespace's tag graph is requested.
pub fn derive_namespace_identity(namespace: &str) -> Result<DerivedKeypair> {
    let phrase = passphrase_to_mnemonic(validate_namespace(namespace)?)?;
    derive_keypair(&phrase, 0, 0)
}

fn grid_for_passphrase(passphrase: &str, rows: u32, columns: u32) -> Result<Vec<GridCell>> {
    validate_grid_shape(rows, columns)?;
    let phrase = passphrase_to_mnemonic(passphrase)?;
    let master = mnemonic_to_seed(&phrase)?;

    let mut cells = Vec::with_capacity((rows * columns) as usize);
    for row in 0..rows {
        for column in 0..columns {
            let keypair = keypair_from_master(&master, row as u8, column as u8);
            cells.push(GridCell {
                row,
                column,
                public_key: keypair.public_key,
            });
        }
    }
    Ok(cells)
}

/// Row-major keys for every cell of `[0, rows) × [0, columns)`.
pub fn derive_grid(namespace: &str, rows: u32, columns: u32) -> Result<Vec<GridCell>> {
    grid_for_passphrase(validate_namespace(namespace)?, rows, columns)
}

/// Same as [`derive_grid`] but scoped to one second of the video.
pub fn derive_time_scoped_grid(
    namespace: &str,
    second: u64,
    rows: u32,
    columns: u32,
) -> Result<Vec<GridCell>> {
    let scoped = time_scoped_namespace(validate_namespace(namespace)?, second);
    grid_for_passphrase(&scoped, rows, columns)
}

/// Public key of a single coordinate.
pub fn derive_key(namespace: &str, coordinate: Coordinate) -> Result<String> {
    let scoped = time_scoped_namespace(validate_namespace(namespace)?, coordinate.second);
    let phrase = passphrase_to_mnemonic(&scoped)?;
    let master = mnemonic_to_seed(&phrase)?;
    Ok(keypair_from_master(&master, coordinate.row, coordinate.column).public_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const NS_IDENTITY: &str = "9AaqdWRNHBNB+p6c2seta1Q9W8P5Sirt/0/64/PEwTU=";

    #[test]
    fn test_child_seed_vector() {
        let phrase = passphrase_to_mnemonic("ns").unwrap();
        let master = mnemonic_to_seed(&phrase).unwrap();
        let child = derive_child_seed(&master, 0, 0);
        let hex: String = child.iter().map(|b| format!("{b:02x}")).collect();
        assert_eq!(
            hex,
            "ac74ad84653146e46ae260ca67cdfd3aac6e1c122bd4c286f97eedb8767e9328"
        );
    }

    #[test]
    fn test_namespace_identity_vector() {
        let id = derive_namespace_identity("ns").unwrap();
        assert_eq!(id.path, "m/0/0");
        assert_eq!(id.public_key, NS_IDENTITY);
    }

    #[test]
    fn test_time_scoped_vectors() {
        let cases = [
            (3, 2, 5, "XSMW5BMZ/PgztdZK5sBOHpZq6OgBeW81CLUW9EdXrDo="),
            (11, 9, 1, "TO1s4odfB0EAaKwex5JFkEzWJrJ8a595BUGnIRiDGcI="),
            (0, 0, 0, "G8iveC1xYd/sevrXHd+/O/hgXkCXa9+pDRmH2+U145c="),
            (0, 15, 8, "xYIO3dDYI/lSZweIBumWLMw9jK02mLpLvJEvwlhnJZ0="),
            (1, 0, 0, "4LxbaJ+IVFns+ppbBIOJyCVFKdgJLXYVW3OOjd6LExU="),
        ];
        for (second, row, column, expected) in cases {
            let key = derive_key("ns", Coordinate::new(row, column, second).unwrap()).unwrap();
            assert_eq!(key, expected, "second={second} row={row} column={column}");
        }
    }

    #[test]
    fn test_grid_matches_single_key_derivation() {
        let grid = derive_time_scoped_grid("ns", 3, 16, 9).unwrap();
        let cell = grid.iter().find(|c| c.row == 2 && c.column == 5).unwrap();
        assert_eq!(cell.public_key, "XSMW5BMZ/PgztdZK5sBOHpZq6OgBeW81CLUW9EdXrDo=");
    }

    #[test]
    fn test_grid_is_row_major() {
        let grid = derive_grid("ns", 2, 3).unwrap();
        let order: Vec<(u32, u32)> = grid.iter().map(|c| (c.row, c.column)).collect();
        assert_eq!(order, vec![(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (1, 2)]);
        assert_eq!(grid[0].public_key, NS_IDENTITY);
    }

    #[test]
    fn test_default_grid_keys_distinct() {
        let grid = derive_time_scoped_grid("ns", 0, 16, 9).unwrap();
        let keys: HashSet<&str> = grid.iter().map(|c| c.public_key.as_str()).collect();
        assert_eq!(keys.len(), 144);
    }

    #[test]
    fn test_repeated_calls_identical() {
        let a = derive_time_scoped_grid("shared-track", 7, 4, 4).unwrap();
        let b = derive_time_scoped_grid("shared-track", 7, 4, 4).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_seconds_differ() {
        let a = derive_time_scoped_grid("ns", 0, 1, 1).unwrap();
        let b = derive_time_scoped_grid("ns", 1, 1, 1).unwrap();
        assert_ne!(a[0].public_key, b[0].public_key);
    }

    #[test]
    fn test_blank_namespace_rejected() {
        assert!(matches!(
            derive_namespace_identity("   "),
            Err(CoreError::InvalidNamespace)
        ));
        assert!(matches!(
            derive_grid("", 16, 9),
            Err(CoreError::InvalidNamespace)
        ));
    }

    #[test]
    fn test_coordinate_out_of_range() {
        let phrase = passphrase_to_mnemonic("ns").unwrap();
        assert!(matches!(
            derive_keypair(&phrase, 256, 0),
            Err(CoreError::CoordinateOutOfRange { axis: Axis::Row, value: 256 })
        ));
        assert!(matches!(
            derive_keypair(&phrase, 0, 300),
            Err(CoreError::CoordinateOutOfRange { axis: Axis::Column, value: 300 })
        ));
        assert!(derive_keypair(&phrase, 255, 255).is_ok());
    }

    #[test]
    fn test_grid_shape_bounds() {
        assert!(validate_grid_shape(256, 256).is_ok());
        assert!(matches!(
            validate_grid_shape(257, 1),
            Err(CoreError::CoordinateOutOfRange { axis: Axis::Row, value: 256 })
        ));
        assert!(matches!(
            validate_grid_shape(0, 9),
            Err(CoreError::InvalidGridShape { .. })
        ));
    }

    #[test]
    fn test_keypair_path_format() {
        let phrase = passphrase_to_mnemonic("ns").unwrap();
        let kp = derive_keypair(&phrase, 12, 7).unwrap();
        assert_eq!(kp.path, "m/12/7");
    }

    #[test]
    fn test_time_scoped_namespace_format() {
        assert_eq!(time_scoped_namespace("ns", 42), "ns/T+42s");
    }
}
