//! Derived identities for shared video annotations.
//!
//! A namespace string deterministically yields a grid of Ed25519 public keys
//! per second of video. Clients never allocate ids: they re-derive the grids
//! and intersect them with the tags a remote store hands back.
//!
//! Zero I/O. Transport lives in `gm-session`.

pub mod annotation;
pub mod constants;
pub mod correlate;
pub mod derive;
pub mod error;
pub mod graph;
pub mod mnemonic;
pub mod tag;

pub use annotation::{AnnotationPoint, AnnotationTrack, cell_center_percent};
pub use constants::{DEFAULT_COLUMNS, DEFAULT_ROWS, DOMAIN_LABEL, MAX_COORDINATE};
pub use correlate::{
    AddressingScheme, Cancellation, Correlation, CorrelationStats, Correlator, Never,
    duration_from_playback,
};
pub use derive::{
    Coordinate, DerivedKeypair, GridCell, derive_child_seed, derive_grid, derive_key,
    derive_keypair, derive_namespace_identity, derive_time_scoped_grid, time_scoped_namespace,
};
pub use error::{Axis, CoreError, Result};
pub use graph::{Attributes, Graph, GraphEdge, GraphNode, decode_graph, decode_nodes};
pub use mnemonic::{MasterSeed, mnemonic_to_seed, passphrase_to_mnemonic};
pub use tag::{ExplicitCoordinate, ExplicitMemoParser, Tag, extract_tags};
