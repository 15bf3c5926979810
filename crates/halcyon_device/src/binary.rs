//! Opaque binary serialization of device graphs.
//!
//! A device binary is a magic header, a format version, a checksum, and a
//! gzip-compressed bincode payload. Because [`Ident`] handles are only
//! valid within the interner that minted them, the payload carries a string
//! table alongside the graph: on save, every handle in the graph is
//! rewritten to an index into the table; on load, each table entry is
//! re-interned into the caller's interner and the handles are mapped back.
//!
//! The loader for a family's stock devices looks under the directory named
//! by the `FAB_ROOT` environment variable.

use crate::graph::DeviceGraph;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use halcyon_common::{ContentHash, Ident, Interner};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Magic bytes identifying a Halcyon device binary.
const DEVICE_MAGIC: [u8; 4] = *b"HDEV";

/// Bumped whenever the payload layout changes.
const DEVICE_FORMAT_VERSION: u32 = 1;

/// An error loading or saving a device binary.
#[derive(Debug, thiserror::Error)]
pub enum DeviceBinaryError {
    /// Filesystem failure.
    #[error("device binary I/O error at {path}: {source}")]
    Io {
        /// The path being read or written.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },
    /// The file is not a Halcyon device binary.
    #[error("not a device binary (bad magic)")]
    BadMagic,
    /// The file was written by an incompatible version.
    #[error("unsupported device binary format version {0}")]
    BadVersion(u32),
    /// The payload checksum does not match the header.
    #[error("device binary corrupt (checksum mismatch)")]
    Corrupt,
    /// The payload failed to decode.
    #[error("device binary decode error: {0}")]
    Decode(String),
    /// The decoded graph failed structural validation.
    #[error("device graph inconsistent after load: {0}")]
    Inconsistent(#[from] crate::graph::DeviceGraphError),
    /// `FAB_ROOT` is not set but a stock device was requested.
    #[error("FAB_ROOT is not set; cannot locate device data for '{0}'")]
    NoFabRoot(String),
}

#[derive(Serialize, Deserialize)]
struct DevicePayload {
    strings: Vec<String>,
    graph: DeviceGraph,
}

/// Saves `graph` to `path` as an opaque compressed binary.
///
/// `interner` must be the interner the graph's handles belong to.
pub fn save_device(
    graph: &DeviceGraph,
    interner: &Interner,
    path: &Path,
) -> Result<(), DeviceBinaryError> {
    // Build the string table from the handles actually used.
    let mut table_index: HashMap<Ident, u32> = HashMap::new();
    let mut strings: Vec<String> = Vec::new();
    graph.for_each_ident(&mut |ident| {
        table_index.entry(ident).or_insert_with(|| {
            strings.push(interner.resolve(ident).to_string());
            (strings.len() - 1) as u32
        });
    });

    let mut portable = graph.clone();
    portable.visit_idents(&mut |ident| {
        *ident = Ident::from_raw(table_index[ident]);
    });

    let payload = DevicePayload {
        strings,
        graph: portable,
    };
    let raw = bincode::serde::encode_to_vec(&payload, bincode::config::standard())
        .map_err(|e| DeviceBinaryError::Decode(e.to_string()))?;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&raw)
        .and_then(|_| encoder.finish())
        .map_err(|e| DeviceBinaryError::Io {
            path: path.to_path_buf(),
            source: e,
        })
        .and_then(|compressed| {
            let checksum = ContentHash::from_bytes(&compressed);
            let checksum_bytes =
                bincode::serde::encode_to_vec(&checksum, bincode::config::standard())
                    .map_err(|e| DeviceBinaryError::Decode(e.to_string()))?;

            let mut out = Vec::with_capacity(8 + checksum_bytes.len() + compressed.len());
            out.extend_from_slice(&DEVICE_MAGIC);
            out.extend_from_slice(&DEVICE_FORMAT_VERSION.to_le_bytes());
            out.extend_from_slice(&checksum_bytes);
            out.extend_from_slice(&compressed);
            std::fs::write(path, &out).map_err(|e| DeviceBinaryError::Io {
                path: path.to_path_buf(),
                source: e,
            })
        })
}

/// Loads a device binary from `path`, interning its names into `interner`.
///
/// The payload checksum is verified and the graph re-validated before it is
/// returned.
pub fn load_device(path: &Path, interner: &Interner) -> Result<DeviceGraph, DeviceBinaryError> {
    let raw = std::fs::read(path).map_err(|e| DeviceBinaryError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    if raw.len() < 8 || raw[..4] != DEVICE_MAGIC {
        return Err(DeviceBinaryError::BadMagic);
    }
    let version = u32::from_le_bytes(raw[4..8].try_into().expect("4-byte slice"));
    if version != DEVICE_FORMAT_VERSION {
        return Err(DeviceBinaryError::BadVersion(version));
    }

    let (checksum, consumed): (ContentHash, usize) =
        bincode::serde::decode_from_slice(&raw[8..], bincode::config::standard())
            .map_err(|e| DeviceBinaryError::Decode(e.to_string()))?;
    let compressed = &raw[8 + consumed..];
    if ContentHash::from_bytes(compressed) != checksum {
        return Err(DeviceBinaryError::Corrupt);
    }

    let mut decoder = GzDecoder::new(compressed);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| DeviceBinaryError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

    let (payload, _): (DevicePayload, usize) =
        bincode::serde::decode_from_slice(&decompressed, bincode::config::standard())
            .map_err(|e| DeviceBinaryError::Decode(e.to_string()))?;

    let mut graph = payload.graph;
    let handles: Vec<Ident> = payload
        .strings
        .iter()
        .map(|s| interner.intern(s))
        .collect();
    graph.visit_idents(&mut |ident| {
        *ident = handles[ident.as_raw() as usize];
    });
    graph.rebuild_indices();
    graph.validate()?;
    Ok(graph)
}

/// Resolves the path of a stock device binary under `FAB_ROOT`.
///
/// The convention is `$FAB_ROOT/<family>/<device>.hdev`.
pub fn stock_device_path(family: &str, device: &str) -> Result<PathBuf, DeviceBinaryError> {
    let root = std::env::var_os("FAB_ROOT")
        .ok_or_else(|| DeviceBinaryError::NoFabRoot(format!("{family}/{device}")))?;
    Ok(PathBuf::from(root).join(family).join(format!("{device}.hdev")))
}
