//! road.csr format - CSR road graph with node arrays
//!
//! Format (little-endian):
//!
//! Header (64 bytes):
//!   magic:        u32 = 0x48584353  // "HXCS"
//!   version:      u16 = 1
//!   reserved:     u16 = 0
//!   n_nodes:      u32
//!   n_edges:      u64
//!   created_unix: u64
//!   fingerprint:  [32]u8  // SHA-256 over the arrays
//!   padding:      [4]u8
//!
//! Body:
//!   i64 original_id[n_nodes]
//!   u64 indptr[n_nodes + 1]
//!   u32 indices[n_edges]
//!   u16 weights[n_edges]
//!   f32 lat[n_nodes]
//!   f32 lon[n_nodes]
//!
//! Footer (16 bytes):
//!   body_crc64:   u64
//!   file_crc64:   u64  // header + body

use hexreach_common::{Error, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::crc::{self, FooterDigest};
use super::temp_path;
use crate::graph::{CsrGraph, RoadGraph};

const MAGIC: u32 = 0x48584353; // "HXCS"
const VERSION: u16 = 1;
const HEADER_SIZE: usize = 64;
const FOOTER_SIZE: usize = 16;

/// Header fields of a road.csr file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrHeader {
    pub n_nodes: u32,
    pub n_edges: u64,
    pub created_unix: u64,
    pub fingerprint: [u8; 32],
}

pub struct CsrFile;

impl CsrFile {
    /// Write a road graph to `path`
    pub fn write<P: AsRef<Path>>(path: P, graph: &RoadGraph) -> Result<CsrHeader> {
        let path = path.as_ref();
        let n_nodes = u32::try_from(graph.n_nodes())
            .map_err(|_| Error::Overflow(format!("{} nodes exceed u32", graph.n_nodes())))?;
        let header = CsrHeader {
            n_nodes,
            n_edges: graph.csr.n_edges() as u64,
            created_unix: chrono::Utc::now().timestamp().max(0) as u64,
            fingerprint: graph.fingerprint_bytes(),
        };

        let mut header_bytes = Vec::with_capacity(HEADER_SIZE);
        header_bytes.extend_from_slice(&MAGIC.to_le_bytes());
        header_bytes.extend_from_slice(&VERSION.to_le_bytes());
        header_bytes.extend_from_slice(&0u16.to_le_bytes());
        header_bytes.extend_from_slice(&header.n_nodes.to_le_bytes());
        header_bytes.extend_from_slice(&header.n_edges.to_le_bytes());
        header_bytes.extend_from_slice(&header.created_unix.to_le_bytes());
        header_bytes.extend_from_slice(&header.fingerprint);
        header_bytes.extend_from_slice(&[0u8; 4]);
        debug_assert_eq!(header_bytes.len(), HEADER_SIZE);

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = temp_path(path);
        let written = write_body(&tmp, &header_bytes, graph).and_then(|()| {
            std::fs::rename(&tmp, path)?;
            Ok(())
        });
        if let Err(e) = written {
            let _ = std::fs::remove_file(&tmp);
            return Err(e);
        }

        tracing::debug!(
            path = %path.display(),
            nodes = header.n_nodes,
            edges = header.n_edges,
            "wrote road.csr"
        );

        Ok(header)
    }

    /// Read and verify a road.csr file
    pub fn read<P: AsRef<Path>>(path: P) -> Result<RoadGraph> {
        let path = path.as_ref();
        let bytes = read_existing(path)?;
        let header = parse_header(path, &bytes)?;

        let n = header.n_nodes as usize;
        let m = usize::try_from(header.n_edges)
            .map_err(|_| format_err(path, "edge count exceeds address space"))?;
        let (body_len, expected) =
            body_size(n, m).ok_or_else(|| format_err(path, "size overflow"))?;
        if bytes.len() != expected {
            return Err(format_err(
                path,
                &format!("size mismatch: expected {expected} bytes, got {}", bytes.len()),
            ));
        }

        let body = &bytes[HEADER_SIZE..HEADER_SIZE + body_len];
        let footer = &bytes[HEADER_SIZE + body_len..];
        let body_crc = u64::from_le_bytes(le_array(&footer[0..8]));
        let file_crc = u64::from_le_bytes(le_array(&footer[8..16]));

        if let Some(reason) = crc::verify(&bytes[..HEADER_SIZE], body, (body_crc, file_crc)) {
            return Err(format_err(path, reason));
        }

        let (id_bytes, rest) = body.split_at(n * 8);
        let (indptr_bytes, rest) = rest.split_at((n + 1) * 8);
        let (indices_bytes, rest) = rest.split_at(m * 4);
        let (weight_bytes, rest) = rest.split_at(m * 2);
        let (lat_bytes, lon_bytes) = rest.split_at(n * 4);

        let original_id: Vec<i64> = id_bytes
            .chunks_exact(8)
            .map(|c| i64::from_le_bytes(le_array(c)))
            .collect();
        let indptr: Vec<u64> = indptr_bytes
            .chunks_exact(8)
            .map(|c| u64::from_le_bytes(le_array(c)))
            .collect();
        let indices: Vec<u32> = indices_bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes(le_array(c)))
            .collect();
        let weights: Vec<u16> = weight_bytes
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes(le_array(c)))
            .collect();
        let lat: Vec<f32> = lat_bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes(le_array(c)))
            .collect();
        let lon: Vec<f32> = lon_bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes(le_array(c)))
            .collect();

        let csr = CsrGraph {
            indptr,
            indices,
            weights,
        };
        csr.validate()
            .map_err(|e| format_err(path, &format!("invalid CSR arrays: {e}")))?;

        let graph = RoadGraph::from_parts(csr, original_id, lat, lon)?;
        if graph.fingerprint_bytes() != header.fingerprint {
            return Err(format_err(path, "fingerprint does not match contents"));
        }
        Ok(graph)
    }

    /// Read only the header (cheap inspection)
    pub fn read_header<P: AsRef<Path>>(path: P) -> Result<CsrHeader> {
        use std::io::Read;

        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::MissingFile(path.to_path_buf()));
        }
        let mut buf = vec![0u8; HEADER_SIZE];
        File::open(path)?.read_exact(&mut buf)?;
        parse_header(path, &buf)
    }
}

/// Stream header, body sections and CRC footer to `path`
fn write_body(path: &Path, header_bytes: &[u8], graph: &RoadGraph) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    let mut digest = FooterDigest::new();

    writer.write_all(header_bytes)?;
    digest.header(header_bytes);

    let mut emit = |bytes: &[u8]| -> std::io::Result<()> {
        writer.write_all(bytes)?;
        digest.body(bytes);
        Ok(())
    };

    for &id in &graph.original_id {
        emit(&id.to_le_bytes())?;
    }
    for &off in &graph.csr.indptr {
        emit(&off.to_le_bytes())?;
    }
    for &head in &graph.csr.indices {
        emit(&head.to_le_bytes())?;
    }
    for &w in &graph.csr.weights {
        emit(&w.to_le_bytes())?;
    }
    for &lat in &graph.lat {
        emit(&lat.to_le_bytes())?;
    }
    for &lon in &graph.lon {
        emit(&lon.to_le_bytes())?;
    }

    let (body_crc, file_crc) = digest.finish();
    writer.write_all(&body_crc.to_le_bytes())?;
    writer.write_all(&file_crc.to_le_bytes())?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    Ok(())
}

/// `(body_len, file_len)` for `n` nodes and `m` edges, `None` on overflow
fn body_size(n: usize, m: usize) -> Option<(usize, usize)> {
    // original_id i64, indptr u64, lat f32, lon f32
    let node_bytes = n.checked_mul(8 + 8 + 4 + 4)?;
    // indices u32, weights u16
    let edge_bytes = m.checked_mul(4 + 2)?;
    let body_len = node_bytes.checked_add(8)?.checked_add(edge_bytes)?;
    let file_len = body_len.checked_add(HEADER_SIZE + FOOTER_SIZE)?;
    Some((body_len, file_len))
}

fn read_existing(path: &Path) -> Result<Vec<u8>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(Error::MissingFile(path.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}

fn parse_header(path: &Path, bytes: &[u8]) -> Result<CsrHeader> {
    if bytes.len() < HEADER_SIZE {
        return Err(format_err(path, "truncated header"));
    }
    let magic = u32::from_le_bytes(le_array(&bytes[0..4]));
    if magic != MAGIC {
        return Err(format_err(
            path,
            &format!("invalid magic: expected 0x{MAGIC:08X}, got 0x{magic:08X}"),
        ));
    }
    let version = u16::from_le_bytes(le_array(&bytes[4..6]));
    if version != VERSION {
        return Err(format_err(path, &format!("unsupported version {version}")));
    }
    let mut fingerprint = [0u8; 32];
    fingerprint.copy_from_slice(&bytes[28..60]);
    Ok(CsrHeader {
        n_nodes: u32::from_le_bytes(le_array(&bytes[8..12])),
        n_edges: u64::from_le_bytes(le_array(&bytes[12..20])),
        created_unix: u64::from_le_bytes(le_array(&bytes[20..28])),
        fingerprint,
    })
}

/// Copy a slice of known length into a fixed array
fn le_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    out
}

fn format_err(path: &Path, reason: &str) -> Error {
    Error::Format {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}
