//! FAISS flat index file format.
//!
//! Layout (all little-endian):
//!
//! ```text
//! fourcc      u32   "IxFI" (inner product) | "IxF2" (L2)
//! d           i32
//! ntotal      i64
//! dummy       i64   (1 << 20)
//! dummy       i64   (1 << 20)
//! is_trained  u8
//! metric_type i32
//! metric_arg  f32   only when metric_type > 1
//! count       u64   number of floats that follow (ntotal * d)
//! codes       f32 * count
//! ```

use std::io::{Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{LensError, Result};
use crate::index::flat::{FlatIndex, Metric};

const FOURCC_FLAT_IP: [u8; 4] = *b"IxFI";
const FOURCC_FLAT_L2: [u8; 4] = *b"IxF2";
const HEADER_DUMMY: i64 = 1 << 20;
const METRIC_INNER_PRODUCT: i32 = 0;
const METRIC_L2: i32 = 1;

/// Parse a serialized FAISS `IndexFlatIP` / `IndexFlatL2`.
pub fn read_flat_index(bytes: &[u8]) -> Result<FlatIndex> {
    let mut cursor = Cursor::new(bytes);

    let mut fourcc = [0u8; 4];
    cursor
        .read_exact(&mut fourcc)
        .map_err(|e| LensError::index(format!("truncated index header: {e}")))?;
    let metric = match fourcc {
        FOURCC_FLAT_IP => Metric::InnerProduct,
        FOURCC_FLAT_L2 => Metric::L2,
        other => {
            return Err(LensError::index(format!(
                "unsupported index type '{}'",
                String::from_utf8_lossy(&other)
            )));
        }
    };

    let header = read_header(&mut cursor)
        .map_err(|e| LensError::index(format!("truncated index header: {e}")))?;

    let declared_metric = match header.metric_type {
        METRIC_INNER_PRODUCT => Metric::InnerProduct,
        METRIC_L2 => Metric::L2,
        other => {
            return Err(LensError::index(format!("unsupported metric type {other}")));
        }
    };
    if declared_metric != metric {
        return Err(LensError::index(format!(
            "metric type {} does not match index type '{}'",
            header.metric_type,
            String::from_utf8_lossy(&fourcc)
        )));
    }
    if header.dimension <= 0 {
        return Err(LensError::index(format!(
            "invalid dimension {}",
            header.dimension
        )));
    }
    if header.ntotal < 0 {
        return Err(LensError::index(format!(
            "invalid vector count {}",
            header.ntotal
        )));
    }

    let dimension = header.dimension as usize;
    let ntotal = header.ntotal as usize;
    let count = cursor
        .read_u64::<LittleEndian>()
        .map_err(|e| LensError::index(format!("missing vector payload: {e}")))?
        as usize;
    let expected = ntotal
        .checked_mul(dimension)
        .ok_or_else(|| LensError::index("vector count overflows"))?;
    if count != expected {
        return Err(LensError::index(format!(
            "payload holds {count} floats, header declares {ntotal} x {dimension}"
        )));
    }

    let remaining = bytes.len() - cursor.position() as usize;
    let needed = count.saturating_mul(4);
    if remaining < needed {
        return Err(LensError::index(format!(
            "payload truncated: need {needed} bytes, have {remaining}"
        )));
    }

    let mut data = vec![0.0f32; count];
    cursor
        .read_f32_into::<LittleEndian>(&mut data)
        .map_err(|e| LensError::index(format!("failed to read vectors: {e}")))?;

    FlatIndex::from_raw(dimension, metric, data)
}

/// Serialize an inner product index in the FAISS `IndexFlatIP` format.
pub fn write_flat_index<W: Write>(index: &FlatIndex, writer: &mut W) -> Result<()> {
    if index.metric() != Metric::InnerProduct {
        return Err(LensError::index("only inner product indexes can be written"));
    }
    writer.write_all(&FOURCC_FLAT_IP)?;
    writer.write_i32::<LittleEndian>(index.dimension() as i32)?;
    writer.write_i64::<LittleEndian>(index.len() as i64)?;
    writer.write_i64::<LittleEndian>(HEADER_DUMMY)?;
    writer.write_i64::<LittleEndian>(HEADER_DUMMY)?;
    writer.write_u8(1)?;
    writer.write_i32::<LittleEndian>(METRIC_INNER_PRODUCT)?;
    writer.write_u64::<LittleEndian>(index.as_raw().len() as u64)?;
    for value in index.as_raw() {
        writer.write_f32::<LittleEndian>(*value)?;
    }
    Ok(())
}

/// Serialize an index into a fresh buffer.
pub fn flat_index_to_bytes(index: &FlatIndex) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(48 + index.as_raw().len() * 4);
    write_flat_index(index, &mut buf)?;
    Ok(buf)
}

struct Header {
    dimension: i32,
    ntotal: i64,
    metric_type: i32,
}

fn read_header(cursor: &mut Cursor<&[u8]>) -> std::io::Result<Header> {
    let dimension = cursor.read_i32::<LittleEndian>()?;
    let ntotal = cursor.read_i64::<LittleEndian>()?;
    let _dummy = cursor.read_i64::<LittleEndian>()?;
    let _dummy = cursor.read_i64::<LittleEndian>()?;
    let _is_trained = cursor.read_u8()?;
    let metric_type = cursor.read_i32::<LittleEndian>()?;
    if metric_type > 1 {
        let _metric_arg = cursor.read_f32::<LittleEndian>()?;
    }
    Ok(Header {
        dimension,
        ntotal,
        metric_type,
    })
}
