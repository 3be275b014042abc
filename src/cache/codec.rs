use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{Read, Write};

use crate::infrastructure::error::Result;

/// Values a cache can hold: cloneable, shareable across tasks and convertible
/// to bytes for compression and tier-2 storage.
///
/// Every serde type gets this through the blanket impl below. Values are
/// written as MessagePack with field names, so self-describing types
/// (`serde_json::Value`, untagged or flattened enums) decode again.
pub trait CacheValue: Clone + Send + Sync + 'static {
    fn encode(&self) -> Result<Vec<u8>>;
    fn decode(bytes: &[u8]) -> Result<Self>;
}

impl<T> CacheValue for T
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    fn encode(&self) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::with_capacity(data.len() * 2);
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

/// Compress `encoded` only when it is larger than `threshold` bytes and the
/// result is at most `max_ratio` of the original size.
pub fn compress_if_worthwhile(
    encoded: &[u8],
    threshold: usize,
    max_ratio: f64,
) -> Result<Option<Vec<u8>>> {
    if encoded.len() <= threshold {
        return Ok(None);
    }

    let compressed = compress(encoded)?;
    if compressed.len() as f64 <= encoded.len() as f64 * max_ratio {
        Ok(Some(compressed))
    } else {
        Ok(None)
    }
}

/// Tier-2 representation of already encoded bytes
pub fn pack_remote(encoded: &[u8], compression: bool) -> Result<Vec<u8>> {
    if compression {
        compress(encoded)
    } else {
        Ok(encoded.to_vec())
    }
}

pub fn encode_remote<V: CacheValue>(value: &V, compression: bool) -> Result<Vec<u8>> {
    pack_remote(&value.encode()?, compression)
}

pub fn decode_remote<V: CacheValue>(bytes: &[u8], compression: bool) -> Result<V> {
    if compression {
        V::decode(&decompress(bytes)?)
    } else {
        V::decode(bytes)
    }
}
