//! Compression extension
//!
//! Decompresses ESP payloads carried with next-header `0x05`. Gateways send
//! these as LZO1X streams; the LZO backend sits behind the `compression`
//! feature and is the default. A zstd backend is available behind the
//! `zstd` feature for peers that agree on it. Without either, every
//! compressed packet is rejected.

use crate::core::{CompressionError, Decompress};

/// Marker every LZO1X stream ends with.
#[cfg(feature = "compression")]
const LZO1X_END_OF_STREAM: [u8; 3] = [0x11, 0x00, 0x00];

/// LZO1X decompressor for compressed ESP payloads.
#[cfg(feature = "compression")]
#[derive(Debug, Clone, Copy, Default)]
pub struct LzoDecompressor;

#[cfg(feature = "compression")]
impl LzoDecompressor {
    /// Create a decompressor.
    pub fn new() -> Self {
        Self
    }
}

#[cfg(feature = "compression")]
impl Decompress for LzoDecompressor {
    fn decompress(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize, CompressionError> {
        // Bytes after the marker would otherwise be ignored
        if !input.ends_with(&LZO1X_END_OF_STREAM) {
            return Err(CompressionError::DecompressionFailed(
                "missing LZO end of stream".to_string(),
            ));
        }

        let decoded = lzokay_native::decompress_all(input, Some(output.len()))
            .map_err(|e| CompressionError::DecompressionFailed(format!("{e:?}")))?;
        if decoded.len() > output.len() {
            return Err(CompressionError::DecompressionFailed(format!(
                "{} bytes do not fit in {}",
                decoded.len(),
                output.len()
            )));
        }

        output[..decoded.len()].copy_from_slice(&decoded);
        Ok(decoded.len())
    }
}

/// zstd decompressor for compressed ESP payloads.
///
/// The decompression context is created on first use and reused for every
/// packet after that.
#[cfg(feature = "zstd")]
#[derive(Default)]
pub struct ZstdDecompressor {
    context: Option<zstd::bulk::Decompressor<'static>>,
}

#[cfg(feature = "zstd")]
impl ZstdDecompressor {
    /// Create a decompressor.
    pub fn new() -> Self {
        Self { context: None }
    }

    fn context(&mut self) -> Result<&mut zstd::bulk::Decompressor<'static>, CompressionError> {
        if self.context.is_none() {
            let context = zstd::bulk::Decompressor::new()
                .map_err(|e| CompressionError::DecompressionFailed(e.to_string()))?;
            self.context = Some(context);
        }
        self.context
            .as_mut()
            .ok_or_else(|| CompressionError::DecompressionFailed("no context".to_string()))
    }
}

#[cfg(feature = "zstd")]
impl Decompress for ZstdDecompressor {
    fn decompress(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize, CompressionError> {
        // zstd rejects trailing bytes after the last frame itself
        self.context()?
            .decompress_to_buffer(input, output)
            .map_err(|e| CompressionError::DecompressionFailed(e.to_string()))
    }
}

#[cfg(feature = "zstd")]
impl std::fmt::Debug for ZstdDecompressor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZstdDecompressor")
            .field("initialized", &self.context.is_some())
            .finish()
    }
}

/// Rejects every compressed payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDecompression;

impl Decompress for NoDecompression {
    fn decompress(&mut self, _input: &[u8], _output: &mut [u8]) -> Result<usize, CompressionError> {
        Err(CompressionError::Unsupported)
    }
}

/// The decompressor a transport starts with: LZO1X when built with the
/// `compression` feature, otherwise [`NoDecompression`].
pub fn default_decompressor() -> Box<dyn Decompress> {
    #[cfg(feature = "compression")]
    {
        Box::new(LzoDecompressor::new())
    }
    #[cfg(not(feature = "compression"))]
    {
        Box::new(NoDecompression)
    }
}
