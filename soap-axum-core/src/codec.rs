//! Compression codecs and the envelope compression extension.
//!
//! - [`GzipCodec`]: Gzip compression (requires `compression-gzip` feature)
//! - [`DeflateCodec`]: zlib compression (requires `compression-deflate` feature)
//!
//! A codec becomes part of a call through [`compression`], which wraps it in
//! a [`SoapExtension`] that compresses the serialized envelope on the way
//! out and decompresses received bytes before parsing. Both ends of the
//! exchange must install the same codec.

use bytes::Bytes;
use std::io;
use std::sync::Arc;

#[cfg(any(feature = "compression-gzip", feature = "compression-deflate"))]
use std::io::{Read, Write};

#[cfg(feature = "compression-gzip")]
use flate2::Compression as GzipLevel;
#[cfg(feature = "compression-gzip")]
use flate2::read::GzDecoder;
#[cfg(feature = "compression-gzip")]
use flate2::write::GzEncoder;

use crate::extension::{ExtensionFactory, SoapExtension};
use crate::fault::Fault;

/// A byte-level compression algorithm.
///
/// # Example
///
/// ```ignore
/// use soap_axum_core::Codec;
/// use bytes::Bytes;
/// use std::io;
///
/// struct Lz4Codec;
///
/// impl Codec for Lz4Codec {
///     fn name(&self) -> &'static str { "lz4" }
///
///     fn compress(&self, data: &[u8]) -> io::Result<Bytes> {
///         // ... lz4 compression
///     }
///
///     fn decompress(&self, data: &[u8]) -> io::Result<Bytes> {
///         // ... lz4 decompression
///     }
/// }
/// ```
pub trait Codec: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn compress(&self, data: &[u8]) -> io::Result<Bytes>;

    fn decompress(&self, data: &[u8]) -> io::Result<Bytes>;

    /// Decompress, failing once the output would exceed `limit` bytes.
    fn decompress_limited(&self, data: &[u8], limit: usize) -> io::Result<Bytes> {
        let decompressed = self.decompress(data)?;
        if decompressed.len() > limit {
            return Err(too_large(limit));
        }
        Ok(decompressed)
    }
}

fn too_large(limit: usize) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("decompressed size exceeds {limit} bytes"),
    )
}

/// Read at most `limit` bytes of output; one more byte is an error.
#[cfg(any(feature = "compression-gzip", feature = "compression-deflate"))]
fn read_limited(reader: impl Read, limit: usize) -> io::Result<Bytes> {
    let mut decompressed = Vec::new();
    reader
        .take((limit as u64).saturating_add(1))
        .read_to_end(&mut decompressed)?;
    if decompressed.len() > limit {
        return Err(too_large(limit));
    }
    Ok(Bytes::from(decompressed))
}

/// A boxed codec for type-erased storage.
#[derive(Clone)]
pub struct BoxedCodec(Arc<dyn Codec>);

impl BoxedCodec {
    pub fn new<C: Codec>(codec: C) -> Self {
        BoxedCodec(Arc::new(codec))
    }

    pub fn name(&self) -> &'static str {
        self.0.name()
    }

    pub fn compress(&self, data: &[u8]) -> io::Result<Bytes> {
        self.0.compress(data)
    }

    pub fn decompress(&self, data: &[u8]) -> io::Result<Bytes> {
        self.0.decompress(data)
    }

    pub fn decompress_limited(&self, data: &[u8], limit: usize) -> io::Result<Bytes> {
        self.0.decompress_limited(data, limit)
    }
}

impl std::fmt::Debug for BoxedCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("BoxedCodec").field(&self.name()).finish()
    }
}

/// Gzip codec using flate2.
#[cfg(feature = "compression-gzip")]
#[derive(Debug, Clone, Copy)]
pub struct GzipCodec {
    /// Compression level (0-9). Default is 6.
    pub level: u32,
}

#[cfg(feature = "compression-gzip")]
impl Default for GzipCodec {
    fn default() -> Self {
        Self { level: 6 }
    }
}

#[cfg(feature = "compression-gzip")]
impl GzipCodec {
    pub fn with_level(level: u32) -> Self {
        Self {
            level: level.min(9),
        }
    }
}

#[cfg(feature = "compression-gzip")]
impl Codec for GzipCodec {
    fn name(&self) -> &'static str {
        "gzip"
    }

    fn compress(&self, data: &[u8]) -> io::Result<Bytes> {
        let mut encoder = GzEncoder::new(Vec::new(), GzipLevel::new(self.level));
        encoder.write_all(data)?;
        Ok(Bytes::from(encoder.finish()?))
    }

    fn decompress(&self, data: &[u8]) -> io::Result<Bytes> {
        let mut decoder = GzDecoder::new(data);
        let mut decompressed = Vec::new();
        decoder.read_to_end(&mut decompressed)?;
        Ok(Bytes::from(decompressed))
    }

    fn decompress_limited(&self, data: &[u8], limit: usize) -> io::Result<Bytes> {
        read_limited(GzDecoder::new(data), limit)
    }
}

/// Passes data through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityCodec;

impl Codec for IdentityCodec {
    fn name(&self) -> &'static str {
        "identity"
    }

    fn compress(&self, data: &[u8]) -> io::Result<Bytes> {
        Ok(Bytes::copy_from_slice(data))
    }

    fn decompress(&self, data: &[u8]) -> io::Result<Bytes> {
        Ok(Bytes::copy_from_slice(data))
    }
}

/// Deflate codec using flate2 (zlib format).
#[cfg(feature = "compression-deflate")]
#[derive(Debug, Clone, Copy)]
pub struct DeflateCodec {
    /// Compression level (0-9). Default is 6.
    pub level: u32,
}

#[cfg(feature = "compression-deflate")]
impl Default for DeflateCodec {
    fn default() -> Self {
        Self { level: 6 }
    }
}

#[cfg(feature = "compression-deflate")]
impl DeflateCodec {
    pub fn with_level(level: u32) -> Self {
        Self {
            level: level.min(9),
        }
    }
}

#[cfg(feature = "compression-deflate")]
impl Codec for DeflateCodec {
    fn name(&self) -> &'static str {
        "deflate"
    }

    fn compress(&self, data: &[u8]) -> io::Result<Bytes> {
        use flate2::write::ZlibEncoder;
        let mut encoder = ZlibEncoder::new(Vec::new(), flate2::Compression::new(self.level));
        encoder.write_all(data)?;
        Ok(Bytes::from(encoder.finish()?))
    }

    fn decompress(&self, data: &[u8]) -> io::Result<Bytes> {
        use flate2::read::ZlibDecoder;
        let mut decoder = ZlibDecoder::new(data);
        let mut decompressed = Vec::new();
        decoder.read_to_end(&mut decompressed)?;
        Ok(Bytes::from(decompressed))
    }

    fn decompress_limited(&self, data: &[u8], limit: usize) -> io::Result<Bytes> {
        read_limited(flate2::read::ZlibDecoder::new(data), limit)
    }
}

/// Compresses outgoing envelopes and decompresses incoming ones.
#[derive(Debug, Clone)]
pub struct CompressionExtension {
    codec: BoxedCodec,
    max_decoded_bytes: Option<usize>,
}

impl CompressionExtension {
    pub fn new(codec: BoxedCodec) -> Self {
        Self {
            codec,
            max_decoded_bytes: None,
        }
    }

    /// Stop inflating incoming payloads past `max` bytes.
    pub fn max_decoded_bytes(mut self, max: usize) -> Self {
        self.max_decoded_bytes = Some(max);
        self
    }
}

impl SoapExtension for CompressionExtension {
    fn encode_stream(&mut self, payload: Bytes) -> Result<Bytes, Fault> {
        self.codec.compress(&payload).map_err(|e| {
            Fault::server(format!("{} compression failed: {e}", self.codec.name()))
                .with_source(Arc::new(e))
        })
    }

    fn decode_stream(&mut self, payload: Bytes) -> Result<Bytes, Fault> {
        let decoded = match self.max_decoded_bytes {
            Some(max) => self.codec.decompress_limited(&payload, max),
            None => self.codec.decompress(&payload),
        };
        decoded.map_err(|e| {
            Fault::client(format!("{} decompression failed: {e}", self.codec.name()))
                .with_source(Arc::new(e))
        })
    }
}

/// Factory installing a [`CompressionExtension`] for `codec` on every call.
pub fn compression(codec: BoxedCodec) -> impl ExtensionFactory {
    move || CompressionExtension::new(codec.clone())
}

/// Like [`compression`], refusing payloads that inflate past `max_decoded_bytes`.
pub fn compression_limited(codec: BoxedCodec, max_decoded_bytes: usize) -> impl ExtensionFactory {
    move || CompressionExtension::new(codec.clone()).max_decoded_bytes(max_decoded_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "compression-gzip")]
    #[test]
    fn test_gzip_codec_compress_decompress() {
        let codec = GzipCodec::default();
        assert_eq!(codec.name(), "gzip");

        let original = b"<soap:Envelope><soap:Body/></soap:Envelope>";
        let compressed = codec.compress(original).unwrap();
        assert_ne!(&compressed[..], &original[..]);

        let decompressed = codec.decompress(&compressed).unwrap();
        assert_eq!(&decompressed[..], &original[..]);
    }

    #[cfg(feature = "compression-deflate")]
    #[test]
    fn test_deflate_codec_with_level() {
        let codec = DeflateCodec::with_level(12);
        assert_eq!(codec.level, 9);

        let original = b"<soap:Envelope><soap:Body/></soap:Envelope>";
        let compressed = codec.compress(original).unwrap();
        let decompressed = codec.decompress(&compressed).unwrap();
        assert_eq!(&decompressed[..], &original[..]);
    }

    #[cfg(feature = "compression-gzip")]
    #[test]
    fn test_gzip_decompress_limited_stops_early() {
        let codec = GzipCodec::default();
        let padded = format!("<a>{}</a>", " ".repeat(200 * 1024));
        let compressed = codec.compress(padded.as_bytes()).unwrap();
        assert!(compressed.len() < 2048);

        let err = codec.decompress_limited(&compressed, 1024).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        let exact = codec.decompress_limited(&compressed, padded.len()).unwrap();
        assert_eq!(exact.len(), padded.len());
    }

    #[cfg(feature = "compression-deflate")]
    #[test]
    fn test_deflate_decompress_limited_stops_early() {
        let codec = DeflateCodec::default();
        let compressed = codec.compress(&[b'x'; 4096]).unwrap();
        assert!(codec.decompress_limited(&compressed, 4095).is_err());
        assert!(codec.decompress_limited(&compressed, 4096).is_ok());
    }

    #[test]
    fn test_identity_codec() {
        let codec = IdentityCodec;
        let original = b"Hello, World!";
        let compressed = codec.compress(original).unwrap();
        assert_eq!(&compressed[..], &original[..]);
    }

    /// Reverses bytes; enough to see the extension is applied.
    struct Reverse;

    impl Codec for Reverse {
        fn name(&self) -> &'static str {
            "reverse"
        }

        fn compress(&self, data: &[u8]) -> io::Result<Bytes> {
            Ok(data.iter().rev().copied().collect::<Vec<_>>().into())
        }

        fn decompress(&self, data: &[u8]) -> io::Result<Bytes> {
            if data.first() != Some(&b'>') {
                return Err(io::Error::new(io::ErrorKind::InvalidData, "not reversed xml"));
            }
            self.compress(data)
        }
    }

    #[test]
    fn test_extension_round_trip() {
        let factory = compression(BoxedCodec::new(Reverse));
        let mut sender = factory.create();
        let mut receiver = factory.create();

        let encoded = sender.encode_stream(Bytes::from_static(b"<a/>")).unwrap();
        assert_eq!(&encoded[..], b">/a<");
        let decoded = receiver.decode_stream(encoded).unwrap();
        assert_eq!(&decoded[..], b"<a/>");
    }

    #[test]
    fn test_extension_decode_failure_is_client_fault() {
        let mut extension = CompressionExtension::new(BoxedCodec::new(Reverse));
        let fault = extension
            .decode_stream(Bytes::from_static(b"<a/>"))
            .unwrap_err();
        assert!(fault.is_client());
        assert!(fault.message().contains("reverse decompression failed"));
    }

    #[test]
    fn test_extension_enforces_decoded_limit() {
        let factory = compression_limited(BoxedCodec::new(Reverse), 3);
        let mut extension = factory.create();
        let fault = extension
            .decode_stream(Bytes::from_static(b">/a<"))
            .unwrap_err();
        assert!(fault.is_client());
        assert!(fault.message().contains("exceeds 3 bytes"), "{}", fault.message());

        let mut roomy = CompressionExtension::new(BoxedCodec::new(Reverse)).max_decoded_bytes(4);
        assert_eq!(&roomy.decode_stream(Bytes::from_static(b">/a<")).unwrap()[..], b"<a/>");
    }

    #[test]
    fn test_boxed_codec_debug() {
        let codec = BoxedCodec::new(IdentityCodec);
        assert_eq!(format!("{codec:?}"), "BoxedCodec(\"identity\")");
    }
}
