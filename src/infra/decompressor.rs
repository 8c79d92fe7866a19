//! Content-Encoding decoding for response bodies.

use std::io::{self, Read};

/// A single content-coding.
pub trait Decompressor: Send + Sync {
    fn decompress(&self, data: &[u8]) -> io::Result<Vec<u8>>;
}

#[derive(Default)]
pub struct GzipDecompressor;

impl Decompressor for GzipDecompressor {
    fn decompress(&self, data: &[u8]) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        flate2::read::GzDecoder::new(data).read_to_end(&mut out)?;
        Ok(out)
    }
}

/// `deflate` is zlib-wrapped per RFC 9110, but some servers send raw deflate.
#[derive(Default)]
pub struct DeflateDecompressor;

impl Decompressor for DeflateDecompressor {
    fn decompress(&self, data: &[u8]) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        if flate2::read::ZlibDecoder::new(data).read_to_end(&mut out).is_ok() {
            return Ok(out);
        }
        out.clear();
        flate2::read::DeflateDecoder::new(data).read_to_end(&mut out)?;
        Ok(out)
    }
}

#[derive(Default)]
pub struct BrotliDecompressor;

impl Decompressor for BrotliDecompressor {
    fn decompress(&self, data: &[u8]) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        brotli::BrotliDecompress(&mut io::Cursor::new(data), &mut out)?;
        Ok(out)
    }
}

/// Picks a decoder by `Content-Encoding`, applying stacked codings in reverse.
#[derive(Default)]
pub struct MultiDecompressor {
    gzip: GzipDecompressor,
    deflate: DeflateDecompressor,
    brotli: BrotliDecompressor,
}

impl MultiDecompressor {
    pub fn new() -> Self {
        Self::default()
    }

    fn decoder_for(&self, token: &str) -> Option<&dyn Decompressor> {
        match token {
            "gzip" | "x-gzip" => Some(&self.gzip),
            "deflate" => Some(&self.deflate),
            "br" => Some(&self.brotli),
            _ => None,
        }
    }

    /// Unknown or absent codings pass the data through unchanged.
    pub fn decompress(&self, data: &[u8], encoding: Option<&str>) -> io::Result<Vec<u8>> {
        let mut body = data.to_vec();
        let Some(encoding) = encoding else {
            return Ok(body);
        };

        let tokens: Vec<String> = encoding
            .split(',')
            .map(|t| t.trim().to_ascii_lowercase())
            .filter(|t| !t.is_empty())
            .collect();

        for token in tokens.iter().rev() {
            if let Some(decoder) = self.decoder_for(token) {
                body = decoder.decompress(&body)?;
            }
        }
        Ok(body)
    }
}

pub fn decompress_body(body: &[u8], encoding: Option<&str>) -> io::Result<Vec<u8>> {
    MultiDecompressor::new().decompress(body, encoding)
}
