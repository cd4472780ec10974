use crate::backup::compress::{Compressor, CompressorBuilder};
use crate::backup::result_error::result::Result;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::io::Write;
use validator::Validate;

static DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// Gzip settings, producing `.tar.gz` archives.
#[skip_serializing_none]
#[derive(Clone, Default, Validate, Serialize, Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct GzipConfig {
    /// 0 (store) to 9 (smallest). Defaults to 6.
    #[validate(range(min = 0, max = 9))]
    level: Option<u32>,
}

impl<W: Write> CompressorBuilder<W> for GzipConfig {
    fn build_compressor(&self, writer: W) -> Result<Compressor<W>> {
        let level = self.level.unwrap_or(DEFAULT_COMPRESSION_LEVEL);
        tracing::debug!("Creating gzip compressor with level={}", level);
        Ok(Compressor::GzEncoder(GzEncoder::new(
            writer,
            Compression::new(level),
        )))
    }
}
