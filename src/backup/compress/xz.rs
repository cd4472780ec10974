use crate::backup::compress::{Compressor, CompressorBuilder};
use crate::backup::result_error::result::Result;
use liblzma::stream::{Check, MtStreamBuilder};
use liblzma::write::XzEncoder;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::io::Write;
use validator::Validate;

static DEFAULT_COMPRESSION_LEVEL: u32 = 3;

/// XZ settings, producing `.tar.xz` archives.
///
/// Without `thread` the encoder runs single threaded. With `thread > 1` liblzma's
/// multithreaded encoder is used, which trades memory for speed on large directories.
#[skip_serializing_none]
#[derive(Clone, Default, Validate, Serialize, Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct XzConfig {
    #[validate(range(min = 0, max = 9))]
    level: Option<u32>,
    #[validate(range(min = 1))]
    thread: Option<u32>,
}

impl<W: Write> CompressorBuilder<W> for XzConfig {
    fn build_compressor(&self, writer: W) -> Result<Compressor<W>> {
        let level = self.level.unwrap_or(DEFAULT_COMPRESSION_LEVEL);
        match self.thread {
            Some(thread) if thread > 1 => {
                tracing::debug!("Creating xz compressor with level={}, threads={}", level, thread);
                let stream = MtStreamBuilder::new()
                    .preset(level)
                    .check(Check::Crc64)
                    .threads(thread)
                    .encoder()?;
                Ok(Compressor::XzEncoder(XzEncoder::new_stream(writer, stream)))
            }
            _ => {
                tracing::debug!("Creating xz compressor with level={}", level);
                Ok(Compressor::XzEncoder(XzEncoder::new(writer, level)))
            }
        }
    }
}
