//! Zip implementation of the Archive Assembler port.
//!
//! Builds the whole container in memory (the file set is already in
//! memory anyway) and reports progress as bytes consumed over bytes
//! total, so the percentage is non-decreasing by construction.

use std::io::{Cursor, Write};

use async_trait::async_trait;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use lingflow_core::error::{ClientError, Result};
use lingflow_core::port::{ArchiveAssembler, ProgressFn, SourceFile};

/// In-memory zip assembler.
#[derive(Default)]
pub struct ZipAssembler;

impl ZipAssembler {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ArchiveAssembler for ZipAssembler {
    async fn assemble(&self, files: &[SourceFile], progress: ProgressFn) -> Result<Vec<u8>> {
        let total: u64 = files.iter().map(|f| f.contents.len() as u64).sum();
        let mut cursor = Cursor::new(Vec::new());
        let mut writer = ZipWriter::new(&mut cursor);
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        progress(0);
        let mut consumed: u64 = 0;
        for file in files {
            writer
                .start_file(file.relative_path.as_str(), options)
                .map_err(|e| ClientError::Archive(format!("{}: {}", file.relative_path, e)))?;
            writer.write_all(&file.contents)?;
            consumed += file.contents.len() as u64;
            let pct = if total == 0 {
                100
            } else {
                ((consumed * 100) / total) as u8
            };
            progress(pct);
        }
        writer
            .finish()
            .map_err(|e| ClientError::Archive(format!("Failed to finalize archive: {}", e)))?;

        let archive = cursor.into_inner();
        debug!(
            files = files.len(),
            bytes = archive.len(),
            "Assembled archive"
        );
        Ok(archive)
    }
}
