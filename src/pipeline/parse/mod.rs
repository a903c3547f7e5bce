pub mod field;
pub mod fit;
pub mod gpx;

use rayon::prelude::*;

use crate::error::ParseError;
use crate::types::activity::{FileFormat, ParsedActivity};

pub use fit::{decode_fit_file, FitDecoder};
pub use gpx::{extract_gpx_coordinates, extract_gpx_trackpoints};

pub trait Parser {
    fn parse(&self, bytes: &[u8]) -> ParsedActivity;
}

pub fn parse(bytes: &[u8], format: FileFormat) -> ParsedActivity {
    parse_with(bytes, format, FitDecoder::new())
}

pub fn parse_with(bytes: &[u8], format: FileFormat, decoder: FitDecoder) -> ParsedActivity {
    match format {
        FileFormat::Gpx => gpx::GpxParser.parse(bytes),
        FileFormat::Fit => fit::FitParser { decoder }.parse(bytes),
    }
}

/// Uses the declared format when there is one, otherwise sniffs the content.
pub fn parse_detected(
    bytes: &[u8],
    declared: Option<FileFormat>,
    decoder: FitDecoder,
) -> Result<ParsedActivity, ParseError> {
    let format = declared
        .or_else(|| FileFormat::sniff(bytes))
        .ok_or_else(|| ParseError::UnsupportedFormat("unrecognised file contents".to_string()))?;
    Ok(parse_with(bytes, format, decoder))
}

#[derive(Debug, Clone)]
pub struct ActivityFile {
    pub name: Option<String>,
    pub bytes: Vec<u8>,
    pub declared: Option<FileFormat>,
}

impl ActivityFile {
    /// Declared format, else the one implied by the file name.
    pub fn format_hint(&self) -> Option<FileFormat> {
        self.declared
            .or_else(|| self.name.as_deref().and_then(FileFormat::from_filename))
    }
}

/// Decodes independent files in parallel; results keep input order.
pub fn decode_batch(
    files: &[ActivityFile],
    decoder: FitDecoder,
) -> Vec<Result<ParsedActivity, ParseError>> {
    files
        .par_iter()
        .map(|file| parse_detected(&file.bytes, file.format_hint(), decoder))
        .collect()
}
