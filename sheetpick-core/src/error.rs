//! Error types surfaced by sheet selection and summary building

use thiserror::Error;

pub type PickResult<T> = Result<T, PickError>;

/// Everything that can abort a build request
#[derive(Error, Debug)]
pub enum PickError {
    #[error("CSV must contain a column named '{0}'")]
    MissingColumn(String),

    #[error("No sheet names found in CSV")]
    EmptySelection,

    #[error("No matching sheets found in the workbook")]
    NoMatches,

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Missing upload: {0}")]
    MissingUpload(&'static str),

    #[error("Invalid cell address '{0}'")]
    InvalidAddress(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Workbook is missing required part '{0}'")]
    MissingPart(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("XML attribute error: {0}")]
    XmlAttribute(#[from] quick_xml::events::attributes::AttrError),

    #[error("Failed to read workbook values: {0}")]
    Read(#[from] calamine::XlsxError),

    #[error("Failed to write summary workbook: {0}")]
    Write(#[from] rust_xlsxwriter::XlsxError),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
}
