use serde::{Deserialize, Serialize};

use crate::error::SeqError;

/// Where the service stages a downloaded capture unless told otherwise.
pub const DEFAULT_STAGING_PATH: &str = "./samplePcaps/download.pcap";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

/// Byte order of the sequence field.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Encoding {
    BigEndian,
    LittleEndian,
}

impl Encoding {
    /// Only the two literal spellings are accepted.
    pub fn parse(s: &str) -> Result<Encoding, SeqError> {
        match s {
            "BigEndian" => Ok(Encoding::BigEndian),
            "LittleEndian" => Ok(Encoding::LittleEndian),
            other => Err(SeqError::Config(format!(
                "encoding must be BigEndian or LittleEndian, got {:?}",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Encoding::BigEndian => "BigEndian",
            Encoding::LittleEndian => "LittleEndian",
        }
    }
}

/// Width of the sequence field. Every width is widened to `u64` after decode.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum FieldWidth {
    U16,
    U32,
    U64,
}

impl FieldWidth {
    pub fn from_bytes(n: i64) -> Result<FieldWidth, SeqError> {
        match n {
            2 => Ok(FieldWidth::U16),
            4 => Ok(FieldWidth::U32),
            8 => Ok(FieldWidth::U64),
            other => Err(SeqError::Config(format!(
                "field length must be 2, 4 or 8 bytes, got {}",
                other
            ))),
        }
    }

    pub fn bytes(&self) -> usize {
        match self {
            FieldWidth::U16 => 2,
            FieldWidth::U32 => 4,
            FieldWidth::U64 => 8,
        }
    }
}

/// Validated description of the byte window holding the sequence number.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct ExtractionConfig {
    pub encoding: Encoding,
    pub offset: usize,
    pub width: FieldWidth,
}

impl ExtractionConfig {
    pub fn new(encoding: Encoding, offset: usize, width: FieldWidth) -> Result<ExtractionConfig, SeqError> {
        if offset == 0 {
            return Err(SeqError::Config("start offset must be greater than 0".to_string()));
        }
        if offset.checked_add(width.bytes()).is_none() {
            return Err(SeqError::Config(format!("start offset {} leaves no room for the field", offset)));
        }
        Ok(ExtractionConfig { encoding, offset, width })
    }

    /// First byte past the sequence field. Packets shorter than this are skipped.
    pub fn end(&self) -> usize {
        self.offset + self.width.bytes()
    }
}

/// Request body accepted by the service, and the config it reports back.
///
/// Numeric fields are signed so that a negative value reaches validation and
/// is reported as a configuration error rather than a JSON decode error.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PacketConfig {
    #[serde(rename = "Encoding", default)]
    pub encoding: String,
    #[serde(rename = "StartOffsetZeroIndex", default)]
    pub start_offset: i64,
    #[serde(rename = "Length", default)]
    pub length: i64,
    #[serde(rename = "PacketURL", default)]
    pub packet_url: String,
    #[serde(rename = "ReadLocalDownloadedFile", default)]
    pub read_local: Option<bool>,
}

impl Default for PacketConfig {
    fn default() -> Self {
        PacketConfig {
            encoding: Encoding::BigEndian.as_str().to_string(),
            start_offset: 40,
            length: 2,
            packet_url: "https://YOUR_PCAP_URL".to_string(),
            read_local: None,
        }
    }
}

impl PacketConfig {
    /// Check every field and build the extraction window. Nothing runs if
    /// this fails.
    pub fn validate(&self) -> Result<ExtractionConfig, SeqError> {
        if self.packet_url.is_empty() {
            return Err(SeqError::Config("PacketURL is required".to_string()));
        }
        if self.read_local.is_none() {
            return Err(SeqError::Config("ReadLocalDownloadedFile is required".to_string()));
        }
        let encoding = Encoding::parse(&self.encoding)?;
        if self.start_offset <= 0 {
            return Err(SeqError::Config(format!(
                "StartOffsetZeroIndex must be greater than 0, got {}",
                self.start_offset
            )));
        }
        let width = FieldWidth::from_bytes(self.length)?;
        let offset = usize::try_from(self.start_offset)
            .map_err(|_| SeqError::Config(format!("StartOffsetZeroIndex {} out of range", self.start_offset)))?;
        ExtractionConfig::new(encoding, offset, width)
    }

    pub fn reuse_staged(&self) -> bool {
        self.read_local.unwrap_or(false)
    }
}
