//! Build fingerprints for loaded module images.
//!
//! A fingerprint is derived from the fixed-size header region of a module
//! image, never the whole image, so computing one is cheap enough to do on
//! every resolution. Each fingerprint carries the strategy that produced it;
//! fingerprints from different strategies never compare equal.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha1::{Digest, Sha1};
use strum::{Display, EnumIter, EnumString};

use crate::error::{Error, Result};

/// PE header field positions
mod pe {
    pub const DOS_MAGIC: &[u8; 2] = b"MZ";
    pub const NT_MAGIC: &[u8; 4] = b"PE\0\0";
    /// `e_lfanew` in the DOS header
    pub const LFANEW: usize = 0x3C;

    // Relative to the NT signature
    pub const TIME_DATE_STAMP: usize = 8;
    pub const OPTIONAL_HEADER: usize = 24;

    // Relative to the optional header
    pub const MAGIC_PE32: u16 = 0x10B;
    pub const MAGIC_PE32_PLUS: u16 = 0x20B;
    pub const IMAGE_BASE_PE32: usize = 28;
    pub const IMAGE_BASE_PE32_PLUS: usize = 24;
    pub const SIZE_OF_IMAGE: usize = 56;
    pub const CHECKSUM: usize = 64;
}

/// How a module's build fingerprint is derived from its header region.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum FingerprintStrategy {
    /// Link timestamp, image size and checksum from the PE headers (12 bytes).
    #[default]
    PeHeader,
    /// SHA-1 over the header region with the loader-patched image base zeroed.
    HeaderDigest,
}

impl FingerprintStrategy {
    /// Compute a fingerprint from the header region of a module image.
    pub fn compute(self, header: &[u8]) -> Result<Fingerprint> {
        let bytes = match self {
            FingerprintStrategy::PeHeader => {
                let layout = PeLayout::parse(header)?;
                let mut bytes = Vec::with_capacity(12);
                bytes.extend_from_slice(&layout.time_date_stamp.to_be_bytes());
                bytes.extend_from_slice(&layout.size_of_image.to_be_bytes());
                bytes.extend_from_slice(&layout.checksum.to_be_bytes());
                bytes
            }
            FingerprintStrategy::HeaderDigest => {
                let layout = PeLayout::parse(header)?;
                let mut normalized = header.to_vec();
                let (start, len) = layout.image_base;
                normalized[start..start + len].fill(0);

                let mut hasher = Sha1::new();
                hasher.update(&normalized);
                hasher.finalize().to_vec()
            }
        };

        Ok(Fingerprint {
            strategy: self,
            bytes,
        })
    }
}

/// Header fields of a PE image that fingerprinting cares about.
#[derive(Debug, Clone, Copy)]
struct PeLayout {
    time_date_stamp: u32,
    size_of_image: u32,
    checksum: u32,
    /// Byte range (start, len) of the `ImageBase` field
    image_base: (usize, usize),
}

impl PeLayout {
    fn parse(header: &[u8]) -> Result<Self> {
        if header.get(..2) != Some(pe::DOS_MAGIC.as_slice()) {
            return Err(Error::InvalidImage("missing MZ signature".to_string()));
        }

        let nt = read_u32(header, pe::LFANEW)? as usize;
        if header.get(nt..nt + 4) != Some(pe::NT_MAGIC.as_slice()) {
            return Err(Error::InvalidImage(format!(
                "missing PE signature at {:#x}",
                nt
            )));
        }

        let optional = nt + pe::OPTIONAL_HEADER;
        let image_base = match read_u16(header, optional)? {
            pe::MAGIC_PE32 => (optional + pe::IMAGE_BASE_PE32, 4),
            pe::MAGIC_PE32_PLUS => (optional + pe::IMAGE_BASE_PE32_PLUS, 8),
            other => {
                return Err(Error::InvalidImage(format!(
                    "unknown optional header magic {:#x}",
                    other
                )));
            }
        };

        let layout = Self {
            time_date_stamp: read_u32(header, nt + pe::TIME_DATE_STAMP)?,
            size_of_image: read_u32(header, optional + pe::SIZE_OF_IMAGE)?,
            checksum: read_u32(header, optional + pe::CHECKSUM)?,
            image_base,
        };

        if layout.image_base.0 + layout.image_base.1 > header.len() {
            return Err(Error::InvalidImage("header region truncated".to_string()));
        }

        Ok(layout)
    }
}

fn read_u16(buf: &[u8], at: usize) -> Result<u16> {
    buf.get(at..at + 2)
        .and_then(|b| b.try_into().ok())
        .map(u16::from_le_bytes)
        .ok_or_else(|| Error::InvalidImage(format!("header region truncated at {:#x}", at)))
}

fn read_u32(buf: &[u8], at: usize) -> Result<u32> {
    buf.get(at..at + 4)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_le_bytes)
        .ok_or_else(|| Error::InvalidImage(format!("header region truncated at {:#x}", at)))
}

/// Identity of one specific build of a module.
///
/// Textual form is `<strategy>:<hex bytes>`, e.g. `pe-header:68c2a3f102300000001f4c2a`.
/// Bare hex without a strategy tag parses as `pe-header`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    strategy: FingerprintStrategy,
    bytes: Vec<u8>,
}

impl Fingerprint {
    pub fn new(strategy: FingerprintStrategy, bytes: Vec<u8>) -> Self {
        Self { strategy, bytes }
    }

    pub fn strategy(&self) -> FingerprintStrategy {
        self.strategy
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.strategy)?;
        for b in &self.bytes {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl FromStr for Fingerprint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        // Untagged fingerprints predate the digest strategy
        let (strategy, hex) = match s.split_once(':') {
            Some((tag, hex)) => {
                let strategy = FingerprintStrategy::from_str(tag.trim()).map_err(|_| {
                    Error::MalformedTable(format!("unknown fingerprint strategy '{}'", tag))
                })?;
                (strategy, hex)
            }
            None => (FingerprintStrategy::PeHeader, s),
        };

        let hex = hex.trim();
        if hex.is_empty() || !hex.is_ascii() || hex.len() % 2 != 0 {
            return Err(Error::MalformedTable(format!(
                "fingerprint '{}' is not a whole number of bytes",
                s
            )));
        }

        let bytes = (0..hex.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&hex[i..i + 2], 16))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::MalformedTable(format!("fingerprint '{}': {}", s, e)))?;

        Ok(Self { strategy, bytes })
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn test_pe_header_fingerprint_fields() {
        let header = pe_header(0x68C2A3F1, 0x0230_0000, 0x001F_4C2A);
        let fp = FingerprintStrategy::PeHeader.compute(&header).unwrap();

        assert_eq!(fp.strategy(), FingerprintStrategy::PeHeader);
        assert_eq!(
            fp.as_bytes(),
            &[0x68, 0xC2, 0xA3, 0xF1, 0x02, 0x30, 0x00, 0x00, 0x00, 0x1F, 0x4C, 0x2A]
        );
        assert_eq!(fp.to_string(), "pe-header:68c2a3f102300000001f4c2a");
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        let header = pe_header(1, 2, 3);
        for strategy in [FingerprintStrategy::PeHeader, FingerprintStrategy::HeaderDigest] {
            let a = strategy.compute(&header).unwrap();
            let b = strategy.compute(&header).unwrap();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_header_digest_ignores_relocated_image_base() {
        let preferred = pe_header_with_base(1, 2, 3, 0x1_8000_0000);
        let relocated = pe_header_with_base(1, 2, 3, 0x7FF6_0000_0000);

        let a = FingerprintStrategy::HeaderDigest.compute(&preferred).unwrap();
        let b = FingerprintStrategy::HeaderDigest.compute(&relocated).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_bytes().len(), 20);
    }

    #[test]
    fn test_header_digest_detects_single_byte_change() {
        let header = pe_header(1, 2, 3);
        let mut patched = header.clone();
        patched[0x300] ^= 0x01;

        let a = FingerprintStrategy::HeaderDigest.compute(&header).unwrap();
        let b = FingerprintStrategy::HeaderDigest.compute(&patched).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_rejects_non_pe_header() {
        let err = FingerprintStrategy::PeHeader
            .compute(&[0u8; 0x200])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidImage(_)));
    }

    #[test]
    fn test_rejects_truncated_header() {
        let header = pe_header(1, 2, 3);
        let err = FingerprintStrategy::PeHeader
            .compute(&header[..0x110])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidImage(_)));
    }

    #[test]
    fn test_parse_textual_fingerprint() {
        let fp: Fingerprint = "header-digest:00ff10".parse().unwrap();
        assert_eq!(fp.strategy(), FingerprintStrategy::HeaderDigest);
        assert_eq!(fp.as_bytes(), &[0x00, 0xFF, 0x10]);
        assert_eq!(fp.to_string(), "header-digest:00ff10");
    }

    #[test]
    fn test_parse_rejects_bad_fingerprints() {
        assert!("crc32:00ff".parse::<Fingerprint>().is_err());
        assert!("pe-header:0f0".parse::<Fingerprint>().is_err());
        assert!("pe-header:".parse::<Fingerprint>().is_err());
        assert!("pe-header:zz".parse::<Fingerprint>().is_err());
    }

    #[test]
    fn test_untagged_fingerprint_is_pe_header() {
        let fp: Fingerprint = "68c2a3f102000000001f4c2a".parse().unwrap();
        assert_eq!(fp.strategy(), FingerprintStrategy::PeHeader);
        assert_eq!(fp.to_string(), "pe-header:68c2a3f102000000001f4c2a");

        assert!("0f0".parse::<Fingerprint>().is_err());
        assert!("pe:68c2".parse::<Fingerprint>().is_err());
    }

    #[test]
    fn test_strategies_never_compare_equal() {
        let a = Fingerprint::new(FingerprintStrategy::PeHeader, vec![1, 2, 3]);
        let b = Fingerprint::new(FingerprintStrategy::HeaderDigest, vec![1, 2, 3]);
        assert_ne!(a, b);
    }
}
