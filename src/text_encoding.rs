//! Ordered, strict decoding of tree listing files.
//!
//! The exporting client writes whatever code page the host happens to use, so
//! each configured encoding is tried in turn and the first one that decodes
//! every byte without replacement wins.

use encoding_rs::Encoding;
use strum_macros::Display;
use thiserror::Error;
use tracing::{debug, warn};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub(crate) enum TextEncoding {
    #[strum(to_string = "utf-8")]
    Utf8,
    #[strum(to_string = "gbk")]
    Gbk,
    /// The platform's legacy code page.
    #[strum(to_string = "ansi")]
    Ansi,
    /// Same code page as `Ansi`, kept as its own entry of the fallback order.
    #[strum(to_string = "mbcs")]
    Mbcs,
    /// Decoded with the GBK tables, GB2312 is a subset.
    #[strum(to_string = "gb2312")]
    Gb2312,
}

impl TextEncoding {
    pub(crate) fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "utf-8" | "utf8" => Some(TextEncoding::Utf8),
            "gbk" | "cp936" => Some(TextEncoding::Gbk),
            "ansi" => Some(TextEncoding::Ansi),
            "mbcs" => Some(TextEncoding::Mbcs),
            "gb2312" => Some(TextEncoding::Gb2312),
            _ => None,
        }
    }
}

pub(crate) const DEFAULT_ENCODINGS: [TextEncoding; 5] = [
    TextEncoding::Utf8,
    TextEncoding::Gbk,
    TextEncoding::Ansi,
    TextEncoding::Mbcs,
    TextEncoding::Gb2312,
];

pub(crate) const DEFAULT_ANSI_CODEPAGE: &str = "gbk";

#[derive(Debug, Error)]
#[error("unable to decode file with any of the encodings: {tried}")]
pub(crate) struct DecodingError {
    tried: String,
}

#[derive(Debug, Clone)]
pub(crate) struct EncodingFallback {
    encodings: Vec<TextEncoding>,
    ansi: &'static Encoding,
}

impl Default for EncodingFallback {
    fn default() -> Self {
        EncodingFallback {
            encodings: DEFAULT_ENCODINGS.to_vec(),
            ansi: encoding_rs::GBK,
        }
    }
}

impl EncodingFallback {
    /// Builds the fallback order, an unknown ansi label falls back to GBK.
    pub(crate) fn new(encodings: Vec<TextEncoding>, ansi_codepage: &str) -> Self {
        let ansi = Encoding::for_label(ansi_codepage.trim().as_bytes()).unwrap_or_else(|| {
            warn!("Unknown ansi code page {ansi_codepage:?}, using {DEFAULT_ANSI_CODEPAGE}");
            encoding_rs::GBK
        });
        let encodings = if encodings.is_empty() {
            warn!("No encodings configured, using the default order");
            DEFAULT_ENCODINGS.to_vec()
        } else {
            encodings
        };
        EncodingFallback { encodings, ansi }
    }

    /// Like `new`, but takes the labels as they appear in the config file.
    pub(crate) fn from_labels(labels: &[String], ansi_codepage: &str) -> Self {
        let encodings = labels
            .iter()
            .filter_map(|label| {
                let enc = TextEncoding::from_label(label);
                if enc.is_none() {
                    warn!("Ignoring unknown encoding {label:?}");
                }
                enc
            })
            .collect::<Vec<TextEncoding>>();
        EncodingFallback::new(encodings, ansi_codepage)
    }

    pub(crate) fn encodings(&self) -> &[TextEncoding] {
        &self.encodings
    }

    pub(crate) fn decode(&self, bytes: &[u8]) -> Result<(String, TextEncoding), DecodingError> {
        for enc in &self.encodings {
            if let Some(text) = self.decode_strict(*enc, bytes) {
                debug!("Decoded {} bytes as {enc}", bytes.len());
                return Ok((text, *enc));
            }
            debug!("Not valid {enc}");
        }
        let tried = self
            .encodings
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<String>>()
            .join(", ");
        Err(DecodingError { tried })
    }

    fn decode_strict(&self, enc: TextEncoding, bytes: &[u8]) -> Option<String> {
        match enc {
            TextEncoding::Utf8 => {
                let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
                std::str::from_utf8(bytes).ok().map(|s| s.to_string())
            }
            TextEncoding::Gbk | TextEncoding::Gb2312 => encoding_rs::GBK
                .decode_without_bom_handling_and_without_replacement(bytes)
                .map(|s| s.into_owned()),
            TextEncoding::Ansi | TextEncoding::Mbcs => self
                .ansi
                .decode_without_bom_handling_and_without_replacement(bytes)
                .map(|s| s.into_owned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_first() -> anyhow::Result<()> {
        crate::test_util::setup_log();
        let fallback = EncodingFallback::default();
        let (text, enc) = fallback.decode("|——电影".as_bytes())?;
        assert_eq!(text, "|——电影");
        assert_eq!(enc, TextEncoding::Utf8);
        Ok(())
    }

    #[test]
    fn test_utf8_bom_dropped() -> anyhow::Result<()> {
        let mut input = UTF8_BOM.to_vec();
        input.extend_from_slice("|——A".as_bytes());
        let (text, _) = EncodingFallback::default().decode(&input)?;
        assert_eq!(text, "|——A");
        Ok(())
    }

    #[test]
    fn test_gbk_fallback() -> anyhow::Result<()> {
        crate::test_util::setup_log();
        let (encoded, _, _) = encoding_rs::GBK.encode("| |-陈百强演唱会.avi");
        assert!(std::str::from_utf8(&encoded).is_err());
        let (text, enc) = EncodingFallback::default().decode(&encoded)?;
        assert_eq!(text, "| |-陈百强演唱会.avi");
        assert_eq!(enc, TextEncoding::Gbk);
        Ok(())
    }

    #[test]
    fn test_all_encodings_fail() {
        crate::test_util::setup_log();
        let (encoded, _, _) = encoding_rs::GBK.encode("演唱会");
        let fallback = EncodingFallback::new(vec![TextEncoding::Utf8], DEFAULT_ANSI_CODEPAGE);
        let err = fallback.decode(&encoded).err();
        assert!(err.is_some());
        assert!(err.map(|e| e.to_string()).unwrap_or_default().contains("utf-8"));
    }

    #[test]
    fn test_ansi_code_page_label() -> anyhow::Result<()> {
        let fallback = EncodingFallback::new(vec![TextEncoding::Utf8, TextEncoding::Ansi], "windows-1252");
        let (text, enc) = fallback.decode(b"caf\xe9")?;
        assert_eq!(text, "caf\u{e9}");
        assert_eq!(enc, TextEncoding::Ansi);
        Ok(())
    }

    #[test]
    fn test_from_labels() {
        let labels = vec!["UTF-8".to_string(), "bogus".to_string(), "gb2312".to_string()];
        let fallback = EncodingFallback::from_labels(&labels, "nope");
        assert_eq!(fallback.encodings(), &[TextEncoding::Utf8, TextEncoding::Gb2312]);

        let fallback = EncodingFallback::from_labels(&[], DEFAULT_ANSI_CODEPAGE);
        assert_eq!(fallback.encodings(), &DEFAULT_ENCODINGS);
    }
}
