//! Registry of text codecs selectable by name through the `encoding` query
//! parameter of `/echo`.
//!
//! A handful of names get dedicated strict codecs (ASCII, ISO-8859-1, UTF-16
//! variants); everything else is looked up in the WHATWG label table provided
//! by [`encoding_rs`]. Encoding never substitutes characters: text that the
//! codec cannot represent is an error.

use encoding_rs::{Encoding, UTF_8};

use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Ascii,
    Latin1,
    Utf16 { big_endian: bool, bom: bool },
    Whatwg(&'static Encoding),
}

impl Codec {
    /// Resolves a user supplied codec name.
    pub fn resolve(name: &str) -> Result<Self, Error> {
        let label = name.trim();
        let normalized = normalize(label);

        if let Some(codec) = builtin(&normalized) {
            return Ok(codec);
        }

        let encoding = Encoding::for_label(label.as_bytes())
            .or_else(|| Encoding::for_label(normalized.as_bytes()))
            .ok_or_else(|| Error::UnsupportedEncoding(name.to_owned()))?;

        // Decode-only labels such as "replacement" or the UTF-16 aliases would
        // silently produce UTF-8.
        if encoding.output_encoding() != encoding {
            return Err(Error::UnsupportedEncoding(name.to_owned()));
        }

        Ok(Codec::Whatwg(encoding))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Codec::Ascii => "ascii",
            Codec::Latin1 => "iso-8859-1",
            Codec::Utf16 {
                big_endian: false,
                bom: true,
            } => "utf-16",
            Codec::Utf16 {
                big_endian: false,
                bom: false,
            } => "utf-16le",
            Codec::Utf16 {
                big_endian: true, ..
            } => "utf-16be",
            Codec::Whatwg(encoding) => encoding.name(),
        }
    }

    pub fn encode(&self, text: &str) -> Result<Vec<u8>, Error> {
        match *self {
            Codec::Ascii => {
                if !text.is_ascii() {
                    return Err(Error::Unencodable(self.name()));
                }
                Ok(text.as_bytes().to_vec())
            }
            Codec::Latin1 => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).map_err(|_| Error::Unencodable(self.name())))
                .collect(),
            Codec::Utf16 { big_endian, bom } => {
                let mut bytes = Vec::with_capacity(text.len() * 2 + 2);
                let units = bom.then_some(0xFEFF).into_iter().chain(text.encode_utf16());
                for unit in units {
                    if big_endian {
                        bytes.extend_from_slice(&unit.to_be_bytes());
                    } else {
                        bytes.extend_from_slice(&unit.to_le_bytes());
                    }
                }
                Ok(bytes)
            }
            Codec::Whatwg(encoding) => {
                let (bytes, _, had_errors) = encoding.encode(text);
                if had_errors {
                    return Err(Error::Unencodable(self.name()));
                }
                Ok(bytes.into_owned())
            }
        }
    }
}

fn normalize(name: &str) -> String {
    name.to_ascii_lowercase().replace(['_', ' '], "-")
}

fn builtin(normalized: &str) -> Option<Codec> {
    let codec = match normalized {
        "utf8" | "utf-8" | "u8" | "utf" => Codec::Whatwg(UTF_8),
        "ascii" | "us-ascii" | "646" => Codec::Ascii,
        "latin-1" | "latin1" | "iso-8859-1" | "iso8859-1" | "l1" => Codec::Latin1,
        "utf-16" | "utf16" => Codec::Utf16 {
            big_endian: false,
            bom: true,
        },
        "utf-16le" | "utf-16-le" => Codec::Utf16 {
            big_endian: false,
            bom: false,
        },
        "utf-16be" | "utf-16-be" => Codec::Utf16 {
            big_endian: true,
            bom: false,
        },
        _ => return None,
    };

    Some(codec)
}

#[cfg(test)]
mod test {
    use super::*;

    fn encode(name: &str, text: &str) -> Result<Vec<u8>, Error> {
        Codec::resolve(name)?.encode(text)
    }

    #[test]
    fn gb2312() {
        assert_eq!(
            encode("gb2312", "你好").unwrap(),
            b"\xc4\xe3\xba\xc3".to_vec()
        );
    }

    #[test]
    fn utf8_aliases() {
        for name in ["utf8", "UTF-8", "utf_8", " U8 "] {
            assert_eq!(
                encode(name, "你好").unwrap(),
                b"\xe4\xbd\xa0\xe5\xa5\xbd".to_vec(),
                "{name}"
            );
        }
    }

    #[test]
    fn whatwg_label_with_underscore() {
        let codec = Codec::resolve("Shift_JIS").unwrap();
        assert_eq!(codec.name(), "Shift_JIS");
        assert_eq!(codec.encode("あ").unwrap(), b"\x82\xa0".to_vec());
    }

    #[test]
    fn strict_ascii_and_latin1() {
        assert_eq!(encode("ascii", "hello").unwrap(), b"hello".to_vec());
        assert!(matches!(
            encode("ascii", "café"),
            Err(Error::Unencodable("ascii"))
        ));

        assert_eq!(encode("latin_1", "café").unwrap(), b"caf\xe9".to_vec());
        assert!(matches!(
            encode("latin-1", "你"),
            Err(Error::Unencodable("iso-8859-1"))
        ));
    }

    #[test]
    fn utf16_variants() {
        assert_eq!(encode("utf-16", "A").unwrap(), vec![0xff, 0xfe, 0x41, 0x00]);
        assert_eq!(encode("utf_16_le", "A").unwrap(), vec![0x41, 0x00]);
        assert_eq!(encode("UTF-16BE", "A").unwrap(), vec![0x00, 0x41]);
    }

    #[test]
    fn unsupported_names() {
        for name in ["klingon", "", "replacement", "unicodefffe"] {
            assert!(
                matches!(Codec::resolve(name), Err(Error::UnsupportedEncoding(_))),
                "{name}"
            );
        }
    }

    #[test]
    fn unmappable_characters_are_errors() {
        assert!(matches!(
            encode("gb2312", "😀"),
            Err(Error::Unencodable("GBK"))
        ));
    }
}
