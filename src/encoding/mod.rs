//! Provide methods and data structures for converting raw byte streams into
//! normalized character data.
//!
//! - [`charset`] maps declared charset names to canonical decoder ids.
//! - [`decoder`] provides the streaming decoders.
//! - [`recognizer`] provides the encoding sniffers used when no encoding is declared.
//!
//! Decoded character data is a sequence of UTF-16 code units. Code points
//! above the BMP are represented as surrogate pairs.

pub mod charset;
pub mod decoder;
pub mod recognizer;

pub use charset::*;
pub use decoder::*;
pub use recognizer::*;

/// The canonical decoder ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum XmlCharEncoding {
    UTF8,
    ASCII,
    /// UTF-16, the byte order is decided by a BOM, big-endian by default
    UTF16,
    UTF16LE,
    UTF16BE,
    /// UCS-2, the byte order is decided by a BOM, big-endian by default
    UCS2,
    /// UCS-4, the byte order is decided by a BOM, big-endian by default
    UCS4,
    UCS4LE,
    UCS4BE,
    /// EBCDIC-US (IBM037)
    EBCDIC,
    ISO8859_1,
    ISO8859_2,
    ISO8859_3,
    ISO8859_4,
    ISO8859_5,
    ISO8859_6,
    ISO8859_7,
    ISO8859_8,
    ISO8859_9,
    ISO8859_10,
    ISO8859_13,
    ISO8859_14,
    ISO8859_15,
    ISO8859_16,
    Windows1250,
    Windows1251,
    Windows1252,
    ISO2022JP,
    ShiftJIS,
    EUCJP,
}

impl XmlCharEncoding {
    /// Return the preferred IANA name of this encoding.
    pub fn get_name(&self) -> &'static str {
        match *self {
            Self::UTF8 => "UTF-8",
            Self::ASCII => "US-ASCII",
            Self::UTF16 => "UTF-16",
            Self::UTF16LE => "UTF-16LE",
            Self::UTF16BE => "UTF-16BE",
            Self::UCS2 => "ISO-10646-UCS-2",
            Self::UCS4 => "ISO-10646-UCS-4",
            Self::UCS4LE => "UCS-4LE",
            Self::UCS4BE => "UCS-4BE",
            Self::EBCDIC => "EBCDIC-CP-US",
            Self::ISO8859_1 => "ISO-8859-1",
            Self::ISO8859_2 => "ISO-8859-2",
            Self::ISO8859_3 => "ISO-8859-3",
            Self::ISO8859_4 => "ISO-8859-4",
            Self::ISO8859_5 => "ISO-8859-5",
            Self::ISO8859_6 => "ISO-8859-6",
            Self::ISO8859_7 => "ISO-8859-7",
            Self::ISO8859_8 => "ISO-8859-8",
            Self::ISO8859_9 => "ISO-8859-9",
            Self::ISO8859_10 => "ISO-8859-10",
            Self::ISO8859_13 => "ISO-8859-13",
            Self::ISO8859_14 => "ISO-8859-14",
            Self::ISO8859_15 => "ISO-8859-15",
            Self::ISO8859_16 => "ISO-8859-16",
            Self::Windows1250 => "WINDOWS-1250",
            Self::Windows1251 => "WINDOWS-1251",
            Self::Windows1252 => "WINDOWS-1252",
            Self::ISO2022JP => "ISO-2022-JP",
            Self::ShiftJIS => "SHIFT_JIS",
            Self::EUCJP => "EUC-JP",
        }
    }

    /// Check if this encoding belongs to the 16/32-bit UCS family.
    ///
    /// A declaration naming one of these can never be read correctly through
    /// an 8-bit compatible sniffing path.
    pub fn is_ucs_family(&self) -> bool {
        matches!(
            self,
            Self::UTF16
                | Self::UTF16LE
                | Self::UTF16BE
                | Self::UCS2
                | Self::UCS4
                | Self::UCS4LE
                | Self::UCS4BE
        )
    }
}
