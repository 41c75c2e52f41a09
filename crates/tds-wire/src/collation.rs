//! Collations and narrow-text decoding.
//!
//! A collation arrives as five bytes: a little-endian 32-bit info word (LCID
//! in bits 0-19, comparison flags in bits 20-27, version in bits 28-31)
//! followed by a sort id. The LCID selects the Windows code page used for
//! `CHAR`/`VARCHAR`/`TEXT` data.
//!
//! | Code Page | Languages |
//! |-----------|-----------|
//! | 874 | Thai |
//! | 932 | Japanese |
//! | 936 | Simplified Chinese |
//! | 949 | Korean |
//! | 950 | Traditional Chinese |
//! | 1250 | Central/Eastern European |
//! | 1251 | Cyrillic |
//! | 1252 | Western European (default) |
//! | 1253 | Greek |
//! | 1254 | Turkish |
//! | 1255 | Hebrew |
//! | 1256 | Arabic |
//! | 1257 | Baltic |
//! | 1258 | Vietnamese |

#[cfg(feature = "encoding")]
use encoding_rs::Encoding;

use crate::error::ProtocolError;
use crate::reader::Reader;

/// Flag bit indicating a UTF-8 collation (SQL Server 2019+).
pub const COLLATION_FLAG_UTF8: u32 = 0x0800_0000;

/// Mask to extract the LCID from the collation info word.
pub const LCID_MASK: u32 = 0x000F_FFFF;

/// Mask to extract the primary language ID.
pub const PRIMARY_LANGUAGE_MASK: u32 = 0x0000_FFFF;

/// Code page for UTF-8.
pub const CODE_PAGE_UTF8: u16 = 65001;

/// Default code page when the LCID is not recognized.
pub const CODE_PAGE_DEFAULT: u16 = 1252;

/// A five-byte wire collation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Collation {
    /// Collation info word (LCID, flags, version).
    pub info: u32,
    /// Sort ID, non-zero for legacy SQL collations.
    pub sort_id: u8,
}

impl Collation {
    /// Wire size of a collation.
    pub const SIZE: usize = 5;

    /// Read a collation.
    pub fn decode(src: &mut Reader<'_>) -> Result<Self, ProtocolError> {
        let info = src.read_u32_le()?;
        let sort_id = src.read_u8()?;
        Ok(Self { info, sort_id })
    }

    /// Locale ID.
    #[must_use]
    pub const fn lcid(&self) -> u32 {
        self.info & LCID_MASK
    }

    /// Comparison flags (ignore case, accent, kana, width, binary, binary2, UTF-8).
    #[must_use]
    pub const fn flags(&self) -> u8 {
        ((self.info >> 20) & 0xFF) as u8
    }

    /// Collation version nibble.
    #[must_use]
    pub const fn version(&self) -> u8 {
        (self.info >> 28) as u8
    }

    /// Whether this is a UTF-8 collation.
    #[must_use]
    pub const fn is_utf8(&self) -> bool {
        self.info & COLLATION_FLAG_UTF8 != 0
    }

    /// Windows code page for narrow text under this collation.
    #[must_use]
    pub fn code_page(&self) -> u16 {
        if self.is_utf8() {
            return CODE_PAGE_UTF8;
        }
        code_page_for_lcid(self.info)
    }

    /// Encoding for narrow text, `None` for UTF-8 collations.
    #[cfg(feature = "encoding")]
    #[must_use]
    pub fn encoding(&self) -> Option<&'static Encoding> {
        if self.is_utf8() {
            return None;
        }
        Some(encoding_for_code_page(self.code_page()))
    }

    /// Decode narrow text stored under this collation.
    ///
    /// Unmappable bytes become U+FFFD.
    #[must_use]
    pub fn decode_text(&self, data: &[u8]) -> String {
        if self.is_utf8() {
            return String::from_utf8_lossy(data).into_owned();
        }
        decode_code_page(self.code_page(), data)
    }
}

/// Windows code page for an LCID.
///
/// Languages without an entry use Windows-1252.
#[must_use]
pub fn code_page_for_lcid(lcid: u32) -> u16 {
    match lcid & PRIMARY_LANGUAGE_MASK {
        0x0411 => 932,
        0x0804 | 0x1004 => 936,
        0x0404 | 0x0C04 | 0x1404 => 950,
        0x0412 => 949,
        0x041E => 874,
        0x042A => 1258,

        // Czech, Polish, Hungarian, Croatian, Serbian/Bosnian (Latin), Slovak,
        // Slovenian, Romanian, Albanian
        0x0405 | 0x0415 | 0x040E | 0x041A | 0x081A | 0x141A | 0x101A | 0x041B | 0x0424 | 0x0418
        | 0x041C => 1250,

        // Russian, Ukrainian, Belarusian, Bulgarian, Macedonian, Serbian/Bosnian
        // (Cyrillic), Kyrgyz, Uzbek, Tatar, Mongolian, Sakha
        0x0419 | 0x0422 | 0x0423 | 0x0402 | 0x042F | 0x0C1A | 0x201A | 0x0440 | 0x0843 | 0x0444
        | 0x0450 | 0x0485 => 1251,

        0x0408 => 1253,
        0x041F | 0x042C => 1254,
        0x040D => 1255,

        // Arabic variants, Farsi, Urdu, Dari, Pashto
        0x0401 | 0x0801 | 0x0C01 | 0x1001 | 0x1401 | 0x1801 | 0x1C01 | 0x2001 | 0x2401 | 0x2801
        | 0x2C01 | 0x3001 | 0x3401 | 0x3801 | 0x3C01 | 0x4001 | 0x0429 | 0x0420 | 0x048C
        | 0x0463 => 1256,

        // Estonian, Latvian, Lithuanian
        0x0425..=0x0427 => 1257,

        _ => CODE_PAGE_DEFAULT,
    }
}

/// `encoding_rs` encoding for a Windows code page.
#[cfg(feature = "encoding")]
#[must_use]
pub fn encoding_for_code_page(code_page: u16) -> &'static Encoding {
    match code_page {
        874 => encoding_rs::WINDOWS_874,
        932 => encoding_rs::SHIFT_JIS,
        936 => encoding_rs::GB18030,
        949 => encoding_rs::EUC_KR,
        950 => encoding_rs::BIG5,
        1250 => encoding_rs::WINDOWS_1250,
        1251 => encoding_rs::WINDOWS_1251,
        1253 => encoding_rs::WINDOWS_1253,
        1254 => encoding_rs::WINDOWS_1254,
        1255 => encoding_rs::WINDOWS_1255,
        1256 => encoding_rs::WINDOWS_1256,
        1257 => encoding_rs::WINDOWS_1257,
        1258 => encoding_rs::WINDOWS_1258,
        CODE_PAGE_UTF8 => encoding_rs::UTF_8,
        _ => encoding_rs::WINDOWS_1252,
    }
}

/// Decode bytes from a Windows code page.
#[cfg(feature = "encoding")]
#[must_use]
pub fn decode_code_page(code_page: u16, data: &[u8]) -> String {
    let (text, _, _) = encoding_for_code_page(code_page).decode(data);
    text.into_owned()
}

/// Decode bytes from a Windows code page.
///
/// Without the `encoding` feature every code page is read as Latin-1.
#[cfg(not(feature = "encoding"))]
#[must_use]
pub fn decode_code_page(_code_page: u16, data: &[u8]) -> String {
    data.iter().map(|&b| char::from(b)).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_collation_fields() {
        // Latin1_General_CI_AS: LCID 0x0409, flags 0x0D (ignore case/kana/width)
        let data = [0x09, 0x04, 0xD0, 0x00, 0x34];
        let mut r = Reader::new(&data);
        let c = Collation::decode(&mut r).unwrap();
        assert_eq!(c.lcid(), 0x0409);
        assert_eq!(c.flags(), 0x0D);
        assert_eq!(c.version(), 0);
        assert_eq!(c.sort_id, 0x34);
        assert!(!c.is_utf8());
        assert_eq!(c.code_page(), 1252);
    }

    #[test]
    fn test_code_page_table() {
        assert_eq!(code_page_for_lcid(0x0411), 932);
        assert_eq!(code_page_for_lcid(0x0419), 1251);
        assert_eq!(code_page_for_lcid(0x0426), 1257);
        assert_eq!(code_page_for_lcid(0x9999), CODE_PAGE_DEFAULT);
    }

    #[test]
    fn test_utf8_collation() {
        let c = Collation {
            info: COLLATION_FLAG_UTF8 | 0x0409,
            sort_id: 0,
        };
        assert!(c.is_utf8());
        assert_eq!(c.code_page(), CODE_PAGE_UTF8);
        assert_eq!(c.decode_text("héllo".as_bytes()), "héllo");
    }

    #[cfg(feature = "encoding")]
    #[test]
    fn test_decode_cyrillic_text() {
        let c = Collation {
            info: 0x0419,
            sort_id: 0,
        };
        // "Привет" in Windows-1251
        let data = [0xCF, 0xF0, 0xE8, 0xE2, 0xE5, 0xF2];
        assert_eq!(c.decode_text(&data), "Привет");
    }

    #[cfg(feature = "encoding")]
    #[test]
    fn test_windows_1252_fallback() {
        let c = Collation::default();
        // 0x80 is the euro sign in Windows-1252
        assert_eq!(c.decode_text(&[0x80]), "€");
    }
}
