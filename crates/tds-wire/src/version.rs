//! TDS protocol version definitions.

use core::fmt;

/// TDS protocol version negotiated on a conversation.
///
/// Variants are declared oldest first, so the derived ordering matches
/// protocol age. [`TdsVersion::Unknown`] sorts below everything and is
/// treated as the pre-7.2 layout by every version gate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TdsVersion {
    /// No login acknowledgement seen yet.
    #[default]
    Unknown,
    /// TDS 4.2 (SQL Server 4.2 / Sybase).
    V4_2,
    /// TDS 5.0 (Sybase).
    V5_0,
    /// TDS 7.0 (SQL Server 7.0).
    V7_0,
    /// TDS 7.1 (SQL Server 2000).
    V7_1,
    /// TDS 7.1 Revision 1 (SQL Server 2000 SP1).
    V7_1Rev1,
    /// TDS 7.2 (SQL Server 2005).
    V7_2,
    /// TDS 7.3A (SQL Server 2008).
    V7_3A,
    /// TDS 7.3B (SQL Server 2008 R2).
    V7_3B,
    /// TDS 7.4 (SQL Server 2012+).
    V7_4,
}

impl TdsVersion {
    /// Newest version this decoder knows about.
    pub const NEWEST: Self = Self::V7_4;

    /// Map a login-acknowledgement version code to a version.
    ///
    /// Codes that are not in the table map to [`TdsVersion::NEWEST`].
    #[must_use]
    pub const fn from_login_ack(code: u32) -> Self {
        match Self::from_code(code) {
            Some(v) => v,
            None => Self::NEWEST,
        }
    }

    /// Look up an exact version code, as sent in `LOGINACK` or `LOGIN7`.
    #[must_use]
    pub const fn from_code(code: u32) -> Option<Self> {
        match code {
            0x0402_0000 => Some(Self::V4_2),
            0x0500_0000 => Some(Self::V5_0),
            0x7000_0000 => Some(Self::V7_0),
            0x7100_0000 => Some(Self::V7_1),
            0x7100_0001 => Some(Self::V7_1Rev1),
            0x7209_0002 => Some(Self::V7_2),
            0x730A_0003 => Some(Self::V7_3A),
            0x730B_0003 => Some(Self::V7_3B),
            0x7400_0004 => Some(Self::V7_4),
            _ => None,
        }
    }

    /// Wire code for this version, `None` for [`TdsVersion::Unknown`].
    #[must_use]
    pub const fn code(self) -> Option<u32> {
        match self {
            Self::Unknown => None,
            Self::V4_2 => Some(0x0402_0000),
            Self::V5_0 => Some(0x0500_0000),
            Self::V7_0 => Some(0x7000_0000),
            Self::V7_1 => Some(0x7100_0000),
            Self::V7_1Rev1 => Some(0x7100_0001),
            Self::V7_2 => Some(0x7209_0002),
            Self::V7_3A => Some(0x730A_0003),
            Self::V7_3B => Some(0x730B_0003),
            Self::V7_4 => Some(0x7400_0004),
        }
    }

    /// Whether this is a pre-7.0 (TDS 4.2 / 5.0) version.
    #[must_use]
    pub const fn is_legacy(self) -> bool {
        matches!(self, Self::V4_2 | Self::V5_0)
    }

    /// Whether this version is at least `other`.
    ///
    /// [`TdsVersion::Unknown`] is never at least any known version.
    #[must_use]
    pub fn at_least(self, other: Self) -> bool {
        self >= other
    }

    /// Width of the row count in `DONE`-family tokens.
    #[must_use]
    pub fn done_row_count_width(self) -> usize {
        if self.at_least(Self::V7_2) { 8 } else { 4 }
    }

    /// Width of the line number in `ERROR`/`INFO` tokens.
    #[must_use]
    pub fn line_number_width(self) -> usize {
        if self.at_least(Self::V7_2) { 4 } else { 2 }
    }

    /// Width of the user type in column metadata.
    #[must_use]
    pub fn user_type_width(self) -> usize {
        if self.at_least(Self::V7_2) { 4 } else { 2 }
    }

    /// Get the major version number, 0 when unknown.
    #[must_use]
    pub const fn major(self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::V4_2 => 4,
            Self::V5_0 => 5,
            _ => 7,
        }
    }

    /// Get the minor version number.
    #[must_use]
    pub const fn minor(self) -> u8 {
        match self {
            Self::Unknown | Self::V5_0 | Self::V7_0 => 0,
            Self::V7_1 | Self::V7_1Rev1 => 1,
            Self::V4_2 | Self::V7_2 => 2,
            Self::V7_3A | Self::V7_3B => 3,
            Self::V7_4 => 4,
        }
    }

    /// Get the revision suffix for TDS 7.3 versions.
    #[must_use]
    pub const fn revision_suffix(self) -> Option<char> {
        match self {
            Self::V7_3A => Some('A'),
            Self::V7_3B => Some('B'),
            _ => None,
        }
    }

    /// Parse a version from a string such as `"7.3B"` or `"5.0"`.
    ///
    /// Returns None if the string cannot be parsed.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        match s.as_str() {
            "4.2" => Some(Self::V4_2),
            "5.0" | "5" => Some(Self::V5_0),
            "7.0" => Some(Self::V7_0),
            "7.1" => Some(Self::V7_1),
            "7.2" => Some(Self::V7_2),
            "7.3" | "7.3a" => Some(Self::V7_3A),
            "7.3b" => Some(Self::V7_3B),
            "7.4" => Some(Self::V7_4),
            _ => None,
        }
    }
}

impl fmt::Display for TdsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::Unknown {
            write!(f, "TDS (unknown)")
        } else if let Some(suffix) = self.revision_suffix() {
            write!(f, "TDS {}.{}{}", self.major(), self.minor(), suffix)
        } else {
            write!(f, "TDS {}.{}", self.major(), self.minor())
        }
    }
}
