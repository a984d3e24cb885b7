//! Typed layout model produced by the descriptor parser.

use serde::{Deserialize, Serialize};

/// Scalar field kinds understood by the descriptor language.
///
/// The names follow the historic descriptor-file vocabulary: `long` is a
/// 4-byte little-endian quantity on disk regardless of the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Char,
    UChar,
    Short,
    UShort,
    Long,
    ULong,
}

impl FieldKind {
    /// On-disk width of one element in bytes.
    pub fn width(self) -> usize {
        match self {
            FieldKind::Char | FieldKind::UChar => 1,
            FieldKind::Short | FieldKind::UShort => 2,
            FieldKind::Long | FieldKind::ULong => 4,
        }
    }

    pub fn signed(self) -> bool {
        matches!(self, FieldKind::Char | FieldKind::Short | FieldKind::Long)
    }

    /// Keyword as written in descriptor files.
    pub fn keyword(self) -> &'static str {
        match self {
            FieldKind::Char => "char",
            FieldKind::UChar => "uchar",
            FieldKind::Short => "short",
            FieldKind::UShort => "ushort",
            FieldKind::Long => "long",
            FieldKind::ULong => "ulong",
        }
    }

    pub fn from_keyword(word: &str) -> Option<FieldKind> {
        match word {
            "char" => Some(FieldKind::Char),
            "uchar" => Some(FieldKind::UChar),
            "short" => Some(FieldKind::Short),
            "ushort" => Some(FieldKind::UShort),
            "long" => Some(FieldKind::Long),
            "ulong" => Some(FieldKind::ULong),
            _ => None,
        }
    }
}

/// One field of an on-disk structure: name, element kind, element count
/// (1 for scalars) and byte offset from the start of the structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
    pub count: usize,
    pub offset: usize,
}

impl FieldDescriptor {
    pub fn size(&self) -> usize {
        self.kind.width() * self.count
    }

    pub fn is_array(&self) -> bool {
        self.count > 1
    }

    /// Read the first element of this field from a structure-sized buffer,
    /// widened to `u64`. Returns `None` when the buffer is too short.
    pub fn read_scalar(&self, buf: &[u8]) -> Option<u64> {
        let width = self.kind.width();
        let bytes = buf.get(self.offset..self.offset + width)?;
        let mut value: u64 = 0;
        for (i, b) in bytes.iter().enumerate() {
            value |= (*b as u64) << (8 * i);
        }
        Some(value)
    }

    /// Write `value` as the first element of this field, little-endian,
    /// truncating to the field width. Returns `false` when the buffer is too
    /// short.
    pub fn write_scalar(&self, buf: &mut [u8], value: u64) -> bool {
        let width = self.kind.width();
        let Some(bytes) = buf.get_mut(self.offset..self.offset + width) else {
            return false;
        };
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = (value >> (8 * i)) as u8;
        }
        true
    }

    /// Render the field value for display: signed kinds as decimal with
    /// sign extension, unsigned kinds as decimal, char arrays as a quoted
    /// string with non-printables escaped.
    pub fn display_value(&self, buf: &[u8]) -> Option<String> {
        if self.kind == FieldKind::Char && self.is_array() {
            let bytes = buf.get(self.offset..self.offset + self.size())?;
            let text: String = bytes
                .iter()
                .take_while(|b| **b != 0)
                .map(|b| {
                    if b.is_ascii_graphic() || *b == b' ' {
                        *b as char
                    } else {
                        '.'
                    }
                })
                .collect();
            return Some(format!("\"{text}\""));
        }
        let raw = self.read_scalar(buf)?;
        if self.kind.signed() {
            let shift = 64 - 8 * self.kind.width() as u32;
            Some((((raw << shift) as i64) >> shift).to_string())
        } else {
            Some(raw.to_string())
        }
    }
}

/// One structure kind: its name and ordered fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructDescriptor {
    pub name: String,
    pub fields: Vec<FieldDescriptor>,
}

impl StructDescriptor {
    /// Total on-disk size: sum of field sizes.
    pub fn size(&self) -> usize {
        self.fields.iter().map(FieldDescriptor::size).sum()
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(kind: FieldKind, count: usize, offset: usize) -> FieldDescriptor {
        FieldDescriptor {
            name: "f".to_string(),
            kind,
            count,
            offset,
        }
    }

    #[test]
    fn scalar_round_trip_is_little_endian() {
        let f = field(FieldKind::ULong, 1, 4);
        let mut buf = [0u8; 8];
        assert!(f.write_scalar(&mut buf, 0x1234_5678));
        assert_eq!(&buf[4..8], &[0x78, 0x56, 0x34, 0x12]);
        assert_eq!(f.read_scalar(&buf), Some(0x1234_5678));
    }

    #[test]
    fn short_buffer_reads_none() {
        let f = field(FieldKind::ULong, 1, 6);
        assert_eq!(f.read_scalar(&[0u8; 8]), None);
        assert!(!f.write_scalar(&mut [0u8; 8], 1));
    }

    #[test]
    fn signed_display_sign_extends() {
        let f = field(FieldKind::Short, 1, 0);
        let mut buf = [0u8; 2];
        f.write_scalar(&mut buf, 0xFFFE);
        assert_eq!(f.display_value(&buf).unwrap(), "-2");
    }

    #[test]
    fn char_array_displays_as_string() {
        let f = field(FieldKind::Char, 8, 0);
        assert_eq!(f.display_value(b"root\0\0\0\0").unwrap(), "\"root\"");
    }
}
