//! Named Binary Tag decoding
//!
//! Big-endian NBT as stored in region chunks. Compounds keep insertion order.

use crate::error::{HubError, Result};

/// Nesting limit for lists and compounds
const MAX_DEPTH: usize = 512;

/// NBT tag ids
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TagType {
    End = 0,
    Byte = 1,
    Short = 2,
    Int = 3,
    Long = 4,
    Float = 5,
    Double = 6,
    ByteArray = 7,
    String = 8,
    List = 9,
    Compound = 10,
    IntArray = 11,
    LongArray = 12,
}

impl TryFrom<u8> for TagType {
    type Error = HubError;

    fn try_from(id: u8) -> Result<Self> {
        Ok(match id {
            0 => Self::End,
            1 => Self::Byte,
            2 => Self::Short,
            3 => Self::Int,
            4 => Self::Long,
            5 => Self::Float,
            6 => Self::Double,
            7 => Self::ByteArray,
            8 => Self::String,
            9 => Self::List,
            10 => Self::Compound,
            11 => Self::IntArray,
            12 => Self::LongArray,
            other => return Err(HubError::nbt(format!("unknown tag type {other}"))),
        })
    }
}

/// A decoded tag payload
#[derive(Debug, Clone, PartialEq)]
pub enum Tag {
    End,
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    ByteArray(Vec<u8>),
    String(String),
    List(Vec<Tag>),
    Compound(Compound),
    IntArray(Vec<i32>),
    LongArray(Vec<i64>),
}

impl Tag {
    pub fn tag_type(&self) -> TagType {
        match self {
            Self::End => TagType::End,
            Self::Byte(_) => TagType::Byte,
            Self::Short(_) => TagType::Short,
            Self::Int(_) => TagType::Int,
            Self::Long(_) => TagType::Long,
            Self::Float(_) => TagType::Float,
            Self::Double(_) => TagType::Double,
            Self::ByteArray(_) => TagType::ByteArray,
            Self::String(_) => TagType::String,
            Self::List(_) => TagType::List,
            Self::Compound(_) => TagType::Compound,
            Self::IntArray(_) => TagType::IntArray,
            Self::LongArray(_) => TagType::LongArray,
        }
    }

    pub fn as_compound(&self) -> Option<&Compound> {
        match self {
            Self::Compound(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Tag]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Any numeric tag, widened or truncated to `i32`
    pub fn as_i32(&self) -> Option<i32> {
        match *self {
            Self::Byte(v) => Some(i32::from(v)),
            Self::Short(v) => Some(i32::from(v)),
            Self::Int(v) => Some(v),
            Self::Long(v) => Some(v as i32),
            Self::Float(v) => Some(v as i32),
            Self::Double(v) => Some(v as i32),
            _ => None,
        }
    }

    pub fn as_byte_array(&self) -> Option<&[u8]> {
        match self {
            Self::ByteArray(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_long_array(&self) -> Option<&[i64]> {
        match self {
            Self::LongArray(v) => Some(v),
            _ => None,
        }
    }
}

/// Ordered compound payload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Compound {
    entries: Vec<(String, Tag)>,
}

impl Compound {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert, replacing an existing key in place
    pub fn insert(&mut self, name: impl Into<String>, tag: Tag) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = tag,
            None => self.entries.push((name, tag)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Tag> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }

    pub fn get_compound(&self, name: &str) -> Option<&Compound> {
        self.get(name).and_then(Tag::as_compound)
    }

    pub fn get_list(&self, name: &str) -> Option<&[Tag]> {
        self.get(name).and_then(Tag::as_list)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Tag::as_str)
    }

    pub fn get_i32(&self, name: &str) -> Option<i32> {
        self.get(name).and_then(Tag::as_i32)
    }

    /// First of several alternative keys that yields a list
    pub fn get_list_any(&self, names: &[&str]) -> Option<&[Tag]> {
        names.iter().find_map(|name| self.get_list(name))
    }

    /// First of several alternative keys that yields a number
    pub fn get_i32_any(&self, names: &[&str]) -> Option<i32> {
        names.iter().find_map(|name| self.get_i32(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tag)> {
        self.entries.iter().map(|(n, t)| (n.as_str(), t))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Decode a complete named root tag
pub fn read_named(data: &[u8]) -> Result<(String, Tag)> {
    let mut reader = NbtReader { data, pos: 0 };
    let tag_type = TagType::try_from(reader.u8()?)?;
    if tag_type == TagType::End {
        return Ok((String::new(), Tag::End));
    }
    let name = reader.string()?;
    let tag = reader.payload(tag_type, 0)?;
    Ok((name, tag))
}

struct NbtReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> NbtReader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| {
                HubError::nbt(format!(
                    "unexpected end of data: need {len} bytes at offset {}",
                    self.pos
                ))
            })?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn i16(&mut self) -> Result<i16> {
        Ok(i16::from_be_bytes(self.array()?))
    }

    fn i32(&mut self) -> Result<i32> {
        Ok(i32::from_be_bytes(self.array()?))
    }

    fn i64(&mut self) -> Result<i64> {
        Ok(i64::from_be_bytes(self.array()?))
    }

    /// Array length prefix, checked against the bytes left
    fn length(&mut self, element_size: usize) -> Result<usize> {
        let raw = self.i32()?;
        let len = usize::try_from(raw)
            .map_err(|_| HubError::nbt(format!("negative length {raw}")))?;
        let remaining = self.data.len() - self.pos;
        if len.saturating_mul(element_size) > remaining {
            return Err(HubError::nbt(format!(
                "length {len} exceeds the {remaining} bytes left"
            )));
        }
        Ok(len)
    }

    fn string(&mut self) -> Result<String> {
        let len = u16::from_be_bytes(self.array()?) as usize;
        let bytes = self.take(len)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    fn payload(&mut self, tag_type: TagType, depth: usize) -> Result<Tag> {
        if depth > MAX_DEPTH {
            return Err(HubError::nbt("nesting too deep"));
        }

        Ok(match tag_type {
            TagType::End => Tag::End,
            TagType::Byte => Tag::Byte(self.u8()? as i8),
            TagType::Short => Tag::Short(self.i16()?),
            TagType::Int => Tag::Int(self.i32()?),
            TagType::Long => Tag::Long(self.i64()?),
            TagType::Float => Tag::Float(f32::from_bits(self.i32()? as u32)),
            TagType::Double => Tag::Double(f64::from_bits(self.i64()? as u64)),
            TagType::ByteArray => {
                let len = self.length(1)?;
                Tag::ByteArray(self.take(len)?.to_vec())
            }
            TagType::String => Tag::String(self.string()?),
            TagType::List => {
                let element_type = TagType::try_from(self.u8()?)?;
                if element_type == TagType::End {
                    // only an empty list may be typed End
                    if self.i32()? != 0 {
                        return Err(HubError::nbt("non-empty list of End tags"));
                    }
                    return Ok(Tag::List(Vec::new()));
                }
                let len = self.length(1)?;
                let mut items = Vec::with_capacity(len);
                for _ in 0..len {
                    items.push(self.payload(element_type, depth + 1)?);
                }
                Tag::List(items)
            }
            TagType::Compound => {
                let mut compound = Compound::new();
                loop {
                    let child_type = TagType::try_from(self.u8()?)?;
                    if child_type == TagType::End {
                        break;
                    }
                    let name = self.string()?;
                    let child = self.payload(child_type, depth + 1)?;
                    compound.insert(name, child);
                }
                Tag::Compound(compound)
            }
            TagType::IntArray => {
                let len = self.length(4)?;
                let mut values = Vec::with_capacity(len);
                for _ in 0..len {
                    values.push(self.i32()?);
                }
                Tag::IntArray(values)
            }
            TagType::LongArray => {
                let len = self.length(8)?;
                let mut values = Vec::with_capacity(len);
                for _ in 0..len {
                    values.push(self.i64()?);
                }
                Tag::LongArray(values)
            }
        })
    }
}
