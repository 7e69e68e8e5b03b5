//! Matter TLV encoding.
//!
//! Each element starts with a control byte: the upper three bits select the
//! tag form, the lower five the element type. Multi-byte values are
//! little-endian.
//!
//! ```text
//! control = tag_control (3 bits) | element_type (5 bits)
//! element = control || tag bytes || [length] || value
//! ```
//!
//! [`TlvReader`] walks a borrowed buffer element by element without
//! allocating; [`TlvWriter`] produces the subset of encodings used by
//! attestation payloads.

use crate::error::VerifyError;

const TAG_CONTROL_MASK: u8 = 0xE0;
const TYPE_MASK: u8 = 0x1F;

const TAG_ANONYMOUS: u8 = 0x00;
const TAG_CONTEXT: u8 = 0x20;
const TAG_COMMON_PROFILE_2: u8 = 0x40;
const TAG_COMMON_PROFILE_4: u8 = 0x60;
const TAG_IMPLICIT_PROFILE_2: u8 = 0x80;
const TAG_IMPLICIT_PROFILE_4: u8 = 0xA0;
const TAG_FULLY_QUALIFIED_6: u8 = 0xC0;
const TAG_FULLY_QUALIFIED_8: u8 = 0xE0;

const TYPE_SIGNED_1: u8 = 0x00;
const TYPE_UNSIGNED_1: u8 = 0x04;
const TYPE_FALSE: u8 = 0x08;
const TYPE_TRUE: u8 = 0x09;
const TYPE_FLOAT_32: u8 = 0x0A;
const TYPE_FLOAT_64: u8 = 0x0B;
const TYPE_UTF8_1: u8 = 0x0C;
const TYPE_BYTES_1: u8 = 0x10;
const TYPE_NULL: u8 = 0x14;
const TYPE_STRUCTURE: u8 = 0x15;
const TYPE_ARRAY: u8 = 0x16;
const TYPE_LIST: u8 = 0x17;
const TYPE_END_OF_CONTAINER: u8 = 0x18;

/// Element tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlvTag {
    /// No tag.
    Anonymous,
    /// Context-specific tag, meaningful only inside its container.
    Context(u8),
    /// Tag in the Matter common profile.
    CommonProfile(u32),
    /// Tag in the profile implied by the surrounding protocol.
    ImplicitProfile(u32),
    /// Vendor-qualified tag.
    FullyQualified {
        /// Vendor identifier.
        vendor_id: u16,
        /// Profile number within the vendor's space.
        profile_number: u16,
        /// Tag number within the profile.
        tag: u32,
    },
}

/// Decoded element value. Strings borrow from the input buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TlvValue<'a> {
    /// Signed integer of any width.
    Signed(i64),
    /// Unsigned integer of any width.
    Unsigned(u64),
    /// Boolean.
    Bool(bool),
    /// Floating point (single precision is widened).
    Float(f64),
    /// UTF-8 string.
    Utf8(&'a str),
    /// Octet string.
    Bytes(&'a [u8]),
    /// Null.
    Null,
    /// Start of a structure.
    Structure,
    /// Start of an array.
    Array,
    /// Start of a list.
    List,
    /// End of the innermost open container.
    EndOfContainer,
}

/// One decoded TLV element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TlvElement<'a> {
    /// Element tag.
    pub tag: TlvTag,
    /// Element value.
    pub value: TlvValue<'a>,
}

impl<'a> TlvElement<'a> {
    /// Unsigned integer value, or a TLV error naming `what`.
    pub fn as_unsigned(&self, what: &str) -> Result<u64, VerifyError> {
        match self.value {
            TlvValue::Unsigned(v) => Ok(v),
            _ => Err(VerifyError::tlv(format!("{what}: expected unsigned integer"))),
        }
    }

    /// Unsigned integer that must fit in `u8`.
    pub fn as_u8(&self, what: &str) -> Result<u8, VerifyError> {
        u8::try_from(self.as_unsigned(what)?)
            .map_err(|_| VerifyError::tlv(format!("{what}: value out of range for u8")))
    }

    /// Unsigned integer that must fit in `u16`.
    pub fn as_u16(&self, what: &str) -> Result<u16, VerifyError> {
        u16::try_from(self.as_unsigned(what)?)
            .map_err(|_| VerifyError::tlv(format!("{what}: value out of range for u16")))
    }

    /// Unsigned integer that must fit in `u32`.
    pub fn as_u32(&self, what: &str) -> Result<u32, VerifyError> {
        u32::try_from(self.as_unsigned(what)?)
            .map_err(|_| VerifyError::tlv(format!("{what}: value out of range for u32")))
    }

    /// Octet string value.
    pub fn as_bytes(&self, what: &str) -> Result<&'a [u8], VerifyError> {
        match self.value {
            TlvValue::Bytes(b) => Ok(b),
            _ => Err(VerifyError::tlv(format!("{what}: expected octet string"))),
        }
    }

    /// UTF-8 string value.
    pub fn as_str(&self, what: &str) -> Result<&'a str, VerifyError> {
        match self.value {
            TlvValue::Utf8(s) => Ok(s),
            _ => Err(VerifyError::tlv(format!("{what}: expected UTF-8 string"))),
        }
    }

    /// Whether this element opens a structure, array or list.
    #[must_use]
    pub fn is_container_start(&self) -> bool {
        matches!(
            self.value,
            TlvValue::Structure | TlvValue::Array | TlvValue::List
        )
    }

    /// Whether this element closes a container.
    #[must_use]
    pub fn is_end_of_container(&self) -> bool {
        matches!(self.value, TlvValue::EndOfContainer)
    }
}

/// Sequential reader over a TLV buffer.
#[derive(Debug, Clone)]
pub struct TlvReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> TlvReader<'a> {
    /// Start reading at the beginning of `data`.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes consumed so far.
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Whether the whole buffer has been consumed.
    #[must_use]
    pub fn is_at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Decode the next element, or `None` at end of input.
    pub fn next_element(&mut self) -> Result<Option<TlvElement<'a>>, VerifyError> {
        if self.is_at_end() {
            return Ok(None);
        }

        let control = self.take_u8()?;
        let tag = self.read_tag(control & TAG_CONTROL_MASK)?;
        let value = self.read_value(control & TYPE_MASK)?;

        if matches!(value, TlvValue::EndOfContainer) && tag != TlvTag::Anonymous {
            return Err(VerifyError::tlv("end-of-container must be anonymous"));
        }

        Ok(Some(TlvElement { tag, value }))
    }

    /// Decode the next element, treating end of input as an error.
    pub fn expect_element(&mut self) -> Result<TlvElement<'a>, VerifyError> {
        self.next_element()?
            .ok_or_else(|| VerifyError::tlv("unexpected end of input"))
    }

    /// Skip the remainder of a container whose start has already been read.
    pub fn skip_container(&mut self) -> Result<(), VerifyError> {
        let mut depth = 1usize;
        while depth > 0 {
            let element = self.expect_element()?;
            if element.is_container_start() {
                depth += 1;
            } else if element.is_end_of_container() {
                depth -= 1;
            }
        }
        Ok(())
    }

    fn read_tag(&mut self, tag_control: u8) -> Result<TlvTag, VerifyError> {
        let tag = match tag_control {
            TAG_ANONYMOUS => TlvTag::Anonymous,
            TAG_CONTEXT => TlvTag::Context(self.take_u8()?),
            TAG_COMMON_PROFILE_2 => TlvTag::CommonProfile(u32::from(self.take_u16()?)),
            TAG_COMMON_PROFILE_4 => TlvTag::CommonProfile(self.take_u32()?),
            TAG_IMPLICIT_PROFILE_2 => TlvTag::ImplicitProfile(u32::from(self.take_u16()?)),
            TAG_IMPLICIT_PROFILE_4 => TlvTag::ImplicitProfile(self.take_u32()?),
            TAG_FULLY_QUALIFIED_6 => TlvTag::FullyQualified {
                vendor_id: self.take_u16()?,
                profile_number: self.take_u16()?,
                tag: u32::from(self.take_u16()?),
            },
            // TAG_FULLY_QUALIFIED_8 is the only remaining 3-bit pattern.
            _ => TlvTag::FullyQualified {
                vendor_id: self.take_u16()?,
                profile_number: self.take_u16()?,
                tag: self.take_u32()?,
            },
        };
        Ok(tag)
    }

    fn read_value(&mut self, element_type: u8) -> Result<TlvValue<'a>, VerifyError> {
        let value = match element_type {
            0x00..=0x03 => {
                let width = 1usize << (element_type - TYPE_SIGNED_1);
                let raw = self.take(width)?;
                TlvValue::Signed(sign_extend(raw))
            },
            0x04..=0x07 => {
                let width = 1usize << (element_type - TYPE_UNSIGNED_1);
                TlvValue::Unsigned(le_u64(self.take(width)?))
            },
            TYPE_FALSE => TlvValue::Bool(false),
            TYPE_TRUE => TlvValue::Bool(true),
            TYPE_FLOAT_32 => {
                let raw = self.take(4)?;
                TlvValue::Float(f64::from(f32::from_le_bytes([
                    raw[0], raw[1], raw[2], raw[3],
                ])))
            },
            TYPE_FLOAT_64 => TlvValue::Float(f64::from_bits(le_u64(self.take(8)?))),
            0x0C..=0x0F => {
                let len = self.take_length(1usize << (element_type - TYPE_UTF8_1))?;
                let raw = self.take(len)?;
                let s = std::str::from_utf8(raw)
                    .map_err(|e| VerifyError::tlv(format!("invalid UTF-8 string: {e}")))?;
                TlvValue::Utf8(s)
            },
            0x10..=0x13 => {
                let len = self.take_length(1usize << (element_type - TYPE_BYTES_1))?;
                TlvValue::Bytes(self.take(len)?)
            },
            TYPE_NULL => TlvValue::Null,
            TYPE_STRUCTURE => TlvValue::Structure,
            TYPE_ARRAY => TlvValue::Array,
            TYPE_LIST => TlvValue::List,
            TYPE_END_OF_CONTAINER => TlvValue::EndOfContainer,
            other => {
                return Err(VerifyError::tlv(format!(
                    "reserved element type 0x{other:02x}"
                )))
            },
        };
        Ok(value)
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], VerifyError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| VerifyError::tlv("element runs past end of input"))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn take_length(&mut self, width: usize) -> Result<usize, VerifyError> {
        let len = le_u64(self.take(width)?);
        usize::try_from(len).map_err(|_| VerifyError::tlv("string length overflows usize"))
    }

    fn take_u8(&mut self) -> Result<u8, VerifyError> {
        Ok(self.take(1)?[0])
    }

    fn take_u16(&mut self) -> Result<u16, VerifyError> {
        let raw = self.take(2)?;
        Ok(u16::from_le_bytes([raw[0], raw[1]]))
    }

    fn take_u32(&mut self) -> Result<u32, VerifyError> {
        let raw = self.take(4)?;
        Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }
}

fn le_u64(raw: &[u8]) -> u64 {
    raw.iter()
        .rev()
        .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte))
}

fn sign_extend(raw: &[u8]) -> i64 {
    let bits = raw.len() * 8;
    let unsigned = le_u64(raw);
    if bits == 64 {
        return unsigned as i64;
    }
    let shift = 64 - bits;
    ((unsigned << shift) as i64) >> shift
}

/// Append-only TLV encoder.
#[derive(Debug, Default, Clone)]
pub struct TlvWriter {
    buf: Vec<u8>,
}

impl TlvWriter {
    /// Create an empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a structure.
    pub fn start_structure(&mut self, tag: TlvTag) -> &mut Self {
        self.put_control(tag, TYPE_STRUCTURE);
        self
    }

    /// Open an array.
    pub fn start_array(&mut self, tag: TlvTag) -> &mut Self {
        self.put_control(tag, TYPE_ARRAY);
        self
    }

    /// Close the innermost container.
    pub fn end_container(&mut self) -> &mut Self {
        self.buf.push(TYPE_END_OF_CONTAINER);
        self
    }

    /// Unsigned integer in the narrowest width that holds it.
    pub fn put_unsigned(&mut self, tag: TlvTag, value: u64) -> &mut Self {
        let (code, width) = match value {
            0..=0xFF => (TYPE_UNSIGNED_1, 1),
            0x100..=0xFFFF => (TYPE_UNSIGNED_1 + 1, 2),
            0x1_0000..=0xFFFF_FFFF => (TYPE_UNSIGNED_1 + 2, 4),
            _ => (TYPE_UNSIGNED_1 + 3, 8),
        };
        self.put_control(tag, code);
        self.buf.extend_from_slice(&value.to_le_bytes()[..width]);
        self
    }

    /// Octet string.
    pub fn put_bytes(&mut self, tag: TlvTag, value: &[u8]) -> &mut Self {
        self.put_string(tag, TYPE_BYTES_1, value);
        self
    }

    /// UTF-8 string.
    pub fn put_utf8(&mut self, tag: TlvTag, value: &str) -> &mut Self {
        self.put_string(tag, TYPE_UTF8_1, value.as_bytes());
        self
    }

    /// Encoded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    fn put_string(&mut self, tag: TlvTag, base: u8, value: &[u8]) {
        let len = value.len() as u64;
        let (code, width) = match len {
            0..=0xFF => (base, 1),
            0x100..=0xFFFF => (base + 1, 2),
            0x1_0000..=0xFFFF_FFFF => (base + 2, 4),
            _ => (base + 3, 8),
        };
        self.put_control(tag, code);
        self.buf.extend_from_slice(&len.to_le_bytes()[..width]);
        self.buf.extend_from_slice(value);
    }

    fn put_control(&mut self, tag: TlvTag, element_type: u8) {
        match tag {
            TlvTag::Anonymous => self.buf.push(TAG_ANONYMOUS | element_type),
            TlvTag::Context(n) => {
                self.buf.push(TAG_CONTEXT | element_type);
                self.buf.push(n);
            },
            TlvTag::CommonProfile(n) => self.put_profile_tag(
                TAG_COMMON_PROFILE_2,
                TAG_COMMON_PROFILE_4,
                element_type,
                n,
            ),
            TlvTag::ImplicitProfile(n) => self.put_profile_tag(
                TAG_IMPLICIT_PROFILE_2,
                TAG_IMPLICIT_PROFILE_4,
                element_type,
                n,
            ),
            TlvTag::FullyQualified {
                vendor_id,
                profile_number,
                tag,
            } => {
                let short = u16::try_from(tag).ok();
                let control = if short.is_some() {
                    TAG_FULLY_QUALIFIED_6
                } else {
                    TAG_FULLY_QUALIFIED_8
                };
                self.buf.push(control | element_type);
                self.buf.extend_from_slice(&vendor_id.to_le_bytes());
                self.buf.extend_from_slice(&profile_number.to_le_bytes());
                match short {
                    Some(t) => self.buf.extend_from_slice(&t.to_le_bytes()),
                    None => self.buf.extend_from_slice(&tag.to_le_bytes()),
                }
            },
        }
    }

    fn put_profile_tag(&mut self, short_control: u8, long_control: u8, element_type: u8, n: u32) {
        match u16::try_from(n) {
            Ok(short) => {
                self.buf.push(short_control | element_type);
                self.buf.extend_from_slice(&short.to_le_bytes());
            },
            Err(_) => {
                self.buf.push(long_control | element_type);
                self.buf.extend_from_slice(&n.to_le_bytes());
            },
        }
    }
}
