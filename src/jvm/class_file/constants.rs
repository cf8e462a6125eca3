use crate::jvm::class_file::{Deserialize, Serialize};
use crate::jvm::descriptors::{RefType, RenderDescriptor};
use crate::jvm::names::{BinaryName, Name};
use crate::jvm::Error;
use crate::util::{Offset, OffsetResult, OffsetVec, Width};
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::borrow::{Borrow, Cow};
use std::collections::HashMap;
use std::fmt;
use std::result::Result;

/// Class file constants pool
///
/// The pool is append only: once a constant has been given an index, that index stays valid (and
/// keeps pointing at the same constant) for as long as the pool lives. Inserting goes through the
/// `get_*` methods or the [`ConstantsWriter`] trait, both of which first check whether an equal
/// constant is already in the pool and return the existing index if so.
pub struct ConstantsPool {
    constants: OffsetVec<Constant>,

    utf8s: HashMap<String, Utf8ConstantIndex>,
    classes: HashMap<Utf8ConstantIndex, ClassConstantIndex>,
    strings: HashMap<Utf8ConstantIndex, StringConstantIndex>,
    name_and_types: HashMap<(Utf8ConstantIndex, Utf8ConstantIndex), NameAndTypeConstantIndex>,
    integers: HashMap<i32, ConstantIndex>,
    floats: HashMap<u32, ConstantIndex>,
    longs: HashMap<i64, ConstantIndex>,
    doubles: HashMap<u64, ConstantIndex>,
}

impl ConstantsPool {
    /// Make a fresh empty constants pool
    pub fn new() -> ConstantsPool {
        ConstantsPool {
            constants: OffsetVec::new_starting_at(Offset(1)),
            utf8s: HashMap::new(),
            classes: HashMap::new(),
            strings: HashMap::new(),
            name_and_types: HashMap::new(),
            integers: HashMap::new(),
            floats: HashMap::new(),
            longs: HashMap::new(),
            doubles: HashMap::new(),
        }
    }

    /// Number of constants in the pool
    ///
    /// This is not the `constant_pool_count` of the class file, since that also counts the unused
    /// zero index and the unusable slots after `long` and `double` constants.
    pub fn len(&self) -> usize {
        self.constants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }

    /// Iterate through constants in index order
    pub fn iter(&self) -> impl Iterator<Item = (ConstantIndex, &Constant)> + '_ {
        self.constants
            .iter()
            .map(|(offset, _, constant)| (ConstantIndex(offset.0 as u16), constant))
    }

    /// Push a constant into the constant pool, provided there is space for it
    ///
    /// Note: the largest valid index is 65535, indexing starts at 1, and some constants take two
    /// spaces.
    fn push_constant(&mut self, constant: Constant) -> Result<ConstantIndex, ConstantPoolOverflow> {
        let offset: u16 = self.constants.offset_len().0 as u16;

        if offset.checked_add(constant.width() as u16).is_none() {
            return Err(ConstantPoolOverflow { constant, offset });
        }

        log::trace!("Adding constant #{} = {:?}", offset, constant);
        self.constants.push(constant);
        Ok(ConstantIndex(offset))
    }

    /// Get or insert a utf8 constant from the constant pool
    pub fn get_utf8<'a, S: Into<Cow<'a, str>>>(
        &mut self,
        utf8: S,
    ) -> Result<Utf8ConstantIndex, ConstantPoolOverflow> {
        let cow = utf8.into();

        if let Some(idx) = self.utf8s.get::<str>(cow.borrow()) {
            Ok(*idx)
        } else {
            let owned = cow.into_owned();
            let constant = Constant::Utf8(owned.clone());
            let idx = Utf8ConstantIndex(self.push_constant(constant)?);
            self.utf8s.insert(owned, idx);
            Ok(idx)
        }
    }

    /// Get or insert a class constant from the constant pool
    pub fn get_class(
        &mut self,
        name: Utf8ConstantIndex,
    ) -> Result<ClassConstantIndex, ConstantPoolOverflow> {
        if let Some(idx) = self.classes.get(&name) {
            Ok(*idx)
        } else {
            let idx = ClassConstantIndex(self.push_constant(Constant::Class(name))?);
            self.classes.insert(name, idx);
            Ok(idx)
        }
    }

    /// Get or insert a string constant from the constant pool
    pub fn get_string(
        &mut self,
        utf8: Utf8ConstantIndex,
    ) -> Result<StringConstantIndex, ConstantPoolOverflow> {
        if let Some(idx) = self.strings.get(&utf8) {
            Ok(*idx)
        } else {
            let idx = StringConstantIndex(self.push_constant(Constant::String(utf8))?);
            self.strings.insert(utf8, idx);
            Ok(idx)
        }
    }

    /// Get or insert a name & type constant from the constant pool
    pub fn get_name_and_type(
        &mut self,
        name: Utf8ConstantIndex,
        descriptor: Utf8ConstantIndex,
    ) -> Result<NameAndTypeConstantIndex, ConstantPoolOverflow> {
        let name_and_type_key = (name, descriptor);
        if let Some(idx) = self.name_and_types.get(&name_and_type_key) {
            Ok(*idx)
        } else {
            let constant = Constant::NameAndType { name, descriptor };
            let idx = NameAndTypeConstantIndex(self.push_constant(constant)?);
            self.name_and_types.insert(name_and_type_key, idx);
            Ok(idx)
        }
    }

    /// Look up a constant by index
    pub fn get(&self, index: ConstantIndex) -> Result<&Constant, Error> {
        if index.0 == 0 {
            return Err(Error::ConstantOutOfRange(index));
        }
        match self.constants.get_offset(Offset(index.0 as usize)) {
            OffsetResult::Ok(_, constant) => Ok(constant),
            OffsetResult::InvalidOffset(_) => Err(Error::UnusableConstantSlot(index)),
            OffsetResult::TooLarge if (index.0 as usize) < self.constants.offset_len().0 => {
                Err(Error::UnusableConstantSlot(index))
            }
            OffsetResult::TooLarge | OffsetResult::TooSmall => {
                Err(Error::ConstantOutOfRange(index))
            }
        }
    }

    /// Look up a constant by index, checking that it is of the expected kind
    pub fn get_constant(
        &self,
        index: ConstantIndex,
        expected: ConstantTag,
    ) -> Result<&Constant, Error> {
        let constant = self.get(index)?;
        let found = constant.tag();
        if found != expected {
            return Err(Error::BadConstantKind {
                index,
                expected,
                found,
            });
        }
        Ok(constant)
    }

    /// Dereference a utf8 constant
    pub fn utf8(&self, index: Utf8ConstantIndex) -> Result<&str, Error> {
        match self.get(index.0)? {
            Constant::Utf8(string) => Ok(string),
            other => Err(Error::BadConstantKind {
                index: index.0,
                expected: ConstantTag::Utf8,
                found: other.tag(),
            }),
        }
    }

    /// Dereference a class constant all the way to the binary name of the class
    pub fn class_name(&self, index: ClassConstantIndex) -> Result<&str, Error> {
        match self.get(index.0)? {
            Constant::Class(name) => self.utf8(*name),
            other => Err(Error::BadConstantKind {
                index: index.0,
                expected: ConstantTag::Class,
                found: other.tag(),
            }),
        }
    }

    /// Check that every constant referring to another constant in the pool refers to one of the
    /// right kind
    ///
    /// Constants are allowed to be forward references while the pool is being built up, so this
    /// only makes sense right before the pool is emitted.
    pub fn check_well_formed(&self) -> Result<(), Error> {
        for (_, constant) in self.iter() {
            match constant {
                Constant::Class(name) | Constant::String(name) => {
                    self.get_constant(name.0, ConstantTag::Utf8)?;
                }
                Constant::NameAndType { name, descriptor } => {
                    self.get_constant(name.0, ConstantTag::Utf8)?;
                    self.get_constant(descriptor.0, ConstantTag::Utf8)?;
                }
                Constant::Utf8(_)
                | Constant::Integer(_)
                | Constant::Float(_)
                | Constant::Long(_)
                | Constant::Double(_) => (),
            }
        }
        Ok(())
    }

    /// Check the pool is well-formed, then serialize it
    pub fn emit<W: WriteBytesExt>(&self, writer: &mut W) -> Result<(), Error> {
        self.check_well_formed()?;
        self.serialize(writer).map_err(Error::IoError)
    }

    /// Read a pool (starting at `constant_pool_count`) from a class file
    ///
    /// The deduplication tables are rebuilt, so the pool can keep being extended afterwards. If
    /// the input contains duplicate constants, the first one is the one that gets reused.
    pub fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<ConstantsPool, Error> {
        let count = u16::deserialize(reader).map_err(Error::IoError)?;
        let mut pool = ConstantsPool::new();
        while pool.constants.offset_len().0 < count as usize {
            let constant = Constant::read(reader)?;
            let index = pool.push_constant(constant.clone())?;
            pool.remember(index, constant);
        }
        log::debug!("Read {} constants", pool.len());
        Ok(pool)
    }

    /// Record a constant that has already been pushed in the deduplication tables
    fn remember(&mut self, index: ConstantIndex, constant: Constant) {
        match constant {
            Constant::Utf8(string) => {
                self.utf8s.entry(string).or_insert(Utf8ConstantIndex(index));
            }
            Constant::Integer(integer) => {
                self.integers.entry(integer).or_insert(index);
            }
            Constant::Float(float) => {
                self.floats.entry(float.to_bits()).or_insert(index);
            }
            Constant::Long(long) => {
                self.longs.entry(long).or_insert(index);
            }
            Constant::Double(double) => {
                self.doubles.entry(double.to_bits()).or_insert(index);
            }
            Constant::Class(name) => {
                self.classes.entry(name).or_insert(ClassConstantIndex(index));
            }
            Constant::String(utf8) => {
                self.strings.entry(utf8).or_insert(StringConstantIndex(index));
            }
            Constant::NameAndType { name, descriptor } => {
                self.name_and_types
                    .entry((name, descriptor))
                    .or_insert(NameAndTypeConstantIndex(index));
            }
        }
    }
}

impl Default for ConstantsPool {
    fn default() -> Self {
        ConstantsPool::new()
    }
}

impl fmt::Debug for ConstantsPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.constants.fmt(f)
    }
}

/// Count (including the unused zero index) followed by the constants
impl Serialize for ConstantsPool {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        (self.constants.offset_len().0 as u16).serialize(writer)?;
        for (_, constant) in self.iter() {
            constant.serialize(writer)?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct ConstantPoolOverflow {
    pub constant: Constant,
    pub offset: u16,
}

/// Tag byte identifying the kind of a constant in its binary form
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.4-140
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub enum ConstantTag {
    Utf8,
    Integer,
    Float,
    Long,
    Double,
    Class,
    String,
    NameAndType,
}

impl ConstantTag {
    pub const fn as_u8(self) -> u8 {
        match self {
            ConstantTag::Utf8 => 1,
            ConstantTag::Integer => 3,
            ConstantTag::Float => 4,
            ConstantTag::Long => 5,
            ConstantTag::Double => 6,
            ConstantTag::Class => 7,
            ConstantTag::String => 8,
            ConstantTag::NameAndType => 12,
        }
    }

    pub fn from_u8(tag: u8) -> Option<ConstantTag> {
        match tag {
            1 => Some(ConstantTag::Utf8),
            3 => Some(ConstantTag::Integer),
            4 => Some(ConstantTag::Float),
            5 => Some(ConstantTag::Long),
            6 => Some(ConstantTag::Double),
            7 => Some(ConstantTag::Class),
            8 => Some(ConstantTag::String),
            12 => Some(ConstantTag::NameAndType),
            _ => None,
        }
    }
}

impl Serialize for ConstantTag {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.as_u8().serialize(writer)
    }
}

/// Constants as in the constant pool
///
/// Note: only the constants needed for generating method bodies and their debug information are
/// modelled (no member references, method handles, or dynamic call sites).
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.4
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    /// Class or an interface
    ///
    /// The index should point at a `Utf8` constant holding the binary name, but this is only
    /// checked when the pool is emitted.
    Class(Utf8ConstantIndex),

    /// Constant object of type `java.lang.String`
    String(Utf8ConstantIndex),

    /// Constant primitive of type `int`
    Integer(i32),

    /// Constant primitive of type `float`
    Float(f32),

    /// Constant primitive of type `long`
    Long(i64),

    /// Constant primitive of type `double`
    Double(f64),

    /// Name and a type (eg. for a field or a method)
    NameAndType {
        name: Utf8ConstantIndex,
        descriptor: Utf8ConstantIndex,
    },

    /// Constant UTF-8 encoded raw string value
    ///
    /// Despite the name, the encoding is not quite UTF-8 (the encoding of the
    /// null character `\u{0000}` and the encoding of supplementary characters
    /// is different).
    Utf8(String),
}

impl Constant {
    /// Class constant pointing at an explicit index
    pub const fn class(name_index: u16) -> Constant {
        Constant::Class(Utf8ConstantIndex(ConstantIndex(name_index)))
    }

    pub fn tag(&self) -> ConstantTag {
        match self {
            Constant::Class(_) => ConstantTag::Class,
            Constant::String(_) => ConstantTag::String,
            Constant::Integer(_) => ConstantTag::Integer,
            Constant::Float(_) => ConstantTag::Float,
            Constant::Long(_) => ConstantTag::Long,
            Constant::Double(_) => ConstantTag::Double,
            Constant::NameAndType { .. } => ConstantTag::NameAndType,
            Constant::Utf8(_) => ConstantTag::Utf8,
        }
    }

    /// Read a full constant (tag included)
    pub fn read<R: ReadBytesExt>(reader: &mut R) -> Result<Constant, Error> {
        let tag = u8::deserialize(reader).map_err(Error::IoError)?;
        let tag = ConstantTag::from_u8(tag).ok_or(Error::UnknownConstantTag(tag))?;
        Constant::read_body(tag, reader)
    }

    /// Read the part of a constant following its tag
    pub fn read_body<R: ReadBytesExt>(
        tag: ConstantTag,
        reader: &mut R,
    ) -> Result<Constant, Error> {
        let constant = match tag {
            ConstantTag::Class => Constant::Class(Deserialize::deserialize(reader)?),
            ConstantTag::String => Constant::String(Deserialize::deserialize(reader)?),
            ConstantTag::Integer => Constant::Integer(Deserialize::deserialize(reader)?),
            ConstantTag::Float => Constant::Float(Deserialize::deserialize(reader)?),
            ConstantTag::Long => Constant::Long(Deserialize::deserialize(reader)?),
            ConstantTag::Double => Constant::Double(Deserialize::deserialize(reader)?),
            ConstantTag::NameAndType => Constant::NameAndType {
                name: Deserialize::deserialize(reader)?,
                descriptor: Deserialize::deserialize(reader)?,
            },
            ConstantTag::Utf8 => {
                let len = u16::deserialize(reader)?;
                let mut buffer = vec![0u8; len as usize];
                reader.read_exact(&mut buffer)?;
                match decode_modified_utf8(&buffer) {
                    Some(string) => Constant::Utf8(string),
                    None => return Err(Error::MalformedUtf8(buffer)),
                }
            }
        };
        Ok(constant)
    }

    /// Semantic value of the constant, following references through the pool
    pub fn resolve<'a>(&'a self, pool: &'a ConstantsPool) -> Result<ConstantValue<'a>, Error> {
        let value = match self {
            Constant::Class(name) => ConstantValue::Class(pool.utf8(*name)?),
            Constant::String(utf8) => ConstantValue::String(pool.utf8(*utf8)?),
            Constant::Integer(integer) => ConstantValue::Integer(*integer),
            Constant::Float(float) => ConstantValue::Float(*float),
            Constant::Long(long) => ConstantValue::Long(*long),
            Constant::Double(double) => ConstantValue::Double(*double),
            Constant::NameAndType { name, descriptor } => ConstantValue::NameAndType {
                name: pool.utf8(*name)?,
                descriptor: pool.utf8(*descriptor)?,
            },
            Constant::Utf8(string) => ConstantValue::Utf8(string),
        };
        Ok(value)
    }

    /// Dispatch to the visitor method for this kind of constant
    pub fn accept<V: ConstantVisitor>(&self, visitor: &mut V) {
        match self {
            Constant::Class(name) => visitor.visit_class(*name),
            Constant::String(utf8) => visitor.visit_string(*utf8),
            Constant::Integer(integer) => visitor.visit_integer(*integer),
            Constant::Float(float) => visitor.visit_float(*float),
            Constant::Long(long) => visitor.visit_long(*long),
            Constant::Double(double) => visitor.visit_double(*double),
            Constant::NameAndType { name, descriptor } => {
                visitor.visit_name_and_type(*name, *descriptor)
            }
            Constant::Utf8(string) => visitor.visit_utf8(string),
        }
    }
}

impl Serialize for Constant {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.tag().serialize(writer)?;
        match self {
            Constant::Utf8(string) => {
                let buffer: Vec<u8> = encode_modified_utf8(string);
                let length = u16::try_from(buffer.len()).map_err(|_| {
                    let msg = format!("Utf8 constant is {} bytes long", buffer.len());
                    std::io::Error::new(std::io::ErrorKind::InvalidInput, msg)
                })?;
                length.serialize(writer)?;
                writer.write_all(&buffer)?;
            }
            Constant::Integer(integer) => integer.serialize(writer)?,
            Constant::Float(float) => float.serialize(writer)?,
            Constant::Long(long) => long.serialize(writer)?,
            Constant::Double(double) => double.serialize(writer)?,
            Constant::Class(name) => name.serialize(writer)?,
            Constant::String(utf8) => utf8.serialize(writer)?,
            Constant::NameAndType { name, descriptor } => {
                name.serialize(writer)?;
                descriptor.serialize(writer)?;
            }
        };
        Ok(())
    }
}

/// Almost all constants have width 1, except for `Constant::Long` and `Constant::Double`. Quoting
/// the spec:
///
/// > All 8-byte constants take up two entries in the constant_pool table of the class file. If a
/// > CONSTANT_Long_info or CONSTANT_Double_info structure is the item in the constant_pool table
/// > at index n, then the next usable item in the pool is located at index n+2. The constant_pool
/// > index n+1 must be valid but is considered unusable.
impl Width for Constant {
    fn width(&self) -> usize {
        match self {
            Constant::Long(_) | Constant::Double(_) => 2,
            _ => 1,
        }
    }
}

/// Value of a constant after references through the pool have been followed
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstantValue<'a> {
    /// Binary name of the class
    Class(&'a str),
    String(&'a str),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    NameAndType { name: &'a str, descriptor: &'a str },
    Utf8(&'a str),
}

/// Visitor over the different kinds of constants (see [`Constant::accept`])
///
/// Every method has an empty default, so implementors only need to override the kinds they care
/// about.
pub trait ConstantVisitor {
    fn visit_class(&mut self, _name: Utf8ConstantIndex) {}
    fn visit_string(&mut self, _utf8: Utf8ConstantIndex) {}
    fn visit_integer(&mut self, _integer: i32) {}
    fn visit_float(&mut self, _float: f32) {}
    fn visit_long(&mut self, _long: i64) {}
    fn visit_double(&mut self, _double: f64) {}
    fn visit_name_and_type(&mut self, _name: Utf8ConstantIndex, _descriptor: Utf8ConstantIndex) {}
    fn visit_utf8(&mut self, _utf8: &str) {}
}

/// Modified UTF-8 format used in class files.
///
/// See [this `DataInput` section for details][0]. Quoting from that section:
///
/// > The differences between this format and the standard UTF-8 format are the following:
/// >
/// >  * The null byte `\u0000` is encoded in 2-byte format rather than 1-byte, so that the encoded
/// >    strings never have embedded nulls.
/// >  * Only the 1-byte, 2-byte, and 3-byte formats are used.
/// >  * Supplementary characters are represented in the form of surrogate pairs.
///
/// [0]: https://docs.oracle.com/en/java/javase/17/docs/api/java.base/java/io/DataInput.html#modified-utf-8
pub fn encode_modified_utf8(string: &str) -> Vec<u8> {
    let mut buffer: Vec<u8> = vec![];
    for c in string.chars() {
        // Handle the exception for how `\u{0000}` is represented
        let len: usize = if c == '\u{0000}' { 2 } else { c.len_utf8() };
        let code: u32 = c as u32;

        match len {
            1 => buffer.push(code as u8),
            2 => {
                buffer.push((code >> 6 & 0x1F) as u8 | 0b1100_0000);
                buffer.push((code & 0x3F) as u8 | 0b1000_0000);
            }
            3 => {
                buffer.push((code >> 12 & 0x0F) as u8 | 0b1110_0000);
                buffer.push((code >> 6 & 0x3F) as u8 | 0b1000_0000);
                buffer.push((code & 0x3F) as u8 | 0b1000_0000);
            }

            // Supplementary characters: main divergence from unicode
            _ => {
                buffer.push(0b1110_1101);
                buffer.push(((code >> 16 & 0x0F) as u8).wrapping_sub(1) & 0x0F | 0b1010_0000);
                buffer.push((code >> 10 & 0x3F) as u8 | 0b1000_0000);

                buffer.push(0b1110_1101);
                buffer.push(((code >> 6 & 0x0F) as u8) | 0b1011_0000);
                buffer.push((code & 0x3F) as u8 | 0b1000_0000);
            }
        }
    }
    buffer
}

/// Inverse of [`encode_modified_utf8`]
///
/// Every 1, 2, or 3 byte group decodes to one UTF-16 code unit, so surrogate pairs come back
/// together when the code units are turned into a string. Returns `None` on malformed input
/// (including raw null bytes and unpaired surrogates).
pub fn decode_modified_utf8(bytes: &[u8]) -> Option<String> {
    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut bytes = bytes.iter().copied();
    let continuation = |byte: Option<u8>| -> Option<u16> {
        match byte {
            Some(b) if b & 0b1100_0000 == 0b1000_0000 => Some((b & 0x3F) as u16),
            _ => None,
        }
    };

    while let Some(b0) = bytes.next() {
        let unit = if b0 == 0 {
            return None;
        } else if b0 & 0b1000_0000 == 0 {
            b0 as u16
        } else if b0 & 0b1110_0000 == 0b1100_0000 {
            let b1 = continuation(bytes.next())?;
            ((b0 & 0x1F) as u16) << 6 | b1
        } else if b0 & 0b1111_0000 == 0b1110_0000 {
            let b1 = continuation(bytes.next())?;
            let b2 = continuation(bytes.next())?;
            ((b0 & 0x0F) as u16) << 12 | b1 << 6 | b2
        } else {
            return None;
        };
        units.push(unit);
    }

    String::from_utf16(&units).ok()
}

#[cfg(test)]
mod modified_utf8_tests {
    use super::*;

    #[test]
    fn containing_null_byte() {
        assert_eq!(encode_modified_utf8("a\x00a"), vec![97, 192, 128, 97]);
        assert_eq!(decode_modified_utf8(&[97, 192, 128, 97]).unwrap(), "a\x00a");
    }

    #[test]
    fn simple_ascii() {
        assert_eq!(encode_modified_utf8("foo"), vec![102, 111, 111]);
        assert_eq!(decode_modified_utf8(b"hel10_World").unwrap(), "hel10_World");
    }

    #[test]
    fn two_and_three_byte_encodings() {
        let two = "ĄǍǞǠǺȀȂȦȺӐӒ";
        let three = "ऄअॲঅਅઅଅஅఅಅഅะະ༁ཨ";
        assert_eq!(encode_modified_utf8(two), two.as_bytes());
        assert_eq!(encode_modified_utf8(three), three.as_bytes());
        assert_eq!(decode_modified_utf8(two.as_bytes()).unwrap(), two);
        assert_eq!(decode_modified_utf8(three.as_bytes()).unwrap(), three);
    }

    #[test]
    fn supplementary_characters() {
        let encoded = vec![
            237, 160, 128, 237, 176, 128, 237, 172, 191, 237, 191, 191, 237, 175, 191, 237, 191,
            191,
        ];
        assert_eq!(encode_modified_utf8("\u{10000}\u{dffff}\u{10FFFF}"), encoded);
        assert_eq!(
            decode_modified_utf8(&encoded).unwrap(),
            "\u{10000}\u{dffff}\u{10FFFF}"
        );
    }

    #[test]
    fn malformed_input() {
        assert_eq!(decode_modified_utf8(&[0]), None);
        assert_eq!(decode_modified_utf8(&[0b1100_0001]), None);
        assert_eq!(decode_modified_utf8(&[0b1110_0001, 0b1000_0000, 0x41]), None);
        assert_eq!(decode_modified_utf8(&[0xFF]), None);

        // Lone high surrogate
        assert_eq!(decode_modified_utf8(&[237, 160, 128]), None);
    }
}

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug, PartialOrd, Ord)]
pub struct ConstantIndex(pub u16);

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct Utf8ConstantIndex(pub ConstantIndex);

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct StringConstantIndex(pub ConstantIndex);

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct NameAndTypeConstantIndex(pub ConstantIndex);

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct ClassConstantIndex(pub ConstantIndex);

/// Typed indices are all just `u16` offsets into the pool in their binary form
macro_rules! typed_constant_index {
    ($($index:ident),*) => {
        $(
            impl From<$index> for ConstantIndex {
                fn from(index: $index) -> ConstantIndex {
                    index.0
                }
            }

            impl Serialize for $index {
                fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
                    self.0.serialize(writer)
                }
            }

            impl Deserialize for $index {
                fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::io::Result<Self> {
                    Ok($index(ConstantIndex::deserialize(reader)?))
                }
            }
        )*
    };
}

typed_constant_index!(
    Utf8ConstantIndex,
    StringConstantIndex,
    NameAndTypeConstantIndex,
    ClassConstantIndex
);

impl Serialize for ConstantIndex {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}

impl Deserialize for ConstantIndex {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::io::Result<Self> {
        Ok(ConstantIndex(u16::deserialize(reader)?))
    }
}

/// Loadable constant data (what `ldc` and friends can push onto the stack)
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantData {
    String(String),
    Class(RefType<BinaryName>),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
}

pub trait ConstantsWriter<Index = ConstantIndex> {
    /// Get or insert a constant into the constant pool and return the associated index
    fn constant_index(
        &self,
        constants_pool: &mut ConstantsPool,
    ) -> Result<Index, ConstantPoolOverflow>;
}

/// Write a `CONSTANT_Class_info` for a class or interface
impl ConstantsWriter<ClassConstantIndex> for BinaryName {
    fn constant_index(
        &self,
        constants: &mut ConstantsPool,
    ) -> Result<ClassConstantIndex, ConstantPoolOverflow> {
        let name = constants.get_utf8(self.as_str())?;
        constants.get_class(name)
    }
}

/// When making a `CONSTANT_Class_info`, reference types are almost always objects. However,
/// there are a handful of places where an array type needs to be fit in (eg. for a `checkcast`
/// to an array type). See [this section of the spec][0] for more.
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.4.1
impl ConstantsWriter<ClassConstantIndex> for RefType<BinaryName> {
    fn constant_index(
        &self,
        constants: &mut ConstantsPool,
    ) -> Result<ClassConstantIndex, ConstantPoolOverflow> {
        match self {
            RefType::Object(class) => class.constant_index(constants),
            other => {
                let name = constants.get_utf8(other.render())?;
                constants.get_class(name)
            }
        }
    }
}

/// Write a constant which can be loaded up using `ldc` or `ldc2_w`
impl ConstantsWriter<ConstantIndex> for ConstantData {
    fn constant_index(
        &self,
        constants: &mut ConstantsPool,
    ) -> Result<ConstantIndex, ConstantPoolOverflow> {
        match self {
            ConstantData::String(string) => {
                let str_utf8 = constants.get_utf8(string.as_str())?;
                Ok(constants.get_string(str_utf8)?.into())
            }
            ConstantData::Class(class) => Ok(class.constant_index(constants)?.into()),
            ConstantData::Integer(integer) => {
                if let Some(idx) = constants.integers.get(integer) {
                    Ok(*idx)
                } else {
                    let idx = constants.push_constant(Constant::Integer(*integer))?;
                    constants.integers.insert(*integer, idx);
                    Ok(idx)
                }
            }
            ConstantData::Long(long) => {
                if let Some(idx) = constants.longs.get(long) {
                    Ok(*idx)
                } else {
                    let idx = constants.push_constant(Constant::Long(*long))?;
                    constants.longs.insert(*long, idx);
                    Ok(idx)
                }
            }
            ConstantData::Float(float) => {
                let bits = float.to_bits();
                if let Some(idx) = constants.floats.get(&bits) {
                    Ok(*idx)
                } else {
                    let idx = constants.push_constant(Constant::Float(*float))?;
                    constants.floats.insert(bits, idx);
                    Ok(idx)
                }
            }
            ConstantData::Double(double) => {
                let bits = double.to_bits();
                if let Some(idx) = constants.doubles.get(&bits) {
                    Ok(*idx)
                } else {
                    let idx = constants.push_constant(Constant::Double(*double))?;
                    constants.doubles.insert(bits, idx);
                    Ok(idx)
                }
            }
        }
    }
}
