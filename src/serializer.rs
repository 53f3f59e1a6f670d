use std::error::Error as StdError;
use std::fmt;

use bstr::ByteSlice;
use serde::ser::{Error as SerdeError, Impossible, Serialize, Serializer};

use crate::byte_row::ByteRow;

/// Convert a single cell to text and append it to `row` as a new field.
///
/// On failure, `row` is left unchanged and the reason is returned.
pub(crate) fn serialize_cell<T: Serialize + ?Sized>(
    value: &T,
    row: &mut ByteRow,
) -> Result<(), String> {
    value.serialize(SeCell { row }).map_err(|err| err.0)
}

/// Why a cell has no text form.
#[derive(Debug)]
struct CellError(String);

impl fmt::Display for CellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl StdError for CellError {}

impl SerdeError for CellError {
    fn custom<T: fmt::Display>(msg: T) -> CellError {
        CellError(msg.to_string())
    }
}

fn unsupported(what: &str) -> CellError {
    CellError(format!("{} cannot be written as a single CSV field", what))
}

/// A serializer for one cell, which must map to exactly one field.
struct SeCell<'r> {
    row: &'r mut ByteRow,
}

impl<'r> SeCell<'r> {
    fn field(self, field: &[u8]) -> Result<(), CellError> {
        self.row.push_field(field);
        Ok(())
    }
}

impl<'r> Serializer for SeCell<'r> {
    type Ok = ();
    type Error = CellError;
    type SerializeSeq = Impossible<(), CellError>;
    type SerializeTuple = Impossible<(), CellError>;
    type SerializeTupleStruct = Impossible<(), CellError>;
    type SerializeTupleVariant = Impossible<(), CellError>;
    type SerializeMap = Impossible<(), CellError>;
    type SerializeStruct = Impossible<(), CellError>;
    type SerializeStructVariant = Impossible<(), CellError>;

    fn serialize_bool(self, v: bool) -> Result<(), CellError> {
        if v {
            self.field(b"true")
        } else {
            self.field(b"false")
        }
    }

    fn serialize_i8(self, v: i8) -> Result<(), CellError> {
        let mut buffer = itoa::Buffer::new();
        self.field(buffer.format(v).as_bytes())
    }

    fn serialize_i16(self, v: i16) -> Result<(), CellError> {
        let mut buffer = itoa::Buffer::new();
        self.field(buffer.format(v).as_bytes())
    }

    fn serialize_i32(self, v: i32) -> Result<(), CellError> {
        let mut buffer = itoa::Buffer::new();
        self.field(buffer.format(v).as_bytes())
    }

    fn serialize_i64(self, v: i64) -> Result<(), CellError> {
        let mut buffer = itoa::Buffer::new();
        self.field(buffer.format(v).as_bytes())
    }

    fn serialize_u8(self, v: u8) -> Result<(), CellError> {
        let mut buffer = itoa::Buffer::new();
        self.field(buffer.format(v).as_bytes())
    }

    fn serialize_u16(self, v: u16) -> Result<(), CellError> {
        let mut buffer = itoa::Buffer::new();
        self.field(buffer.format(v).as_bytes())
    }

    fn serialize_u32(self, v: u32) -> Result<(), CellError> {
        let mut buffer = itoa::Buffer::new();
        self.field(buffer.format(v).as_bytes())
    }

    fn serialize_u64(self, v: u64) -> Result<(), CellError> {
        let mut buffer = itoa::Buffer::new();
        self.field(buffer.format(v).as_bytes())
    }

    fn serialize_f32(self, v: f32) -> Result<(), CellError> {
        let mut buffer = ryu::Buffer::new();
        self.field(buffer.format(v).as_bytes())
    }

    fn serialize_f64(self, v: f64) -> Result<(), CellError> {
        let mut buffer = ryu::Buffer::new();
        self.field(buffer.format(v).as_bytes())
    }

    fn serialize_char(self, v: char) -> Result<(), CellError> {
        self.field(v.encode_utf8(&mut [0; 4]).as_bytes())
    }

    fn serialize_str(self, value: &str) -> Result<(), CellError> {
        self.field(value.as_bytes())
    }

    fn serialize_bytes(self, value: &[u8]) -> Result<(), CellError> {
        match value.to_str() {
            Ok(s) => self.field(s.as_bytes()),
            Err(err) => Err(CellError(format!(
                "byte string is not valid UTF-8 (valid up to byte {})",
                err.valid_up_to()
            ))),
        }
    }

    fn serialize_none(self) -> Result<(), CellError> {
        self.field(b"")
    }

    fn serialize_some<T: ?Sized + Serialize>(
        self,
        value: &T,
    ) -> Result<(), CellError> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<(), CellError> {
        self.field(b"")
    }

    fn serialize_unit_struct(
        self,
        name: &'static str,
    ) -> Result<(), CellError> {
        self.field(name.as_bytes())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<(), CellError> {
        self.field(variant.as_bytes())
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<(), CellError> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        value: &T,
    ) -> Result<(), CellError> {
        value.serialize(self)
    }

    fn serialize_seq(
        self,
        _len: Option<usize>,
    ) -> Result<Self::SerializeSeq, CellError> {
        Err(unsupported("a sequence"))
    }

    fn serialize_tuple(
        self,
        _len: usize,
    ) -> Result<Self::SerializeTuple, CellError> {
        Err(unsupported("a tuple"))
    }

    fn serialize_tuple_struct(
        self,
        name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct, CellError> {
        Err(unsupported(&format!("tuple struct {}", name)))
    }

    fn serialize_tuple_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, CellError> {
        Err(unsupported(&format!("tuple variant {}::{}", name, variant)))
    }

    fn serialize_map(
        self,
        _len: Option<usize>,
    ) -> Result<Self::SerializeMap, CellError> {
        Err(unsupported("a map"))
    }

    fn serialize_struct(
        self,
        name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStruct, CellError> {
        Err(unsupported(&format!("struct {}", name)))
    }

    fn serialize_struct_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, CellError> {
        Err(unsupported(&format!("struct variant {}::{}", name, variant)))
    }
}

#[cfg(test)]
mod tests {
    use bstr::ByteSlice;
    use serde::ser::Error as SerdeError;
    use serde::{Serialize, Serializer};

    use crate::byte_row::ByteRow;

    use super::serialize_cell;

    fn cell<T: Serialize + ?Sized>(value: &T) -> String {
        let mut row = ByteRow::new();
        serialize_cell(value, &mut row).unwrap();
        assert_eq!(row.len(), 1);
        row[0].to_str().unwrap().to_string()
    }

    fn cell_err<T: Serialize + ?Sized>(value: &T) -> String {
        let mut row = ByteRow::new();
        let err = serialize_cell(value, &mut row).unwrap_err();
        assert!(row.is_empty());
        err
    }

    #[test]
    fn scalars() {
        assert_eq!(cell("foo"), "foo");
        assert_eq!(cell(&"bar".to_string()), "bar");
        assert_eq!(cell(&'☃'), "☃");
        assert_eq!(cell(&true), "true");
        assert_eq!(cell(&false), "false");
        assert_eq!(cell(&-42i8), "-42");
        assert_eq!(cell(&u64::max_value()), "18446744073709551615");
        assert_eq!(cell(&i64::min_value()), "-9223372036854775808");
    }

    #[test]
    fn floats() {
        assert_eq!(cell(&1.0f64), "1.0");
        assert_eq!(cell(&0.1f32), "0.1");
        assert_eq!(cell(&-2.5e-8f64), "-2.5e-8");
    }

    #[test]
    fn absent_values() {
        assert_eq!(cell(&None::<i32>), "");
        assert_eq!(cell(&Some(5)), "5");
        assert_eq!(cell(&()), "");
    }

    #[test]
    fn bytes() {
        assert_eq!(cell(b"abc".as_bstr()), "abc");
        let err = cell_err(b"a\xFFc".as_bstr());
        assert!(err.contains("not valid UTF-8"), "{}", err);
    }

    #[derive(Serialize)]
    struct Label;

    #[derive(Serialize)]
    struct Meters(f64);

    #[derive(Serialize)]
    enum Color {
        Red,
        Custom(String),
        Rgb(u8, u8, u8),
    }

    #[derive(Serialize)]
    struct Point {
        x: i32,
        y: i32,
    }

    #[test]
    fn named_values() {
        assert_eq!(cell(&Label), "Label");
        assert_eq!(cell(&Meters(1.5)), "1.5");
        assert_eq!(cell(&Color::Red), "Red");
        assert_eq!(cell(&Color::Custom("teal".to_string())), "teal");
    }

    #[test]
    fn compound_values_fail() {
        assert!(cell_err(&vec![1, 2]).contains("a sequence"));
        assert!(cell_err(&(1, 2)).contains("a tuple"));
        assert!(cell_err(&Color::Rgb(1, 2, 3)).contains("Color::Rgb"));
        assert!(cell_err(&Point { x: 1, y: 2 }).contains("struct Point"));
        let mut map = std::collections::BTreeMap::new();
        map.insert("k", "v");
        assert!(cell_err(&map).contains("a map"));
    }

    struct Refuses;

    impl Serialize for Refuses {
        fn serialize<S: Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("no text for you"))
        }
    }

    #[test]
    fn custom_error_message() {
        assert_eq!(cell_err(&Refuses), "no text for you");
    }
}
