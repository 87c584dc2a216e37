//! The row codec (C3): a self-describing binary grammar over [`Value`]s,
//! one marker byte per field followed by its payload, with a single
//! `0xFF` separator after the last field of a row (§4.1).

use common::{ColumnType, Row, Schema, Value};
use std::io::{self, Read, Write};

pub const MARKER_NULL: u8 = 0x00;
pub const MARKER_TEXT: u8 = 0x01;
pub const MARKER_INTEGER: u8 = 0x02;
pub const MARKER_LONG: u8 = 0x03;
pub const MARKER_REAL: u8 = 0x04;
pub const MARKER_DATETIME: u8 = 0x05;
pub const MARKER_DECIMAL: u8 = 0x06;

/// The byte terminating every framed row.
pub const ROW_SEPARATOR: u8 = 0xFF;

fn marker_for(value: &Value) -> u8 {
    match value {
        Value::Null => MARKER_NULL,
        Value::Text(_) => MARKER_TEXT,
        Value::Integer(_) => MARKER_INTEGER,
        Value::Long(_) => MARKER_LONG,
        Value::Real(_) => MARKER_REAL,
        Value::DateTime(_) => MARKER_DATETIME,
        Value::Decimal(_) => MARKER_DECIMAL,
    }
}

fn expected_marker(column_type: ColumnType) -> u8 {
    match column_type {
        ColumnType::Integer => MARKER_INTEGER,
        ColumnType::Long => MARKER_LONG,
        ColumnType::Text => MARKER_TEXT,
        ColumnType::Real => MARKER_REAL,
    }
}

/// Writes a single field (marker + payload) to `out`.
pub fn encode_value<W: Write>(out: &mut W, value: &Value) -> io::Result<()> {
    out.write_all(&[marker_for(value)])?;
    match value {
        Value::Null => {}
        Value::Text(s) => {
            let bytes = s.as_bytes();
            out.write_all(&(bytes.len() as u32).to_le_bytes())?;
            out.write_all(bytes)?;
        }
        Value::Integer(v) => out.write_all(&v.to_le_bytes())?,
        Value::Long(v) => out.write_all(&v.to_le_bytes())?,
        Value::Real(v) => out.write_all(&v.to_le_bytes())?,
        Value::DateTime(ticks) => out.write_all(&ticks.to_le_bytes())?,
        Value::Decimal(d) => out.write_all(&decimal_to_limbs(*d))?,
    }
    Ok(())
}

/// Encodes an entire row in the schema's declared column order, followed
/// by the row separator.
pub fn encode_row<W: Write>(out: &mut W, schema: &Schema, row: &Row) -> io::Result<()> {
    for column in schema.columns() {
        let value = row.get(&column.name).cloned().unwrap_or(Value::Null);
        encode_value(out, &value)?;
    }
    out.write_all(&[ROW_SEPARATOR])
}

/// The outcome of attempting to decode one row from a byte stream.
pub enum DecodedRow {
    Row(Row),
    /// Clean end of stream: no partial row was in flight.
    Eof,
    /// A marker byte didn't match the declared column type, or the row
    /// separator was missing where expected — the caller should resync.
    Corrupt(String),
}

/// Unwinds out of `decode_row` the moment any read hits EOF, from
/// whatever depth it happens at — per §4.1, EOF mid-row always means
/// "stop, cleanly", never corruption.
fn read_exact_eof<R: Read>(input: &mut R, buf: &mut [u8]) -> Result<(), EofSignal> {
    input.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            EofSignal::Eof
        } else {
            EofSignal::Io(e)
        }
    })
}

enum EofSignal {
    Eof,
    Io(io::Error),
}

/// Decodes one framed row, validating each marker against the schema's
/// declared column type (§6). On success, consumes exactly up to and
/// including the trailing `0xFF`. Any EOF encountered while a row is in
/// flight (mid-field, or at the trailing separator) is reported as a
/// clean [`DecodedRow::Eof`], never as corruption — only a byte that
/// disagrees with what the grammar expects is corruption.
pub fn decode_row<R: Read>(input: &mut R, schema: &Schema) -> io::Result<DecodedRow> {
    match decode_row_inner(input, schema) {
        Ok(outcome) => Ok(outcome),
        Err(EofSignal::Eof) => Ok(DecodedRow::Eof),
        Err(EofSignal::Io(e)) => Err(e),
    }
}

fn decode_row_inner<R: Read>(input: &mut R, schema: &Schema) -> Result<DecodedRow, EofSignal> {
    let mut row = Row::with_capacity(schema.columns().len());
    for column in schema.columns() {
        let mut marker_buf = [0u8; 1];
        read_exact_eof(input, &mut marker_buf)?;
        let marker = marker_buf[0];
        if marker != MARKER_NULL && marker != expected_marker(column.column_type) {
            return Ok(DecodedRow::Corrupt(format!(
                "column {} expected marker 0x{:02X}, found 0x{:02X}",
                column.name,
                expected_marker(column.column_type),
                marker
            )));
        }
        let value = match marker {
            MARKER_NULL => Value::Null,
            MARKER_TEXT => {
                let mut len_buf = [0u8; 4];
                read_exact_eof(input, &mut len_buf)?;
                let len = u32::from_le_bytes(len_buf) as usize;
                let mut buf = vec![0u8; len];
                read_exact_eof(input, &mut buf)?;
                match String::from_utf8(buf) {
                    Ok(s) => Value::Text(s),
                    Err(e) => {
                        return Ok(DecodedRow::Corrupt(format!("invalid utf-8 in text field: {e}")));
                    }
                }
            }
            MARKER_INTEGER => {
                let mut buf = [0u8; 4];
                read_exact_eof(input, &mut buf)?;
                Value::Integer(i32::from_le_bytes(buf))
            }
            MARKER_LONG => {
                let mut buf = [0u8; 8];
                read_exact_eof(input, &mut buf)?;
                Value::Long(i64::from_le_bytes(buf))
            }
            MARKER_REAL => {
                let mut buf = [0u8; 8];
                read_exact_eof(input, &mut buf)?;
                Value::Real(f64::from_le_bytes(buf))
            }
            MARKER_DATETIME => {
                let mut buf = [0u8; 8];
                read_exact_eof(input, &mut buf)?;
                Value::DateTime(i64::from_le_bytes(buf))
            }
            MARKER_DECIMAL => {
                let mut limbs = [0u8; 16];
                read_exact_eof(input, &mut limbs)?;
                Value::Decimal(limbs_to_decimal(limbs))
            }
            other => {
                return Ok(DecodedRow::Corrupt(format!(
                    "unknown type marker 0x{other:02X}"
                )));
            }
        };
        row.set(column.name.clone(), value);
    }

    let mut sep = [0u8; 1];
    read_exact_eof(input, &mut sep)?;
    if sep[0] == ROW_SEPARATOR {
        Ok(DecodedRow::Row(row))
    } else {
        Ok(DecodedRow::Corrupt(format!(
            "expected row separator 0xFF, found 0x{:02X}",
            sep[0]
        )))
    }
}

/// Scans forward until a `0xFF` byte is consumed (or EOF), used to
/// resynchronize after a [`DecodedRow::Corrupt`] result (§4.1).
pub fn resync<R: Read>(input: &mut R) -> io::Result<bool> {
    let mut byte = [0u8; 1];
    loop {
        match input.read_exact(&mut byte) {
            Ok(()) => {
                if byte[0] == ROW_SEPARATOR {
                    return Ok(true);
                }
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(false),
            Err(e) => return Err(e),
        }
    }
}

/// Packs a `Decimal` into the four little-endian `u32` limbs described by
/// §4.1/Decimal128 in the glossary: `[lo, mid, hi, flags]`, matching the
/// `System.Decimal` bit layout `rust_decimal` is designed to interoperate
/// with.
fn decimal_to_limbs(d: common::Decimal128) -> [u8; 16] {
    d.serialize()
}

fn limbs_to_decimal(limbs: [u8; 16]) -> common::Decimal128 {
    common::Decimal128::deserialize(limbs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Column;
    use std::io::Cursor;

    fn schema() -> Schema {
        Schema::new(vec![
            Column::new("id", ColumnType::Integer),
            Column::new("name", ColumnType::Text),
            Column::new("score", ColumnType::Real),
        ])
    }

    #[test]
    fn round_trips_a_simple_row() {
        let schema = schema();
        let mut row = Row::new();
        row.set("id", Value::Integer(7));
        row.set("name", Value::Text("hello".into()));
        row.set("score", Value::Real(3.5));

        let mut buf = Vec::new();
        encode_row(&mut buf, &schema, &row).unwrap();
        assert_eq!(*buf.last().unwrap(), ROW_SEPARATOR);

        let mut cursor = Cursor::new(buf);
        match decode_row(&mut cursor, &schema).unwrap() {
            DecodedRow::Row(decoded) => {
                assert_eq!(decoded.get("id"), Some(&Value::Integer(7)));
                assert_eq!(decoded.get("name"), Some(&Value::Text("hello".into())));
            }
            _ => panic!("expected a decoded row"),
        }
    }

    #[test]
    fn null_is_legal_for_any_declared_type() {
        let schema = schema();
        let row = Row::new();
        let mut buf = Vec::new();
        encode_row(&mut buf, &schema, &row).unwrap();
        let mut cursor = Cursor::new(buf);
        match decode_row(&mut cursor, &schema).unwrap() {
            DecodedRow::Row(decoded) => {
                assert_eq!(decoded.get("id"), Some(&Value::Null));
            }
            _ => panic!("expected a decoded row"),
        }
    }

    #[test]
    fn clean_eof_before_any_row_is_not_an_error() {
        let schema = schema();
        let mut cursor = Cursor::new(Vec::<u8>::new());
        assert!(matches!(
            decode_row(&mut cursor, &schema).unwrap(),
            DecodedRow::Eof
        ));
    }

    #[test]
    fn type_mismatch_is_reported_as_corrupt() {
        let schema = schema();
        // Integer column, but marker says Text.
        let mut buf = vec![MARKER_TEXT];
        buf.extend_from_slice(&0u32.to_le_bytes());
        let mut cursor = Cursor::new(buf);
        match decode_row(&mut cursor, &schema).unwrap() {
            DecodedRow::Corrupt(_) => {}
            _ => panic!("expected corruption to be detected"),
        }
    }

    #[test]
    fn resync_finds_next_separator() {
        let mut cursor = Cursor::new(vec![0x01, 0x02, 0x03, ROW_SEPARATOR, 0xAA]);
        assert!(resync(&mut cursor).unwrap());
        let mut remaining = Vec::new();
        cursor.read_to_end(&mut remaining).unwrap();
        assert_eq!(remaining, vec![0xAA]);
    }

    #[test]
    fn round_trips_random_rows_of_every_type() {
        use rand::Rng;

        let schema = Schema::new(vec![
            Column::new("i", ColumnType::Integer),
            Column::new("l", ColumnType::Long),
            Column::new("t", ColumnType::Text),
            Column::new("r", ColumnType::Real),
        ]);
        let mut rng = rand::rng();

        for _ in 0..200 {
            let values = [
                random_value_for(ColumnType::Integer, &mut rng),
                random_value_for(ColumnType::Long, &mut rng),
                random_value_for(ColumnType::Text, &mut rng),
                random_value_for(ColumnType::Real, &mut rng),
            ];
            let mut row = Row::new();
            for (column, value) in schema.columns().iter().zip(values) {
                row.set(column.name.clone(), value);
            }

            let mut buf = Vec::new();
            encode_row(&mut buf, &schema, &row).unwrap();
            let mut cursor = Cursor::new(buf);
            match decode_row(&mut cursor, &schema).unwrap() {
                DecodedRow::Row(decoded) => {
                    for column in schema.columns() {
                        assert_eq!(decoded.get(&column.name), row.get(&column.name));
                    }
                }
                _ => panic!("expected a decoded row"),
            }
        }
    }

    fn random_value_for(column_type: ColumnType, rng: &mut impl rand::Rng) -> Value {
        // One in eight fields comes back NULL, which every column type
        // accepts regardless of its declared marker.
        if rng.random_ratio(1, 8) {
            return Value::Null;
        }
        match column_type {
            ColumnType::Integer => Value::Integer(rng.random()),
            ColumnType::Long => Value::Long(rng.random()),
            ColumnType::Real => Value::Real(rng.random::<f64>() * 1_000.0 - 500.0),
            ColumnType::Text => {
                let len = rng.random_range(0..12);
                Value::Text((0..len).map(|_| rng.random_range(b'a'..=b'z') as char).collect())
            }
        }
    }

    #[test]
    fn decimal_round_trips_exactly() {
        let schema = Schema::new(vec![Column::new("d", ColumnType::Integer)]);
        let d = common::Decimal128::new(12345, 2);
        let mut buf = Vec::new();
        encode_value(&mut buf, &Value::Decimal(d)).unwrap();
        let mut cursor = Cursor::new(buf);
        // Read back manually since Decimal isn't a declarable column type.
        let mut marker = [0u8; 1];
        cursor.read_exact(&mut marker).unwrap();
        assert_eq!(marker[0], MARKER_DECIMAL);
        let mut limbs = [0u8; 16];
        cursor.read_exact(&mut limbs).unwrap();
        assert_eq!(limbs_to_decimal(limbs), d);
        let _ = schema;
    }
}
