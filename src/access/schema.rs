//! Row layout descriptors and the row byte encoding.
//!
//! Rows are encoded column by column in schema order: booleans as one byte,
//! integers as little-endian `i32`, strings as a `u16` length followed by
//! UTF-8 bytes.

use crate::access::value::{DataType, Value};
use crate::storage::error::{StorageError, StorageResult};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fmt;
use std::io::Cursor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
}

/// Ordered, named, typed columns of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    pub fn new<S: Into<String>>(columns: Vec<(S, DataType)>) -> Self {
        Self {
            columns: columns
                .into_iter()
                .map(|(name, data_type)| Column {
                    name: name.into(),
                    data_type,
                })
                .collect(),
        }
    }

    /// Schema with unnamed columns.
    pub fn from_types(types: &[DataType]) -> Self {
        Self::new(types.iter().map(|&t| (String::new(), t)).collect())
    }

    /// Columns of `first` followed by columns of `second`.
    pub fn merge(first: &Schema, second: &Schema) -> Self {
        Self {
            columns: first
                .columns
                .iter()
                .chain(second.columns.iter())
                .cloned()
                .collect(),
        }
    }

    pub fn num_fields(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn field_name(&self, index: usize) -> Option<&str> {
        self.columns.get(index).map(|c| c.name.as_str())
    }

    pub fn field_type(&self, index: usize) -> Option<DataType> {
        self.columns.get(index).map(|c| c.data_type)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    fn check(&self, values: &[Value]) -> StorageResult<()> {
        if values.len() != self.columns.len() {
            return Err(StorageError::SchemaMismatch(format!(
                "expected {} values, got {}",
                self.columns.len(),
                values.len()
            )));
        }

        for (i, (value, column)) in values.iter().zip(&self.columns).enumerate() {
            if value.data_type() != column.data_type {
                return Err(StorageError::SchemaMismatch(format!(
                    "column {} expects {}, got {}",
                    i,
                    column.data_type,
                    value.data_type()
                )));
            }
        }
        Ok(())
    }

    pub fn encode(&self, values: &[Value]) -> StorageResult<Vec<u8>> {
        self.check(values)?;

        let mut data = Vec::new();
        for value in values {
            match value {
                Value::Boolean(b) => data.write_u8(*b as u8)?,
                Value::Int32(v) => data.write_i32::<LittleEndian>(*v)?,
                Value::String(s) => {
                    let len = u16::try_from(s.len()).map_err(|_| {
                        StorageError::SchemaMismatch(format!(
                            "string of {} bytes exceeds {}",
                            s.len(),
                            u16::MAX
                        ))
                    })?;
                    data.write_u16::<LittleEndian>(len)?;
                    data.extend_from_slice(s.as_bytes());
                }
            }
        }
        Ok(data)
    }

    pub fn decode(&self, data: &[u8]) -> StorageResult<Vec<Value>> {
        let corrupted = |e: std::io::Error| StorageError::Corrupted(e.to_string());
        let mut cursor = Cursor::new(data);
        let mut values = Vec::with_capacity(self.columns.len());

        for column in &self.columns {
            let value = match column.data_type {
                DataType::Boolean => Value::Boolean(cursor.read_u8().map_err(corrupted)? != 0),
                DataType::Int32 => Value::Int32(cursor.read_i32::<LittleEndian>().map_err(corrupted)?),
                DataType::Varchar => {
                    let len = cursor.read_u16::<LittleEndian>().map_err(corrupted)? as usize;
                    let start = cursor.position() as usize;
                    let bytes = data.get(start..start + len).ok_or_else(|| {
                        StorageError::Corrupted(format!("string of {} bytes is truncated", len))
                    })?;
                    cursor.set_position((start + len) as u64);
                    Value::String(
                        String::from_utf8(bytes.to_vec())
                            .map_err(|e| StorageError::Corrupted(e.to_string()))?,
                    )
                }
            };
            values.push(value);
        }

        if cursor.position() as usize != data.len() {
            return Err(StorageError::Corrupted(format!(
                "{} trailing bytes after row",
                data.len() - cursor.position() as usize
            )));
        }
        Ok(values)
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("{}({})", c.name, c.data_type))
            .collect();
        write!(f, "{}", columns.join(", "))
    }
}
