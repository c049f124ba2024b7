use crate::access::value::Value;
use crate::storage::page::PageId;
use std::fmt;

/// Where a tuple is stored: its page and slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TupleId {
    pub page_id: PageId,
    pub slot_id: u16,
}

impl TupleId {
    pub fn new(page_id: PageId, slot_id: u16) -> Self {
        Self { page_id, slot_id }
    }
}

/// A row of values, plus its location once it has been stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Tuple {
    pub tuple_id: Option<TupleId>,
    pub values: Vec<Value>,
}

impl Tuple {
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            tuple_id: None,
            values,
        }
    }

    pub fn stored_at(tuple_id: TupleId, values: Vec<Value>) -> Self {
        Self {
            tuple_id: Some(tuple_id),
            values,
        }
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<String> = self.values.iter().map(|v| v.to_string()).collect();
        write!(f, "{}", fields.join("\t"))
    }
}
