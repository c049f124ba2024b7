//! Tuple-oriented access to tables.
//!
//! - **HeapFile**: a table stored as unordered slotted pages
//! - **TableScanner**: lazy page-by-page iteration under shared locks
//! - **Schema**: column layout and row encoding
//! - **Tuple** / **Value**: rows and their typed fields

pub mod heap;
pub mod scan;
pub mod schema;
pub mod tuple;
pub mod value;

pub use heap::HeapFile;
pub use scan::TableScanner;
pub use schema::{Column, Schema};
pub use tuple::{Tuple, TupleId};
pub use value::{DataType, Value};
