//! Transaction identity and the handle applications drive transactions
//! through. Locking and completion are carried out by the buffer pool.

pub mod handle;
pub mod id;

pub use handle::Transaction;
pub use id::{TransactionId, TransactionIdGenerator};
