//! Receipt and allocation records.
//!
//! A receipt is a per-payer debit (invoice) or credit (payment) record.
//! Credit is applied to debits through [`Allocation`] rows, which replace
//! the bidirectional sibling links of a document store with one join row
//! per application.

pub mod types;

pub use types::{
    Allocation, AllocationStatus, ProductInfo, Receipt, ReceiptKind, ReceiptStatus,
};
