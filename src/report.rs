//! Per-thread last-error record.
//!
//! Every failing public operation stores what went wrong here before it
//! returns `Err`, so callers that only propagate a sentinel further up can
//! still recover the operation name and the allocator's diagnostic. The
//! record is also emitted as a `tracing` debug event.

use core::cell::RefCell;
use std::error::Error as _;
use std::fmt;

use crate::error::{DictError, ErrorKind};

/// The public operation that failed.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Operation {
    CreateHash,
    HashKey,
    CreateDict,
    AddItem,
    AddList,
    GetItem,
    RemoveItem,
    CopyDict,
    DestroyDict,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::CreateHash => "create_hash",
            Operation::HashKey => "hash_key",
            Operation::CreateDict => "create_dict",
            Operation::AddItem => "add_item",
            Operation::AddList => "add_list",
            Operation::GetItem => "get_item",
            Operation::RemoveItem => "remove_item",
            Operation::CopyDict => "copy_dict",
            Operation::DestroyDict => "destroy_dict",
        })
    }
}

/// Snapshot of the most recent failure on this thread.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ErrorRecord {
    pub operation: Operation,
    pub kind: ErrorKind,
    pub message: String,
    /// Diagnostic from the layer below (e.g. the allocator), if any.
    pub detail: Option<String>,
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.operation, self.message)?;
        if let Some(detail) = &self.detail {
            write!(f, " ({detail})")?;
        }
        Ok(())
    }
}

thread_local! {
    static LAST_ERROR: RefCell<Option<ErrorRecord>> = const { RefCell::new(None) };
}

pub(crate) fn record(operation: Operation, err: &DictError) {
    let rec = ErrorRecord {
        operation,
        kind: err.kind(),
        message: err.to_string(),
        detail: err.source().map(|s| s.to_string()),
    };
    tracing::debug!(op = %operation, kind = ?rec.kind, "{}", rec.message);
    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some(rec));
}

/// Record `err` against `operation` on the error path of `res`.
pub(crate) fn reported<T>(operation: Operation, res: Result<T, DictError>) -> Result<T, DictError> {
    res.map_err(|e| {
        record(operation, &e);
        e
    })
}

/// The last error recorded on this thread, leaving it in place.
pub fn last_error() -> Option<ErrorRecord> {
    LAST_ERROR.with(|slot| slot.borrow().clone())
}

/// The last error recorded on this thread, clearing it.
pub fn take_last_error() -> Option<ErrorRecord> {
    LAST_ERROR.with(|slot| slot.borrow_mut().take())
}

pub fn clear_last_error() {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = None);
}
