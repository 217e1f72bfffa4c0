//! Values and their ownership modes.
//!
//! - `Borrowed`: the caller's slice. The dictionary never frees it and the
//!   borrow keeps the caller from freeing it first.
//! - `Owned`: a duplicate made when the value is built. Freed with the entry.
//! - `Leased`: the caller's buffer handed over without copying. Released
//!   through its own hook when the entry is overwritten, removed or dropped.

use core::fmt;
use core::mem::ManuallyDrop;
use core::ptr::NonNull;

use crate::error::{AllocTarget, DictError, Result};
use crate::report::{self, Operation};

/// Ownership mode of a stored value.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ValueMode {
    /// Stored by reference; the caller keeps ownership.
    Pointer,
    /// Duplicated at insert; owned by the dictionary.
    Copy,
    /// Transferred without duplication; owned by the dictionary.
    Insert,
}

type Release = Box<dyn FnOnce(NonNull<u8>, usize) + Send>;

/// A transferred byte buffer with a custom release hook.
pub struct Leased {
    ptr: NonNull<u8>,
    len: usize,
    release: Option<Release>,
}

// SAFETY: a `Leased` is the sole owner of its buffer; access is either
// `&self` (shared reads) or the release hook, which runs once in `Drop`.
unsafe impl Send for Leased {}
unsafe impl Sync for Leased {}

impl Leased {
    /// Take ownership of a vector's buffer without copying or shrinking it.
    pub fn from_vec(buf: Vec<u8>) -> Self {
        let mut buf = ManuallyDrop::new(buf);
        let (len, cap) = (buf.len(), buf.capacity());
        let ptr = NonNull::from(buf.as_mut_slice()).cast::<u8>();
        // SAFETY: `ptr`, `len` and `cap` are the parts of a vector that is
        // never dropped; the hook rebuilds it exactly once.
        unsafe {
            Self::from_raw_parts(ptr, len, move |ptr, len| {
                drop(Vec::from_raw_parts(ptr.as_ptr(), len, cap))
            })
        }
    }

    pub fn from_box(buf: Box<[u8]>) -> Self {
        Self::from_vec(buf.into_vec())
    }

    /// Take ownership of a foreign buffer.
    ///
    /// # Safety
    /// `ptr` must be valid for reads of `len` bytes until `release` is
    /// called, nothing else may write to or free the buffer meanwhile, and
    /// `release(ptr, len)` must be sound to call once.
    pub unsafe fn from_raw_parts(
        ptr: NonNull<u8>,
        len: usize,
        release: impl FnOnce(NonNull<u8>, usize) + Send + 'static,
    ) -> Self {
        Self {
            ptr,
            len,
            release: Some(Box::new(release)),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: guaranteed by the constructors until `Drop` runs.
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Drop for Leased {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release(self.ptr, self.len);
        }
    }
}

impl fmt::Debug for Leased {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Leased")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

/// A stored value tagged by its ownership mode.
#[derive(Debug)]
pub enum Value<'v> {
    Borrowed(&'v [u8]),
    Owned(Box<[u8]>),
    Leased(Leased),
}

/// Fallibly duplicate `bytes` into a new box.
pub(crate) fn try_copy(bytes: &[u8], target: AllocTarget) -> Result<Box<[u8]>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(bytes.len())
        .map_err(|source| DictError::allocation(target, bytes.len(), source))?;
    buf.extend_from_slice(bytes);
    Ok(buf.into_boxed_slice())
}

impl<'v> Value<'v> {
    /// `Pointer` mode: store a reference to the caller's bytes.
    pub fn pointer(bytes: &'v [u8]) -> Self {
        Value::Borrowed(bytes)
    }

    /// `Copy` mode: store a duplicate of `bytes`.
    ///
    /// The duplicate is the value allocation of an insert, so a failure is
    /// recorded against `AddItem`.
    pub fn copy(bytes: &[u8]) -> Result<Self> {
        report::reported(
            Operation::AddItem,
            try_copy(bytes, AllocTarget::Value).map(Value::Owned),
        )
    }

    /// `Insert` mode: take over `buf` without duplicating it. Spare
    /// capacity is kept and freed with the buffer.
    pub fn insert(buf: impl Into<Vec<u8>>) -> Self {
        Value::Leased(Leased::from_vec(buf.into()))
    }

    pub fn mode(&self) -> ValueMode {
        match self {
            Value::Borrowed(_) => ValueMode::Pointer,
            Value::Owned(_) => ValueMode::Copy,
            Value::Leased(_) => ValueMode::Insert,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Value::Borrowed(b) => b,
            Value::Owned(b) => b,
            Value::Leased(l) => l.as_bytes(),
        }
    }

    /// The caller's original slice, for `Pointer` values.
    pub fn as_borrowed(&self) -> Option<&'v [u8]> {
        match self {
            Value::Borrowed(b) => Some(*b),
            _ => None,
        }
    }

    /// Duplicate for a copied dictionary: borrowed bytes stay shared,
    /// owned and leased bytes become a fresh owned buffer.
    pub fn try_clone(&self) -> Result<Value<'v>> {
        match self {
            Value::Borrowed(b) => Ok(Value::Borrowed(*b)),
            Value::Owned(b) => try_copy(b, AllocTarget::Value).map(Value::Owned),
            Value::Leased(l) => try_copy(l.as_bytes(), AllocTarget::Value).map(Value::Owned),
        }
    }
}

impl<'v> From<&'v [u8]> for Value<'v> {
    fn from(bytes: &'v [u8]) -> Self {
        Value::pointer(bytes)
    }
}

impl From<Vec<u8>> for Value<'_> {
    fn from(buf: Vec<u8>) -> Self {
        Value::insert(buf)
    }
}

impl From<Box<[u8]>> for Value<'_> {
    fn from(buf: Box<[u8]>) -> Self {
        Value::insert(buf)
    }
}
