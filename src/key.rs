//! Key kinds and byte views.
//!
//! A key is identified by its kind tag and its exact bytes, length
//! included. Only the bytes are hashed, so keys of different kinds with
//! the same bytes share a chain but never match each other.

/// Tag stored with each key.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum KeyKind {
    #[default]
    Bytes,
    Str,
    Int,
    UInt,
    Float,
}

/// Types usable as dictionary keys.
pub trait DictKey {
    fn kind(&self) -> KeyKind;

    /// Call `f` with the key's byte representation.
    fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R;
}

impl<K: DictKey + ?Sized> DictKey for &K {
    fn kind(&self) -> KeyKind {
        (**self).kind()
    }
    fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        (**self).with_bytes(f)
    }
}

impl DictKey for [u8] {
    fn kind(&self) -> KeyKind {
        KeyKind::Bytes
    }
    fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        f(self)
    }
}

impl<const N: usize> DictKey for [u8; N] {
    fn kind(&self) -> KeyKind {
        KeyKind::Bytes
    }
    fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        f(self)
    }
}

impl DictKey for Vec<u8> {
    fn kind(&self) -> KeyKind {
        KeyKind::Bytes
    }
    fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        f(self)
    }
}

impl DictKey for str {
    fn kind(&self) -> KeyKind {
        KeyKind::Str
    }
    fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        f(self.as_bytes())
    }
}

impl DictKey for String {
    fn kind(&self) -> KeyKind {
        KeyKind::Str
    }
    fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        f(self.as_bytes())
    }
}

macro_rules! numeric_key {
    ($kind:ident: $($t:ty),*) => {$(
        impl DictKey for $t {
            fn kind(&self) -> KeyKind {
                KeyKind::$kind
            }
            fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
                f(&self.to_le_bytes())
            }
        }
    )*};
}

numeric_key!(Int: i8, i16, i32, i64, i128);
numeric_key!(UInt: u8, u16, u32, u64, u128);
numeric_key!(Float: f32, f64);
