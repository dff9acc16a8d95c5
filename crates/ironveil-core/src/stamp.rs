//! Stamps: comparable fingerprints of a value's state or of a type's code.
//!
//! State stamps are SHA-256 over the value's [canonical encoding](crate::canonical):
//! distinct values encode differently, and map entries are sorted, so
//! `HashMap` iteration order never leaks into the stamp.
//!
//! Code stamps fingerprint a type's identity and layout. Code cannot change
//! within one process, so they are computed once per type and cached.

use std::any::TypeId;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::{Mutex, OnceLock};

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::canonical;
use crate::error::{Result, VeilError};

/// 32-byte fingerprint.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Stamp([u8; 32]);

impl Stamp {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    fn of(bytes: &[u8]) -> Self {
        Self(Sha256::digest(bytes).into())
    }
}

impl fmt::Debug for Stamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Stamp(")?;
        for b in &self.0[..8] {
            write!(f, "{b:02x}")?;
        }
        write!(f, "..)")
    }
}

/// A value that can be wrapped in a
/// [`ProtectedContainer`](crate::protected::ProtectedContainer).
///
/// Implement it (usually with an empty body) for your own `Serialize` types:
///
/// ```
/// use ironveil_core::Protectable;
///
/// #[derive(serde::Serialize, Clone)]
/// struct Credentials {
///     user: String,
///     api_key: String,
/// }
///
/// impl Protectable for Credentials {}
/// ```
///
/// Only maps are canonicalised. A field whose `Serialize` walks an unordered
/// collection (such as `HashSet`) feeds its iteration order into the stamp;
/// use `BTreeSet` instead.
pub trait Protectable: Serialize + 'static {
    /// Dictionary-shaped types cannot be code-stamped.
    fn is_dictionary() -> bool {
        false
    }
}

macro_rules! protectable {
    ($($t:ty),* $(,)?) => {
        $(impl Protectable for $t {})*
    };
}

protectable!(
    bool, char, u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64,
    String, ()
);

impl<T: Protectable> Protectable for Vec<T> {}
impl<T: Protectable> Protectable for Option<T> {}
impl<T: Protectable> Protectable for Box<T> {}
impl<T: Protectable, const N: usize> Protectable for [T; N] where [T; N]: Serialize {}
impl<A: Protectable, B: Protectable> Protectable for (A, B) {}
impl<A: Protectable, B: Protectable, C: Protectable> Protectable for (A, B, C) {}
impl<T: Protectable + Ord> Protectable for BTreeSet<T> {}

impl<K, V> Protectable for HashMap<K, V>
where
    K: Protectable + Eq + std::hash::Hash,
    V: Protectable,
{
    fn is_dictionary() -> bool {
        true
    }
}

impl<K: Protectable + Ord, V: Protectable> Protectable for BTreeMap<K, V> {
    fn is_dictionary() -> bool {
        true
    }
}

/// Computes stamps.
pub struct StampProvider;

impl StampProvider {
    /// Fingerprint of the value's current field values.
    pub fn state_stamp<T: Protectable + ?Sized>(value: &T) -> Result<Stamp> {
        let encoded =
            canonical::to_canonical_bytes(value).map_err(|e| VeilError::UnsupportedType {
                type_name: std::any::type_name::<T>(),
                reason: format!("not serialisable: {e}"),
            })?;
        Ok(Stamp::of(&encoded))
    }

    /// Fingerprint of `T`'s code. Cached per type for the process lifetime.
    pub fn code_stamp<T: Protectable>() -> Result<Stamp> {
        if T::is_dictionary() {
            return Err(VeilError::UnsupportedType {
                type_name: std::any::type_name::<T>(),
                reason: "code protection of dictionary types is not supported".into(),
            });
        }
        static CACHE: OnceLock<Mutex<HashMap<TypeId, Stamp>>> = OnceLock::new();
        let cache = CACHE.get_or_init(|| Mutex::new(HashMap::new()));
        let mut cache = cache.lock().unwrap();
        let stamp = *cache
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Stamp::of(code_fingerprint::<T>().as_bytes()));
        Ok(stamp)
    }
}

fn code_fingerprint<T: 'static>() -> String {
    format!(
        "{}\0{}\0{}\0{}",
        std::any::type_name::<T>(),
        std::mem::size_of::<T>(),
        std::mem::align_of::<T>(),
        std::mem::needs_drop::<T>()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Account {
        owner: String,
        balance: i64,
    }

    impl Protectable for Account {}

    #[test]
    fn equal_values_equal_stamps() {
        let a = Account { owner: "ann".into(), balance: 10 };
        let b = Account { owner: "ann".into(), balance: 10 };
        assert_eq!(
            StampProvider::state_stamp(&a).unwrap(),
            StampProvider::state_stamp(&b).unwrap()
        );
    }

    #[test]
    fn any_field_change_changes_stamp() {
        let a = Account { owner: "ann".into(), balance: 10 };
        let b = Account { owner: "ann".into(), balance: 11 };
        let c = Account { owner: "anne".into(), balance: 10 };
        let sa = StampProvider::state_stamp(&a).unwrap();
        assert_ne!(sa, StampProvider::state_stamp(&b).unwrap());
        assert_ne!(sa, StampProvider::state_stamp(&c).unwrap());
    }

    #[test]
    fn hash_map_stamp_ignores_insertion_order() {
        let mut a = HashMap::new();
        let mut b = HashMap::new();
        for i in 0..50u32 {
            a.insert(format!("k{i}"), i);
        }
        for i in (0..50u32).rev() {
            b.insert(format!("k{i}"), i);
        }
        assert_eq!(
            StampProvider::state_stamp(&a).unwrap(),
            StampProvider::state_stamp(&b).unwrap()
        );
    }

    #[test]
    fn code_stamp_is_stable_and_type_specific() {
        let a1 = StampProvider::code_stamp::<Account>().unwrap();
        let a2 = StampProvider::code_stamp::<Account>().unwrap();
        let s = StampProvider::code_stamp::<String>().unwrap();
        assert_eq!(a1, a2);
        assert_ne!(a1, s);
    }

    #[test]
    fn code_stamp_of_dictionary_is_unsupported() {
        let err = StampProvider::code_stamp::<HashMap<String, u32>>().unwrap_err();
        assert!(matches!(err, VeilError::UnsupportedType { .. }));
        assert!(StampProvider::code_stamp::<BTreeMap<String, u32>>().is_err());
    }

    #[test]
    fn non_finite_floats_have_distinct_stamps() {
        let nan = StampProvider::state_stamp(&f64::NAN).unwrap();
        assert_ne!(nan, StampProvider::state_stamp(&f64::INFINITY).unwrap());
        assert_ne!(nan, StampProvider::state_stamp(&f64::NEG_INFINITY).unwrap());
        assert_eq!(nan, StampProvider::state_stamp(&f64::NAN).unwrap());
    }

    #[test]
    fn nested_none_differs_from_none() {
        assert_ne!(
            StampProvider::state_stamp(&Some(None::<u8>)).unwrap(),
            StampProvider::state_stamp(&None::<Option<u8>>).unwrap()
        );
    }

    #[test]
    fn full_width_integers_are_stamped() {
        let max = StampProvider::state_stamp(&u128::MAX).unwrap();
        assert_ne!(max, StampProvider::state_stamp(&(u128::MAX - 1)).unwrap());
        assert!(StampProvider::state_stamp(&i128::MIN).is_ok());
    }

    #[test]
    fn non_string_map_keys_are_stamped() {
        let mut a: HashMap<(u8, u8), u8> = HashMap::new();
        let mut b: HashMap<(u8, u8), u8> = HashMap::new();
        for i in 0..40u8 {
            a.insert((i, i / 2), i);
        }
        for i in (0..40u8).rev() {
            b.insert((i, i / 2), i);
        }
        assert_eq!(
            StampProvider::state_stamp(&a).unwrap(),
            StampProvider::state_stamp(&b).unwrap()
        );
    }

    #[test]
    fn failing_serialize_is_unsupported() {
        struct Opaque;

        impl Serialize for Opaque {
            fn serialize<S: serde::Serializer>(&self, _s: S) -> std::result::Result<S::Ok, S::Error> {
                Err(serde::ser::Error::custom("opaque"))
            }
        }

        impl Protectable for Opaque {}

        assert!(matches!(
            StampProvider::state_stamp(&Opaque),
            Err(VeilError::UnsupportedType { .. })
        ));
    }

    #[test]
    fn debug_is_abbreviated() {
        let s = StampProvider::state_stamp(&1u8).unwrap();
        let text = format!("{s:?}");
        assert!(text.starts_with("Stamp(") && text.ends_with("..)"));
        assert_eq!(text.len(), "Stamp(".len() + 16 + "..)".len());
    }
}
