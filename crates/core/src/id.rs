//! Strongly-typed identifiers used across the domain.

use core::any::Any;
use core::fmt::{Debug, Display};
use core::hash::Hash;

use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

/// A value wrapper carrying exactly one underlying value.
///
/// Equality and hashing are structural. Two identifier kinds never unify even
/// when they wrap the same value type, which is the point of the wrapper.
/// Identifiers are immutable: `from_value` is the only way to build one.
///
/// Implement it with [`strongly_typed_id!`](crate::strongly_typed_id) rather
/// than by hand.
pub trait StronglyTypedId: Clone + Eq + Hash + Debug + Display + Send + Sync + 'static {
    /// Underlying value type; this is what goes on the wire.
    type Value: Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static;

    /// The single-value constructor.
    fn from_value(value: Self::Value) -> Self;

    fn value(&self) -> &Self::Value;
}

/// Object-safe view of any strongly typed id.
///
/// Factories produced by the registry hand these out, since callers looking
/// up a factory by `TypeKey` don't know the concrete id type statically.
pub trait AnyId: Any + Debug + Send + Sync {
    fn id_type_name(&self) -> &'static str;

    /// String form of the underlying value (the raw document key).
    fn to_raw_string(&self) -> String;

    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
}

impl<T: StronglyTypedId> AnyId for T {
    fn id_type_name(&self) -> &'static str {
        core::any::type_name::<T>()
    }

    fn to_raw_string(&self) -> String {
        self.to_string()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

impl dyn AnyId {
    pub fn downcast_ref<T: StronglyTypedId>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Recover the concrete id; `None` if this is a different id kind.
    pub fn downcast<T: StronglyTypedId>(self: Box<Self>) -> Option<T> {
        self.into_any().downcast::<T>().ok().map(|id| *id)
    }
}

/// A type-erased id, as returned from registry factories.
pub type DynId = Box<dyn AnyId>;

/// Generate a fresh unique document key.
///
/// Uses UUIDv7 (time-ordered), so keys sort by creation time.
pub fn new_unique_key() -> String {
    Uuid::now_v7().to_string()
}

/// Declare a strongly typed id wrapping a single value.
///
/// The generated type serializes as its bare value (`#[serde(transparent)]`),
/// displays as its bare value, and implements [`StronglyTypedId`]. It still
/// has to be registered with an [`IdRegistryBuilder`](crate::IdRegistryBuilder)
/// before the registry will treat it as an identifier.
///
/// ```ignore
/// strongly_typed_id! {
///     /// Product identifier.
///     pub struct ProductId(String);
/// }
/// ```
#[macro_export]
macro_rules! strongly_typed_id {
    ($(#[$meta:meta])* $vis:vis struct $name:ident($value:ty);) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize,
        )]
        #[serde(transparent)]
        $vis struct $name($value);

        impl $name {
            pub fn new(value: impl Into<$value>) -> Self {
                Self(value.into())
            }

            pub fn into_value(self) -> $value {
                self.0
            }
        }

        impl $crate::StronglyTypedId for $name {
            type Value = $value;

            fn from_value(value: $value) -> Self {
                Self(value)
            }

            fn value(&self) -> &$value {
                &self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                ::core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl ::core::convert::From<$value> for $name {
            fn from(value: $value) -> Self {
                Self(value)
            }
        }

        impl ::core::convert::From<$name> for $value {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}
