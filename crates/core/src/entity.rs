//! Entity trait: identity + continuity across state changes.

use core::any::TypeId;

/// Name of the field holding an entity's primary key.
pub const ID_PROPERTY: &str = "id";

/// A document-backed domain record owning exactly one identifier.
///
/// The id may be unset while the entity only lives in memory; the store
/// back-fills it when it assigns a document key.
pub trait Entity: Send + Sync + 'static {
    /// Entity identifier (a strongly typed id, or a plain value for legacy documents).
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug + core::fmt::Display + Send + Sync + 'static;

    /// Collection the store files documents of this type under.
    const COLLECTION: &'static str;

    /// Returns the entity identifier, if assigned.
    fn id(&self) -> Option<&Self::Id>;

    /// Assign the entity identifier.
    fn set_id(&mut self, id: Self::Id);
}

/// A named member of some declaring type (what the store asks the identity
/// convention about).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct MemberDescriptor {
    declaring_type: TypeKey,
    name: &'static str,
}

impl MemberDescriptor {
    pub fn new(declaring_type: TypeKey, name: &'static str) -> Self {
        Self {
            declaring_type,
            name,
        }
    }

    pub fn of<T: 'static>(name: &'static str) -> Self {
        Self::new(TypeKey::of::<T>(), name)
    }

    pub fn declaring_type(&self) -> TypeKey {
        self.declaring_type
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Runtime handle for a Rust type: its `TypeId` plus a readable name.
#[derive(Debug, Copy, Clone)]
pub struct TypeKey {
    type_id: TypeId,
    name: &'static str,
}

impl TypeKey {
    pub fn of<T: 'static + ?Sized>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: core::any::type_name::<T>(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for TypeKey {}

impl core::hash::Hash for TypeKey {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl core::fmt::Display for TypeKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name)
    }
}
