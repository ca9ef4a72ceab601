use std::any::TypeId;
use std::fmt;

use uuid::Uuid;

/// Qualifier distinguishing several bindings of the same type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Qualifier {
    /// String-named binding
    Named(String),
    /// Zero-sized marker type standing in for a binding annotation
    Marker {
        type_id: TypeId,
        type_name: &'static str,
    },
    /// Process-unique qualifier that never collides with user keys
    Unique(Uuid),
}

impl Qualifier {
    /// Create a named qualifier
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// Create a qualifier from a marker type
    pub fn marker<M: ?Sized + 'static>() -> Self {
        Self::Marker {
            type_id: TypeId::of::<M>(),
            type_name: std::any::type_name::<M>(),
        }
    }

    /// Create a fresh unique qualifier
    pub fn unique() -> Self {
        Self::Unique(Uuid::new_v4())
    }

    /// Check whether this is a marker qualifier for `M`
    pub fn is_marker<M: ?Sized + 'static>(&self) -> bool {
        matches!(self, Self::Marker { type_id, .. } if *type_id == TypeId::of::<M>())
    }
}

impl fmt::Display for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Qualifier::Named(name) => write!(f, "@Named(\"{}\")", name),
            Qualifier::Marker { type_name, .. } => write!(f, "@{}", type_name),
            Qualifier::Unique(id) => write!(f, "@Unique({})", id),
        }
    }
}

/// Binding key combining a type and an optional qualifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key {
    type_id: TypeId,
    type_name: &'static str,
    qualifier: Option<Qualifier>,
}

impl Key {
    /// Create an unqualified key for a type
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            qualifier: None,
        }
    }

    /// Create a qualified key for a type
    pub fn qualified<T: ?Sized + 'static>(qualifier: Qualifier) -> Self {
        Self {
            qualifier: Some(qualifier),
            ..Self::of::<T>()
        }
    }

    /// Create a key qualified by name
    pub fn named<T: ?Sized + 'static>(name: impl Into<String>) -> Self {
        Self::qualified::<T>(Qualifier::named(name))
    }

    /// Create a key qualified by a marker type
    pub fn marked<T: ?Sized + 'static, M: ?Sized + 'static>() -> Self {
        Self::qualified::<T>(Qualifier::marker::<M>())
    }

    /// Same type, different qualifier
    pub fn with_qualifier(&self, qualifier: Qualifier) -> Self {
        Self {
            type_id: self.type_id,
            type_name: self.type_name,
            qualifier: Some(qualifier),
        }
    }

    /// Same type without any qualifier
    pub fn without_qualifier(&self) -> Self {
        Self {
            type_id: self.type_id,
            type_name: self.type_name,
            qualifier: None,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn qualifier(&self) -> Option<&Qualifier> {
        self.qualifier.as_ref()
    }

    pub fn has_qualifier(&self) -> bool {
        self.qualifier.is_some()
    }

    /// Check whether the key's type is `T`, ignoring the qualifier
    pub fn is_type<T: ?Sized + 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(qualifier) => write!(f, "Key[type={}, qualifier={}]", self.type_name, qualifier),
            None => write!(f, "Key[type={}, qualifier=[none]]", self.type_name),
        }
    }
}
