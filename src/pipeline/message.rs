//! Type-erased payloads and the explicit type tags handlers route on.

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identity of a concrete payload type, with its name kept for diagnostics.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// The set of payload types a handler accepts, declared by the handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeMatcher {
    /// Every payload type.
    Any,
    /// Exactly one concrete type.
    Exact(TypeKey),
    /// Any of several concrete types.
    OneOf(Vec<TypeKey>),
}

impl TypeMatcher {
    pub fn of<T: Any>() -> Self {
        TypeMatcher::Exact(TypeKey::of::<T>())
    }

    pub fn matches(&self, id: TypeId) -> bool {
        match self {
            TypeMatcher::Any => true,
            TypeMatcher::Exact(key) => key.id == id,
            TypeMatcher::OneOf(keys) => keys.iter().any(|key| key.id == id),
        }
    }

    /// Extend this matcher with one more accepted type.
    pub fn or<T: Any>(self) -> Self {
        let key = TypeKey::of::<T>();
        match self {
            TypeMatcher::Any => TypeMatcher::Any,
            TypeMatcher::Exact(existing) if existing == key => TypeMatcher::Exact(existing),
            TypeMatcher::Exact(existing) => TypeMatcher::OneOf(vec![existing, key]),
            TypeMatcher::OneOf(mut keys) => {
                if !keys.contains(&key) {
                    keys.push(key);
                }
                TypeMatcher::OneOf(keys)
            }
        }
    }
}

/// An owned payload travelling through a pipeline.
///
/// The exact runtime type is recorded at construction; dispatch caches are
/// keyed on it.
pub struct Message {
    value: Box<dyn Any + Send>,
    key: TypeKey,
}

impl Message {
    pub fn new<T: Any + Send>(value: T) -> Self {
        Self {
            value: Box::new(value),
            key: TypeKey::of::<T>(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.key.id
    }

    pub fn type_name(&self) -> &'static str {
        self.key.name
    }

    pub fn type_key(&self) -> TypeKey {
        self.key
    }

    pub fn is<T: Any>(&self) -> bool {
        self.key.id == TypeId::of::<T>()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.value.downcast_mut::<T>()
    }

    /// Take the payload out as `T`, or get the message back unchanged.
    pub fn downcast<T: Any>(self) -> std::result::Result<T, Message> {
        if self.is::<T>() {
            match self.value.downcast::<T>() {
                Ok(value) => Ok(*value),
                Err(value) => Err(Message {
                    value,
                    key: self.key,
                }),
            }
        } else {
            Err(self)
        }
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("type", &self.key.name)
            .finish_non_exhaustive()
    }
}
