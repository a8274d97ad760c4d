use std::fmt;
use std::rc::Rc;

use crate::error::ParmError;
use crate::named_object::{NamedObject, ObjectRef};
use crate::namer::ObjectNamer;
use crate::types::{EnumConstant, EnumType, ParmEnum, TypeTag};

/// The type of a single key, or of one component of a compound key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyComponent {
    /// A 32-bit integer index.
    Int,
    /// A string key.
    String,
    /// A reference to a named object of the given type.
    ///
    /// A tag for `dyn NamedObject` accepts objects of any type.
    NamedObject(TypeTag),
    /// A constant of the given enumeration.
    Enum(EnumType),
}

impl KeyComponent {
    /// A named-object component restricted to objects of type `T`.
    pub fn named_object<T: NamedObject>() -> Self {
        KeyComponent::NamedObject(TypeTag::of::<T>())
    }

    /// A named-object component accepting any named object.
    pub fn any_object() -> Self {
        KeyComponent::NamedObject(TypeTag::of::<dyn NamedObject>())
    }

    /// An enumeration component for `E`.
    pub fn enumeration<E: ParmEnum>() -> Self {
        KeyComponent::Enum(EnumType::of::<E>())
    }

    /// The fully qualified name of the component's type.
    pub fn type_name(&self) -> &'static str {
        match self {
            KeyComponent::Int => std::any::type_name::<i32>(),
            KeyComponent::String => std::any::type_name::<String>(),
            KeyComponent::NamedObject(tag) => tag.name(),
            KeyComponent::Enum(ty) => ty.type_name(),
        }
    }

    /// Converts a supplied key to this component's shape.
    ///
    /// Strings are converted to integers, enumeration constants, and named
    /// objects (looked up in `namer`). Keys already in the right shape are
    /// checked and passed through.
    pub(crate) fn coerce(
        &self,
        parm: &str,
        key: ParmKey,
        namer: &ObjectNamer,
    ) -> Result<ParmKey, ParmError> {
        match (self, key) {
            (KeyComponent::Int, ParmKey::Int(index)) => Ok(ParmKey::Int(index)),
            (KeyComponent::Int, ParmKey::Str(text)) => text
                .trim()
                .parse::<i32>()
                .map(ParmKey::Int)
                .map_err(|_| {
                    ParmError::invalid(parm, format!("invalid integer key '{text}'"))
                }),
            (KeyComponent::String, ParmKey::Str(text)) => Ok(ParmKey::Str(text)),
            (KeyComponent::String, ParmKey::Int(index)) => {
                Ok(ParmKey::Str(index.to_string()))
            }
            (KeyComponent::NamedObject(tag), ParmKey::Object(object)) => {
                check_object_type(parm, tag, &object)?;
                Ok(ParmKey::Object(object))
            }
            (KeyComponent::NamedObject(tag), ParmKey::Str(name)) => {
                let object = namer.get_object(&name).ok_or_else(|| {
                    ParmError::invalid(parm, format!("no object named '{name}'"))
                })?;
                check_object_type(parm, tag, &object)?;
                Ok(ParmKey::Object(object))
            }
            (KeyComponent::Enum(ty), ParmKey::Enum(constant)) => {
                if ty.contains(&constant) {
                    Ok(ParmKey::Enum(constant))
                } else {
                    Err(ParmError::invalid(
                        parm,
                        format!(
                            "{} is not a constant of {}",
                            constant,
                            ty.type_name()
                        ),
                    ))
                }
            }
            (KeyComponent::Enum(ty), ParmKey::Str(name)) => {
                ty.constant_named(&name).map(ParmKey::Enum).ok_or_else(|| {
                    ParmError::invalid(
                        parm,
                        format!(
                            "'{name}' is not a constant of {}",
                            ty.type_name()
                        ),
                    )
                })
            }
            (component, key) => Err(ParmError::invalid(
                parm,
                format!(
                    "key {} of type {} does not match key type {}",
                    key,
                    key.type_name(),
                    component.type_name()
                ),
            )),
        }
    }
}

pub(crate) fn check_object_type(
    parm: &str,
    tag: &TypeTag,
    object: &ObjectRef,
) -> Result<(), ParmError> {
    if tag.is::<dyn NamedObject>() || object.type_id_of() == tag.id() {
        Ok(())
    } else {
        Err(ParmError::invalid(
            parm,
            format!(
                "object '{}' of type {} is not a {}",
                object.name(),
                object.type_name(),
                tag.name()
            ),
        ))
    }
}

/// Describes the shape of a compound key, such as the `3.color` in
/// `timeline.3.color`.
///
/// A compound key is an ordered list of components. When the key type is
/// *addable*, factories accept `add`/`remove` for the parameter but not
/// `set`/`unset`; otherwise the reverse.
///
/// ```
/// use object_namer::{KeyComponent, ParmKeyType};
///
/// let key_type =
///     ParmKeyType::new(vec![KeyComponent::String, KeyComponent::Int]);
/// assert_eq!(key_type.description(), "alloc::string::String.<i32>");
/// assert!(key_type.is_addable());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParmKeyType {
    components: Vec<KeyComponent>,
    addable: bool,
}

impl ParmKeyType {
    /// Creates an addable compound key type.
    pub fn new(components: Vec<KeyComponent>) -> Self {
        Self::with_addable(components, true)
    }

    /// Creates a compound key type with an explicit `addable` flag.
    pub fn with_addable(components: Vec<KeyComponent>, addable: bool) -> Self {
        Self { components, addable }
    }

    /// The component types, in order.
    pub fn components(&self) -> &[KeyComponent] {
        &self.components
    }

    /// True if `add`-style operations are legal for this key shape.
    pub fn is_addable(&self) -> bool {
        self.addable
    }

    /// Renders the key signature: the first component's type name followed
    /// by each further component's type name in angle brackets, joined by
    /// periods.
    pub fn description(&self) -> String {
        let mut result = String::new();
        for (i, component) in self.components.iter().enumerate() {
            if i == 0 {
                result.push_str(component.type_name());
            } else {
                result.push_str(".<");
                result.push_str(component.type_name());
                result.push('>');
            }
        }
        result
    }

    fn coerce(
        &self,
        parm: &str,
        key: ParmKey,
        namer: &ObjectNamer,
    ) -> Result<ParmKey, ParmError> {
        let parts = match key {
            ParmKey::Compound(parts) => parts,
            ParmKey::Str(text) => text
                .split('.')
                .map(|part| ParmKey::Str(part.to_string()))
                .collect(),
            single => vec![single],
        };
        if parts.len() != self.components.len() {
            return Err(ParmError::invalid(
                parm,
                format!(
                    "expected {} key components ({}), found {}",
                    self.components.len(),
                    self.description(),
                    parts.len()
                ),
            ));
        }
        let parts = self
            .components
            .iter()
            .zip(parts)
            .map(|(component, part)| component.coerce(parm, part, namer))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ParmKey::Compound(parts))
    }
}

/// How a parameter is addressed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum KeyKind {
    /// Not keyed.
    #[default]
    None,
    Int,
    String,
    NamedObject(TypeTag),
    Enum(EnumType),
    /// A multi-component key.
    Compound(ParmKeyType),
}

impl KeyKind {
    pub fn is_keyed(&self) -> bool {
        !matches!(self, KeyKind::None)
    }

    /// The compound descriptor, for compound keys.
    pub fn compound(&self) -> Option<&ParmKeyType> {
        match self {
            KeyKind::Compound(key_type) => Some(key_type),
            _ => None,
        }
    }

    /// The single-component shape, for scalar keys.
    pub fn component(&self) -> Option<KeyComponent> {
        match self {
            KeyKind::Int => Some(KeyComponent::Int),
            KeyKind::String => Some(KeyComponent::String),
            KeyKind::NamedObject(tag) => Some(KeyComponent::NamedObject(*tag)),
            KeyKind::Enum(ty) => Some(KeyComponent::Enum(*ty)),
            KeyKind::None | KeyKind::Compound(_) => None,
        }
    }

    /// True if a parameter declared with `other` may chain to a parameter
    /// of the same name declared with `self`.
    ///
    /// Only identical, non-compound key kinds chain.
    pub fn chains_with(&self, other: &KeyKind) -> bool {
        self == other && !matches!(self, KeyKind::None | KeyKind::Compound(_))
    }

    /// True for compound keys that only support `add`/`remove`.
    pub fn is_addable(&self) -> bool {
        self.compound().is_some_and(ParmKeyType::is_addable)
    }

    /// A human-readable signature of the key; `None` when not keyed.
    pub fn description(&self) -> Option<String> {
        match self {
            KeyKind::None => None,
            KeyKind::Compound(key_type) => Some(key_type.description()),
            other => other.component().map(|c| c.type_name().to_string()),
        }
    }

    pub(crate) fn coerce(
        &self,
        parm: &str,
        key: ParmKey,
        namer: &ObjectNamer,
    ) -> Result<ParmKey, ParmError> {
        match self {
            KeyKind::None => Err(ParmError::Unsupported(format!(
                "parameter \"{parm}\" does not take a key (got {key})"
            ))),
            KeyKind::Compound(key_type) => key_type.coerce(parm, key, namer),
            scalar => match scalar.component() {
                Some(component) => component.coerce(parm, key, namer),
                None => Err(ParmError::Unsupported(format!(
                    "parameter \"{parm}\" does not take a key (got {key})"
                ))),
            },
        }
    }
}

impl From<KeyComponent> for KeyKind {
    fn from(component: KeyComponent) -> Self {
        match component {
            KeyComponent::Int => KeyKind::Int,
            KeyComponent::String => KeyKind::String,
            KeyComponent::NamedObject(tag) => KeyKind::NamedObject(tag),
            KeyComponent::Enum(ty) => KeyKind::Enum(ty),
        }
    }
}

impl From<ParmKeyType> for KeyKind {
    fn from(key_type: ParmKeyType) -> Self {
        KeyKind::Compound(key_type)
    }
}

/// A key value addressing one entry of a keyed parameter.
#[derive(Clone, Debug)]
pub enum ParmKey {
    Int(i32),
    Str(String),
    Object(ObjectRef),
    Enum(EnumConstant),
    Compound(Vec<ParmKey>),
}

impl ParmKey {
    /// A named-object key.
    pub fn object<T: NamedObject>(object: &Rc<T>) -> Self {
        ParmKey::Object(object.clone())
    }

    /// An enumeration key.
    pub fn enumeration<E: ParmEnum>(value: E) -> Self {
        ParmKey::Enum(value.constant())
    }

    /// The runtime type of the key, for diagnostics.
    pub fn type_name(&self) -> String {
        match self {
            ParmKey::Int(_) => std::any::type_name::<i32>().to_string(),
            ParmKey::Str(_) => std::any::type_name::<String>().to_string(),
            ParmKey::Object(object) => object.type_name().to_string(),
            ParmKey::Enum(constant) => constant.type_name().to_string(),
            ParmKey::Compound(parts) => {
                let names: Vec<String> =
                    parts.iter().map(ParmKey::type_name).collect();
                format!("[{}]", names.join(", "))
            }
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            ParmKey::Int(index) => Some(*index),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParmKey::Str(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            ParmKey::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_enum<E: ParmEnum>(&self) -> Option<E> {
        match self {
            ParmKey::Enum(constant) => constant.to_enum(),
            _ => None,
        }
    }

    /// The components of a compound key; a scalar key is its own single
    /// component.
    pub fn components(&self) -> &[ParmKey] {
        match self {
            ParmKey::Compound(parts) => parts,
            single => std::slice::from_ref(single),
        }
    }
}

/// Canonical display form of a key, as used in error messages.
///
/// Named objects render as their names and compound keys as their
/// components joined with periods.
pub fn key_string(key: &ParmKey) -> String {
    key.to_string()
}

impl fmt::Display for ParmKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParmKey::Int(index) => write!(f, "{index}"),
            ParmKey::Str(text) => f.write_str(text),
            ParmKey::Object(object) => f.write_str(object.name()),
            ParmKey::Enum(constant) => f.write_str(constant.name()),
            ParmKey::Compound(parts) => {
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        f.write_str(".")?;
                    }
                    write!(f, "{part}")?;
                }
                Ok(())
            }
        }
    }
}

impl PartialEq for ParmKey {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ParmKey::Int(a), ParmKey::Int(b)) => a == b,
            (ParmKey::Str(a), ParmKey::Str(b)) => a == b,
            (ParmKey::Object(a), ParmKey::Object(b)) => Rc::ptr_eq(a, b),
            (ParmKey::Enum(a), ParmKey::Enum(b)) => a == b,
            (ParmKey::Compound(a), ParmKey::Compound(b)) => a == b,
            _ => false,
        }
    }
}

impl From<i32> for ParmKey {
    fn from(index: i32) -> Self {
        ParmKey::Int(index)
    }
}

impl From<&str> for ParmKey {
    fn from(text: &str) -> Self {
        ParmKey::Str(text.to_string())
    }
}

impl From<String> for ParmKey {
    fn from(text: String) -> Self {
        ParmKey::Str(text)
    }
}

impl From<EnumConstant> for ParmKey {
    fn from(constant: EnumConstant) -> Self {
        ParmKey::Enum(constant)
    }
}

impl From<ObjectRef> for ParmKey {
    fn from(object: ObjectRef) -> Self {
        ParmKey::Object(object)
    }
}

impl From<Vec<ParmKey>> for ParmKey {
    fn from(parts: Vec<ParmKey>) -> Self {
        ParmKey::Compound(parts)
    }
}
