use std::fmt;
use std::rc::Rc;

use crate::error::ParmError;
use crate::key::{KeyComponent, KeyKind, ParmKeyType};
use crate::parser::ParmParser;
use crate::random::RvKind;
use crate::types::TypeTag;
use crate::value::{Bounds, ValueType};

/// How a parameter responds to factory operations, derived from its key
/// kind and value type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParmShape {
    /// A single value: `set` and `clear`.
    Scalar,
    /// A map from keys to values: `set`/`unset` for plain keys, `add`/
    /// `remove` for addable compound keys, and `clear`.
    Keyed,
    /// A set of elements of the key type: `add`, `remove` and `clear`.
    ElementSet,
    /// Only `clear`.
    ClearOnly,
}

/// Describes one named configuration parameter of a factory type `F`.
///
/// A `Parm` pairs a name with its key kind, value type, optional
/// random-variable form, numeric bounds, and the [`ParmParser`] that
/// applies values to the factory. Constructing a `Parm` binds the parser to
/// it; a parser can serve only one `Parm`.
///
/// ```
/// use std::rc::Rc;
///
/// use object_namer::{Bounds, ClosureParser, Parm, ParmParser, ValueType};
///
/// struct Factory;
///
/// let parser: Rc<dyn ParmParser<Factory>> =
///     Rc::new(ClosureParser::<Factory>::new());
/// let rate = Parm::unkeyed_bounded(
///     "rate",
///     None,
///     parser.clone(),
///     ValueType::Double,
///     Bounds::unbounded().with_lower(0, true),
/// )
/// .unwrap();
/// assert_eq!(rate.name(), "rate");
/// assert_eq!(parser.parm_name(), "rate");
///
/// // The parser is now taken.
/// assert!(Parm::unkeyed("other", None, parser, ValueType::Double).is_err());
/// ```
pub struct Parm<F> {
    name: String,
    key_kind: KeyKind,
    rv: Option<RvKind>,
    parser: Rc<dyn ParmParser<F>>,
    value_type: Option<ValueType>,
    bounds: Bounds,
    clear_only: bool,
    factory_type: Option<TypeTag>,
}

impl<F> Parm<F> {
    /// The general constructor.
    ///
    /// A parameter with neither a key kind nor a value type is clear-only.
    /// Fails if the random-variable form does not fit the value type, if
    /// bounds are given for a non-numeric type, or if the parser is already
    /// bound to another parameter.
    pub fn new(
        name: &str,
        key_kind: impl Into<KeyKind>,
        rv: Option<RvKind>,
        parser: Rc<dyn ParmParser<F>>,
        value_type: Option<ValueType>,
        bounds: Bounds,
    ) -> Result<Self, ParmError> {
        let key_kind = key_kind.into();
        if let Some(kind) = rv {
            match &value_type {
                Some(ty) if ty.is_primitive() => {}
                Some(ty) => {
                    return Err(ParmError::invalid(
                        name,
                        format!(
                            "a {} cannot produce values of type {}",
                            kind.description(),
                            ty.type_name()
                        ),
                    ));
                }
                None => {
                    return Err(ParmError::invalid(
                        name,
                        format!("a {} requires a value type", kind.description()),
                    ));
                }
            }
        }
        if !bounds.is_unbounded()
            && !value_type.as_ref().is_some_and(ValueType::is_numeric)
        {
            return Err(ParmError::invalid(
                name,
                "bounds require a numeric value type",
            ));
        }
        if key_kind.compound().is_some() && value_type.is_none() {
            return Err(ParmError::invalid(
                name,
                "a compound key requires a value type",
            ));
        }
        parser.binding().bind(name, bounds)?;
        let clear_only = !key_kind.is_keyed() && value_type.is_none();
        Ok(Self {
            name: name.to_string(),
            key_kind,
            rv,
            parser,
            value_type,
            bounds,
            clear_only,
            factory_type: None,
        })
    }

    /// An unkeyed parameter.
    pub fn unkeyed(
        name: &str,
        rv: Option<RvKind>,
        parser: Rc<dyn ParmParser<F>>,
        value_type: ValueType,
    ) -> Result<Self, ParmError> {
        Self::new(
            name,
            KeyKind::None,
            rv,
            parser,
            Some(value_type),
            Bounds::unbounded(),
        )
    }

    /// An unkeyed parameter with a numeric range.
    pub fn unkeyed_bounded(
        name: &str,
        rv: Option<RvKind>,
        parser: Rc<dyn ParmParser<F>>,
        value_type: ValueType,
        bounds: Bounds,
    ) -> Result<Self, ParmError> {
        Self::new(name, KeyKind::None, rv, parser, Some(value_type), bounds)
    }

    /// A keyed parameter.
    ///
    /// With no value type the parameter holds a set of elements of the key
    /// type; such keys must have a single component.
    pub fn keyed(
        name: &str,
        key: impl Into<KeyKind>,
        rv: Option<RvKind>,
        parser: Rc<dyn ParmParser<F>>,
        value_type: Option<ValueType>,
    ) -> Result<Self, ParmError> {
        Self::new(name, key, rv, parser, value_type, Bounds::unbounded())
    }

    /// A keyed parameter with a numeric range on its values.
    pub fn keyed_bounded(
        name: &str,
        key: impl Into<KeyKind>,
        rv: Option<RvKind>,
        parser: Rc<dyn ParmParser<F>>,
        value_type: ValueType,
        bounds: Bounds,
    ) -> Result<Self, ParmError> {
        Self::new(name, key, rv, parser, Some(value_type), bounds)
    }

    /// A parameter whose only operation is `clear`.
    pub fn clear_only(
        name: &str,
        parser: Rc<dyn ParmParser<F>>,
    ) -> Result<Self, ParmError> {
        Self::new(name, KeyKind::None, None, parser, None, Bounds::unbounded())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key_kind(&self) -> &KeyKind {
        &self.key_kind
    }

    /// The compound key descriptor, when the key is compound.
    pub fn key_type(&self) -> Option<&ParmKeyType> {
        self.key_kind.compound()
    }

    /// The single key component, when the key is not compound.
    pub fn key_component(&self) -> Option<KeyComponent> {
        self.key_kind.component()
    }

    pub fn rv(&self) -> Option<RvKind> {
        self.rv
    }

    pub fn parser(&self) -> &Rc<dyn ParmParser<F>> {
        &self.parser
    }

    pub fn value_type(&self) -> Option<&ValueType> {
        self.value_type.as_ref()
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    pub fn is_clear_only(&self) -> bool {
        self.clear_only
    }

    /// The factory type that registered this parameter, once it has been
    /// added to a [`ParmManager`](crate::ParmManager).
    pub fn factory_type(&self) -> Option<TypeTag> {
        self.factory_type
    }

    pub(crate) fn set_factory_type(&mut self, tag: TypeTag) {
        self.factory_type = Some(tag);
    }

    pub fn shape(&self) -> ParmShape {
        if self.clear_only {
            ParmShape::ClearOnly
        } else if !self.key_kind.is_keyed() {
            ParmShape::Scalar
        } else if self.value_type.is_none() {
            ParmShape::ElementSet
        } else {
            ParmShape::Keyed
        }
    }
}

impl<F> fmt::Debug for Parm<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parm")
            .field("name", &self.name)
            .field("key_kind", &self.key_kind)
            .field("rv", &self.rv)
            .field("value_type", &self.value_type)
            .field("bounds", &self.bounds)
            .field("clear_only", &self.clear_only)
            .finish()
    }
}
