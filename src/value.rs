use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use crate::error::ParmError;
use crate::key::{ParmKey, check_object_type};
use crate::named_object::{NamedObject, ObjectRef};
use crate::namer::ObjectNamer;
use crate::random::{
    BoolRv, BoolRvRv, DoubleRv, DoubleRvRv, FixedRv, FixedRvRv, IntRv,
    IntRvRv, LongRv, LongRvRv, RandomVariable, RvKind,
};
use crate::types::{EnumConstant, EnumType, ParmEnum, TypeTag};

/// The declared value type of a parameter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValueType {
    String,
    Boolean,
    Int,
    Long,
    Double,
    /// A named object of the given type; a tag for `dyn NamedObject`
    /// accepts any named object.
    NamedObject(TypeTag),
    Enum(EnumType),
}

impl ValueType {
    pub fn named_object<T: NamedObject>() -> Self {
        ValueType::NamedObject(TypeTag::of::<T>())
    }

    pub fn any_object() -> Self {
        ValueType::NamedObject(TypeTag::of::<dyn NamedObject>())
    }

    pub fn enumeration<E: ParmEnum>() -> Self {
        ValueType::Enum(EnumType::of::<E>())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ValueType::String => std::any::type_name::<String>(),
            ValueType::Boolean => "bool",
            ValueType::Int => "i32",
            ValueType::Long => "i64",
            ValueType::Double => "f64",
            ValueType::NamedObject(tag) => tag.name(),
            ValueType::Enum(ty) => ty.type_name(),
        }
    }

    /// True for the types random variables can produce.
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            ValueType::Boolean
                | ValueType::Int
                | ValueType::Long
                | ValueType::Double
        )
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ValueType::Int | ValueType::Long | ValueType::Double)
    }

    /// Converts a supplied value to this type.
    ///
    /// Strings are parsed, integral numbers are widened or narrowed when
    /// they fit, and object names are resolved through `namer`. A value whose
    /// shape cannot be converted at all is returned unchanged so that the
    /// parameter's parser can reject it.
    pub(crate) fn coerce(
        &self,
        parm: &str,
        value: ParmValue,
        namer: &ObjectNamer,
    ) -> Result<ParmValue, ParmError> {
        use ParmValue as V;

        let converted = match (self, value) {
            (ValueType::Boolean, V::Str(text)) => match text.trim() {
                "true" => V::Bool(true),
                "false" => V::Bool(false),
                other => {
                    return Err(ParmError::invalid(
                        parm,
                        format!("invalid boolean '{other}'"),
                    ));
                }
            },
            (ValueType::Int, V::Str(text)) => {
                V::Int(text.trim().parse().map_err(|_| {
                    ParmError::invalid(parm, format!("invalid integer '{text}'"))
                })?)
            }
            (ValueType::Int, V::Long(value)) => {
                V::Int(i32::try_from(value).map_err(|_| {
                    ParmError::invalid(parm, format!("{value} is out of range"))
                })?)
            }
            (ValueType::Int, V::Double(value)) => {
                let end = f64::from(i32::MAX) + 1.0;
                V::Int(integral(parm, value, i32::MIN.into(), end)? as i32)
            }
            (ValueType::Long, V::Str(text)) => {
                V::Long(text.trim().parse().map_err(|_| {
                    ParmError::invalid(parm, format!("invalid integer '{text}'"))
                })?)
            }
            (ValueType::Long, V::Int(value)) => V::Long(value.into()),
            (ValueType::Long, V::Double(value)) => {
                V::Long(integral(parm, value, i64::MIN as f64, 2f64.powi(63))?)
            }
            (ValueType::Double, V::Str(text)) => {
                V::Double(text.trim().parse().map_err(|_| {
                    ParmError::invalid(parm, format!("invalid number '{text}'"))
                })?)
            }
            (ValueType::Double, V::Int(value)) => V::Double(value.into()),
            (ValueType::Double, V::Long(value)) => V::Double(value as f64),
            (ValueType::NamedObject(tag), V::Str(name)) => {
                let object = namer.get_object(&name).ok_or_else(|| {
                    ParmError::invalid(parm, format!("no object named '{name}'"))
                })?;
                check_object_type(parm, tag, &object)?;
                V::Object(object)
            }
            (ValueType::NamedObject(tag), V::Object(object)) => {
                check_object_type(parm, tag, &object)?;
                V::Object(object)
            }
            (ValueType::Enum(ty), V::Str(name)) => {
                V::Enum(ty.constant_named(name.trim()).ok_or_else(|| {
                    ParmError::invalid(
                        parm,
                        format!(
                            "'{name}' is not a constant of {}",
                            ty.type_name()
                        ),
                    )
                })?)
            }
            (ValueType::Enum(ty), V::Enum(constant)) => {
                if !ty.contains(&constant) {
                    return Err(ParmError::invalid(
                        parm,
                        format!(
                            "{constant} is not a constant of {}",
                            ty.type_name()
                        ),
                    ));
                }
                V::Enum(constant)
            }
            (_, value) => value,
        };
        Ok(converted)
    }

    /// Converts a supplied value to a random variable over this type.
    ///
    /// Random variables of the right shape pass through; plain values are
    /// coerced and wrapped in a fixed variable.
    pub(crate) fn coerce_random(
        &self,
        parm: &str,
        kind: RvKind,
        value: ParmValue,
        namer: &ObjectNamer,
    ) -> Result<ParmValue, ParmError> {
        if value.is_random() {
            return Ok(value);
        }
        let value = self.coerce(parm, value, namer)?;
        let wrapped = match (kind, value) {
            (RvKind::Plain, ParmValue::Bool(v)) => {
                ParmValue::BoolRv(Box::new(FixedRv::new(v)))
            }
            (RvKind::Plain, ParmValue::Int(v)) => {
                ParmValue::IntRv(Box::new(FixedRv::new(v)))
            }
            (RvKind::Plain, ParmValue::Long(v)) => {
                ParmValue::LongRv(Box::new(FixedRv::new(v)))
            }
            (RvKind::Plain, ParmValue::Double(v)) => {
                ParmValue::DoubleRv(Box::new(FixedRv::new(v)))
            }
            (RvKind::Nested, ParmValue::Bool(v)) => {
                ParmValue::BoolRvRv(Box::new(FixedRvRv::new(v)))
            }
            (RvKind::Nested, ParmValue::Int(v)) => {
                ParmValue::IntRvRv(Box::new(FixedRvRv::new(v)))
            }
            (RvKind::Nested, ParmValue::Long(v)) => {
                ParmValue::LongRvRv(Box::new(FixedRvRv::new(v)))
            }
            (RvKind::Nested, ParmValue::Double(v)) => {
                ParmValue::DoubleRvRv(Box::new(FixedRvRv::new(v)))
            }
            (_, other) => other,
        };
        Ok(wrapped)
    }
}

/// Converts a whole number in `min..end` to an integer. The end is
/// exclusive because `i64::MAX` is not representable as an `f64`.
fn integral(
    parm: &str,
    value: f64,
    min: f64,
    end: f64,
) -> Result<i64, ParmError> {
    if value.fract() != 0.0 || !(min..end).contains(&value) {
        return Err(ParmError::invalid(
            parm,
            format!("{value} is not an integer in range"),
        ));
    }
    Ok(value as i64)
}

/// A numeric bound value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Number {
    Integer(i64),
    Real(f64),
}

impl Number {
    fn cmp_long(&self, value: i64) -> Option<Ordering> {
        match self {
            Number::Integer(bound) => Some(value.cmp(bound)),
            Number::Real(bound) => (value as f64).partial_cmp(bound),
        }
    }

    fn cmp_double(&self, value: f64) -> Option<Ordering> {
        match self {
            Number::Integer(bound) => value.partial_cmp(&(*bound as f64)),
            Number::Real(bound) => value.partial_cmp(bound),
        }
    }
}

impl From<i32> for Number {
    fn from(value: i32) -> Self {
        Number::Integer(value.into())
    }
}

impl From<i64> for Number {
    fn from(value: i64) -> Self {
        Number::Integer(value)
    }
}

impl From<f64> for Number {
    fn from(value: f64) -> Self {
        Number::Real(value)
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Integer(value) => write!(f, "{value}"),
            Number::Real(value) => write!(f, "{value}"),
        }
    }
}

/// One end of a numeric range.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bound {
    pub value: Number,
    /// Whether the end point itself is allowed.
    pub closed: bool,
}

/// An optional numeric range on a parameter's values.
///
/// ```
/// use object_namer::Bounds;
///
/// let rate = Bounds::unbounded().with_lower(0, true);
/// assert!(rate.contains_double(0.0));
/// assert!(!rate.contains_double(-0.5));
/// assert_eq!(rate.to_string(), "[0, inf)");
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Bounds {
    pub lower: Option<Bound>,
    pub upper: Option<Bound>,
}

impl Bounds {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_lower(mut self, value: impl Into<Number>, closed: bool) -> Self {
        self.lower = Some(Bound { value: value.into(), closed });
        self
    }

    pub fn with_upper(mut self, value: impl Into<Number>, closed: bool) -> Self {
        self.upper = Some(Bound { value: value.into(), closed });
        self
    }

    pub fn is_unbounded(&self) -> bool {
        self.lower.is_none() && self.upper.is_none()
    }

    pub fn contains_long(&self, value: i64) -> bool {
        self.admits(|bound| bound.cmp_long(value))
    }

    pub fn contains_double(&self, value: f64) -> bool {
        if value.is_nan() {
            return self.is_unbounded();
        }
        self.admits(|bound| bound.cmp_double(value))
    }

    fn admits(&self, compare: impl Fn(&Number) -> Option<Ordering>) -> bool {
        let lower_ok = self.lower.is_none_or(|bound| {
            match compare(&bound.value) {
                Some(Ordering::Greater) => true,
                Some(Ordering::Equal) => bound.closed,
                _ => false,
            }
        });
        let upper_ok = self.upper.is_none_or(|bound| {
            match compare(&bound.value) {
                Some(Ordering::Less) => true,
                Some(Ordering::Equal) => bound.closed,
                _ => false,
            }
        });
        lower_ok && upper_ok
    }

    /// Checks a coerced value against the range.
    ///
    /// Non-numeric values always pass. Random variables are tightened to
    /// the range and pass unless they have no values inside it.
    pub fn enforce(
        &self,
        parm: &str,
        value: &mut ParmValue,
    ) -> Result<(), ParmError> {
        if self.is_unbounded() {
            return Ok(());
        }
        let admitted = match value {
            ParmValue::Int(v) => self.contains_long(i64::from(*v)),
            ParmValue::Long(v) => self.contains_long(*v),
            ParmValue::Double(v) => self.contains_double(*v),
            ParmValue::IntRv(rv) => rv.tighten(self),
            ParmValue::LongRv(rv) => rv.tighten(self),
            ParmValue::DoubleRv(rv) => rv.tighten(self),
            ParmValue::IntRvRv(rv) => rv.tighten(self),
            ParmValue::LongRvRv(rv) => rv.tighten(self),
            ParmValue::DoubleRvRv(rv) => rv.tighten(self),
            _ => true,
        };
        if admitted {
            Ok(())
        } else {
            Err(ParmError::invalid(
                parm,
                format!("{} is outside {}", value.describe(), self),
            ))
        }
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.lower {
            Some(bound) => {
                let open = if bound.closed { "[" } else { "(" };
                write!(f, "{open}{}", bound.value)?;
            }
            None => f.write_str("(-inf")?,
        }
        f.write_str(", ")?;
        match &self.upper {
            Some(bound) => {
                let close = if bound.closed { "]" } else { ")" };
                write!(f, "{}{close}", bound.value)
            }
            None => f.write_str("inf)"),
        }
    }
}

/// A value supplied to a parameter.
///
/// Values arrive loosely typed (often as strings from a configuration
/// file) and are coerced to the parameter's [`ValueType`] before they reach
/// its parser.
#[derive(Debug)]
pub enum ParmValue {
    Str(String),
    Object(ObjectRef),
    Enum(EnumConstant),
    Bool(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    BoolRv(BoolRv),
    BoolRvRv(BoolRvRv),
    IntRv(IntRv),
    IntRvRv(IntRvRv),
    LongRv(LongRv),
    LongRvRv(LongRvRv),
    DoubleRv(DoubleRv),
    DoubleRvRv(DoubleRvRv),
}

impl ParmValue {
    pub fn object<T: NamedObject>(object: &Rc<T>) -> Self {
        ParmValue::Object(object.clone())
    }

    pub fn enumeration<E: ParmEnum>(value: E) -> Self {
        ParmValue::Enum(value.constant())
    }

    pub fn int_rv(rv: impl RandomVariable<Output = i32> + 'static) -> Self {
        ParmValue::IntRv(Box::new(rv))
    }

    pub fn long_rv(rv: impl RandomVariable<Output = i64> + 'static) -> Self {
        ParmValue::LongRv(Box::new(rv))
    }

    pub fn double_rv(rv: impl RandomVariable<Output = f64> + 'static) -> Self {
        ParmValue::DoubleRv(Box::new(rv))
    }

    pub fn bool_rv(rv: impl RandomVariable<Output = bool> + 'static) -> Self {
        ParmValue::BoolRv(Box::new(rv))
    }

    /// The runtime type of the value, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            ParmValue::Str(_) => std::any::type_name::<String>(),
            ParmValue::Object(object) => object.type_name(),
            ParmValue::Enum(constant) => constant.type_name(),
            ParmValue::Bool(_) => "bool",
            ParmValue::Int(_) => "i32",
            ParmValue::Long(_) => "i64",
            ParmValue::Double(_) => "f64",
            ParmValue::BoolRv(rv) => rv.type_name(),
            ParmValue::BoolRvRv(rv) => rv.type_name(),
            ParmValue::IntRv(rv) => rv.type_name(),
            ParmValue::IntRvRv(rv) => rv.type_name(),
            ParmValue::LongRv(rv) => rv.type_name(),
            ParmValue::LongRvRv(rv) => rv.type_name(),
            ParmValue::DoubleRv(rv) => rv.type_name(),
            ParmValue::DoubleRvRv(rv) => rv.type_name(),
        }
    }

    pub fn is_random(&self) -> bool {
        matches!(
            self,
            ParmValue::BoolRv(_)
                | ParmValue::BoolRvRv(_)
                | ParmValue::IntRv(_)
                | ParmValue::IntRvRv(_)
                | ParmValue::LongRv(_)
                | ParmValue::LongRvRv(_)
                | ParmValue::DoubleRv(_)
                | ParmValue::DoubleRvRv(_)
        )
    }

    /// A short rendering for error messages.
    pub fn describe(&self) -> String {
        match self {
            ParmValue::Str(text) => format!("'{text}'"),
            ParmValue::Object(object) => object.name().to_string(),
            ParmValue::Enum(constant) => constant.name().to_string(),
            ParmValue::Bool(v) => v.to_string(),
            ParmValue::Int(v) => v.to_string(),
            ParmValue::Long(v) => v.to_string(),
            ParmValue::Double(v) => v.to_string(),
            random => random.type_name().to_string(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParmValue::Str(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParmValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            ParmValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            ParmValue::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            ParmValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            ParmValue::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_enum<E: ParmEnum>(&self) -> Option<E> {
        match self {
            ParmValue::Enum(constant) => constant.to_enum(),
            _ => None,
        }
    }

    /// Reinterprets a single-component key as a value, for parameters that
    /// hold sets of elements.
    pub(crate) fn from_key(key: ParmKey) -> Option<Self> {
        match key {
            ParmKey::Int(v) => Some(ParmValue::Int(v)),
            ParmKey::Str(text) => Some(ParmValue::Str(text)),
            ParmKey::Object(object) => Some(ParmValue::Object(object)),
            ParmKey::Enum(constant) => Some(ParmValue::Enum(constant)),
            ParmKey::Compound(_) => None,
        }
    }

    /// Reinterprets a plain value as a key.
    pub(crate) fn into_key(self) -> Option<ParmKey> {
        match self {
            ParmValue::Int(v) => Some(ParmKey::Int(v)),
            ParmValue::Long(v) => i32::try_from(v).ok().map(ParmKey::Int),
            ParmValue::Str(text) => Some(ParmKey::Str(text)),
            ParmValue::Object(object) => Some(ParmKey::Object(object)),
            ParmValue::Enum(constant) => Some(ParmKey::Enum(constant)),
            _ => None,
        }
    }
}

impl From<&str> for ParmValue {
    fn from(text: &str) -> Self {
        ParmValue::Str(text.to_string())
    }
}

impl From<String> for ParmValue {
    fn from(text: String) -> Self {
        ParmValue::Str(text)
    }
}

impl From<bool> for ParmValue {
    fn from(value: bool) -> Self {
        ParmValue::Bool(value)
    }
}

impl From<i32> for ParmValue {
    fn from(value: i32) -> Self {
        ParmValue::Int(value)
    }
}

impl From<i64> for ParmValue {
    fn from(value: i64) -> Self {
        ParmValue::Long(value)
    }
}

impl From<f64> for ParmValue {
    fn from(value: f64) -> Self {
        ParmValue::Double(value)
    }
}

impl From<EnumConstant> for ParmValue {
    fn from(constant: EnumConstant) -> Self {
        ParmValue::Enum(constant)
    }
}

impl From<ObjectRef> for ParmValue {
    fn from(object: ObjectRef) -> Self {
        ParmValue::Object(object)
    }
}

impl From<IntRv> for ParmValue {
    fn from(rv: IntRv) -> Self {
        ParmValue::IntRv(rv)
    }
}

impl From<LongRv> for ParmValue {
    fn from(rv: LongRv) -> Self {
        ParmValue::LongRv(rv)
    }
}

impl From<DoubleRv> for ParmValue {
    fn from(rv: DoubleRv) -> Self {
        ParmValue::DoubleRv(rv)
    }
}

impl From<BoolRv> for ParmValue {
    fn from(rv: BoolRv) -> Self {
        ParmValue::BoolRv(rv)
    }
}
