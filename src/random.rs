use std::fmt;

use crate::value::Bounds;

/// A source of values of one primitive type.
///
/// Parameters declared with a [`RvKind`] take random variables instead of
/// plain values, so that every object a factory creates can draw its own
/// value. A plain value supplied to such a parameter is wrapped in a
/// [`FixedRv`] (or [`FixedRvRv`]) that always produces it.
pub trait RandomVariable: fmt::Debug {
    type Output;

    /// Draws the next value.
    fn next(&mut self) -> Self::Output;

    /// Restricts every later draw to `bounds`.
    ///
    /// Called with the parameter's declared range before the variable is
    /// handed to a parser. Returns `false` if the variable has no values
    /// inside the range, in which case it is rejected.
    fn tighten(&mut self, bounds: &Bounds) -> bool;

    /// The fully qualified name of the concrete variable type.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

pub type BoolRv = Box<dyn RandomVariable<Output = bool>>;
pub type IntRv = Box<dyn RandomVariable<Output = i32>>;
pub type LongRv = Box<dyn RandomVariable<Output = i64>>;
pub type DoubleRv = Box<dyn RandomVariable<Output = f64>>;

/// A random variable whose draws are themselves random variables.
pub type BoolRvRv = Box<dyn RandomVariable<Output = BoolRv>>;
pub type IntRvRv = Box<dyn RandomVariable<Output = IntRv>>;
pub type LongRvRv = Box<dyn RandomVariable<Output = LongRv>>;
pub type DoubleRvRv = Box<dyn RandomVariable<Output = DoubleRv>>;

/// Whether a parameter takes random variables, and of which depth.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RvKind {
    /// The parameter takes a random variable over its value type.
    Plain,
    /// The parameter takes a random variable over random variables.
    Nested,
}

impl RvKind {
    pub fn description(&self) -> &'static str {
        match self {
            RvKind::Plain => "random variable",
            RvKind::Nested => "random variable of random variables",
        }
    }
}

/// The primitive types a random variable can produce.
pub trait Sample: Copy + fmt::Debug + 'static {
    /// True if the value lies within `bounds`.
    fn within(&self, bounds: &Bounds) -> bool;
}

impl Sample for bool {
    fn within(&self, _bounds: &Bounds) -> bool {
        true
    }
}

impl Sample for i32 {
    fn within(&self, bounds: &Bounds) -> bool {
        bounds.contains_long(i64::from(*self))
    }
}

impl Sample for i64 {
    fn within(&self, bounds: &Bounds) -> bool {
        bounds.contains_long(*self)
    }
}

impl Sample for f64 {
    fn within(&self, bounds: &Bounds) -> bool {
        bounds.contains_double(*self)
    }
}

/// A random variable that always yields the same value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FixedRv<T> {
    value: T,
}

impl<T: Sample> FixedRv<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }

    pub fn value(&self) -> T {
        self.value
    }
}

impl<T: Sample> RandomVariable for FixedRv<T> {
    type Output = T;

    fn next(&mut self) -> T {
        self.value
    }

    fn tighten(&mut self, bounds: &Bounds) -> bool {
        self.value.within(bounds)
    }
}

/// A random variable that always yields a [`FixedRv`] of the same value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FixedRvRv<T> {
    value: T,
}

impl<T: Sample> FixedRvRv<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }

    pub fn value(&self) -> T {
        self.value
    }
}

impl<T: Sample> RandomVariable for FixedRvRv<T> {
    type Output = Box<dyn RandomVariable<Output = T>>;

    fn next(&mut self) -> Self::Output {
        Box::new(FixedRv::new(self.value))
    }

    fn tighten(&mut self, bounds: &Bounds) -> bool {
        self.value.within(bounds)
    }
}
