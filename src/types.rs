use std::any::TypeId;
use std::fmt;

/// A runtime description of a Rust type: its fully qualified name plus
/// its identity.
///
/// Two tags are equal only when they describe the same type.
#[derive(Clone, Copy)]
pub struct TypeTag {
    name: &'static str,
    id: TypeId,
}

impl TypeTag {
    /// Returns the tag for `T`.
    ///
    /// ```
    /// use object_namer::TypeTag;
    ///
    /// assert_eq!(TypeTag::of::<i32>().name(), "i32");
    /// assert_eq!(TypeTag::of::<String>(), TypeTag::of::<String>());
    /// assert_ne!(TypeTag::of::<String>(), TypeTag::of::<i32>());
    /// ```
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            name: std::any::type_name::<T>(),
            id: TypeId::of::<T>(),
        }
    }

    /// The fully qualified type name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The type's identity.
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// True if this tag describes `T`.
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl PartialEq for TypeTag {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeTag {}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// One constant of an enumeration, detached from its Rust type so that it
/// can travel through the untyped parameter machinery.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EnumConstant {
    type_name: &'static str,
    name: &'static str,
    ordinal: usize,
}

impl EnumConstant {
    pub fn new(
        type_name: &'static str,
        name: &'static str,
        ordinal: usize,
    ) -> Self {
        Self { type_name, name, ordinal }
    }

    /// The fully qualified name of the enumeration type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The constant's configuration name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The constant's position in declaration order.
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// Converts back to the typed enumeration, if the constant belongs to
    /// `E`.
    pub fn to_enum<E: ParmEnum>(&self) -> Option<E> {
        if self.type_name != std::any::type_name::<E>() {
            return None;
        }
        E::VALUES.get(self.ordinal).copied()
    }
}

impl fmt::Display for EnumConstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Describes an enumeration type usable as a parameter value or key.
#[derive(Clone, Copy)]
pub struct EnumType {
    type_name: &'static str,
    names: &'static [&'static str],
}

impl EnumType {
    /// Returns the descriptor for `E`.
    pub fn of<E: ParmEnum>() -> Self {
        Self {
            type_name: std::any::type_name::<E>(),
            names: E::NAMES,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Constant names in declaration order.
    pub fn names(&self) -> &'static [&'static str] {
        self.names
    }

    /// Looks up a constant by its configuration name.
    pub fn constant_named(&self, name: &str) -> Option<EnumConstant> {
        self.names
            .iter()
            .position(|candidate| *candidate == name)
            .map(|ordinal| {
                EnumConstant::new(self.type_name, self.names[ordinal], ordinal)
            })
    }

    /// True if the constant belongs to this enumeration.
    pub fn contains(&self, constant: &EnumConstant) -> bool {
        constant.type_name == self.type_name
            && self.names.get(constant.ordinal) == Some(&constant.name)
    }
}

impl PartialEq for EnumType {
    fn eq(&self, other: &Self) -> bool {
        self.type_name == other.type_name
    }
}

impl Eq for EnumType {}

impl fmt::Debug for EnumType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name)
    }
}

/// A fieldless enumeration whose constants can be configured by name.
///
/// Implement it with [`parm_enum!`](crate::parm_enum) rather than by hand.
pub trait ParmEnum: Copy + 'static {
    /// All constants, in declaration order.
    const VALUES: &'static [Self];
    /// Configuration names, parallel to `VALUES`.
    const NAMES: &'static [&'static str];

    /// Position of this constant in `VALUES`.
    fn ordinal(&self) -> usize;

    /// The constant's configuration name.
    fn name(&self) -> &'static str {
        Self::NAMES[self.ordinal()]
    }

    /// The detached form used by [`ParmValue`](crate::ParmValue) and
    /// [`ParmKey`](crate::ParmKey).
    fn constant(&self) -> EnumConstant {
        EnumConstant::new(
            std::any::type_name::<Self>(),
            self.name(),
            self.ordinal(),
        )
    }

    /// Looks up a constant by configuration name.
    fn from_name(name: &str) -> Option<Self> {
        Self::NAMES
            .iter()
            .position(|candidate| *candidate == name)
            .map(|ordinal| Self::VALUES[ordinal])
    }
}

/// Declares a fieldless enumeration usable as a parameter value or key.
///
/// Besides the enum itself this emits a `<ENUM>_NAMES` constant listing
/// the configuration names in declaration order.
///
/// # Examples
///
/// ```
/// use object_namer::*;
/// use paste::paste;
///
/// parm_enum! {
///     pub enum LineStyle {
///         Solid => "SOLID",
///         Dashed => "DASHED",
///     }
/// }
///
/// assert_eq!(LineStyle::Dashed.name(), "DASHED");
/// assert_eq!(LineStyle::from_name("SOLID"), Some(LineStyle::Solid));
/// paste! {
///     assert_eq!([<LINE_STYLE _NAMES>], &["SOLID", "DASHED"]);
/// }
/// ```
#[macro_export]
macro_rules! parm_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($variant:ident => $label:expr),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($variant),+
        }

        paste! {
            $vis const [<$name:snake:upper _NAMES>]: &[&str] = &[$($label),+];
        }

        impl $crate::ParmEnum for $name {
            const VALUES: &'static [Self] = &[$($name::$variant),+];
            const NAMES: &'static [&'static str] = &[$($label),+];

            fn ordinal(&self) -> usize {
                Self::VALUES
                    .iter()
                    .position(|candidate| candidate == self)
                    .unwrap_or(0)
            }
        }
    };
}
