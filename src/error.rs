use thiserror::Error;

/// Errors raised while declaring parameters or applying values to them.
///
/// The variants follow the four ways a configuration value can be
/// rejected: the value itself is bad, the parameter has no use for that
/// shape of value, the factory is not ready for it, or the key addresses
/// a slot that does not exist.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParmError {
    /// A value or key failed a bound, type, or format check.
    #[error("invalid argument for parameter \"{parm}\": {reason}")]
    InvalidArgument {
        /// The parameter being set.
        parm: String,
        /// Why the value was rejected.
        reason: String,
    },
    /// The operation, key shape, or value shape is not meaningful for the
    /// parameter.
    #[error("unsupported operation: {0}")]
    Unsupported(String),
    /// The factory cannot accept the operation in its current state.
    #[error("illegal state: {0}")]
    IllegalState(String),
    /// A keyed operation addressed a key outside the parameter's key space.
    #[error("parameter \"{parm}\": key {key} out of bounds")]
    KeyOutOfBounds {
        /// The parameter being set.
        parm: String,
        /// The offending key, rendered with `ParmKey`'s display form.
        key: String,
    },
    /// No parameter with this name is known to the factory.
    #[error("unknown parameter \"{0}\"")]
    UnknownParm(String),
}

impl ParmError {
    pub(crate) fn invalid(
        parm: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        ParmError::InvalidArgument {
            parm: parm.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised by an [`ObjectNamer`](crate::ObjectNamer) and by the
/// named objects it manages.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NamerError {
    /// An interned object was requested with a name that is already taken.
    #[error("object name \"{0}\" is already in use")]
    NameInUse(String),
    /// Interned objects cannot be cloned.
    #[error("cannot clone interned object \"{0}\"")]
    CloneInterned(String),
    /// Adding the alternate namer would create a lookup cycle.
    #[error("alternate object namer would create a cycle")]
    AlternateCycle,
    /// No factory type is registered under this name.
    #[error("no factory registered for \"{0}\"")]
    UnknownFactory(String),
    /// A factory with this variable name already exists.
    #[error("factory \"{0}\" is already defined")]
    FactoryInUse(String),
    /// A configuration tree or definition could not be applied.
    #[error("configuration error: {0}")]
    Config(String),
    /// A parameter rejected a value while configuring a factory.
    #[error(transparent)]
    Parm(#[from] ParmError),
}
