use std::cell::OnceCell;
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use crate::error::ParmError;
use crate::key::{KeyKind, ParmKey};
use crate::manager::ParmManager;
use crate::value::{Bounds, ParmValue};

/// Applies values for one parameter to a factory of type `F`.
///
/// A parser overrides [`parse`](ParmParser::parse) and/or
/// [`clear`](ParmParser::clear) for the key and value shapes it supports.
/// The defaults reject the call with [`ParmError::Unsupported`], naming the
/// parameter, the key, and the runtime type of the value.
///
/// Every parser is bound to exactly one [`Parm`](crate::Parm); binding
/// happens when the `Parm` is constructed.
pub trait ParmParser<F> {
    fn binding(&self) -> &ParmBinding<F>;

    /// Applies `value` (with `key`, for keyed parameters) to `target`.
    fn parse(
        &self,
        target: &mut F,
        key: Option<&ParmKey>,
        value: ParmValue,
    ) -> Result<(), ParmError> {
        let _ = target;
        Err(self.binding().unsupported_parse(key, &value))
    }

    /// Removes or resets the value at `key`, or the whole value when `key`
    /// is `None`.
    fn clear(
        &self,
        target: &mut F,
        key: Option<&ParmKey>,
    ) -> Result<(), ParmError> {
        let _ = target;
        Err(self.binding().unsupported_clear(key))
    }

    /// The name of the parameter this parser is bound to.
    fn parm_name<'a>(&'a self) -> &'a str
    where
        F: 'a,
    {
        self.binding().parm_name()
    }

    /// The parser of an earlier parameter with the same name and key type,
    /// if this parser chains to one.
    fn alt_parser(&self) -> Option<&Rc<dyn ParmParser<F>>> {
        self.binding().alternate()
    }
}

struct Bound {
    name: String,
    bounds: Bounds,
}

/// The state every parser carries: the parameter it is bound to and the
/// parser it chains to.
pub struct ParmBinding<F> {
    bound: OnceCell<Bound>,
    alternate: Option<Rc<dyn ParmParser<F>>>,
}

impl<F> ParmBinding<F> {
    /// A binding with no alternate parser.
    pub fn new() -> Self {
        Self { bound: OnceCell::new(), alternate: None }
    }

    /// A binding that chains to the parser of the parameter already
    /// registered under `name`, when that parameter has the same
    /// non-compound key kind.
    ///
    /// This lets a derived factory redeclare a parameter, handle the cases
    /// it knows about, and hand the rest to the base declaration.
    pub fn chained(manager: &ParmManager<F>, name: &str, key: &KeyKind) -> Self {
        let alternate = manager
            .get_parm(name)
            .filter(|parm| parm.key_kind().chains_with(key))
            .map(|parm| Rc::clone(parm.parser()));
        if alternate.is_some() {
            debug!(parm = name, "parser chained to earlier declaration");
        }
        Self { bound: OnceCell::new(), alternate }
    }

    /// Records the parameter this parser belongs to. Fails if the parser is
    /// already bound.
    pub(crate) fn bind(&self, name: &str, bounds: Bounds) -> Result<(), ParmError> {
        if let Some(existing) = self.bound.get() {
            return Err(ParmError::IllegalState(format!(
                "there must be only one parameter per parser: parser for \
                 \"{}\" cannot also serve \"{name}\"",
                existing.name
            )));
        }
        let _ = self.bound.set(Bound { name: name.to_string(), bounds });
        Ok(())
    }

    pub fn is_bound(&self) -> bool {
        self.bound.get().is_some()
    }

    /// The bound parameter name, or `"<unbound>"`.
    pub fn parm_name(&self) -> &str {
        self.bound.get().map_or("<unbound>", |bound| bound.name.as_str())
    }

    /// The numeric range declared for the parameter.
    pub fn bounds(&self) -> Bounds {
        self.bound.get().map(|bound| bound.bounds).unwrap_or_default()
    }

    pub fn alternate(&self) -> Option<&Rc<dyn ParmParser<F>>> {
        self.alternate.as_ref()
    }

    /// The chain of alternate parsers, nearest first.
    pub fn alternates(&self) -> impl Iterator<Item = &Rc<dyn ParmParser<F>>> {
        std::iter::successors(self.alternate(), |parser| {
            parser.binding().alternate()
        })
    }

    /// Checks a value against the parameter's declared range, tightening
    /// random variables to it.
    pub fn check_bounds(&self, value: &mut ParmValue) -> Result<(), ParmError> {
        self.bounds().enforce(self.parm_name(), value)
    }

    /// The error a parser returns for a `parse` call it does not handle.
    pub fn unsupported_parse(
        &self,
        key: Option<&ParmKey>,
        value: &ParmValue,
    ) -> ParmError {
        let name = self.parm_name();
        let value_type = value.type_name();
        ParmError::Unsupported(match key {
            None => format!(
                "parameter \"{name}\" does not accept a value of type \
                 {value_type}"
            ),
            Some(key) => format!(
                "parameter \"{name}\" with key \"{key}\" ({}) does not \
                 accept a value of type {value_type}",
                key.type_name()
            ),
        })
    }

    /// The error a parser returns for a `clear` call it does not handle.
    pub fn unsupported_clear(&self, key: Option<&ParmKey>) -> ParmError {
        let name = self.parm_name();
        ParmError::Unsupported(match key {
            None => format!("parameter \"{name}\" cannot be cleared"),
            Some(key) => format!(
                "parameter \"{name}\" cannot be cleared for key \"{key}\" ({})",
                key.type_name()
            ),
        })
    }

    /// The error a parser returns for a key outside its key space.
    pub fn key_out_of_bounds(&self, key: &ParmKey) -> ParmError {
        ParmError::KeyOutOfBounds {
            parm: self.parm_name().to_string(),
            key: key.to_string(),
        }
    }

    /// An invalid-argument error attributed to the bound parameter.
    pub fn invalid(&self, reason: impl Into<String>) -> ParmError {
        ParmError::invalid(self.parm_name(), reason)
    }

    /// Hands a `parse` call to the alternate parser, or rejects it when there
    /// is none.
    pub fn forward_parse(
        &self,
        target: &mut F,
        key: Option<&ParmKey>,
        value: ParmValue,
    ) -> Result<(), ParmError> {
        match &self.alternate {
            Some(alternate) => alternate.parse(target, key, value),
            None => Err(self.unsupported_parse(key, &value)),
        }
    }

    /// Hands a `clear` call to the alternate parser, or rejects it when there
    /// is none.
    pub fn forward_clear(
        &self,
        target: &mut F,
        key: Option<&ParmKey>,
    ) -> Result<(), ParmError> {
        match &self.alternate {
            Some(alternate) => alternate.clear(target, key),
            None => Err(self.unsupported_clear(key)),
        }
    }
}

impl<F> Default for ParmBinding<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F> fmt::Debug for ParmBinding<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParmBinding")
            .field("parm", &self.parm_name())
            .field("chained", &self.alternate.is_some())
            .finish()
    }
}

type ParseFn<F> = Box<
    dyn Fn(
        &ParmBinding<F>,
        &mut F,
        Option<&ParmKey>,
        ParmValue,
    ) -> Result<(), ParmError>,
>;

type ClearFn<F> = Box<
    dyn Fn(&ParmBinding<F>, &mut F, Option<&ParmKey>) -> Result<(), ParmError>,
>;

/// A parser assembled from closures.
///
/// Either closure may be left out, in which case that operation is
/// unsupported. The closures receive the binding so that they can build
/// errors or forward to an alternate parser.
///
/// ```
/// use object_namer::{ClosureParser, ParmParser, ParmValue};
///
/// #[derive(Default)]
/// struct Factory {
///     rate: f64,
/// }
///
/// let parser = ClosureParser::<Factory>::new()
///     .on_parse(|binding, factory, key, value| match (key, value) {
///         (None, ParmValue::Double(rate)) => {
///             factory.rate = rate;
///             Ok(())
///         }
///         (key, value) => Err(binding.unsupported_parse(key, &value)),
///     });
///
/// let mut factory = Factory::default();
/// parser.parse(&mut factory, None, ParmValue::Double(0.5)).unwrap();
/// assert_eq!(factory.rate, 0.5);
/// assert!(parser.clear(&mut factory, None).is_err());
/// ```
pub struct ClosureParser<F> {
    binding: ParmBinding<F>,
    on_parse: Option<ParseFn<F>>,
    on_clear: Option<ClearFn<F>>,
}

impl<F> ClosureParser<F> {
    pub fn new() -> Self {
        Self::with_binding(ParmBinding::new())
    }

    pub fn with_binding(binding: ParmBinding<F>) -> Self {
        Self { binding, on_parse: None, on_clear: None }
    }

    pub fn on_parse(
        mut self,
        parse: impl Fn(
            &ParmBinding<F>,
            &mut F,
            Option<&ParmKey>,
            ParmValue,
        ) -> Result<(), ParmError>
        + 'static,
    ) -> Self {
        self.on_parse = Some(Box::new(parse));
        self
    }

    pub fn on_clear(
        mut self,
        clear: impl Fn(&ParmBinding<F>, &mut F, Option<&ParmKey>) -> Result<(), ParmError>
        + 'static,
    ) -> Self {
        self.on_clear = Some(Box::new(clear));
        self
    }
}

impl<F> Default for ClosureParser<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F> ParmParser<F> for ClosureParser<F> {
    fn binding(&self) -> &ParmBinding<F> {
        &self.binding
    }

    fn parse(
        &self,
        target: &mut F,
        key: Option<&ParmKey>,
        value: ParmValue,
    ) -> Result<(), ParmError> {
        match &self.on_parse {
            Some(parse) => parse(&self.binding, target, key, value),
            None => Err(self.binding.unsupported_parse(key, &value)),
        }
    }

    fn clear(
        &self,
        target: &mut F,
        key: Option<&ParmKey>,
    ) -> Result<(), ParmError> {
        match &self.on_clear {
            Some(clear) => clear(&self.binding, target, key),
            None => Err(self.binding.unsupported_clear(key)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::ParmRequest;
    use crate::key::KeyComponent;
    use crate::namer::ObjectNamer;
    use crate::parm::Parm;
    use crate::value::ValueType;

    struct Target;

    #[derive(Default)]
    struct Mixer {
        gains: [f64; 3],
    }

    /// Sets one channel gain of a three-channel mixer.
    fn gains_parser() -> Rc<dyn ParmParser<Mixer>> {
        Rc::new(ClosureParser::<Mixer>::new().on_parse(
            |binding, mixer, key, mut value| {
                let Some(key) = key else {
                    return Err(binding.unsupported_parse(None, &value));
                };
                let channel = key
                    .as_int()
                    .and_then(|index| usize::try_from(index).ok())
                    .filter(|&index| index < mixer.gains.len())
                    .ok_or_else(|| binding.key_out_of_bounds(key))?;
                binding.check_bounds(&mut value)?;
                match value {
                    ParmValue::Double(gain) => {
                        mixer.gains[channel] = gain;
                        Ok(())
                    }
                    value => Err(binding.unsupported_parse(Some(key), &value)),
                }
            },
        ))
    }

    struct Silent {
        binding: ParmBinding<Target>,
    }

    impl ParmParser<Target> for Silent {
        fn binding(&self) -> &ParmBinding<Target> {
            &self.binding
        }
    }

    fn silent() -> Rc<dyn ParmParser<Target>> {
        Rc::new(Silent { binding: ParmBinding::new() })
    }

    #[test]
    fn test_default_parse_failure_names_everything() {
        let parser = silent();
        Parm::unkeyed("speed", None, parser.clone(), ValueType::Int).unwrap();

        let err = parser
            .parse(&mut Target, None, ParmValue::Double(1.5))
            .unwrap_err();
        let ParmError::Unsupported(message) = err else {
            panic!("expected an unsupported error");
        };
        assert!(message.contains("\"speed\""));
        assert!(message.contains("f64"));

        let key = ParmKey::Compound(vec![ParmKey::from("a"), ParmKey::from(2)]);
        let err = parser
            .parse(&mut Target, Some(&key), ParmValue::from("fast"))
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("\"a.2\""));
        assert!(message.contains("alloc::string::String"));
    }

    #[test]
    fn test_default_clear_failure() {
        let parser = silent();
        Parm::unkeyed("speed", None, parser.clone(), ValueType::Int).unwrap();
        let message = parser.clear(&mut Target, None).unwrap_err().to_string();
        assert!(message.contains("\"speed\" cannot be cleared"));

        let message = parser
            .clear(&mut Target, Some(&ParmKey::Int(3)))
            .unwrap_err()
            .to_string();
        assert!(message.contains("key \"3\" (i32)"));
    }

    #[test]
    fn test_unbound_parser_name() {
        let binding = ParmBinding::<Target>::new();
        assert_eq!(binding.parm_name(), "<unbound>");
        assert!(!binding.is_bound());
        assert!(binding.bounds().is_unbounded());
    }

    #[test]
    fn test_bind_twice_fails() {
        let binding = ParmBinding::<Target>::new();
        binding.bind("first", Bounds::unbounded()).unwrap();
        let err = binding.bind("second", Bounds::unbounded()).unwrap_err();
        assert!(matches!(err, ParmError::IllegalState(_)));
        assert_eq!(binding.parm_name(), "first");
    }

    #[test]
    fn test_key_outside_fixed_channels() {
        let parser = gains_parser();
        let unit = Bounds::unbounded().with_lower(0, true).with_upper(1, true);
        let gains = Parm::keyed_bounded(
            "gains",
            KeyComponent::Int,
            None,
            parser.clone(),
            ValueType::Double,
            unit,
        )
        .unwrap();

        let mut mixer = Mixer::default();
        parser
            .parse(&mut mixer, Some(&ParmKey::Int(1)), ParmValue::Double(0.5))
            .unwrap();
        assert_eq!(mixer.gains, [0.0, 0.5, 0.0]);

        for index in [3, -1] {
            let err = parser
                .parse(&mut mixer, Some(&ParmKey::Int(index)), ParmValue::Double(0.5))
                .unwrap_err();
            assert_eq!(
                err,
                ParmError::KeyOutOfBounds {
                    parm: "gains".to_string(),
                    key: index.to_string(),
                }
            );
        }

        let mut manager = ParmManager::<Mixer>::new();
        manager.add_parm(gains);
        let namer = ObjectNamer::new();
        let err = manager
            .dispatch(&mut mixer, &namer, ParmRequest::set_keyed("gains", 7, 0.5))
            .unwrap_err();
        assert!(matches!(err, ParmError::KeyOutOfBounds { ref key, .. } if key == "7"));
        assert!(err.to_string().contains("key 7 out of bounds"));
    }

    #[test]
    fn test_parser_checks_declared_bounds() {
        let parser = gains_parser();
        let unit = Bounds::unbounded().with_lower(0, true).with_upper(1, true);
        Parm::keyed_bounded(
            "gains",
            KeyComponent::Int,
            None,
            parser.clone(),
            ValueType::Double,
            unit,
        )
        .unwrap();

        let mut mixer = Mixer::default();
        let err = parser
            .parse(&mut mixer, Some(&ParmKey::Int(0)), ParmValue::Double(1.5))
            .unwrap_err();
        assert!(matches!(err, ParmError::InvalidArgument { ref parm, .. } if parm == "gains"));
        assert_eq!(mixer.gains, [0.0; 3]);

        let mut value = ParmValue::Double(1.0);
        assert!(parser.binding().check_bounds(&mut value).is_ok());
    }
}
