//! Binding resolution: how a raw token becomes a value, and how the value is
//! checked.
//!
//! Resolution works over a closed set of shapes. For a parser these are a
//! constructor `T::new(string)`, a direct method `T::parse(string) -> T` and
//! a try-parse `T::try_parse(string, out T) -> bool`, plus the built-in
//! identity, boolean, nullable, sequence and enumeration cases. Every failure
//! is a [`BindError`] wrapped into an `Invalid` binding; nothing here panics
//! on a bad declaration.

use std::collections::HashMap;

use crate::{
    descriptor::ValidatorRef,
    lookup::{CandidateLookup, Callable, CallableKind, Param, Ret, Returns},
    ty::Ty,
    value::Value,
};

#[derive(Debug, Clone, PartialEq)]
pub enum ParserBinding {
    Identity,
    DirectMethod(Callable),
    Constructor(Callable),
    BoolOutMethod(Callable),
    /// Parses with the inner binding; an empty token or a failure is absent.
    Nullable(Box<ParserBinding>),
    Invalid(BindError),
}

/// What a validator receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidatorTarget {
    Value,
    /// The whole collection of a repeatable option.
    Whole,
    /// Each element of a repeatable option.
    Element,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValidatorBinding {
    MethodPredicate {
        callable: Callable,
        target: ValidatorTarget,
        /// Returns nothing and signals failure by raising.
        raises: bool,
        message: Option<String>,
    },
    PropertyPredicate {
        property: String,
        expected: bool,
        target: ValidatorTarget,
        message: Option<String>,
    },
    Invalid(BindError),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BindError {
    #[error("no parser for `{ty}`: expected `{ty}::new(string)`, `{ty}::parse(string)` or `{ty}::try_parse(string, out {ty})`")]
    NotFound { ty: Ty },
    #[error("ambiguous binding for `{ty}`: {} candidates match ({})", .candidates.len(), .candidates.join(", "))]
    Ambiguous { ty: Ty, candidates: Vec<String> },
    #[error("`{reference}` does not name a function or constructor")]
    UnknownReference { reference: String },
    #[error("`{reference}` cannot convert a string into `{ty}`; candidates: {}", .found.join(", "))]
    ShapeMismatch { reference: String, ty: Ty, found: Vec<String> },
    #[error("`{reference}` does not accept `{ty}` or return `bool`/nothing; candidates: {}", .found.join(", "))]
    ValidatorMismatch { reference: String, ty: Ty, found: Vec<String> },
    #[error("`{reference}` declares {count} type parameters, at most one is supported")]
    TooManyGenerics { reference: String, count: u8 },
    #[error("cannot infer the type parameter of `{reference}` from `{ty}`")]
    UninferableGeneric { reference: String, ty: Ty },
    #[error("`{ty}` has no member `{property}`")]
    UnknownProperty { ty: Ty, property: String },
    #[error("member `{property}` of `{ty}` is `{found}`, expected `bool`")]
    NotBoolProperty { ty: Ty, property: String, found: Ty },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub parser: ParserBinding,
    /// The parser binds to the element type of a sequence target: the owning
    /// option accumulates one element per occurrence.
    pub element_wise: bool,
}

/// Memoizing resolver. Resolution is a pure function of its inputs, so the
/// caches never need invalidation.
pub struct Resolver<'a, L: ?Sized> {
    lookup: &'a L,
    parsers: HashMap<(Ty, Option<String>), Resolved>,
    validators: HashMap<(ValidatorRef, Ty, bool), ValidatorBinding>,
}

impl<'a, L: CandidateLookup + ?Sized> Resolver<'a, L> {
    pub fn new(lookup: &'a L) -> Self {
        Self { lookup, parsers: HashMap::new(), validators: HashMap::new() }
    }

    pub fn lookup(&self) -> &'a L {
        self.lookup
    }

    pub fn resolve_parser(&mut self, ty: &Ty, explicit: Option<&str>) -> Resolved {
        let key = (ty.clone(), explicit.map(str::to_string));
        if let Some(it) = self.parsers.get(&key) {
            return it.clone();
        }
        let res = match explicit {
            Some(reference) => self.explicit_parser(ty, reference),
            None => self.auto_parser(ty),
        };
        tracing::debug!(%ty, ?explicit, parser = ?res.parser, "resolved parser");
        self.parsers.insert(key, res.clone());
        res
    }

    pub fn resolve_validator(
        &mut self,
        reference: &ValidatorRef,
        ty: &Ty,
        repeatable: bool,
    ) -> ValidatorBinding {
        let key = (reference.clone(), ty.clone(), repeatable);
        if let Some(it) = self.validators.get(&key) {
            return it.clone();
        }
        let res = match reference {
            ValidatorRef::Method { name, message } => {
                self.method_validator(name, message.clone(), ty, repeatable)
            }
            ValidatorRef::Property { name, expected, message } => {
                self.property_validator(name, expected.unwrap_or(true), message.clone(), ty, repeatable)
            }
        };
        tracing::debug!(%ty, validator = reference.name(), "resolved validator");
        self.validators.insert(key, res.clone());
        res
    }

    fn auto_parser(&mut self, ty: &Ty) -> Resolved {
        let parser = match ty {
            it if it.is_string_like() => ParserBinding::Identity,
            Ty::Bool => ParserBinding::DirectMethod(as_bool()),
            Ty::Nullable(inner) => match self.resolve_parser(inner, None) {
                Resolved { parser: ParserBinding::Invalid(err), .. } => ParserBinding::Invalid(err),
                Resolved { element_wise: true, .. } => {
                    ParserBinding::Invalid(BindError::NotFound { ty: ty.clone() })
                }
                Resolved { parser, .. } => ParserBinding::Nullable(Box::new(parser)),
            },
            Ty::Seq(elem) => {
                if elem.element().is_some() {
                    ParserBinding::Invalid(BindError::NotFound { ty: ty.clone() })
                } else {
                    let parser = self.resolve_parser(elem, None).parser;
                    return Resolved { parser, element_wise: true };
                }
            }
            Ty::Named(name) if self.lookup.enum_cases(name).is_some() => {
                ParserBinding::DirectMethod(self.enum_parser(name))
            }
            Ty::Param(_) => ParserBinding::Invalid(BindError::NotFound { ty: ty.clone() }),
            _ => self.conventional_parser(ty),
        };
        Resolved { parser, element_wise: false }
    }

    /// The conventional shapes of a type without an explicit reference.
    fn conventional_parser(&self, ty: &Ty) -> ParserBinding {
        let mut matches = Vec::new();
        let constructor = format!("{ty}::new");
        for it in self.lookup.lookup_callables(&constructor, 1) {
            if let Some(binding) = self.match_constructor(&it, ty) {
                matches.push(binding);
            }
        }
        for it in self.lookup.lookup_callables(&format!("{ty}::parse"), 1) {
            if let Some(binding) = self.match_direct(&it, ty) {
                matches.push(binding);
            }
        }
        for it in self.lookup.lookup_callables(&format!("{ty}::try_parse"), 2) {
            if let Some(binding) = self.match_bool_out(&it, ty) {
                matches.push(binding);
            }
        }
        single(ty, matches).unwrap_or_else(|| ParserBinding::Invalid(BindError::NotFound { ty: ty.clone() }))
    }

    fn explicit_parser(&mut self, ty: &Ty, reference: &str) -> Resolved {
        let mut candidates = self.lookup.lookup_callables(reference, 1);
        candidates.extend(self.lookup.lookup_callables(reference, 2));
        if candidates.is_empty() {
            let err = BindError::UnknownReference { reference: reference.to_string() };
            return Resolved { parser: ParserBinding::Invalid(err), element_wise: false };
        }

        let res = self.match_explicit(&candidates, ty, reference);
        if let ParserBinding::Invalid(BindError::ShapeMismatch { .. }) = res {
            if let Some(elem) = ty.element() {
                let parser = self.match_explicit(&candidates, elem, reference);
                if !matches!(parser, ParserBinding::Invalid(_)) {
                    return Resolved { parser, element_wise: true };
                }
            }
        }
        Resolved { parser: res, element_wise: false }
    }

    fn match_explicit(&self, candidates: &[Callable], ty: &Ty, reference: &str) -> ParserBinding {
        let mut matches = Vec::new();
        for it in candidates {
            if it.generics() > 1 {
                let count = it.generics();
                return ParserBinding::Invalid(BindError::TooManyGenerics {
                    reference: reference.to_string(),
                    count,
                });
            }
            let binding = self
                .match_direct(it, ty)
                .or_else(|| self.match_constructor(it, ty))
                .or_else(|| self.match_bool_out(it, ty));
            matches.extend(binding);
        }
        if matches.is_empty() {
            if let Some(it) = candidates.iter().find(|it| it.generics() == 1) {
                return ParserBinding::Invalid(BindError::UninferableGeneric {
                    reference: it.name().to_string(),
                    ty: ty.clone(),
                });
            }
            return ParserBinding::Invalid(BindError::ShapeMismatch {
                reference: reference.to_string(),
                ty: ty.clone(),
                found: candidates.iter().map(|it| it.to_string()).collect(),
            });
        }
        single(ty, matches).unwrap_or_else(|| ParserBinding::Invalid(BindError::NotFound { ty: ty.clone() }))
    }

    fn match_direct(&self, callable: &Callable, ty: &Ty) -> Option<ParserBinding> {
        if callable.kind() != CallableKind::Function || callable.generics() > 1 {
            return None;
        }
        let [Param::In(param)] = callable.params() else { return None };
        let Returns::Ty(ret) = callable.ret() else { return None };
        let mut bound = vec![None; callable.generics() as usize];
        if ret.has_params() && !ret.unify(ty, &mut bound) {
            return None;
        }
        let ret = ret.substitute(&bound);
        let param = param.substitute(&bound);
        (accepts_string(&param) && self.lookup.is_assignable(&ret, ty))
            .then(|| ParserBinding::DirectMethod(callable.clone()))
    }

    fn match_constructor(&self, callable: &Callable, ty: &Ty) -> Option<ParserBinding> {
        if callable.kind() != CallableKind::Constructor {
            return None;
        }
        let [Param::In(param)] = callable.params() else { return None };
        let Returns::Ty(ret) = callable.ret() else { return None };
        (accepts_string(param) && self.lookup.is_assignable(ret, ty))
            .then(|| ParserBinding::Constructor(callable.clone()))
    }

    fn match_bool_out(&self, callable: &Callable, ty: &Ty) -> Option<ParserBinding> {
        if callable.kind() != CallableKind::Function || callable.generics() > 1 {
            return None;
        }
        let [Param::In(param), Param::Out(out)] = callable.params() else { return None };
        if callable.ret() != &Returns::Ty(Ty::Bool) {
            return None;
        }
        let mut bound = vec![None; callable.generics() as usize];
        if !out.unify(ty, &mut bound) {
            return None;
        }
        accepts_string(&param.substitute(&bound)).then(|| ParserBinding::BoolOutMethod(callable.clone()))
    }

    fn enum_parser(&self, name: &str) -> Callable {
        let cases = self.lookup.enum_cases(name).unwrap_or_default().to_vec();
        let ty = name.to_string();
        let fn_name = format!("{name}::from_name");
        Callable::new(
            &fn_name,
            CallableKind::Function,
            vec![Param::In(Ty::String)],
            Returns::Ty(Ty::named(name)),
            move |args| {
                let text = args.first().and_then(Value::as_str).unwrap_or_default();
                match cases.iter().find(|it| it.name == text) {
                    Some(case) => Ok(Ret::Value(Value::Enum {
                        ty: ty.clone(),
                        case: case.name.clone(),
                        discriminant: case.discriminant,
                    })),
                    None => {
                        let names = cases.iter().map(|it| format!("`{}`", it.name)).collect::<Vec<_>>();
                        Err(format!("unknown variant `{text}`, expected one of {}", names.join(", ")))
                    }
                }
            },
        )
    }

    fn method_validator(
        &self,
        name: &str,
        message: Option<String>,
        ty: &Ty,
        repeatable: bool,
    ) -> ValidatorBinding {
        let candidates = self.lookup.lookup_callables(name, 1);
        if candidates.is_empty() {
            return ValidatorBinding::Invalid(BindError::UnknownReference { reference: name.to_string() });
        }
        let value_ty = ty.nullable_inner().unwrap_or(ty);
        let targets = match (repeatable, ty.element()) {
            (true, Some(elem)) => vec![(ValidatorTarget::Whole, ty), (ValidatorTarget::Element, elem)],
            _ => vec![(ValidatorTarget::Value, value_ty)],
        };

        let mut matches = Vec::new();
        for it in &candidates {
            if it.generics() > 1 {
                return ValidatorBinding::Invalid(BindError::TooManyGenerics {
                    reference: name.to_string(),
                    count: it.generics(),
                });
            }
            let raises = match it.ret() {
                Returns::Unit => true,
                Returns::Ty(Ty::Bool) => false,
                Returns::Ty(_) => continue,
            };
            let [Param::In(param)] = it.params() else { continue };
            let target = targets.iter().find(|(_, target_ty)| {
                let mut bound = vec![None; it.generics() as usize];
                let param = if param.has_params() {
                    if !param.unify(target_ty, &mut bound) {
                        return false;
                    }
                    param.substitute(&bound)
                } else {
                    param.clone()
                };
                self.lookup.is_assignable(target_ty, &param)
            });
            if let Some((target, _)) = target {
                matches.push(ValidatorBinding::MethodPredicate {
                    callable: it.clone(),
                    target: *target,
                    raises,
                    message: message.clone(),
                });
            }
        }

        let found = candidates.iter().map(|it| it.to_string()).collect();
        if matches.len() > 1 {
            return ValidatorBinding::Invalid(BindError::Ambiguous { ty: ty.clone(), candidates: found });
        }
        matches.pop().unwrap_or_else(|| {
            ValidatorBinding::Invalid(BindError::ValidatorMismatch {
                reference: name.to_string(),
                ty: ty.clone(),
                found,
            })
        })
    }

    fn property_validator(
        &self,
        property: &str,
        expected: bool,
        message: Option<String>,
        ty: &Ty,
        repeatable: bool,
    ) -> ValidatorBinding {
        let value_ty = ty.nullable_inner().unwrap_or(ty);
        let targets = match (repeatable, ty.element()) {
            (true, Some(elem)) => vec![(ValidatorTarget::Whole, ty), (ValidatorTarget::Element, elem)],
            _ => vec![(ValidatorTarget::Value, value_ty)],
        };
        for (target, target_ty) in &targets {
            match self.lookup.member_ty(target_ty, property) {
                Some(Ty::Bool) => {
                    return ValidatorBinding::PropertyPredicate {
                        property: property.to_string(),
                        expected,
                        target: *target,
                        message,
                    }
                }
                Some(found) => {
                    return ValidatorBinding::Invalid(BindError::NotBoolProperty {
                        ty: (*target_ty).clone(),
                        property: property.to_string(),
                        found,
                    })
                }
                None => (),
            }
        }
        ValidatorBinding::Invalid(BindError::UnknownProperty {
            ty: value_ty.clone(),
            property: property.to_string(),
        })
    }
}

fn accepts_string(param: &Ty) -> bool {
    param.is_string_like()
}

fn single(ty: &Ty, mut matches: Vec<ParserBinding>) -> Option<ParserBinding> {
    match matches.len() {
        0 => None,
        1 => matches.pop(),
        _ => {
            let candidates = matches
                .iter()
                .filter_map(|it| it.callable())
                .map(|it| it.to_string())
                .collect();
            Some(ParserBinding::Invalid(BindError::Ambiguous { ty: ty.clone(), candidates }))
        }
    }
}

/// The built-in boolean parser.
pub(crate) fn as_bool() -> Callable {
    Callable::new(
        "as_bool",
        CallableKind::Function,
        vec![Param::In(Ty::String)],
        Returns::Ty(Ty::Bool),
        |args| {
            let text = args.first().and_then(Value::as_str).unwrap_or_default();
            parse_bool(text).map(|it| Ret::Value(Value::Bool(it)))
        },
    )
}

pub(crate) fn parse_bool(text: &str) -> Result<bool, String> {
    if text.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if text.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(format!("expected `true` or `false`, got `{text}`"))
    }
}

impl ParserBinding {
    pub fn is_invalid(&self) -> bool {
        matches!(self, ParserBinding::Invalid(_))
    }

    pub fn callable(&self) -> Option<&Callable> {
        match self {
            ParserBinding::DirectMethod(it)
            | ParserBinding::Constructor(it)
            | ParserBinding::BoolOutMethod(it) => Some(it),
            ParserBinding::Nullable(inner) => inner.callable(),
            ParserBinding::Identity | ParserBinding::Invalid(_) => None,
        }
    }

    /// Converts one token into a value of `ty` (the element type for
    /// element-wise bindings). `Err` carries the reason.
    pub fn parse(&self, raw: &str, ty: &Ty) -> Result<Value, String> {
        match self {
            ParserBinding::Identity => Ok(Value::str(raw)),
            ParserBinding::DirectMethod(it) | ParserBinding::Constructor(it) => {
                match it.call(&[Value::str(raw)])? {
                    Ret::Value(value) => Ok(value.coerce(ty)),
                    Ret::Unit | Ret::Out(..) => Err(format!("`{}` returned no value", it.name())),
                }
            }
            ParserBinding::BoolOutMethod(it) => match it.call(&[Value::str(raw), Value::Absent])? {
                Ret::Out(true, value) => Ok(value.coerce(ty)),
                Ret::Out(false, _) => Err(format!("`{}` rejected the input", it.name())),
                Ret::Value(_) | Ret::Unit => Err(format!("`{}` returned no value", it.name())),
            },
            ParserBinding::Nullable(inner) => {
                if raw.is_empty() {
                    return Ok(Value::Absent);
                }
                let inner_ty = ty.nullable_inner().unwrap_or(ty);
                Ok(inner.parse(raw, inner_ty).unwrap_or(Value::Absent))
            }
            ParserBinding::Invalid(err) => Err(err.to_string()),
        }
    }
}

impl ValidatorBinding {
    pub fn target(&self) -> Option<ValidatorTarget> {
        match self {
            ValidatorBinding::MethodPredicate { target, .. }
            | ValidatorBinding::PropertyPredicate { target, .. } => Some(*target),
            ValidatorBinding::Invalid(_) => None,
        }
    }

    pub fn description(&self) -> String {
        match self {
            ValidatorBinding::MethodPredicate { message: Some(it), .. }
            | ValidatorBinding::PropertyPredicate { message: Some(it), .. } => it.clone(),
            ValidatorBinding::MethodPredicate { callable, .. } => format!("rejected by `{}`", callable.name()),
            ValidatorBinding::PropertyPredicate { property, expected, .. } => {
                format!("`{property}` must be {expected}")
            }
            ValidatorBinding::Invalid(err) => err.to_string(),
        }
    }

    /// Checks one value. `Err` carries the description, or the message the
    /// validator raised when no description was declared.
    pub fn check(&self, value: &Value) -> Result<(), String> {
        if value.is_absent() {
            return Ok(());
        }
        let ok = match self {
            ValidatorBinding::MethodPredicate { callable, raises, message, .. } => {
                match callable.call(std::slice::from_ref(value)) {
                    Ok(Ret::Value(Value::Bool(it))) => it,
                    Ok(_) => *raises,
                    Err(raised) => return Err(message.clone().unwrap_or(raised)),
                }
            }
            ValidatorBinding::PropertyPredicate { property, expected, .. } => {
                value.property(property).and_then(|it| it.as_bool()) == Some(*expected)
            }
            ValidatorBinding::Invalid(_) => false,
        };
        if ok {
            Ok(())
        } else {
            Err(self.description())
        }
    }
}
