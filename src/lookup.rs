//! Candidate lookup: the symbol table the binding resolver queries.
//!
//! The resolver never calls into user code by itself; it asks a
//! [`CandidateLookup`] for callables with a given name and arity and then
//! decides which shape, if any, fits. [`Registry`] is the in-memory
//! implementation used by the front-ends and the tests.

use std::{collections::HashMap, fmt, sync::Arc};

use crate::{
    dispatch::Invocation,
    ty::{FloatTy, IntTy, Ty},
    value::Value,
};

pub type Thunk = Arc<dyn Fn(&[Value]) -> Result<Ret, String> + Send + Sync>;

pub type Handler = Arc<dyn Fn(&Invocation) -> anyhow::Result<()> + Send + Sync>;

/// What a callable produced. `Err(message)` from the thunk means it raised.
#[derive(Debug, Clone, PartialEq)]
pub enum Ret {
    Value(Value),
    Unit,
    /// Success flag plus the out-parameter of a try-parse function.
    Out(bool, Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallableKind {
    Function,
    Constructor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    In(Ty),
    Out(Ty),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Returns {
    Unit,
    Ty(Ty),
}

#[derive(Clone)]
pub struct Callable {
    name: String,
    kind: CallableKind,
    generics: u8,
    params: Vec<Param>,
    ret: Returns,
    thunk: Thunk,
}

impl Callable {
    pub fn new<F>(name: &str, kind: CallableKind, params: Vec<Param>, ret: Returns, f: F) -> Callable
    where
        F: Fn(&[Value]) -> Result<Ret, String> + Send + Sync + 'static,
    {
        Callable { name: name.to_string(), kind, generics: 0, params, ret, thunk: Arc::new(f) }
    }

    /// Declares how many type parameters (`Ty::Param(0..count)`) the
    /// signature uses.
    pub fn generic(mut self, count: u8) -> Callable {
        self.generics = count;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> CallableKind {
        self.kind
    }

    pub fn generics(&self) -> u8 {
        self.generics
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn ret(&self) -> &Returns {
        &self.ret
    }

    pub fn call(&self, args: &[Value]) -> Result<Ret, String> {
        (self.thunk)(args)
    }
}

impl fmt::Display for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if self.generics > 0 {
            let names = (0..self.generics).map(|i| Ty::Param(i).to_string()).collect::<Vec<_>>();
            write!(f, "<{}>", names.join(", "))?;
        }
        let params = self
            .params
            .iter()
            .map(|it| match it {
                Param::In(ty) => ty.to_string(),
                Param::Out(ty) => format!("out {ty}"),
            })
            .collect::<Vec<_>>();
        write!(f, "({})", params.join(", "))?;
        match &self.ret {
            Returns::Unit => Ok(()),
            Returns::Ty(ty) => write!(f, " -> {ty}"),
        }
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl PartialEq for Callable {
    fn eq(&self, other: &Callable) -> bool {
        self.name == other.name
            && self.kind == other.kind
            && self.generics == other.generics
            && self.params == other.params
            && self.ret == other.ret
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumCase {
    pub name: String,
    pub discriminant: i64,
}

/// A user type: its base (for property lookup and upcasts) and typed members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDecl {
    pub name: String,
    pub base: Option<String>,
    pub members: Vec<(String, Ty)>,
}

// Base chains longer than this are treated as cyclic.
const MAX_BASE_DEPTH: usize = 64;

pub trait CandidateLookup {
    fn lookup_callables(&self, name: &str, arity: usize) -> Vec<Callable>;

    fn enum_cases(&self, ty: &str) -> Option<&[EnumCase]>;

    fn type_decl(&self, ty: &str) -> Option<&TypeDecl>;

    fn handler(&self, name: &str) -> Option<Handler>;

    /// Type of `member` declared on `ty` or one of its bases.
    fn member_ty(&self, ty: &Ty, member: &str) -> Option<Ty> {
        match ty {
            Ty::String | Ty::Path | Ty::OsString | Ty::Seq(_) if member == "is_empty" => {
                Some(Ty::Bool)
            }
            Ty::Named(name) => {
                let mut decl = self.type_decl(name);
                for _ in 0..MAX_BASE_DEPTH {
                    let it = decl?;
                    if let Some((_, ty)) = it.members.iter().find(|(name, _)| name == member) {
                        return Some(ty.clone());
                    }
                    decl = it.base.as_deref().and_then(|base| self.type_decl(base));
                }
                None
            }
            _ => None,
        }
    }

    fn is_subtype(&self, from: &str, to: &str) -> bool {
        let mut cur = Some(from);
        for _ in 0..MAX_BASE_DEPTH {
            match cur {
                Some(name) if name == to => return true,
                Some(name) => cur = self.type_decl(name).and_then(|it| it.base.as_deref()),
                None => return false,
            }
        }
        false
    }

    /// Implicit conversion from a value of type `from` to `to`.
    fn is_assignable(&self, from: &Ty, to: &Ty) -> bool {
        if from == to {
            return true;
        }
        match (from, to) {
            (Ty::Nullable(a), Ty::Nullable(b)) => self.is_assignable(a, b),
            (_, Ty::Nullable(inner)) => self.is_assignable(from, inner),
            (Ty::Int(a), Ty::Int(b)) => a.widens_to(*b),
            (Ty::Int(_), Ty::Float(_)) => true,
            (Ty::Float(FloatTy::F32), Ty::Float(FloatTy::F64)) => true,
            (Ty::String, Ty::Path | Ty::OsString) => true,
            (Ty::Named(a), Ty::Named(b)) => self.is_subtype(a, b),
            _ => false,
        }
    }
}

#[derive(Clone, Default)]
pub struct Registry {
    callables: HashMap<String, Vec<Callable>>,
    enums: HashMap<String, Vec<EnumCase>>,
    types: HashMap<String, TypeDecl>,
    handlers: HashMap<String, Handler>,
    fallback: Option<Handler>,
}

impl Registry {
    pub fn new() -> Registry {
        Registry::default()
    }

    /// A registry that already knows how to parse the primitive numbers and
    /// `char`.
    pub fn with_prelude() -> Registry {
        let mut res = Registry::new();
        for ty in IntTy::ALL {
            res.parse_fn(&format!("{}::parse", ty.name()), Ty::Int(ty), move |s| parse_int(ty, s));
        }
        res.parse_fn("f32::parse", Ty::Float(FloatTy::F32), |s| {
            s.parse::<f32>().map(|it| Value::Float(f64::from(it))).map_err(|err| err.to_string())
        });
        res.parse_fn("f64::parse", Ty::Float(FloatTy::F64), |s| {
            s.parse::<f64>().map(Value::Float).map_err(|err| err.to_string())
        });
        res.parse_fn("char::parse", Ty::Char, |s| {
            s.parse::<char>().map(Value::Char).map_err(|err| err.to_string())
        });
        res
    }

    pub fn register(&mut self, callable: Callable) -> &mut Registry {
        self.callables.entry(callable.name.clone()).or_default().push(callable);
        self
    }

    /// `name(string) -> ret`
    pub fn parse_fn<F>(&mut self, name: &str, ret: Ty, f: F) -> &mut Registry
    where
        F: Fn(&str) -> Result<Value, String> + Send + Sync + 'static,
    {
        let params = vec![Param::In(Ty::String)];
        self.register(Callable::new(name, CallableKind::Function, params, Returns::Ty(ret), move |args| {
            f(text(args)).map(Ret::Value)
        }))
    }

    /// `ty::new(string)`
    pub fn constructor<F>(&mut self, ty: &str, f: F) -> &mut Registry
    where
        F: Fn(&str) -> Result<Value, String> + Send + Sync + 'static,
    {
        let name = format!("{ty}::new");
        let params = vec![Param::In(Ty::String)];
        let ret = Returns::Ty(Ty::named(ty));
        self.register(Callable::new(&name, CallableKind::Constructor, params, ret, move |args| {
            f(text(args)).map(Ret::Value)
        }))
    }

    /// `name(string, out ty) -> bool`
    pub fn try_parse_fn<F>(&mut self, name: &str, out: Ty, f: F) -> &mut Registry
    where
        F: Fn(&str) -> Option<Value> + Send + Sync + 'static,
    {
        let params = vec![Param::In(Ty::String), Param::Out(out)];
        let ret = Returns::Ty(Ty::Bool);
        self.register(Callable::new(name, CallableKind::Function, params, ret, move |args| {
            Ok(match f(text(args)) {
                Some(value) => Ret::Out(true, value),
                None => Ret::Out(false, Value::Absent),
            })
        }))
    }

    /// `name(param) -> bool`
    pub fn predicate<F>(&mut self, name: &str, param: Ty, f: F) -> &mut Registry
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        let params = vec![Param::In(param)];
        let ret = Returns::Ty(Ty::Bool);
        self.register(Callable::new(name, CallableKind::Function, params, ret, move |args| {
            Ok(Ret::Value(Value::Bool(f(args.first().unwrap_or(&Value::Absent)))))
        }))
    }

    /// `name(param)`, raising with a message instead of returning `false`.
    pub fn check<F>(&mut self, name: &str, param: Ty, f: F) -> &mut Registry
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        let params = vec![Param::In(param)];
        self.register(Callable::new(name, CallableKind::Function, params, Returns::Unit, move |args| {
            f(args.first().unwrap_or(&Value::Absent)).map(|()| Ret::Unit)
        }))
    }

    pub fn enumeration(&mut self, name: &str, cases: &[(&str, i64)]) -> &mut Registry {
        let cases = cases
            .iter()
            .map(|(name, discriminant)| EnumCase { name: name.to_string(), discriminant: *discriminant })
            .collect();
        self.enums.insert(name.to_string(), cases);
        self
    }

    pub fn record_type(&mut self, name: &str, base: Option<&str>, members: &[(&str, Ty)]) -> &mut Registry {
        let decl = TypeDecl {
            name: name.to_string(),
            base: base.map(str::to_string),
            members: members.iter().map(|(name, ty)| (name.to_string(), ty.clone())).collect(),
        };
        self.types.insert(name.to_string(), decl);
        self
    }

    pub fn handler<F>(&mut self, name: &str, f: F) -> &mut Registry
    where
        F: Fn(&Invocation) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.handlers.insert(name.to_string(), Arc::new(f));
        self
    }

    /// Answers every handler name that was not registered explicitly.
    pub fn fallback_handler<F>(&mut self, f: F) -> &mut Registry
    where
        F: Fn(&Invocation) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.fallback = Some(Arc::new(f));
        self
    }
}

impl CandidateLookup for Registry {
    fn lookup_callables(&self, name: &str, arity: usize) -> Vec<Callable> {
        let candidates = self.callables.get(name).map(Vec::as_slice).unwrap_or_default();
        candidates.iter().filter(|it| it.params.len() == arity).cloned().collect()
    }

    fn enum_cases(&self, ty: &str) -> Option<&[EnumCase]> {
        self.enums.get(ty).map(Vec::as_slice)
    }

    fn type_decl(&self, ty: &str) -> Option<&TypeDecl> {
        self.types.get(ty)
    }

    fn handler(&self, name: &str) -> Option<Handler> {
        self.handlers.get(name).or(self.fallback.as_ref()).cloned()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut callables = self.callables.keys().collect::<Vec<_>>();
        callables.sort();
        let mut handlers = self.handlers.keys().collect::<Vec<_>>();
        handlers.sort();
        f.debug_struct("Registry")
            .field("callables", &callables)
            .field("handlers", &handlers)
            .finish_non_exhaustive()
    }
}

fn text(args: &[Value]) -> &str {
    args.first().and_then(Value::as_str).unwrap_or_default()
}

fn parse_int(ty: IntTy, s: &str) -> Result<Value, String> {
    let res = match ty {
        IntTy::I8 => s.parse::<i8>().map(|it| Value::Int(it.into())),
        IntTy::I16 => s.parse::<i16>().map(|it| Value::Int(it.into())),
        IntTy::I32 => s.parse::<i32>().map(|it| Value::Int(it.into())),
        IntTy::I64 => s.parse::<i64>().map(Value::Int),
        IntTy::U8 => s.parse::<u8>().map(|it| Value::UInt(it.into())),
        IntTy::U16 => s.parse::<u16>().map(|it| Value::UInt(it.into())),
        IntTy::U32 => s.parse::<u32>().map(|it| Value::UInt(it.into())),
        IntTy::U64 => s.parse::<u64>().map(Value::UInt),
    };
    res.map_err(|err| err.to_string())
}
