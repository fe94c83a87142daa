//! Constructor arguments and their canonical, hashable form.
//!
//! A check describes the values it was constructed with as an [`Args`] tree.
//! [`canonicalize`] flattens that tree into a tree definition (the shape) and an
//! ordered list of hashable leaves, the same decomposition a pytree flatten
//! performs. Mappings are ordered by key so that two constructions that differ
//! only in keyword order produce the same key.

use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

/// A single constructor value as supplied by a check.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    None,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    Seq(Vec<ArgValue>),
    Map(Vec<(String, ArgValue)>),
    /// A shared handle hashed by address. The check must own the handle so the
    /// interned node keeps it alive and the address is never reused.
    Identity { type_name: &'static str, addr: usize },
    /// A value with no structural identity. Always rejected by [`canonicalize`].
    Opaque { type_name: &'static str },
}

impl ArgValue {
    pub fn identity<T: ?Sized>(handle: &Arc<T>) -> Self {
        Self::Identity {
            type_name: std::any::type_name::<T>(),
            addr: Arc::as_ptr(handle) as *const () as usize,
        }
    }

    pub fn opaque<T: ?Sized>() -> Self {
        Self::Opaque { type_name: std::any::type_name::<T>() }
    }

    pub fn map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<ArgValue>,
    {
        Self::Map(entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

macro_rules! arg_from {
    ($($ty:ty => $variant:ident as $cast:ty),* $(,)?) => {
        $(impl From<$ty> for ArgValue {
            fn from(v: $ty) -> Self { ArgValue::$variant(v as $cast) }
        })*
    };
}

arg_from! {
    i32 => Int as i64,
    i64 => Int as i64,
    u32 => UInt as u64,
    u64 => UInt as u64,
    usize => UInt as u64,
    f32 => Float as f64,
    f64 => Float as f64,
}

impl From<bool> for ArgValue {
    fn from(v: bool) -> Self { ArgValue::Bool(v) }
}

impl From<&str> for ArgValue {
    fn from(v: &str) -> Self { ArgValue::Str(v.to_string()) }
}

impl From<String> for ArgValue {
    fn from(v: String) -> Self { ArgValue::Str(v) }
}

impl<T: Into<ArgValue>> From<Vec<T>> for ArgValue {
    fn from(v: Vec<T>) -> Self { ArgValue::Seq(v.into_iter().map(Into::into).collect()) }
}

impl<T: Into<ArgValue>> From<Option<T>> for ArgValue {
    fn from(v: Option<T>) -> Self { v.map_or(ArgValue::None, Into::into) }
}

/// The positional and named constructor values of a check.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    positional: Vec<ArgValue>,
    named: Vec<(String, ArgValue)>,
}

impl Args {
    pub fn new() -> Self { Self::default() }

    pub fn with(mut self, value: impl Into<ArgValue>) -> Self {
        self.positional.push(value.into());
        self
    }

    pub fn named(mut self, key: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.named.push((key.into(), value.into()));
        self
    }

    pub fn positional(&self) -> &[ArgValue] { &self.positional }
    pub fn named_values(&self) -> &[(String, ArgValue)] { &self.named }
    pub fn is_empty(&self) -> bool { self.positional.is_empty() && self.named.is_empty() }
}

/// Pre-order shape of the flattened argument tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Shape {
    Leaf,
    Seq(usize),
    Map(Vec<Arc<str>>),
}

/// A hashable leaf. Floats are stored by bit pattern with `-0.0` folded into `0.0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Leaf {
    None,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(u64),
    Str(Arc<str>),
    Identity { type_name: &'static str, addr: usize },
}

impl Leaf {
    fn to_value(&self) -> ArgValue {
        match self {
            Leaf::None => ArgValue::None,
            Leaf::Bool(b) => ArgValue::Bool(*b),
            Leaf::Int(i) => ArgValue::Int(*i),
            Leaf::UInt(u) => ArgValue::UInt(*u),
            Leaf::Float(bits) => ArgValue::Float(f64::from_bits(*bits)),
            Leaf::Str(s) => ArgValue::Str(s.to_string()),
            Leaf::Identity { type_name, addr } => ArgValue::Identity { type_name: *type_name, addr: *addr },
        }
    }
}

/// The canonical form of a check's [`Args`]: a tree definition plus leaves.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalArgs {
    treedef: Vec<Shape>,
    leaves: SmallVec<[Leaf; 4]>,
}

impl CanonicalArgs {
    pub fn leaves(&self) -> &[Leaf] { &self.leaves }

    pub fn is_empty(&self) -> bool {
        matches!(self.treedef.as_slice(), [Shape::Seq(0), Shape::Map(keys)] if keys.is_empty())
    }

    /// Rebuilds the argument tree. Named values come back in key order.
    pub fn to_args(&self) -> Args {
        let mut shapes = self.treedef.iter();
        let mut leaves = self.leaves.iter();

        let positional = match shapes.next() {
            Some(Shape::Seq(n)) => (0..*n).map(|_| rebuild(&mut shapes, &mut leaves)).collect(),
            _ => Vec::new(),
        };
        let named = match shapes.next() {
            Some(Shape::Map(keys)) => keys
                .iter()
                .map(|k| (k.to_string(), rebuild(&mut shapes, &mut leaves)))
                .collect(),
            _ => Vec::new(),
        };
        Args { positional, named }
    }
}

fn rebuild(shapes: &mut std::slice::Iter<'_, Shape>, leaves: &mut std::slice::Iter<'_, Leaf>) -> ArgValue {
    match shapes.next() {
        Some(Shape::Seq(n)) => ArgValue::Seq((0..*n).map(|_| rebuild(shapes, leaves)).collect()),
        Some(Shape::Map(keys)) => {
            ArgValue::Map(keys.iter().map(|k| (k.to_string(), rebuild(shapes, leaves))).collect())
        }
        Some(Shape::Leaf) => leaves.next().map_or(ArgValue::None, Leaf::to_value),
        None => ArgValue::None,
    }
}

/// Why a leaf could not be hashed, and where it sits in the argument tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unhashable {
    pub path: String,
    pub reason: String,
}

enum Segment<'a> {
    Index(usize),
    Key(&'a str),
}

fn render(path: &[Segment<'_>]) -> String {
    let mut out = String::from("args");
    for seg in path {
        match seg {
            Segment::Index(i) => out.push_str(&format!("[{}]", i)),
            Segment::Key(k) => {
                out.push('.');
                out.push_str(k);
            }
        }
    }
    out
}

fn unhashable(path: &[Segment<'_>], reason: impl Into<String>) -> Unhashable {
    Unhashable { path: render(path), reason: reason.into() }
}

/// Flattens `args` into its canonical form.
///
/// Fails when a leaf has no stable identity: NaN floats, [`ArgValue::Opaque`]
/// values, and mappings that repeat a key.
pub fn canonicalize(args: &Args) -> Result<CanonicalArgs, Unhashable> {
    let mut out = CanonicalArgs { treedef: Vec::new(), leaves: SmallVec::new() };
    let mut path = Vec::new();

    out.treedef.push(Shape::Seq(args.positional.len()));
    for (i, value) in args.positional.iter().enumerate() {
        path.push(Segment::Index(i));
        flatten(value, &mut path, &mut out)?;
        path.pop();
    }

    let named = sorted_entries(&args.named, &path)?;
    out.treedef.push(Shape::Map(named.iter().map(|(k, _)| Arc::from(*k)).collect()));
    for (key, value) in named {
        path.push(Segment::Key(key));
        flatten(value, &mut path, &mut out)?;
        path.pop();
    }

    Ok(out)
}

fn sorted_entries<'a>(
    entries: &'a [(String, ArgValue)],
    path: &[Segment<'_>],
) -> Result<Vec<(&'a str, &'a ArgValue)>, Unhashable> {
    let mut sorted: Vec<(&str, &ArgValue)> = entries.iter().map(|(k, v)| (k.as_str(), v)).collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    if let Some(pair) = sorted.windows(2).find(|w| w[0].0 == w[1].0) {
        return Err(unhashable(path, format!("duplicate key '{}'", pair[0].0)));
    }
    Ok(sorted)
}

fn flatten<'a>(
    value: &'a ArgValue,
    path: &mut Vec<Segment<'a>>,
    out: &mut CanonicalArgs,
) -> Result<(), Unhashable> {
    let leaf = match value {
        ArgValue::Seq(items) => {
            out.treedef.push(Shape::Seq(items.len()));
            for (i, item) in items.iter().enumerate() {
                path.push(Segment::Index(i));
                flatten(item, path, out)?;
                path.pop();
            }
            return Ok(());
        }
        ArgValue::Map(entries) => {
            let sorted = sorted_entries(entries, path)?;
            out.treedef.push(Shape::Map(sorted.iter().map(|(k, _)| Arc::from(*k)).collect()));
            for (key, item) in sorted {
                path.push(Segment::Key(key));
                flatten(item, path, out)?;
                path.pop();
            }
            return Ok(());
        }
        ArgValue::None => Leaf::None,
        ArgValue::Bool(b) => Leaf::Bool(*b),
        ArgValue::Int(i) => Leaf::Int(*i),
        ArgValue::UInt(u) => Leaf::UInt(*u),
        ArgValue::Float(f) if f.is_nan() => {
            return Err(unhashable(path, "NaN is not equal to itself"));
        }
        ArgValue::Float(f) => Leaf::Float(if *f == 0.0 { 0.0f64.to_bits() } else { f.to_bits() }),
        ArgValue::Str(s) => Leaf::Str(Arc::from(s.as_str())),
        ArgValue::Identity { type_name, addr } => Leaf::Identity { type_name: *type_name, addr: *addr },
        ArgValue::Opaque { type_name } => {
            return Err(unhashable(path, format!("values of type `{}` have no structural identity", type_name)));
        }
    };
    out.treedef.push(Shape::Leaf);
    out.leaves.push(leaf);
    Ok(())
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::None => f.write_str("None"),
            ArgValue::Bool(b) => write!(f, "{}", b),
            ArgValue::Int(i) => write!(f, "{}", i),
            ArgValue::UInt(u) => write!(f, "{}", u),
            ArgValue::Float(x) => write!(f, "{:?}", x),
            ArgValue::Str(s) => write!(f, "{:?}", s),
            ArgValue::Seq(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            ArgValue::Map(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                f.write_str("}")
            }
            ArgValue::Identity { type_name, addr } => write!(f, "<{}@{:#x}>", type_name, addr),
            ArgValue::Opaque { type_name } => write!(f, "<opaque {}>", type_name),
        }
    }
}

impl fmt::Display for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for value in &self.positional {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            write!(f, "{}", value)?;
        }
        for (key, value) in &self.named {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            write!(f, "{}={}", key, value)?;
        }
        Ok(())
    }
}

impl fmt::Display for CanonicalArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_args())
    }
}
