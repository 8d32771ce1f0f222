use indexmap::{IndexMap, IndexSet};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

/// Identifier of a logic variable
pub type VarId = u64;

/// Functor of list cells (`[H | T]` is `'.'(H, T)`)
pub const CONS: &str = ".";
/// The empty list atom
pub const NIL: &str = "[]";

static NEXT_VAR: AtomicU64 = AtomicU64::new(0);

/// Reserves `count` consecutive variable ids that no other caller will receive
/// and returns the first one.
pub fn fresh_block(count: u64) -> VarId {
    NEXT_VAR.fetch_add(count.max(1), AtomicOrdering::Relaxed)
}

/// A logic variable. Equality and hashing only look at the id, the name is
/// kept for rendering.
#[derive(Debug, Clone, Eq)]
pub struct Var {
    /// Unique id (clause-local inside the store, global once renamed)
    pub id: VarId,
    /// Source name (e.g. `Obl`), if the variable came from text
    pub name: Option<Arc<str>>,
}

impl PartialEq for Var {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Hash for Var {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Numeric constant
#[derive(Debug, Clone, Copy)]
pub enum Number {
    /// 64-bit integer (e.g. `42`)
    Int(i64),
    /// Floating point (e.g. `0.5`)
    Float(f64),
}

impl Number {
    #[allow(clippy::cast_precision_loss)]
    fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    /// Numeric comparison across ints and floats (`1 =:= 1.0` holds).
    #[must_use]
    pub fn compare(self, other: Number) -> Ordering {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => a.cmp(&b),
            (a, b) => a.as_f64().total_cmp(&b.as_f64()),
        }
    }
}

// Structural identity: `1` and `1.0` are different terms.
impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => a == b,
            (Number::Float(a), Number::Float(b)) => a.to_bits() == b.to_bits(),
            _ => false,
        }
    }
}

impl Eq for Number {}

impl Hash for Number {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Number::Int(i) => {
                0u8.hash(state);
                i.hash(state);
            }
            Number::Float(f) => {
                1u8.hash(state);
                f.to_bits().hash(state);
            }
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(i) => write!(f, "{i}"),
            Number::Float(x) => {
                let text = x.to_string();
                if x.is_finite() && !text.contains('.') {
                    write!(f, "{text}.0")
                } else {
                    f.write_str(&text)
                }
            }
        }
    }
}

/// A first-order term. Terms are immutable; argument lists are shared
/// between copies.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
    /// A constant symbol (e.g. `log`, `'Hadoop Cluster'`, `[]`)
    Atom(Arc<str>),
    /// A numeric constant
    Number(Number),
    /// A logic variable
    Var(Var),
    /// A structure `functor(arg1, ..., argN)`, N >= 1
    Compound(Arc<str>, Arc<[Term]>),
}

impl Term {
    /// Builds an atom
    pub fn atom(name: impl Into<Arc<str>>) -> Self {
        Term::Atom(name.into())
    }

    /// Builds an integer
    #[must_use]
    pub fn int(value: i64) -> Self {
        Term::Number(Number::Int(value))
    }

    /// Builds an anonymous variable with the given id
    #[must_use]
    pub fn var(id: VarId) -> Self {
        Term::Var(Var { id, name: None })
    }

    /// Builds a named variable with the given id
    pub fn named_var(id: VarId, name: impl Into<Arc<str>>) -> Self {
        Term::Var(Var {
            id,
            name: Some(name.into()),
        })
    }

    /// Builds a compound term. A zero-argument compound collapses to an atom.
    pub fn compound(functor: impl Into<Arc<str>>, args: Vec<Term>) -> Self {
        if args.is_empty() {
            Term::Atom(functor.into())
        } else {
            Term::Compound(functor.into(), args.into())
        }
    }

    /// The empty list
    #[must_use]
    pub fn nil() -> Self {
        Term::atom(NIL)
    }

    /// A single list cell `[head | tail]`
    #[must_use]
    pub fn cons(head: Term, tail: Term) -> Self {
        Term::Compound(CONS.into(), vec![head, tail].into())
    }

    /// A list of `items` ending in `tail` (`[]` for a proper list)
    #[must_use]
    pub fn list(items: Vec<Term>, tail: Term) -> Self {
        items
            .into_iter()
            .rev()
            .fold(tail, |acc, item| Term::cons(item, acc))
    }

    /// Name and arity of a callable term
    #[must_use]
    pub fn functor(&self) -> Option<(&str, usize)> {
        match self {
            Term::Atom(name) => Some((name, 0)),
            Term::Compound(name, args) => Some((name, args.len())),
            Term::Number(_) | Term::Var(_) => None,
        }
    }

    /// Arguments of a compound (empty for anything else)
    #[must_use]
    pub fn args(&self) -> &[Term] {
        match self {
            Term::Compound(_, args) => args,
            _ => &[],
        }
    }

    /// Returns true for atoms and compounds
    #[must_use]
    pub fn is_callable(&self) -> bool {
        matches!(self, Term::Atom(_) | Term::Compound(..))
    }

    /// Renames every variable `id` to `base + id`. Used to give a stored
    /// clause fresh variables before each resolution step.
    #[must_use]
    pub fn offset_vars(&self, base: VarId) -> Term {
        match self {
            Term::Var(var) => Term::Var(Var {
                id: base + var.id,
                name: var.name.clone(),
            }),
            Term::Compound(functor, args) => Term::Compound(
                functor.clone(),
                args.iter().map(|arg| arg.offset_vars(base)).collect(),
            ),
            Term::Atom(_) | Term::Number(_) => self.clone(),
        }
    }

    /// Collects the variables of this term, in first-occurrence order
    pub fn collect_vars(&self, out: &mut IndexSet<Var>) {
        match self {
            Term::Var(var) => {
                out.insert(var.clone());
            }
            Term::Compound(_, args) => {
                for arg in args.iter() {
                    arg.collect_vars(out);
                }
            }
            Term::Atom(_) | Term::Number(_) => {}
        }
    }

    /// Structural equality up to a consistent, one-to-one renaming of
    /// variables.
    #[must_use]
    pub fn is_variant(&self, other: &Term) -> bool {
        let mut mapping = VariantMap::default();
        mapping.check(self, other)
    }

    /// Splits a list into its items and the remaining tail (`[]` for a
    /// proper list). Returns `None` when `self` is not a list cell or `[]`.
    #[must_use]
    pub fn as_list(&self) -> Option<(Vec<&Term>, &Term)> {
        let mut items = Vec::new();
        let mut cursor = self;
        loop {
            match cursor {
                Term::Compound(functor, args) if &**functor == CONS && args.len() == 2 => {
                    items.push(&args[0]);
                    cursor = &args[1];
                }
                Term::Atom(name) if &**name == NIL => return Some((items, cursor)),
                _ if items.is_empty() => return None,
                _ => return Some((items, cursor)),
            }
        }
    }
}

/// Bijection between the variables of two terms being compared as variants
#[derive(Debug, Default)]
pub(crate) struct VariantMap {
    left: IndexMap<VarId, VarId>,
    right: IndexMap<VarId, VarId>,
}

impl VariantMap {
    pub(crate) fn check(&mut self, a: &Term, b: &Term) -> bool {
        match (a, b) {
            (Term::Var(x), Term::Var(y)) => {
                let forward = *self.left.entry(x.id).or_insert(y.id);
                let backward = *self.right.entry(y.id).or_insert(x.id);
                forward == y.id && backward == x.id
            }
            (Term::Compound(f, xs), Term::Compound(g, ys)) => {
                f == g && xs.len() == ys.len() && xs.iter().zip(ys.iter()).all(|(x, y)| self.check(x, y))
            }
            (Term::Atom(x), Term::Atom(y)) => x == y,
            (Term::Number(x), Term::Number(y)) => x == y,
            _ => false,
        }
    }
}

/// Infix operators the reader understands, rendered back in infix form
pub(crate) const COMPARISON_OPS: [&str; 10] =
    ["=", "\\=", "==", "\\==", "<", ">", "=<", ">=", "=:=", "=\\="];

pub(crate) fn is_comparison_op(name: &str) -> bool {
    COMPARISON_OPS.contains(&name)
}

fn is_operator_term(term: &Term) -> bool {
    match term {
        Term::Compound(functor, args) => match args.len() {
            1 => &**functor == "\\+",
            2 => is_comparison_op(functor),
            _ => false,
        },
        _ => false,
    }
}

/// Lowercase identifier, usable as a bare atom or functor
fn is_plain_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_lowercase() => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Whether an atom can be written without quotes
fn is_plain_atom(name: &str) -> bool {
    name == NIL || name == "!" || is_plain_name(name)
}

fn write_quoted(f: &mut fmt::Formatter<'_>, name: &str) -> fmt::Result {
    f.write_str("'")?;
    for c in name.chars() {
        match c {
            '\'' => f.write_str("\\'")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            _ => write!(f, "{c}")?,
        }
    }
    f.write_str("'")
}

fn write_atom(f: &mut fmt::Formatter<'_>, name: &str) -> fmt::Result {
    if is_plain_atom(name) {
        f.write_str(name)
    } else {
        write_quoted(f, name)
    }
}

fn write_operand(f: &mut fmt::Formatter<'_>, term: &Term) -> fmt::Result {
    if is_operator_term(term) {
        write!(f, "({term})")
    } else {
        write!(f, "{term}")
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => f.write_str(name),
            None => write!(f, "_G{}", self.id),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Atom(name) => write_atom(f, name),
            Term::Number(n) => write!(f, "{n}"),
            Term::Var(var) => write!(f, "{var}"),
            Term::Compound(functor, args) => {
                if let Some((items, tail)) = self.as_list() {
                    f.write_str("[")?;
                    for (i, item) in items.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{item}")?;
                    }
                    if !matches!(tail, Term::Atom(name) if &**name == NIL) {
                        write!(f, " | {tail}")?;
                    }
                    return f.write_str("]");
                }
                match (&**functor, args.len()) {
                    ("," | ";", 2) => {
                        write!(f, "({}", args[0])?;
                        if &**functor == "," {
                            f.write_str(", ")?;
                        } else {
                            f.write_str(" ; ")?;
                        }
                        write!(f, "{})", args[1])
                    }
                    ("\\+", 1) => {
                        f.write_str("\\+ ")?;
                        write_operand(f, &args[0])
                    }
                    (op, 2) if is_comparison_op(op) => {
                        write_operand(f, &args[0])?;
                        write!(f, " {op} ")?;
                        write_operand(f, &args[1])
                    }
                    _ => {
                        if is_plain_name(functor) {
                            f.write_str(functor)?;
                        } else {
                            write_quoted(f, functor)?;
                        }
                        f.write_str("(")?;
                        for (i, arg) in args.iter().enumerate() {
                            if i > 0 {
                                f.write_str(", ")?;
                            }
                            write_operand(f, arg)?;
                        }
                        f.write_str(")")
                    }
                }
            }
        }
    }
}
