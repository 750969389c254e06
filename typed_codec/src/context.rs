//! Parse/build context and the expressions evaluated against it.

use std::fmt;
use std::ops;
use std::sync::Arc;

use crate::value::{Container, Value};
use crate::{Error, Result};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinOp {
    fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
        }
    }
}

/// An integer expression over already parsed (or bound) fields.
#[derive(Clone, PartialEq)]
pub enum Expr {
    Lit(i128),
    /// A field of the struct currently being processed.
    This(String),
    /// A field of the enclosing struct.
    Parent(String),
    Binary(BinOp, Box<Expr>, Box<Expr>),
}

/// Reference to a sibling field, e.g. `this("width") * this("height")`.
pub fn this(name: impl Into<String>) -> Expr {
    Expr::This(name.into())
}

pub fn parent(name: impl Into<String>) -> Expr {
    Expr::Parent(name.into())
}

fn lookup_int(frame: Option<&Container>, prefix: &str, name: &str) -> Result<i128> {
    let value = frame
        .and_then(|c| c.get(name))
        .ok_or_else(|| Error::Expression(format!("{}.{} is not available", prefix, name)))?;
    value
        .as_int()
        .ok_or_else(|| Error::Expression(format!("{}.{} is not an integer: {:?}", prefix, name, value)))
}

impl Expr {
    pub fn eval(&self, ctx: &Context) -> Result<i128> {
        match self {
            Expr::Lit(v) => Ok(*v),
            Expr::This(name) => lookup_int(ctx.this(), "this", name),
            Expr::Parent(name) => lookup_int(ctx.parent(), "parent", name),
            Expr::Binary(op, lhs, rhs) => {
                let (l, r) = (lhs.eval(ctx)?, rhs.eval(ctx)?);
                let out = match op {
                    BinOp::Add => l.checked_add(r),
                    BinOp::Sub => l.checked_sub(r),
                    BinOp::Mul => l.checked_mul(r),
                    BinOp::Div => l.checked_div(r),
                };
                out.ok_or_else(|| Error::Expression(format!("{} overflows or divides by zero", self)))
            }
        }
    }

    /// Evaluates to a length or count.
    pub fn eval_len(&self, ctx: &Context) -> Result<usize> {
        let v = self.eval(ctx)?;
        usize::try_from(v).map_err(|_| Error::Expression(format!("{} = {} is not a valid length", self, v)))
    }

    pub fn is_context_dependent(&self) -> bool {
        match self {
            Expr::Lit(_) => false,
            Expr::This(_) | Expr::Parent(_) => true,
            Expr::Binary(_, lhs, rhs) => lhs.is_context_dependent() || rhs.is_context_dependent(),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Lit(v) => write!(f, "{}", v),
            Expr::This(name) => write!(f, "this.{}", name),
            Expr::Parent(name) => write!(f, "parent.{}", name),
            Expr::Binary(op, lhs, rhs) => write!(f, "({} {} {})", lhs, op.symbol(), rhs),
        }
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

macro_rules! expr_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Expr {
                fn from(v: $ty) -> Self {
                    Expr::Lit(v as i128)
                }
            }
        )*
    };
}
expr_from_int!(u8, u16, u32, u64, usize, i8, i16, i32, i64, i128);

macro_rules! expr_binop {
    ($trait:ident, $method:ident, $op:ident) => {
        impl<R: Into<Expr>> ops::$trait<R> for Expr {
            type Output = Expr;

            fn $method(self, rhs: R) -> Expr {
                Expr::Binary(BinOp::$op, Box::new(self), Box::new(rhs.into()))
            }
        }
    };
}
expr_binop!(Add, add, Add);
expr_binop!(Sub, sub, Sub);
expr_binop!(Mul, mul, Mul);
expr_binop!(Div, div, Div);

pub type ContextFn = Arc<dyn Fn(&Context) -> Result<Value> + Send + Sync>;

/// A value that is either known up front or computed from the context.
#[derive(Clone)]
pub enum ContextValue {
    Value(Value),
    Expr(Expr),
    Func(ContextFn),
}

impl ContextValue {
    pub fn func<F>(f: F) -> Self
    where
        F: Fn(&Context) -> Result<Value> + Send + Sync + 'static,
    {
        ContextValue::Func(Arc::new(f))
    }

    pub fn is_context_dependent(&self) -> bool {
        match self {
            ContextValue::Value(_) => false,
            ContextValue::Expr(e) => e.is_context_dependent(),
            ContextValue::Func(_) => true,
        }
    }

    pub fn resolve(&self, ctx: &Context) -> Result<Value> {
        match self {
            ContextValue::Value(v) => Ok(v.clone()),
            ContextValue::Expr(e) => Ok(Value::Int(e.eval(ctx)?)),
            ContextValue::Func(f) => f(ctx),
        }
    }
}

impl fmt::Debug for ContextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextValue::Value(v) => write!(f, "{:?}", v),
            ContextValue::Expr(e) => write!(f, "{}", e),
            ContextValue::Func(_) => write!(f, "<function>"),
        }
    }
}

impl From<Value> for ContextValue {
    fn from(v: Value) -> Self {
        ContextValue::Value(v)
    }
}

impl From<Expr> for ContextValue {
    fn from(e: Expr) -> Self {
        ContextValue::Expr(e)
    }
}

/// State threaded through every parse, build and sizeof call: one frame of
/// already processed fields per nested struct, plus the path used in error
/// messages.
#[derive(Debug, Clone, Default)]
pub struct Context {
    frames: Vec<Container>,
    path: Vec<String>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    fn rooted(root: &str) -> Self {
        Context {
            frames: vec![],
            path: vec![root.to_string()],
        }
    }

    pub fn parsing() -> Self {
        Self::rooted("(parsing)")
    }

    pub fn building() -> Self {
        Self::rooted("(building)")
    }

    pub fn sizing() -> Self {
        Self::rooted("(sizeof)")
    }

    /// A sizing context whose current frame already holds `bound`.
    pub fn sizing_with(bound: Container) -> Self {
        let mut ctx = Self::sizing();
        ctx.push_frame(bound);
        ctx
    }

    pub fn push_frame(&mut self, frame: Container) {
        self.frames.push(frame);
    }

    pub fn pop_frame(&mut self) -> Container {
        self.frames.pop().unwrap_or_default()
    }

    pub fn this(&self) -> Option<&Container> {
        self.frames.last()
    }

    pub fn parent(&self) -> Option<&Container> {
        self.frames.len().checked_sub(2).and_then(|i| self.frames.get(i))
    }

    /// Records `value` under `name` in the current frame.
    pub fn insert(&mut self, name: &str, value: Value) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name, value);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.this().and_then(|c| c.get(name))
    }

    pub fn get_int(&self, name: &str) -> Result<i128> {
        lookup_int(self.this(), "this", name)
    }

    pub fn enter(&mut self, name: &str) {
        self.path.push(name.to_string());
    }

    pub fn leave(&mut self) {
        self.path.pop();
    }

    pub fn path(&self) -> String {
        self.path.join(" -> ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container;

    #[test]
    fn test_expr_eval() {
        let mut ctx = Context::parsing();
        ctx.push_frame(container! { "width" => 2u8, "height" => 3u8 });
        let e = this("width") * this("height") + 1;
        assert!(e.is_context_dependent());
        assert_eq!(e.eval(&ctx), Ok(7));
        assert_eq!(e.to_string(), "((this.width * this.height) + 1)");
        assert!(!Expr::from(4u8).is_context_dependent());
    }

    #[test]
    fn test_expr_missing_field() {
        let ctx = Context::sizing();
        assert!(matches!(this("width").eval(&ctx), Err(Error::Expression(_))));
    }

    #[test]
    fn test_parent_frame() {
        let mut ctx = Context::parsing();
        ctx.push_frame(container! { "count" => 4u8 });
        ctx.push_frame(Container::new());
        assert_eq!(parent("count").eval(&ctx), Ok(4));
        ctx.enter("items");
        assert_eq!(ctx.path(), "(parsing) -> items");
    }
}
