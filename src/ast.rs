use std::rc::Rc;

/// Literal values as they appear in source, before they become runtime
/// values.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Plus,
    Minus,
    Star,
    Slash,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    EqualEqual,
    BangEqual,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Plus => "+",
            BinaryOp::Minus => "-",
            BinaryOp::Star => "*",
            BinaryOp::Slash => "/",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::EqualEqual => "==",
            BinaryOp::BangEqual => "!=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }
}

/// The closed AST node set. Built once by the parser, immutable afterwards;
/// function bodies are shared subtrees re-evaluated on every call, which is
/// why they sit behind an `Rc`.
#[derive(Debug, Clone)]
pub enum Node {
    Literal(Literal),
    /// `name` or `$name`; the flag marks an explicit global reference.
    Variable {
        name: String,
        global: bool,
    },
    Binary {
        left: Box<Node>,
        right: Box<Node>,
        op: BinaryOp,
    },
    /// `!expr`
    Not(Box<Node>),
    /// unary `-expr`
    Negate(Box<Node>),
    /// `new expr`, the structural deep copy
    Copy(Box<Node>),
    /// `value.name` and `value->name`
    TableGet {
        value: Box<Node>,
        name: String,
    },
    /// `value[key]`
    TableGetExpr {
        value: Box<Node>,
        key: Box<Node>,
    },
    /// `target.name = value`
    TableSet {
        target: Box<Node>,
        name: String,
        value: Box<Node>,
    },
    /// `target[key] = value`
    TableSetExpr {
        target: Box<Node>,
        key: Box<Node>,
        value: Box<Node>,
    },
    /// `{ key: value, ... }`, keys and values arbitrary expressions
    TableLiteral(Vec<(Node, Node)>),
    /// `[ expr, ... ]`
    ArrayLiteral(Vec<Node>),
    /// A plain statement list. Pushes no frame of its own.
    Block(Vec<Node>),
    /// Catches the return signal. The whole program (`top_level`, no frame of
    /// its own) and `pass` bodies (frame-pushing) are these.
    FuncContainer {
        body: Box<Node>,
        top_level: bool,
    },
    /// A bare `{ ... }` statement: pushes a frame, lets returns pass through.
    ScopeContainer(Box<Node>),
    /// `func name(params) { body }` in statement position
    FuncDef {
        name: String,
        params: Vec<String>,
        body: Rc<Node>,
    },
    /// `func(params) { body }` in expression position
    FuncLiteral {
        params: Vec<String>,
        body: Rc<Node>,
    },
    Call {
        callee: Box<Node>,
        args: Vec<Node>,
    },
    Return(Option<Box<Node>>),
    Assign {
        name: String,
        global: bool,
        value: Box<Node>,
    },
    /// `++x`, `x++`, `--x`, `x--`; local frame only.
    IncDec {
        name: String,
        dec: bool,
        prefix: bool,
    },
    /// `global name;`
    GlobalDecl(String),
    If {
        cond: Box<Node>,
        body: Box<Node>,
    },
    While {
        cond: Box<Node>,
        body: Box<Node>,
    },
    /// `for (name, start, end)`: consecutive numbers, no per-iteration frame.
    For {
        var: String,
        start: Box<Node>,
        end: Box<Node>,
        body: Box<Node>,
    },
    /// `foreach (name: arrayExpr)`
    Foreach {
        var: String,
        array: Box<Node>,
        body: Box<Node>,
    },
    /// `pass name { body };`
    Pass {
        name: String,
        body: Box<Node>,
    },
}
