// ABOUTME: Abstract syntax tree node definitions produced by the parser

use std::rc::Rc;

/// `step "name" with diagnosis LEVEL: block` — distinct from log's
/// debug/info/success/warning/error levels (§6.3's diagnosis-level set).
#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosisLevel {
    None,
    Minimal,
    Basic,
    Standard,
    Detailed,
    Full,
}

#[derive(Debug, Clone)]
pub struct Program {
    pub library: Option<String>,
    pub statements: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Let {
        name: String,
        value: Expr,
        line: u32,
    },
    Const {
        name: String,
        value: Expr,
        line: u32,
    },
    Assign {
        target: Expr,
        value: Expr,
        line: u32,
    },
    ExprStmt(Expr),
    If {
        branches: Vec<(Expr, Vec<Stmt>)>,
        else_branch: Option<Vec<Stmt>>,
        line: u32,
    },
    When {
        subject: Expr,
        arms: Vec<(Vec<Expr>, Vec<Stmt>)>,
        else_branch: Option<Vec<Stmt>>,
        line: u32,
    },
    While {
        condition: Expr,
        body: Vec<Stmt>,
        line: u32,
    },
    For {
        vars: Vec<String>,
        iterable: Expr,
        body: Vec<Stmt>,
        line: u32,
    },
    FunctionDef {
        name: String,
        params: Vec<String>,
        body: Rc<Vec<Stmt>>,
        line: u32,
    },
    Return {
        value: Option<Expr>,
        line: u32,
    },
    Break {
        line: u32,
    },
    Continue {
        line: u32,
    },
    Assert {
        condition: Expr,
        message: Option<Expr>,
        line: u32,
    },
    Exit {
        code: Option<Expr>,
        message: Option<Expr>,
        line: u32,
    },
    Log {
        level: String,
        message: Expr,
        line: u32,
    },
    Step {
        name: Option<String>,
        body: Vec<Stmt>,
        diagnosis: DiagnosisLevel,
        guard: Option<Expr>,
        line: u32,
    },
    Library {
        name: String,
        line: u32,
    },
    Export {
        target: Box<Stmt>,
        line: u32,
    },
    /// `import NAME from STRING` — `alias` is `NAME`, registered as a
    /// `SymbolKind::Module`; `names` is empty.
    /// `from STRING import NAME (, NAME)*` — `names` holds each imported
    /// name, registered as `SymbolKind::Imported`; `alias` is `None`.
    Import {
        path: String,
        alias: Option<String>,
        names: Vec<String>,
        line: u32,
    },
    /// A host-dispatched action statement (§6.3-6.4): `verb` is the opener
    /// keyword's lexeme, `args`/`kwargs` are its already-parsed operands.
    /// The core never interprets these; they are forwarded verbatim to
    /// `Host::perform_action`.
    Action {
        verb: String,
        args: Vec<Expr>,
        kwargs: Vec<(String, Expr)>,
        line: u32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    And,
    Or,
    Contains,
    Matches,
    Equals,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UnOp {
    Neg,
    Pos,
    Not,
}

#[derive(Debug, Clone)]
pub enum Expr {
    IntegerLit(i64),
    FloatLit(f64),
    StringLit(String),
    BoolLit(bool),
    NullLit,
    Identifier(String, u32),
    InterpolatedString(Vec<StringPart>, u32),
    ListLit(Vec<Expr>, u32),
    ObjectLit(Vec<(String, Expr)>, u32),
    Lambda {
        params: Vec<String>,
        body: Box<Expr>,
        line: u32,
    },
    BinaryOp {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
        line: u32,
    },
    UnaryOp {
        op: UnOp,
        operand: Box<Expr>,
        line: u32,
    },
    Member {
        object: Box<Expr>,
        name: String,
        line: u32,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
        line: u32,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        kwargs: Vec<(String, Expr)>,
        line: u32,
    },
    MethodCall {
        receiver: Box<Expr>,
        method: String,
        args: Vec<Expr>,
        kwargs: Vec<(String, Expr)>,
        line: u32,
    },
    Input {
        prompt: Option<Box<Expr>>,
        default: Option<Box<Expr>>,
        type_tag: Option<String>,
        line: u32,
    },
}

#[derive(Debug, Clone)]
pub enum StringPart {
    Literal(String),
    Expr(Expr),
}

impl Expr {
    pub fn line(&self) -> u32 {
        match self {
            Expr::IntegerLit(_) | Expr::FloatLit(_) | Expr::StringLit(_) | Expr::BoolLit(_) | Expr::NullLit => 0,
            Expr::Identifier(_, l) => *l,
            Expr::InterpolatedString(_, l) => *l,
            Expr::ListLit(_, l) => *l,
            Expr::ObjectLit(_, l) => *l,
            Expr::Lambda { line, .. } => *line,
            Expr::BinaryOp { line, .. } => *line,
            Expr::UnaryOp { line, .. } => *line,
            Expr::Member { line, .. } => *line,
            Expr::Index { line, .. } => *line,
            Expr::Call { line, .. } => *line,
            Expr::MethodCall { line, .. } => *line,
            Expr::Input { line, .. } => *line,
        }
    }
}
