//! Statement AST.
//!
//! Every node that a rewrite may need to touch carries a [`Span`] pointing back
//! into the original SQL text. Spans are byte offsets, start inclusive and stop
//! exclusive, so `&sql[span.start..span.stop]` is always the node's source text.

/// Byte range of a node inside the original SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Span {
    pub start: usize,
    pub stop: usize,
}

impl Span {
    pub fn new(start: usize, stop: usize) -> Self {
        Self { start, stop }
    }

    /// Zero-width span used for insertion points.
    pub fn point(offset: usize) -> Self {
        Self {
            start: offset,
            stop: offset,
        }
    }

    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            stop: self.stop.max(other.stop),
        }
    }

    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.stop <= self.stop
    }

    pub fn len(&self) -> usize {
        self.stop.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Source text covered by this span, empty when out of bounds.
    pub fn text<'a>(&self, sql: &'a str) -> &'a str {
        sql.get(self.start..self.stop).unwrap_or("")
    }
}

/// Quoting used for an identifier in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QuoteCharacter {
    #[default]
    None,
    Backtick,
    DoubleQuote,
}

impl QuoteCharacter {
    pub fn from_char(ch: char) -> Self {
        match ch {
            '`' => QuoteCharacter::Backtick,
            '"' => QuoteCharacter::DoubleQuote,
            _ => QuoteCharacter::None,
        }
    }

    /// Wrap a name with the same quotes the original identifier used.
    pub fn wrap(&self, value: &str) -> String {
        match self {
            QuoteCharacter::None => value.to_string(),
            QuoteCharacter::Backtick => format!("`{}`", value),
            QuoteCharacter::DoubleQuote => format!("\"{}\"", value),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    pub value: String,
    pub quote: QuoteCharacter,
    pub span: Span,
}

impl Identifier {
    pub fn eq_ignore_case(&self, other: &str) -> bool {
        self.value.eq_ignore_ascii_case(other)
    }
}

/// A table reference such as `db.t_order AS o`.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSegment {
    pub owner: Option<Identifier>,
    pub name: Identifier,
    pub alias: Option<Identifier>,
    pub span: Span,
}

impl TableSegment {
    /// Name used to qualify columns of this table: the alias if any, else the table name.
    pub fn reference_name(&self) -> &str {
        self.alias
            .as_ref()
            .map(|a| a.value.as_str())
            .unwrap_or(self.name.value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(SelectStatement),
    Insert(InsertStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
    CreateTable(CreateTableStatement),
    DropTable(DropTableStatement),
    TruncateTable(TruncateTableStatement),
    CreateIndex(CreateIndexStatement),
    DropIndex(DropIndexStatement),
    Transaction(TransactionStatement),
    Set(SetStatement),
    Show(ShowStatement),
    Use(UseStatement),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    pub distinct: bool,
    pub projections: Projections,
    pub from: Vec<TableSegment>,
    pub joins: Vec<JoinClause>,
    pub where_clause: Option<Expr>,
    pub group_by: Vec<OrderByItem>,
    pub having: Option<Expr>,
    pub order_by: Vec<OrderByItem>,
    pub limit: Option<LimitClause>,
    pub span: Span,
}

impl SelectStatement {
    /// All table references of this query level, FROM list first then joins.
    pub fn tables(&self) -> impl Iterator<Item = &TableSegment> {
        self.from.iter().chain(self.joins.iter().map(|j| &j.table))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Projections {
    pub items: Vec<Projection>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    Star {
        owner: Option<Identifier>,
        span: Span,
    },
    Column {
        column: ColumnRef,
        alias: Option<Identifier>,
        span: Span,
    },
    Aggregation {
        function: AggregationType,
        distinct: bool,
        /// `None` for `COUNT(*)`.
        argument: Option<Box<Expr>>,
        alias: Option<Identifier>,
        span: Span,
    },
    Expression {
        expr: Expr,
        alias: Option<Identifier>,
        span: Span,
    },
}

impl Projection {
    pub fn span(&self) -> Span {
        match self {
            Projection::Star { span, .. }
            | Projection::Column { span, .. }
            | Projection::Aggregation { span, .. }
            | Projection::Expression { span, .. } => *span,
        }
    }

    pub fn alias(&self) -> Option<&Identifier> {
        match self {
            Projection::Star { .. } => None,
            Projection::Column { alias, .. }
            | Projection::Aggregation { alias, .. }
            | Projection::Expression { alias, .. } => alias.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregationType {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregationType {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "COUNT" => Some(AggregationType::Count),
            "SUM" => Some(AggregationType::Sum),
            "AVG" => Some(AggregationType::Avg),
            "MIN" => Some(AggregationType::Min),
            "MAX" => Some(AggregationType::Max),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationType::Count => "COUNT",
            AggregationType::Sum => "SUM",
            AggregationType::Avg => "AVG",
            AggregationType::Min => "MIN",
            AggregationType::Max => "MAX",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRef {
    pub owner: Option<Identifier>,
    pub name: Identifier,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Cross,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    pub join_type: JoinType,
    pub table: TableSegment,
    pub on_condition: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByItem {
    pub expr: Expr,
    pub descending: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LimitClause {
    pub offset: Option<LimitValue>,
    pub row_count: Option<LimitValue>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitValueKind {
    Literal(i64),
    Parameter(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitValue {
    pub kind: LimitValueKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub table: TableSegment,
    pub columns: Vec<Identifier>,
    pub values: Vec<ValuesRow>,
    pub on_duplicate_key_update: Vec<Assignment>,
    pub span: Span,
}

/// One parenthesised row of a VALUES clause, span includes the parentheses.
#[derive(Debug, Clone, PartialEq)]
pub struct ValuesRow {
    pub exprs: Vec<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub column: ColumnRef,
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    pub table: TableSegment,
    pub assignments: Vec<Assignment>,
    pub where_clause: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStatement {
    pub table: TableSegment,
    pub where_clause: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateTableStatement {
    pub table: TableSegment,
    pub if_not_exists: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropTableStatement {
    pub tables: Vec<TableSegment>,
    pub if_exists: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TruncateTableStatement {
    pub table: TableSegment,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateIndexStatement {
    pub index: Identifier,
    pub table: TableSegment,
    pub unique: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropIndexStatement {
    pub index: Identifier,
    pub table: Option<TableSegment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatement {
    Begin,
    Commit,
    Rollback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetStatement {
    pub variable: String,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ShowStatement {
    Databases,
    Tables,
    CreateTable(TableSegment),
    Columns(TableSegment),
}

#[derive(Debug, Clone, PartialEq)]
pub struct UseStatement {
    pub database: Identifier,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Column(ColumnRef),
    Literal(Literal),
    /// Parameter marker with its ordinal in the flat parameter list.
    Parameter(usize),
    Binary {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },
    Not(Box<Expr>),
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },
    InList {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },
    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        negated: bool,
    },
    Function {
        name: Identifier,
        args: Vec<Expr>,
        distinct: bool,
    },
    /// `*` inside a function call such as `COUNT(*)`.
    Wildcard,
    Subquery(Box<SelectStatement>),
    Nested(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
}

impl BinaryOperator {
    /// Operator with operands swapped, `a < b` becomes `b > a`.
    pub fn flip(&self) -> BinaryOperator {
        match self {
            BinaryOperator::Lt => BinaryOperator::Gt,
            BinaryOperator::LtEq => BinaryOperator::GtEq,
            BinaryOperator::Gt => BinaryOperator::Lt,
            BinaryOperator::GtEq => BinaryOperator::LtEq,
            other => *other,
        }
    }
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Visit this expression and every nested expression, depth first.
    /// Subqueries are not entered; callers that care walk them explicitly.
    pub fn visit<F: FnMut(&Expr)>(&self, f: &mut F) {
        f(self);
        match &self.kind {
            ExprKind::Binary { left, right, .. } => {
                left.visit(f);
                right.visit(f);
            }
            ExprKind::Not(inner) | ExprKind::Nested(inner) => inner.visit(f),
            ExprKind::IsNull { expr, .. } => expr.visit(f),
            ExprKind::Between {
                expr, low, high, ..
            } => {
                expr.visit(f);
                low.visit(f);
                high.visit(f);
            }
            ExprKind::InList { expr, list, .. } => {
                expr.visit(f);
                for item in list {
                    item.visit(f);
                }
            }
            ExprKind::Like { expr, pattern, .. } => {
                expr.visit(f);
                pattern.visit(f);
            }
            ExprKind::Function { args, .. } => {
                for arg in args {
                    arg.visit(f);
                }
            }
            ExprKind::Column(_)
            | ExprKind::Literal(_)
            | ExprKind::Parameter(_)
            | ExprKind::Wildcard
            | ExprKind::Subquery(_) => {}
        }
    }

    pub fn as_column(&self) -> Option<&ColumnRef> {
        match &self.kind {
            ExprKind::Column(c) => Some(c),
            ExprKind::Nested(inner) => inner.as_column(),
            _ => None,
        }
    }
}
