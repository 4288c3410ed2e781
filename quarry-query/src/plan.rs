use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

use itertools::Itertools;
use quarry_array::Table;
use quarry_array::compute::{SortOptions, sum_dtype};
use quarry_dataset::Dataset;
use quarry_dtype::{DType, Field, FieldName, Nullability, PType, Schema};
use quarry_error::{QuarryResult, quarry_bail, quarry_err};
use quarry_expr::Expr;

use crate::EngineSession;

/// Suffix given to right-hand join columns whose names are already taken by the left input.
pub const JOIN_SUFFIX: &str = "_right";

/// The data a plan starts from.
#[derive(Clone)]
pub enum Source {
    /// An in-memory table.
    Table(Arc<Table>),
    /// A directory of files read lazily.
    Dataset(Arc<Dataset>),
    /// The result of a plan accepted by an engine.
    Session(Arc<dyn EngineSession>),
}

impl Source {
    pub fn schema(&self) -> &Schema {
        match self {
            Self::Table(table) => table.schema(),
            Self::Dataset(dataset) => dataset.schema(),
            Self::Session(session) => session.schema(),
        }
    }

    pub fn is_dataset(&self) -> bool {
        matches!(self, Self::Dataset(_))
    }
}

impl Debug for Source {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Table(table) => f
                .debug_struct("Table")
                .field("rows", &table.num_rows())
                .field("schema", table.schema())
                .finish(),
            Self::Dataset(dataset) => f.debug_tuple("Dataset").field(dataset).finish(),
            Self::Session(session) => f.debug_tuple("Session").field(session).finish(),
        }
    }
}

impl Display for Source {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Table(table) => write!(f, "table ({} rows)", table.num_rows()),
            Self::Dataset(dataset) => {
                write!(f, "dataset {} ({} files)", dataset.root(), dataset.files().len())
            }
            Self::Session(session) => write!(f, "{} session", session.engine().name()),
        }
    }
}

/// One ordering column of an `arrange` or window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub column: FieldName,
    pub options: SortOptions,
}

impl SortKey {
    pub fn asc(column: impl Into<FieldName>) -> Self {
        Self {
            column: column.into(),
            options: SortOptions::ascending(),
        }
    }

    pub fn desc(column: impl Into<FieldName>) -> Self {
        Self {
            column: column.into(),
            options: SortOptions::descending(),
        }
    }

    pub fn with_nulls_first(mut self, nulls_first: bool) -> Self {
        self.options.nulls_first = nulls_first;
        self
    }
}

impl Display for SortKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}",
            self.column,
            if self.options.descending { "desc" } else { "asc" }
        )?;
        if self.options.nulls_first {
            write!(f, " nulls first")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum JoinKind {
    /// Only rows with a match on both sides.
    #[default]
    Inner,
    /// Every left row, with nulls where the right side has no match.
    Left,
}

impl Display for JoinKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inner => write!(f, "inner"),
            Self::Left => write!(f, "left"),
        }
    }
}

/// A function computed over the ordered rows of each window partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowFunction {
    /// 1-based position within the partition.
    RowNumber,
    /// Position of the first row of the run of ties, with gaps after ties.
    Rank,
    /// Like [`WindowFunction::Rank`] without gaps.
    DenseRank,
    /// The value `offset` rows earlier, null before the start of the partition.
    Lag { column: FieldName, offset: usize },
    /// The value `offset` rows later, null past the end of the partition.
    Lead { column: FieldName, offset: usize },
    /// The running sum of the partition so far. Nulls contribute nothing.
    CumulativeSum(FieldName),
}

impl WindowFunction {
    pub fn lag(column: impl Into<FieldName>, offset: usize) -> Self {
        Self::Lag {
            column: column.into(),
            offset,
        }
    }

    pub fn lead(column: impl Into<FieldName>, offset: usize) -> Self {
        Self::Lead {
            column: column.into(),
            offset,
        }
    }

    pub fn cumulative_sum(column: impl Into<FieldName>) -> Self {
        Self::CumulativeSum(column.into())
    }

    /// The column the function reads, if any.
    pub fn column(&self) -> Option<&FieldName> {
        match self {
            Self::RowNumber | Self::Rank | Self::DenseRank => None,
            Self::Lag { column, .. } | Self::Lead { column, .. } | Self::CumulativeSum(column) => {
                Some(column)
            }
        }
    }

    pub fn return_dtype(&self, schema: &Schema) -> QuarryResult<DType> {
        match self {
            Self::RowNumber | Self::Rank | Self::DenseRank => {
                Ok(DType::Primitive(PType::I64, Nullability::NonNullable))
            }
            Self::Lag { column, .. } | Self::Lead { column, .. } => {
                Ok(schema.field_or_err(column)?.dtype().as_nullable())
            }
            Self::CumulativeSum(column) => match schema.field_or_err(column)?.dtype() {
                dtype @ DType::Primitive(..) => sum_dtype(dtype),
                other => quarry_bail!(TypeError: "cumulative_sum expects numbers, found {}", other),
            },
        }
    }
}

impl Display for WindowFunction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RowNumber => write!(f, "row_number()"),
            Self::Rank => write!(f, "rank()"),
            Self::DenseRank => write!(f, "dense_rank()"),
            Self::Lag { column, offset } => write!(f, "lag({column}, {offset})"),
            Self::Lead { column, offset } => write!(f, "lead({column}, {offset})"),
            Self::CumulativeSum(column) => write!(f, "cumulative_sum({column})"),
        }
    }
}

/// One verb of a plan.
#[derive(Debug, Clone)]
pub enum PlanNode {
    /// Keep the named columns, in this order.
    Select(Vec<FieldName>),
    /// Keep the rows for which the predicate is true.
    Filter(Expr),
    /// Compute columns, in order. Later expressions see earlier results.
    Mutate(Vec<(FieldName, Expr)>),
    /// Group the rows for the next `Summarize`.
    GroupBy(Vec<FieldName>),
    /// One row per group: the group keys followed by the named aggregates.
    Summarize(Vec<(FieldName, Expr)>),
    /// Stable sort by the keys, compared in order.
    Arrange(Vec<SortKey>),
    Join {
        right: Arc<Table>,
        on: Vec<FieldName>,
        kind: JoinKind,
    },
    Window {
        name: FieldName,
        function: WindowFunction,
        partition_by: Vec<FieldName>,
        order_by: Vec<SortKey>,
    },
    /// Keep the first rows.
    Limit(usize),
}

/// The kind of a [`PlanNode`], independent of its arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKind {
    Select,
    Filter,
    Mutate,
    GroupBy,
    Summarize,
    Arrange,
    Join,
    Window,
    Limit,
}

impl NodeKind {
    pub const ALL: [NodeKind; 9] = [
        Self::Select,
        Self::Filter,
        Self::Mutate,
        Self::GroupBy,
        Self::Summarize,
        Self::Arrange,
        Self::Join,
        Self::Window,
        Self::Limit,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Filter => "filter",
            Self::Mutate => "mutate",
            Self::GroupBy => "group_by",
            Self::Summarize => "summarize",
            Self::Arrange => "arrange",
            Self::Join => "join",
            Self::Window => "window",
            Self::Limit => "limit",
        }
    }
}

impl Display for NodeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl PlanNode {
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Select(_) => NodeKind::Select,
            Self::Filter(_) => NodeKind::Filter,
            Self::Mutate(_) => NodeKind::Mutate,
            Self::GroupBy(_) => NodeKind::GroupBy,
            Self::Summarize(_) => NodeKind::Summarize,
            Self::Arrange(_) => NodeKind::Arrange,
            Self::Join { .. } => NodeKind::Join,
            Self::Window { .. } => NodeKind::Window,
            Self::Limit(_) => NodeKind::Limit,
        }
    }

    /// The expressions the node evaluates.
    pub fn expressions(&self) -> Vec<&Expr> {
        match self {
            Self::Filter(predicate) => vec![predicate],
            Self::Mutate(columns) | Self::Summarize(columns) => {
                columns.iter().map(|(_, expr)| expr).collect()
            }
            _ => vec![],
        }
    }

    /// The schema the node produces from `input`.
    ///
    /// `grouping` is the key list of the preceding `GroupBy`, if one is pending.
    pub fn output_schema(&self, input: &Schema, grouping: Option<&[FieldName]>) -> QuarryResult<Schema> {
        match self {
            Self::Select(names) => input.project(names),
            Self::Filter(predicate) => match predicate.return_dtype(input)? {
                DType::Bool(_) | DType::Null => Ok(input.clone()),
                other => quarry_bail!(TypeError: "filter {} has type {}, expected bool", predicate, other),
            },
            Self::Mutate(columns) => {
                let mut schema = input.clone();
                for (name, expr) in columns {
                    let dtype = expr.return_dtype(&schema)?;
                    schema = upsert_field(&schema, name, dtype)?;
                }
                Ok(schema)
            }
            Self::GroupBy(keys) => {
                input.project(keys)?;
                Ok(input.clone())
            }
            Self::Summarize(aggregates) => {
                let keys = grouping.unwrap_or_default();
                let mut fields = input.project(keys)?.fields().to_vec();
                for (name, expr) in aggregates {
                    if !expr.contains_aggregate() {
                        quarry_bail!(
                            InvalidArgument: "summarize column {} = {} has no aggregate",
                            name,
                            expr
                        );
                    }
                    fields.push(Field::new(name.clone(), expr.return_dtype(input)?));
                }
                Schema::try_new(fields)
            }
            Self::Arrange(keys) => {
                if keys.is_empty() {
                    quarry_bail!("arrange requires at least one key");
                }
                for key in keys {
                    input.field_or_err(&key.column)?;
                }
                Ok(input.clone())
            }
            Self::Join { right, on, kind } => join_schema(input, right.schema(), on, *kind),
            Self::Window {
                name,
                function,
                partition_by,
                order_by,
            } => {
                input.project(partition_by)?;
                for key in order_by {
                    input.field_or_err(&key.column)?;
                }
                upsert_field(input, name, function.return_dtype(input)?)
            }
            Self::Limit(_) => Ok(input.clone()),
        }
    }
}

/// Replace the type of the named field, or append the field when there is none.
pub(crate) fn upsert_field(schema: &Schema, name: &FieldName, dtype: DType) -> QuarryResult<Schema> {
    match schema.index_of(name) {
        Some(_) => schema.with_field_dtype(name, dtype),
        None => schema.with_field(Field::new(name.clone(), dtype)),
    }
}

/// The schema of a join: every left column, then the right columns that are not keys.
///
/// Keys must have the same type on both sides, ignoring nullability. A right column whose name
/// is taken gets [`JOIN_SUFFIX`]. For a left join the right columns become nullable.
pub fn join_schema(left: &Schema, right: &Schema, on: &[FieldName], kind: JoinKind) -> QuarryResult<Schema> {
    if on.is_empty() {
        quarry_bail!("join requires at least one key");
    }
    for key in on {
        let left_dtype = left.field_or_err(key)?.dtype();
        let right_dtype = right.field_or_err(key)?.dtype();
        if !left_dtype.eq_ignore_nullability(right_dtype) {
            quarry_bail!(
                TypeMismatch: key.clone(),
                left_dtype,
                right_dtype,
                "join key {} is {} on the left and {} on the right",
                key,
                left_dtype,
                right_dtype
            );
        }
    }
    let mut fields = left.fields().to_vec();
    for field in right.fields().iter().filter(|f| !on.contains(f.name())) {
        let name: FieldName = if left.index_of(field.name()).is_some() {
            format!("{}{}", field.name(), JOIN_SUFFIX).into()
        } else {
            field.name().clone()
        };
        let dtype = match kind {
            JoinKind::Inner => field.dtype().clone(),
            JoinKind::Left => field.dtype().as_nullable(),
        };
        fields.push(Field::new(name, dtype));
    }
    Schema::try_new(fields)
}

impl Display for PlanNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Select(names) => write!(f, "select({})", names.iter().join(", ")),
            Self::Filter(predicate) => write!(f, "filter({predicate})"),
            Self::Mutate(columns) => write!(
                f,
                "mutate({})",
                columns.iter().map(|(name, expr)| format!("{name} = {expr}")).join(", ")
            ),
            Self::GroupBy(keys) => write!(f, "group_by({})", keys.iter().join(", ")),
            Self::Summarize(columns) => write!(
                f,
                "summarize({})",
                columns.iter().map(|(name, expr)| format!("{name} = {expr}")).join(", ")
            ),
            Self::Arrange(keys) => write!(f, "arrange({})", keys.iter().join(", ")),
            Self::Join { right, on, kind } => write!(
                f,
                "{kind}_join(table ({} rows), on = [{}])",
                right.num_rows(),
                on.iter().join(", ")
            ),
            Self::Window {
                name,
                function,
                partition_by,
                order_by,
            } => write!(
                f,
                "window({name} = {function}, partition_by = [{}], order_by = [{}])",
                partition_by.iter().join(", "),
                order_by.iter().join(", ")
            ),
            Self::Limit(n) => write!(f, "limit({n})"),
        }
    }
}

/// A source and the verbs applied to it, in order.
///
/// Cloning shares the source data.
#[derive(Debug, Clone)]
pub struct LogicalPlan {
    pub source: Source,
    pub nodes: Vec<PlanNode>,
}

impl LogicalPlan {
    pub fn new(source: Source) -> Self {
        Self {
            source,
            nodes: Vec::new(),
        }
    }

    /// The input schema of every node followed by the output schema of the plan.
    pub fn schemas(&self) -> QuarryResult<Vec<Schema>> {
        let mut schemas = Vec::with_capacity(self.nodes.len() + 1);
        let mut schema = self.source.schema().clone();
        let mut grouping: Option<&[FieldName]> = None;
        for (step, node) in self.nodes.iter().enumerate() {
            let next = node
                .output_schema(&schema, grouping)
                .map_err(|err| quarry_err!(err, "step {} {}", step + 1, node))?;
            match node {
                PlanNode::GroupBy(keys) => grouping = Some(keys.as_slice()),
                PlanNode::Summarize(_) => grouping = None,
                _ => {}
            }
            schemas.push(std::mem::replace(&mut schema, next));
        }
        schemas.push(schema);
        Ok(schemas)
    }

    pub fn output_schema(&self) -> QuarryResult<Schema> {
        let mut schemas = self.schemas()?;
        schemas
            .pop()
            .ok_or_else(|| quarry_err!("plan has no output schema"))
    }
}

impl Display for LogicalPlan {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source)?;
        for node in &self.nodes {
            write!(f, "\n  {node}")?;
        }
        Ok(())
    }
}
