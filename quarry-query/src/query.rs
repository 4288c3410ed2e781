use std::fmt::{Display, Formatter};
use std::sync::Arc;

use itertools::Itertools;
use log::{debug, warn};
use quarry_array::Table;
use quarry_dataset::Dataset;
use quarry_dtype::{FieldName, Schema};
use quarry_error::{QuarryResult, Warning, WarningKind, quarry_bail, quarry_err};
use quarry_expr::Expr;

use crate::exec::Executor;
use crate::{
    Capabilities, DataHandle, EngineSession, ExecutionEngine, JoinKind, LocalEngine, LogicalPlan,
    NativeEngine, PlanNode, PlanSession, SortKey, Source, WindowFunction,
};

#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Receives whole plans over datasets that the native engine cannot run.
    pub alternate_engine: Option<Arc<dyn ExecutionEngine>>,
}

impl QueryOptions {
    pub fn with_alternate_engine(mut self, engine: Arc<dyn ExecutionEngine>) -> Self {
        self.alternate_engine = Some(engine);
        self
    }
}

/// Where a query is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    /// Verbs are being added. Nothing has been validated or read.
    Building,
    /// The plan is being checked against the target's capabilities.
    Validating,
    /// The native engine ran the plan, possibly finishing it by local evaluation.
    NativeExec,
    /// The plan was handed to another engine.
    HandedOff,
    /// Validation or dispatch failed.
    Failed,
}

impl Display for QueryState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Building => "building",
            Self::Validating => "validating",
            Self::NativeExec => "native",
            Self::HandedOff => "handed off",
            Self::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

/// A collected result and the warnings raised producing it.
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub table: Table,
    pub warnings: Vec<Warning>,
}

/// A dispatched plan whose result is held by an engine session.
#[derive(Debug, Clone)]
pub struct ComputedQuery {
    session: Arc<dyn EngineSession>,
    warnings: Vec<Warning>,
}

impl ComputedQuery {
    pub fn session(&self) -> &Arc<dyn EngineSession> {
        &self.session
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn schema(&self) -> &Schema {
        self.session.schema()
    }

    /// Fetch the result from the session.
    pub fn collect(&self) -> QuarryResult<QueryResult> {
        Ok(QueryResult {
            table: Table::clone(&*self.session.execute()?),
            warnings: self.warnings.clone(),
        })
    }

    /// Continue building on top of the result, against the engine that holds it.
    pub fn into_query(self) -> Query {
        Query::from_session(self.session)
    }
}

#[derive(Debug, Clone)]
enum Target {
    Native,
    Engine(Arc<dyn ExecutionEngine>),
}

/// A lazily built plan.
///
/// Verbs only record nodes. [`Query::collect`] and [`Query::compute`] validate the plan and run
/// it on the target engine, the native engine unless the source is an engine session.
#[derive(Debug, Clone)]
pub struct Query {
    plan: LogicalPlan,
    options: QueryOptions,
    target: Target,
    state: QueryState,
}

impl Query {
    pub fn new(source: Source, options: QueryOptions) -> Self {
        let target = match &source {
            Source::Session(session) => Target::Engine(session.engine()),
            _ => Target::Native,
        };
        Self {
            plan: LogicalPlan::new(source),
            options,
            target,
            state: QueryState::Building,
        }
    }

    pub fn from_table(table: impl Into<Arc<Table>>) -> Self {
        Self::new(Source::Table(table.into()), QueryOptions::default())
    }

    pub fn from_dataset(dataset: impl Into<Arc<Dataset>>) -> Self {
        Self::new(Source::Dataset(dataset.into()), QueryOptions::default())
    }

    pub fn from_session(session: Arc<dyn EngineSession>) -> Self {
        Self::new(Source::Session(session), QueryOptions::default())
    }

    pub fn with_options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }

    pub fn plan(&self) -> &LogicalPlan {
        &self.plan
    }

    pub fn state(&self) -> QueryState {
        self.state
    }

    /// The capabilities of the engine the plan is built against.
    pub fn capabilities(&self) -> Capabilities {
        match &self.target {
            Target::Native => NativeEngine.capabilities(),
            Target::Engine(engine) => engine.capabilities(),
        }
    }

    fn target_name(&self) -> &str {
        match &self.target {
            Target::Native => "native",
            Target::Engine(engine) => engine.name(),
        }
    }

    /// Append a node.
    pub fn push(mut self, node: PlanNode) -> Self {
        self.plan.nodes.push(node);
        self.state = QueryState::Building;
        self
    }

    pub fn select<S: Into<FieldName>>(self, names: impl IntoIterator<Item = S>) -> Self {
        self.push(PlanNode::Select(names.into_iter().map(Into::into).collect()))
    }

    pub fn filter(self, predicate: Expr) -> Self {
        self.push(PlanNode::Filter(predicate))
    }

    pub fn mutate<S: Into<FieldName>>(self, columns: impl IntoIterator<Item = (S, Expr)>) -> Self {
        self.push(PlanNode::Mutate(
            columns.into_iter().map(|(name, expr)| (name.into(), expr)).collect(),
        ))
    }

    pub fn group_by<S: Into<FieldName>>(self, keys: impl IntoIterator<Item = S>) -> Self {
        self.push(PlanNode::GroupBy(keys.into_iter().map(Into::into).collect()))
    }

    pub fn summarize<S: Into<FieldName>>(self, aggregates: impl IntoIterator<Item = (S, Expr)>) -> Self {
        self.push(PlanNode::Summarize(
            aggregates.into_iter().map(|(name, expr)| (name.into(), expr)).collect(),
        ))
    }

    pub fn arrange(self, keys: impl IntoIterator<Item = SortKey>) -> Self {
        self.push(PlanNode::Arrange(keys.into_iter().collect()))
    }

    pub fn join<S: Into<FieldName>>(
        self,
        right: impl Into<Arc<Table>>,
        on: impl IntoIterator<Item = S>,
        kind: JoinKind,
    ) -> Self {
        self.push(PlanNode::Join {
            right: right.into(),
            on: on.into_iter().map(Into::into).collect(),
            kind,
        })
    }

    pub fn window<S: Into<FieldName>>(
        self,
        name: impl Into<FieldName>,
        function: WindowFunction,
        partition_by: impl IntoIterator<Item = S>,
        order_by: impl IntoIterator<Item = SortKey>,
    ) -> Self {
        self.push(PlanNode::Window {
            name: name.into(),
            function,
            partition_by: partition_by.into_iter().map(Into::into).collect(),
            order_by: order_by.into_iter().collect(),
        })
    }

    pub fn limit(self, n: usize) -> Self {
        self.push(PlanNode::Limit(n))
    }

    /// The schema the plan produces. Validates every node without reading data.
    pub fn schema(&self) -> QuarryResult<Schema> {
        self.plan.output_schema()
    }

    /// The plan with the translatability of every node on the target engine.
    pub fn explain(&self) -> String {
        let checks = self.capabilities().check(&self.plan);
        let header = format!("{} on {} engine", self.plan.source, self.target_name());
        std::iter::once(header)
            .chain(
                self.plan
                    .nodes
                    .iter()
                    .zip(checks)
                    .enumerate()
                    .map(|(idx, (node, check))| format!("  {}. {} [{}]", idx + 1, node, check)),
            )
            .join("\n")
    }

    /// Validate and dispatch the plan, leaving the result with the engine that ran it.
    pub fn compute(&mut self) -> QuarryResult<ComputedQuery> {
        self.state = QueryState::Validating;
        match self.dispatch() {
            Ok((state, computed)) => {
                self.state = state;
                Ok(computed)
            }
            Err(err) => {
                self.state = QueryState::Failed;
                Err(err)
            }
        }
    }

    /// Validate, dispatch and collect the result.
    pub fn collect(&mut self) -> QuarryResult<QueryResult> {
        self.compute()?.collect()
    }

    fn dispatch(&mut self) -> QuarryResult<(QueryState, ComputedQuery)> {
        self.plan.schemas()?;
        let checks = self.capabilities().check(&self.plan);
        let Some(step) = checks.iter().position(|check| !check.is_translatable()) else {
            let (engine, state): (Arc<dyn ExecutionEngine>, _) = match &self.target {
                Target::Native => (Arc::new(NativeEngine) as _, QueryState::NativeExec),
                Target::Engine(engine) => (engine.clone(), QueryState::HandedOff),
            };
            let session = engine.accept(self.plan.clone(), DataHandle::new(&self.plan.source))?;
            let session = Self::evaluated(session)?;
            return Ok((state, ComputedQuery { session, warnings: Vec::new() }));
        };
        let node = &self.plan.nodes[step];
        let reason = checks[step].reason().unwrap_or_default();

        if self.plan.source.is_dataset() {
            let Some(alternate) = self.options.alternate_engine.clone() else {
                quarry_bail!(
                    UnsupportedOperation: "step {} {} cannot run on the {} engine ({}) and no alternate engine is configured",
                    step + 1,
                    node,
                    self.target_name(),
                    reason
                );
            };
            if !alternate.capabilities().can_run(&self.plan) {
                quarry_bail!(
                    UnsupportedOperation: "step {} {} cannot run on the {} engine ({}) and the {} engine cannot run the whole plan",
                    step + 1,
                    node,
                    self.target_name(),
                    reason,
                    alternate.name()
                );
            }
            debug!("handing the plan over {} to the {} engine", self.plan.source, alternate.name());
            let session = alternate
                .clone()
                .accept(self.plan.clone(), DataHandle::new(&self.plan.source))
                .map_err(|err| quarry_err!(err, "handing off to the {} engine", alternate.name()))?;
            let session = Self::evaluated(session)?;
            self.target = Target::Engine(alternate);
            return Ok((QueryState::HandedOff, ComputedQuery { session, warnings: Vec::new() }));
        }

        let warning = Warning::new(
            WarningKind::EagerMaterialization,
            format!(
                "step {} {} cannot run on the {} engine ({}); materialized the input and evaluated the remaining {} steps locally",
                step + 1,
                node,
                self.target_name(),
                reason,
                self.plan.nodes.len() - step
            ),
        );
        warn!("{}", warning.message());
        let mut executor = Executor::default();
        let prefix = match &self.target {
            Target::Native => executor.run(&self.plan.source, &self.plan.nodes[..step])?,
            Target::Engine(engine) => {
                let prefix = LogicalPlan {
                    source: self.plan.source.clone(),
                    nodes: self.plan.nodes[..step].to_vec(),
                };
                let session = engine.clone().accept(prefix, DataHandle::new(&self.plan.source))?;
                executor.track(&self.plan.nodes[..step]);
                Table::clone(&*session.execute()?)
            }
        };
        let table = executor.run_whole(prefix, &self.plan.nodes[step..])?;
        let session: Arc<dyn EngineSession> =
            Arc::new(PlanSession::completed(Arc::new(LocalEngine), self.plan.clone(), table));
        Ok((QueryState::NativeExec, ComputedQuery { session, warnings: vec![warning] }))
    }

    /// Run the session now, so errors surface from `compute`.
    fn evaluated(session: Arc<dyn EngineSession>) -> QuarryResult<Arc<dyn EngineSession>> {
        session.execute()?;
        Ok(session)
    }
}

impl From<Table> for Query {
    fn from(table: Table) -> Self {
        Self::from_table(table)
    }
}
