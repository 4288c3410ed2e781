use std::fmt::Debug;
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;
use quarry_array::Table;
use quarry_dataset::Dataset;
use quarry_dtype::Schema;
use quarry_error::{QuarryResult, quarry_bail};

use crate::exec::Executor;
use crate::{Capabilities, LogicalPlan, Source};

/// The data of a plan, handed to an engine.
///
/// Holds the same `Arc`s as the plan's source. Nothing is copied when a plan changes engines.
#[derive(Debug, Clone)]
pub struct DataHandle {
    source: Source,
}

impl DataHandle {
    pub fn new(source: &Source) -> Self {
        Self {
            source: source.clone(),
        }
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn table(&self) -> Option<&Arc<Table>> {
        match &self.source {
            Source::Table(table) => Some(table),
            _ => None,
        }
    }

    pub fn dataset(&self) -> Option<&Arc<Dataset>> {
        match &self.source {
            Source::Dataset(dataset) => Some(dataset),
            _ => None,
        }
    }
}

/// Something that can run logical plans.
pub trait ExecutionEngine: Debug + Send + Sync {
    fn name(&self) -> &str;

    /// What the engine runs. A plan is only handed to an engine that can run all of it.
    fn capabilities(&self) -> Capabilities;

    /// Take over a plan. `data` shares the plan's source.
    ///
    /// Engines may run the plan here or defer it to [`EngineSession::execute`].
    fn accept(self: Arc<Self>, plan: LogicalPlan, data: DataHandle) -> QuarryResult<Arc<dyn EngineSession>>;
}

/// A plan accepted by an engine. The result stays owned by the session.
pub trait EngineSession: Debug + Send + Sync {
    fn engine(&self) -> Arc<dyn ExecutionEngine>;

    /// The schema of the result.
    fn schema(&self) -> &Schema;

    /// Run the plan, or return the result of an earlier run.
    fn execute(&self) -> QuarryResult<Arc<Table>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Stream what can be streamed, materialize before the rest.
    Native,
    /// Materialize the source, then evaluate node by node.
    Local,
}

/// The session of the built-in engines.
#[derive(Debug)]
pub struct PlanSession {
    engine: Arc<dyn ExecutionEngine>,
    plan: LogicalPlan,
    data: DataHandle,
    schema: Schema,
    mode: Mode,
    result: Mutex<Option<Arc<Table>>>,
}

impl PlanSession {
    fn new(engine: Arc<dyn ExecutionEngine>, plan: LogicalPlan, data: DataHandle, mode: Mode) -> QuarryResult<Self> {
        let capabilities = engine.capabilities();
        if let Some((node, check)) = plan
            .nodes
            .iter()
            .zip(capabilities.check(&plan))
            .find(|(_, check)| !check.is_translatable())
        {
            quarry_bail!(
                UnsupportedOperation: "{} engine cannot run {}: {}",
                engine.name(),
                node,
                check
            );
        }
        let schema = plan.output_schema()?;
        Ok(Self {
            engine,
            plan,
            data,
            schema,
            mode,
            result: Mutex::new(None),
        })
    }

    /// A session whose result is already known.
    pub fn completed(engine: Arc<dyn ExecutionEngine>, plan: LogicalPlan, table: Table) -> Self {
        Self {
            engine,
            data: DataHandle::new(&plan.source),
            plan,
            schema: table.schema().clone(),
            mode: Mode::Local,
            result: Mutex::new(Some(Arc::new(table))),
        }
    }

    pub fn plan(&self) -> &LogicalPlan {
        &self.plan
    }
}

impl EngineSession for PlanSession {
    fn engine(&self) -> Arc<dyn ExecutionEngine> {
        self.engine.clone()
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn execute(&self) -> QuarryResult<Arc<Table>> {
        let mut result = self.result.lock();
        if let Some(table) = result.as_ref() {
            return Ok(table.clone());
        }
        debug!("{} engine executing {}", self.engine.name(), self.plan);
        let mut executor = Executor::default();
        let table = match self.mode {
            Mode::Native => executor.run(self.data.source(), &self.plan.nodes)?,
            Mode::Local => executor.run_local(self.data.source(), &self.plan.nodes)?,
        };
        let table = Arc::new(table);
        *result = Some(table.clone());
        Ok(table)
    }
}

/// The engine every query starts on. Streams per-batch verbs and pushes leading filters and
/// selections into dataset scans.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeEngine;

impl ExecutionEngine for NativeEngine {
    fn name(&self) -> &str {
        "native"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::native()
    }

    fn accept(self: Arc<Self>, plan: LogicalPlan, data: DataHandle) -> QuarryResult<Arc<dyn EngineSession>> {
        Ok(Arc::new(PlanSession::new(self, plan, data, Mode::Native)?))
    }
}

/// Evaluates every verb over the whole materialized table.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalEngine;

impl ExecutionEngine for LocalEngine {
    fn name(&self) -> &str {
        "local"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::all()
    }

    fn accept(self: Arc<Self>, plan: LogicalPlan, data: DataHandle) -> QuarryResult<Arc<dyn EngineSession>> {
        Ok(Arc::new(PlanSession::new(self, plan, data, Mode::Local)?))
    }
}
