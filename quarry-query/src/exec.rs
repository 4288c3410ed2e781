//! Running plan nodes over sources.

use itertools::Itertools;
use log::debug;
use quarry_array::{RecordBatch, Table};
use quarry_dataset::{BatchIterator, ScanOptions};
use quarry_dtype::{FieldName, Schema};
use quarry_error::QuarryResult;
use quarry_expr::{Expr, conjunction};

use crate::{PlanNode, Source, ops};

/// A lazy stream of batches sharing one schema.
pub(crate) struct Pipeline {
    schema: Schema,
    batches: BatchIterator,
}

impl Pipeline {
    fn from_table(table: &Table) -> QuarryResult<Self> {
        Ok(Self {
            schema: table.schema().clone(),
            batches: Box::new(table.to_batches()?.into_iter().map(Ok)),
        })
    }

    fn map<F>(self, schema: Schema, f: F) -> Self
    where
        F: Fn(RecordBatch) -> QuarryResult<RecordBatch> + Send + 'static,
    {
        Self {
            schema,
            batches: Box::new(self.batches.map(move |batch| batch.and_then(&f))),
        }
    }

    /// Stops pulling batches once `n` rows have been produced.
    fn limit(self, n: usize) -> Self {
        let mut batches = self.batches;
        let mut remaining = n;
        Self {
            schema: self.schema,
            batches: Box::new(std::iter::from_fn(move || {
                if remaining == 0 {
                    return None;
                }
                let batch = batches.next()?;
                Some(batch.and_then(|batch| {
                    let len = remaining.min(batch.num_rows());
                    remaining -= len;
                    batch.slice(0, len)
                }))
            })),
        }
    }

    fn into_table(self) -> QuarryResult<Table> {
        let batches: Vec<RecordBatch> = self.batches.try_collect()?;
        Table::from_batches(self.schema, batches)
    }
}

/// Whether a node can run on each batch independently.
fn is_streaming(node: &PlanNode) -> bool {
    match node {
        PlanNode::Select(_) | PlanNode::GroupBy(_) | PlanNode::Limit(_) => true,
        PlanNode::Filter(_) | PlanNode::Mutate(_) => {
            !node.expressions().iter().any(|expr| expr.contains_aggregate())
        }
        _ => false,
    }
}

/// Open the source, pushing the leading filters and selections of `nodes` into a dataset scan.
///
/// Returns the stream and how many nodes it already applied.
fn open_source(source: &Source, nodes: &[PlanNode]) -> QuarryResult<(Pipeline, usize)> {
    match source {
        Source::Table(table) => Ok((Pipeline::from_table(table)?, 0)),
        Source::Session(session) => Ok((Pipeline::from_table(&*session.execute()?)?, 0)),
        Source::Dataset(dataset) => {
            let mut projection: Option<Vec<FieldName>> = None;
            let mut predicates: Vec<Expr> = Vec::new();
            let mut consumed = 0;
            for node in nodes {
                match node {
                    PlanNode::Select(names) => projection = Some(names.clone()),
                    PlanNode::Filter(predicate) if !predicate.contains_aggregate() => {
                        predicates.push(predicate.clone())
                    }
                    _ => break,
                }
                consumed += 1;
            }
            let predicate = conjunction(predicates);
            if let Some(predicate) = &predicate {
                debug!("pushing {} into the scan of {}", predicate, dataset.root());
            }
            let scan = dataset.scan(ScanOptions {
                projection,
                predicate,
                parallel: false,
            })?;
            Ok((
                Pipeline {
                    schema: scan.schema().clone(),
                    batches: Box::new(scan.iter()),
                },
                consumed,
            ))
        }
    }
}

enum State {
    Streaming(Pipeline),
    Materialized(Table),
}

impl State {
    fn into_table(self) -> QuarryResult<Table> {
        match self {
            Self::Streaming(pipeline) => pipeline.into_table(),
            Self::Materialized(table) => Ok(table),
        }
    }
}

/// Runs nodes in order, carrying the pending grouping between calls.
#[derive(Debug, Default)]
pub(crate) struct Executor {
    grouping: Option<Vec<FieldName>>,
}

impl Executor {
    /// Take over the grouping left by nodes that ran elsewhere.
    pub(crate) fn track(&mut self, nodes: &[PlanNode]) {
        nodes.iter().for_each(|node| self.advance(node));
    }

    fn advance(&mut self, node: &PlanNode) {
        match node {
            PlanNode::GroupBy(keys) => self.grouping = Some(keys.clone()),
            PlanNode::Summarize(_) => self.grouping = None,
            _ => {}
        }
    }

    /// Run `nodes` over `source`, streaming batch-wise nodes and materializing before the rest.
    pub(crate) fn run(&mut self, source: &Source, nodes: &[PlanNode]) -> QuarryResult<Table> {
        let (pipeline, consumed) = open_source(source, nodes)?;
        let mut state = State::Streaming(pipeline);
        for node in &nodes[consumed..] {
            state = match state {
                State::Streaming(pipeline) if is_streaming(node) => {
                    State::Streaming(self.stream(pipeline, node)?)
                }
                state => State::Materialized(self.apply(&state.into_table()?, node)?),
            };
            self.advance(node);
        }
        state.into_table()
    }

    /// Read the source, pushing leading filters and selections into dataset scans, then
    /// evaluate every other node over the whole table.
    pub(crate) fn run_local(&mut self, source: &Source, nodes: &[PlanNode]) -> QuarryResult<Table> {
        let (pipeline, consumed) = open_source(source, nodes)?;
        self.run_whole(pipeline.into_table()?, &nodes[consumed..])
    }

    /// Evaluate `nodes` over the whole table, one after the other.
    pub(crate) fn run_whole(&mut self, table: Table, nodes: &[PlanNode]) -> QuarryResult<Table> {
        let mut table = table;
        for node in nodes {
            table = self.apply(&table, node)?;
            self.advance(node);
        }
        Ok(table)
    }

    fn stream(&self, pipeline: Pipeline, node: &PlanNode) -> QuarryResult<Pipeline> {
        let schema = node.output_schema(&pipeline.schema, self.grouping.as_deref())?;
        Ok(match node.clone() {
            PlanNode::Select(names) => {
                pipeline.map(schema, move |batch| batch.project(&names))
            }
            PlanNode::Filter(predicate) => {
                pipeline.map(schema, move |batch| ops::filter(&batch, &predicate))
            }
            PlanNode::Mutate(columns) => {
                pipeline.map(schema, move |batch| ops::mutate(&batch, &columns))
            }
            PlanNode::Limit(n) => pipeline.limit(n),
            _ => pipeline,
        })
    }

    /// Evaluate one node over a whole table.
    pub(crate) fn apply(&self, table: &Table, node: &PlanNode) -> QuarryResult<Table> {
        let grouping = self.grouping.as_deref();
        let schema = node.output_schema(table.schema(), grouping)?;
        let batch = || table.to_record_batch();
        Ok(match node {
            PlanNode::Select(names) => table.select(names)?,
            PlanNode::GroupBy(_) => table.clone(),
            PlanNode::Limit(n) => table.slice(0, (*n).min(table.num_rows()))?,
            PlanNode::Filter(predicate) => ops::filter(&batch()?, predicate)?.into(),
            PlanNode::Mutate(columns) => ops::mutate(&batch()?, columns)?.into(),
            PlanNode::Summarize(aggregates) => {
                ops::summarize(&batch()?, grouping.unwrap_or_default(), aggregates, &schema)?.into()
            }
            PlanNode::Arrange(keys) => ops::arrange(&batch()?, keys)?.into(),
            PlanNode::Join { right, on, kind } => {
                ops::join(&batch()?, &right.to_record_batch()?, on, *kind, &schema)?.into()
            }
            PlanNode::Window {
                name,
                function,
                partition_by,
                order_by,
            } => ops::window(&batch()?, name, function, partition_by, order_by)?.into(),
        })
    }
}

