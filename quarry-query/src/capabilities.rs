use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

use itertools::Itertools;
use quarry_expr::{AggregateFunction, Expr, ExprKind};

use crate::{LogicalPlan, NodeKind, PlanNode};

/// Whether an engine can run one node of a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Translatability {
    Translatable,
    NotTranslatable(String),
}

impl Translatability {
    pub fn is_translatable(&self) -> bool {
        matches!(self, Self::Translatable)
    }

    /// Why the node cannot be run, if it cannot.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Translatable => None,
            Self::NotTranslatable(reason) => Some(reason),
        }
    }
}

impl Display for Translatability {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Translatable => write!(f, "translatable"),
            Self::NotTranslatable(reason) => write!(f, "not translatable: {reason}"),
        }
    }
}

/// The nodes, expressions and aggregates an engine can run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    nodes: BTreeSet<NodeKind>,
    exprs: BTreeSet<ExprKind>,
    aggregates: BTreeSet<AggregateFunction>,
}

impl Capabilities {
    /// Nothing is supported.
    pub fn none() -> Self {
        Self {
            nodes: BTreeSet::new(),
            exprs: BTreeSet::new(),
            aggregates: BTreeSet::new(),
        }
    }

    /// Everything is supported.
    pub fn all() -> Self {
        Self {
            nodes: NodeKind::ALL.into_iter().collect(),
            exprs: ExprKind::ALL.into_iter().collect(),
            aggregates: AggregateFunction::ALL.into_iter().collect(),
        }
    }

    /// What the native engine runs: every node but windows, every aggregate but the median.
    pub fn native() -> Self {
        Self::all()
            .without_node(NodeKind::Window)
            .without_aggregate(AggregateFunction::Median)
    }

    pub fn with_node(mut self, kind: NodeKind) -> Self {
        self.nodes.insert(kind);
        self
    }

    pub fn without_node(mut self, kind: NodeKind) -> Self {
        self.nodes.remove(&kind);
        self
    }

    pub fn with_expr(mut self, kind: ExprKind) -> Self {
        self.exprs.insert(kind);
        self
    }

    pub fn without_expr(mut self, kind: ExprKind) -> Self {
        self.exprs.remove(&kind);
        self
    }

    pub fn with_aggregate(mut self, function: AggregateFunction) -> Self {
        self.aggregates.insert(function);
        self
    }

    pub fn without_aggregate(mut self, function: AggregateFunction) -> Self {
        self.aggregates.remove(&function);
        self
    }

    pub fn supports_node(&self, kind: NodeKind) -> bool {
        self.nodes.contains(&kind)
    }

    pub fn supports_expr(&self, kind: ExprKind) -> bool {
        self.exprs.contains(&kind)
    }

    pub fn supports_aggregate(&self, function: AggregateFunction) -> bool {
        self.aggregates.contains(&function)
    }

    /// Check one expression, naming the first unsupported part.
    pub fn check_expr(&self, expr: &Expr) -> Translatability {
        let mut unsupported = None;
        expr.walk(&mut |node| {
            if unsupported.is_some() {
                return;
            }
            if !self.supports_expr(node.kind()) {
                unsupported = Some(format!("{} expressions are not supported", node.kind().name()));
                return;
            }
            if let Expr::Aggregate(function, _) = node {
                if !self.supports_aggregate(*function) {
                    unsupported = Some(format!("the {function} aggregate is not supported"));
                }
            }
        });
        match unsupported {
            None => Translatability::Translatable,
            Some(reason) => Translatability::NotTranslatable(reason),
        }
    }

    pub fn check_node(&self, node: &PlanNode) -> Translatability {
        if !self.supports_node(node.kind()) {
            return Translatability::NotTranslatable(format!("{} is not supported", node.kind()));
        }
        node.expressions()
            .into_iter()
            .map(|expr| self.check_expr(expr))
            .find(|check| !check.is_translatable())
            .unwrap_or(Translatability::Translatable)
    }

    /// Tag every node of the plan, in order.
    pub fn check(&self, plan: &LogicalPlan) -> Vec<Translatability> {
        plan.nodes.iter().map(|node| self.check_node(node)).collect()
    }

    /// Whether every node of the plan can be run.
    pub fn can_run(&self, plan: &LogicalPlan) -> bool {
        plan.nodes
            .iter()
            .all(|node| self.check_node(node).is_translatable())
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::native()
    }
}

impl Display for Capabilities {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "nodes [{}], aggregates [{}]",
            self.nodes.iter().join(", "),
            self.aggregates.iter().join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use quarry_expr::{col, count, gt, lit, median, sum};

    use super::*;
    use crate::WindowFunction;

    #[test]
    fn native_rejects_windows_and_median() {
        let native = Capabilities::native();
        let window = PlanNode::Window {
            name: "rn".into(),
            function: WindowFunction::RowNumber,
            partition_by: vec![],
            order_by: vec![],
        };
        assert_eq!(
            native.check_node(&window),
            Translatability::NotTranslatable("window is not supported".to_string())
        );
        let summarize = PlanNode::Summarize(vec![("m".into(), median(col("x")))]);
        assert_eq!(
            native.check_node(&summarize).reason(),
            Some("the median aggregate is not supported")
        );
        let supported = PlanNode::Summarize(vec![
            ("n".into(), count(col("x"))),
            ("total".into(), sum(col("x"))),
        ]);
        assert!(native.check_node(&supported).is_translatable());
        assert!(Capabilities::all().check_node(&window).is_translatable());
        assert!(Capabilities::all().check_node(&summarize).is_translatable());
    }

    #[test]
    fn expression_kinds_are_checked() {
        let caps = Capabilities::all().without_expr(ExprKind::Comparison);
        let filter = PlanNode::Filter(gt(col("x"), lit(1i64)));
        assert!(!caps.check_node(&filter).is_translatable());
        assert!(caps.with_expr(ExprKind::Comparison).check_node(&filter).is_translatable());
        assert!(!Capabilities::none().check_node(&PlanNode::Limit(1)).is_translatable());
    }
}
