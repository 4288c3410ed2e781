use std::fmt::{Display, Formatter};

use quarry_array::compute::{NumericOperator, Operator};

/// The operator of a binary expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    Eq,
    NotEq,
    Gt,
    Gte,
    Lt,
    Lte,
    And,
    Or,
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOperator {
    /// The comparison kernel operator, for `=`, `!=`, `<`, `<=`, `>` and `>=`.
    pub fn as_comparison(self) -> Option<Operator> {
        Some(match self {
            Self::Eq => Operator::Eq,
            Self::NotEq => Operator::NotEq,
            Self::Gt => Operator::Gt,
            Self::Gte => Operator::Gte,
            Self::Lt => Operator::Lt,
            Self::Lte => Operator::Lte,
            _ => return None,
        })
    }

    /// The arithmetic kernel operator, for `+`, `-`, `*` and `/`.
    pub fn as_numeric(self) -> Option<NumericOperator> {
        Some(match self {
            Self::Add => NumericOperator::Add,
            Self::Sub => NumericOperator::Sub,
            Self::Mul => NumericOperator::Mul,
            Self::Div => NumericOperator::Div,
            _ => return None,
        })
    }

    pub fn is_comparison(self) -> bool {
        self.as_comparison().is_some()
    }

    pub fn is_logical(self) -> bool {
        matches!(self, Self::And | Self::Or)
    }

    pub fn is_arithmetic(self) -> bool {
        self.as_numeric().is_some()
    }
}

impl From<Operator> for BinaryOperator {
    fn from(value: Operator) -> Self {
        match value {
            Operator::Eq => Self::Eq,
            Operator::NotEq => Self::NotEq,
            Operator::Gt => Self::Gt,
            Operator::Gte => Self::Gte,
            Operator::Lt => Self::Lt,
            Operator::Lte => Self::Lte,
        }
    }
}

impl Display for BinaryOperator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let display = match self {
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::And => "and",
            Self::Or => "or",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
        };
        Display::fmt(display, f)
    }
}
