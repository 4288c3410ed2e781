use std::fmt::{Display, Formatter};

use crate::Expr;

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Column(name) => write!(f, "{}", name),
            Self::Literal(scalar) => write!(f, "{}", scalar),
            Self::Binary { op, lhs, rhs } => write!(f, "({} {} {})", lhs, op, rhs),
            Self::Not(child) => write!(f, "not {}", child),
            Self::IsNull(child) => write!(f, "is_null({})", child),
            Self::Cast(child, dtype) => write!(f, "cast({} as {})", child, dtype),
            Self::Aggregate(function, child) => write!(f, "{}({})", function, child),
            Self::Like(child, pattern) => write!(f, "({} like '{}')", child, pattern),
        }
    }
}

#[cfg(test)]
mod tests {
    use quarry_dtype::{DType, Nullability, PType};
    use rstest::rstest;

    use crate::*;

    #[rstest]
    #[case(and(gt(col("x"), lit(1i32)), not(is_null(col("y")))), "((x > 1i32) and not is_null(y))")]
    #[case(eq(col("name"), lit("a")), "(name = \"a\")")]
    #[case(mean(add(col("x"), lit(2i64))), "mean((x + 2i64))")]
    #[case(like(col("s"), "a%"), "(s like 'a%')")]
    #[case(cast(col("x"), DType::Primitive(PType::I64, Nullability::Nullable)), "cast(x as i64?)")]
    fn renders(#[case] expr: Expr, #[case] expected: &str) {
        assert_eq!(expr.to_string(), expected);
    }
}
