/// Construct a [`QuarryError`].
///
/// ```
/// use quarry_error::{quarry_err, ErrorKind};
///
/// let err = quarry_err!(SchemaError: "column {} has {} rows", "a", 3);
/// assert_eq!(err.kind(), ErrorKind::Schema);
/// ```
#[macro_export]
macro_rules! quarry_err {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::QuarryError::InvalidArgument(format!($fmt $(, $arg)*).into())
    };
    (OutOfBounds: $idx:expr, $start:expr, $stop:expr) => {
        $crate::QuarryError::OutOfBounds($idx, $start, $stop)
    };
    (TypeMismatch: $column:expr, $from:expr, $to:expr, $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::QuarryError::TypeMismatch {
            column: $column.to_string().into(),
            from: $from.to_string().into(),
            to: $to.to_string().into(),
            reason: format!($fmt $(, $arg)*).into(),
        }
    };
    ($variant:ident: $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::QuarryError::$variant(format!($fmt $(, $arg)*).into())
    };
    ($err:expr, $fmt:literal $(, $arg:expr)* $(,)?) => {{
        let err: $crate::QuarryError = $err;
        err.with_context(format!($fmt $(, $arg)*))
    }};
}

/// Construct a [`QuarryError`] and immediately return it from the enclosing function.
#[macro_export]
macro_rules! quarry_bail {
    ($($tt:tt)+) => {
        return Err($crate::quarry_err!($($tt)+))
    };
}

/// Panic with a [`QuarryError`]. Reserved for violated internal invariants.
#[macro_export]
macro_rules! quarry_panic {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {
        panic!("{}", $crate::quarry_err!($fmt $(, $arg)*))
    };
    (OutOfBounds: $idx:expr, $start:expr, $stop:expr) => {
        panic!("{}", $crate::quarry_err!(OutOfBounds: $idx, $start, $stop))
    };
    ($variant:ident: $fmt:literal $(, $arg:expr)* $(,)?) => {
        panic!("{}", $crate::quarry_err!($variant: $fmt $(, $arg)*))
    };
    ($err:expr, $fmt:literal $(, $arg:expr)* $(,)?) => {{
        let err: $crate::QuarryError = $err;
        panic!("{}", err.with_context(format!($fmt $(, $arg)*)))
    }};
    ($err:expr) => {{
        let err: $crate::QuarryError = $err;
        panic!("{}", err)
    }};
}
