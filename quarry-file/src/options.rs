use quarry_dtype::FieldName;
use quarry_expr::Expr;

/// Options controlling how a [`FileWriter`](crate::FileWriter) lays out its output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOptions {
    /// The number of rows in each row group. The last row group may be shorter.
    pub row_group_rows: usize,
    /// The target size of a page body in bytes.
    pub page_bytes: usize,
    /// Whether pages carry min/max statistics.
    pub write_statistics: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            row_group_rows: 64 * 1024,
            page_bytes: 1 << 20,
            write_statistics: true,
        }
    }
}

impl WriteOptions {
    pub fn with_row_group_rows(mut self, row_group_rows: usize) -> Self {
        self.row_group_rows = row_group_rows.max(1);
        self
    }

    pub fn with_page_bytes(mut self, page_bytes: usize) -> Self {
        self.page_bytes = page_bytes.max(1);
        self
    }

    pub fn with_statistics(mut self, write_statistics: bool) -> Self {
        self.write_statistics = write_statistics;
        self
    }
}

/// Options for a single pass over a file.
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    /// The columns to read, in output order. `None` reads every column.
    pub projection: Option<Vec<FieldName>>,
    /// Rows for which the predicate is not true are dropped, and row groups whose statistics
    /// rule it out are never read.
    pub predicate: Option<Expr>,
    /// Decode the columns of a row group on the rayon thread pool.
    pub parallel: bool,
}

impl ReadOptions {
    pub fn with_projection<S: Into<FieldName>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.projection = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_predicate(mut self, predicate: Expr) -> Self {
        self.predicate = Some(predicate);
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}
