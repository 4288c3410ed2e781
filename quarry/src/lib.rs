pub use quarry_array::*;
pub use {
    quarry_buffer as buffer, quarry_dataset as dataset, quarry_dtype as dtype,
    quarry_error as error, quarry_expr as expr, quarry_file as file, quarry_io as io,
    quarry_query as query, quarry_scalar as scalar,
};
