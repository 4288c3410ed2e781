use crate::QuarryResult;

/// Extension trait for QuarryResult
pub trait ResultExt<T>: private::Sealed {
    /// Flatten a nested [`QuarryResult`].
    fn flatten(self) -> QuarryResult<T>;
}

mod private {
    use crate::QuarryResult;

    pub trait Sealed {}

    impl<T> Sealed for QuarryResult<QuarryResult<T>> {}
}

impl<T> ResultExt<T> for QuarryResult<QuarryResult<T>> {
    fn flatten(self) -> QuarryResult<T> {
        match self {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(e)) | Err(e) => Err(e),
        }
    }
}
