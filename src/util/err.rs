/// Converts errors from their error type (of the submodule) to that of
/// an enclosing error enum, or the top-level `tripline::Error` variant.
///
/// ```rust,ignore
/// use tripline::map::error::MapError;
/// tripline::impl_err!(MapError, Map);
/// ```
pub mod err_macro {
    #[macro_export]
    macro_rules! impl_err {
        ($from:ty, $variant:ident) => {
            impl From<$from> for $crate::Error {
                fn from(value: $from) -> Self {
                    $crate::Error::$variant(value)
                }
            }
        };
        ($from:ty, $to:ty, $variant:ident) => {
            impl From<$from> for $to {
                fn from(value: $from) -> Self {
                    <$to>::$variant(value)
                }
            }
        };
    }

    pub use impl_err;
}
