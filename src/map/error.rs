#[derive(Debug)]
pub enum MapError {
    /// The backing store could not serve the lookup (I/O or backend
    /// failure). The affected vehicle is retried on a later pass.
    Unavailable(String),
}
