#[derive(Debug)]
pub enum GeomError {
    /// A movement segment was built from points of two different vehicles.
    VehicleMismatch { first: u64, second: u64 },
}
