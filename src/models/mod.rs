pub mod record;
pub mod station;
pub mod table;

pub use record::Record;
pub use station::StationStats;
pub use table::StationTable;
