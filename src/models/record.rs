/// One parsed input line.
///
/// `name` borrows from the batch it was parsed out of and is only valid while
/// that batch is alive; store it through [`StationTable::record`], which copies.
///
/// [`StationTable::record`]: crate::models::StationTable::record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record<'a> {
    pub name: &'a [u8],
    pub temperature: i32,
}

impl<'a> Record<'a> {
    pub fn new(name: &'a [u8], temperature: i32) -> Self {
        Self { name, temperature }
    }
}
