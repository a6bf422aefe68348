// Output formatting — the subgroup table and its terminal display.

pub mod table;
pub mod terminal;
