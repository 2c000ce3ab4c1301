pub mod icons;
pub mod output;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{banner, error, section, success, summary_row, table_name, warn};
pub use table::{RelationTable, stats_table};
pub use theme::{Theme, theme};
