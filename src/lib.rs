pub mod error;
pub mod linker;
pub mod models;
pub mod normalize;
pub mod table;

pub use error::{TableError, TableResult};
pub use linker::{LinkBuilder, LinkReport, LinkSource, Repair, RepairKind};
pub use models::{Config, FundRecord, GroupBy, LinkOrdering, NB_LINKS};
pub use normalize::{root_name, RootNameNormalizer};
pub use table::{FundTable, LinkedTable};
