pub mod cache;
pub mod motive;
pub mod raw_table;
pub mod schema;
pub mod target;

pub use cache::LazyJointCache;
pub use motive::MotiveExport;
pub use raw_table::RawTable;
pub use schema::{ColumnHint, ColumnKind, GapFill, JointSchema, JointSchemaParser, MocapRecording, ParsedSchema};
pub use target::{JointResolution, JointSource, MarkerColumns, MarkerMatch, MarkerRef, TargetJoint, TargetJointTable};
