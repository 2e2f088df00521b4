//! Analysis modules.
//!
//! Pure, synchronous computation over the run's aggregate: the date
//! window, the topic table, trends and the final report.

pub mod aggregator;
pub mod assembler;
pub mod trend;
pub mod window;

pub use aggregator::{merge_seed_topics, TopicTable};
pub use assembler::{assemble_report, ReportContext};
pub use window::DateWindow;
