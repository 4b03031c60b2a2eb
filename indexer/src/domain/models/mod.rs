pub mod account;
pub mod block;
pub mod event;
pub mod height;
pub mod raw;
pub mod report;
pub mod reward;
pub mod rollup;
pub mod sequence;
pub mod syncable;
pub mod system_event;
pub mod transaction;
pub mod validator;

pub use account::AccountEraSeq;
pub use block::{BlockSeq, BlockSummary};
pub use event::{EventSeq, NamedValue};
pub use height::HeightRecords;
pub use raw::{RawBlock, RawEvent, RawExtrinsic, RawHeight, RawStaker, RawValidator};
pub use report::{Report, ReportKind, RunState};
pub use reward::{RewardEraSeq, RewardKind};
pub use rollup::SummarySet;
pub use sequence::{Aggregate, EraSequence, Sequence, SessionSequence, Summary, TimeInterval};
pub use syncable::{Syncable, SyncableStatus};
pub use system_event::{SystemEvent, SystemEventData, SystemEventKind};
pub use transaction::TransactionSeq;
pub use validator::{
    ValidatorAgg, ValidatorEraSeq, ValidatorObservation, ValidatorSeq, ValidatorSessionSeq,
    ValidatorSessionSeqSummary, ValidatorSummary,
};
