pub mod account_era_seqs;
pub mod block_seqs;
pub mod block_summaries;
pub mod event_seqs;
pub mod reports;
pub mod reward_era_seqs;
pub mod syncables;
pub mod system_events;
pub mod transaction_seqs;
pub mod validator_aggs;
pub mod validator_era_seqs;
pub mod validator_seqs;
pub mod validator_session_seq_summaries;
pub mod validator_session_seqs;
pub mod validator_summaries;
