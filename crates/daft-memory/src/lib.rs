//! Shell-session memory: turns the raw transcript written by the shell
//! logger into the last few prompt/command/output blocks.

mod history;
mod sanitize;

pub use history::{
    HistoryBlock, HistoryError, HistoryReader, NO_HISTORY_SENTINEL, join_blocks, segment_blocks,
    select_recent, select_recent_blocks,
};
pub use sanitize::strip_ansi;
