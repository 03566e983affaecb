pub(crate) mod ask;
pub(crate) mod config;
pub(crate) mod history;
