pub mod booking;
pub mod call_log;
pub mod room;
pub mod stay;
