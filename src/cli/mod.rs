pub mod config_cmd;
pub mod extract_cmd;
pub mod output;
pub mod record_cmd;
pub mod renderer;
pub mod report_cmd;
