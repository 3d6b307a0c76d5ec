pub mod file_commands;
pub mod upload_commands;
