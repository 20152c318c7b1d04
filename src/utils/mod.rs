pub mod async_task;
pub mod file_io;
