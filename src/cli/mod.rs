pub mod args;
pub mod devices;
pub mod record;

pub use args::{Cli, CliCommand, RecordArgs};
pub use devices::handle_devices_command;
pub use record::handle_record_command;
