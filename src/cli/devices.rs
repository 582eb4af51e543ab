//! The `devices` command: list capture devices for troubleshooting.

use anyhow::Result;

use crate::capture::cpal_provider::list_input_devices;

pub fn handle_devices_command() -> Result<()> {
    let devices = list_input_devices()?;
    if devices.is_empty() {
        println!("No capture devices found");
        return Ok(());
    }

    for (name, monitor) in devices {
        if monitor {
            println!("{name}  [system audio monitor]");
        } else {
            println!("{name}");
        }
    }
    Ok(())
}
