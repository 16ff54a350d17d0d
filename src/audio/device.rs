//! Device enumeration and selection
//!
//! Devices are numbered from 1 in the order the default host lists them,
//! 0 always means the host's default device for that direction.

use cpal::traits::{DeviceTrait, HostTrait};
use dialoguer::{theme::ColorfulTheme, Select};

use super::config::DEFAULT_DEVICE;
use super::error::{AudioError, AudioResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Input => f.write_str("input"),
            Direction::Output => f.write_str("output"),
        }
    }
}

/// Information about one device of the default host
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    /// Number to pass as device index
    pub index: usize,
    pub name: String,
    pub max_input_channels: u16,
    pub max_output_channels: u16,
    pub is_default_input: bool,
    pub is_default_output: bool,
}

impl DeviceInfo {
    pub fn max_channels(&self, direction: Direction) -> u16 {
        match direction {
            Direction::Input => self.max_input_channels,
            Direction::Output => self.max_output_channels,
        }
    }
}

impl std::fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:>3}: {} (in: {}, out: {})",
            self.index, self.name, self.max_input_channels, self.max_output_channels
        )?;
        if self.is_default_input {
            f.write_str(" [default input]")?;
        }
        if self.is_default_output {
            f.write_str(" [default output]")?;
        }
        Ok(())
    }
}

/// How a device index maps onto the device list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceChoice {
    Default,
    /// position in the device list
    Listed(usize),
    OutOfRange,
}

pub fn resolve_index(index: usize, device_count: usize) -> DeviceChoice {
    if index == DEFAULT_DEVICE {
        DeviceChoice::Default
    } else if index <= device_count {
        DeviceChoice::Listed(index - 1)
    } else {
        DeviceChoice::OutOfRange
    }
}

fn device_name(device: &cpal::Device) -> String {
    device.name().unwrap_or_else(|_| "Unknown".to_string())
}

fn max_channels(device: &cpal::Device, direction: Direction) -> u16 {
    let channels = match direction {
        Direction::Input => device
            .supported_input_configs()
            .map(|c| c.map(|c| c.channels()).max()),
        Direction::Output => device
            .supported_output_configs()
            .map(|c| c.map(|c| c.channels()).max()),
    };
    channels.ok().flatten().unwrap_or(0)
}

fn host_devices(host: &cpal::Host) -> AudioResult<Vec<cpal::Device>> {
    let devices: Vec<cpal::Device> = host
        .devices()
        .map_err(|e| AudioError::DeviceUnavailable(e.to_string()))?
        .collect();

    if devices.is_empty() {
        return Err(AudioError::NoDevices);
    }
    Ok(devices)
}

/// Get all devices of the default host
pub fn list_devices() -> AudioResult<Vec<DeviceInfo>> {
    let host = cpal::default_host();
    let default_in = host.default_input_device().map(|d| device_name(&d));
    let default_out = host.default_output_device().map(|d| device_name(&d));

    let infos: Vec<DeviceInfo> = host_devices(&host)?
        .iter()
        .enumerate()
        .map(|(i, device)| {
            let name = device_name(device);
            DeviceInfo {
                index: i + 1,
                is_default_input: default_in.as_ref() == Some(&name),
                is_default_output: default_out.as_ref() == Some(&name),
                max_input_channels: max_channels(device, Direction::Input),
                max_output_channels: max_channels(device, Direction::Output),
                name,
            }
        })
        .collect();

    log::debug!("{} devices on host {:?}", infos.len(), host.id());

    Ok(infos)
}

/// Find the device for `index`, asking the user if the index isn't valid.
pub fn select_device(index: usize, direction: Direction) -> AudioResult<cpal::Device> {
    let host = cpal::default_host();
    let mut devices = host_devices(&host)?;

    let position = match resolve_index(index, devices.len()) {
        DeviceChoice::Default => {
            let default = match direction {
                Direction::Input => host.default_input_device(),
                Direction::Output => host.default_output_device(),
            };
            return default.ok_or_else(|| {
                AudioError::DeviceUnavailable(format!("no default {direction} device"))
            });
        }
        DeviceChoice::Listed(position) => position,
        DeviceChoice::OutOfRange => {
            log::warn!("{direction} device {index} doesn't exist");
            prompt_for_device(&devices, direction)?
        }
    };

    let device = devices.swap_remove(position);
    if max_channels(&device, direction) == 0 {
        return Err(AudioError::DeviceUnavailable(format!(
            "{} has no {direction} channels",
            device_name(&device)
        )));
    }

    log::info!("using {direction} device: {}", device_name(&device));
    Ok(device)
}

pub fn select_input_device(index: usize) -> AudioResult<cpal::Device> {
    select_device(index, Direction::Input)
}

pub fn select_output_device(index: usize) -> AudioResult<cpal::Device> {
    select_device(index, Direction::Output)
}

// only offers devices that have channels in the wanted direction
fn prompt_for_device(devices: &[cpal::Device], direction: Direction) -> AudioResult<usize> {
    let candidates: Vec<(usize, String)> = devices
        .iter()
        .enumerate()
        .filter_map(|(i, d)| {
            let channels = max_channels(d, direction);
            (channels > 0).then(|| (i, format!("{} ({channels} ch)", device_name(d))))
        })
        .collect();

    if candidates.is_empty() {
        return Err(AudioError::DeviceUnavailable(format!(
            "no device with {direction} channels"
        )));
    }

    let labels: Vec<&str> = candidates.iter().map(|(_, label)| label.as_str()).collect();

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt(format!("Choose an {direction} device"))
        .items(&labels)
        .default(0)
        .interact()
        .map_err(|e| AudioError::DeviceSelection(e.to_string()))?;

    Ok(candidates[selection].0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_zero_is_default() {
        assert_eq!(resolve_index(0, 0), DeviceChoice::Default);
        assert_eq!(resolve_index(0, 5), DeviceChoice::Default);
    }

    #[test]
    fn test_listed_indices_start_at_one() {
        assert_eq!(resolve_index(1, 3), DeviceChoice::Listed(0));
        assert_eq!(resolve_index(3, 3), DeviceChoice::Listed(2));
        assert_eq!(resolve_index(4, 3), DeviceChoice::OutOfRange);
        assert_eq!(resolve_index(1, 0), DeviceChoice::OutOfRange);
    }

    #[test]
    fn test_device_info_display() {
        let info = DeviceInfo {
            index: 2,
            name: "USB Interface".to_string(),
            max_input_channels: 4,
            max_output_channels: 2,
            is_default_input: true,
            is_default_output: false,
        };
        assert_eq!(
            info.to_string(),
            "  2: USB Interface (in: 4, out: 2) [default input]"
        );
        assert_eq!(info.max_channels(Direction::Output), 2);
    }
}
