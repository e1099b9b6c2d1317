//! Finding instruments and working out which one is on the other end of a link.

use super::Variant;
use crate::{
	backend::Backend,
	error::{Error, IdentityDetectionError},
	line::{self, Timing},
	transport::Transport,
};
use std::{thread, time::Duration};

/// The number of empty reads tolerated while reading the `info` banner.
const BANNER_RETRIES: u32 = 3;
/// The most bytes read in answer to a carriage return.
const PROBE_LEN: usize = 128;

/// How the firmware answered a bare carriage return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Identity {
	/// Line firmware printing its prompt straight away (`"ch> "`).
	Line,
	/// Line firmware of the -H style, which starts a new line first.
	LineH,
	/// The binary register/FIFO firmware of the NanoVNA-V2.
	Binary,
}

impl Identity {
	/// Classify the answer to a carriage return.
	pub fn from_response(response: &[u8]) -> Option<Identity> {
		if response.starts_with(b"ch> ") {
			Some(Identity::Line)
		} else if response.starts_with(b"\r\nch> ") || response.starts_with(b"\r\n?\r\nch> ") {
			Some(Identity::LineH)
		} else if response.starts_with(b"2") {
			Some(Identity::Binary)
		} else {
			None
		}
	}
}

/// Poke the instrument with carriage returns until it answers recognizably.
///
/// Each of the `attempts` drains stale input, sends a carriage return twice
/// (draining in between), waits `wait`, and reads up to 128 bytes.
pub fn detect_identity<B: Backend>(
	transport: &Transport<B>,
	attempts: u32,
	wait: Duration,
) -> Result<Identity, Error> {
	let mut exchange = transport.lock()?;
	let mut response = Vec::new();
	for attempt in 1..=attempts {
		exchange.drain()?;
		exchange.write(b"\r")?;
		exchange.drain()?;
		exchange.write(b"\r")?;
		thread::sleep(wait);

		response = exchange.read(PROBE_LEN)?;
		if let Some(identity) = Identity::from_response(&response) {
			log::debug!("{} identified as {identity:?}", exchange.name());
			return Ok(identity);
		}
		log::debug!("retry detection: {attempt}");
	}
	log::error!(
		"no VNA detected, hardware responded to CR with: {:?}",
		String::from_utf8_lossy(&response)
	);
	Err(IdentityDetectionError::new(response).into())
}

/// Read the banner printed by the `info` command.
///
/// The banner is optional: an instrument that stays silent yields an empty string.
pub fn read_banner<B: Backend>(transport: &Transport<B>, wait: Duration) -> Result<String, Error> {
	let timing = Timing {
		wait,
		overwrite: wait,
		max_retries: BANNER_RETRIES,
	};
	match line::exec_collect(transport, "info", timing) {
		Ok(lines) => {
			log::debug!("info output: {lines:?}");
			Ok(lines.join("\n"))
		}
		Err(e) if e.is_timeout() => Ok(String::new()),
		Err(e) => Err(e.into()),
	}
}

/// Work out which instrument is connected.
///
/// Line firmware that prints an unknown banner is treated as a plain NanoVNA.
pub fn identify<B: Backend>(
	transport: &Transport<B>,
	attempts: u32,
	wait: Duration,
) -> Result<Variant, Error> {
	log::debug!("finding correct VNA type...");
	if detect_identity(transport, attempts, wait)? == Identity::Binary {
		return Ok(Variant::NanoVnaV2);
	}
	log::info!("finding firmware variant...");
	let banner = read_banner(transport, wait)?;
	Ok(Variant::from_banner(&banner).unwrap_or_else(|| {
		log::warn!("did not recognize NanoVNA type from firmware");
		Variant::NanoVna
	}))
}

/// A serial port whose USB IDs belong to a supported instrument family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
	/// The path to open.
	pub path: String,
	/// The family name associated with the USB IDs.
	pub family: &'static str,
	/// The USB vendor ID.
	pub vid: u16,
	/// The USB product ID.
	pub pid: u16,
}

/// USB vendor and product IDs of the supported families.
const USB_FAMILIES: [(u16, u16, &str); 3] = [
	(0x0483, 0x5740, "NanoVNA"),
	(0x16C0, 0x0483, "AVNA"),
	(0x04B4, 0x0008, "S-A-A-2"),
];

/// The family with the given USB IDs.
pub fn usb_family(vid: u16, pid: u16) -> Option<&'static str> {
	USB_FAMILIES
		.iter()
		.find(|&&(v, p, _)| v == vid && p == pid)
		.map(|&(_, _, name)| name)
}

/// List the serial ports that look like supported instruments.
pub fn available_ports() -> Result<Vec<PortInfo>, Error> {
	let ports = serialport::available_ports()?
		.into_iter()
		.filter_map(|port| match port.port_type {
			serialport::SerialPortType::UsbPort(usb) => {
				let family = usb_family(usb.vid, usb.pid)?;
				log::debug!(
					"found {family} USB:({:04x}:{:04x}) on port {}",
					usb.vid,
					usb.pid,
					port.port_name
				);
				Some(PortInfo {
					path: port.port_name,
					family,
					vid: usb.vid,
					pid: usb.pid,
				})
			}
			_ => None,
		})
		.collect();
	Ok(ports)
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::backend::Mock;

	#[test]
	fn identity_from_response() {
		assert_eq!(Identity::from_response(b"ch> "), Some(Identity::Line));
		assert_eq!(Identity::from_response(b"\r\nch> "), Some(Identity::LineH));
		assert_eq!(Identity::from_response(b"\r\n?\r\nch> "), Some(Identity::LineH));
		assert_eq!(Identity::from_response(b"2"), Some(Identity::Binary));
		assert_eq!(Identity::from_response(b"?"), None);
		assert_eq!(Identity::from_response(b""), None);
	}

	#[test]
	fn detection_retries_then_fails() {
		let mut mock = Mock::new();
		mock.reply("\r", "garbage");
		let transport = Transport::open_mock(mock);
		let err = detect_identity(&transport, 3, Duration::ZERO).unwrap_err();
		let err = IdentityDetectionError::try_from(err).unwrap();
		assert_eq!(err.as_bytes(), b"garbage");

		let backend = transport.into_backend().unwrap();
		assert_eq!(backend.written().len(), 6);
	}

	#[test]
	fn identify_from_banner() {
		let mut mock = Mock::new();
		mock.reply("\r", "\r\nch> ");
		mock.reply("info\r", "info\r\nBoard: NanoVNA-H 4\r\nVersion: 1.2.00\r\nch> ");
		let transport = Transport::open_mock(mock);
		let variant = identify(&transport, 3, Duration::ZERO).unwrap();
		assert_eq!(variant, Variant::NanoVnaH4);
	}

	#[test]
	fn identify_binary_and_unknown() {
		let mut mock = Mock::new();
		mock.reply("\r", "2");
		let transport = Transport::open_mock(mock);
		assert_eq!(identify(&transport, 3, Duration::ZERO).unwrap(), Variant::NanoVnaV2);

		// A silent `info` still resolves, to the plain NanoVNA.
		let mut mock = Mock::new();
		mock.reply("\r", "ch> ");
		let transport = Transport::open_mock(mock);
		assert_eq!(identify(&transport, 3, Duration::ZERO).unwrap(), Variant::NanoVna);
	}

	#[test]
	fn usb_families() {
		assert_eq!(usb_family(0x0483, 0x5740), Some("NanoVNA"));
		assert_eq!(usb_family(0x04B4, 0x0008), Some("S-A-A-2"));
		assert_eq!(usb_family(0x0483, 0x0000), None);
	}
}
