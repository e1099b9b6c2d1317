//! Temporarily changing the read timeout of an [`Exchange`].

use crate::{backend::Backend, transport::Exchange};
use std::{
	io,
	ops::{Deref, DerefMut},
	time::Duration,
};

/// Restores the previous read timeout of an exchange when dropped.
///
/// Created by [`Exchange::timeout_guard`]. Long FIFO transfers and the short
/// probes used while draining stale input both rely on it.
///
/// The guard dereferences to the exchange, so it can be used in its place
/// until it goes out of scope. If the previous timeout cannot be restored,
/// the link is poisoned and the next attempt to lock it reports the failure.
#[derive(Debug)]
pub struct TimeoutGuard<'g, 'a, B: Backend> {
	exchange: &'g mut Exchange<'a, B>,
	previous: Option<Duration>,
}

impl<'g, 'a, B: Backend> TimeoutGuard<'g, 'a, B> {
	pub(crate) fn new(exchange: &'g mut Exchange<'a, B>, timeout: Option<Duration>) -> io::Result<Self> {
		let backend = exchange.backend_mut();
		let previous = backend.read_timeout()?;
		backend.set_read_timeout(timeout)?;
		Ok(TimeoutGuard { exchange, previous })
	}
}

impl<'g, 'a, B: Backend> Deref for TimeoutGuard<'g, 'a, B> {
	type Target = Exchange<'a, B>;

	fn deref(&self) -> &Self::Target {
		self.exchange
	}
}

impl<'g, 'a, B: Backend> DerefMut for TimeoutGuard<'g, 'a, B> {
	fn deref_mut(&mut self) -> &mut Self::Target {
		self.exchange
	}
}

impl<'g, 'a, B: Backend> Drop for TimeoutGuard<'g, 'a, B> {
	fn drop(&mut self) {
		let Err(err) = self.exchange.backend_mut().set_read_timeout(self.previous) else {
			return;
		};
		let previous = match self.previous {
			Some(timeout) => format!("{} ms", timeout.as_millis()),
			None => "no".to_string(),
		};
		log::warn!("failed to restore read timeout, poisoning link: {err}");
		self.exchange.poison(io::Error::new(
			io::ErrorKind::Other,
			format!("failed to restore {previous} read timeout: {err}"),
		));
	}
}
