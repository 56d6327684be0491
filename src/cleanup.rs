// Copyright 2026 Octave Online LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//    http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Ties removal of the hierarchy to normal exit, setup failure and
//! termination signals.
//!
//! Until a target process exists, SIGINT, SIGHUP and SIGTERM tear the
//! hierarchy down and end the tool. Once the target has started the signals are
//! ignored here: the target receives them through its process group and its exit
//! unwinds the normal teardown path.

use std::process;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use tracing::debug;
use tracing::warn;

use crate::error::Error;
use crate::error::Result;
use crate::hierarchy::Hierarchy;

/// Exit status of the tool when a signal arrives before the target starts.
pub const EXIT_INTERRUPTED: i32 = 130;

/// Whether the launched or seized target has started. Set once, never cleared.
#[derive(Debug, Default)]
pub struct RunState {
	started: AtomicBool,
}

impl RunState {
	pub fn mark_started(&self) {
		self.started.store(true, Ordering::SeqCst);
	}

	pub fn has_started(&self) -> bool {
		self.started.load(Ordering::SeqCst)
	}
}

/// What an interrupt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
	/// The target owns signal handling now.
	Ignored,
	/// The hierarchy was removed; the tool should exit.
	TornDown,
}

/// Owns the hierarchy and guarantees it is destroyed exactly once.
#[derive(Debug)]
pub struct Coordinator {
	hierarchy: Hierarchy,
	state: RunState,
	torn_down: AtomicBool,
	// Held across every mutation of the hierarchy and across target start.
	lock: Mutex<()>,
}

impl Coordinator {
	pub fn new(hierarchy: Hierarchy) -> Self {
		Self {
			hierarchy,
			state: RunState::default(),
			torn_down: AtomicBool::new(false),
			lock: Mutex::new(()),
		}
	}

	pub fn hierarchy(&self) -> &Hierarchy {
		&self.hierarchy
	}

	pub fn state(&self) -> &RunState {
		&self.state
	}

	/// Installs the handler for SIGINT, SIGHUP and SIGTERM.
	///
	/// Must run before [`Coordinator::create`]. The handler runs on its own
	/// thread and exits the process with [`EXIT_INTERRUPTED`] after teardown.
	pub fn install(self: &Arc<Self>) -> Result<(), ctrlc::Error> {
		let coordinator = Arc::clone(self);
		ctrlc::set_handler(move || {
			if coordinator.interrupt() == Interrupt::TornDown {
				process::exit(EXIT_INTERRUPTED);
			}
		})
	}

	/// Creates the hierarchy unless an interrupt already tore it down.
	///
	/// A failed create has rolled back its own directories; later teardowns
	/// leave any same-named directories alone.
	pub fn create(&self) -> Result<()> {
		let _guard = self.lock();
		if self.torn_down.load(Ordering::SeqCst) {
			return Err(Error::Interrupted);
		}
		let result = self.hierarchy.create();
		if result.is_err() {
			self.torn_down.store(true, Ordering::SeqCst);
		}
		result
	}

	/// Runs `start`, which brings up the target, and marks the run as started
	/// if it succeeds.
	///
	/// An interrupt arriving meanwhile waits for `start` to return, so it either
	/// tears down before the target exists or is ignored afterwards.
	pub fn start<T>(&self, start: impl FnOnce() -> Result<T>) -> Result<T> {
		let _guard = self.lock();
		if self.torn_down.load(Ordering::SeqCst) {
			return Err(Error::Interrupted);
		}
		let started = start()?;
		self.state.mark_started();
		Ok(started)
	}

	/// Reaction to a termination signal.
	pub fn interrupt(&self) -> Interrupt {
		let _guard = self.lock();
		if self.state.has_started() {
			debug!("signal left to the running target");
			return Interrupt::Ignored;
		}
		warn!("interrupted, removing hierarchy {}", self.hierarchy.name());
		self.teardown_locked();
		Interrupt::TornDown
	}

	/// Destroys the hierarchy if nothing has done so yet.
	pub fn teardown(&self) {
		let _guard = self.lock();
		self.teardown_locked();
	}

	fn teardown_locked(&self) {
		if !self.torn_down.swap(true, Ordering::SeqCst) {
			self.hierarchy.destroy();
		}
	}

	fn lock(&self) -> MutexGuard<'_, ()> {
		self.lock.lock().unwrap_or_else(PoisonError::into_inner)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::hierarchy::tests::fixture;
	use crate::params::ParameterSet;
	use std::fs;

	fn coordinator(subsystems: &[&str]) -> (tempfile::TempDir, Coordinator) {
		let (root, mounts) = fixture(subsystems, &[]);
		let mut params = ParameterSet::new();
		for subsystem in subsystems {
			params.join(subsystem);
		}
		(root, Coordinator::new(Hierarchy::new("a1b2", mounts, params)))
	}

	#[test]
	fn test_interrupt_before_start() {
		let (root, coordinator) = coordinator(&["cpu", "freezer"]);
		coordinator.create().unwrap();
		assert!(root.path().join("cpu/a1b2").is_dir());
		assert_eq!(coordinator.interrupt(), Interrupt::TornDown);
		assert!(!root.path().join("cpu/a1b2").exists());
		assert!(!root.path().join("freezer/a1b2").exists());

		// Nothing may start or be recreated once torn down.
		let mut reached = false;
		let result = coordinator.start(|| {
			reached = true;
			Ok(())
		});
		assert!(matches!(result, Err(Error::Interrupted)));
		assert!(!reached);
		assert!(matches!(coordinator.create(), Err(Error::Interrupted)));
		assert!(!root.path().join("cpu/a1b2").exists());
		assert!(!coordinator.state().has_started());
	}

	#[test]
	fn test_interrupt_after_start() {
		let (root, coordinator) = coordinator(&["cpu"]);
		coordinator.create().unwrap();
		coordinator.start(|| Ok(())).unwrap();
		assert!(coordinator.state().has_started());
		assert_eq!(coordinator.interrupt(), Interrupt::Ignored);
		assert!(root.path().join("cpu/a1b2").is_dir());
		coordinator.teardown();
		assert!(!root.path().join("cpu/a1b2").exists());
	}

	#[test]
	fn test_failed_start_is_not_started() {
		let (_root, coordinator) = coordinator(&["cpu"]);
		coordinator.create().unwrap();
		let result: Result<()> = coordinator.start(|| Err(Error::SubsystemNotMounted("cpu".into())));
		assert!(result.is_err());
		assert!(!coordinator.state().has_started());
		assert_eq!(coordinator.interrupt(), Interrupt::TornDown);
	}

	#[test]
	fn test_failed_create_spares_existing_directory() {
		let (root, coordinator) = coordinator(&["cpu", "freezer"]);
		let existing = root.path().join("freezer/a1b2");
		fs::create_dir(&existing).unwrap();
		assert!(matches!(coordinator.create(), Err(Error::HierarchyCreate { .. })));
		assert_eq!(coordinator.interrupt(), Interrupt::TornDown);
		coordinator.teardown();
		assert!(existing.is_dir());
		assert!(!root.path().join("cpu/a1b2").exists());
	}

	#[test]
	fn test_teardown_runs_once() {
		let (root, coordinator) = coordinator(&["cpu"]);
		coordinator.create().unwrap();
		coordinator.teardown();
		// A directory reappearing under the same name belongs to someone else now.
		fs::create_dir(root.path().join("cpu/a1b2")).unwrap();
		coordinator.teardown();
		assert_eq!(coordinator.interrupt(), Interrupt::TornDown);
		assert!(root.path().join("cpu/a1b2").is_dir());
	}
}
