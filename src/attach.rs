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

//! Seizes processes that are already running.
//!
//! Recursive attach works from a single snapshot of `/proc`: children forked
//! after the scan are not joined, unless they inherit membership from a parent
//! that was joined first.

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use thiserror::Error;
use tracing::debug;
use tracing::info;

use crate::cgroup::CGroup;
use crate::cleanup::Coordinator;
use crate::error::Result;
use crate::mounts::ProcSources;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum AttachError {
	#[error("invalid pid {0}")]
	InvalidPid(u32),

	#[error("can't write pid {pid} to {}: {source}", path.display())]
	JoinTasks { path: PathBuf, pid: u32, source: io::Error },

	#[error("failed to scan {}: {source}", path.display())]
	Scan { path: PathBuf, source: io::Error },

	#[error("failed to probe pid {pid}: {source}")]
	Probe { pid: u32, source: Errno },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachOptions {
	/// Also join every descendant of the target.
	pub recursive: bool,
	/// Interval of the liveness probe while waiting for the target to exit.
	pub poll_interval: Duration,
	/// Process-information directory scanned for descendants.
	pub proc_root: PathBuf,
}

impl Default for AttachOptions {
	fn default() -> Self {
		Self {
			recursive: false,
			poll_interval: DEFAULT_POLL_INTERVAL,
			proc_root: ProcSources::default().proc_root,
		}
	}
}

/// Joins `pid` (and with `recursive`, its descendants) to the hierarchy, then
/// blocks until `pid` exits.
///
/// Joins are not undone on failure: the kernel offers no way to do so atomically.
pub fn attach(coordinator: &Coordinator, pid: u32, options: &AttachOptions) -> Result<()> {
	if pid == 0 || i32::try_from(pid).is_err() {
		return Err(AttachError::InvalidPid(pid).into());
	}
	let cgroups = coordinator.hierarchy().cgroups()?;
	coordinator.start(|| {
		join(&cgroups, pid)?;
		if options.recursive {
			for child in descendants(&options.proc_root, pid)? {
				join(&cgroups, child)?;
			}
		}
		Ok(())
	})?;
	eprintln!("{}", coordinator.hierarchy().name());

	wait_for_exit(pid, options.poll_interval)?;
	info!(pid, "target exited");
	Ok(())
}

fn join(cgroups: &[CGroup], pid: u32) -> Result<(), AttachError> {
	for cgroup in cgroups {
		cgroup.classify(pid).map_err(|source| AttachError::JoinTasks {
			path: cgroup.tasks_file(),
			pid,
			source,
		})?;
	}
	debug!(pid, "joined hierarchy");
	Ok(())
}

/// Every descendant of `pid` in one snapshot of `proc_root`, closest first.
pub fn descendants(proc_root: &Path, pid: u32) -> Result<Vec<u32>, AttachError> {
	let mut children: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
	for (child, parent) in process_table(proc_root)? {
		children.entry(parent).or_default().push(child);
	}

	let mut found = Vec::new();
	let mut queue = VecDeque::from([pid]);
	while let Some(parent) = queue.pop_front() {
		for &child in children.get(&parent).into_iter().flatten() {
			if child != pid && !found.contains(&child) {
				found.push(child);
				queue.push_back(child);
			}
		}
	}
	Ok(found)
}

/// `(pid, ppid)` of every process listed in `proc_root`.
fn process_table(proc_root: &Path) -> Result<Vec<(u32, u32)>, AttachError> {
	let scan_error = |source| AttachError::Scan {
		path: proc_root.to_path_buf(),
		source,
	};
	let mut table = Vec::new();
	for entry in fs::read_dir(proc_root).map_err(scan_error)? {
		let entry = entry.map_err(scan_error)?;
		if entry.file_name().to_str().and_then(|name| name.parse::<u32>().ok()).is_none() {
			continue;
		}
		// The process may have exited since the directory was listed.
		let stat = match fs::read_to_string(entry.path().join("stat")) {
			Ok(stat) => stat,
			Err(e) => {
				debug!("skipping {}: {e}", entry.path().display());
				continue;
			}
		};
		if let Some(ids) = parse_stat(&stat) {
			table.push(ids);
		}
	}
	table.sort_unstable();
	Ok(table)
}

/// Extracts `(pid, ppid)` from a `/proc/<pid>/stat` record.
///
/// The command name in the second field may itself contain spaces and
/// parentheses, so fields are counted from its last `)`.
fn parse_stat(stat: &str) -> Option<(u32, u32)> {
	let (head, tail) = stat.rsplit_once(')')?;
	let pid = head.split_whitespace().next()?.parse().ok()?;
	let mut fields = tail.split_whitespace();
	let _state = fields.next()?;
	let ppid = fields.next()?.parse().ok()?;
	Some((pid, ppid))
}

/// Probes `pid` with the null signal.
pub fn is_alive(pid: u32) -> Result<bool, AttachError> {
	let raw = i32::try_from(pid).map_err(|_| AttachError::InvalidPid(pid))?;
	match kill(Pid::from_raw(raw), None) {
		Ok(()) => Ok(true),
		// Exists, but belongs to another user.
		Err(Errno::EPERM) => Ok(true),
		Err(Errno::ESRCH) => Ok(false),
		Err(source) => Err(AttachError::Probe { pid, source }),
	}
}

/// Blocks until `pid` no longer exists.
pub fn wait_for_exit(pid: u32, poll_interval: Duration) -> Result<(), AttachError> {
	while is_alive(pid)? {
		thread::sleep(poll_interval);
	}
	Ok(())
}
