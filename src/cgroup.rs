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

use std::fmt;
use std::fs;
use std::fs::DirBuilder;
use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::os::unix::fs::DirBuilderExt;
use std::path::Path;
use std::path::PathBuf;

/// Name of the membership file inside every cgroup v1 directory.
pub const TASKS_FILE: &str = "tasks";

/// One cgroup directory under a single subsystem mount point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CGroup(PathBuf);

impl CGroup {
	pub fn from_path(path: impl AsRef<Path>) -> Self {
		Self(PathBuf::from(path.as_ref()))
	}

	/// The cgroup `name` below the root of the hierarchy mounted at `mount_point`.
	pub fn under(mount_point: impl AsRef<Path>, name: impl AsRef<Path>) -> Self {
		let mut cgroup = Self::from_path(mount_point);
		cgroup.append(name);
		cgroup
	}

	pub fn as_path(&self) -> &Path {
		&self.0
	}

	/// # Examples
	///
	/// ```
	/// use cgrun::CGroup;
	///
	/// let mut cgroup = CGroup::from_path("/sys/fs/cgroup/cpu");
	/// cgroup.append("jobs/a1b2");
	/// assert_eq!(cgroup.as_path().to_str(), Some("/sys/fs/cgroup/cpu/jobs/a1b2"));
	/// assert_eq!(cgroup.parent().unwrap().as_path().to_str(), Some("/sys/fs/cgroup/cpu/jobs"));
	/// assert_eq!(cgroup.tasks_file().to_str(), Some("/sys/fs/cgroup/cpu/jobs/a1b2/tasks"));
	/// ```
	pub fn append(&mut self, path: impl AsRef<Path>) {
		self.0.push(path);
	}

	pub fn parent(&self) -> Option<Self> {
		self.0.parent().map(Self::from_path)
	}

	pub fn tasks_file(&self) -> PathBuf {
		self.0.join(TASKS_FILE)
	}

	pub fn file(&self, file_name: &str) -> PathBuf {
		self.0.join(file_name)
	}

	/// Creates the directory, accessible by its owner and group only.
	pub fn create(&self) -> io::Result<()> {
		DirBuilder::new().mode(0o770).create(&self.0)
	}

	/// Removes the directory itself, which the kernel allows once it holds
	/// neither tasks nor child cgroups.
	pub fn remove(&self) -> io::Result<()> {
		fs::remove_dir(&self.0)
	}

	pub fn read_parameter(&self, file_name: &str) -> io::Result<Vec<u8>> {
		fs::read(self.file(file_name))
	}

	/// Writes `value` as the entire contents of the parameter file.
	pub fn set_parameter(&self, file_name: &str, value: impl AsRef<[u8]>) -> io::Result<()> {
		fs::write(self.file(file_name), value)
	}

	pub fn classify(&self, pid: u32) -> io::Result<()> {
		write_pid(&self.tasks_file(), pid)
	}
}

/// Adds `pid` to the cgroup owning the `tasks` file at `path`.
///
/// The file must already exist; it is never created.
pub fn write_pid(path: &Path, pid: u32) -> io::Result<()> {
	let mut tasks = OpenOptions::new().append(true).open(path)?;
	tasks.write_all(format!("{pid}\n").as_bytes())?;
	tasks.flush()
}

impl AsRef<Path> for CGroup {
	fn as_ref(&self) -> &Path {
		&self.0
	}
}

impl fmt::Display for CGroup {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0.display())
	}
}
