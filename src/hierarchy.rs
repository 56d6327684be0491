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

use std::io;
use std::path::PathBuf;

use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::cgroup::CGroup;
use crate::error::Error;
use crate::error::Result;
use crate::mounts::SubsystemMountMap;
use crate::params::mandatory_parameters;
use crate::params::ParameterSet;

/// A volatile hierarchy: one directory of the same name under the mount point
/// of every subsystem in its parameter set.
#[derive(Debug, Clone)]
pub struct Hierarchy {
	name: String,
	mounts: SubsystemMountMap,
	params: ParameterSet,
}

impl Hierarchy {
	pub fn new(name: impl Into<String>, mounts: SubsystemMountMap, params: ParameterSet) -> Self {
		Self {
			name: name.into(),
			mounts,
			params,
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	/// The directory of this hierarchy under `subsystem`'s mount point.
	pub fn cgroup(&self, subsystem: &str) -> Result<CGroup> {
		let mount_point = self.mounts.require(subsystem)?;
		Ok(CGroup::under(mount_point, &self.name))
	}

	/// Every per-subsystem directory, in subsystem order.
	pub fn cgroups(&self) -> Result<Vec<CGroup>> {
		self.params.subsystems().map(|subsystem| self.cgroup(subsystem)).collect()
	}

	/// The `tasks` file of every per-subsystem directory.
	pub fn task_files(&self) -> Result<Vec<PathBuf>> {
		Ok(self.cgroups()?.iter().map(CGroup::tasks_file).collect())
	}

	/// Creates every per-subsystem directory and applies the requested parameters.
	///
	/// On failure, the directories created by this call are removed again before
	/// the error is returned. A directory that already existed is left alone.
	pub fn create(&self) -> Result<()> {
		let mut created = Vec::new();
		let result = self
			.params
			.subsystems()
			.try_for_each(|subsystem| self.create_subsystem(subsystem, &mut created));
		if result.is_err() {
			for cgroup in created.iter().rev() {
				remove(cgroup);
			}
		}
		result
	}

	fn create_subsystem(&self, subsystem: &str, created: &mut Vec<CGroup>) -> Result<()> {
		let cgroup = self.cgroup(subsystem)?;
		cgroup.create().map_err(|source| Error::HierarchyCreate {
			path: cgroup.as_path().to_path_buf(),
			source,
		})?;
		info!(%cgroup, "created cgroup");
		created.push(cgroup.clone());

		// The kernel rejects other writes until these hold a subset of the parent's values.
		let mandatory = mandatory_parameters(subsystem);
		if !mandatory.is_empty() {
			let parent = cgroup.parent().unwrap_or_else(|| cgroup.clone());
			for param in mandatory {
				let file_name = format!("{subsystem}.{param}");
				let value = parent.read_parameter(&file_name).map_err(|source| Error::ParameterRead {
					path: parent.file(&file_name),
					source,
				})?;
				self.write_parameter(&cgroup, &file_name, &value)?;
			}
		}

		for (param, value) in self.params.parameters(subsystem) {
			let file_name = format!("{subsystem}.{param}");
			self.write_parameter(&cgroup, &file_name, value.as_bytes())?;
		}
		Ok(())
	}

	fn write_parameter(&self, cgroup: &CGroup, file_name: &str, value: &[u8]) -> Result<()> {
		let shown = String::from_utf8_lossy(value);
		debug!(%cgroup, file_name, value = shown.trim_end(), "setting parameter");
		cgroup.set_parameter(file_name, value).map_err(|source| Error::ParameterWrite {
			path: cgroup.file(file_name),
			source,
		})
	}

	/// Removes every per-subsystem directory. Never fails: directories that are
	/// already gone are skipped and other failures are only logged.
	pub fn destroy(&self) {
		for subsystem in self.params.subsystems() {
			if let Ok(cgroup) = self.cgroup(subsystem) {
				remove(&cgroup);
			}
		}
	}
}

fn remove(cgroup: &CGroup) {
	match cgroup.remove() {
		Ok(()) => info!(%cgroup, "removed cgroup"),
		Err(e) if e.kind() == io::ErrorKind::NotFound => {}
		Err(e) => warn!("failed to cleanup '{cgroup}': {e}"),
	}
}
