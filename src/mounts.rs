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

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use tracing::debug;

use crate::error::Error;
use crate::error::Result;

/// Locations of the kernel-exposed sources read by this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcSources {
	/// Subsystem listing, one header line followed by one subsystem per line.
	pub cgroups: PathBuf,
	/// Mount table.
	pub mounts: PathBuf,
	/// Process-information directory, scanned by recursive attach.
	pub proc_root: PathBuf,
}

impl Default for ProcSources {
	fn default() -> Self {
		Self {
			cgroups: PathBuf::from("/proc/cgroups"),
			mounts: PathBuf::from("/proc/mounts"),
			proc_root: PathBuf::from("/proc"),
		}
	}
}

/// Where each cgroup v1 subsystem known to the kernel is mounted.
///
/// Subsystems the kernel knows about but which are not mounted are kept with
/// an empty path and are reported as not mounted by every lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubsystemMountMap(BTreeMap<String, PathBuf>);

impl SubsystemMountMap {
	pub fn resolve() -> Result<Self> {
		Self::resolve_from(&ProcSources::default())
	}

	pub fn resolve_from(sources: &ProcSources) -> Result<Self> {
		let read = |path: &Path| {
			fs::read_to_string(path).map_err(|source| Error::Discovery {
				path: path.to_path_buf(),
				source,
			})
		};
		let subsystems = read(&sources.cgroups)?;
		let mounts = read(&sources.mounts)?;
		let map = Self::parse(&subsystems, &mounts);
		debug!(?map, "resolved cgroup subsystem mount points");
		Ok(map)
	}

	/// Builds the map from the text of the subsystem listing and the mount table.
	///
	/// # Examples
	///
	/// ```
	/// use cgrun::SubsystemMountMap;
	///
	/// let map = SubsystemMountMap::parse(
	/// 	"#subsys_name\thierarchy\tnum_cgroups\tenabled\ncpu\t2\t1\t1\ncpuacct\t2\t1\t1\nblkio\t0\t1\t1\n",
	/// 	"cgroup /sys/fs/cgroup/cpu,cpuacct cgroup rw,nosuid,cpu,cpuacct 0 0\n",
	/// );
	/// assert_eq!(map.mount_point("cpu").and_then(|p| p.to_str()), Some("/sys/fs/cgroup/cpu,cpuacct"));
	/// assert_eq!(map.mount_point("cpuacct").and_then(|p| p.to_str()), Some("/sys/fs/cgroup/cpu,cpuacct"));
	/// assert_eq!(map.mount_point("blkio"), None);
	/// ```
	pub fn parse(subsystems: &str, mounts: &str) -> Self {
		let mut map = BTreeMap::new();
		for line in subsystems.lines().skip(1) {
			if let Some(name) = line.split_whitespace().next() {
				map.insert(name.to_string(), PathBuf::new());
			}
		}

		for line in mounts.lines() {
			let fields: Vec<&str> = line.split_whitespace().collect();
			let &[_device, mount_point, fs_type, options, ..] = fields.as_slice() else {
				continue;
			};
			if fs_type != "cgroup" {
				continue;
			}
			for option in options.split(',') {
				if let Some(path) = map.get_mut(option) {
					*path = PathBuf::from(mount_point);
				}
			}
		}
		Self(map)
	}

	/// Mount point of `subsystem`, or `None` if it is unknown or not mounted.
	pub fn mount_point(&self, subsystem: &str) -> Option<&Path> {
		self.0
			.get(subsystem)
			.map(PathBuf::as_path)
			.filter(|path| !path.as_os_str().is_empty())
	}

	pub fn require(&self, subsystem: &str) -> Result<&Path> {
		self.mount_point(subsystem)
			.ok_or_else(|| Error::SubsystemNotMounted(subsystem.to_string()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const PROC_CGROUPS: &str = "\
#subsys_name	hierarchy	num_cgroups	enabled
cpuset	3	1	1
cpu	2	60	1
cpuacct	2	60	1
blkio	5	60	1
memory	0	1	1
";

	const PROC_MOUNTS: &str = "\
sysfs /sys sysfs rw,nosuid,nodev,noexec,relatime 0 0
tmpfs /sys/fs/cgroup tmpfs ro,nosuid,nodev,noexec,mode=755 0 0
cgroup /sys/fs/cgroup/systemd cgroup rw,nosuid,nodev,noexec,relatime,xattr,name=systemd 0 0
cgroup /sys/fs/cgroup/cpuset cgroup rw,nosuid,nodev,noexec,relatime,cpuset 0 0
cgroup /sys/fs/cgroup/cpu,cpuacct cgroup rw,nosuid,nodev,noexec,relatime,cpu,cpuacct 0 0
cgroup2 /sys/fs/cgroup/unified cgroup2 rw,nosuid,nodev,noexec,relatime,blkio 0 0
short line
";

	#[test]
	fn test_parse() {
		let map = SubsystemMountMap::parse(PROC_CGROUPS, PROC_MOUNTS);
		assert_eq!(map.mount_point("cpuset"), Some(Path::new("/sys/fs/cgroup/cpuset")));
		assert_eq!(map.mount_point("cpu"), Some(Path::new("/sys/fs/cgroup/cpu,cpuacct")));
		assert_eq!(map.mount_point("cpuacct"), Some(Path::new("/sys/fs/cgroup/cpu,cpuacct")));
		// Only v1 mounts count.
		assert_eq!(map.mount_point("blkio"), None);
		assert_eq!(map.mount_point("memory"), None);
		// Named hierarchies are not subsystems.
		assert_eq!(map.mount_point("systemd"), None);
		assert_eq!(map.mount_point("name=systemd"), None);
	}

	#[test]
	fn test_require() {
		let map = SubsystemMountMap::parse(PROC_CGROUPS, PROC_MOUNTS);
		assert!(map.require("cpu").is_ok());
		match map.require("memory") {
			Err(Error::SubsystemNotMounted(name)) => assert_eq!(name, "memory"),
			other => panic!("unexpected result: {other:?}"),
		}
		assert!(matches!(map.require("bogus"), Err(Error::SubsystemNotMounted(_))));
	}

	#[test]
	fn test_resolve_from() {
		let dir = tempfile::tempdir().unwrap();
		let sources = ProcSources {
			cgroups: dir.path().join("cgroups"),
			mounts: dir.path().join("mounts"),
			proc_root: dir.path().to_path_buf(),
		};
		assert!(matches!(
			SubsystemMountMap::resolve_from(&sources),
			Err(Error::Discovery { path, .. }) if path == sources.cgroups
		));
		fs::write(&sources.cgroups, PROC_CGROUPS).unwrap();
		assert!(matches!(
			SubsystemMountMap::resolve_from(&sources),
			Err(Error::Discovery { path, .. }) if path == sources.mounts
		));
		fs::write(&sources.mounts, PROC_MOUNTS).unwrap();
		let map = SubsystemMountMap::resolve_from(&sources).unwrap();
		assert_eq!(map, SubsystemMountMap::parse(PROC_CGROUPS, PROC_MOUNTS));
	}
}
