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

#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use cgrun::Coordinator;
use cgrun::Hierarchy;
use cgrun::ParameterSet;
use cgrun::SubsystemMountMap;
use tempfile::TempDir;

/// Mount map placing every subsystem at `root/<subsystem>`.
pub fn mounts_under(root: &Path, subsystems: &[&str]) -> SubsystemMountMap {
	let mut cgroups = String::from("#subsys_name\thierarchy\tnum_cgroups\tenabled\n");
	let mut mounts = String::new();
	for subsystem in subsystems {
		cgroups.push_str(&format!("{subsystem}\t1\t1\t1\n"));
		mounts.push_str(&format!(
			"cgroup {} cgroup rw,relatime,{subsystem} 0 0\n",
			root.join(subsystem).display()
		));
	}
	SubsystemMountMap::parse(&cgroups, &mounts)
}

/// Plain directories standing in for cgroup v1 mount points.
pub struct Fixture {
	dir: TempDir,
	subsystems: Vec<String>,
}

impl Fixture {
	pub fn new(subsystems: &[&str]) -> Self {
		let dir = tempfile::tempdir().unwrap();
		for subsystem in subsystems {
			fs::create_dir(dir.path().join(subsystem)).unwrap();
		}
		Self {
			subsystems: subsystems.iter().map(|s| s.to_string()).collect(),
			dir,
		}
	}

	pub fn root(&self) -> &Path {
		self.dir.path()
	}

	/// A coordinator for hierarchy `name` joining every fixture subsystem.
	pub fn coordinator(&self, name: &str) -> Coordinator {
		let subsystems: Vec<&str> = self.subsystems.iter().map(String::as_str).collect();
		coordinator_under(self.root(), &subsystems, name)
	}

	/// Creates the empty `tasks` files the kernel would provide.
	pub fn seed_tasks(&self, name: &str) {
		for subsystem in &self.subsystems {
			fs::write(self.tasks(subsystem, name), "").unwrap();
		}
	}

	pub fn tasks(&self, subsystem: &str, name: &str) -> PathBuf {
		self.root().join(subsystem).join(name).join("tasks")
	}

	pub fn read_tasks(&self, subsystem: &str, name: &str) -> Vec<u32> {
		fs::read_to_string(self.tasks(subsystem, name))
			.unwrap()
			.lines()
			.map(|line| line.parse().unwrap())
			.collect()
	}
}

/// A coordinator for hierarchy `name` joining `subsystems` mounted under `root`.
pub fn coordinator_under(root: &Path, subsystems: &[&str], name: &str) -> Coordinator {
	let mut params = ParameterSet::new();
	for subsystem in subsystems {
		params.join(subsystem);
	}
	Coordinator::new(Hierarchy::new(name, mounts_under(root, subsystems), params))
}
