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

use thiserror::Error;

use crate::attach::AttachError;
use crate::launch::LaunchError;

#[derive(Debug, Error)]
pub enum Error {
	/// One of the kernel listings (`/proc/cgroups`, `/proc/mounts`) could not be read.
	#[error("failed to build cgroup fs mount point map from {}: {source}", path.display())]
	Discovery {
		path: PathBuf,
		#[source]
		source: io::Error,
	},

	#[error("subsystem '{0}' is not mounted")]
	SubsystemNotMounted(String),

	#[error("failed to create hierarchy {}: {source}", path.display())]
	HierarchyCreate {
		path: PathBuf,
		#[source]
		source: io::Error,
	},

	/// Reading a mandatory parameter from the parent hierarchy failed.
	#[error("failed to inherit {}: {source}", path.display())]
	ParameterRead {
		path: PathBuf,
		#[source]
		source: io::Error,
	},

	#[error("failed to write {}: {source}", path.display())]
	ParameterWrite {
		path: PathBuf,
		#[source]
		source: io::Error,
	},

	/// A termination signal tore the hierarchy down before the target started.
	#[error("interrupted before the target started")]
	Interrupted,

	#[error(transparent)]
	Launch(#[from] LaunchError),

	#[error(transparent)]
	Attach(#[from] AttachError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
