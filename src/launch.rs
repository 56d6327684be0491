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

//! Runs a new program inside the hierarchy.
//!
//! The program must be a member of the hierarchy before its first instruction.
//! The tool therefore starts a second copy of its own executable in helper
//! mode ([`HELPER_COMMAND`]), which writes its own pid into every `tasks` file
//! and then replaces itself with the program through `execvp`, keeping the pid,
//! the environment and the standard streams.

use std::convert::Infallible;
use std::env;
use std::ffi::CString;
use std::ffi::OsString;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::path::PathBuf;
use std::process;
use std::process::Command;
use std::process::ExitStatus;
use std::process::Stdio;

use nix::errno::Errno;
use nix::unistd::execvp;
use thiserror::Error;
use tracing::debug;

use crate::cgroup;
use crate::cleanup::Coordinator;
use crate::error::Result;

/// Subcommand selecting the helper routine in a re-executed copy of the tool.
pub const HELPER_COMMAND: &str = "__join-exec";

/// Exit status of the helper when it cannot reach the target program.
pub const EXIT_HELPER_FAILED: i32 = 127;

#[derive(Debug, Error)]
pub enum LaunchError {
	#[error("failed to locate own executable: {0}")]
	CurrentExe(#[source] io::Error),

	#[error("failed to start helper {}: {source}", helper.display())]
	Spawn { helper: PathBuf, source: io::Error },

	#[error("failed to wait for the target: {0}")]
	Wait(#[source] io::Error),

	#[error("no command to execute")]
	EmptyCommand,

	#[error("argument contains a NUL byte: {0:?}")]
	NulByte(OsString),

	#[error("can't write pid to {}: {source}", path.display())]
	JoinTasks { path: PathBuf, source: io::Error },

	#[error("can't exec '{}': {source}", program.to_string_lossy())]
	Exec { program: OsString, source: Errno },
}

/// The helper routine: join every listed cgroup, then become `argv`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinAndExec {
	pub tasks: Vec<PathBuf>,
	pub argv: Vec<OsString>,
}

impl JoinAndExec {
	/// Command line selecting this routine in a fresh copy of the tool.
	pub fn to_args(&self) -> Vec<OsString> {
		let mut args = vec![OsString::from(HELPER_COMMAND)];
		for path in &self.tasks {
			args.push("--tasks".into());
			args.push(path.into());
		}
		args.push("--".into());
		args.extend(self.argv.iter().cloned());
		args
	}

	/// Joins the cgroups and replaces the current process image. Returns only on failure.
	pub fn run(self) -> Result<Infallible, LaunchError> {
		let argv = self
			.argv
			.iter()
			.map(|arg| CString::new(arg.as_bytes()).map_err(|_| LaunchError::NulByte(arg.clone())))
			.collect::<Result<Vec<CString>, LaunchError>>()?;
		let program = argv.first().ok_or(LaunchError::EmptyCommand)?;

		let pid = process::id();
		for path in &self.tasks {
			cgroup::write_pid(path, pid).map_err(|source| LaunchError::JoinTasks {
				path: path.clone(),
				source,
			})?;
		}

		execvp(program, &argv).map_err(|source| LaunchError::Exec {
			program: self.argv[0].clone(),
			source,
		})
	}
}

/// Runs `argv` inside the hierarchy and returns its exit code.
pub fn launch(coordinator: &Coordinator, argv: &[OsString]) -> Result<i32> {
	let helper = env::current_exe().map_err(LaunchError::CurrentExe)?;
	launch_with_helper(coordinator, &helper, argv)
}

/// Like [`launch`], with `helper` as the executable that understands [`HELPER_COMMAND`].
pub fn launch_with_helper(coordinator: &Coordinator, helper: &Path, argv: &[OsString]) -> Result<i32> {
	if argv.is_empty() {
		return Err(LaunchError::EmptyCommand.into());
	}
	let join = JoinAndExec {
		tasks: coordinator.hierarchy().task_files()?,
		argv: argv.to_vec(),
	};
	debug!(?join, helper = %helper.display(), "starting helper");

	let mut child = coordinator.start(|| {
		Command::new(helper)
			.args(join.to_args())
			.stdin(Stdio::inherit())
			.stdout(Stdio::inherit())
			.stderr(Stdio::inherit())
			.spawn()
			.map_err(|source| {
				crate::Error::from(LaunchError::Spawn {
					helper: helper.to_path_buf(),
					source,
				})
			})
	})?;
	eprintln!("{}", coordinator.hierarchy().name());

	let status = child.wait().map_err(LaunchError::Wait)?;
	debug!(%status, "target exited");
	Ok(exit_code(status))
}

/// Exit code a shell would report for `status`: the code itself, or 128 plus
/// the number of the terminating signal.
pub fn exit_code(status: ExitStatus) -> i32 {
	status
		.code()
		.or_else(|| status.signal().map(|signal| 128 + signal))
		.unwrap_or(1)
}
