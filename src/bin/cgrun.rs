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

use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use anyhow::Context;
use cgrun::attach;
use cgrun::attach::AttachOptions;
use cgrun::launch;
use cgrun::launch::JoinAndExec;
use cgrun::launch::EXIT_HELPER_FAILED;
use cgrun::launch::HELPER_COMMAND;
use cgrun::name;
use cgrun::params::parse_key_value;
use cgrun::params::parse_subsystem;
use cgrun::Coordinator;
use cgrun::Hierarchy;
use cgrun::Parameter;
use cgrun::ParameterSet;
use cgrun::SubsystemMountMap;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use tracing::debug;
use tracing_subscriber::filter::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "Runs programs in a volatile control group hierarchy (cgroups v1)")]
struct Cli {
	/// Log filter used when RUST_LOG is not set.
	#[arg(long, global = true, default_value = "warn")]
	log_level: String,

	#[command(subcommand)]
	command: Command,
}

#[derive(Args, Debug)]
struct HierarchyArgs {
	/// Parent hierarchy, relative to each subsystem mount point. Mandatory parameters such as "cpuset.cpus" are inherited from it.
	#[arg(long, default_value = "/")]
	parent: String,

	/// Subsystem to join without setting any parameter, such as "freezer".
	#[arg(short = 's', long = "subsystem", value_name = "SUBSYSTEM", value_parser = parse_subsystem)]
	subsystems: Vec<String>,
}

#[derive(Args, Debug)]
struct RunCommand {
	#[command(flatten)]
	hierarchy: HierarchyArgs,

	/// Parameters in subsystem.parameter=value format, such as "cpu.shares=512".
	#[arg(value_parser = parse_key_value)]
	params: Vec<Parameter>,

	/// The program to run and its arguments, after "--".
	#[arg(last = true, required = true)]
	cmd: Vec<OsString>,
}

#[derive(Args, Debug)]
struct SeizeCommand {
	#[command(flatten)]
	hierarchy: HierarchyArgs,

	/// Process ID to move into the hierarchy.
	#[arg(short, long, value_parser = clap::value_parser!(u32).range(1..))]
	pid: u32,

	/// Also move every descendant of the process.
	#[arg(short, long)]
	recursive: bool,

	/// Milliseconds between checks whether the process is still alive.
	#[arg(long, value_name = "MS", default_value_t = 1000)]
	poll_interval: u64,

	/// Parameters in subsystem.parameter=value format, such as "cpu.shares=512".
	#[arg(value_parser = parse_key_value)]
	params: Vec<Parameter>,
}

#[derive(Args, Debug)]
struct JoinExecCommand {
	#[arg(long = "tasks", required = true)]
	tasks: Vec<PathBuf>,

	#[arg(last = true, required = true)]
	cmd: Vec<OsString>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Runs a program inside a new hierarchy
	Run(RunCommand),
	/// Moves a running process into a new hierarchy until it exits
	Seize(SeizeCommand),
	#[command(name = HELPER_COMMAND, hide = true)]
	JoinExec(JoinExecCommand),
}

enum Action {
	Launch(Vec<OsString>),
	Attach { pid: u32, options: AttachOptions },
}

fn init_logging(level: &str) {
	let filter = EnvFilter::try_from_default_env()
		.or_else(|_| EnvFilter::try_new(level))
		.unwrap_or_else(|_| EnvFilter::new("warn"));
	if let Err(e) = tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(io::stderr)
		.with_target(false)
		.try_init()
	{
		eprintln!("failed to init logger: {e}");
	}
}

fn execute(args: HierarchyArgs, params: Vec<Parameter>, action: Action) -> anyhow::Result<i32> {
	let mut params: ParameterSet = params.into_iter().collect();
	for subsystem in &args.subsystems {
		params.join(subsystem);
	}
	if params.is_empty() {
		bail!("no subsystem requested; pass SUBSYSTEM.PARAMETER=VALUE or --subsystem SUBSYSTEM");
	}

	let mounts = SubsystemMountMap::resolve()?;
	let name = name::hierarchy_name(&args.parent, &name::generate_name());
	let coordinator = Arc::new(Coordinator::new(Hierarchy::new(name, mounts, params)));
	coordinator.install().context("failed to install signal handler")?;
	coordinator.create().context("failed to setup cgroup hierarchy")?;

	let result = match action {
		Action::Launch(argv) => launch::launch(&coordinator, &argv).context("failed to execute command"),
		Action::Attach { pid, options } => attach::attach(&coordinator, pid, &options)
			.map(|()| 0)
			.with_context(|| format!("failed to seize process {pid}")),
	};
	coordinator.teardown();
	result
}

fn main() {
	let cli = Cli::parse();
	init_logging(&cli.log_level);
	debug!(?cli, "parsed command line");

	let result = match cli.command {
		Command::JoinExec(cmd) => {
			let join = JoinAndExec {
				tasks: cmd.tasks,
				argv: cmd.cmd,
			};
			match join.run() {
				Ok(never) => match never {},
				Err(e) => {
					eprintln!("cgrun: {e}");
					process::exit(EXIT_HELPER_FAILED);
				}
			}
		}
		Command::Run(cmd) => execute(cmd.hierarchy, cmd.params, Action::Launch(cmd.cmd)),
		Command::Seize(cmd) => {
			let options = AttachOptions {
				recursive: cmd.recursive,
				poll_interval: Duration::from_millis(cmd.poll_interval),
				..AttachOptions::default()
			};
			execute(cmd.hierarchy, cmd.params, Action::Attach { pid: cmd.pid, options })
		}
	};

	match result {
		Ok(code) => process::exit(code),
		Err(e) => {
			eprintln!("cgrun: {e:#}");
			process::exit(1);
		}
	}
}

#[cfg(test)]
fn cli(input: &str) -> Result<Cli, clap::Error> {
	Cli::try_parse_from(shlex::split(input).unwrap())
}

#[test]
fn test_cli_run() {
	insta::assert_debug_snapshot!(cli("cgrun run cpu.shares=512 cpuset.cpus=0-1 -- sleep 1").unwrap(), @r###"
	Cli {
	    log_level: "warn",
	    command: Run(
	        RunCommand {
	            hierarchy: HierarchyArgs {
	                parent: "/",
	                subsystems: [],
	            },
	            params: [
	                Parameter {
	                    subsystem: "cpu",
	                    name: "shares",
	                    value: "512",
	                },
	                Parameter {
	                    subsystem: "cpuset",
	                    name: "cpus",
	                    value: "0-1",
	                },
	            ],
	            cmd: [
	                "sleep",
	                "1",
	            ],
	        },
	    ),
	}
	"###);
	insta::assert_debug_snapshot!(cli("cgrun run --parent /jobs/ -s freezer -- sh -c 'exit 7'").unwrap(), @r###"
	Cli {
	    log_level: "warn",
	    command: Run(
	        RunCommand {
	            hierarchy: HierarchyArgs {
	                parent: "/jobs/",
	                subsystems: [
	                    "freezer",
	                ],
	            },
	            params: [],
	            cmd: [
	                "sh",
	                "-c",
	                "exit 7",
	            ],
	        },
	    ),
	}
	"###);
	insta::assert_debug_snapshot!(cli("cgrun run cpu.shares=2 -- env A=B --flag").unwrap(), @r###"
	Cli {
	    log_level: "warn",
	    command: Run(
	        RunCommand {
	            hierarchy: HierarchyArgs {
	                parent: "/",
	                subsystems: [],
	            },
	            params: [
	                Parameter {
	                    subsystem: "cpu",
	                    name: "shares",
	                    value: "2",
	                },
	            ],
	            cmd: [
	                "env",
	                "A=B",
	                "--flag",
	            ],
	        },
	    ),
	}
	"###);
	assert!(cli("cgrun").is_err());
	assert!(cli("cgrun run cpu.shares=512").is_err());
	assert!(cli("cgrun run cpu.shares=512 sleep 1").is_err());
	assert!(cli("cgrun run shares=512 -- sleep 1").is_err());
	assert!(cli("cgrun run -s cpu.shares -- sleep 1").is_err());
}

#[test]
fn test_cli_seize() {
	insta::assert_debug_snapshot!(cli("cgrun seize --pid 42 -r cpuset.mems=0").unwrap(), @r###"
	Cli {
	    log_level: "warn",
	    command: Seize(
	        SeizeCommand {
	            hierarchy: HierarchyArgs {
	                parent: "/",
	                subsystems: [],
	            },
	            pid: 42,
	            recursive: true,
	            poll_interval: 1000,
	            params: [
	                Parameter {
	                    subsystem: "cpuset",
	                    name: "mems",
	                    value: "0",
	                },
	            ],
	        },
	    ),
	}
	"###);
	insta::assert_debug_snapshot!(cli("cgrun --log-level debug seize -p 7 --poll-interval 50 -s cpu").unwrap(), @r###"
	Cli {
	    log_level: "debug",
	    command: Seize(
	        SeizeCommand {
	            hierarchy: HierarchyArgs {
	                parent: "/",
	                subsystems: [
	                    "cpu",
	                ],
	            },
	            pid: 7,
	            recursive: false,
	            poll_interval: 50,
	            params: [],
	        },
	    ),
	}
	"###);
	assert!(cli("cgrun seize cpu.shares=512").is_err());
	assert!(cli("cgrun seize --pid 0 cpu.shares=512").is_err());
	assert!(cli("cgrun seize --pid abc cpu.shares=512").is_err());
}

#[test]
fn test_cli_join_exec() {
	insta::assert_debug_snapshot!(cli("cgrun __join-exec --tasks /a/tasks --tasks /b/tasks -- sh -c 'exit 7'").unwrap(), @r###"
	Cli {
	    log_level: "warn",
	    command: JoinExec(
	        JoinExecCommand {
	            tasks: [
	                "/a/tasks",
	                "/b/tasks",
	            ],
	            cmd: [
	                "sh",
	                "-c",
	                "exit 7",
	            ],
	        },
	    ),
	}
	"###);
	assert!(cli("cgrun __join-exec -- true").is_err());
	assert!(cli("cgrun __join-exec --tasks /a/tasks").is_err());
}

#[test]
fn test_cli_helper_round_trip() {
	let join = JoinAndExec {
		tasks: vec!["/sys/fs/cgroup/cpu/x/tasks".into()],
		argv: vec!["true".into()],
	};
	let mut args = vec![OsString::from("cgrun")];
	args.extend(join.to_args());
	let Command::JoinExec(cmd) = Cli::try_parse_from(args).unwrap().command else {
		panic!("helper command not recognized");
	};
	assert_eq!(cmd.tasks, join.tasks);
	assert_eq!(cmd.cmd, join.argv);
}
