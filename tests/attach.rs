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

mod common;

use std::path::Path;
use std::process::Child;
use std::process::Command;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;
use std::time::Instant;

use cgrun::attach::attach;
use cgrun::attach::descendants;
use cgrun::attach::AttachError;
use cgrun::attach::AttachOptions;
use cgrun::Error;
use common::Fixture;

fn options(recursive: bool) -> AttachOptions {
	AttachOptions {
		recursive,
		poll_interval: Duration::from_millis(20),
		..AttachOptions::default()
	}
}

/// Reaps `child` in the background so that its pid disappears on exit.
fn reap(mut child: Child) -> JoinHandle<()> {
	thread::spawn(move || {
		child.wait().unwrap();
	})
}

/// Starts a shell with two sleeping children and waits until both exist.
fn spawn_tree() -> (u32, Vec<u32>, JoinHandle<()>) {
	let child = Command::new("sh").args(["-c", "sleep 1 & sleep 1 & wait"]).spawn().unwrap();
	let pid = child.id();
	let reaper = reap(child);
	let deadline = Instant::now() + Duration::from_secs(5);
	loop {
		let children = descendants(Path::new("/proc"), pid).unwrap();
		if children.len() == 2 {
			return (pid, children, reaper);
		}
		assert!(Instant::now() < deadline, "children of {pid} never appeared");
		thread::sleep(Duration::from_millis(10));
	}
}

#[test]
fn test_attach_waits_for_exit() {
	let fixture = Fixture::new(&["cpu", "freezer"]);
	let coordinator = fixture.coordinator("a1b2");
	coordinator.create().unwrap();
	fixture.seed_tasks("a1b2");

	let child = Command::new("sleep").arg("0.3").spawn().unwrap();
	let pid = child.id();
	let reaper = reap(child);
	let started = Instant::now();
	attach(&coordinator, pid, &options(false)).unwrap();
	assert!(started.elapsed() >= Duration::from_millis(200));
	reaper.join().unwrap();

	assert!(coordinator.state().has_started());
	assert_eq!(fixture.read_tasks("cpu", "a1b2"), [pid]);
	assert_eq!(fixture.read_tasks("freezer", "a1b2"), [pid]);
}

#[test]
fn test_attach_only_target() {
	let fixture = Fixture::new(&["cpu"]);
	let coordinator = fixture.coordinator("a1b2");
	coordinator.create().unwrap();
	fixture.seed_tasks("a1b2");

	let (pid, _children, reaper) = spawn_tree();
	attach(&coordinator, pid, &options(false)).unwrap();
	reaper.join().unwrap();
	assert_eq!(fixture.read_tasks("cpu", "a1b2"), [pid]);
}

#[test]
fn test_attach_recursive() {
	let fixture = Fixture::new(&["cpu"]);
	let coordinator = fixture.coordinator("a1b2");
	coordinator.create().unwrap();
	fixture.seed_tasks("a1b2");

	let (pid, children, reaper) = spawn_tree();
	attach(&coordinator, pid, &options(true)).unwrap();
	reaper.join().unwrap();

	let tasks = fixture.read_tasks("cpu", "a1b2");
	assert_eq!(tasks[0], pid);
	let mut joined = tasks[1..].to_vec();
	joined.sort_unstable();
	let mut expected = children;
	expected.sort_unstable();
	assert_eq!(joined, expected);
}

#[test]
fn test_attach_without_tasks_file() {
	let fixture = Fixture::new(&["cpu"]);
	let coordinator = fixture.coordinator("a1b2");
	coordinator.create().unwrap();

	let child = Command::new("sleep").arg("5").spawn().unwrap();
	let pid = child.id();
	let result = attach(&coordinator, pid, &options(false));
	let mut child = child;
	child.kill().unwrap();
	child.wait().unwrap();

	match result {
		Err(Error::Attach(AttachError::JoinTasks { pid: failed, .. })) => assert_eq!(failed, pid),
		other => panic!("unexpected result: {other:?}"),
	}
	assert!(!coordinator.state().has_started());
}

#[test]
fn test_attach_invalid_pid() {
	let fixture = Fixture::new(&["cpu"]);
	let coordinator = fixture.coordinator("a1b2");
	coordinator.create().unwrap();
	fixture.seed_tasks("a1b2");
	assert!(matches!(
		attach(&coordinator, 0, &options(false)),
		Err(Error::Attach(AttachError::InvalidPid(0)))
	));
	assert!(fixture.read_tasks("cpu", "a1b2").is_empty());
}
