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

use std::process;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use md5::Digest;
use md5::Md5;

/// Generates a name that is unique among concurrent invocations on this host.
pub fn generate_name() -> String {
	let secs = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_secs())
		.unwrap_or_default();
	name_for(secs, process::id())
}

/// The name generated at wall-clock second `secs` by process `pid`.
///
/// # Examples
///
/// ```
/// let a = cgrun::name::name_for(1700000000, 100);
/// let b = cgrun::name::name_for(1700000000, 101);
/// assert_ne!(a, b);
/// assert_eq!(a.len(), 32);
/// ```
pub fn name_for(secs: u64, pid: u32) -> String {
	let mut hasher = Md5::new();
	hasher.update(format!("{secs}:{pid}"));
	hex::encode(hasher.finalize())
}

/// Joins the parent prefix and the generated suffix into a hierarchy name.
///
/// Leading slashes of `parent` are dropped so the result stays relative to every
/// subsystem mount point. No separator is inserted: a parent of `"/"` yields the
/// bare suffix, while `"/jobs/"` yields `"jobs/<suffix>"`.
pub fn hierarchy_name(parent: &str, suffix: &str) -> String {
	format!("{}{suffix}", parent.trim_start_matches('/'))
}
