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

//! This package runs programs inside short-lived control groups on Linux hosts using the per-subsystem (cgroups v1) hierarchies.
//!
//! A run creates a hierarchy with a generated name under every requested subsystem, applies the requested parameters, and then either:
//!
//! - launches a program that is a member of the hierarchy before its first instruction ([`launch`]), or
//! - seizes a running process, optionally with all its descendants, and waits for it to exit ([`attach`]).
//!
//! The hierarchy is removed when the target finishes, when setup fails, or when the tool is interrupted before the target starts ([`cleanup`]).
//!
//! The generated hierarchy name is printed on stderr so that scripts can find the hierarchy while it exists.

pub mod attach;
mod cgroup;
pub mod cleanup;
mod error;
mod hierarchy;
pub mod launch;
mod mounts;
pub mod name;
pub mod params;

pub use cgroup::write_pid;
pub use cgroup::CGroup;
pub use cleanup::Coordinator;
pub use error::Error;
pub use error::Result;
pub use hierarchy::Hierarchy;
pub use mounts::ProcSources;
pub use mounts::SubsystemMountMap;
pub use params::Parameter;
pub use params::ParameterSet;
