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

/// Parameters the kernel requires before any other write, per subsystem.
///
/// Their values are copied from the parent cgroup.
pub const MANDATORY_PARAMETERS: &[(&str, &[&str])] = &[("cpuset", &["cpus", "mems"])];

pub fn mandatory_parameters(subsystem: &str) -> &'static [&'static str] {
	MANDATORY_PARAMETERS
		.iter()
		.find(|(name, _)| *name == subsystem)
		.map(|(_, params)| *params)
		.unwrap_or_default()
}

/// One `subsystem.parameter=value` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
	pub subsystem: String,
	pub name: String,
	pub value: String,
}

impl Parameter {
	/// File name of the parameter inside a cgroup directory.
	pub fn file_name(&self) -> String {
		format!("{}.{}", self.subsystem, self.name)
	}
}

/// Parses `subsystem.parameter=value`, such as `cpu.shares=512`.
///
/// The value is kept verbatim, including any `=` or `,` it contains.
pub fn parse_key_value(input: &str) -> Result<Parameter, &'static str> {
	let (key, value) = input.split_once('=').ok_or("expected key=value")?;
	if !key
		.chars()
		.all(|c| matches!(c, '_' | '.' | 'a'..='z' | '0'..='9'))
	{
		return Err("key contains invalid characters");
	}
	let (subsystem, name) = key
		.split_once('.')
		.filter(|(subsystem, name)| !subsystem.is_empty() && !name.is_empty())
		.ok_or("key must be of the form SUBSYSTEM.PARAMETER")?;
	Ok(Parameter {
		subsystem: subsystem.to_string(),
		name: name.to_string(),
		value: value.to_string(),
	})
}

pub fn parse_subsystem(input: &str) -> Result<String, &'static str> {
	if input.is_empty() || !input.chars().all(|c| matches!(c, '_' | 'a'..='z' | '0'..='9')) {
		return Err("subsystem names contain only lowercase letters, digits and '_'");
	}
	Ok(input.to_string())
}

/// Requested parameter values, grouped by subsystem.
///
/// Every subsystem present in the set gets a directory in the hierarchy, even
/// one registered through [`ParameterSet::join`] without any parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterSet(BTreeMap<String, BTreeMap<String, String>>);

impl ParameterSet {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn join(&mut self, subsystem: &str) {
		self.0.entry(subsystem.to_string()).or_default();
	}

	/// Records a parameter; a later value for the same key replaces the earlier one.
	pub fn insert(&mut self, parameter: Parameter) {
		self.0
			.entry(parameter.subsystem)
			.or_default()
			.insert(parameter.name, parameter.value);
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn subsystems(&self) -> impl Iterator<Item = &str> {
		self.0.keys().map(String::as_str)
	}

	pub fn parameters<'a>(&'a self, subsystem: &str) -> impl Iterator<Item = (&'a str, &'a str)> {
		self.0
			.get(subsystem)
			.into_iter()
			.flatten()
			.map(|(name, value)| (name.as_str(), value.as_str()))
	}
}

impl Extend<Parameter> for ParameterSet {
	fn extend<T: IntoIterator<Item = Parameter>>(&mut self, iter: T) {
		for parameter in iter {
			self.insert(parameter);
		}
	}
}

impl FromIterator<Parameter> for ParameterSet {
	fn from_iter<T: IntoIterator<Item = Parameter>>(iter: T) -> Self {
		let mut set = Self::new();
		set.extend(iter);
		set
	}
}
