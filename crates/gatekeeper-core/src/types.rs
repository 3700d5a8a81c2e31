//! Common types

use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;

use serde::{Deserialize, Serialize};

/// Identity string used to key tracking and ban state for a client.
///
/// Usually an IP address, but it is treated as an opaque token: whatever the
/// identity resolver selected is used verbatim. The empty string is the
/// sentinel for a connection without any usable address.
#[derive(Clone, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(Box<str>);

impl ClientId {
	pub fn new(id: impl Into<Box<str>>) -> Self {
		Self(id.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for ClientId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl Deref for ClientId {
	type Target = str;

	fn deref(&self) -> &str {
		&self.0
	}
}

impl Borrow<str> for ClientId {
	fn borrow(&self) -> &str {
		&self.0
	}
}

impl AsRef<str> for ClientId {
	fn as_ref(&self) -> &str {
		&self.0
	}
}

impl From<&str> for ClientId {
	fn from(id: &str) -> Self {
		Self(id.into())
	}
}

impl From<String> for ClientId {
	fn from(id: String) -> Self {
		Self(id.into_boxed_str())
	}
}


// vim: ts=4
