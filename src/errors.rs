use std::path::PathBuf;

use thiserror::Error;

/// Failure taxonomy of a download run. `Auth` and `Discovery` are fatal and
/// abort before the batch starts; `Fetch` and `Write` are recorded for the
/// offending lesson while the batch continues.
#[derive(Debug, Error)]
pub enum Error {
	#[error("authentication failed: {0}")]
	Auth(String),

	#[error("lesson discovery failed: {0}")]
	Discovery(String),

	#[error("failed to fetch {url}: {cause:#}")]
	Fetch { url: String, cause: anyhow::Error },

	#[error("failed to write {}: {cause:#}", path.display())]
	Write { path: PathBuf, cause: anyhow::Error },
}

impl Error {
	pub fn recoverable(&self) -> bool {
		matches!(self, Error::Fetch { .. } | Error::Write { .. })
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn fatal_vs_recoverable() {
		assert!(!Error::Auth("wrong password".into()).recoverable());
		assert!(!Error::Discovery("no lessons".into()).recoverable());
		assert!(Error::Fetch {
			url: "https://example.com/lesson".into(),
			cause: anyhow::anyhow!("timeout"),
		}
		.recoverable());
		assert!(Error::Write {
			path: PathBuf::from("1.Intro.pdf"),
			cause: anyhow::anyhow!("disk full"),
		}
		.recoverable());
	}

	#[test]
	fn fetch_error_names_the_locator() {
		let e = Error::Fetch {
			url: "https://example.com/lesson/3".into(),
			cause: anyhow::anyhow!("navigation timed out"),
		};
		let msg = e.to_string();
		assert!(msg.contains("https://example.com/lesson/3"));
		assert!(msg.contains("navigation timed out"));
	}
}
