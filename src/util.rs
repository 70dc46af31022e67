use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;

/// Filesystem-safe lesson title: every non-alphanumeric character becomes '_'.
/// Idempotent; two distinct titles may collide, which is tolerated.
pub fn file_escape(s: &str) -> String {
	s.chars().map(|c| if c.is_ascii_alphanumeric() { c } else { '_' }).collect()
}

/// Course directory name: replace characters that upset filesystems, keep the rest.
pub fn dir_escape(s: &str) -> String {
	s.chars()
		.map(|c| if r#"&/\#,+()$~%.'":*?<>{}"#.contains(c) { '_' } else { c })
		.collect::<String>()
		.trim()
		.to_owned()
}

/// Never errors: any problem probing the path counts as "not there", so a
/// doubtful artifact is re-downloaded rather than silently skipped.
pub async fn exists(path: &Path) -> bool {
	fs::metadata(path).await.is_ok()
}

pub async fn create_dir(path: &Path) -> Result<()> {
	if !exists(path).await {
		fs::create_dir_all(path)
			.await
			.with_context(|| format!("failed to create {}", path.display()))?;
	}
	Ok(())
}

/// Stage into a .part file next to the target, then rename. A failed write
/// never truncates an already complete artifact.
pub async fn write_file_atomic(path: &Path, data: &[u8]) -> Result<()> {
	let mut staging = path.as_os_str().to_owned();
	staging.push(".part");
	let staging = PathBuf::from(staging);
	fs::write(&staging, data)
		.await
		.with_context(|| format!("failed to write {}", staging.display()))?;
	fs::rename(&staging, path)
		.await
		.with_context(|| format!("failed to move {} into place", staging.display()))?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn file_escape_replaces_everything_but_alphanumerics() {
		assert_eq!(file_escape("Intro to Rust!"), "Intro_to_Rust_");
		assert_eq!(file_escape("Što je ovo?"), "_to_je_ovo_");
	}

	#[test]
	fn file_escape_is_idempotent() {
		let once = file_escape("A/B: C?");
		assert_eq!(file_escape(&once), once);
	}

	#[test]
	fn dir_escape_strips_punctuation() {
		assert_eq!(dir_escape("Grokking the Coding Interview: Patterns"), "Grokking the Coding Interview_ Patterns");
		assert_eq!(dir_escape(" Rust/Programming "), "Rust_Programming");
	}

	#[tokio::test]
	async fn exists_is_false_for_missing_paths() {
		assert!(!exists(Path::new("/definitely/not/a/real/path")).await);
	}

	#[tokio::test]
	async fn atomic_write_leaves_no_staging_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("1.Intro.pdf");
		write_file_atomic(&path, b"content").await.unwrap();
		assert_eq!(std::fs::read(&path).unwrap(), b"content");
		assert!(!dir.path().join("1.Intro.pdf.part").exists());
	}

	#[tokio::test]
	async fn atomic_write_replaces_existing_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("lesson.mhtml");
		write_file_atomic(&path, b"first").await.unwrap();
		write_file_atomic(&path, b"second").await.unwrap();
		assert_eq!(std::fs::read(&path).unwrap(), b"second");
	}
}
