// SPDX-License-Identifier: GPL-3.0-or-later

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize};

use anyhow::{anyhow, Context, Result};
use indicatif::ProgressBar;
use once_cell::sync::Lazy;
use structopt::StructOpt;

#[derive(Debug, Clone, StructOpt)]
#[structopt(name = env!("CARGO_PKG_NAME"))]
pub struct Opt {
	/// Course overview page to download
	#[structopt(long)]
	pub course_url: String,

	/// Output directory
	#[structopt(short, long, parse(from_os_str), default_value = "downloads")]
	pub output: PathBuf,

	/// Lessons downloaded concurrently
	#[structopt(short, long, default_value = "5")]
	pub jobs: usize,

	/// Per-lesson navigation timeout in milliseconds
	#[structopt(long, default_value = "30000")]
	pub timeout: u64,

	/// Lesson output format: "pdf" or "html" (single-file MHTML archive)
	#[structopt(long, default_value = "pdf")]
	pub save_as: SaveFormat,

	/// Capture these language variants, e.g. -l javascript,python
	#[structopt(short, long, use_delimiter = true)]
	pub languages: Vec<String>,

	/// Assume the browser profile is already logged in
	#[structopt(long)]
	pub skip_login: bool,

	/// Re-download already present lessons
	#[structopt(short)]
	pub force: bool,

	/// Keep the capture browser headless (no visible window)
	#[structopt(long)]
	pub headless: bool,

	/// Browser profile directory, cookies persist here
	#[structopt(long, parse(from_os_str))]
	pub user_data: Option<PathBuf>,

	/// Attach to a running browser, e.g. ws://127.0.0.1:9222
	#[structopt(long)]
	pub remote_debugging_url: Option<String>,

	/// Account email
	#[structopt(short = "U", long)]
	pub username: Option<String>,

	/// Account password
	#[structopt(short = "P", long)]
	pub password: Option<String>,

	/// Verbose logging
	#[structopt(short, multiple = true, parse(from_occurrences))]
	pub verbose: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveFormat {
	/// Print-to-PDF with screen media emulation.
	Pdf,
	/// Single-file MHTML snapshot of the live page.
	Archive,
}

impl SaveFormat {
	pub fn extension(self) -> &'static str {
		match self {
			SaveFormat::Pdf => "pdf",
			SaveFormat::Archive => "mhtml",
		}
	}
}

impl FromStr for SaveFormat {
	type Err = anyhow::Error;

	fn from_str(s: &str) -> Result<Self> {
		match s {
			"pdf" => Ok(SaveFormat::Pdf),
			"html" | "mhtml" => Ok(SaveFormat::Archive),
			other => Err(anyhow!("unknown format {:?}, expected pdf or html", other)),
		}
	}
}

pub static LOG_LEVEL: AtomicUsize = AtomicUsize::new(0);
pub static PROGRESS_BAR_ENABLED: AtomicBool = AtomicBool::new(false);
pub static PROGRESS_BAR: Lazy<ProgressBar> = Lazy::new(|| ProgressBar::new(0));

macro_rules! log {
	($lvl:expr, $($t:expr),+) => {{
		#[allow(unused_imports)]
		use colored::Colorize as _;
		#[allow(unused_comparisons)] // 0 <= 0
		if $lvl <= crate::cli::LOG_LEVEL.load(std::sync::atomic::Ordering::SeqCst) {
			if crate::cli::PROGRESS_BAR_ENABLED.load(std::sync::atomic::Ordering::SeqCst) {
				crate::cli::PROGRESS_BAR.println(format!($($t),+));
			} else {
				println!($($t),+);
			}
		}
	}}
}

macro_rules! info {
	($t:tt) => {
		log!(0, $t);
	};
}

macro_rules! success {
	($($t:expr),+) => {
		log!(0, "{}", format!($($t),+).bright_green());
	};
}

macro_rules! warning {
	($e:expr) => {{
		log!(0, "Warning: {}", format!("{:?}", $e).bright_yellow());
	}};
	(format => $($e:expr),+) => {{
		log!(0, "Warning: {}", format!($($e),+).bright_yellow());
	}};
	($lvl:expr; $($e:expr),+) => {{
		log!($lvl, "Warning: {}", format!($($e),+).bright_yellow());
	}};
}

macro_rules! error {
	($($prefix:expr),+; $e:expr) => {
		log!(0, "{}: {}", format!($($prefix),+), format!("{:?}", $e).bright_red());
	};
	($e:expr) => {
		log!(0, "Error: {}", format!("{:?}", $e).bright_red());
	};
}

pub fn ask_user_pass(opt: &Opt) -> Result<(String, String)> {
	let user = if let Some(username) = opt.username.as_ref() {
		username.clone()
	} else {
		rprompt::prompt_reply_stdout("Email: ").context("email prompt")?
	};
	let pass = if let Some(password) = opt.password.as_ref() {
		password.clone()
	} else {
		rpassword::read_password_from_tty(Some("Password: ")).context("password prompt")?
	};
	Ok((user, pass))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn save_format_parsing() {
		assert_eq!("pdf".parse::<SaveFormat>().unwrap(), SaveFormat::Pdf);
		assert_eq!("html".parse::<SaveFormat>().unwrap(), SaveFormat::Archive);
		assert_eq!("mhtml".parse::<SaveFormat>().unwrap(), SaveFormat::Archive);
		assert!("docx".parse::<SaveFormat>().is_err());
	}

	#[test]
	fn save_format_extensions() {
		assert_eq!(SaveFormat::Pdf.extension(), "pdf");
		assert_eq!(SaveFormat::Archive.extension(), "mhtml");
	}
}
