// SPDX-License-Identifier: GPL-3.0-or-later

//! Shared Chromium session. One instance per process: switching between the
//! headless login check and the capture window tears the old instance down and
//! relaunches on the same profile directory, so callers must finish
//! authentication before entering capture mode.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use chromiumoxide::{Browser, BrowserConfig, Element, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time;

use crate::cli::Opt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
	/// Plain headless instance, used to check the login state.
	Headless,
	/// Wide-viewport instance used for bulk capture. Visible by default so
	/// the site serves the human-scale layout.
	Capture,
}

pub struct Session {
	browser: Browser,
	handler: JoinHandle<()>,
	mode: Mode,
	user_data: PathBuf,
	headless_capture: bool,
	remote: bool,
}

const CHROME_PATHS: &[&str] = &[
	"/usr/bin/google-chrome",
	"/usr/bin/google-chrome-stable",
	"/usr/bin/chromium",
	"/usr/bin/chromium-browser",
	"/snap/bin/chromium",
	"/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
	"/Applications/Chromium.app/Contents/MacOS/Chromium",
];

const CHROME_NAMES: &[&str] = &["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"];

fn find_chrome() -> Result<PathBuf> {
	for path in CHROME_PATHS {
		let path = Path::new(path);
		if path.exists() {
			return Ok(path.to_path_buf());
		}
	}
	if let Some(path_var) = std::env::var_os("PATH") {
		if let Some(found) = find_in_path(CHROME_NAMES, &path_var) {
			return Ok(found);
		}
	}
	Err(anyhow!("Chrome/Chromium not found, install it or pass --remote-debugging-url"))
}

fn find_in_path(names: &[&str], path_var: &std::ffi::OsStr) -> Option<PathBuf> {
	for dir in std::env::split_paths(path_var) {
		for name in names {
			let candidate = dir.join(name);
			if candidate.is_file() {
				return Some(candidate);
			}
		}
	}
	None
}

async fn launch_instance(mode: Mode, user_data: &Path, headless_capture: bool) -> Result<(Browser, JoinHandle<()>)> {
	log!(1, "Launching browser in {:?} mode", mode);
	let mut builder = BrowserConfig::builder()
		.chrome_executable(find_chrome()?)
		.user_data_dir(user_data)
		.arg("--disable-blink-features=AutomationControlled")
		.arg("--no-first-run")
		.arg("--no-default-browser-check")
		.arg("--disable-dev-shm-usage");
	if mode == Mode::Capture {
		builder = builder.arg("--window-size=1920,1080");
		if !headless_capture {
			builder = builder.with_head();
		}
	}
	let config = builder.build().map_err(|e| anyhow!("failed to build browser config: {}", e))?;
	let (browser, handler) = Browser::launch(config).await.context("failed to launch browser")?;
	Ok((browser, spawn_handler(handler)))
}

async fn connect_remote(url: &str) -> Result<(Browser, JoinHandle<()>)> {
	log!(1, "Connecting to remote browser at {}", url);
	let http_url = url.replace("ws://", "http://").replace("wss://", "https://");
	let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));
	let version: serde_json::Value = reqwest::Client::new()
		.get(&version_url)
		.send()
		.await
		.context("failed to reach remote browser")?
		.json()
		.await
		.context("failed to parse remote browser version info")?;
	let ws_url = version
		.get("webSocketDebuggerUrl")
		.and_then(|v| v.as_str())
		.context("no webSocketDebuggerUrl in remote browser response")?;
	let (browser, handler) = Browser::connect(ws_url).await.context("failed to connect to remote browser")?;
	Ok((browser, spawn_handler(handler)))
}

fn spawn_handler(mut handler: chromiumoxide::Handler) -> JoinHandle<()> {
	tokio::spawn(async move {
		while let Some(event) = handler.next().await {
			if event.is_err() {
				break;
			}
		}
	})
}

/// Document readiness check, best-effort. Bounded so a broken page cannot
/// block its window forever.
const READY_STATE_SCRIPT: &str = r#"
	new Promise((resolve) => {
		if (document.readyState === 'complete' || document.readyState === 'interactive') {
			resolve(document.readyState);
		} else {
			document.addEventListener('DOMContentLoaded', () => resolve(document.readyState));
			setTimeout(() => resolve('timeout'), 10000);
		}
	})
"#;

impl Session {
	/// Starts the process-wide session in headless mode, or attaches to a
	/// remote debugger if one is configured.
	pub async fn launch(opt: &Opt) -> Result<Self> {
		let user_data = opt.user_data.clone().unwrap_or_else(|| opt.output.join(".browser-profile"));
		let remote = opt.remote_debugging_url.is_some();
		let (browser, handler) = if let Some(url) = opt.remote_debugging_url.as_ref() {
			connect_remote(url).await?
		} else {
			crate::util::create_dir(&user_data).await?;
			launch_instance(Mode::Headless, &user_data, opt.headless).await?
		};
		Ok(Session {
			browser,
			handler,
			mode: Mode::Headless,
			user_data,
			headless_capture: opt.headless,
			remote,
		})
	}

	/// Relaunches the instance in the requested mode. A remote instance cannot
	/// be relaunched, so only the bookkeeping changes there.
	pub async fn switch_mode(&mut self, mode: Mode) -> Result<()> {
		if self.mode == mode {
			return Ok(());
		}
		if self.remote {
			log!(1, "Remote browser stays as-is for {:?} mode", mode);
			self.mode = mode;
			return Ok(());
		}
		self.shutdown().await;
		let (browser, handler) = launch_instance(mode, &self.user_data, self.headless_capture).await?;
		self.browser = browser;
		self.handler = handler;
		self.mode = mode;
		Ok(())
	}

	/// First open page, or a fresh blank one.
	pub async fn page(&self) -> Result<Page> {
		if let Some(page) = self.browser.pages().await?.into_iter().next() {
			return Ok(page);
		}
		self.new_page().await
	}

	pub async fn new_page(&self) -> Result<Page> {
		Ok(self.browser.new_page("about:blank").await?)
	}

	/// Navigates and waits for quiescence under a hard deadline. A timeout is
	/// an error for this one navigation, never for the session.
	pub async fn navigate(&self, page: &Page, url: &str, timeout_ms: u64) -> Result<()> {
		log!(2, "Navigating to {}", url);
		time::timeout(Duration::from_millis(timeout_ms), async {
			page.goto(url).await?;
			page.wait_for_navigation().await?;
			Ok::<_, anyhow::Error>(())
		})
		.await
		.map_err(|_| anyhow!("navigation to {} timed out after {} ms", url, timeout_ms))?
		.with_context(|| format!("navigation to {} failed", url))?;
		if let Err(e) = page.evaluate(READY_STATE_SCRIPT).await {
			log!(2, "ready state check failed: {}", e);
		}
		// dynamically loaded widgets keep rendering briefly after the load event
		time::sleep(Duration::from_millis(500)).await;
		Ok(())
	}

	/// Polls for a selector until it appears or the deadline passes.
	pub async fn wait_for_element(&self, page: &Page, selector: &str, timeout: Duration) -> Result<Element> {
		let start = Instant::now();
		loop {
			if let Ok(element) = page.find_element(selector).await {
				return Ok(element);
			}
			if start.elapsed() >= timeout {
				return Err(anyhow!("timed out waiting for {}", selector));
			}
			time::sleep(Duration::from_millis(250)).await;
		}
	}

	pub async fn close(mut self) -> Result<()> {
		self.shutdown().await;
		Ok(())
	}

	async fn shutdown(&mut self) {
		if self.remote {
			// leave the externally owned instance running
			self.handler.abort();
			return;
		}
		if let Err(e) = self.browser.close().await {
			warning!(1; "failed to close browser: {}", e);
		}
		self.handler.abort();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn find_in_path_picks_the_first_match() {
		let dir = tempfile::tempdir().unwrap();
		let empty = tempfile::tempdir().unwrap();
		std::fs::write(dir.path().join("chromium"), b"#!/bin/sh\n").unwrap();
		let path_var = std::env::join_paths([empty.path(), dir.path()].iter()).unwrap();
		let found = find_in_path(CHROME_NAMES, &path_var).unwrap();
		assert_eq!(found, dir.path().join("chromium"));
	}

	#[test]
	fn find_in_path_ignores_directories_of_the_same_name() {
		let dir = tempfile::tempdir().unwrap();
		std::fs::create_dir(dir.path().join("chromium")).unwrap();
		let path_var = std::env::join_paths([dir.path()].iter()).unwrap();
		assert!(find_in_path(CHROME_NAMES, &path_var).is_none());
	}
}
