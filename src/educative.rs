// SPDX-License-Identifier: GPL-3.0-or-later

use std::time::Duration;

use anyhow::{Context, Result};
use chromiumoxide::Page;
use scraper::Html;
use tokio::time;
use url::Url;

use crate::browser::{Mode, Session};
use crate::cli::Opt;
use crate::errors::Error;
use crate::util::dir_escape;

use self::selectors::*;

pub const BASE_URL: &str = "https://www.educative.io";

pub struct Educative {
	pub opt: Opt,
	pub session: Session,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lesson {
	pub title: String,
	pub link: String,
}

#[derive(Debug)]
pub struct Course {
	pub title: String,
	pub lessons: Vec<Lesson>,
}

impl Educative {
	pub async fn new(opt: Opt) -> Result<Self> {
		let session = Session::launch(&opt).await?;
		Ok(Educative { opt, session })
	}

	/// A logged-in session is redirected from the landing page to /learn.
	pub async fn is_logged_in(&self) -> Result<bool> {
		log!(1, "Checking login state");
		let page = self.session.page().await?;
		self.goto(&page, BASE_URL).await?;
		let url = page.url().await?.unwrap_or_default();
		Ok(url.trim_end_matches('/').ends_with("/learn"))
	}

	pub async fn login(&self, user: &str, pass: &str) -> Result<(), Error> {
		let auth = |e: anyhow::Error| Error::Auth(format!("{:#}", e));
		info!("Logging into educative..");
		let page = self.session.page().await.map_err(auth)?;
		self.goto(&page, BASE_URL).await.map_err(auth)?;
		if !click_labelled_button(&page, "MuiButton-label", "Log in").await.map_err(auth)? {
			return Err(Error::Auth("login button not found".into()));
		}
		// the modal and its recaptcha need a moment to initialize
		time::sleep(Duration::from_millis(2000)).await;
		type_into(&page, "[name=email]", user).await.map_err(auth)?;
		type_into(&page, "[name=password]", pass).await.map_err(auth)?;
		if !click_labelled_button(&page, "MuiButton-label", "Login").await.map_err(auth)? {
			return Err(Error::Auth("login form submit button not found".into()));
		}
		let status = self
			.session
			.wait_for_element(&page, ".b-status-control span", Duration::from_secs(10))
			.await
			.map_err(|_| Error::Auth("no login status shown".into()))?;
		let label = status.inner_text().await.ok().flatten().unwrap_or_default();
		if label == "Logging in..." {
			let settled = time::timeout(Duration::from_millis(self.opt.timeout), page.wait_for_navigation()).await;
			if let Ok(Ok(_)) = settled {
				success!("Logged in!");
				return Ok(());
			}
		}
		if label.is_empty() {
			Err(Error::Auth("unknown login failure".into()))
		} else {
			Err(Error::Auth(label))
		}
	}

	/// Loads the course overview and collects the ordered lesson list from the
	/// rendered page.
	pub async fn fetch_course(&self) -> Result<Course, Error> {
		let discovery = |e: anyhow::Error| Error::Discovery(format!("{:#}", e));
		log!(0, "Navigating to course page {}", self.opt.course_url);
		let page = self.session.page().await.map_err(discovery)?;
		self.goto(&page, &self.opt.course_url).await.map_err(discovery)?;

		let title = page.get_title().await.map_err(|e| discovery(e.into()))?.unwrap_or_default();
		let title = dir_escape(&title);
		if title.is_empty() {
			return Err(Error::Discovery("course page has no title".into()));
		}

		log!(0, "Looking for lesson urls");
		let html = page.content().await.map_err(|e| discovery(e.into()))?;
		let html = Html::parse_document(&html);
		let base = Url::parse(&self.opt.course_url)
			.context("invalid course URL")
			.map_err(discovery)?;
		let mut lessons = Vec::new();
		for link in html.select(&LESSON_LINKS) {
			let href = match link.value().attr("href") {
				Some(href) => href,
				None => continue,
			};
			let lesson_title = link.text().collect::<String>().trim().to_owned();
			if lesson_title.is_empty() {
				continue;
			}
			let link = base
				.join(href)
				.with_context(|| format!("invalid lesson href {}", href))
				.map_err(discovery)?
				.to_string();
			lessons.push(Lesson { title: lesson_title, link });
		}
		if lessons.is_empty() {
			return Err(Error::Discovery(format!("no lesson links found on {}", self.opt.course_url)));
		}
		log!(0, "Total lessons: {}", lessons.len());
		Ok(Course { title, lessons })
	}

	pub async fn enter_capture_mode(&mut self) -> Result<()> {
		self.session.switch_mode(Mode::Capture).await
	}

	pub async fn goto(&self, page: &Page, url: &str) -> Result<()> {
		self.session.navigate(page, url, self.opt.timeout).await
	}

	pub async fn close(self) -> Result<()> {
		self.session.close().await
	}
}

/// Clicks the first element of `class` whose markup equals `label`. The login
/// form has no stable ids, only Material UI class names.
async fn click_labelled_button(page: &Page, class: &str, label: &str) -> Result<bool> {
	let script = format!(
		r#"(() => {{
			const elements = document.getElementsByClassName('{}');
			for (const element of elements) {{
				if (element.innerHTML === '{}') {{
					element.click();
					return true;
				}}
			}}
			return false;
		}})()"#,
		class, label
	);
	let result = page.evaluate(script).await?;
	Ok(result.into_value::<bool>()?)
}

async fn type_into(page: &Page, selector: &str, text: &str) -> Result<()> {
	page.find_element(selector)
		.await
		.with_context(|| format!("{} not found", selector))?
		.click()
		.await?
		.type_str(text)
		.await?;
	Ok(())
}

#[allow(non_upper_case_globals)]
pub mod selectors {
	use once_cell::sync::Lazy;
	use scraper::Selector;
	// construct CSS selectors once
	pub static LESSON_LINKS: Lazy<Selector> = Lazy::new(|| Selector::parse(".tab-content a").unwrap());
}
