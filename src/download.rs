// SPDX-License-Identifier: GPL-3.0-or-later

use std::path::{Path, PathBuf};

use chromiumoxide::cdp::browser_protocol::emulation::SetEmulatedMediaParams;
use chromiumoxide::cdp::browser_protocol::page::{CaptureSnapshotFormat, CaptureSnapshotParams, PrintToPdfParams};
use chromiumoxide::Page;

use crate::cli::SaveFormat;
use crate::educative::{Course, Educative};
use crate::errors::Error;
use crate::queue::Outcome;
use crate::util;

/// One downloadable unit: a lesson, optionally pinned to a language variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
	pub index: usize,
	pub title: String,
	pub link: String,
	pub language: Option<String>,
}

impl WorkItem {
	pub fn label(&self) -> String {
		match &self.language {
			Some(language) => format!("{}.{} [{}]", self.index, self.title, language),
			None => format!("{}.{}", self.index, self.title),
		}
	}
}

/// Expands the discovered lesson list into the work queue. Without language
/// variants this is one item per lesson; with variants it is one full pass per
/// language, each restarting the sequence index at 1.
pub fn work_items(course: &Course, languages: &[String]) -> Vec<WorkItem> {
	let mut items = Vec::new();
	if languages.is_empty() {
		for (i, lesson) in course.lessons.iter().enumerate() {
			items.push(WorkItem {
				index: i + 1,
				title: lesson.title.clone(),
				link: lesson.link.clone(),
				language: None,
			});
		}
	} else {
		for language in languages {
			for (i, lesson) in course.lessons.iter().enumerate() {
				items.push(WorkItem {
					index: i + 1,
					title: lesson.title.clone(),
					link: lesson.link.clone(),
					language: Some(language.clone()),
				});
			}
		}
	}
	items
}

/// `<course dir>/[<language>/]<index>.<normalized title>.<ext>`. The existence
/// of this file is the completion record, there is no separate manifest.
pub fn destination(course_dir: &Path, item: &WorkItem, format: SaveFormat) -> PathBuf {
	let mut path = course_dir.to_path_buf();
	if let Some(language) = &item.language {
		path.push(language);
	}
	path.push(format!("{}.{}.{}", item.index, util::file_escape(&item.title), format.extension()));
	path
}

/// The artifact on disk is the completion record: skip when it is already
/// there, unless `force` re-downloads everything.
pub async fn should_skip(path: &Path, force: bool) -> bool {
	!force && util::exists(path).await
}

/// Existence check, fetch, write. Any error is per-item: the caller records it
/// and the rest of the window is unaffected.
pub async fn download_lesson(educative: &Educative, course_dir: &Path, item: &WorkItem) -> Result<Outcome, Error> {
	let path = destination(course_dir, item, educative.opt.save_as);
	if should_skip(&path, educative.opt.force).await {
		return Ok(Outcome::Skipped);
	}
	log!(0, "Downloading => {} ({})", item.label(), item.link);

	let fetch_error = |cause: anyhow::Error| Error::Fetch { url: item.link.clone(), cause };
	let page = educative.session.new_page().await.map_err(fetch_error)?;
	let result = fetch_and_save(educative, &page, item, &path).await;
	if let Err(e) = page.close().await {
		warning!(1; "failed to close tab for {}: {}", item.label(), e);
	}
	result.map(|()| Outcome::Saved)
}

async fn fetch_and_save(educative: &Educative, page: &Page, item: &WorkItem, path: &Path) -> Result<(), Error> {
	let fetch_error = |cause: anyhow::Error| Error::Fetch { url: item.link.clone(), cause };
	educative.goto(page, &item.link).await.map_err(fetch_error)?;

	let mut steps = crate::cleanup::pipeline(educative.opt.save_as);
	if let Some(language) = &item.language {
		steps.insert(0, crate::cleanup::select_language(language));
	}
	crate::cleanup::apply(page, &steps).await;

	match educative.opt.save_as {
		SaveFormat::Pdf => save_pdf(page, path).await,
		SaveFormat::Archive => save_archive(page, path).await,
	}
}

/// Print-to-PDF: screen media, zero margins, backgrounds included.
async fn save_pdf(page: &Page, path: &Path) -> Result<(), Error> {
	let write_error = |cause: anyhow::Error| Error::Write { path: path.to_path_buf(), cause };
	page.execute(SetEmulatedMediaParams::builder().media("screen").build())
		.await
		.map_err(|e| write_error(e.into()))?;
	let params = PrintToPdfParams::builder()
		.print_background(true)
		.margin_top(0.0)
		.margin_bottom(0.0)
		.margin_left(0.0)
		.margin_right(0.0)
		.paper_width(8.27)
		.paper_height(11.7)
		.build();
	let data = page.pdf(params).await.map_err(|e| write_error(e.into()))?;
	util::write_file_atomic(path, &data).await.map_err(write_error)
}

/// Single-file MHTML snapshot of the live document.
async fn save_archive(page: &Page, path: &Path) -> Result<(), Error> {
	let write_error = |cause: anyhow::Error| Error::Write { path: path.to_path_buf(), cause };
	let snapshot = page
		.execute(CaptureSnapshotParams::builder().format(CaptureSnapshotFormat::Mhtml).build())
		.await
		.map_err(|e| write_error(e.into()))?;
	util::write_file_atomic(path, snapshot.result.data.as_bytes())
		.await
		.map_err(write_error)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::educative::Lesson;

	fn course() -> Course {
		Course {
			title: "Ace the Interview".into(),
			lessons: vec![
				Lesson { title: "Intro".into(), link: "https://example.com/1".into() },
				Lesson { title: "Setup".into(), link: "https://example.com/2".into() },
				Lesson { title: "Deploy".into(), link: "https://example.com/3".into() },
			],
		}
	}

	#[test]
	fn work_items_are_numbered_from_one() {
		let items = work_items(&course(), &[]);
		assert_eq!(items.len(), 3);
		assert_eq!(items[0].index, 1);
		assert_eq!(items[0].label(), "1.Intro");
		assert_eq!(items[2].index, 3);
		assert_eq!(items[2].title, "Deploy");
	}

	#[test]
	fn work_items_run_one_pass_per_language() {
		let items = work_items(&course(), &["javascript".into(), "python".into()]);
		assert_eq!(items.len(), 6);
		// sequence restarts for each language
		assert_eq!(items[0].index, 1);
		assert_eq!(items[0].language.as_deref(), Some("javascript"));
		assert_eq!(items[3].index, 1);
		assert_eq!(items[3].language.as_deref(), Some("python"));
	}

	#[test]
	fn destination_layout() {
		let item = WorkItem { index: 1, title: "Intro".into(), link: String::new(), language: None };
		let path = destination(Path::new("downloads/Ace the Interview"), &item, SaveFormat::Pdf);
		assert_eq!(path, Path::new("downloads/Ace the Interview/1.Intro.pdf"));
	}

	#[test]
	fn destination_includes_language_subdirectory() {
		let item = WorkItem {
			index: 2,
			title: "Two Pointers".into(),
			link: String::new(),
			language: Some("python".into()),
		};
		let path = destination(Path::new("out"), &item, SaveFormat::Archive);
		assert_eq!(path, Path::new("out/python/2.Two_Pointers.mhtml"));
	}

	#[tokio::test]
	async fn pre_existing_artifact_is_skipped_without_fetching() {
		let dir = tempfile::tempdir().unwrap();
		let item = WorkItem { index: 1, title: "Intro".into(), link: String::new(), language: None };
		let path = destination(dir.path(), &item, SaveFormat::Pdf);
		assert!(!should_skip(&path, false).await);
		std::fs::write(&path, b"%PDF").unwrap();
		assert!(should_skip(&path, false).await);
	}

	#[tokio::test]
	async fn force_overrides_the_skip_check() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("1.Intro.pdf");
		std::fs::write(&path, b"%PDF").unwrap();
		assert!(!should_skip(&path, true).await);
	}

	#[test]
	fn destination_normalizes_the_title_only() {
		let item = WorkItem { index: 10, title: "What's next?".into(), link: String::new(), language: None };
		let path = destination(Path::new("out"), &item, SaveFormat::Pdf);
		assert_eq!(path, Path::new("out/10.What_s_next_.pdf"));
	}
}
