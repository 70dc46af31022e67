// SPDX-License-Identifier: GPL-3.0-or-later

//! DOM cleanup applied to a lesson page before export. Every step is
//! best-effort and idempotent: a missing element means the step reports false
//! and the fetch carries on, it never aborts the download.

use std::time::Duration;

use chromiumoxide::Page;
use tokio::time;

use crate::cli::SaveFormat;

pub struct Step {
	pub name: &'static str,
	script: String,
	/// Bounded wait after the step took effect, for steps that trigger a
	/// re-render the export must not race.
	pub settle_ms: u64,
}

/// Click every collapsed slide widget so its content is materialized.
fn expand_slides() -> Step {
	Step {
		name: "expand-slides",
		script: r#"(() => {
			const found = document.evaluate('//button[contains(@class, "AnimationPlus")]',
				document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
			for (let i = 0; i < found.snapshotLength; i++) {
				found.snapshotItem(i).click();
			}
			return found.snapshotLength > 0;
		})()"#
			.to_owned(),
		settle_ms: 0,
	}
}

/// Hide navigation, footer and the prev/next widgets, they are noise in the
/// saved artifact.
fn hide_chrome() -> Step {
	Step {
		name: "hide-chrome",
		script: r#"(() => {
			const style = document.createElement('style');
			style.textContent = 'div[class^="styles__PrevNextButtonWidgetStyled"], div[class^="styles__Footer"], nav { display: none !important; }';
			document.head.appendChild(style);
			return true;
		})()"#
			.to_owned(),
		settle_ms: 0,
	}
}

/// Strip the article header row. The PDF export keeps the page structure, the
/// archive export additionally re-parents the article body so the snapshot is
/// self-contained.
fn flatten_article(format: SaveFormat) -> Step {
	match format {
		SaveFormat::Pdf => Step {
			name: "flatten-article-pdf",
			script: r#"(() => {
				const node = document.getElementById('view-collection-article-content-root');
				if (!node || !node.childNodes[0] || !node.childNodes[0].childNodes[0]
					|| !node.childNodes[0].childNodes[0].childNodes[0]) {
					return false;
				}
				node.childNodes[0].childNodes[0].childNodes[0].remove();
				return true;
			})()"#
				.to_owned(),
			settle_ms: 0,
		},
		SaveFormat::Archive => Step {
			name: "flatten-article-archive",
			script: r#"(() => {
				const node = document.getElementById('view-collection-article-content-root');
				if (!node || !node.childNodes[0] || !node.childNodes[0].childNodes[0]) {
					return false;
				}
				const wrapper = node.childNodes[0].childNodes[0];
				if (!wrapper.childNodes[1] || !wrapper.childNodes[1].childNodes[0]
					|| !wrapper.childNodes[1].childNodes[0].childNodes[0]) {
					return false;
				}
				node.style.cssText = 'margin-top: -70px';
				const content = wrapper.childNodes[1].childNodes[0].childNodes[0];
				wrapper.childNodes[1].appendChild(content);
				wrapper.childNodes[0].remove();
				return true;
			})()"#
				.to_owned(),
			settle_ms: 0,
		},
	}
}

/// Select a language tab by its label, for courses with per-language variants.
pub fn select_language(language: &str) -> Step {
	let wanted = language.to_lowercase().replace('\'', "\\'");
	Step {
		name: "select-language",
		script: format!(
			r#"(() => {{
				const tabs = document.querySelectorAll('[role="tab"], .lang-tab');
				for (const tab of tabs) {{
					if (tab.innerText.trim().toLowerCase() === '{}') {{
						tab.click();
						return true;
					}}
				}}
				return false;
			}})()"#,
			wanted
		),
		// switching tabs re-renders every code pane on the page
		settle_ms: 1000,
	}
}

pub fn pipeline(format: SaveFormat) -> Vec<Step> {
	vec![expand_slides(), hide_chrome(), flatten_article(format)]
}

/// Runs every step, logging the ones that found nothing to do. Never fails.
pub async fn apply(page: &Page, steps: &[Step]) {
	for step in steps {
		match page.evaluate(step.script.as_str()).await {
			Ok(result) => {
				if result.value().and_then(|v| v.as_bool()) == Some(false) {
					log!(1, "cleanup step {} found no matching elements", step.name);
				} else {
					log!(2, "cleanup step {} applied", step.name);
					if step.settle_ms > 0 {
						time::sleep(Duration::from_millis(step.settle_ms)).await;
					}
				}
			},
			Err(e) => warning!(1; "cleanup step {} skipped: {}", step.name, e),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn pipeline_order_is_fixed() {
		let names = pipeline(SaveFormat::Pdf).iter().map(|s| s.name).collect::<Vec<_>>();
		assert_eq!(names, ["expand-slides", "hide-chrome", "flatten-article-pdf"]);
		let names = pipeline(SaveFormat::Archive).iter().map(|s| s.name).collect::<Vec<_>>();
		assert_eq!(names, ["expand-slides", "hide-chrome", "flatten-article-archive"]);
	}

	#[test]
	fn select_language_matches_case_insensitively() {
		let step = select_language("JavaScript");
		assert!(step.script.contains("'javascript'"));
	}

	#[test]
	fn only_the_language_switch_settles() {
		assert!(select_language("python").settle_ms > 0);
		for step in pipeline(SaveFormat::Pdf).iter().chain(pipeline(SaveFormat::Archive).iter()) {
			assert_eq!(step.settle_ms, 0, "{} must not delay the window", step.name);
		}
	}

	#[test]
	fn select_language_escapes_quotes() {
		let step = select_language("c'est");
		assert!(step.script.contains("c\\'est"));
	}

	#[test]
	fn steps_are_guarded_expressions() {
		// every script is an IIFE returning a bool-ish marker
		for step in pipeline(SaveFormat::Pdf) {
			assert!(step.script.trim_start().starts_with("(() =>"));
			assert!(step.script.contains("return"));
		}
	}
}
