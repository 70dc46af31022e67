// SPDX-License-Identifier: GPL-3.0-or-later

use anyhow::{Context, Result};
use indicatif::{ProgressDrawTarget, ProgressStyle};
use structopt::StructOpt;
use tokio::fs;

use std::process;
use std::sync::atomic::Ordering;

#[macro_use]
mod cli;
use cli::*;
mod browser;
mod cleanup;
mod download;
mod educative;
mod errors;
mod queue;
mod util;

use educative::Educative;
use errors::Error;
use queue::{Outcome, Tally};

#[tokio::main]
async fn main() {
	let opt = Opt::from_args();
	match real_main(opt).await {
		Ok(tally) => {
			if tally.failed > 0 {
				warning!(format => "{} of {} lessons failed, re-run to retry them", tally.failed, tally.total());
			}
			success!("Done: {} saved, {} skipped, {} failed", tally.saved, tally.skipped, tally.failed);
		},
		Err(e) => {
			let auth_failure = e.downcast_ref::<Error>().map(|x| matches!(x, Error::Auth(_))).unwrap_or(false);
			error!(e);
			process::exit(if auth_failure { 77 } else { 1 });
		},
	}
}

async fn real_main(mut opt: Opt) -> Result<Tally> {
	LOG_LEVEL.store(opt.verbose, Ordering::SeqCst);
	#[cfg(windows)]
	let _ = colored::control::set_virtual_terminal(true);

	util::create_dir(&opt.output).await.context("failed to create output directory")?;
	// use UNC paths on Windows (to avoid the default max. path length of 255)
	opt.output = fs::canonicalize(opt.output).await.context("failed to canonicalize output directory")?;

	let mut educative = Educative::new(opt).await?;
	let result = run(&mut educative).await;
	// release the shared browser session before reporting
	if let Err(e) = educative.close().await {
		warning!(e);
	}
	result
}

async fn run(educative: &mut Educative) -> Result<Tally> {
	authenticate(educative).await?;
	// capture mode relaunches the instance, it must not race the login above
	educative.enter_capture_mode().await?;

	let course = educative.fetch_course().await?;
	let course_dir = educative.opt.output.join(&course.title);
	util::create_dir(&course_dir).await?;
	for language in &educative.opt.languages {
		util::create_dir(&course_dir.join(language)).await?;
	}

	let items = download::work_items(&course, &educative.opt.languages);

	PROGRESS_BAR_ENABLED.store(atty::is(atty::Stream::Stdout), Ordering::SeqCst);
	if PROGRESS_BAR_ENABLED.load(Ordering::SeqCst) {
		PROGRESS_BAR.set_draw_target(ProgressDrawTarget::stderr_nohz());
		PROGRESS_BAR.set_style(ProgressStyle::default_bar().template("[{pos}/{len}] {wide_msg}"));
		PROGRESS_BAR.set_length(items.len() as u64);
		PROGRESS_BAR.set_message(course.title.clone());
	}

	let outcomes = {
		let educative = &*educative;
		let course_dir = &course_dir;
		queue::drain(items, educative.opt.jobs, |item| async move {
			let label = item.label();
			let outcome = match download::download_lesson(educative, course_dir, &item).await {
				Ok(outcome) => outcome,
				Err(e) => {
					// only the per-item kinds can come out of the pipeline
					debug_assert!(e.recoverable());
					let reason = e.to_string();
					error!("Failed {}", label; anyhow::Error::new(e));
					Outcome::Failed(reason)
				},
			};
			match &outcome {
				Outcome::Skipped => log!(1, "{} already downloaded", label),
				Outcome::Saved => log!(0, "Saved {}", label),
				Outcome::Failed(_) => {},
			}
			if PROGRESS_BAR_ENABLED.load(Ordering::SeqCst) {
				PROGRESS_BAR.inc(1);
				PROGRESS_BAR.set_message(label);
			}
			outcome
		})
		.await
	};

	if PROGRESS_BAR_ENABLED.load(Ordering::SeqCst) {
		PROGRESS_BAR.finish_with_message("done");
	}

	let mut tally = Tally::default();
	for outcome in &outcomes {
		tally.record(outcome);
	}
	Ok(tally)
}

async fn authenticate(educative: &Educative) -> Result<()> {
	if educative.opt.skip_login {
		info!("Skipping login check");
		return Ok(());
	}
	match educative.is_logged_in().await {
		Ok(true) => {
			info!("Already logged in");
			return Ok(());
		},
		Ok(false) => {},
		Err(e) => warning!(e),
	}
	let (user, pass) = ask_user_pass(&educative.opt).context("credentials input failed")?;
	educative.login(&user, &pass).await?;
	Ok(())
}
