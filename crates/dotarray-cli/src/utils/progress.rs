use dotarray::engine::progress::{Progress, ProgressCallback};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

const TEMPLATE: &str = "{msg} [{bar:40.cyan/blue}] {pos}/{len} points ({eta})";

/// A terminal bar counting solved gate-voltage points.
///
/// The bar is cheap to clone and every clone drives the same display, so the callback can be
/// invoked concurrently by the batch workers.
#[derive(Clone)]
pub struct SweepProgress {
    bar: ProgressBar,
}

impl SweepProgress {
    pub fn new() -> Self {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    fn with_target(target: ProgressDrawTarget) -> Self {
        let style = ProgressStyle::with_template(TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-");
        let bar = ProgressBar::with_draw_target(Some(0), target).with_style(style);
        Self { bar }
    }

    pub fn callback(&self) -> ProgressCallback<'static> {
        let bar = self.bar.clone();
        Box::new(move |event| match event {
            Progress::PhaseStart { name } => bar.set_message(name),
            Progress::TaskStart { total_steps } => {
                bar.set_length(total_steps);
                bar.set_position(0);
            }
            Progress::TaskAdvance { steps } => bar.inc(steps),
            Progress::TaskFinish => {}
            Progress::PhaseFinish => bar.finish(),
        })
    }
}

impl Default for SweepProgress {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn hidden() -> SweepProgress {
        SweepProgress::with_target(ProgressDrawTarget::hidden())
    }

    #[test]
    fn callback_counts_points_of_a_sweep() {
        let progress = hidden();
        let callback = progress.callback();

        callback(Progress::PhaseStart {
            name: "Ground State",
        });
        callback(Progress::TaskStart { total_steps: 200 });
        callback(Progress::TaskAdvance { steps: 64 });
        callback(Progress::TaskAdvance { steps: 64 });
        assert_eq!(progress.bar.message(), "Ground State");
        assert_eq!(progress.bar.length(), Some(200));
        assert_eq!(progress.bar.position(), 128);
        assert!(!progress.bar.is_finished());

        callback(Progress::TaskFinish);
        callback(Progress::PhaseFinish);
        assert!(progress.bar.is_finished());
    }

    #[test]
    fn callback_is_shareable_across_worker_threads() {
        let progress = hidden();
        let callback = Arc::new(progress.callback());
        callback(Progress::TaskStart { total_steps: 40 });

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let callback = Arc::clone(&callback);
                thread::spawn(move || {
                    for _ in 0..10 {
                        callback(Progress::TaskAdvance { steps: 1 });
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(progress.bar.position(), 40);
    }
}
