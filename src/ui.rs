use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use lane_signal::LaneResult;

#[derive(Clone, Copy, Debug)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

impl UiMode {
    pub fn parse(flag: &str) -> Self {
        match flag {
            "plain" => UiMode::Plain,
            "pretty" => UiMode::Pretty,
            _ => UiMode::Auto,
        }
    }
}

/// Per-lane progress: a bar on a TTY, `==>` lines otherwise.
pub struct LaneProgress {
    bar: Option<ProgressBar>,
}

impl LaneProgress {
    pub fn new(mode: UiMode, is_tty: bool, disable_pretty: bool, lanes: usize) -> Self {
        let pretty = is_tty
            && match mode {
                UiMode::Pretty => true,
                UiMode::Auto => !disable_pretty,
                UiMode::Plain => false,
            };
        if !pretty {
            return Self { bar: None };
        }
        let bar = ProgressBar::with_draw_target(Some(lanes as u64), ProgressDrawTarget::stderr());
        let style = ProgressStyle::with_template("{bar:30} {pos}/{len} lanes {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        Self { bar: Some(bar) }
    }

    pub fn lane_done(&self, lane: &LaneResult) {
        let line = format!(
            "lane {}: {} vehicles, green {}s",
            lane.lane_id, lane.total, lane.green_time
        );
        match &self.bar {
            Some(bar) => {
                bar.set_message(line);
                bar.inc(1);
            }
            None => eprintln!("==> {}", line),
        }
    }

    pub fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}
