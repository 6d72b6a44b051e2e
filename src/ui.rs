//! Terminal progress display: a stage-labelled bar plus coloured outcome
//! lines.
//!
//! Uses `indicatif` for the bar and `console` for colour. [`JobProgress`]
//! follows the published pipeline states of a single job.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use mirrorworld::pipeline::{JobReport, PipelineState, PipelineStage};
use mirrorworld::{GeneratedAssets, PipelineError};

/// Visual progress of one job in the terminal.
pub struct JobProgress {
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
}

impl JobProgress {
    /// Start the bar for the given photo and return the progress instance.
    pub fn start(photo: &str) -> Self {
        let pb = ProgressBar::new(100);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style.progress_chars("=> "));
        pb.set_message(format!("{}: {photo}", PipelineStage::Uploading.description()));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Reflect a published state on the bar.
    pub fn update(&self, state: &PipelineState) {
        let stage = state.stage();
        self.pb.set_position((state.progress() * 100.0).round() as u64);
        self.pb.set_message(format!(
            "[{}/{}] {}",
            stage.position(),
            PipelineStage::ALL.len() - 1,
            stage.description()
        ));
    }

    /// Stop the bar and print the outcome.
    pub fn complete(&self, result: &Result<GeneratedAssets, PipelineError>) {
        self.pb.finish_and_clear();
        match result {
            Ok(assets) => {
                println!("  {} Avatar ready: {}", self.green.apply_to("✓"), assets.model_url);
            }
            Err(PipelineError::Cancelled) => {
                println!("  {} Cancelled", self.yellow.apply_to("↻"));
            }
            Err(err) => {
                println!("  {} {}", self.red.apply_to("✗"), hint(err));
            }
        }
    }

    /// Print the job report as pretty JSON.
    pub fn print_report(&self, report: &JobReport) {
        let style = match report.final_state.error() {
            None => &self.green,
            Some(PipelineError::Cancelled) => &self.yellow,
            Some(_) => &self.red,
        };
        println!();
        println!("{}", style.apply_to("─── Job Report ───"));
        println!(
            "{}",
            serde_json::to_string_pretty(report).unwrap_or_default()
        );
    }
}

/// User-facing message for each failure kind.
pub fn hint(err: &PipelineError) -> String {
    match err {
        PipelineError::ImageEncodingFailed(reason) => {
            format!("Photo rejected ({reason}); try a smaller JPEG or PNG")
        }
        PipelineError::UploadFailed(cause) => {
            format!("Avatar service unavailable ({cause}); retry later")
        }
        PipelineError::Timeout => "Generation took too long; retry later".to_string(),
        PipelineError::ServerReported(message) => format!("Generation failed: {message}"),
        PipelineError::Cancelled => "Cancelled".to_string(),
    }
}
