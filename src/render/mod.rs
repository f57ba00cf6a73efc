//! Terminal rendering for the CLI
//!
//! Turns alignment spans, analysis figures and ledger summaries into styled
//! terminal output. Strictly a consumer of the core: nothing in here feeds
//! back into the pipeline.

use crate::align::AlignmentSpan;
use crate::api::AnalysisResult;
use crate::ledger::{percent_saved, SessionLedger};
use crossterm::style::{Color, Stylize};
use indicatif::{ProgressBar, ProgressStyle};
use termimad::MadSkin;

/// Color assignments for the CLI.
struct Theme {
    kept: Color,
    removed: Color,
    stats: Color,
    dim: Color,
    error: Color,
    success: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            kept: Color::Reset,
            removed: Color::DarkRed,
            stats: Color::Cyan,
            dim: Color::DarkGrey,
            error: Color::Red,
            success: Color::Green,
        }
    }
}

/// Terminal renderer with markdown and styled output.
pub struct Renderer {
    theme: Theme,
    skin: MadSkin,
}

impl Renderer {
    pub fn new() -> Self {
        let theme = Theme::default();
        let mut skin = MadSkin::default();
        skin.inline_code.set_fg(to_termimad_color(Color::Green));
        skin.code_block.set_fg(to_termimad_color(Color::Green));
        Self { theme, skin }
    }

    /// Print the original text with removed portions struck out.
    pub fn render_highlight(&self, title: &str, spans: &[AlignmentSpan]) {
        println!("  {}", title.with(self.theme.dim));
        print!("  ");
        for span in spans {
            if span.matched {
                print!("{}", span.text.as_str().with(self.theme.kept));
            } else {
                print!("{}", span.text.as_str().with(self.theme.removed).crossed_out());
            }
        }
        println!();
        println!();
    }

    /// Render a complete answer, through the markdown skin when it looks
    /// like markdown.
    pub fn render_answer(&self, title: &str, content: &str, markdown: bool) {
        println!("  {}", title.with(self.theme.dim));
        if markdown && has_markdown_elements(content) {
            self.skin.print_text(content);
        } else {
            println!("{}", content);
        }
        println!();
    }

    /// One-line token/similarity summary after a scored submission.
    pub fn render_analysis_line(&self, analysis: &AnalysisResult, cached: bool) {
        let cache_info = if cached { " (cached)" } else { "" };
        println!(
            "  {} {} -> {} tokens ({:.1}% saved){} \u{00b7} cosine {:.2} \u{00b7} gpt {:.2}",
            "\u{2022}".with(self.theme.dim),
            format!("{}", analysis.original_tokens).with(self.theme.stats),
            format!("{}", analysis.optimized_tokens).with(self.theme.stats),
            percent_saved(analysis),
            cache_info.with(self.theme.dim),
            analysis.similarity_score_cosine,
            analysis.similarity_score_gpt,
        );
    }

    /// Session totals plus the scaled projection.
    pub fn render_ledger(&self, ledger: &SessionLedger, projection_factor: u64) {
        let projection = ledger.project(projection_factor);
        println!();
        println!("{}", ledger);
        println!(
            "  {} {} tokens / {:.1} W if {} prompts were optimized",
            "\u{2191}".with(self.theme.stats),
            projection.tokens,
            projection.energy,
            projection_factor,
        );
        println!();
    }

    pub fn render_error(&self, msg: &str) {
        println!(
            "  {} {}",
            "\u{2717}".with(self.theme.error),
            msg.with(self.theme.error)
        );
    }

    pub fn render_success(&self, msg: &str) {
        println!(
            "  {} {}",
            "\u{2713}".with(self.theme.success),
            msg.with(self.theme.success)
        );
    }

    pub fn render_info(&self, msg: &str) {
        println!("  {}", msg.with(self.theme.dim));
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

/// A spinner shown while a collaborator call is in flight.
pub struct WaitSpinner {
    bar: ProgressBar,
    active: bool,
}

impl WaitSpinner {
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("  {spinner:.green} {msg}")
                .unwrap()
                .tick_strings(&["\u{25cb}", "\u{25d4}", "\u{25d1}", "\u{25d5}", "\u{25cf}"]),
        );
        Self { bar, active: false }
    }

    pub fn start(&mut self, msg: &str) {
        self.bar.set_message(msg.to_string());
        self.bar
            .enable_steady_tick(std::time::Duration::from_millis(100));
        self.active = true;
    }

    /// Swap the message while the spinner keeps ticking.
    pub fn update(&self, msg: &str) {
        self.bar.set_message(msg.to_string());
    }

    pub fn stop(&mut self) {
        if self.active {
            self.bar.finish_and_clear();
            self.active = false;
        }
    }
}

impl Default for WaitSpinner {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for WaitSpinner {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Check if content has markdown elements worth rendering through the skin.
fn has_markdown_elements(content: &str) -> bool {
    content.contains("```")
        || content.contains("## ")
        || content.contains("# ")
        || content.contains("**")
        || content.contains("| ")
        || content.contains("- ")
}

/// Convert crossterm Color to termimad color.
fn to_termimad_color(color: Color) -> termimad::crossterm::style::Color {
    match color {
        Color::Green => termimad::crossterm::style::Color::Green,
        Color::Cyan => termimad::crossterm::style::Color::Cyan,
        Color::Red => termimad::crossterm::style::Color::Red,
        Color::DarkRed => termimad::crossterm::style::Color::DarkRed,
        Color::DarkGrey => termimad::crossterm::style::Color::DarkGrey,
        _ => termimad::crossterm::style::Color::Reset,
    }
}
