use anyhow::Result;
use cliclack::{input, spinner};
use console::style;

use shield::diagnostics::{ApiRecord, CallStatus};
use shield::effects::{SideEffectAction, TurnOutcome};

#[derive(Debug, PartialEq)]
pub enum Input {
    /// Text for the agent
    Message(String),
    Command(Command),
    /// Nothing to do, ask again
    AskAgain,
    Exit,
}

#[derive(Debug, PartialEq)]
pub enum Command {
    Mute,
    Unmute,
    Listen,
    StopListening,
    Region(Option<String>),
    Log,
    Brief(String),
    Help,
}

/// Classify one line of operator input
pub fn parse_input(line: &str) -> Input {
    let text = line.trim();
    if text.is_empty() {
        return Input::AskAgain;
    }
    if !text.starts_with('/') {
        return Input::Message(text.to_string());
    }

    let (command, rest) = match text.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (text, ""),
    };
    match command.to_ascii_lowercase().as_str() {
        "/exit" | "/quit" => Input::Exit,
        "/mute" => Input::Command(Command::Mute),
        "/unmute" => Input::Command(Command::Unmute),
        "/listen" => Input::Command(Command::Listen),
        "/stop" => Input::Command(Command::StopListening),
        "/region" if rest.is_empty() => Input::Command(Command::Region(None)),
        "/region" => Input::Command(Command::Region(Some(rest.to_string()))),
        "/log" => Input::Command(Command::Log),
        "/brief" if !rest.is_empty() => Input::Command(Command::Brief(rest.to_string())),
        "/?" | "/help" => Input::Command(Command::Help),
        _ => Input::Command(Command::Help),
    }
}

pub struct CliclackPrompt {
    spinner: Option<cliclack::ProgressBar>,
}

impl CliclackPrompt {
    pub fn new() -> Self {
        CliclackPrompt { spinner: None }
    }

    pub fn get_input(&mut self, region: &str) -> Result<Input> {
        let label = format!("Shield [{}]            [Help: /?]", region.to_uppercase());
        let text: String = input(label).placeholder("").interact()?;
        Ok(parse_input(&text))
    }

    pub fn show_busy(&mut self) {
        let busy = spinner();
        busy.start("Shield is working...");
        self.spinner = Some(busy);
    }

    pub fn hide_busy(&mut self) {
        if let Some(busy) = self.spinner.take() {
            busy.stop("");
        }
    }
}

pub fn render_greeting(greeting: &str, suggestions: &[&str]) {
    println!("{}", style(greeting).green().bold());
    println!("{}", style("Try:").dim());
    for suggestion in suggestions {
        println!("  {}", style(suggestion).cyan());
    }
    println!();
}

pub fn render_outcome(outcome: &TurnOutcome) {
    println!("{} {}", style("Shield:").green().bold(), outcome.text);
}

pub fn render_action(action: &SideEffectAction, applied: bool) {
    match action {
        SideEffectAction::Navigate(region) if applied => {
            println!("{}", style(format!("Map switched to {}", region.to_uppercase())).cyan())
        }
        SideEffectAction::Navigate(region) => {
            println!("{}", style(format!("Ignored navigation to {}", region)).yellow())
        }
        SideEffectAction::Alert(notice) => {
            println!(
                "{} {} [{}] {}",
                style("ALERT").red().bold(),
                notice.districts.join(", "),
                notice.languages.join("/"),
                notice.message
            );
        }
    }
}

pub fn render_error(text: &str) {
    println!("{} {}", style("Shield:").red().bold(), text);
}

pub fn render_notice(text: &str) {
    println!("{}", style(text).dim());
}

pub fn render_records(records: &[ApiRecord]) {
    if records.is_empty() {
        render_notice("No calls recorded yet.");
        return;
    }
    for record in records {
        let status = match record.status {
            CallStatus::Success => style(record.status.to_string()).green(),
            CallStatus::Failure => style(record.status.to_string()).red(),
        };
        println!(
            "{} {:<24} {:<8} {:>6}ms  {}",
            record.timestamp.format("%H:%M:%S"),
            record.endpoint,
            status,
            record.latency_ms,
            record.details
        );
    }
}

pub fn render_help() {
    println!("Commands:");
    println!("/exit - Exit the session");
    println!("/mute, /unmute - Silence or restore spoken replies");
    println!("/listen - Capture one spoken phrase and submit it");
    println!("/stop - Stop listening");
    println!("/region [id] - Show or switch the active basin");
    println!("/log - Show recent model and tool calls");
    println!("/brief <district> - Tactical summary for a district in the active basin");
    println!("/? - Display this help message");
}
