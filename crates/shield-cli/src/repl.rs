use std::sync::Arc;

use anyhow::Result;
use futures::StreamExt;
use tokio::task::JoinHandle;

use shield::briefing::analyze_risk;
use shield::effects::EffectReceiver;
use shield::hazard::{find_basin, CycloneTrackPoint, DistrictRisk, HazardData};
use shield::orchestrator::{Rejected, TurnState};
use shield::providers::base::Provider;
use shield::session::{GREETING, SUGGESTIONS};
use shield::SessionHandle;

use crate::prompt::{
    render_action, render_error, render_greeting, render_help, render_notice, render_outcome,
    render_records, CliclackPrompt, Command, Input,
};

/// Prints completed turns and applies their actions, typed or spoken alike
pub fn spawn_effect_listener(session: SessionHandle, mut receiver: EffectReceiver) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(outcome) = receiver.next().await {
            render_outcome(&outcome);
            if let Some(action) = &outcome.action {
                let applied = session.apply(action);
                render_action(action, applied);
            }
        }
    })
}

pub struct Repl {
    session: SessionHandle,
    /// Separate connection for briefings so they never contend with a turn
    briefing_provider: Box<dyn Provider>,
    hazards: Arc<dyn HazardData>,
    prompt: CliclackPrompt,
}

impl Repl {
    pub fn new(
        session: SessionHandle,
        briefing_provider: Box<dyn Provider>,
        hazards: Arc<dyn HazardData>,
    ) -> Self {
        Self {
            session,
            briefing_provider,
            hazards,
            prompt: CliclackPrompt::new(),
        }
    }

    pub async fn start(&mut self) -> Result<()> {
        render_greeting(GREETING, &SUGGESTIONS);

        loop {
            let region = self.session.active_region();
            match self.prompt.get_input(&region)? {
                Input::Message(text) => self.submit(&text).await,
                Input::Command(command) => self.run_command(command).await,
                Input::AskAgain => continue,
                Input::Exit => break,
            }
        }

        self.session.stop_listening();
        self.session.set_muted(true);
        Ok(())
    }

    async fn submit(&mut self, text: &str) {
        // a started turn runs until it completes or the model timeout fails it
        self.prompt.show_busy();
        let result = self.session.submit(text).await;
        self.prompt.hide_busy();

        match result {
            // the effect listener prints completed turns
            Ok(report) if report.state == TurnState::Completed => {}
            Ok(report) => render_error(&report.outcome.text),
            Err(Rejected::Busy) => {
                render_notice("Shield is still answering a spoken request, try again shortly.")
            }
            Err(Rejected::EmptyInput) => {}
        }
    }

    async fn run_command(&mut self, command: Command) {
        match command {
            Command::Mute => {
                self.session.set_muted(true);
                render_notice("Voice output muted.");
            }
            Command::Unmute => {
                self.session.set_muted(false);
                render_notice("Voice output on.");
            }
            Command::Listen => {
                if !self.session.voice_input_available() {
                    render_notice("Voice input is not configured. Set SHIELD_VOICE__LISTEN_COMMAND.");
                } else if self.session.start_listening() {
                    render_notice("Listening...");
                } else {
                    render_notice("Already listening.");
                }
            }
            Command::StopListening => {
                self.session.stop_listening();
                render_notice("Stopped listening.");
            }
            Command::Region(None) => {
                let region = self.session.active_region();
                match find_basin(&region) {
                    Some(basin) => render_notice(&format!(
                        "{} ({}), monitored by {}",
                        basin.name,
                        basin.id.to_uppercase(),
                        basin.agency
                    )),
                    None => render_notice(&region),
                }
            }
            Command::Region(Some(id)) => {
                if self.session.set_active_region(&id) {
                    render_notice(&format!("Active region is now {}", id.to_uppercase()));
                } else {
                    render_error(&format!("Unknown basin '{}'", id));
                }
            }
            Command::Log => render_records(&self.session.diagnostics().recent()),
            Command::Brief(name) => self.brief(&name).await,
            Command::Help => render_help(),
        }
    }

    async fn brief(&mut self, name: &str) {
        let region = self.session.active_region();
        let Some((district, status)) = briefing_subject(self.hazards.as_ref(), &region, name) else {
            render_error(&format!("No district matching '{}' in {}", name, region.to_uppercase()));
            return;
        };

        self.prompt.show_busy();
        let diagnostics = self.session.diagnostics();
        let summary = analyze_risk(
            self.briefing_provider.as_ref(),
            &diagnostics,
            &district,
            &status,
        )
        .await;
        self.prompt.hide_busy();
        render_notice(&format!("{} ({})", district.name, district.state));
        println!("{}", summary);
    }
}

/// The district matching `name` and the storm's latest observed position
fn briefing_subject(
    hazards: &dyn HazardData,
    region: &str,
    name: &str,
) -> Option<(DistrictRisk, CycloneTrackPoint)> {
    let data = hazards.region_data(region)?;
    let needle = name.to_lowercase();
    let district = data
        .districts
        .into_iter()
        .find(|d| d.name.to_lowercase().contains(&needle))?;
    let status = data
        .track
        .iter()
        .rev()
        .find(|p| !p.is_forecast)
        .or_else(|| data.track.first())
        .cloned()?;
    Some((district, status))
}
