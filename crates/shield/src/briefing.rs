use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::error;

use crate::diagnostics::{ApiRecord, CallStatus, DiagnosticsSink};
use crate::hazard::{CycloneTrackPoint, DistrictRisk};
use crate::models::turn::Turn;
use crate::orchestrator::DEFAULT_MODEL_TIMEOUT;
use crate::prompt_template::{load_prompt, BRIEFING_TEMPLATE};
use crate::providers::base::{ModelRequest, Provider};

pub const BRIEFING_FAILED: &str = "Error generating AI analysis.";
pub const BRIEFING_UNAVAILABLE: &str = "Analysis currently unavailable.";

#[derive(Serialize)]
struct BriefingContext<'a> {
    district: &'a DistrictRisk,
    status: &'a CycloneTrackPoint,
}

/// Ask the model for a three-point tactical summary of one district.
///
/// Independent of the conversation: no history, no tools. Never fails; problems are recorded
/// in diagnostics and the fixed fallback text is returned.
pub async fn analyze_risk(
    provider: &dyn Provider,
    diagnostics: &DiagnosticsSink,
    district: &DistrictRisk,
    status: &CycloneTrackPoint,
) -> String {
    analyze_risk_within(provider, diagnostics, district, status, DEFAULT_MODEL_TIMEOUT).await
}

pub async fn analyze_risk_within(
    provider: &dyn Provider,
    diagnostics: &DiagnosticsSink,
    district: &DistrictRisk,
    status: &CycloneTrackPoint,
    timeout: Duration,
) -> String {
    let started = Instant::now();
    let result = async {
        let prompt = load_prompt(BRIEFING_TEMPLATE, &BriefingContext { district, status })?;
        let message = Turn::user(prompt);
        let request = ModelRequest {
            system: "",
            history: &[],
            tools: &[],
            message: &message,
        };
        let reply = tokio::time::timeout(timeout, provider.complete(request))
            .await
            .map_err(|_| anyhow::anyhow!("no reply within {}s", timeout.as_secs_f32()))??;
        anyhow::Ok(reply)
    }
    .await;

    match result {
        Ok(reply) => {
            diagnostics.record(ApiRecord::new(
                provider.label(),
                CallStatus::Success,
                started.elapsed(),
                format!("Generated risk report for {}", district.name),
            ));
            reply
                .non_empty_text()
                .map(str::to_string)
                .unwrap_or_else(|| BRIEFING_UNAVAILABLE.to_string())
        }
        Err(e) => {
            error!(district = %district.name, error = %e, "risk briefing failed");
            diagnostics.record(ApiRecord::new(
                provider.label(),
                CallStatus::Failure,
                started.elapsed(),
                format!("Failed to generate report: {}", e),
            ));
            BRIEFING_FAILED.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hazard::{HazardData, StaticHazardData};
    use crate::providers::base::ModelReply;
    use crate::providers::mock::{MockProvider, MockStep};

    fn chennai() -> (DistrictRisk, CycloneTrackPoint) {
        let data = StaticHazardData::new().region_data("ni").unwrap();
        let district = data
            .districts
            .iter()
            .find(|d| d.name.contains("Chennai"))
            .cloned()
            .unwrap();
        (district, data.track[0].clone())
    }

    #[tokio::test]
    async fn test_briefing_prompt_and_reply() {
        let mock = MockProvider::new(vec![ModelReply::text("- Evacuate coastal wards")]);
        let diagnostics = DiagnosticsSink::default();
        let (district, status) = chennai();

        let summary = analyze_risk(&mock, &diagnostics, &district, &status).await;

        assert_eq!(summary, "- Evacuate coastal wards");
        let request = &mock.requests()[0];
        let prompt = request.message.as_text().unwrap();
        assert!(prompt.contains(&format!("District: {}, {}.", district.name, district.state)));
        assert!(prompt.contains("3-bullet point tactical executive summary"));
        assert!(request.history.is_empty());
        assert!(request.tools.is_empty());
        assert_eq!(diagnostics.recent()[0].status, CallStatus::Success);
    }

    #[tokio::test]
    async fn test_briefing_empty_reply() {
        let mock = MockProvider::new(vec![ModelReply::text("")]);
        let (district, status) = chennai();

        let summary = analyze_risk(&mock, &DiagnosticsSink::default(), &district, &status).await;
        assert_eq!(summary, BRIEFING_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_briefing_failure() {
        let mock = MockProvider::scripted(vec![MockStep::Fail("quota exceeded".into())]);
        let diagnostics = DiagnosticsSink::default();
        let (district, status) = chennai();

        let summary = analyze_risk(&mock, &diagnostics, &district, &status).await;

        assert_eq!(summary, BRIEFING_FAILED);
        let latest = &diagnostics.recent()[0];
        assert_eq!(latest.status, CallStatus::Failure);
        assert!(latest.details.contains("quota exceeded"));
    }
}
