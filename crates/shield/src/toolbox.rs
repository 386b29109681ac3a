//! The tools Shield offers the model.
use serde_json::{Map, Value};

use crate::dispatcher::{HandlerOutput, SessionContext, ToolDispatcher, ToolHandler};
use crate::effects::{AlertNotice, EffectKind, SideEffectAction};
use crate::errors::{ShieldError, ShieldResult};
use crate::hazard::{find_basin, RegionData};
use crate::models::tool::{ParamType, ParameterSpec, ToolDeclaration};

pub const GET_GLOBAL_RISK: &str = "get_global_risk";
pub const FIND_SHELTERS: &str = "find_shelters";
pub const NAVIGATE_TO_BASIN: &str = "navigate_to_basin";
pub const GENERATE_ALERT: &str = "generate_alert";

const ALERT_TEMPLATE: &str = "URGENT: CAT 4 STORM SURGE IMMINENT. EVACUATE ZONE A IMMEDIATELY.";

/// The standard handler set, one per declared tool
pub fn default_handlers() -> Vec<Box<dyn ToolHandler>> {
    vec![
        Box::new(GlobalRiskTool),
        Box::new(ShelterTool),
        Box::new(NavigateTool),
        Box::new(AlertTool),
    ]
}

impl ToolDispatcher {
    /// A dispatcher over the standard tools
    pub fn with_default_tools() -> ShieldResult<Self> {
        ToolDispatcher::new(default_handlers())
    }
}

fn arg<'a>(args: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

fn region(context: &SessionContext<'_>, basin_id: &str) -> ShieldResult<RegionData> {
    context.hazards.region_data(basin_id).ok_or_else(|| {
        ShieldError::ExecutionError(format!("No hazard data for region '{}'", basin_id))
    })
}

/// Risk lookup for a country, optionally narrowed to a city
pub struct GlobalRiskTool;

impl GlobalRiskTool {
    fn target_basin(basin: Option<&str>, country: &str) -> &'static str {
        let atlantic = basin.is_some_and(|b| b.to_lowercase().contains("atlantic"));
        if country.to_lowercase().contains("usa") || atlantic {
            "na"
        } else {
            "ni"
        }
    }
}

impl ToolHandler for GlobalRiskTool {
    fn declaration(&self) -> ToolDeclaration {
        ToolDeclaration::new(
            GET_GLOBAL_RISK,
            "Get cyclone risk details for a specific region or city globally.",
        )
        .with_parameter(
            ParameterSpec::optional("basin", ParamType::String).with_description(
                "The ocean basin (e.g., \"north_atlantic\", \"north_indian\", \"pacific\").",
            ),
        )
        .with_parameter(
            ParameterSpec::required("country", ParamType::String)
                .with_description("Target country (e.g., USA, India, Japan)."),
        )
        .with_parameter(
            ParameterSpec::optional("city", ParamType::String)
                .with_description("Specific city name (e.g., Tampa, Chennai, Miami)."),
        )
    }

    fn call(&self, args: &Map<String, Value>, context: &SessionContext<'_>) -> ShieldResult<HandlerOutput> {
        let country = arg(args, "country").unwrap_or_default();
        let basin = Self::target_basin(arg(args, "basin"), country);
        let data = region(context, basin)?;

        let risk = match arg(args, "city") {
            None => "General regional risk is ELEVATED.".to_string(),
            Some(city) => {
                let needle = city.to_lowercase();
                match data
                    .districts
                    .iter()
                    .find(|d| d.name.to_lowercase().contains(&needle))
                {
                    Some(d) => format!(
                        "City: {}, State: {}. Risk Score: {}/10. Pop: {:.1}M. Infra at Risk: {} units.",
                        d.name,
                        d.state,
                        d.risk_score,
                        d.population_affected as f64 / 1e6,
                        d.critical_infrastructure_count
                    ),
                    None => format!("City {} not found in high-priority impact zone list.", city),
                }
            }
        };

        Ok(HandlerOutput::text(format!(
            "RISK ASSESSMENT [{}]: {}",
            country, risk
        )))
    }
}

/// Nearest hardened shelter for an administrative region
pub struct ShelterTool;

impl ToolHandler for ShelterTool {
    fn declaration(&self) -> ToolDeclaration {
        ToolDeclaration::new(
            FIND_SHELTERS,
            "Find emergency shelters in a specific administrative region.",
        )
        .with_parameter(ParameterSpec::required("country", ParamType::String))
        .with_parameter(ParameterSpec::required("state", ParamType::String))
        .with_parameter(ParameterSpec::optional("radius_km", ParamType::Number))
    }

    fn call(&self, args: &Map<String, Value>, context: &SessionContext<'_>) -> ShieldResult<HandlerOutput> {
        let country = arg(args, "country").unwrap_or_default();
        let state = arg(args, "state").unwrap_or_default();
        let basin = if country.to_lowercase().contains("usa") {
            "na"
        } else {
            "ni"
        };

        let data = region(context, basin)?;
        let shelter = data.shelters.first().ok_or_else(|| {
            ShieldError::ExecutionError(format!("No shelters registered near {}", state))
        })?;

        Ok(HandlerOutput::text(format!(
            "SHELTER OPS [{}]: Nearest hardened facility is '{}' ({}). Capacity: {}/{}.",
            state, shelter.name, shelter.kind, shelter.occupied, shelter.capacity
        )))
    }
}

/// Switches the dashboard map to another basin. The only tool allowed to navigate.
pub struct NavigateTool;

impl ToolHandler for NavigateTool {
    fn declaration(&self) -> ToolDeclaration {
        ToolDeclaration::new(
            NAVIGATE_TO_BASIN,
            "Switch the map view to a specific global basin.",
        )
        .with_parameter(
            ParameterSpec::required("basin_id", ParamType::String).with_description(
                "ID of the basin: \"na\" (North Atlantic/USA), \"ni\" (North Indian/India), \"wp\" (West Pacific).",
            ),
        )
    }

    fn effect(&self) -> Option<EffectKind> {
        Some(EffectKind::Navigate)
    }

    fn call(&self, args: &Map<String, Value>, _: &SessionContext<'_>) -> ShieldResult<HandlerOutput> {
        let requested = arg(args, "basin_id").unwrap_or_default();
        let basin = find_basin(requested).ok_or_else(|| {
            ShieldError::ExecutionError(format!("Unknown basin '{}'", requested))
        })?;

        Ok(HandlerOutput::text(format!(
            "Acknowledged. Rerouting satellite feed to {} basin.",
            basin.id.to_uppercase()
        ))
        .with_action(SideEffectAction::Navigate(basin.id.to_string())))
    }
}

/// Drafts a multilingual SMS alert and hands it to the host broadcast system
pub struct AlertTool;

impl ToolHandler for AlertTool {
    fn declaration(&self) -> ToolDeclaration {
        ToolDeclaration::new(
            GENERATE_ALERT,
            "Generate a multi-lingual emergency SMS alert for specific districts.",
        )
        .with_parameter(
            ParameterSpec::required("language", ParamType::String)
                .with_description("Target languages (e.g., \"en|es|hi\")"),
        )
        .with_parameter(
            ParameterSpec::optional("districts", ParamType::StringArray)
                .with_description("List of district names to target."),
        )
    }

    fn effect(&self) -> Option<EffectKind> {
        Some(EffectKind::Alert)
    }

    fn call(&self, args: &Map<String, Value>, context: &SessionContext<'_>) -> ShieldResult<HandlerOutput> {
        let languages: Vec<String> = arg(args, "language")
            .unwrap_or_default()
            .split('|')
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect();
        let districts: Vec<String> = args
            .get("districts")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let notice = AlertNotice {
            languages,
            districts,
            message: ALERT_TEMPLATE.to_string(),
        };
        let confirmation = context.alerts.dispatch(&notice)?;

        Ok(HandlerOutput::text(confirmation).with_action(SideEffectAction::Alert(notice)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::{AlertDispatch, LoggedAlertDispatch};
    use crate::hazard::StaticHazardData;
    use crate::models::tool::{ErrorKind, ToolCall};
    use serde_json::json;

    fn execute(call: ToolCall) -> crate::dispatcher::Dispatch {
        let dispatcher = ToolDispatcher::with_default_tools().unwrap();
        let hazards = StaticHazardData::new();
        let context = SessionContext {
            active_region: "ni",
            hazards: &hazards,
            alerts: &LoggedAlertDispatch,
        };
        dispatcher.execute(&call, &context)
    }

    #[test]
    fn test_declarations() {
        let dispatcher = ToolDispatcher::with_default_tools().unwrap();
        let names: Vec<_> = dispatcher
            .registry()
            .declarations()
            .iter()
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(
            names,
            vec![GET_GLOBAL_RISK, FIND_SHELTERS, NAVIGATE_TO_BASIN, GENERATE_ALERT]
        );
    }

    #[test]
    fn test_navigate_emits_exact_action() {
        let dispatch = execute(ToolCall::new(NAVIGATE_TO_BASIN, json!({"basin_id": "na"})));
        assert!(dispatch.result.ok);
        assert_eq!(
            dispatch.result.summary(),
            "Acknowledged. Rerouting satellite feed to NA basin."
        );
        assert_eq!(dispatch.action, Some(SideEffectAction::Navigate("na".into())));
    }

    #[test]
    fn test_navigate_normalizes_case() {
        let dispatch = execute(ToolCall::new(NAVIGATE_TO_BASIN, json!({"basin_id": "WP"})));
        assert_eq!(dispatch.action, Some(SideEffectAction::Navigate("wp".into())));
    }

    #[test]
    fn test_navigate_unknown_basin() {
        let dispatch = execute(ToolCall::new(NAVIGATE_TO_BASIN, json!({"basin_id": "mars"})));
        assert_eq!(dispatch.result.error, Some(ErrorKind::ToolExecutionError));
        assert!(dispatch.action.is_none());
    }

    #[test]
    fn test_global_risk_city() {
        let dispatch = execute(ToolCall::new(
            GET_GLOBAL_RISK,
            json!({"country": "USA", "city": "Tampa"}),
        ));
        assert_eq!(
            dispatch.result.summary(),
            "RISK ASSESSMENT [USA]: City: Tampa Bay, State: Florida. Risk Score: 6.5/10. Pop: 3.0M. Infra at Risk: 80 units."
        );
        assert!(dispatch.action.is_none());
    }

    #[test]
    fn test_global_risk_basin_hint() {
        let dispatch = execute(ToolCall::new(
            GET_GLOBAL_RISK,
            json!({"country": "Cuba", "basin": "north_atlantic", "city": "miami"}),
        ));
        assert!(dispatch.result.summary().contains("Miami-Dade"));
    }

    #[test]
    fn test_global_risk_unknown_city() {
        let dispatch = execute(ToolCall::new(
            GET_GLOBAL_RISK,
            json!({"country": "India", "city": "Mumbai"}),
        ));
        assert_eq!(
            dispatch.result.summary(),
            "RISK ASSESSMENT [India]: City Mumbai not found in high-priority impact zone list."
        );
    }

    #[test]
    fn test_global_risk_regional() {
        let dispatch = execute(ToolCall::new(GET_GLOBAL_RISK, json!({"country": "India"})));
        assert!(dispatch.result.summary().ends_with("General regional risk is ELEVATED."));
    }

    #[test]
    fn test_find_shelters() {
        let dispatch = execute(ToolCall::new(
            FIND_SHELTERS,
            json!({"country": "India", "state": "Tamil Nadu"}),
        ));
        assert_eq!(
            dispatch.result.summary(),
            "SHELTER OPS [Tamil Nadu]: Nearest hardened facility is 'Chennai Corp. Community Hall' (COMMUNITY_HALL). Capacity: 3200/5000."
        );
    }

    #[test]
    fn test_find_shelters_requires_state() {
        let dispatch = execute(ToolCall::new(FIND_SHELTERS, json!({"country": "USA"})));
        assert_eq!(dispatch.result.error, Some(ErrorKind::ValidationError));
    }

    struct RecordingAlerts(parking_lot::Mutex<Vec<AlertNotice>>);

    impl AlertDispatch for RecordingAlerts {
        fn dispatch(&self, notice: &AlertNotice) -> ShieldResult<String> {
            self.0.lock().push(notice.clone());
            Ok("queued".to_string())
        }
    }

    #[test]
    fn test_generate_alert() {
        let dispatcher = ToolDispatcher::with_default_tools().unwrap();
        let hazards = StaticHazardData::new();
        let alerts = RecordingAlerts(parking_lot::Mutex::new(Vec::new()));
        let context = SessionContext {
            active_region: "ni",
            hazards: &hazards,
            alerts: &alerts,
        };
        let call = ToolCall::new(
            GENERATE_ALERT,
            json!({"language": "en|ta", "districts": ["Chennai", "Cuddalore"]}),
        );

        let dispatch = dispatcher.execute(&call, &context);
        assert_eq!(dispatch.result.summary(), "queued");

        let sent = alerts.0.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].languages, vec!["en", "ta"]);
        assert_eq!(sent[0].districts, vec!["Chennai", "Cuddalore"]);
        assert_eq!(dispatch.action, Some(SideEffectAction::Alert(sent[0].clone())));
    }

    #[test]
    fn test_default_alert_confirmation() {
        let dispatch = execute(ToolCall::new(GENERATE_ALERT, json!({"language": "en"})));
        assert_eq!(
            dispatch.result.summary(),
            "ALERT GENERATED: 'URGENT: CAT 4 STORM SURGE IMMINENT. EVACUATE ZONE A IMMEDIATELY.' (Broadcast sent to towers)"
        );
    }
}
