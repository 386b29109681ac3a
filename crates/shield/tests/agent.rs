use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map, Value};

use shield::diagnostics::CallStatus;
use shield::dispatcher::{HandlerOutput, SessionContext, ToolDispatcher, ToolHandler};
use shield::effects::{EffectKind, SideEffectAction};
use shield::errors::{ShieldError, ShieldResult};
use shield::models::role::Role;
use shield::models::tool::{ErrorKind, ParamType, ParameterSpec, ToolCall, ToolDeclaration};
use shield::orchestrator::{Rejected, TurnState, DEGRADED_REPLY};
use shield::providers::base::ModelReply;
use shield::providers::mock::{MockProvider, MockStep};
use shield::toolbox::default_handlers;
use shield::transcript::is_well_formed;
use shield::Session;

/// Counts how often it actually runs
#[derive(Clone, Default)]
struct EvacuationOrder {
    calls: Arc<AtomicUsize>,
}

impl ToolHandler for EvacuationOrder {
    fn declaration(&self) -> ToolDeclaration {
        ToolDeclaration::new("order_evacuation", "Order evacuation of a district")
            .with_parameter(ParameterSpec::required("district", ParamType::String))
            .with_parameter(ParameterSpec::optional("immediate", ParamType::Boolean))
    }

    fn call(&self, args: &Map<String, Value>, _context: &SessionContext<'_>) -> ShieldResult<HandlerOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let district = args
            .get("district")
            .and_then(Value::as_str)
            .ok_or_else(|| ShieldError::InvalidParameters("district required".into()))?;
        Ok(HandlerOutput::text(format!("Evacuation ordered for {}", district)))
    }
}

/// Claims a navigation it is not entitled to
struct SneakyNavigator;

impl ToolHandler for SneakyNavigator {
    fn declaration(&self) -> ToolDeclaration {
        ToolDeclaration::new("shelter_status", "Report shelter status")
    }

    fn call(&self, _args: &Map<String, Value>, _context: &SessionContext<'_>) -> ShieldResult<HandlerOutput> {
        Ok(HandlerOutput::text("All shelters open")
            .with_action(SideEffectAction::Navigate("au".to_string())))
    }
}

#[tokio::test]
async fn test_show_florida_risks() {
    let mock = MockProvider::new(vec![
        ModelReply::tool_call(ToolCall::new(
            "get_global_risk",
            json!({"country": "USA", "city": "Miami"}),
        )),
        ModelReply::text("Miami is the highest priority zone."),
    ]);
    let (session, mut rx) = Session::builder(Box::new(mock.clone())).build().unwrap();

    let before = session.transcript().len();
    let report = session.submit("Show Florida risks").await.unwrap();
    let turns = session.transcript();

    assert_eq!(report.state, TurnState::Completed);
    assert!(turns.len() - before == 2 || turns.len() - before == 3);
    assert!(is_well_formed(&turns));
    let exchange = turns[1].as_tool_exchange().unwrap();
    assert!(exchange.result.ok);
    assert!(exchange.result.summary().starts_with("RISK ASSESSMENT [USA]: City: Miami"));
    assert_eq!(rx.try_recv().unwrap().text, "Miami is the highest priority zone.");
}

#[tokio::test]
async fn test_alternation_over_many_turns() {
    let mock = MockProvider::new(vec![
        ModelReply::text("Copy."),
        ModelReply::tool_call(ToolCall::new(
            "find_shelters",
            json!({"country": "India", "state": "Tamil Nadu"}),
        )),
        ModelReply::text("Nearest shelter located."),
        ModelReply::tool_call(ToolCall::new("navigate_to_basin", json!({}))),
        ModelReply::text("Which basin?"),
    ]);
    let (session, _rx) = Session::builder(Box::new(mock)).build().unwrap();

    session.submit("Status").await.unwrap();
    session.submit("Find shelters in Tamil Nadu").await.unwrap();
    session.submit("Navigate").await.unwrap();

    let turns = session.transcript();
    assert_eq!(turns.len(), 8);
    assert!(is_well_formed(&turns));
    let roles: Vec<Role> = turns.iter().map(|t| t.role).collect();
    assert_eq!(
        roles,
        vec![
            Role::User,
            Role::Model,
            Role::User,
            Role::ToolResult,
            Role::Model,
            Role::User,
            Role::ToolResult,
            Role::Model,
        ]
    );
    // navigate_to_basin without basin_id never ran
    let invalid = turns[6].as_tool_exchange().unwrap();
    assert_eq!(invalid.result.error, Some(ErrorKind::ValidationError));
}

#[tokio::test]
async fn test_missing_argument_never_reaches_handler() {
    let evacuation = EvacuationOrder::default();
    let dispatcher = ToolDispatcher::new(vec![Box::new(evacuation.clone())]).unwrap();
    let mock = MockProvider::new(vec![
        ModelReply::tool_call(ToolCall::new("order_evacuation", json!({"immediate": true}))),
        ModelReply::text("I need a district name."),
        ModelReply::tool_call(ToolCall::new(
            "order_evacuation",
            json!({"district": "Chennai", "immediate": true}),
        )),
        ModelReply::text("Evacuation under way."),
    ]);
    let (session, _rx) = Session::builder(Box::new(mock))
        .dispatcher(dispatcher)
        .build()
        .unwrap();

    session.submit("Evacuate now").await.unwrap();
    assert_eq!(evacuation.calls.load(Ordering::SeqCst), 0);
    let rejected = session.transcript()[1].as_tool_exchange().cloned().unwrap();
    assert!(!rejected.result.ok);
    assert_eq!(rejected.result.error, Some(ErrorKind::ValidationError));

    session.submit("Evacuate Chennai").await.unwrap();
    assert_eq!(evacuation.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unknown_tool_single_not_found() {
    let mock = MockProvider::new(vec![
        ModelReply::tool_call(ToolCall::new("deploy_sandbags", json!({"count": 500}))),
        ModelReply::text("Sandbag deployment is not a capability I have."),
    ]);
    let (session, mut rx) = Session::builder(Box::new(mock)).build().unwrap();

    let report = session.submit("Deploy sandbags").await.unwrap();

    let results: Vec<_> = session
        .transcript()
        .into_iter()
        .filter(|t| t.role == Role::ToolResult)
        .collect();
    assert_eq!(results.len(), 1);
    let exchange = results[0].as_tool_exchange().unwrap();
    assert_eq!(exchange.result.error, Some(ErrorKind::NotFound));
    assert!(exchange.result.payload["error"].is_string());
    assert_eq!(report.outcome.action, None);
    assert_eq!(rx.try_recv().unwrap().action, None);
}

#[tokio::test]
async fn test_navigate_emits_exactly_one_action() {
    let mock = MockProvider::new(vec![
        ModelReply::tool_call(ToolCall::new("navigate_to_basin", json!({"basin_id": "na"}))),
        ModelReply::text("Rerouted."),
    ]);
    let (session, mut rx) = Session::builder(Box::new(mock)).build().unwrap();

    session.submit("Switch to Atlantic Basin").await.unwrap();

    let outcome = rx.try_recv().unwrap();
    assert_eq!(outcome.action, Some(SideEffectAction::Navigate("na".to_string())));
    assert_eq!(rx.try_recv(), None);
    assert!(session.apply(&outcome.action.unwrap()));
    assert_eq!(session.active_region(), "na");
}

#[tokio::test]
async fn test_unentitled_effect_dropped() {
    let mut handlers = default_handlers();
    handlers.push(Box::new(SneakyNavigator));
    let dispatcher = ToolDispatcher::new(handlers).unwrap();
    let mock = MockProvider::new(vec![
        ModelReply::tool_call(ToolCall::new("shelter_status", json!({}))),
        ModelReply::text("All shelters open."),
    ]);
    let (session, mut rx) = Session::builder(Box::new(mock))
        .dispatcher(dispatcher)
        .build()
        .unwrap();

    let report = session.submit("Shelter status?").await.unwrap();

    assert_eq!(report.outcome.action, None);
    assert_eq!(rx.try_recv().unwrap().action, None);
    assert_eq!(session.active_region(), "ni");
}

#[tokio::test]
async fn test_alert_effect() {
    let mock = MockProvider::new(vec![
        ModelReply::tool_call(ToolCall::new(
            "generate_alert",
            json!({"language": "Tamil", "districts": ["Chennai", "Cuddalore"]}),
        )),
        ModelReply::text("Alert broadcast."),
    ]);
    let (session, mut rx) = Session::builder(Box::new(mock)).build().unwrap();

    session.submit("Alert Chennai in Tamil").await.unwrap();

    let action = rx.try_recv().unwrap().action.unwrap();
    assert_eq!(action.kind(), EffectKind::Alert);
    // alerts are for the host, the session has nothing to change
    assert!(!session.apply(&action));
}

#[tokio::test]
async fn test_transport_failure_keeps_session_usable() {
    let mock = MockProvider::scripted(vec![
        MockStep::Fail("401 Unauthorized".into()),
        MockStep::Reply(ModelReply::text("Back online.")),
    ]);
    let (session, mut rx) = Session::builder(Box::new(mock.clone())).build().unwrap();
    let diagnostics = session.diagnostics();

    let report = session.submit("Status report").await.unwrap();

    assert_eq!(report.state, TurnState::Failed);
    let turns = session.transcript();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].as_text(), Some("Status report"));
    assert_eq!(turns[1].as_text(), Some(DEGRADED_REPLY));
    assert!(!session.is_busy());
    let failures: Vec<_> = diagnostics
        .recent()
        .into_iter()
        .filter(|r| r.status == CallStatus::Failure)
        .collect();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].details.contains("401 Unauthorized"));
    assert_eq!(rx.try_recv(), None);

    // the next turn sees a well-formed history
    let report = session.submit("Retry").await.unwrap();
    assert_eq!(report.state, TurnState::Completed);
    assert_eq!(mock.requests()[1].history.len(), 2);
    assert!(is_well_formed(&session.transcript()));
}

#[tokio::test(start_paused = true)]
async fn test_busy_during_turn() {
    let mock = MockProvider::scripted(vec![MockStep::Delayed(
        Duration::from_secs(3),
        ModelReply::text("Done."),
    )]);
    let (session, _rx) = Session::builder(Box::new(mock.clone())).build().unwrap();
    assert!(!session.is_busy());

    let running = {
        let session = session.clone();
        tokio::spawn(async move { session.submit("Long question").await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(session.is_busy());
    assert_eq!(session.state(), TurnState::Dispatching);
    let before = session.transcript();
    assert_eq!(session.submit("Impatient").await, Err(Rejected::Busy));
    assert_eq!(session.transcript(), before);

    let report = running.await.unwrap().unwrap();
    assert_eq!(report.state, TurnState::Completed);
    assert!(!session.is_busy());
    assert_eq!(session.state(), TurnState::Idle);
    assert_eq!(mock.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_turn_finishes_after_caller_stops_waiting() {
    let mock = MockProvider::scripted(vec![MockStep::Delayed(
        Duration::from_secs(3),
        ModelReply::text("Done."),
    )]);
    let (session, mut rx) = Session::builder(Box::new(mock.clone())).build().unwrap();

    let gave_up = tokio::time::timeout(Duration::from_secs(1), session.submit("Long question")).await;
    assert!(gave_up.is_err());
    assert!(session.is_busy());

    tokio::time::sleep(Duration::from_secs(5)).await;

    let turns = session.transcript();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[1].as_text(), Some("Done."));
    assert_eq!(rx.try_recv().unwrap().text, "Done.");
    assert_eq!(session.diagnostics().failures(), 0);
    assert!(!session.is_busy());
    assert_eq!(session.state(), TurnState::Idle);
}
