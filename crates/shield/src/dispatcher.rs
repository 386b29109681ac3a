use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::effects::{AlertNotice, EffectKind, SideEffectAction};
use crate::errors::{ShieldError, ShieldResult};
use crate::hazard::HazardData;
use crate::models::tool::{ErrorKind, ToolCall, ToolDeclaration, ToolResult};
use crate::registry::ToolRegistry;

/// Host-side delivery of emergency alerts
pub trait AlertDispatch: Send + Sync {
    /// Hand an alert to the broadcast system, returning its confirmation text
    fn dispatch(&self, notice: &AlertNotice) -> ShieldResult<String>;
}

/// Default alert dispatch: records the alert in the log and confirms it
#[derive(Debug, Default, Clone)]
pub struct LoggedAlertDispatch;

impl AlertDispatch for LoggedAlertDispatch {
    fn dispatch(&self, notice: &AlertNotice) -> ShieldResult<String> {
        tracing::info!(
            languages = ?notice.languages,
            districts = ?notice.districts,
            "alert queued for broadcast"
        );
        Ok(format!(
            "ALERT GENERATED: '{}' (Broadcast sent to towers)",
            notice.message
        ))
    }
}

/// What a handler can see while it runs
#[derive(Clone, Copy)]
pub struct SessionContext<'a> {
    pub active_region: &'a str,
    pub hazards: &'a dyn HazardData,
    pub alerts: &'a dyn AlertDispatch,
}

/// A handler's successful output
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerOutput {
    pub payload: Value,
    pub action: Option<SideEffectAction>,
}

impl HandlerOutput {
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self {
            payload: serde_json::json!({ "result": text.into() }),
            action: None,
        }
    }

    pub fn with_action(mut self, action: SideEffectAction) -> Self {
        self.action = Some(action);
        self
    }
}

/// Implementation behind one declared tool
pub trait ToolHandler: Send + Sync {
    fn declaration(&self) -> ToolDeclaration;

    /// The side effect this tool is entitled to emit, if any
    fn effect(&self) -> Option<EffectKind> {
        None
    }

    /// Run the tool. Arguments have already been validated against the declaration.
    fn call(&self, args: &Map<String, Value>, context: &SessionContext<'_>)
        -> ShieldResult<HandlerOutput>;
}

/// Outcome of dispatching a single call
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub result: ToolResult,
    pub action: Option<SideEffectAction>,
}

impl Dispatch {
    fn rejected(result: ToolResult) -> Self {
        Self {
            result,
            action: None,
        }
    }
}

/// Routes validated tool calls to their handlers
pub struct ToolDispatcher {
    registry: ToolRegistry,
    handlers: HashMap<String, Box<dyn ToolHandler>>,
}

impl ToolDispatcher {
    /// Build a dispatcher whose registry is exactly the handlers' declarations
    pub fn new(handlers: Vec<Box<dyn ToolHandler>>) -> ShieldResult<Self> {
        let declarations: Vec<ToolDeclaration> =
            handlers.iter().map(|handler| handler.declaration()).collect();
        let registry = ToolRegistry::new(declarations)?;
        let handlers = handlers
            .into_iter()
            .map(|handler| (handler.declaration().name, handler))
            .collect();
        Ok(Self { registry, handlers })
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Execute a call. Never fails: problems come back as a failed tool result.
    pub fn execute(&self, call: &ToolCall, context: &SessionContext<'_>) -> Dispatch {
        if let Err(result) = self.registry.validate(call) {
            debug!(tool = %call.name, error = ?result.error, "tool call rejected");
            return Dispatch::rejected(result);
        }
        let Some(handler) = self.handlers.get(&call.name) else {
            return Dispatch::rejected(ToolResult::not_found(&call.name));
        };

        let outcome = catch_unwind(AssertUnwindSafe(|| handler.call(&call.args, context)));
        let output = match outcome {
            Ok(Ok(output)) => output,
            Ok(Err(error)) => {
                return Dispatch::rejected(ToolResult::failure(
                    ErrorKind::ToolExecutionError,
                    error.to_string(),
                ))
            }
            Err(_) => {
                warn!(tool = %call.name, "tool handler panicked");
                let error = ShieldError::ExecutionError(format!("{} failed unexpectedly", call.name));
                return Dispatch::rejected(ToolResult::failure(
                    ErrorKind::ToolExecutionError,
                    error.to_string(),
                ));
            }
        };

        let action = match output.action {
            Some(action) if handler.effect() == Some(action.kind()) => Some(action),
            Some(action) => {
                warn!(
                    tool = %call.name,
                    effect = %action.kind(),
                    "tool is not permitted to request this effect, dropping it"
                );
                None
            }
            None => None,
        };

        Dispatch {
            result: ToolResult::success(output.payload),
            action,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hazard::StaticHazardData;
    use crate::models::tool::{ParamType, ParameterSpec};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingTool {
        calls: Arc<AtomicUsize>,
    }

    impl ToolHandler for CountingTool {
        fn declaration(&self) -> ToolDeclaration {
            ToolDeclaration::new("count", "Counts invocations")
                .with_parameter(ParameterSpec::required("label", ParamType::String))
        }

        fn call(&self, args: &Map<String, Value>, _: &SessionContext<'_>) -> ShieldResult<HandlerOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(HandlerOutput::text(format!("counted {}", args["label"])))
        }
    }

    struct FaultyTool;

    impl ToolHandler for FaultyTool {
        fn declaration(&self) -> ToolDeclaration {
            ToolDeclaration::new("faulty", "Always fails")
        }

        fn call(&self, _: &Map<String, Value>, _: &SessionContext<'_>) -> ShieldResult<HandlerOutput> {
            Err(ShieldError::ExecutionError("sensor offline".into()))
        }
    }

    struct PanickingTool;

    impl ToolHandler for PanickingTool {
        fn declaration(&self) -> ToolDeclaration {
            ToolDeclaration::new("panicky", "Panics")
        }

        fn call(&self, _: &Map<String, Value>, _: &SessionContext<'_>) -> ShieldResult<HandlerOutput> {
            panic!("index out of bounds")
        }
    }

    /// Tries to navigate without being entitled to
    struct RogueNavigator;

    impl ToolHandler for RogueNavigator {
        fn declaration(&self) -> ToolDeclaration {
            ToolDeclaration::new("rogue", "Navigates without permission")
        }

        fn call(&self, _: &Map<String, Value>, _: &SessionContext<'_>) -> ShieldResult<HandlerOutput> {
            Ok(HandlerOutput::text("moved").with_action(SideEffectAction::Navigate("wp".into())))
        }
    }

    fn dispatcher(calls: Arc<AtomicUsize>) -> ToolDispatcher {
        ToolDispatcher::new(vec![
            Box::new(CountingTool { calls }),
            Box::new(FaultyTool),
            Box::new(PanickingTool),
            Box::new(RogueNavigator),
        ])
        .unwrap()
    }

    fn run(dispatcher: &ToolDispatcher, call: ToolCall) -> Dispatch {
        let hazards = StaticHazardData::new();
        let context = SessionContext {
            active_region: "ni",
            hazards: &hazards,
            alerts: &LoggedAlertDispatch,
        };
        dispatcher.execute(&call, &context)
    }

    #[test]
    fn test_execute_success() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = dispatcher(calls.clone());
        let dispatch = run(&dispatcher, ToolCall::new("count", json!({"label": "a"})));
        assert!(dispatch.result.ok);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(dispatch.action.is_none());
    }

    #[test]
    fn test_missing_argument_never_reaches_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = dispatcher(calls.clone());
        let dispatch = run(&dispatcher, ToolCall::new("count", json!({})));
        assert_eq!(dispatch.result.error, Some(ErrorKind::ValidationError));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unknown_tool() {
        let dispatcher = dispatcher(Arc::new(AtomicUsize::new(0)));
        let dispatch = run(&dispatcher, ToolCall::new("launch_probe", json!({})));
        assert!(!dispatch.result.ok);
        assert_eq!(dispatch.result.error, Some(ErrorKind::NotFound));
    }

    #[test]
    fn test_handler_error_becomes_execution_error() {
        let dispatcher = dispatcher(Arc::new(AtomicUsize::new(0)));
        let dispatch = run(&dispatcher, ToolCall::new("faulty", json!({})));
        assert_eq!(dispatch.result.error, Some(ErrorKind::ToolExecutionError));
        assert!(dispatch.result.summary().contains("sensor offline"));
    }

    #[test]
    fn test_handler_panic_is_contained() {
        let dispatcher = dispatcher(Arc::new(AtomicUsize::new(0)));
        let dispatch = run(&dispatcher, ToolCall::new("panicky", json!({})));
        assert_eq!(dispatch.result.error, Some(ErrorKind::ToolExecutionError));
    }

    #[test]
    fn test_unpermitted_effect_dropped() {
        let dispatcher = dispatcher(Arc::new(AtomicUsize::new(0)));
        let dispatch = run(&dispatcher, ToolCall::new("rogue", json!({})));
        assert!(dispatch.result.ok);
        assert!(dispatch.action.is_none());
    }

    #[test]
    fn test_registry_matches_handlers() {
        let dispatcher = dispatcher(Arc::new(AtomicUsize::new(0)));
        assert_eq!(dispatcher.registry().len(), 4);
        assert!(dispatcher.registry().get("faulty").is_some());
    }
}
