use std::collections::HashSet;

use anyhow::{anyhow, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{json, Map, Value};

use super::base::{ModelReply, Usage};
use crate::models::role::Role;
use crate::models::tool::{ToolCall, ToolDeclaration};
use crate::models::turn::{Turn, TurnContent};

lazy_static! {
    static ref INVALID_NAME_CHARS: Regex = Regex::new(r"[^a-zA-Z0-9_-]").unwrap();
    static ref VALID_NAME: Regex = Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap();
}

/// Convert the transcript to OpenAI's chat message specification
///
/// A tool round trip is stored as one entry but goes over the wire as an assistant
/// message carrying the call followed by the `tool` message answering it.
pub fn turns_to_openai_spec(turns: &[Turn]) -> Vec<Value> {
    let mut messages_spec = Vec::new();

    for turn in turns {
        match &turn.content {
            TurnContent::Text { text } => {
                let role = match turn.role {
                    Role::Model => "assistant",
                    _ => "user",
                };
                messages_spec.push(json!({
                    "role": role,
                    "content": text,
                }));
            }
            TurnContent::ToolExchange(exchange) => {
                messages_spec.push(json!({
                    "role": "assistant",
                    "tool_calls": [{
                        "id": turn.id,
                        "type": "function",
                        "function": {
                            "name": sanitize_function_name(&exchange.call.name),
                            "arguments": Value::Object(exchange.call.args.clone()).to_string(),
                        }
                    }]
                }));
                messages_spec.push(json!({
                    "role": "tool",
                    "content": exchange.result.payload.to_string(),
                    "tool_call_id": turn.id,
                }));
            }
        }
    }

    messages_spec
}

/// Convert tool declarations to OpenAI's tool specification
pub fn tools_to_openai_spec(tools: &[ToolDeclaration]) -> Result<Vec<Value>> {
    check_unique_names(tools)?;
    Ok(tools
        .iter()
        .map(|tool| {
            json!({
                "type": "function",
                "function": {
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": tool.input_schema(),
                }
            })
        })
        .collect())
}

/// Convert OpenAI's chat completion response to a reply
///
/// Only the first tool call is kept; a turn executes at most one tool.
pub fn openai_response_to_reply(response: &Value) -> Result<ModelReply> {
    let message = response
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .ok_or_else(|| anyhow!("No choices in response"))?;

    let text = message
        .get("content")
        .and_then(Value::as_str)
        .map(str::to_string);

    let tool_calls = message
        .get("tool_calls")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    if tool_calls.len() > 1 {
        tracing::debug!(count = tool_calls.len(), "ignoring all but the first tool call");
    }
    let tool_call = tool_calls.first().map(|tool_call| {
        let name = tool_call["function"]["name"].as_str().unwrap_or_default();
        let arguments = tool_call["function"]["arguments"]
            .as_str()
            .unwrap_or_default();
        parse_tool_call(name, parse_arguments(name, arguments))
    });

    Ok(ModelReply {
        text,
        tool_call,
        usage: openai_usage(response),
    })
}

pub fn openai_usage(response: &Value) -> Usage {
    let usage = &response["usage"];
    let input_tokens = usage["prompt_tokens"].as_i64().map(|v| v as i32);
    let output_tokens = usage["completion_tokens"].as_i64().map(|v| v as i32);
    let total_tokens = usage["total_tokens"]
        .as_i64()
        .map(|v| v as i32)
        .or_else(|| match (input_tokens, output_tokens) {
            (Some(input), Some(output)) => Some(input + output),
            _ => None,
        });
    Usage::new(input_tokens, output_tokens, total_tokens)
}

/// Convert the transcript to Gemini `contents`
///
/// Gemini has only `user` and `model` roles; the tool result travels back as a
/// `functionResponse` part in a user entry.
pub fn turns_to_gemini_contents(turns: &[Turn]) -> Vec<Value> {
    let mut contents = Vec::new();

    for turn in turns {
        match &turn.content {
            TurnContent::Text { text } => {
                let role = match turn.role {
                    Role::Model => "model",
                    _ => "user",
                };
                contents.push(json!({
                    "role": role,
                    "parts": [{"text": text}],
                }));
            }
            TurnContent::ToolExchange(exchange) => {
                contents.push(json!({
                    "role": "model",
                    "parts": [{
                        "functionCall": {
                            "name": exchange.call.name,
                            "args": exchange.call.args,
                        }
                    }]
                }));
                contents.push(json!({
                    "role": "user",
                    "parts": [{
                        "functionResponse": {
                            "name": exchange.call.name,
                            "response": exchange.result.payload,
                        }
                    }]
                }));
            }
        }
    }

    contents
}

/// Convert tool declarations to Gemini's `tools` field
pub fn tools_to_gemini_spec(tools: &[ToolDeclaration]) -> Result<Vec<Value>> {
    check_unique_names(tools)?;
    let declarations: Vec<Value> = tools
        .iter()
        .map(|tool| {
            let mut declaration = json!({
                "name": tool.name,
                "description": tool.description,
            });
            // Gemini rejects object schemas without properties
            if !tool.parameters.is_empty() {
                declaration["parameters"] = tool.input_schema();
            }
            declaration
        })
        .collect();
    Ok(vec![json!({ "functionDeclarations": declarations })])
}

/// Convert a `generateContent` response to a reply
pub fn gemini_response_to_reply(response: &Value) -> Result<ModelReply> {
    let parts = response
        .get("candidates")
        .and_then(|candidates| candidates.get(0))
        .and_then(|candidate| candidate.get("content"))
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("No candidates in response"))?;

    let mut texts = Vec::new();
    let mut tool_call = None;
    for part in parts {
        if let Some(text) = part.get("text").and_then(Value::as_str) {
            texts.push(text);
        } else if let Some(call) = part.get("functionCall") {
            if tool_call.is_some() {
                tracing::debug!("ignoring additional function call in response");
                continue;
            }
            let name = call["name"].as_str().unwrap_or_default();
            let args = call.get("args").cloned().unwrap_or_else(|| json!({}));
            tool_call = Some(parse_tool_call(name, args));
        }
    }

    let text = if texts.is_empty() {
        None
    } else {
        Some(texts.concat())
    };

    let usage = &response["usageMetadata"];
    let usage = Usage::new(
        usage["promptTokenCount"].as_i64().map(|v| v as i32),
        usage["candidatesTokenCount"].as_i64().map(|v| v as i32),
        usage["totalTokenCount"].as_i64().map(|v| v as i32),
    );

    Ok(ModelReply {
        text,
        tool_call,
        usage,
    })
}

fn check_unique_names(tools: &[ToolDeclaration]) -> Result<()> {
    let mut tool_names = HashSet::new();
    for tool in tools {
        if !tool_names.insert(&tool.name) {
            return Err(anyhow!("Duplicate tool name: {}", tool.name));
        }
    }
    Ok(())
}

fn parse_arguments(name: &str, arguments: &str) -> Value {
    if arguments.trim().is_empty() {
        return json!({});
    }
    match serde_json::from_str::<Value>(arguments) {
        Ok(args) => args,
        Err(e) => {
            // left empty so validation reports the missing arguments to the model
            tracing::warn!(tool = name, error = %e, "could not interpret tool arguments");
            Value::Object(Map::new())
        }
    }
}

fn parse_tool_call(name: &str, args: Value) -> ToolCall {
    if !is_valid_function_name(name) {
        tracing::warn!(tool = name, "tool name has invalid characters");
    }
    ToolCall::new(name, args)
}

fn sanitize_function_name(name: &str) -> String {
    INVALID_NAME_CHARS.replace_all(name, "_").to_string()
}

fn is_valid_function_name(name: &str) -> bool {
    VALID_NAME.is_match(name)
}
