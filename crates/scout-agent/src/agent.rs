use scout_llm::{
    Backend, ContentBlock, Message, Request, Response, ThinkingConfig, ToolChoice, ToolDefinition,
    WebSearchToolContent,
};
use serde_json::Value;
use std::sync::Arc;

use crate::config::{AgentConfig, EditMode, SettingsHandle};
use crate::errors::AgentError;
use crate::events::{AgentEvent, EventBus};
use crate::tools::{OUTPUT_TOOL, TEXT_EDITOR_TOOL, Tool, ToolRegistry, ToolResult, output_tool};

/// The orchestration loop: one conversation with the backend, driven until
/// the model produces a final answer.
///
/// History is append-only and exclusively owned by this instance; tools
/// return results, only the loop appends turns. One agent serves one
/// conversation at a time, though a delegation tool may run a nested agent
/// with its own independent history.
pub struct Agent {
    backend: Arc<dyn Backend>,
    bus: EventBus,
    settings: SettingsHandle,
    config: AgentConfig,
    tools: ToolRegistry,
    // Held outside the registry so it is always resolvable, even when the
    // registry is empty or the model calls it unprompted.
    output: Tool,
    history: Vec<Message>,
}

impl Agent {
    pub fn new(
        backend: Arc<dyn Backend>,
        bus: EventBus,
        settings: SettingsHandle,
        config: AgentConfig,
        tools: ToolRegistry,
    ) -> Self {
        Self {
            backend,
            bus,
            settings,
            config,
            tools,
            output: output_tool(),
            history: Vec::new(),
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Drop accumulated history so the agent can serve a fresh conversation.
    pub fn reset(&mut self) {
        self.history.clear();
    }

    /// Drive the loop until a final answer is produced.
    ///
    /// With a bound, the last allowed iteration forces the output tool, which
    /// must always yield an answer; coming up empty after forcing is a
    /// contract violation surfaced as [`AgentError::BudgetExhausted`]. With
    /// `max_iterations` of `None` the loop runs unbounded.
    pub async fn run(
        &mut self,
        prompt: &str,
        max_iterations: Option<usize>,
    ) -> Result<String, AgentError> {
        if max_iterations == Some(0) {
            return Err(AgentError::InvalidConfiguration(
                "max_iterations must be at least 1".to_string(),
            ));
        }

        self.history.push(Message::user_text(prompt));

        let mut iteration = 0usize;
        loop {
            iteration += 1;
            let force_output = max_iterations.is_some_and(|bound| iteration == bound);
            if let Some(answer) = self.step(force_output).await? {
                return Ok(answer);
            }
            if max_iterations.is_some_and(|bound| iteration >= bound) {
                return Err(AgentError::BudgetExhausted);
            }
        }
    }

    /// One backend call plus the execution of whatever it requested.
    ///
    /// Returns the final answer when this step produced one.
    async fn step(&mut self, force_output: bool) -> Result<Option<String>, AgentError> {
        // Forcing a specific tool is incompatible with reasoning mode.
        let use_thinking = self.config.thinking_enabled && !force_output;

        let request = Request {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            system: self.config.system_prompt.clone(),
            messages: self.outbound_messages(use_thinking),
            tools: Some(self.offered_tools(force_output)),
            tool_choice: Some(if force_output {
                ToolChoice::Tool {
                    name: OUTPUT_TOOL.to_string(),
                }
            } else {
                ToolChoice::Auto
            }),
            thinking: use_thinking.then(|| ThinkingConfig::Enabled {
                budget_tokens: self.config.thinking_budget_tokens,
            }),
        };

        let response = self.backend.complete(request).await?;
        let (assistant_blocks, texts, pending) = self.classify(response);

        if !assistant_blocks.is_empty() {
            self.history.push(Message::assistant(assistant_blocks));
        }

        // A text-only response ends the conversation.
        if pending.is_empty() {
            if texts.is_empty() {
                return Ok(None);
            }
            return Ok(Some(texts.join("\n")));
        }

        let mut results = Vec::with_capacity(pending.len());
        let mut final_answer = None;
        for call in pending {
            let result = if call.name == OUTPUT_TOOL {
                self.output.dispatch(&self.bus, call.input).await
            } else if call.name == TEXT_EDITOR_TOOL && self.settings.edit_mode() == EditMode::Never {
                // Withheld from the offered set, so a call to it resolves
                // like any unknown name.
                let message = format!("tool '{}' not found", call.name);
                self.bus.emit(AgentEvent::ToolError {
                    tool_name: call.name.clone(),
                    error: message.clone(),
                });
                ToolResult::fail(message)
            } else {
                self.tools.dispatch(&self.bus, &call.name, call.input).await
            };

            // Capture the answer but keep processing the remaining calls so
            // every call in this turn gets its matching result.
            if call.name == OUTPUT_TOOL && result.success {
                final_answer = result
                    .data
                    .as_ref()
                    .and_then(|data| data.get("result"))
                    .and_then(Value::as_str)
                    .map(str::to_string);
            }

            results.push(ContentBlock::ToolResult {
                tool_use_id: call.id,
                content: result.content(),
                is_error: result.is_error(),
            });
        }
        self.history.push(Message::user(results));

        if let Some(answer) = &final_answer {
            self.bus.emit(AgentEvent::FinalOutput {
                result: answer.clone(),
            });
        }
        Ok(final_answer)
    }

    /// History as sent to the backend. Reasoning traces are per-call
    /// artifacts: with thinking off they are stripped from assistant turns,
    /// and a turn left empty by the strip is dropped entirely.
    fn outbound_messages(&self, use_thinking: bool) -> Vec<Message> {
        if use_thinking {
            return self.history.clone();
        }
        self.history
            .iter()
            .filter_map(|message| {
                let content: Vec<ContentBlock> = message
                    .content
                    .iter()
                    .filter(|block| !matches!(block, ContentBlock::Thinking { .. }))
                    .cloned()
                    .collect();
                if content.is_empty() {
                    None
                } else {
                    Some(Message {
                        role: message.role,
                        content,
                    })
                }
            })
            .collect()
    }

    /// The tool set offered to the backend for this step.
    fn offered_tools(&self, force_output: bool) -> Vec<ToolDefinition> {
        if force_output {
            return vec![self.output.definition.clone()];
        }

        let edit_mode = self.settings.edit_mode();
        let mut definitions: Vec<ToolDefinition> = self
            .tools
            .definitions()
            .into_iter()
            .filter(|definition| {
                edit_mode != EditMode::Never || definition.name != TEXT_EDITOR_TOOL
            })
            .collect();
        definitions.push(self.output.definition.clone());
        definitions
    }

    fn classify(&self, response: Response) -> (Vec<ContentBlock>, Vec<String>, Vec<PendingCall>) {
        let mut blocks = Vec::with_capacity(response.content.len());
        let mut texts = Vec::new();
        let mut pending = Vec::new();

        for block in response.content {
            match &block {
                ContentBlock::Text { text } => {
                    self.bus.emit(AgentEvent::AssistantMessage { text: text.clone() });
                    texts.push(text.clone());
                }
                ContentBlock::ToolUse { id, name, input } => {
                    pending.push(PendingCall {
                        id: id.clone(),
                        name: name.clone(),
                        input: input.clone(),
                    });
                }
                ContentBlock::WebSearchToolResult { content, .. } => {
                    if let WebSearchToolContent::Error(error) = content {
                        self.bus.emit(AgentEvent::WebSearchError {
                            error_code: error.error_code.clone(),
                        });
                    }
                }
                ContentBlock::Unrecognized(_) => {
                    self.bus.emit(AgentEvent::UnknownContent {
                        content_type: block.type_name(),
                    });
                }
                ContentBlock::Thinking { .. }
                | ContentBlock::ServerToolUse { .. }
                | ContentBlock::ToolResult { .. } => {}
            }
            blocks.push(block);
        }

        (blocks, texts, pending)
    }
}

struct PendingCall {
    id: String,
    name: String,
    input: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::BufferedEventHandler;
    use async_trait::async_trait;
    use scout_llm::{LlmError, Usage};
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct MockBackend {
        responses: Mutex<VecDeque<Response>>,
        requests: Mutex<Vec<Request>>,
    }

    impl MockBackend {
        fn new(responses: Vec<Response>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<Request> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Backend for MockBackend {
        fn name(&self) -> &str {
            "mock"
        }

        async fn complete(&self, request: Request) -> Result<Response, LlmError> {
            self.requests.lock().unwrap().push(request);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| LlmError::Decode("no scripted response left".to_string()))
        }
    }

    fn response(content: Vec<ContentBlock>) -> Response {
        Response {
            id: "msg_test".to_string(),
            model: "test-model".to_string(),
            content,
            stop_reason: Some("end_turn".to_string()),
            usage: Usage::default(),
        }
    }

    /// Inert stand-in for a real side-effecting tool.
    fn noop_tool() -> Tool {
        Tool {
            definition: ToolDefinition {
                name: "noop".to_string(),
                description: "do nothing".to_string(),
                input_schema: json!({ "type": "object" }),
            },
            executor: Arc::new(|_input| Box::pin(async move { Ok(json!({ "ok": true })) })),
        }
    }

    fn tool_use(id: &str, name: &str, input: Value) -> ContentBlock {
        ContentBlock::ToolUse {
            id: id.to_string(),
            name: name.to_string(),
            input,
        }
    }

    fn agent_with(backend: Arc<MockBackend>, tools: ToolRegistry) -> Agent {
        Agent::new(
            backend,
            EventBus::new(),
            SettingsHandle::default(),
            AgentConfig::default().with_thinking(false),
            tools,
        )
    }

    #[tokio::test]
    async fn tool_call_then_output_completes_in_two_backend_calls() {
        let backend = MockBackend::new(vec![
            response(vec![tool_use("call_1", "noop", json!({}))]),
            response(vec![tool_use("call_2", "output", json!({ "result": "done" }))]),
        ]);

        let mut tools = ToolRegistry::default();
        tools.register(noop_tool());
        let mut agent = agent_with(backend.clone(), tools);

        let answer = agent.run("do the thing", Some(10)).await.unwrap();
        assert_eq!(answer, "done");
        assert_eq!(backend.requests().len(), 2);

        // assistant tool_use turn, then user tool_result turn, twice over,
        // after the initial prompt.
        let history = agent.history();
        assert_eq!(history.len(), 5);
        assert!(matches!(
            &history[2].content[0],
            ContentBlock::ToolResult { tool_use_id, is_error: false, .. } if tool_use_id == "call_1"
        ));
    }

    #[tokio::test]
    async fn text_only_response_is_the_final_answer() {
        let backend = MockBackend::new(vec![response(vec![
            ContentBlock::text("first part"),
            ContentBlock::text("second part"),
        ])]);
        let mut agent = agent_with(backend, ToolRegistry::default());

        let answer = agent.run("hello", Some(10)).await.unwrap();
        assert_eq!(answer, "first part\nsecond part");
    }

    #[tokio::test]
    async fn last_iteration_forces_the_output_tool() {
        let backend = MockBackend::new(vec![
            response(vec![tool_use("c1", "noop", json!({}))]),
            response(vec![tool_use("c2", "noop", json!({}))]),
            response(vec![tool_use("c3", "output", json!({ "result": "forced" }))]),
        ]);

        let mut tools = ToolRegistry::default();
        tools.register(noop_tool());
        let mut agent = agent_with(backend.clone(), tools);

        let answer = agent.run("work", Some(3)).await.unwrap();
        assert_eq!(answer, "forced");

        let requests = backend.requests();
        assert_eq!(requests.len(), 3);
        let last = &requests[2];
        assert_eq!(
            last.tool_choice,
            Some(ToolChoice::Tool {
                name: "output".to_string()
            })
        );
        let offered = last.tools.as_ref().unwrap();
        assert_eq!(offered.len(), 1);
        assert_eq!(offered[0].name, "output");
        assert!(last.thinking.is_none());
    }

    #[tokio::test]
    async fn unknown_tool_call_is_narrated_not_fatal() {
        let backend = MockBackend::new(vec![
            response(vec![tool_use("c1", "nonexistent", json!({}))]),
            response(vec![tool_use("c2", "output", json!({ "result": "recovered" }))]),
        ]);
        let mut agent = agent_with(backend, ToolRegistry::default());

        let answer = agent.run("go", Some(10)).await.unwrap();
        assert_eq!(answer, "recovered");

        let history = agent.history();
        assert!(matches!(
            &history[2].content[0],
            ContentBlock::ToolResult { is_error: true, content, .. } if content.contains("not found")
        ));
    }

    #[tokio::test]
    async fn output_interleaved_with_other_calls_still_yields_every_result() {
        let backend = MockBackend::new(vec![response(vec![
            tool_use("c1", "output", json!({ "result": "early answer" })),
            tool_use("c2", "noop", json!({})),
        ])]);

        let mut tools = ToolRegistry::default();
        tools.register(noop_tool());
        let mut agent = agent_with(backend, tools);

        let answer = agent.run("go", Some(10)).await.unwrap();
        assert_eq!(answer, "early answer");

        let history = agent.history();
        let results = &history[2].content;
        assert_eq!(results.len(), 2);
        assert!(matches!(
            &results[0],
            ContentBlock::ToolResult { tool_use_id, .. } if tool_use_id == "c1"
        ));
        assert!(matches!(
            &results[1],
            ContentBlock::ToolResult { tool_use_id, is_error: false, .. } if tool_use_id == "c2"
        ));
    }

    #[tokio::test]
    async fn never_edit_mode_withholds_the_editor_from_the_offered_set() {
        let backend = MockBackend::new(vec![response(vec![ContentBlock::text("ok")])]);

        let mut tools = ToolRegistry::default();
        tools.register(noop_tool());
        tools.register(crate::tools::text_editor_tool(
            crate::workspace::Workspace::new("."),
            EventBus::new(),
            SettingsHandle::default(),
        ));

        let settings = SettingsHandle::default();
        settings.set_edit_mode(EditMode::Never);
        let mut agent = Agent::new(
            backend.clone(),
            EventBus::new(),
            settings,
            AgentConfig::default().with_thinking(false),
            tools,
        );

        agent.run("hello", Some(5)).await.unwrap();

        let offered: Vec<String> = backend.requests()[0]
            .tools
            .as_ref()
            .unwrap()
            .iter()
            .map(|definition| definition.name.clone())
            .collect();
        assert!(offered.contains(&"noop".to_string()));
        assert!(offered.contains(&"output".to_string()));
        assert!(!offered.contains(&"text_editor".to_string()));
    }

    #[tokio::test]
    async fn never_edit_mode_resolves_an_editor_call_as_unknown() {
        let backend = MockBackend::new(vec![
            response(vec![tool_use("c1", "text_editor", json!({ "command": "view", "path": "a" }))]),
            response(vec![tool_use("c2", "output", json!({ "result": "moved on" }))]),
        ]);

        let mut tools = ToolRegistry::default();
        tools.register(crate::tools::text_editor_tool(
            crate::workspace::Workspace::new("."),
            EventBus::new(),
            SettingsHandle::default(),
        ));

        let settings = SettingsHandle::default();
        settings.set_edit_mode(EditMode::Never);
        let mut agent = Agent::new(
            backend,
            EventBus::new(),
            settings,
            AgentConfig::default().with_thinking(false),
            tools,
        );

        let answer = agent.run("edit something", Some(10)).await.unwrap();
        assert_eq!(answer, "moved on");
        assert!(matches!(
            &agent.history()[2].content[0],
            ContentBlock::ToolResult { is_error: true, content, .. } if content.contains("not found")
        ));
    }

    #[tokio::test]
    async fn thinking_blocks_are_stripped_when_thinking_is_off() {
        let backend = MockBackend::new(vec![
            response(vec![
                ContentBlock::Thinking {
                    thinking: "private".to_string(),
                    signature: "sig".to_string(),
                },
                tool_use("c1", "noop", json!({})),
            ]),
            response(vec![tool_use("c2", "output", json!({ "result": "fin" }))]),
        ]);

        let mut tools = ToolRegistry::default();
        tools.register(noop_tool());
        let mut agent = agent_with(backend.clone(), tools);

        agent.run("go", Some(10)).await.unwrap();

        // The second request replays history; with thinking disabled no
        // thinking block may survive the strip.
        let second = &backend.requests()[1];
        for message in &second.messages {
            for block in &message.content {
                assert!(!matches!(block, ContentBlock::Thinking { .. }));
            }
        }
        // The stored transcript keeps the thinking block.
        assert!(agent.history().iter().any(|message| {
            message
                .content
                .iter()
                .any(|block| matches!(block, ContentBlock::Thinking { .. }))
        }));
    }

    #[tokio::test]
    async fn unrecognized_content_emits_an_event_and_is_preserved() {
        let backend = MockBackend::new(vec![response(vec![
            ContentBlock::Unrecognized(json!({ "type": "holographic", "payload": 1 })),
            ContentBlock::text("answer"),
        ])]);

        let bus = EventBus::new();
        let buffer = Arc::new(BufferedEventHandler::default());
        bus.add_handler(buffer.clone());

        let mut agent = Agent::new(
            backend,
            bus,
            SettingsHandle::default(),
            AgentConfig::default().with_thinking(false),
            ToolRegistry::default(),
        );

        let answer = agent.run("go", Some(5)).await.unwrap();
        assert_eq!(answer, "answer");
        assert!(buffer.snapshot().iter().any(|event| matches!(
            event,
            AgentEvent::UnknownContent { content_type } if content_type == "holographic"
        )));
        assert!(agent.history()[1]
            .content
            .iter()
            .any(|block| matches!(block, ContentBlock::Unrecognized(_))));
    }

    #[tokio::test]
    async fn budget_exhaustion_without_an_answer_is_fatal() {
        // A forced output step that still fails to answer violates the
        // contract; the scripted final response calls output with bad input.
        let backend = MockBackend::new(vec![
            response(vec![tool_use("c1", "noop", json!({}))]),
            response(vec![tool_use("c2", "output", json!({ "wrong_key": true }))]),
        ]);

        let mut tools = ToolRegistry::default();
        tools.register(noop_tool());
        let mut agent = agent_with(backend, tools);

        let error = agent.run("go", Some(2)).await.unwrap_err();
        assert!(matches!(error, AgentError::BudgetExhausted));
    }

    #[tokio::test]
    async fn final_output_event_is_emitted() {
        let backend = MockBackend::new(vec![response(vec![tool_use(
            "c1",
            "output",
            json!({ "result": "the end" }),
        )])]);

        let bus = EventBus::new();
        let buffer = Arc::new(BufferedEventHandler::default());
        bus.add_handler(buffer.clone());

        let mut agent = Agent::new(
            backend,
            bus,
            SettingsHandle::default(),
            AgentConfig::default().with_thinking(false),
            ToolRegistry::default(),
        );

        agent.run("go", Some(5)).await.unwrap();
        assert!(buffer.snapshot().iter().any(|event| matches!(
            event,
            AgentEvent::FinalOutput { result } if result == "the end"
        )));
    }
}
