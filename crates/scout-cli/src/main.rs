use clap::{ArgAction, Parser};
use scout_agent::{
    Agent, AgentConfig, AgentEvent, AgentFactory, ConfirmationDecision, ConfirmationHandler,
    ConfirmationRequest, EditMode, EventBus, EventHandler, SettingsHandle, SubAgentFlavor,
    TodoStore, Tool, ToolError, ToolRegistry, Workspace, bash_tool, glob_tool, grep_tool,
    ping_tool, read_file_tool, sub_agent_tool, text_editor_tool, write_todos_tool,
};
use scout_llm::{AnthropicBackend, Backend};
use std::io::{BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

const EXPLORE_PROMPT: &str = "You are a read-only investigator. Explore the workspace with the \
tools available, answer the question you were given, and do not attempt to change anything.";

const PLAN_PROMPT: &str = "You are a planner. Investigate the workspace as needed, then produce \
a concrete, step-by-step plan for the task you were given. Do not carry the plan out.";

#[derive(Parser, Debug)]
#[command(name = "scout")]
#[command(about = "LLM task agent with shell, file, and delegation tools")]
struct Cli {
    /// Task to run. Omit for an interactive session.
    prompt: Option<String>,

    #[arg(long, default_value_t = 10)]
    max_iterations: usize,

    #[arg(long)]
    model: Option<String>,

    /// Workspace root; defaults to the nearest project root above the
    /// current directory.
    #[arg(long)]
    workspace: Option<PathBuf>,

    #[arg(long, value_parser = clap::value_parser!(EditMode), default_value = "ask")]
    edit_mode: EditMode,

    #[arg(long = "no-thinking", action = ArgAction::SetTrue)]
    no_thinking: bool,

    /// Print tool inputs and outputs, not just activity lines.
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,

    /// Emit events as JSON lines instead of human-readable text.
    #[arg(long, action = ArgAction::SetTrue)]
    event_json: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    let backend = Arc::new(AnthropicBackend::from_env().map_err(|error| error.to_string())?);

    let workspace = match &cli.workspace {
        Some(root) => Workspace::new(root.clone()),
        None => {
            let cwd = std::env::current_dir().map_err(|error| error.to_string())?;
            Workspace::discover(&cwd)
        }
    };

    let bus = EventBus::new();
    bus.add_handler(Arc::new(ConsoleEventHandler {
        verbose: cli.verbose,
        json: cli.event_json,
    }));
    if is_interactive_terminal() {
        bus.set_confirmation_handler(Arc::new(ConsoleConfirmationHandler));
    }

    let settings = SettingsHandle::default();
    settings.set_edit_mode(cli.edit_mode);

    let mut config = AgentConfig::default().with_thinking(!cli.no_thinking);
    if let Some(model) = &cli.model {
        config = config.with_model(model.clone());
    }

    let factory = Arc::new(ConsoleAgentFactory {
        backend: backend.clone(),
        bus: bus.clone(),
        settings: settings.clone(),
        workspace: workspace.clone(),
        config: config.clone(),
    });

    let tools = build_tools(
        &workspace,
        &bus,
        &settings,
        factory.clone(),
        &TodoStore::default(),
    );
    let mut agent = Agent::new(backend, bus, settings.clone(), config, tools);

    match cli.prompt {
        Some(prompt) => {
            let answer = agent
                .run(&prompt, Some(cli.max_iterations))
                .await
                .map_err(|error| error.to_string())?;
            println!("{answer}");
            Ok(())
        }
        None => repl(&mut agent, &settings, cli.max_iterations).await,
    }
}

fn build_tools(
    workspace: &Workspace,
    bus: &EventBus,
    settings: &SettingsHandle,
    factory: Arc<dyn AgentFactory>,
    todos: &TodoStore,
) -> ToolRegistry {
    let mut tools = ToolRegistry::default();
    tools.register(ping_tool());
    tools.register(read_file_tool(workspace.clone(), bus.clone()));
    tools.register(glob_tool(workspace.clone()));
    tools.register(grep_tool(workspace.clone()));
    tools.register(text_editor_tool(
        workspace.clone(),
        bus.clone(),
        settings.clone(),
    ));
    tools.register(bash_tool(bus.clone()));
    tools.register(write_todos_tool(todos.clone(), bus.clone()));
    tools.register(sub_agent_tool(factory, 0));
    tools
}

fn read_only_tools(workspace: &Workspace, bus: &EventBus) -> ToolRegistry {
    let mut tools = ToolRegistry::default();
    tools.register(ping_tool());
    tools.register(read_file_tool(workspace.clone(), bus.clone()));
    tools.register(glob_tool(workspace.clone()));
    tools.register(grep_tool(workspace.clone()));
    tools
}

async fn repl(
    agent: &mut Agent,
    settings: &SettingsHandle,
    max_iterations: usize,
) -> Result<(), String> {
    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).map_err(|e| e.to_string())? == 0 {
            return Ok(());
        }
        let line = line.trim();

        match line {
            "" => continue,
            "exit" | "quit" => return Ok(()),
            "/reset" => {
                agent.reset();
                println!("conversation cleared");
            }
            _ if line.starts_with("/settings") => handle_settings(line, settings),
            _ => match agent.run(line, Some(max_iterations)).await {
                Ok(answer) => println!("{answer}"),
                Err(error) => eprintln!("error: {error}"),
            },
        }
    }
}

fn handle_settings(line: &str, settings: &SettingsHandle) {
    let mut parts = line.split_whitespace().skip(1);
    match (parts.next(), parts.next()) {
        (Some("edit_mode"), Some(value)) => match value.parse::<EditMode>() {
            Ok(mode) => {
                settings.set_edit_mode(mode);
                println!("edit_mode = {mode}");
            }
            Err(error) => eprintln!("{error}"),
        },
        (Some("edit_mode"), None) => println!("edit_mode = {}", settings.edit_mode()),
        _ => eprintln!("usage: /settings edit_mode [ask|always|never]"),
    }
}

struct ConsoleEventHandler {
    verbose: bool,
    json: bool,
}

impl EventHandler for ConsoleEventHandler {
    fn handle(&self, event: &AgentEvent) {
        if self.json {
            if let Ok(line) = serde_json::to_string(event) {
                println!("{line}");
            }
            return;
        }
        match event {
            AgentEvent::ToolStarted { tool_name, input } => {
                if self.verbose {
                    println!("[tool] {tool_name} {input}");
                } else {
                    println!("[tool] {tool_name}");
                }
            }
            AgentEvent::ToolCompleted { tool_name, output } => {
                if self.verbose {
                    let output = output
                        .as_ref()
                        .map(ToString::to_string)
                        .unwrap_or_default();
                    println!("[tool] {tool_name} done: {output}");
                }
            }
            AgentEvent::ToolError { tool_name, error } => {
                println!("[tool] {tool_name} failed: {error}");
            }
            AgentEvent::AssistantMessage { text } => println!("{text}"),
            AgentEvent::FileViewed { path } => {
                if self.verbose {
                    println!("[viewed] {path}");
                }
            }
            AgentEvent::WebSearchError { error_code } => {
                println!("[web search failed: {error_code}]");
            }
            AgentEvent::UnknownContent { content_type } => {
                if self.verbose {
                    println!("[unrecognized content: {content_type}]");
                }
            }
            AgentEvent::FinalOutput { .. } => {}
            AgentEvent::TodosUpdated { todos } => {
                println!("[todos]");
                for todo in todos {
                    let mark = match todo.status {
                        scout_agent::TodoStatus::Todo => " ",
                        scout_agent::TodoStatus::InProgress => "~",
                        scout_agent::TodoStatus::Completed => "x",
                    };
                    println!("  [{mark}] {}", todo.title);
                }
            }
        }
    }
}

struct ConsoleConfirmationHandler;

impl ConfirmationHandler for ConsoleConfirmationHandler {
    fn confirm(&self, request: &ConfirmationRequest) -> ConfirmationDecision {
        println!(
            "[confirm] {} wants to {}{}",
            request.tool_name,
            request.action,
            request
                .path
                .as_deref()
                .map(|path| format!(" {path}"))
                .unwrap_or_default()
        );
        if !request.preview.is_empty() {
            println!("{}", request.preview);
        }
        print!("press Enter to approve, or type 'q [reason]' to decline: ");
        std::io::stdout().flush().ok();

        let mut line = String::new();
        if std::io::stdin().read_line(&mut line).is_err() {
            return ConfirmationDecision::approve();
        }
        let line = line.trim();
        if let Some(rest) = line.strip_prefix('q') {
            let reason = rest.trim();
            ConfirmationDecision::reject(if reason.is_empty() {
                "declined by user"
            } else {
                reason
            })
        } else {
            ConfirmationDecision::approve()
        }
    }
}

/// Maps a delegation flavor to a tool set and system prompt. Every agent it
/// builds shares the parent's bus and settings.
struct ConsoleAgentFactory {
    backend: Arc<dyn Backend>,
    bus: EventBus,
    settings: SettingsHandle,
    workspace: Workspace,
    config: AgentConfig,
}

impl AgentFactory for ConsoleAgentFactory {
    fn build(&self, flavor: SubAgentFlavor, depth: usize) -> Result<Agent, ToolError> {
        let system_prompt = match flavor {
            SubAgentFlavor::Explore => EXPLORE_PROMPT,
            SubAgentFlavor::Plan => PLAN_PROMPT,
        };

        let mut tools = read_only_tools(&self.workspace, &self.bus);
        if depth < self.max_depth() {
            tools.register(nested_sub_agent_tool(self, depth));
        }

        Ok(Agent::new(
            self.backend.clone(),
            self.bus.clone(),
            self.settings.clone(),
            self.config.clone().with_system_prompt(system_prompt),
            tools,
        ))
    }
}

fn nested_sub_agent_tool(factory: &ConsoleAgentFactory, depth: usize) -> Tool {
    let nested = Arc::new(ConsoleAgentFactory {
        backend: factory.backend.clone(),
        bus: factory.bus.clone(),
        settings: factory.settings.clone(),
        workspace: factory.workspace.clone(),
        config: factory.config.clone(),
    });
    sub_agent_tool(nested, depth)
}

fn is_interactive_terminal() -> bool {
    std::io::stdin().is_terminal() && std::io::stdout().is_terminal()
}
