use std::collections::HashMap;
use std::path::Path;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};

use remotecard_engine::{
    EntityState, HistoryEntry, IdentityEngine, RecordingInvoker, RecordingUi, RemoteElement,
    ServiceInvoker, SharedStore, Signal, StaticStateStore, SystemClock, UiHost,
};
use remotecard_model::{Bindings, ElementConfig, InteractionKind, Scalar};

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Remote-control panel engine toolchain.
#[derive(Parser)]
#[command(name = "remotecard", version, about = "Remote-control panel engine CLI")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive an element's value from a state snapshot
    Value {
        /// Path to the element configuration (YAML or JSON)
        config: std::path::PathBuf,
        /// Path to the entity states JSON file
        #[arg(long)]
        states: std::path::PathBuf,
    },

    /// Render a template string against an element's context
    Render {
        /// Path to the element configuration (YAML or JSON)
        config: std::path::PathBuf,
        /// Path to the entity states JSON file
        #[arg(long)]
        states: std::path::PathBuf,
        /// The template string to render
        template: String,
    },

    /// Dispatch an interaction and show the resulting effects
    Simulate {
        /// Path to the element configuration (YAML or JSON)
        config: std::path::PathBuf,
        /// Path to the entity states JSON file
        #[arg(long)]
        states: std::path::PathBuf,
        /// Interaction to dispatch (tap, hold, double_tap, ...)
        #[arg(long, default_value = "tap")]
        interaction: String,
        /// Remote entity id binding
        #[arg(long)]
        remote_id: Option<String>,
        /// Media player entity id binding
        #[arg(long)]
        media_player_id: Option<String>,
        /// Current user id, matched against confirmation exemptions
        #[arg(long)]
        user_id: Option<String>,
        /// Autofill the bound entity into targetless service calls
        #[arg(long)]
        autofill: bool,
        /// Deny confirmation prompts instead of approving them
        #[arg(long)]
        deny: bool,
        /// Scripted response for text prompts (textbox, search)
        #[arg(long)]
        text_response: Option<String>,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Value { config, states } => {
            cmd_value(&config, &states, cli.output, cli.quiet);
        }
        Commands::Render {
            config,
            states,
            template,
        } => {
            cmd_render(&config, &states, &template, cli.output, cli.quiet);
        }
        Commands::Simulate {
            config,
            states,
            interaction,
            remote_id,
            media_player_id,
            user_id,
            autofill,
            deny,
            text_response,
        } => {
            let bindings = Bindings {
                remote_id,
                media_player_id,
                autofill_entity_id: autofill.then_some(Scalar::Bool(true)),
                user_id,
            };
            cmd_simulate(SimulateOptions {
                config: &config,
                states: &states,
                interaction: &interaction,
                bindings,
                deny,
                text_response: text_response.as_deref(),
                output: cli.output,
                quiet: cli.quiet,
            });
        }
    }
}

fn cmd_value(config_path: &Path, states_path: &Path, output: OutputFormat, quiet: bool) {
    let (mut element, _, _) = build_element(config_path, states_path, output, quiet);

    let rt = tokio::runtime::Runtime::new().expect("failed to create tokio runtime");
    rt.block_on(async {
        element.refresh_value();
        element.teardown();
    });

    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => match element.value() {
            Some(value) => println!("{value}"),
            None => println!("(none)"),
        },
        OutputFormat::Json => {
            let json = serde_json::json!({
                "entity_id": element.entity_id(),
                "value": element.value().map(|v| v.to_json()),
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&json).unwrap_or_default()
            );
        }
    }
}

fn cmd_render(
    config_path: &Path,
    states_path: &Path,
    template: &str,
    output: OutputFormat,
    quiet: bool,
) {
    let (mut element, _, _) = build_element(config_path, states_path, output, quiet);

    let rt = tokio::runtime::Runtime::new().expect("failed to create tokio runtime");
    rt.block_on(async {
        element.refresh_value();
        element.teardown();
    });

    let rendered = element.renderer(None).render_str(template);
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => match &rendered {
            serde_json::Value::String(s) => println!("{s}"),
            other => println!("{other}"),
        },
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({ "rendered": rendered }))
                    .unwrap_or_default()
            );
        }
    }
}

struct SimulateOptions<'a> {
    config: &'a Path,
    states: &'a Path,
    interaction: &'a str,
    bindings: Bindings,
    deny: bool,
    text_response: Option<&'a str>,
    output: OutputFormat,
    quiet: bool,
}

fn cmd_simulate(opts: SimulateOptions<'_>) {
    let interaction: InteractionKind = match opts.interaction.parse() {
        Ok(kind) => kind,
        Err(e) => {
            report_error(&e, opts.output, opts.quiet);
            process::exit(1);
        }
    };

    let config = load_config(opts.config, opts.output, opts.quiet);
    let states = load_states(opts.states, opts.output, opts.quiet);

    let store: SharedStore = Arc::new(StaticStateStore::from_states(states));
    let invoker = Arc::new(RecordingInvoker::new());
    let ui = Arc::new(RecordingUi::new());
    if opts.deny {
        ui.deny_confirmations();
    }
    if let Some(text) = opts.text_response {
        ui.respond_with_text(text);
    }

    let mut element = RemoteElement::new(
        store,
        Arc::new(IdentityEngine),
        Arc::clone(&invoker) as Arc<dyn ServiceInvoker>,
        Arc::clone(&ui) as Arc<dyn UiHost>,
    )
    .with_clock(Arc::new(SystemClock));
    element.set_bindings(opts.bindings);

    let rt = tokio::runtime::Runtime::new().expect("failed to create tokio runtime");
    let result = rt.block_on(async {
        element.apply_config(config);
        element.press_started();
        // A synthetic press window so HOLD_SECS has something to carry.
        tokio::time::sleep(Duration::from_millis(10)).await;
        element.press_finished();
        let result = element.dispatch(interaction).await;
        element.teardown();
        result
    });

    if let Err(e) = &result {
        report_error(&format!("dispatch error: {e}"), opts.output, opts.quiet);
    }

    if !opts.quiet {
        match opts.output {
            OutputFormat::Text => print_effects_text(&invoker, &ui),
            OutputFormat::Json => print_effects_json(&invoker, &ui, result.is_ok()),
        }
    }
    if result.is_err() {
        process::exit(1);
    }
}

fn print_effects_text(invoker: &RecordingInvoker, ui: &RecordingUi) {
    let calls = invoker.calls();
    if calls.is_empty() {
        println!("no service calls");
    } else {
        println!("{} service call(s):", calls.len());
        for call in &calls {
            let data = serde_json::to_string(&call.data).unwrap_or_default();
            match &call.target {
                Some(target) => {
                    let target = serde_json::to_string(target).unwrap_or_default();
                    println!("  {}.{} data={} target={}", call.domain, call.service, data, target);
                }
                None => println!("  {}.{} data={}", call.domain, call.service, data),
            }
        }
    }

    for entry in ui.history() {
        match entry {
            HistoryEntry::Push(path) => println!("history push: {path}"),
            HistoryEntry::Replace(path) => println!("history replace: {path}"),
        }
    }
    for url in ui.opened_urls() {
        println!("opened: {url}");
    }
    for url in ui.opened_in_place() {
        println!("opened in place: {url}");
    }
    for signal in ui.signals() {
        match signal {
            Signal::LocationChanged { replace } => {
                println!("signal: location-changed (replace={replace})")
            }
            Signal::MoreInfo { entity_id } => println!("signal: more-info ({entity_id})"),
            Signal::DialogOpen { .. } => println!("signal: dialog-open"),
            Signal::Custom { name, .. } => println!("signal: {name}"),
        }
    }
    for haptic in ui.haptics() {
        println!("haptic: {}", serde_json::to_string(&haptic).unwrap_or_default());
    }
    for prompt in ui.prompts() {
        println!("prompt: {prompt}");
    }
}

fn print_effects_json(invoker: &RecordingInvoker, ui: &RecordingUi, ok: bool) {
    let calls: Vec<serde_json::Value> = invoker
        .calls()
        .iter()
        .map(|call| {
            serde_json::json!({
                "domain": call.domain,
                "service": call.service,
                "data": call.data,
                "target": call.target,
            })
        })
        .collect();
    let signals: Vec<serde_json::Value> = ui
        .signals()
        .iter()
        .map(|signal| match signal {
            Signal::LocationChanged { replace } => {
                serde_json::json!({ "signal": "location-changed", "replace": replace })
            }
            Signal::MoreInfo { entity_id } => {
                serde_json::json!({ "signal": "more-info", "entity_id": entity_id })
            }
            Signal::DialogOpen { action } => {
                serde_json::json!({ "signal": "dialog-open", "action": action })
            }
            Signal::Custom { name, action } => {
                serde_json::json!({ "signal": name, "action": action })
            }
        })
        .collect();
    let history: Vec<serde_json::Value> = ui
        .history()
        .iter()
        .map(|entry| match entry {
            HistoryEntry::Push(path) => serde_json::json!({ "push": path }),
            HistoryEntry::Replace(path) => serde_json::json!({ "replace": path }),
        })
        .collect();

    let json = serde_json::json!({
        "ok": ok,
        "calls": calls,
        "signals": signals,
        "history": history,
        "opened": ui.opened_urls(),
        "opened_in_place": ui.opened_in_place(),
        "haptics": ui.haptics(),
        "prompts": ui.prompts(),
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&json).unwrap_or_default()
    );
}

fn build_element(
    config_path: &Path,
    states_path: &Path,
    output: OutputFormat,
    quiet: bool,
) -> (RemoteElement, Arc<RecordingInvoker>, Arc<RecordingUi>) {
    let config = load_config(config_path, output, quiet);
    let states = load_states(states_path, output, quiet);

    let store: SharedStore = Arc::new(StaticStateStore::from_states(states));
    let invoker = Arc::new(RecordingInvoker::new());
    let ui = Arc::new(RecordingUi::new());
    let mut element = RemoteElement::new(
        store,
        Arc::new(IdentityEngine),
        Arc::clone(&invoker) as Arc<dyn ServiceInvoker>,
        Arc::clone(&ui) as Arc<dyn UiHost>,
    );
    element.set_config(config);
    (element, invoker, ui)
}

fn load_config(path: &Path, output: OutputFormat, quiet: bool) -> ElementConfig {
    let raw = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            let msg = format!("error reading '{}': {}", path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };

    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    let parsed = if is_yaml {
        serde_yaml::from_str(&raw).map_err(|e| e.to_string())
    } else {
        serde_json::from_str(&raw).map_err(|e| e.to_string())
    };
    match parsed {
        Ok(config) => config,
        Err(e) => {
            let msg = format!("error parsing '{}': {}", path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    }
}

fn load_states(path: &Path, output: OutputFormat, quiet: bool) -> HashMap<String, EntityState> {
    let raw = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            let msg = format!("error reading '{}': {}", path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };
    match serde_json::from_str(&raw) {
        Ok(states) => states,
        Err(e) => {
            let msg = format!("error parsing JSON in '{}': {}", path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    }
}

fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{msg}"),
        OutputFormat::Json => {
            eprintln!("{{\"error\": \"{}\"}}", msg.replace('"', "\\\""));
        }
    }
}
