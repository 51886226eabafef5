//! Replay command - drive a scenario through the headless engine

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{anyhow, Context, Result};
use clap::Args;
use ulbind_core::{
    Config, ConsoleMessage, Cursor, EngineStats, FrameInfo, HeadlessEngine, IntRect, ListenerResult,
    LoadFailure, LoadListener, Renderer, View, ViewListener, CONFIG_FILE,
};
use ulbind_diagnostics::{
    DiagnosticEmitter, Diagnostics, JsonEmitter, MemoryEmitter, SimpleEmitter, TerminalEmitter,
};

use crate::scenario::{Scenario, ViewSpec};
use crate::OutputFormat;

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Scenario file (TOML)
    pub scenario: PathBuf,

    /// Binding configuration file
    #[arg(long, default_value = CONFIG_FILE)]
    pub config: PathBuf,

    /// Fail if any error diagnostic was reported
    #[arg(long)]
    pub strict: bool,

    /// Log native memory statistics before disposing the renderer
    #[arg(long)]
    pub memory: bool,
}

/// Everything the listeners saw, in delivery order.
type Transcript = Rc<RefCell<Vec<String>>>;

/// Prints what a page does, one line per callback.
struct Narrator {
    name: String,
    deny_children: bool,
    transcript: Transcript,
    /// Views opened for accepted child requests; kept alive for the run.
    children: RefCell<Vec<View>>,
}

impl Narrator {
    fn say(&self, line: String) {
        self.transcript.borrow_mut().push(format!("[{}] {}", self.name, line));
    }
}

impl ViewListener for Narrator {
    fn on_change_title(&self, _view: &View, title: &str) -> ListenerResult {
        self.say(format!("title changed: {}", title));
        Ok(())
    }

    fn on_change_url(&self, _view: &View, url: &str) -> ListenerResult {
        self.say(format!("url changed: {}", url));
        Ok(())
    }

    fn on_change_tooltip(&self, _view: &View, tooltip: &str) -> ListenerResult {
        self.say(format!("tooltip: {}", tooltip));
        Ok(())
    }

    fn on_change_cursor(&self, _view: &View, cursor: Cursor) -> ListenerResult {
        self.say(format!("cursor: {}", cursor));
        Ok(())
    }

    fn on_add_console_message(&self, _view: &View, message: &ConsoleMessage) -> ListenerResult {
        self.say(format!(
            "console [{}/{}] {}:{}:{}: {}",
            message.source, message.level, message.source_id, message.line, message.column, message.text
        ));
        Ok(())
    }

    fn on_create_child_view(
        &self,
        view: &View,
        opener_url: &str,
        target_url: &str,
        is_popup: bool,
        rect: Option<IntRect>,
    ) -> ListenerResult<Option<View>> {
        let target = match rect {
            Some(r) => format!("({},{} -> {},{})", r.x, r.y, r.width, r.height),
            None => "NONE".to_string(),
        };
        self.say(format!(
            "wants child: from {} to {} popup={} rect={}",
            opener_url, target_url, is_popup, target
        ));
        if self.deny_children {
            self.say("child request denied".to_string());
            return Ok(None);
        }

        let (width, height) = match rect {
            Some(r) if r.width > 0 && r.height > 0 => (r.width, r.height),
            _ => (view.width()?, view.height()?),
        };
        let child = view.renderer()?.create_view_default(width, height, false)?;
        child.set_listener(Some(Rc::new(Narrator {
            name: format!("{}/child{}", self.name, self.children.borrow().len()),
            deny_children: true,
            transcript: Rc::clone(&self.transcript),
            children: RefCell::new(Vec::new()),
        })))?;
        self.say(format!("child opened as {}", child.handle()?));
        self.children.borrow_mut().push(child.clone());
        Ok(Some(child))
    }
}

impl LoadListener for Narrator {
    fn on_begin_loading(&self, _view: &View, frame: &FrameInfo) -> ListenerResult {
        self.say(format!("begin loading frame {} {}", frame.frame_id, frame.url));
        Ok(())
    }

    fn on_finish_loading(&self, _view: &View, frame: &FrameInfo) -> ListenerResult {
        self.say(format!("finished loading frame {}", frame.frame_id));
        Ok(())
    }

    fn on_fail_loading(&self, _view: &View, frame: &FrameInfo, failure: &LoadFailure) -> ListenerResult {
        self.say(format!(
            "failed loading frame {}: {} ({} {})",
            frame.frame_id, failure.description, failure.error_domain, failure.error_code
        ));
        Ok(())
    }

    fn on_dom_ready(&self, _view: &View, frame: &FrameInfo) -> ListenerResult {
        self.say(format!("dom ready (main frame: {})", frame.is_main_frame));
        Ok(())
    }

    fn on_update_history(&self, _view: &View) -> ListenerResult {
        self.say("history updated".to_string());
        Ok(())
    }
}

struct ReplayOutcome {
    transcript: Vec<String>,
    diagnostics: Diagnostics,
    stats: EngineStats,
    cycles: u32,
}

fn open_view(renderer: &Renderer, entry: &ViewSpec, transcript: &Transcript) -> Result<View> {
    let view = renderer
        .create_view_default(entry.width, entry.height, entry.transparent)
        .with_context(|| format!("Could not create view `{}`", entry.name))?;
    let narrator = Rc::new(Narrator {
        name: entry.name.clone(),
        deny_children: entry.deny_children,
        transcript: Rc::clone(transcript),
        children: RefCell::new(Vec::new()),
    });
    view.set_listener(Some(narrator.clone()))?;
    view.set_load_listener(Some(narrator))?;

    if let Some(html) = &entry.html {
        view.load_html(html)?;
    }
    if let Some(url) = &entry.url {
        view.load_url(url)?;
    }
    log::debug!("opened view `{}` as {}", entry.name, view.handle()?);
    Ok(view)
}

fn replay(scenario: &Scenario, config: Config, memory: bool) -> Result<ReplayOutcome> {
    let engine = Rc::new(HeadlessEngine::new());
    let renderer = Renderer::create(engine.clone(), config)?;
    let sink = MemoryEmitter::new();
    renderer.set_diagnostics(Box::new(sink.clone()));

    let transcript: Transcript = Rc::new(RefCell::new(Vec::new()));
    let mut views = HashMap::new();
    for entry in &scenario.views {
        views.insert(entry.name.as_str(), open_view(&renderer, entry, &transcript)?);
    }

    let cycles = scenario.total_cycles();
    for cycle in 0..cycles {
        for scripted in scenario.events_in(cycle) {
            let view = views
                .get(scripted.view.as_str())
                .ok_or_else(|| anyhow!("Unknown view `{}`", scripted.view))?;
            if !engine.queue_event(view.handle()?, scripted.event.clone()) {
                log::warn!("view `{}` is gone, event dropped", scripted.view);
            }
        }
        renderer.update()?;
        renderer.render()?;
    }

    if memory {
        renderer.log_memory_usage()?;
    }
    renderer.dispose()?;

    let transcript = transcript.take();
    Ok(ReplayOutcome {
        transcript,
        diagnostics: sink.take(),
        stats: engine.stats(),
        cycles,
    })
}

/// Everything as JSON lines: the transcript, each diagnostic, the
/// diagnostic summary, then the replay summary.
fn write_json<W: Write>(outcome: &ReplayOutcome, mut out: W) -> Result<()> {
    for line in &outcome.transcript {
        serde_json::to_writer(&mut out, &serde_json::json!({ "transcript": line }))?;
        writeln!(out)?;
    }

    let mut emitter = JsonEmitter::new(&mut out);
    emitter.emit_all(&outcome.diagnostics)?;
    emitter.emit_summary(&outcome.diagnostics)?;

    let replay = serde_json::json!({
        "replay": {
            "cycles": outcome.cycles,
            "stats": outcome.stats,
        }
    });
    serde_json::to_writer(&mut out, &replay)?;
    writeln!(out)?;
    Ok(())
}

fn print_stats(outcome: &ReplayOutcome, use_color: bool) {
    let stats = &outcome.stats;
    let headline = format!("Replayed {} cycle(s)", outcome.cycles);
    if use_color {
        print!("{}", console::style(headline).green().bold());
    } else {
        print!("{}", headline);
    }
    println!(
        ": {} object(s) created, {} destroyed, {} add_ref / {} release, {} child request(s) accepted, {} denied",
        stats.created,
        stats.destroyed,
        stats.add_refs,
        stats.releases,
        stats.accepted_children,
        stats.denied_children
    );
}

pub fn run(args: ReplayArgs, format: OutputFormat, use_color: bool, quiet: bool) -> Result<()> {
    let config = Config::load_or_default(&args.config)?;
    let scenario = Scenario::load(&args.scenario)?;
    let outcome = replay(&scenario, config, args.memory)?;

    match format {
        OutputFormat::Text | OutputFormat::Plain => {
            if !quiet {
                for line in &outcome.transcript {
                    println!("{}", line);
                }
                println!();
            }

            let stderr = std::io::stderr();
            let mut emitter: Box<dyn DiagnosticEmitter> = match format {
                OutputFormat::Plain => Box::new(SimpleEmitter::new(stderr.lock())),
                _ => Box::new(TerminalEmitter::new(stderr.lock(), use_color)),
            };
            emitter.emit_all(&outcome.diagnostics)?;
            emitter.emit_summary(&outcome.diagnostics)?;

            if !quiet {
                print_stats(&outcome, use_color && matches!(format, OutputFormat::Text));
            }
        }
        OutputFormat::Json => {
            let stdout = std::io::stdout();
            write_json(&outcome, stdout.lock())?;
        }
    }

    if args.strict && outcome.diagnostics.has_errors() {
        return Err(anyhow!(
            "Replay reported {} error(s)",
            outcome.diagnostics.error_count()
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, MutexGuard};

    use ulbind_diagnostics::DiagnosticCode;

    /// One renderer per process; replays must not overlap.
    static SERIAL: Mutex<()> = Mutex::new(());

    fn serial() -> MutexGuard<'static, ()> {
        SERIAL.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[test]
    fn test_replay_title_and_denied_child() {
        let _serial = serial();
        let scenario = Scenario::from_toml_str(
            r#"
[[views]]
name = "main"
html = "<title>Hello</title>"

[[events]]
view = "main"
cycle = 1
kind = "child_view"
opener_url = "https://example.com/"
target_url = "https://example.com/popup"
is_popup = true
"#,
        )
        .unwrap();

        let outcome = replay(&scenario, Config::default(), false).unwrap();
        assert_eq!(outcome.cycles, 2);
        assert!(outcome.transcript.contains(&"[main] title changed: Hello".to_string()));
        assert!(outcome.transcript.contains(&"[main] child request denied".to_string()));
        assert_eq!(outcome.stats.denied_children, 1);
        assert_eq!(outcome.stats.created, outcome.stats.destroyed);
        assert!(outcome.diagnostics.is_empty());
    }

    #[test]
    fn test_replay_accepted_child_and_bad_codes() {
        let _serial = serial();
        let scenario = Scenario::from_toml_str(
            r#"
[[views]]
name = "main"
deny_children = false

[[events]]
view = "main"
kind = "child_view"
opener_url = "a"
target_url = "b"
rect = { x = 5, y = 5, width = 200, height = 100 }

[[events]]
view = "main"
kind = "cursor"
cursor = 500

[[events]]
view = "main"
kind = "title_bytes"
bytes = [104, 255, 105]
"#,
        )
        .unwrap();

        let outcome = replay(&scenario, Config::default(), false).unwrap();
        assert_eq!(outcome.stats.accepted_children, 1);
        assert!(outcome
            .transcript
            .iter()
            .any(|l| l.starts_with("[main] child opened as")));
        assert!(outcome.transcript.contains(&"[main] title changed: h\u{fffd}i".to_string()));
        assert_eq!(outcome.diagnostics.count_code(DiagnosticCode::UnknownEnumCode), 1);
        assert_eq!(outcome.diagnostics.count_code(DiagnosticCode::InvalidUtf8), 1);
        assert_eq!(outcome.stats.created, outcome.stats.destroyed);
    }

    #[test]
    fn test_json_output_is_json_lines() {
        let _serial = serial();
        let scenario = Scenario::from_toml_str(
            r#"
[[views]]
name = "main"
html = "<title>Lines</title>"

[[events]]
view = "main"
kind = "cursor"
cursor = 999
"#,
        )
        .unwrap();
        let outcome = replay(&scenario, Config::default(), false).unwrap();

        let mut out = Vec::new();
        write_json(&outcome, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let values: Vec<serde_json::Value> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert!(values.iter().any(|v| v["transcript"] == "[main] title changed: Lines"));
        assert!(values.iter().any(|v| v["code"] == "M001"));
        assert!(values.iter().any(|v| v["summary"]["total"] == 1));
        let last = values.last().unwrap();
        assert_eq!(last["replay"]["cycles"], 1);
        assert_eq!(last["replay"]["stats"]["created"], last["replay"]["stats"]["destroyed"]);
    }
}
