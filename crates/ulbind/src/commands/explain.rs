//! Explain command - explain diagnostic codes

use std::collections::HashMap;

use anyhow::{anyhow, Result};
use clap::Args;
use once_cell::sync::Lazy;
use ulbind_diagnostics::DiagnosticCode;

use crate::OutputFormat;

#[derive(Args, Debug)]
pub struct ExplainArgs {
    /// Diagnostic code to explain (e.g., L002, M001)
    pub code: String,
}

struct Explanation {
    code: &'static str,
    title: &'static str,
    description: &'static str,
    example: Option<&'static str>,
    suggestion: Option<&'static str>,
    related: &'static [&'static str],
}

const EXPLANATIONS: &[Explanation] = &[
    // Listener failures
    Explanation {
        code: "L001",
        title: "Listener Returned an Error",
        description: "A listener method returned Err while handling a native callback. The error \
            was logged and the engine received a neutral result; the listener stays registered.",
        example: Some("fn on_change_title(&self, _: &View, title: &str) -> ListenerResult {\n    bail!(\"cannot handle {}\", title)\n}"),
        suggestion: Some("Handle recoverable conditions inside the listener, or return Ok(()) once the error is dealt with."),
        related: &["L002"],
    },
    Explanation {
        code: "L002",
        title: "Listener Panicked",
        description: r#"A listener method panicked while handling a native callback.

The panic was caught at the callback boundary: unwinding into the engine is
undefined behavior. Later events, including those in the same update cycle,
are still delivered to the same listener."#,
        example: Some("fn on_change_url(&self, _: &View, url: &str) -> ListenerResult {\n    let parsed = url.parse::<u32>().unwrap();  // panics on real URLs\n    Ok(())\n}"),
        suggestion: Some("Replace unwrap()/expect() in listeners with `?` so failures are reported as L001."),
        related: &["L001"],
    },
    // Marshalling
    Explanation {
        code: "M001",
        title: "Unknown Enumeration Code",
        description: "A cursor, console message source or console message level arrived with a value \
            this binding does not know. The event was dropped instead of guessing a variant.",
        example: None,
        suggestion: Some("Check that the engine build matches the headers the binding was generated from."),
        related: &["M002"],
    },
    Explanation {
        code: "M002",
        title: "Invalid UTF-8 in String Argument",
        description: "A string argument was not valid UTF-8. It was delivered with every invalid \
            sequence replaced by U+FFFD.",
        example: None,
        suggestion: Some("Usually caused by pages declaring the wrong charset; the event itself is still usable."),
        related: &["M001"],
    },
    // Handles
    Explanation {
        code: "H001",
        title: "Unusable Child View",
        description: r#"A listener answered a child-view request with a view that cannot host it.

The view was already disposed, or it belongs to a different renderer. The
request was denied, exactly as if the listener had returned None."#,
        example: Some("let child = renderer.create_view(w, h, false, false)?;\nchild.dispose();\nOk(Some(child))  // disposed before the engine could adopt it"),
        suggestion: Some("Return a freshly created view from the same renderer and keep a clone of it alive."),
        related: &[],
    },
    Explanation {
        code: "H002",
        title: "No Live Renderer",
        description: "A native callback arrived while no renderer was live on the thread it was \
            raised on. It was ignored.",
        example: None,
        suggestion: Some("Drive update() and render() from the thread that created the renderer, and stop driving the engine after dispose()."),
        related: &[],
    },
];

static BY_CODE: Lazy<HashMap<&'static str, &'static Explanation>> =
    Lazy::new(|| EXPLANATIONS.iter().map(|e| (e.code, e)).collect());

fn lookup(code: &str) -> Option<&'static Explanation> {
    let code = DiagnosticCode::from_code(code)?;
    BY_CODE.get(code.as_str()).copied()
}

pub fn run(args: ExplainArgs, format: OutputFormat, use_color: bool) -> Result<()> {
    let code = args.code.to_uppercase();
    let use_color = use_color && !matches!(format, OutputFormat::Plain);

    let explanation = lookup(&code).ok_or_else(|| anyhow!("Unknown diagnostic code: {}", code))?;
    let severity = DiagnosticCode::from_code(&code)
        .map(|c| c.default_severity().as_str())
        .unwrap_or("error");

    match format {
        OutputFormat::Text | OutputFormat::Plain => {
            if use_color {
                println!(
                    "\n{}: {} ({})\n{}",
                    console::style(&code).bold().cyan(),
                    console::style(explanation.title).bold(),
                    severity,
                    "=".repeat(code.len() + explanation.title.len() + 2)
                );
            } else {
                println!(
                    "\n{}: {} ({})\n{}",
                    code,
                    explanation.title,
                    severity,
                    "=".repeat(code.len() + explanation.title.len() + 2)
                );
            }

            println!("\n{}\n", explanation.description);

            if let Some(example) = explanation.example {
                if use_color {
                    println!("{}:", console::style("Example").bold());
                } else {
                    println!("Example:");
                }
                for line in example.lines() {
                    println!("  {}", line);
                }
                println!();
            }

            if let Some(suggestion) = explanation.suggestion {
                if use_color {
                    println!("{}:", console::style("Suggestion").bold().green());
                } else {
                    println!("Suggestion:");
                }
                for line in suggestion.lines() {
                    println!("  {}", line);
                }
                println!();
            }

            if !explanation.related.is_empty() {
                if use_color {
                    println!(
                        "{}: {}",
                        console::style("Related").dim(),
                        explanation.related.join(", ")
                    );
                } else {
                    println!("Related: {}", explanation.related.join(", "));
                }
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "code": explanation.code,
                "severity": severity,
                "title": explanation.title,
                "description": explanation.description,
                "example": explanation.example,
                "suggestion": explanation.suggestion,
                "related": explanation.related,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
