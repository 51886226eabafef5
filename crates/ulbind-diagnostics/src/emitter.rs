//! Diagnostic emitters for different output formats.

use crate::diagnostic::{Diagnostic, Diagnostics, Severity};
use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

/// Trait for emitting diagnostics in various formats.
pub trait DiagnosticEmitter {
    /// Emit a single diagnostic.
    fn emit(&mut self, diagnostic: &Diagnostic) -> std::io::Result<()>;

    /// Emit multiple diagnostics.
    fn emit_all(&mut self, diagnostics: &Diagnostics) -> std::io::Result<()> {
        for diag in diagnostics.iter() {
            self.emit(diag)?;
        }
        Ok(())
    }

    /// Emit a summary line.
    fn emit_summary(&mut self, diagnostics: &Diagnostics) -> std::io::Result<()>;
}

/// Forwards diagnostics to the `log` facade. The default sink of a renderer.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEmitter;

impl LogEmitter {
    pub fn new() -> Self {
        Self
    }
}

impl DiagnosticEmitter for LogEmitter {
    fn emit(&mut self, diagnostic: &Diagnostic) -> std::io::Result<()> {
        let level = match diagnostic.severity {
            Severity::Error => log::Level::Error,
            Severity::Warning => log::Level::Warn,
            Severity::Hint => log::Level::Info,
        };
        match &diagnostic.origin {
            Some(origin) => log::log!(
                level,
                "[{}] {} ({})",
                diagnostic.code,
                diagnostic.message,
                origin
            ),
            None => log::log!(level, "[{}] {}", diagnostic.code, diagnostic.message),
        }
        Ok(())
    }

    fn emit_summary(&mut self, diagnostics: &Diagnostics) -> std::io::Result<()> {
        log::info!(
            "{} error(s), {} warning(s)",
            diagnostics.error_count(),
            diagnostics.warning_count()
        );
        Ok(())
    }
}

/// Rich terminal output with colors.
pub struct TerminalEmitter<W: Write> {
    writer: W,
    colored: bool,
}

impl<W: Write> TerminalEmitter<W> {
    /// Create a new terminal emitter.
    pub fn new(writer: W, colored: bool) -> Self {
        Self { writer, colored }
    }

    /// Get ANSI color code for severity.
    fn severity_color(&self, severity: Severity) -> &'static str {
        if !self.colored {
            return "";
        }
        match severity {
            Severity::Error => "\x1b[31m",   // Red
            Severity::Warning => "\x1b[33m", // Yellow
            Severity::Hint => "\x1b[34m",    // Blue
        }
    }

    fn reset(&self) -> &'static str {
        if self.colored {
            "\x1b[0m"
        } else {
            ""
        }
    }

    fn bold(&self) -> &'static str {
        if self.colored {
            "\x1b[1m"
        } else {
            ""
        }
    }

    fn cyan(&self) -> &'static str {
        if self.colored {
            "\x1b[36m"
        } else {
            ""
        }
    }
}

impl<W: Write> DiagnosticEmitter for TerminalEmitter<W> {
    fn emit(&mut self, diagnostic: &Diagnostic) -> std::io::Result<()> {
        let color = self.severity_color(diagnostic.severity);
        let reset = self.reset();
        let bold = self.bold();
        let cyan = self.cyan();

        // Header: error[L001]: message
        writeln!(
            self.writer,
            "{}{}{}[{}]{}: {}",
            bold,
            color,
            diagnostic.severity.as_str(),
            diagnostic.code.as_str(),
            reset,
            diagnostic.message
        )?;

        // Origin: --> callback@handle
        if let Some(ref origin) = diagnostic.origin {
            writeln!(self.writer, "  {}-->{} {}", cyan, reset, origin)?;
        }

        for note in &diagnostic.notes {
            writeln!(self.writer, "  {}= note:{} {}", cyan, reset, note)?;
        }

        if let Some(ref help) = diagnostic.help {
            writeln!(self.writer, "  {}= help:{} {}", cyan, reset, help)?;
        }

        writeln!(self.writer)?;
        Ok(())
    }

    fn emit_summary(&mut self, diagnostics: &Diagnostics) -> std::io::Result<()> {
        let errors = diagnostics.error_count();
        let warnings = diagnostics.warning_count();

        let color = if errors > 0 {
            self.severity_color(Severity::Error)
        } else if warnings > 0 {
            self.severity_color(Severity::Warning)
        } else {
            ""
        };
        let reset = self.reset();

        if errors > 0 || warnings > 0 {
            write!(self.writer, "{}", color)?;
            if errors > 0 {
                write!(
                    self.writer,
                    "{} error{}",
                    errors,
                    if errors == 1 { "" } else { "s" }
                )?;
            }
            if errors > 0 && warnings > 0 {
                write!(self.writer, " and ")?;
            }
            if warnings > 0 {
                write!(
                    self.writer,
                    "{} warning{}",
                    warnings,
                    if warnings == 1 { "" } else { "s" }
                )?;
            }
            writeln!(self.writer, " reported{}", reset)?;
        }

        Ok(())
    }
}

/// JSON output (one object per line) for tooling integration.
pub struct JsonEmitter<W: Write> {
    writer: W,
}

impl<W: Write> JsonEmitter<W> {
    /// Create a new JSON emitter.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write> DiagnosticEmitter for JsonEmitter<W> {
    fn emit(&mut self, diagnostic: &Diagnostic) -> std::io::Result<()> {
        let json = serde_json::json!({
            "code": diagnostic.code.as_str(),
            "severity": diagnostic.severity.as_str(),
            "message": diagnostic.message,
            "origin": diagnostic.origin.as_ref().map(|o| serde_json::json!({
                "handle": o.handle,
                "callback": o.callback,
            })),
            "help": diagnostic.help,
            "notes": diagnostic.notes,
        });

        serde_json::to_writer(&mut self.writer, &json)?;
        writeln!(self.writer)?;
        Ok(())
    }

    fn emit_summary(&mut self, diagnostics: &Diagnostics) -> std::io::Result<()> {
        let json = serde_json::json!({
            "summary": {
                "errors": diagnostics.error_count(),
                "warnings": diagnostics.warning_count(),
                "total": diagnostics.len(),
            }
        });
        serde_json::to_writer(&mut self.writer, &json)?;
        writeln!(self.writer)?;
        Ok(())
    }
}

/// Simple text output (one line per diagnostic).
pub struct SimpleEmitter<W: Write> {
    writer: W,
}

impl<W: Write> SimpleEmitter<W> {
    /// Create a new simple emitter.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write> DiagnosticEmitter for SimpleEmitter<W> {
    fn emit(&mut self, diagnostic: &Diagnostic) -> std::io::Result<()> {
        if let Some(ref origin) = diagnostic.origin {
            writeln!(
                self.writer,
                "{}: {}: {} [{}]",
                origin,
                diagnostic.severity.as_str(),
                diagnostic.message,
                diagnostic.code.as_str()
            )
        } else {
            writeln!(
                self.writer,
                "{}: {} [{}]",
                diagnostic.severity.as_str(),
                diagnostic.message,
                diagnostic.code.as_str()
            )
        }
    }

    fn emit_summary(&mut self, diagnostics: &Diagnostics) -> std::io::Result<()> {
        writeln!(
            self.writer,
            "{} error(s), {} warning(s)",
            diagnostics.error_count(),
            diagnostics.warning_count()
        )
    }
}

/// Collects diagnostics in memory. Clones share the same buffer, so one clone
/// can be handed to a renderer while another is inspected afterwards.
#[derive(Debug, Clone, Default)]
pub struct MemoryEmitter {
    items: Rc<RefCell<Diagnostics>>,
}

impl MemoryEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything collected so far.
    pub fn snapshot(&self) -> Diagnostics {
        self.items.borrow().clone()
    }

    /// Remove and return everything collected so far.
    pub fn take(&self) -> Diagnostics {
        std::mem::take(&mut *self.items.borrow_mut())
    }
}

impl DiagnosticEmitter for MemoryEmitter {
    fn emit(&mut self, diagnostic: &Diagnostic) -> std::io::Result<()> {
        self.items.borrow_mut().push(diagnostic.clone());
        Ok(())
    }

    fn emit_summary(&mut self, _diagnostics: &Diagnostics) -> std::io::Result<()> {
        Ok(())
    }
}
