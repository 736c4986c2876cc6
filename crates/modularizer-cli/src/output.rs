//! Report writers and colored terminal output.
//!
//! Uses `termcolor` for cross-platform colored terminal output.
//! Respects `NO_COLOR` environment variable and `--color` flag.

use modularizer_engine::{ModuleReport, ReportSink, SplitPackageReport, ViewKind};
use serde::Serialize;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Resolve `ColorChoice` from CLI flag and environment.
///
/// Priority: `NO_COLOR` env > `--color` flag > auto-detect TTY.
pub fn resolve_color_choice(flag: Option<&str>) -> ColorChoice {
    if std::env::var_os("NO_COLOR").is_some() {
        return ColorChoice::Never;
    }
    match flag {
        Some("always") => ColorChoice::Always,
        Some("never") => ColorChoice::Never,
        _ => ColorChoice::Auto,
    }
}

/// Styled output writer for terminal.
pub struct StyledOutput {
    stdout: StandardStream,
}

impl StyledOutput {
    pub fn new(choice: ColorChoice) -> Self {
        Self {
            stdout: StandardStream::stdout(choice),
        }
    }

    /// Write text with a specific color and style.
    pub fn write_styled(&mut self, text: &str, color: Option<Color>, bold: bool) {
        let mut spec = ColorSpec::new();
        spec.set_fg(color).set_bold(bold);
        let _ = self.stdout.set_color(&spec);
        let _ = write!(self.stdout, "{}", text);
        let _ = self.stdout.reset();
    }

    /// Green bold text.
    pub fn success(&mut self, text: &str) {
        self.write_styled(text, Some(Color::Green), true);
    }

    /// Yellow bold text.
    pub fn warning(&mut self, text: &str) {
        self.write_styled(text, Some(Color::Yellow), true);
    }

    /// Cyan text.
    pub fn info(&mut self, text: &str) {
        self.write_styled(text, Some(Color::Cyan), false);
    }

    /// Bold text.
    pub fn bold(&mut self, text: &str) {
        self.write_styled(text, None, true);
    }

    pub fn plain(&mut self, text: &str) {
        let _ = write!(self.stdout, "{}", text);
    }

    pub fn newline(&mut self) {
        let _ = writeln!(self.stdout);
    }

    pub fn flush(&mut self) {
        let _ = self.stdout.flush();
    }

    /// One block per module: name, requires, permits and unit counts
    pub fn module_summary(&mut self, report: &ModuleReport) {
        self.bold(&report.name);
        self.plain(&format!(
            " ({} classes, {} resources)",
            report.classes.len(),
            report.resources.len()
        ));
        self.newline();
        for req in &report.requires {
            self.plain("  requires ");
            for word in &req.modifiers {
                self.info(word);
                self.plain(" ");
            }
            self.plain(&req.view);
            self.newline();
        }
        if !report.permits.is_empty() {
            self.plain(&format!("  permits {}", report.permits.join(", ")));
            self.newline();
        }
        if !report.unresolved.is_empty() {
            self.warning(&format!("  {} unresolved references", report.unresolved.len()));
            self.newline();
        }
    }
}

const PERMITS_PER_LINE: usize = 5;

/// Textual module descriptor
pub fn module_info_text(report: &ModuleReport) -> String {
    let mut out = format!("module {} @ {} {{\n", report.name, report.version);
    for req in &report.requires {
        out.push_str("    requires ");
        for word in &req.modifiers {
            out.push_str(word);
            out.push(' ');
        }
        out.push_str(&req.view);
        out.push_str(";\n");
    }
    write_permits(&mut out, "    ", &report.permits);

    for view in &report.views {
        match view.kind {
            ViewKind::Default => {
                for package in &view.exports {
                    out.push_str(&format!("    exports {};\n", package));
                }
                if let Some(main) = &view.main_class {
                    out.push_str(&format!("    class {};\n", main));
                }
            }
            ViewKind::Internal => {}
            ViewKind::Named => {
                out.push_str(&format!("\n    view {} {{\n", view.name));
                for package in &view.exports {
                    out.push_str(&format!("        exports {};\n", package));
                }
                let permits: Vec<String> = view.permits.iter().cloned().collect();
                write_permits(&mut out, "        ", &permits);
                if let Some(main) = &view.main_class {
                    out.push_str(&format!("        class {};\n", main));
                }
                out.push_str("    }\n");
            }
        }
    }
    out.push_str("}\n");
    out
}

fn write_permits(out: &mut String, indent: &str, permits: &[String]) {
    for (i, chunk) in permits.chunks(PERMITS_PER_LINE).enumerate() {
        if i == 0 {
            out.push_str(&format!("{}permits ", indent));
        } else {
            out.push_str(&format!("{}        ", indent));
        }
        out.push_str(&chunk.join(", "));
        let last = (i + 1) * PERMITS_PER_LINE >= permits.len();
        out.push_str(if last { ";\n" } else { ",\n" });
    }
}

/// Writes one set of list files per module into a directory
pub struct DirectorySink {
    dir: PathBuf,
    written: usize,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, written: 0 })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of modules written so far
    pub fn written(&self) -> usize {
        self.written
    }

    fn write_lines<I, S>(&self, file: &str, lines: I) -> io::Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut text = String::new();
        for line in lines {
            text.push_str(line.as_ref());
            text.push('\n');
        }
        fs::write(self.dir.join(file), text)
    }
}

impl ReportSink for DirectorySink {
    fn begin(&mut self, order: &[String]) -> io::Result<()> {
        self.write_lines("modules.list", order)
    }

    fn module(&mut self, report: &ModuleReport) -> io::Result<()> {
        let name = &report.name;
        self.write_lines(&format!("{}.classlist", name), &report.classes)?;
        self.write_lines(&format!("{}.resources", name), &report.resources)?;
        self.write_lines(
            &format!("{}.unresolved", name),
            report
                .unresolved
                .iter()
                .map(|r| format!("{} -> {}", r.from, r.to)),
        )?;

        let module_dir = self.dir.join(name);
        fs::create_dir_all(&module_dir)?;
        fs::write(module_dir.join("module-info.java"), module_info_text(report))?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self, split_packages: &[SplitPackageReport]) -> io::Result<()> {
        self.write_lines(
            "split-packages.txt",
            split_packages
                .iter()
                .map(|s| format!("{}: {}", s.package, s.modules.join(" "))),
        )
    }
}

#[derive(Serialize)]
struct JsonDocument<'a> {
    order: &'a [String],
    modules: &'a [ModuleReport],
    split_packages: &'a [SplitPackageReport],
}

/// Collects every report and writes one JSON document on finish
pub struct JsonSink<W: Write> {
    writer: W,
    order: Vec<String>,
    modules: Vec<ModuleReport>,
}

impl<W: Write> JsonSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            order: Vec::new(),
            modules: Vec::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ReportSink for JsonSink<W> {
    fn begin(&mut self, order: &[String]) -> io::Result<()> {
        self.order = order.to_vec();
        Ok(())
    }

    fn module(&mut self, report: &ModuleReport) -> io::Result<()> {
        self.modules.push(report.clone());
        Ok(())
    }

    fn finish(&mut self, split_packages: &[SplitPackageReport]) -> io::Result<()> {
        let document = JsonDocument {
            order: &self.order,
            modules: &self.modules,
            split_packages,
        };
        serde_json::to_writer_pretty(&mut self.writer, &document)?;
        writeln!(self.writer)?;
        self.writer.flush()
    }
}
