//! `dbtoolbox check` command implementation.
//!
//! Validates tools files without connecting to any database:
//! - YAML parsing, environment expansion and merging
//! - Names and cross references (sources, auth services, toolsets)
//! - Generated MCP input schemas compile as JSON Schema
//! - Warnings for resources nothing refers to

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::Result;
use dbtoolbox_core::{McpManifest, ToolsFile};

/// Severity level for check results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

/// A single check finding.
#[derive(Debug, Clone)]
pub struct CheckFinding {
    pub severity: Severity,
    /// Category of the check that produced this finding.
    pub category: &'static str,
    pub message: String,
    /// Tools file the finding relates to, when known.
    pub file: Option<PathBuf>,
}

impl CheckFinding {
    fn error(category: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            category,
            message: message.into(),
            file: None,
        }
    }

    fn warning(category: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            category,
            message: message.into(),
            file: None,
        }
    }

    fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }
}

/// Results from running all checks.
#[derive(Debug, Default)]
pub struct CheckResults {
    pub findings: Vec<CheckFinding>,
    /// The merged tools file, when it could be loaded at all.
    pub tools_file: Option<ToolsFile>,
}

impl CheckResults {
    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    fn count(&self, severity: Severity) -> usize {
        self.findings.iter().filter(|f| f.severity == severity).count()
    }

    pub fn print_summary(&self) {
        for (severity, title) in [(Severity::Error, "❌ Errors"), (Severity::Warning, "⚠️  Warnings")] {
            let mut group: Vec<_> = self.findings.iter().filter(|f| f.severity == severity).collect();
            if group.is_empty() {
                continue;
            }
            group.sort_by_key(|f| f.category);

            println!("\n{} ({}):", title, group.len());
            println!("{}", "─".repeat(60));
            for finding in group {
                print_finding(finding);
            }
        }

        if let Some(file) = &self.tools_file {
            println!();
            println!(
                "  {} source(s), {} auth service(s), {} tool(s), {} toolset(s)",
                file.sources.len(),
                file.auth_services.len(),
                file.tools.len(),
                file.toolsets.len()
            );
        }

        println!();
        println!("{}", "═".repeat(60));
        if self.findings.is_empty() {
            println!("✅ All checks passed!");
        } else {
            println!(
                "Summary: {} error(s), {} warning(s)",
                self.error_count(),
                self.warning_count()
            );
        }
    }
}

fn print_finding(finding: &CheckFinding) {
    let icon = match finding.severity {
        Severity::Error => "✗",
        Severity::Warning => "⚠",
    };
    let location = finding
        .file
        .as_ref()
        .map(|f| format!(" [{}]", f.display()))
        .unwrap_or_default();

    println!("  {} [{}]{}: {}", icon, finding.category, location, finding.message);
}

/// Run all checks without printing anything.
pub fn run_quiet<P: AsRef<Path>>(paths: &[P]) -> CheckResults {
    let mut results = CheckResults::default();

    let mut merged = ToolsFile::default();
    for path in paths {
        let path = path.as_ref();
        let parsed = ToolsFile::from_file(path).and_then(|file| merged.merge(file));
        if let Err(e) = parsed {
            results
                .findings
                .push(CheckFinding::error("load", e.to_string()).with_file(path));
        }
    }
    if results.has_errors() {
        return results;
    }

    if let Err(e) = merged.validate() {
        results.findings.push(CheckFinding::error("validate", e.to_string()));
        return results;
    }

    results.findings.extend(check_input_schemas(&merged));
    results.findings.extend(check_unused(&merged));
    results.tools_file = Some(merged);
    results
}

/// Every tool's MCP input schema must compile.
fn check_input_schemas(file: &ToolsFile) -> Vec<CheckFinding> {
    let mut findings = Vec::new();

    for (name, tool) in &file.tools {
        let params = match tool.all_parameters() {
            Ok(params) => params,
            Err(e) => {
                findings.push(CheckFinding::error("schema", e.to_string()));
                continue;
            }
        };

        let manifest = McpManifest::new(name, tool.description(), &params);
        if let Err(e) = jsonschema::validator_for(&manifest.input_schema) {
            findings.push(CheckFinding::error(
                "schema",
                format!("tool \"{}\" has an invalid input schema: {}", name, e),
            ));
        }
    }

    findings
}

/// Sources and auth services that nothing refers to, and empty toolsets.
fn check_unused(file: &ToolsFile) -> Vec<CheckFinding> {
    let mut findings = Vec::new();

    let used_sources: BTreeSet<&str> = file.tools.values().map(|t| t.source()).collect();
    for name in file.sources.keys() {
        if !used_sources.contains(name.as_str()) {
            findings.push(CheckFinding::warning(
                "unused",
                format!("source \"{}\" is not used by any tool", name),
            ));
        }
    }

    let mut used_auth: BTreeSet<String> = BTreeSet::new();
    for tool in file.tools.values() {
        used_auth.extend(tool.auth_required().iter().cloned());
        if let Ok(params) = tool.all_parameters() {
            for param in &params {
                used_auth.extend(param.auth_services.iter().map(|s| s.name.clone()));
            }
        }
    }
    for name in file.auth_services.keys() {
        if !used_auth.contains(name) {
            findings.push(CheckFinding::warning(
                "unused",
                format!("auth service \"{}\" is not used by any tool", name),
            ));
        }
    }

    for (name, tools) in &file.toolsets {
        if tools.is_empty() {
            findings.push(CheckFinding::warning("toolset", format!("toolset \"{}\" is empty", name)));
        }
    }

    findings
}

/// Run all checks and print the results.
pub fn run<P: AsRef<Path>>(paths: &[P]) -> Result<()> {
    println!("🔍 Checking tools files...");
    for path in paths {
        println!("  📋 {}", path.as_ref().display());
    }

    let results = run_quiet(paths);
    results.print_summary();

    if results.has_errors() {
        anyhow::bail!("tools file check found {} error(s)", results.error_count());
    }
    Ok(())
}
