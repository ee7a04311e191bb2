//! Check outcomes, grouped by the build stage they gate.

use std::fmt;

/// The part of a bootpack build a check guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// `build initrd`: the build tree, /etc, symbol tooling, the output dir.
    Initrd,
    /// `build image`: the kernel image and the ISO tool.
    Image,
    /// `remote`: ssh and sshpass.
    Remote,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Initrd, Stage::Image, Stage::Remote];
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Initrd => "initrd",
            Stage::Image => "image",
            Stage::Remote => "remote",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Ok,
    /// The stage can run but something is off (a missing optional tool or tree).
    Warning,
    /// The stage cannot succeed until this is fixed.
    Blocking,
}

impl Severity {
    fn tag(self) -> &'static str {
        match self {
            Severity::Ok => "ok",
            Severity::Warning => "warn",
            Severity::Blocking => "BLOCK",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Check {
    pub stage: Stage,
    pub subject: String,
    pub severity: Severity,
    pub detail: String,
}

impl Check {
    fn new(stage: Stage, subject: &str, severity: Severity, detail: String) -> Self {
        Self {
            stage,
            subject: subject.to_string(),
            severity,
            detail,
        }
    }

    pub fn ok(stage: Stage, subject: &str, detail: impl Into<String>) -> Self {
        Self::new(stage, subject, Severity::Ok, detail.into())
    }

    pub fn warning(stage: Stage, subject: &str, detail: impl Into<String>) -> Self {
        Self::new(stage, subject, Severity::Warning, detail.into())
    }

    pub fn blocking(stage: Stage, subject: &str, detail: impl Into<String>) -> Self {
        Self::new(stage, subject, Severity::Blocking, detail.into())
    }
}

/// Every check from one preflight run.
#[derive(Debug, Default)]
pub struct PreflightReport {
    checks: Vec<Check>,
}

impl PreflightReport {
    pub fn new(checks: Vec<Check>) -> Self {
        Self { checks }
    }

    pub fn checks(&self) -> &[Check] {
        &self.checks
    }

    pub fn blocking(&self) -> impl Iterator<Item = &Check> {
        self.checks
            .iter()
            .filter(|c| c.severity == Severity::Blocking)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Check> {
        self.checks
            .iter()
            .filter(|c| c.severity == Severity::Warning)
    }

    /// True when nothing blocks any stage.
    pub fn is_ready(&self) -> bool {
        self.blocking().next().is_none()
    }

    pub fn stage_blocked(&self, stage: Stage) -> bool {
        self.blocking().any(|c| c.stage == stage)
    }

    /// Print checks per stage, then which stages can run.
    pub fn print(&self) {
        println!("=== Preflight ===");

        let width = self
            .checks
            .iter()
            .map(|c| c.subject.len())
            .max()
            .unwrap_or(0);

        for stage in Stage::ALL {
            let mut checks = self.checks.iter().filter(|c| c.stage == stage).peekable();
            if checks.peek().is_none() {
                continue;
            }
            println!("\n[{}]", stage);
            for check in checks {
                println!(
                    "  {:<5} {:<width$}  {}",
                    check.severity.tag(),
                    check.subject,
                    check.detail,
                    width = width
                );
            }
        }

        let (blocked, ready): (Vec<Stage>, Vec<Stage>) =
            Stage::ALL.into_iter().partition(|s| self.stage_blocked(*s));
        println!();
        println!("  Ready:    {}", join_stages(&ready));
        println!("  Blocked:  {}", join_stages(&blocked));
        println!("  Warnings: {}", self.warnings().count());
    }
}

fn join_stages(stages: &[Stage]) -> String {
    if stages.is_empty() {
        return "none".to_string();
    }
    stages
        .iter()
        .map(Stage::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
