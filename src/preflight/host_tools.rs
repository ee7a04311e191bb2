//! Host tool availability checks.

use crate::config::Config;
use crate::process;

use super::types::{Check, Stage};

/// Check the tools the build, image and remote commands shell out to.
pub fn check_host_tools(config: &Config) -> Vec<Check> {
    let mut checks = vec![find_tool(Stage::Image, &config.iso_tool, "grub2-tools", true)];

    // grub-mkrescue writes the ISO through xorriso
    if config.iso_tool.ends_with("grub-mkrescue") {
        checks.push(find_tool(Stage::Image, "xorriso", "xorriso", true));
    }

    // Symbol dumps are opt-in; without them binutils is never invoked
    for tool in ["objdump", "objcopy"] {
        checks.push(find_tool(Stage::Initrd, tool, "binutils", config.dump_symbols));
    }

    checks.push(find_tool(Stage::Remote, "ssh", "openssh-clients", false));
    checks.push(find_tool(Stage::Remote, "sshpass", "sshpass", false));

    checks
}

/// Look `tool` up in PATH. A missing tool blocks `stage` only when `needed`.
fn find_tool(stage: Stage, tool: &str, package: &str, needed: bool) -> Check {
    match process::which(tool) {
        Some(path) => Check::ok(stage, tool, path.display().to_string()),
        None if needed => Check::blocking(
            stage,
            tool,
            format!("not in PATH (install {})", package),
        ),
        None => Check::warning(
            stage,
            tool,
            format!("not in PATH (install {} if you need it)", package),
        ),
    }
}
