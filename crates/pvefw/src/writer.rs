//! Writer for generating firewall file content.
//!
//! Sections are written in the order the Proxmox firewall daemon emits
//! them: `[OPTIONS]`, `[ALIASES]`, `[IPSET ...]`, `[RULES]`. Every section
//! header is followed by a blank line and sections are separated by a
//! blank line. Empty sections are omitted.

use crate::types::{FirewallFile, Rule};
use std::fmt::Write;

/// Render a firewall file to a string.
pub fn write_string(file: &FirewallFile) -> String {
    let mut output = String::new();

    if !file.options.is_empty() {
        start_section(&mut output, "[OPTIONS]");
        for (key, value) in &file.options {
            let _ = writeln!(output, "{key}: {value}");
        }
    }

    if !file.aliases.is_empty() {
        start_section(&mut output, "[ALIASES]");
        for alias in &file.aliases {
            output.push_str(&alias.name);
            output.push(' ');
            output.push_str(&alias.cidr);
            push_comment(&mut output, alias.comment.as_deref());
            output.push('\n');
        }
    }

    for ipset in &file.ipsets {
        let mut header = format!("[IPSET {}]", ipset.name);
        push_comment(&mut header, ipset.comment.as_deref());
        start_section(&mut output, &header);
        for entry in &ipset.entries {
            let _ = writeln!(output, "{entry}");
        }
    }

    if !file.rules.is_empty() {
        start_section(&mut output, "[RULES]");
        for rule in &file.rules {
            let _ = writeln!(output, "{}", rule_line(rule));
        }
    }

    output
}

/// Render a single rule as one line, without a trailing newline.
pub fn rule_line(rule: &Rule) -> String {
    let mut line = String::new();

    if !rule.enabled {
        line.push('|');
    }
    let _ = write!(line, "{} {}", rule.direction.token(), rule.action);

    let flags = [
        ("-i", rule.iface.as_deref()),
        ("-source", rule.source.as_deref()),
        ("-dest", rule.dest.as_deref()),
        ("-p", rule.proto.as_deref()),
        ("-dport", rule.dport.as_deref()),
        ("-sport", rule.sport.as_deref()),
        ("-icmp-type", rule.icmp_type.as_deref()),
        ("-log", rule.log.as_ref().map(|l| l.token())),
    ];
    for (flag, value) in flags {
        if let Some(value) = value {
            let _ = write!(line, " {flag} {value}");
        }
    }

    push_comment(&mut line, rule.comment.as_deref());
    line
}

fn start_section(output: &mut String, header: &str) {
    if !output.is_empty() {
        output.push('\n');
    }
    output.push_str(header);
    output.push_str("\n\n");
}

fn push_comment(output: &mut String, comment: Option<&str>) {
    if let Some(comment) = comment.filter(|c| !c.is_empty()) {
        output.push_str(" # ");
        output.push_str(comment);
    }
}
