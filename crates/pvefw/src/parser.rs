//! Parser for Proxmox firewall files.
//!
//! Handles the line-oriented format written by the Proxmox firewall:
//! ```text
//! [OPTIONS]
//! enable: 1
//!
//! [IPSET management]
//! 192.168.1.0/24
//!
//! [RULES]
//! IN SSH(ACCEPT) -source +management # SSH
//! |OUT DROP -p udp -dport 53
//! ```
//!
//! Security group (`[group ...]`) and rule `GROUP` references are not
//! supported and are reported as parse errors.

use crate::error::{Error, Result};
use crate::types::{Alias, Direction, FirewallFile, IpSet, Rule, RuleAction, Verdict};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Options,
    Aliases,
    IpSet,
    Rules,
}

/// Parse a firewall file from a string.
pub fn parse_string(content: &str) -> Result<FirewallFile> {
    let mut file = FirewallFile::new();
    let mut section = Section::None;

    for (index, raw) in content.lines().enumerate() {
        let line_num = index + 1;
        let line = raw.trim();

        // Skip empty lines and full-line comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if line.starts_with('[') {
            section = parse_header(line, line_num, &mut file)?;
            continue;
        }

        match section {
            Section::None => {
                return Err(Error::parse(line_num, "content outside of any section"));
            }
            Section::Options => {
                let (key, value) = line
                    .split_once(':')
                    .ok_or_else(|| Error::parse(line_num, "expected 'key: value'"))?;
                file.set_option(key.trim(), value.trim());
            }
            Section::Aliases => file.aliases.push(parse_alias(line, line_num)?),
            Section::IpSet => {
                let (entry, _) = split_comment(line);
                if let Some(ipset) = file.ipsets.last_mut() {
                    ipset.entries.push(entry.to_string());
                }
            }
            Section::Rules => file.rules.push(parse_rule(line, line_num)?),
        }
    }

    Ok(file)
}

/// Parse a `[SECTION]` header, registering new IP sets on the file.
fn parse_header(line: &str, line_num: usize, file: &mut FirewallFile) -> Result<Section> {
    let (header, comment) = split_comment(line);
    let inner = header
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .ok_or_else(|| Error::parse(line_num, "unterminated section header"))?
        .trim();

    let (name, arg) = match inner.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, Some(arg.trim())),
        None => (inner, None),
    };

    match (name.to_ascii_uppercase().as_str(), arg) {
        ("OPTIONS", None) => Ok(Section::Options),
        ("ALIASES", None) => Ok(Section::Aliases),
        ("RULES", None) => Ok(Section::Rules),
        ("IPSET", Some(set_name)) => {
            let mut ipset = IpSet::new(set_name);
            ipset.comment = comment.map(ToString::to_string);
            file.ipsets.push(ipset);
            Ok(Section::IpSet)
        }
        _ => Err(Error::parse(
            line_num,
            format!("unsupported section '{inner}'"),
        )),
    }
}

fn parse_alias(line: &str, line_num: usize) -> Result<Alias> {
    let (body, comment) = split_comment(line);
    let mut parts = body.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(name), Some(cidr), None) => Ok(Alias {
            name: name.to_string(),
            cidr: cidr.to_string(),
            comment: comment.map(ToString::to_string),
        }),
        _ => Err(Error::parse(line_num, "expected 'name cidr'")),
    }
}

/// Parse a single rule line.
fn parse_rule(line: &str, line_num: usize) -> Result<Rule> {
    let (body, comment) = split_comment(line);
    let (enabled, body) = match body.strip_prefix('|') {
        Some(rest) => (false, rest.trim_start()),
        None => (true, body),
    };

    let mut tokens = body.split_whitespace();

    let direction = tokens
        .next()
        .ok_or_else(|| Error::parse(line_num, "empty rule"))?;
    let direction: Direction = direction
        .parse()
        .map_err(|e: String| Error::parse(line_num, e))?;

    let action = tokens
        .next()
        .ok_or_else(|| Error::parse(line_num, "rule is missing an action"))?;
    let action = parse_action(action).map_err(|e| Error::parse(line_num, e))?;

    let mut rule = Rule {
        enabled,
        direction,
        action,
        iface: None,
        source: None,
        dest: None,
        proto: None,
        dport: None,
        sport: None,
        icmp_type: None,
        log: None,
        comment: comment.map(ToString::to_string),
    };

    while let Some(flag) = tokens.next() {
        let value = tokens
            .next()
            .ok_or_else(|| Error::parse(line_num, format!("flag {flag} is missing a value")))?;
        let value = value.to_string();
        match flag {
            "-i" => rule.iface = Some(value),
            "-source" => rule.source = Some(value),
            "-dest" => rule.dest = Some(value),
            "-p" => rule.proto = Some(value),
            "-dport" => rule.dport = Some(value),
            "-sport" => rule.sport = Some(value),
            "-icmp-type" => rule.icmp_type = Some(value),
            "-log" => {
                rule.log = Some(value.parse().map_err(|e: String| Error::parse(line_num, e))?);
            }
            other => {
                return Err(Error::parse(line_num, format!("unknown flag '{other}'")));
            }
        }
    }

    Ok(rule)
}

/// Parse `ACCEPT` or `MACRO(ACCEPT)`.
fn parse_action(token: &str) -> std::result::Result<RuleAction, String> {
    match token.split_once('(') {
        None => token.parse::<Verdict>().map(RuleAction::Verdict),
        Some((name, rest)) => {
            let verdict = rest
                .strip_suffix(')')
                .ok_or_else(|| format!("unterminated macro '{token}'"))?;
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(format!("invalid macro name '{name}'"));
            }
            Ok(RuleAction::Macro {
                name: name.to_string(),
                verdict: verdict.parse()?,
            })
        }
    }
}

/// Split a trailing `# comment` off a line.
fn split_comment(line: &str) -> (&str, Option<&str>) {
    match line.split_once('#') {
        Some((body, comment)) => {
            let comment = comment.trim();
            (body.trim(), (!comment.is_empty()).then_some(comment))
        }
        None => (line.trim(), None),
    }
}
