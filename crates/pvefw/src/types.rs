//! Core types for Proxmox firewall files.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Traffic direction of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[serde(alias = "IN")]
    In,
    #[serde(alias = "OUT")]
    Out,
}

impl Direction {
    /// Token used in the file format.
    pub fn token(&self) -> &'static str {
        match self {
            Self::In => "IN",
            Self::Out => "OUT",
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IN" => Ok(Self::In),
            "OUT" => Ok(Self::Out),
            other => Err(format!("unknown direction '{other}'")),
        }
    }
}

/// What happens to matching packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    #[serde(alias = "accept")]
    Accept,
    #[serde(alias = "drop")]
    Drop,
    #[serde(alias = "reject")]
    Reject,
}

impl Verdict {
    /// Token used in the file format.
    pub fn token(&self) -> &'static str {
        match self {
            Self::Accept => "ACCEPT",
            Self::Drop => "DROP",
            Self::Reject => "REJECT",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for Verdict {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACCEPT" => Ok(Self::Accept),
            "DROP" => Ok(Self::Drop),
            "REJECT" => Ok(Self::Reject),
            other => Err(format!("unknown verdict '{other}'")),
        }
    }
}

/// Log level attached to a rule with `-log`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Emerg,
    Alert,
    Crit,
    Err,
    Warning,
    Notice,
    Info,
    Debug,
    Nolog,
}

impl LogLevel {
    /// Token used in the file format.
    pub fn token(&self) -> &'static str {
        match self {
            Self::Emerg => "emerg",
            Self::Alert => "alert",
            Self::Crit => "crit",
            Self::Err => "err",
            Self::Warning => "warning",
            Self::Notice => "notice",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Nolog => "nolog",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, <Self as FromStr>::Err> {
        let level = match s {
            "emerg" => LogLevel::Emerg,
            "alert" => LogLevel::Alert,
            "crit" => LogLevel::Crit,
            "err" => LogLevel::Err,
            "warning" => LogLevel::Warning,
            "notice" => LogLevel::Notice,
            "info" => LogLevel::Info,
            "debug" => LogLevel::Debug,
            "nolog" => LogLevel::Nolog,
            other => return Err(format!("unknown log level '{other}'")),
        };
        Ok(level)
    }
}

/// The action part of a rule: a plain verdict or a macro such as `SSH(ACCEPT)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleAction {
    Verdict(Verdict),
    Macro { name: String, verdict: Verdict },
}

impl fmt::Display for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Verdict(verdict) => write!(f, "{verdict}"),
            Self::Macro { name, verdict } => write!(f, "{name}({verdict})"),
        }
    }
}

/// A single firewall rule line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    /// Disabled rules are written with a leading `|`
    pub enabled: bool,
    pub direction: Direction,
    pub action: RuleAction,
    pub iface: Option<String>,
    pub source: Option<String>,
    pub dest: Option<String>,
    pub proto: Option<String>,
    pub dport: Option<String>,
    pub sport: Option<String>,
    pub icmp_type: Option<String>,
    pub log: Option<LogLevel>,
    pub comment: Option<String>,
}

impl Rule {
    /// Create an enabled rule with a plain verdict.
    pub fn new(direction: Direction, verdict: Verdict) -> Self {
        Self::with_action(direction, RuleAction::Verdict(verdict))
    }

    /// Create an enabled rule using a firewall macro.
    pub fn with_macro(direction: Direction, name: &str, verdict: Verdict) -> Self {
        Self::with_action(
            direction,
            RuleAction::Macro {
                name: name.to_string(),
                verdict,
            },
        )
    }

    fn with_action(direction: Direction, action: RuleAction) -> Self {
        Self {
            enabled: true,
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
            comment: None,
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn iface(mut self, iface: &str) -> Self {
        self.iface = Some(iface.to_string());
        self
    }

    pub fn source(mut self, source: &str) -> Self {
        self.source = Some(source.to_string());
        self
    }

    pub fn dest(mut self, dest: &str) -> Self {
        self.dest = Some(dest.to_string());
        self
    }

    pub fn proto(mut self, proto: &str) -> Self {
        self.proto = Some(proto.to_string());
        self
    }

    pub fn dport(mut self, dport: &str) -> Self {
        self.dport = Some(dport.to_string());
        self
    }

    pub fn sport(mut self, sport: &str) -> Self {
        self.sport = Some(sport.to_string());
        self
    }

    pub fn log(mut self, level: LogLevel) -> Self {
        self.log = Some(level);
        self
    }

    pub fn comment(mut self, comment: &str) -> Self {
        self.comment = Some(comment.to_string());
        self
    }
}

/// A named IP set (`[IPSET name]`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpSet {
    pub name: String,
    pub comment: Option<String>,
    /// CIDRs or addresses; a leading `!` marks a nomatch entry
    pub entries: Vec<String>,
}

impl IpSet {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            comment: None,
            entries: Vec::new(),
        }
    }
}

/// A named address alias (`[ALIASES]` section).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alias {
    pub name: String,
    pub cidr: String,
    pub comment: Option<String>,
}

/// One firewall file: `cluster.fw`, `host.fw` or `<vmid>.fw`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FirewallFile {
    /// `key: value` pairs, in file order
    pub options: Vec<(String, String)>,
    pub aliases: Vec<Alias>,
    pub ipsets: Vec<IpSet>,
    pub rules: Vec<Rule>,
}

impl FirewallFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an option, replacing an existing value in place.
    pub fn set_option(&mut self, key: &str, value: &str) {
        match self.options.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value.to_string(),
            None => self.options.push((key.to_string(), value.to_string())),
        }
    }

    /// Look up an option value.
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Whether the file turns the firewall on (`enable: 1`).
    pub fn is_enabled(&self) -> bool {
        self.option("enable") == Some("1")
    }

    /// Find an IP set by name.
    pub fn ipset(&self, name: &str) -> Option<&IpSet> {
        self.ipsets.iter().find(|s| s.name == name)
    }
}
