//! # pvefw
//!
//! Typed model for Proxmox VE firewall configuration files.
//!
//! The Proxmox firewall daemon reads plain-text files with an
//! `[OPTIONS]` / `[ALIASES]` / `[IPSET name]` / `[RULES]` layout:
//!
//! ```text
//! [OPTIONS]
//!
//! enable: 1
//! policy_in: DROP
//!
//! [IPSET management] # Management network
//!
//! 192.168.1.0/24
//!
//! [RULES]
//!
//! IN SSH(ACCEPT) -source +management # SSH from management
//! IN ACCEPT -p tcp -dport 8006
//! ```
//!
//! This crate renders those files byte-for-byte and parses existing ones.
//! It does not know where the files live on disk or what they mean for
//! a particular host.
//!
//! ## Example
//!
//! ```
//! use pvefw::{Direction, FirewallFile, Rule, Verdict};
//!
//! let mut file = FirewallFile::new();
//! file.set_option("enable", "1");
//! file.rules.push(Rule::new(Direction::In, Verdict::Accept).proto("tcp").dport("8006"));
//!
//! let text = pvefw::write_string(&file);
//! assert!(text.contains("IN ACCEPT -p tcp -dport 8006"));
//!
//! let parsed = pvefw::parse_string(&text).unwrap();
//! assert_eq!(parsed, file);
//! ```

pub mod error;
pub mod parser;
pub mod types;
pub mod writer;

pub use error::{Error, Result};
pub use parser::parse_string;
pub use types::{Alias, Direction, FirewallFile, IpSet, LogLevel, Rule, RuleAction, Verdict};
pub use writer::write_string;
