//! Firewall policy to Proxmox firewall files

use crate::schema::{FirewallPolicy, GuestFirewall, HostFirewall, RuleSpec};
use pvefw::{FirewallFile, IpSet, Rule, RuleAction, Verdict};

/// IP set holding the management network
pub const MANAGEMENT_IPSET: &str = "management";

/// Datacenter-wide `cluster.fw`
pub fn cluster_file(policy: &FirewallPolicy) -> FirewallFile {
    let mut file = FirewallFile::new();
    file.set_option("enable", flag(policy.enable));
    file.set_option("policy_in", policy.policy_in.token());
    file.set_option("policy_out", policy.policy_out.token());

    if let Some(cidr) = &policy.management_cidr {
        let mut ipset = IpSet::new(MANAGEMENT_IPSET);
        ipset.comment = Some("Management network".to_string());
        ipset.entries.push(cidr.clone());
        file.ipsets.push(ipset);
    }

    file.rules = policy.rules.iter().map(rule).collect();
    file
}

/// Node-level `host.fw`
pub fn host_file(host: &HostFirewall) -> FirewallFile {
    let mut file = FirewallFile::new();
    file.set_option("enable", flag(host.enable));
    file.rules = host.rules.iter().map(rule).collect();
    file
}

/// Guest-level `<vmid>.fw`
pub fn guest_file(guest: &GuestFirewall) -> FirewallFile {
    let mut file = FirewallFile::new();
    file.set_option("enable", flag(guest.enable));
    file.rules = guest.rules.iter().map(rule).collect();
    file
}

fn rule(spec: &RuleSpec) -> Rule {
    let action = match &spec.macro_name {
        Some(name) => RuleAction::Macro {
            name: name.clone(),
            verdict: spec.action.unwrap_or(Verdict::Accept),
        },
        // validated: action is set when there is no macro
        None => RuleAction::Verdict(spec.action.unwrap_or(Verdict::Drop)),
    };

    Rule {
        enabled: spec.enabled,
        direction: spec.direction,
        action,
        iface: spec.iface.clone(),
        source: spec.source.clone(),
        dest: spec.dest.clone(),
        proto: spec.proto.clone(),
        dport: spec.dport.clone(),
        sport: spec.sport.clone(),
        icmp_type: None,
        log: spec.log,
        comment: spec.comment.clone(),
    }
}

fn flag(enabled: bool) -> &'static str {
    if enabled { "1" } else { "0" }
}
