//! Execution plan - an ordered list of actions

use crate::action::{Action, BoxedAction};
use crate::error::Error;
use std::collections::BTreeMap;

/// An ordered plan of actions
///
/// Actions run in insertion order. An action must never precede the
/// action that provides a key it requires; [`Plan::validate_order`]
/// enforces this before execution.
#[derive(Debug, Default)]
pub struct Plan {
    actions: Vec<BoxedAction>,
}

impl Plan {
    /// Create a new empty plan
    pub fn new() -> Self {
        Self {
            actions: Vec::new(),
        }
    }

    /// Append an action to the end of the plan
    pub fn push(&mut self, action: BoxedAction) {
        self.actions.push(action);
    }

    /// Iterate over actions in execution order
    pub fn iter(&self) -> impl Iterator<Item = &dyn Action> {
        self.actions.iter().map(|a| &**a)
    }

    /// Identifiers of all actions, in order
    pub fn ids(&self) -> Vec<String> {
        self.actions.iter().map(|a| a.id()).collect()
    }

    /// Total number of actions in the plan
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Check if plan is empty
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Number of destructive actions
    pub fn destructive_count(&self) -> usize {
        self.actions.iter().filter(|a| a.is_destructive()).count()
    }

    /// Check that no action requires a key provided by a later action
    pub fn validate_order(&self) -> Result<(), Error> {
        for (index, action) in self.actions.iter().enumerate() {
            for key in action.requires() {
                let later = self.actions[index + 1..]
                    .iter()
                    .find(|candidate| candidate.provides().contains(&key));
                if let Some(provider) = later {
                    return Err(Error::OrderViolation {
                        action: action.id(),
                        key,
                        provider: provider.id(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Filter plan to only include actions matching a predicate
    pub fn filter<F>(self, predicate: F) -> Self
    where
        F: Fn(&dyn Action) -> bool,
    {
        Self {
            actions: self
                .actions
                .into_iter()
                .filter(|a| predicate(a.as_ref()))
                .collect(),
        }
    }

    /// Filter plan to only include actions matching a target pattern
    ///
    /// Target format: "type" or "type.name"
    pub fn filter_by_target(self, target: Option<&str>) -> Self {
        match target {
            None => self,
            Some(t) => {
                let (action_type, name) = parse_target(t);
                self.filter(|a| matches_filter(a, action_type.as_deref(), name.as_deref()))
            }
        }
    }

    /// Group actions by type, preserving order within each group
    pub fn group_by_type(&self) -> BTreeMap<&'static str, Vec<&dyn Action>> {
        let mut groups: BTreeMap<&'static str, Vec<&dyn Action>> = BTreeMap::new();
        for action in self.iter() {
            groups.entry(action.action_type()).or_default().push(action);
        }
        groups
    }
}

/// Parse a target string like "type.name" into (type, name)
fn parse_target(target: &str) -> (Option<String>, Option<String>) {
    match target.split_once('.') {
        None => (Some(target.to_string()), None),
        Some((kind, name)) if !kind.is_empty() && !name.contains('.') => {
            (Some(kind.to_string()), Some(name.to_string()))
        }
        Some(_) => (None, Some(target.to_string())),
    }
}

/// Check if an action matches the filter criteria
fn matches_filter(action: &dyn Action, action_type: Option<&str>, name: Option<&str>) -> bool {
    if let Some(at) = action_type {
        // Allow common aliases
        let matches_type = match at {
            "pools" | "zfs" => action.action_type() == "zfs_pool",
            "storage" => action.action_type() == "pve_storage",
            "firewall" => action.action_type() == "firewall_file",
            "backup" => action.action_type() == "backup_job",
            "templates" => matches!(
                action.action_type(),
                "container_template" | "template_index" | "iso_image" | "vm_template"
            ),
            "host" => matches!(
                action.action_type(),
                "hostname" | "timezone" | "network" | "apt_source"
            ),
            _ => action.action_type() == at,
        };
        if !matches_type {
            return false;
        }
    }

    if let Some(n) = name
        && !action.id().contains(n)
    {
        return false;
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ApplyContext;
    use crate::types::{ApplyResult, ResourceState};
    use anyhow::Result;

    #[derive(Debug)]
    struct KeyedAction {
        id: &'static str,
        kind: &'static str,
        provides: Vec<&'static str>,
        requires: Vec<&'static str>,
    }

    impl Action for KeyedAction {
        fn id(&self) -> String {
            self.id.to_string()
        }

        fn description(&self) -> String {
            format!("Keyed {}", self.id)
        }

        fn action_type(&self) -> &'static str {
            self.kind
        }

        fn provides(&self) -> Vec<String> {
            self.provides.iter().map(ToString::to_string).collect()
        }

        fn requires(&self) -> Vec<String> {
            self.requires.iter().map(ToString::to_string).collect()
        }

        fn current_state(&self, _ctx: &ApplyContext) -> Result<ResourceState> {
            Ok(ResourceState::Absent)
        }

        fn desired_state(&self) -> ResourceState {
            ResourceState::Present { details: None }
        }

        fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
            Ok(ApplyResult::Created)
        }
    }

    fn keyed(
        id: &'static str,
        kind: &'static str,
        provides: &[&'static str],
        requires: &[&'static str],
    ) -> BoxedAction {
        Box::new(KeyedAction {
            id,
            kind,
            provides: provides.to_vec(),
            requires: requires.to_vec(),
        })
    }

    #[test]
    fn test_parse_target() {
        assert_eq!(parse_target("pools"), (Some("pools".to_string()), None));
        assert_eq!(
            parse_target("pools.tank"),
            (Some("pools".to_string()), Some("tank".to_string()))
        );
        assert_eq!(parse_target("a.b.c"), (None, Some("a.b.c".to_string())));
    }

    #[test]
    fn test_validate_order_accepts_provider_first() {
        let mut plan = Plan::new();
        plan.push(keyed("tank", "zfs_pool", &["pool:tank"], &[]));
        plan.push(keyed("vm-storage", "pve_storage", &["storage:vm-storage"], &["pool:tank"]));
        assert!(plan.validate_order().is_ok());
    }

    #[test]
    fn test_validate_order_rejects_provider_later() {
        let mut plan = Plan::new();
        plan.push(keyed("vm-storage", "pve_storage", &[], &["pool:tank"]));
        plan.push(keyed("tank", "zfs_pool", &["pool:tank"], &[]));

        let err = plan.validate_order().unwrap_err();
        assert!(matches!(
            err,
            Error::OrderViolation { ref action, ref provider, .. }
                if action == "vm-storage" && provider == "tank"
        ));
    }

    #[test]
    fn test_requirement_without_provider_is_allowed() {
        // Provided by the host already, not by this plan
        let mut plan = Plan::new();
        plan.push(keyed("nightly", "backup_job", &[], &["storage:local"]));
        assert!(plan.validate_order().is_ok());
    }

    #[test]
    fn test_filter_by_target_alias_and_name() {
        let mut plan = Plan::new();
        plan.push(keyed("tank", "zfs_pool", &[], &[]));
        plan.push(keyed("scratch", "zfs_pool", &[], &[]));
        plan.push(keyed("vm-storage", "pve_storage", &[], &[]));

        let filtered = plan.filter_by_target(Some("pools.tank"));
        assert_eq!(filtered.ids(), vec!["tank".to_string()]);
    }

    #[test]
    fn test_group_by_type_keeps_order() {
        let mut plan = Plan::new();
        plan.push(keyed("a", "zfs_pool", &[], &[]));
        plan.push(keyed("s", "pve_storage", &[], &[]));
        plan.push(keyed("b", "zfs_pool", &[], &[]));

        let groups = plan.group_by_type();
        let pools: Vec<String> = groups["zfs_pool"].iter().map(|a| a.id()).collect();
        assert_eq!(pools, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(groups["pve_storage"].len(), 1);
    }
}
