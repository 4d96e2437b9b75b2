//! The routing registry: organizations, services, routing rules, and
//! keyword categories, loaded once from a declarative TOML file and held
//! behind an [`arc_swap::ArcSwap`] so a reload is a single atomic pointer
//! swap — readers never block on it and never observe a half-updated
//! registry.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use indexmap::IndexMap;
use regex::{Regex, RegexBuilder};
use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrgStatus {
    Active,
    Planned,
    Deprecated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    Rest,
    Rpc,
    Grpc,
    Websocket,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
    #[serde(skip)]
    pub name: String,
    pub endpoint: String,
    #[serde(default)]
    pub health_path: Option<String>,
    #[serde(rename = "type", default = "default_service_type")]
    pub service_type: ServiceType,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub nodes: Vec<String>,
    #[serde(default)]
    pub default: bool,
}

fn default_service_type() -> ServiceType {
    ServiceType::Rest
}

#[derive(Debug, Clone, Deserialize)]
pub struct Organization {
    #[serde(skip)]
    pub code: String,
    pub name: String,
    pub status: OrgStatus,
    /// Declaration-ordered: TOML's deserializer visits table entries in
    /// source order, and `IndexMap` (unlike `HashMap`) preserves the order
    /// it receives them in, so iteration here matches the registry file
    /// regardless of hashing (§3's "first service declared" fallback).
    pub services: IndexMap<String, Service>,
}

impl Organization {
    /// The service used when a classification names only the org: the
    /// declared default, or failing that the first service declared.
    pub fn default_service(&self) -> Option<&Service> {
        self.services
            .values()
            .find(|s| s.default)
            .or_else(|| self.services.values().next())
    }
}

/// A compiled routing rule: regex plus target and priority.
pub struct RoutingRule {
    pub pattern: String,
    pub regex: Regex,
    pub org: String,
    pub service: String,
    pub priority: i32,
    /// Position among rules of the same priority, for deterministic
    /// tie-breaking by declaration order.
    pub declaration_order: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Category {
    pub name: String,
    pub org: String,
    pub service: String,
    pub keywords: Vec<String>,
}

/// The loaded, validated registry. Immutable once built; a reload builds a
/// brand-new `Registry` and atomically swaps it in.
pub struct Registry {
    pub orgs: HashMap<String, Organization>,
    pub rules: Vec<RoutingRule>,
    pub categories: Vec<Category>,
    pub default_org: String,
}

impl Registry {
    pub fn service(&self, org: &str, service: &str) -> Option<&Service> {
        self.orgs.get(org)?.services.get(service)
    }

    pub fn organization(&self, org: &str) -> Option<&Organization> {
        self.orgs.get(org)
    }
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    orgs: HashMap<String, OrgFile>,
    #[serde(default)]
    rules: Vec<RuleFile>,
    #[serde(default)]
    categories: Vec<Category>,
    #[serde(default = "default_fallback_org")]
    default_org: String,
}

fn default_fallback_org() -> String {
    "AI".to_string()
}

#[derive(Debug, Deserialize)]
struct OrgFile {
    name: String,
    status: OrgStatus,
    services: IndexMap<String, Service>,
}

#[derive(Debug, Deserialize)]
struct RuleFile {
    pattern: String,
    org: String,
    service: String,
    priority: i32,
    #[serde(default)]
    case_insensitive: Option<bool>,
}

/// Parse and validate a registry document, compiling every rule's regex and
/// checking that every rule and category target resolves to a declared
/// service with a non-empty endpoint.
pub fn parse(toml_source: &str) -> Result<Registry> {
    let file: RegistryFile = toml::from_str(toml_source)
        .map_err(|e| Error::ParseError(format!("registry toml: {e}")))?;

    let mut orgs = HashMap::with_capacity(file.orgs.len());
    for (code, org_file) in file.orgs {
        let mut services = IndexMap::with_capacity(org_file.services.len());
        for (name, mut service) in org_file.services {
            if service.endpoint.trim().is_empty() {
                return Err(Error::InvalidRequest(format!(
                    "service {code}/{name} has an empty endpoint"
                )));
            }
            service.name = name.clone();
            services.insert(name, service);
        }
        orgs.insert(
            code.clone(),
            Organization {
                code,
                name: org_file.name,
                status: org_file.status,
                services,
            },
        );
    }

    let mut rules = Vec::with_capacity(file.rules.len());
    for (declaration_order, rule) in file.rules.into_iter().enumerate() {
        let org = orgs.get(&rule.org).ok_or_else(|| {
            Error::InvalidRequest(format!("rule targets unknown org {}", rule.org))
        })?;
        if !org.services.contains_key(&rule.service) {
            return Err(Error::InvalidRequest(format!(
                "rule targets unknown service {}/{}",
                rule.org, rule.service
            )));
        }
        let regex = RegexBuilder::new(&rule.pattern)
            .case_insensitive(rule.case_insensitive.unwrap_or(true))
            .build()
            .map_err(|e| Error::InvalidRequest(format!("invalid rule pattern: {e}")))?;

        rules.push(RoutingRule {
            pattern: rule.pattern,
            regex,
            org: rule.org,
            service: rule.service,
            priority: rule.priority,
            declaration_order,
        });
    }
    // Descending priority, ties broken by declaration order (§4.2).
    rules.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.declaration_order.cmp(&b.declaration_order)));

    for category in &file.categories {
        if !orgs
            .get(&category.org)
            .map(|o| o.services.contains_key(&category.service))
            .unwrap_or(false)
        {
            return Err(Error::InvalidRequest(format!(
                "category {} targets unknown service {}/{}",
                category.name, category.org, category.service
            )));
        }
    }

    if !orgs.contains_key(&file.default_org) {
        return Err(Error::InvalidRequest(format!(
            "default_org {} is not a declared organization",
            file.default_org
        )));
    }

    Ok(Registry {
        orgs,
        rules,
        categories: file.categories,
        default_org: file.default_org,
    })
}

/// Hot-swappable handle shared across the whole process. Every request path
/// calls `load()` (a lock-free `Arc` clone) rather than holding a guard.
#[derive(Clone)]
pub struct RegistryHandle(Arc<ArcSwap<Registry>>);

impl RegistryHandle {
    pub fn new(registry: Registry) -> Self {
        Self(Arc::new(ArcSwap::from_pointee(registry)))
    }

    pub fn load(&self) -> Arc<Registry> {
        self.0.load_full()
    }

    /// Parse and validate a new registry document, then atomically swap it
    /// in. The old registry remains valid for any in-flight request already
    /// holding an `Arc` to it.
    pub fn reload(&self, toml_source: &str) -> Result<()> {
        let registry = parse(toml_source)?;
        self.0.store(Arc::new(registry));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"
default_org = "AI"

[orgs.OS]
name = "Operating System"
status = "active"
[orgs.OS.services.core]
endpoint = "http://os-core.internal"
default = true

[orgs.FND]
name = "Foundation"
status = "active"
[orgs.FND.services.salesforce]
endpoint = "http://fnd-salesforce.internal"
default = true

[orgs.AI]
name = "Artificial Intelligence"
status = "active"
[orgs.AI.services.router]
endpoint = "http://ai-router.internal"
default = true

[[rules]]
pattern = "salesforce|crm"
org = "FND"
service = "salesforce"
priority = 10

[[rules]]
pattern = "sync"
org = "OS"
service = "core"
priority = 5

[[categories]]
name = "crm"
org = "FND"
service = "salesforce"
keywords = ["contacts", "lead", "deal"]
"#;

    #[test]
    fn parses_and_sorts_rules_by_descending_priority() {
        let registry = parse(DOC).unwrap();
        assert_eq!(registry.rules[0].priority, 10);
        assert_eq!(registry.rules[1].priority, 5);
    }

    #[test]
    fn default_service_resolution_prefers_the_declared_default() {
        let registry = parse(DOC).unwrap();
        let org = registry.organization("FND").unwrap();
        assert_eq!(org.default_service().unwrap().name, "salesforce");
    }

    #[test]
    fn default_service_fallback_is_the_first_declared_when_none_is_marked_default() {
        const NO_DEFAULT: &str = r#"
default_org = "ZZZ"

[orgs.ZZZ]
name = "No explicit default"
status = "active"
[orgs.ZZZ.services.zeta]
endpoint = "http://zeta.internal"
[orgs.ZZZ.services.alpha]
endpoint = "http://alpha.internal"
[orgs.ZZZ.services.mid]
endpoint = "http://mid.internal"
"#;
        for _ in 0..5 {
            let registry = parse(NO_DEFAULT).unwrap();
            let org = registry.organization("ZZZ").unwrap();
            assert_eq!(org.default_service().unwrap().name, "zeta");
        }
    }

    #[test]
    fn rejects_rule_with_unknown_org() {
        let bad = DOC.replace("org = \"FND\"", "org = \"ZZZ\"");
        assert!(parse(&bad).is_err());
    }

    #[test]
    fn reload_is_visible_to_new_loads_without_blocking_old_ones() {
        let registry = parse(DOC).unwrap();
        let handle = RegistryHandle::new(registry);
        let before = handle.load();
        assert_eq!(before.rules.len(), 2);

        let smaller = DOC.replace(
            r#"
[[rules]]
pattern = "sync"
org = "OS"
service = "core"
priority = 5
"#,
            "",
        );
        handle.reload(&smaller).unwrap();

        assert_eq!(before.rules.len(), 2);
        assert_eq!(handle.load().rules.len(), 1);
    }
}
