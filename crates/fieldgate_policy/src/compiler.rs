//! Policy compiler: declarations + catalogs -> immutable registry.

use crate::lang::{AssetDeclaration, ATTRIBUTE_REF_PREFIX, CONDITION_KEY, FIELDS_KEY};
use crate::matcher::{is_scalar, Condition};
use fieldgate_core::{Action, CatalogSource, CoreError, CoreResult, EngineConfig, FieldSet};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

/// One conditional field grant
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    /// Condition the instance must satisfy
    pub condition: Condition,
    /// Granted fields; `None` grants the full catalog
    pub fields: Option<FieldSet>,
}

impl Branch {
    /// Unconditional full grant
    #[must_use]
    pub fn unrestricted() -> Self {
        Self {
            condition: Condition::always(),
            fields: None,
        }
    }
}

/// The branches granted to one role for one action
#[derive(Debug, Clone, PartialEq)]
pub struct RoleRule {
    branches: Vec<Branch>,
}

impl RoleRule {
    /// Build a rule; an empty branch list means an unconditional full grant
    #[must_use]
    pub fn new(branches: Vec<Branch>) -> Self {
        if branches.is_empty() {
            return Self::unrestricted();
        }
        Self { branches }
    }

    /// Unconditional full grant
    #[must_use]
    pub fn unrestricted() -> Self {
        Self {
            branches: vec![Branch::unrestricted()],
        }
    }

    /// Branches in declaration order
    #[must_use]
    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }
}

/// Role value -> rule
pub type RoleTable = IndexMap<String, RoleRule>;

/// Compiled rules for one asset
#[derive(Debug, Clone, PartialEq)]
pub struct AssetPolicy {
    /// Asset name
    pub name: String,
    /// Full field catalog
    pub all_fields: FieldSet,
    /// Per-action role tables
    pub actions: IndexMap<Action, RoleTable>,
}

impl AssetPolicy {
    /// Rule for (action, role), if declared
    #[must_use]
    pub fn rule(&self, action: &Action, role: &str) -> Option<&RoleRule> {
        self.actions.get(action).and_then(|roles| roles.get(role))
    }
}

/// Compiled, read-only policy model
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyRegistry {
    config: EngineConfig,
    assets: IndexMap<String, AssetPolicy>,
}

impl PolicyRegistry {
    /// Engine configuration
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Compiled policy of an asset
    #[must_use]
    pub fn asset(&self, name: &str) -> Option<&AssetPolicy> {
        self.assets.get(name)
    }

    /// Compiled assets in declaration order
    pub fn assets(&self) -> impl Iterator<Item = &AssetPolicy> {
        self.assets.values()
    }

    /// Number of declared rules across all assets, actions and roles
    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.assets
            .values()
            .flat_map(|a| a.actions.values())
            .map(IndexMap::len)
            .sum()
    }
}

/// Policy compiler
pub struct PolicyCompiler {
    config: EngineConfig,
}

impl PolicyCompiler {
    /// Create a compiler producing registries with this configuration
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Compile declarations into a registry.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if an asset has no catalog or any rule
    /// is malformed; no partial registry is produced.
    pub fn compile(
        &self,
        declarations: &[AssetDeclaration],
        catalog: &impl CatalogSource,
    ) -> CoreResult<PolicyRegistry> {
        let mut assets = IndexMap::new();

        for decl in declarations {
            let policy = self.compile_asset(decl, catalog).inspect_err(|err| {
                if let CoreError::Configuration { detail } = err {
                    warn!(asset = %decl.name, %detail, "rejecting policy");
                }
            })?;
            assets.insert(decl.name.clone(), policy);
        }

        let registry = PolicyRegistry {
            config: self.config.clone(),
            assets,
        };
        info!(
            assets = registry.assets.len(),
            rules = registry.rule_count(),
            deny_by_default = registry.config.deny_by_default,
            "compiled policy registry"
        );
        Ok(registry)
    }

    fn compile_asset(
        &self,
        decl: &AssetDeclaration,
        catalog: &impl CatalogSource,
    ) -> CoreResult<AssetPolicy> {
        let all_fields = catalog
            .fields_of(&decl.name)
            .filter(|fields| !fields.is_empty())
            .ok_or_else(|| {
                CoreError::configuration(format!("no field catalog for asset {}", decl.name))
            })?;

        let mut actions: IndexMap<Action, RoleTable> = IndexMap::new();
        for (verb, roles) in &decl.actions {
            let table = actions.entry(Action::parse(verb)).or_default();
            for (role, raw) in roles {
                let rule = compile_rule(raw).map_err(|err| match err {
                    CoreError::Configuration { detail } => CoreError::configuration(format!(
                        "{}.{}.{}: {}",
                        decl.name, verb, role, detail
                    )),
                    other => other,
                })?;
                warn_unknown_fields(&decl.name, &all_fields, &rule);
                debug!(
                    asset = %decl.name,
                    action = %verb,
                    %role,
                    branches = rule.branches().len(),
                    conditional = rule.branches().iter().filter(|b| !b.condition.is_always()).count(),
                    dynamic = rule.branches().iter().any(|b| b.condition.is_dynamic()),
                    "compiled rule"
                );
                table.insert(role.clone(), rule);
            }
        }

        Ok(AssetPolicy {
            name: decl.name.clone(),
            all_fields,
            actions,
        })
    }
}

/// Compile a single raw rule value.
///
/// A boolean of either value and an array both carry no `$fields`/`$if`
/// and compile like an empty body: an unconditional full grant.
///
/// # Errors
///
/// Returns a configuration error if the value has an invalid shape
pub fn compile_rule(raw: &Value) -> CoreResult<RoleRule> {
    match raw {
        Value::Bool(_) | Value::Array(_) => Ok(RoleRule::unrestricted()),
        Value::Object(body) => compile_body(body),
        Value::Null => Err(CoreError::configuration("rule is null")),
        _ => Err(CoreError::configuration("rule must be a boolean, an array or an object")),
    }
}

enum FieldSpec {
    All,
    Flat(FieldSet),
    PerBranch(Vec<FieldSet>),
}

fn compile_body(body: &Map<String, Value>) -> CoreResult<RoleRule> {
    let fields = parse_fields(body.get(FIELDS_KEY))?;
    let conditions = parse_conditions(body.get(CONDITION_KEY))?;

    let branches = match (conditions, fields) {
        (None, FieldSpec::PerBranch(_)) => {
            return Err(CoreError::configuration(
                "nested $fields require a $if list of the same length",
            ));
        }
        (None, FieldSpec::All) => vec![Branch::unrestricted()],
        (None, FieldSpec::Flat(fields)) => vec![Branch {
            condition: Condition::always(),
            fields: Some(fields),
        }],
        (Some(conditions), FieldSpec::PerBranch(fields)) => {
            if conditions.len() != fields.len() {
                return Err(CoreError::configuration(format!(
                    "$if has {} entries but $fields has {}",
                    conditions.len(),
                    fields.len()
                )));
            }
            conditions
                .into_iter()
                .zip(fields)
                .map(|(condition, fields)| Branch {
                    condition,
                    fields: Some(fields),
                })
                .collect()
        }
        (Some(conditions), shared) => {
            let fields = match shared {
                FieldSpec::Flat(fields) => Some(fields),
                _ => None,
            };
            conditions
                .into_iter()
                .map(|condition| Branch {
                    condition,
                    fields: fields.clone(),
                })
                .collect()
        }
    };

    Ok(RoleRule::new(branches))
}

fn parse_fields(raw: Option<&Value>) -> CoreResult<FieldSpec> {
    let items = match raw {
        None | Some(Value::Null) => return Ok(FieldSpec::All),
        Some(Value::Array(items)) if items.is_empty() => return Ok(FieldSpec::All),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(CoreError::configuration("$fields must be an array")),
    };

    if items.iter().all(Value::is_array) {
        return items
            .iter()
            .map(|inner| field_list(inner.as_array().map(Vec::as_slice).unwrap_or_default()))
            .collect::<CoreResult<Vec<_>>>()
            .map(FieldSpec::PerBranch);
    }

    field_list(items).map(FieldSpec::Flat)
}

fn field_list(items: &[Value]) -> CoreResult<FieldSet> {
    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| CoreError::configuration("$fields entries must be strings"))
        })
        .collect()
}

fn parse_conditions(raw: Option<&Value>) -> CoreResult<Option<Vec<Condition>>> {
    match raw {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(vec![parse_condition(map)?])),
        Some(Value::Array(items)) if items.is_empty() => {
            Err(CoreError::configuration("$if list is empty"))
        }
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::Object(map) => parse_condition(map),
                _ => Err(CoreError::configuration("$if entries must be objects")),
            })
            .collect::<CoreResult<Vec<_>>>()
            .map(Some),
        Some(_) => Err(CoreError::configuration("$if must be an object or an array")),
    }
}

fn parse_condition(map: &Map<String, Value>) -> CoreResult<Condition> {
    let mut condition = Condition::always();
    for (key, value) in map {
        if let Some(field) = key.strip_prefix(ATTRIBUTE_REF_PREFIX) {
            let path = value.as_str().ok_or_else(|| {
                CoreError::configuration(format!("attribute reference {} must be a path string", key))
            })?;
            condition = condition.with_attribute(field, path);
        } else if is_scalar(value) {
            condition = condition.with_literal(key.as_str(), value.clone());
        } else {
            return Err(CoreError::configuration(format!(
                "condition on {} must be a string, number or boolean",
                key
            )));
        }
    }
    Ok(condition)
}

fn warn_unknown_fields(asset: &str, catalog: &FieldSet, rule: &RoleRule) {
    for field in rule
        .branches()
        .iter()
        .filter_map(|b| b.fields.as_ref())
        .flat_map(FieldSet::iter)
        .filter(|f| !catalog.contains(f))
    {
        warn!(%asset, %field, "granted field is not in the catalog");
    }
}
