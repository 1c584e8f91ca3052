//! Plugin manifest (`settings.json`) reading, schema checks, and typed model.
//!
//! The raw document is checked against the field schema first; only then is
//! it lowered into a [`PluginManifest`], which keeps conforming values and
//! drops the rest. Downstream checks never look at the raw document.

use std::collections::HashSet;
use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::diagnostics::{
    Category, Finding, M001, M002, M003, M004, M005, M006, M007, M008, M009, M010, M011, M012,
    M013, M014, M015, M016,
};
use crate::layout::PluginLayout;
use crate::rules::RuleSet;

/// Top-level fields every manifest must declare.
const REQUIRED_FIELDS: &[&str] = &["id", "name", "description", "hooks"];

/// Fields that must be arrays when present.
const ARRAY_FIELDS: &[&str] = &["hooks", "variables", "routes", "actions", "dynamic_variables"];

/// Raw manifest document: a JSON object.
pub type RawManifest = Map<String, Value>;

/// Type of a configurable variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableType {
    String,
    Number,
    Select,
    Boolean,
    Model,
    Object,
}

impl VariableType {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "string" => Some(Self::String),
            "number" => Some(Self::Number),
            "select" => Some(Self::Select),
            "boolean" => Some(Self::Boolean),
            "model" => Some(Self::Model),
            "object" => Some(Self::Object),
            _ => None,
        }
    }
}

/// A configurable plugin variable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Variable {
    pub name: String,
    pub id: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub var_type: Option<VariableType>,
    pub per_context: bool,
    pub default: Option<Value>,
    pub secret: bool,
    pub options: Vec<String>,
}

/// What an action button does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Popup,
    Redirect,
    Function,
}

impl ActionType {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "popup" => Some(Self::Popup),
            "redirect" => Some(Self::Redirect),
            "function" => Some(Self::Function),
            _ => None,
        }
    }

    /// Popup and redirect actions navigate to a plugin route.
    #[must_use]
    pub fn needs_route(self) -> bool {
        matches!(self, Self::Popup | Self::Redirect)
    }
}

/// A user-triggerable plugin action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Action {
    pub label: String,
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub route: Option<String>,
}

/// Display type of a runtime-updated variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DynamicVariableType {
    String,
    Badge,
    Slider,
    Logs,
}

impl DynamicVariableType {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "string" => Some(Self::String),
            "badge" => Some(Self::Badge),
            "slider" => Some(Self::Slider),
            "logs" => Some(Self::Logs),
            _ => None,
        }
    }
}

/// A value the plugin updates at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DynamicVariable {
    pub name: String,
    pub id: String,
    #[serde(rename = "type")]
    pub var_type: Option<DynamicVariableType>,
}

/// Typed view of a manifest, carrying only values that conform to the schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PluginManifest {
    pub id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub full_description: Option<String>,
    /// Declared hooks, in declaration order, without duplicates.
    pub hooks: Vec<String>,
    pub variables: Vec<Variable>,
    pub routes: Vec<String>,
    pub actions: Vec<Action>,
    pub dynamic_variables: Vec<DynamicVariable>,
}

fn str_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_string)
}

fn string_array(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn objects(value: Option<&Value>) -> impl Iterator<Item = &Map<String, Value>> {
    value
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
}

impl PluginManifest {
    /// Lower a raw document into the typed model.
    ///
    /// Entries missing mandatory fields or carrying unknown enum values are
    /// dropped; the schema check reports them.
    #[must_use]
    pub fn from_raw(raw: &RawManifest) -> Self {
        let mut seen = HashSet::new();
        let hooks = string_array(raw.get("hooks"))
            .into_iter()
            .filter(|h| seen.insert(h.clone()))
            .collect();

        let variables = objects(raw.get("variables"))
            .filter_map(|v| {
                Some(Variable {
                    name: str_field(v, "name")?,
                    id: str_field(v, "id")?,
                    description: str_field(v, "description"),
                    var_type: v.get("type").and_then(Value::as_str).and_then(VariableType::parse),
                    per_context: v.get("per_context").and_then(Value::as_bool).unwrap_or(false),
                    default: v.get("default").cloned(),
                    secret: v.get("secret").and_then(Value::as_bool).unwrap_or(false),
                    options: string_array(v.get("options")),
                })
            })
            .collect();

        let actions = objects(raw.get("actions"))
            .filter_map(|a| {
                let action_type = a.get("type").and_then(Value::as_str).and_then(ActionType::parse)?;
                Some(Action {
                    label: str_field(a, "label")?,
                    action_type,
                    route: str_field(a, "route"),
                })
            })
            .collect();

        let dynamic_variables = objects(raw.get("dynamic_variables"))
            .filter_map(|d| {
                Some(DynamicVariable {
                    name: str_field(d, "name")?,
                    id: str_field(d, "id")?,
                    var_type: d
                        .get("type")
                        .and_then(Value::as_str)
                        .and_then(DynamicVariableType::parse),
                })
            })
            .collect();

        Self {
            id: str_field(raw, "id"),
            name: str_field(raw, "name"),
            description: str_field(raw, "description"),
            full_description: str_field(raw, "full_description"),
            hooks,
            variables,
            routes: string_array(raw.get("routes")),
            actions,
            dynamic_variables,
        }
    }
}

/// Read and parse the manifest.
///
/// Returns `Ok(None)` when the file does not exist (the structural check
/// reports that), and a `ManifestParse` issue when it cannot be read or is
/// not a JSON object.
pub fn read_manifest(path: &Path) -> std::result::Result<Option<RawManifest>, Finding> {
    let file = path
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path).map_err(|e| {
        Finding::issue(Category::ManifestParse, M001, format!("Failed to read {file}: {e}"))
            .with_file(file.clone())
    })?;
    parse_manifest(&content).map(Some).map_err(|msg| {
        Finding::issue(Category::ManifestParse, M001, format!("{msg} in {file}")).with_file(file)
    })
}

/// Parse manifest text into a JSON object.
pub fn parse_manifest(content: &str) -> std::result::Result<RawManifest, String> {
    match serde_json::from_str::<Value>(content) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err("Manifest root is not an object".to_string()),
        Err(e) => Err(format!("Invalid JSON ({e})")),
    }
}

/// Check a raw manifest against the field schema.
///
/// Never fails: every problem becomes a finding.
#[must_use]
pub fn check_manifest(
    raw: &RawManifest,
    plugin_id: &str,
    layout: &PluginLayout,
    rules: &RuleSet,
) -> Vec<Finding> {
    let file = layout.manifest.as_str();
    let mut findings = Vec::new();
    let issue = |code: &'static str, msg: String| {
        Finding::issue(Category::ManifestSchema, code, msg).with_file(file)
    };
    let warning = |code: &'static str, msg: String| {
        Finding::warning(Category::ManifestSchema, code, msg).with_file(file)
    };

    for field in REQUIRED_FIELDS {
        if !raw.contains_key(*field) {
            findings.push(issue(M002, format!("Missing required field in {file}: {field}")));
        }
    }

    if let Some(id) = raw.get("id") {
        if id.as_str() != Some(plugin_id) {
            let shown = id.as_str().map_or_else(|| id.to_string(), str::to_string);
            findings.push(warning(
                M003,
                format!("Plugin ID in {file} ({shown}) doesn't match directory name ({plugin_id})"),
            ));
        }
    }

    for field in ARRAY_FIELDS {
        if raw.get(*field).is_some_and(|v| !v.is_array()) {
            findings.push(issue(M004, format!("Field '{field}' must be an array in {file}")));
        }
    }

    // Hooks
    if let Some(hooks) = raw.get("hooks").and_then(Value::as_array) {
        for (i, hook) in hooks.iter().enumerate() {
            match hook.as_str() {
                Some(h) if !rules.is_known_hook(h) => {
                    findings.push(warning(M005, format!("Unknown hook '{h}' at index {i}")));
                }
                Some(_) => {}
                None => findings.push(issue(M006, format!("Hook at index {i} must be a string"))),
            }
        }
    }

    // Variables
    if let Some(vars) = raw.get("variables").and_then(Value::as_array) {
        let mut ids = HashSet::new();
        for (i, var) in vars.iter().enumerate() {
            let Some(obj) = var.as_object() else {
                findings.push(issue(M007, format!("Variable at index {i} must be an object")));
                continue;
            };
            for key in ["name", "id"] {
                if !obj.contains_key(key) {
                    findings.push(issue(M007, format!("Missing '{key}' in variable at index {i}")));
                }
            }
            if let Some(id) = obj.get("id").and_then(Value::as_str) {
                if !ids.insert(id) {
                    findings.push(warning(M010, format!("Duplicate variable id '{id}' at index {i}")));
                }
            }
            let var_type = obj.get("type").and_then(Value::as_str);
            if let Some(t) = var_type {
                if VariableType::parse(t).is_none() {
                    findings.push(warning(M008, format!("Unknown type '{t}' in variable at index {i}")));
                }
            }
            if var_type == Some("select") {
                let has_options = obj
                    .get("options")
                    .and_then(Value::as_array)
                    .is_some_and(|o| !o.is_empty());
                if !has_options {
                    findings.push(issue(
                        M009,
                        format!("Select variable at index {i} missing 'options'"),
                    ));
                }
            }
        }
    }

    // Actions
    let declared_routes: Option<Vec<&str>> = raw
        .get("routes")
        .and_then(Value::as_array)
        .map(|r| r.iter().filter_map(Value::as_str).collect());
    if let Some(actions) = raw.get("actions").and_then(Value::as_array) {
        for (i, action) in actions.iter().enumerate() {
            let Some(obj) = action.as_object() else {
                findings.push(issue(M011, format!("Action at index {i} must be an object")));
                continue;
            };
            for key in ["label", "type"] {
                if !obj.contains_key(key) {
                    findings.push(issue(M011, format!("Missing '{key}' in action at index {i}")));
                }
            }
            let Some(t) = obj.get("type").and_then(Value::as_str) else {
                continue;
            };
            match ActionType::parse(t) {
                Some(kind) if kind.needs_route() && !obj.contains_key("route") => {
                    findings.push(issue(
                        M012,
                        format!("Action of type {t} at index {i} missing 'route'"),
                    ));
                }
                Some(_) => {}
                None => {
                    findings.push(warning(M013, format!("Unknown type '{t}' in action at index {i}")));
                }
            }
            if let (Some(route), Some(routes)) =
                (obj.get("route").and_then(Value::as_str), &declared_routes)
            {
                if !routes.contains(&route) {
                    findings.push(warning(
                        M014,
                        format!("Action at index {i} uses route '{route}' not declared in routes"),
                    ));
                }
            }
        }
    }

    // Dynamic variables
    if let Some(dvars) = raw.get("dynamic_variables").and_then(Value::as_array) {
        for (i, dvar) in dvars.iter().enumerate() {
            let Some(obj) = dvar.as_object() else {
                findings.push(issue(M015, format!("Dynamic variable at index {i} must be an object")));
                continue;
            };
            for key in ["name", "id"] {
                if !obj.contains_key(key) {
                    findings.push(issue(
                        M015,
                        format!("Missing '{key}' in dynamic variable at index {i}"),
                    ));
                }
            }
            if let Some(t) = obj.get("type").and_then(Value::as_str) {
                if DynamicVariableType::parse(t).is_none() {
                    findings.push(warning(
                        M016,
                        format!("Unknown type '{t}' in dynamic variable at index {i}"),
                    ));
                }
            }
        }
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(json: &str) -> RawManifest {
        parse_manifest(json).unwrap()
    }

    fn check(json: &str) -> Vec<Finding> {
        check_manifest(&raw(json), "demo", &PluginLayout::default(), &RuleSet::default())
    }

    fn codes(findings: &[Finding]) -> Vec<&'static str> {
        findings.iter().map(|f| f.code).collect()
    }

    const VALID: &str = r#"{
        "id": "demo",
        "name": "Demo",
        "description": "A demo plugin",
        "hooks": ["connect", "query"],
        "variables": [
            {"name": "Conn", "id": "conn", "type": "string", "per_context": true},
            {"name": "Mode", "id": "mode", "type": "select", "options": ["a", "b"]}
        ],
        "routes": ["status"],
        "actions": [{"label": "Open", "type": "popup", "route": "status"}],
        "dynamic_variables": [{"name": "State", "id": "state", "type": "badge"}]
    }"#;

    #[test]
    fn valid_manifest_has_no_findings() {
        let findings = check(VALID);
        assert!(findings.is_empty(), "unexpected: {findings:?}");
    }

    #[test]
    fn invalid_json_is_parse_error() {
        assert!(parse_manifest("{ not json").is_err());
    }

    #[test]
    fn non_object_root_is_parse_error() {
        let err = parse_manifest("[1, 2]").unwrap_err();
        assert!(err.contains("not an object"));
    }

    #[test]
    fn missing_required_fields_one_issue_each() {
        let findings = check(r#"{"id": "demo"}"#);
        let missing: Vec<_> = findings.iter().filter(|f| f.code == M002).collect();
        assert_eq!(missing.len(), 3);
        assert!(missing.iter().all(|f| f.is_issue()));
        assert!(missing[0].message.contains("name"));
    }

    #[test]
    fn id_mismatch_is_warning() {
        let findings = check(r#"{"id": "other", "name": "x", "description": "x", "hooks": []}"#);
        assert_eq!(codes(&findings), vec![M003]);
        assert!(findings[0].is_warning());
        assert!(findings[0].message.contains("(other)"));
        assert!(findings[0].message.contains("(demo)"));
    }

    #[test]
    fn scalar_hooks_is_issue() {
        let findings = check(r#"{"id": "demo", "name": "x", "description": "x", "hooks": "connect"}"#);
        assert_eq!(codes(&findings), vec![M004]);
        assert!(findings[0].message.contains("'hooks'"));
    }

    #[test]
    fn scalar_optional_fields_are_issues() {
        let findings = check(
            r#"{"id": "demo", "name": "x", "description": "x", "hooks": [],
                "variables": {}, "routes": "a", "actions": 1}"#,
        );
        assert_eq!(codes(&findings), vec![M004, M004, M004]);
    }

    #[test]
    fn unknown_hook_is_warning() {
        let findings = check(r#"{"id": "demo", "name": "x", "description": "x", "hooks": ["validate"]}"#);
        assert_eq!(codes(&findings), vec![M005]);
        assert!(findings[0].is_warning());
    }

    #[test]
    fn non_string_hook_is_issue() {
        let findings = check(r#"{"id": "demo", "name": "x", "description": "x", "hooks": [3]}"#);
        assert_eq!(codes(&findings), vec![M006]);
    }

    #[test]
    fn variable_missing_name_and_id() {
        let findings = check(
            r#"{"id": "demo", "name": "x", "description": "x", "hooks": [], "variables": [{"type": "string"}]}"#,
        );
        assert_eq!(codes(&findings), vec![M007, M007]);
        assert!(findings[0].message.contains("'name' in variable at index 0"));
        assert!(findings[1].message.contains("'id' in variable at index 0"));
    }

    #[test]
    fn select_without_options_is_issue() {
        let findings = check(
            r#"{"id": "demo", "name": "x", "description": "x", "hooks": [],
                "variables": [{"name": "m", "id": "m", "type": "select"}]}"#,
        );
        assert_eq!(codes(&findings), vec![M009]);
    }

    #[test]
    fn unknown_variable_type_and_duplicate_id_are_warnings() {
        let findings = check(
            r#"{"id": "demo", "name": "x", "description": "x", "hooks": [],
                "variables": [{"name": "a", "id": "a", "type": "date"}, {"name": "b", "id": "a"}]}"#,
        );
        assert_eq!(codes(&findings), vec![M008, M010]);
        assert!(findings.iter().all(Finding::is_warning));
    }

    #[test]
    fn redirect_action_requires_route() {
        let findings = check(
            r#"{"id": "demo", "name": "x", "description": "x", "hooks": [],
                "actions": [{"label": "Go", "type": "redirect"}, {"label": "Run", "type": "function"}]}"#,
        );
        assert_eq!(codes(&findings), vec![M012]);
        assert!(findings[0].message.contains("redirect at index 0"));
    }

    #[test]
    fn action_missing_label_and_type() {
        let findings = check(
            r#"{"id": "demo", "name": "x", "description": "x", "hooks": [], "actions": [{}]}"#,
        );
        assert_eq!(codes(&findings), vec![M011, M011]);
    }

    #[test]
    fn action_route_not_declared_is_warning() {
        let findings = check(
            r#"{"id": "demo", "name": "x", "description": "x", "hooks": [], "routes": ["a"],
                "actions": [{"label": "Go", "type": "popup", "route": "b"}]}"#,
        );
        assert_eq!(codes(&findings), vec![M014]);
    }

    #[test]
    fn dynamic_variable_checks() {
        let findings = check(
            r#"{"id": "demo", "name": "x", "description": "x", "hooks": [],
                "dynamic_variables": [{"name": "s"}, {"name": "t", "id": "t", "type": "gauge"}]}"#,
        );
        assert_eq!(codes(&findings), vec![M015, M016]);
    }

    #[test]
    fn typed_model_keeps_conforming_values() {
        let m = PluginManifest::from_raw(&raw(VALID));
        assert_eq!(m.id.as_deref(), Some("demo"));
        assert_eq!(m.hooks, vec!["connect", "query"]);
        assert_eq!(m.variables.len(), 2);
        assert_eq!(m.variables[1].var_type, Some(VariableType::Select));
        assert_eq!(m.variables[1].options, vec!["a", "b"]);
        assert!(m.variables[0].per_context);
        assert_eq!(m.routes, vec!["status"]);
        assert_eq!(m.actions[0].action_type, ActionType::Popup);
        assert_eq!(m.dynamic_variables[0].var_type, Some(DynamicVariableType::Badge));
    }

    #[test]
    fn typed_model_drops_nonconforming_values() {
        let m = PluginManifest::from_raw(&raw(
            r#"{"hooks": ["connect", 1, "connect"], "variables": [{"name": "x"}], "routes": "a"}"#,
        ));
        assert_eq!(m.hooks, vec!["connect"]);
        assert!(m.variables.is_empty());
        assert!(m.routes.is_empty());
    }

    #[test]
    fn read_manifest_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let result = read_manifest(&dir.path().join("settings.json")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn read_manifest_invalid_json_is_parse_issue() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ broken").unwrap();
        let finding = read_manifest(&path).unwrap_err();
        assert_eq!(finding.category, Category::ManifestParse);
        assert!(finding.is_issue());
        assert!(finding.message.contains("settings.json"));
    }
}
