//! Capability checks for resource actions.
//!
//! # Purpose
//! Defines the [`Abilities`] contract the controller consults before every
//! store interaction, and [`PermissionAbilities`], which answers it from the
//! `action:object` permissions carried by the caller's token.
//!
//! # Permission grammar
//! - `action` is one of `list`, `read`, `create`, `update`, `delete`, or `*`.
//! - `object` is `<kind>/<name pattern>` matched with Casbin `key_match2`,
//!   e.g. `checks/*`, `checks/web-:id`, `handlers/slack`.
//!
//! # Key invariants
//! - Instance-scoped actions (read, create, update) test `<kind>/<name>`.
//! - Context-only actions (list, delete) test the collection object
//!   `<kind>/*`, so only a grant covering every name (`*` or a bare `:param`)
//!   allows them.
//! - Literal name characters match only themselves; a grant for `web.1` does
//!   not cover `web-1`.
use crate::model::Resource;
use casbin::function_map::key_match2;

/// Capability predicates for one resource type, scoped to the acting caller.
pub trait Abilities<R: Resource>: Send + Sync {
    fn can_list(&self) -> bool;
    fn can_read(&self, resource: &R) -> bool;
    fn can_create(&self, resource: &R) -> bool;
    fn can_update(&self, resource: &R) -> bool;
    fn can_delete(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    List,
    Read,
    Create,
    Update,
    Delete,
}

impl Action {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "list" => Some(Action::List),
            "read" => Some(Action::Read),
            "create" => Some(Action::Create),
            "update" => Some(Action::Update),
            "delete" => Some(Action::Delete),
            _ => None,
        }
    }
}

/// A single granted permission. `action: None` grants every action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permission {
    pub action: Option<Action>,
    /// The object as written in the grant, e.g. `checks/web-:id`.
    pub object: String,
    /// `object` rewritten for `key_match2` with literal dots escaped.
    pattern: String,
}

impl Permission {
    fn grants(&self, action: Action, object: &str) -> bool {
        self.action.is_none_or(|granted| granted == action) && key_match2(object, &self.pattern)
    }
}

fn is_literal_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-'
}

fn escape_literal(literal: &str) -> String {
    literal.replace('.', r"\.")
}

/// Translate a `<name pattern>` into a `key_match2` pattern.
///
/// Accepted forms are `*`, a literal name, `:param`, and a literal prefix
/// followed by `:param` (`web-:id`). Anything else is rejected so that no
/// grant can reach casbin's regex compiler with unescaped metacharacters.
fn compile_name_pattern(pattern: &str) -> Result<String, String> {
    if pattern == "*" {
        return Ok(pattern.to_string());
    }
    let (literal, param) = match pattern.split_once(':') {
        Some((literal, param)) => (literal, Some(param)),
        None => (pattern, None),
    };
    if let Some(c) = literal.chars().find(|c| !is_literal_char(*c)) {
        return Err(format!("unsupported character {c:?} in pattern {pattern:?}"));
    }
    match param {
        None => Ok(escape_literal(literal)),
        Some(param) => {
            let valid = !param.is_empty()
                && param.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
            if !valid {
                return Err(format!("invalid parameter in pattern {pattern:?}"));
            }
            Ok(format!("{}:{param}", escape_literal(literal)))
        }
    }
}

pub fn parse_permission(raw: &str) -> Result<Permission, String> {
    let (action, object) = raw
        .split_once(':')
        .ok_or_else(|| "invalid permission format".to_string())?;
    let action = match action {
        "*" => None,
        other => Some(Action::parse(other).ok_or_else(|| format!("unknown action: {other}"))?),
    };
    let (kind, name_pattern) = object
        .split_once('/')
        .ok_or_else(|| "permission object must be <kind>/<name>".to_string())?;
    if kind.is_empty() || name_pattern.is_empty() {
        return Err("empty object segment".to_string());
    }
    if !kind.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(format!("invalid kind {kind:?}"));
    }
    let pattern = format!("{kind}/{}", compile_name_pattern(name_pattern)?);
    Ok(Permission {
        action,
        object: object.to_string(),
        pattern,
    })
}

/// Abilities answered from a principal's granted permissions.
#[derive(Debug, Clone, Copy)]
pub struct PermissionAbilities<'a> {
    permissions: &'a [Permission],
}

impl<'a> PermissionAbilities<'a> {
    pub fn new(permissions: &'a [Permission]) -> Self {
        Self { permissions }
    }

    fn allows(&self, action: Action, object: &str) -> bool {
        self.permissions
            .iter()
            .any(|permission| permission.grants(action, object))
    }

    fn allows_collection<R: Resource>(&self, action: Action) -> bool {
        self.allows(action, &format!("{}/*", R::KIND))
    }

    fn allows_instance<R: Resource>(&self, action: Action, resource: &R) -> bool {
        self.allows(action, &format!("{}/{}", R::KIND, resource.name()))
    }
}

impl<R: Resource> Abilities<R> for PermissionAbilities<'_> {
    fn can_list(&self) -> bool {
        self.allows_collection::<R>(Action::List)
    }

    fn can_read(&self, resource: &R) -> bool {
        self.allows_instance(Action::Read, resource)
    }

    fn can_create(&self, resource: &R) -> bool {
        self.allows_instance(Action::Create, resource)
    }

    fn can_update(&self, resource: &R) -> bool {
        self.allows_instance(Action::Update, resource)
    }

    fn can_delete(&self) -> bool {
        self.allows_collection::<R>(Action::Delete)
    }
}
