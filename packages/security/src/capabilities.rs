// ABOUTME: Capability strings granted to agents and the check applied per request
// ABOUTME: Forms are "*", "<resource>:*", and "<resource>:<read|write|delete>"

use benos_core::{ValidationError, API_PREFIX};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Areas,
    Projects,
    Milestones,
    Boards,
    Tasks,
    Prds,
    Reports,
    Agents,
    Activity,
}

impl Resource {
    pub const ALL: [Resource; 9] = [
        Resource::Areas,
        Resource::Projects,
        Resource::Milestones,
        Resource::Boards,
        Resource::Tasks,
        Resource::Prds,
        Resource::Reports,
        Resource::Agents,
        Resource::Activity,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Resource::Areas => "areas",
            Resource::Projects => "projects",
            Resource::Milestones => "milestones",
            Resource::Boards => "boards",
            Resource::Tasks => "tasks",
            Resource::Prds => "prds",
            Resource::Reports => "reports",
            Resource::Agents => "agents",
            Resource::Activity => "activity",
        }
    }

    /// Resource owning a route segment. Subtasks are governed by `tasks`.
    pub fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "subtasks" => Some(Resource::Tasks),
            other => Resource::ALL.into_iter().find(|r| r.as_str() == other),
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    Read,
    Write,
    Delete,
}

impl Access {
    pub const ALL: [Access; 3] = [Access::Read, Access::Write, Access::Delete];

    pub fn as_str(self) -> &'static str {
        match self {
            Access::Read => "read",
            Access::Write => "write",
            Access::Delete => "delete",
        }
    }

    /// GET/HEAD read, POST/PUT/PATCH write, DELETE delete
    pub fn from_method(method: &str) -> Option<Self> {
        match method.to_ascii_uppercase().as_str() {
            "GET" | "HEAD" => Some(Access::Read),
            "POST" | "PUT" | "PATCH" => Some(Access::Write),
            "DELETE" => Some(Access::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a request needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requirement {
    pub resource: Resource,
    pub access: Access,
}

impl Requirement {
    pub const fn new(resource: Resource, access: Access) -> Self {
        Self { resource, access }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource, self.access)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Capability {
    All,
    AnyAccess(Resource),
    Scoped(Resource, Access),
}

impl Capability {
    pub fn grants(&self, requirement: Requirement) -> bool {
        match self {
            Capability::All => true,
            Capability::AnyAccess(resource) => *resource == requirement.resource,
            Capability::Scoped(resource, access) => {
                *resource == requirement.resource && *access == requirement.access
            }
        }
    }

    /// Capabilities a request needs, from its method and path; all must be held.
    /// Empty means the route only requires a valid key.
    ///
    /// Requirements that depend on the body (a bulk delete) are checked by the
    /// handler once the body is parsed.
    pub fn required_for(method: &str, path: &str) -> Vec<Requirement> {
        let Some(rest) = path.strip_prefix(API_PREFIX) else {
            return Vec::new();
        };
        let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
        let (Some(resource), Some(access)) = (
            segments.first().and_then(|s| Resource::from_segment(s)),
            Access::from_method(method),
        ) else {
            return Vec::new();
        };

        match (resource, segments.as_slice()) {
            (Resource::Agents, [_, "me"]) => Vec::new(),
            // Extraction creates tasks on a board
            (Resource::Prds, [_, _, "extract-tasks"]) => vec![
                Requirement::new(Resource::Prds, access),
                Requirement::new(Resource::Tasks, Access::Write),
            ],
            _ => vec![Requirement::new(resource, access)],
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::All => f.write_str("*"),
            Capability::AnyAccess(resource) => write!(f, "{}:*", resource),
            Capability::Scoped(resource, access) => write!(f, "{}:{}", resource, access),
        }
    }
}

impl FromStr for Capability {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        if value == "*" {
            return Ok(Capability::All);
        }

        let (resource, access) = value.split_once(':').ok_or_else(|| {
            ValidationError::invalid(
                "capabilities",
                format!("'{}' is not resource:action", value),
            )
        })?;

        let resource = Resource::ALL
            .into_iter()
            .find(|r| r.as_str() == resource)
            .ok_or_else(|| ValidationError::invalid_enum("capabilities", resource, &Resource::ALL))?;

        if access == "*" {
            return Ok(Capability::AnyAccess(resource));
        }
        let access = Access::ALL
            .into_iter()
            .find(|a| a.as_str() == access)
            .ok_or_else(|| ValidationError::invalid_enum("capabilities", access, &Access::ALL))?;

        Ok(Capability::Scoped(resource, access))
    }
}

impl TryFrom<String> for Capability {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Capability> for String {
    fn from(value: Capability) -> Self {
        value.to_string()
    }
}

/// Parse a list of capability strings, rejecting an empty list
pub fn parse_capabilities<S: AsRef<str>>(values: &[S]) -> Result<Vec<Capability>, ValidationError> {
    if values.is_empty() {
        return Err(ValidationError::required("capabilities"));
    }
    let mut parsed: Vec<Capability> = Vec::with_capacity(values.len());
    for value in values {
        let capability: Capability = value.as_ref().parse()?;
        if !parsed.contains(&capability) {
            parsed.push(capability);
        }
    }
    Ok(parsed)
}

pub fn allows(capabilities: &[Capability], requirement: Requirement) -> bool {
    capabilities.iter().any(|c| c.grants(requirement))
}
