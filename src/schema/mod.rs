//! Resource and relationship metadata.
//!
//! The planner needs three things from metadata: resolve a relationship path
//! to the resource it lands on, list a resource's primary-key fields, and
//! derive the reverse relationship used to re-scope a related resource back
//! onto primary rows. [`Schema`] is the registry that answers all three.

use std::collections::HashMap;
use thiserror::Error;

/// Result type for schema lookups.
pub type SchemaResult<T> = Result<T, SchemaError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("unknown resource: {0:?}")]
    UnknownResource(String),

    #[error("unknown relationship {relationship:?} on resource {resource:?}")]
    UnknownRelationship {
        resource: String,
        relationship: String,
    },
}

// =============================================================================
// Relationships
// =============================================================================

/// Structural kind of a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipKind {
    HasMany,
    HasOne,
    BelongsTo,
    /// Computed at read time; has no join fields and never a reverse.
    Virtual,
}

/// One structural relationship on a resource.
#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    pub name: String,
    pub destination: String,
    pub kind: RelationshipKind,
    /// Join field on the owning resource. `None` for virtual relationships.
    pub source_field: Option<String>,
    /// Join field on the destination resource. `None` for virtual relationships.
    pub destination_field: Option<String>,
    /// Explicit reverse relationship name on the destination, when the
    /// structural derivation below should be overridden.
    pub reverse: Option<String>,
}

impl Relationship {
    pub fn has_many(name: &str, destination: &str, source_field: &str, destination_field: &str) -> Self {
        Self::new(name, destination, RelationshipKind::HasMany, source_field, destination_field)
    }

    pub fn has_one(name: &str, destination: &str, source_field: &str, destination_field: &str) -> Self {
        Self::new(name, destination, RelationshipKind::HasOne, source_field, destination_field)
    }

    pub fn belongs_to(name: &str, destination: &str, source_field: &str, destination_field: &str) -> Self {
        Self::new(name, destination, RelationshipKind::BelongsTo, source_field, destination_field)
    }

    /// A computed relationship with no structural join fields.
    pub fn virtual_rel(name: &str, destination: &str) -> Self {
        Self {
            name: name.into(),
            destination: destination.into(),
            kind: RelationshipKind::Virtual,
            source_field: None,
            destination_field: None,
            reverse: None,
        }
    }

    pub fn with_reverse(mut self, reverse: &str) -> Self {
        self.reverse = Some(reverse.into());
        self
    }

    fn new(
        name: &str,
        destination: &str,
        kind: RelationshipKind,
        source_field: &str,
        destination_field: &str,
    ) -> Self {
        Self {
            name: name.into(),
            destination: destination.into(),
            kind,
            source_field: Some(source_field.into()),
            destination_field: Some(destination_field.into()),
            reverse: None,
        }
    }
}

/// The reverse traversal for a whole relationship path: hop names, in
/// reverse order, walking from the related resource back to the one the
/// aggregate was declared on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReverseRelationship {
    pub path: Vec<String>,
    /// The resource the forward path lands on (where the reverse starts).
    pub related: String,
}

// =============================================================================
// Resources and the schema registry
// =============================================================================

/// A resource: primary key plus named relationships.
#[derive(Debug, Clone, PartialEq, Default)]
#[must_use = "builders have no effect until used"]
pub struct Resource {
    pub name: String,
    pub primary_key: Vec<String>,
    pub relationships: HashMap<String, Relationship>,
}

impl Resource {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            primary_key: vec!["id".into()],
            relationships: HashMap::new(),
        }
    }

    pub fn with_primary_key(mut self, fields: &[&str]) -> Self {
        self.primary_key = fields.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_relationship(mut self, relationship: Relationship) -> Self {
        self.relationships
            .insert(relationship.name.clone(), relationship);
        self
    }
}

/// Registry of resources, indexed by name.
#[derive(Debug, Clone, Default)]
#[must_use = "builders have no effect until used"]
pub struct Schema {
    resources: HashMap<String, Resource>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resources.insert(resource.name.clone(), resource);
        self
    }

    pub fn resource(&self, name: &str) -> SchemaResult<&Resource> {
        self.resources
            .get(name)
            .ok_or_else(|| SchemaError::UnknownResource(name.into()))
    }

    /// Primary-key field list for a resource.
    pub fn primary_key(&self, resource: &str) -> SchemaResult<&[String]> {
        Ok(&self.resource(resource)?.primary_key)
    }

    pub fn relationship(&self, resource: &str, name: &str) -> SchemaResult<&Relationship> {
        self.resource(resource)?.relationships.get(name).ok_or_else(|| {
            SchemaError::UnknownRelationship {
                resource: resource.into(),
                relationship: name.into(),
            }
        })
    }

    /// Resolve a relationship path to the resource it lands on.
    pub fn related(&self, resource: &str, path: &[String]) -> SchemaResult<String> {
        let mut current = resource.to_string();
        for hop in path {
            current = self.relationship(&current, hop)?.destination.clone();
        }
        Ok(current)
    }

    /// Derive the reverse relationship for a whole path.
    ///
    /// Returns `None` when any hop is one-directional: virtual, or without a
    /// relationship on its destination that points back through the same
    /// join fields. Absence forces in-query resolution of the path.
    pub fn reverse_relationship(
        &self,
        resource: &str,
        path: &[String],
    ) -> SchemaResult<Option<ReverseRelationship>> {
        let mut current = resource.to_string();
        let mut reverse_hops = Vec::with_capacity(path.len());

        for hop in path {
            let relationship = self.relationship(&current, hop)?;
            match self.reverse_of(&current, relationship)? {
                Some(name) => reverse_hops.push(name),
                None => return Ok(None),
            }
            current = relationship.destination.clone();
        }

        reverse_hops.reverse();
        Ok(Some(ReverseRelationship {
            path: reverse_hops,
            related: current,
        }))
    }

    /// The name of the relationship on `relationship.destination` that walks
    /// back to `source`, if one exists.
    fn reverse_of(&self, source: &str, relationship: &Relationship) -> SchemaResult<Option<String>> {
        if relationship.kind == RelationshipKind::Virtual {
            return Ok(None);
        }
        if let Some(name) = &relationship.reverse {
            return Ok(Some(name.clone()));
        }

        let destination = self.resource(&relationship.destination)?;
        let found = destination.relationships.values().find(|candidate| {
            candidate.kind != RelationshipKind::Virtual
                && candidate.destination == source
                && candidate.source_field == relationship.destination_field
                && candidate.destination_field == relationship.source_field
        });
        Ok(found.map(|r| r.name.clone()))
    }
}
