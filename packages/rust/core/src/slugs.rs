//! Slug allocation under a [`CollisionPolicy`].

use std::collections::HashMap;

use tracing::warn;

use akdata_shared::CollisionPolicy;

/// Tracks which entity owns each slug within one output directory.
#[derive(Debug)]
pub(crate) struct SlugRegistry {
    kind: &'static str,
    policy: CollisionPolicy,
    owners: HashMap<String, String>,
    collisions: Vec<String>,
}

impl SlugRegistry {
    pub fn new(kind: &'static str, policy: CollisionPolicy) -> Self {
        Self {
            kind,
            policy,
            owners: HashMap::new(),
            collisions: Vec::new(),
        }
    }

    /// Claim `slug` for the entity `owner`.
    ///
    /// Returns the slug to write under, or `None` when the entity must be
    /// skipped. Re-claiming a slug for the same owner is not a collision.
    pub fn claim(&mut self, slug: &str, owner: &str) -> Option<String> {
        match self.owners.get(slug) {
            None => {
                self.owners.insert(slug.to_string(), owner.to_string());
                return Some(slug.to_string());
            }
            Some(existing) if existing == owner => return Some(slug.to_string()),
            Some(_) => {}
        }

        self.collisions.push(format!("{slug}: {} {owner}", self.kind));
        warn!(slug, owner, kind = self.kind, policy = %self.policy, "slug collision");

        match self.policy {
            CollisionPolicy::LastWins => {
                self.owners.insert(slug.to_string(), owner.to_string());
                Some(slug.to_string())
            }
            CollisionPolicy::FirstWins => None,
            CollisionPolicy::Suffix => {
                let suffixed = (2..)
                    .map(|n| format!("{slug}-{n}"))
                    .find(|candidate| !self.owners.contains_key(candidate))?;
                self.owners.insert(suffixed.clone(), owner.to_string());
                Some(suffixed)
            }
        }
    }

    pub fn into_collisions(self) -> Vec<String> {
        self.collisions
    }
}
