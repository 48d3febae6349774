//! Persona to model resolution.
//!
//! Model names reported by the backend carry a tag (`llama3:8b`,
//! `mistral:latest`). Personas express preferences by base name, so both sides
//! are compared on the lowercased text before the first `:`.

use std::collections::{BTreeMap, HashSet};

use crate::persona::{PersonaEntry, PersonaRegistry};

/// Strip the tag from a model name and lowercase it.
pub fn base_model_name(name: &str) -> String {
    name.split(':').next().unwrap_or_default().to_lowercase()
}

/// Base names of every available model. Empty names are skipped.
pub fn available_bases<S: AsRef<str>>(available: &[S]) -> HashSet<String> {
    available
        .iter()
        .map(AsRef::as_ref)
        .filter(|name| !name.is_empty())
        .map(base_model_name)
        .collect()
}

fn pick(entry: &PersonaEntry, bases: &HashSet<String>, default_model: &str) -> String {
    entry
        .preferred_models
        .iter()
        .find(|preferred| bases.contains(&preferred.to_lowercase()))
        .map(|preferred| (*preferred).to_string())
        .unwrap_or_else(|| default_model.to_string())
}

/// Map every persona id to the model it should use.
///
/// Total over the registry: with no matching model (or no models at all) a
/// persona gets `default_model`.
pub fn resolve_models<S: AsRef<str>>(
    registry: &PersonaRegistry,
    available: &[S],
    default_model: &str,
) -> BTreeMap<String, String> {
    let bases = available_bases(available);
    registry
        .entries()
        .iter()
        .map(|entry| {
            (
                entry.persona.id.to_string(),
                pick(entry, &bases, default_model),
            )
        })
        .collect()
}

/// Resolve the model for a single persona. `None` if the id is unknown.
pub fn resolve_for<S: AsRef<str>>(
    registry: &PersonaRegistry,
    persona_id: &str,
    available: &[S],
    default_model: &str,
) -> Option<String> {
    let entry = registry.entry(persona_id)?;
    Some(pick(entry, &available_bases(available), default_model))
}
