//! Persona registry.
//!
//! The registry is built once at startup and shared read-only between
//! requests.

use serde::Serialize;

/// A character users can chat with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Persona {
    /// Short key used in URLs.
    pub id: &'static str,
    /// Full name shown to users and used to pick a prompt template.
    pub display_name: &'static str,
    /// Avatar image path.
    pub avatar: &'static str,
}

/// A persona together with its ranked base-model preferences.
#[derive(Debug, Clone, Copy)]
pub struct PersonaEntry {
    pub persona: Persona,
    /// Base model names, most preferred first.
    pub preferred_models: &'static [&'static str],
}

/// Immutable set of personas, in display order.
#[derive(Debug, Clone)]
pub struct PersonaRegistry {
    entries: Vec<PersonaEntry>,
}

const BUILTIN: &[PersonaEntry] = &[
    PersonaEntry {
        persona: Persona {
            id: "einstein",
            display_name: "Albert Einstein",
            avatar: "/images/einstein.jpg",
        },
        preferred_models: &["llama3", "mistral", "gemma"],
    },
    PersonaEntry {
        persona: Persona {
            id: "frida",
            display_name: "Frida Kahlo",
            avatar: "/images/frida.jpg",
        },
        preferred_models: &["mistral", "llama3", "gemma"],
    },
    PersonaEntry {
        persona: Persona {
            id: "leonardo",
            display_name: "Leonardo da Vinci",
            avatar: "/images/leonardo.jpg",
        },
        preferred_models: &["gemma", "mistral", "llama3"],
    },
    PersonaEntry {
        persona: Persona {
            id: "curie",
            display_name: "Marie Curie",
            avatar: "/images/curie.jpg",
        },
        preferred_models: &["llama3", "mistral", "gemma"],
    },
];

impl PersonaRegistry {
    pub fn new(entries: Vec<PersonaEntry>) -> Self {
        Self { entries }
    }

    /// The personas shipped with the server.
    pub fn builtin() -> Self {
        Self::new(BUILTIN.to_vec())
    }

    /// Look up a persona by id.
    pub fn get(&self, id: &str) -> Option<&Persona> {
        self.entry(id).map(|e| &e.persona)
    }

    pub fn entry(&self, id: &str) -> Option<&PersonaEntry> {
        self.entries.iter().find(|e| e.persona.id == id)
    }

    pub fn entries(&self) -> &[PersonaEntry] {
        &self.entries
    }

    pub fn personas(&self) -> impl Iterator<Item = &Persona> {
        self.entries.iter().map(|e| &e.persona)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for PersonaRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
