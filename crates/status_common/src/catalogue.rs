//! Static catalogue of tracked third-party services.

use crate::error::StatusError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One tracked service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    /// Stable slug, unique within the catalogue
    pub id: String,
    pub display_name: String,
    /// Extra words that identify the service in free text
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Slug used by the aggregator site when it differs from `id`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregator_slug: Option<String>,
}

impl ServiceDescriptor {
    pub fn new(id: &str, display_name: &str) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            keywords: Vec::new(),
            aggregator_slug: None,
        }
    }

    pub fn with_keywords(mut self, keywords: &[&str]) -> Self {
        self.keywords = keywords.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn with_aggregator_slug(mut self, slug: &str) -> Self {
        self.aggregator_slug = Some(slug.to_string());
        self
    }

    /// Slug to look for on the aggregator site.
    pub fn slug(&self) -> &str {
        self.aggregator_slug.as_deref().unwrap_or(&self.id)
    }

    /// Whether `text` mentions this service by id, name or keyword.
    pub fn is_mentioned_in(&self, text: &str) -> bool {
        let words: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(|w| w.to_lowercase())
            .collect();

        std::iter::once(self.id.as_str())
            .chain(std::iter::once(self.display_name.as_str()))
            .chain(self.keywords.iter().map(String::as_str))
            .any(|needle| {
                let needle = needle.to_lowercase();
                if needle.contains(' ') {
                    text.to_lowercase().contains(&needle)
                } else {
                    words.iter().any(|w| *w == needle)
                }
            })
    }
}

/// Immutable, validated list of services. Order is significant: aggregate
/// details are reported in catalogue order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalogue {
    services: Vec<ServiceDescriptor>,
}

impl Catalogue {
    pub fn new(services: Vec<ServiceDescriptor>) -> Result<Self, StatusError> {
        let mut seen = HashSet::new();
        for service in &services {
            if service.id.trim().is_empty() {
                return Err(StatusError::Config("service id must not be empty".into()));
            }
            if !seen.insert(service.id.as_str()) {
                return Err(StatusError::Config(format!(
                    "duplicate service id '{}'",
                    service.id
                )));
            }
        }
        Ok(Self { services })
    }

    pub fn get(&self, id: &str) -> Option<&ServiceDescriptor> {
        self.services.iter().find(|s| s.id == id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.services.iter().map(|s| s.id.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ServiceDescriptor> {
        self.services.iter()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Services named in a free-text message, in catalogue order.
    pub fn mentioned_in(&self, text: &str) -> Vec<&ServiceDescriptor> {
        self.services
            .iter()
            .filter(|s| s.is_mentioned_in(text))
            .collect()
    }
}

impl Default for Catalogue {
    fn default() -> Self {
        Self {
            services: default_services(),
        }
    }
}

fn default_services() -> Vec<ServiceDescriptor> {
    vec![
        // Messaging and social
        ServiceDescriptor::new("whatsapp", "WhatsApp")
            .with_keywords(&["zap", "wpp"])
            .with_aggregator_slug("whatsapp-messenger"),
        ServiceDescriptor::new("facebook", "Facebook").with_keywords(&["fb"]),
        ServiceDescriptor::new("instagram", "Instagram").with_keywords(&["insta"]),
        ServiceDescriptor::new("telegram", "Telegram"),
        ServiceDescriptor::new("discord", "Discord"),
        ServiceDescriptor::new("twitter", "X (Twitter)").with_keywords(&["x"]),
        // Streaming
        ServiceDescriptor::new("youtube", "YouTube").with_keywords(&["yt"]),
        ServiceDescriptor::new("netflix", "Netflix"),
        // Cloud and platforms
        ServiceDescriptor::new("google", "Google").with_keywords(&["gmail"]),
        ServiceDescriptor::new("cloudflare", "Cloudflare"),
        ServiceDescriptor::new("amazon", "Amazon"),
        ServiceDescriptor::new("aws", "Amazon Web Services"),
        ServiceDescriptor::new("microsoft", "Microsoft").with_keywords(&["outlook", "teams"]),
        ServiceDescriptor::new("azure", "Microsoft Azure"),
        ServiceDescriptor::new("github", "GitHub"),
        // Banking
        ServiceDescriptor::new("nubank", "Nubank").with_keywords(&["nu"]),
        ServiceDescriptor::new("itau", "Itaú").with_keywords(&["itaú"]),
        ServiceDescriptor::new("bradesco", "Bradesco"),
        ServiceDescriptor::new("pix", "Pix"),
    ]
}
