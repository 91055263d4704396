//! In-memory carrier registry with detection and adapter lookup.

use crate::{
    adapter::{AdapterFactory, CarrierAdapter},
    definition::CarrierDefinition,
    email::EmailMatcher,
    error::{CarrierError, Result},
    loader::CarrierLoader,
};
use parcelwatch_core::{CarrierId, TrackingNumber};
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// A loaded carrier: its definition, compiled patterns, and adapter.
pub struct CarrierEntry {
    definition: Arc<CarrierDefinition>,
    patterns: Vec<Regex>,
    email: Option<EmailMatcher>,
    adapter: Arc<dyn CarrierAdapter>,
}

impl CarrierEntry {
    /// The carrier's definition.
    #[must_use]
    pub fn definition(&self) -> &Arc<CarrierDefinition> {
        &self.definition
    }

    /// The carrier's adapter.
    #[must_use]
    pub fn adapter(&self) -> Arc<dyn CarrierAdapter> {
        Arc::clone(&self.adapter)
    }

    /// Whether any of the carrier's patterns matches the number.
    #[must_use]
    pub fn matches(&self, tracking_number: &TrackingNumber) -> bool {
        self.patterns
            .iter()
            .any(|p| p.is_match(tracking_number.as_str()))
    }

    /// Find this carrier's tracking number in an email.
    #[must_use]
    pub fn extract_from_email(&self, subject: &str, body: &str) -> Option<TrackingNumber> {
        self.email.as_ref()?.extract(subject, body)
    }
}

impl std::fmt::Debug for CarrierEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CarrierEntry")
            .field("id", self.definition.id())
            .field("patterns", &self.patterns.len())
            .finish_non_exhaustive()
    }
}

/// Immutable registry of loaded carriers.
///
/// Carriers keep their declaration order, which is the order [`detect`]
/// reports candidates in. The registry is cheap to clone.
///
/// [`detect`]: CarrierRegistry::detect
#[derive(Clone, Debug)]
pub struct CarrierRegistry {
    inner: Arc<RegistryInner>,
}

#[derive(Debug)]
struct RegistryInner {
    entries: Vec<CarrierEntry>,
    index: HashMap<CarrierId, usize>,
}

impl CarrierRegistry {
    /// Load every definition under `dir` and build adapters with `factory`.
    ///
    /// # Errors
    /// Fails as a whole on the first malformed, invalid, or duplicate
    /// definition.
    pub fn load(dir: impl AsRef<Path>, factory: &dyn AdapterFactory) -> Result<Self> {
        let loader = CarrierLoader::new(dir.as_ref())?;
        Self::load_from(&loader, factory)
    }

    /// Build a registry from a loader.
    ///
    /// # Errors
    /// See [`CarrierRegistry::load`].
    pub fn load_from(loader: &CarrierLoader, factory: &dyn AdapterFactory) -> Result<Self> {
        Self::from_definitions(loader.load_all()?, factory)
    }

    /// Build a registry from definitions in declaration order.
    ///
    /// # Errors
    /// Returns `Invalid` for a definition that fails validation or whose
    /// regexes don't compile, and `Duplicate` for a repeated carrier ID.
    pub fn from_definitions(
        definitions: Vec<CarrierDefinition>,
        factory: &dyn AdapterFactory,
    ) -> Result<Self> {
        let mut entries = Vec::with_capacity(definitions.len());
        let mut index = HashMap::with_capacity(definitions.len());

        for definition in definitions {
            definition.validate()?;
            let id = definition.id().clone();

            if index.contains_key(&id) {
                return Err(CarrierError::Duplicate {
                    carrier_id: id.to_string(),
                });
            }

            let patterns = definition
                .tracking_patterns
                .iter()
                .map(|p| {
                    Regex::new(&p.regex).map_err(|e| {
                        CarrierError::invalid(&id, format!("bad tracking pattern '{}': {e}", p.regex))
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            let email = definition
                .email_patterns
                .as_ref()
                .map(EmailMatcher::compile)
                .transpose()
                .map_err(|e| CarrierError::invalid(&id, format!("bad email tracking_regex: {e}")))?;

            let definition = Arc::new(definition);
            let adapter = factory.build(Arc::clone(&definition))?;

            debug!(
                carrier_id = %id,
                patterns = patterns.len(),
                method = definition.adapter_kind().display_name(),
                "registered carrier"
            );

            index.insert(id, entries.len());
            entries.push(CarrierEntry {
                definition,
                patterns,
                email,
                adapter,
            });
        }

        info!(count = entries.len(), "carrier registry ready");

        Ok(Self {
            inner: Arc::new(RegistryInner { entries, index }),
        })
    }

    /// Get the adapter for a carrier.
    ///
    /// # Errors
    /// Returns `NotFound` if the carrier isn't registered.
    pub fn get(&self, carrier_id: &CarrierId) -> Result<Arc<dyn CarrierAdapter>> {
        self.entry(carrier_id).map(CarrierEntry::adapter)
    }

    /// Get the full entry for a carrier.
    ///
    /// # Errors
    /// Returns `NotFound` if the carrier isn't registered.
    pub fn entry(&self, carrier_id: &CarrierId) -> Result<&CarrierEntry> {
        self.inner
            .index
            .get(carrier_id)
            .map(|&i| &self.inner.entries[i])
            .ok_or_else(|| CarrierError::NotFound {
                carrier_id: carrier_id.to_string(),
            })
    }

    /// Carriers whose patterns match a raw tracking number, in declaration order.
    ///
    /// The input is normalized first. Input that isn't a valid tracking
    /// number matches nothing.
    #[must_use]
    pub fn detect(&self, raw: &str) -> Vec<CarrierId> {
        match TrackingNumber::new(raw) {
            Ok(number) => self.detect_number(&number),
            Err(_) => Vec::new(),
        }
    }

    /// Carriers whose patterns match a normalized tracking number.
    #[must_use]
    pub fn detect_number(&self, tracking_number: &TrackingNumber) -> Vec<CarrierId> {
        self.inner
            .entries
            .iter()
            .filter(|entry| entry.matches(tracking_number))
            .map(|entry| entry.definition.id().clone())
            .collect()
    }

    /// Tracking numbers found in an email, one per matching carrier, in
    /// declaration order.
    #[must_use]
    pub fn detect_in_email(&self, subject: &str, body: &str) -> Vec<(CarrierId, TrackingNumber)> {
        self.inner
            .entries
            .iter()
            .filter_map(|entry| {
                entry
                    .extract_from_email(subject, body)
                    .map(|number| (entry.definition.id().clone(), number))
            })
            .collect()
    }

    /// All entries in declaration order.
    pub fn entries(&self) -> impl Iterator<Item = &CarrierEntry> {
        self.inner.entries.iter()
    }

    /// All carrier IDs in declaration order.
    #[must_use]
    pub fn ids(&self) -> Vec<CarrierId> {
        self.entries().map(|e| e.definition.id().clone()).collect()
    }

    /// Number of registered carriers.
    #[must_use]
    pub fn count(&self) -> usize {
        self.inner.entries.len()
    }

    /// Check if a carrier is registered.
    #[must_use]
    pub fn contains(&self, carrier_id: &CarrierId) -> bool {
        self.inner.index.contains_key(carrier_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{
        CarrierMetadata, EventsOrder, FetchMethod, HtmlExtraction, TrackingPatternDef,
    };
    use async_trait::async_trait;
    use parcelwatch_core::{ErrorKind, TrackingResult};

    struct NullAdapter;

    #[async_trait]
    impl CarrierAdapter for NullAdapter {
        async fn fetch_status(&self, _tracking_number: &TrackingNumber) -> TrackingResult {
            TrackingResult::failure(ErrorKind::NotFound, "null adapter")
        }
    }

    fn null_factory(_definition: Arc<CarrierDefinition>) -> Result<Arc<dyn CarrierAdapter>> {
        Ok(Arc::new(NullAdapter))
    }

    fn definition(id: &str, patterns: &[&str]) -> CarrierDefinition {
        CarrierDefinition {
            carrier: CarrierMetadata {
                id: CarrierId::new(id).expect("valid carrier ID"),
                name: id.to_string(),
                website: "https://test.example".to_string(),
                tracking_url_template: "https://test.example/{tracking_number}".to_string(),
                enabled: true,
            },
            tracking_patterns: patterns
                .iter()
                .map(|p| TrackingPatternDef {
                    regex: (*p).to_string(),
                    description: String::new(),
                })
                .collect(),
            status_mapping: crate::StatusMapping::default(),
            email_patterns: None,
            fetch: FetchMethod::Scrape(HtmlExtraction {
                status_selector: ".status".to_string(),
                event_selector: ".event".to_string(),
                event_text_selector: None,
                event_location_selector: None,
                event_time_selector: None,
                time_format: None,
                not_found_selector: None,
                events_order: EventsOrder::NewestFirst,
            }),
        }
    }

    #[test]
    fn test_get_and_not_found() {
        let registry =
            CarrierRegistry::from_definitions(vec![definition("alpha", &["^A[0-9]+$"])], &null_factory)
                .expect("build registry");

        let alpha = CarrierId::new("alpha").expect("valid carrier ID");
        assert!(registry.get(&alpha).is_ok());
        assert!(registry.contains(&alpha));
        assert_eq!(registry.count(), 1);

        let missing = CarrierId::new("missing").expect("valid carrier ID");
        assert!(matches!(
            registry.get(&missing),
            Err(CarrierError::NotFound { .. })
        ));
    }

    #[test]
    fn test_detect_returns_all_candidates_in_declaration_order() {
        let registry = CarrierRegistry::from_definitions(
            vec![
                definition("zulu", &["^[0-9]{10}$"]),
                definition("alpha", &["^[0-9]{8,12}$"]),
                definition("other", &["^X[0-9]+$"]),
            ],
            &null_factory,
        )
        .expect("build registry");

        let ids: Vec<String> = registry
            .detect("1234567890")
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(ids, vec!["zulu", "alpha"]);

        assert!(registry.detect("nothing-matches").is_empty());
        assert!(registry.detect("").is_empty());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let result = CarrierRegistry::from_definitions(
            vec![
                definition("alpha", &["^A$"]),
                definition("alpha", &["^B$"]),
            ],
            &null_factory,
        );
        assert!(matches!(result, Err(CarrierError::Duplicate { .. })));
    }

    #[test]
    fn test_bad_regex_rejected() {
        let result = CarrierRegistry::from_definitions(
            vec![definition("alpha", &["^[A-Z"])],
            &null_factory,
        );
        match result {
            Err(CarrierError::Invalid { carrier_id, reason }) => {
                assert_eq!(carrier_id, "alpha");
                assert!(reason.contains("bad tracking pattern"));
            }
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn test_factory_error_aborts_load() {
        let failing = |definition: Arc<CarrierDefinition>| -> Result<Arc<dyn CarrierAdapter>> {
            Err(CarrierError::invalid(definition.id(), "bad selector"))
        };
        let result =
            CarrierRegistry::from_definitions(vec![definition("alpha", &["^A$"])], &failing);
        assert!(matches!(result, Err(CarrierError::Invalid { .. })));
    }
}
