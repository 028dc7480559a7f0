use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::models::{BankApp, BankCode};

/// Fixed lookup from store identifiers, codes and names to the tracked banks.
pub struct BankRegistry {
    apps: HashMap<BankCode, BankApp>,
    aliases: HashMap<String, BankCode>,
}

impl BankRegistry {
    pub fn new(apps: &[BankApp]) -> Self {
        let mut registry = Self {
            apps: HashMap::new(),
            aliases: HashMap::new(),
        };

        for app in apps {
            registry.add_app(app.clone());
        }

        registry
    }

    fn add_app(&mut self, app: BankApp) {
        let code = app.code;
        let aliases = [
            app.app_id.clone(),
            app.name.clone(),
            code.as_str().to_string(),
        ];

        for alias in aliases {
            self.aliases.insert(alias.trim().to_lowercase(), code);
        }
        self.apps.insert(code, app);
    }

    /// Resolve a store identifier (e.g. `com.combanketh.mobilebanking`).
    pub fn resolve_app_id(&self, app_id: &str) -> Option<&BankApp> {
        let code = self.aliases.get(&app_id.trim().to_lowercase())?;
        let app = self.apps.get(code)?;
        if app.app_id.eq_ignore_ascii_case(app_id.trim()) {
            Some(app)
        } else {
            None
        }
    }

    /// Resolve any known alias: store identifier, bank code or bank name.
    pub fn resolve(&self, value: &str) -> Option<&BankApp> {
        self.aliases
            .get(&value.trim().to_lowercase())
            .and_then(|code| self.apps.get(code))
    }

    /// Apps named by `filters`, or every app when none are given.
    pub fn select(&self, filters: &[String]) -> Result<Vec<BankApp>> {
        if filters.is_empty() {
            return Ok(self.apps().cloned().collect());
        }

        let mut selected: Vec<BankApp> = Vec::new();
        for filter in filters {
            let app = self
                .resolve(filter)
                .ok_or_else(|| Error::UnknownBank(filter.clone()))?;
            if !selected.iter().any(|a| a.code == app.code) {
                selected.push(app.clone());
            }
        }
        Ok(selected)
    }

    pub fn apps(&self) -> impl Iterator<Item = &BankApp> {
        BankCode::ALL.iter().filter_map(|code| self.apps.get(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> BankRegistry {
        BankRegistry::new(&[
            BankApp::new(BankCode::Cbe, "com.cbe"),
            BankApp::new(BankCode::Boa, "com.boa"),
            BankApp::new(BankCode::Dashen, "com.dashen"),
        ])
    }

    #[test]
    fn test_resolves_every_known_app_id() {
        let registry = registry();
        for app in registry.apps() {
            let resolved = registry.resolve_app_id(&app.app_id).unwrap();
            assert_eq!(resolved.code, app.code);
        }
        assert_eq!(
            registry.resolve_app_id("com.cbe").unwrap().name,
            "Commercial Bank of Ethiopia"
        );
    }

    #[test]
    fn test_rejects_unknown_app_id() {
        let registry = registry();
        assert!(registry.resolve_app_id("com.example.wallet").is_none());
        // codes and names are not store identifiers
        assert!(registry.resolve_app_id("CBE").is_none());
    }

    #[test]
    fn test_resolve_aliases() {
        let registry = registry();
        assert_eq!(registry.resolve("dashen").unwrap().code, BankCode::Dashen);
        assert_eq!(registry.resolve("Bank of Abyssinia").unwrap().code, BankCode::Boa);
        assert!(registry.resolve("Awash Bank").is_none());
    }

    #[test]
    fn test_select() {
        let registry = registry();
        assert_eq!(registry.select(&[]).unwrap().len(), 3);

        let picked = registry
            .select(&["boa".to_string(), "com.boa".to_string(), "CBE".to_string()])
            .unwrap();
        let codes: Vec<_> = picked.iter().map(|a| a.code).collect();
        assert_eq!(codes, vec![BankCode::Boa, BankCode::Cbe]);

        let err = registry.select(&["Awash".to_string()]).unwrap_err();
        assert!(matches!(err, Error::UnknownBank(ref name) if name == "Awash"));
    }
}
