use super::{Provider, Resolution};
use crate::error::{Error, Result};
use crate::service::ConnectionHandle;

/// The needs of one test suite, each with its own [`Provider`].
///
/// Needs keep the order they were added in; `up` resolves them in that order.
#[derive(Debug, Default)]
pub struct Collection {
    providers: Vec<Provider>,
}

impl Collection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a provider. Fails with `NameConflict` if its need is already managed.
    pub fn manage(&mut self, provider: Provider) -> Result<()> {
        if self.contains(provider.need()) {
            return Err(Error::NameConflict(provider.need().to_string()));
        }
        self.providers.push(provider);
        Ok(())
    }

    pub fn contains(&self, need: &str) -> bool {
        self.providers.iter().any(|p| p.need() == need)
    }

    pub fn needs(&self) -> impl Iterator<Item = &str> {
        self.providers.iter().map(Provider::need)
    }

    pub fn providers(&self) -> &[Provider] {
        &self.providers
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// The provider for `need`.
    pub fn obtain(&self, need: &str) -> Result<&Provider> {
        self.providers
            .iter()
            .find(|p| p.need() == need)
            .ok_or_else(|| Error::NeedNotFound(need.to_string()))
    }

    /// Provision `need` and return its handle.
    pub async fn get(&self, need: &str) -> Result<ConnectionHandle> {
        self.obtain(need)?.get_instance().await
    }

    /// Provision `need`, reporting which candidate served it.
    pub async fn resolve(&self, need: &str) -> Result<Resolution> {
        self.obtain(need)?.resolve().await
    }

    /// Provision every need in order. Stops at the first failure.
    pub async fn up(&self) -> Result<Vec<Resolution>> {
        let mut resolutions = Vec::with_capacity(self.providers.len());
        for provider in &self.providers {
            resolutions.push(provider.resolve().await?);
        }
        Ok(resolutions)
    }

    /// Tear down every need, in reverse order.
    ///
    /// Keeps going past failures and reports them together.
    pub async fn down(&self) -> Result<()> {
        let mut errors = Vec::new();
        for provider in self.providers.iter().rev() {
            let failures = provider.down().await;
            if !failures.is_empty() {
                tracing::warn!(
                    "{} error(s) tearing down need '{}'",
                    failures.len(),
                    provider.need()
                );
            }
            errors.extend(failures);
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(Error::Multiple(errors)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manage_rejects_duplicate_need() {
        let mut collection = Collection::new();
        collection.manage(Provider::new("postgres")).unwrap();
        collection.manage(Provider::new("redis")).unwrap();

        assert!(matches!(
            collection.manage(Provider::new("postgres")),
            Err(Error::NameConflict(need)) if need == "postgres"
        ));
        assert_eq!(collection.needs().collect::<Vec<_>>(), vec!["postgres", "redis"]);
    }

    #[test]
    fn test_obtain_unknown_need() {
        let collection = Collection::new();
        assert!(matches!(
            collection.obtain("postgres"),
            Err(Error::NeedNotFound(need)) if need == "postgres"
        ));
    }
}
