//! VIM (placement and credential) resolution.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use async_trait::async_trait;

use crate::context::RequestContext;
use crate::error::{Error, Result};

/// Resolved placement and credentials for a VIM.
#[derive(Clone, PartialEq, Eq)]
pub struct VimAuth {
    /// VIM ID.
    pub vim_id: String,
    /// VIM name, recorded in placement.
    pub vim_name: String,
    /// Opaque credential payload passed to infra drivers.
    pub auth: BTreeMap<String, String>,
}

impl VimAuth {
    /// Creates credentials with an empty payload.
    #[must_use]
    pub fn new(vim_id: impl Into<String>, vim_name: impl Into<String>) -> Self {
        Self {
            vim_id: vim_id.into(),
            vim_name: vim_name.into(),
            auth: BTreeMap::new(),
        }
    }

    /// Adds a credential entry.
    #[must_use]
    pub fn with_auth(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.auth.insert(key.into(), value.into());
        self
    }
}

impl fmt::Debug for VimAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VimAuth")
            .field("vim_id", &self.vim_id)
            .field("vim_name", &self.vim_name)
            .field("auth", &self.auth.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Resolves a VIM reference to placement and credentials.
#[async_trait]
pub trait VimResolver: Send + Sync {
    /// Resolves `vim_id` (or the default VIM when absent) for `region_name`.
    ///
    /// # Errors
    ///
    /// Returns `VimNotFound` or `VimRegionNotFound` when unresolved.
    async fn resolve(
        &self,
        ctx: &RequestContext,
        vim_id: Option<&str>,
        region_name: Option<&str>,
    ) -> Result<VimAuth>;
}

#[derive(Debug, Clone)]
struct VimEntry {
    auth: VimAuth,
    regions: BTreeSet<String>,
}

/// Resolver over a fixed set of VIMs.
#[derive(Debug, Clone, Default)]
pub struct StaticVimResolver {
    vims: BTreeMap<String, VimEntry>,
    default_vim: Option<String>,
}

impl StaticVimResolver {
    /// Creates an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a resolver with one default VIM serving every region.
    #[must_use]
    pub fn single(vim_id: impl Into<String>, vim_name: impl Into<String>) -> Self {
        let auth = VimAuth::new(vim_id, vim_name);
        let default = auth.vim_id.clone();
        Self::new().with_vim(auth, Vec::<String>::new()).with_default(default)
    }

    /// Adds a VIM. An empty region list serves every region.
    #[must_use]
    pub fn with_vim<I, S>(mut self, auth: VimAuth, regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let regions = regions.into_iter().map(Into::into).collect();
        self.vims
            .insert(auth.vim_id.clone(), VimEntry { auth, regions });
        self
    }

    /// Sets the VIM used when a request names none.
    #[must_use]
    pub fn with_default(mut self, vim_id: impl Into<String>) -> Self {
        self.default_vim = Some(vim_id.into());
        self
    }
}

#[async_trait]
impl VimResolver for StaticVimResolver {
    async fn resolve(
        &self,
        _ctx: &RequestContext,
        vim_id: Option<&str>,
        region_name: Option<&str>,
    ) -> Result<VimAuth> {
        let vim_id = vim_id
            .or(self.default_vim.as_deref())
            .ok_or_else(|| Error::VimNotFound {
                vim_id: "default".into(),
            })?;
        let entry = self.vims.get(vim_id).ok_or_else(|| Error::VimNotFound {
            vim_id: vim_id.to_string(),
        })?;
        if let Some(region) = region_name {
            if !entry.regions.is_empty() && !entry.regions.contains(region) {
                return Err(Error::VimRegionNotFound {
                    vim_id: vim_id.to_string(),
                    region: region.to_string(),
                });
            }
        }
        Ok(entry.auth.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> StaticVimResolver {
        StaticVimResolver::new()
            .with_vim(
                VimAuth::new("vim-1", "openstack-east").with_auth("password", "hunter2"),
                ["RegionOne"],
            )
            .with_vim(VimAuth::new("vim-2", "openstack-west"), Vec::<String>::new())
            .with_default("vim-1")
    }

    #[tokio::test]
    async fn resolves_default_vim() -> Result<()> {
        let ctx = RequestContext::new("tenant");
        let auth = resolver().resolve(&ctx, None, Some("RegionOne")).await?;
        assert_eq!(auth.vim_id, "vim-1");
        assert_eq!(auth.vim_name, "openstack-east");
        Ok(())
    }

    #[tokio::test]
    async fn unknown_vim_and_region_are_not_found() {
        let ctx = RequestContext::new("tenant");
        let err = resolver().resolve(&ctx, Some("vim-9"), None).await.unwrap_err();
        assert!(matches!(err, Error::VimNotFound { .. }));

        let err = resolver()
            .resolve(&ctx, Some("vim-1"), Some("RegionTwo"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let err = StaticVimResolver::new().resolve(&ctx, None, None).await.unwrap_err();
        assert!(matches!(err, Error::VimNotFound { ref vim_id } if vim_id == "default"));
    }

    #[tokio::test]
    async fn regionless_vim_serves_any_region() -> Result<()> {
        let ctx = RequestContext::new("tenant");
        let auth = resolver().resolve(&ctx, Some("vim-2"), Some("anywhere")).await?;
        assert_eq!(auth.vim_id, "vim-2");
        Ok(())
    }

    #[test]
    fn debug_redacts_credentials() {
        let auth = VimAuth::new("vim-1", "east").with_auth("password", "hunter2");
        let debug = format!("{auth:?}");
        assert!(debug.contains("password"));
        assert!(!debug.contains("hunter2"));
    }
}
