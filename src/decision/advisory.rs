use anyhow::Result;
use std::sync::Arc;
use tracing::debug;
use url::{Host, Url};

/// Outcome of an advisory check. Only `Block` influences a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Block,
    Clear,
    Unknown,
}

/// An optional external check consulted for every hop of an otherwise-allowed chain.
#[async_trait::async_trait]
pub trait Advisory: Send + Sync {
    fn name(&self) -> &str;
    async fn check(&self, hop: &Url) -> Signal;
}

/// Answers whether a hostname resolves, e.g. through a filtering DoH resolver.
#[async_trait::async_trait]
pub trait HostResolver: Send + Sync {
    async fn resolves(&self, host: &str) -> Result<bool>;
}

/// Treats a host the resolver refuses to resolve as a block signal.
pub struct DohAdvisory {
    resolver: Arc<dyn HostResolver>,
}

impl DohAdvisory {
    pub fn new(resolver: Arc<dyn HostResolver>) -> Self {
        Self { resolver }
    }
}

#[async_trait::async_trait]
impl Advisory for DohAdvisory {
    fn name(&self) -> &str {
        "dns"
    }

    async fn check(&self, hop: &Url) -> Signal {
        let host = match hop.host() {
            Some(Host::Domain(d)) => d,
            _ => return Signal::Unknown,
        };
        match self.resolver.resolves(host).await {
            Ok(true) => Signal::Clear,
            Ok(false) => Signal::Block,
            Err(e) => {
                debug!("DNS advisory unavailable for {}: {:#}", host, e);
                Signal::Unknown
            }
        }
    }
}
