use std::collections::HashMap;
use std::sync::Arc;

use crate::config::ResolvedConfig;
use crate::error::{CatError, ConstructionError, OpenError};
use crate::location::Location;
use crate::open::OpenContext;
use crate::source::ByteStream;

pub mod http;
pub mod local;
pub mod s3;

pub use http::HttpOpener;
pub use local::LocalOpener;
pub use s3::{S3Location, S3Opener};

pub trait Opener: Send + Sync {
    fn open(&self, location: &Location, ctx: &OpenContext)
    -> Result<Box<dyn ByteStream>, OpenError>;

    /// Checks scheme-specific requirements before any I/O is attempted.
    fn validate(&self, _location: &Location) -> Result<(), ConstructionError> {
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct OpenerRegistry {
    openers: HashMap<String, Arc<dyn Opener>>,
}

impl OpenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults(config: &ResolvedConfig) -> Result<Self, CatError> {
        let local: Arc<dyn Opener> = Arc::new(LocalOpener);
        let http: Arc<dyn Opener> = Arc::new(HttpOpener::new(config)?);
        let s3: Arc<dyn Opener> = Arc::new(S3Opener::new(config)?);

        let mut registry = Self::new();
        registry
            .register_shared("", local.clone())
            .register_shared("file", local)
            .register_shared("http", http.clone())
            .register_shared("https", http)
            .register_shared("s3", s3);
        Ok(registry)
    }

    pub fn register<O: Opener + 'static>(&mut self, scheme: &str, opener: O) -> &mut Self {
        self.register_shared(scheme, Arc::new(opener))
    }

    pub fn register_shared(&mut self, scheme: &str, opener: Arc<dyn Opener>) -> &mut Self {
        self.openers.insert(scheme.to_ascii_lowercase(), opener);
        self
    }

    pub fn get(&self, scheme: &str) -> Option<&dyn Opener> {
        self.openers.get(scheme).map(|opener| opener.as_ref())
    }

    pub fn schemes(&self) -> Vec<&str> {
        let mut schemes = self.openers.keys().map(String::as_str).collect::<Vec<_>>();
        schemes.sort_unstable();
        schemes
    }

    pub fn open(
        &self,
        location: &Location,
        ctx: &OpenContext,
    ) -> Result<Box<dyn ByteStream>, OpenError> {
        let opener = self
            .get(location.scheme())
            .ok_or_else(|| OpenError::UnsupportedScheme(location.scheme().to_string()))?;
        opener.open(location, ctx)
    }

    /// Unknown schemes pass here and fail at open time instead.
    pub fn validate(&self, location: &Location) -> Result<(), ConstructionError> {
        match self.get(location.scheme()) {
            Some(opener) => opener.validate(location),
            None => Ok(()),
        }
    }
}
