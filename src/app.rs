use std::io::{self, Write};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, error};

use crate::concat::ConcatReader;
use crate::config::ResolvedConfig;
use crate::error::CatError;
use crate::open::{OpenContext, multi_open};
use crate::source::SourceHandle;
use crate::transport::OpenerRegistry;

#[derive(Debug, Clone, Serialize)]
pub struct CatSummary {
    pub sources: usize,
    pub bytes: u64,
    #[serde(serialize_with = "serialize_secs")]
    pub elapsed: Duration,
}

fn serialize_secs<S: serde::Serializer>(
    value: &Duration,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(value.as_secs_f64())
}

pub struct App {
    openers: OpenerRegistry,
    config: ResolvedConfig,
}

impl App {
    pub fn new(openers: OpenerRegistry, config: ResolvedConfig) -> Self {
        Self { openers, config }
    }

    pub fn from_config(config: ResolvedConfig) -> Result<Self, CatError> {
        let openers = OpenerRegistry::with_defaults(&config)?;
        Ok(Self::new(openers, config))
    }

    /// All handles are closed after the copy whatever its outcome. A copy
    /// failure takes precedence over a close failure.
    pub fn cat<W: Write + ?Sized>(
        &self,
        identifiers: &[String],
        writer: &mut W,
    ) -> Result<CatSummary, CatError> {
        if identifiers.is_empty() {
            return Err(CatError::NoIdentifiers);
        }

        let mut handles = identifiers
            .iter()
            .enumerate()
            .map(|(position, identifier)| {
                let handle = SourceHandle::new(identifier)
                    .map_err(|source| CatError::UnprocessableIdentifier { position, source })?;
                self.openers
                    .validate(handle.location())
                    .map_err(|source| CatError::UnprocessableIdentifier { position, source })?;
                Ok(handle)
            })
            .collect::<Result<Vec<_>, CatError>>()?;

        let started = Instant::now();
        let ctx = OpenContext::with_timeout(self.config.open_timeout);
        multi_open(&self.openers, &ctx, self.config.concurrency, &mut handles)?;

        let sources = handles.len();
        let mut reader = ConcatReader::new(handles);
        let copied = io::copy(&mut reader, writer).and_then(|bytes| {
            writer.flush()?;
            Ok(bytes)
        });
        debug!(position = reader.position(), "copy finished");
        let closed = reader.close();

        match (copied, closed) {
            (Ok(bytes), Ok(())) => Ok(CatSummary {
                sources,
                bytes,
                elapsed: started.elapsed(),
            }),
            (Ok(_), Err(err)) => Err(CatError::Close(err)),
            (Err(err), closed) => {
                if let Err(close_err) = closed {
                    error!("{close_err}");
                }
                Err(CatError::Copy(err))
            }
        }
    }
}
