use std::fs::File;
use std::io;

use camino::Utf8Path;

use crate::error::OpenError;
use crate::location::Location;
use crate::open::OpenContext;
use crate::source::ByteStream;
use crate::transport::Opener;

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalOpener;

impl Opener for LocalOpener {
    fn open(
        &self,
        location: &Location,
        ctx: &OpenContext,
    ) -> Result<Box<dyn ByteStream>, OpenError> {
        ctx.check()?;
        let path = Utf8Path::new(location.path());
        let file = File::open(path).map_err(|err| map_io_error(path, err))?;

        let metadata = file.metadata().map_err(|err| map_io_error(path, err))?;
        if metadata.is_dir() {
            return Err(OpenError::IsDirectory {
                path: path.to_string(),
            });
        }
        Ok(Box::new(file))
    }
}

fn map_io_error(path: &Utf8Path, err: io::Error) -> OpenError {
    let path = path.to_string();
    match err.kind() {
        io::ErrorKind::NotFound => OpenError::NotFound { path },
        io::ErrorKind::PermissionDenied => OpenError::PermissionDenied { path },
        _ => OpenError::Local {
            path,
            message: err.to_string(),
        },
    }
}
